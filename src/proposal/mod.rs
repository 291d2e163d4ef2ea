//! Proposal domain module
//!
//! Borrower proposals live here until a lender accepts them.

mod model;
mod registry;

pub use model::*;
pub use registry::ProposalRegistry;
