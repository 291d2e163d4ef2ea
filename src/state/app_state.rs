//! Application state shared across handlers

use axum::extract::FromRef;
use std::sync::Arc;

use crate::auth::AuthConfig;
use crate::ledger::Ledger;
use crate::websocket::WsState;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub auth: Arc<AuthConfig>,
    pub ws_state: WsState,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>, auth: AuthConfig) -> Self {
        let ws_state = WsState::new(ledger.notifier());
        Self {
            ledger,
            auth: Arc::new(auth),
            ws_state,
        }
    }
}

impl FromRef<AppState> for Arc<Ledger> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ledger.clone()
    }
}

impl FromRef<AppState> for Arc<AuthConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}
