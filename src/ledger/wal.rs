//! Write-ahead log
//!
//! One JSON record per line. Each record carries the transaction version
//! and `checksum = sha256(previous_checksum || tx_json)` in hex, so a
//! truncated, reordered or edited log is detected before replay. A record
//! whose write or sync fails is cut off again so the file never holds a
//! transaction the ledger did not commit.

use axum::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::state::Transaction;

#[derive(Error, Debug)]
pub enum WalError {
    #[error("wal io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wal record on line {line} is malformed: {source}")]
    Serde {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("wal checksum mismatch at version {0}")]
    ChecksumMismatch(u64),

    #[error("wal version gap: expected {expected}, found {found}")]
    VersionGap { expected: u64, found: u64 },

    #[error("wal rollback failed after an aborted append; reopen the log")]
    Poisoned,
}

/// Storage under the log
#[async_trait]
pub trait WalSink: Send + Sync {
    async fn size(&mut self) -> std::io::Result<u64>;
    async fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()>;
    async fn sync(&mut self) -> std::io::Result<()>;
    /// Cut the log back to `len` bytes and sync
    async fn truncate(&mut self, len: u64) -> std::io::Result<()>;
}

#[async_trait]
impl WalSink for File {
    async fn size(&mut self) -> std::io::Result<u64> {
        Ok(self.metadata().await?.len())
    }

    async fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        AsyncWriteExt::write_all(self, bytes).await
    }

    async fn sync(&mut self) -> std::io::Result<()> {
        self.sync_data().await
    }

    async fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        // drains and clears an in-flight write error already reported to the caller
        let _ = self.flush().await;
        self.set_len(len).await?;
        self.sync_data().await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalRecord {
    pub version: u64,
    pub checksum: String,
    pub tx: Transaction,
}

pub struct WriteAheadLog {
    path: PathBuf,
    sink: Box<dyn WalSink>,
    last_version: u64,
    last_checksum: String,
    poisoned: bool,
}

fn chain_checksum(prev: &str, tx_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev.as_bytes());
    hasher.update(tx_json.as_bytes());
    hex::encode(hasher.finalize())
}

impl WriteAheadLog {
    /// Open (or create) the log at `path`, verify it and return the
    /// transactions it holds in commit order.
    pub async fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<Transaction>), WalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut last_version = 0;
        let mut last_checksum = String::new();
        let mut txs = Vec::new();

        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: WalRecord = serde_json::from_str(line)
                .map_err(|source| WalError::Serde { line: idx + 1, source })?;

            if record.version != last_version + 1 || record.tx.version != record.version {
                return Err(WalError::VersionGap {
                    expected: last_version + 1,
                    found: record.version,
                });
            }
            let tx_json = serde_json::to_string(&record.tx)
                .map_err(|source| WalError::Serde { line: idx + 1, source })?;
            if chain_checksum(&last_checksum, &tx_json) != record.checksum {
                return Err(WalError::ChecksumMismatch(record.version));
            }

            last_version = record.version;
            last_checksum = record.checksum;
            txs.push(record.tx);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::info!(
            path = %path.display(),
            records = txs.len(),
            last_version,
            "Opened write-ahead log"
        );

        Ok((
            Self {
                path,
                sink: Box::new(file),
                last_version,
                last_checksum,
                poisoned: false,
            },
            txs,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_version(&self) -> u64 {
        self.last_version
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    #[cfg(test)]
    pub(crate) fn with_sink(
        mut self,
        wrap: impl FnOnce(Box<dyn WalSink>) -> Box<dyn WalSink>,
    ) -> Self {
        self.sink = wrap(self.sink);
        self
    }

    /// Durably append `tx`. The in-memory chain only advances once the
    /// record is synced; on failure the file is truncated back to where
    /// it was, and if that fails too every later append is refused.
    pub async fn append(&mut self, tx: &Transaction) -> Result<(), WalError> {
        if self.poisoned {
            return Err(WalError::Poisoned);
        }
        if tx.version != self.last_version + 1 {
            return Err(WalError::VersionGap {
                expected: self.last_version + 1,
                found: tx.version,
            });
        }

        let tx_json = serde_json::to_string(tx).map_err(|source| WalError::Serde { line: 0, source })?;
        let checksum = chain_checksum(&self.last_checksum, &tx_json);
        let record = WalRecord {
            version: tx.version,
            checksum: checksum.clone(),
            tx: tx.clone(),
        };
        let mut line = serde_json::to_string(&record).map_err(|source| WalError::Serde { line: 0, source })?;
        line.push('\n');

        let prev_len = self.sink.size().await?;
        if let Err(e) = self.write_synced(line.as_bytes()).await {
            if let Err(rollback) = self.sink.truncate(prev_len).await {
                tracing::error!(
                    path = %self.path.display(),
                    version = tx.version,
                    "Failed to roll back write-ahead log: {}",
                    rollback
                );
                self.poisoned = true;
            }
            return Err(e.into());
        }

        self.last_version = tx.version;
        self.last_checksum = checksum;
        Ok(())
    }

    async fn write_synced(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.sink.write_all(bytes).await?;
        self.sink.sync().await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Command;
    use crate::models::AccountId;

    fn tx(version: u64, amount: u128) -> Transaction {
        Transaction {
            version,
            caller: AccountId::from("lp"),
            timestamp: 1_700_000_000,
            command: Command::AddLiquidity { amount },
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ratelend-wal-{}-{}.log", name, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_append_then_reopen() {
        let path = temp_path("reopen");
        {
            let (mut wal, txs) = WriteAheadLog::open(&path).await.unwrap();
            assert!(txs.is_empty());
            wal.append(&tx(1, 5)).await.unwrap();
            wal.append(&tx(2, 7)).await.unwrap();
            assert!(matches!(
                wal.append(&tx(4, 1)).await,
                Err(WalError::VersionGap { expected: 3, found: 4 })
            ));
        }

        let (wal, txs) = WriteAheadLog::open(&path).await.unwrap();
        assert_eq!(wal.last_version(), 2);
        assert_eq!(txs, vec![tx(1, 5), tx(2, 7)]);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_failed_append_is_rolled_back() {
        use super::faults::{Faults, FaultySink};
        use std::sync::Arc;

        let path = temp_path("rollback");
        let faults = Arc::new(Faults::default());
        {
            let (wal, _) = WriteAheadLog::open(&path).await.unwrap();
            let mut wal = wal.with_sink(FaultySink::wrap(faults.clone()));
            wal.append(&tx(1, 5)).await.unwrap();
            let committed_len = std::fs::metadata(&path).unwrap().len();

            Faults::arm(&faults.sync);
            assert!(matches!(wal.append(&tx(2, 7)).await, Err(WalError::Io(_))));
            assert_eq!(std::fs::metadata(&path).unwrap().len(), committed_len);
            assert_eq!(wal.last_version(), 1);

            Faults::arm(&faults.short_write);
            assert!(wal.append(&tx(2, 8)).await.is_err());
            assert_eq!(std::fs::metadata(&path).unwrap().len(), committed_len);

            // the same version is written once the sink recovers
            wal.append(&tx(2, 9)).await.unwrap();
            assert!(!wal.is_poisoned());
        }

        let (wal, txs) = WriteAheadLog::open(&path).await.unwrap();
        assert_eq!(wal.last_version(), 2);
        assert_eq!(txs, vec![tx(1, 5), tx(2, 9)]);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_failed_rollback_poisons_log() {
        use super::faults::{Faults, FaultySink};
        use std::sync::Arc;

        let path = temp_path("poison");
        let faults = Arc::new(Faults::default());
        let (wal, _) = WriteAheadLog::open(&path).await.unwrap();
        let mut wal = wal.with_sink(FaultySink::wrap(faults.clone()));
        wal.append(&tx(1, 5)).await.unwrap();

        Faults::arm(&faults.truncate);
        Faults::arm(&faults.short_write);
        assert!(matches!(wal.append(&tx(2, 7)).await, Err(WalError::Io(_))));
        assert!(wal.is_poisoned());
        assert!(matches!(wal.append(&tx(2, 7)).await, Err(WalError::Poisoned)));
        assert_eq!(wal.last_version(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_tampered_log_is_rejected() {
        let path = temp_path("tamper");
        {
            let (mut wal, _) = WriteAheadLog::open(&path).await.unwrap();
            wal.append(&tx(1, 5)).await.unwrap();
            wal.append(&tx(2, 7)).await.unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, contents.replace("\"amount\":7", "\"amount\":70")).unwrap();

        assert!(matches!(
            WriteAheadLog::open(&path).await,
            Err(WalError::ChecksumMismatch(2))
        ));
        let _ = std::fs::remove_file(&path);
    }
}
