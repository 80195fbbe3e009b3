use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use provision_core::ProvisioningInput;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::traits::OfflineQueue;
use crate::{OperationError, Result};

const QUEUE_FILE: &str = "offline-queue.jsonl";

/// Queued requests as JSON lines in `<state_dir>/offline-queue.jsonl`.
pub struct FileSystemOfflineQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSystemOfflineQueue {
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(QUEUE_FILE),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> OperationError {
        OperationError::OfflineQueue {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl OfflineQueue for FileSystemOfflineQueue {
    async fn enqueue(&self, input: &ProvisioningInput) -> Result<()> {
        let mut line =
            serde_json::to_string(input).map_err(|source| OperationError::StoreSerialize {
                project_code: input.project_code.clone(),
                source,
            })?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        debug!(project_code = %input.project_code, "request queued offline");
        Ok(())
    }

    async fn drain(&self) -> Result<Vec<ProvisioningInput>> {
        let _guard = self.lock.lock().await;
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut inputs = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let input = serde_json::from_str(line).map_err(|source| {
                OperationError::OfflineQueueParse {
                    path: self.path.clone(),
                    line: index + 1,
                    source,
                }
            })?;
            inputs.push(input);
        }

        fs::remove_file(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        debug!(count = inputs.len(), "offline queue drained");
        Ok(inputs)
    }
}
