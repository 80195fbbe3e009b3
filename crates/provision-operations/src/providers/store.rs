use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use provision_core::{ProvisioningLog, ProvisioningLogPatch};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::traits::ProvisioningStore;
use crate::{OperationError, Result};

const LOGS_DIR: &str = "logs";

/// One pretty-printed JSON document per project under `<state_dir>/logs/`.
///
/// Writes go through a temporary file and a rename, so readers never see a
/// partial document. Read-modify-write cycles are serialized per store.
pub struct FileSystemProvisioningStore {
    logs_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSystemProvisioningStore {
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            logs_dir: state_dir.join(LOGS_DIR),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn log_path(&self, project_code: &str) -> PathBuf {
        self.logs_dir.join(format!("{}.json", file_stem(project_code)))
    }

    async fn modify(
        &self,
        project_code: &str,
        change: impl FnOnce(&mut ProvisioningLog) + Send,
    ) -> Result<ProvisioningLog> {
        let _guard = self.write_lock.lock().await;
        let path = self.log_path(project_code);
        let mut log = load_log(&path)
            .await?
            .ok_or_else(|| OperationError::LogNotFound {
                project_code: project_code.to_string(),
            })?;
        change(&mut log);
        save_log(&path, &log).await?;
        Ok(log)
    }
}

fn file_stem(project_code: &str) -> String {
    project_code
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl ProvisioningStore for FileSystemProvisioningStore {
    async fn create_log(&self, log: &ProvisioningLog) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        save_log(&self.log_path(&log.project_code), log).await
    }

    async fn update_provisioning_log(
        &self,
        project_code: &str,
        patch: &ProvisioningLogPatch,
    ) -> Result<ProvisioningLog> {
        self.modify(project_code, |log| patch.apply(log)).await
    }

    async fn get_provisioning_status(&self, project_code: &str) -> Result<Option<ProvisioningLog>> {
        load_log(&self.log_path(project_code)).await
    }

    async fn retry_provisioning(
        &self,
        project_code: &str,
        from_step: u8,
    ) -> Result<ProvisioningLog> {
        self.modify(project_code, |log| log.begin_retry(from_step))
            .await
    }
}

async fn load_log(path: &Path) -> Result<Option<ProvisioningLog>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(OperationError::StoreRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let log = serde_json::from_str(&content).map_err(|source| OperationError::StoreParse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(log))
}

async fn save_log(path: &Path, log: &ProvisioningLog) -> Result<()> {
    let content =
        serde_json::to_string_pretty(log).map_err(|source| OperationError::StoreSerialize {
            project_code: log.project_code.clone(),
            source,
        })?;
    let write_error = |source| OperationError::StoreWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    let temp = path.with_extension("json.tmp");
    fs::write(&temp, content).await.map_err(write_error)?;
    fs::rename(&temp, path).await.map_err(write_error)?;

    debug!(path = %path.display(), status = %log.status, "saved provisioning log");
    Ok(())
}
