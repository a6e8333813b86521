use std::sync::{Arc, Mutex};

use tracing::error;

use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::{AppConfig, ConfigService};
use crate::infrastructure::db::audits::AuditRepository;
use crate::infrastructure::db::connection::{init_audit_db, init_audit_db_url};
use crate::infrastructure::llm_clients::{LLMClient, OpenAIClient};
use crate::infrastructure::pending_store::{FileStorage, KeyValueStorage};
use crate::infrastructure::storage::{database_path, ensure_pending_dir, resolve_data_dir};
use crate::interfaces::http::{add_log, LogEntry};
use crate::interfaces::state::AppState;

/// Open storage and wire the use cases for one process.
pub async fn build_state(
    config: &AppConfig,
    logs: &Arc<Mutex<Vec<LogEntry>>>,
) -> Result<Arc<AppState>> {
    let data_dir = resolve_data_dir(&config.storage.data_dir).map_err(|err| {
        error!(
            error = %err,
            data_dir = %config.storage.data_dir.display(),
            "Failed to resolve data dir"
        );
        AppError::IoError(format!("Failed to create data dir: {}", err))
    })?;

    let pending_dir = ensure_pending_dir(&data_dir).map_err(|err| {
        error!(
            error = %err,
            pending_dir = %data_dir.join("pending").display(),
            "Failed to create pending dir"
        );
        AppError::IoError(format!("Failed to create pending dir: {}", err))
    })?;

    let pool = match &config.database.url {
        Some(url) => init_audit_db_url(url).await?,
        None => init_audit_db(&database_path(&data_dir)).await?,
    };
    add_log(logs, "INFO", "System", "Audit database ready");

    let repository = Arc::new(AuditRepository::new(pool));
    let llm_client: Arc<dyn LLMClient + Send + Sync> = Arc::new(OpenAIClient::new());
    let pending_storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(pending_dir));

    Ok(Arc::new(AppState::new(
        repository,
        llm_client,
        pending_storage,
        ConfigService::new(),
        config.llm.clone(),
    )))
}
