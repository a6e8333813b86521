use crate::application::{AuditCarryoverUseCase, AuditScanUseCase, ResultsRegistry};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::config::{overlay_llm_config, ConfigService};
use crate::infrastructure::db::audits::AuditRepository;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::pending_store::KeyValueStorage;
use std::sync::Arc;

pub struct AppState {
    pub scan_use_case: AuditScanUseCase,
    pub carryover_use_case: AuditCarryoverUseCase,
    pub results: ResultsRegistry,
    pub repository: Arc<AuditRepository>,
    pub config_service: ConfigService,
    pub llm_config: LLMConfig,
}

impl AppState {
    pub fn new(
        repository: Arc<AuditRepository>,
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        pending_storage: Arc<dyn KeyValueStorage>,
        config_service: ConfigService,
        llm_config: LLMConfig,
    ) -> Self {
        Self {
            scan_use_case: AuditScanUseCase::new(llm_client),
            carryover_use_case: AuditCarryoverUseCase::new(pending_storage, repository.clone()),
            results: ResultsRegistry::new(),
            repository,
            config_service,
            llm_config,
        }
    }

    /// Configured completion endpoint with the API key filled in from the
    /// keyring when the configuration leaves it blank.
    pub fn resolved_llm_config(&self) -> LLMConfig {
        self.config_service.resolve_llm_config(&self.llm_config)
    }

    /// Endpoint for one scan. A caller override never receives the stored
    /// key unless it targets the configured endpoint.
    pub fn scan_llm_config(&self, requested: Option<&LLMConfig>) -> LLMConfig {
        let server = self.resolved_llm_config();
        match requested {
            Some(requested) => overlay_llm_config(&server, requested),
            None => server,
        }
    }
}
