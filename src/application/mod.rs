pub mod use_cases;

pub use use_cases::audit_carryover::AuditCarryoverUseCase;
pub use use_cases::audit_scan::AuditScanUseCase;
pub use use_cases::results_store::{ResultsRegistry, ResultsStore};
