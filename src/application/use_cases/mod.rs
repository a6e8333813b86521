pub mod audit_carryover;
pub mod audit_scan;
pub mod response_merger;
pub mod response_normalizer;
pub mod results_store;
