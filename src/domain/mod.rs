pub mod answers;
pub mod audit;
pub mod error;
pub mod llm_config;
pub mod responses;
pub mod session;
pub mod taxonomy;
