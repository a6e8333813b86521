pub mod audits;
pub mod connection;
