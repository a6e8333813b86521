//! Severity and status vocabularies.
//!
//! The dashboard and the relational store speak two parallel vocabularies:
//!
//! | concept  | dashboard (UI)                     | storage                        |
//! |----------|------------------------------------|--------------------------------|
//! | severity | `Critical`, `High`, `Medium`, `Low` | `Critical`, `High`, `Medium`, `Low` |
//! | status   | `open`, `partial`, `implemented`   | `open`, `in_progress`, `done`  |
//!
//! They are distinct types and only meet through the mapping functions below.
//! Every mapping is total: unrecognized input degrades to `Low` / `open`,
//! never to a more severe or more advanced value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Finding severity in the dashboard vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Value")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Finding severity as persisted in the relational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Value")]
pub enum DbSeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// Remediation status in the dashboard vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "Value")]
pub enum Status {
    Open,
    Partial,
    Implemented,
}

/// Remediation status as persisted in the relational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "Value")]
pub enum DbStatus {
    Open,
    InProgress,
    Done,
}

/// Map any severity label to the storage vocabulary.
///
/// Case-insensitive prefix match: `crit*` → Critical, `hi*` → High,
/// `med*` → Medium, anything else (including `None`) → Low.
pub fn to_db_severity(input: Option<&str>) -> DbSeverity {
    let lower = input.unwrap_or_default().to_lowercase();
    if lower.starts_with("crit") {
        DbSeverity::Critical
    } else if lower.starts_with("hi") {
        DbSeverity::High
    } else if lower.starts_with("med") {
        DbSeverity::Medium
    } else {
        DbSeverity::Low
    }
}

/// Map a stored severity label back to the dashboard vocabulary.
pub fn from_db_severity(input: Option<&str>) -> Severity {
    to_db_severity(input).into()
}

/// Map any status label to the storage vocabulary.
pub fn to_db_status(input: Option<&str>) -> DbStatus {
    match input.unwrap_or_default().to_lowercase().as_str() {
        "implemented" | "done" => DbStatus::Done,
        "partial" | "in_progress" => DbStatus::InProgress,
        _ => DbStatus::Open,
    }
}

/// Map a stored status label back to the dashboard vocabulary.
pub fn from_db_status(input: Option<&str>) -> Status {
    to_db_status(input).into()
}

/// Text form of an untyped JSON label. Strings pass through, numbers and
/// booleans are stringified, everything else has no label.
pub fn label_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }

    pub fn from_value(value: &Value) -> Self {
        from_db_severity(label_text(value).as_deref())
    }
}

impl DbSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbSeverity::Critical => "Critical",
            DbSeverity::High => "High",
            DbSeverity::Medium => "Medium",
            DbSeverity::Low => "Low",
        }
    }

    pub fn from_value(value: &Value) -> Self {
        to_db_severity(label_text(value).as_deref())
    }
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::Partial => "partial",
            Status::Implemented => "implemented",
        }
    }

    pub fn from_value(value: &Value) -> Self {
        from_db_status(label_text(value).as_deref())
    }
}

impl DbStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbStatus::Open => "open",
            DbStatus::InProgress => "in_progress",
            DbStatus::Done => "done",
        }
    }

    pub fn from_value(value: &Value) -> Self {
        to_db_status(label_text(value).as_deref())
    }
}

impl From<Severity> for DbSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical => DbSeverity::Critical,
            Severity::High => DbSeverity::High,
            Severity::Medium => DbSeverity::Medium,
            Severity::Low => DbSeverity::Low,
        }
    }
}

impl From<DbSeverity> for Severity {
    fn from(severity: DbSeverity) -> Self {
        match severity {
            DbSeverity::Critical => Severity::Critical,
            DbSeverity::High => Severity::High,
            DbSeverity::Medium => Severity::Medium,
            DbSeverity::Low => Severity::Low,
        }
    }
}

impl From<Status> for DbStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Open => DbStatus::Open,
            Status::Partial => DbStatus::InProgress,
            Status::Implemented => DbStatus::Done,
        }
    }
}

impl From<DbStatus> for Status {
    fn from(status: DbStatus) -> Self {
        match status {
            DbStatus::Open => Status::Open,
            DbStatus::InProgress => Status::Partial,
            DbStatus::Done => Status::Implemented,
        }
    }
}

// Lenient deserialization: any JSON value is accepted and mapped.
impl From<Value> for Severity {
    fn from(value: Value) -> Self {
        Severity::from_value(&value)
    }
}

impl From<Value> for DbSeverity {
    fn from(value: Value) -> Self {
        DbSeverity::from_value(&value)
    }
}

impl From<Value> for Status {
    fn from(value: Value) -> Self {
        Status::from_value(&value)
    }
}

impl From<Value> for DbStatus {
    fn from(value: Value) -> Self {
        DbStatus::from_value(&value)
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Low
    }
}

impl Default for DbSeverity {
    fn default() -> Self {
        DbSeverity::Low
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Open
    }
}

impl Default for DbStatus {
    fn default() -> Self {
        DbStatus::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_db_severity_prefix_match() {
        assert_eq!(to_db_severity(Some("CRITICAL-ish")), DbSeverity::Critical);
        assert_eq!(to_db_severity(Some("crit")), DbSeverity::Critical);
        assert_eq!(to_db_severity(Some("High")), DbSeverity::High);
        assert_eq!(to_db_severity(Some("hi")), DbSeverity::High);
        assert_eq!(to_db_severity(Some("medium")), DbSeverity::Medium);
        assert_eq!(to_db_severity(Some("MED")), DbSeverity::Medium);
        assert_eq!(to_db_severity(Some("low")), DbSeverity::Low);
    }

    #[test]
    fn test_to_db_severity_defaults_to_low() {
        assert_eq!(to_db_severity(Some("gibberish")), DbSeverity::Low);
        assert_eq!(to_db_severity(Some("")), DbSeverity::Low);
        assert_eq!(to_db_severity(None), DbSeverity::Low);
        // Leading whitespace is not a recognized prefix.
        assert_eq!(to_db_severity(Some(" critical")), DbSeverity::Low);
        assert_eq!(to_db_severity(Some("severe")), DbSeverity::Low);
    }

    #[test]
    fn test_from_db_severity_same_rules() {
        assert_eq!(from_db_severity(Some("Critical")), Severity::Critical);
        assert_eq!(from_db_severity(Some("HIGH")), Severity::High);
        assert_eq!(from_db_severity(Some("Medium")), Severity::Medium);
        assert_eq!(from_db_severity(Some("whatever")), Severity::Low);
        assert_eq!(from_db_severity(None), Severity::Low);
    }

    #[test]
    fn test_to_db_status() {
        assert_eq!(to_db_status(Some("Partial")), DbStatus::InProgress);
        assert_eq!(to_db_status(Some("in_progress")), DbStatus::InProgress);
        assert_eq!(to_db_status(Some("implemented")), DbStatus::Done);
        assert_eq!(to_db_status(Some("DONE")), DbStatus::Done);
        assert_eq!(to_db_status(Some("open")), DbStatus::Open);
        assert_eq!(to_db_status(Some("in progress")), DbStatus::Open);
        assert_eq!(to_db_status(None), DbStatus::Open);
    }

    #[test]
    fn test_from_db_status() {
        assert_eq!(from_db_status(Some("done")), Status::Implemented);
        assert_eq!(from_db_status(Some("in_progress")), Status::Partial);
        assert_eq!(from_db_status(Some("partial")), Status::Partial);
        assert_eq!(from_db_status(Some("open")), Status::Open);
        assert_eq!(from_db_status(Some("archived")), Status::Open);
    }

    #[test]
    fn test_round_trip_through_storage() {
        for severity in [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
        ] {
            let stored = to_db_severity(Some(severity.as_str()));
            assert_eq!(from_db_severity(Some(stored.as_str())), severity);
        }
        for status in [Status::Open, Status::Partial, Status::Implemented] {
            let stored = to_db_status(Some(status.as_str()));
            assert_eq!(stored, DbStatus::from(status));
            assert_eq!(from_db_status(Some(stored.as_str())), status);
        }
    }

    #[test]
    fn test_untyped_values_are_total() {
        assert_eq!(DbSeverity::from_value(&json!(null)), DbSeverity::Low);
        assert_eq!(DbSeverity::from_value(&json!(5)), DbSeverity::Low);
        assert_eq!(DbSeverity::from_value(&json!({"a": 1})), DbSeverity::Low);
        assert_eq!(DbSeverity::from_value(&json!("High")), DbSeverity::High);
        assert_eq!(DbStatus::from_value(&json!(["done"])), DbStatus::Open);
        assert_eq!(Status::from_value(&json!("DONE")), Status::Implemented);
    }

    #[test]
    fn test_serde_lenient_and_canonical() {
        let severity: Severity = serde_json::from_value(json!("crit")).unwrap();
        assert_eq!(severity, Severity::Critical);
        assert_eq!(serde_json::to_value(severity).unwrap(), json!("Critical"));

        let status: DbStatus = serde_json::from_value(json!("Partial")).unwrap();
        assert_eq!(serde_json::to_value(status).unwrap(), json!("in_progress"));

        let status: Status = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(serde_json::to_value(status).unwrap(), json!("open"));
    }
}
