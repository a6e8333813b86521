use crate::domain::taxonomy::{Severity, Status};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One reported issue, in the dashboard vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

/// Findings shown in the in-session preview share the finding shape.
pub type PreviewFinding = Finding;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    #[serde(default)]
    pub critical: u32,
    #[serde(default)]
    pub high: u32,
    #[serde(default)]
    pub medium: u32,
    #[serde(default)]
    pub low: u32,
}

impl SeverityCounts {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> u32 {
        self.critical + self.high + self.medium + self.low
    }
}

/// Who filled in the questionnaire that produced an audit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    #[default]
    Developer,
    Organization,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Developer => "Developer",
            UserType::Organization => "Organization",
        }
    }

    /// Case-insensitive; unknown labels fall back to `Developer`.
    pub fn parse(input: &str) -> Self {
        if input.trim().eq_ignore_ascii_case("organization") {
            UserType::Organization
        } else {
            UserType::Developer
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete audit result that has not been durably saved yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAuditPayload {
    pub score: Option<f64>,
    #[serde(default)]
    pub summary_md: String,
    #[serde(default)]
    pub baseline_findings: Vec<Finding>,
    #[serde(default)]
    pub counts: SeverityCounts,
    #[serde(default)]
    pub analytics: Value,
    #[serde(default)]
    pub meta: Value,
    #[serde(default)]
    pub user_type: UserType,
}

impl PendingAuditPayload {
    /// Stage a preview for persistence. `meta` carries the embedded answers
    /// (`developer_responses` / `organization_responses`).
    pub fn from_preview(preview: &PreviewResults, user_type: UserType, meta: Value) -> Self {
        Self {
            score: preview.score,
            summary_md: preview.summary_md.clone(),
            baseline_findings: preview.findings.clone(),
            counts: SeverityCounts::from_findings(&preview.findings),
            analytics: preview
                .extra
                .get("analytics")
                .cloned()
                .unwrap_or(Value::Null),
            meta,
            user_type,
        }
    }
}

/// The current in-session audit result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewResults {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub summary_md: String,
    #[serde(default)]
    pub findings: Vec<PreviewFinding>,
    /// Optional fields passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A durably stored audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub user_id: String,
    pub user_type: UserType,
    pub score: Option<f64>,
    pub summary_md: String,
    pub counts: SeverityCounts,
    pub analytics: Value,
    pub meta: Value,
    pub responses_hash: Option<String>,
    pub created_at: i64,
}

impl AuditRecord {
    /// JSON view with the embedded answer slots where the normalizer looks for them.
    pub fn as_document(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "user_id": self.user_id,
            "user_type": self.user_type,
            "score": self.score,
            "summary_md": self.summary_md,
            "meta": self.meta,
        })
    }
}

/// A stored finding translated back into the dashboard vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub id: i64,
    pub audit_id: String,
    pub severity: Severity,
    pub status: Status,
    pub title: String,
    pub description: String,
    pub remediation: Option<String>,
}
