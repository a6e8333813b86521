use crate::application::use_cases::response_merger::merge_responses;
use crate::application::use_cases::response_normalizer::responses_from_embedded_value;
use crate::application::use_cases::results_store::ResultsStore;
use crate::domain::audit::{Finding, PreviewResults, UserType};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::responses::Responses;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::{clean_llm_response, extract_json_payload};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are a smart-contract security auditor. You receive a questionnaire about a project's development and operational practices. Assess the security posture and respond with a single JSON object: {\"summary_md\": string (markdown), \"score\": number from 0 to 100, \"findings\": [{\"severity\": \"critical\"|\"high\"|\"medium\"|\"low\", \"title\": string, \"description\": string, \"remediation\": string}]}. Return ONLY the JSON object.";

pub struct AuditScanUseCase {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
}

impl AuditScanUseCase {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>) -> Self {
        Self { llm_client }
    }

    /// Score one questionnaire submission and publish it as the current
    /// preview in `results`.
    ///
    /// `developer` / `organization` are the embedded answer arrays as they
    /// arrive from the form. The preview carries them back under `meta` so a
    /// later carry-over can persist the answers alongside the audit.
    pub async fn scan(
        &self,
        results: &ResultsStore,
        config: &LLMConfig,
        user_type: UserType,
        developer: &Value,
        organization: &Value,
    ) -> Result<PreviewResults> {
        let developer_responses = responses_from_embedded_value(developer);
        let organization_responses = responses_from_embedded_value(organization);
        let merged = merge_responses([Some(&developer_responses), Some(&organization_responses)]);

        if merged.is_empty() {
            return Err(AppError::ValidationError(
                "At least one answered question is required.".to_string(),
            ));
        }

        let user_prompt = render_prompt(user_type, &merged);
        let raw = self
            .llm_client
            .generate(config, SYSTEM_PROMPT, &user_prompt)
            .await
            .map_err(|e| match e {
                AppError::LLMError(msg) => AppError::LLMError(msg),
                other => AppError::LLMError(other.to_string()),
            })?;

        let mut preview = parse_preview(&raw)?;
        let fingerprint = merged.fingerprint();
        preview
            .extra
            .insert("responses_hash".to_string(), Value::String(fingerprint.clone()));
        preview
            .extra
            .insert("user_type".to_string(), json!(user_type));
        preview.extra.insert(
            "meta".to_string(),
            json!({
                "developer_responses": developer,
                "organization_responses": organization,
            }),
        );
        preview.extra.insert(
            "analytics".to_string(),
            json!({
                "questions": merged.len(),
                "selections": merged.selection_count(),
            }),
        );

        info!(
            responses_hash = %fingerprint,
            findings = preview.findings.len(),
            score = ?preview.score,
            "Audit scan completed"
        );

        results.set_results(Some(preview.clone()));
        Ok(preview)
    }
}

fn render_prompt(user_type: UserType, responses: &Responses) -> String {
    let mut prompt = format!("Respondent: {}\n\n", user_type);
    for (question, options) in responses.iter() {
        prompt.push_str("Q: ");
        prompt.push_str(question);
        prompt.push_str("\nA: ");
        prompt.push_str(&options.join("; "));
        prompt.push_str("\n\n");
    }
    prompt
}

/// Lenient read of the completion: missing fields default, the score is
/// clamped to 0..=100 and anything non-numeric becomes `None`.
fn parse_preview(raw: &str) -> Result<PreviewResults> {
    let cleaned = clean_llm_response(raw);
    let payload = extract_json_payload(&cleaned);
    let value: Value = serde_json::from_str(&payload).map_err(|e| {
        warn!(error = %e, "AI completion is not valid JSON");
        AppError::ParseError(format!("Invalid AI response: {}", e))
    })?;

    let Value::Object(object) = value else {
        return Err(AppError::ParseError(
            "AI response is not a JSON object".to_string(),
        ));
    };

    let summary_md = ["summary_md", "summary"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let findings = object
        .get("findings")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .filter_map(|item| serde_json::from_value::<Finding>(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    Ok(PreviewResults {
        score: object.get("score").and_then(parse_score),
        summary_md,
        findings,
        extra: Map::new(),
    })
}

fn parse_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    if score.is_finite() {
        Some(score.clamp(0.0, 100.0))
    } else {
        None
    }
}
