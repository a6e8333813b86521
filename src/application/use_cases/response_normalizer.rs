//! Response Normalizer
//!
//! Turns the two raw answer shapes into canonical [`Responses`]:
//! - embedded `{question, options}` arrays attached to an audit record
//! - flat `{question, option_value, audience}` rows
//!
//! Malformed input is coerced or skipped, never rejected.

use crate::application::use_cases::response_merger::merge_responses;
use crate::domain::answers::{Audience, EmbeddedQa, NormalizedAnswerRow};
use crate::domain::responses::Responses;
use serde_json::Value;

/// A location inside an audit document where one audience's embedded
/// answers may live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedSource {
    pub audience: Audience,
    pub path: &'static [&'static str],
}

/// Migration-compatibility shim: audits written by older clients keep the
/// embedded answers at the top level, newer ones nest them under `meta`.
/// Sources are consulted in order; the first non-null value per audience
/// wins. Dropping the legacy shape means deleting its entries here.
pub const EMBEDDED_SOURCES: &[EmbeddedSource] = &[
    EmbeddedSource {
        audience: Audience::Developer,
        path: &["meta", "developer_responses"],
    },
    EmbeddedSource {
        audience: Audience::Developer,
        path: &["developer_responses"],
    },
    EmbeddedSource {
        audience: Audience::Organization,
        path: &["meta", "organization_responses"],
    },
    EmbeddedSource {
        audience: Audience::Organization,
        path: &["organization_responses"],
    },
];

/// Normalize embedded entries. A question repeated later in the list
/// replaces the earlier selection.
pub fn responses_from_embedded(entries: &[EmbeddedQa]) -> Responses {
    let mut responses = Responses::new();
    for entry in entries {
        let question = entry.question.trim();
        if question.is_empty() {
            continue;
        }
        responses.replace_options(
            question,
            entry.options.iter().filter(|option| !option.is_empty()).cloned(),
        );
    }
    responses
}

/// Normalize an untyped, possibly-null embedded array.
pub fn responses_from_embedded_value(value: &Value) -> Responses {
    responses_from_embedded(&EmbeddedQa::list_from_value(value))
}

/// Normalize answer rows. Rows for the same question accumulate.
pub fn responses_from_rows(rows: &[NormalizedAnswerRow]) -> Responses {
    let mut responses = Responses::new();
    for row in rows {
        let question = row.question.trim();
        let option = row.option_value.trim();
        if question.is_empty() || option.is_empty() {
            continue;
        }
        responses.add_option(question, option);
    }
    responses
}

/// Normalize an untyped, possibly-null array of rows.
pub fn responses_from_rows_value(value: &Value) -> Responses {
    responses_from_rows(&NormalizedAnswerRow::list_from_value(value))
}

/// The embedded answers for one audience, taken from the first source in
/// [`EMBEDDED_SOURCES`] that holds a non-null value.
pub fn embedded_for_audience<'a>(audit: &'a Value, audience: Audience) -> Option<&'a Value> {
    EMBEDDED_SOURCES
        .iter()
        .filter(|source| source.audience == audience)
        .find_map(|source| lookup(audit, source.path).filter(|value| !value.is_null()))
}

/// Normalize both audiences' embedded answers from an audit document and
/// merge them into one map.
pub fn responses_from_audit_embedded(audit: &Value) -> Responses {
    let developer = embedded_for_audience(audit, Audience::Developer)
        .map(responses_from_embedded_value)
        .unwrap_or_default();
    let organization = embedded_for_audience(audit, Audience::Organization)
        .map(responses_from_embedded_value)
        .unwrap_or_default();

    merge_responses([Some(&developer), Some(&organization)])
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}
