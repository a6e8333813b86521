use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Canonical questionnaire answers: trimmed question text → selected options.
///
/// Invariants upheld by every mutating method:
/// - no key is empty after trimming,
/// - no option list is empty,
/// - options are unique within a question and keep first-seen order.
///
/// Keys iterate in lexical order, so serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Vec<String>>", into = "BTreeMap<String, Vec<String>>")]
pub struct Responses {
    answers: BTreeMap<String, Vec<String>>,
}

impl Responses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add options under `question`, appending to any existing selection.
    ///
    /// The question is trimmed; empty questions and empty option strings are
    /// ignored, and nothing is stored if no option survives.
    pub fn add_options<I, S>(&mut self, question: &str, options: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let question = question.trim();
        if question.is_empty() {
            return;
        }

        let mut fresh: Vec<String> = options
            .into_iter()
            .map(Into::into)
            .filter(|option| !option.is_empty())
            .collect();
        if fresh.is_empty() {
            return;
        }

        let selected = self.answers.entry(question.to_string()).or_default();
        for option in fresh.drain(..) {
            if !selected.contains(&option) {
                selected.push(option);
            }
        }
    }

    /// Replace the selection for `question` with the deduplicated `options`.
    /// Same filtering as [`Responses::add_options`]; if nothing survives the
    /// existing selection is left as is.
    pub fn replace_options<I, S>(&mut self, question: &str, options: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fresh = Responses::new();
        fresh.add_options(question, options);
        self.answers.extend(fresh.answers);
    }

    pub fn add_option(&mut self, question: &str, option: impl Into<String>) {
        self.add_options(question, std::iter::once(option.into()));
    }

    /// Union every question of `other` into `self`.
    pub fn absorb(&mut self, other: &Responses) {
        for (question, options) in &other.answers {
            self.add_options(question, options.iter().cloned());
        }
    }

    pub fn get(&self, question: &str) -> Option<&[String]> {
        self.answers.get(question.trim()).map(Vec::as_slice)
    }

    pub fn contains(&self, question: &str, option: &str) -> bool {
        self.get(question)
            .map(|options| options.iter().any(|o| o == option))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.answers
            .iter()
            .map(|(question, options)| (question.as_str(), options.as_slice()))
    }

    pub fn questions(&self) -> impl Iterator<Item = &str> {
        self.answers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Total number of (question, option) selections.
    pub fn selection_count(&self) -> usize {
        self.answers.values().map(Vec::len).sum()
    }

    /// Same questions mapped to the same option *sets*, ignoring option order.
    pub fn same_selections(&self, other: &Responses) -> bool {
        self.len() == other.len()
            && self.answers.iter().all(|(question, options)| {
                other.answers.get(question).is_some_and(|theirs| {
                    options.len() == theirs.len() && options.iter().all(|o| theirs.contains(o))
                })
            })
    }

    /// Stable SHA-256 fingerprint of the selections, independent of option order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (question, options) in &self.answers {
            let mut sorted: Vec<&str> = options.iter().map(String::as_str).collect();
            sorted.sort_unstable();
            hasher.update(question.as_bytes());
            hasher.update([0u8]);
            for option in sorted {
                hasher.update(option.as_bytes());
                hasher.update([0x1fu8]);
            }
            hasher.update([0x1eu8]);
        }
        hex::encode(hasher.finalize())
    }
}

impl From<BTreeMap<String, Vec<String>>> for Responses {
    fn from(raw: BTreeMap<String, Vec<String>>) -> Self {
        let mut responses = Responses::new();
        for (question, options) in raw {
            responses.add_options(&question, options);
        }
        responses
    }
}

impl From<Responses> for BTreeMap<String, Vec<String>> {
    fn from(responses: Responses) -> Self {
        responses.answers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_options_trims_and_dedupes() {
        let mut responses = Responses::new();
        responses.add_options("  Uses a proxy?  ", ["yes", "yes", "no"]);
        responses.add_option("Uses a proxy?", "yes");

        assert_eq!(responses.len(), 1);
        assert_eq!(
            responses.get("Uses a proxy?").unwrap(),
            &["yes".to_string(), "no".to_string()]
        );
    }

    #[test]
    fn test_add_options_never_stores_empty() {
        let mut responses = Responses::new();
        responses.add_options("   ", ["yes"]);
        responses.add_options("Q", Vec::<String>::new());
        responses.add_options("Q2", [""]);

        assert!(responses.is_empty());
    }

    #[test]
    fn test_deserialize_repairs_invariants() {
        let responses: Responses = serde_json::from_value(json!({
            " Q1 ": ["a", "a", "b"],
            "": ["x"],
            "Q2": []
        }))
        .unwrap();

        assert_eq!(responses.len(), 1);
        assert_eq!(serde_json::to_value(&responses).unwrap(), json!({"Q1": ["a", "b"]}));
    }

    #[test]
    fn test_fingerprint_ignores_option_order() {
        let mut a = Responses::new();
        a.add_options("Q", ["x", "y"]);
        let mut b = Responses::new();
        b.add_options("Q", ["y", "x"]);
        let mut c = Responses::new();
        c.add_options("Q", ["x"]);

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        assert!(a.same_selections(&b));
        assert!(!a.same_selections(&c));
    }

    #[test]
    fn test_selection_count() {
        let mut responses = Responses::new();
        responses.add_options("Q1", ["a", "b"]);
        responses.add_options("Q2", ["c"]);
        assert_eq!(responses.selection_count(), 3);
        assert!(responses.contains("Q1", "b"));
        assert!(!responses.contains("Q2", "b"));
    }
}
