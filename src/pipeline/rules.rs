//! Rule-based fallback matcher.
//!
//! A fixed, hand-authored table of case-insensitive pattern rules, each
//! carrying a nominal confidence that reflects its specificity: an exact
//! multi-word phrase outranks a single keyword. Matching never fails; when
//! nothing matches, the designated `unknown` label comes back at confidence
//! zero. This is the non-probabilistic safety net under the statistical
//! pipeline.

use regex::RegexBuilder;
use tracing::debug;

use crate::error::{HeraldError, Result};
use crate::pipeline::result::ClassificationResult;

/// Confidence tier for phrase rules that name an application or action
/// explicitly.
const PHRASE_CONFIDENCE: f64 = 0.9;
/// Confidence tier for looser single-keyword rules.
const KEYWORD_CONFIDENCE: f64 = 0.75;

/// One pattern rule.
#[derive(Debug)]
pub struct Rule {
    pattern: regex::Regex,
    label: String,
    confidence: f64,
}

impl Rule {
    /// Compile a case-insensitive rule.
    pub fn new(pattern: &str, label: &str, confidence: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(HeraldError::validation(format!(
                "rule confidence {confidence} outside [0, 1]"
            )));
        }
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| HeraldError::validation(format!("invalid rule pattern: {e}")))?;
        Ok(Rule {
            pattern,
            label: label.to_string(),
            confidence,
        })
    }
}

/// Deterministic pattern-to-label matcher.
#[derive(Debug)]
pub struct RuleMatcher {
    rules: Vec<Rule>,
}

impl RuleMatcher {
    /// Build a matcher from an explicit rule list.
    pub fn new(rules: Vec<Rule>) -> Self {
        RuleMatcher { rules }
    }

    /// Compile a matcher from `(pattern, label, confidence)` rows.
    pub fn from_table(table: &[(&str, &str, f64)]) -> Result<Self> {
        let rules = table
            .iter()
            .map(|(pattern, label, confidence)| Rule::new(pattern, label, *confidence))
            .collect::<Result<Vec<_>>>()?;
        Ok(RuleMatcher::new(rules))
    }

    /// The built-in table of command rules.
    pub fn with_default_rules() -> Result<Self> {
        Self::from_table(DEFAULT_RULES)
    }

    /// Match `text` against the rule table.
    ///
    /// Always produces a result. Among matching rules the highest confidence
    /// wins; ties resolve to the earliest rule in the table.
    pub fn match_text(&self, text: &str) -> ClassificationResult {
        let mut best: Option<&Rule> = None;
        for rule in &self.rules {
            if rule.pattern.is_match(text)
                && best.is_none_or(|current| rule.confidence > current.confidence)
            {
                best = Some(rule);
            }
        }

        match best {
            Some(rule) => {
                debug!(label = %rule.label, confidence = rule.confidence, "rule matched");
                ClassificationResult::from_rule(rule.label.clone(), rule.confidence)
            }
            None => ClassificationResult::unknown(),
        }
    }

    /// Number of rules in the table.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Hand-authored command rules: application launches, app shutdown, and
/// reminder/task phrases.
const DEFAULT_RULES: &[(&str, &str, f64)] = &[
    (r"open\s+(chrome|google chrome)", "open_chrome", PHRASE_CONFIDENCE),
    (r"open\s+(firefox|mozilla)", "open_firefox", PHRASE_CONFIDENCE),
    (r"open\s+(edge|microsoft edge)", "open_edge", PHRASE_CONFIDENCE),
    (r"open\s+(notepad|text editor)", "open_notepad", PHRASE_CONFIDENCE),
    (r"open\s+(calculator|calc)", "open_calculator", PHRASE_CONFIDENCE),
    (r"open\s+(file explorer|explorer)", "open_explorer", PHRASE_CONFIDENCE),
    (r"open\s+task manager", "open_taskmgr", PHRASE_CONFIDENCE),
    (r"open\s+(vscode|vs code|code editor)", "open_vscode", PHRASE_CONFIDENCE),
    (r"open\s+(spotify|music player)", "open_spotify", PHRASE_CONFIDENCE),
    (r"open\s+(outlook|email)", "open_outlook", PHRASE_CONFIDENCE),
    (r"close\s+(chrome|google chrome)", "close_chrome", PHRASE_CONFIDENCE),
    (r"close\s+(firefox|mozilla)", "close_firefox", PHRASE_CONFIDENCE),
    (r"remind me\b.*\bat\s+\d", "set_reminder_time", PHRASE_CONFIDENCE),
    (r"remind me\b", "set_reminder", KEYWORD_CONFIDENCE),
    (r"(add|create)\s+task", "add_task", PHRASE_CONFIDENCE),
    (r"(list|show)\s+(my\s+)?tasks", "list_tasks", PHRASE_CONFIDENCE),
    (r"\blaunch\b", "open_app", KEYWORD_CONFIDENCE),
    (r"\bopen\b", "open_app", KEYWORD_CONFIDENCE),
    (r"\bclose\b", "close_app", KEYWORD_CONFIDENCE),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::result::{ResultSource, UNKNOWN_LABEL};

    #[test]
    fn test_phrase_outranks_keyword() {
        let matcher = RuleMatcher::with_default_rules().unwrap();
        // "open chrome" matches both the phrase rule and the bare "open"
        // keyword rule; the phrase rule's confidence wins.
        let result = matcher.match_text("please open chrome for me");
        assert_eq!(result.label, "open_chrome");
        assert_eq!(result.confidence, PHRASE_CONFIDENCE);
        assert_eq!(result.source, ResultSource::Rule);
    }

    #[test]
    fn test_keyword_fallback() {
        let matcher = RuleMatcher::with_default_rules().unwrap();
        let result = matcher.match_text("open something obscure");
        assert_eq!(result.label, "open_app");
        assert_eq!(result.confidence, KEYWORD_CONFIDENCE);
    }

    #[test]
    fn test_case_insensitive() {
        let matcher = RuleMatcher::with_default_rules().unwrap();
        let result = matcher.match_text("OPEN CHROME");
        assert_eq!(result.label, "open_chrome");
    }

    #[test]
    fn test_no_match_is_unknown_zero() {
        let matcher = RuleMatcher::with_default_rules().unwrap();
        let result = matcher.match_text("xyzzyqux frobnicate");
        assert_eq!(result.label, UNKNOWN_LABEL);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.source, ResultSource::Rule);
    }

    #[test]
    fn test_reminder_specificity() {
        let matcher = RuleMatcher::with_default_rules().unwrap();
        assert_eq!(
            matcher.match_text("remind me to call mom at 3pm").label,
            "set_reminder_time"
        );
        assert_eq!(
            matcher.match_text("remind me about the meeting").label,
            "set_reminder"
        );
    }

    #[test]
    fn test_invalid_rule_rejected() {
        assert!(Rule::new(r"open\s+(", "broken", 0.9).is_err());
        assert!(Rule::new(r"open", "bad_confidence", 1.5).is_err());
    }
}
