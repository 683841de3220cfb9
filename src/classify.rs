//! Keyword-driven action classification for task records.
//!
//! An ordered table of [`ActionRule`]s is evaluated against the lowercased
//! body text. Each rule whose keyword set matches contributes its action;
//! `approval_needed` is the disjunction of the matched rules' approval flags.
//! The vocabulary lives in data (defaults here, overrides from
//! `[[classifier.rules]]` in the config file).

use serde::Deserialize;
use tracing::debug;

use crate::models::FlaggedAction;

/// A single `(keyword-set, classification)` rule.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ActionRule {
    /// Case-insensitive substrings; any one match triggers the rule.
    pub keywords: Vec<String>,
    /// Action suggested when the rule matches.
    pub action: FlaggedAction,
    /// Whether the action must be approved by an operator.
    #[serde(default)]
    pub requires_approval: bool,
}

impl ActionRule {
    fn new(keywords: &[&str], action: FlaggedAction, requires_approval: bool) -> Self {
        Self {
            keywords: keywords.iter().map(|k| (*k).to_owned()).collect(),
            action,
            requires_approval,
        }
    }

    fn matches(&self, lowered: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && lowered.contains(&keyword.to_lowercase()))
    }
}

/// Result of classifying one body of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// True when any matched rule requires approval.
    pub approval_needed: bool,
    /// Matched actions in rule order, without duplicates.
    pub actions: Vec<FlaggedAction>,
}

/// Deterministic evaluator over an ordered rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionClassifier {
    rules: Vec<ActionRule>,
}

impl Default for ActionClassifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl ActionClassifier {
    /// Build a classifier from an explicit rule table.
    #[must_use]
    pub fn new(rules: Vec<ActionRule>) -> Self {
        Self { rules }
    }

    /// The active rule table.
    #[must_use]
    pub fn rules(&self) -> &[ActionRule] {
        &self.rules
    }

    /// Classify `text`, evaluating every rule in order.
    #[must_use]
    pub fn classify(&self, text: &str) -> Classification {
        let lowered = text.to_lowercase();
        let mut result = Classification::default();

        for rule in &self.rules {
            if !rule.matches(&lowered) {
                continue;
            }
            result.approval_needed |= rule.requires_approval;
            if !result.actions.contains(&rule.action) {
                result.actions.push(rule.action);
            }
        }

        debug!(
            approval_needed = result.approval_needed,
            actions = ?result.actions,
            "classified body text"
        );
        result
    }
}

/// Built-in vocabulary.
#[must_use]
pub fn default_rules() -> Vec<ActionRule> {
    vec![
        ActionRule::new(
            &["reply", "respond", "send", "forward"],
            FlaggedAction::SendEmail,
            true,
        ),
        ActionRule::new(&["schedule", "meeting"], FlaggedAction::ScheduleMeeting, false),
        ActionRule::new(&["newsletter", "digest"], FlaggedAction::Archive, false),
    ]
}
