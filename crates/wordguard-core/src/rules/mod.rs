//! Detection rule strategies.
//!
//! Three strategies scan normalized text for loaded words: an exact
//! multi-pattern automaton, a dictionary-assisted tokenized matcher, and an
//! escaped-literal regex matcher. All three implement [`DetectionRule`] and
//! are constructed through [`build_rule`], which dispatches on the closed
//! [`RuleKind`] enum.

mod exact;
mod regex;
mod tokenized;

pub use exact::ExactAutomatonRule;
pub use regex::RegexRule;
pub use tokenized::TokenizedDictionaryRule;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{DetectionConfig, DetectionMode, Span};

/// The closed set of rule strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Aho-Corasick multi-pattern literal matching.
    Exact,
    /// Dictionary-assisted tokenized matching.
    Tokenized,
    /// Escaped-literal regular-expression matching.
    Regex,
}

impl RuleKind {
    /// Returns a human-readable name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Exact => "Exact",
            RuleKind::Tokenized => "Tokenized",
            RuleKind::Regex => "Regex",
        }
    }
}

/// Strategy-specific tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleParams {
    /// Case-sensitive matching (tokenized and regex strategies).
    pub case_sensitive: bool,
    /// Enforce boundary checks on exact matches regardless of request
    /// strictness.
    pub check_boundaries: bool,
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            check_boundaries: false,
        }
    }
}

/// Configuration for one rule instance.
///
/// Immutable once a rule is constructed; changing parameters means building
/// a new rule through [`build_rule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Rule name; keys the per-rule span map and engine weights.
    pub name: String,
    /// Strategy to instantiate.
    pub kind: RuleKind,
    /// Whether the rule participates in detection.
    pub enabled: bool,
    /// Relative priority (higher runs earlier; informational).
    pub priority: i32,
    /// Strategy parameters.
    pub params: RuleParams,
}

impl RuleConfig {
    /// Creates a config for the given strategy with default parameters.
    pub fn new(name: impl Into<String>, kind: RuleKind, priority: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            priority,
            params: RuleParams::default(),
        }
    }

    /// Exact-automaton rule config.
    pub fn exact(name: impl Into<String>) -> Self {
        Self::new(name, RuleKind::Exact, 100)
    }

    /// Tokenized-dictionary rule config.
    pub fn tokenized(name: impl Into<String>) -> Self {
        Self::new(name, RuleKind::Tokenized, 90)
    }

    /// Regex rule config.
    pub fn regex(name: impl Into<String>) -> Self {
        Self::new(name, RuleKind::Regex, 80)
    }

    /// Disables the rule.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Sets the strategy parameters.
    pub fn with_params(mut self, params: RuleParams) -> Self {
        self.params = params;
        self
    }
}

/// A detection rule strategy.
///
/// `detect` is a pure read of the state established by the last `load`:
/// rules keep no per-call state, so concurrent `detect` calls against the
/// same loaded rule are safe. Calling `detect` before `load` yields an
/// empty result rather than an error.
pub trait DetectionRule: Send + Sync {
    /// Rule name (keys the per-rule span map).
    fn name(&self) -> &str;

    /// The strategy this rule implements.
    fn kind(&self) -> RuleKind;

    /// Relative priority.
    fn priority(&self) -> i32;

    /// Whether the rule participates in detection.
    fn enabled(&self) -> bool;

    /// The strategy's private text transform applied before matching.
    fn preprocess(&self, text: &str) -> String;

    /// Compiles the given words into the rule's search structure, replacing
    /// any previously loaded state.
    fn load(&mut self, words_by_category: &HashMap<String, Vec<String>>);

    /// Scans text and returns all spans found by this strategy.
    fn detect(&self, text: &str, config: &DetectionConfig) -> Result<Vec<Span>>;

    /// Number of words currently compiled into the rule.
    fn loaded_word_count(&self) -> usize;

    /// Whether this rule participates in the given detection mode. All
    /// pattern rules run in both modes.
    fn applies_to(&self, mode: DetectionMode) -> bool {
        matches!(mode, DetectionMode::Rule | DetectionMode::Hybrid)
    }
}

/// Constructs a rule instance for the configured strategy.
pub fn build_rule(config: RuleConfig) -> Box<dyn DetectionRule> {
    match config.kind {
        RuleKind::Exact => Box::new(ExactAutomatonRule::new(config)),
        RuleKind::Tokenized => Box::new(TokenizedDictionaryRule::new(config)),
        RuleKind::Regex => Box::new(RegexRule::new(config)),
    }
}

/// The default rule roster: all three strategies, exact first.
pub fn default_rule_configs() -> Vec<RuleConfig> {
    vec![
        RuleConfig::exact("exact"),
        RuleConfig::tokenized("tokenized"),
        RuleConfig::regex("regex"),
    ]
}

/// Maps the byte offsets of a match to codepoint offsets.
///
/// `byte_starts` must be the byte index of every char in the scanned text,
/// in order (see [`char_byte_starts`]).
pub(crate) fn to_char_offset(byte_starts: &[usize], byte: usize) -> usize {
    byte_starts.partition_point(|&b| b < byte)
}

/// Byte index of every char in `text`, used to convert match offsets.
pub(crate) fn char_byte_starts(text: &str) -> Vec<usize> {
    text.char_indices().map(|(b, _)| b).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_config_constructors() {
        let exact = RuleConfig::exact("e");
        assert_eq!(exact.kind, RuleKind::Exact);
        assert_eq!(exact.priority, 100);
        assert!(exact.enabled);

        let disabled = RuleConfig::regex("r").disabled();
        assert!(!disabled.enabled);
    }

    #[test]
    fn build_rule_dispatches_on_kind() {
        let rule = build_rule(RuleConfig::exact("e"));
        assert_eq!(rule.kind(), RuleKind::Exact);
        let rule = build_rule(RuleConfig::tokenized("t"));
        assert_eq!(rule.kind(), RuleKind::Tokenized);
        let rule = build_rule(RuleConfig::regex("r"));
        assert_eq!(rule.kind(), RuleKind::Regex);
    }

    #[test]
    fn default_roster_names() {
        let names: Vec<String> = default_rule_configs().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["exact", "tokenized", "regex"]);
    }

    #[test]
    fn char_offset_conversion_handles_multibyte() {
        let text = "a敏b感c"; // bytes: a=0, 敏=1..4, b=4, 感=5..8, c=8
        let starts = char_byte_starts(text);
        assert_eq!(to_char_offset(&starts, 0), 0);
        assert_eq!(to_char_offset(&starts, 1), 1);
        assert_eq!(to_char_offset(&starts, 4), 2);
        assert_eq!(to_char_offset(&starts, 5), 3);
        assert_eq!(to_char_offset(&starts, 8), 4);
        assert_eq!(to_char_offset(&starts, text.len()), 5);
    }
}
