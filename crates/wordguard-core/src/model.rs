//! Shared data model for detection requests, spans, and responses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How a span was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Literal match against a loaded word.
    Exact,
    /// Match produced by a compiled regular expression.
    Regex,
}

/// Which detection family produced a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Rule-based pattern matching.
    #[default]
    Rule,
}

/// Coarse ordinal severity of an overall detection verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// No or negligible sensitive content.
    #[default]
    Low,
    /// Some sensitive content, moderate confidence.
    Medium,
    /// Confident sensitive content.
    High,
    /// High-confidence or high-volume sensitive content.
    Critical,
}

impl RiskLevel {
    /// Returns a human-readable name for this risk level.
    pub fn name(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }
}

/// A half-open `[start, end)` interval in text.
///
/// Offsets are codepoint indices into the matching-normalized text that the
/// reporting rule actually scanned, not byte offsets and not offsets into the
/// original input (normalization may strip characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Codepoint offset of the first matched character.
    pub start: usize,
    /// Codepoint offset one past the last matched character.
    pub end: usize,
}

impl Position {
    /// Creates a new position.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A single hit reported by one detection rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// The word (as loaded) that matched.
    pub word: String,
    /// Codepoint offset of the match start in the rule's scanned text.
    pub start: usize,
    /// Codepoint offset one past the match end (exclusive).
    pub end: usize,
    /// Category the matched word belongs to.
    pub category: String,
    /// Name of the rule that reported this span.
    pub source_rule: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Match mechanism.
    pub match_type: MatchType,
    /// Detection family.
    pub detection_method: DetectionMethod,
    /// Optional redaction suggestion.
    pub suggestion: Option<String>,
}

impl Span {
    /// Creates a new span with confidence clamped to `[0, 1]`.
    pub fn new(
        word: impl Into<String>,
        start: usize,
        end: usize,
        category: impl Into<String>,
        source_rule: impl Into<String>,
        confidence: f64,
        match_type: MatchType,
    ) -> Self {
        Self {
            word: word.into(),
            start,
            end,
            category: category.into(),
            source_rule: source_rule.into(),
            confidence: confidence.clamp(0.0, 1.0),
            match_type,
            detection_method: DetectionMethod::Rule,
            suggestion: None,
        }
    }

    /// Sets the redaction suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Returns true if this span overlaps `other`.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Which rule families a detection request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Pattern-rule detection only.
    #[default]
    Rule,
    /// Rules plus any future non-rule strategies. Currently equivalent to
    /// `Rule`.
    Hybrid,
}

/// Matching strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// No word-boundary enforcement. The right default for CJK text, which
    /// has no delimiters between words.
    #[default]
    Standard,
    /// Reject exact matches whose neighboring character is alphanumeric or
    /// CJK. Avoids short words matching inside longer unrelated ones.
    Strict,
}

/// Per-request detection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Categories to check. Empty means all enabled categories.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Which rule families to run.
    #[serde(default)]
    pub mode: DetectionMode,
    /// Matching strictness.
    #[serde(default)]
    pub strictness: Strictness,
    /// Whether results should carry positions.
    #[serde(default)]
    pub return_positions: bool,
    /// Whether results should carry redaction suggestions.
    #[serde(default)]
    pub return_suggestions: bool,
    /// Per-request override of the arbitration confidence threshold.
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
}

impl DetectionConfig {
    /// Creates a config with defaults (all categories, rule mode, standard
    /// strictness, no positions or suggestions).
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts detection to the given categories.
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    /// Sets the strictness level.
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Requests positions in the results.
    pub fn with_positions(mut self) -> Self {
        self.return_positions = true;
        self
    }

    /// Requests redaction suggestions in the results.
    pub fn with_suggestions(mut self) -> Self {
        self.return_suggestions = true;
        self
    }

    /// Overrides the arbitration confidence threshold for this request.
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold.clamp(0.0, 1.0));
        self
    }
}

/// A detection request: the text to classify plus its configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRequest {
    /// Text to classify.
    pub text: String,
    /// Detection configuration.
    #[serde(default)]
    pub config: DetectionConfig,
}

impl DetectionRequest {
    /// Creates a request with default configuration.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            config: DetectionConfig::default(),
        }
    }

    /// Creates a request with the given configuration.
    pub fn with_config(text: impl Into<String>, config: DetectionConfig) -> Self {
        Self {
            text: text.into(),
            config,
        }
    }
}

/// Externally-visible projection of one arbitrated span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResultItem {
    /// The word that matched.
    pub matched_word: String,
    /// Category of the match.
    pub category: String,
    /// Match mechanism.
    pub match_type: MatchType,
    /// Final arbitrated confidence in `[0, 1]`.
    pub confidence: f64,
    /// Match positions; empty unless positions were requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positions: Vec<Position>,
    /// Detection family.
    pub detection_method: DetectionMethod,
    /// Redaction suggestion, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Aggregate statistics over the final result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    /// Number of final results.
    pub total_matches: usize,
    /// Distinct categories found, in result order.
    pub categories_found: Vec<String>,
    /// Category of the highest-ranked result, if any.
    pub highest_risk_category: Option<String>,
}

/// Full response for one detection request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResponse {
    /// True when at least one result survived arbitration.
    pub is_sensitive: bool,
    /// Overall risk verdict.
    pub risk_level: RiskLevel,
    /// Highest final confidence across results (0.0 when none).
    pub overall_score: f64,
    /// End-to-end detection time in milliseconds.
    pub detection_time_ms: u64,
    /// Arbitrated, ordered results.
    pub results: Vec<DetectionResultItem>,
    /// Aggregate summary.
    pub summary: DetectionSummary,
}

/// Arbitration tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationConfig {
    /// Whether overlapping hits are merged with the greedy longest-match
    /// sweep. Default true.
    pub merge_overlaps: bool,
    /// Hits below this confidence are dropped. Default 0.5.
    pub confidence_threshold: f64,
    /// Confidence added per extra corroborating rule. Default 0.1.
    pub confidence_boost_per_corroboration: f64,
    /// Normalized per-category weights in `[0, 1]`. Missing categories
    /// weigh 1.0.
    pub category_weights: HashMap<String, f64>,
    /// Per-rule confidence pre-multipliers. Missing rules weigh 1.0.
    pub engine_weights: HashMap<String, f64>,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        // The exact rule is a literal match and stays authoritative; the
        // tokenized and regex rules are discounted slightly.
        let engine_weights = HashMap::from([
            ("exact".to_string(), 1.0),
            ("tokenized".to_string(), 0.9),
            ("regex".to_string(), 0.85),
        ]);
        Self {
            merge_overlaps: true,
            confidence_threshold: 0.5,
            confidence_boost_per_corroboration: 0.1,
            category_weights: HashMap::new(),
            engine_weights,
        }
    }
}

impl ArbitrationConfig {
    /// Returns the engine weight for a rule name (1.0 when unspecified).
    pub fn engine_weight(&self, rule: &str) -> f64 {
        self.engine_weights.get(rule).copied().unwrap_or(1.0)
    }

    /// Returns the normalized weight for a category (1.0 when unspecified).
    pub fn category_weight(&self, category: &str) -> f64 {
        self.category_weights.get(category).copied().unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_clamps_confidence() {
        let span = Span::new("w", 0, 1, "cat", "rule", 1.5, MatchType::Exact);
        assert_eq!(span.confidence, 1.0);

        let span = Span::new("w", 0, 1, "cat", "rule", -0.5, MatchType::Exact);
        assert_eq!(span.confidence, 0.0);
    }

    #[test]
    fn span_overlap() {
        let a = Span::new("ab", 0, 2, "c", "r", 1.0, MatchType::Exact);
        let b = Span::new("bc", 1, 3, "c", "r", 1.0, MatchType::Exact);
        let c = Span::new("cd", 2, 4, "c", "r", 1.0, MatchType::Exact);

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&c));
        assert!(!a.overlaps(&c)); // Half-open intervals touch without overlap
    }

    #[test]
    fn risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn detection_config_builders() {
        let config = DetectionConfig::new()
            .with_categories(vec!["politics".to_string()])
            .with_strictness(Strictness::Strict)
            .with_positions()
            .with_suggestions()
            .with_confidence_threshold(0.8);

        assert_eq!(config.categories, vec!["politics"]);
        assert_eq!(config.strictness, Strictness::Strict);
        assert!(config.return_positions);
        assert!(config.return_suggestions);
        assert_eq!(config.confidence_threshold, Some(0.8));
    }

    #[test]
    fn confidence_threshold_override_clamps() {
        let config = DetectionConfig::new().with_confidence_threshold(2.0);
        assert_eq!(config.confidence_threshold, Some(1.0));
    }

    #[test]
    fn arbitration_defaults() {
        let config = ArbitrationConfig::default();
        assert!(config.merge_overlaps);
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.confidence_boost_per_corroboration, 0.1);
        assert_eq!(config.engine_weight("exact"), 1.0);
        assert_eq!(config.engine_weight("tokenized"), 0.9);
        assert_eq!(config.engine_weight("regex"), 0.85);
        assert_eq!(config.engine_weight("unknown"), 1.0);
        assert_eq!(config.category_weight("anything"), 1.0);
    }

    #[test]
    fn serialization_roundtrip() {
        let span = Span::new("word", 3, 7, "politics", "exact", 0.9, MatchType::Exact)
            .with_suggestion("***");
        let json = serde_json::to_string(&span).unwrap();
        let back: Span = serde_json::from_str(&json).unwrap();
        assert_eq!(span, back);
    }

    #[test]
    fn risk_level_serde_names() {
        assert_eq!(serde_json::to_string(&RiskLevel::Critical).unwrap(), "\"critical\"");
        assert_eq!(serde_json::to_string(&RiskLevel::Low).unwrap(), "\"low\"");
    }
}
