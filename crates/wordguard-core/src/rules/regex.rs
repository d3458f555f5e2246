//! Regex-based matching.
//!
//! Each wordlist entry compiles to an escaped, case-insensitive pattern.
//! Invalid patterns are skipped with a warning so one bad entry cannot take
//! the whole rule down.

use std::collections::{HashMap, HashSet};

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{DetectionConfig, MatchType, Span};
use crate::rules::{char_byte_starts, to_char_offset, DetectionRule, RuleConfig, RuleKind};

pub struct RegexRule {
    config: RuleConfig,
    /// Compiled patterns grouped by category.
    patterns: HashMap<String, Vec<Regex>>,
}

impl RegexRule {
    pub fn new(config: RuleConfig) -> Self {
        Self {
            config,
            patterns: HashMap::new(),
        }
    }
}

impl DetectionRule for RegexRule {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Regex
    }

    fn priority(&self) -> i32 {
        self.config.priority
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn preprocess(&self, text: &str) -> String {
        if self.config.params.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        }
    }

    fn load(&mut self, words_by_category: &HashMap<String, Vec<String>>) {
        self.patterns.clear();

        for (category, words) in words_by_category {
            let mut compiled = Vec::new();
            for word in words {
                let word = word.trim();
                if word.is_empty() {
                    continue;
                }
                let built = RegexBuilder::new(&regex::escape(word))
                    .case_insensitive(!self.config.params.case_sensitive)
                    .build();
                match built {
                    Ok(re) => compiled.push(re),
                    Err(e) => {
                        warn!(
                            rule = %self.config.name,
                            category = %category,
                            word = %word,
                            "skipping pattern that failed to compile: {e}"
                        );
                    }
                }
            }
            if !compiled.is_empty() {
                self.patterns.insert(category.clone(), compiled);
            }
        }

        debug!(
            rule = %self.config.name,
            patterns = self.loaded_word_count(),
            "compiled regex patterns"
        );
    }

    fn detect(&self, text: &str, config: &DetectionConfig) -> Result<Vec<Span>> {
        if self.patterns.is_empty() {
            return Ok(Vec::new());
        }
        let processed = self.preprocess(text);
        if processed.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: Option<HashSet<&str>> = if config.categories.is_empty() {
            None
        } else {
            Some(config.categories.iter().map(String::as_str).collect())
        };

        // Sorted category order keeps emission deterministic when a word
        // belongs to several categories.
        let mut categories: Vec<&String> = self.patterns.keys().collect();
        categories.sort();

        let byte_starts = char_byte_starts(&processed);
        let mut spans = Vec::new();
        for category in categories {
            if let Some(wanted) = &wanted {
                if !wanted.contains(category.as_str()) {
                    continue;
                }
            }
            for pattern in &self.patterns[category] {
                for m in pattern.find_iter(&processed) {
                    let start = to_char_offset(&byte_starts, m.start());
                    let end = to_char_offset(&byte_starts, m.end());
                    let mut span = Span::new(
                        m.as_str().to_string(),
                        start,
                        end,
                        category.clone(),
                        self.config.name.clone(),
                        0.95,
                        MatchType::Regex,
                    );
                    if config.return_suggestions {
                        span = span.with_suggestion("***");
                    }
                    spans.push(span);
                }
            }
        }

        Ok(spans)
    }

    fn loaded_word_count(&self) -> usize {
        self.patterns.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_rule(words: &[(&str, &[&str])]) -> RegexRule {
        let mut rule = RegexRule::new(RuleConfig::regex("regex"));
        let map: HashMap<String, Vec<String>> = words
            .iter()
            .map(|(cat, ws)| {
                (
                    cat.to_string(),
                    ws.iter().map(|w| w.to_string()).collect(),
                )
            })
            .collect();
        rule.load(&map);
        rule
    }

    #[test]
    fn unloaded_rule_is_empty() {
        let rule = RegexRule::new(RuleConfig::regex("regex"));
        let spans = rule.detect("text", &DetectionConfig::default()).unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn finds_word_with_regex_confidence() {
        let rule = loaded_rule(&[("test", &["badword"])]);
        let spans = rule
            .detect("a badword here", &DetectionConfig::default())
            .unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].confidence, 0.95);
        assert_eq!(spans[0].match_type, MatchType::Regex);
        assert_eq!(spans[0].start, 2);
        assert_eq!(spans[0].end, 9);
    }

    #[test]
    fn metacharacters_in_words_are_escaped() {
        let rule = loaded_rule(&[("test", &["a.b"])]);
        // "a.b" must match literally, not as "a<any>b".
        let spans = rule.detect("axb a.b", &DetectionConfig::default()).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].word, "a.b");
    }

    #[test]
    fn case_insensitive_matching() {
        let rule = loaded_rule(&[("test", &["BadWord"])]);
        let spans = rule.detect("BADWORD", &DetectionConfig::default()).unwrap();
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn category_filter_restricts_output() {
        let rule = loaded_rule(&[("a", &["alpha"]), ("b", &["beta"])]);
        let config = DetectionConfig::default().with_categories(vec!["b".to_string()]);
        let spans = rule.detect("alpha beta", &config).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].category, "b");
    }

    #[test]
    fn cjk_offsets_are_codepoints() {
        let rule = loaded_rule(&[("politics", &["敏感"])]);
        let spans = rule
            .detect("这是敏感内容", &DetectionConfig::default())
            .unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start, 2);
        assert_eq!(spans[0].end, 4);
    }

    #[test]
    fn shared_word_emits_categories_in_stable_order() {
        // Each instance hashes its category map differently; emission order
        // must not depend on it.
        for _ in 0..32 {
            let rule = loaded_rule(&[("bbb", &["shared"]), ("aaa", &["shared"])]);
            let spans = rule.detect("shared", &DetectionConfig::default()).unwrap();
            let cats: Vec<&str> = spans.iter().map(|s| s.category.as_str()).collect();
            assert_eq!(cats, vec!["aaa", "bbb"]);
        }
    }

    #[test]
    fn repeated_occurrences_all_reported() {
        let rule = loaded_rule(&[("test", &["spam"])]);
        let spans = rule
            .detect("spam and spam", &DetectionConfig::default())
            .unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].start, 0);
        assert_eq!(spans[1].start, 9);
    }
}
