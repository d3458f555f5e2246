//! Exact multi-pattern matching over an Aho-Corasick automaton.

use std::collections::{HashMap, HashSet};

use aho_corasick::AhoCorasick;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{DetectionConfig, MatchType, Span, Strictness};
use crate::normalize::{clean_for_matching, is_cjk, normalize};
use crate::rules::{char_byte_starts, to_char_offset, DetectionRule, RuleConfig, RuleKind};

/// Pattern metadata carried alongside the automaton, indexed by pattern id.
#[derive(Debug, Clone)]
struct PatternMeta {
    /// The word as it appears in the wordlist.
    word: String,
    /// Category the word belongs to.
    category: String,
}

/// Literal multi-pattern rule.
///
/// One combined automaton holds the normalized, noise-stripped form of every
/// enabled category's words; each pattern carries its original word and
/// category. A single scan of the cleaned text therefore covers all
/// categories, with the per-request category filter applied per match.
pub struct ExactAutomatonRule {
    config: RuleConfig,
    automaton: Option<AhoCorasick>,
    patterns: Vec<PatternMeta>,
}

impl ExactAutomatonRule {
    /// Creates an unloaded rule.
    pub fn new(config: RuleConfig) -> Self {
        Self {
            config,
            automaton: None,
            patterns: Vec::new(),
        }
    }

    /// Rejects a match whose neighboring character would make it a fragment
    /// of a longer word: alphanumeric or CJK on either side.
    fn is_boundary_blocked(chars: &[char], start: usize, end: usize) -> bool {
        if start > 0 {
            let prev = chars[start - 1];
            if prev.is_alphanumeric() || is_cjk(prev) {
                return true;
            }
        }
        if end < chars.len() {
            let next = chars[end];
            if next.is_alphanumeric() || is_cjk(next) {
                return true;
            }
        }
        false
    }
}

impl DetectionRule for ExactAutomatonRule {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Exact
    }

    fn priority(&self) -> i32 {
        self.config.priority
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn preprocess(&self, text: &str) -> String {
        clean_for_matching(&normalize(text))
    }

    fn load(&mut self, words_by_category: &HashMap<String, Vec<String>>) {
        let mut pattern_strings = Vec::new();
        let mut patterns = Vec::new();

        // Deterministic pattern order across reloads.
        let mut categories: Vec<&String> = words_by_category.keys().collect();
        categories.sort();

        for category in categories {
            for word in &words_by_category[category] {
                let processed = self.preprocess(word.trim());
                if processed.is_empty() {
                    continue;
                }
                pattern_strings.push(processed);
                patterns.push(PatternMeta {
                    word: word.trim().to_string(),
                    category: category.clone(),
                });
            }
        }

        if pattern_strings.is_empty() {
            self.automaton = None;
            self.patterns = Vec::new();
            return;
        }

        match AhoCorasick::new(&pattern_strings) {
            Ok(automaton) => {
                info!(
                    rule = %self.config.name,
                    patterns = patterns.len(),
                    "compiled exact-match automaton"
                );
                self.automaton = Some(automaton);
                self.patterns = patterns;
            }
            Err(e) => {
                warn!(rule = %self.config.name, "failed to build automaton: {e}");
                self.automaton = None;
                self.patterns = Vec::new();
            }
        }
    }

    fn detect(&self, text: &str, config: &DetectionConfig) -> Result<Vec<Span>> {
        let Some(automaton) = &self.automaton else {
            return Ok(Vec::new());
        };
        let processed = self.preprocess(text);
        if processed.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: Option<HashSet<&str>> = if config.categories.is_empty() {
            None
        } else {
            Some(config.categories.iter().map(String::as_str).collect())
        };

        let check_boundaries =
            self.config.params.check_boundaries || config.strictness == Strictness::Strict;
        let byte_starts = char_byte_starts(&processed);
        let chars: Vec<char> = processed.chars().collect();

        let mut spans = Vec::new();
        for m in automaton.find_overlapping_iter(&processed) {
            let meta = &self.patterns[m.pattern().as_usize()];
            if let Some(wanted) = &wanted {
                if !wanted.contains(meta.category.as_str()) {
                    continue;
                }
            }

            let start = to_char_offset(&byte_starts, m.start());
            let end = to_char_offset(&byte_starts, m.end());
            if check_boundaries && Self::is_boundary_blocked(&chars, start, end) {
                continue;
            }

            let mut span = Span::new(
                meta.word.clone(),
                start,
                end,
                meta.category.clone(),
                self.config.name.clone(),
                1.0,
                MatchType::Exact,
            );
            if config.return_suggestions {
                span = span.with_suggestion("***");
            }
            spans.push(span);
        }

        Ok(spans)
    }

    fn loaded_word_count(&self) -> usize {
        self.patterns.len()
    }
}
