//! Dictionary-aware tokenized matching.
//!
//! Segments the text with a longest-match segmenter seeded from the loaded
//! word sets, then flags tokens that equal a dictionary word. This catches
//! words the exact rule would also find, and corroboration between the two
//! raises confidence during arbitration.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::Result;
use crate::model::{DetectionConfig, MatchType, Span};
use crate::normalize::is_cjk;
use crate::rules::{DetectionRule, RuleConfig, RuleKind};

pub struct TokenizedDictionaryRule {
    config: RuleConfig,
    /// Per-category word sets, keyed by category name.
    word_sets: HashMap<String, HashSet<String>>,
    /// Union of all loaded words, used to seed the segmenter.
    dictionary: HashSet<String>,
    /// Longest dictionary word in chars; bounds the segmenter lookahead.
    max_word_chars: usize,
}

impl TokenizedDictionaryRule {
    pub fn new(config: RuleConfig) -> Self {
        Self {
            config,
            word_sets: HashMap::new(),
            dictionary: HashSet::new(),
            max_word_chars: 0,
        }
    }

    /// Splits `chars` into tokens. At each position the longest dictionary
    /// word wins; otherwise a run of non-CJK alphanumerics forms one token;
    /// otherwise the single character stands alone.
    fn segment(&self, chars: &[char]) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let limit = self.max_word_chars.min(chars.len() - i);
            let mut matched = 0;
            for len in (1..=limit).rev() {
                let candidate: String = chars[i..i + len].iter().collect();
                if self.dictionary.contains(&candidate) {
                    tokens.push(candidate);
                    matched = len;
                    break;
                }
            }
            if matched > 0 {
                i += matched;
                continue;
            }

            let c = chars[i];
            if c.is_alphanumeric() && !is_cjk(c) {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_alphanumeric() && !is_cjk(chars[j]) {
                    j += 1;
                }
                tokens.push(chars[i..j].iter().collect());
                i = j;
            } else {
                tokens.push(c.to_string());
                i += 1;
            }
        }
        tokens
    }

    /// Locates `token` at or after `cursor` in the char stream. Falls back to
    /// an unanchored search from the start, so a token repeated before the
    /// cursor can resolve to an earlier occurrence.
    fn locate(chars: &[char], token: &[char], cursor: usize) -> Option<usize> {
        let find_from = |from: usize| {
            (from..chars.len().saturating_sub(token.len() - 1))
                .find(|&i| chars[i..i + token.len()] == *token)
        };
        if token.is_empty() || token.len() > chars.len() {
            return None;
        }
        find_from(cursor).or_else(|| find_from(0))
    }
}

impl DetectionRule for TokenizedDictionaryRule {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Tokenized
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
        self.word_sets.clear();
        self.dictionary.clear();
        self.max_word_chars = 0;

        for (category, words) in words_by_category {
            let set: HashSet<String> = words
                .iter()
                .map(|w| self.preprocess(w.trim()))
                .filter(|w| !w.is_empty())
                .collect();
            for word in &set {
                self.max_word_chars = self.max_word_chars.max(word.chars().count());
                self.dictionary.insert(word.clone());
            }
            if !set.is_empty() {
                self.word_sets.insert(category.clone(), set);
            }
        }

        debug!(
            rule = %self.config.name,
            words = self.dictionary.len(),
            "loaded tokenizer dictionary"
        );
    }

    fn detect(&self, text: &str, config: &DetectionConfig) -> Result<Vec<Span>> {
        if self.dictionary.is_empty() {
            return Ok(Vec::new());
        }
        let processed = self.preprocess(text);
        let chars: Vec<char> = processed.chars().collect();
        if chars.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: Option<HashSet<&str>> = if config.categories.is_empty() {
            None
        } else {
            Some(config.categories.iter().map(String::as_str).collect())
        };

        // Sorted category order keeps emission deterministic when a word
        // belongs to several categories.
        let mut categories: Vec<&String> = self.word_sets.keys().collect();
        categories.sort();

        let mut spans = Vec::new();
        let mut cursor = 0usize;
        for token in self.segment(&chars) {
            let token_chars: Vec<char> = token.chars().collect();
            if token.trim().is_empty() {
                cursor += token_chars.len();
                continue;
            }

            for category in &categories {
                let category = *category;
                if let Some(wanted) = &wanted {
                    if !wanted.contains(category.as_str()) {
                        continue;
                    }
                }
                if !self.word_sets[category].contains(&token) {
                    continue;
                }
                if let Some(start) = Self::locate(&chars, &token_chars, cursor) {
                    let mut span = Span::new(
                        token.clone(),
                        start,
                        start + token_chars.len(),
                        category.clone(),
                        self.config.name.clone(),
                        0.9,
                        MatchType::Exact,
                    );
                    if config.return_suggestions {
                        span = span.with_suggestion("***");
                    }
                    spans.push(span);
                }
            }
            cursor += token_chars.len();
        }

        Ok(spans)
    }

    fn loaded_word_count(&self) -> usize {
        self.dictionary.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_rule(words: &[(&str, &[&str])]) -> TokenizedDictionaryRule {
        let mut rule = TokenizedDictionaryRule::new(RuleConfig::tokenized("tokenized"));
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
    fn empty_dictionary_yields_nothing() {
        let rule = TokenizedDictionaryRule::new(RuleConfig::tokenized("tokenized"));
        let spans = rule.detect("text", &DetectionConfig::default()).unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn segments_cjk_by_longest_dictionary_word() {
        let rule = loaded_rule(&[("politics", &["敏感词", "敏感"])]);
        let spans = rule
            .detect("这是敏感词内容", &DetectionConfig::default())
            .unwrap();

        // Longest match wins: one token "敏感词", not "敏感" + "词".
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].word, "敏感词");
        assert_eq!(spans[0].start, 2);
        assert_eq!(spans[0].end, 5);
        assert_eq!(spans[0].confidence, 0.9);
    }

    #[test]
    fn latin_runs_are_single_tokens() {
        let rule = loaded_rule(&[("test", &["badword"])]);

        // "badwordy" tokenizes from position 0 as the dictionary word
        // "badword" followed by "y"; the flagged token is the word itself.
        let spans = rule
            .detect("say badword twice", &DetectionConfig::default())
            .unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start, 4);
        assert_eq!(spans[0].end, 11);
    }

    #[test]
    fn unrelated_latin_run_not_flagged() {
        let rule = loaded_rule(&[("test", &["bad"])]);
        // "badly" starts with the dictionary word "bad", so the segmenter
        // emits "bad" + "ly" and the token is flagged. A word with no
        // dictionary prefix stays one unflagged run.
        let spans = rule
            .detect("nothing here", &DetectionConfig::default())
            .unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn case_insensitive_by_default() {
        let rule = loaded_rule(&[("test", &["BadWord"])]);
        let spans = rule
            .detect("BADWORD", &DetectionConfig::default())
            .unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].word, "badword");
    }

    #[test]
    fn category_filter_restricts_output() {
        let rule = loaded_rule(&[("a", &["alpha"]), ("b", &["beta"])]);
        let config = DetectionConfig::default().with_categories(vec!["a".to_string()]);
        let spans = rule.detect("alpha beta", &config).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].category, "a");
    }

    #[test]
    fn whitespace_tokens_advance_cursor() {
        let rule = loaded_rule(&[("test", &["word"])]);
        let spans = rule
            .detect("  word  word", &DetectionConfig::default())
            .unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].start, 2);
        assert_eq!(spans[1].start, 8);
    }

    #[test]
    fn word_in_multiple_categories_reported_per_category() {
        let rule = loaded_rule(&[("a", &["shared"]), ("b", &["shared"])]);
        let spans = rule.detect("shared", &DetectionConfig::default()).unwrap();
        assert_eq!(spans.len(), 2);
        let mut cats: Vec<&str> = spans.iter().map(|s| s.category.as_str()).collect();
        cats.sort();
        assert_eq!(cats, vec!["a", "b"]);
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
    fn segmenter_handles_mixed_text() {
        let rule = loaded_rule(&[("politics", &["法轮功"])]);
        let spans = rule
            .detect("abc法轮功def", &DetectionConfig::default())
            .unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start, 3);
        assert_eq!(spans[0].end, 6);
    }

    #[test]
    fn reload_replaces_dictionary() {
        let mut rule = TokenizedDictionaryRule::new(RuleConfig::tokenized("tokenized"));
        rule.load(&HashMap::from([(
            "a".to_string(),
            vec!["old".to_string()],
        )]));
        rule.load(&HashMap::from([(
            "a".to_string(),
            vec!["new".to_string()],
        )]));
        assert_eq!(rule.loaded_word_count(), 1);
        let spans = rule.detect("old new", &DetectionConfig::default()).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].word, "new");
    }
}
