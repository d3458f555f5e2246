//! Result arbitration.
//!
//! Takes the raw spans each rule produced and turns them into one ordered,
//! non-overlapping result list: engine weights discount rule confidence,
//! a greedy longest-match sweep resolves overlaps, corroboration between
//! rules boosts confidence, and category weights bias the final ranking.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, WordguardError};
use crate::model::{
    ArbitrationConfig, DetectionResultItem, DetectionSummary, Position, RiskLevel, Span,
};

/// Two hits corroborate when their starts differ by at most this many chars.
const POSITION_TOLERANCE: usize = 2;

pub struct Arbitrator {
    config: ArbitrationConfig,
}

impl Arbitrator {
    pub fn new(config: ArbitrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArbitrationConfig {
        &self.config
    }

    /// Arbitrates the spans produced by every rule into a final result list
    /// and summary.
    ///
    /// Fails with [`WordguardError::Arbitration`] when any input span is
    /// degenerate (`start >= end`); a malformed span means a rule bug, and
    /// silently ranking on it would corrupt the verdict.
    pub fn arbitrate(
        &self,
        spans_by_rule: &HashMap<String, Vec<Span>>,
    ) -> Result<(Vec<DetectionResultItem>, DetectionSummary)> {
        let hits = self.flatten(spans_by_rule)?;
        debug!(rules = spans_by_rule.len(), hits = hits.len(), "arbitrating");

        let merged = if self.config.merge_overlaps {
            Self::merge_greedy(hits)
        } else {
            hits
        };
        let boosted = self.corroborate(merged, spans_by_rule);

        let mut final_hits: Vec<Span> = boosted
            .into_iter()
            .filter(|hit| hit.confidence >= self.config.confidence_threshold)
            .map(|mut hit| {
                hit.confidence =
                    (hit.confidence * self.config.category_weight(&hit.category)).clamp(0.0, 1.0);
                hit
            })
            .collect();

        // Rank by confidence, then by category weight. Both sorts are stable
        // so equal hits keep their flattening order.
        final_hits.sort_by(|a, b| {
            b.confidence.total_cmp(&a.confidence).then_with(|| {
                self.config
                    .category_weight(&b.category)
                    .total_cmp(&self.config.category_weight(&a.category))
            })
        });

        let results: Vec<DetectionResultItem> = final_hits
            .into_iter()
            .map(|hit| DetectionResultItem {
                matched_word: hit.word,
                category: hit.category,
                match_type: hit.match_type,
                confidence: hit.confidence,
                positions: vec![Position {
                    start: hit.start,
                    end: hit.end,
                }],
                detection_method: hit.detection_method,
                suggestion: hit.suggestion,
            })
            .collect();

        let summary = Self::summarize(&results);
        debug!(results = results.len(), "arbitration complete");
        Ok((results, summary))
    }

    /// Overall risk verdict for an arbitrated result list.
    ///
    /// Starts from the highest confidence, adds 0.1 for every hit in a
    /// high-weight category (weight >= 0.9), and adds a volume bonus when
    /// many hits landed.
    pub fn risk_level(&self, results: &[DetectionResultItem]) -> RiskLevel {
        if results.is_empty() {
            return RiskLevel::Low;
        }

        let mut score = results
            .iter()
            .map(|r| r.confidence)
            .fold(0.0_f64, f64::max);

        for result in results {
            if self.config.category_weight(&result.category) >= 0.9 {
                score += 0.1;
            }
        }

        if results.len() >= 5 {
            score += 0.2;
        } else if results.len() >= 3 {
            score += 0.1;
        }

        if score >= 0.9 {
            RiskLevel::Critical
        } else if score >= 0.7 {
            RiskLevel::High
        } else if score >= 0.5 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Collects every rule's spans into one list, applying engine weights.
    /// Rule names are visited in sorted order so the flattened order, and
    /// with it every stable sort downstream, is deterministic.
    fn flatten(&self, spans_by_rule: &HashMap<String, Vec<Span>>) -> Result<Vec<Span>> {
        let mut rules: Vec<&String> = spans_by_rule.keys().collect();
        rules.sort();

        let mut hits = Vec::new();
        for rule in rules {
            let weight = self.config.engine_weight(rule);
            for span in &spans_by_rule[rule] {
                if span.start >= span.end {
                    return Err(WordguardError::Arbitration(format!(
                        "rule '{rule}' produced degenerate span [{}, {}) for '{}'",
                        span.start, span.end, span.word
                    )));
                }
                let mut hit = span.clone();
                hit.confidence = (hit.confidence * weight).clamp(0.0, 1.0);
                hits.push(hit);
            }
        }
        Ok(hits)
    }

    /// Greedy longest-match sweep. Sorting by start ascending and end
    /// descending puts the longest span first at each start; the sweep then
    /// keeps a span only when it begins at or after the last accepted end,
    /// so the output is non-overlapping with longer spans winning. This
    /// maximizes matched length, not match count, and is not globally
    /// optimal under every weighting.
    fn merge_greedy(mut hits: Vec<Span>) -> Vec<Span> {
        hits.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut accepted = Vec::new();
        let mut last_end = 0usize;
        for hit in hits {
            if accepted.is_empty() || hit.start >= last_end {
                last_end = hit.end;
                accepted.push(hit);
            } else {
                debug!(
                    word = %hit.word,
                    start = hit.start,
                    end = hit.end,
                    rule = %hit.source_rule,
                    "dropping overlapped hit"
                );
            }
        }
        accepted
    }

    /// Boosts hits that more than one rule reported at a nearby position.
    /// Each rule contributes at most once per hit.
    fn corroborate(
        &self,
        hits: Vec<Span>,
        spans_by_rule: &HashMap<String, Vec<Span>>,
    ) -> Vec<Span> {
        hits.into_iter()
            .map(|mut hit| {
                let mut corroborating = 0usize;
                for spans in spans_by_rule.values() {
                    let agrees = spans.iter().any(|s| {
                        s.word == hit.word
                            && s.category == hit.category
                            && s.start.abs_diff(hit.start) <= POSITION_TOLERANCE
                    });
                    if agrees {
                        corroborating += 1;
                    }
                }
                if corroborating > 1 {
                    let boost =
                        self.config.confidence_boost_per_corroboration * (corroborating - 1) as f64;
                    hit.confidence = (hit.confidence + boost).clamp(0.0, 1.0);
                }
                hit
            })
            .collect()
    }

    fn summarize(results: &[DetectionResultItem]) -> DetectionSummary {
        let mut categories_found = Vec::new();
        for result in results {
            if !categories_found.contains(&result.category) {
                categories_found.push(result.category.clone());
            }
        }
        DetectionSummary {
            total_matches: results.len(),
            categories_found,
            highest_risk_category: results.first().map(|r| r.category.clone()),
        }
    }
}

impl Default for Arbitrator {
    fn default() -> Self {
        Self::new(ArbitrationConfig::default())
    }
}
