//! Detection service orchestration.
//!
//! Owns the wordlist registry, the rule instances, and the arbitrator, and
//! runs the full pipeline for each request. A rule that fails stays isolated:
//! its error is logged and the remaining rules still contribute.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::arbitrator::Arbitrator;
use crate::error::{Result, WordguardError};
use crate::model::{ArbitrationConfig, DetectionRequest, DetectionResponse};
use crate::rules::{build_rule, default_rule_configs, DetectionRule, RuleConfig, RuleKind};
use crate::wordlist::WordlistRegistry;

/// Service-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Path to the wordlist registry config file.
    pub config_path: PathBuf,
    /// Requests with more characters than this are rejected.
    pub max_text_length: usize,
    /// Rule roster. Disabled rules are kept in the roster but never built.
    pub rules: Vec<RuleConfig>,
    /// Base arbitration settings.
    pub arbitration: ArbitrationConfig,
}

impl ServiceConfig {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            max_text_length: 10_000,
            rules: default_rule_configs(),
            arbitration: ArbitrationConfig::default(),
        }
    }

    pub fn with_max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    pub fn with_rules(mut self, rules: Vec<RuleConfig>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_arbitration(mut self, arbitration: ArbitrationConfig) -> Self {
        self.arbitration = arbitration;
        self
    }
}

/// Health snapshot for one rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleHealth {
    pub name: String,
    pub kind: RuleKind,
    pub enabled: bool,
    pub priority: i32,
    pub loaded_word_count: usize,
}

/// Health snapshot for one wordlist category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryHealth {
    pub name: String,
    pub enabled: bool,
    pub word_count: usize,
}

/// Service health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub uptime_secs: u64,
    pub requests_served: u64,
    pub rules: Vec<RuleHealth>,
    pub categories: Vec<CategoryHealth>,
}

pub struct DetectionService {
    config: ServiceConfig,
    registry: WordlistRegistry,
    rules: RwLock<Vec<Box<dyn DetectionRule>>>,
    started: Instant,
    requests: AtomicU64,
}

impl DetectionService {
    /// Builds the service: opens the registry, constructs every enabled rule
    /// and loads it with the current wordlists.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let registry = WordlistRegistry::open(&config.config_path)?;
        let rules = Self::build_rules(&config.rules, &registry);
        info!(
            rules = rules.len(),
            categories = registry.enabled_categories().len(),
            "detection service ready"
        );
        Ok(Self {
            config,
            registry,
            rules: RwLock::new(rules),
            started: Instant::now(),
            requests: AtomicU64::new(0),
        })
    }

    /// Builds the service around an explicit set of rule instances, for
    /// callers that bring their own [`DetectionRule`] implementations.
    /// The instances are loaded with the registry's current wordlists.
    pub fn with_rule_instances(
        config: ServiceConfig,
        mut rules: Vec<Box<dyn DetectionRule>>,
    ) -> Result<Self> {
        let registry = WordlistRegistry::open(&config.config_path)?;
        let words = registry.snapshot().words_by_category();
        for rule in rules.iter_mut() {
            rule.load(&words);
        }
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority()));
        Ok(Self {
            config,
            registry,
            rules: RwLock::new(rules),
            started: Instant::now(),
            requests: AtomicU64::new(0),
        })
    }

    fn build_rules(
        configs: &[RuleConfig],
        registry: &WordlistRegistry,
    ) -> Vec<Box<dyn DetectionRule>> {
        let words = registry.snapshot().words_by_category();
        let mut rules: Vec<Box<dyn DetectionRule>> = configs
            .iter()
            .filter(|c| c.enabled)
            .map(|c| {
                let mut rule = build_rule(c.clone());
                rule.load(&words);
                rule
            })
            .collect();
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority()));
        rules
    }

    /// Runs the full detection pipeline on one request.
    #[instrument(skip(self, request), fields(text_chars = request.text.chars().count()))]
    pub fn detect(&self, request: &DetectionRequest) -> Result<DetectionResponse> {
        let start = Instant::now();

        if request.text.trim().is_empty() {
            return Err(WordguardError::Validation("text must not be empty".into()));
        }
        let char_count = request.text.chars().count();
        if char_count > self.config.max_text_length {
            return Err(WordguardError::Validation(format!(
                "text length {char_count} exceeds limit {}",
                self.config.max_text_length
            )));
        }

        // Rejected requests do not count as served.
        self.requests.fetch_add(1, Ordering::Relaxed);

        let mut spans_by_rule = HashMap::new();
        {
            let rules = self.rules.read().unwrap();
            for rule in rules.iter() {
                if !rule.applies_to(request.config.mode) {
                    continue;
                }
                match rule.detect(&request.text, &request.config) {
                    Ok(spans) => {
                        spans_by_rule.insert(rule.name().to_string(), spans);
                    }
                    Err(e) => {
                        // One misbehaving rule must not fail the request.
                        error!(rule = rule.name(), "rule failed, skipping: {e}");
                        spans_by_rule.insert(rule.name().to_string(), Vec::new());
                    }
                }
            }
        }

        let arbitrator = Arbitrator::new(self.effective_arbitration(request));
        let (results, summary) = arbitrator.arbitrate(&spans_by_rule)?;
        let risk_level = arbitrator.risk_level(&results);

        let overall_score = results
            .iter()
            .map(|r| r.confidence)
            .fold(0.0_f64, f64::max);

        let mut results = results;
        if !request.config.return_positions {
            for result in &mut results {
                result.positions.clear();
            }
        }

        let response = DetectionResponse {
            is_sensitive: !results.is_empty(),
            risk_level,
            overall_score,
            detection_time_ms: start.elapsed().as_millis() as u64,
            results,
            summary,
        };

        info!(
            is_sensitive = response.is_sensitive,
            risk = response.risk_level.name(),
            matches = response.summary.total_matches,
            elapsed_ms = response.detection_time_ms,
            "detection complete"
        );
        Ok(response)
    }

    /// Per-request arbitration config: the base settings, with the request's
    /// threshold override applied and registry weights filled in when the
    /// base config carries none.
    fn effective_arbitration(&self, request: &DetectionRequest) -> ArbitrationConfig {
        let mut arbitration = self.config.arbitration.clone();
        if let Some(threshold) = request.config.confidence_threshold {
            arbitration.confidence_threshold = threshold;
        }
        if arbitration.category_weights.is_empty() {
            arbitration.category_weights = self.registry.category_weights();
        }
        arbitration
    }

    /// Re-reads the wordlist config and word files, then reloads every rule
    /// from the fresh snapshot. In-flight requests keep the old data.
    pub fn reload_wordlists(&self) -> Result<()> {
        self.registry.reload()?;
        let words = self.registry.snapshot().words_by_category();
        let mut rules = self.rules.write().unwrap();
        for rule in rules.iter_mut() {
            rule.load(&words);
        }
        info!(categories = words.len(), "wordlists reloaded");
        Ok(())
    }

    /// Rebuilds rule instances from the configured roster and loads them
    /// with the current wordlists.
    pub fn reload_rules(&self) -> Result<()> {
        let fresh = Self::build_rules(&self.config.rules, &self.registry);
        let mut rules = self.rules.write().unwrap();
        let count = fresh.len();
        *rules = fresh;
        info!(rules = count, "rules rebuilt");
        Ok(())
    }

    pub fn health(&self) -> HealthReport {
        let rules = self.rules.read().unwrap();
        let snapshot = self.registry.snapshot();
        HealthReport {
            uptime_secs: self.started.elapsed().as_secs(),
            requests_served: self.requests.load(Ordering::Relaxed),
            rules: rules
                .iter()
                .map(|r| RuleHealth {
                    name: r.name().to_string(),
                    kind: r.kind(),
                    enabled: r.enabled(),
                    priority: r.priority(),
                    loaded_word_count: r.loaded_word_count(),
                })
                .collect(),
            categories: snapshot
                .entries()
                .iter()
                .map(|e| CategoryHealth {
                    name: e.name.clone(),
                    enabled: e.enabled,
                    word_count: if e.enabled {
                        snapshot.words(&e.name).len()
                    } else {
                        0
                    },
                })
                .collect(),
        }
    }

    pub fn registry(&self) -> &WordlistRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DetectionConfig, RiskLevel};
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, ServiceConfig) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("test.txt"), "badword\nspam\n").unwrap();
        fs::write(dir.path().join("politics.txt"), "敏感词\n").unwrap();
        let yaml = "\
wordlists:
  - name: test
    description: test words
    file: test.txt
    enabled: true
    weight: 100
  - name: politics
    description: political terms
    file: politics.txt
    enabled: true
    weight: 95
";
        let config_path = dir.path().join("wordlists.yaml");
        fs::write(&config_path, yaml).unwrap();
        let config = ServiceConfig::new(&config_path);
        (dir, config)
    }

    #[test]
    fn clean_text_is_not_sensitive() {
        let (_dir, config) = fixture();
        let service = DetectionService::new(config).unwrap();

        let response = service
            .detect(&DetectionRequest::new("a perfectly fine sentence"))
            .unwrap();
        assert!(!response.is_sensitive);
        assert_eq!(response.risk_level, RiskLevel::Low);
        assert_eq!(response.overall_score, 0.0);
        assert!(response.results.is_empty());
    }

    #[test]
    fn flagged_word_yields_sensitive_response() {
        let (_dir, config) = fixture();
        let service = DetectionService::new(config).unwrap();

        let response = service
            .detect(&DetectionRequest::new("this is a badword here"))
            .unwrap();
        assert!(response.is_sensitive);
        assert_eq!(response.risk_level, RiskLevel::Critical);
        assert_eq!(response.overall_score, 1.0);
        assert_eq!(response.summary.highest_risk_category.as_deref(), Some("test"));
    }

    #[test]
    fn empty_text_is_rejected() {
        let (_dir, config) = fixture();
        let service = DetectionService::new(config).unwrap();

        let err = service.detect(&DetectionRequest::new("   ")).unwrap_err();
        assert!(matches!(err, WordguardError::Validation(_)));
    }

    #[test]
    fn oversized_text_is_rejected() {
        let (_dir, config) = fixture();
        let service = DetectionService::new(config.with_max_text_length(5)).unwrap();

        let err = service
            .detect(&DetectionRequest::new("too long for the limit"))
            .unwrap_err();
        assert!(matches!(err, WordguardError::Validation(_)));
    }

    #[test]
    fn positions_stripped_unless_requested() {
        let (_dir, config) = fixture();
        let service = DetectionService::new(config).unwrap();

        let response = service
            .detect(&DetectionRequest::new("badword"))
            .unwrap();
        assert!(response.results[0].positions.is_empty());

        let request = DetectionRequest::with_config(
            "badword",
            DetectionConfig::default().with_positions(),
        );
        let response = service.detect(&request).unwrap();
        assert_eq!(response.results[0].positions.len(), 1);
        assert_eq!(response.results[0].positions[0].start, 0);
        assert_eq!(response.results[0].positions[0].end, 7);
    }

    #[test]
    fn category_filter_flows_through() {
        let (_dir, config) = fixture();
        let service = DetectionService::new(config).unwrap();

        let request = DetectionRequest::with_config(
            "badword 敏感词",
            DetectionConfig::default().with_categories(vec!["politics".to_string()]),
        );
        let response = service.detect(&request).unwrap();
        assert_eq!(response.summary.categories_found, vec!["politics"]);
    }

    #[test]
    fn request_threshold_override_applies() {
        let (_dir, config) = fixture();
        let service = DetectionService::new(config).unwrap();

        // Threshold above every confidence filters everything out.
        let request = DetectionRequest::with_config(
            "badword",
            DetectionConfig::default().with_confidence_threshold(1.0),
        );
        let response = service.detect(&request).unwrap();
        // The exact rule still lands at confidence 1.0, so only the
        // discounted rules disappear.
        assert!(response.is_sensitive);
        assert!(response
            .results
            .iter()
            .all(|r| r.confidence >= 1.0));
    }

    #[test]
    fn wordlist_reload_picks_up_new_words() {
        let (dir, config) = fixture();
        let service = DetectionService::new(config).unwrap();

        let response = service.detect(&DetectionRequest::new("freshword")).unwrap();
        assert!(!response.is_sensitive);

        fs::write(dir.path().join("test.txt"), "badword\nspam\nfreshword\n").unwrap();
        service.reload_wordlists().unwrap();

        let response = service.detect(&DetectionRequest::new("freshword")).unwrap();
        assert!(response.is_sensitive);
    }

    #[test]
    fn health_reports_rules_and_categories() {
        let (_dir, config) = fixture();
        let service = DetectionService::new(config).unwrap();
        service.detect(&DetectionRequest::new("badword")).unwrap();

        let health = service.health();
        assert_eq!(health.requests_served, 1);
        assert_eq!(health.rules.len(), 3);
        // Rules are ordered by priority, exact first.
        assert_eq!(health.rules[0].name, "exact");
        assert_eq!(health.rules[0].loaded_word_count, 3);
        assert_eq!(health.categories.len(), 2);
    }

    #[test]
    fn rejected_requests_are_not_counted_as_served() {
        let (_dir, config) = fixture();
        let service = DetectionService::new(config).unwrap();

        service.detect(&DetectionRequest::new("   ")).unwrap_err();
        assert_eq!(service.health().requests_served, 0);

        service.detect(&DetectionRequest::new("fine text")).unwrap();
        assert_eq!(service.health().requests_served, 1);
    }

    #[test]
    fn missing_config_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let config = ServiceConfig::new(dir.path().join("absent.yaml"));
        let service = DetectionService::new(config).unwrap();

        let response = service.detect(&DetectionRequest::new("badword")).unwrap();
        assert!(!response.is_sensitive);
    }

    #[test]
    fn disabled_rule_is_not_built() {
        let (_dir, config) = fixture();
        let rules = vec![
            RuleConfig::exact("exact"),
            RuleConfig::tokenized("tokenized").disabled(),
            RuleConfig::regex("regex").disabled(),
        ];
        let service = DetectionService::new(config.with_rules(rules)).unwrap();
        assert_eq!(service.health().rules.len(), 1);
    }
}
