//! YAML-backed wordlist registry.
//!
//! The registry loads category-partitioned word lists described by a YAML
//! configuration file and hands out immutable snapshots. `reload()` parses
//! the configuration and builds a complete new snapshot before swapping it in
//! atomically: in-flight detections keep reading the previous snapshot via
//! their cloned `Arc`, so a half-updated category is never observable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Result, WordguardError};

fn default_true() -> bool {
    true
}

fn default_weight() -> u32 {
    100
}

/// One configured wordlist category.
#[derive(Debug, Deserialize)]
pub struct CategoryEntry {
    /// Category name; doubles as the category tag on spans.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Word file path, relative to the configuration file's directory.
    pub file: String,
    /// Whether this category participates in detection.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Integer weight 0–100; see [`CategoryEntry::normalized_weight`].
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Lazily-read word cache, cleared by building a fresh snapshot.
    #[serde(skip)]
    words: OnceLock<Vec<String>>,
}

impl CategoryEntry {
    /// Returns the weight normalized into `[0, 1]`.
    pub fn normalized_weight(&self) -> f64 {
        f64::from(self.weight.min(100)) / 100.0
    }

    /// Returns this category's words, reading and caching the word file on
    /// first access. Blank lines and `#` comments are skipped; a missing or
    /// unreadable file is a warning and contributes zero words.
    pub fn words(&self, base_path: &Path) -> &[String] {
        self.words.get_or_init(|| {
            let path = base_path.join(&self.file);
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    let words: Vec<String> = content
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty() && !line.starts_with('#'))
                        .map(str::to_string)
                        .collect();
                    info!(
                        category = %self.name,
                        words = words.len(),
                        "loaded wordlist file {}",
                        path.display()
                    );
                    words
                }
                Err(e) => {
                    warn!(
                        category = %self.name,
                        "wordlist file {} unavailable: {e}",
                        path.display()
                    );
                    Vec::new()
                }
            }
        })
    }
}

/// Top-level YAML configuration document.
#[derive(Debug, Default, Deserialize)]
struct WordlistDocument {
    #[serde(default)]
    wordlists: Vec<CategoryEntry>,
    /// Host-process settings; tolerated but not interpreted by the core.
    #[serde(default)]
    #[allow(dead_code)]
    global_settings: HashMap<String, serde_yaml::Value>,
}

/// An immutable view of the configuration at one point in time.
#[derive(Debug)]
pub struct Snapshot {
    base_path: PathBuf,
    entries: Vec<CategoryEntry>,
}

impl Snapshot {
    /// Returns all configured entries, enabled or not.
    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    /// Returns the enabled entries in configuration order.
    pub fn enabled_entries(&self) -> impl Iterator<Item = &CategoryEntry> {
        self.entries.iter().filter(|e| e.enabled)
    }

    /// Returns the words for one category, or an empty slice if the category
    /// is unknown or disabled.
    pub fn words(&self, category: &str) -> &[String] {
        self.enabled_entries()
            .find(|e| e.name == category)
            .map(|e| e.words(&self.base_path))
            .unwrap_or(&[])
    }

    /// Returns the words of every enabled category, keyed by category name.
    pub fn words_by_category(&self) -> HashMap<String, Vec<String>> {
        self.enabled_entries()
            .map(|e| (e.name.clone(), e.words(&self.base_path).to_vec()))
            .collect()
    }

    /// Returns normalized weights for every configured category.
    pub fn category_weights(&self) -> HashMap<String, f64> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.normalized_weight()))
            .collect()
    }
}

/// Registry of category-partitioned word lists.
#[derive(Debug)]
pub struct WordlistRegistry {
    config_path: PathBuf,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl WordlistRegistry {
    /// Opens a registry backed by the given YAML configuration file.
    ///
    /// A missing configuration file is non-fatal (warned, empty registry);
    /// a present but unparseable file is an error.
    pub fn open(config_path: impl Into<PathBuf>) -> Result<Self> {
        let config_path = config_path.into();
        let snapshot = Self::load_snapshot(&config_path)?;
        Ok(Self {
            config_path,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    fn load_snapshot(config_path: &Path) -> Result<Snapshot> {
        let base_path = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        if !config_path.exists() {
            warn!(
                "wordlist configuration {} not found; registry is empty",
                config_path.display()
            );
            return Ok(Snapshot {
                base_path,
                entries: Vec::new(),
            });
        }

        let content = std::fs::read_to_string(config_path)?;
        let document: WordlistDocument = serde_yaml::from_str(&content).map_err(|e| {
            WordguardError::Config(format!(
                "failed to parse {}: {e}",
                config_path.display()
            ))
        })?;
        info!(
            categories = document.wordlists.len(),
            "loaded wordlist configuration {}",
            config_path.display()
        );

        Ok(Snapshot {
            base_path,
            entries: document.wordlists,
        })
    }

    /// Returns the current snapshot. The snapshot stays valid for the
    /// caller's lifetime even across a concurrent [`reload`](Self::reload).
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().unwrap().clone()
    }

    /// Re-reads the configuration and swaps in a fresh snapshot atomically.
    /// All word caches start cold in the new snapshot.
    pub fn reload(&self) -> Result<()> {
        let fresh = Self::load_snapshot(&self.config_path)?;
        *self.snapshot.write().unwrap() = Arc::new(fresh);
        info!("wordlist registry reloaded");
        Ok(())
    }

    /// Returns the names of enabled categories in configuration order.
    pub fn enabled_categories(&self) -> Vec<String> {
        self.snapshot()
            .enabled_entries()
            .map(|e| e.name.clone())
            .collect()
    }

    /// Returns normalized weights for every configured category.
    pub fn category_weights(&self) -> HashMap<String, f64> {
        self.snapshot().category_weights()
    }
}
