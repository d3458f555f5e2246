//! Sensitive-content detection engine.
//!
//! Text is normalized (traditional-to-simplified mapping, case folding,
//! noise stripping), scanned by several independent rule strategies, and the
//! raw hits are arbitrated into one ordered, non-overlapping result list with
//! an overall risk verdict.
//!
//! # Example
//!
//! ```no_run
//! use wordguard_core::{DetectionRequest, DetectionService, ServiceConfig};
//!
//! # fn main() -> wordguard_core::Result<()> {
//! let service = DetectionService::new(ServiceConfig::new("config/wordlists.yaml"))?;
//! let response = service.detect(&DetectionRequest::new("some user text"))?;
//! if response.is_sensitive {
//!     println!("risk: {}", response.risk_level.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod arbitrator;
pub mod error;
pub mod model;
pub mod normalize;
pub mod rules;
pub mod service;
pub mod wordlist;

pub use arbitrator::Arbitrator;
pub use error::{Result, WordguardError};
pub use model::{
    ArbitrationConfig, DetectionConfig, DetectionMethod, DetectionMode, DetectionRequest,
    DetectionResponse, DetectionResultItem, DetectionSummary, MatchType, Position, RiskLevel,
    Span, Strictness,
};
pub use rules::{DetectionRule, RuleConfig, RuleKind, RuleParams};
pub use service::{DetectionService, HealthReport, ServiceConfig};
pub use wordlist::WordlistRegistry;
