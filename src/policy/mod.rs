//! Engine policy: thresholds and traversal limits.
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! Thresholds are quantized before hashing (multiplied by 1e6 and rounded
//! to i64), so `params_hash` does not depend on float formatting.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::canonical_hash_hex;
use crate::DEFAULT_POLICY_VERSION;

/// Quantization factor for float normalization.
const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// What a prerequisite cycle does to the query that found it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Return the best-effort closure together with a `CycleDetected` warning.
    WarnAndContinue,
    /// Return no ancestors, mark the result blocked, and still warn.
    Block,
}

impl CyclePolicy {
    /// Parse from configuration text.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "warn" | "warn_and_continue" => Some(Self::WarnAndContinue),
            "block" => Some(Self::Block),
            _ => None,
        }
    }
}

impl Default for CyclePolicy {
    fn default() -> Self {
        Self::WarnAndContinue
    }
}

impl fmt::Display for CyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WarnAndContinue => write!(f, "warn_and_continue"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// Tunable parameters shared by every query.
///
/// ## Parameters
///
/// - `duplicate_threshold`: shared-content ratio at which two editions
///   count as duplicates (dedup groups, skippable purchases)
/// - `similarity_threshold`: minimum overlap ratio for "similar content"
/// - `cycle_policy`: reaction to prerequisite cycles
/// - `max_reading_depth`: hop limit for reading paths
/// - `max_reading_results`: result cap for reading paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnginePolicy {
    /// Policy version identifier.
    pub version: String,
    /// Duplicate threshold in `[0, 1]`.
    pub duplicate_threshold: f64,
    /// Similarity threshold in `[0, 1]`.
    pub similarity_threshold: f64,
    /// Prerequisite cycle handling.
    pub cycle_policy: CyclePolicy,
    /// Reading-path depth limit.
    pub max_reading_depth: u32,
    /// Reading-path result limit.
    pub max_reading_results: usize,
}

#[derive(Serialize)]
struct QuantizedPolicyParams<'a> {
    version: &'a str,
    duplicate_threshold: i64,
    similarity_threshold: i64,
    cycle_policy: CyclePolicy,
    max_reading_depth: u32,
    max_reading_results: usize,
}

fn quantize_float(value: f64) -> i64 {
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}

impl EnginePolicy {
    /// Set the duplicate threshold, clamped to `[0, 1]`.
    pub fn with_duplicate_threshold(mut self, threshold: f64) -> Self {
        self.duplicate_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the cycle policy.
    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    /// Read overrides from the environment.
    ///
    /// `DUPLICATE_THRESHOLD`, `SIMILARITY_THRESHOLD`, `CYCLE_POLICY`,
    /// `MAX_READING_DEPTH`, `MAX_READING_RESULTS`. Unparseable values fall
    /// back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            version: defaults.version,
            duplicate_threshold: std::env::var("DUPLICATE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .map_or(defaults.duplicate_threshold, |v| v.clamp(0.0, 1.0)),
            similarity_threshold: std::env::var("SIMILARITY_THRESHOLD")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .map_or(defaults.similarity_threshold, |v| v.clamp(0.0, 1.0)),
            cycle_policy: std::env::var("CYCLE_POLICY")
                .ok()
                .and_then(|s| CyclePolicy::from_str(&s))
                .unwrap_or(defaults.cycle_policy),
            max_reading_depth: std::env::var("MAX_READING_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_reading_depth),
            max_reading_results: std::env::var("MAX_READING_RESULTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_reading_results),
        }
    }

    /// Hash of the policy parameters over their quantized form.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(&QuantizedPolicyParams {
            version: &self.version,
            duplicate_threshold: quantize_float(self.duplicate_threshold),
            similarity_threshold: quantize_float(self.similarity_threshold),
            cycle_policy: self.cycle_policy,
            max_reading_depth: self.max_reading_depth,
            max_reading_results: self.max_reading_results,
        })
    }
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            duplicate_threshold: 0.9,
            similarity_threshold: 0.3,
            cycle_policy: CyclePolicy::default(),
            max_reading_depth: 10,
            max_reading_results: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_hash_determinism() {
        assert_eq!(EnginePolicy::default().params_hash(), EnginePolicy::default().params_hash());
    }

    #[test]
    fn test_params_hash_changes_with_threshold() {
        let base = EnginePolicy::default();
        let tighter = base.clone().with_duplicate_threshold(0.95);
        assert_ne!(base.params_hash(), tighter.params_hash());
    }

    #[test]
    fn test_params_hash_ignores_float_noise() {
        let a = EnginePolicy::default().with_duplicate_threshold(0.9);
        let b = EnginePolicy::default().with_duplicate_threshold(0.9 + 1e-12);
        assert_eq!(a.params_hash(), b.params_hash());
    }

    #[test]
    fn test_cycle_policy_parsing() {
        assert_eq!(CyclePolicy::from_str("warn"), Some(CyclePolicy::WarnAndContinue));
        assert_eq!(CyclePolicy::from_str("BLOCK"), Some(CyclePolicy::Block));
        assert_eq!(CyclePolicy::from_str("explode"), None);
    }

    #[test]
    fn test_threshold_clamped() {
        let policy = EnginePolicy::default().with_duplicate_threshold(1.7);
        assert_eq!(policy.duplicate_threshold, 1.0);
    }
}
