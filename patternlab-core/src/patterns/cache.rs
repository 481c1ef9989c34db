//! Validation result caching.
//!
//! The historical rescan is the most expensive repeated operation in a run,
//! and it is a pure function of (instrument, as-of date, formation kind):
//! for a fixed cutoff the result can never change. The cache is an explicit
//! injected collaborator keyed by a content hash — never global state — so
//! runs stay deterministic and tests can swap it out.

use crate::domain::PatternKind;
use crate::patterns::validator::ValidationResult;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

/// Content-hash cache key for one validation.
pub fn validation_cache_key(instrument: &str, as_of: NaiveDate, kind: PatternKind) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(instrument.as_bytes());
    hasher.update(b"\x00");
    hasher.update(as_of.to_string().as_bytes());
    hasher.update(b"\x00");
    hasher.update(kind.as_str().as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Cache collaborator for validation results.
///
/// `get`/`put` take `&self` so the simulator can consult the cache from
/// parallel instrument evaluations.
pub trait ValidationCache: Send + Sync {
    fn get(&self, key: &str) -> Option<ValidationResult>;
    fn put(&self, key: &str, result: ValidationResult);
}

/// In-memory cache for a single run.
#[derive(Debug, Default)]
pub struct MemoryValidationCache {
    entries: Mutex<HashMap<String, ValidationResult>>,
}

impl MemoryValidationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ValidationCache for MemoryValidationCache {
    fn get(&self, key: &str) -> Option<ValidationResult> {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .get(key)
            .cloned()
    }

    fn put(&self, key: &str, result: ValidationResult) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key.to_string(), result);
    }
}

/// Disables caching (every validation recomputes).
#[derive(Debug, Default)]
pub struct NoCache;

impl ValidationCache for NoCache {
    fn get(&self, _key: &str) -> Option<ValidationResult> {
        None
    }

    fn put(&self, _key: &str, _result: ValidationResult) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> ValidationResult {
        ValidationResult {
            formation_kind: PatternKind::CupWithHandle,
            occurrence_count: 20,
            conservative_hit_rate: 0.8,
            aggressive_hit_rate: 0.4,
            avg_conservative_gain_pct: 10.0,
            avg_aggressive_gain_pct: 20.0,
            risk_reward_ratio: 2.0,
            approved: true,
            approved_target: Some(crate::patterns::validator::TargetTier::Conservative),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn key_is_stable_and_input_sensitive() {
        let a = validation_cache_key("ACME", date(), PatternKind::CupWithHandle);
        let b = validation_cache_key("ACME", date(), PatternKind::CupWithHandle);
        assert_eq!(a, b);

        assert_ne!(
            a,
            validation_cache_key("ZETA", date(), PatternKind::CupWithHandle)
        );
        assert_ne!(
            a,
            validation_cache_key("ACME", date(), PatternKind::GoldenCross)
        );
        assert_ne!(
            a,
            validation_cache_key(
                "ACME",
                date() + chrono::Duration::days(1),
                PatternKind::CupWithHandle
            )
        );
    }

    #[test]
    fn memory_cache_roundtrip() {
        let cache = MemoryValidationCache::new();
        let key = validation_cache_key("ACME", date(), PatternKind::CupWithHandle);

        assert!(cache.get(&key).is_none());
        cache.put(&key, sample_result());
        let hit = cache.get(&key).expect("cached result");
        assert_eq!(hit.occurrence_count, 20);
        assert!(hit.approved);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn no_cache_never_stores() {
        let cache = NoCache;
        let key = validation_cache_key("ACME", date(), PatternKind::CupWithHandle);
        cache.put(&key, sample_result());
        assert!(cache.get(&key).is_none());
    }
}
