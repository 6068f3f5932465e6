//! Metacognitive confidence
//!
//! Two components per retrieved memory: a stable type-level `reliability`
//! (attenuated when the memory is contradicted) and a decaying `salience`
//! derived from effective strength. The composite is a weighted sum mapped
//! onto coarse label bands.

use serde::{Deserialize, Serialize};

use crate::config::ConfidenceConfig;
use crate::memory::Memory;

/// Confidence assessment for one memory
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confidence {
    /// Type-level reliability, attenuated when contradicted
    pub reliability: f64,
    /// Sigmoid of effective strength
    pub salience: f64,
    /// Weighted composite in [0, 1]
    pub composite: f64,
}

/// Reliability component for a memory
pub fn reliability(memory: &Memory, cfg: &ConfidenceConfig) -> f64 {
    let base = cfg.reliability_for(memory.memory_type);
    if memory.contradicted_by.is_some() {
        cfg.contradiction_attenuation * base
    } else {
        base
    }
}

/// Salience: sigmoid(k * (effective_strength - 0.5))
pub fn salience(effective_strength: f64, cfg: &ConfidenceConfig) -> f64 {
    let x = cfg.salience_slope * (effective_strength - 0.5);
    1.0 / (1.0 + (-x).exp())
}

/// Composite confidence for a memory given its effective strength
pub fn assess(memory: &Memory, effective_strength: f64, cfg: &ConfidenceConfig) -> Confidence {
    let reliability = reliability(memory, cfg);
    let salience = salience(effective_strength, cfg);
    let composite = cfg.reliability_weight * reliability + cfg.salience_weight * salience;
    Confidence {
        reliability,
        salience,
        composite,
    }
}

/// Band label for a composite confidence
pub fn label(composite: f64) -> &'static str {
    if composite >= 0.75 {
        "certain"
    } else if composite >= 0.5 {
        "likely"
    } else if composite >= 0.25 {
        "uncertain"
    } else {
        "vague"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Layer, MemoryType};

    fn factual() -> Memory {
        Memory {
            id: "m".into(),
            content: "fact".into(),
            memory_type: MemoryType::Factual,
            importance: 0.5,
            working_strength: 2.0,
            core_strength: 0.0,
            stability: 3.0,
            created_at: 0.0,
            last_accessed_at: 0.0,
            access_count: 0,
            layer: Layer::Working,
            pinned: false,
            source: None,
            tags: vec![],
            contradicted_by: None,
            contradicts: None,
            entities: vec![],
        }
    }

    #[test]
    fn test_salience_is_sigmoid_around_half() {
        let cfg = ConfidenceConfig::default();
        assert!((salience(0.5, &cfg) - 0.5).abs() < 1e-12);
        assert!(salience(2.0, &cfg) > 0.9);
        assert!(salience(0.0, &cfg) < 0.3);
    }

    #[test]
    fn test_contradiction_attenuates_reliability() {
        let cfg = ConfidenceConfig::default();
        let mut m = factual();
        assert!((reliability(&m, &cfg) - 0.85).abs() < 1e-12);
        m.contradicted_by = Some("newer".into());
        assert!((reliability(&m, &cfg) - 0.255).abs() < 1e-12);
    }

    #[test]
    fn test_contradicted_fresh_memory_lands_at_most_uncertain() {
        let cfg = ConfidenceConfig::default();
        let mut m = factual();
        m.contradicted_by = Some("newer".into());
        // even at full effective strength the attenuated composite stays below 0.5
        let c = assess(&m, 2.0, &cfg);
        assert!(c.composite < 0.5);
        assert!(matches!(label(c.composite), "uncertain" | "vague"));
    }

    #[test]
    fn test_labels() {
        assert_eq!(label(0.9), "certain");
        assert_eq!(label(0.75), "certain");
        assert_eq!(label(0.6), "likely");
        assert_eq!(label(0.3), "uncertain");
        assert_eq!(label(0.1), "vague");
    }
}
