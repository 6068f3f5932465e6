//! Engine configuration
//!
//! One value object groups every tunable into thematic sub-structs. The
//! config is held by the engine façade, never process-wide; two engines in
//! one process can hold divergent configs.

use serde::{Deserialize, Serialize};

use crate::memory::MemoryType;

// ============================================================================
// THEMATIC GROUPS
// ============================================================================

/// Ebbinghaus forgetting and retrieval bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgettingConfig {
    /// Effective-strength floor below which `forget` prunes
    pub forget_threshold: f64,
    /// Stability multiplier per successful retrieval: stability *= (1 + growth)
    pub stability_growth: f64,
    /// Access-log rows older than this many days are trimmed during consolidation
    pub access_log_retention_days: f64,
}

impl Default for ForgettingConfig {
    fn default() -> Self {
        Self {
            forget_threshold: 0.01,
            stability_growth: 0.1,
            access_log_retention_days: 90.0,
        }
    }
}

/// Dual-trace consolidation cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationConfig {
    /// Working-trace decay rate per day (mu1)
    pub working_decay_rate: f64,
    /// Working-to-core transfer rate per day (alpha)
    pub transfer_rate: f64,
    /// Core-trace decay rate per day (mu2)
    pub core_decay_rate: f64,
    /// Importance floor used by the transfer term
    pub importance_floor: f64,
    /// Core boost added to each replayed memory
    pub replay_boost: f64,
    /// Fraction of the replay sample drawn from the last 24h
    pub interleave_ratio: f64,
    /// Replay sample size per cycle
    pub replay_sample_size: usize,
    /// Core strength at or above which a memory is promoted to core
    pub promote_threshold: f64,
    /// Core strength at or below which a memory may be archived
    pub demote_threshold: f64,
    /// Working strength at or below which a demotable memory is archived
    pub archive_threshold: f64,
    /// Importance at or above which `add` seeds the core trace
    pub core_seed_importance_floor: f64,
    /// Core seed added for high-importance memories at creation
    pub initial_core_seed: f64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            working_decay_rate: 0.15,
            transfer_rate: 0.08,
            core_decay_rate: 0.005,
            importance_floor: 0.1,
            replay_boost: 0.01,
            interleave_ratio: 0.3,
            replay_sample_size: 20,
            promote_threshold: 0.25,
            demote_threshold: 0.05,
            archive_threshold: 0.15,
            core_seed_importance_floor: 0.8,
            initial_core_seed: 0.1,
        }
    }
}

/// ACT-R activation scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationConfig {
    /// Base-level decay exponent (d)
    pub decay_rate: f64,
    /// Seconds floor keeping same-tick accesses bounded
    pub epsilon: f64,
    /// Weight per matched context keyword
    pub context_weight: f64,
    /// Weight applied to importance
    pub importance_weight: f64,
    /// Subtracted when `contradicted_by` is set
    pub contradiction_penalty: f64,
    /// Added for pinned memories
    pub pin_boost: f64,
    /// Activations below this are treated as -inf
    pub min_activation: f64,
    /// Most recent access samples fed into the base-level term
    pub max_access_samples: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.5,
            epsilon: 1e-3,
            context_weight: 1.5,
            importance_weight: 0.5,
            contradiction_penalty: 3.0,
            pin_boost: 1.0,
            min_activation: -10.0,
            max_access_samples: 64,
        }
    }
}

/// Metacognitive confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceConfig {
    /// Weight of the reliability component
    pub reliability_weight: f64,
    /// Weight of the salience component
    pub salience_weight: f64,
    /// Sigmoid slope of the salience term (k)
    pub salience_slope: f64,
    /// Reliability multiplier applied to contradicted memories
    pub contradiction_attenuation: f64,
    /// Per-type reliability overrides; types absent here use the built-in map
    pub reliability_overrides: Vec<(MemoryType, f64)>,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            reliability_weight: 0.7,
            salience_weight: 0.3,
            salience_slope: 2.0,
            contradiction_attenuation: 0.3,
            reliability_overrides: vec![],
        }
    }
}

impl ConfidenceConfig {
    /// Reliability for a type, honoring overrides
    pub fn reliability_for(&self, memory_type: MemoryType) -> f64 {
        self.reliability_overrides
            .iter()
            .find(|(t, _)| *t == memory_type)
            .map(|(_, r)| *r)
            .unwrap_or_else(|| memory_type.default_reliability())
    }
}

/// Reward modulation of recently accessed memories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardConfig {
    /// Number of most recently accessed memories modulated (N)
    pub window: usize,
    /// Per-position weight decay (gamma); k=0 is the oldest in the window
    pub position_decay: f64,
    /// Working-strength increment for positive feedback
    pub magnitude: f64,
    /// Stability multiplier increment for positive feedback
    pub strength_boost: f64,
    /// Working-strength suppression factor for negative feedback
    pub suppression: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            window: 3,
            position_decay: 0.5,
            magnitude: 0.5,
            strength_boost: 0.1,
            suppression: 0.2,
        }
    }
}

/// Homeostatic downscaling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownscaleConfig {
    /// Multiplier applied to both strengths of unpinned memories
    pub factor: f64,
}

impl Default for DownscaleConfig {
    fn default() -> Self {
        Self { factor: 0.95 }
    }
}

/// Hebbian co-activation and link formation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HebbianConfig {
    /// When false, co-activation bookkeeping is a no-op
    pub enabled: bool,
    /// Co-activation count at which a tracked pair becomes a link
    pub formation_threshold: i64,
    /// Strength assigned to a newly formed link
    pub formation_strength: f64,
    /// Strength ceiling for `strengthen`
    pub max_strength: f64,
    /// Per-cycle strength multiplier
    pub decay_factor: f64,
    /// Links decayed below this are pruned
    pub prune_below: f64,
}

impl Default for HebbianConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            formation_threshold: 3,
            formation_strength: 1.0,
            max_strength: 2.0,
            decay_factor: 0.95,
            prune_below: 0.1,
        }
    }
}

/// Runaway-strength detection and clamping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyConfig {
    /// When false, strengths are never clamped
    pub enabled: bool,
    /// Hard cap on either trace strength
    pub max_strength: f64,
    /// Hard cap on stability, days
    pub max_stability: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_strength: 1e4,
            max_stability: 3650.0,
        }
    }
}

/// Recall pipeline shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// Lexical candidate cutoff (top-N from FTS)
    pub candidate_cutoff: usize,
    /// Score bonus for candidates that matched the lexical stage
    pub lexical_bonus: f64,
    /// Weight of the cosine-similarity bonus when an embedding provider is set
    pub semantic_weight: f64,
    /// Default result limit
    pub default_limit: usize,
    /// Default minimum confidence
    pub default_min_confidence: f64,
    /// Hide contradicted memories entirely instead of penalizing them
    pub hard_contradiction: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            candidate_cutoff: 100,
            lexical_bonus: 0.5,
            semantic_weight: 0.5,
            default_limit: 5,
            default_min_confidence: 0.0,
            hard_contradiction: false,
        }
    }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Forgetting group
    pub forgetting: ForgettingConfig,
    /// Consolidation group
    pub consolidation: ConsolidationConfig,
    /// Activation group
    pub activation: ActivationConfig,
    /// Confidence group
    pub confidence: ConfidenceConfig,
    /// Reward group
    pub reward: RewardConfig,
    /// Downscale group
    pub downscale: DownscaleConfig,
    /// Hebbian group
    pub hebbian: HebbianConfig,
    /// Anomaly group
    pub anomaly: AnomalyConfig,
    /// Search group
    pub search: SearchConfig,
}

impl EngineConfig {
    /// Conversational agents: short attention span, quick association
    ///
    /// Faster working decay, a wider reward window, and eager link formation.
    pub fn chatbot() -> Self {
        let mut cfg = Self::default();
        cfg.consolidation.working_decay_rate = 0.25;
        cfg.consolidation.interleave_ratio = 0.5;
        cfg.reward.window = 5;
        cfg.hebbian.formation_threshold = 2;
        cfg
    }

    /// Task-executing agents: durable procedures, quicker promotion
    pub fn task_agent() -> Self {
        let mut cfg = Self::default();
        cfg.consolidation.working_decay_rate = 0.10;
        cfg.consolidation.transfer_rate = 0.12;
        cfg.consolidation.promote_threshold = 0.20;
        cfg
    }

    /// Personal assistants: forget slowly, weigh surrounding context heavily
    pub fn personal_assistant() -> Self {
        let mut cfg = Self::default();
        cfg.forgetting.forget_threshold = 0.005;
        cfg.activation.context_weight = 2.0;
        cfg.activation.pin_boost = 1.5;
        cfg
    }

    /// Research agents: importance dominates, broad candidate pools
    pub fn researcher() -> Self {
        let mut cfg = Self::default();
        cfg.activation.importance_weight = 1.0;
        cfg.search.candidate_cutoff = 200;
        cfg.search.default_min_confidence = 0.25;
        cfg
    }
}

// ============================================================================
// TESTS
// ============================================================================
