//! Cycle math
//!
//! Pure per-memory operators for one consolidation cycle. Every factor
//! scales with `days` so a zero-length cycle is the identity on strengths;
//! the store applies these inside a single transaction.

use crate::config::ConsolidationConfig;
use crate::memory::Layer;

/// Working-trace decay multiplier: exp(-mu1 * days)
pub fn working_decay_factor(cfg: &ConsolidationConfig, days: f64) -> f64 {
    (-cfg.working_decay_rate * days).exp()
}

/// Core-trace decay multiplier: exp(-mu2 * days)
pub fn core_decay_factor(cfg: &ConsolidationConfig, days: f64) -> f64 {
    (-cfg.core_decay_rate * days).exp()
}

/// Mass transferred from working to core this cycle
///
/// `working` is the post-decay working strength. The delta is capped at the
/// available mass so the working trace never goes negative.
pub fn transfer_delta(cfg: &ConsolidationConfig, days: f64, working: f64, importance: f64) -> f64 {
    let delta = cfg.transfer_rate * days * working * importance.max(cfg.importance_floor);
    delta.min(working).max(0.0)
}

/// Layer for a memory after a cycle
pub fn classify_layer(
    cfg: &ConsolidationConfig,
    core: f64,
    working: f64,
    pinned: bool,
) -> Layer {
    if pinned || core >= cfg.promote_threshold {
        Layer::Core
    } else if core <= cfg.demote_threshold && working <= cfg.archive_threshold {
        Layer::Archive
    } else {
        Layer::Working
    }
}

/// Replay slots split between recent and older memories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPlan {
    /// Slots filled from memories accessed in the last 24h, most recent first
    pub recent: usize,
    /// Slots filled from older memories, highest importance first
    pub older: usize,
}

/// Partition the replay sample per the interleave ratio
pub fn replay_partition(cfg: &ConsolidationConfig) -> ReplayPlan {
    let recent = (cfg.replay_sample_size as f64 * cfg.interleave_ratio).ceil() as usize;
    let recent = recent.min(cfg.replay_sample_size);
    ReplayPlan {
        recent,
        older: cfg.replay_sample_size - recent,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_days_is_identity() {
        let cfg = ConsolidationConfig::default();
        assert_eq!(working_decay_factor(&cfg, 0.0), 1.0);
        assert_eq!(core_decay_factor(&cfg, 0.0), 1.0);
        assert_eq!(transfer_delta(&cfg, 0.0, 5.0, 0.9), 0.0);
    }

    #[test]
    fn test_decay_factors_shrink_with_days() {
        let cfg = ConsolidationConfig::default();
        assert!(working_decay_factor(&cfg, 1.0) < 1.0);
        assert!(working_decay_factor(&cfg, 2.0) < working_decay_factor(&cfg, 1.0));
        // core decays far slower than working
        assert!(core_decay_factor(&cfg, 1.0) > working_decay_factor(&cfg, 1.0));
    }

    #[test]
    fn test_transfer_respects_importance_floor() {
        let cfg = ConsolidationConfig::default();
        let at_zero = transfer_delta(&cfg, 1.0, 2.0, 0.0);
        let at_floor = transfer_delta(&cfg, 1.0, 2.0, cfg.importance_floor);
        assert_eq!(at_zero, at_floor);
        assert!(transfer_delta(&cfg, 1.0, 2.0, 0.9) > at_floor);
    }

    #[test]
    fn test_transfer_never_exceeds_working_mass() {
        let mut cfg = ConsolidationConfig::default();
        cfg.transfer_rate = 10.0;
        let delta = transfer_delta(&cfg, 5.0, 1.0, 1.0);
        assert!(delta <= 1.0);
    }

    #[test]
    fn test_classify_layer() {
        let cfg = ConsolidationConfig::default();
        assert_eq!(classify_layer(&cfg, 0.3, 0.0, false), Layer::Core);
        assert_eq!(classify_layer(&cfg, 0.0, 0.05, false), Layer::Archive);
        assert_eq!(classify_layer(&cfg, 0.1, 0.5, false), Layer::Working);
        // low strengths but pinned stays core
        assert_eq!(classify_layer(&cfg, 0.0, 0.0, true), Layer::Core);
    }

    #[test]
    fn test_replay_partition() {
        let cfg = ConsolidationConfig::default();
        let plan = replay_partition(&cfg);
        assert_eq!(plan.recent + plan.older, cfg.replay_sample_size);
        assert_eq!(plan.recent, 6); // ceil(20 * 0.3)
    }
}
