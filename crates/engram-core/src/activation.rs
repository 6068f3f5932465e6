//! ACT-R activation scoring
//!
//! The additive score governing retrieval ranking:
//!
//! `A = B + C + I - contradiction + pin_boost`
//!
//! where B is the base-level recency/frequency term
//! `ln(sum((now - t_k + eps)^-d))` over the access history, C counts context
//! keyword matches, and I weighs intrinsic importance. All functions are
//! pure; the search pipeline composes them per candidate.

use crate::config::ActivationConfig;
use crate::memory::Memory;

/// Base-level activation from the access history
///
/// Falls back to `created_at` when the history is empty, so a never-accessed
/// memory still carries a recency signal. The epsilon floor keeps same-tick
/// accesses bounded.
pub fn base_level(now: f64, access_times: &[f64], created_at: f64, cfg: &ActivationConfig) -> f64 {
    let eps = cfg.epsilon.max(1e-3);
    let sum: f64 = if access_times.is_empty() {
        ((now - created_at).max(0.0) + eps).powf(-cfg.decay_rate)
    } else {
        access_times
            .iter()
            .map(|t_k| ((now - t_k).max(0.0) + eps).powf(-cfg.decay_rate))
            .sum()
    };
    sum.ln()
}

/// Context match term
///
/// Counts how many keywords appear case-insensitively in the content or
/// tags, scaled by the context weight. Keywords are weighted uniformly.
pub fn context_match(memory: &Memory, keywords: &[String], cfg: &ActivationConfig) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let content = memory.content.to_lowercase();
    let tags: Vec<String> = memory.tags.iter().map(|t| t.to_lowercase()).collect();

    let hits = keywords
        .iter()
        .filter(|kw| {
            let kw = kw.to_lowercase();
            !kw.is_empty() && (content.contains(&kw) || tags.iter().any(|t| t.contains(&kw)))
        })
        .count();

    hits as f64 * cfg.context_weight
}

/// Total activation for a memory at time `now`
pub fn total(
    memory: &Memory,
    access_times: &[f64],
    keywords: &[String],
    now: f64,
    cfg: &ActivationConfig,
) -> f64 {
    let mut score = base_level(now, access_times, memory.created_at, cfg)
        + context_match(memory, keywords, cfg)
        + cfg.importance_weight * memory.importance;

    if memory.contradicted_by.is_some() {
        score -= cfg.contradiction_penalty;
    }
    if memory.pinned {
        score += cfg.pin_boost;
    }
    score
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Layer, MemoryType};

    fn memory_at(created_at: f64) -> Memory {
        Memory {
            id: "m".into(),
            content: "the database lives in us-east-1".into(),
            memory_type: MemoryType::Factual,
            importance: 0.5,
            working_strength: 2.0,
            core_strength: 0.0,
            stability: 3.0,
            created_at,
            last_accessed_at: created_at,
            access_count: 0,
            layer: Layer::Working,
            pinned: false,
            source: None,
            tags: vec!["infra".into()],
            contradicted_by: None,
            contradicts: None,
            entities: vec![],
        }
    }

    #[test]
    fn test_base_level_recency() {
        let cfg = ActivationConfig::default();
        // Accessed 1 minute ago vs 1 day ago
        let recent = base_level(1000.0, &[940.0], 0.0, &cfg);
        let stale = base_level(86_400.0, &[0.0], 0.0, &cfg);
        assert!(recent > stale);
    }

    #[test]
    fn test_base_level_frequency() {
        let cfg = ActivationConfig::default();
        let once = base_level(1000.0, &[500.0], 0.0, &cfg);
        let thrice = base_level(1000.0, &[400.0, 500.0, 600.0], 0.0, &cfg);
        assert!(thrice > once);
    }

    #[test]
    fn test_base_level_same_tick_is_bounded() {
        let cfg = ActivationConfig::default();
        // Access at exactly `now`: the epsilon floor keeps the term finite
        let b = base_level(1000.0, &[1000.0], 0.0, &cfg);
        assert!(b.is_finite());
        // eps = 1e-3, d = 0.5 => ln(1000^0.5) ~= 3.45
        assert!((b - 3.4538).abs() < 1e-3);
    }

    #[test]
    fn test_base_level_empty_history_uses_created_at() {
        let cfg = ActivationConfig::default();
        let from_creation = base_level(86_400.0, &[], 0.0, &cfg);
        let from_access = base_level(86_400.0, &[0.0], 0.0, &cfg);
        assert!((from_creation - from_access).abs() < 1e-9);
    }

    #[test]
    fn test_context_match_counts_case_insensitive() {
        let cfg = ActivationConfig::default();
        let m = memory_at(0.0);
        let none = context_match(&m, &[], &cfg);
        assert_eq!(none, 0.0);

        let kws = vec!["DATABASE".to_string(), "infra".to_string(), "moon".to_string()];
        // two of three keywords hit (content + tag), each worth 1.5
        assert!((context_match(&m, &kws, &cfg) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_applies_penalty_and_boost() {
        let cfg = ActivationConfig::default();
        let now = 86_400.0;
        let mut m = memory_at(0.0);
        let plain = total(&m, &[], &[], now, &cfg);

        m.contradicted_by = Some("other".into());
        let contradicted = total(&m, &[], &[], now, &cfg);
        assert!((plain - contradicted - cfg.contradiction_penalty).abs() < 1e-9);

        m.contradicted_by = None;
        m.pinned = true;
        let pinned = total(&m, &[], &[], now, &cfg);
        assert!((pinned - plain - cfg.pin_boost).abs() < 1e-9);
    }

    #[test]
    fn test_importance_dominates_moderate_recency_gap() {
        // A 10-day recency gap is worth less than a 0.75 importance gap,
        // which is what lets important old memories outrank fresh trivia.
        let cfg = ActivationConfig::default();
        let now = 30.0 * 86_400.0;
        let mut old_important = memory_at(0.0);
        old_important.importance = 0.95;
        let mut fresh_trivial = memory_at(10.0 * 86_400.0);
        fresh_trivial.importance = 0.2;

        let a = total(&old_important, &[], &[], now, &cfg);
        let b = total(&fresh_trivial, &[], &[], now, &cfg);
        assert!(a > b);
    }
}
