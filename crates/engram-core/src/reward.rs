//! Reward modulation
//!
//! Feedback (free text or a signed score) is reduced to a polarity and
//! applied to the N most recently accessed memories with geometrically
//! decaying per-position weights, oldest position first.

use crate::config::RewardConfig;
use crate::error::{EngineError, Result};

/// Feedback accepted by `reward`
#[derive(Debug, Clone)]
pub enum Feedback {
    /// Free-text feedback; polarity is classified heuristically
    Text(String),
    /// Signed score in [-1, 1]
    Score(f64),
}

impl From<&str> for Feedback {
    fn from(s: &str) -> Self {
        Feedback::Text(s.to_string())
    }
}

impl From<f64> for Feedback {
    fn from(score: f64) -> Self {
        Feedback::Score(score)
    }
}

/// Feedback polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Reinforce
    Positive,
    /// Suppress
    Negative,
}

const POSITIVE_MARKERS: &[&str] = &[
    "great", "good", "thanks", "thank", "perfect", "yes", "correct", "helpful", "love", "nice",
];

const NEGATIVE_MARKERS: &[&str] = &[
    "wrong", "bad", "no", "incorrect", "error", "useless", "hate", "stop", "terrible",
];

/// Classify free-text feedback; `None` when no marker hits or both sides tie
pub fn classify_text(text: &str) -> Option<Polarity> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let positive = words.iter().filter(|w| POSITIVE_MARKERS.contains(w)).count();
    let negative = words.iter().filter(|w| NEGATIVE_MARKERS.contains(w)).count();

    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Some(Polarity::Positive),
        std::cmp::Ordering::Less => Some(Polarity::Negative),
        std::cmp::Ordering::Equal => None,
    }
}

/// Reduce feedback to a polarity; scores must lie in [-1, 1]
pub fn classify(feedback: &Feedback) -> Result<Option<Polarity>> {
    match feedback {
        Feedback::Text(text) => Ok(classify_text(text)),
        Feedback::Score(score) => {
            if !(-1.0..=1.0).contains(score) {
                return Err(EngineError::InvalidArgument(format!(
                    "reward score {score} outside [-1, 1]"
                )));
            }
            Ok(if *score > 0.0 {
                Some(Polarity::Positive)
            } else if *score < 0.0 {
                Some(Polarity::Negative)
            } else {
                None
            })
        }
    }
}

/// Per-position weight: gamma^k with k = 0 for the oldest in the window
pub fn position_weight(k: usize, cfg: &RewardConfig) -> f64 {
    cfg.position_decay.powi(k as i32)
}

/// New working strength and stability for one modulated memory
///
/// Positive feedback adds mass and compounds stability; negative feedback
/// suppresses the working trace multiplicatively and leaves stability alone.
pub fn modulate(
    working_strength: f64,
    stability: f64,
    polarity: Polarity,
    weight: f64,
    cfg: &RewardConfig,
) -> (f64, f64) {
    match polarity {
        Polarity::Positive => (
            working_strength + cfg.magnitude * weight,
            stability * (1.0 + cfg.strength_boost * weight),
        ),
        Polarity::Negative => (working_strength * (1.0 - cfg.suppression * weight), stability),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_text() {
        assert_eq!(classify_text("great, thanks!"), Some(Polarity::Positive));
        assert_eq!(classify_text("that was wrong"), Some(Polarity::Negative));
        assert_eq!(classify_text("hmm, interesting"), None);
        // a tie reads as neutral
        assert_eq!(classify_text("good but wrong"), None);
    }

    #[test]
    fn test_classify_score() {
        assert_eq!(
            classify(&Feedback::Score(0.8)).unwrap(),
            Some(Polarity::Positive)
        );
        assert_eq!(
            classify(&Feedback::Score(-0.2)).unwrap(),
            Some(Polarity::Negative)
        );
        assert_eq!(classify(&Feedback::Score(0.0)).unwrap(), None);
        assert!(classify(&Feedback::Score(1.5)).is_err());
    }

    #[test]
    fn test_position_weights_decay_geometrically() {
        let cfg = RewardConfig::default();
        assert_eq!(position_weight(0, &cfg), 1.0);
        assert_eq!(position_weight(1, &cfg), 0.5);
        assert_eq!(position_weight(2, &cfg), 0.25);
    }

    #[test]
    fn test_modulate_positive() {
        let cfg = RewardConfig::default();
        let (w, s) = modulate(2.0, 3.0, Polarity::Positive, 1.0, &cfg);
        assert!((w - 2.5).abs() < 1e-12);
        assert!((s - 3.3).abs() < 1e-12);
    }

    #[test]
    fn test_modulate_negative_suppresses_only_working() {
        let cfg = RewardConfig::default();
        let (w, s) = modulate(2.0, 3.0, Polarity::Negative, 0.5, &cfg);
        assert!((w - 2.0 * 0.9).abs() < 1e-12);
        assert_eq!(s, 3.0);
    }
}
