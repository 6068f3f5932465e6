//! Injectable capabilities
//!
//! Small single-method seams the engine can run without: a tokenizer, an
//! entity extractor, and an embedding provider. Defaults are trivial so the
//! engine functions standalone; richer implementations (CJK tokenizers,
//! NER models, embedding backends) plug in from outside.

/// Splits text into tokens for lexical search and context matching
pub trait Tokenizer: Send + Sync {
    /// Tokenize `text`
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Extracts entity tokens from memory content
pub trait EntityExtractor: Send + Sync {
    /// Extract entities from `text`; order is preserved, duplicates allowed
    fn extract(&self, text: &str) -> Vec<String>;
}

/// Produces a fixed-dimension embedding vector for a string
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text`
    fn embed(&self, text: &str) -> Vec<f32>;
}

// ============================================================================
// TRIVIAL DEFAULTS
// ============================================================================

/// Default tokenizer: every non-alphanumeric character is a boundary
///
/// Splits at the same boundaries the FTS index's `ascii` tokenizer uses, so
/// query tokens line up with how content is indexed ("us-east-1" yields
/// "us", "east", "1" on both sides).
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

/// Extracts nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEntities;

impl EntityExtractor for NoEntities {
    fn extract(&self, _text: &str) -> Vec<String> {
        vec![]
    }
}

/// Cosine similarity between two vectors, 0.0 when either is degenerate
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_tokenizer() {
        let t = WhitespaceTokenizer;
        assert_eq!(
            t.tokenize("The DB, is  in us-east-1!"),
            vec!["the", "db", "is", "in", "us", "east", "1"]
        );
        assert!(t.tokenize("   ").is_empty());
        assert!(t.tokenize(" !! ").is_empty());
    }

    #[test]
    fn test_no_entities() {
        assert!(NoEntities.extract("Alice met Bob in Paris").is_empty());
    }

    #[test]
    fn test_cosine_similarity() {
        let a = [1.0, 0.0, 0.0];
        let b = [1.0, 0.0, 0.0];
        let c = [0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }
}
