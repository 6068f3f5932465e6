//! Search
//!
//! Lexical candidate generation over FTS5 plus the recall pipeline that
//! expands, scores, filters, and ranks candidates.

mod recall;

pub use recall::{recall, RecallContext};

use crate::capabilities::Tokenizer;

/// Build a safe FTS5 MATCH expression from raw user input
///
/// Tokenizes with the installed tokenizer, quotes each token (doubling any
/// embedded quotes), and ORs them together so partial matches still rank.
/// The default tokenizer splits at the same non-alphanumeric boundaries as
/// the index's `ascii` tokenizer, so punctuated compounds ("us-east-1")
/// match their indexed form. Returns `None` for input that yields no
/// tokens.
pub fn sanitize_fts5_query(query: &str, tokenizer: &dyn Tokenizer) -> Option<String> {
    let tokens = tokenizer.tokenize(query);
    if tokens.is_empty() {
        return None;
    }
    let quoted: Vec<String> = tokens
        .iter()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    Some(quoted.join(" OR "))
}

// ============================================================================
// TESTS
// ============================================================================
