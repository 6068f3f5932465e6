//! # Engram Core
//!
//! Persistent, cognitively-grounded memory engine for conversational agents.
//! Stores short text traces with typed metadata and ranks them on demand by
//! a composite activation score fusing recency, frequency, lexical match,
//! semantic importance, and an emergent associative graph. The engine also
//! continuously reshapes its own state:
//!
//! - **ACT-R activation**: `ln(sum((now - t_k)^-d))` base-level recency and
//!   frequency, plus context and importance terms, governs ranking
//! - **Ebbinghaus forgetting**: per-memory stability drives a retrievability
//!   factor; effective strength prunes and classifies layers
//! - **Dual-trace consolidation**: a periodic "sleep" operator decays the
//!   working trace, transfers mass into the core trace, replays a sample,
//!   and downscales globally (synaptic homeostasis)
//! - **Hebbian association**: memories retrieved together form bidirectional
//!   links once their co-activation count crosses a threshold
//! - **Reward modulation**: signed feedback reinforces or suppresses the
//!   most recently accessed memories
//! - **Metacognitive confidence**: reliability x salience per retrieved
//!   memory, with coarse label bands
//!
//! Storage is a single SQLite file with an FTS5 lexical index; all writes
//! are transactional and a write-ahead journal keeps readers unblocked. One
//! process owns the file (advisory lock); the engine is synchronous and
//! in-process.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use engram_core::{AddInput, Engine, RecallOptions};
//!
//! # fn main() -> engram_core::Result<()> {
//! let engine = Engine::open(None)?;
//!
//! let id = engine.add(AddInput::new("the database lives in us-east-1"))?;
//!
//! let results = engine.recall("database", RecallOptions::default())?;
//! for hit in &results {
//!     println!("{} [{}] {}", hit.confidence_label, hit.activation, hit.content);
//! }
//!
//! // periodic maintenance, driven by the caller
//! engine.consolidate(1.0)?;
//! engine.forget_below(None)?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```
//!
//! Tokenization, entity extraction, and embeddings are injectable
//! capabilities with trivial defaults; the engine functions standalone.

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod activation;
pub mod anomaly;
pub mod capabilities;
pub mod confidence;
pub mod config;
pub mod consolidation;
pub mod engine;
pub mod error;
pub mod forgetting;
pub mod hebbian;
pub mod memory;
pub mod reward;
pub mod search;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use engine::Engine;

pub use error::{EngineError, Result};

pub use memory::{
    AddInput, ConsolidationSummary, ForgetOutcome, Layer, Memory, MemoryStats, MemoryType,
    RecallOptions, RecallResult, RewardOutcome, TimeRange,
};

pub use config::{
    ActivationConfig, AnomalyConfig, ConfidenceConfig, ConsolidationConfig, DownscaleConfig,
    EngineConfig, ForgettingConfig, HebbianConfig, RewardConfig, SearchConfig,
};

pub use capabilities::{
    cosine_similarity, EmbeddingProvider, EntityExtractor, NoEntities, Tokenizer,
    WhitespaceTokenizer,
};

pub use confidence::Confidence;
pub use reward::{Feedback, Polarity};
pub use storage::Store;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        AddInput, Engine, EngineConfig, EngineError, Feedback, Layer, Memory, MemoryStats,
        MemoryType, RecallOptions, RecallResult, Result, TimeRange,
    };
}
