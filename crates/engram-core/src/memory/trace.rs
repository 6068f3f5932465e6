//! Memory trace - The fundamental unit of storage
//!
//! Each trace carries content plus the state the dynamics operate on:
//! - Dual-trace strengths (working and core)
//! - Ebbinghaus stability
//! - Access bookkeeping for ACT-R activation
//! - Contradiction links and extracted entities

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

// ============================================================================
// MEMORY TYPES
// ============================================================================

/// Types of memories
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// A discrete fact or piece of information
    #[default]
    Factual,
    /// An event or experience
    Episodic,
    /// A relationship between entities
    Relational,
    /// An emotionally charged memory
    Emotional,
    /// How-to knowledge
    Procedural,
    /// A held opinion or preference
    Opinion,
}

/// All memory types in declaration order
pub const MEMORY_TYPES: [MemoryType; 6] = [
    MemoryType::Factual,
    MemoryType::Episodic,
    MemoryType::Relational,
    MemoryType::Emotional,
    MemoryType::Procedural,
    MemoryType::Opinion,
];

impl MemoryType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Factual => "factual",
            MemoryType::Episodic => "episodic",
            MemoryType::Relational => "relational",
            MemoryType::Emotional => "emotional",
            MemoryType::Procedural => "procedural",
            MemoryType::Opinion => "opinion",
        }
    }

    /// Parse from string name
    pub fn parse_name(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "factual" => Ok(MemoryType::Factual),
            "episodic" => Ok(MemoryType::Episodic),
            "relational" => Ok(MemoryType::Relational),
            "emotional" => Ok(MemoryType::Emotional),
            "procedural" => Ok(MemoryType::Procedural),
            "opinion" => Ok(MemoryType::Opinion),
            _ => Err(EngineError::InvalidArgument(format!(
                "unknown memory type: {s}"
            ))),
        }
    }

    /// Initial working strength assigned at creation
    pub fn initial_working_strength(&self) -> f64 {
        match self {
            MemoryType::Episodic => 1.0,
            MemoryType::Opinion => 1.5,
            MemoryType::Factual | MemoryType::Relational => 2.0,
            MemoryType::Procedural => 2.5,
            MemoryType::Emotional => 3.0,
        }
    }

    /// Initial Ebbinghaus stability in days
    pub fn initial_stability(&self) -> f64 {
        match self {
            MemoryType::Episodic => 1.0,
            MemoryType::Opinion => 2.0,
            MemoryType::Factual => 3.0,
            MemoryType::Relational => 4.0,
            MemoryType::Emotional => 6.0,
            MemoryType::Procedural => 10.0,
        }
    }

    /// Default importance used when the caller does not supply one
    pub fn default_importance(&self) -> f64 {
        match self {
            MemoryType::Episodic | MemoryType::Opinion => 0.4,
            MemoryType::Factual | MemoryType::Relational => 0.5,
            MemoryType::Emotional | MemoryType::Procedural => 0.6,
        }
    }

    /// Default metacognitive reliability
    pub fn default_reliability(&self) -> f64 {
        match self {
            MemoryType::Factual => 0.85,
            MemoryType::Episodic => 0.90,
            MemoryType::Relational => 0.75,
            MemoryType::Emotional => 0.95,
            MemoryType::Procedural => 0.90,
            MemoryType::Opinion => 0.60,
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// LAYERS
// ============================================================================

/// Storage layer a memory currently lives in
///
/// Derived from the dual-trace strengths during consolidation, but
/// materialized on the row for cheap filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Fresh traces, high churn
    #[default]
    Working,
    /// Consolidated, long-lived traces
    Core,
    /// Soft-retained traces that fell below both thresholds
    Archive,
}

impl Layer {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Working => "working",
            Layer::Core => "core",
            Layer::Archive => "archive",
        }
    }

    /// Parse from string name
    pub fn parse_name(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "working" => Ok(Layer::Working),
            "core" => Ok(Layer::Core),
            "archive" => Ok(Layer::Archive),
            _ => Err(EngineError::InvalidArgument(format!("unknown layer: {s}"))),
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// MEMORY
// ============================================================================

/// A memory trace
///
/// Strengths follow the dual-trace consolidation model: `working_strength`
/// holds the fast, labile trace and `core_strength` the slow consolidated
/// one. `stability` (days) is the time constant of the Ebbinghaus
/// retrievability factor and grows on successful retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// The stored text
    pub content: String,
    /// Type of memory
    pub memory_type: MemoryType,
    /// Semantic importance in [0, 1]
    pub importance: f64,
    /// Fast trace mass (r1)
    pub working_strength: f64,
    /// Slow trace mass (r2)
    pub core_strength: f64,
    /// Ebbinghaus time constant in days
    pub stability: f64,
    /// Creation time, epoch seconds
    pub created_at: f64,
    /// Last access time, epoch seconds
    pub last_accessed_at: f64,
    /// Number of recorded accesses
    pub access_count: i64,
    /// Materialized layer label
    pub layer: Layer,
    /// Pinned memories are exempt from decay, archival, and pruning
    pub pinned: bool,
    /// Provenance (URL, file, conversation, ...)
    pub source: Option<String>,
    /// Tags for categorization
    pub tags: Vec<String>,
    /// Id of the memory that contradicts this one, if any
    pub contradicted_by: Option<String>,
    /// Id of the memory this one contradicts, if any
    pub contradicts: Option<String>,
    /// Extracted entity tokens, ordered and deduplicated
    pub entities: Vec<String>,
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for creating a new memory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddInput {
    /// The content to store (must be non-empty)
    pub content: String,
    /// Type of memory
    #[serde(default)]
    pub memory_type: MemoryType,
    /// Importance in [0, 1]; per-type default when absent
    pub importance: Option<f64>,
    /// Provenance
    pub source: Option<String>,
    /// Tags for categorization
    #[serde(default)]
    pub tags: Vec<String>,
    /// Id of an existing memory this one contradicts
    pub contradicts: Option<String>,
}

impl AddInput {
    /// Shorthand for a plain content-only input
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            memory_type: MemoryType::default(),
            importance: None,
            source: None,
            tags: vec![],
            contradicts: None,
        }
    }
}

/// Inclusive time window over `created_at`, epoch seconds
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    /// Lower bound (None = unbounded)
    pub start: Option<f64>,
    /// Upper bound (None = unbounded)
    pub end: Option<f64>,
}

impl TimeRange {
    /// Whether `ts` falls inside the range
    pub fn contains(&self, ts: f64) -> bool {
        self.start.is_none_or(|s| ts >= s) && self.end.is_none_or(|e| ts <= e)
    }
}

/// Options for a recall query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RecallOptions {
    /// Maximum results to return
    pub limit: usize,
    /// Context keywords boosting matching memories
    pub context: Option<Vec<String>>,
    /// Restrict to these memory types
    pub types: Option<Vec<MemoryType>>,
    /// Restrict to these layers
    pub layers: Option<Vec<Layer>>,
    /// Drop results whose composite confidence falls below this
    #[serde(default)]
    pub min_confidence: f64,
    /// Restrict by creation time
    pub time_range: Option<TimeRange>,
    /// Expand candidates through entities and Hebbian neighbors
    pub graph_expand: bool,
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            context: None,
            types: None,
            layers: None,
            min_confidence: 0.0,
            time_range: None,
            graph_expand: true,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
