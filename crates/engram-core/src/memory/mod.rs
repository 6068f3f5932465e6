//! Memory module - Core types and data structures
//!
//! Carries the memory trace record, the dual-trace strength state, and the
//! record types surfaced by the engine façade.

mod trace;

pub use trace::{
    AddInput, Layer, Memory, MemoryType, RecallOptions, TimeRange, MEMORY_TYPES,
};

use serde::{Deserialize, Serialize};

// ============================================================================
// RECALL RESULTS
// ============================================================================

/// One ranked recall hit
///
/// A fixed record, not an open map: these fields are the whole contract.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallResult {
    /// Memory id
    pub id: String,
    /// Stored text
    pub content: String,
    /// Type of memory
    pub memory_type: MemoryType,
    /// Layer at retrieval time
    pub layer: Layer,
    /// Semantic importance in [0, 1]
    pub importance: f64,
    /// Composite activation score the ranking used
    pub activation: f64,
    /// Effective strength: max(working, core) x retrievability
    pub strength: f64,
    /// Composite metacognitive confidence in [0, 1]
    pub confidence: f64,
    /// Band label for `confidence`
    pub confidence_label: &'static str,
    /// Age since creation, days
    pub age_days: f64,
}

// ============================================================================
// MEMORY STATISTICS
// ============================================================================

/// Statistics about the memory store
#[non_exhaustive]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Total number of memories
    pub total_memories: i64,
    /// Memories in the working layer
    pub working_count: i64,
    /// Memories in the core layer
    pub core_count: i64,
    /// Memories in the archive layer
    pub archive_count: i64,
    /// Pinned memories
    pub pinned_count: i64,
    /// Counts per memory type, in type declaration order
    pub type_counts: Vec<(String, i64)>,
    /// Average importance
    pub average_importance: f64,
    /// Average working strength
    pub average_working_strength: f64,
    /// Average core strength
    pub average_core_strength: f64,
    /// Average stability (days)
    pub average_stability: f64,
    /// Formed Hebbian links (strength > 0, counted per direction)
    pub formed_links: i64,
    /// Tracked pairs not yet formed
    pub tracked_pairs: i64,
    /// Distinct entities in the inverted index
    pub distinct_entities: i64,
    /// Total access records
    pub total_accesses: i64,
}

// ============================================================================
// CONSOLIDATION SUMMARY
// ============================================================================

/// Result of one consolidation cycle
#[non_exhaustive]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationSummary {
    /// Memories processed by the cycle
    pub memories_processed: i64,
    /// Total mass moved from working to core trace
    pub mass_transferred: f64,
    /// Memories replayed (core boost + synthetic access)
    pub memories_replayed: i64,
    /// Memories promoted to the core layer
    pub promoted: i64,
    /// Memories demoted to the archive layer
    pub archived: i64,
    /// Hebbian link rows decayed
    pub links_decayed: i64,
    /// Hebbian pairs pruned after decay
    pub links_pruned: i64,
    /// Strength values clamped by the anomaly cap
    pub anomalies_clamped: i64,
    /// Access-log rows pruned past the retention horizon
    pub access_rows_pruned: i64,
    /// Wall-clock duration, milliseconds
    pub duration_ms: i64,
}

// ============================================================================
// FORGETTING
// ============================================================================

/// Outcome of a threshold forget pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgetOutcome {
    /// Unpinned memories deleted
    pub deleted: i64,
    /// Pinned memories moved to the archive layer instead
    pub archived: i64,
}

/// Outcome of a reward application
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardOutcome {
    /// Memories whose strengths were modulated
    pub modulated: i64,
    /// Polarity applied: +1 positive, -1 negative, 0 neutral/no-op
    pub polarity: i8,
}
