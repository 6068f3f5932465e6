//! Recall pipeline
//!
//! Candidate generation (lexical, then graph expansion through entities and
//! Hebbian neighbors), activation scoring, confidence filtering, and
//! ranking. Side effects on the returned memories (access records, stability
//! growth, co-activation) are committed by the caller in one transaction.

use std::collections::{BTreeSet, HashSet};

use crate::capabilities::{cosine_similarity, Tokenizer};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::memory::{Memory, RecallOptions, RecallResult};
use crate::storage::Store;
use crate::{activation, confidence, forgetting};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Per-call inputs the engine resolves before running the pipeline
pub struct RecallContext<'a> {
    /// Tokenizer used for FTS sanitization
    pub tokenizer: &'a dyn Tokenizer,
    /// Pre-embedded query vector, when an embedding provider is installed
    pub query_embedding: Option<&'a [f32]>,
    /// Current time, epoch seconds
    pub now: f64,
}

/// Run the recall pipeline; returns ranked results without side effects
pub fn recall(
    store: &Store,
    config: &EngineConfig,
    query: &str,
    opts: &RecallOptions,
    ctx: &RecallContext<'_>,
) -> Result<Vec<RecallResult>> {
    // 1. Lexical candidates
    let lexical_ids: Vec<String> = match super::sanitize_fts5_query(query, ctx.tokenizer) {
        Some(match_expr) => store.fts_candidates(&match_expr, config.search.candidate_cutoff)?,
        None => vec![],
    };
    let lexical_set: HashSet<&str> = lexical_ids.iter().map(String::as_str).collect();

    // Empty query or no hits: fall back to the full set under the filters
    let mut candidates: Vec<Memory> = if lexical_ids.is_empty() {
        store.all_memories()?
    } else {
        store.memories_by_ids(&lexical_ids)?
    };

    // 2. Filters
    candidates.retain(|m| passes_filters(m, opts, config));

    // 3. Graph expansion
    if opts.graph_expand && !candidates.is_empty() {
        let expansion = expand_candidates(store, &candidates)?;
        if !expansion.is_empty() {
            let seen: HashSet<String> = candidates.iter().map(|m| m.id.clone()).collect();
            let extra_ids: Vec<String> =
                expansion.into_iter().filter(|id| !seen.contains(id)).collect();
            let mut extra = store.memories_by_ids(&extra_ids)?;
            extra.retain(|m| passes_filters(m, opts, config));
            candidates.extend(extra);
        }
    }

    // 4-6. Score, attach confidence, filter
    let keywords: Vec<String> = opts.context.clone().unwrap_or_default();
    let min_confidence = opts
        .min_confidence
        .max(config.search.default_min_confidence);

    let mut scored: Vec<RecallResult> = Vec::with_capacity(candidates.len());
    for memory in &candidates {
        let access_times =
            store.access_times(&memory.id, config.activation.max_access_samples)?;
        let activation =
            activation::total(memory, &access_times, &keywords, ctx.now, &config.activation);
        if activation < config.activation.min_activation {
            continue;
        }

        let mut score = activation;
        if lexical_set.contains(memory.id.as_str()) {
            score += config.search.lexical_bonus;
        }
        if let Some(query_vec) = ctx.query_embedding {
            if let Some(stored) = store.embedding(&memory.id)? {
                score +=
                    config.search.semantic_weight * f64::from(cosine_similarity(query_vec, &stored));
            }
        }

        let strength = forgetting::memory_effective_strength(memory, ctx.now);
        let assessed = confidence::assess(memory, strength, &config.confidence);
        if assessed.composite < min_confidence {
            continue;
        }

        scored.push(RecallResult {
            id: memory.id.clone(),
            content: memory.content.clone(),
            memory_type: memory.memory_type,
            layer: memory.layer,
            importance: memory.importance,
            activation: score,
            strength,
            confidence: assessed.composite,
            confidence_label: confidence::label(assessed.composite),
            age_days: (ctx.now - memory.created_at).max(0.0) / SECONDS_PER_DAY,
        });
    }

    // 7. Rank and truncate; a zero limit means the configured default
    scored.sort_by(|a, b| {
        b.activation
            .partial_cmp(&a.activation)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let limit = if opts.limit == 0 {
        config.search.default_limit
    } else {
        opts.limit
    };
    scored.truncate(limit);
    Ok(scored)
}

fn passes_filters(memory: &Memory, opts: &RecallOptions, config: &EngineConfig) -> bool {
    if config.search.hard_contradiction && memory.contradicted_by.is_some() {
        return false;
    }
    if let Some(types) = &opts.types {
        if !types.contains(&memory.memory_type) {
            return false;
        }
    }
    if let Some(layers) = &opts.layers {
        if !layers.contains(&memory.layer) {
            return false;
        }
    }
    if let Some(range) = &opts.time_range {
        if !range.contains(memory.created_at) {
            return false;
        }
    }
    true
}

/// One-hop expansion: entity adjacency plus formed Hebbian neighbors
fn expand_candidates(store: &Store, candidates: &[Memory]) -> Result<Vec<String>> {
    let mut entity_set: HashSet<String> = HashSet::new();
    for memory in candidates {
        for entity in &memory.entities {
            entity_set.insert(entity.clone());
        }
    }

    let mut expanded: BTreeSet<String> = BTreeSet::new();

    if !entity_set.is_empty() {
        let entities: Vec<String> = entity_set.iter().cloned().collect();
        let adjacent = store.adjacent_entities(&entities)?;
        let mut all_entities = entities;
        all_entities.extend(adjacent);
        for id in store.memories_for_entities(&all_entities)? {
            expanded.insert(id);
        }
    }

    for memory in candidates {
        for neighbor in store.neighbors(&memory.id)? {
            expanded.insert(neighbor);
        }
    }

    Ok(expanded.into_iter().collect())
}
