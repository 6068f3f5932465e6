//! Engine façade
//!
//! The public surface external collaborators wire against: add, recall,
//! consolidate, forget, reward, pin, update, stats, downscale, export. Holds
//! the configuration as a value and wires the components; callers serialize
//! access at this level.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use lru::LruCache;
use uuid::Uuid;

use crate::capabilities::{
    EmbeddingProvider, EntityExtractor, NoEntities, Tokenizer, WhitespaceTokenizer,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::memory::{
    AddInput, ConsolidationSummary, ForgetOutcome, Layer, Memory, MemoryStats, RecallOptions,
    RecallResult, RewardOutcome,
};
use crate::reward::{self, Feedback, Polarity};
use crate::search::{self, RecallContext};
use crate::storage::Store;
use crate::{anomaly, consolidation};

/// Queries whose embeddings are kept hot
const QUERY_CACHE_SIZE: usize = 100;

/// Current time as epoch seconds
fn now_ts() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}

// ============================================================================
// ENGINE
// ============================================================================

/// The memory engine
///
/// Re-entrant but not thread-safe at the façade; callers serialize. Two
/// engines in one process can hold divergent configs.
pub struct Engine {
    config: EngineConfig,
    store: Store,
    tokenizer: Box<dyn Tokenizer>,
    entity_extractor: Box<dyn EntityExtractor>,
    embedder: Option<Box<dyn EmbeddingProvider>>,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl Engine {
    /// Open an engine with the default configuration
    ///
    /// `None` resolves a platform-specific data directory for the database
    /// file.
    pub fn open(db_path: Option<PathBuf>) -> Result<Self> {
        Self::with_config(db_path, EngineConfig::default())
    }

    /// Open an engine with an explicit configuration
    pub fn with_config(db_path: Option<PathBuf>, config: EngineConfig) -> Result<Self> {
        let store = Store::open(db_path)?;
        Ok(Self {
            config,
            store,
            tokenizer: Box::new(WhitespaceTokenizer),
            entity_extractor: Box::new(NoEntities),
            embedder: None,
            query_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_SIZE).expect("cache size is non-zero"),
            )),
        })
    }

    /// Replace the tokenizer capability
    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Replace the entity extractor capability
    pub fn with_entity_extractor(mut self, extractor: Box<dyn EntityExtractor>) -> Self {
        self.entity_extractor = extractor;
        self
    }

    /// Install an embedding provider
    pub fn with_embedding_provider(mut self, provider: Box<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(provider);
        self
    }

    /// The active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the engine has entered degraded read-only mode
    pub fn is_degraded(&self) -> bool {
        self.store.is_degraded()
    }

    // ========================================================================
    // ADD / UPDATE
    // ========================================================================

    /// Store a new memory; returns its id
    pub fn add(&self, input: AddInput) -> Result<String> {
        if input.content.trim().is_empty() {
            return Err(EngineError::InvalidArgument("content is empty".to_string()));
        }
        let importance = input
            .importance
            .unwrap_or_else(|| input.memory_type.default_importance());
        if !(0.0..=1.0).contains(&importance) {
            return Err(EngineError::InvalidArgument(format!(
                "importance {importance} outside [0, 1]"
            )));
        }

        if let Some(old_id) = &input.contradicts {
            let old = self
                .store
                .get_memory(old_id)?
                .ok_or_else(|| EngineError::NotFound(old_id.clone()))?;
            if old.contradicted_by.is_some() {
                return Err(EngineError::Conflict(format!(
                    "memory {old_id} is already contradicted"
                )));
            }
        }

        let now = now_ts();
        let memory = self.build_memory(input, importance, now);
        self.store.insert_memory(&memory)?;
        self.embed_content(&memory.id, &memory.content);
        Ok(memory.id)
    }

    fn build_memory(&self, input: AddInput, importance: f64, now: f64) -> Memory {
        let mut seen = HashSet::new();
        let entities: Vec<String> = self
            .entity_extractor
            .extract(&input.content)
            .into_iter()
            .filter(|e| !e.is_empty() && seen.insert(e.clone()))
            .collect();

        let core_strength =
            if importance >= self.config.consolidation.core_seed_importance_floor {
                self.config.consolidation.initial_core_seed
            } else {
                0.0
            };

        Memory {
            id: Uuid::new_v4().to_string(),
            working_strength: input.memory_type.initial_working_strength(),
            core_strength,
            stability: input.memory_type.initial_stability(),
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            layer: Layer::Working,
            pinned: false,
            memory_type: input.memory_type,
            importance,
            content: input.content,
            source: input.source,
            tags: input.tags,
            contradicted_by: None,
            contradicts: input.contradicts,
            entities,
        }
    }

    fn embed_content(&self, id: &str, content: &str) {
        if let Some(embedder) = &self.embedder {
            let vector = embedder.embed(content);
            if let Err(e) = self.store.store_embedding(id, &vector) {
                tracing::warn!(id = %id, "failed to store embedding: {e}");
            }
        }
    }

    /// Supersede a memory with new content
    ///
    /// Creates a new memory copying the old one's metadata, marks the pair
    /// as contradicting each other atomically, and returns the new id.
    /// Updating an already-contradicted memory is a conflict; contradiction
    /// chains are not allowed.
    pub fn update_memory(&self, id: &str, new_content: &str) -> Result<String> {
        if new_content.trim().is_empty() {
            return Err(EngineError::InvalidArgument("content is empty".to_string()));
        }
        let old = self
            .store
            .get_memory(id)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        if old.contradicted_by.is_some() {
            return Err(EngineError::Conflict(format!(
                "memory {id} is already contradicted"
            )));
        }

        let input = AddInput {
            content: new_content.to_string(),
            memory_type: old.memory_type,
            importance: Some(old.importance),
            source: old.source.clone(),
            tags: old.tags.clone(),
            contradicts: Some(old.id.clone()),
        };
        let now = now_ts();
        let memory = self.build_memory(input, old.importance, now);
        self.store.insert_memory(&memory)?;
        self.embed_content(&memory.id, &memory.content);
        Ok(memory.id)
    }

    // ========================================================================
    // RECALL
    // ========================================================================

    /// Retrieve memories ranked by composite activation
    ///
    /// Side effects on the returned memories (access record, stability
    /// growth, co-activation batch) commit in one transaction. Never fails
    /// on a query with no hits; returns an empty list instead.
    pub fn recall(&self, query: &str, opts: RecallOptions) -> Result<Vec<RecallResult>> {
        let now = now_ts();
        let query_embedding = self.query_embedding(query)?;
        let ctx = RecallContext {
            tokenizer: self.tokenizer.as_ref(),
            query_embedding: query_embedding.as_deref(),
            now,
        };
        let results = search::recall(&self.store, &self.config, query, &opts, &ctx)?;

        let ids: Vec<String> = results.iter().map(|r| r.id.clone()).collect();
        self.store.commit_retrieval(
            &ids,
            now,
            self.config.forgetting.stability_growth,
            &self.config.hebbian,
            &self.config.anomaly,
        )?;
        Ok(results)
    }

    fn query_embedding(&self, query: &str) -> Result<Option<Vec<f32>>> {
        let embedder = match &self.embedder {
            Some(e) if !query.trim().is_empty() => e,
            _ => return Ok(None),
        };
        let mut cache = self
            .query_cache
            .lock()
            .map_err(|_| EngineError::StorageUnavailable("query cache poisoned".to_string()))?;
        if let Some(hit) = cache.get(query) {
            return Ok(Some(hit.clone()));
        }
        let vector = embedder.embed(query);
        cache.put(query.to_string(), vector.clone());
        Ok(Some(vector))
    }

    /// Get a memory by id
    pub fn get(&self, id: &str) -> Result<Memory> {
        self.store
            .get_memory(id)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Formed Hebbian neighbors of a memory
    pub fn neighbors(&self, id: &str) -> Result<Vec<String>> {
        if self.store.get_memory(id)?.is_none() {
            return Err(EngineError::NotFound(id.to_string()));
        }
        self.store.neighbors(id)
    }

    /// Boost a formed link between two memories; false when no link exists
    pub fn strengthen_link(&self, id1: &str, id2: &str, boost: f64) -> Result<bool> {
        self.store
            .strengthen_link(id1, id2, boost, &self.config.hebbian)
    }

    // ========================================================================
    // DYNAMICS
    // ========================================================================

    /// Run one consolidation cycle covering `days` of elapsed time
    pub fn consolidate(&self, days: f64) -> Result<ConsolidationSummary> {
        if !days.is_finite() || days < 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "days must be non-negative, got {days}"
            )));
        }
        self.store.run_consolidation(&self.config, days, now_ts())
    }

    /// Apply reward feedback to the most recently accessed memories
    pub fn reward(&self, feedback: impl Into<Feedback>) -> Result<RewardOutcome> {
        let feedback = feedback.into();
        let polarity = match reward::classify(&feedback)? {
            Some(polarity) => polarity,
            None => return Ok(RewardOutcome::default()),
        };

        let window = self.store.recent_accessed(self.config.reward.window)?;
        let mut updates = Vec::with_capacity(window.len());
        for (k, (id, working, stability)) in window.into_iter().enumerate() {
            let weight = reward::position_weight(k, &self.config.reward);
            let (new_working, new_stability) =
                reward::modulate(working, stability, polarity, weight, &self.config.reward);
            let (new_working, _) = anomaly::clamp_strength(new_working, &self.config.anomaly);
            let (new_stability, _) = anomaly::clamp_stability(new_stability, &self.config.anomaly);
            updates.push((id, new_working, new_stability));
        }

        let modulated = self.store.apply_reward(&updates)? as i64;
        Ok(RewardOutcome {
            modulated,
            polarity: match polarity {
                Polarity::Positive => 1,
                Polarity::Negative => -1,
            },
        })
    }

    /// Multiply both strengths of every unpinned memory by `factor`
    pub fn downscale(&self, factor: Option<f64>) -> Result<usize> {
        let factor = factor.unwrap_or(self.config.downscale.factor);
        if !factor.is_finite() || factor <= 0.0 || factor > 1.0 {
            return Err(EngineError::InvalidArgument(format!(
                "downscale factor must lie in (0, 1], got {factor}"
            )));
        }
        self.store.downscale(factor)
    }

    // ========================================================================
    // FORGETTING
    // ========================================================================

    /// Hard-delete a memory by id
    ///
    /// Pinned memories cannot be deleted; unpin first.
    pub fn forget(&self, id: &str) -> Result<()> {
        let memory = self
            .store
            .get_memory(id)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        if memory.pinned {
            return Err(EngineError::InvalidArgument(format!(
                "memory {id} is pinned"
            )));
        }
        self.store.delete_memory(id)?;
        Ok(())
    }

    /// Prune memories whose effective strength fell below the threshold
    ///
    /// Unpinned memories are deleted; pinned ones are archived instead.
    /// `None` uses the configured threshold.
    pub fn forget_below(&self, threshold: Option<f64>) -> Result<ForgetOutcome> {
        let threshold = threshold.unwrap_or(self.config.forgetting.forget_threshold);
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "threshold must be non-negative, got {threshold}"
            )));
        }
        self.store.forget_below(threshold, now_ts())
    }

    /// Pin a memory, exempting it from decay, archival, and pruning
    ///
    /// Returns whether the flag changed.
    pub fn pin(&self, id: &str) -> Result<bool> {
        self.store.set_pinned(id, true)
    }

    /// Unpin a memory; returns whether the flag changed
    pub fn unpin(&self, id: &str) -> Result<bool> {
        self.store.set_pinned(id, false)
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    /// Aggregate statistics
    pub fn stats(&self) -> Result<MemoryStats> {
        self.store.stats()
    }

    /// Export the full state as a JSON document; returns bytes written
    pub fn export(&self, path: &Path) -> Result<u64> {
        self.store.export_json(path, now_ts())
    }

    /// Replay partition preview for the current config; handy for callers
    /// scheduling consolidation
    pub fn replay_plan(&self) -> consolidation::ReplayPlan {
        consolidation::replay_partition(&self.config.consolidation)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{EntityExtractor, WhitespaceTokenizer};
    use crate::memory::MemoryType;

    const DAY: f64 = 86_400.0;

    fn temp_engine() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(Some(dir.path().join("engram.db"))).unwrap();
        (dir, engine)
    }

    fn add_factual(engine: &Engine, content: &str, importance: f64) -> String {
        engine
            .add(AddInput {
                importance: Some(importance),
                ..AddInput::new(content)
            })
            .unwrap()
    }

    /// Shift a memory's clock fields into the past
    fn age_memory(engine: &Engine, id: &str, age_seconds: f64) {
        let memory = engine.get(id).unwrap();
        engine
            .store
            .set_timestamps(
                id,
                memory.created_at - age_seconds,
                memory.last_accessed_at - age_seconds,
            )
            .unwrap();
    }

    #[test]
    fn test_add_validations() {
        let (_dir, engine) = temp_engine();
        assert!(matches!(
            engine.add(AddInput::new("   ")),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.add(AddInput {
                importance: Some(1.5),
                ..AddInput::new("x")
            }),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.add(AddInput {
                contradicts: Some("missing".to_string()),
                ..AddInput::new("x")
            }),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_add_initializes_per_type() {
        let (_dir, engine) = temp_engine();
        let id = engine
            .add(AddInput {
                memory_type: MemoryType::Procedural,
                ..AddInput::new("how to deploy")
            })
            .unwrap();
        let memory = engine.get(&id).unwrap();
        assert_eq!(memory.working_strength, 2.5);
        assert_eq!(memory.stability, 10.0);
        assert_eq!(memory.core_strength, 0.0);
        assert_eq!(memory.layer, Layer::Working);

        // importance at the floor seeds the core trace
        let important = add_factual(&engine, "the root password ritual", 0.9);
        let memory = engine.get(&important).unwrap();
        assert_eq!(memory.core_strength, 0.1);
    }

    #[test]
    fn test_recency_ranks_over_staleness() {
        // S1: a fresh memory outranks a 30-day-old one of equal importance
        let (_dir, engine) = temp_engine();
        let a = add_factual(&engine, "memory a", 0.5);
        age_memory(&engine, &a, 30.0 * DAY);
        let b = add_factual(&engine, "memory b", 0.5);

        let results = engine
            .recall(
                "",
                RecallOptions {
                    limit: 2,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, b);
        assert_eq!(results[1].id, a);
        assert!(results[1].age_days > 29.0);
    }

    #[test]
    fn test_importance_persists_over_recency() {
        // S2: high importance beats a 10-day recency advantage
        let (_dir, engine) = temp_engine();
        let a = add_factual(&engine, "memory a", 0.95);
        age_memory(&engine, &a, 30.0 * DAY);
        let b = add_factual(&engine, "memory b", 0.2);
        age_memory(&engine, &b, 20.0 * DAY);

        let results = engine.recall("", RecallOptions::default()).unwrap();
        assert_eq!(results[0].id, a);
        assert_eq!(results[1].id, b);
    }

    #[test]
    fn test_hebbian_formation_through_recall() {
        // S3: three co-retrievals form links among all returned memories
        let (_dir, engine) = temp_engine();
        let x = add_factual(&engine, "zebra stripes pattern", 0.5);
        let y = add_factual(&engine, "zebra habitat savanna", 0.5);
        let z = add_factual(&engine, "zebra social herds", 0.5);

        for _ in 0..3 {
            let results = engine.recall("zebra", RecallOptions::default()).unwrap();
            assert_eq!(results.len(), 3);
        }

        let mut neighbors = engine.neighbors(&x).unwrap();
        neighbors.sort();
        let mut expected = vec![y.clone(), z.clone()];
        expected.sort();
        assert_eq!(neighbors, expected);

        let (strength, count) = engine.store.link(&x, &y).unwrap().unwrap();
        assert_eq!(strength, 1.0);
        assert_eq!(count, 3);
        let (reverse_strength, reverse_count) = engine.store.link(&y, &x).unwrap().unwrap();
        assert_eq!(reverse_strength, 1.0);
        assert_eq!(reverse_count, 3);
    }

    #[test]
    fn test_contradiction_attenuates() {
        // S4: the superseding memory outranks the superseded one
        let (_dir, engine) = temp_engine();
        let a = add_factual(&engine, "the database lives in us-east-1", 0.5);
        let b = engine
            .update_memory(&a, "the database lives in us-west-2")
            .unwrap();

        let results = engine.recall("database", RecallOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, b);
        assert_eq!(results[1].id, a);
        assert!(matches!(
            results[1].confidence_label,
            "uncertain" | "vague"
        ));

        let old = engine.get(&a).unwrap();
        assert_eq!(old.contradicted_by.as_deref(), Some(b.as_str()));
        let new = engine.get(&b).unwrap();
        assert_eq!(new.contradicts.as_deref(), Some(a.as_str()));
    }

    #[test]
    fn test_update_of_contradicted_memory_conflicts() {
        let (_dir, engine) = temp_engine();
        let a = add_factual(&engine, "v1", 0.5);
        let _b = engine.update_memory(&a, "v2").unwrap();
        assert!(matches!(
            engine.update_memory(&a, "v3"),
            Err(EngineError::Conflict(_))
        ));
    }

    #[test]
    fn test_pin_exempts_from_forget() {
        // S5: threshold pruning removes everything except the pinned memory
        let (_dir, engine) = temp_engine();
        let mut ids = Vec::new();
        for i in 0..10 {
            ids.push(add_factual(&engine, &format!("memory {i}"), 0.5));
        }
        assert!(engine.pin(&ids[3]).unwrap());
        assert!(!engine.pin(&ids[3]).unwrap());

        let outcome = engine.forget_below(Some(100.0)).unwrap();
        assert_eq!(outcome.deleted, 9);
        assert_eq!(outcome.archived, 1);
        assert!(engine.get(&ids[3]).is_ok());
        assert!(matches!(engine.get(&ids[0]), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_forget_by_id_refuses_pinned() {
        let (_dir, engine) = temp_engine();
        let id = add_factual(&engine, "keep me", 0.5);
        engine.pin(&id).unwrap();
        assert!(matches!(
            engine.forget(&id),
            Err(EngineError::InvalidArgument(_))
        ));
        engine.unpin(&id).unwrap();
        engine.forget(&id).unwrap();
        assert!(matches!(engine.get(&id), Err(EngineError::NotFound(_))));
        assert!(matches!(
            engine.forget("missing"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_reward_modulates_recent_window() {
        let (_dir, engine) = temp_engine();
        let id = add_factual(&engine, "useful fact", 0.5);
        let before = engine.get(&id).unwrap();

        let outcome = engine.reward("great, thanks!").unwrap();
        assert_eq!(outcome.modulated, 1);
        assert_eq!(outcome.polarity, 1);

        let after = engine.get(&id).unwrap();
        assert!(after.working_strength > before.working_strength);
        assert!(after.stability > before.stability);

        let negative = engine.reward("that was wrong").unwrap();
        assert_eq!(negative.polarity, -1);
        let suppressed = engine.get(&id).unwrap();
        assert!(suppressed.working_strength < after.working_strength);

        // neutral feedback is a no-op
        let neutral = engine.reward("hmm").unwrap();
        assert_eq!(neutral.modulated, 0);
        assert_eq!(neutral.polarity, 0);
    }

    #[test]
    fn test_reward_score_validation() {
        let (_dir, engine) = temp_engine();
        assert!(matches!(
            engine.reward(2.0),
            Err(EngineError::InvalidArgument(_))
        ));
        let outcome = engine.reward(0.0).unwrap();
        assert_eq!(outcome.modulated, 0);
    }

    #[test]
    fn test_downscale_bounds_reward_growth() {
        // S6: a hostile reward stream stays finite under the anomaly cap
        let (_dir, engine) = temp_engine();
        let id = add_factual(&engine, "flattered memory", 0.5);
        for _ in 0..1000 {
            engine.reward("great!").unwrap();
        }
        engine.consolidate(1.0).unwrap();

        let memory = engine.get(&id).unwrap();
        assert!(memory.working_strength.is_finite());
        assert!(memory.working_strength <= engine.config().anomaly.max_strength);
        assert!(memory.stability <= engine.config().anomaly.max_stability);
    }

    #[test]
    fn test_consolidate_rejects_negative_days() {
        let (_dir, engine) = temp_engine();
        assert!(matches!(
            engine.consolidate(-1.0),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.consolidate(f64::NAN),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_zero_cycle_is_identity() {
        // Property 4: consolidate(D) then consolidate(0) == consolidate(D)
        let (_dir, first) = temp_engine();
        let (_dir2, second) = temp_engine();

        for engine in [&first, &second] {
            add_factual(engine, "alpha", 0.9);
            add_factual(engine, "beta", 0.3);
        }
        first.consolidate(2.0).unwrap();
        second.consolidate(2.0).unwrap();
        second.consolidate(0.0).unwrap();

        let strengths = |engine: &Engine| -> Vec<(f64, f64)> {
            let mut all: Vec<Memory> = engine.store.all_memories().unwrap();
            all.sort_by(|a, b| a.content.cmp(&b.content));
            all.iter()
                .map(|m| (m.working_strength, m.core_strength))
                .collect()
        };
        let a = strengths(&first);
        let b = strengths(&second);
        for ((w1, c1), (w2, c2)) in a.iter().zip(b.iter()) {
            assert!((w1 - w2).abs() < 1e-9);
            assert!((c1 - c2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_consolidation_moves_mass_and_layers() {
        let (_dir, engine) = temp_engine();
        let id = add_factual(&engine, "to be consolidated", 0.9);
        let before = engine.get(&id).unwrap();

        let summary = engine.consolidate(1.0).unwrap();
        assert_eq!(summary.memories_processed, 1);
        assert!(summary.mass_transferred > 0.0);

        let after = engine.get(&id).unwrap();
        assert!(after.working_strength < before.working_strength);
        assert!(after.core_strength > 0.0);

        // a few more cycles push enough mass into the core trace to promote
        for _ in 0..4 {
            engine.consolidate(1.0).unwrap();
        }
        let settled = engine.get(&id).unwrap();
        assert_eq!(settled.layer, Layer::Core);
        assert!(settled.core_strength >= engine.config().consolidation.promote_threshold);
    }

    #[test]
    fn test_pinned_memory_survives_consolidation_unscaled() {
        let (_dir, engine) = temp_engine();
        let id = add_factual(&engine, "pinned forever", 0.5);
        engine.pin(&id).unwrap();

        engine.consolidate(5.0).unwrap();
        let memory = engine.get(&id).unwrap();
        // pinned: layer forced core, working trace only loses transfer mass
        assert_eq!(memory.layer, Layer::Core);
        assert!(memory.working_strength + memory.core_strength >= 2.0 - 1e-9);
    }

    #[test]
    fn test_access_count_matches_rows() {
        // Property 1: access_count equals live access rows
        let (_dir, engine) = temp_engine();
        let id = add_factual(&engine, "counted memory", 0.5);
        for _ in 0..4 {
            engine.recall("counted", RecallOptions::default()).unwrap();
        }
        engine.consolidate(1.0).unwrap();

        let memory = engine.get(&id).unwrap();
        assert_eq!(
            memory.access_count,
            engine.store.access_row_count(&id).unwrap()
        );
        assert!(memory.access_count >= 4);
    }

    #[test]
    fn test_recall_never_decreases_stability() {
        // Property 6
        let (_dir, engine) = temp_engine();
        let id = add_factual(&engine, "stable memory", 0.5);
        let mut last = engine.get(&id).unwrap().stability;
        for _ in 0..5 {
            engine.recall("stable", RecallOptions::default()).unwrap();
            let current = engine.get(&id).unwrap().stability;
            assert!(current >= last);
            last = current;
        }
    }

    #[test]
    fn test_recall_filters() {
        let (_dir, engine) = temp_engine();
        let fact = add_factual(&engine, "shared topic fact", 0.5);
        let episode = engine
            .add(AddInput {
                memory_type: MemoryType::Episodic,
                ..AddInput::new("shared topic episode")
            })
            .unwrap();

        let only_facts = engine
            .recall(
                "shared topic",
                RecallOptions {
                    types: Some(vec![MemoryType::Factual]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(only_facts.len(), 1);
        assert_eq!(only_facts[0].id, fact);

        let layered = engine
            .recall(
                "shared topic",
                RecallOptions {
                    layers: Some(vec![Layer::Archive]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(layered.is_empty());

        let _ = episode;
    }

    #[test]
    fn test_recall_empty_query_returns_all_under_limit() {
        let (_dir, engine) = temp_engine();
        for i in 0..8 {
            add_factual(&engine, &format!("filler {i}"), 0.5);
        }
        let results = engine.recall("", RecallOptions::default()).unwrap();
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_graph_expansion_pulls_entity_neighbors() {
        struct CapitalExtractor;
        impl EntityExtractor for CapitalExtractor {
            fn extract(&self, text: &str) -> Vec<String> {
                text.split_whitespace()
                    .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
                    .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
                    .collect()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(Some(dir.path().join("engram.db")))
            .unwrap()
            .with_entity_extractor(Box::new(CapitalExtractor))
            .with_tokenizer(Box::new(WhitespaceTokenizer));

        let _direct = add_factual(&engine, "Alice runs the billing service", 0.5);
        let related = add_factual(&engine, "Alice pairs with Bob on infra", 0.5);
        let _unrelated = add_factual(&engine, "the cafeteria closes at three", 0.5);

        // "billing" only matches the first memory lexically; expansion
        // through the Alice entity pulls in the second
        let expanded = engine
            .recall("billing", RecallOptions::default())
            .unwrap();
        let ids: Vec<&str> = expanded.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&related.as_str()));
        assert_eq!(expanded.len(), 2);

        let bare = engine
            .recall(
                "billing",
                RecallOptions {
                    graph_expand: false,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(bare.len(), 1);
    }

    #[test]
    fn test_stats_counts() {
        let (_dir, engine) = temp_engine();
        add_factual(&engine, "one", 0.5);
        add_factual(&engine, "two", 0.7);
        engine
            .add(AddInput {
                memory_type: MemoryType::Episodic,
                ..AddInput::new("three")
            })
            .unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.total_memories, 3);
        assert_eq!(stats.working_count, 3);
        assert!(stats
            .type_counts
            .iter()
            .any(|(t, c)| t == "factual" && *c == 2));
        assert!(stats.average_importance > 0.0);
    }

    #[test]
    fn test_export_roundtrip_shape() {
        let (dir, engine) = temp_engine();
        add_factual(&engine, "exported memory", 0.5);
        let path = dir.path().join("dump.json");
        let bytes = engine.export(&path).unwrap();
        assert!(bytes > 0);
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(doc["memories"].is_array());
        assert!(doc["hebbianLinks"].is_array());
    }

    #[test]
    fn test_downscale_validation_and_exactness() {
        // Property 5
        let (_dir, engine) = temp_engine();
        let id = add_factual(&engine, "scaled", 0.5);
        let before = engine.get(&id).unwrap();
        assert!(matches!(
            engine.downscale(Some(0.0)),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.downscale(Some(1.5)),
            Err(EngineError::InvalidArgument(_))
        ));

        engine.downscale(Some(0.5)).unwrap();
        let after = engine.get(&id).unwrap();
        assert!((after.working_strength - before.working_strength * 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_hebbian_disabled_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.hebbian.enabled = false;
        let engine =
            Engine::with_config(Some(dir.path().join("engram.db")), config).unwrap();

        let x = add_factual(&engine, "quokka smiles", 0.5);
        let _y = add_factual(&engine, "quokka selfies", 0.5);
        for _ in 0..5 {
            engine.recall("quokka", RecallOptions::default()).unwrap();
        }
        assert!(engine.neighbors(&x).unwrap().is_empty());
    }
}
