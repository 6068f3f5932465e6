//! SQLite store
//!
//! Single-writer, multi-reader storage over one database file. Writes run in
//! transactions on a dedicated writer connection; reads go through a second
//! connection so the WAL keeps readers unblocked during writes. An advisory
//! file lock enforces single-process ownership; a second open of the same
//! file fails loudly.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::migrations;

use crate::config::{AnomalyConfig, EngineConfig, HebbianConfig};
use crate::consolidation::{
    classify_layer, core_decay_factor, replay_partition, transfer_delta, working_decay_factor,
};
use crate::error::{EngineError, Result};
use crate::memory::{
    ConsolidationSummary, ForgetOutcome, Layer, Memory, MemoryStats, MemoryType, MEMORY_TYPES,
};
use crate::{anomaly, forgetting, hebbian};

const SECONDS_PER_DAY: f64 = 86_400.0;

// ============================================================================
// STORE
// ============================================================================

/// Durable store for memories, access history, links, and entity indexes
///
/// Separate reader/writer connections behind mutexes give interior
/// mutability; all methods take `&self`, making the store `Send + Sync`.
pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    /// Flipped after a write-path I/O failure; writes then fail fast
    degraded: AtomicBool,
    /// Advisory lock held for the store's lifetime
    _lock_file: File,
}

impl Store {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open (or create) the store at `db_path`
    ///
    /// `None` resolves a platform-specific data directory. Fails with
    /// `StorageUnavailable` when another process holds the advisory lock and
    /// with `Corruption` when the file carries a schema version newer than
    /// this build supports.
    pub fn open(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = directories::ProjectDirs::from("dev", "engram", "engram")
                    .ok_or_else(|| {
                        EngineError::StorageUnavailable(
                            "could not determine project directories".to_string(),
                        )
                    })?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                data_dir.join("engram.db")
            }
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Advisory lock: one process owns the file
        let lock_path = path.with_extension("lock");
        let lock_file = File::create(&lock_path)?;
        lock_file.try_lock_exclusive().map_err(|_| {
            EngineError::StorageUnavailable(format!(
                "database {} is locked by another process",
                path.display()
            ))
        })?;

        let writer_conn = Connection::open(&path)?;
        Self::configure_connection(&writer_conn)?;

        // Refuse files from the future before touching the schema
        let found = migrations::get_current_version(&writer_conn)?;
        if found > migrations::SUPPORTED_VERSION {
            return Err(EngineError::Corruption {
                found,
                supported: migrations::SUPPORTED_VERSION,
            });
        }
        migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            degraded: AtomicBool::new(false),
            _lock_file: lock_file,
        })
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        if self.degraded.load(Ordering::Relaxed) {
            return Err(EngineError::StorageUnavailable(
                "store is in degraded read-only mode".to_string(),
            ));
        }
        self.writer
            .lock()
            .map_err(|_| EngineError::StorageUnavailable("writer lock poisoned".to_string()))
    }

    fn reader(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| EngineError::StorageUnavailable("reader lock poisoned".to_string()))
    }

    /// Flip into degraded read-only mode when a write failed at the storage
    /// layer
    ///
    /// Every rusqlite/I/O failure folds into `StorageUnavailable`, so any
    /// such error on the write path degrades the store for the rest of the
    /// process lifetime. Domain errors (NotFound, Conflict) pass through
    /// untouched.
    fn note_write_result<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(EngineError::StorageUnavailable(reason)) = &result {
            if !self.degraded.swap(true, Ordering::Relaxed) {
                tracing::warn!(%reason, "write failed; entering degraded read-only mode");
            }
        }
        result
    }

    /// Whether the store has entered degraded read-only mode
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    // ========================================================================
    // ROW MAPPING
    // ========================================================================

    fn parse_enum_err(field: &str, value: &str) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid {field}: {value}"),
            )),
        )
    }

    fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
        let type_str: String = row.get("memory_type")?;
        let memory_type = MemoryType::parse_name(&type_str)
            .map_err(|_| Self::parse_enum_err("memory_type", &type_str))?;

        let layer_str: String = row.get("layer")?;
        let layer =
            Layer::parse_name(&layer_str).map_err(|_| Self::parse_enum_err("layer", &layer_str))?;

        let tags_json: String = row.get("tags")?;
        let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
        let entities_json: String = row.get("entities")?;
        let entities: Vec<String> = serde_json::from_str(&entities_json).unwrap_or_default();

        let pinned: i64 = row.get("pinned")?;

        Ok(Memory {
            id: row.get("id")?,
            content: row.get("content")?,
            memory_type,
            importance: row.get("importance")?,
            working_strength: row.get("working_strength")?,
            core_strength: row.get("core_strength")?,
            stability: row.get("stability")?,
            created_at: row.get("created_at")?,
            last_accessed_at: row.get("last_accessed_at")?,
            access_count: row.get("access_count")?,
            layer,
            pinned: pinned != 0,
            source: row.get("source")?,
            tags,
            contradicted_by: row.get("contradicted_by")?,
            contradicts: row.get("contradicts")?,
            entities,
        })
    }

    // ========================================================================
    // MEMORY CRUD
    // ========================================================================

    fn insert_memory_in_tx(tx: &Transaction<'_>, memory: &Memory) -> Result<()> {
        let tags_json = serde_json::to_string(&memory.tags).unwrap_or_else(|_| "[]".to_string());
        let entities_json =
            serde_json::to_string(&memory.entities).unwrap_or_else(|_| "[]".to_string());

        tx.execute(
            "INSERT INTO memories (
                id, content, memory_type, importance,
                working_strength, core_strength, stability,
                created_at, last_accessed_at, access_count,
                layer, pinned, source, tags,
                contradicted_by, contradicts, entities
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16, ?17
            )",
            params![
                memory.id,
                memory.content,
                memory.memory_type.as_str(),
                memory.importance,
                memory.working_strength,
                memory.core_strength,
                memory.stability,
                memory.created_at,
                memory.last_accessed_at,
                memory.access_count,
                memory.layer.as_str(),
                memory.pinned as i64,
                memory.source,
                tags_json,
                memory.contradicted_by,
                memory.contradicts,
                entities_json,
            ],
        )?;

        // Inverted index + pairwise co-occurrence adjacency
        for entity in &memory.entities {
            tx.execute(
                "INSERT OR IGNORE INTO memory_entities (memory_id, entity) VALUES (?1, ?2)",
                params![memory.id, entity],
            )?;
        }
        for i in 0..memory.entities.len() {
            for j in (i + 1)..memory.entities.len() {
                let (a, b) = match hebbian::canonical_pair(&memory.entities[i], &memory.entities[j])
                {
                    Some(pair) => pair,
                    None => continue,
                };
                tx.execute(
                    "INSERT INTO entity_adjacency (entity_a, entity_b, cooccurrence_count)
                     VALUES (?1, ?2, 1)
                     ON CONFLICT(entity_a, entity_b)
                     DO UPDATE SET cooccurrence_count = cooccurrence_count + 1",
                    params![a, b],
                )?;
            }
        }
        Ok(())
    }

    /// Insert a new memory; when it contradicts an existing one, both writes
    /// happen in the same transaction
    pub fn insert_memory(&self, memory: &Memory) -> Result<()> {
        let result = (|| {
            let mut writer = self.writer()?;
            let tx = writer.transaction()?;
            Self::insert_memory_in_tx(&tx, memory)?;
            if let Some(old_id) = &memory.contradicts {
                let updated = tx.execute(
                    "UPDATE memories SET contradicted_by = ?1 WHERE id = ?2",
                    params![memory.id, old_id],
                )?;
                if updated == 0 {
                    return Err(EngineError::NotFound(old_id.clone()));
                }
            }
            tx.commit()?;
            Ok(())
        })();
        self.note_write_result(result)
    }

    /// Get a memory by id
    pub fn get_memory(&self, id: &str) -> Result<Option<Memory>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare("SELECT * FROM memories WHERE id = ?1")?;
        let memory = stmt
            .query_row(params![id], Self::row_to_memory)
            .optional()?;
        Ok(memory)
    }

    /// All memories, newest first
    pub fn all_memories(&self) -> Result<Vec<Memory>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare("SELECT * FROM memories ORDER BY created_at DESC")?;
        let rows = stmt.query_map([], Self::row_to_memory)?;
        let mut memories = Vec::new();
        for row in rows {
            memories.push(row?);
        }
        Ok(memories)
    }

    /// Fetch memories by id, preserving input order and skipping missing ids
    pub fn memories_by_ids(&self, ids: &[String]) -> Result<Vec<Memory>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare("SELECT * FROM memories WHERE id = ?1")?;
        let mut memories = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(memory) = stmt.query_row(params![id], Self::row_to_memory).optional()? {
                memories.push(memory);
            }
        }
        Ok(memories)
    }

    /// Hard-delete a memory; access, link, entity, and embedding rows cascade
    pub fn delete_memory(&self, id: &str) -> Result<bool> {
        let result = (|| {
            let writer = self.writer()?;
            let rows = writer.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
            Ok(rows > 0)
        })();
        self.note_write_result(result)
    }

    /// Set the pinned flag; returns whether the flag changed
    pub fn set_pinned(&self, id: &str, pinned: bool) -> Result<bool> {
        let current = self
            .get_memory(id)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        if current.pinned == pinned {
            return Ok(false);
        }
        let result = (|| {
            let writer = self.writer()?;
            writer.execute(
                "UPDATE memories SET pinned = ?1 WHERE id = ?2",
                params![pinned as i64, id],
            )?;
            Ok(true)
        })();
        self.note_write_result(result)
    }

    // ========================================================================
    // LEXICAL SEARCH
    // ========================================================================

    /// Top-N candidate ids from the FTS5 index, best rank first
    pub fn fts_candidates(&self, match_expr: &str, cutoff: usize) -> Result<Vec<String>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT m.id FROM memories m
             JOIN memories_fts fts ON m.id = fts.id
             WHERE memories_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![match_expr, cutoff as i64], |row| row.get(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    // ========================================================================
    // ACCESS HISTORY
    // ========================================================================

    /// Most recent access times for a memory, newest first
    pub fn access_times(&self, id: &str, limit: usize) -> Result<Vec<f64>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT accessed_at FROM access_log
             WHERE memory_id = ?1
             ORDER BY accessed_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![id, limit as i64], |row| row.get(0))?;
        let mut times = Vec::new();
        for row in rows {
            times.push(row?);
        }
        Ok(times)
    }

    /// Number of access rows for a memory
    pub fn access_row_count(&self, id: &str) -> Result<i64> {
        let reader = self.reader()?;
        let count = reader.query_row(
            "SELECT COUNT(*) FROM access_log WHERE memory_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Up to `n` most recently accessed memories, oldest of the window first
    ///
    /// Returns (id, working_strength, stability) tuples for reward
    /// modulation.
    pub fn recent_accessed(&self, n: usize) -> Result<Vec<(String, f64, f64)>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT id, working_strength, stability FROM memories
             ORDER BY last_accessed_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![n as i64], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        let mut window = Vec::new();
        for row in rows {
            window.push(row?);
        }
        window.reverse();
        Ok(window)
    }

    // ========================================================================
    // RETRIEVAL SIDE EFFECTS
    // ========================================================================

    /// Commit the side effects of one retrieval in a single transaction:
    /// access rows, access_count bumps, stability growth, last-access
    /// timestamps, and the Hebbian co-activation batch. Returns the number
    /// of links formed.
    pub fn commit_retrieval(
        &self,
        ids: &[String],
        now: f64,
        stability_growth: f64,
        hebbian_cfg: &HebbianConfig,
        anomaly_cfg: &AnomalyConfig,
    ) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = (|| {
            let mut writer = self.writer()?;
            let tx = writer.transaction()?;

            let mut seen = HashSet::new();
            for id in ids {
                if !seen.insert(id.as_str()) {
                    continue;
                }
                tx.execute(
                    "INSERT INTO access_log (memory_id, accessed_at) VALUES (?1, ?2)",
                    params![id, now],
                )?;
                tx.execute(
                    "UPDATE memories SET
                        access_count = access_count + 1,
                        last_accessed_at = ?2,
                        stability = MIN(stability * ?3, ?4)
                     WHERE id = ?1",
                    params![
                        id,
                        now,
                        1.0 + stability_growth,
                        anomaly_cfg.max_stability
                    ],
                )?;
            }

            let mut formed = 0usize;
            if hebbian_cfg.enabled {
                formed = Self::record_coactivation_in_tx(&tx, ids, hebbian_cfg)?;
            }

            tx.commit()?;
            Ok(formed)
        })();
        self.note_write_result(result)
    }

    fn record_coactivation_in_tx(
        tx: &Transaction<'_>,
        ids: &[String],
        cfg: &HebbianConfig,
    ) -> Result<usize> {
        let mut formed = 0usize;
        for (a, b) in hebbian::coactivation_pairs(ids) {
            let existing: Option<(f64, i64)> = tx
                .query_row(
                    "SELECT strength, coactivation_count FROM hebbian_links
                     WHERE source_id = ?1 AND target_id = ?2",
                    params![a, b],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let (strength, count) = match existing {
                Some((s, c)) => (s, c + 1),
                None => (0.0, 1),
            };

            tx.execute(
                "INSERT INTO hebbian_links (source_id, target_id, strength, coactivation_count)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(source_id, target_id)
                 DO UPDATE SET coactivation_count = ?4",
                params![a, b, strength, count],
            )?;

            if hebbian::should_form(count, strength, cfg) {
                tx.execute(
                    "UPDATE hebbian_links SET strength = ?3
                     WHERE source_id = ?1 AND target_id = ?2",
                    params![a, b, cfg.formation_strength],
                )?;
                tx.execute(
                    "INSERT INTO hebbian_links (source_id, target_id, strength, coactivation_count)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(source_id, target_id)
                     DO UPDATE SET strength = ?3, coactivation_count = ?4",
                    params![b, a, cfg.formation_strength, count],
                )?;
                formed += 1;
                tracing::debug!(source = %a, target = %b, "hebbian link formed");
            } else if strength > 0.0 {
                // keep the mirror row's count equal
                tx.execute(
                    "UPDATE hebbian_links SET coactivation_count = ?3
                     WHERE source_id = ?1 AND target_id = ?2",
                    params![b, a, count],
                )?;
            }
        }
        Ok(formed)
    }

    // ========================================================================
    // HEBBIAN LINKS
    // ========================================================================

    /// Formed-link neighbors of a memory, strongest first
    pub fn neighbors(&self, id: &str) -> Result<Vec<String>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT target_id FROM hebbian_links
             WHERE source_id = ?1 AND strength > 0
             ORDER BY strength DESC, target_id",
        )?;
        let rows = stmt.query_map(params![id], |row| row.get(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Directional link row: (strength, coactivation_count)
    pub fn link(&self, source_id: &str, target_id: &str) -> Result<Option<(f64, i64)>> {
        let reader = self.reader()?;
        let link = reader
            .query_row(
                "SELECT strength, coactivation_count FROM hebbian_links
                 WHERE source_id = ?1 AND target_id = ?2",
                params![source_id, target_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(link)
    }

    /// Boost a formed link in both directions, clamped at the cap
    ///
    /// Returns false when no formed link exists between the pair.
    pub fn strengthen_link(
        &self,
        id1: &str,
        id2: &str,
        boost: f64,
        cfg: &HebbianConfig,
    ) -> Result<bool> {
        let (a, b) = match hebbian::canonical_pair(id1, id2) {
            Some(pair) => pair,
            None => return Ok(false),
        };
        let result = (|| {
            let mut writer = self.writer()?;
            let tx = writer.transaction()?;
            let current: Option<f64> = tx
                .query_row(
                    "SELECT strength FROM hebbian_links WHERE source_id = ?1 AND target_id = ?2",
                    params![a, b],
                    |row| row.get(0),
                )
                .optional()?;
            let strength = match current {
                Some(s) if s > 0.0 => s,
                _ => {
                    return Ok(false);
                }
            };
            let next = hebbian::strengthened(strength, boost, cfg);
            tx.execute(
                "UPDATE hebbian_links SET strength = ?3
                 WHERE (source_id = ?1 AND target_id = ?2)
                    OR (source_id = ?2 AND target_id = ?1)",
                params![a, b, next],
            )?;
            tx.commit()?;
            Ok(true)
        })();
        self.note_write_result(result)
    }

    fn decay_links_in_tx(
        tx: &Transaction<'_>,
        factor: f64,
        prune_below: f64,
    ) -> Result<(i64, i64)> {
        let decayed = tx.execute(
            "UPDATE hebbian_links SET strength = strength * ?1 WHERE strength > 0",
            params![factor],
        )? as i64;
        let pruned_rows = tx.execute(
            "DELETE FROM hebbian_links WHERE strength > 0 AND strength < ?1",
            params![prune_below],
        )? as i64;
        Ok((decayed, pruned_rows / 2))
    }

    // ========================================================================
    // ENTITY INDEX
    // ========================================================================

    /// Memory ids referencing any of the given entities
    pub fn memories_for_entities(&self, entities: &[String]) -> Result<Vec<String>> {
        if entities.is_empty() {
            return Ok(vec![]);
        }
        let reader = self.reader()?;
        let mut stmt =
            reader.prepare("SELECT memory_id FROM memory_entities WHERE entity = ?1")?;
        let mut ids: BTreeMap<String, ()> = BTreeMap::new();
        for entity in entities {
            let rows = stmt.query_map(params![entity], |row| row.get::<_, String>(0))?;
            for row in rows {
                ids.insert(row?, ());
            }
        }
        Ok(ids.into_keys().collect())
    }

    /// Entities adjacent (by co-occurrence) to any of the given entities
    pub fn adjacent_entities(&self, entities: &[String]) -> Result<Vec<String>> {
        if entities.is_empty() {
            return Ok(vec![]);
        }
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT entity_b FROM entity_adjacency WHERE entity_a = ?1
             UNION
             SELECT entity_a FROM entity_adjacency WHERE entity_b = ?1",
        )?;
        let mut adjacent: BTreeMap<String, ()> = BTreeMap::new();
        for entity in entities {
            let rows = stmt.query_map(params![entity], |row| row.get::<_, String>(0))?;
            for row in rows {
                adjacent.insert(row?, ());
            }
        }
        Ok(adjacent.into_keys().collect())
    }

    // ========================================================================
    // REWARD
    // ========================================================================

    /// Apply precomputed reward updates atomically
    ///
    /// Each entry is (id, new_working_strength, new_stability).
    pub fn apply_reward(&self, updates: &[(String, f64, f64)]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let result = (|| {
            let mut writer = self.writer()?;
            let tx = writer.transaction()?;
            let mut applied = 0usize;
            for (id, working, stability) in updates {
                let rows = tx.execute(
                    "UPDATE memories SET working_strength = ?2, stability = ?3 WHERE id = ?1",
                    params![id, working, stability],
                )?;
                applied += rows;
            }
            tx.commit()?;
            Ok(applied)
        })();
        self.note_write_result(result)
    }

    // ========================================================================
    // CONSOLIDATION
    // ========================================================================

    /// Run one consolidation cycle in a single transaction
    ///
    /// Observers see either the pre- or post-state; any failure rolls the
    /// whole cycle back.
    pub fn run_consolidation(
        &self,
        config: &EngineConfig,
        days: f64,
        now: f64,
    ) -> Result<ConsolidationSummary> {
        let start = std::time::Instant::now();
        let result = (|| {
            let mut writer = self.writer()?;
            let tx = writer.transaction()?;
            let mut summary = ConsolidationSummary::default();

            struct CycleRow {
                id: String,
                importance: f64,
                working: f64,
                core: f64,
                pinned: bool,
                layer: Layer,
            }

            let mut rows: Vec<CycleRow> = {
                let mut stmt = tx.prepare(
                    "SELECT id, importance, working_strength, core_strength, pinned, layer
                     FROM memories",
                )?;
                let mapped = stmt.query_map([], |row| {
                    let pinned: i64 = row.get(4)?;
                    let layer_str: String = row.get(5)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        pinned != 0,
                        layer_str,
                    ))
                })?;
                let mut rows = Vec::new();
                for row in mapped {
                    let (id, importance, working, core, pinned, layer_str) = row?;
                    let layer = Layer::parse_name(&layer_str)
                        .map_err(|_| Self::parse_enum_err("layer", &layer_str))?;
                    rows.push(CycleRow {
                        id,
                        importance,
                        working,
                        core,
                        pinned,
                        layer,
                    });
                }
                rows
            };
            summary.memories_processed = rows.len() as i64;

            // 1-3. Working decay, transfer, core decay. Pinned memories are
            // exempt from decay; transfer conserves mass so it applies to all.
            let wdf = working_decay_factor(&config.consolidation, days);
            let cdf = core_decay_factor(&config.consolidation, days);
            for row in &mut rows {
                if !row.pinned {
                    row.working *= wdf;
                }
                let delta =
                    transfer_delta(&config.consolidation, days, row.working, row.importance);
                row.working -= delta;
                row.core += delta;
                summary.mass_transferred += delta;
                if !row.pinned {
                    row.core *= cdf;
                }
            }

            // 4. Replay: interleaved sample, core boost + synthetic access
            if days > 0.0 && config.consolidation.replay_sample_size > 0 {
                let plan = replay_partition(&config.consolidation);
                let horizon = now - SECONDS_PER_DAY;

                let mut replay_ids: Vec<String> = Vec::new();
                {
                    let mut recent_stmt = tx.prepare(
                        "SELECT id FROM memories WHERE last_accessed_at >= ?1
                         ORDER BY last_accessed_at DESC LIMIT ?2",
                    )?;
                    let recent =
                        recent_stmt.query_map(params![horizon, plan.recent as i64], |row| {
                            row.get::<_, String>(0)
                        })?;
                    for id in recent {
                        replay_ids.push(id?);
                    }
                    let mut older_stmt = tx.prepare(
                        "SELECT id FROM memories WHERE last_accessed_at < ?1
                         ORDER BY importance DESC, created_at ASC LIMIT ?2",
                    )?;
                    let older = older_stmt.query_map(params![horizon, plan.older as i64], |row| {
                        row.get::<_, String>(0)
                    })?;
                    for id in older {
                        replay_ids.push(id?);
                    }
                }

                for id in &replay_ids {
                    if let Some(row) = rows.iter_mut().find(|r| &r.id == id) {
                        row.core += config.consolidation.replay_boost;
                    }
                    tx.execute(
                        "INSERT INTO access_log (memory_id, accessed_at) VALUES (?1, ?2)",
                        params![id, now],
                    )?;
                    tx.execute(
                        "UPDATE memories SET access_count = access_count + 1,
                                             last_accessed_at = ?2
                         WHERE id = ?1",
                        params![id, now],
                    )?;
                }
                summary.memories_replayed = replay_ids.len() as i64;
            }

            // 5. Layer update from pre-downscale strengths
            for row in &mut rows {
                let next = classify_layer(&config.consolidation, row.core, row.working, row.pinned);
                if next != row.layer {
                    match next {
                        Layer::Core => summary.promoted += 1,
                        Layer::Archive => summary.archived += 1,
                        Layer::Working => {}
                    }
                    row.layer = next;
                }
            }

            // 6. Hebbian decay, scaled to the cycle length
            let link_factor = config.hebbian.decay_factor.powf(days);
            let (decayed, pruned) =
                Self::decay_links_in_tx(&tx, link_factor, config.hebbian.prune_below)?;
            summary.links_decayed = decayed;
            summary.links_pruned = pruned;

            // 7. Homeostatic downscaling of unpinned memories
            let downscale = config.downscale.factor.powf(days);
            for row in &mut rows {
                if !row.pinned {
                    row.working *= downscale;
                    row.core *= downscale;
                }
                let (working, clamped_w) = anomaly::clamp_strength(row.working, &config.anomaly);
                let (core, clamped_c) = anomaly::clamp_strength(row.core, &config.anomaly);
                if clamped_w || clamped_c {
                    summary.anomalies_clamped += 1;
                    tracing::warn!(id = %row.id, "strength clamped by anomaly cap");
                }
                row.working = working;
                row.core = core;
            }

            // Persist final strengths and layers
            {
                let mut update = tx.prepare(
                    "UPDATE memories SET working_strength = ?2, core_strength = ?3, layer = ?4
                     WHERE id = ?1",
                )?;
                for row in &rows {
                    update.execute(params![
                        row.id,
                        row.working.max(0.0),
                        row.core.max(0.0),
                        row.layer.as_str()
                    ])?;
                }
            }

            // Trim access rows past the retention horizon, keeping
            // access_count equal to the surviving row count
            let retention_horizon =
                now - config.forgetting.access_log_retention_days * SECONDS_PER_DAY;
            {
                let mut counts_stmt = tx.prepare(
                    "SELECT memory_id, COUNT(*) FROM access_log
                     WHERE accessed_at < ?1 GROUP BY memory_id",
                )?;
                let counts: Vec<(String, i64)> = {
                    let mapped = counts_stmt
                        .query_map(params![retention_horizon], |row| {
                            Ok((row.get(0)?, row.get(1)?))
                        })?;
                    let mut counts = Vec::new();
                    for row in mapped {
                        counts.push(row?);
                    }
                    counts
                };
                for (memory_id, pruned_count) in &counts {
                    tx.execute(
                        "UPDATE memories SET access_count = MAX(0, access_count - ?2)
                         WHERE id = ?1",
                        params![memory_id, pruned_count],
                    )?;
                }
                summary.access_rows_pruned = tx.execute(
                    "DELETE FROM access_log WHERE accessed_at < ?1",
                    params![retention_horizon],
                )? as i64;
            }

            tx.commit()?;
            Ok(summary)
        })();
        let mut summary = self.note_write_result(result)?;
        summary.duration_ms = start.elapsed().as_millis() as i64;
        tracing::debug!(
            processed = summary.memories_processed,
            replayed = summary.memories_replayed,
            promoted = summary.promoted,
            archived = summary.archived,
            "consolidation cycle complete"
        );
        Ok(summary)
    }

    // ========================================================================
    // FORGETTING & DOWNSCALE
    // ========================================================================

    /// Delete unpinned memories whose effective strength falls below the
    /// threshold; pinned ones are archived instead
    pub fn forget_below(&self, threshold: f64, now: f64) -> Result<ForgetOutcome> {
        let rows: Vec<(String, bool, f64)> = {
            let reader = self.reader()?;
            let mut stmt = reader.prepare(
                "SELECT id, pinned, working_strength, core_strength, stability, last_accessed_at
                 FROM memories",
            )?;
            let mapped = stmt.query_map([], |row| {
                let pinned: i64 = row.get(1)?;
                let working: f64 = row.get(2)?;
                let core: f64 = row.get(3)?;
                let stability: f64 = row.get(4)?;
                let last_accessed: f64 = row.get(5)?;
                Ok((row.get::<_, String>(0)?, pinned != 0, working, core, stability, last_accessed))
            })?;
            let mut rows = Vec::new();
            for row in mapped {
                let (id, pinned, working, core, stability, last_accessed) = row?;
                let r = forgetting::retrievability(now, last_accessed, stability);
                rows.push((id, pinned, forgetting::effective_strength(working, core, r)));
            }
            rows
        };

        let result = (|| {
            let mut writer = self.writer()?;
            let tx = writer.transaction()?;
            let mut outcome = ForgetOutcome::default();
            for (id, pinned, effective) in &rows {
                if *effective >= threshold {
                    continue;
                }
                if *pinned {
                    let changed = tx.execute(
                        "UPDATE memories SET layer = 'archive' WHERE id = ?1 AND layer != 'archive'",
                        params![id],
                    )?;
                    outcome.archived += changed as i64;
                } else {
                    tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
                    outcome.deleted += 1;
                }
            }
            tx.commit()?;
            Ok(outcome)
        })();
        self.note_write_result(result)
    }

    /// Multiply both strengths of every unpinned memory by `factor`
    pub fn downscale(&self, factor: f64) -> Result<usize> {
        let result = (|| {
            let writer = self.writer()?;
            let rows = writer.execute(
                "UPDATE memories SET
                    working_strength = working_strength * ?1,
                    core_strength = core_strength * ?1
                 WHERE pinned = 0",
                params![factor],
            )?;
            Ok(rows)
        })();
        self.note_write_result(result)
    }

    // ========================================================================
    // EMBEDDINGS
    // ========================================================================

    fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(vector.len() * 4);
        for value in vector {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    /// Store (or replace) the embedding vector for a memory
    pub fn store_embedding(&self, id: &str, vector: &[f32]) -> Result<()> {
        let result = (|| {
            let writer = self.writer()?;
            writer.execute(
                "INSERT OR REPLACE INTO embeddings (memory_id, vector, dimensions)
                 VALUES (?1, ?2, ?3)",
                params![id, Self::vector_to_bytes(vector), vector.len() as i64],
            )?;
            Ok(())
        })();
        self.note_write_result(result)
    }

    /// Stored embedding for a memory, if any
    pub fn embedding(&self, id: &str) -> Result<Option<Vec<f32>>> {
        let reader = self.reader()?;
        let bytes: Option<Vec<u8>> = reader
            .query_row(
                "SELECT vector FROM embeddings WHERE memory_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes.map(|b| Self::bytes_to_vector(&b)))
    }

    // ========================================================================
    // STATS & EXPORT
    // ========================================================================

    /// Aggregate statistics
    pub fn stats(&self) -> Result<MemoryStats> {
        let reader = self.reader()?;

        let total: i64 =
            reader.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;

        let layer_count = |layer: &str| -> Result<i64> {
            Ok(reader.query_row(
                "SELECT COUNT(*) FROM memories WHERE layer = ?1",
                params![layer],
                |row| row.get(0),
            )?)
        };
        let working_count = layer_count("working")?;
        let core_count = layer_count("core")?;
        let archive_count = layer_count("archive")?;

        let pinned_count: i64 = reader.query_row(
            "SELECT COUNT(*) FROM memories WHERE pinned = 1",
            [],
            |row| row.get(0),
        )?;

        let mut type_counts = Vec::with_capacity(MEMORY_TYPES.len());
        for memory_type in MEMORY_TYPES {
            let count: i64 = reader.query_row(
                "SELECT COUNT(*) FROM memories WHERE memory_type = ?1",
                params![memory_type.as_str()],
                |row| row.get(0),
            )?;
            type_counts.push((memory_type.as_str().to_string(), count));
        }

        let (average_importance, average_working_strength, average_core_strength, average_stability): (f64, f64, f64, f64) =
            reader.query_row(
                "SELECT COALESCE(AVG(importance), 0),
                        COALESCE(AVG(working_strength), 0),
                        COALESCE(AVG(core_strength), 0),
                        COALESCE(AVG(stability), 0)
                 FROM memories",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let formed_links: i64 = reader.query_row(
            "SELECT COUNT(*) FROM hebbian_links WHERE strength > 0",
            [],
            |row| row.get(0),
        )?;
        let tracked_pairs: i64 = reader.query_row(
            "SELECT COUNT(*) FROM hebbian_links WHERE strength = 0",
            [],
            |row| row.get(0),
        )?;
        let distinct_entities: i64 = reader.query_row(
            "SELECT COUNT(DISTINCT entity) FROM memory_entities",
            [],
            |row| row.get(0),
        )?;
        let total_accesses: i64 =
            reader.query_row("SELECT COUNT(*) FROM access_log", [], |row| row.get(0))?;

        Ok(MemoryStats {
            total_memories: total,
            working_count,
            core_count,
            archive_count,
            pinned_count,
            type_counts,
            average_importance,
            average_working_strength,
            average_core_strength,
            average_stability,
            formed_links,
            tracked_pairs,
            distinct_entities,
            total_accesses,
        })
    }

    /// Export the full state as a JSON document; returns bytes written
    pub fn export_json(&self, path: &std::path::Path, now: f64) -> Result<u64> {
        let memories = self.all_memories()?;

        let reader = self.reader()?;
        let access: Vec<(String, f64)> = {
            let mut stmt =
                reader.prepare("SELECT memory_id, accessed_at FROM access_log ORDER BY id")?;
            let mapped = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            let mut access = Vec::new();
            for row in mapped {
                access.push(row?);
            }
            access
        };
        let links: Vec<(String, String, f64, i64)> = {
            let mut stmt = reader.prepare(
                "SELECT source_id, target_id, strength, coactivation_count
                 FROM hebbian_links ORDER BY source_id, target_id",
            )?;
            let mapped = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            let mut links = Vec::new();
            for row in mapped {
                links.push(row?);
            }
            links
        };
        let adjacency: Vec<(String, String, i64)> = {
            let mut stmt = reader.prepare(
                "SELECT entity_a, entity_b, cooccurrence_count
                 FROM entity_adjacency ORDER BY entity_a, entity_b",
            )?;
            let mapped = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
            let mut adjacency = Vec::new();
            for row in mapped {
                adjacency.push(row?);
            }
            adjacency
        };
        let version = migrations::get_current_version(&reader)?;
        drop(reader);

        let doc = serde_json::json!({
            "schemaVersion": version,
            "exportedAt": now,
            "memories": memories,
            "accessLog": access.iter().map(|(id, at)| {
                serde_json::json!({ "memoryId": id, "accessedAt": at })
            }).collect::<Vec<_>>(),
            "hebbianLinks": links.iter().map(|(s, t, strength, count)| {
                serde_json::json!({
                    "sourceId": s, "targetId": t,
                    "strength": strength, "coactivationCount": count,
                })
            }).collect::<Vec<_>>(),
            "entityAdjacency": adjacency.iter().map(|(a, b, count)| {
                serde_json::json!({
                    "entityA": a, "entityB": b, "cooccurrenceCount": count,
                })
            }).collect::<Vec<_>>(),
        });

        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| EngineError::StorageUnavailable(e.to_string()))?;
        std::fs::write(path, &bytes)?;
        Ok(bytes.len() as u64)
    }

    // ========================================================================
    // TEST SUPPORT
    // ========================================================================

    /// Rewrite a memory's clock fields; test-only time travel
    #[cfg(test)]
    pub(crate) fn set_timestamps(
        &self,
        id: &str,
        created_at: f64,
        last_accessed_at: f64,
    ) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "UPDATE memories SET created_at = ?2, last_accessed_at = ?3 WHERE id = ?1",
            params![id, created_at, last_accessed_at],
        )?;
        writer.execute(
            "UPDATE access_log SET accessed_at = ?2 WHERE memory_id = ?1",
            params![id, last_accessed_at],
        )?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
