//! Database migrations
//!
//! Schema evolution is additive; a `schema_version` row is checked at open
//! and a version newer than this build supports refuses to open.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial schema: memories, access log, Hebbian links, entities, FTS5",
    up: MIGRATION_V1_UP,
}];

/// Highest schema version this build can open
pub const SUPPORTED_VERSION: u32 = 1;

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
///
/// All timestamps are epoch seconds stored as REAL.
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    memory_type TEXT NOT NULL DEFAULT 'factual',
    importance REAL NOT NULL DEFAULT 0.5,

    -- Dual-trace strengths
    working_strength REAL NOT NULL DEFAULT 1.0,
    core_strength REAL NOT NULL DEFAULT 0.0,

    -- Ebbinghaus time constant, days
    stability REAL NOT NULL DEFAULT 1.0,

    created_at REAL NOT NULL,
    last_accessed_at REAL NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,

    -- Derived but materialized for cheap filtering
    layer TEXT NOT NULL DEFAULT 'working',
    pinned INTEGER NOT NULL DEFAULT 0,

    -- Provenance
    source TEXT,
    tags TEXT NOT NULL DEFAULT '[]',

    -- Contradiction links
    contradicted_by TEXT,
    contradicts TEXT,

    -- Extracted entity tokens, JSON array, ordered and deduplicated
    entities TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_memories_layer ON memories(layer);
CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type);
CREATE INDEX IF NOT EXISTS idx_memories_last_accessed ON memories(last_accessed_at);
CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);

-- One row per access event; the base-level activation term reads these
CREATE TABLE IF NOT EXISTS access_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    accessed_at REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_access_log_memory ON access_log(memory_id);
CREATE INDEX IF NOT EXISTS idx_access_log_time ON access_log(accessed_at);

-- Undirected pairs; tracking rows exist once in canonical order
-- (source_id <= target_id), formed links exist in both directions
CREATE TABLE IF NOT EXISTS hebbian_links (
    source_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    target_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    strength REAL NOT NULL DEFAULT 0.0,
    coactivation_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (source_id, target_id)
);

CREATE INDEX IF NOT EXISTS idx_hebbian_strength ON hebbian_links(strength);

-- Entity inverted index
CREATE TABLE IF NOT EXISTS memory_entities (
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    entity TEXT NOT NULL,
    PRIMARY KEY (memory_id, entity)
);

CREATE INDEX IF NOT EXISTS idx_memory_entities_entity ON memory_entities(entity);

-- Entity co-occurrence adjacency, canonical ordering (entity_a <= entity_b)
CREATE TABLE IF NOT EXISTS entity_adjacency (
    entity_a TEXT NOT NULL,
    entity_b TEXT NOT NULL,
    cooccurrence_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (entity_a, entity_b)
);

-- Optional embedding vectors (f32 little-endian blob)
CREATE TABLE IF NOT EXISTS embeddings (
    memory_id TEXT PRIMARY KEY REFERENCES memories(id) ON DELETE CASCADE,
    vector BLOB NOT NULL,
    dimensions INTEGER NOT NULL
);

-- FTS5 virtual table mirroring content and tags
CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    id, content, tags,
    content='memories',
    content_rowid='rowid',
    tokenize='porter ascii'
);

-- Triggers to keep FTS in sync
CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
    INSERT INTO memories_fts(rowid, id, content, tags)
    VALUES (NEW.rowid, NEW.id, NEW.content, NEW.tags);
END;

CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, id, content, tags)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content, OLD.tags);
END;

CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, id, content, tags)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content, OLD.tags);
    INSERT INTO memories_fts(rowid, id, content, tags)
    VALUES (NEW.rowid, NEW.id, NEW.content, NEW.tags);
END;

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at REAL NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch('subsec'));
"#;

/// Get current schema version from database (0 for a fresh file)
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations; returns how many were applied
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
