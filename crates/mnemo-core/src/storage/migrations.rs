//! Database Migrations
//!
//! Schema migration definitions for the chunk store. Each migration is a
//! single SQL batch; `apply_migrations` brings a database of any prior
//! version up to date through the `schema_version` table.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: chunks, FTS5 inverted index, chunk embeddings",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Tag embeddings for semantic tag matching",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "Relevance-horizon columns",
        up: MIGRATION_V3_UP,
    },
    Migration {
        version: 4,
        description: "FTS5 porter tokenizer rebuild",
        up: MIGRATION_V4_UP,
    },
];

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
/// Timestamps are INTEGER unix milliseconds. The `tags` column is the
/// canonical five-set JSON record; `tags_flat` is the space-joined
/// deduplicated union, maintained by the store so keyword search can find
/// tag values through the inverted index.
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    tier TEXT NOT NULL DEFAULT 'short_term',
    content TEXT NOT NULL,
    summary TEXT,
    source TEXT,
    category TEXT,
    person TEXT,
    tags TEXT NOT NULL DEFAULT '{}',
    tags_flat TEXT NOT NULL DEFAULT '',
    confidence REAL NOT NULL DEFAULT 1.0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    promoted_at INTEGER,
    expires_at INTEGER,
    metadata TEXT NOT NULL DEFAULT '{}',

    -- Embedding metadata
    has_embedding INTEGER NOT NULL DEFAULT 0,
    embedding_model TEXT
);

CREATE INDEX IF NOT EXISTS idx_chunks_tier ON chunks(tier);
CREATE INDEX IF NOT EXISTS idx_chunks_person ON chunks(person);
CREATE INDEX IF NOT EXISTS idx_chunks_category ON chunks(category);
CREATE INDEX IF NOT EXISTS idx_chunks_created ON chunks(created_at);
CREATE INDEX IF NOT EXISTS idx_chunks_updated ON chunks(updated_at);
CREATE INDEX IF NOT EXISTS idx_chunks_expires ON chunks(expires_at);

-- Embeddings storage table (binary blob for efficiency)
CREATE TABLE IF NOT EXISTS chunk_embeddings (
    chunk_id TEXT PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL DEFAULT 384,
    model TEXT,
    created_at INTEGER NOT NULL
);

-- FTS5 virtual table for full-text search
CREATE VIRTUAL TABLE IF NOT EXISTS chunk_fts USING fts5(
    id,
    content,
    summary,
    tags_flat,
    content='chunks',
    content_rowid='rowid'
);

-- Triggers to keep FTS in sync
CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunk_fts(rowid, id, content, summary, tags_flat)
    VALUES (NEW.rowid, NEW.id, NEW.content, NEW.summary, NEW.tags_flat);
END;

CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunk_fts(chunk_fts, rowid, id, content, summary, tags_flat)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content, OLD.summary, OLD.tags_flat);
END;

CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunk_fts(chunk_fts, rowid, id, content, summary, tags_flat)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content, OLD.summary, OLD.tags_flat);
    INSERT INTO chunk_fts(rowid, id, content, summary, tags_flat)
    VALUES (NEW.rowid, NEW.id, NEW.content, NEW.summary, NEW.tags_flat);
END;

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: Tag embeddings
///
/// Keyed by (value, dimension) independently from chunks; upsert is
/// last-write-wins on the vector blob.
const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS tag_embeddings (
    value TEXT NOT NULL,
    dimension TEXT NOT NULL,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL DEFAULT 384,
    model TEXT,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (value, dimension)
);

CREATE INDEX IF NOT EXISTS idx_tag_embeddings_dimension ON tag_embeddings(dimension);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

/// V3: Relevance-horizon columns (predicted obsolescence, orthogonal to tier)
const MIGRATION_V3_UP: &str = r#"
ALTER TABLE chunks ADD COLUMN relevance_horizon INTEGER;
ALTER TABLE chunks ADD COLUMN horizon_reasoning TEXT;
ALTER TABLE chunks ADD COLUMN horizon_confidence REAL;
ALTER TABLE chunks ADD COLUMN horizon_category TEXT;

CREATE INDEX IF NOT EXISTS idx_chunks_horizon ON chunks(relevance_horizon);

UPDATE schema_version SET version = 3, applied_at = datetime('now');
"#;

/// V4: FTS5 porter tokenizer upgrade (stemming for better keyword recall)
const MIGRATION_V4_UP: &str = r#"
DROP TRIGGER IF EXISTS chunks_ai;
DROP TRIGGER IF EXISTS chunks_ad;
DROP TRIGGER IF EXISTS chunks_au;
DROP TABLE IF EXISTS chunk_fts;

CREATE VIRTUAL TABLE chunk_fts USING fts5(
    id, content, summary, tags_flat,
    content='chunks',
    content_rowid='rowid',
    tokenize='porter unicode61'
);

-- Rebuild FTS index from existing data with the new tokenizer
INSERT INTO chunk_fts(chunk_fts) VALUES('rebuild');

-- Re-create sync triggers
CREATE TRIGGER chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunk_fts(rowid, id, content, summary, tags_flat)
    VALUES (NEW.rowid, NEW.id, NEW.content, NEW.summary, NEW.tags_flat);
END;

CREATE TRIGGER chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunk_fts(chunk_fts, rowid, id, content, summary, tags_flat)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content, OLD.summary, OLD.tags_flat);
END;

CREATE TRIGGER chunks_au AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunk_fts(chunk_fts, rowid, id, content, summary, tags_flat)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content, OLD.summary, OLD.tags_flat);
    INSERT INTO chunk_fts(rowid, id, content, summary, tags_flat)
    VALUES (NEW.rowid, NEW.id, NEW.content, NEW.summary, NEW.tags_flat);
END;

UPDATE schema_version SET version = 4, applied_at = datetime('now');
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
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

            // execute_batch handles multi-statement SQL including triggers
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}

// ============================================================================
// TESTS
// ============================================================================
