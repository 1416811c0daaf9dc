//! Database Layer with Connection Pooling and Safe Transactions
//!
//! SQLite-backed relational store (spec §6 "Relational schema (outline)")
//! plus the checkpoint store (spec §4.1) used by every loader and stage.
//!
//! - Connection pooling via r2d2 for concurrent access
//! - Panic-safe transactions with automatic rollback
//! - Version-tracked migrations
//! - WAL mode for optimal read/write performance

use std::path::Path;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

use crate::types::{
    Checkpoint, Classification, CrossReference, Indicator, Obligation, ObligationValue, Result,
    ResultExt, Section, SimilarityPair, StructureNode, PipelineError,
};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version for migration tracking
const SCHEMA_VERSION: u32 = 1;

/// Migration definitions. Empty for now — the schema above is authored
/// fresh rather than evolved, so there is nothing yet to migrate. The
/// machinery is kept so the first real schema change has somewhere to go.
struct Migration {
    version: u32,
    description: &'static str,
    up: &'static str,
}

const MIGRATIONS: &[Migration] = &[];

/// Outcome of a batch upsert: rows newly inserted vs rows updated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

/// Connection pool configuration
///
/// Pool size is dynamically calculated based on CPU cores for optimal performance.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Minimum idle connections to keep ready
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    /// Minimum pool size regardless of CPU count
    const MIN_POOL_SIZE: u32 = 4;
    /// Maximum pool size regardless of CPU count
    const MAX_POOL_SIZE: u32 = 32;
    /// Multiplier for CPU cores to pool size
    const POOL_SIZE_MULTIPLIER: f32 = 2.0;

    /// Calculate optimal pool size based on available CPU cores
    ///
    /// Formula: clamp(cores * 2, MIN, MAX). The database connection pool
    /// is sized to worker count (spec §5 "Shared resources").
    pub fn optimal_pool_size() -> u32 {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        let calculated = (cores as f32 * Self::POOL_SIZE_MULTIPLIER) as u32;
        calculated.clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE)
    }

    /// Create config with automatic pool sizing based on CPU cores
    pub fn auto() -> Self {
        let max_size = Self::optimal_pool_size();
        Self {
            max_size,
            min_idle: (max_size / 4).max(2),
            connection_timeout_secs: 30,
        }
    }

    /// Create config for high-load scenarios (many loader workers)
    pub fn high_load() -> Self {
        let base = Self::optimal_pool_size();
        let max_size = (base * 2).min(Self::MAX_POOL_SIZE);
        Self {
            max_size,
            min_idle: base / 2,
            connection_timeout_secs: 60,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open database with connection pooling at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    /// Open database with custom pool configuration.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| PipelineError::Storage(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Open an in-memory database for testing or temporary use.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| PipelineError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Configure a new connection with production-ready settings.
    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA cache_size = -64000;
            PRAGMA busy_timeout = 5000;
            PRAGMA wal_autocheckpoint = 1000;
            "#,
        )?;
        Ok(())
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            PipelineError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Initialize database schema.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .with_context("Failed to set schema version")?;

        drop(conn);
        self.migrate()?;
        Ok(())
    }

    /// Run version-tracked migrations.
    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;

        let current_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        for migration in MIGRATIONS {
            if migration.version > current_version {
                conn.execute_batch(migration.up).with_context_fn(|| {
                    format!(
                        "Failed to apply migration {}: {}",
                        migration.version, migration.description
                    )
                })?;

                tracing::info!(
                    "Applied migration {}: {}",
                    migration.version,
                    migration.description
                );
            }
        }

        if current_version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to update schema version")?;
        }

        Ok(())
    }

    /// Get a raw connection for advanced operations.
    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.conn()
    }

    /// Execute a single SQL statement.
    pub fn execute(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<usize> {
        let conn = self.conn()?;
        conn.execute(sql, params)
            .with_context("Failed to execute SQL")
    }

    /// Count rows in `table`, used to derive insert/update splits by
    /// snapshotting before and after a batch (spec §4.7).
    fn row_count(conn: &Connection, table: &str) -> rusqlite::Result<i64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
    }

    /// Execute a function within a panic-safe database transaction.
    ///
    /// All operations within the closure are atomic. If the closure panics,
    /// the transaction is automatically rolled back and an error is returned
    /// instead of poisoning the connection pool.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + std::panic::UnwindSafe,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit().with_context("Failed to commit transaction")?;
                Ok(value)
            }
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Transaction panicked: {}", panic_msg);
                Err(PipelineError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }

    // =========================================================================
    // Checkpoint Store (C1, spec §4.1)
    // =========================================================================

    /// Load the checkpoint for a stage/jurisdiction pair, or a fresh
    /// default if none has been written yet.
    pub fn load_checkpoint(&self, stage: &str, jurisdiction: &str) -> Result<Checkpoint> {
        let conn = self.conn()?;
        let row: Option<(i64, String, i64, i64, i64, i64)> = conn
            .query_row(
                "SELECT byte_offset, processed_ids, inserted, updated, errors, skipped
                 FROM checkpoints WHERE stage = ?1 AND jurisdiction = ?2",
                params![stage, jurisdiction],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()
            .with_context("Failed to load checkpoint")?;

        let Some((byte_offset, processed_ids_json, inserted, updated, errors, skipped)) = row
        else {
            return Ok(Checkpoint::default());
        };

        let processed_ids = serde_json::from_str(&processed_ids_json)
            .with_context("Corrupted checkpoint processed_ids")?;

        Ok(Checkpoint {
            byte_offset: byte_offset as u64,
            processed_ids,
            inserted: inserted as u64,
            updated: updated as u64,
            errors: errors as u64,
            skipped: skipped as u64,
        })
    }

    /// Persist a checkpoint. Callers write this only after the
    /// corresponding output has been durably flushed (spec §4.1).
    pub fn save_checkpoint(
        &self,
        stage: &str,
        jurisdiction: &str,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        let processed_ids_json = serde_json::to_string(&checkpoint.processed_ids)
            .with_context("Failed to serialize checkpoint processed_ids")?;
        let now = chrono::Utc::now().to_rfc3339();

        self.conn()?
            .execute(
                "INSERT INTO checkpoints
                 (stage, jurisdiction, byte_offset, processed_ids, inserted, updated, errors, skipped, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (stage, jurisdiction) DO UPDATE SET
                     byte_offset = excluded.byte_offset,
                     processed_ids = excluded.processed_ids,
                     inserted = excluded.inserted,
                     updated = excluded.updated,
                     errors = excluded.errors,
                     skipped = excluded.skipped,
                     updated_at = excluded.updated_at",
                params![
                    stage,
                    jurisdiction,
                    checkpoint.byte_offset as i64,
                    processed_ids_json,
                    checkpoint.inserted as i64,
                    checkpoint.updated as i64,
                    checkpoint.errors as i64,
                    checkpoint.skipped as i64,
                    now,
                ],
            )
            .with_context("Failed to save checkpoint")?;

        tracing::debug!(stage, jurisdiction, "checkpoint written");
        Ok(())
    }

    // =========================================================================
    // Structure / Sections / Refs (S1, S3)
    // =========================================================================

    pub fn upsert_structure(&self, nodes: &[StructureNode]) -> Result<UpsertCounts> {
        self.transaction(|conn| {
            let before = Self::row_count(conn, "structure")?;
            let mut stmt = conn.prepare_cached(
                "INSERT INTO structure (jurisdiction, id, kind, heading, parent_id, sequence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (jurisdiction, id) DO UPDATE SET
                     kind = excluded.kind, heading = excluded.heading,
                     parent_id = excluded.parent_id, sequence = excluded.sequence",
            )?;
            for node in nodes {
                stmt.execute(params![
                    node.jurisdiction.0,
                    node.id,
                    crate::types::enum_to_str(&node.kind),
                    node.heading,
                    node.parent_id,
                    node.sequence,
                ])?;
            }
            let after = Self::row_count(conn, "structure")?;
            Ok(counts_from_delta(before, after, nodes.len()))
        })
    }

    pub fn upsert_sections(&self, sections: &[Section]) -> Result<UpsertCounts> {
        self.transaction(|conn| {
            let before = Self::row_count(conn, "sections")?;
            let mut stmt = conn.prepare_cached(
                "INSERT INTO sections (jurisdiction, id, citation, heading, text, ancestors)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (jurisdiction, id) DO UPDATE SET
                     citation = excluded.citation, heading = excluded.heading,
                     text = excluded.text, ancestors = excluded.ancestors",
            )?;
            for section in sections {
                let ancestors = serde_json::to_string(&section.ancestors)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                stmt.execute(params![
                    section.jurisdiction.0,
                    section.id.0,
                    section.citation,
                    section.heading,
                    section.text,
                    ancestors,
                ])?;
            }
            let after = Self::row_count(conn, "sections")?;
            Ok(counts_from_delta(before, after, sections.len()))
        })
    }

    pub fn upsert_section_refs(
        &self,
        jurisdiction: &str,
        refs: &[CrossReference],
    ) -> Result<UpsertCounts> {
        self.transaction(|conn| {
            let before = Self::row_count(conn, "section_refs")?;
            let mut stmt = conn.prepare_cached(
                "INSERT INTO section_refs (jurisdiction, from_id, to_id, raw_cite, context)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (jurisdiction, from_id, raw_cite) DO UPDATE SET
                     to_id = excluded.to_id, context = excluded.context",
            )?;
            for r in refs {
                stmt.execute(params![
                    jurisdiction,
                    r.source_id.0,
                    r.target_id.as_ref().map(|id| id.0.clone()),
                    r.target_citation,
                    r.context,
                ])?;
            }
            let after = Self::row_count(conn, "section_refs")?;
            Ok(counts_from_delta(before, after, refs.len()))
        })
    }

    // =========================================================================
    // Obligations (S4/S6)
    // =========================================================================

    pub fn upsert_obligations(
        &self,
        jurisdiction: &str,
        obligations: &[Obligation],
    ) -> Result<UpsertCounts> {
        self.transaction(|conn| {
            let before = Self::row_count(conn, "obligations")?;
            let mut stmt = conn.prepare_cached(
                "INSERT INTO obligations
                 (jurisdiction, section_id, category, phrase, value, unit, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for ob in obligations {
                let (value, unit) = match &ob.value {
                    Some(ObligationValue::Days { value }) => (Some(*value as i64), Some("days")),
                    Some(ObligationValue::Cents { value }) => (Some(*value), Some("cents")),
                    None => (None, None),
                };
                stmt.execute(params![
                    jurisdiction,
                    ob.section_id.0,
                    crate::types::enum_to_str(&ob.category),
                    ob.description,
                    value,
                    unit,
                    ob.confidence,
                ])?;
            }
            let after = Self::row_count(conn, "obligations")?;
            Ok(counts_from_delta(before, after, obligations.len()))
        })
    }

    // =========================================================================
    // Similarities and classifications (S5/S9)
    // =========================================================================

    pub fn upsert_similarities(
        &self,
        jurisdiction: &str,
        pairs: &[SimilarityPair],
    ) -> Result<UpsertCounts> {
        self.transaction(|conn| {
            let before = Self::row_count(conn, "section_similarities")?;
            let mut stmt = conn.prepare_cached(
                "INSERT INTO section_similarities (jurisdiction, section_a, section_b, similarity)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (jurisdiction, section_a, section_b) DO UPDATE SET
                     similarity = excluded.similarity",
            )?;
            for pair in pairs {
                stmt.execute(params![
                    jurisdiction,
                    pair.section_a.0,
                    pair.section_b.0,
                    pair.score,
                ])?;
            }
            let after = Self::row_count(conn, "section_similarities")?;
            Ok(counts_from_delta(before, after, pairs.len()))
        })
    }

    pub fn upsert_classifications(
        &self,
        jurisdiction: &str,
        classifications: &[Classification],
    ) -> Result<UpsertCounts> {
        self.transaction(|conn| {
            let before = Self::row_count(conn, "section_similarity_classifications")?;
            let now = chrono::Utc::now().to_rfc3339();
            let mut stmt = conn.prepare_cached(
                "INSERT INTO section_similarity_classifications
                 (jurisdiction, section_a, section_b, kind, explanation, confidence, classified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (jurisdiction, section_a, section_b) DO UPDATE SET
                     kind = excluded.kind, explanation = excluded.explanation,
                     confidence = excluded.confidence, classified_at = excluded.classified_at",
            )?;
            for c in classifications {
                stmt.execute(params![
                    jurisdiction,
                    c.section_a.0,
                    c.section_b.0,
                    crate::types::enum_to_str(&c.kind),
                    c.explanation,
                    c.confidence,
                    now,
                ])?;
            }
            let after = Self::row_count(conn, "section_similarity_classifications")?;
            Ok(counts_from_delta(before, after, classifications.len()))
        })
    }

    // =========================================================================
    // Indicator-bearing records (S8/S10/S11)
    // =========================================================================

    /// Shared implementation for the three structurally-identical
    /// parent/indicators/highlights loaders (reporting, anachronisms,
    /// implementation).
    fn upsert_indicator_record(
        &self,
        parent_table: &str,
        indicators_table: &str,
        highlights_table: &str,
        jurisdiction: &str,
        section_id: &str,
        indicators: &[Indicator],
    ) -> Result<()> {
        self.transaction(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (jurisdiction, section_id) VALUES (?1, ?2)
                     ON CONFLICT (jurisdiction, section_id) DO NOTHING",
                    parent_table
                ),
                params![jurisdiction, section_id],
            )?;

            // Re-running a section's analysis replaces its indicators rather
            // than appending duplicates (spec §4.7 "Multi-table loaders").
            let stale_ids: Vec<i64> = conn
                .prepare(&format!(
                    "SELECT id FROM {} WHERE jurisdiction = ?1 AND section_id = ?2",
                    indicators_table
                ))?
                .query_map(params![jurisdiction, section_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            for id in &stale_ids {
                conn.execute(
                    &format!("DELETE FROM {} WHERE indicator_id = ?1", highlights_table),
                    params![id],
                )?;
            }
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE jurisdiction = ?1 AND section_id = ?2",
                    indicators_table
                ),
                params![jurisdiction, section_id],
            )?;

            let mut indicator_stmt = conn.prepare_cached(&format!(
                "INSERT INTO {}
                 (jurisdiction, section_id, severity, complexity, matched_phrases, recommendation, explanation)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                indicators_table
            ))?;
            let mut highlight_stmt = conn.prepare_cached(&format!(
                "INSERT INTO {} (indicator_id, quote, start, end) VALUES (?1, ?2, ?3, ?4)",
                highlights_table
            ))?;

            for indicator in indicators {
                let matched_phrases = serde_json::to_string(&indicator.matched_phrases)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                indicator_stmt.execute(params![
                    jurisdiction,
                    section_id,
                    indicator.severity,
                    crate::types::enum_to_str(&indicator.complexity),
                    matched_phrases,
                    indicator.recommendation,
                    indicator.explanation,
                ])?;
                let indicator_id = conn.last_insert_rowid();

                for highlight in &indicator.highlights {
                    highlight_stmt.execute(params![
                        indicator_id,
                        highlight.quote,
                        highlight.start,
                        highlight.end,
                    ])?;
                }
            }

            Ok(())
        })
    }

    pub fn upsert_reporting(
        &self,
        jurisdiction: &str,
        section_id: &str,
        indicators: &[Indicator],
    ) -> Result<()> {
        self.upsert_indicator_record(
            "reporting",
            "reporting_indicators",
            "reporting_highlights",
            jurisdiction,
            section_id,
            indicators,
        )
    }

    pub fn upsert_anachronisms(
        &self,
        jurisdiction: &str,
        section_id: &str,
        indicators: &[Indicator],
    ) -> Result<()> {
        self.upsert_indicator_record(
            "anachronisms",
            "anachronism_indicators",
            "anachronism_highlights",
            jurisdiction,
            section_id,
            indicators,
        )
    }

    pub fn upsert_implementation(
        &self,
        jurisdiction: &str,
        section_id: &str,
        indicators: &[Indicator],
    ) -> Result<()> {
        self.upsert_indicator_record(
            "implementation",
            "implementation_indicators",
            "implementation_highlights",
            jurisdiction,
            section_id,
            indicators,
        )
    }
}

/// Derive insert/update split from a row-count delta, matching spec
/// §4.7's "counts inserts vs updates by snapshotting the table's row
/// count before and after each batch" (racy under concurrent writers to
/// the same table, accepted per DESIGN.md's single-writer-per-table model).
fn counts_from_delta(before: i64, after: i64, batch_len: usize) -> UpsertCounts {
    let inserted = (after - before).max(0) as usize;
    UpsertCounts {
        inserted: inserted.min(batch_len),
        updated: batch_len.saturating_sub(inserted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Jurisdiction, ObligationCategory, StructureKind,
    };

    fn db() -> Database {
        let db = Database::open_in_memory().expect("open in-memory database");
        db.initialize().expect("initialize schema");
        db
    }

    #[test]
    fn test_open_in_memory() {
        let db = db();
        let conn = db.connection().expect("connection");
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"sections".to_string()));
        assert!(tables.contains(&"checkpoints".to_string()));
    }

    #[test]
    fn test_transaction_panic_safety() {
        let db = db();

        let result = db.transaction(|_conn| {
            panic!("Intentional panic for testing");
            #[allow(unreachable_code)]
            Ok(())
        });

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("panicked"));
        assert!(db.connection().is_ok());
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let db = db();
        let mut cp = Checkpoint {
            byte_offset: 128,
            inserted: 3,
            ..Default::default()
        };
        cp.processed_ids.insert("dc-1".to_string());

        db.save_checkpoint("sections", "dc", &cp).unwrap();
        let loaded = db.load_checkpoint("sections", "dc").unwrap();
        assert_eq!(loaded.byte_offset, 128);
        assert_eq!(loaded.inserted, 3);
        assert!(loaded.processed_ids.contains("dc-1"));
    }

    #[test]
    fn test_missing_checkpoint_is_default() {
        let db = db();
        let loaded = db.load_checkpoint("sections", "dc").unwrap();
        assert_eq!(loaded.byte_offset, 0);
    }

    #[test]
    fn test_sections_upsert_then_update() {
        let db = db();
        let section = Section {
            id: "dc-1".into(),
            jurisdiction: Jurisdiction("dc".to_string()),
            citation: "§ 1-101".to_string(),
            heading: "Definitions".to_string(),
            text: "Original text".to_string(),
            ancestors: vec![],
        };

        let counts = db.upsert_sections(&[section.clone()]).unwrap();
        assert_eq!(counts.inserted, 1);
        assert_eq!(counts.updated, 0);

        let mut updated_section = section;
        updated_section.text = "Revised text".to_string();
        let counts = db.upsert_sections(&[updated_section]).unwrap();
        assert_eq!(counts.inserted, 0);
        assert_eq!(counts.updated, 1);
    }

    #[test]
    fn test_structure_roundtrip() {
        let db = db();
        let node = StructureNode {
            id: "dc-t1".to_string(),
            jurisdiction: Jurisdiction("dc".to_string()),
            kind: StructureKind::Title,
            heading: "Title 1".to_string(),
            parent_id: None,
            sequence: 1,
        };
        let counts = db.upsert_structure(&[node]).unwrap();
        assert_eq!(counts.inserted, 1);
    }

    #[test]
    fn test_obligations_carries_value_and_unit() {
        let db = db();
        let section = Section {
            id: "dc-1".into(),
            jurisdiction: Jurisdiction("dc".to_string()),
            citation: "§ 1-101".to_string(),
            heading: "Definitions".to_string(),
            text: "text".to_string(),
            ancestors: vec![],
        };
        db.upsert_sections(&[section]).unwrap();

        let obligation = Obligation::regex_derived(
            "dc-1".into(),
            ObligationCategory::Deadline,
            "file within 30 days",
            Some(ObligationValue::Days { value: 30 }),
        );
        let counts = db.upsert_obligations("dc", &[obligation]).unwrap();
        assert_eq!(counts.inserted, 1);

        let conn = db.connection().unwrap();
        let (value, unit): (i64, String) = conn
            .query_row(
                "SELECT value, unit FROM obligations WHERE section_id = 'dc-1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(value, 30);
        assert_eq!(unit, "days");
    }

    #[test]
    fn test_reporting_rerun_replaces_indicators() {
        use crate::types::{Complexity, Highlight};

        let db = db();
        let section = Section {
            id: "dc-1".into(),
            jurisdiction: Jurisdiction("dc".to_string()),
            citation: "§ 1-101".to_string(),
            heading: "Definitions".to_string(),
            text: "text".to_string(),
            ancestors: vec![],
        };
        db.upsert_sections(&[section]).unwrap();

        let first = vec![Indicator {
            severity: "high".to_string(),
            complexity: Complexity::High,
            matched_phrases: vec!["shall".to_string()],
            recommendation: None,
            explanation: "first pass".to_string(),
            highlights: vec![Highlight {
                quote: "shall file".to_string(),
                start: Some(0),
                end: Some(10),
            }],
        }];
        db.upsert_reporting("dc", "dc-1", &first).unwrap();

        let second = vec![Indicator {
            severity: "medium".to_string(),
            complexity: Complexity::Medium,
            matched_phrases: vec![],
            recommendation: Some("review".to_string()),
            explanation: "second pass".to_string(),
            highlights: vec![],
        }];
        db.upsert_reporting("dc", "dc-1", &second).unwrap();

        let conn = db.connection().unwrap();
        let indicator_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM reporting_indicators WHERE section_id = 'dc-1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indicator_count, 1);

        let highlight_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM reporting_highlights", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(highlight_count, 0);
    }
}
