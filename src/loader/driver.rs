//! Generic bulk-loader driver loop (C3, spec §4.7): seek-to-checkpoint,
//! batch, transactional write, retry-with-backoff, checkpoint update.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::LoaderConfig;
use crate::ndjson::ResumableReader;
use crate::storage::{Database, UpsertCounts};
use crate::types::{Checkpoint, PipelineError, Result};

/// A record a loader can validate before it's written. Records failing
/// validation are logged, counted as skipped, and dropped from the batch
/// rather than aborting it (spec §7: "input-record-invalid").
pub trait LoaderRecord: DeserializeOwned {
    fn validate(&self) -> Option<String> {
        None
    }
}

/// Totals accumulated across one driver run, folded into the checkpoint
/// after every committed batch.
#[derive(Debug, Default, Clone)]
pub struct LoaderReport {
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
}

/// Drives one NDJSON file through a table-specific `write_batch` closure,
/// reusing `db`'s checkpoint store to resume a killed run exactly where
/// it left off.
pub struct LoaderDriver<'a> {
    db: &'a Database,
    config: LoaderConfig,
}

impl<'a> LoaderDriver<'a> {
    pub fn new(db: &'a Database, config: LoaderConfig) -> Self {
        Self { db, config }
    }

    /// Runs the driver loop over `path`. `write_batch` must itself be
    /// idempotent under `ON CONFLICT DO UPDATE` so a batch replayed after
    /// a crash between commit and checkpoint update never double-counts.
    pub fn run<T, F>(
        &self,
        stage: &str,
        jurisdiction: &str,
        path: impl AsRef<Path>,
        mut write_batch: F,
    ) -> Result<LoaderReport>
    where
        T: LoaderRecord,
        F: FnMut(&Database, &[T]) -> Result<UpsertCounts>,
    {
        let mut checkpoint = self.db.load_checkpoint(stage, jurisdiction)?;
        let mut reader = ResumableReader::<T>::open(path, &mut checkpoint)?;
        let mut report = LoaderReport {
            inserted: checkpoint.inserted,
            updated: checkpoint.updated,
            skipped: checkpoint.skipped,
            errors: checkpoint.errors,
        };

        let mut batch: Vec<T> = Vec::with_capacity(self.config.batch_size);

        loop {
            match reader.next_record()? {
                Some(record) => {
                    if let Some(reason) = record.validate() {
                        tracing::warn!(reason, "skipping invalid record");
                        report.skipped += 1;
                        continue;
                    }
                    batch.push(record);
                    if batch.len() >= self.config.batch_size {
                        self.commit_batch(
                            stage,
                            jurisdiction,
                            &mut batch,
                            &mut report,
                            &mut checkpoint,
                            reader.offset(),
                            &mut write_batch,
                        )?;
                    }
                }
                None => {
                    if !batch.is_empty() {
                        self.commit_batch(
                            stage,
                            jurisdiction,
                            &mut batch,
                            &mut report,
                            &mut checkpoint,
                            reader.offset(),
                            &mut write_batch,
                        )?;
                    }
                    break;
                }
            }
        }

        Ok(report)
    }

    fn commit_batch<T, F>(
        &self,
        stage: &str,
        jurisdiction: &str,
        batch: &mut Vec<T>,
        report: &mut LoaderReport,
        checkpoint: &mut Checkpoint,
        new_offset: u64,
        write_batch: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&Database, &[T]) -> Result<UpsertCounts>,
    {
        let mut attempt = 0u32;
        let mut delay = Duration::from_secs(self.config.base_backoff_secs);

        loop {
            match write_batch(self.db, batch) {
                Ok(counts) => {
                    report.inserted += counts.inserted as u64;
                    report.updated += counts.updated as u64;
                    return self.advance_checkpoint(stage, jurisdiction, batch, report, checkpoint, new_offset);
                }
                Err(err) if is_transient(&err) && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %err, "transient database error, retrying batch");
                    std::thread::sleep(delay);
                    delay *= 2;
                }
                Err(err) if is_transient(&err) => {
                    // Exhausted retries: per spec §7, the batch is rolled back
                    // and the checkpoint is NOT advanced, so the next run
                    // replays it from scratch.
                    tracing::error!(error = %err, "transient database error exhausted retries");
                    report.errors += batch.len() as u64;
                    return Err(err);
                }
                Err(err) => {
                    // Integrity error: logged, counted as errored, loader
                    // proceeds with the next batch rather than replaying
                    // this one forever (spec §7: "database-integrity").
                    tracing::error!(error = %err, "database integrity error, skipping batch");
                    report.errors += batch.len() as u64;
                    return self.advance_checkpoint(stage, jurisdiction, batch, report, checkpoint, new_offset);
                }
            }
        }
    }

    fn advance_checkpoint<T>(
        &self,
        stage: &str,
        jurisdiction: &str,
        batch: &mut Vec<T>,
        report: &LoaderReport,
        checkpoint: &mut Checkpoint,
        new_offset: u64,
    ) -> Result<()> {
        checkpoint.byte_offset = new_offset;
        checkpoint.inserted = report.inserted;
        checkpoint.updated = report.updated;
        checkpoint.skipped = report.skipped;
        checkpoint.errors = report.errors;
        self.db.save_checkpoint(stage, jurisdiction, checkpoint)?;
        batch.clear();
        Ok(())
    }
}

/// Distinguishes a retryable database error (lock contention, busy
/// connection, pool exhaustion) from everything else, which propagates
/// immediately (spec §7's transient-vs-integrity split).
fn is_transient(err: &PipelineError) -> bool {
    match err {
        PipelineError::Database(rusqlite::Error::SqliteFailure(ffi_err, _)) => matches!(
            ffi_err.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ),
        PipelineError::Pool(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use serde::{Deserialize, Serialize};
    use std::io::Write;

    #[derive(Debug, Serialize, Deserialize)]
    struct Row {
        id: u32,
    }

    impl LoaderRecord for Row {
        fn validate(&self) -> Option<String> {
            if self.id == 0 {
                Some("id must be nonzero".to_string())
            } else {
                None
            }
        }
    }

    fn ndjson_file(ids: &[u32]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for id in ids {
            writeln!(file, r#"{{"id":{id}}}"#).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn drives_all_records_through_write_batch_and_checkpoints() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let file = ndjson_file(&[1, 2, 3]);
        let driver = LoaderDriver::new(&db, LoaderConfig::default());

        let mut seen = Vec::new();
        let report = driver
            .run::<Row, _>("test_stage", "dc", file.path(), |_db, batch| {
                seen.extend(batch.iter().map(|r| r.id));
                Ok(UpsertCounts {
                    inserted: batch.len(),
                    updated: 0,
                })
            })
            .unwrap();

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(report.inserted, 3);

        let checkpoint = db.load_checkpoint("test_stage", "dc").unwrap();
        assert_eq!(checkpoint.inserted, 3);
        assert!(checkpoint.byte_offset > 0);
    }

    #[test]
    fn invalid_records_are_skipped_not_written() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let file = ndjson_file(&[1, 0, 2]);
        let driver = LoaderDriver::new(&db, LoaderConfig::default());

        let mut seen = Vec::new();
        let report = driver
            .run::<Row, _>("test_stage", "dc", file.path(), |_db, batch| {
                seen.extend(batch.iter().map(|r| r.id));
                Ok(UpsertCounts {
                    inserted: batch.len(),
                    updated: 0,
                })
            })
            .unwrap();

        assert_eq!(seen, vec![1, 2]);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn non_transient_error_advances_checkpoint_and_counts_errored() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let file = ndjson_file(&[1, 2]);
        let driver = LoaderDriver::new(
            &db,
            LoaderConfig {
                batch_size: 1,
                ..LoaderConfig::default()
            },
        );

        let mut calls = 0u32;
        let report = driver
            .run::<Row, _>("test_stage", "dc", file.path(), |_db, batch| {
                calls += 1;
                if calls == 1 {
                    Err(PipelineError::Storage("constraint violation".into()))
                } else {
                    Ok(UpsertCounts {
                        inserted: batch.len(),
                        updated: 0,
                    })
                }
            })
            .unwrap();

        assert_eq!(report.errors, 1);
        assert_eq!(report.inserted, 1);
    }
}
