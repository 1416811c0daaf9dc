//! Stage runner (spec §4.8): the harness every S1-S12 stage binary drives
//! through — a checkpointed reader/writer pair, a bounded concurrent
//! worker pool, and a terminal summary report, wrapped around a
//! per-record `process` closure supplied by the stage itself.

use std::future::Future;
use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ndjson::{AppendWriter, ResumableReader};
use crate::storage::Database;
use crate::types::Result;

use super::shutdown;

/// Arguments common to every stage (spec §4.8 step 1, "parse args").
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub stage: String,
    pub jurisdiction: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Number of records polled concurrently per chunk. `1` preserves
    /// strict input order; values above that trade ordering for
    /// throughput on I/O-bound work (network calls, disk).
    pub workers: usize,
}

/// Counters accumulated over one stage run, printed as the terminal
/// summary report (spec §7).
#[derive(Debug, Default, Clone)]
pub struct StageSummary {
    pub processed: u64,
    pub inserted: u64,
    pub skipped: u64,
    pub errors: u64,
    pub interrupted_by_signal: Option<u8>,
}

impl StageSummary {
    pub fn report(&self) -> String {
        let mut line = format!(
            "processed={} inserted={} skipped={} errors={}",
            self.processed, self.inserted, self.skipped, self.errors
        );
        if let Some(signal_number) = self.interrupted_by_signal {
            line.push_str(&format!(" interrupted_by_signal={signal_number}"));
        }
        line
    }
}

/// Runs `process` over every record in `config.input_path`, resuming from
/// the stage's checkpoint and appending each `Some` output to
/// `config.output_path`.
///
/// Up to `config.workers` records are polled concurrently per chunk.
/// This is cooperative concurrency within the calling task rather than a
/// pool of OS threads: the work a stage does (LLM calls, HTTP, disk) is
/// I/O-bound, so overlapping their `.await` points gets the same
/// throughput without a mutex guarding the writer or checkpoint — both
/// are only ever touched between chunks, on this one task.
///
/// Graceful shutdown: the first SIGINT/SIGTERM stops the loop from
/// starting a new chunk, lets the in-flight chunk finish, flushes the
/// checkpoint, and returns a summary with `interrupted_by_signal` set so
/// the caller can translate it into a `128 + signal` exit code. A second
/// signal reaches the process's default disposition untouched.
pub async fn run_stage<In, Out, F, Fut>(
    db: &Database,
    config: StageConfig,
    process: F,
) -> Result<StageSummary>
where
    In: DeserializeOwned,
    Out: Serialize,
    F: Fn(In) -> Fut,
    Fut: Future<Output = Result<Option<Out>>>,
{
    let mut checkpoint = db.load_checkpoint(&config.stage, &config.jurisdiction)?;
    let mut reader = ResumableReader::<In>::open(&config.input_path, &mut checkpoint)?;
    let mut writer = AppendWriter::<Out>::open(&config.output_path)?;
    let mut summary = StageSummary {
        processed: checkpoint.inserted + checkpoint.skipped,
        inserted: checkpoint.inserted,
        skipped: checkpoint.skipped,
        errors: checkpoint.errors,
        interrupted_by_signal: None,
    };

    let shutdown_flag = shutdown::watch();
    let worker_count = config.workers.max(1);

    loop {
        if let Some(signal_number) = shutdown_flag.signal_number() {
            tracing::warn!(stage = %config.stage, signal_number, "stopping before next chunk");
            summary.interrupted_by_signal = Some(signal_number);
            break;
        }

        let mut chunk = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            match reader.next_record()? {
                Some(record) => chunk.push(record),
                None => break,
            }
        }
        if chunk.is_empty() {
            break;
        }

        let outcomes: Vec<Result<Option<Out>>> = stream::iter(chunk)
            .map(|record| process(record))
            .buffer_unordered(worker_count)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Ok(Some(output)) => {
                    writer.write(&output)?;
                    summary.processed += 1;
                    summary.inserted += 1;
                }
                Ok(None) => {
                    summary.processed += 1;
                    summary.skipped += 1;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "record processing failed");
                    summary.processed += 1;
                    summary.errors += 1;
                }
            }
        }

        checkpoint.byte_offset = reader.offset();
        checkpoint.inserted = summary.inserted;
        checkpoint.skipped = summary.skipped;
        checkpoint.errors = summary.errors;
        db.save_checkpoint(&config.stage, &config.jurisdiction, &checkpoint)?;
    }

    writer.close()?;
    tracing::info!(stage = %config.stage, summary = %summary.report(), "stage finished");
    Ok(summary)
}

/// Like [`run_stage`] but for stages where one input record fans out into
/// zero or more output records (S3 references, S4 obligations, S6
/// obligation extraction) rather than at most one. A record that yields no
/// outputs still counts as processed/skipped, matching spec §4.6's
/// "processed — skipped" checkpoint accounting.
pub async fn run_fanout_stage<In, Out, F, Fut>(
    db: &Database,
    config: StageConfig,
    process: F,
) -> Result<StageSummary>
where
    In: DeserializeOwned,
    Out: Serialize,
    F: Fn(In) -> Fut,
    Fut: Future<Output = Result<Vec<Out>>>,
{
    let mut checkpoint = db.load_checkpoint(&config.stage, &config.jurisdiction)?;
    let mut reader = ResumableReader::<In>::open(&config.input_path, &mut checkpoint)?;
    let mut writer = AppendWriter::<Out>::open(&config.output_path)?;
    let mut summary = StageSummary {
        processed: checkpoint.inserted + checkpoint.skipped,
        inserted: checkpoint.inserted,
        skipped: checkpoint.skipped,
        errors: checkpoint.errors,
        interrupted_by_signal: None,
    };

    let shutdown_flag = shutdown::watch();
    let worker_count = config.workers.max(1);

    loop {
        if let Some(signal_number) = shutdown_flag.signal_number() {
            tracing::warn!(stage = %config.stage, signal_number, "stopping before next chunk");
            summary.interrupted_by_signal = Some(signal_number);
            break;
        }

        let mut chunk = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            match reader.next_record()? {
                Some(record) => chunk.push(record),
                None => break,
            }
        }
        if chunk.is_empty() {
            break;
        }

        let outcomes: Vec<Result<Vec<Out>>> = stream::iter(chunk)
            .map(|record| process(record))
            .buffer_unordered(worker_count)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Ok(items) => {
                    summary.processed += 1;
                    if items.is_empty() {
                        summary.skipped += 1;
                    } else {
                        for item in &items {
                            writer.write(item)?;
                        }
                        summary.inserted += items.len() as u64;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "record processing failed");
                    summary.processed += 1;
                    summary.errors += 1;
                }
            }
        }

        checkpoint.byte_offset = reader.offset();
        checkpoint.inserted = summary.inserted;
        checkpoint.skipped = summary.skipped;
        checkpoint.errors = summary.errors;
        db.save_checkpoint(&config.stage, &config.jurisdiction, &checkpoint)?;
    }

    writer.close()?;
    tracing::info!(stage = %config.stage, summary = %summary.report(), "stage finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use serde::{Deserialize, Serialize};
    use std::io::Write;

    #[derive(Debug, Serialize, Deserialize)]
    struct InRow {
        value: u32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct OutRow {
        doubled: u32,
    }

    fn ndjson_file(values: &[u32]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for value in values {
            writeln!(file, r#"{{"value":{value}}}"#).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn processes_every_record_and_writes_outputs() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let input = ndjson_file(&[1, 2, 3]);
        let output_dir = tempfile::tempdir().unwrap();
        let output_path = output_dir.path().join("out.ndjson");

        let config = StageConfig {
            stage: "test_stage".to_string(),
            jurisdiction: "dc".to_string(),
            input_path: input.path().to_path_buf(),
            output_path: output_path.clone(),
            workers: 2,
        };

        let summary = run_stage(&db, config, |record: InRow| async move {
            Ok(Some(OutRow { doubled: record.value * 2 }))
        })
        .await
        .unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.inserted, 3);
        assert_eq!(summary.errors, 0);

        let written = std::fs::read_to_string(&output_path).unwrap();
        assert_eq!(written.lines().count(), 3);

        let checkpoint = db.load_checkpoint("test_stage", "dc").unwrap();
        assert_eq!(checkpoint.inserted, 3);
    }

    #[tokio::test]
    async fn skipped_records_do_not_produce_output() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let input = ndjson_file(&[1, 2]);
        let output_dir = tempfile::tempdir().unwrap();
        let output_path = output_dir.path().join("out.ndjson");

        let config = StageConfig {
            stage: "test_stage".to_string(),
            jurisdiction: "dc".to_string(),
            input_path: input.path().to_path_buf(),
            output_path: output_path.clone(),
            workers: 1,
        };

        let summary = run_stage(&db, config, |record: InRow| async move {
            if record.value == 1 {
                Ok(None)
            } else {
                Ok(Some(OutRow { doubled: record.value * 2 }))
            }
        })
        .await
        .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.inserted, 1);

        let written = std::fs::read_to_string(&output_path).unwrap();
        assert_eq!(written.lines().count(), 1);
    }

    #[tokio::test]
    async fn fanout_stage_writes_one_line_per_output_item() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let input = ndjson_file(&[2, 0, 3]);
        let output_dir = tempfile::tempdir().unwrap();
        let output_path = output_dir.path().join("out.ndjson");

        let config = StageConfig {
            stage: "test_fanout".to_string(),
            jurisdiction: "dc".to_string(),
            input_path: input.path().to_path_buf(),
            output_path: output_path.clone(),
            workers: 1,
        };

        let summary = run_fanout_stage(&db, config, |record: InRow| async move {
            Ok((0..record.value)
                .map(|n| OutRow { doubled: n })
                .collect::<Vec<_>>())
        })
        .await
        .unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.inserted, 5);
        assert_eq!(summary.skipped, 1);

        let written = std::fs::read_to_string(&output_path).unwrap();
        assert_eq!(written.lines().count(), 5);
    }
}
