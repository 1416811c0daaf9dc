//! Checkpointed NDJSON reader (C1, spec §4.1).

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::types::{Checkpoint, PipelineError, Result};

/// Reads one record per line from an NDJSON file, resuming from
/// `checkpoint.byte_offset`. A stale checkpoint (one whose offset exceeds
/// the file's current size) is reset to zero before the seek.
///
/// Malformed lines are logged and skipped rather than surfaced as an
/// error (spec §7: "input-record-invalid" — logged, counted, discarded,
/// stage continues).
pub struct ResumableReader<T> {
    reader: BufReader<File>,
    offset: u64,
    _marker: std::marker::PhantomData<T>,
}

impl<T: DeserializeOwned> ResumableReader<T> {
    pub fn open(path: impl AsRef<Path>, checkpoint: &mut Checkpoint) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(PipelineError::Io)?;
        let file_size = file.metadata().map_err(PipelineError::Io)?.len();
        checkpoint.reset_if_stale(file_size);

        let mut file = file;
        file.seek(SeekFrom::Start(checkpoint.byte_offset))
            .map_err(PipelineError::Io)?;

        Ok(Self {
            reader: BufReader::new(file),
            offset: checkpoint.byte_offset,
            _marker: std::marker::PhantomData,
        })
    }

    /// Byte offset just past the last line returned by `next_record`. The
    /// caller checkpoints this value once the record has been durably
    /// handled downstream, never before.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read and parse the next record, silently skipping blank and
    /// malformed lines. Returns `Ok(None)` at end of file.
    pub fn next_record(&mut self) -> Result<Option<T>> {
        loop {
            let mut line = String::new();
            let bytes_read = self
                .reader
                .read_line(&mut line)
                .map_err(PipelineError::Io)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.offset += bytes_read as u64;

            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<T>(trimmed) {
                Ok(record) => return Ok(Some(record)),
                Err(err) => {
                    tracing::warn!(error = %err, line = trimmed, "skipping malformed NDJSON line");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: u32,
    }

    fn write_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_one_record_per_line() {
        let file = write_file(&[r#"{"id":1}"#, r#"{"id":2}"#]);
        let mut checkpoint = Checkpoint::default();
        let mut reader = ResumableReader::<Row>::open(file.path(), &mut checkpoint).unwrap();
        assert_eq!(reader.next_record().unwrap(), Some(Row { id: 1 }));
        assert_eq!(reader.next_record().unwrap(), Some(Row { id: 2 }));
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn skips_malformed_lines_and_continues() {
        let file = write_file(&[r#"{"id":1}"#, "not json", r#"{"id":2}"#]);
        let mut checkpoint = Checkpoint::default();
        let mut reader = ResumableReader::<Row>::open(file.path(), &mut checkpoint).unwrap();
        assert_eq!(reader.next_record().unwrap(), Some(Row { id: 1 }));
        assert_eq!(reader.next_record().unwrap(), Some(Row { id: 2 }));
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn resumes_from_checkpoint_offset() {
        let file = write_file(&[r#"{"id":1}"#, r#"{"id":2}"#]);
        let mut checkpoint = Checkpoint::default();
        {
            let mut reader = ResumableReader::<Row>::open(file.path(), &mut checkpoint).unwrap();
            reader.next_record().unwrap();
            checkpoint.byte_offset = reader.offset();
        }
        let mut reader = ResumableReader::<Row>::open(file.path(), &mut checkpoint).unwrap();
        assert_eq!(reader.next_record().unwrap(), Some(Row { id: 2 }));
    }

    #[test]
    fn stale_offset_past_eof_resets_to_zero() {
        let file = write_file(&[r#"{"id":1}"#]);
        let mut checkpoint = Checkpoint::default();
        checkpoint.byte_offset = 10_000;
        let mut reader = ResumableReader::<Row>::open(file.path(), &mut checkpoint).unwrap();
        assert_eq!(reader.next_record().unwrap(), Some(Row { id: 1 }));
    }
}
