//! Append-only checkpointed NDJSON writer (C1, spec §4.1).

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::types::{PipelineError, Result};

/// Appends records to a file, one flushed line per `write()`. Opens in
/// append mode and never truncates, so a writer started against a partial
/// file from a previous resumed run simply continues it. `close()` is
/// idempotent.
pub struct AppendWriter<T> {
    file: BufWriter<File>,
    closed: bool,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Serialize> AppendWriter<T> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(PipelineError::Io)?;
        Ok(Self {
            file: BufWriter::new(file),
            closed: false,
            _marker: std::marker::PhantomData,
        })
    }

    /// Serialize and append one record as a single line, flushing
    /// immediately so a crash leaves the file at a line boundary.
    pub fn write(&mut self, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.file.write_all(line.as_bytes()).map_err(PipelineError::Io)?;
        self.file.write_all(b"\n").map_err(PipelineError::Io)?;
        self.file.flush().map_err(PipelineError::Io)?;
        Ok(())
    }

    /// Flush and mark the writer closed. A no-op on the second and later
    /// calls.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.file.flush().map_err(PipelineError::Io)?;
        self.closed = true;
        Ok(())
    }
}

impl<T> Drop for AppendWriter<T> {
    fn drop(&mut self) {
        let _ = self.file.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: u32,
    }

    #[test]
    fn appends_one_line_per_write() {
        let file = tempfile::NamedTempFile::new().unwrap();
        {
            let mut writer = AppendWriter::<Row>::open(file.path()).unwrap();
            writer.write(&Row { id: 1 }).unwrap();
            writer.write(&Row { id: 2 }).unwrap();
            writer.close().unwrap();
        }
        let contents = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            serde_json::from_str::<Row>(lines[0]).unwrap(),
            Row { id: 1 }
        );
    }

    #[test]
    fn reopening_appends_without_truncating() {
        let file = tempfile::NamedTempFile::new().unwrap();
        {
            let mut writer = AppendWriter::<Row>::open(file.path()).unwrap();
            writer.write(&Row { id: 1 }).unwrap();
        }
        {
            let mut writer = AppendWriter::<Row>::open(file.path()).unwrap();
            writer.write(&Row { id: 2 }).unwrap();
        }
        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn close_is_idempotent() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut writer = AppendWriter::<Row>::open(file.path()).unwrap();
        writer.write(&Row { id: 1 }).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
