//! Checkpointed NDJSON I/O (C1, spec §4.1).
//!
//! Every stage reads its input and writes its output through these two
//! types so resuming a killed run never re-processes a record whose
//! output was already durably written.

mod reader;
mod writer;

pub use reader::ResumableReader;
pub use writer::AppendWriter;
