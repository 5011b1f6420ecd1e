//! JSON-lines status feed for the dashboard process.
//!
//! One compact JSON object per snapshot, newline terminated, flushed every
//! tick so a reader tailing the file sees each tick as it lands.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::app::ports::StatusSink;
use crate::app::status::StatusSnapshot;
use crate::error::SinkError;

pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Create or truncate `path`.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> StatusSink for JsonLinesSink<W> {
    fn publish(&mut self, snapshot: &StatusSnapshot) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
