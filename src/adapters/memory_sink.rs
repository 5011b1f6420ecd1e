//! In-memory status sink for tests and replay.

use crate::app::ports::StatusSink;
use crate::app::status::StatusSnapshot;
use crate::error::SinkError;

/// Keeps every published snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusSink {
    snapshots: Vec<StatusSnapshot>,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> &[StatusSnapshot] {
        &self.snapshots
    }

    pub fn last(&self) -> Option<&StatusSnapshot> {
        self.snapshots.last()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl StatusSink for MemoryStatusSink {
    fn publish(&mut self, snapshot: &StatusSnapshot) -> Result<(), SinkError> {
        self.snapshots.push(*snapshot);
        Ok(())
    }
}
