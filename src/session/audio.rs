/// Accumulates inbound client audio between arrival and flush
///
/// Append-only: chunks are concatenated in arrival order and the whole
/// buffer is handed off at once, never partially. The session task is the
/// single owner, so ingest and flush never interleave for one session.
#[derive(Debug, Default)]
pub struct AudioIngestBuffer {
    data: Vec<u8>,
}

impl AudioIngestBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, preserving arrival order
    pub fn ingest(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
    }

    /// Take the entire buffered contents, leaving the buffer empty
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
