//! Reassembly of fragmented inbound frames

use crate::{Error, Result};

/// Default cap on a reassembled message (16 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Accumulates fragments until the final one arrives
#[derive(Debug)]
pub struct Reassembler {
    buffer: Vec<u8>,
    max_size: usize,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl Reassembler {
    /// Create a reassembler that rejects messages larger than `max_size`
    #[must_use]
    pub const fn new(max_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_size,
        }
    }

    /// Feed one fragment
    ///
    /// Returns the complete text once `fin` is seen, `None` while more
    /// fragments are expected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the completed message is not UTF-8 (the
    /// message is discarded, the stream stays usable) and [`Error::Transport`]
    /// if the message grows past the size cap
    pub fn push(&mut self, bytes: &[u8], fin: bool) -> Result<Option<String>> {
        if self.buffer.len() + bytes.len() > self.max_size {
            let size = self.buffer.len() + bytes.len();
            self.buffer.clear();
            return Err(Error::Transport(format!(
                "inbound message of {size} bytes exceeds {} byte limit",
                self.max_size
            )));
        }
        self.buffer.extend_from_slice(bytes);

        if !fin {
            tracing::trace!(buffered = self.buffer.len(), "awaiting further fragments");
            return Ok(None);
        }

        let complete = std::mem::take(&mut self.buffer);
        String::from_utf8(complete)
            .map(Some)
            .map_err(|e| Error::Protocol(format!("inbound message is not UTF-8: {e}")))
    }

    /// Bytes held for an unfinished message
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
