//! Line framing for `data:`-style event streams.

/// Marker that prefixes every payload line.
pub const DATA_PREFIX: &[u8] = b"data:";
/// Payload that ends the stream normally.
pub const DONE_SENTINEL: &[u8] = b"[DONE]";

/// Classification of one complete line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Empty line between events.
    Blank,
    /// Any other non-payload line: comments, keepalives, `event:`/`id:` fields,
    /// or a `data:` line with nothing after the marker.
    Noise,
    /// The `[DONE]` sentinel.
    Done,
    /// Trimmed payload of a `data:` line.
    Data(&'a [u8]),
}

impl<'a> Frame<'a> {
    pub fn classify(line: &'a [u8]) -> Self {
        if line.trim_ascii().is_empty() {
            return Self::Blank;
        }
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Self::Noise;
        };
        let payload = payload.trim_ascii();
        if payload.is_empty() {
            Self::Noise
        } else if payload == DONE_SENTINEL {
            Self::Done
        } else {
            Self::Data(payload)
        }
    }
}

/// Incremental splitter of raw bytes into `\n`-terminated lines.
///
/// Works on bytes so a multi-byte character split across two chunks is
/// reassembled before anything looks at it. A trailing `\r` is dropped.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
    scanned: usize,
}

impl LineFramer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let offset = self.buffer[self.scanned..]
            .iter()
            .position(|byte| *byte == b'\n');
        let Some(offset) = offset else {
            self.scanned = self.buffer.len();
            return None;
        };

        let end = self.scanned + offset;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        self.scanned = 0;
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    /// Remaining unterminated bytes, handed out once the source has ended.
    pub fn take_remainder(&mut self) -> Option<Vec<u8>> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buffer);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}
