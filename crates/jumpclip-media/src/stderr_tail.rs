//! Bounded capture of a subprocess error stream.

use std::collections::VecDeque;
use std::fmt;

/// Ring buffer holding the last `capacity` bytes written to it.
#[derive(Debug, Clone)]
pub struct StderrTail {
    buf: VecDeque<u8>,
    capacity: usize,
    dropped: u64,
}

impl StderrTail {
    /// Matches the diagnostic budget of a job record's `stderrTail`.
    pub const DEFAULT_CAPACITY: usize = 20_000;

    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity.min(64 * 1024)),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        if self.capacity == 0 {
            self.dropped += bytes.len() as u64;
            return;
        }

        if bytes.len() >= self.capacity {
            self.dropped += (self.buf.len() + bytes.len() - self.capacity) as u64;
            self.buf.clear();
            self.buf.extend(&bytes[bytes.len() - self.capacity..]);
            return;
        }

        let overflow = (self.buf.len() + bytes.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.buf.drain(..overflow);
            self.dropped += overflow as u64;
        }
        self.buf.extend(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether earlier output was discarded to stay within capacity.
    pub fn truncated(&self) -> bool {
        self.dropped > 0
    }

    /// Lossy UTF-8 view. A multi-byte character cut by the ring boundary is skipped.
    pub fn to_string_lossy(&self) -> String {
        let (front, back) = self.buf.as_slices();
        let mut bytes = Vec::with_capacity(self.buf.len());
        bytes.extend_from_slice(front);
        bytes.extend_from_slice(back);

        let start = if self.truncated() {
            bytes
                .iter()
                .position(|b| b & 0xC0 != 0x80)
                .unwrap_or(bytes.len())
        } else {
            0
        };
        String::from_utf8_lossy(&bytes[start..]).into_owned()
    }

    /// Keep the last `capacity` bytes of `text`, cut on a character boundary.
    pub fn bounded(text: &str, capacity: usize) -> String {
        if text.len() <= capacity {
            return text.to_string();
        }
        let mut start = text.len() - capacity;
        while !text.is_char_boundary(start) {
            start += 1;
        }
        text[start..].to_string()
    }
}

impl Default for StderrTail {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl fmt::Display for StderrTail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}
