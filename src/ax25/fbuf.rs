//! Frame buffer with a read cursor.

/// Byte buffer a frame is assembled into and decoded out of. Writes
/// append; reads walk a separate cursor so a frame can be decoded
/// repeatedly.
#[derive(Debug, Clone, Default)]
pub struct FrameBuf {
    data: Vec<u8>,
    rpos: usize,
}

impl FrameBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: Vec::with_capacity(cap),
            rpos: 0,
        }
    }

    pub fn put_u8(&mut self, b: u8) {
        self.data.push(b);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Next byte at the read cursor, or 0 past the end.
    pub fn get_u8(&mut self) -> u8 {
        let b = self.data.get(self.rpos).copied().unwrap_or(0);
        if self.rpos < self.data.len() {
            self.rpos += 1;
        }
        b
    }

    /// Rewind the read cursor to the start.
    pub fn reset(&mut self) {
        self.rpos = 0;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.rpos
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl From<&[u8]> for FrameBuf {
    fn from(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            rpos: 0,
        }
    }
}
