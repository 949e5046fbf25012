use bytes::{Buf, BytesMut};

use crate::error::{FrameError, Result};

/// Default ceiling on buffered-but-undecoded bytes: 16 MiB.
pub const DEFAULT_MAX_BUFFER: usize = 16 * 1024 * 1024;

const INITIAL_CAPACITY: usize = 8 * 1024;

/// Accumulating receive buffer with explicit consumption bookkeeping.
///
/// `append` grows the logical received length, `remove` advances a read
/// offset past decoded frames, and `compact` discards the consumed
/// prefix once per receive cycle. Decoders only ever see the unconsumed
/// suffix, so consumed bytes can never be decoded twice.
#[derive(Debug)]
pub struct ReceiveBuffer {
    buf: BytesMut,
    offset: usize,
    max_size: usize,
}

impl ReceiveBuffer {
    /// Create a buffer bounded at [`DEFAULT_MAX_BUFFER`].
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_BUFFER)
    }

    /// Create a buffer with an explicit size ceiling.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_CAPACITY.min(max_size)),
            offset: 0,
            max_size,
        }
    }

    /// Append newly received bytes.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        let needed = self.buf.len() + data.len();
        if needed > self.max_size {
            return Err(FrameError::CapacityExceeded {
                needed,
                max: self.max_size,
            });
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Discard `n` bytes from the front of the unconsumed suffix.
    pub fn remove(&mut self, n: usize) -> Result<()> {
        let available = self.unconsumed_len();
        if n > available {
            return Err(FrameError::InvalidRemove {
                requested: n,
                available,
            });
        }
        self.offset += n;
        Ok(())
    }

    /// Drop the consumed prefix; the unconsumed suffix moves to the
    /// start and the offset resets to zero.
    pub fn compact(&mut self) {
        self.buf.advance(self.offset);
        self.offset = 0;
    }

    /// The bytes no decoder has consumed yet.
    pub fn unconsumed(&self) -> &[u8] {
        &self.buf[self.offset..]
    }

    /// Length of the unconsumed suffix.
    pub fn unconsumed_len(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Total bytes held, consumed prefix included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if the buffer holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current read offset (length of the consumed prefix).
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Discard everything, consumed or not.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.offset = 0;
    }
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_remove_advances_offset() {
        let mut buf = ReceiveBuffer::new();
        buf.append(b"0123456789").unwrap();
        assert_eq!(buf.unconsumed(), b"0123456789");

        buf.remove(4).unwrap();
        assert_eq!(buf.offset(), 4);
        assert_eq!(buf.unconsumed(), b"456789");
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn remove_more_than_unconsumed_fails_without_corruption() {
        let mut buf = ReceiveBuffer::new();
        buf.append(b"abcdef").unwrap();
        buf.remove(4).unwrap();

        let err = buf.remove(3).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidRemove {
                requested: 3,
                available: 2
            }
        ));
        // State untouched by the failed call.
        assert_eq!(buf.offset(), 4);
        assert_eq!(buf.unconsumed(), b"ef");
    }

    #[test]
    fn compact_moves_suffix_to_start() {
        let mut buf = ReceiveBuffer::new();
        buf.append(b"consumed|keep").unwrap();
        buf.remove(9).unwrap();

        buf.compact();
        assert_eq!(buf.offset(), 0);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.unconsumed(), b"keep");
    }

    #[test]
    fn consumed_bytes_never_reappear() {
        let mut buf = ReceiveBuffer::new();
        buf.append(b"first").unwrap();
        buf.remove(5).unwrap();
        buf.compact();
        buf.append(b"second").unwrap();
        assert_eq!(buf.unconsumed(), b"second");
    }

    #[test]
    fn invariant_holds_across_mixed_calls() {
        let mut buf = ReceiveBuffer::with_max_size(64);
        for round in 0..8 {
            buf.append(&[round as u8; 7]).unwrap();
            buf.remove(3).unwrap();
            assert!(buf.offset() <= buf.len());
            buf.compact();
            assert_eq!(buf.offset(), 0);
            buf.remove(buf.unconsumed_len()).unwrap();
            buf.compact();
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn capacity_ceiling_is_enforced() {
        let mut buf = ReceiveBuffer::with_max_size(8);
        buf.append(b"12345").unwrap();
        let err = buf.append(b"6789").unwrap_err();
        assert!(matches!(
            err,
            FrameError::CapacityExceeded { needed: 9, max: 8 }
        ));
        // Within the ceiling still works.
        buf.append(b"678").unwrap();
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn compact_frees_room_under_the_ceiling() {
        let mut buf = ReceiveBuffer::with_max_size(8);
        buf.append(b"12345678").unwrap();
        buf.remove(8).unwrap();
        assert!(buf.append(b"x").is_err());

        buf.compact();
        buf.append(b"fresh").unwrap();
        assert_eq!(buf.unconsumed(), b"fresh");
    }
}
