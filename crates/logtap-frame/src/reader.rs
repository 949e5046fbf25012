use tracing::trace;

use crate::buffer::ReceiveBuffer;
use crate::codec::{Decode, FrameCodec, SERIAL_MARKER, STORAGE_HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::queue::MessageQueue;

/// Default number of invalid leading bytes tolerated before giving up.
pub const DEFAULT_RESYNC_BUDGET: usize = 64;

/// Drives a codec over a receive buffer, extracting complete frames.
///
/// Each complete frame is removed from the buffer and queued as an
/// owned message. Decoded sizes arrive in the storage-file convention,
/// so the wire consumption of a frame is
/// `header_size + data_size - STORAGE_HEADER_SIZE`, plus the serial
/// marker length when one preceded the frame.
pub struct FrameReader<C> {
    codec: C,
    resync_budget: usize,
    invalid_run: usize,
}

impl<C: FrameCodec> FrameReader<C> {
    pub fn new(codec: C) -> Self {
        Self::with_resync_budget(codec, DEFAULT_RESYNC_BUDGET)
    }

    /// Create a reader with an explicit invalid-byte budget.
    ///
    /// An invalid decode skips one byte and retries; the run counter
    /// resets whenever a frame decodes cleanly. Exceeding the budget is
    /// fatal — the stream is malformed beyond recovery.
    pub fn with_resync_budget(codec: C, resync_budget: usize) -> Self {
        Self {
            codec,
            resync_budget,
            invalid_run: 0,
        }
    }

    /// Extract every complete frame currently buffered.
    ///
    /// Returns the number of messages queued by this pass. Stops
    /// without error as soon as the codec reports an incomplete frame;
    /// the caller then compacts the buffer and waits for more bytes.
    pub fn drain(&mut self, buf: &mut ReceiveBuffer, queue: &mut MessageQueue) -> Result<usize> {
        let mut extracted = 0usize;
        loop {
            match self.codec.decode_one(buf.unconsumed()) {
                Ok(Decode::Frame { message, info }) => {
                    let Some(body) = (info.header_size + info.data_size)
                        .checked_sub(STORAGE_HEADER_SIZE)
                    else {
                        return Err(FrameError::Accounting(format!(
                            "header {} + data {} below storage header size",
                            info.header_size, info.data_size
                        )));
                    };
                    let consumed = if info.has_serial_marker {
                        body + SERIAL_MARKER.len()
                    } else {
                        body
                    };
                    buf.remove(consumed)?;
                    queue.push(message);
                    self.invalid_run = 0;
                    extracted += 1;
                }
                Ok(Decode::Incomplete) => break,
                Err(err) => {
                    self.invalid_run += 1;
                    if self.invalid_run > self.resync_budget {
                        return Err(FrameError::Protocol {
                            scanned: self.invalid_run,
                            last: err,
                        });
                    }
                    trace!(%err, "skipping one byte to resync");
                    buf.remove(1)?;
                }
            }
        }
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::{FrameBuilder, WireCodec};
    use crate::error::CodecError;

    fn reader() -> FrameReader<WireCodec> {
        FrameReader::new(WireCodec::new())
    }

    fn frame(counter: u8, payload: &[u8], marker: bool) -> BytesMut {
        let mut wire = BytesMut::new();
        FrameBuilder::new()
            .counter(counter)
            .serial_marker(marker)
            .payload(payload)
            .encode(&mut wire)
            .unwrap();
        wire
    }

    #[test]
    fn drains_every_buffered_frame_in_order() {
        let mut buf = ReceiveBuffer::new();
        for counter in 1..=4u8 {
            buf.append(&frame(counter, b"data", false)).unwrap();
        }
        let mut queue = MessageQueue::new();

        let extracted = reader().drain(&mut buf, &mut queue).unwrap();
        assert_eq!(extracted, 4);
        assert_eq!(buf.unconsumed_len(), 0);

        let order: Vec<u8> = std::iter::from_fn(|| queue.pop())
            .map(|m| m.counter())
            .collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn stops_at_partial_trailing_frame() {
        let mut buf = ReceiveBuffer::new();
        buf.append(&frame(1, b"complete", false)).unwrap();
        let second = frame(2, b"partial frame payload", false);
        buf.append(&second[..second.len() - 5]).unwrap();
        let mut queue = MessageQueue::new();

        let extracted = reader().drain(&mut buf, &mut queue).unwrap();
        assert_eq!(extracted, 1);
        // The partial frame stays buffered for the next receive cycle.
        assert_eq!(buf.unconsumed_len(), second.len() - 5);

        buf.compact();
        buf.append(&second[second.len() - 5..]).unwrap();
        let mut r = reader();
        assert_eq!(r.drain(&mut buf, &mut queue).unwrap(), 1);
        assert_eq!(queue.pop().unwrap().counter(), 1);
        assert_eq!(queue.pop().unwrap().counter(), 2);
    }

    #[test]
    fn serial_marker_frames_consume_marker_bytes() {
        let mut buf = ReceiveBuffer::new();
        buf.append(&frame(1, b"marked", true)).unwrap();
        buf.append(&frame(2, b"plain", false)).unwrap();
        let mut queue = MessageQueue::new();

        let extracted = reader().drain(&mut buf, &mut queue).unwrap();
        assert_eq!(extracted, 2);
        assert_eq!(buf.unconsumed_len(), 0, "marker bytes must be consumed");
        assert!(queue.pop().unwrap().has_serial_marker());
        assert!(!queue.pop().unwrap().has_serial_marker());
    }

    #[test]
    fn resyncs_past_leading_garbage() {
        let mut buf = ReceiveBuffer::new();
        // Bytes with bad version bits, then a valid frame.
        buf.append(&[0xFFu8; 5]).unwrap();
        buf.append(&frame(9, b"after noise", false)).unwrap();
        let mut queue = MessageQueue::new();

        let extracted = reader().drain(&mut buf, &mut queue).unwrap();
        assert_eq!(extracted, 1);
        assert_eq!(queue.pop().unwrap().counter(), 9);
        assert_eq!(buf.unconsumed_len(), 0);
    }

    #[test]
    fn exhausted_resync_budget_is_fatal() {
        let mut buf = ReceiveBuffer::new();
        buf.append(&[0xFFu8; 32]).unwrap();
        let mut queue = MessageQueue::new();

        let mut r = FrameReader::with_resync_budget(WireCodec::new(), 8);
        let err = r.drain(&mut buf, &mut queue).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Protocol {
                scanned: 9,
                last: CodecError::UnsupportedVersion { .. }
            }
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn good_frame_resets_the_invalid_run() {
        let mut buf = ReceiveBuffer::new();
        buf.append(&[0xFFu8; 6]).unwrap();
        buf.append(&frame(1, b"ok", false)).unwrap();
        buf.append(&[0xFFu8; 6]).unwrap();
        buf.append(&frame(2, b"ok", false)).unwrap();
        let mut queue = MessageQueue::new();

        // Budget of 8 would be exceeded by 12 cumulative garbage bytes
        // if the run never reset.
        let mut r = FrameReader::with_resync_budget(WireCodec::new(), 8);
        let extracted = r.drain(&mut buf, &mut queue).unwrap();
        assert_eq!(extracted, 2);
    }

    #[test]
    fn oversized_remove_is_reported_not_panicked() {
        // A codec that over-reports its frame size.
        struct Overreporting;
        impl FrameCodec for Overreporting {
            fn decode_one(&mut self, bytes: &[u8]) -> std::result::Result<Decode, CodecError> {
                let mut codec = WireCodec::new();
                match codec.decode_one(bytes)? {
                    Decode::Frame { message, mut info } => {
                        info.data_size += 1000;
                        Ok(Decode::Frame { message, info })
                    }
                    Decode::Incomplete => Ok(Decode::Incomplete),
                }
            }
        }

        let mut buf = ReceiveBuffer::new();
        buf.append(&frame(1, b"x", false)).unwrap();
        let mut queue = MessageQueue::new();

        let mut r = FrameReader::new(Overreporting);
        let err = r.drain(&mut buf, &mut queue).unwrap_err();
        assert!(matches!(err, FrameError::InvalidRemove { .. }));
    }
}
