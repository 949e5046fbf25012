use std::io::{ErrorKind, Read};

use tracing::{debug, trace};

use crate::buffer::ReceiveBuffer;
use crate::codec::{FrameCodec, Message, WireCodec};
use crate::error::{FrameError, Result};
use crate::queue::MessageQueue;
use crate::reader::FrameReader;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// A pull-style supplier of decoded log messages.
///
/// `next_message` blocks until a message is available. `Ok(None)` is a
/// clean end of stream and is distinct from every failure: transport
/// faults, protocol violations, and a stream cut mid-frame all surface
/// as errors. Each returned message is independently owned by the
/// caller — it stays valid regardless of later pulls.
pub trait MessageSource {
    fn next_message(&mut self) -> Result<Option<Message>>;
}

/// Message source fed by a blocking byte stream.
///
/// Generic over `Read`: a TCP connection, a raw capture file, or an
/// in-memory cursor all work unchanged. One `read` call is one receive
/// event; however the stream chunks its bytes, frames come out whole
/// and in wire order.
pub struct NetworkMessageSource<R, C = WireCodec> {
    inner: R,
    buf: ReceiveBuffer,
    reader: FrameReader<C>,
    queue: MessageQueue,
}

impl<R: Read> NetworkMessageSource<R> {
    /// Create a source with the default wire codec.
    pub fn new(inner: R) -> Self {
        Self::with_codec(inner, WireCodec::new())
    }
}

impl<R: Read, C: FrameCodec> NetworkMessageSource<R, C> {
    /// Create a source with an explicit codec.
    pub fn with_codec(inner: R, codec: C) -> Self {
        Self {
            inner,
            buf: ReceiveBuffer::new(),
            reader: FrameReader::new(codec),
            queue: MessageQueue::new(),
        }
    }

    /// Messages decoded but not yet pulled.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the source and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read, C: FrameCodec> MessageSource for NetworkMessageSource<R, C> {
    fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            if let Some(message) = self.queue.pop() {
                return Ok(Some(message));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                // Offset is zero here: every receive cycle ends with a
                // compact, so anything left is an unfinished frame.
                let buffered = self.buf.len();
                if buffered > 0 {
                    return Err(FrameError::Truncated { buffered });
                }
                debug!("log stream ended cleanly");
                return Ok(None);
            }

            self.buf.append(&chunk[..read])?;
            let extracted = self.reader.drain(&mut self.buf, &mut self.queue)?;
            self.buf.compact();
            trace!(read, extracted, "receive cycle");
        }
    }
}
