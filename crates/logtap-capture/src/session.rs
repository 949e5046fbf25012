use std::time::SystemTime;

use bytes::BytesMut;
use tracing::debug;

use logtap_frame::{Message, MessageSource};

use crate::error::Result;
use crate::writer::AtomicFileWriter;

/// Pulls messages from a source and persists them as storage records.
///
/// Each captured message is written as a 16-byte storage header
/// (stamped with the local receive time) followed by its wire bytes —
/// the record format capture files use.
pub struct CaptureSession<S> {
    source: S,
    writer: AtomicFileWriter,
    scratch: BytesMut,
    captured: u64,
}

impl<S: MessageSource> CaptureSession<S> {
    pub fn new(source: S, writer: AtomicFileWriter) -> Self {
        Self {
            source,
            writer,
            scratch: BytesMut::new(),
            captured: 0,
        }
    }

    /// Pull one message, append its storage record, and hand it back.
    ///
    /// `Ok(None)` when the source reports a clean end of stream.
    pub fn capture_next(&mut self) -> Result<Option<Message>> {
        let Some(message) = self.source.next_message()? else {
            return Ok(None);
        };
        self.scratch.clear();
        message.encode_storage(&mut self.scratch, SystemTime::now());
        self.writer.write(&self.scratch)?;
        self.captured += 1;
        Ok(Some(message))
    }

    /// Capture until end of stream, or until `limit` messages if given.
    ///
    /// Returns the number of messages captured by this call.
    pub fn run(&mut self, limit: Option<u64>) -> Result<u64> {
        let mut count = 0u64;
        while limit.is_none_or(|max| count < max) {
            match self.capture_next()? {
                Some(_) => count += 1,
                None => break,
            }
        }
        debug!(count, total = self.captured, "capture run complete");
        Ok(count)
    }

    /// Messages captured over the session's lifetime.
    pub fn captured(&self) -> u64 {
        self.captured
    }

    /// The writer backing this session.
    pub fn writer(&self) -> &AtomicFileWriter {
        &self.writer
    }

    /// Mutably borrow the message source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Publish the capture file and return the total message count.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.finish()?;
        Ok(self.captured)
    }
}
