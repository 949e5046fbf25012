//! Wire codec for framed diagnostic log records.
//!
//! Wire format (sizes in bytes):
//!
//! ```text
//! ┌───────────────┬──────────────────────┬───────────────┬──────────┐
//! │ Serial marker │ Standard header      │ Extended hdr  │ Payload  │
//! │ (4, optional) │ flags(1) counter(1)  │ (10, if flag) │          │
//! │ "SLM\x01"     │ length(2 BE)         │               │          │
//! │               │ + option fields      │               │          │
//! └───────────────┴──────────────────────┴───────────────┴──────────┘
//! ```
//!
//! `length` counts everything after the serial marker. Option fields
//! (ECU id, session id, timestamp — 4 bytes each) are present when the
//! corresponding flag bit is set.
//!
//! Decoded sizes are reported in the storage-file convention: the
//! header size includes the 16-byte storage header that capture files
//! prepend, even though it is never on the wire. Consumers discarding
//! wire bytes subtract [`STORAGE_HEADER_SIZE`].

use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};

use crate::error::CodecError;
use crate::pool::{BufferPool, PooledBuf};

/// Serial marker: "SLM" + version 1.
pub const SERIAL_MARKER: [u8; 4] = [0x53, 0x4C, 0x4D, 0x01];

/// Standard header: flags (1) + counter (1) + length (2 BE).
pub const STANDARD_HEADER_SIZE: usize = 4;

/// Extended header: message info (1) + arg count (1) + app id (4) + context id (4).
pub const EXTENDED_HEADER_SIZE: usize = 10;

/// Storage header: magic (4) + seconds (4) + microseconds (4) + ECU id (4).
/// Prepended to each record in capture files; never on the wire.
pub const STORAGE_HEADER_SIZE: usize = 16;

/// Storage header magic: "LOG" + version 1.
pub const STORAGE_MAGIC: [u8; 4] = [0x4C, 0x4F, 0x47, 0x01];

/// Wire version carried in the standard header's flag bits.
pub const WIRE_VERSION: u8 = 1;

const HAS_EXTENDED: u8 = 0x01;
const HAS_ECU_ID: u8 = 0x02;
const HAS_SESSION_ID: u8 = 0x04;
const HAS_TIMESTAMP: u8 = 0x08;
const VERSION_SHIFT: u8 = 5;
const VERSION_MASK: u8 = 0xE0;

/// Sizes reported for one decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Header bytes, storage header included (see module docs).
    pub header_size: usize,
    /// Payload bytes.
    pub data_size: usize,
    /// True if a serial marker preceded this frame on the wire.
    pub has_serial_marker: bool,
}

/// Outcome of one decode attempt.
#[derive(Debug)]
pub enum Decode {
    /// A complete frame was decoded from the start of the input.
    Frame { message: Message, info: FrameInfo },
    /// The input does not yet hold a complete frame.
    Incomplete,
}

/// Decodes exactly one frame from the start of a byte slice.
///
/// Implementations never consume input themselves; the caller discards
/// wire bytes based on the reported [`FrameInfo`].
pub trait FrameCodec {
    fn decode_one(&mut self, bytes: &[u8]) -> Result<Decode, CodecError>;
}

/// Extended header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub message_info: u8,
    pub arg_count: u8,
    pub app_id: [u8; 4],
    pub context_id: [u8; 4],
}

/// One decoded log record, independently owned.
///
/// Ownership transfers to the caller on every pull; a message stays
/// valid for as long as the caller keeps it, regardless of later pulls.
#[derive(Debug)]
pub struct Message {
    counter: u8,
    ecu_id: Option<[u8; 4]>,
    session_id: Option<u32>,
    timestamp: Option<u32>,
    extended: Option<ExtendedHeader>,
    has_serial_marker: bool,
    payload_offset: usize,
    raw: PooledBuf,
}

impl Message {
    /// Per-source wrapping message counter.
    pub fn counter(&self) -> u8 {
        self.counter
    }

    /// ECU identifier, if the frame carried one.
    pub fn ecu_id(&self) -> Option<[u8; 4]> {
        self.ecu_id
    }

    /// Session identifier, if the frame carried one.
    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    /// Sender timestamp in 0.1 ms ticks, if the frame carried one.
    pub fn timestamp(&self) -> Option<u32> {
        self.timestamp
    }

    /// Extended header, if present.
    pub fn extended(&self) -> Option<&ExtendedHeader> {
        self.extended.as_ref()
    }

    /// True if a serial marker preceded this frame on the wire.
    pub fn has_serial_marker(&self) -> bool {
        self.has_serial_marker
    }

    /// The undecoded payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.raw[self.payload_offset..]
    }

    /// The frame as it appeared on the wire, serial marker excluded.
    pub fn wire_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Append this record in storage-file form: a 16-byte storage
    /// header followed by the wire bytes.
    pub fn encode_storage(&self, dst: &mut BytesMut, received_at: SystemTime) {
        let (secs, micros) = match received_at.duration_since(UNIX_EPOCH) {
            Ok(d) => (d.as_secs() as u32, d.subsec_micros() as i32),
            Err(_) => (0, 0),
        };
        dst.reserve(STORAGE_HEADER_SIZE + self.raw.len());
        dst.put_slice(&STORAGE_MAGIC);
        dst.put_u32_le(secs);
        dst.put_i32_le(micros);
        dst.put_slice(&self.ecu_id.unwrap_or([0u8; 4]));
        dst.put_slice(&self.raw);
    }
}

/// Codec for the logtap wire format.
///
/// Payload buffers come from an explicit [`BufferPool`], so decoding a
/// long stream reuses a small set of allocations.
pub struct WireCodec {
    pool: Rc<BufferPool>,
}

impl WireCodec {
    /// Create a codec with a private buffer pool.
    pub fn new() -> Self {
        Self::with_pool(BufferPool::new())
    }

    /// Create a codec drawing payload buffers from a shared pool.
    pub fn with_pool(pool: Rc<BufferPool>) -> Self {
        Self { pool }
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec for WireCodec {
    fn decode_one(&mut self, bytes: &[u8]) -> Result<Decode, CodecError> {
        let mut has_marker = false;
        let mut at = 0usize;

        if bytes.len() >= SERIAL_MARKER.len() && bytes[..SERIAL_MARKER.len()] == SERIAL_MARKER {
            has_marker = true;
            at = SERIAL_MARKER.len();
        }

        let hdr = &bytes[at..];
        if hdr.len() < STANDARD_HEADER_SIZE {
            return Ok(Decode::Incomplete);
        }

        let flags = hdr[0];
        let version = (flags & VERSION_MASK) >> VERSION_SHIFT;
        if version != WIRE_VERSION {
            return Err(CodecError::UnsupportedVersion { version });
        }

        let counter = hdr[1];
        let length = u16::from_be_bytes([hdr[2], hdr[3]]) as usize;

        let mut head_len = STANDARD_HEADER_SIZE;
        if flags & HAS_ECU_ID != 0 {
            head_len += 4;
        }
        if flags & HAS_SESSION_ID != 0 {
            head_len += 4;
        }
        if flags & HAS_TIMESTAMP != 0 {
            head_len += 4;
        }
        let ext_len = if flags & HAS_EXTENDED != 0 {
            EXTENDED_HEADER_SIZE
        } else {
            0
        };

        if length < head_len + ext_len {
            return Err(CodecError::BadLength {
                declared: length,
                minimum: head_len + ext_len,
            });
        }
        if hdr.len() < length {
            return Ok(Decode::Incomplete);
        }

        let mut pos = STANDARD_HEADER_SIZE;
        let mut take4 = |dst: &mut [u8; 4]| {
            dst.copy_from_slice(&hdr[pos..pos + 4]);
            pos += 4;
        };

        let mut ecu_id = None;
        if flags & HAS_ECU_ID != 0 {
            let mut id = [0u8; 4];
            take4(&mut id);
            ecu_id = Some(id);
        }
        let mut session_id = None;
        if flags & HAS_SESSION_ID != 0 {
            let mut raw = [0u8; 4];
            take4(&mut raw);
            session_id = Some(u32::from_be_bytes(raw));
        }
        let mut timestamp = None;
        if flags & HAS_TIMESTAMP != 0 {
            let mut raw = [0u8; 4];
            take4(&mut raw);
            timestamp = Some(u32::from_be_bytes(raw));
        }

        let extended = if ext_len != 0 {
            let ext = &hdr[pos..pos + EXTENDED_HEADER_SIZE];
            let mut app_id = [0u8; 4];
            app_id.copy_from_slice(&ext[2..6]);
            let mut context_id = [0u8; 4];
            context_id.copy_from_slice(&ext[6..10]);
            Some(ExtendedHeader {
                message_info: ext[0],
                arg_count: ext[1],
                app_id,
                context_id,
            })
        } else {
            None
        };

        let mut raw = self.pool.acquire();
        raw.extend_from_slice(&hdr[..length]);

        let message = Message {
            counter,
            ecu_id,
            session_id,
            timestamp,
            extended,
            has_serial_marker: has_marker,
            payload_offset: head_len + ext_len,
            raw,
        };
        let info = FrameInfo {
            header_size: STORAGE_HEADER_SIZE + head_len + ext_len,
            data_size: length - head_len - ext_len,
            has_serial_marker: has_marker,
        };

        Ok(Decode::Frame { message, info })
    }
}

/// Builds wire frames for the sending side and for tests.
#[derive(Debug, Clone, Default)]
pub struct FrameBuilder {
    counter: u8,
    ecu_id: Option<[u8; 4]>,
    session_id: Option<u32>,
    timestamp: Option<u32>,
    extended: Option<ExtendedHeader>,
    serial_marker: bool,
    payload: Vec<u8>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(mut self, counter: u8) -> Self {
        self.counter = counter;
        self
    }

    pub fn ecu_id(mut self, id: [u8; 4]) -> Self {
        self.ecu_id = Some(id);
        self
    }

    pub fn session_id(mut self, id: u32) -> Self {
        self.session_id = Some(id);
        self
    }

    pub fn timestamp(mut self, ticks: u32) -> Self {
        self.timestamp = Some(ticks);
        self
    }

    pub fn extended(mut self, ext: ExtendedHeader) -> Self {
        self.extended = Some(ext);
        self
    }

    /// Prefix the frame with a serial marker.
    pub fn serial_marker(mut self, on: bool) -> Self {
        self.serial_marker = on;
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Encode the frame into `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<usize, CodecError> {
        let mut head_len = STANDARD_HEADER_SIZE;
        let mut flags = WIRE_VERSION << VERSION_SHIFT;
        if self.ecu_id.is_some() {
            flags |= HAS_ECU_ID;
            head_len += 4;
        }
        if self.session_id.is_some() {
            flags |= HAS_SESSION_ID;
            head_len += 4;
        }
        if self.timestamp.is_some() {
            flags |= HAS_TIMESTAMP;
            head_len += 4;
        }
        let ext_len = if self.extended.is_some() {
            flags |= HAS_EXTENDED;
            EXTENDED_HEADER_SIZE
        } else {
            0
        };

        let length = head_len + ext_len + self.payload.len();
        if length > u16::MAX as usize {
            return Err(CodecError::Oversize {
                size: length,
                max: u16::MAX as usize,
            });
        }

        let marker_len = if self.serial_marker {
            SERIAL_MARKER.len()
        } else {
            0
        };
        dst.reserve(marker_len + length);
        if self.serial_marker {
            dst.put_slice(&SERIAL_MARKER);
        }
        dst.put_u8(flags);
        dst.put_u8(self.counter);
        dst.put_u16(length as u16);
        if let Some(id) = self.ecu_id {
            dst.put_slice(&id);
        }
        if let Some(id) = self.session_id {
            dst.put_u32(id);
        }
        if let Some(ticks) = self.timestamp {
            dst.put_u32(ticks);
        }
        if let Some(ext) = &self.extended {
            dst.put_u8(ext.message_info);
            dst.put_u8(ext.arg_count);
            dst.put_slice(&ext.app_id);
            dst.put_slice(&ext.context_id);
        }
        dst.put_slice(&self.payload);

        Ok(marker_len + length)
    }
}
