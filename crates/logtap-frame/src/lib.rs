//! Frame reassembly and message extraction for diagnostic log streams.
//!
//! Reconstructs discrete, variable-length frames from an unbounded byte
//! stream delivered in arbitrary chunk sizes, including detection of an
//! optional serial marker that changes frame-size accounting. Complete
//! frames come out as independently owned [`Message`]s through the
//! pull-style [`MessageSource`] façade.
//!
//! - [`ReceiveBuffer`] — accumulating buffer with explicit
//!   append/remove/compact bookkeeping
//! - [`FrameCodec`] / [`WireCodec`] — decode one frame from buffered bytes
//! - [`FrameReader`] — decode loop turning buffered bytes into queued messages
//! - [`MessageQueue`] — FIFO decoupling receive events from pulls
//! - [`NetworkMessageSource`] — blocking pull façade over any `Read`

pub mod buffer;
pub mod codec;
pub mod error;
pub mod pool;
pub mod queue;
pub mod reader;
pub mod source;

pub use buffer::{ReceiveBuffer, DEFAULT_MAX_BUFFER};
pub use codec::{
    Decode, ExtendedHeader, FrameBuilder, FrameCodec, FrameInfo, Message, WireCodec,
    EXTENDED_HEADER_SIZE, SERIAL_MARKER, STANDARD_HEADER_SIZE, STORAGE_HEADER_SIZE, STORAGE_MAGIC,
    WIRE_VERSION,
};
pub use error::{CodecError, FrameError, Result};
pub use pool::{BufferPool, PooledBuf};
pub use queue::MessageQueue;
pub use reader::{FrameReader, DEFAULT_RESYNC_BUDGET};
pub use source::{MessageSource, NetworkMessageSource};
