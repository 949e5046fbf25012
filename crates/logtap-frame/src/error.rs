/// Errors reported by a codec for a structurally invalid frame.
///
/// Truncation is not an error — codecs report it as
/// [`Decode::Incomplete`](crate::codec::Decode::Incomplete).
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The standard header carries an unknown wire version.
    #[error("unsupported wire version {version}")]
    UnsupportedVersion { version: u8 },

    /// The declared frame length is shorter than its own headers.
    #[error("declared length {declared} shorter than headers ({minimum} bytes)")]
    BadLength { declared: usize, minimum: usize },

    /// The frame would exceed the wire format's length field.
    #[error("frame too large ({size} bytes, max {max})")]
    Oversize { size: usize, max: usize },
}

/// Errors that can occur while reassembling frames from a byte stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Consecutive invalid decodes exhausted the resync budget.
    #[error("protocol error: {scanned} invalid bytes without resync: {last}")]
    Protocol { scanned: usize, last: CodecError },

    /// Decoder-reported sizes disagree with the buffer state.
    #[error("frame accounting mismatch: {0}")]
    Accounting(String),

    /// Removal of more bytes than the buffer holds unconsumed.
    #[error("invalid remove of {requested} bytes ({available} unconsumed)")]
    InvalidRemove { requested: usize, available: usize },

    /// The receive buffer cannot grow to hold the appended bytes.
    #[error("receive buffer capacity exceeded ({needed} bytes, max {max})")]
    CapacityExceeded { needed: usize, max: usize },

    /// An I/O error occurred while receiving.
    #[error("receive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended in the middle of a frame.
    #[error("stream truncated mid-frame ({buffered} bytes buffered)")]
    Truncated { buffered: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
