//! Crash-safe capture files for diagnostic log streams.
//!
//! A capture file is either fully written and visible under its
//! intended name, or not visible at all: [`AtomicFileWriter`] streams
//! to a temp file and publishes by rename, and [`CaptureSession`]
//! pumps a message source into storage-framed records.

mod error;
mod session;
mod writer;

pub use error::{CaptureError, Result};
pub use session::CaptureSession;
pub use writer::AtomicFileWriter;
