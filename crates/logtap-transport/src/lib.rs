//! Blocking TCP transport for diagnostic log streams.
//!
//! Provides the receive primitive the framing layer builds on: a
//! connection-oriented, ordered byte stream exposed as `Read + Write`.

mod error;
mod tcp;

pub use error::{Result, TransportError};
pub use tcp::{LogListener, TcpConnection};
