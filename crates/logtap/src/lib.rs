//! Capture framed diagnostic log streams to crash-safe files.
//!
//! logtap reconstructs variable-length frames from a TCP byte stream —
//! however the network chunks it — and persists them to capture files
//! that are either fully written and visible, or not visible at all.
//!
//! # Crate Structure
//!
//! - [`transport`] — Blocking TCP transport (connect, accept, timeouts)
//! - [`frame`] — Frame reassembly and the pull-style message source
//! - [`capture`] — Atomic capture files and the capture session pump

/// Re-export transport types.
pub mod transport {
    pub use logtap_transport::*;
}

/// Re-export framing types.
pub mod frame {
    pub use logtap_frame::*;
}

/// Re-export capture types.
pub mod capture {
    pub use logtap_capture::*;
}
