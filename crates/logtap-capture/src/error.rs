use std::path::PathBuf;

/// Errors that can occur while writing capture files.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Failed to create the output file pair.
    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to publish the finished file under its real name.
    #[error("failed to publish {path}: {source}")]
    Publish {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The writer was already finished.
    #[error("capture already finished")]
    Finished,

    /// An I/O error occurred while writing captured bytes.
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The message source failed.
    #[error("message source error: {0}")]
    Source(#[from] logtap_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
