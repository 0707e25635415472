use thiserror::Error;

/// Error kinds surfaced by the core: framing, protocol, and I/O failures.
///
/// End-of-stream is deliberately not a variant here — `Reader::next` reports
/// it as `Ok(None)`, a distinguished outcome rather than an error.
#[derive(Debug, Error)]
pub enum SirError {
    #[error("framing error: {0}")]
    Framing(String),

    #[error("key regression: {0}")]
    KeyRegression(String),

    #[error("write or flush after close")]
    Closed,

    #[error("no progress: empty write")]
    NoProgress,

    #[error("block size exceeds u32::MAX")]
    Overflow,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("corruption: {0}")]
    Corruption(String),
}

pub type Result<T> = std::result::Result<T, SirError>;
