use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of analysis and chart export. Chart generation itself never
/// fails; it clamps or falls back instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("sample buffer is empty")]
    EmptyBuffer,

    #[error("invalid channel count: {0}")]
    InvalidChannelCount(u16),

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("recording too short for analysis: {samples} mono samples, need at least {required}")]
    TooShort { samples: usize, required: usize },

    #[error("transform size must be a power of two, got {0}")]
    NotPowerOfTwo(usize),

    #[error("transform buffers must both hold {expected} values (real: {real}, imag: {imag})")]
    LengthMismatch {
        expected: usize,
        real: usize,
        imag: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("analysis job already finished")]
    JobFinished,

    #[error("chart export failed: {0}")]
    Export(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Export(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Export(err.to_string())
    }
}
