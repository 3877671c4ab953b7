// Error handling for TimeSeries operations

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TsError>;

/// Validation tier that an invariant check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    WellTyped,
    WellShaped,
    NotEmptyTime,
    NotEmptyData,
    IncreasingTime,
    ConstantSampleRate,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::WellTyped => "well-typed",
            Tier::WellShaped => "well-shaped",
            Tier::NotEmptyTime => "not-empty-time",
            Tier::NotEmptyData => "not-empty-data",
            Tier::IncreasingTime => "increasing-time",
            Tier::ConstantSampleRate => "constant-sample-rate",
        };
        f.write_str(name)
    }
}

/// Coarse error category, for callers that branch on the kind of failure
/// rather than on the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Type,
    ShapeMismatch,
    KeyNotFound,
    InvariantViolation,
    Argument,
    TimeMismatch,
    Io,
    Format,
}

#[derive(Error, Debug)]
pub enum TsError {
    #[error("Type error: {0}")]
    Type(String),

    #[error(
        "Shape mismatch for '{key}': first dimension is {got} but {expected} samples are expected ({against})"
    )]
    ShapeMismatch {
        key: String,
        expected: usize,
        got: usize,
        against: &'static str,
    },

    #[error("The key '{key}' was not found among the {available} key(s) of {container}")]
    KeyNotFound {
        key: String,
        available: usize,
        container: &'static str,
    },

    #[error("Occurrence {occurrence} of event '{name}' was not found ({count} such event(s))")]
    EventNotFound {
        name: String,
        occurrence: usize,
        count: usize,
    },

    #[error("Invariant violation ({tier}): {detail}")]
    Invariant { tier: Tier, detail: String },

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(
        "Time vectors do not match ({self_len} vs {other_len} samples); merge with resampling enabled instead"
    )]
    TimeMismatch { self_len: usize, other_len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid magic bytes: expected {expected:?}, got {got:?}")]
    InvalidMagic { expected: Vec<u8>, got: Vec<u8> },

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unsupported compression type: {0}")]
    UnsupportedCompression(u8),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

impl TsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TsError::Type(_) => ErrorKind::Type,
            TsError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            TsError::KeyNotFound { .. } | TsError::EventNotFound { .. } => ErrorKind::KeyNotFound,
            TsError::Invariant { .. } => ErrorKind::InvariantViolation,
            TsError::Argument(_) => ErrorKind::Argument,
            TsError::TimeMismatch { .. } => ErrorKind::TimeMismatch,
            TsError::Io(_) => ErrorKind::Io,
            TsError::Json(_)
            | TsError::InvalidMagic { .. }
            | TsError::UnsupportedVersion(_)
            | TsError::UnsupportedCompression(_)
            | TsError::DecompressionFailed(_)
            | TsError::CorruptedData(_) => ErrorKind::Format,
        }
    }

    pub(crate) fn invariant(tier: Tier, detail: impl Into<String>) -> Self {
        TsError::Invariant {
            tier,
            detail: detail.into(),
        }
    }

    /// Tier of a failed validation check, if this error comes from one.
    pub fn tier(&self) -> Option<Tier> {
        match self {
            TsError::Invariant { tier, .. } => Some(*tier),
            _ => None,
        }
    }
}
