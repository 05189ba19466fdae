/* ==========================================================================================
 *                          This file is part of the Bachelor Thesis project
 *                                   University of Wrocław
 *                         Author: Weronika Tarnawska (Index No. 331171)
 *                                         June 2025
 * ========================================================================================== */
use thiserror::Error;

/// Errors reported by every fallible operation of the crate.
#[derive(Debug, Error)]
pub enum DspError {
    /// Malformed filter or noise request (bad cutoff, band order, unsupported combination).
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    /// Buffer unusable for the requested operation (too short, mismatched shapes or rates).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Undefined or non-finite numeric result (zero power calibration, diverged adaptation).
    #[error("numeric error: {0}")]
    Numeric(String),

    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DspError>;

impl DspError {
    pub(crate) fn spec(msg: impl Into<String>) -> Self {
        DspError::InvalidSpec(msg.into())
    }

    pub(crate) fn input(msg: impl Into<String>) -> Self {
        DspError::InvalidInput(msg.into())
    }

    pub(crate) fn numeric(msg: impl Into<String>) -> Self {
        DspError::Numeric(msg.into())
    }
}
