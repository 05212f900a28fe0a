//! Error types for the attestation backends

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TdxError {
    #[error("TDX guest interface not available: {0}")]
    NotAvailable(String),

    #[error("Report request failed: {0}")]
    Report(String),

    #[error("RTMR extension failed: {0}")]
    Register(String),

    #[error("Quote generation failed: {0}")]
    Quote(String),

    #[error("Invalid RTMR index {0} (expected 0..=3)")]
    InvalidRegister(u8),

    #[error("Report data too long: {0} bytes (max 64)")]
    ReportDataTooLong(usize),

    #[error("Malformed {kind}: expected at least {expected} bytes, got {actual}")]
    Malformed {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TdxError>;
