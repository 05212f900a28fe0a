//! Error types and the status codes surfaced to callers

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use boost_tdx::TdxError;

/// Stable status codes for the CLI/RPC layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Success,
    TdxReport,
    KeyDerivation,
    InvalidParam,
    Crypto,
    IoError,
    AttestationError,
}

impl ErrorCode {
    pub fn as_i32(&self) -> i32 {
        match self {
            ErrorCode::Success => 0,
            ErrorCode::TdxReport => -1,
            ErrorCode::KeyDerivation => -2,
            ErrorCode::InvalidParam => -3,
            ErrorCode::Crypto => -4,
            ErrorCode::IoError => -5,
            ErrorCode::AttestationError => -6,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == ErrorCode::Success
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::Success => write!(f, "SUCCESS"),
            ErrorCode::TdxReport => write!(f, "TDX_REPORT"),
            ErrorCode::KeyDerivation => write!(f, "KEY_DERIVATION"),
            ErrorCode::InvalidParam => write!(f, "INVALID_PARAM"),
            ErrorCode::Crypto => write!(f, "CRYPTO"),
            ErrorCode::IoError => write!(f, "IO_ERROR"),
            ErrorCode::AttestationError => write!(f, "ATTESTATION_ERROR"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BoostError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Manifest parse error: {0}")]
    ParseError(String),

    #[error("IO error at {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backend failure while measuring or quoting.
    #[error("Attestation failed: {0}")]
    AttestationError(#[source] TdxError),

    /// Backend failure while fetching the report that seeds key derivation.
    #[error("TDX report unavailable: {0}")]
    TdxReport(#[source] TdxError),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),
}

impl BoostError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BoostError::IoError {
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            BoostError::InvalidParam(_) | BoostError::ParseError(_) => ErrorCode::InvalidParam,
            BoostError::IoError { .. } => ErrorCode::IoError,
            BoostError::AttestationError(_) => ErrorCode::AttestationError,
            BoostError::TdxReport(_) => ErrorCode::TdxReport,
            BoostError::KeyDerivation(_) => ErrorCode::KeyDerivation,
            BoostError::Crypto(_) => ErrorCode::Crypto,
        }
    }
}

pub type Result<T> = std::result::Result<T, BoostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorCode::Success.as_i32(), 0);
        assert_eq!(ErrorCode::TdxReport.as_i32(), -1);
        assert_eq!(ErrorCode::KeyDerivation.as_i32(), -2);
        assert_eq!(ErrorCode::InvalidParam.as_i32(), -3);
        assert_eq!(ErrorCode::Crypto.as_i32(), -4);
        assert_eq!(ErrorCode::IoError.as_i32(), -5);
        assert_eq!(ErrorCode::AttestationError.as_i32(), -6);
    }

    #[test]
    fn test_error_to_code() {
        assert_eq!(
            BoostError::ParseError("x".into()).code(),
            ErrorCode::InvalidParam
        );
        assert_eq!(
            BoostError::io("/missing", std::io::ErrorKind::NotFound.into()).code(),
            ErrorCode::IoError
        );
        assert_eq!(
            BoostError::TdxReport(TdxError::Report("down".into())).code(),
            ErrorCode::TdxReport
        );
        assert_eq!(
            BoostError::AttestationError(TdxError::Quote("down".into())).code(),
            ErrorCode::AttestationError
        );
    }

    #[test]
    fn test_code_serializes_like_display() {
        let json = serde_json::to_string(&ErrorCode::AttestationError).unwrap();
        assert_eq!(json, "\"ATTESTATION_ERROR\"");
        assert_eq!(ErrorCode::AttestationError.to_string(), "ATTESTATION_ERROR");
    }
}
