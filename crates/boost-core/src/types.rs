//! Result structures handed to the CLI and other front ends
//!
//! Every public operation collapses into one of these: a status code, a human
//! readable message and, on success, the public payload. Byte fields
//! serialize as lowercase hex.

use serde::Serialize;

use crate::error::{BoostError, ErrorCode};
use crate::hasher::Digest;
use crate::keytool::{KeyMaterial, ETH_ADDR_LEN, ETH_PUBKEY_LEN};

const OK_MESSAGE: &str = "ok";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasurementResult {
    pub status: ErrorCode,
    pub message: String,
    #[serde(serialize_with = "hex_serde::option")]
    pub volumes_hash: Option<Digest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteResult {
    pub status: ErrorCode,
    pub message: String,
    #[serde(serialize_with = "hex_serde::bytes")]
    pub quote_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyResult {
    pub status: ErrorCode,
    pub message: String,
    #[serde(serialize_with = "hex_serde::option")]
    pub public_key: Option<[u8; ETH_PUBKEY_LEN]>,
    #[serde(serialize_with = "hex_serde::option")]
    pub address: Option<[u8; ETH_ADDR_LEN]>,
    pub address_hex: Option<String>,
}

impl MeasurementResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl QuoteResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl KeyResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl From<Result<Digest, BoostError>> for MeasurementResult {
    fn from(result: Result<Digest, BoostError>) -> Self {
        match result {
            Ok(hash) => Self {
                status: ErrorCode::Success,
                message: OK_MESSAGE.into(),
                volumes_hash: Some(hash),
            },
            Err(e) => Self {
                status: e.code(),
                message: e.to_string(),
                volumes_hash: None,
            },
        }
    }
}

impl From<Result<Vec<u8>, BoostError>> for QuoteResult {
    fn from(result: Result<Vec<u8>, BoostError>) -> Self {
        match result {
            Ok(quote_bytes) => Self {
                status: ErrorCode::Success,
                message: OK_MESSAGE.into(),
                quote_bytes,
            },
            Err(e) => Self {
                status: e.code(),
                message: e.to_string(),
                quote_bytes: Vec::new(),
            },
        }
    }
}

impl From<Result<KeyMaterial, BoostError>> for KeyResult {
    fn from(result: Result<KeyMaterial, BoostError>) -> Self {
        match result {
            Ok(key) => Self {
                status: ErrorCode::Success,
                message: OK_MESSAGE.into(),
                public_key: Some(key.public_key),
                address: Some(key.address),
                address_hex: Some(key.address_hex),
            },
            Err(e) => Self {
                status: e.code(),
                message: e.to_string(),
                public_key: None,
                address: None,
                address_hex: None,
            },
        }
    }
}

mod hex_serde {
    use serde::Serializer;

    pub fn bytes<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&hex::encode(value.as_ref()))
    }

    pub fn option<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        match value {
            Some(v) => serializer.serialize_some(&hex::encode(v.as_ref())),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boost_tdx::TdxError;
    use serde_json::json;

    #[test]
    fn test_measurement_result_json() {
        let ok = MeasurementResult::from(Ok::<_, BoostError>([0xAB; 32]));
        assert!(ok.is_success());
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({
                "status": "SUCCESS",
                "message": "ok",
                "volumes_hash": "ab".repeat(32),
            })
        );

        let failed =
            MeasurementResult::from(Err::<Digest, _>(BoostError::ParseError("bad".into())));
        assert_eq!(failed.status, ErrorCode::InvalidParam);
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["status"], "INVALID_PARAM");
        assert!(value["volumes_hash"].is_null());
    }

    #[test]
    fn test_quote_result_from_error() {
        let err = BoostError::AttestationError(TdxError::Quote("no tsm".into()));
        let result = QuoteResult::from(Err::<Vec<u8>, _>(err));
        assert!(!result.is_success());
        assert_eq!(result.status.as_i32(), -6);
        assert!(result.message.contains("no tsm"));
        assert!(result.quote_bytes.is_empty());

        let ok = QuoteResult::from(Ok::<_, BoostError>(vec![1, 2, 255]));
        assert_eq!(serde_json::to_value(&ok).unwrap()["quote_bytes"], "0102ff");
    }

    #[test]
    fn test_key_result_json() {
        let key = KeyMaterial {
            public_key: [0x11; ETH_PUBKEY_LEN],
            address: [0x22; ETH_ADDR_LEN],
            address_hex: format!("0x{}", "22".repeat(ETH_ADDR_LEN)),
        };
        let value = serde_json::to_value(KeyResult::from(Ok::<_, BoostError>(key))).unwrap();
        assert_eq!(value["public_key"], "11".repeat(ETH_PUBKEY_LEN));
        assert_eq!(value["address"], "22".repeat(ETH_ADDR_LEN));
        assert_eq!(value["address_hex"], format!("0x{}", "22".repeat(ETH_ADDR_LEN)));

        let err = BoostError::KeyDerivation("exhausted".into());
        let failed = KeyResult::from(Err::<KeyMaterial, _>(err));
        assert_eq!(failed.status.as_i32(), -2);
        assert!(failed.public_key.is_none());
        assert!(failed.address_hex.is_none());
    }
}
