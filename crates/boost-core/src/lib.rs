//! # Boost Core
//!
//! Trust-critical logic for an application running in an Intel TDX guest:
//!
//! - **Measurement**: hash the host directories a compose manifest mounts
//!   into its containers and bind the result into the report data of an
//!   attested report or into an RTMR ([`MeasurementEngine`])
//! - **Key derivation**: derive a secp256k1 key and Ethereum address from
//!   the report data of a fresh report, keeping every secret byte in
//!   zero-on-exit storage ([`KeyDerivationEngine`])
//!
//! Both engines talk to the platform only through
//! [`boost_tdx::AttestationClient`].
//!
//! ```rust
//! use std::sync::Arc;
//! use boost_core::{KeyDerivationEngine, KeyResult};
//! use boost_tdx::MockAttestation;
//!
//! let mut engine = KeyDerivationEngine::new(Arc::new(MockAttestation::new()));
//! let result = KeyResult::from(engine.derive());
//! assert!(result.is_success());
//! assert_eq!(result.address_hex.unwrap().len(), 42);
//! ```

pub mod error;
pub mod hasher;
pub mod kdf;
pub mod keytool;
pub mod measurement;
pub mod secure;
pub mod types;
pub mod volumes;

pub use error::{BoostError, ErrorCode, Result};
pub use hasher::{sha256, Digest, DirectoryHasher, HASH_LEN};
pub use keytool::{
    format_address_hex, parse_address_hex, KeyDerivationEngine, KeyMaterial, ETH_ADDR_HEX_LEN,
    ETH_ADDR_LEN, ETH_PRIVKEY_LEN, ETH_PUBKEY_LEN,
};
pub use measurement::{
    Measurement, MeasurementEngine, MeasurementMode, MeasurementState, DEFAULT_RTMR_INDEX,
};
pub use secure::{Scrub, SecureBuffer};
pub use types::{KeyResult, MeasurementResult, QuoteResult};
pub use volumes::{VolumeMapping, VolumeMappingResolver};
