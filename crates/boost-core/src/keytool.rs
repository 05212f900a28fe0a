//! Ethereum key derivation from an attested TDX report
//!
//! ```text
//! seed    = report_data (64 bytes)
//! scalar  = HKDF-SHA256(salt = "boost-keytool/eth-key/v1", ikm = seed,
//!                       info = "secp256k1-private-key[/retry-k]", L = 32)
//! pubkey  = scalar * G, uncompressed, prefix dropped (64 bytes)
//! address = Keccak256(pubkey)[12..]
//! ```
//!
//! The seed and the scalar live in scratch buffers owned by the engine and
//! are wiped before [`KeyDerivationEngine::derive`] returns, whether it
//! succeeds, fails or unwinds. The private key is never part of the result.
//!
//! Residual copies outside those buffers are not wiped: the HMAC state inside
//! `hkdf` (see [`crate::kdf`]) and stack copies of the `Copy` secp256k1
//! `SecretKey`.

use std::sync::Arc;

use secp256k1::{PublicKey, Secp256k1, SecretKey, SignOnly};
use sha3::{Digest, Keccak256};
use tracing::{debug, info, warn};

use boost_tdx::{AttestationClient, REPORT_DATA_LEN};

use crate::error::{BoostError, Result};
use crate::kdf::{self, eth_key_info, ETH_KEY_SALT};
use crate::secure::{Scrub, SecureBuffer};

pub const ETH_PRIVKEY_LEN: usize = 32;
pub const ETH_PUBKEY_LEN: usize = 64;
pub const ETH_ADDR_LEN: usize = 20;
/// `"0x"` plus 40 hex digits.
pub const ETH_ADDR_HEX_LEN: usize = 2 + 2 * ETH_ADDR_LEN;

/// Upper bound on HKDF candidates tried before giving up on a seed.
pub const MAX_DERIVE_ATTEMPTS: u32 = 4;

/// Public half of a derived key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Uncompressed point without the `0x04` prefix (`x || y`).
    pub public_key: [u8; ETH_PUBKEY_LEN],
    pub address: [u8; ETH_ADDR_LEN],
    pub address_hex: String,
}

/// Library secret key that is erased when dropped.
///
/// `SecretKey` is `Copy`, so this only erases the copy it owns. Temporaries
/// the compiler makes while the key moves (the return from
/// `SecretKey::from_slice`, the parse closure's result) are not reached.
struct ErasingSecretKey(SecretKey);

impl Drop for ErasingSecretKey {
    fn drop(&mut self) {
        self.0.non_secure_erase();
    }
}

pub struct KeyDerivationEngine {
    client: Arc<dyn AttestationClient>,
    secp: Secp256k1<SignOnly>,
    seed: SecureBuffer<REPORT_DATA_LEN>,
    scalar: SecureBuffer<ETH_PRIVKEY_LEN>,
}

impl KeyDerivationEngine {
    pub fn new(client: Arc<dyn AttestationClient>) -> Self {
        Self {
            client,
            secp: Secp256k1::signing_only(),
            seed: SecureBuffer::new(),
            scalar: SecureBuffer::new(),
        }
    }

    /// Fetch a fresh report and derive the key bound to its report data.
    pub fn derive(&mut self) -> Result<KeyMaterial> {
        self.derive_with(|bytes| SecretKey::from_slice(bytes).ok())
    }

    /// [`derive`](Self::derive) with the candidate-scalar check supplied by
    /// the caller.
    fn derive_with<F>(&mut self, parse: F) -> Result<KeyMaterial>
    where
        F: FnMut(&[u8]) -> Option<SecretKey>,
    {
        let report = self
            .client
            .get_report(&[])
            .map_err(BoostError::TdxReport)?;

        let mut seed = Scrub::new(&mut self.seed);
        let mut scalar = Scrub::new(&mut self.scalar);

        let mut report_data = report.report_data();
        let report_data = Scrub::new(&mut report_data);
        seed.copy_from(&report_data[..])?;

        let secret = derive_secret_key(&seed, &mut scalar, parse)?;
        let public_key = public_key_bytes(&self.secp, &secret)?;
        let address = address_from_public_key(&public_key);
        let address_hex = format_address_hex(&address)?;

        info!(backend = self.client.name(), address = %address_hex, "key derived");
        Ok(KeyMaterial {
            public_key,
            address,
            address_hex,
        })
    }

    pub fn public_key_only(&mut self) -> Result<[u8; ETH_PUBKEY_LEN]> {
        self.derive().map(|key| key.public_key)
    }

    /// Checksum-free lowercase `0x` address.
    pub fn address_only(&mut self) -> Result<String> {
        self.derive().map(|key| key.address_hex)
    }

    /// True when no seed or scalar bytes remain in the engine's scratch space.
    pub fn scratch_is_clear(&self) -> bool {
        self.seed.is_zeroed() && self.scalar.is_zeroed()
    }
}

impl std::fmt::Debug for KeyDerivationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDerivationEngine")
            .field("backend", &self.client.name())
            .finish_non_exhaustive()
    }
}

/// Run HKDF until `parse` accepts a candidate scalar, at most
/// [`MAX_DERIVE_ATTEMPTS`] times.
fn derive_secret_key<F>(
    seed: &SecureBuffer<REPORT_DATA_LEN>,
    scalar: &mut SecureBuffer<ETH_PRIVKEY_LEN>,
    mut parse: F,
) -> Result<ErasingSecretKey>
where
    F: FnMut(&[u8]) -> Option<SecretKey>,
{
    for attempt in 0..MAX_DERIVE_ATTEMPTS {
        let info = eth_key_info(attempt);
        kdf::derive(
            ETH_KEY_SALT,
            seed.as_bytes(),
            info.as_bytes(),
            scalar.as_mut_bytes(),
        )?;
        if let Some(secret) = parse(scalar.as_bytes()) {
            debug!(attempt, "scalar accepted");
            return Ok(ErasingSecretKey(secret));
        }
        warn!(attempt, "derived scalar outside the curve order, retrying");
    }
    Err(BoostError::KeyDerivation(format!(
        "no valid scalar after {} attempts",
        MAX_DERIVE_ATTEMPTS
    )))
}

fn public_key_bytes(
    secp: &Secp256k1<SignOnly>,
    secret: &ErasingSecretKey,
) -> Result<[u8; ETH_PUBKEY_LEN]> {
    let point = PublicKey::from_secret_key(secp, &secret.0).serialize_uncompressed();
    if point[0] != 0x04 {
        return Err(BoostError::Crypto(format!(
            "unexpected point encoding tag {:#04x}",
            point[0]
        )));
    }
    let mut public_key = [0u8; ETH_PUBKEY_LEN];
    public_key.copy_from_slice(&point[1..]);
    Ok(public_key)
}

/// Last 20 bytes of `Keccak256(public_key)`.
pub fn address_from_public_key(public_key: &[u8; ETH_PUBKEY_LEN]) -> [u8; ETH_ADDR_LEN] {
    let hash = Keccak256::digest(public_key);
    let mut address = [0u8; ETH_ADDR_LEN];
    address.copy_from_slice(&hash[32 - ETH_ADDR_LEN..]);
    address
}

/// `"0x"` + lowercase hex. Anything but 20 bytes is `InvalidParam`.
pub fn format_address_hex(address: &[u8]) -> Result<String> {
    if address.len() != ETH_ADDR_LEN {
        return Err(BoostError::InvalidParam(format!(
            "address must be {} bytes, got {}",
            ETH_ADDR_LEN,
            address.len()
        )));
    }
    Ok(format!("0x{}", hex::encode(address)))
}

/// Inverse of [`format_address_hex`]. The `0x` prefix is optional and hex
/// digits may be either case.
pub fn parse_address_hex(text: &str) -> Result<[u8; ETH_ADDR_LEN]> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let mut address = [0u8; ETH_ADDR_LEN];
    hex::decode_to_slice(digits, &mut address)
        .map_err(|e| BoostError::InvalidParam(format!("bad address `{}`: {}", text, e)))?;
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boost_tdx::{MockAttestation, MockFailure};

    #[test]
    fn test_zero_report_vector() {
        let mut engine = KeyDerivationEngine::new(Arc::new(MockAttestation::new()));
        let key = engine.derive().unwrap();

        assert_eq!(
            hex::encode(key.public_key),
            "766af7ab24454b388f1c7607b1592978c0840c99de5cf5a144fd84a5522adf0c\
             3acf0db293d0abd9cefe5d0349f8b75fcfe997229ff2599da584c5f571c1fb90"
        );
        assert_eq!(key.address_hex, "0x3bd7e02b296758ab2640eef478ac54b9a889c090");
        assert_eq!(key.address_hex.len(), ETH_ADDR_HEX_LEN);
        assert!(engine.scratch_is_clear());
    }

    #[test]
    fn test_derive_is_deterministic() {
        let mut engine = KeyDerivationEngine::new(Arc::new(MockAttestation::new()));
        let first = engine.derive().unwrap();
        let second = engine.derive().unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.address_only().unwrap(), first.address_hex);
        assert_eq!(engine.public_key_only().unwrap(), first.public_key);
    }

    #[test]
    fn test_report_failure_maps_to_tdx_report() {
        let mock = Arc::new(MockAttestation::new());
        mock.fail_next(MockFailure::Report);
        let mut engine = KeyDerivationEngine::new(mock);

        let err = engine.derive().unwrap_err();
        assert!(matches!(err, BoostError::TdxReport(_)));
        assert_eq!(err.code(), crate::error::ErrorCode::TdxReport);
        assert!(engine.scratch_is_clear());
    }

    /// Backend whose reports carry a fixed, non-zero report data field.
    struct SeededReport;

    impl AttestationClient for SeededReport {
        fn name(&self) -> &'static str {
            "seeded"
        }

        fn get_report(&self, _extra_data: &[u8]) -> boost_tdx::Result<boost_tdx::Report> {
            let mock = MockAttestation::new();
            mock.get_report(&[0x5A; REPORT_DATA_LEN])
        }

        fn extend_register(
            &self,
            _index: u8,
            _digest: &[u8; boost_tdx::DIGEST_LEN],
        ) -> boost_tdx::Result<()> {
            Ok(())
        }

        fn report_to_quote(&self, report: &boost_tdx::Report) -> boost_tdx::Result<Vec<u8>> {
            Ok(report.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_scratch_cleared_when_every_candidate_is_rejected() {
        let mut engine = KeyDerivationEngine::new(Arc::new(SeededReport));

        let mut attempts = 0;
        let mut saw_scalar = false;
        let err = engine
            .derive_with(|bytes| {
                attempts += 1;
                saw_scalar |= bytes.iter().any(|b| *b != 0);
                None
            })
            .unwrap_err();

        assert!(matches!(err, BoostError::KeyDerivation(_)));
        assert_eq!(err.code(), crate::error::ErrorCode::KeyDerivation);
        assert_eq!(attempts, MAX_DERIVE_ATTEMPTS);
        assert!(saw_scalar, "scalar scratch was never written");
        assert!(engine.scratch_is_clear());
    }

    #[test]
    fn test_scratch_cleared_when_parse_panics() {
        let mut engine = KeyDerivationEngine::new(Arc::new(SeededReport));

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = engine.derive_with(|_| panic!("rejected"));
        }));
        assert!(unwound.is_err());
        assert!(engine.scratch_is_clear());
    }

    #[test]
    fn test_late_acceptance_still_clears_scratch() {
        let mut engine = KeyDerivationEngine::new(Arc::new(SeededReport));

        let mut attempts = 0;
        let key = engine
            .derive_with(|bytes| {
                attempts += 1;
                if attempts < MAX_DERIVE_ATTEMPTS {
                    None
                } else {
                    SecretKey::from_slice(bytes).ok()
                }
            })
            .unwrap();

        assert_ne!(key, engine.derive().unwrap());
        assert!(engine.scratch_is_clear());
    }

    #[test]
    fn test_retry_uses_suffixed_info() {
        let mut seed = SecureBuffer::<REPORT_DATA_LEN>::new();
        let mut scalar = SecureBuffer::<ETH_PRIVKEY_LEN>::new();
        seed.as_mut_bytes().fill(0x42);

        let mut calls = 0;
        let secret = derive_secret_key(&seed, &mut scalar, |bytes| {
            calls += 1;
            if calls == 1 {
                None
            } else {
                SecretKey::from_slice(bytes).ok()
            }
        })
        .unwrap();

        let mut expected = [0u8; ETH_PRIVKEY_LEN];
        kdf::derive(ETH_KEY_SALT, &[0x42; 64], b"secp256k1-private-key/retry-1", &mut expected)
            .unwrap();
        assert_eq!(secret.0.secret_bytes(), expected);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_retries_are_bounded() {
        let seed = SecureBuffer::<REPORT_DATA_LEN>::new();
        let mut scalar = SecureBuffer::<ETH_PRIVKEY_LEN>::new();

        let mut calls = 0;
        let result = derive_secret_key(&seed, &mut scalar, |_| {
            calls += 1;
            None
        });
        assert!(matches!(result, Err(BoostError::KeyDerivation(_))));
        assert_eq!(calls, MAX_DERIVE_ATTEMPTS);
    }

    #[test]
    fn test_out_of_range_scalars_rejected_by_curve() {
        assert!(SecretKey::from_slice(&[0u8; 32]).is_err());
        let order =
            hex::decode("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141")
                .unwrap();
        assert!(SecretKey::from_slice(&order).is_err());
    }

    #[test]
    fn test_format_address_hex() {
        let address = [0xAB; ETH_ADDR_LEN];
        assert_eq!(
            format_address_hex(&address).unwrap(),
            "0xabababababababababababababababababababab"
        );
        for bad in [&[0u8; 19][..], &[0u8; 21][..], &[][..]] {
            let err = format_address_hex(bad).unwrap_err();
            assert_eq!(err.code(), crate::error::ErrorCode::InvalidParam);
        }
    }

    #[test]
    fn test_parse_address_hex() {
        let expected = hex::decode("3bd7e02b296758ab2640eef478ac54b9a889c090").unwrap();
        assert_eq!(
            parse_address_hex("0x3bd7e02b296758ab2640eef478ac54b9a889c090").unwrap()[..],
            expected[..]
        );
        assert_eq!(
            parse_address_hex("3BD7E02B296758AB2640EEF478AC54B9A889C090").unwrap()[..],
            expected[..]
        );
        assert!(parse_address_hex("0x1234").is_err());
        assert!(parse_address_hex("0xzz d7e02b296758ab2640eef478ac54b9a889c0").is_err());
    }
}
