//! HKDF-SHA256 (RFC 5869) over secure buffers
//!
//! Known limitation: the `hkdf` crate does not zeroize its HMAC state. The
//! `Hkdf` values built in [`extract`] and [`expand`] are keyed with the PRK
//! and are dropped without being wiped. Each one lives only for the single
//! call that creates it. The PRK bytes handed back to callers sit in a
//! [`SecureBuffer`].

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{BoostError, Result};
use crate::secure::SecureBuffer;

/// Pseudorandom key length for HKDF-SHA256.
pub const PRK_LEN: usize = 32;

/// Salt binding derived keys to this tool and key purpose.
pub const ETH_KEY_SALT: &[u8] = b"boost-keytool/eth-key/v1";

/// HKDF info for the first derivation attempt.
pub const ETH_KEY_INFO: &str = "secp256k1-private-key";

/// Info string for derivation attempt `attempt` (0-based). Retries get a
/// distinct suffix so each attempt yields an independent candidate.
pub fn eth_key_info(attempt: u32) -> String {
    if attempt == 0 {
        ETH_KEY_INFO.to_string()
    } else {
        format!("{}/retry-{}", ETH_KEY_INFO, attempt)
    }
}

/// HKDF-Extract into `prk`.
pub fn extract(salt: &[u8], ikm: &[u8], prk: &mut SecureBuffer<PRK_LEN>) {
    // the returned `Hkdf` is PRK-keyed; drop it here instead of holding it
    let (mut raw, _) = Hkdf::<Sha256>::extract(Some(salt), ikm);
    prk.as_mut_bytes().copy_from_slice(&raw);
    raw.as_mut_slice().zeroize();
}

/// HKDF-Expand `prk` into `okm`, filling it completely.
pub fn expand(prk: &SecureBuffer<PRK_LEN>, info: &[u8], okm: &mut [u8]) -> Result<()> {
    let hk = Hkdf::<Sha256>::from_prk(prk.as_bytes())
        .map_err(|_| BoostError::KeyDerivation("invalid PRK length".into()))?;
    hk.expand(info, okm)
        .map_err(|_| BoostError::KeyDerivation(format!("cannot expand to {} bytes", okm.len())))
}

/// Extract-then-expand in one step.
pub fn derive(salt: &[u8], ikm: &[u8], info: &[u8], okm: &mut [u8]) -> Result<()> {
    let mut prk = SecureBuffer::<PRK_LEN>::new();
    extract(salt, ikm, &mut prk);
    expand(&prk, info, okm)
}
