//! Zero-on-exit containers for secret bytes
//!
//! [`SecureBuffer`] owns a fixed number of bytes and wipes them when dropped,
//! whichever way the owning scope is left (normal return, `?`, panic unwind).
//! [`Scrub`] gives the same guarantee to storage that outlives the scope, such
//! as scratch space owned by a long-lived engine.

use std::ops::{Deref, DerefMut};

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{BoostError, Result};

/// Fixed-capacity secret byte buffer.
///
/// Not `Clone`/`Copy`: there is only ever one owner. Moving ownership out of a
/// live buffer goes through [`SecureBuffer::take`], which wipes the source.
pub struct SecureBuffer<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> SecureBuffer<N> {
    pub const LEN: usize = N;

    pub fn new() -> Self {
        Self { bytes: [0u8; N] }
    }

    /// Fill the buffer from `src`, which must be exactly `N` bytes.
    pub fn copy_from(&mut self, src: &[u8]) -> Result<()> {
        if src.len() != N {
            return Err(BoostError::InvalidParam(format!(
                "secure buffer expects {} bytes, got {}",
                N,
                src.len()
            )));
        }
        self.bytes.copy_from_slice(src);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8; N] {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        N
    }

    /// Move the contents into a new buffer and zero this one.
    pub fn take(&mut self) -> Self {
        let mut out = Self::new();
        out.bytes.copy_from_slice(&self.bytes);
        self.bytes.zeroize();
        out
    }

    pub fn wipe(&mut self) {
        self.bytes.zeroize();
    }

    pub fn is_zeroed(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }
}

impl<const N: usize> Default for SecureBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Zeroize for SecureBuffer<N> {
    fn zeroize(&mut self) {
        self.bytes.zeroize();
    }
}

impl<const N: usize> Drop for SecureBuffer<N> {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl<const N: usize> ZeroizeOnDrop for SecureBuffer<N> {}

impl<const N: usize> std::fmt::Debug for SecureBuffer<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureBuffer<{}>([REDACTED])", N)
    }
}

/// Borrow of secret storage that is zeroized when the guard goes out of scope.
pub struct Scrub<'a, T: Zeroize> {
    inner: &'a mut T,
}

impl<'a, T: Zeroize> Scrub<'a, T> {
    pub fn new(inner: &'a mut T) -> Self {
        Self { inner }
    }
}

impl<T: Zeroize> Deref for Scrub<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.inner
    }
}

impl<T: Zeroize> DerefMut for Scrub<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.inner
    }
}

impl<T: Zeroize> Drop for Scrub<'_, T> {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}
