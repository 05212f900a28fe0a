//! The attestation capability consumed by the engines

use crate::error::Result;
use crate::report::{Report, DIGEST_LEN};

/// Guest attestation backend.
///
/// Every call blocks until the backend answers; there is no timeout. Callers
/// that need cancellation must impose it from outside.
pub trait AttestationClient: Send + Sync {
    /// Short backend name for logs ("tdx", "mock").
    fn name(&self) -> &'static str;

    /// Request a report whose report data is `extra_data` zero-padded to 64
    /// bytes. More than 64 bytes is rejected.
    fn get_report(&self, extra_data: &[u8]) -> Result<Report>;

    /// Extend RTMR `index` with `digest`.
    ///
    /// Irreversible and non-idempotent. An error does not imply the register
    /// is unchanged, so callers must not retry blindly.
    fn extend_register(&self, index: u8, digest: &[u8; DIGEST_LEN]) -> Result<()>;

    /// Produce a remotely verifiable quote binding `report`.
    fn report_to_quote(&self, report: &Report) -> Result<Vec<u8>>;
}
