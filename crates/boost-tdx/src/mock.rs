//! Deterministic in-memory backend for hosts without TDX
//!
//! Registers follow the hardware extend rule `rtmr = SHA384(rtmr || value)`,
//! so code exercised against the mock sees the same monotonic behaviour it
//! would see inside a real trust domain.

use std::sync::{Mutex, MutexGuard};

use sha2::{Digest, Sha256, Sha384};
use tracing::debug;

use crate::client::AttestationClient;
use crate::error::{Result, TdxError};
use crate::report::{
    build_quote_body, build_tdreport, check_register_index, pad_report_data, rtmr_extend_value,
    Report, Rtmr, DIGEST_LEN, RTMR_COUNT, RTMR_LEN,
};

/// Length of the tag appended to mock quotes in place of a signature.
pub const MOCK_QUOTE_TAG_LEN: usize = 32;

/// Which call the mock should fail next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Report,
    Register,
    Quote,
}

struct MockState {
    rtmrs: [Rtmr; RTMR_COUNT],
    pending_failures: Vec<MockFailure>,
    extend_count: u64,
}

// `[u8; 48]` has no `Default`, so neither type can derive it.
impl Default for MockState {
    fn default() -> Self {
        Self {
            rtmrs: [[0u8; RTMR_LEN]; RTMR_COUNT],
            pending_failures: Vec::new(),
            extend_count: 0,
        }
    }
}

/// Mock TDX guest.
pub struct MockAttestation {
    state: Mutex<MockState>,
}

impl MockAttestation {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    /// Current value of RTMR `index`.
    pub fn rtmr(&self, index: u8) -> Option<Rtmr> {
        self.lock().rtmrs.get(usize::from(index)).copied()
    }

    /// Number of successful extensions across all registers.
    pub fn extend_count(&self) -> u64 {
        self.lock().extend_count
    }

    /// Make the next call of `kind` fail. Queued failures are consumed in
    /// order per kind.
    pub fn fail_next(&self, kind: MockFailure) {
        self.lock().pending_failures.push(kind);
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panic while holding the lock cannot leave the registers half
        // written, so the state is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_failure(state: &mut MockState, kind: MockFailure) -> bool {
        match state.pending_failures.iter().position(|k| *k == kind) {
            Some(pos) => {
                state.pending_failures.remove(pos);
                true
            }
            None => false,
        }
    }
}

impl Default for MockAttestation {
    fn default() -> Self {
        Self::new()
    }
}

impl AttestationClient for MockAttestation {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn get_report(&self, extra_data: &[u8]) -> Result<Report> {
        let report_data = pad_report_data(extra_data)?;
        let mut state = self.lock();
        if Self::take_failure(&mut state, MockFailure::Report) {
            return Err(TdxError::Report("injected mock failure".into()));
        }
        Report::from_tdreport(build_tdreport(&report_data, &state.rtmrs))
    }

    fn extend_register(&self, index: u8, digest: &[u8; DIGEST_LEN]) -> Result<()> {
        check_register_index(index)?;
        let mut state = self.lock();
        if Self::take_failure(&mut state, MockFailure::Register) {
            return Err(TdxError::Register("injected mock failure".into()));
        }

        let slot = &mut state.rtmrs[usize::from(index)];
        let mut hasher = Sha384::new();
        hasher.update(*slot);
        hasher.update(rtmr_extend_value(digest));
        slot.copy_from_slice(&hasher.finalize());
        state.extend_count += 1;

        debug!(index, digest = %hex::encode(digest), "mock RTMR extended");
        Ok(())
    }

    fn report_to_quote(&self, report: &Report) -> Result<Vec<u8>> {
        let mut state = self.lock();
        if Self::take_failure(&mut state, MockFailure::Quote) {
            return Err(TdxError::Quote("injected mock failure".into()));
        }
        drop(state);

        let mut rtmrs = [[0u8; RTMR_LEN]; RTMR_COUNT];
        for (i, slot) in rtmrs.iter_mut().enumerate() {
            if let Some(value) = report.rtmr(i as u8) {
                *slot = value;
            }
        }

        let mut quote = build_quote_body(&report.report_data(), &rtmrs);
        let tag = Sha256::digest(&quote);
        quote.extend_from_slice(&(MOCK_QUOTE_TAG_LEN as u32).to_le_bytes());
        quote.extend_from_slice(&tag);
        Ok(quote)
    }
}
