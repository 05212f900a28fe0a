//! # Boost TDX
//!
//! Attestation backend boundary for code running inside an Intel TDX trust
//! domain.
//!
//! The engines in `boost-core` only see the [`AttestationClient`] trait:
//!
//! - [`TdxAttestation`] talks to the guest kernel (`/dev/tdx_guest`, sysfs
//!   RTMR files, configfs-tsm)
//! - [`MockAttestation`] keeps registers in memory and produces deterministic
//!   reports and quotes with the same layouts
//!
//! Which one is used is decided once, at construction, from an explicit
//! [`AttestationConfig`]:
//!
//! ```rust
//! use boost_tdx::{connect, AttestationConfig};
//!
//! let client = connect(&AttestationConfig::mock());
//! client.extend_register(3, &[0u8; 32]).unwrap();
//! let report = client.get_report(b"challenge").unwrap();
//! assert_eq!(&report.report_data()[..9], b"challenge");
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod hardware;
pub mod mock;
pub mod report;

pub use client::AttestationClient;
pub use config::{connect, AttestationConfig, BackendKind, TEST_MODE_ENV};
pub use error::{Result, TdxError};
pub use hardware::TdxAttestation;
pub use mock::{MockAttestation, MockFailure};
pub use report::{
    pad_report_data, Report, ReportData, ReportFormat, Rtmr, DIGEST_LEN, REPORT_DATA_LEN,
    RTMR_COUNT, RTMR_LEN,
};
