//! TDX report and quote layouts
//!
//! A [`Report`] wraps the raw bytes handed back by a backend. Two layouts are
//! understood:
//!
//! | layout      | report data        | RTMR *i*               |
//! |-------------|--------------------|------------------------|
//! | TDREPORT    | `128..192`         | `720 + 48*i`           |
//! | v4 quote    | `48 + 520..48+584` | `48 + 328 + 48*i`      |
//!
//! Only the fields this workspace consumes are decoded; everything else stays
//! opaque.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TdxError};

/// Width of the caller-controlled report data field.
pub const REPORT_DATA_LEN: usize = 64;

/// Width of one runtime measurement register (SHA-384).
pub const RTMR_LEN: usize = 48;

/// Number of runtime measurement registers exposed to the guest.
pub const RTMR_COUNT: usize = 4;

/// Width of the digests the workspace extends into registers.
pub const DIGEST_LEN: usize = 32;

/// Size of a TDREPORT_STRUCT.
pub const TDREPORT_LEN: usize = 1024;

/// Size of a v4 quote header.
pub const QUOTE_HEADER_LEN: usize = 48;

/// Size of a TD 1.0 quote body.
pub const TD_QUOTE_BODY_LEN: usize = 584;

const TDREPORT_REPORT_DATA_OFFSET: usize = 128;
const TDREPORT_RTMR_OFFSET: usize = 720;
const QUOTE_RTMR_OFFSET: usize = QUOTE_HEADER_LEN + 328;
const QUOTE_REPORT_DATA_OFFSET: usize = QUOTE_HEADER_LEN + 520;

pub type ReportData = [u8; REPORT_DATA_LEN];
pub type Rtmr = [u8; RTMR_LEN];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// TDREPORT_STRUCT as returned by the TDX module
    TdReport,
    /// DCAP v4 quote as returned by configfs-tsm
    QuoteV4,
}

/// Hardware-attested report. Immutable once obtained.
#[derive(Clone, PartialEq, Eq)]
pub struct Report {
    format: ReportFormat,
    raw: Vec<u8>,
}

impl Report {
    /// Wrap a raw TDREPORT.
    pub fn from_tdreport(raw: Vec<u8>) -> Result<Self> {
        if raw.len() < TDREPORT_LEN {
            return Err(TdxError::Malformed {
                kind: "TDREPORT",
                expected: TDREPORT_LEN,
                actual: raw.len(),
            });
        }
        Ok(Self {
            format: ReportFormat::TdReport,
            raw,
        })
    }

    /// Wrap a raw v4 quote.
    pub fn from_quote(raw: Vec<u8>) -> Result<Self> {
        let expected = QUOTE_HEADER_LEN + TD_QUOTE_BODY_LEN;
        if raw.len() < expected {
            return Err(TdxError::Malformed {
                kind: "TDX quote",
                expected,
                actual: raw.len(),
            });
        }
        Ok(Self {
            format: ReportFormat::QuoteV4,
            raw,
        })
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// The 64-byte report data field.
    pub fn report_data(&self) -> ReportData {
        let offset = match self.format {
            ReportFormat::TdReport => TDREPORT_REPORT_DATA_OFFSET,
            ReportFormat::QuoteV4 => QUOTE_REPORT_DATA_OFFSET,
        };
        let mut data = [0u8; REPORT_DATA_LEN];
        data.copy_from_slice(&self.raw[offset..offset + REPORT_DATA_LEN]);
        data
    }

    /// Value of RTMR `index` at the time the report was produced.
    pub fn rtmr(&self, index: u8) -> Option<Rtmr> {
        let index = usize::from(index);
        if index >= RTMR_COUNT {
            return None;
        }
        let base = match self.format {
            ReportFormat::TdReport => TDREPORT_RTMR_OFFSET,
            ReportFormat::QuoteV4 => QUOTE_RTMR_OFFSET,
        };
        let offset = base + index * RTMR_LEN;
        let mut value = [0u8; RTMR_LEN];
        value.copy_from_slice(&self.raw[offset..offset + RTMR_LEN]);
        Some(value)
    }
}

impl std::fmt::Debug for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Report")
            .field("format", &self.format)
            .field("len", &self.raw.len())
            .field("report_data", &hex::encode(self.report_data()))
            .finish()
    }
}

/// Zero-pad caller data to the report data width.
pub fn pad_report_data(extra_data: &[u8]) -> Result<ReportData> {
    if extra_data.len() > REPORT_DATA_LEN {
        return Err(TdxError::ReportDataTooLong(extra_data.len()));
    }
    let mut data = [0u8; REPORT_DATA_LEN];
    data[..extra_data.len()].copy_from_slice(extra_data);
    Ok(data)
}

/// Widen a 32-byte digest to the 48-byte value written into an RTMR.
pub fn rtmr_extend_value(digest: &[u8; DIGEST_LEN]) -> Rtmr {
    let mut value = [0u8; RTMR_LEN];
    value[..DIGEST_LEN].copy_from_slice(digest);
    value
}

pub fn check_register_index(index: u8) -> Result<()> {
    if usize::from(index) < RTMR_COUNT {
        Ok(())
    } else {
        Err(TdxError::InvalidRegister(index))
    }
}

/// Build a TDREPORT-shaped buffer. Used by the mock backend and in tests.
pub(crate) fn build_tdreport(report_data: &ReportData, rtmrs: &[Rtmr; RTMR_COUNT]) -> Vec<u8> {
    let mut raw = vec![0u8; TDREPORT_LEN];
    raw[TDREPORT_REPORT_DATA_OFFSET..TDREPORT_REPORT_DATA_OFFSET + REPORT_DATA_LEN]
        .copy_from_slice(report_data);
    for (i, rtmr) in rtmrs.iter().enumerate() {
        let offset = TDREPORT_RTMR_OFFSET + i * RTMR_LEN;
        raw[offset..offset + RTMR_LEN].copy_from_slice(rtmr);
    }
    raw
}

/// Build the header and TD body of a v4 quote (no signature section).
pub(crate) fn build_quote_body(report_data: &ReportData, rtmrs: &[Rtmr; RTMR_COUNT]) -> Vec<u8> {
    let mut raw = vec![0u8; QUOTE_HEADER_LEN + TD_QUOTE_BODY_LEN];
    // version 4, ECDSA-256 attestation key, TEE type TDX
    raw[0..2].copy_from_slice(&4u16.to_le_bytes());
    raw[2..4].copy_from_slice(&2u16.to_le_bytes());
    raw[4..8].copy_from_slice(&0x81u32.to_le_bytes());
    for (i, rtmr) in rtmrs.iter().enumerate() {
        let offset = QUOTE_RTMR_OFFSET + i * RTMR_LEN;
        raw[offset..offset + RTMR_LEN].copy_from_slice(rtmr);
    }
    raw[QUOTE_REPORT_DATA_OFFSET..QUOTE_REPORT_DATA_OFFSET + REPORT_DATA_LEN]
        .copy_from_slice(report_data);
    raw
}
