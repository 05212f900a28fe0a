//! Volume measurement and binding into the TDX root of trust
//!
//! ```text
//! compose_digest = SHA256(manifest)
//! volumes_hash   = SHA256(compose_digest || v_1 || ... || v_n)
//! ```
//!
//! where `v_i` is the directory hash (or file hash) of the i-th bind mount in
//! manifest order. The result is bound either into the report data field
//! (repeatable) or into an RTMR (irreversible).

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use boost_tdx::{AttestationClient, Report, REPORT_DATA_LEN, RTMR_COUNT};

use crate::error::{BoostError, Result};
use crate::hasher::{fold_digests, sha256, Digest, DirectoryHasher, HASH_LEN};
use crate::volumes::VolumeMappingResolver;

/// RTMR reserved for application measurements.
pub const DEFAULT_RTMR_INDEX: u8 = 3;

/// Bytes of the compose digest used for the application identifier.
const APP_ID_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasurementMode {
    /// Embed in the report data of a fresh report.
    ReportData,
    /// Extend a runtime measurement register.
    Rtmr,
}

impl fmt::Display for MeasurementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementMode::ReportData => write!(f, "report-data"),
            MeasurementMode::Rtmr => write!(f, "rtmr"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    pub volumes_hash: Digest,
    pub compose_digest: Digest,
    pub mode: MeasurementMode,
    pub register_index: u8,
    pub app_identifier: String,
    /// Report obtained while binding in [`MeasurementMode::ReportData`].
    pub bound_report: Option<Report>,
}

/// Validity of a measurement is its state: only `Measured` holds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasurementState {
    Uninitialized,
    Measured(Measurement),
    Cleared,
}

pub struct MeasurementEngine {
    client: Arc<dyn AttestationClient>,
    base_dir: PathBuf,
    hasher: DirectoryHasher,
    resolver: VolumeMappingResolver,
    state: MeasurementState,
    // Registers this engine has tried to extend. A failed write may still
    // have reached the register, so attempts count.
    extended: [bool; RTMR_COUNT],
}

impl MeasurementEngine {
    /// Relative host paths in manifests are resolved against `base_dir`.
    pub fn new(client: Arc<dyn AttestationClient>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            base_dir: base_dir.into(),
            hasher: DirectoryHasher::new(),
            resolver: VolumeMappingResolver::new(),
            state: MeasurementState::Uninitialized,
            extended: [false; RTMR_COUNT],
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn calculate_volumes_hash(&self, manifest: &str) -> Result<Digest> {
        self.measure(manifest).map(|(_, volumes_hash)| volumes_hash)
    }

    /// Measure the volumes of `manifest` and bind the result with `mode`.
    ///
    /// `register_index` only matters for [`MeasurementMode::Rtmr`] but is
    /// validated in both modes. On failure the previous measurement, if any,
    /// is left in place.
    pub fn start(
        &mut self,
        manifest: &str,
        mode: MeasurementMode,
        register_index: u8,
    ) -> Result<Digest> {
        if usize::from(register_index) >= RTMR_COUNT {
            return Err(BoostError::InvalidParam(format!(
                "register index {} out of range 0..{}",
                register_index, RTMR_COUNT
            )));
        }

        let (compose_digest, volumes_hash) = self.measure(manifest)?;

        let bound_report = match mode {
            MeasurementMode::ReportData => {
                let mut report_data = [0u8; REPORT_DATA_LEN];
                report_data[..HASH_LEN].copy_from_slice(&volumes_hash);
                let report = self
                    .client
                    .get_report(&report_data)
                    .map_err(BoostError::AttestationError)?;
                Some(report)
            }
            MeasurementMode::Rtmr => {
                let slot = &mut self.extended[usize::from(register_index)];
                if *slot {
                    warn!(
                        register = register_index,
                        "RTMR already extended by this engine; extending again changes its value"
                    );
                }
                *slot = true;
                self.client
                    .extend_register(register_index, &volumes_hash)
                    .map_err(BoostError::AttestationError)?;
                None
            }
        };

        info!(
            backend = self.client.name(),
            %mode,
            register = register_index,
            volumes_hash = %hex::encode(volumes_hash),
            "measurement bound"
        );

        self.state = MeasurementState::Measured(Measurement {
            volumes_hash,
            compose_digest,
            mode,
            register_index,
            app_identifier: hex::encode(&compose_digest[..APP_ID_LEN]),
            bound_report,
        });
        Ok(volumes_hash)
    }

    /// Fresh quote over `extra_data` (zero-padded to 64 bytes). Independent
    /// of the measurement state.
    pub fn generate_quote(&self, extra_data: &[u8]) -> Result<Vec<u8>> {
        if extra_data.len() > REPORT_DATA_LEN {
            return Err(BoostError::InvalidParam(format!(
                "extra data is {} bytes, at most {} allowed",
                extra_data.len(),
                REPORT_DATA_LEN
            )));
        }
        let report = self
            .client
            .get_report(extra_data)
            .map_err(BoostError::AttestationError)?;
        self.quote(&report)
    }

    /// Quote the report captured by a [`MeasurementMode::ReportData`] binding.
    pub fn quote_bound_report(&self) -> Result<Vec<u8>> {
        let report = self
            .measurement()
            .and_then(|m| m.bound_report.as_ref())
            .ok_or_else(|| {
                BoostError::InvalidParam("no report-data measurement to quote".into())
            })?;
        self.quote(report)
    }

    /// True only in [`MeasurementState::Measured`]; there is no invalid
    /// measurement to hold.
    pub fn has_valid_measurement(&self) -> bool {
        matches!(self.state, MeasurementState::Measured(_))
    }

    pub fn get_app_identifier(&self) -> Option<&str> {
        self.measurement().map(|m| m.app_identifier.as_str())
    }

    pub fn measurement(&self) -> Option<&Measurement> {
        match &self.state {
            MeasurementState::Measured(m) => Some(m),
            _ => None,
        }
    }

    pub fn state(&self) -> &MeasurementState {
        &self.state
    }

    /// Forget the in-memory measurement. Registers already extended stay
    /// extended.
    pub fn clear_measurement(&mut self) {
        if matches!(self.state, MeasurementState::Measured(_)) {
            debug!("measurement cleared");
        }
        self.state = MeasurementState::Cleared;
    }

    fn quote(&self, report: &Report) -> Result<Vec<u8>> {
        let quote = self
            .client
            .report_to_quote(report)
            .map_err(BoostError::AttestationError)?;
        debug!(len = quote.len(), "quote generated");
        Ok(quote)
    }

    /// Returns `(compose_digest, volumes_hash)`.
    fn measure(&self, manifest: &str) -> Result<(Digest, Digest)> {
        let compose_digest = sha256(manifest.as_bytes());
        let mappings = self.resolver.resolve(manifest, &self.base_dir)?;

        let mut digests = Vec::with_capacity(mappings.len() + 1);
        digests.push(compose_digest);
        for mapping in &mappings {
            let digest = self.hash_volume(&mapping.host_path)?;
            debug!(
                service = %mapping.service,
                host = %mapping.host_path.display(),
                digest = %hex::encode(digest),
                "volume hashed"
            );
            digests.push(digest);
        }

        Ok((compose_digest, fold_digests(&digests)))
    }

    fn hash_volume(&self, path: &Path) -> Result<Digest> {
        let meta = std::fs::metadata(path).map_err(|e| BoostError::io(path, e))?;
        if meta.is_dir() {
            self.hasher.hash(path)
        } else if meta.is_file() {
            self.hasher.hash_file(path)
        } else {
            // FIFOs block on open and devices never end
            Err(BoostError::io(
                path,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "not a regular file or directory",
                ),
            ))
        }
    }
}

impl fmt::Debug for MeasurementEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementEngine")
            .field("backend", &self.client.name())
            .field("base_dir", &self.base_dir)
            .field("state", &self.state)
            .finish()
    }
}
