//! Intel TDX guest backend
//!
//! - reports: `TDX_CMD_GET_REPORT0` on `/dev/tdx_guest`
//! - RTMR extension: the kernel's sysfs measurement files
//!   (`/sys/class/misc/tdx_guest/measurements/rtmr<i>:sha384`)
//! - quotes: configfs-tsm (`/sys/kernel/config/tsm/report`)

use std::path::{Path, PathBuf};

use crate::client::AttestationClient;
use crate::error::{Result, TdxError};
use crate::report::{Report, DIGEST_LEN};

pub const TDX_GUEST_DEVICE: &str = "/dev/tdx_guest";
pub const TDX_MEASUREMENTS_DIR: &str = "/sys/class/misc/tdx_guest/measurements";
pub const TSM_REPORT_DIR: &str = "/sys/kernel/config/tsm/report";

/// Hardware-backed attestation inside a TDX trust domain.
#[derive(Debug, Clone)]
pub struct TdxAttestation {
    device: PathBuf,
    measurements_dir: PathBuf,
    tsm_report_dir: PathBuf,
}

impl Default for TdxAttestation {
    fn default() -> Self {
        Self {
            device: PathBuf::from(TDX_GUEST_DEVICE),
            measurements_dir: PathBuf::from(TDX_MEASUREMENTS_DIR),
            tsm_report_dir: PathBuf::from(TSM_REPORT_DIR),
        }
    }
}

impl TdxAttestation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the kernel interface locations.
    pub fn with_paths(
        device: impl Into<PathBuf>,
        measurements_dir: impl Into<PathBuf>,
        tsm_report_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            device: device.into(),
            measurements_dir: measurements_dir.into(),
            tsm_report_dir: tsm_report_dir.into(),
        }
    }

    /// Whether the guest device node is present.
    pub fn is_available(&self) -> bool {
        self.device.exists()
    }

    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    fn rtmr_path(&self, index: u8) -> PathBuf {
        self.measurements_dir.join(format!("rtmr{}:sha384", index))
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn not_available(path: &Path, err: std::io::Error) -> TdxError {
    if err.kind() == std::io::ErrorKind::NotFound {
        TdxError::NotAvailable(format!("{} not found", path.display()))
    } else {
        TdxError::IoError(err)
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::path::{Path, PathBuf};

    use tracing::{debug, info, warn};

    use super::{not_available, TdxAttestation};
    use crate::error::{Result, TdxError};
    use crate::report::{
        check_register_index, pad_report_data, rtmr_extend_value, Report, ReportData,
        DIGEST_LEN, REPORT_DATA_LEN, TDREPORT_LEN,
    };

    #[repr(C)]
    pub struct TdxReportReq {
        reportdata: [u8; REPORT_DATA_LEN],
        tdreport: [u8; TDREPORT_LEN],
    }

    nix::ioctl_readwrite!(tdx_cmd_get_report0, b'T', 1, TdxReportReq);

    /// configfs-tsm entry, removed when dropped.
    struct TsmEntry {
        path: PathBuf,
    }

    impl TsmEntry {
        fn create(root: &Path) -> Result<Self> {
            let path = root.join(format!("boost-{}", uuid::Uuid::new_v4()));
            fs::create_dir(&path).map_err(|e| not_available(root, e))?;
            Ok(Self { path })
        }

        fn generate(&self, report_data: &ReportData) -> Result<Vec<u8>> {
            fs::write(self.path.join("inblob"), report_data)
                .map_err(|e| TdxError::Quote(format!("writing inblob: {}", e)))?;
            let quote = fs::read(self.path.join("outblob"))
                .map_err(|e| TdxError::Quote(format!("reading outblob: {}", e)))?;

            // Any other writer to this entry bumps the generation and makes
            // the outblob untrustworthy.
            let generation = fs::read_to_string(self.path.join("generation"))
                .map_err(|e| TdxError::Quote(format!("reading generation: {}", e)))?;
            if generation.trim() != "1" {
                return Err(TdxError::Quote(format!(
                    "configfs-tsm entry raced (generation {})",
                    generation.trim()
                )));
            }
            Ok(quote)
        }
    }

    impl Drop for TsmEntry {
        fn drop(&mut self) {
            if let Err(e) = fs::remove_dir(&self.path) {
                warn!(path = %self.path.display(), "failed to remove configfs-tsm entry: {}", e);
            }
        }
    }

    impl TdxAttestation {
        pub(super) fn sys_get_report(&self, extra_data: &[u8]) -> Result<Report> {
            let reportdata = pad_report_data(extra_data)?;
            let device = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&self.device)
                .map_err(|e| not_available(&self.device, e))?;

            let mut req = TdxReportReq {
                reportdata,
                tdreport: [0u8; TDREPORT_LEN],
            };
            // SAFETY: `req` is a properly sized, initialized `tdx_report_req`
            // that outlives the call, and the fd stays open for its duration.
            unsafe { tdx_cmd_get_report0(device.as_raw_fd(), &mut req) }
                .map_err(|e| TdxError::Report(format!("TDX_CMD_GET_REPORT0: {}", e)))?;

            debug!("TDREPORT obtained from {}", self.device.display());
            Report::from_tdreport(req.tdreport.to_vec())
        }

        pub(super) fn sys_extend_register(&self, index: u8, digest: &[u8; DIGEST_LEN]) -> Result<()> {
            check_register_index(index)?;
            let path = self.rtmr_path(index);
            let mut file = OpenOptions::new()
                .write(true)
                .open(&path)
                .map_err(|e| not_available(&path, e))?;
            file.write_all(&rtmr_extend_value(digest))
                .map_err(|e| TdxError::Register(format!("{}: {}", path.display(), e)))?;

            info!(index, digest = %hex::encode(digest), "RTMR extended");
            Ok(())
        }

        pub(super) fn sys_report_to_quote(&self, report: &Report) -> Result<Vec<u8>> {
            let entry = TsmEntry::create(&self.tsm_report_dir)?;
            let quote = entry.generate(&report.report_data())?;
            debug!(len = quote.len(), "quote generated via configfs-tsm");
            Ok(quote)
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl TdxAttestation {
    fn sys_get_report(&self, _extra_data: &[u8]) -> Result<Report> {
        Err(TdxError::NotAvailable("TDX guest interface requires Linux".into()))
    }

    fn sys_extend_register(&self, _index: u8, _digest: &[u8; DIGEST_LEN]) -> Result<()> {
        Err(TdxError::NotAvailable("TDX guest interface requires Linux".into()))
    }

    fn sys_report_to_quote(&self, _report: &Report) -> Result<Vec<u8>> {
        Err(TdxError::NotAvailable("TDX guest interface requires Linux".into()))
    }
}

impl AttestationClient for TdxAttestation {
    fn name(&self) -> &'static str {
        "tdx"
    }

    fn get_report(&self, extra_data: &[u8]) -> Result<Report> {
        self.sys_get_report(extra_data)
    }

    fn extend_register(&self, index: u8, digest: &[u8; DIGEST_LEN]) -> Result<()> {
        self.sys_extend_register(index, digest)
    }

    fn report_to_quote(&self, report: &Report) -> Result<Vec<u8>> {
        self.sys_report_to_quote(report)
    }
}
