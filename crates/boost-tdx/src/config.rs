//! Backend selection

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::AttestationClient;
use crate::hardware::TdxAttestation;
use crate::mock::MockAttestation;

/// Environment flag that switches to the mock backend.
pub const TEST_MODE_ENV: &str = "BOOST_TEST_MODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Real TDX guest interfaces
    #[default]
    Hardware,
    /// Deterministic in-memory backend
    Mock,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Hardware => write!(f, "hardware"),
            BackendKind::Mock => write!(f, "mock"),
        }
    }
}

/// Attestation backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttestationConfig {
    #[serde(default)]
    pub backend: BackendKind,
}

impl AttestationConfig {
    pub fn hardware() -> Self {
        Self {
            backend: BackendKind::Hardware,
        }
    }

    pub fn mock() -> Self {
        Self {
            backend: BackendKind::Mock,
        }
    }

    /// Read `BOOST_TEST_MODE`; `1`, `true`, `yes` or `on` select the mock.
    pub fn from_env() -> Self {
        Self::from_test_mode(std::env::var(TEST_MODE_ENV).ok().as_deref())
    }

    /// Interpret a test-mode flag value. Absent or unrecognised values select
    /// the hardware backend.
    pub fn from_test_mode(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Self::mock(),
            Some(v) if matches!(v.as_str(), "" | "0" | "false" | "no" | "off") => Self::hardware(),
            Some(v) => {
                warn!("ignoring unrecognised {}={:?}", TEST_MODE_ENV, v);
                Self::hardware()
            }
            None => Self::hardware(),
        }
    }
}

/// Construct the configured backend.
pub fn connect(config: &AttestationConfig) -> Arc<dyn AttestationClient> {
    info!(backend = %config.backend, "attestation backend selected");
    match config.backend {
        BackendKind::Hardware => Arc::new(TdxAttestation::new()),
        BackendKind::Mock => Arc::new(MockAttestation::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_hardware() {
        assert_eq!(AttestationConfig::default().backend, BackendKind::Hardware);
    }

    #[test]
    fn test_test_mode_values() {
        for on in ["1", "true", "TRUE", " yes ", "on"] {
            assert_eq!(
                AttestationConfig::from_test_mode(Some(on)).backend,
                BackendKind::Mock,
                "{:?} should select the mock",
                on
            );
        }
        for off in ["0", "false", "", "off", "maybe"] {
            assert_eq!(
                AttestationConfig::from_test_mode(Some(off)).backend,
                BackendKind::Hardware
            );
        }
        assert_eq!(
            AttestationConfig::from_test_mode(None).backend,
            BackendKind::Hardware
        );
    }

    #[test]
    fn test_connect_selects_backend() {
        assert_eq!(connect(&AttestationConfig::mock()).name(), "mock");
        assert_eq!(connect(&AttestationConfig::hardware()).name(), "tdx");
    }

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::Mock.to_string(), "mock");
        assert_eq!(BackendKind::Hardware.to_string(), "hardware");
    }
}
