//! CLI settings: command-line flags over environment over config file over
//! defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use boost_core::DEFAULT_RTMR_INDEX;
use boost_tdx::{AttestationConfig, BackendKind};

/// Contents of a `boost.toml` file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoostConfig {
    pub backend: Option<BackendKind>,
    pub base_dir: Option<PathBuf>,
    pub default_rtmr: Option<u8>,
}

impl BoostConfig {
    /// Relative `base_dir` values are taken relative to the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: BoostConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;

        if let (Some(base), Some(parent)) = (config.base_dir.as_mut(), path.parent()) {
            if base.is_relative() {
                *base = parent.join(&*base);
            }
        }
        Ok(config)
    }
}

/// Values given on the command line (or through clap's `env` fallbacks).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mock: bool,
    pub base_dir: Option<PathBuf>,
    pub rtmr: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub attestation: AttestationConfig,
    pub base_dir: PathBuf,
    pub rtmr: u8,
}

impl Settings {
    pub fn resolve(
        flags: &Overrides,
        test_mode: Option<&str>,
        file: Option<&BoostConfig>,
        cwd: PathBuf,
    ) -> Self {
        // an empty `BOOST_TEST_MODE=` counts as unset
        let test_mode = test_mode.filter(|v| !v.trim().is_empty());
        let attestation = if flags.mock {
            AttestationConfig::mock()
        } else if test_mode.is_some() {
            AttestationConfig::from_test_mode(test_mode)
        } else {
            AttestationConfig {
                backend: file.and_then(|f| f.backend).unwrap_or_default(),
            }
        };

        let base_dir = flags
            .base_dir
            .clone()
            .or_else(|| file.and_then(|f| f.base_dir.clone()))
            .unwrap_or(cwd);

        let rtmr = flags
            .rtmr
            .or_else(|| file.and_then(|f| f.default_rtmr))
            .unwrap_or(DEFAULT_RTMR_INDEX);

        Self {
            attestation,
            base_dir,
            rtmr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(&Overrides::default(), None, None, "/work".into());
        assert_eq!(settings.attestation.backend, BackendKind::Hardware);
        assert_eq!(settings.base_dir, PathBuf::from("/work"));
        assert_eq!(settings.rtmr, 3);
    }

    #[test]
    fn test_precedence() {
        let file = BoostConfig {
            backend: Some(BackendKind::Mock),
            base_dir: Some("/from/file".into()),
            default_rtmr: Some(2),
        };

        let from_file = Settings::resolve(&Overrides::default(), None, Some(&file), "/cwd".into());
        assert_eq!(from_file.attestation.backend, BackendKind::Mock);
        assert_eq!(from_file.base_dir, PathBuf::from("/from/file"));
        assert_eq!(from_file.rtmr, 2);

        // an explicit env value beats the file, in either direction
        let env_off = Settings::resolve(&Overrides::default(), Some("0"), Some(&file), "/".into());
        assert_eq!(env_off.attestation.backend, BackendKind::Hardware);

        let flags = Overrides {
            mock: true,
            base_dir: Some("/from/flag".into()),
            rtmr: Some(1),
        };
        let from_flags = Settings::resolve(&flags, Some("0"), Some(&file), "/".into());
        assert_eq!(from_flags.attestation.backend, BackendKind::Mock);
        assert_eq!(from_flags.base_dir, PathBuf::from("/from/flag"));
        assert_eq!(from_flags.rtmr, 1);
    }

    #[test]
    fn test_empty_test_mode_defers_to_file() {
        let file = BoostConfig {
            backend: Some(BackendKind::Mock),
            ..BoostConfig::default()
        };
        for empty in ["", "  "] {
            let settings =
                Settings::resolve(&Overrides::default(), Some(empty), Some(&file), "/".into());
            assert_eq!(settings.attestation.backend, BackendKind::Mock);
        }

        let no_file = Settings::resolve(&Overrides::default(), Some(""), None, "/".into());
        assert_eq!(no_file.attestation.backend, BackendKind::Hardware);
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boost.toml");
        std::fs::write(
            &path,
            "backend = \"mock\"\nbase_dir = \"deploy\"\ndefault_rtmr = 2\n",
        )
        .unwrap();

        let config = BoostConfig::from_file(&path).unwrap();
        assert_eq!(config.backend, Some(BackendKind::Mock));
        assert_eq!(config.base_dir, Some(dir.path().join("deploy")));
        assert_eq!(config.default_rtmr, Some(2));
    }

    #[test]
    fn test_from_file_errors() {
        let dir = TempDir::new().unwrap();
        assert!(BoostConfig::from_file(&dir.path().join("missing.toml")).is_err());

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "backend = \"sgx\"\n").unwrap();
        assert!(BoostConfig::from_file(&path).is_err());

        std::fs::write(&path, "colour = \"blue\"\n").unwrap();
        assert!(BoostConfig::from_file(&path).is_err());
    }
}
