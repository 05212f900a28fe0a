//! Host volume mappings declared in a compose manifest
//!
//! Only `services.<name>.volumes` is read. Both the short form
//! (`./web:/usr/share/nginx/html:ro`) and the long form
//! (`{type: bind, source, target}`) are understood; named and anonymous
//! volumes carry no host state and are skipped. YAML merge keys are resolved
//! before services are read.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{BoostError, Result};

/// A bind mount from the host into a service container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeMapping {
    pub service: String,
    /// Absolute, lexically normalized host path.
    pub host_path: PathBuf,
    pub container_path: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeMappingResolver;

impl VolumeMappingResolver {
    pub fn new() -> Self {
        Self
    }

    /// Extract bind mounts in order of appearance, resolving relative host
    /// paths against `base_dir`.
    pub fn resolve(&self, manifest: &str, base_dir: &Path) -> Result<Vec<VolumeMapping>> {
        let mut doc: Value = serde_yaml::from_str(manifest)
            .map_err(|e| BoostError::ParseError(format!("invalid manifest: {}", e)))?;
        // `<<: *anchor` keys are left as-is by the parser; a service that
        // inherits its volumes through one must still have them measured.
        doc.apply_merge()
            .map_err(|e| BoostError::ParseError(format!("invalid merge key: {}", e)))?;

        let services = match &doc {
            Value::Null => return Ok(Vec::new()),
            Value::Mapping(root) => match root.get("services") {
                None | Some(Value::Null) => return Ok(Vec::new()),
                Some(Value::Mapping(services)) => services,
                Some(_) => {
                    return Err(BoostError::ParseError(
                        "`services` must be a mapping".into(),
                    ))
                }
            },
            _ => {
                return Err(BoostError::ParseError(
                    "manifest root must be a mapping".into(),
                ))
            }
        };

        let mut mappings = Vec::new();
        for (name, service) in services {
            let name = name
                .as_str()
                .ok_or_else(|| BoostError::ParseError("service names must be strings".into()))?;
            let volumes = match service {
                Value::Mapping(service) => match service.get("volumes") {
                    None | Some(Value::Null) => continue,
                    Some(Value::Sequence(volumes)) => volumes,
                    Some(_) => {
                        return Err(BoostError::ParseError(format!(
                            "service `{}`: `volumes` must be a list",
                            name
                        )))
                    }
                },
                Value::Null => continue,
                _ => {
                    return Err(BoostError::ParseError(format!(
                        "service `{}` must be a mapping",
                        name
                    )))
                }
            };

            for entry in volumes {
                let bind = match entry {
                    Value::String(short) => parse_short(name, short)?,
                    Value::Mapping(long) => parse_long(name, long)?,
                    _ => {
                        return Err(BoostError::ParseError(format!(
                            "service `{}`: volume entries must be strings or mappings",
                            name
                        )))
                    }
                };
                let Some((host, container)) = bind else {
                    continue;
                };

                let host_path = resolve_host_path(host, base_dir)?;
                debug!(
                    service = name,
                    host = %host_path.display(),
                    container,
                    "bind mount"
                );
                mappings.push(VolumeMapping {
                    service: name.to_string(),
                    host_path,
                    container_path: container.to_string(),
                });
            }
        }

        Ok(mappings)
    }
}

/// `host:container[:mode]`. Returns `None` for named or anonymous volumes.
fn parse_short<'a>(service: &str, volume: &'a str) -> Result<Option<(&'a str, &'a str)>> {
    let parts: Vec<&str> = volume.split(':').collect();
    if parts.len() == 1 {
        return Ok(None);
    }
    if parts.len() > 3 {
        return Err(BoostError::ParseError(format!(
            "service `{}`: malformed volume `{}`",
            service, volume
        )));
    }

    let (host, container) = (parts[0], parts[1]);
    if host.is_empty() || container.is_empty() {
        return Err(BoostError::ParseError(format!(
            "service `{}`: empty path in volume `{}`",
            service, volume
        )));
    }
    if !is_host_path(host) {
        debug!(service, volume = host, "named volume skipped");
        return Ok(None);
    }
    Ok(Some((host, container)))
}

fn parse_long<'a>(service: &str, volume: &'a Mapping) -> Result<Option<(&'a str, &'a str)>> {
    let field = move |key: &str| -> Result<Option<&'a str>> {
        match volume.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(BoostError::ParseError(format!(
                "service `{}`: volume `{}` must be a string",
                service, key
            ))),
        }
    };

    let kind = field("type")?.ok_or_else(|| {
        BoostError::ParseError(format!("service `{}`: volume without `type`", service))
    })?;
    if kind != "bind" {
        return Ok(None);
    }

    match (field("source")?, field("target")?) {
        (Some(source), Some(target)) if !source.is_empty() && !target.is_empty() => {
            Ok(Some((source, target)))
        }
        _ => Err(BoostError::ParseError(format!(
            "service `{}`: bind volume needs `source` and `target`",
            service
        ))),
    }
}

fn is_host_path(host: &str) -> bool {
    host.starts_with('.') || host.starts_with('/') || host.starts_with('~')
}

fn resolve_host_path(host: &str, base_dir: &Path) -> Result<PathBuf> {
    let path = if host == "~" || host.starts_with("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| BoostError::InvalidParam("home directory is unknown".into()))?;
        home.join(host.trim_start_matches('~').trim_start_matches('/'))
    } else if host.starts_with('~') {
        return Err(BoostError::ParseError(format!(
            "unsupported home reference `{}`",
            host
        )));
    } else {
        base_dir.join(host)
    };
    Ok(normalize_path(&path))
}

/// Resolve `.` and `..` without touching the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // `..` above the root stays at the root
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
