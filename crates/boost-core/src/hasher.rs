//! Deterministic file-tree hashing
//!
//! ```text
//! leaf_i = SHA256(relative_path_i || content_i)
//! digest = SHA256(leaf_1 || ... || leaf_n)    // leaves ordered by path bytes
//! ```
//!
//! Only regular files contribute. Symlinks are neither followed nor hashed,
//! and directories contribute only through the files they contain.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use sha2::{Digest as _, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{BoostError, Result};

/// Length of every digest produced by this crate.
pub const HASH_LEN: usize = 32;

pub type Digest = [u8; HASH_LEN];

pub fn sha256(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// `SHA256(d_1 || ... || d_n)`; an empty sequence yields `SHA256("")`.
pub fn fold_digests<'a, I>(digests: I) -> Digest
where
    I: IntoIterator<Item = &'a Digest>,
{
    let mut hasher = Sha256::new();
    for d in digests {
        hasher.update(d);
    }
    hasher.finalize().into()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryHasher;

impl DirectoryHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash every regular file under `root`.
    pub fn hash(&self, root: &Path) -> Result<Digest> {
        let meta = fs::metadata(root).map_err(|e| BoostError::io(root, e))?;
        if !meta.is_dir() {
            return Err(BoostError::io(
                root,
                io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }

        let mut leaves = self.collect_leaves(root)?;
        leaves.sort_by(|a, b| a.0.cmp(&b.0));

        let digest = fold_digests(leaves.iter().map(|(_, leaf)| leaf));
        debug!(
            root = %root.display(),
            files = leaves.len(),
            digest = %hex::encode(digest),
            "directory hashed"
        );
        Ok(digest)
    }

    /// `SHA256(content)` of a single file.
    pub fn hash_file(&self, path: &Path) -> Result<Digest> {
        let mut file = File::open(path).map_err(|e| BoostError::io(path, e))?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher).map_err(|e| BoostError::io(path, e))?;
        Ok(hasher.finalize().into())
    }

    fn collect_leaves(&self, root: &Path) -> Result<Vec<(Vec<u8>, Digest)>> {
        let mut leaves = Vec::new();

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                BoostError::io(path, io::Error::from(e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| BoostError::InvalidParam(e.to_string()))?;
            let relative = relative_path_bytes(relative);

            let mut file = File::open(entry.path()).map_err(|e| BoostError::io(entry.path(), e))?;
            let mut hasher = Sha256::new();
            hasher.update(&relative);
            io::copy(&mut file, &mut hasher).map_err(|e| BoostError::io(entry.path(), e))?;

            leaves.push((relative, hasher.finalize().into()));
        }

        Ok(leaves)
    }
}

/// `/`-separated bytes of a relative path, independent of the host separator.
fn relative_path_bytes(relative: &Path) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, component) in relative.components().enumerate() {
        if i > 0 {
            out.push(b'/');
        }
        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStrExt;
            out.extend_from_slice(component.as_os_str().as_bytes());
        }
        #[cfg(not(unix))]
        {
            out.extend_from_slice(component.as_os_str().to_string_lossy().as_bytes());
        }
    }
    out
}
