// src/watch/hash.rs

//! Content hashing for `use_hash = true` watch rules.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Compute the blake3 hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Last seen content hash per path.
///
/// Editors often touch a file without changing it (save-without-edit,
/// atomic rename); rules with `use_hash = true` use this to skip those
/// events. State is kept in memory for the life of a watch session.
#[derive(Debug, Default)]
pub struct ContentHashes {
    hashes: HashMap<PathBuf, String>,
}

impl ContentHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current hash of `path` and report whether it differs from
    /// the previously recorded one.
    ///
    /// A file seen for the first time counts as changed. A file that cannot
    /// be read (deleted, permission error) also counts as changed, and its
    /// stored hash is forgotten.
    pub fn changed(&mut self, fs: &dyn FileSystem, path: &Path) -> bool {
        match compute_file_hash(fs, path) {
            Ok(hash) => match self.hashes.insert(path.to_path_buf(), hash.clone()) {
                Some(old) if old == hash => {
                    debug!(?path, "content hash unchanged");
                    false
                }
                _ => true,
            },
            Err(err) => {
                debug!(?path, error = %err, "could not hash file; treating as changed");
                self.hashes.remove(path);
                true
            }
        }
    }

    /// Seed the store without reporting a change.
    pub fn prime(&mut self, fs: &dyn FileSystem, path: &Path) {
        if let Ok(hash) = compute_file_hash(fs, path) {
            self.hashes.insert(path.to_path_buf(), hash);
        }
    }
}
