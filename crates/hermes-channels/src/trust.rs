//! Trusted-path validation for document sends.
//!
//! Documents leave the machine, so the path is checked three ways: `..`
//! segments are rejected on the raw input before any filesystem access,
//! symlinks are resolved via canonicalization, and the resolved path must
//! sit under a trusted root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ChannelError, Result};

/// Built-in trusted roots: `/tmp`, `~/.hermes`, `~/Documents`.
pub fn default_trusted_roots() -> Vec<PathBuf> {
    let mut roots = vec![PathBuf::from("/tmp")];
    if let Ok(home) = std::env::var("HOME") {
        let home = PathBuf::from(home);
        roots.push(home.join(".hermes"));
        roots.push(home.join("Documents"));
    }
    roots
}

/// Validate `path` for sending. Returns the canonical path on success.
///
/// `extra_roots` come from config / `HERMES_TRUSTED_DOCUMENT_DIRS` and are
/// checked in addition to [`default_trusted_roots`].
pub fn ensure_trusted(path: &Path, extra_roots: &[PathBuf]) -> Result<PathBuf> {
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ChannelError::PathTraversal(path.display().to_string()));
    }

    let real = std::fs::canonicalize(path).map_err(|_| {
        ChannelError::UntrustedPath(format!("file not found: {}", path.display()))
    })?;
    if !real.is_file() {
        return Err(ChannelError::UntrustedPath(format!(
            "not a regular file: {}",
            real.display()
        )));
    }

    let trusted = default_trusted_roots()
        .into_iter()
        .chain(extra_roots.iter().cloned())
        // Roots themselves may be symlinks (e.g. /tmp on some systems).
        .filter_map(|root| std::fs::canonicalize(&root).ok().or(Some(root)));

    for root in trusted {
        if real.starts_with(&root) {
            return Ok(real);
        }
    }
    Err(ChannelError::UntrustedPath(path.display().to_string()))
}
