use std::path::{Path, PathBuf};

use crate::protocol::StatusCode;

/// Resolves a client-supplied path against a session root, refusing to
/// leave the root either textually (via `..` segments) or, after the host
/// resolves symlinks, physically.
pub struct Confiner {
    canonical_root: PathBuf,
}

impl Confiner {
    pub fn new(root: &Path) -> std::io::Result<Confiner> {
        Ok(Confiner { canonical_root: root.canonicalize()? })
    }

    pub fn root(&self) -> &Path {
        &self.canonical_root
    }

    /// Normalize `client_path` textually, join it onto the root, then
    /// re-check the realpath after symlink resolution.
    pub fn confine(&self, client_path: &str) -> Result<PathBuf, StatusCode> {
        if client_path.as_bytes().contains(&0) {
            return Err(StatusCode::InvalidArgument);
        }

        let mut stack: Vec<&str> = Vec::new();
        for seg in client_path.split('/') {
            if seg.is_empty() || seg == "." {
                continue;
            }
            if seg == ".." {
                if stack.pop().is_none() {
                    return Err(StatusCode::AccessDenied);
                }
            } else {
                stack.push(seg);
            }
        }

        let candidate = stack.iter().fold(self.canonical_root.clone(), |acc, s| acc.join(s));
        self.recheck_realpath(candidate)
    }

    /// Walk up from `candidate` to the longest existing ancestor, canonicalize
    /// it (resolving any symlinks along the way), and re-append the
    /// non-existing tail. This lets confinement work for paths that don't
    /// exist yet (e.g. a file about to be created) while still catching a
    /// symlinked existing ancestor that escapes the root.
    fn recheck_realpath(&self, candidate: PathBuf) -> Result<PathBuf, StatusCode> {
        let mut existing = candidate.clone();
        let mut tail: Vec<std::ffi::OsString> = Vec::new();
        loop {
            if existing.exists() {
                break;
            }
            match existing.file_name().map(|n| n.to_os_string()) {
                Some(name) => {
                    tail.push(name);
                    existing.pop();
                }
                None => break,
            }
        }

        let canonical_existing = existing
            .canonicalize()
            .map_err(|_| StatusCode::NoSuchFileOrDirectory)?;
        if !canonical_existing.starts_with(&self.canonical_root) {
            return Err(StatusCode::AccessDenied);
        }

        tail.reverse();
        let mut result = canonical_existing;
        for part in tail {
            result.push(part);
        }
        Ok(result)
    }
}
