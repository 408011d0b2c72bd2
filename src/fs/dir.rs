use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::protocol::StatusCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    pub mtime: u64,
    pub is_dir: bool,
    pub is_hidden: bool,
    pub is_special: bool,
}

impl DirEntry {
    fn dot(name: &str) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            size: 0,
            mtime: 0,
            is_dir: true,
            is_hidden: false,
            is_special: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Size,
    Mtime,
}

/// Bits of the open-dir-extended entry-kind mask. An entry is kept only if
/// its kind bit is set, and, when it is hidden or special, only if the
/// corresponding bit is also set.
pub const KIND_DIR: u8 = 0x01;
pub const KIND_FILE: u8 = 0x02;
pub const KIND_HIDDEN: u8 = 0x04;
pub const KIND_SPECIAL: u8 = 0x08;
pub const KIND_ALL: u8 = KIND_DIR | KIND_FILE | KIND_HIDDEN | KIND_SPECIAL;

fn matches_kind_mask(entry: &DirEntry, mask: u8) -> bool {
    let kind_bit = if entry.is_dir { KIND_DIR } else { KIND_FILE };
    if mask & kind_bit == 0 {
        return false;
    }
    if entry.is_hidden && mask & KIND_HIDDEN == 0 {
        return false;
    }
    if entry.is_special && mask & KIND_SPECIAL == 0 {
        return false;
    }
    true
}

/// Materialize a legacy directory listing: synthetic `.` and `..` first,
/// then host entries in whatever order the host yields them. Frozen at
/// open time so a handle's enumeration is stable against concurrent
/// mutation.
pub fn list_legacy(path: &Path) -> Result<Vec<DirEntry>, StatusCode> {
    let mut entries = vec![DirEntry::dot("."), DirEntry::dot("..")];
    for child in read_entries(path)? {
        entries.push(child);
    }
    Ok(entries)
}

/// Materialize an extended directory listing: host entries, filtered by an
/// optional glob-style pattern (only `*` is special) and an entry-kind mask
/// (see `KIND_*`), sorted by the given key, and capped at `max_entries` if
/// given. No synthetic `.`/`..`.
pub fn list_extended(
    path: &Path,
    pattern: Option<&str>,
    kind_mask: u8,
    sort_key: SortKey,
    descending: bool,
    max_entries: Option<usize>,
) -> Result<Vec<DirEntry>, StatusCode> {
    let mut entries: Vec<DirEntry> = read_entries(path)?
        .into_iter()
        .filter(|e| pattern.map(|p| matches_pattern(&e.name, p)).unwrap_or(true))
        .filter(|e| matches_kind_mask(e, kind_mask))
        .collect();

    entries.sort_by(|a, b| {
        let ord = match sort_key {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Size => a.size.cmp(&b.size),
            SortKey::Mtime => a.mtime.cmp(&b.mtime),
        };
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });

    if let Some(max) = max_entries {
        entries.truncate(max);
    }

    Ok(entries)
}

fn read_entries(path: &Path) -> Result<Vec<DirEntry>, StatusCode> {
    let read_dir = std::fs::read_dir(path).map_err(StatusCode::from)?;
    let mut out = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(StatusCode::from)?;
        let metadata = entry.metadata().map_err(StatusCode::from)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        out.push(DirEntry {
            is_hidden: name.starts_with('.'),
            name,
            size: metadata.len(),
            mtime,
            is_dir: metadata.is_dir(),
            is_special: false,
        });
    }
    Ok(out)
}

/// Minimal glob matching: `*` matches any run of characters, everything
/// else is literal. Sufficient for the filter patterns this protocol needs
/// without pulling in a globbing crate for one operator.
fn matches_pattern(name: &str, pattern: &str) -> bool {
    fn do_match(name: &[u8], pattern: &[u8]) -> bool {
        match (name.first(), pattern.first()) {
            (_, Some(b'*')) => {
                do_match(name, &pattern[1..])
                    || (!name.is_empty() && do_match(&name[1..], pattern))
            }
            (Some(n), Some(p)) if n == p => do_match(&name[1..], &pattern[1..]),
            (None, None) => true,
            _ => false,
        }
    }
    do_match(name.as_bytes(), pattern.as_bytes())
}

pub fn mkdir(path: &Path) -> Result<(), StatusCode> {
    std::fs::create_dir(path).map_err(StatusCode::from)
}

pub fn rmdir(path: &Path) -> Result<(), StatusCode> {
    std::fs::remove_dir(path).map_err(StatusCode::from)
}
