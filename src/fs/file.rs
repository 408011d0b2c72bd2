use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::protocol::{StatusCode, MAX_BLOCK_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    pub write: bool,
    pub create: bool,
    pub truncate: bool,
    pub append: bool,
}

/// Legacy and current open requests differ only in how flag bits are laid
/// out on the wire (they arrive on distinct opcodes); both end up at the
/// same `OpenFlags`.
pub fn decode_open_flags(raw: u16, legacy: bool) -> OpenFlags {
    if legacy {
        OpenFlags {
            write: raw & 0x0002 != 0 || raw & 0x0003 == 0x0003,
            create: raw & 0x0010 != 0,
            truncate: raw & 0x0020 != 0,
            append: raw & 0x0040 != 0,
        }
    } else {
        OpenFlags {
            write: raw & 0x0001 != 0,
            create: raw & 0x0100 != 0,
            truncate: raw & 0x0200 != 0,
            append: raw & 0x0400 != 0,
        }
    }
}

pub fn open(path: &Path, flags: OpenFlags) -> Result<File, StatusCode> {
    OpenOptions::new()
        .read(true)
        .write(flags.write)
        .create(flags.create)
        .truncate(flags.truncate)
        .append(flags.append)
        .open(path)
        .map_err(StatusCode::from)
}

/// Read up to `requested` bytes, clamped to the protocol's maximum block
/// size. Returns the bytes read and whether end-of-file was hit.
pub fn read_block(file: &mut File, requested: usize) -> Result<(Vec<u8>, bool), StatusCode> {
    let want = requested.min(MAX_BLOCK_SIZE);
    let mut buf = vec![0u8; want];
    let mut total = 0;
    loop {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                if total == want {
                    break;
                }
            }
            Err(e) => return Err(StatusCode::from(e)),
        }
    }
    buf.truncate(total);
    let eof = total == 0 && want > 0;
    Ok((buf, eof))
}

pub fn write_block(file: &mut File, data: &[u8]) -> Result<usize, StatusCode> {
    file.write(data).map_err(StatusCode::from)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

pub fn seek(file: &mut File, offset: i64, whence: Whence) -> Result<u64, StatusCode> {
    let pos = match whence {
        Whence::Start => SeekFrom::Start(offset.max(0) as u64),
        Whence::Current => SeekFrom::Current(offset),
        Whence::End => SeekFrom::End(offset),
    };
    file.seek(pos).map_err(StatusCode::from)
}

pub struct StatFields {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
}

pub fn stat(path: &Path) -> Result<StatFields, StatusCode> {
    let meta = std::fs::metadata(path).map_err(StatusCode::from)?;
    let to_secs = |t: std::io::Result<std::time::SystemTime>| {
        t.ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0)
    };
    #[cfg(unix)]
    let (mode, uid, gid) = {
        use std::os::unix::fs::MetadataExt;
        (meta.mode(), meta.uid(), meta.gid())
    };
    #[cfg(not(unix))]
    let (mode, uid, gid) = (if meta.is_dir() { 0o040755 } else { 0o100644 }, 0, 0);

    Ok(StatFields {
        mode,
        uid,
        gid,
        size: meta.len(),
        atime: to_secs(meta.accessed()),
        mtime: to_secs(meta.modified()),
        ctime: to_secs(meta.created()),
    })
}

pub fn unlink(path: &Path) -> Result<(), StatusCode> {
    std::fs::remove_file(path).map_err(StatusCode::from)
}

pub fn rename(from: &Path, to: &Path) -> Result<(), StatusCode> {
    std::fs::rename(from, to).map_err(StatusCode::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn short_read_at_eof_reports_actual_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, &[1u8; 100]).unwrap();
        let mut f = open(&path, OpenFlags { write: false, create: false, truncate: false, append: false }).unwrap();
        seek(&mut f, 95, Whence::Start).unwrap();
        let (data, eof) = read_block(&mut f, 100).unwrap();
        assert_eq!(data.len(), 5);
        assert!(!eof);
        let (data2, eof2) = read_block(&mut f, 100).unwrap();
        assert_eq!(data2.len(), 0);
        assert!(eof2);
    }

    #[test]
    fn write_then_rename() {
        let dir = tempdir().unwrap();
        let a_dir = dir.path().join("a");
        let b_dir = dir.path().join("b");
        std::fs::create_dir(&a_dir).unwrap();
        std::fs::create_dir(&b_dir).unwrap();
        let x = a_dir.join("x");
        std::fs::write(&x, b"hi").unwrap();
        rename(&x, &b_dir.join("x")).unwrap();
        assert!(!x.exists());
        assert!(b_dir.join("x").exists());
    }

    #[test]
    fn read_block_clamps_to_max() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big");
        std::fs::write(&path, vec![7u8; MAX_BLOCK_SIZE * 2]).unwrap();
        let mut f = open(&path, OpenFlags { write: false, create: false, truncate: false, append: false }).unwrap();
        let (data, eof) = read_block(&mut f, MAX_BLOCK_SIZE * 2).unwrap();
        assert_eq!(data.len(), MAX_BLOCK_SIZE);
        assert!(!eof);
    }
}
