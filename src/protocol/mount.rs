use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;

use crate::wire::read_cstr;

/// The mount request payload: protocol version, then three NUL-terminated
/// strings (mount path, user, password). Only the mount path is used; user
/// and password are accepted and ignored since authentication is out of
/// scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub version: u16,
    pub mount_path: String,
}

impl MountRequest {
    pub fn decode(payload: &[u8]) -> io::Result<MountRequest> {
        if payload.len() < 2 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "mount payload too short"));
        }
        let mut cursor = io::Cursor::new(&payload[0..2]);
        let version = cursor.read_u16::<LittleEndian>()?;
        let mut offset = 2usize;
        let mount_path = read_cstr(payload, &mut offset)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing mount path"))?;
        // user and password strings follow but are not consulted.
        Ok(MountRequest { version, mount_path })
    }
}

/// The server's negotiated protocol version, echoed back on mount.
pub const NEGOTIATED_VERSION: u16 = 0x0102;

/// A conservative suggested minimum retry interval, in milliseconds.
pub const MIN_RETRY_MS: u16 = 100;

pub fn encode_mount_reply_payload() -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    out.write_u16::<LittleEndian>(NEGOTIATED_VERSION).unwrap();
    out.write_u16::<LittleEndian>(MIN_RETRY_MS).unwrap();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mount_path() {
        let mut payload = vec![0x01, 0x00];
        payload.extend_from_slice(b"/\0user\0pass\0");
        let req = MountRequest::decode(&payload).unwrap();
        assert_eq!(req.version, 1);
        assert_eq!(req.mount_path, "/");
    }

    #[test]
    fn rejects_missing_terminator() {
        let payload = vec![0x01, 0x00, b'/'];
        assert!(MountRequest::decode(&payload).is_err());
    }
}
