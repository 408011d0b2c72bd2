use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;

use super::status::StatusCode;

/// A decoded request header. 4 bytes on the wire: session id, sequence,
/// command. The payload follows immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub session_id: u16,
    pub sequence: u8,
    pub command: u8,
}

pub const REQUEST_HEADER_LEN: usize = 4;
pub const REPLY_HEADER_LEN: usize = 5;

impl RequestHeader {
    /// Split a received datagram into its header and payload tail. A
    /// datagram shorter than the header is not a protocol error to be
    /// reported to a client, it is simply dropped by the caller.
    pub fn decode(buf: &[u8]) -> io::Result<(RequestHeader, &[u8])> {
        if buf.len() < REQUEST_HEADER_LEN {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "datagram shorter than header"));
        }
        let mut cursor = io::Cursor::new(buf);
        let session_id = cursor.read_u16::<LittleEndian>()?;
        let sequence = cursor.read_u8()?;
        let command = cursor.read_u8()?;
        Ok((RequestHeader { session_id, sequence, command }, &buf[REQUEST_HEADER_LEN..]))
    }

    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(REQUEST_HEADER_LEN + payload.len());
        out.write_u16::<LittleEndian>(self.session_id).unwrap();
        out.write_u8(self.sequence).unwrap();
        out.write_u8(self.command).unwrap();
        out.extend_from_slice(payload);
        out
    }
}

/// A reply header. 5 bytes on the wire: session id, sequence, command,
/// status. The payload follows immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub session_id: u16,
    pub sequence: u8,
    pub command: u8,
    pub status: StatusCode,
}

impl ReplyHeader {
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(REPLY_HEADER_LEN + payload.len());
        out.write_u16::<LittleEndian>(self.session_id).unwrap();
        out.write_u8(self.sequence).unwrap();
        out.write_u8(self.command).unwrap();
        out.write_u8(self.status.as_byte()).unwrap();
        out.extend_from_slice(payload);
        out
    }

    pub fn decode(buf: &[u8]) -> io::Result<(ReplyHeader, &[u8])> {
        if buf.len() < REPLY_HEADER_LEN {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "datagram shorter than header"));
        }
        let mut cursor = io::Cursor::new(buf);
        let session_id = cursor.read_u16::<LittleEndian>()?;
        let sequence = cursor.read_u8()?;
        let command = cursor.read_u8()?;
        let status_byte = cursor.read_u8()?;
        let status = StatusCode::from_byte(status_byte)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown status byte"))?;
        Ok((ReplyHeader { session_id, sequence, command, status }, &buf[REPLY_HEADER_LEN..]))
    }
}
