use std::net::SocketAddr;
use std::time::Duration;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::fs::dir::{self, SortKey};
use crate::fs::file::{self, Whence};
use crate::fs::Confiner;
use crate::protocol::{self, opcode, Command, CommandClass, ReplyHeader, RequestHeader, StatusCode};
use crate::session::{DirHandle, FileHandle, Session};
use crate::session_table::SessionTable;
use crate::wire::{read_cstr, write_cstr};

/// Handle one inbound datagram end to end: decode, classify, dispatch,
/// encode. Returns `None` when the datagram should be silently dropped
/// (too short to contain a header, or an unrecognized command arriving for
/// a session we can say nothing useful about).
pub fn handle_datagram(
    table: &SessionTable,
    confiner: &Confiner,
    idle_timeout: Duration,
    buf: &[u8],
    src: SocketAddr,
) -> Option<Vec<u8>> {
    let (header, payload) = match RequestHeader::decode(buf) {
        Ok(v) => v,
        Err(e) => {
            debug!("dropping malformed datagram from {}: {}", src, e);
            return None;
        }
    };

    let command = match opcode::classify(header.command) {
        Some(c) => c,
        None => {
            return Some(reply(&header, StatusCode::OperationUnsupported, &[]));
        }
    };

    match command.class() {
        CommandClass::SessionOpening => Some(handle_mount(table, &header, payload, src)),
        CommandClass::SessionClosing => Some(handle_unmount(table, &header, src, idle_timeout)),
        CommandClass::SessionBearing => {
            Some(handle_session_bearing(table, confiner, &header, command, payload, src, idle_timeout))
        }
    }
}

fn reply(header: &RequestHeader, status: StatusCode, payload: &[u8]) -> Vec<u8> {
    ReplyHeader {
        session_id: header.session_id,
        sequence: header.sequence,
        command: header.command,
        status,
    }
    .encode(payload)
}

fn handle_mount(table: &SessionTable, header: &RequestHeader, payload: &[u8], src: SocketAddr) -> Vec<u8> {
    if header.session_id != 0 {
        return reply(header, StatusCode::InvalidArgument, &[]);
    }
    let req = match protocol::mount::MountRequest::decode(payload) {
        Ok(r) => r,
        Err(_) => return reply(header, StatusCode::InvalidArgument, &[]),
    };
    match table.allocate(src, req.version) {
        Ok(session_id) => {
            let mut h = *header;
            h.session_id = session_id;
            reply(&h, StatusCode::Success, &protocol::mount::encode_mount_reply_payload())
        }
        Err(status) => reply(header, status, &[]),
    }
}

fn handle_unmount(table: &SessionTable, header: &RequestHeader, src: SocketAddr, idle_timeout: Duration) -> Vec<u8> {
    let result = table.with_session(header.session_id, src, idle_timeout, |_| ());
    match result {
        Ok(()) => {
            let bytes = reply(header, StatusCode::Success, &[]);
            table.destroy(header.session_id);
            bytes
        }
        Err(status) => reply(header, status, &[]),
    }
}

fn handle_session_bearing(
    table: &SessionTable,
    confiner: &Confiner,
    header: &RequestHeader,
    command: Command,
    payload: &[u8],
    src: SocketAddr,
    idle_timeout: Duration,
) -> Vec<u8> {
    let result = table.with_session(header.session_id, src, idle_timeout, |session| {
        if let Some(cached) = session.cached_reply(header.sequence) {
            return cached.to_vec();
        }
        let (status, reply_payload) = run_handler(session, confiner, command, payload);
        let bytes = reply(header, status, &reply_payload);
        session.cache_reply(header.sequence, bytes.clone());
        bytes
    });
    match result {
        Ok(bytes) => bytes,
        Err(status) => reply(header, status, &[]),
    }
}

fn run_handler(session: &mut Session, confiner: &Confiner, command: Command, payload: &[u8]) -> (StatusCode, Vec<u8>) {
    let outcome = match command {
        Command::OpenDir => open_dir(session, confiner, payload),
        Command::ReadDir => read_dir(session, payload),
        Command::CloseDir => close_dir(session, payload),
        Command::MkDir => mkdir(confiner, payload),
        Command::RmDir => rmdir(confiner, payload),
        Command::TellDir => tell_dir(session, payload),
        Command::SeekDir => seek_dir(session, payload),
        Command::OpenDirX => open_dir_x(session, confiner, payload),
        Command::ReadDirX => read_dir_x(session, payload),
        Command::Open => open_file(session, confiner, payload, false),
        Command::OpenLegacy => open_file(session, confiner, payload, true),
        Command::Read => return read_file(session, payload),
        Command::Write => write_file(session, payload),
        Command::Close => close_file(session, payload),
        Command::Stat => stat(confiner, payload),
        Command::Lseek => lseek(session, payload),
        Command::Unlink => unlink(confiner, payload),
        Command::Chmod => Err(StatusCode::OperationUnsupported),
        Command::Rename => rename(confiner, payload),
        Command::Mount | Command::Unmount => unreachable!("handled before run_handler"),
    };
    match outcome {
        Ok(bytes) => (StatusCode::Success, bytes),
        Err(status) => (status, Vec::new()),
    }
}

fn path_arg(payload: &[u8], offset: &mut usize) -> Result<String, StatusCode> {
    read_cstr(payload, offset).ok_or(StatusCode::InvalidArgument)
}

fn handle_byte(payload: &[u8], offset: usize) -> Result<u8, StatusCode> {
    payload.get(offset).copied().ok_or(StatusCode::InvalidArgument)
}

fn open_dir(session: &mut Session, confiner: &Confiner, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let mut offset = 0;
    let path = path_arg(payload, &mut offset)?;
    let confined = confiner.confine(&path)?;
    let entries = dir::list_legacy(&confined)?;
    let handle = session.dirs.alloc(DirHandle { path: confined, entries, position: 0 })?;
    Ok(vec![handle])
}

fn open_dir_x(session: &mut Session, confiner: &Confiner, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let mut offset = 0;
    let path = path_arg(payload, &mut offset)?;
    let pattern = path_arg(payload, &mut offset)?;
    let kind_mask = handle_byte(payload, offset)?;
    offset += 1;
    let sort_byte = handle_byte(payload, offset)?;
    offset += 1;
    let descending = handle_byte(payload, offset)? != 0;
    offset += 1;
    if payload.len() < offset + 2 {
        return Err(StatusCode::InvalidArgument);
    }
    let max_entries = (&payload[offset..offset + 2]).read_u16::<LittleEndian>().unwrap();

    let sort_key = match sort_byte {
        0 => SortKey::Name,
        1 => SortKey::Size,
        2 => SortKey::Mtime,
        _ => return Err(StatusCode::InvalidArgument),
    };
    let pattern_opt = if pattern.is_empty() { None } else { Some(pattern.as_str()) };
    let max = if max_entries == 0 { None } else { Some(max_entries as usize) };

    let confined = confiner.confine(&path)?;
    let entries = dir::list_extended(&confined, pattern_opt, kind_mask, sort_key, descending, max)?;
    let handle = session.dirs.alloc(DirHandle { path: confined, entries, position: 0 })?;
    Ok(vec![handle])
}

fn read_dir(session: &mut Session, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let handle = handle_byte(payload, 0)?;
    let dh = session.dirs.get_mut(handle)?;
    if dh.position >= dh.entries.len() {
        return Err(StatusCode::EndOfFile);
    }
    let entry = &dh.entries[dh.position];
    dh.position += 1;
    let mut out = Vec::new();
    write_cstr(&mut out, &entry.name);
    Ok(out)
}

fn read_dir_x(session: &mut Session, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let handle = handle_byte(payload, 0)?;
    if payload.len() < 3 {
        return Err(StatusCode::InvalidArgument);
    }
    let requested = (&payload[1..3]).read_u16::<LittleEndian>().unwrap() as usize;
    let dh = session.dirs.get_mut(handle)?;
    if dh.position >= dh.entries.len() {
        return Err(StatusCode::EndOfFile);
    }
    let end = (dh.position + requested).min(dh.entries.len());
    let batch = &dh.entries[dh.position..end];
    let mut out = Vec::new();
    out.write_u16::<LittleEndian>(batch.len() as u16).unwrap();
    for entry in batch {
        write_cstr(&mut out, &entry.name);
        out.write_u64::<LittleEndian>(entry.size).unwrap();
        out.write_u64::<LittleEndian>(entry.mtime).unwrap();
        let mut flags = 0u8;
        if entry.is_dir {
            flags |= 0x01;
        }
        if entry.is_hidden {
            flags |= 0x02;
        }
        if entry.is_special {
            flags |= 0x04;
        }
        out.write_u8(flags).unwrap();
    }
    dh.position = end;
    Ok(out)
}

fn close_dir(session: &mut Session, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let handle = handle_byte(payload, 0)?;
    session.dirs.close(handle)?;
    Ok(Vec::new())
}

fn tell_dir(session: &mut Session, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let handle = handle_byte(payload, 0)?;
    let dh = session.dirs.get(handle)?;
    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(dh.position as u32).unwrap();
    Ok(out)
}

fn seek_dir(session: &mut Session, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let handle = handle_byte(payload, 0)?;
    if payload.len() < 5 {
        return Err(StatusCode::InvalidArgument);
    }
    let wanted = (&payload[1..5]).read_u32::<LittleEndian>().unwrap() as usize;
    let dh = session.dirs.get_mut(handle)?;
    dh.position = wanted.min(dh.entries.len());
    Ok(Vec::new())
}

fn mkdir(confiner: &Confiner, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let mut offset = 0;
    let path = path_arg(payload, &mut offset)?;
    let confined = confiner.confine(&path)?;
    dir::mkdir(&confined)?;
    Ok(Vec::new())
}

fn rmdir(confiner: &Confiner, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let mut offset = 0;
    let path = path_arg(payload, &mut offset)?;
    let confined = confiner.confine(&path)?;
    dir::rmdir(&confined)?;
    Ok(Vec::new())
}

fn open_file(session: &mut Session, confiner: &Confiner, payload: &[u8], legacy: bool) -> Result<Vec<u8>, StatusCode> {
    let mut offset = 0;
    let path = path_arg(payload, &mut offset)?;
    if payload.len() < offset + 2 {
        return Err(StatusCode::InvalidArgument);
    }
    let raw_flags = (&payload[offset..offset + 2]).read_u16::<LittleEndian>().unwrap();
    let flags = file::decode_open_flags(raw_flags, legacy);

    let confined = confiner.confine(&path)?;
    let handle_file = file::open(&confined, flags)?;
    let handle = session.files.alloc(FileHandle { file: handle_file, path: confined })?;
    Ok(vec![handle])
}

/// Unlike every other handler, end-of-file is not a payload-less error: the
/// reply still carries the count-prefixed (zero-length) block, so this
/// returns the status and payload directly instead of going through the
/// generic `Result<Vec<u8>, StatusCode>` -> `(Success, bytes)`/`(status, [])`
/// mapping in `run_handler`.
fn read_file(session: &mut Session, payload: &[u8]) -> (StatusCode, Vec<u8>) {
    let handle = match handle_byte(payload, 0) {
        Ok(h) => h,
        Err(status) => return (status, Vec::new()),
    };
    if payload.len() < 3 {
        return (StatusCode::InvalidArgument, Vec::new());
    }
    let requested = (&payload[1..3]).read_u16::<LittleEndian>().unwrap() as usize;
    let fh = match session.files.get_mut(handle) {
        Ok(fh) => fh,
        Err(status) => return (status, Vec::new()),
    };
    let (data, eof) = match file::read_block(&mut fh.file, requested) {
        Ok(v) => v,
        Err(status) => return (status, Vec::new()),
    };
    let mut out = Vec::new();
    out.write_u16::<LittleEndian>(data.len() as u16).unwrap();
    out.extend_from_slice(&data);
    if eof {
        (StatusCode::EndOfFile, out)
    } else {
        (StatusCode::Success, out)
    }
}

fn write_file(session: &mut Session, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let handle = handle_byte(payload, 0)?;
    if payload.len() < 3 {
        return Err(StatusCode::InvalidArgument);
    }
    let count = (&payload[1..3]).read_u16::<LittleEndian>().unwrap() as usize;
    let data = payload.get(3..3 + count).ok_or(StatusCode::InvalidArgument)?;
    let fh = session.files.get_mut(handle)?;
    let written = file::write_block(&mut fh.file, data)?;
    let mut out = Vec::new();
    out.write_u16::<LittleEndian>(written as u16).unwrap();
    Ok(out)
}

fn close_file(session: &mut Session, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let handle = handle_byte(payload, 0)?;
    session.files.close(handle)?;
    Ok(Vec::new())
}

fn stat(confiner: &Confiner, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let mut offset = 0;
    let path = path_arg(payload, &mut offset)?;
    let confined = confiner.confine(&path)?;
    let fields = file::stat(&confined)?;
    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(fields.mode).unwrap();
    out.write_u32::<LittleEndian>(fields.uid).unwrap();
    out.write_u32::<LittleEndian>(fields.gid).unwrap();
    out.write_u64::<LittleEndian>(fields.size).unwrap();
    out.write_u64::<LittleEndian>(fields.atime).unwrap();
    out.write_u64::<LittleEndian>(fields.mtime).unwrap();
    out.write_u64::<LittleEndian>(fields.ctime).unwrap();
    Ok(out)
}

fn lseek(session: &mut Session, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let handle = handle_byte(payload, 0)?;
    let whence_byte = handle_byte(payload, 1)?;
    if payload.len() < 10 {
        return Err(StatusCode::InvalidArgument);
    }
    let offset_val = (&payload[2..10]).read_i64::<LittleEndian>().unwrap();
    let whence = match whence_byte {
        0 => Whence::Start,
        1 => Whence::Current,
        2 => Whence::End,
        _ => return Err(StatusCode::InvalidArgument),
    };
    let fh = session.files.get_mut(handle)?;
    let new_pos = file::seek(&mut fh.file, offset_val, whence)?;
    let mut out = Vec::new();
    out.write_u64::<LittleEndian>(new_pos).unwrap();
    Ok(out)
}

fn unlink(confiner: &Confiner, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let mut offset = 0;
    let path = path_arg(payload, &mut offset)?;
    let confined = confiner.confine(&path)?;
    file::unlink(&confined)?;
    Ok(Vec::new())
}

fn rename(confiner: &Confiner, payload: &[u8]) -> Result<Vec<u8>, StatusCode> {
    let mut offset = 0;
    let from = path_arg(payload, &mut offset)?;
    let to = path_arg(payload, &mut offset)?;
    let confined_from = confiner.confine(&from)?;
    let confined_to = confiner.confine(&to)?;
    file::rename(&confined_from, &confined_to)?;
    Ok(Vec::new())
}
