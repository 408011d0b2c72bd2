use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use crate::fs::DirEntry;
use crate::protocol::StatusCode;

/// Per-session handle tables hold at most this many open files or
/// directories at once.
pub const MAX_HANDLES_PER_SESSION: usize = 16;

pub struct FileHandle {
    pub file: File,
    pub path: PathBuf,
}

pub struct DirHandle {
    pub path: PathBuf,
    pub entries: Vec<DirEntry>,
    pub position: usize,
}

/// A fixed-capacity table of handle slots with free-slot reuse, shared in
/// shape between the file and directory handle tables.
pub struct HandleTable<T> {
    slots: Vec<Option<T>>,
}

impl<T> HandleTable<T> {
    pub fn new(capacity: usize) -> HandleTable<T> {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        HandleTable { slots }
    }

    pub fn alloc(&mut self, value: T) -> Result<u8, StatusCode> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(value);
                return Ok(i as u8);
            }
        }
        Err(StatusCode::OutOfResources)
    }

    pub fn get(&self, handle: u8) -> Result<&T, StatusCode> {
        self.slots
            .get(handle as usize)
            .and_then(|s| s.as_ref())
            .ok_or(StatusCode::InvalidHandle)
    }

    pub fn get_mut(&mut self, handle: u8) -> Result<&mut T, StatusCode> {
        self.slots
            .get_mut(handle as usize)
            .and_then(|s| s.as_mut())
            .ok_or(StatusCode::InvalidHandle)
    }

    pub fn close(&mut self, handle: u8) -> Result<T, StatusCode> {
        self.slots
            .get_mut(handle as usize)
            .and_then(|s| s.take())
            .ok_or(StatusCode::InvalidHandle)
    }

    /// Drain every occupied slot, for session teardown.
    pub fn drain(&mut self) -> Vec<T> {
        self.slots.iter_mut().filter_map(|s| s.take()).collect()
    }
}

pub struct Session {
    pub id: u16,
    pub client_addr: SocketAddr,
    pub protocol_version: u16,
    pub last_activity: Instant,
    pub files: HandleTable<FileHandle>,
    pub dirs: HandleTable<DirHandle>,
    /// The most recent (sequence, reply bytes) pair, used to answer
    /// retransmitted requests without re-executing the handler.
    pub last_reply: Option<(u8, Vec<u8>)>,
}

impl Session {
    pub fn new(id: u16, client_addr: SocketAddr, protocol_version: u16, max_handles: usize) -> Session {
        Session {
            id,
            client_addr,
            protocol_version,
            last_activity: Instant::now(),
            files: HandleTable::new(max_handles),
            dirs: HandleTable::new(max_handles),
            last_reply: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_expired(&self, idle_timeout: std::time::Duration) -> bool {
        self.last_activity.elapsed() >= idle_timeout
    }

    /// If `sequence` matches the cached reply's sequence, return the cached
    /// bytes instead of re-running the handler.
    pub fn cached_reply(&self, sequence: u8) -> Option<&[u8]> {
        match &self.last_reply {
            Some((seq, bytes)) if *seq == sequence => Some(bytes.as_slice()),
            _ => None,
        }
    }

    pub fn cache_reply(&mut self, sequence: u8, bytes: Vec<u8>) {
        self.last_reply = Some((sequence, bytes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_close_frees_slot() {
        let mut table: HandleTable<u32> = HandleTable::new(2);
        let h = table.alloc(42).unwrap();
        assert_eq!(*table.get(h).unwrap(), 42);
        table.close(h).unwrap();
        assert_eq!(table.get(h), Err(StatusCode::InvalidHandle));
        // slot is reusable
        let h2 = table.alloc(7).unwrap();
        assert_eq!(h2, h);
    }

    #[test]
    fn table_full_is_out_of_resources() {
        let mut table: HandleTable<u32> = HandleTable::new(1);
        table.alloc(1).unwrap();
        assert_eq!(table.alloc(2), Err(StatusCode::OutOfResources));
    }

    #[test]
    fn replay_cache_matches_only_same_sequence() {
        let mut session = Session::new(1, "127.0.0.1:9999".parse().unwrap(), 1, MAX_HANDLES_PER_SESSION);
        session.cache_reply(5, vec![1, 2, 3]);
        assert_eq!(session.cached_reply(5), Some(&[1u8, 2, 3][..]));
        assert_eq!(session.cached_reply(6), None);
    }
}
