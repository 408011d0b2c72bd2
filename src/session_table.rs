use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use log::info;

use crate::protocol::StatusCode;
use crate::session::Session;

/// Hard cap on concurrently mounted sessions.
pub const MAX_SESSIONS: usize = 256;

struct Inner {
    sessions: HashMap<u16, Session>,
    next_id: u16,
}

/// The process-wide table of live sessions. A single `Mutex` guards the
/// whole map; the critical section is always a quick lookup or mutation,
/// never a filesystem call, so contention between the event loop and the
/// reaper thread stays negligible.
pub struct SessionTable {
    inner: Mutex<Inner>,
    max_handles_per_session: usize,
}

impl SessionTable {
    pub fn new() -> SessionTable {
        SessionTable::with_handle_capacity(crate::session::MAX_HANDLES_PER_SESSION)
    }

    pub fn with_handle_capacity(max_handles_per_session: usize) -> SessionTable {
        SessionTable {
            inner: Mutex::new(Inner { sessions: HashMap::new(), next_id: 1 }),
            max_handles_per_session,
        }
    }

    /// Create a new session and return its id. Ids are handed out from a
    /// rotating counter rather than lowest-free, so a stale client that
    /// remembers an old id is unlikely to collide with a freshly reissued
    /// one.
    pub fn allocate(&self, client_addr: SocketAddr, protocol_version: u16) -> Result<u16, StatusCode> {
        let mut inner = self.inner.lock().unwrap();
        if inner.sessions.len() >= MAX_SESSIONS {
            return Err(StatusCode::OutOfResources);
        }
        for _ in 0..u16::MAX {
            let candidate = inner.next_id;
            inner.next_id = inner.next_id.wrapping_add(1);
            if inner.next_id == 0 {
                inner.next_id = 1;
            }
            if candidate != 0 && !inner.sessions.contains_key(&candidate) {
                let session = Session::new(candidate, client_addr, protocol_version, self.max_handles_per_session);
                inner.sessions.insert(candidate, session);
                return Ok(candidate);
            }
        }
        Err(StatusCode::OutOfResources)
    }

    /// Run `f` against the session with the given id, after verifying it
    /// exists, is not expired, and was mounted from `src`.
    pub fn with_session<R>(
        &self,
        id: u16,
        src: SocketAddr,
        idle_timeout: Duration,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, StatusCode> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner.sessions.get_mut(&id).ok_or(StatusCode::InvalidSession)?;
        if session.client_addr != src || session.is_expired(idle_timeout) {
            return Err(StatusCode::InvalidSession);
        }
        session.touch();
        Ok(f(session))
    }

    /// Destroy a session, closing every handle it owns. Handles close
    /// themselves (their `Drop` impls release the host fd/dir iterator);
    /// removing the `Session` from the map is what drops them.
    pub fn destroy(&self, id: u16) {
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.remove(&id);
    }

    /// Destroy every session idle for at least `idle_timeout`. Returns the
    /// number reaped.
    pub fn sweep(&self, idle_timeout: Duration) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let expired: Vec<u16> = inner
            .sessions
            .iter()
            .filter(|(_, s)| s.is_expired(idle_timeout))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            inner.sessions.remove(id);
        }
        if !expired.is_empty() {
            info!("reaped {} idle session(s)", expired.len());
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }
}

impl Default for SessionTable {
    fn default() -> SessionTable {
        SessionTable::new()
    }
}
