// Shared by every file under tests/, each of which is compiled into its
// own binary, so not everything here is used by every test.
#![allow(dead_code)]

use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::process::{Child, Command};
use std::{env, process, time};

use anyhow::Context;
use tempfile::TempDir;

pub fn tnfsd_bin() -> PathBuf {
    cargo_dir().join("tnfsd")
}

pub fn cargo_dir() -> PathBuf {
    env::var_os("CARGO_BIN_PATH")
        .map(PathBuf::from)
        .or_else(|| {
            env::current_exe().ok().map(|mut path| {
                path.pop();
                if path.ends_with("deps") {
                    path.pop();
                }
                path
            })
        })
        .unwrap_or_else(|| panic!("CARGO_BIN_PATH wasn't set. Cannot continue running test"))
}

fn free_udp_port() -> anyhow::Result<u16> {
    let sock = UdpSocket::bind("127.0.0.1:0").context("binding probe socket")?;
    Ok(sock.local_addr()?.port())
}

/// A running `tnfsd` subprocess rooted at a fresh temp directory. Killed
/// when dropped.
pub struct DaemonProc {
    proc: Child,
    tmp_dir: Option<TempDir>,
    pub root: PathBuf,
    pub port: u16,
}

impl DaemonProc {
    pub fn new() -> anyhow::Result<DaemonProc> {
        Self::with_idle_timeout(None)
    }

    pub fn with_idle_timeout(idle_timeout_secs: Option<u64>) -> anyhow::Result<DaemonProc> {
        let tmp_dir = tempfile::Builder::new()
            .prefix("tnfsd-test")
            .rand_bytes(20)
            .tempdir()
            .context("creating tmp dir")?;
        let root = tmp_dir.path().to_path_buf();
        let port = free_udp_port()?;

        let mut cmd = Command::new(tnfsd_bin());
        cmd.arg(&root).arg("--port").arg(port.to_string()).arg("-v");
        if let Some(secs) = idle_timeout_secs {
            cmd.arg("--idle-timeout-secs").arg(secs.to_string());
        }
        let proc = cmd.spawn().context("spawning tnfsd process")?;

        // the daemon binds eagerly at startup; give it a moment
        std::thread::sleep(time::Duration::from_millis(200));

        Ok(DaemonProc { proc, tmp_dir: Some(tmp_dir), root, port })
    }

    pub fn client(&self) -> anyhow::Result<Client> {
        Client::new(self.port)
    }
}

impl Drop for DaemonProc {
    fn drop(&mut self) {
        let _ = self.proc.kill();
        let _ = self.proc.wait();
        if env::var_os("TNFSD_LEAVE_TEST_DIRS").is_some() {
            if let Some(dir) = self.tmp_dir.take() {
                eprintln!("leaving test dir at {:?}", dir.into_path());
            }
        }
    }
}

/// A bare UDP client for talking to a running daemon, with retry to
/// tolerate the occasional dropped datagram in a loopback test.
pub struct Client {
    sock: UdpSocket,
    server_addr: SocketAddr,
}

impl Client {
    pub fn new(port: u16) -> anyhow::Result<Client> {
        let sock = UdpSocket::bind("127.0.0.1:0").context("binding client socket")?;
        sock.set_read_timeout(Some(time::Duration::from_millis(500)))?;
        let server_addr: SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        Ok(Client { sock, server_addr })
    }

    pub fn request(&self, datagram: &[u8]) -> anyhow::Result<Vec<u8>> {
        for attempt in 0..5 {
            self.sock.send_to(datagram, self.server_addr)?;
            let mut buf = [0u8; 4096];
            match self.sock.recv(&mut buf) {
                Ok(n) => return Ok(buf[..n].to_vec()),
                Err(e) if attempt < 4 => {
                    eprintln!("retrying after recv error: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
        unreachable!()
    }
}
