use std::net::UdpSocket;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{error, info, warn};

use crate::config::Config;
use crate::dispatcher;
use crate::fs::Confiner;
use crate::protocol::MAX_DATAGRAM_SIZE;
use crate::reaper;
use crate::session_table::SessionTable;
use crate::signals;

pub struct Server {
    socket: UdpSocket,
    confiner: Confiner,
    table: Arc<SessionTable>,
    idle_timeout: Duration,
    sweep_interval: Duration,
}

impl Server {
    pub fn new(
        root: &Path,
        port: u16,
        idle_timeout: Duration,
        sweep_interval: Option<Duration>,
        max_handles_per_session: usize,
    ) -> anyhow::Result<Server> {
        let confiner = Confiner::new(root).context("resolving root directory")?;
        let socket = UdpSocket::bind(("0.0.0.0", port)).context("binding udp socket")?;
        info!("listening on udp port {}", port);
        let sweep_interval = sweep_interval.unwrap_or_else(|| reaper::sweep_interval_for(idle_timeout));
        Ok(Server {
            socket,
            confiner,
            table: Arc::new(SessionTable::with_handle_capacity(max_handles_per_session)),
            idle_timeout,
            sweep_interval,
        })
    }

    /// Spawn the reaper and signal-handling threads, then run the
    /// single-threaded request/reply loop on the calling thread.
    pub fn serve(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::unbounded();

        let reaper_table = Arc::clone(&self.table);
        let idle_timeout = self.idle_timeout;
        let sweep_interval = self.sweep_interval;
        std::thread::spawn(move || {
            reaper::run(reaper_table, idle_timeout, sweep_interval, shutdown_rx);
        });

        signals::Handler::new(shutdown_tx).spawn().context("installing signal handler")?;

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (n, src) = match self.socket.recv_from(&mut buf) {
                Ok(v) => v,
                Err(e) => {
                    warn!("recv_from failed: {}", e);
                    continue;
                }
            };

            match dispatcher::handle_datagram(&self.table, &self.confiner, self.idle_timeout, &buf[..n], src) {
                Some(reply) => {
                    if let Err(e) = self.socket.send_to(&reply, src) {
                        error!("send_to {} failed: {}", src, e);
                    }
                }
                None => {
                    // malformed or unaddressable datagram, silently dropped
                }
            }
        }
    }
}

pub fn run(root: &Path, port: u16, config: Config) -> anyhow::Result<()> {
    let idle_timeout = Duration::from_secs(config.idle_timeout_secs.unwrap_or(crate::config::DEFAULT_IDLE_TIMEOUT_SECS));
    let sweep_interval = config.reaper_interval_secs.map(Duration::from_secs);
    let max_handles = config.max_handles_per_session.unwrap_or(crate::session::MAX_HANDLES_PER_SESSION);
    let server = Server::new(root, port, idle_timeout, sweep_interval, max_handles)?;
    server.serve()
}
