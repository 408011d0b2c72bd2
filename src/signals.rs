use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use log::info;
use signal_hook::consts::TERM_SIGNALS;
use signal_hook::iterator::Signals;
use signal_hook::flag;

/// Listens for SIGTERM/SIGINT on a background thread and notifies the
/// reaper so it can stop promptly, then exits the process. There's no
/// socket file to clean up for a UDP listener, unlike a unix-domain daemon.
pub struct Handler {
    reaper_shutdown: crossbeam_channel::Sender<()>,
}

impl Handler {
    pub fn new(reaper_shutdown: crossbeam_channel::Sender<()>) -> Handler {
        Handler { reaper_shutdown }
    }

    pub fn spawn(self) -> anyhow::Result<()> {
        // Arm a conditional shutdown so a second term signal forces an
        // immediate exit if graceful shutdown gets stuck.
        let term_now = Arc::new(AtomicBool::new(false));
        for sig in TERM_SIGNALS {
            flag::register_conditional_shutdown(*sig, 1, Arc::clone(&term_now))?;
            flag::register(*sig, Arc::clone(&term_now))?;
        }

        let mut signals = Signals::new(TERM_SIGNALS).context("creating signal iterator")?;

        thread::spawn(move || {
            for _signal in &mut signals {
                info!("received shutdown signal, notifying reaper");
                let _ = self.reaper_shutdown.send(());
                info!("exiting");
                std::process::exit(0);
            }
        });

        Ok(())
    }
}
