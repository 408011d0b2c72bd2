//! The reaper is responsible for destroying sessions that have gone idle.
//! Unlike a per-session TTL scheduler, every session here shares one
//! uniform idle timeout, so a plain periodic full-table sweep is enough;
//! there is no need for a min-heap of per-session deadlines.

use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::session_table::SessionTable;

/// Run the reaper loop. Intended to be spawned on its own thread. Exits
/// promptly when `shutdown` fires instead of waiting out the remainder of
/// the current tick.
pub fn run(
    table: Arc<SessionTable>,
    idle_timeout: Duration,
    sweep_interval: Duration,
    shutdown: crossbeam_channel::Receiver<()>,
) {
    info!("reaper starting, idle_timeout={:?} sweep_interval={:?}", idle_timeout, sweep_interval);
    let tick = crossbeam_channel::tick(sweep_interval);
    loop {
        crossbeam_channel::select! {
            recv(tick) -> _ => {
                table.sweep(idle_timeout);
            }
            recv(shutdown) -> _ => {
                info!("reaper shutting down");
                return;
            }
        }
    }
}

/// The sweep cadence for a given idle timeout: at most a tenth of the
/// timeout, per the recommendation that sessions not linger more than 10%
/// past their deadline.
pub fn sweep_interval_for(idle_timeout: Duration) -> Duration {
    let tenth = idle_timeout / 10;
    if tenth.is_zero() {
        Duration::from_secs(1)
    } else {
        tenth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_interval_is_bounded() {
        let iv = sweep_interval_for(Duration::from_secs(600));
        assert!(iv <= Duration::from_secs(60));
        assert!(iv > Duration::from_secs(0));
    }

    #[test]
    fn sweep_interval_never_zero() {
        let iv = sweep_interval_for(Duration::from_secs(1));
        assert!(iv > Duration::from_secs(0));
    }
}
