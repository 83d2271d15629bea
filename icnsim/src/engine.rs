//! The event loop: feed a time-ordered event stream through a strategy.

use log::{debug, info};

use crate::controller::NetworkController;
use crate::strategy::Strategy;
use crate::types::Event;
use crate::SimError;

/// Processes `events` in order and returns how many were handled. Stops at
/// the first strategy error.
pub fn run(
    ctrl: &mut NetworkController,
    strategy: &mut dyn Strategy,
    events: impl IntoIterator<Item = Event>,
) -> Result<usize, SimError> {
    let mut nr_events = 0;
    let mut last_time = f64::NEG_INFINITY;
    for ev in events {
        debug_assert!(
            ev.time >= last_time,
            "events must be ordered by time ({} after {last_time})",
            ev.time
        );
        last_time = ev.time;
        debug!(
            "event t={} receiver={} content={} log={}",
            ev.time, ev.receiver, ev.content, ev.log
        );
        strategy.process_event(ctrl, &ev)?;
        nr_events += 1;
    }
    info!("processed {nr_events} events");
    Ok(nr_events)
}
