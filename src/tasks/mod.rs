//! The periodic and event-driven tasks making up the pipeline.
//!
//! Each task owns its collaborators and talks to the others only through the
//! command channel and the published state and sensor readings.

use crate::hal::{bridge, BridgeError, CharDevice};
use core::mem;
use core::time::Duration;
use thiserror::Error;
use tokio::time::{self, Interval, MissedTickBehavior};

pub mod estimator;
pub mod logger;
pub mod receiver;
pub mod sensor;
pub mod telemetry;
pub mod vehicle;

/// Shortest period a task runs at, shorter periods are raised to it.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Ticker waking on fixed period boundaries, with the matching `dt` in seconds.
///
/// A late task skips the missed boundaries instead of bursting to catch up.
/// The tick period and `dt` come from the same non-zero duration.
pub(crate) fn periodic(period: Duration) -> (Interval, f32) {
    let period = period.max(MIN_PERIOD);
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    (interval, period.as_secs_f32())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum WriteError {
    #[error("write start fail")]
    NotStarted,

    #[error("write abandoned")]
    Abandoned,
}

/// Write all of `out` in one operation so it is never interleaved with other writers.
///
/// Goes through the notification bridge if the device supports it, otherwise a
/// best-effort write that does not wait. `out` is handed back for reuse when possible.
pub(crate) async fn write_frame<D: CharDevice>(device: &mut D, out: &mut Vec<u8>) -> Result<(), WriteError> {
    if !device.is_async_available() {
        device.write(out, Duration::ZERO);
        return Ok(());
    }

    let buf = mem::take(out);
    match bridge::transfer(buf, |buf, done| device.write_async(buf, done)).await {
        Ok(transfer) => {
            *out = transfer.buf;
            Ok(())
        }
        Err(BridgeError::NotStarted(buf)) => {
            *out = buf;
            Err(WriteError::NotStarted)
        }
        Err(BridgeError::Abandoned) => Err(WriteError::Abandoned),
    }
}
