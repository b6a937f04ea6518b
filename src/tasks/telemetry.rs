//! Periodic telemetry of the estimated state and inertial readings.

use super::{periodic, write_frame};
use super::sensor::SensorHandle;
use crate::codec::{SensorSnapshot, TelemetryEncoder, TelemetryMessage};
use crate::error::TaskError;
use crate::hal::CharDevice;
use crate::state::StateHandle;
use core::time::Duration;
use log::{error, warn};

/// Sources of a telemetry frame.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub state: StateHandle,
    pub accelerometer: SensorHandle,
    pub gyroscope: SensorHandle,
}

impl Snapshot {
    pub fn message(&self) -> TelemetryMessage {
        let acc = self.accelerometer.latest().unwrap_or_default();
        let gyro = self.gyroscope.latest().unwrap_or_default();

        TelemetryMessage {
            state: self.state.get_state(),
            sensors: SensorSnapshot {
                acc_raw: acc.raw,
                acc_corrected: acc.corrected,
                gyro_raw: gyro.raw,
                gyro_corrected: gyro.corrected,
            },
        }
    }
}

pub struct Telemetry<T, E> {
    device: T,
    encoder: E,
    snapshot: Snapshot,
    out: Vec<u8>,
}

impl<T, E> Telemetry<T, E>
where
    T: CharDevice,
    E: TelemetryEncoder,
{
    pub fn new(device: T, encoder: E, snapshot: Snapshot) -> Self {
        Self {
            device,
            encoder,
            snapshot,
            out: Vec::new(),
        }
    }

    /// Encode and send one frame. A frame that fails to encode is skipped.
    pub async fn send(&mut self) {
        let message = self.snapshot.message();
        if let Err(e) = self.encoder.encode(&message, &mut self.out) {
            error!("Failed to encode telemetry! {}", e);
            return;
        }

        if let Err(e) = write_frame(&mut self.device, &mut self.out).await {
            warn!("Telemetry {}!", e);
        }
    }
}

pub async fn run<T, E>(mut telemetry: Telemetry<T, E>, period: Duration) -> Result<(), TaskError>
where
    T: CharDevice,
    E: TelemetryEncoder,
{
    let (mut interval, _) = periodic(period);
    loop {
        interval.tick().await;
        telemetry.send().await;
    }
}
