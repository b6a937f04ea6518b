//! Inertial sensor producers.

use super::periodic;
use crate::error::TaskError;
use crate::hal::{InertialSensor, SensorDevice};
use core::time::Duration;
use log::warn;
use nalgebra::Vector3;
use tokio::sync::watch;

/// One inertial sample, before and after calibration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SensorReading {
    pub raw: Vector3<f32>,
    pub corrected: Vector3<f32>,
}

pub fn channel() -> (SensorPublisher, SensorHandle) {
    let (tx, rx) = watch::channel(None);
    (SensorPublisher { tx }, SensorHandle { rx })
}

#[derive(Debug)]
pub struct SensorPublisher {
    tx: watch::Sender<Option<SensorReading>>,
}

impl SensorPublisher {
    pub fn publish(&self, reading: SensorReading) {
        self.tx.send_replace(Some(reading));
    }

    pub fn subscribe(&self) -> SensorHandle {
        SensorHandle {
            rx: self.tx.subscribe(),
        }
    }
}

/// Reading end of a sensor producer. Each clone tracks new readings on its own.
#[derive(Clone, Debug)]
pub struct SensorHandle {
    rx: watch::Receiver<Option<SensorReading>>,
}

impl SensorHandle {
    /// The last published reading, `None` before the first sample.
    pub fn latest(&self) -> Option<SensorReading> {
        *self.rx.borrow()
    }

    /// The last published reading if it was published since the previous call.
    pub fn take_new(&mut self) -> Option<SensorReading> {
        if self.rx.has_changed().unwrap_or(false) {
            *self.rx.borrow_and_update()
        } else {
            None
        }
    }
}

/// Sample `device` every `period` and publish calibrated readings.
pub async fn run<S>(
    mut device: SensorDevice<S>,
    publisher: SensorPublisher,
    name: &'static str,
    period: Duration,
) -> Result<(), TaskError>
where
    S: InertialSensor,
{
    let (mut interval, _) = periodic(period);
    loop {
        interval.tick().await;
        sample(&mut device, &publisher, name);
    }
}

fn sample<S: InertialSensor>(device: &mut SensorDevice<S>, publisher: &SensorPublisher, name: &str) {
    match device.sensor.read() {
        Some(raw) => publisher.publish(SensorReading {
            raw,
            corrected: device.calibration.apply(raw),
        }),
        None => warn!("Failed to sample {}", name),
    }
}
