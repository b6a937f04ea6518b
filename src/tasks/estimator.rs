//! Fuses the latest sensor readings into the published state once per period.

use super::periodic;
use super::sensor::SensorHandle;
use crate::error::TaskError;
use crate::state::{SensorInput, StateEstimator, StatePublisher};
use core::time::Duration;

pub async fn run<E>(
    mut estimator: E,
    mut accelerometer: SensorHandle,
    mut gyroscope: SensorHandle,
    publisher: StatePublisher,
    period: Duration,
) -> Result<(), TaskError>
where
    E: StateEstimator,
{
    let (mut interval, dt) = periodic(period);
    loop {
        interval.tick().await;
        step(&mut estimator, &mut accelerometer, &mut gyroscope, &publisher, dt);
    }
}

/// Run one estimator period.
///
/// Only readings published since the last period are passed on, a sensor that
/// produced nothing new is absent from the input rather than repeated.
fn step<E: StateEstimator>(
    estimator: &mut E,
    accelerometer: &mut SensorHandle,
    gyroscope: &mut SensorHandle,
    publisher: &StatePublisher,
    dt: f32,
) {
    let input = SensorInput {
        accelerometer: accelerometer
            .take_new()
            .map(|reading| reading.corrected.into()),
        gyroscope: gyroscope
            .take_new()
            .map(|reading| reading.corrected.into()),
        ..Default::default()
    };

    estimator.update(&input, dt);
    publisher.publish(estimator.get_state());
}
