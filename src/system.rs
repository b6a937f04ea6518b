//! Startup: probe the devices, wire the channels and spawn the tasks.

use crate::codec::{CommandDecoder, TelemetryEncoder};
use crate::command;
use crate::config::Config;
use crate::error::{StartupError, TaskError};
use crate::hal::{CharDevice, InertialSensor, SensorDevice};
use crate::state::{self, StateEstimator, StateHandle};
use crate::tasks::receiver::Receiver;
use crate::tasks::sensor::{self, SensorHandle};
use crate::tasks::telemetry::{Snapshot, Telemetry};
use crate::tasks::{estimator, logger, receiver, telemetry, vehicle};
use crate::vehicle::Vehicle;
use log::{error, info, warn};
use tokio::task::JoinSet;

/// The devices the system runs on.
pub struct Devices<A, G, R, T, L> {
    pub accelerometer: SensorDevice<A>,
    pub gyroscope: SensorDevice<G>,
    pub receiver: R,

    /// Optional, telemetry is skipped without it.
    pub telemetry: Option<T>,

    /// Optional, receives every `log` record when present.
    pub log: Option<L>,
}

/// The algorithms the system runs.
pub struct Components<E, V, D, C> {
    pub estimator: E,
    pub vehicle: V,
    pub decoder: D,
    pub encoder: C,
}

/// Handle to the running tasks. Dropping it aborts them.
pub struct System {
    tasks: JoinSet<Result<(), TaskError>>,
    state: StateHandle,
    accelerometer: SensorHandle,
    gyroscope: SensorHandle,
    has_telemetry: bool,
    has_logging: bool,
}

impl System {
    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn accelerometer(&self) -> SensorHandle {
        self.accelerometer.clone()
    }

    pub fn gyroscope(&self) -> SensorHandle {
        self.gyroscope.clone()
    }

    pub fn has_telemetry(&self) -> bool {
        self.has_telemetry
    }

    pub fn has_logging(&self) -> bool {
        self.has_logging
    }

    /// Wait for the first task to fail.
    pub async fn join(mut self) -> Result<(), TaskError> {
        while let Some(result) = self.tasks.join_next().await {
            result??;
        }
        Ok(())
    }
}

/// Probe the devices and spawn every task. Must be called inside a tokio runtime.
///
/// The configuration is validated first. Required devices are then probed in order,
/// nothing is spawned unless all of them respond.
pub fn start<A, G, R, T, L, E, V, D, C>(
    devices: Devices<A, G, R, T, L>,
    components: Components<E, V, D, C>,
    config: &Config,
) -> Result<System, StartupError>
where
    A: InertialSensor,
    G: InertialSensor,
    R: CharDevice,
    T: CharDevice,
    L: CharDevice,
    E: StateEstimator,
    V: Vehicle,
    D: CommandDecoder,
    C: TelemetryEncoder,
{
    let Devices {
        mut accelerometer,
        mut gyroscope,
        receiver: mut receiver_device,
        telemetry: telemetry_device,
        log: log_device,
    } = devices;

    config.validate()?;

    // Probed first so the remaining startup messages already reach it
    let log_device =
        log_device.and_then(|mut device| device.probe(config.probe_timeout).then_some(device));
    let logging = match log_device {
        Some(device) => {
            let (sink, records) = logger::channel(config.log_level);
            if logger::install(sink) {
                info!("Logging available");
                Some((device, records))
            } else {
                warn!("Another logger is installed, log device unused");
                None
            }
        }
        None => {
            warn!("Logging not available, skipping");
            None
        }
    };

    if !accelerometer.sensor.probe() {
        error!("Accelerometer not available!");
        return Err(StartupError::DeviceUnavailable("accelerometer"));
    }
    info!("Accelerometer available");

    if !gyroscope.sensor.probe() {
        error!("Gyroscope not available!");
        return Err(StartupError::DeviceUnavailable("gyroscope"));
    }
    info!("Gyroscope available");

    // Commands are only ever read through the notification bridge
    if !receiver_device.probe(config.probe_timeout) || !receiver_device.is_async_available() {
        error!("Receiver not available!");
        return Err(StartupError::DeviceUnavailable("receiver"));
    }
    info!("Receiver available");

    let telemetry_device = telemetry_device
        .and_then(|mut device| device.probe(config.probe_timeout).then_some(device));
    if telemetry_device.is_some() {
        info!("Telemetry available");
    } else {
        warn!("Telemetry not available, skipping");
    }

    let (state_publisher, state) = state::channel();
    let (acc_publisher, acc) = sensor::channel();
    let (gyro_publisher, gyro) = sensor::channel();
    let (command_tx, command_rx) =
        command::channel(config.receiver.queue_capacity, config.receiver.send_timeout);

    let mut tasks = JoinSet::new();
    tasks.spawn(sensor::run(
        accelerometer,
        acc_publisher,
        "accelerometer",
        config.sensor_period,
    ));
    tasks.spawn(sensor::run(
        gyroscope,
        gyro_publisher,
        "gyroscope",
        config.sensor_period,
    ));
    tasks.spawn(estimator::run(
        components.estimator,
        acc.clone(),
        gyro.clone(),
        state_publisher,
        config.estimator_period,
    ));
    tasks.spawn(receiver::run(
        Receiver::new(receiver_device, components.decoder, &config.receiver),
        command_tx,
    ));
    tasks.spawn(vehicle::run(
        components.vehicle,
        command_rx,
        state.clone(),
        config.vehicle_period,
    ));

    let has_logging = match logging {
        Some((device, records)) => {
            tasks.spawn(logger::run(device, records));
            true
        }
        None => false,
    };

    let has_telemetry = match telemetry_device {
        Some(device) => {
            let snapshot = Snapshot {
                state: state.clone(),
                accelerometer: acc.clone(),
                gyroscope: gyro.clone(),
            };
            tasks.spawn(telemetry::run(
                Telemetry::new(device, components.encoder, snapshot),
                config.telemetry_period,
            ));
            true
        }
        None => false,
    };

    Ok(System {
        tasks,
        state,
        accelerometer: acc,
        gyroscope: gyro,
        has_telemetry,
        has_logging,
    })
}
