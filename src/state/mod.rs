use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

mod strapdown;
pub use strapdown::Strapdown;

/// Fused physical state of the vehicle at an instant.
///
/// Shortened in equations to `p`, `v`, `a`, `w` and `q`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Position of the center of mass in the global frame [m].
    pub position: Vector3<f32>,

    /// Velocity of the center of mass in the global frame [m/s].
    pub velocity: Vector3<f32>,

    /// Acceleration of the center of mass in the global frame [m/s^2].
    pub acceleration: Vector3<f32>,

    /// Angular velocity in the body frame [rad/s].
    pub angular_velocity: Vector3<f32>,

    /// Rotation from the body frame to the global frame.
    pub rotation: UnitQuaternion<f32>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

/// A single measurement with its optional noise covariance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub value: Vector3<f32>,
    pub covariance: Option<Matrix3<f32>>,
}

impl Measurement {
    pub fn new(value: Vector3<f32>) -> Self {
        Self {
            value,
            covariance: None,
        }
    }

    pub fn with_covariance(mut self, covariance: Matrix3<f32>) -> Self {
        self.covariance = Some(covariance);
        self
    }
}

impl From<Vector3<f32>> for Measurement {
    fn from(value: Vector3<f32>) -> Self {
        Self::new(value)
    }
}

/// Input to one estimator iteration.
///
/// A `None` field means there is no new measurement from that source this period,
/// it must never be read as a zero sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SensorInput {
    /// Specific force in the body frame [m/s^2].
    pub accelerometer: Option<Measurement>,

    /// Angular velocity in the body frame [rad/s].
    pub gyroscope: Option<Measurement>,

    /// Magnetic field in the body frame.
    pub magnetometer: Option<Measurement>,

    /// Position in the global frame [m].
    pub gnss: Option<Measurement>,
}

/// State estimation algorithm.
///
/// Driven from a single task, once per period.
pub trait StateEstimator: Send + 'static {
    /// Advance the estimate by `dt` seconds using whichever inputs are present.
    ///
    /// Must not fail. With no inputs the estimate is propagated only.
    fn update(&mut self, input: &SensorInput, dt: f32);

    /// The current best estimate.
    fn get_state(&self) -> State;
}

/// Create the single-writer channel carrying the current [`State`].
pub fn channel() -> (StatePublisher, StateHandle) {
    let (tx, rx) = watch::channel(State::default());
    (StatePublisher { tx }, StateHandle { rx })
}

/// Writing end of the published state, owned by the estimator task.
#[derive(Debug)]
pub struct StatePublisher {
    tx: watch::Sender<State>,
}

impl StatePublisher {
    /// Replace the published snapshot. Readers see either the old or the new state, never a mix.
    pub fn publish(&self, state: State) {
        self.tx.send_replace(state);
    }

    pub fn subscribe(&self) -> StateHandle {
        StateHandle {
            rx: self.tx.subscribe(),
        }
    }
}

/// Reading end of the published state. Cheap to clone, one per consumer.
#[derive(Clone, Debug)]
pub struct StateHandle {
    rx: watch::Receiver<State>,
}

impl StateHandle {
    /// Copy out the latest published state.
    pub fn get_state(&self) -> State {
        *self.rx.borrow()
    }
}
