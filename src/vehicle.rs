//! Vehicle control and dynamics model interfaces.

use crate::command::Command;
use crate::state::State;
use nalgebra::{Matrix3, Matrix3x4, UnitQuaternion, Vector3, Vector4};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("moment of inertia is not invertible")]
    SingularInertia,

    #[error("vehicle initialization failed: {0}")]
    Init(String),
}

/// A controllable vehicle, updated once per control period.
pub trait Vehicle: Send + 'static {
    /// Prepare the vehicle before the first update.
    fn init(&mut self) -> Result<(), VehicleError> {
        Ok(())
    }

    /// Run one control period of `dt` seconds: update the internal mode, run the control law
    /// and actuate.
    fn update(&mut self, state: &State, dt: f32);

    /// Returns `true` if this vehicle accepted the command.
    /// A `false` result leaves the command to a global handler.
    fn handle_command(&mut self, command: &Command) -> bool;
}

/// Partial derivatives of a dynamics model, evaluated at one state.
///
/// `a` is the linear acceleration, `dw` the angular acceleration, `q` the rotation quaternion
/// as `(w, x, y, z)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Jacobian {
    pub da_dv: Matrix3<f32>,
    pub da_dq: Matrix3x4<f32>,
    pub ddw_dv: Matrix3<f32>,
    pub ddw_dw: Matrix3<f32>,
    pub ddw_dq: Matrix3x4<f32>,
}

impl Jacobian {
    pub fn zeros() -> Self {
        Self {
            da_dv: Matrix3::zeros(),
            da_dq: Matrix3x4::zeros(),
            ddw_dv: Matrix3::zeros(),
            ddw_dw: Matrix3::zeros(),
            ddw_dq: Matrix3x4::zeros(),
        }
    }
}

/// Nonlinear motion model of a vehicle, for estimators that propagate with vehicle dynamics.
pub trait DynamicsModel {
    /// Linear acceleration in the global frame.
    fn linear_acceleration(&self, v: &Vector3<f32>, q: &UnitQuaternion<f32>) -> Vector3<f32>;

    /// Angular acceleration in the body frame.
    fn angular_acceleration(
        &self,
        v: &Vector3<f32>,
        w: &Vector3<f32>,
        q: &UnitQuaternion<f32>,
    ) -> Vector3<f32>;

    fn jacobian(&self, v: &Vector3<f32>, w: &Vector3<f32>, q: &Vector4<f32>) -> Jacobian;
}
