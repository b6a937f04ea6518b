//! Generic copter model.
//!
//! A copter generates thrust along its body `up` axis and torque about any axis.
//! Turning thrust and torque into motor outputs is left to a [`CopterActuator`].

use crate::command::{Command, CopterCommand};
use crate::state::State;
use crate::vehicle::{DynamicsModel, Jacobian, Vehicle, VehicleError};
use crate::{gravity, up, GRAVITY};
use log::info;
use nalgebra::{Matrix3, Matrix3x4, UnitQuaternion, Vector3, Vector4};

pub mod control;
pub use control::{CopterController, RateController};

mod ground;
pub use ground::{
    GroundDetector, GroundState, LandingDetection, Transition, STATIONARY_ACC_MINIMUM_DIFF,
    STATIONARY_SPEED_SQ_THRESHOLD, TAKEOFF_ACCELERATION_THRESHOLD,
};

/// Friction coefficient [kg/s] resisting movement while grounded,
/// damping out velocity the estimator drifts into while at rest.
pub const GROUND_FRICTION_COEFF: f32 = 5.;

/// Physical parameters of a copter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CopterParams {
    /// Mass [kg]
    pub mass: f32,

    /// Moment of inertia in the body frame [kg*m^2], usually diagonal.
    pub moment_of_inertia: Matrix3<f32>,

    /// Linear drag coefficient [kg/s]
    pub linear_drag: f32,
}

/// Motor output stage of a copter.
pub trait CopterActuator: Send + 'static {
    /// Output the collective thrust [N] and body torque [N*m].
    fn actuate(&mut self, thrust: f32, torque: &Vector3<f32>);

    /// Thrust currently produced, from the motor speeds.
    fn thrust(&self) -> f32;

    /// Torque currently produced, from the motor speeds.
    fn torque(&self) -> Vector3<f32>;
}

pub struct Copter<A, C> {
    params: CopterParams,
    inertia_inv: Matrix3<f32>,
    pub controller: C,
    pub actuator: A,
    ground: GroundDetector,
}

impl<A, C> Copter<A, C>
where
    A: CopterActuator,
    C: CopterController,
{
    pub fn new(params: CopterParams, controller: C, actuator: A) -> Result<Self, VehicleError> {
        let inertia_inv = params
            .moment_of_inertia
            .try_inverse()
            .ok_or(VehicleError::SingularInertia)?;

        Ok(Self {
            params,
            inertia_inv,
            controller,
            actuator,
            ground: GroundDetector::default(),
        })
    }

    /// Builder method to arm or disarm landing detection and return `self`
    pub fn with_landing_detection(mut self, landing: LandingDetection) -> Self {
        self.ground = GroundDetector::new(landing);
        self
    }

    pub fn params(&self) -> &CopterParams {
        &self.params
    }

    pub fn is_grounded(&self) -> bool {
        self.ground.is_grounded()
    }

    pub fn ground_state(&self) -> GroundState {
        self.ground.state()
    }

    /// Update the grounded guess from the latest state.
    fn update_grounded(&mut self, state: &State) -> Option<Transition> {
        let params = &self.params;
        let thrust = self.actuator.thrust();

        let transition = self.ground.update(state, || {
            airborne_acceleration(params, thrust, &state.velocity, &state.rotation)
        });

        match transition {
            Some(Transition::Takeoff) => {
                // Diagnostic only, the configured mass stays in use
                info!("Copter takeoff! Estimated mass: {} kg", thrust / GRAVITY);
            }
            Some(Transition::Landing) => info!("Copter landing!"),
            None => {}
        }
        transition
    }
}

/// Gravity, thrust along body `up` and linear drag.
fn airborne_acceleration(
    params: &CopterParams,
    thrust: f32,
    v: &Vector3<f32>,
    q: &UnitQuaternion<f32>,
) -> Vector3<f32> {
    let thrust_force = (q * up()) * thrust;
    let drag_force = v * -params.linear_drag;

    gravity() + (thrust_force + drag_force) / params.mass
}

impl<A, C> Vehicle for Copter<A, C>
where
    A: CopterActuator,
    C: CopterController,
{
    fn update(&mut self, state: &State, dt: f32) {
        self.update_grounded(state);

        self.controller.update(state, dt);
        self.actuator
            .actuate(self.controller.thrust(), &self.controller.torque());
    }

    fn handle_command(&mut self, command: &Command) -> bool {
        let Command::Copter(copter_command) = command else {
            return false;
        };

        match *copter_command {
            CopterCommand::SetAngularVelocity {
                angular_velocity,
                thrust,
            } => self
                .controller
                .set_target_angular_velocity(angular_velocity, thrust),
            CopterCommand::SetLinearVelocity {
                velocity,
                direction,
            } => self.controller.set_target_velocity(velocity, direction),
            CopterCommand::Unrecognized(_) => false,
        }
    }
}

impl<A, C> DynamicsModel for Copter<A, C>
where
    A: CopterActuator,
    C: CopterController,
{
    /// Acceleration in the global frame assuming thrust along the body `up` axis.
    /// While grounded this is the friction deceleration only.
    fn linear_acceleration(&self, v: &Vector3<f32>, q: &UnitQuaternion<f32>) -> Vector3<f32> {
        if self.is_grounded() {
            return v * (-GROUND_FRICTION_COEFF / self.params.mass);
        }

        airborne_acceleration(&self.params, self.actuator.thrust(), v, q)
    }

    /// Euler's rigid body equation `I^-1 (t - w x (I w))`, zero while grounded.
    fn angular_acceleration(
        &self,
        _v: &Vector3<f32>,
        w: &Vector3<f32>,
        _q: &UnitQuaternion<f32>,
    ) -> Vector3<f32> {
        if self.is_grounded() {
            return Vector3::zeros();
        }

        let i_w = self.params.moment_of_inertia * w;
        self.inertia_inv * (self.actuator.torque() - w.cross(&i_w))
    }

    /// Analytic partial derivatives of the model.
    ///
    /// Only the diagonal of the inertia tensor is used for the angular rate terms.
    fn jacobian(&self, _v: &Vector3<f32>, w: &Vector3<f32>, qv: &Vector4<f32>) -> Jacobian {
        let m = self.params.mass;

        if self.is_grounded() {
            return Jacobian {
                da_dv: Matrix3::from_diagonal_element(-GROUND_FRICTION_COEFF / m),
                ..Jacobian::zeros()
            };
        }

        let cd = self.params.linear_drag;
        let t = self.actuator.thrust();

        let i = &self.params.moment_of_inertia;
        let (ix, iy, iz) = (i[(0, 0)], i[(1, 1)], i[(2, 2)]);

        let (qw, qx, qy, qz) = (qv[0], qv[1], qv[2], qv[3]);
        let (wx, wy, wz) = (w[0], w[1], w[2]);

        #[rustfmt::skip]
        let da_dq = Matrix3x4::new(
            qy, qz, qw, qx,
            -qx, -qw, qz, qy,
            qw, -qx, -qy, qz,
        ) * (2. * t / m);

        #[rustfmt::skip]
        let ddw_dw = Matrix3::new(
            0., (iy - iz) * wz / ix, (iy - iz) * wy / ix,
            (iz - ix) * wz / iy, 0., (iz - ix) * wx / iy,
            (ix - iy) * wy / iz, (ix - iy) * wx / iz, 0.,
        );

        Jacobian {
            da_dv: Matrix3::from_diagonal_element(-cd / m),
            da_dq,
            ddw_dv: Matrix3::zeros(),
            ddw_dw,
            ddw_dq: Matrix3x4::zeros(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::GlobalCommand;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Outputs {
        thrust: f32,
        torque: Vector3<f32>,
        actuations: usize,
    }

    #[derive(Clone, Default)]
    struct TestActuator(Arc<Mutex<Outputs>>);

    impl CopterActuator for TestActuator {
        fn actuate(&mut self, thrust: f32, torque: &Vector3<f32>) {
            let mut outputs = self.0.lock().unwrap();
            outputs.thrust = thrust;
            outputs.torque = *torque;
            outputs.actuations += 1;
        }

        fn thrust(&self) -> f32 {
            self.0.lock().unwrap().thrust
        }

        fn torque(&self) -> Vector3<f32> {
            self.0.lock().unwrap().torque
        }
    }

    #[derive(Default)]
    struct TestController {
        angular_velocity_targets: Vec<(Vector3<f32>, f32)>,
        velocity_targets: Vec<(Vector3<f32>, f32)>,
        updates: usize,
    }

    impl CopterController for TestController {
        fn update(&mut self, _state: &State, _dt: f32) {
            self.updates += 1;
        }

        fn thrust(&self) -> f32 {
            3.
        }

        fn torque(&self) -> Vector3<f32> {
            Vector3::new(0.1, 0.2, 0.3)
        }

        fn set_target_angular_velocity(&mut self, w: Vector3<f32>, thrust: f32) -> bool {
            self.angular_velocity_targets.push((w, thrust));
            true
        }

        fn set_target_velocity(&mut self, v: Vector3<f32>, direction: f32) -> bool {
            self.velocity_targets.push((v, direction));
            true
        }
    }

    fn params() -> CopterParams {
        CopterParams {
            mass: 0.8,
            moment_of_inertia: Matrix3::from_diagonal(&Vector3::new(0.01, 0.02, 0.03)),
            linear_drag: 0.4,
        }
    }

    fn copter() -> Copter<TestActuator, TestController> {
        Copter::new(params(), TestController::default(), TestActuator::default()).unwrap()
    }

    fn airborne_copter() -> Copter<TestActuator, TestController> {
        let mut copter = copter();
        let takeoff = State {
            acceleration: Vector3::new(0., 0., 1.),
            ..Default::default()
        };
        copter.update(&takeoff, 0.01);
        assert!(!copter.is_grounded());
        copter
    }

    fn set_output(copter: &Copter<TestActuator, TestController>, thrust: f32, torque: Vector3<f32>) {
        let mut outputs = copter.actuator.0.lock().unwrap();
        outputs.thrust = thrust;
        outputs.torque = torque;
    }

    #[test]
    fn singular_inertia_is_rejected() {
        let params = CopterParams {
            moment_of_inertia: Matrix3::zeros(),
            ..params()
        };
        let result = Copter::new(params, TestController::default(), TestActuator::default());
        assert!(matches!(result, Err(VehicleError::SingularInertia)));
    }

    #[test]
    fn grounded_dynamics_are_friction_only() {
        let copter = copter();
        set_output(&copter, 20., Vector3::new(1., 1., 1.));
        let q = UnitQuaternion::from_euler_angles(0.3, -0.2, 1.);

        for v in [
            Vector3::zeros(),
            Vector3::new(1., -2., 0.5),
            Vector3::new(-0.01, 0., 3.),
        ] {
            let expected = v * (-GROUND_FRICTION_COEFF / copter.params().mass);
            assert_eq!(copter.linear_acceleration(&v, &q), expected);
            assert_eq!(
                copter.angular_acceleration(&v, &Vector3::new(1., 2., 3.), &q),
                Vector3::zeros()
            );
        }
    }

    #[test]
    fn grounded_jacobian_is_friction_only() {
        let copter = copter();
        let jacobian = copter.jacobian(
            &Vector3::new(1., 0., 0.),
            &Vector3::new(1., 2., 3.),
            &Vector4::new(1., 0., 0., 0.),
        );

        let expected = Jacobian {
            da_dv: Matrix3::from_diagonal_element(-GROUND_FRICTION_COEFF / 0.8),
            ..Jacobian::zeros()
        };
        assert_eq!(jacobian, expected);
    }

    #[test]
    fn hover_thrust_balances_gravity() {
        let copter = airborne_copter();
        set_output(&copter, 0.8 * GRAVITY, Vector3::zeros());

        let a = copter.linear_acceleration(&Vector3::zeros(), &UnitQuaternion::identity());
        assert_relative_eq!(a, Vector3::zeros(), epsilon = 1e-5);
    }

    #[test]
    fn airborne_drag_opposes_velocity() {
        let copter = airborne_copter();
        set_output(&copter, 0., Vector3::zeros());

        let v = Vector3::new(2., 0., 0.);
        let a = copter.linear_acceleration(&v, &UnitQuaternion::identity());
        assert_relative_eq!(a, Vector3::new(-0.4 * 2. / 0.8, 0., -GRAVITY), epsilon = 1e-5);
    }

    #[test]
    fn airborne_thrust_follows_orientation() {
        let copter = airborne_copter();
        set_output(&copter, 8., Vector3::zeros());

        // Rolled 90 degrees, thrust points along -y
        let q = UnitQuaternion::from_euler_angles(core::f32::consts::FRAC_PI_2, 0., 0.);
        let a = copter.linear_acceleration(&Vector3::zeros(), &q);
        assert_relative_eq!(a, Vector3::new(0., -10., -GRAVITY), epsilon = 1e-4);
    }

    #[test]
    fn airborne_angular_acceleration_follows_euler_equation() {
        let copter = airborne_copter();
        let torque = Vector3::new(0.01, -0.02, 0.005);
        set_output(&copter, 0., torque);

        let w = Vector3::new(1., 2., 3.);
        let dw = copter.angular_acceleration(&Vector3::zeros(), &w, &UnitQuaternion::identity());

        let (ix, iy, iz) = (0.01, 0.02, 0.03);
        let expected = Vector3::new(
            (torque.x - (iz - iy) * w.y * w.z) / ix,
            (torque.y - (ix - iz) * w.z * w.x) / iy,
            (torque.z - (iy - ix) * w.x * w.y) / iz,
        );
        assert_relative_eq!(dw, expected, epsilon = 1e-3);
    }

    #[test]
    fn airborne_velocity_jacobian_is_drag_only() {
        let copter = airborne_copter();
        let expected = Matrix3::from_diagonal_element(-0.4 / 0.8);

        for (thrust, q) in [
            (0., Vector4::new(1., 0., 0., 0.)),
            (5., Vector4::new(0.5, 0.5, 0.5, 0.5)),
            (12., Vector4::new(0.9, -0.1, 0.3, 0.3).normalize()),
        ] {
            set_output(&copter, thrust, Vector3::zeros());
            let jacobian = copter.jacobian(&Vector3::new(1., 2., 3.), &Vector3::new(3., 2., 1.), &q);
            assert_eq!(jacobian.da_dv, expected);
            assert_eq!(jacobian.ddw_dv, Matrix3::zeros());
        }
    }

    #[test]
    fn airborne_orientation_jacobian_at_identity() {
        let copter = airborne_copter();
        set_output(&copter, 4., Vector3::zeros());

        let jacobian = copter.jacobian(
            &Vector3::zeros(),
            &Vector3::zeros(),
            &Vector4::new(1., 0., 0., 0.),
        );
        let k = 2. * 4. / 0.8;
        #[rustfmt::skip]
        let expected = Matrix3x4::new(
            0., 0., k, 0.,
            0., -k, 0., 0.,
            k, 0., 0., 0.,
        );
        assert_relative_eq!(jacobian.da_dq, expected);
    }

    #[test]
    fn angular_rate_jacobian_matches_finite_differences() {
        let copter = airborne_copter();
        set_output(&copter, 0., Vector3::zeros());

        let w = Vector3::new(1., 2., 3.);
        let q = UnitQuaternion::identity();
        let jacobian = copter.jacobian(&Vector3::zeros(), &w, &Vector4::new(1., 0., 0., 0.));

        let h = 1e-2;
        for j in 0..3 {
            let mut step = Vector3::zeros();
            step[j] = h;
            let forward = copter.angular_acceleration(&Vector3::zeros(), &(w + step), &q);
            let backward = copter.angular_acceleration(&Vector3::zeros(), &(w - step), &q);
            let column = (forward - backward) / (2. * h);

            assert_relative_eq!(column, jacobian.ddw_dw.column(j).into_owned(), epsilon = 1e-2);
        }
    }

    #[test]
    fn takeoff_transition_with_hover_thrust() {
        let mut copter = copter();
        set_output(&copter, 0.8 * GRAVITY, Vector3::zeros());

        let resting = State::default();
        assert_eq!(copter.update_grounded(&resting), None);

        let climbing = State {
            acceleration: Vector3::new(0., 0., 0.5),
            ..Default::default()
        };
        assert_eq!(copter.update_grounded(&climbing), Some(Transition::Takeoff));
        assert_eq!(copter.update_grounded(&climbing), None);
        assert_eq!(copter.ground_state(), GroundState::Airborne);
    }

    #[test]
    fn landing_stays_disabled_by_default() {
        let mut copter = airborne_copter();
        set_output(&copter, 0., Vector3::zeros());

        for _ in 0..50 {
            copter.update(&State::default(), 0.01);
        }
        assert!(!copter.is_grounded());
    }

    #[test]
    fn enabled_landing_uses_the_airborne_model() {
        let mut copter = copter().with_landing_detection(LandingDetection::Enabled);
        copter.update(
            &State {
                acceleration: Vector3::new(0., 0., 1.),
                ..Default::default()
            },
            0.01,
        );
        assert!(!copter.is_grounded());

        // Motors idle, free fall predicted, yet resting
        set_output(&copter, 0., Vector3::zeros());
        assert_eq!(copter.update_grounded(&State::default()), Some(Transition::Landing));
        assert!(copter.is_grounded());
    }

    #[test]
    fn update_actuates_controller_output() {
        let mut copter = copter();
        copter.update(&State::default(), 0.01);

        assert_eq!(copter.controller.updates, 1);
        let outputs = copter.actuator.0.lock().unwrap();
        assert_eq!(outputs.actuations, 1);
        assert_eq!(outputs.thrust, 3.);
        assert_eq!(outputs.torque, Vector3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn copter_commands_are_delegated() {
        let mut copter = copter();

        let w = Command::Copter(CopterCommand::SetAngularVelocity {
            angular_velocity: Vector3::new(0., 0., 1.),
            thrust: 4.,
        });
        let v = Command::Copter(CopterCommand::SetLinearVelocity {
            velocity: Vector3::new(1., 0., 0.),
            direction: 0.5,
        });
        assert!(copter.handle_command(&w));
        assert!(copter.handle_command(&v));

        assert_eq!(
            copter.controller.angular_velocity_targets,
            [(Vector3::new(0., 0., 1.), 4.)]
        );
        assert_eq!(copter.controller.velocity_targets, [(Vector3::new(1., 0., 0.), 0.5)]);
    }

    #[test]
    fn other_commands_are_rejected_without_touching_targets() {
        let mut copter = copter();

        assert!(!copter.handle_command(&Command::Global(GlobalCommand::Heartbeat)));
        assert!(!copter.handle_command(&Command::Copter(CopterCommand::Unrecognized(9))));

        assert!(copter.controller.angular_velocity_targets.is_empty());
        assert!(copter.controller.velocity_targets.is_empty());
    }
}
