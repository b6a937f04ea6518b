use crate::state::State;
use crate::GRAVITY;
use core::f32::consts::PI;
use nalgebra::Vector3;

mod body_rate;
pub use body_rate::BodyRateController;

/// Smallest vertical component of the body `z` axis used to scale collective thrust.
const MIN_TILT_COSINE: f32 = 0.2;

/// Control law for a copter, producing a collective thrust and body torque each period.
pub trait CopterController: Send + 'static {
    fn update(&mut self, state: &State, dt: f32);

    /// Collective thrust [N] from the last update.
    fn thrust(&self) -> f32;

    /// Body torque [N*m] from the last update.
    fn torque(&self) -> Vector3<f32>;

    /// Track a body angular velocity with a fixed collective thrust.
    /// Returns `false` if the target was rejected.
    fn set_target_angular_velocity(&mut self, angular_velocity: Vector3<f32>, thrust: f32) -> bool;

    /// Track a global velocity while facing the heading `direction`.
    /// Returns `false` if the target was rejected.
    fn set_target_velocity(&mut self, velocity: Vector3<f32>, direction: f32) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Target {
    AngularVelocity {
        angular_velocity: Vector3<f32>,
        thrust: f32,
    },
    Velocity {
        velocity: Vector3<f32>,
        direction: f32,
    },
}

/// Proportional cascade ending in body rate control.
#[derive(Clone, Debug)]
pub struct RateController {
    pub mass: f32,
    pub max_thrust: f32,
    pub kp_velocity_xy: f32,
    pub kp_velocity_z: f32,
    pub kp_bank: f32,
    pub kp_yaw: f32,
    /// Largest commanded lateral component of the thrust direction.
    pub max_tilt: f32,
    pub body_rate: BodyRateController,
    target: Target,
    thrust: f32,
    torque: Vector3<f32>,
}

impl RateController {
    pub fn new(mass: f32, moment_of_inertia: Vector3<f32>, max_thrust: f32) -> Self {
        Self {
            mass,
            max_thrust,
            kp_velocity_xy: 1.,
            kp_velocity_z: 2.,
            kp_bank: 5.,
            kp_yaw: 2.,
            max_tilt: 0.5,
            body_rate: BodyRateController::new(moment_of_inertia),
            target: Target::AngularVelocity {
                angular_velocity: Vector3::zeros(),
                thrust: 0.,
            },
            thrust: 0.,
            torque: Vector3::zeros(),
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Returns the collective thrust and body rate command to track `velocity`.
    fn velocity_control(
        &self,
        state: &State,
        velocity: Vector3<f32>,
        direction: f32,
    ) -> (f32, Vector3<f32>) {
        let rot = state.rotation.to_rotation_matrix();
        let acceleration_cmd = Vector3::new(
            self.kp_velocity_xy,
            self.kp_velocity_xy,
            self.kp_velocity_z,
        )
        .component_mul(&(velocity - state.velocity));

        let b_z = rot[(2, 2)].max(MIN_TILT_COSINE);
        let thrust = (self.mass * (GRAVITY + acceleration_cmd.z) / b_z)
            .max(0.)
            .min(self.max_thrust);

        // Tilt the thrust vector towards the lateral acceleration command
        let (p_c, q_c) = if thrust > 0. {
            let c = thrust / self.mass;
            let b_x_cmd = (acceleration_cmd.x / c).max(-self.max_tilt).min(self.max_tilt);
            let b_y_cmd = (acceleration_cmd.y / c).max(-self.max_tilt).min(self.max_tilt);
            let b_x_dot = self.kp_bank * (b_x_cmd - rot[(0, 2)]);
            let b_y_dot = self.kp_bank * (b_y_cmd - rot[(1, 2)]);

            (
                (rot[(1, 0)] * b_x_dot - rot[(0, 0)] * b_y_dot) / b_z,
                (rot[(1, 1)] * b_x_dot - rot[(0, 1)] * b_y_dot) / b_z,
            )
        } else {
            (0., 0.)
        };

        let (_, _, yaw) = state.rotation.euler_angles();
        let r_c = self.kp_yaw * wrap_pi(direction - yaw);

        (thrust, Vector3::new(p_c, q_c, r_c))
    }
}

impl CopterController for RateController {
    fn update(&mut self, state: &State, _dt: f32) {
        let (thrust, body_rate_cmd) = match self.target {
            Target::AngularVelocity {
                angular_velocity,
                thrust,
            } => (thrust, angular_velocity),
            Target::Velocity {
                velocity,
                direction,
            } => self.velocity_control(state, velocity, direction),
        };

        self.thrust = thrust;
        self.torque = self.body_rate.control(body_rate_cmd, state.angular_velocity);
    }

    fn thrust(&self) -> f32 {
        self.thrust
    }

    fn torque(&self) -> Vector3<f32> {
        self.torque
    }

    fn set_target_angular_velocity(&mut self, angular_velocity: Vector3<f32>, thrust: f32) -> bool {
        if !is_finite(&angular_velocity) || !(0. ..=self.max_thrust).contains(&thrust) {
            return false;
        }
        self.target = Target::AngularVelocity {
            angular_velocity,
            thrust,
        };
        true
    }

    fn set_target_velocity(&mut self, velocity: Vector3<f32>, direction: f32) -> bool {
        if !is_finite(&velocity) || !direction.is_finite() {
            return false;
        }
        self.target = Target::Velocity {
            velocity,
            direction,
        };
        true
    }
}

fn is_finite(v: &Vector3<f32>) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Wrap an angle into [-PI, PI)
fn wrap_pi(angle: f32) -> f32 {
    (angle + PI).rem_euclid(2. * PI) - PI
}
