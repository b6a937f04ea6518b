use super::{Measurement, SensorInput, State, StateEstimator};
use crate::{gravity, up, GRAVITY};
use nalgebra::{UnitQuaternion, Vector3};

/// Accelerometer samples further than this fraction of `g` from 1g are not used for tilt correction.
const TILT_ACCEPT_RATIO: f32 = 0.2;

/// Complementary strapdown estimator.
///
/// Integrates the gyroscope for orientation and the accelerometer for velocity and position,
/// with slow corrections towards the gravity direction, magnetic north (along global `x`)
/// and GNSS fixes. Gains are per second and scaled down by the measurement covariance.
#[derive(Clone, Debug)]
pub struct Strapdown {
    state: State,
    pub tilt_gain: f32,
    pub heading_gain: f32,
    pub position_gain: f32,
}

impl Default for Strapdown {
    fn default() -> Self {
        Self::with_state(State::default())
    }
}

impl Strapdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: State) -> Self {
        Self {
            state,
            tilt_gain: 1.,
            heading_gain: 0.5,
            position_gain: 2.,
        }
    }

    fn correct_tilt(
        &self,
        q: UnitQuaternion<f32>,
        f_global: Vector3<f32>,
        k: f32,
    ) -> UnitQuaternion<f32> {
        let norm = f_global.norm();
        if (norm - GRAVITY).abs() > TILT_ACCEPT_RATIO * GRAVITY {
            // Maneuvering, the measurement is not dominated by gravity
            return q;
        }

        match UnitQuaternion::rotation_between(&(f_global / norm), &up()) {
            Some(correction) => UnitQuaternion::from_scaled_axis(correction.scaled_axis() * k) * q,
            None => q,
        }
    }

    fn correct_heading(
        &self,
        q: UnitQuaternion<f32>,
        field: Vector3<f32>,
        k: f32,
    ) -> UnitQuaternion<f32> {
        let m = q * field;
        if m.x == 0. && m.y == 0. {
            return q;
        }

        let heading_error = -m.y.atan2(m.x);
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), heading_error * k) * q
    }
}

impl StateEstimator for Strapdown {
    fn update(&mut self, input: &SensorInput, dt: f32) {
        if let Some(gyro) = input.gyroscope {
            self.state.angular_velocity = gyro.value;
        }

        // Body rates rotate the body frame, apply on the right
        let mut q = self.state.rotation
            * UnitQuaternion::from_scaled_axis(self.state.angular_velocity * dt);

        if let Some(acc) = input.accelerometer {
            let f_global = q * acc.value;
            self.state.acceleration = f_global + gravity();
            q = self.correct_tilt(q, f_global, gain(self.tilt_gain, dt, &acc));
        }

        if let Some(mag) = input.magnetometer {
            q = self.correct_heading(q, mag.value, gain(self.heading_gain, dt, &mag));
        }

        self.state.rotation = q;
        self.state.velocity += self.state.acceleration * dt;
        self.state.position += self.state.velocity * dt;

        if let Some(fix) = input.gnss {
            let k = gain(self.position_gain, dt, &fix);
            self.state.position += (fix.value - self.state.position) * k;
        }
    }

    fn get_state(&self) -> State {
        self.state
    }
}

/// Per-step correction gain in [0, 1], smaller for noisier measurements.
fn gain(rate: f32, dt: f32, measurement: &Measurement) -> f32 {
    let weight = measurement
        .covariance
        .map_or(1., |cov| 1. / (1. + cov.trace().abs()));
    (rate * dt * weight).clamp(0., 1.)
}

#[cfg(test)]
mod tests {
    use super::Strapdown;
    use crate::state::{Measurement, SensorInput, State, StateEstimator};
    use crate::GRAVITY;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, UnitQuaternion, Vector3};

    fn accel(value: Vector3<f32>) -> SensorInput {
        SensorInput {
            accelerometer: Some(Measurement::new(value)),
            ..Default::default()
        }
    }

    #[test]
    fn level_at_rest_stays_at_rest() {
        let mut estimator = Strapdown::new();
        for _ in 0..100 {
            estimator.update(&accel(Vector3::new(0., 0., GRAVITY)), 0.01);
        }

        let state = estimator.get_state();
        assert_relative_eq!(state.acceleration, Vector3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(state.velocity, Vector3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(state.rotation.angle(), 0., epsilon = 1e-5);
    }

    #[test]
    fn gyroscope_integrates_orientation() {
        let mut estimator = Strapdown::new();
        let input = SensorInput {
            gyroscope: Some(Measurement::new(Vector3::new(0., 0., 1.))),
            ..Default::default()
        };
        for _ in 0..10 {
            estimator.update(&input, 0.1);
        }

        let (_, _, yaw) = estimator.get_state().rotation.euler_angles();
        assert_relative_eq!(yaw, 1., epsilon = 1e-4);
    }

    #[test]
    fn missing_inputs_propagate_instead_of_zeroing() {
        let mut estimator = Strapdown::new();
        estimator.update(&accel(Vector3::new(0., 0., GRAVITY + 1.)), 0.1);

        let state = estimator.get_state();
        assert_relative_eq!(state.acceleration, Vector3::new(0., 0., 1.), epsilon = 1e-5);

        // No accelerometer this period, the last acceleration keeps acting
        estimator.update(&SensorInput::default(), 0.1);
        let state = estimator.get_state();
        assert_relative_eq!(state.acceleration, Vector3::new(0., 0., 1.), epsilon = 1e-5);
        assert_relative_eq!(state.velocity.z, 0.2, epsilon = 1e-5);
    }

    #[test]
    fn tilt_converges_towards_gravity() {
        let tilted = State {
            rotation: UnitQuaternion::from_euler_angles(0.2, 0., 0.),
            ..Default::default()
        };
        let mut estimator = Strapdown::with_state(tilted);

        // The vehicle is actually level
        for _ in 0..200 {
            estimator.update(&accel(Vector3::new(0., 0., GRAVITY)), 0.01);
        }

        assert!(estimator.get_state().rotation.angle() < 0.05);
    }

    #[test]
    fn gnss_fix_pulls_position() {
        let mut estimator = Strapdown::new();
        let input = SensorInput {
            gnss: Some(Measurement::new(Vector3::new(10., 0., 0.))),
            ..Default::default()
        };
        estimator.update(&input, 0.1);

        assert_relative_eq!(estimator.get_state().position.x, 2., epsilon = 1e-5);
    }

    #[test]
    fn noisy_fix_is_trusted_less() {
        let fix = Measurement::new(Vector3::new(10., 0., 0.));
        let noisy = fix.with_covariance(Matrix3::identity() * 3.);

        let mut precise = Strapdown::new();
        precise.update(
            &SensorInput {
                gnss: Some(fix),
                ..Default::default()
            },
            0.1,
        );

        let mut imprecise = Strapdown::new();
        imprecise.update(
            &SensorInput {
                gnss: Some(noisy),
                ..Default::default()
            },
            0.1,
        );

        assert!(imprecise.get_state().position.x < precise.get_state().position.x);
    }

    #[test]
    fn magnetometer_aligns_heading_with_north() {
        let mut estimator = Strapdown::with_state(State {
            rotation: UnitQuaternion::from_euler_angles(0., 0., 0.5),
            ..Default::default()
        });

        // Level vehicle actually facing north, field seen along body x
        let input = SensorInput {
            magnetometer: Some(Measurement::new(Vector3::new(0.3, 0., -0.4))),
            ..Default::default()
        };
        for _ in 0..400 {
            estimator.update(&input, 0.01);
        }

        let (_, _, yaw) = estimator.get_state().rotation.euler_angles();
        assert!(yaw.abs() < 0.1);
    }
}
