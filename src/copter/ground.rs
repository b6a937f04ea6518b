use crate::state::State;
use crate::up;
use nalgebra::Vector3;

/// Upward acceleration [m/s^2] above which a grounded copter is considered to be taking off.
pub const TAKEOFF_ACCELERATION_THRESHOLD: f32 = 0.015;

/// Squared speed [m^2/s^2] below which the copter is considered stationary.
pub const STATIONARY_SPEED_SQ_THRESHOLD: f32 = 0.01;

/// Downward acceleration margin [m/s^2] between measurement and airborne prediction
/// that indicates the ground is supporting the copter.
pub const STATIONARY_ACC_MINIMUM_DIFF: f32 = 1.;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroundState {
    Grounded,
    Airborne,
}

/// Whether the airborne to grounded transition is armed.
///
/// The landing rule does not yet distinguish a slow hover from resting on the ground,
/// so it stays disabled unless explicitly enabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LandingDetection {
    #[default]
    Disabled,
    Enabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Takeoff,
    Landing,
}

/// Guesses whether the copter rests on a surface, starting grounded.
#[derive(Clone, Debug)]
pub struct GroundDetector {
    state: GroundState,
    landing: LandingDetection,
}

impl Default for GroundDetector {
    fn default() -> Self {
        Self::new(LandingDetection::default())
    }
}

impl GroundDetector {
    pub fn new(landing: LandingDetection) -> Self {
        Self {
            state: GroundState::Grounded,
            landing,
        }
    }

    pub fn state(&self) -> GroundState {
        self.state
    }

    pub fn is_grounded(&self) -> bool {
        self.state == GroundState::Grounded
    }

    /// Update the guess from the latest estimate.
    ///
    /// `expected_airborne` returns the acceleration the model predicts while airborne,
    /// it is only evaluated when landing detection runs.
    pub fn update<F>(&mut self, state: &State, expected_airborne: F) -> Option<Transition>
    where
        F: FnOnce() -> Vector3<f32>,
    {
        match self.state {
            GroundState::Grounded => {
                if state.acceleration.dot(&up()) > TAKEOFF_ACCELERATION_THRESHOLD {
                    self.state = GroundState::Airborne;
                    return Some(Transition::Takeoff);
                }
            }
            GroundState::Airborne => {
                if self.landing == LandingDetection::Disabled {
                    return None;
                }

                let stationary = state.velocity.norm_squared() < STATIONARY_SPEED_SQ_THRESHOLD;
                let diff = state.acceleration - expected_airborne();

                // Less downward acceleration than free flight predicts while barely moving
                if stationary && diff.dot(&-up()) < STATIONARY_ACC_MINIMUM_DIFF {
                    self.state = GroundState::Grounded;
                    return Some(Transition::Landing);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GRAVITY;

    fn accelerating_up(a: f32) -> State {
        State {
            acceleration: Vector3::new(0., 0., a),
            ..Default::default()
        }
    }

    fn free_fall() -> Vector3<f32> {
        Vector3::new(0., 0., -GRAVITY)
    }

    #[test]
    fn starts_grounded() {
        assert_eq!(GroundDetector::default().state(), GroundState::Grounded);
    }

    #[test]
    fn takeoff_requires_strictly_exceeding_threshold() {
        let mut detector = GroundDetector::default();

        assert_eq!(
            detector.update(&accelerating_up(TAKEOFF_ACCELERATION_THRESHOLD), free_fall),
            None
        );
        assert!(detector.is_grounded());

        // Sideways acceleration does not count
        let sideways = State {
            acceleration: Vector3::new(1., 1., 0.),
            ..Default::default()
        };
        assert_eq!(detector.update(&sideways, free_fall), None);

        assert_eq!(
            detector.update(&accelerating_up(0.02), free_fall),
            Some(Transition::Takeoff)
        );
        assert_eq!(detector.state(), GroundState::Airborne);
    }

    #[test]
    fn takeoff_fires_once() {
        let mut detector = GroundDetector::default();
        assert_eq!(
            detector.update(&accelerating_up(1.), free_fall),
            Some(Transition::Takeoff)
        );

        for _ in 0..10 {
            assert_eq!(detector.update(&accelerating_up(1.), free_fall), None);
            assert_eq!(detector.state(), GroundState::Airborne);
        }
    }

    #[test]
    fn landing_never_fires_while_disabled() {
        let mut detector = GroundDetector::default();
        detector.update(&accelerating_up(1.), free_fall);

        // Resting on the ground with the motors off
        let resting = State::default();
        for _ in 0..100 {
            let transition = detector.update(&resting, || panic!("landing rule evaluated"));
            assert_eq!(transition, None);
        }
        assert_eq!(detector.state(), GroundState::Airborne);
    }

    #[test]
    fn enabled_landing_detects_ground_support() {
        let mut detector = GroundDetector::new(LandingDetection::Enabled);
        detector.update(&accelerating_up(1.), free_fall);

        // Moving quickly, never considered landed
        let moving = State {
            velocity: Vector3::new(1., 0., 0.),
            ..Default::default()
        };
        assert_eq!(detector.update(&moving, free_fall), None);

        assert_eq!(
            detector.update(&State::default(), free_fall),
            Some(Transition::Landing)
        );
        assert!(detector.is_grounded());
    }
}
