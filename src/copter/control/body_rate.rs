use nalgebra::Vector3;

#[derive(Clone, Debug)]
pub struct BodyRateController {
    pub k_p: Vector3<f32>,

    /// Diagonal of the moment of inertia [kg*m^2].
    pub moment_of_inertia: Vector3<f32>,

    /// Largest torque norm to output [N*m].
    pub max_torque: f32,
}

impl Default for BodyRateController {
    fn default() -> Self {
        Self {
            k_p: Vector3::new(20., 20., 5.),
            moment_of_inertia: Vector3::new(0.005, 0.005, 0.01),
            max_torque: 1.,
        }
    }
}

impl BodyRateController {
    pub fn new(moment_of_inertia: Vector3<f32>) -> Self {
        Self {
            moment_of_inertia,
            ..Default::default()
        }
    }

    /// Generate the roll, pitch, yaw moment commands in the body frame in Newtons*meters
    pub fn control(&self, body_rate_cmd: Vector3<f32>, body_rate: Vector3<f32>) -> Vector3<f32> {
        let taus = self
            .moment_of_inertia
            .component_mul(&self.k_p.component_mul(&(body_rate_cmd - body_rate)));
        let taus_mod = taus.norm();

        if taus_mod > self.max_torque {
            taus * self.max_torque / taus_mod
        } else {
            taus
        }
    }
}
