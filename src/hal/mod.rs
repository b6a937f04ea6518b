use core::time::Duration;
use nalgebra::{Matrix3, Vector3};

pub mod bridge;
pub use bridge::{BridgeError, Completion};

/// A finished buffer transfer.
#[derive(Debug)]
pub struct Transfer {
    /// The buffer handed to the device when the transfer was started.
    pub buf: Vec<u8>,

    /// Number of bytes transferred if positive, a failure otherwise.
    pub status: isize,
}

impl Transfer {
    /// Returns the number of bytes transferred, or `None` if the transfer failed.
    pub fn transferred(&self) -> Option<usize> {
        usize::try_from(self.status).ok().filter(|&n| n > 0)
    }
}

/// Character device such as a serial port or radio link.
///
/// Asynchronous operations take ownership of the buffer for the lifetime of the transfer.
/// The device must invoke the [`Completion`] exactly once, from any context, with the
/// buffer and a signed byte count. A device that can not start the operation returns
/// the buffer in `Err` without touching the completion.
pub trait CharDevice: Send + 'static {
    /// Best-effort liveness check waiting at most `timeout`.
    fn probe(&mut self, timeout: Duration) -> bool;

    /// Returns `true` if [`read_async`](CharDevice::read_async) and
    /// [`write_async`](CharDevice::write_async) are supported.
    fn is_async_available(&self) -> bool {
        false
    }

    /// Start reading `buf.len()` bytes into `buf`.
    fn read_async(&mut self, buf: Vec<u8>, done: Completion<Transfer>) -> Result<(), Vec<u8>> {
        drop(done);
        Err(buf)
    }

    /// Start writing all of `buf`.
    fn write_async(&mut self, buf: Vec<u8>, done: Completion<Transfer>) -> Result<(), Vec<u8>> {
        drop(done);
        Err(buf)
    }

    /// Blocking read waiting at most `timeout`.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> isize;

    /// Blocking write waiting at most `timeout`.
    fn write(&mut self, buf: &[u8], timeout: Duration) -> isize;
}

/// A three-axis inertial sensor (accelerometer or gyroscope).
pub trait InertialSensor: Send + 'static {
    fn probe(&mut self) -> bool;

    /// Sample the sensor in its own frame, `None` if the sample failed.
    fn read(&mut self) -> Option<Vector3<f32>>;
}

/// Static calibration mapping a raw sensor sample into the body frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    pub transform: Matrix3<f32>,
    pub bias: Vector3<f32>,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            transform: Matrix3::identity(),
            bias: Vector3::zeros(),
        }
    }
}

impl Calibration {
    pub fn new(transform: Matrix3<f32>, bias: Vector3<f32>) -> Self {
        Self { transform, bias }
    }

    pub fn apply(&self, raw: Vector3<f32>) -> Vector3<f32> {
        self.transform * (raw - self.bias)
    }
}

/// An inertial sensor paired with its calibration.
pub struct SensorDevice<S> {
    pub sensor: S,
    pub calibration: Calibration,
}

impl<S> SensorDevice<S> {
    pub fn new(sensor: S, calibration: Calibration) -> Self {
        Self {
            sensor,
            calibration,
        }
    }
}
