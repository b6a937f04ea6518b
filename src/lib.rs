//! # flight-pipeline
//! Real-time estimation and control pipeline for multi-copters
//!
//! # Pipeline
//! [`system::start`] probes the devices and spawns one task per stage:
//! sensor producers, the [`StateEstimator`], the command receiver, the [`Vehicle`]
//! and optionally telemetry.
//!
//! [`hal`] contains the device boundary and the notification bridge
//! turning callback-completed transfers into awaitable calls.
//!
//! [`codec`] contains the decoder and encoder boundaries.
//!
//! # Multi-copter components
//! [`Copter`] implements the vehicle and dynamics model for a multi-copter,
//! controlled by a [`CopterController`](copter::CopterController) such as the
//! [`RateController`](copter::RateController).
//!
//! ```ignore
//! use flight_pipeline::{system, Config};
//!
//! let config = Config::builder().vehicle_period(Duration::from_millis(5)).build()?;
//! let system = system::start(devices, components, &config)?;
//! system.join().await?;
//! ```

use nalgebra::Vector3;

pub mod codec;

pub mod command;
pub use command::Command;

pub mod config;
pub use config::Config;

pub mod copter;
pub use copter::Copter;

pub mod error;
pub use error::{StartupError, TaskError};

pub mod hal;

pub mod state;
pub use state::{State, StateEstimator};

pub mod system;
pub use system::System;

pub mod tasks;

pub mod vehicle;
pub use vehicle::{DynamicsModel, Vehicle};

/// Standard gravity [m/s^2]
pub const GRAVITY: f32 = 9.81;

/// The global `up` axis.
pub fn up() -> Vector3<f32> {
    Vector3::z()
}

/// Gravitational acceleration in the global frame.
pub fn gravity() -> Vector3<f32> {
    up() * -GRAVITY
}
