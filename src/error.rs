use crate::config::ConfigError;
use crate::vehicle::VehicleError;
use thiserror::Error;

/// Failure to bring the system up. No task has been spawned when this is returned.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("required device unavailable: {0}")]
    DeviceUnavailable(&'static str),

    #[error("invalid configuration")]
    Config(#[from] ConfigError),
}

impl StartupError {
    /// Process exit status for this error, never zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DeviceUnavailable(_) | Self::Config(_) => 1,
        }
    }
}

/// Unrecoverable failure of a running task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("vehicle initialization failed")]
    VehicleInit(#[source] VehicleError),

    #[error("task panicked or was cancelled")]
    Join(#[from] tokio::task::JoinError),
}
