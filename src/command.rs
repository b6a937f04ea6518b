//! Operator commands and the bounded channel carrying them from the receiver to the vehicle.

use core::time::Duration;
use log::{error, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::SendTimeoutError};

/// A decoded operator command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Command for a copter vehicle.
    Copter(CopterCommand),

    /// Command for the system as a whole rather than a vehicle.
    Global(GlobalCommand),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CopterCommand {
    /// Track a body angular velocity [rad/s] with a collective thrust [N].
    SetAngularVelocity {
        angular_velocity: Vector3<f32>,
        thrust: f32,
    },

    /// Track a global velocity [m/s] while facing `direction` (heading in radians).
    SetLinearVelocity {
        velocity: Vector3<f32>,
        direction: f32,
    },

    /// A copter command whose payload tag this build does not know.
    Unrecognized(u32),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlobalCommand {
    Heartbeat,
}

/// Create a command channel holding up to `capacity` commands.
///
/// The sender waits at most `send_timeout` for space before dropping a command.
pub fn channel(capacity: usize, send_timeout: Duration) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (CommandSender { tx, send_timeout }, CommandReceiver { rx })
}

/// Producing end, owned by the receiver task.
#[derive(Debug)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
    send_timeout: Duration,
}

impl CommandSender {
    /// Queue `command`, waiting a bounded time for space.
    /// Returns `false` if the command was dropped.
    pub async fn send(&self, command: Command) -> bool {
        match self.tx.send_timeout(command, self.send_timeout).await {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(command)) => {
                warn!("Command queue full, dropping {:?}", command);
                false
            }
            Err(SendTimeoutError::Closed(_)) => {
                error!("Command consumer is gone!");
                false
            }
        }
    }
}

/// Consuming end, drained by the vehicle task.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<Command>,
}

impl CommandReceiver {
    /// Take the next queued command without waiting.
    /// Returns `None` immediately if the queue is empty.
    pub fn get_command(&mut self) -> Option<Command> {
        self.rx.try_recv().ok()
    }
}
