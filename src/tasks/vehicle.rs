//! Drives the vehicle: drains commands, reads the state and runs one control period.

use super::periodic;
use crate::command::{Command, CommandReceiver, GlobalCommand};
use crate::error::TaskError;
use crate::state::StateHandle;
use crate::vehicle::Vehicle;
use core::time::Duration;
use log::{debug, error, info, warn};

/// Initialize `vehicle` and control it every `period`.
///
/// Returns only if initialization fails, which is fatal.
pub async fn run<V>(
    mut vehicle: V,
    mut commands: CommandReceiver,
    state: StateHandle,
    period: Duration,
) -> Result<(), TaskError>
where
    V: Vehicle,
{
    if let Err(e) = vehicle.init() {
        error!("Vehicle init failed! {}", e);
        return Err(TaskError::VehicleInit(e));
    }
    info!("Vehicle initialized");

    let (mut interval, dt) = periodic(period);
    loop {
        interval.tick().await;
        step(&mut vehicle, &mut commands, &state, dt);
    }
}

/// Run one control period.
/// Every queued command is handled before the state is read and the vehicle updated.
fn step<V: Vehicle>(vehicle: &mut V, commands: &mut CommandReceiver, state: &StateHandle, dt: f32) {
    while let Some(command) = commands.get_command() {
        if !vehicle.handle_command(&command) {
            handle_global(&command);
        }
    }

    let state = state.get_state();
    vehicle.update(&state, dt);
}

/// Handle a command the vehicle rejected.
fn handle_global(command: &Command) {
    match command {
        Command::Global(GlobalCommand::Heartbeat) => debug!("Heartbeat"),
        other => warn!("Dropping unhandled command {:?}", other),
    }
}
