//! Dispatcher worker loop.
//!
//! One command at a time, in FIFO order:
//!
//! ```text
//!  receive ──▶ cooldown? ──yes──▶ Suppressed
//!                 │no
//!                 ▼
//!         wake ─▶ set_power ─▶ read_power ─▶ matches? ──▶ Success
//!          │         │             │            │no
//!          └─────────┴── timeout / error ───────┴──────▶ Failed
//! ```
//!
//! Each step is bounded by the device timeout.  Adapters must yield (await)
//! while waiting on I/O, or the timeout cannot interrupt them.

use core::future::Future;
use std::sync::Arc;

use embassy_time::{Duration, Instant, with_timeout};
use log::{debug, info, warn};

use super::channels::{CommandChannel, ResultChannel, WorkerMsg};
use super::limiter::CommandLimiter;
use crate::app::commands::{ActuatorCommand, CommandResult};
use crate::app::ports::PlugPort;
use crate::config::SystemConfig;
use crate::error::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Bound on each device step.
    pub device_timeout: Duration,
    /// Identical successful commands inside this window are suppressed.
    pub cooldown: Duration,
}

impl DispatchSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            device_timeout: Duration::from_millis(config.device_timeout_ms),
            cooldown: Duration::from_secs(config.command_cooldown_secs),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

/// Run one command against the device: wake, set, verify.
pub async fn execute_command<P: PlugPort>(
    plug: &mut P,
    cmd: &ActuatorCommand,
    timeout: Duration,
) -> Result<(), DeviceError> {
    let id = cmd.actuator_id.as_str();
    let on = cmd.action.is_on();
    step(timeout, plug.wake(id)).await?;
    step(timeout, plug.set_power(id, on)).await?;
    let observed = step(timeout, plug.read_power(id)).await?;
    if observed != on {
        return Err(DeviceError::VerifyMismatch {
            requested: on,
            observed,
        });
    }
    Ok(())
}

async fn step<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, DeviceError>>,
) -> Result<T, DeviceError> {
    with_timeout(timeout, fut).await.map_err(|_| DeviceError::Timeout)?
}

/// Process commands until `Shutdown`.  Returns the plug so tests can
/// inspect it.
pub async fn run<P: PlugPort>(
    mut plug: P,
    commands: Arc<CommandChannel>,
    results: Arc<ResultChannel>,
    settings: DispatchSettings,
) -> P {
    let mut limiter = CommandLimiter::new(settings.cooldown);
    info!(
        "dispatch: worker started (timeout {}ms, cooldown {}s)",
        settings.device_timeout.as_millis(),
        settings.cooldown.as_secs()
    );

    loop {
        let cmd = match commands.receive().await {
            WorkerMsg::Command(cmd) => cmd,
            WorkerMsg::Shutdown => break,
        };

        let result = if limiter.should_suppress(&cmd, Instant::now()) {
            debug!("dispatch: {} {} suppressed (cooldown)", cmd.actuator_id, cmd.action);
            CommandResult::suppressed(&cmd)
        } else {
            match execute_command(&mut plug, &cmd, settings.device_timeout).await {
                Ok(()) => {
                    info!("dispatch: {} {} ok", cmd.actuator_id, cmd.action);
                    CommandResult::success(&cmd)
                }
                Err(e) => {
                    warn!("dispatch: {} {} failed: {e}", cmd.actuator_id, cmd.action);
                    CommandResult::failed(&cmd, e.to_string())
                }
            }
        };
        limiter.record(&result, Instant::now());
        results.send(result).await;
    }

    info!("dispatch: worker stopped");
    plug
}
