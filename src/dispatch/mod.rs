//! Actuator command dispatcher.
//!
//! [`ActuatorDispatcher`] owns one long-lived worker thread that performs
//! every device round trip, so a slow or dead plug never stalls the control
//! tick.  The control loop only ever sees [`CommandResult`] messages; no
//! actuator state crosses the thread boundary.

pub mod channels;
pub mod limiter;
pub mod worker;

use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, info, warn};

use crate::app::commands::{ActuatorCommand, CommandResult};
use crate::app::ports::{ActuatorLink, DispatchError, PlugPort};
use channels::{CommandChannel, ResultChannel, WorkerMsg};
pub use limiter::{CommandLimiter, CommandRecord};
pub use worker::{DispatchSettings, execute_command};

const SHUTDOWN_POLL: std::time::Duration = std::time::Duration::from_millis(10);

pub struct ActuatorDispatcher {
    commands: Arc<CommandChannel>,
    results: Arc<ResultChannel>,
    worker: Option<JoinHandle<()>>,
}

impl ActuatorDispatcher {
    /// Start the worker thread.  It runs until [`shutdown`](Self::shutdown)
    /// or drop.
    pub fn spawn<P>(plug: P, settings: DispatchSettings) -> std::io::Result<Self>
    where
        P: PlugPort + Send + 'static,
    {
        let commands = Arc::new(CommandChannel::new());
        let results = Arc::new(ResultChannel::new());
        let (rx, tx) = (Arc::clone(&commands), Arc::clone(&results));
        let worker = std::thread::Builder::new()
            .name("dispatch".into())
            .spawn(move || {
                futures_lite::future::block_on(worker::run(plug, rx, tx, settings));
            })?;
        Ok(Self {
            commands,
            results,
            worker: Some(worker),
        })
    }

    /// Enqueue a command without blocking.
    pub fn submit(&self, cmd: ActuatorCommand) -> Result<(), DispatchError> {
        if self.worker.as_ref().is_none_or(JoinHandle::is_finished) {
            return Err(DispatchError::WorkerGone);
        }
        self.commands
            .try_send(WorkerMsg::Command(cmd))
            .map_err(|_| DispatchError::QueueFull)
    }

    pub fn try_result(&self) -> Option<CommandResult> {
        self.results.try_receive().ok()
    }

    /// Every result available right now.
    pub fn drain_results(&self) -> Vec<CommandResult> {
        core::iter::from_fn(|| self.try_result()).collect()
    }

    /// Let queued and in-flight commands finish, then join the worker.
    /// Returns every result produced meanwhile.
    pub fn shutdown(&mut self) -> Vec<CommandResult> {
        let mut late = Vec::new();
        let Some(worker) = self.worker.take() else {
            return late;
        };
        if worker.is_finished() {
            warn!("dispatch: worker exited early");
        } else {
            // The worker may be parked on a full result channel, so keep
            // draining while the stop request waits for space.
            while self.commands.try_send(WorkerMsg::Shutdown).is_err() && !worker.is_finished() {
                late.extend(self.drain_results());
                std::thread::sleep(SHUTDOWN_POLL);
            }
            while !worker.is_finished() {
                late.extend(self.drain_results());
                std::thread::sleep(SHUTDOWN_POLL);
            }
        }
        if worker.join().is_err() {
            warn!("dispatch: worker panicked");
        }
        late.extend(self.drain_results());
        info!("dispatch: shut down ({} late results)", late.len());
        late
    }
}

impl ActuatorLink for ActuatorDispatcher {
    fn submit(&self, cmd: ActuatorCommand) -> Result<(), DispatchError> {
        ActuatorDispatcher::submit(self, cmd)
    }

    fn poll_result(&self) -> Option<CommandResult> {
        self.try_result()
    }
}

impl Drop for ActuatorDispatcher {
    fn drop(&mut self) {
        let late = self.shutdown();
        if !late.is_empty() {
            debug!("dispatch: {} results discarded on drop", late.len());
        }
    }
}
