//! Dispatcher channels.
//!
//! Uses `embassy-sync` bounded MPMC channels to bridge the synchronous
//! control loop with the async worker.  Each dispatcher owns its own pair,
//! shared with the worker thread through an `Arc`.
//!
//! ```text
//! ┌──────────────┐  WorkerMsg      ┌──────────────┐
//! │ Control Loop │───────────────▶│    Worker     │
//! │  (sync)      │◀───────────────│   (async)     │
//! └──────────────┘  CommandResult  └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::commands::{ActuatorCommand, CommandResult};

/// Channel depth for commands (control loop → worker).
pub const COMMAND_DEPTH: usize = 8;

/// Channel depth for results (worker → control loop).  Larger than the
/// command queue so a full backlog of results always fits.
pub const RESULT_DEPTH: usize = 16;

/// Inbound message for the worker.
pub enum WorkerMsg {
    Command(ActuatorCommand),
    /// Sent after every queued command, so those still run first.
    Shutdown,
}

pub type CommandChannel = Channel<CriticalSectionRawMutex, WorkerMsg, COMMAND_DEPTH>;
pub type ResultChannel = Channel<CriticalSectionRawMutex, CommandResult, RESULT_DEPTH>;
