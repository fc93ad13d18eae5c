//! BrewGuard: Main Entry Point
//!
//! Hexagonal architecture: a single control thread drives the
//! [`ControlService`] from the [`Scheduler`]; device I/O and notification
//! delivery each run on their own worker thread.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  sensor_feed      JsonConfigFile   LogEventSink   SystemClock  │
//! │  (stdin thread)   (ConfigPort)     JsonLinesSink  (ClockPort)  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            ControlService (pure logic)                 │    │
//! │  │  Engine · Safety · Merge guard · Metrics               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ActuatorDispatcher ("dispatch")   NotifyHandle ("notify")     │
//! │  SimulatedPlugs (PlugPort)         LogNotifier (NotifierPort)  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Environment:
//!
//! | Variable               | Default          |
//! |------------------------|------------------|
//! | `BREWGUARD_CONFIG`     | `brewguard.json` |
//! | `BREWGUARD_SETTINGS`   | none (defaults)  |
//! | `BREWGUARD_EVENT_LOG`  | none             |
//! | `RUST_LOG`             | `info`           |

#![deny(unused_must_use)]

use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use brewguard::adapters::config_file::{JsonConfigFile, load_system_config};
use brewguard::adapters::event_log::JsonLinesSink;
use brewguard::adapters::log_notifier::LogNotifier;
use brewguard::adapters::log_sink::{LogEventSink, TeeSink};
use brewguard::adapters::sensor_feed;
use brewguard::adapters::sim_plug::SimulatedPlugs;
use brewguard::adapters::time::SystemClock;
use brewguard::app::ports::{ClockPort, ConfigError, EventSink, JobKind, SchedulerDelegate};
use brewguard::app::service::ControlService;
use brewguard::dispatch::{ActuatorDispatcher, DispatchSettings};
use brewguard::notify::NotifyHandle;
use brewguard::scheduler::Scheduler;
use brewguard::sensors::{FreshnessPolicy, SensorRegistry};

/// Upper bound on one idle sleep, so a clock jump is noticed quickly.
const MAX_IDLE: std::time::Duration = std::time::Duration::from_secs(1);

// ── Scheduler delegate ────────────────────────────────────────
//
// Bridges the scheduler (which knows nothing about the controller) to the
// service and its collaborators.

struct Controller<S: EventSink> {
    service: ControlService,
    sensors: Arc<SensorRegistry>,
    dispatcher: ActuatorDispatcher,
    notify: NotifyHandle,
    store: JsonConfigFile,
    sink: S,
}

impl<S: EventSink> SchedulerDelegate for Controller<S> {
    fn on_job_due(&mut self, job: JobKind, now: u64) {
        match job {
            JobKind::ControlTick => {
                self.service
                    .tick(&self.sensors, &self.dispatcher, &self.notify, &mut self.sink, now);
                // Edits made to the file since the last reload are merged
                // before the snapshot is written over it.
                if let Err(e) = self.service.checkpoint(&self.store, &mut self.sink, now) {
                    warn!("snapshot not saved this tick: {e}");
                }
            }
            JobKind::ConfigReload => {
                match self.service.reload(&self.store, &mut self.sink, now) {
                    Ok(_) | Err(ConfigError::NotFound) => {}
                    Err(e) => warn!("config reload: {e}"),
                }
            }
            JobKind::Telemetry => self.service.report_telemetry(&self.sensors, &mut self.sink, now),
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("╔══════════════════════════════════════╗");
    info!("║  BrewGuard v{:<25}║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Settings and vessel config ─────────────────────────
    let settings_path = std::env::var_os("BREWGUARD_SETTINGS").map(PathBuf::from);
    let system = load_system_config(settings_path.as_deref())
        .with_context(|| format!("loading settings from {settings_path:?}"))?;

    let config_path = std::env::var_os("BREWGUARD_CONFIG")
        .map_or_else(|| PathBuf::from("brewguard.json"), PathBuf::from);
    let store = JsonConfigFile::new(config_path);
    let config = match store.load_initial(SystemClock.now_secs()) {
        Ok(cfg) => cfg,
        Err(e) => {
            // The merge guard will keep retrying on the reload cadence.
            warn!("config {} unreadable ({e}), starting from defaults", store.path().display());
            Default::default()
        }
    };

    // ── 3. Workers ────────────────────────────────────────────
    let clock = SystemClock;
    let sensors = Arc::new(SensorRegistry::new(FreshnessPolicy::from_config(&system)));
    // The feed thread is detached; the controller keeps running on stale
    // data (and shuts down safely) after stdin closes.
    sensor_feed::spawn(BufReader::new(std::io::stdin()), Arc::clone(&sensors), clock)
        .context("spawning sensor feed")?;

    let plugs = SimulatedPlugs::new(embassy_time::Duration::from_millis(50));
    let dispatcher = ActuatorDispatcher::spawn(plugs, DispatchSettings::from_config(&system))
        .context("spawning dispatcher")?;
    let notify = NotifyHandle::spawn(LogNotifier::new(), clock, &system).context("spawning notifier")?;

    // ── 4. Event sinks ────────────────────────────────────────
    let event_log = match std::env::var_os("BREWGUARD_EVENT_LOG") {
        Some(p) => {
            let path = PathBuf::from(p);
            Some(JsonLinesSink::append(&path).with_context(|| format!("opening {}", path.display()))?)
        }
        None => None,
    };
    let mut sink = TeeSink(LogEventSink::new(), event_log);

    // ── 5. Service + scheduler loop ───────────────────────────
    let now = clock.now_secs();
    let mut service = ControlService::new(&system, config, now);
    service.start(&mut sink, now);

    let mut scheduler = Scheduler::from_config(&system);
    let mut controller = Controller {
        service,
        sensors,
        dispatcher,
        notify,
        store,
        sink,
    };

    info!("Entering control loop");
    loop {
        scheduler.poll(clock.now_secs(), &mut controller);
        let idle = std::time::Duration::from_secs(scheduler.until_next(clock.now_secs()));
        std::thread::sleep(idle.min(MAX_IDLE));
    }
}
