//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements     | Connects to                      |
//! |----------------|----------------|----------------------------------|
//! | `config_file`  | ConfigPort     | Flat JSON file, atomic rename    |
//! | `event_log`    | EventSink      | JSON-lines file                  |
//! | `log_sink`     | EventSink      | `log` facade                     |
//! | `log_notifier` | NotifierPort   | `log` facade                     |
//! | `sensor_feed`  | -              | stdin → SensorRegistry           |
//! | `sim_plug`     | PlugPort       | In-memory relays with latency    |
//! | `time`         | ClockPort      | System wall clock                |

pub mod config_file;
pub mod event_log;
pub mod log_notifier;
pub mod log_sink;
pub mod sensor_feed;
pub mod sim_plug;
pub mod time;
