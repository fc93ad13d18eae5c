//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every [`ControlEvent`] through the
//! `log` facade, one line per event.  Failures and safety events go out at
//! `warn`, command chatter at `debug`, the rest at `info`.

use log::{Level, log};

use crate::app::events::{ControlEvent, EventType};
use crate::app::ports::EventSink;

#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn level(ty: EventType) -> Level {
    match ty {
        EventType::CommandFailed
        | EventType::PendingExpired
        | EventType::SafetyShutdown
        | EventType::ConfigInvalid
        | EventType::ConfigRejected
        | EventType::AnomalyDetected => Level::Warn,
        EventType::CommandIssued | EventType::CommandSucceeded | EventType::CommandSuppressed => {
            Level::Debug
        }
        _ => Level::Info,
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &ControlEvent) {
        let value = event
            .value
            .map_or_else(|| "--".to_owned(), |v| format!("{v:.1}"));
        log!(
            level(event.event_type),
            "EVENT | {} | sensor={} actuator={} value={} | {}",
            event.event_type.as_str(),
            event.sensor_id.as_deref().unwrap_or("-"),
            event.actuator_id.as_deref().unwrap_or("-"),
            value,
            event.detail,
        );
    }
}

/// Fans one event out to two sinks.
pub struct TeeSink<A, B>(pub A, pub B);

impl<A: EventSink, B: EventSink> EventSink for TeeSink<A, B> {
    fn emit(&mut self, event: &ControlEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

/// An absent sink drops everything.
impl<T: EventSink> EventSink for Option<T> {
    fn emit(&mut self, event: &ControlEvent) {
        if let Some(sink) = self {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Count(usize);

    impl EventSink for Count {
        fn emit(&mut self, _event: &ControlEvent) {
            self.0 += 1;
        }
    }

    #[test]
    fn failures_log_at_warn() {
        assert_eq!(level(EventType::CommandFailed), Level::Warn);
        assert_eq!(level(EventType::CommandIssued), Level::Debug);
        assert_eq!(level(EventType::Telemetry), Level::Info);
    }

    #[test]
    fn tee_reaches_both() {
        let mut tee = TeeSink(Count::default(), Count::default());
        tee.emit(&ControlEvent::new(0, EventType::Started));
        assert_eq!((tee.0.0, tee.1.0), (1, 1));
    }
}
