//! Log-only notification transport.
//!
//! Implements [`NotifierPort`] by writing each notification to the log at
//! `warn`.  Stands in for the email / push transport on bench setups.

use log::warn;

use crate::app::ports::{NotifierPort, NotifyError};

#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: u64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl NotifierPort for LogNotifier {
    fn send(&mut self, subject: &str, body: &str) -> Result<(), NotifyError> {
        if subject.trim().is_empty() {
            return Err(NotifyError::Delivery("empty subject".into()));
        }
        self.sent += 1;
        warn!("NOTIFY | {subject} | {body}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_deliveries() {
        let mut n = LogNotifier::new();
        n.send("[Vessel] safety shutdown", "sensor lost").unwrap();
        assert!(n.send(" ", "body").is_err());
        assert_eq!(n.sent(), 1);
    }
}
