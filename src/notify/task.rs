//! Notification worker loop.
//!
//! Runs on its own thread so a slow mail server never stalls a control tick.
//! Wakes on every request and at least once per poll interval to drain due
//! retries.
//!
//! ```text
//!  control loop ──raise/clear──▶ [ channel ] ──▶ worker ──▶ NotifierPort
//!                                                 ▲   │
//!                                                 └───┘ poll → queue.tick()
//! ```

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, with_timeout};
use log::{debug, info};

use super::queue::{IncidentKey, Notification, NotificationQueue};
use crate::app::ports::{ClockPort, NotifierPort};

/// Request channel depth.
pub const REQUEST_DEPTH: usize = 16;

pub enum NotifyRequest {
    Raise {
        key: IncidentKey,
        notification: Notification,
    },
    Clear(IncidentKey),
    Shutdown,
}

pub type RequestChannel = Channel<CriticalSectionRawMutex, NotifyRequest, REQUEST_DEPTH>;

/// Drive the queue until a `Shutdown` request arrives.  Returns the queue so
/// callers (and tests) can inspect final ticket state.
pub async fn run<N: NotifierPort, C: ClockPort>(
    requests: Arc<RequestChannel>,
    mut queue: NotificationQueue,
    mut transport: N,
    clock: C,
    poll: Duration,
) -> NotificationQueue {
    info!("notify: worker started (poll {}s)", poll.as_secs());
    loop {
        match with_timeout(poll, requests.receive()).await {
            Ok(NotifyRequest::Raise { key, notification }) => {
                let outcome = queue.trigger(key, notification, clock.now_secs(), &mut transport);
                debug!("notify: trigger -> {outcome:?}");
            }
            Ok(NotifyRequest::Clear(key)) => queue.clear(&key),
            Ok(NotifyRequest::Shutdown) => break,
            Err(_) => {}
        }
        queue.tick(clock.now_secs(), &mut transport);
    }
    info!(
        "notify: worker stopped ({} delivered, {} abandoned, {} pending)",
        queue.delivered_count(),
        queue.abandoned_count(),
        queue.pending_count()
    );
    queue
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::app::ports::NotifyError;
    use crate::notify::queue::{IncidentKind, RetryPolicy};

    struct Recorder(Vec<String>);

    impl NotifierPort for Recorder {
        fn send(&mut self, subject: &str, _body: &str) -> Result<(), NotifyError> {
            self.0.push(subject.to_owned());
            Ok(())
        }
    }

    struct FixedClock(AtomicU64);

    impl ClockPort for FixedClock {
        fn now_secs(&self) -> u64 {
            self.0.load(Ordering::Relaxed)
        }
    }

    #[test]
    fn drains_requests_then_stops() {
        let ch = Arc::new(RequestChannel::new());
        let key = IncidentKey::new(IncidentKind::DeviceFailure, "heating");
        for _ in 0..3 {
            ch.try_send(NotifyRequest::Raise {
                key: key.clone(),
                notification: Notification::new("plug failed", "timeout"),
            })
            .ok();
        }
        ch.try_send(NotifyRequest::Shutdown).ok();

        let queue = futures_lite::future::block_on(run(
            ch,
            NotificationQueue::new(RetryPolicy::default()),
            Recorder(Vec::new()),
            FixedClock(AtomicU64::new(1_000)),
            Duration::from_millis(10),
        ));
        assert_eq!(queue.delivered_count(), 1);
        assert!(queue.ticket(&key).is_some());
    }
}
