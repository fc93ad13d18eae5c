//! Incident notifications.
//!
//! [`NotificationQueue`] owns dedupe and retry policy; [`task`] runs it on a
//! worker thread; [`NotifyHandle`] is the control loop's side of the channel
//! and implements [`AlertPort`].

pub mod queue;
pub mod task;

use core::cell::RefCell;
use std::sync::Arc;
use std::thread::JoinHandle;

use embassy_sync::channel::TrySendError;
use embassy_time::Duration;
use log::{info, warn};

pub use queue::{
    IncidentKey, IncidentKind, Notification, NotificationQueue, NotificationTicket, RetryPolicy,
    TriggerOutcome,
};
use task::{NotifyRequest, RequestChannel};

use crate::app::ports::{AlertPort, ClockPort, NotifierPort};
use crate::config::SystemConfig;

/// Requests held back while the channel is full.
pub const BACKLOG_DEPTH: usize = 32;

/// Control-loop handle to the notification worker.
///
/// Requests that do not fit in the channel wait in a local backlog and are
/// handed over, in order, on the next request or [`AlertPort::flush`].
pub struct NotifyHandle {
    requests: Arc<RequestChannel>,
    backlog: RefCell<heapless::Deque<NotifyRequest, BACKLOG_DEPTH>>,
    worker: Option<JoinHandle<()>>,
}

impl NotifyHandle {
    /// Start the worker thread.
    pub fn spawn<N, C>(transport: N, clock: C, config: &SystemConfig) -> std::io::Result<Self>
    where
        N: NotifierPort + Send + 'static,
        C: ClockPort + Send + 'static,
    {
        let requests = Arc::new(RequestChannel::new());
        let queue = NotificationQueue::new(RetryPolicy::from_config(config));
        let poll = Duration::from_secs(config.notify_poll_secs);
        let rx = Arc::clone(&requests);
        let worker = std::thread::Builder::new()
            .name("notify".into())
            .spawn(move || {
                futures_lite::future::block_on(task::run(rx, queue, transport, clock, poll));
            })?;
        Ok(Self {
            requests,
            backlog: RefCell::new(heapless::Deque::new()),
            worker: Some(worker),
        })
    }

    /// Stop the worker after it has processed everything already queued.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if worker.is_finished() {
            warn!("notify: worker exited early");
        } else {
            let backlog = self.backlog.get_mut();
            let held: Vec<NotifyRequest> = core::iter::from_fn(|| backlog.pop_front()).collect();
            futures_lite::future::block_on(async {
                for req in held {
                    self.requests.send(req).await;
                }
                self.requests.send(NotifyRequest::Shutdown).await;
            });
        }
        if worker.join().is_err() {
            warn!("notify: worker panicked");
        }
        info!("notify: shut down");
    }

    /// Requests waiting for room in the channel.
    pub fn backlog_len(&self) -> usize {
        self.backlog.borrow().len()
    }

    fn push(&self, req: NotifyRequest) {
        self.drain_backlog();
        let mut backlog = self.backlog.borrow_mut();
        let req = if backlog.is_empty() {
            match self.requests.try_send(req) {
                Ok(()) => return,
                Err(TrySendError::Full(req)) => req,
            }
        } else {
            req
        };
        if backlog.push_back(req).is_err() {
            warn!("notify: request channel and backlog full, dropping request");
        }
    }

    fn drain_backlog(&self) {
        let mut backlog = self.backlog.borrow_mut();
        while let Some(req) = backlog.pop_front() {
            if let Err(TrySendError::Full(req)) = self.requests.try_send(req) {
                // Keep the order: it goes back to the front.
                let _ = backlog.push_front(req);
                break;
            }
        }
    }
}

impl AlertPort for NotifyHandle {
    fn raise(&self, key: IncidentKey, notification: Notification) {
        self.push(NotifyRequest::Raise { key, notification });
    }

    fn clear(&self, key: IncidentKey) {
        self.push(NotifyRequest::Clear(key));
    }

    fn flush(&self) {
        self.drain_backlog();
    }
}

impl Drop for NotifyHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
