//! Mock session and manual clock
//!
//! `MockSession` records every operation, can be scripted to refuse
//! connects, fail subscribes or publishes, queue inbound messages, and drop
//! mid-service. `ManualClock` advances virtual time on `sleep`, so retry
//! loops run instantly in tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use crate::clock::Clock;
use crate::session::{MessageCallback, Session, SessionError};

/// Scripted in-memory [`Session`].
#[derive(Default)]
pub struct MockSession {
    connected: bool,
    /// Pending connect refusals; once drained, connects succeed.
    connect_failures: u32,
    pub fail_subscribes: bool,
    pub fail_publishes: bool,
    /// When set, the next `service()` call reports the session dropped.
    drop_on_service: bool,
    inbound: VecDeque<(String, Vec<u8>)>,
    callback: Option<MessageCallback>,

    /// Client ids seen by `connect`, in order.
    pub connect_ids: Vec<String>,
    /// Topics successfully subscribed, in order (re-subscriptions repeat).
    pub subscribed: Vec<String>,
    /// `(topic, payload)` pairs successfully published, in order.
    pub published: Vec<(String, Vec<u8>)>,
    /// Number of `service()` calls.
    pub service_calls: usize,
    /// Flat operation log for ordering assertions: `connect`, `subscribe`,
    /// `publish`, `service`.
    pub ops: Vec<&'static str>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that starts out connected.
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    /// Refuse the next `n` connect attempts.
    pub fn script_connect_failures(&mut self, n: u32) {
        self.connect_failures = n;
    }

    /// Simulate a transport loss outside of `service()`.
    pub fn force_drop(&mut self) {
        self.connected = false;
    }

    /// Make the next `service()` call fail and disconnect the session.
    pub fn drop_during_next_service(&mut self) {
        self.drop_on_service = true;
    }

    /// Queue an inbound message for dispatch during the next `service()`.
    pub fn push_inbound(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.inbound.push_back((topic.into(), payload.into()));
    }

    /// Register the message callback, as the production adapter does at
    /// construction.
    pub fn on_message(&mut self, callback: MessageCallback) {
        self.callback = Some(callback);
    }
}

impl Session for MockSession {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self, client_id: &str) -> Result<(), SessionError> {
        self.ops.push("connect");
        self.connect_ids.push(client_id.to_string());
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(SessionError::TransportUnavailable(
                "scripted refusal".to_string(),
            ));
        }
        self.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        self.ops.push("subscribe");
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        if self.fail_subscribes {
            return Err(SessionError::SubscribeFailed {
                topic: topic.to_string(),
                reason: "scripted refusal".to_string(),
            });
        }
        self.subscribed.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        self.ops.push("publish");
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        if self.fail_publishes {
            return Err(SessionError::PublishFailed {
                topic: topic.to_string(),
                reason: "scripted refusal".to_string(),
            });
        }
        self.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn service(&mut self) -> Result<(), SessionError> {
        self.ops.push("service");
        self.service_calls += 1;
        if !self.connected {
            return Ok(());
        }
        if self.drop_on_service {
            self.drop_on_service = false;
            self.connected = false;
            return Err(SessionError::SessionDropped(
                "scripted drop".to_string(),
            ));
        }
        // Dispatch exactly the queued set; messages arriving "later" are
        // left for the next call.
        let pending: Vec<_> = self.inbound.drain(..).collect();
        if let Some(callback) = self.callback.as_mut() {
            for (topic, payload) in &pending {
                callback(topic, payload);
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
    }
}

/// [`Clock`] under manual control. `sleep` advances virtual time by the
/// requested duration and records it.
#[derive(Default)]
pub struct ManualClock {
    now: Cell<u64>,
    sleeps: RefCell<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(start_millis: u64) -> Self {
        let clock = Self::default();
        clock.now.set(start_millis);
        clock
    }

    pub fn advance(&self, millis: u64) {
        self.now.set(self.now.get() + millis);
    }

    /// Durations passed to `sleep`, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.now.set(self.now.get() + duration.as_millis() as u64);
    }
}
