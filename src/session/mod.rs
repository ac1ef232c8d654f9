//! Session abstraction over the publish/subscribe engine
//!
//! The rest of the crate talks to the broker exclusively through [`Session`],
//! which keeps the supervisor and scheduler free of wire-protocol detail and
//! lets tests run against an in-memory mock. The production implementation
//! is [`RumqttSession`].

use thiserror::Error;

pub mod rumqtt;

pub use rumqtt::RumqttSession;

/// Callback invoked synchronously for every inbound message while
/// `service()` runs: `(topic, payload)`. Messages are delivered once each,
/// in arrival order, and are not retained after the call returns.
pub type MessageCallback = Box<dyn FnMut(&str, &[u8])>;

/// Connection lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A logical publish/subscribe connection to a broker.
///
/// `service()` must be called frequently (on the order of 100 ms) to keep
/// the session alive server-side and to dispatch inbound messages. It drains
/// whatever is currently queued and returns without waiting for new data.
pub trait Session {
    fn is_connected(&self) -> bool;

    /// Open a fresh session under `client_id`. Bounded by the transport's
    /// own acknowledgement timeout.
    fn connect(&mut self, client_id: &str) -> Result<(), SessionError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), SessionError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError>;

    /// Drain queued inbound traffic, invoking the message callback for each
    /// message, and let the protocol engine exchange keepalives. A transport
    /// failure marks the session disconnected and surfaces as
    /// [`SessionError::SessionDropped`].
    fn service(&mut self) -> Result<(), SessionError>;

    /// Tear the session down for process shutdown. Best effort; the session
    /// reports disconnected afterwards.
    fn close(&mut self);
}

/// Session-layer failures.
///
/// None of these are fatal to the process: connect-time errors feed the
/// supervisor's retry loop, subscribe and publish failures are logged and
/// dropped, and a dropped session is re-established on the next loop
/// iteration.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The network layer refused or never completed the connection.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The broker answered the connect attempt with a refusal. At this layer
    /// it is handled exactly like an unavailable transport: retry after the
    /// fixed delay.
    #[error("broker rejected connection: {0}")]
    BrokerRejected(String),

    #[error("subscribe to {topic} failed: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    #[error("publish to {topic} failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    /// Transport failure observed while servicing an established session.
    #[error("session dropped: {0}")]
    SessionDropped(String),

    /// Publish or subscribe attempted without a live session.
    #[error("not connected")]
    NotConnected,
}
