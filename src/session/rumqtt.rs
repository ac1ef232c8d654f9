//! Session adapter over rumqttc's synchronous client
//!
//! Each connect attempt builds a fresh `Client`/`Connection` pair, and
//! success is reported only on an actual ConnAck from the broker, never on
//! queue acceptance. `service()` drains whatever events are already
//! available and returns; keepalive pings are exchanged by the protocol
//! engine as a side effect of polling it.

use std::time::{Duration, Instant};

use rumqttc::{Client, ConnectReturnCode, Connection, Event, MqttOptions, Packet, QoS};
use tracing::{debug, warn};

use super::{MessageCallback, Session, SessionError, SessionState};

/// Outstanding-request capacity of the rumqttc client channel.
const REQUEST_QUEUE_CAPACITY: usize = 10;

/// Connection parameters for [`RumqttSession`].
pub struct SessionOptions {
    pub host: String,
    pub port: u16,
    pub keep_alive: Duration,
    /// Upper bound on the ConnAck wait during `connect`.
    pub connect_timeout: Duration,
}

/// [`Session`] implementation over rumqttc (MQTT 3.1.1, at-most-once).
pub struct RumqttSession {
    options: SessionOptions,
    client: Option<Client>,
    connection: Option<Connection>,
    state: SessionState,
    on_message: MessageCallback,
}

impl RumqttSession {
    /// The message callback is registered once here and invoked from
    /// `service()` for every inbound publish.
    pub fn new(options: SessionOptions, on_message: MessageCallback) -> Self {
        Self {
            options,
            client: None,
            connection: None,
            state: SessionState::Disconnected,
            on_message,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn teardown(&mut self) {
        self.client = None;
        self.connection = None;
        self.state = SessionState::Disconnected;
    }
}

impl Session for RumqttSession {
    fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    fn connect(&mut self, client_id: &str) -> Result<(), SessionError> {
        self.teardown();
        self.state = SessionState::Connecting;

        let mut mqtt_options =
            MqttOptions::new(client_id, self.options.host.clone(), self.options.port);
        mqtt_options.set_keep_alive(self.options.keep_alive);
        mqtt_options.set_clean_session(true);

        let (client, mut connection) = Client::new(mqtt_options, REQUEST_QUEUE_CAPACITY);
        match wait_for_connack(&mut connection, self.options.connect_timeout) {
            Ok(()) => {
                self.client = Some(client);
                self.connection = Some(connection);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Disconnected;
                Err(err)
            }
        }
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        let client = match self.client.as_mut() {
            Some(client) if self.state == SessionState::Connected => client,
            _ => return Err(SessionError::NotConnected),
        };
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|err| SessionError::SubscribeFailed {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        let client = match self.client.as_mut() {
            Some(client) if self.state == SessionState::Connected => client,
            _ => return Err(SessionError::NotConnected),
        };
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|err| SessionError::PublishFailed {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }

    fn service(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Connected {
            return Ok(());
        }
        let connection = match self.connection.as_mut() {
            Some(connection) => connection,
            None => return Ok(()),
        };

        loop {
            match connection.try_recv() {
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    debug!(topic = %publish.topic, len = publish.payload.len(), "inbound message");
                    (self.on_message)(&publish.topic, &publish.payload);
                }
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    warn!("broker closed the session");
                    self.teardown();
                    return Err(SessionError::SessionDropped(
                        "broker disconnected".to_string(),
                    ));
                }
                Ok(Ok(_)) => {
                    // Acks, pings and outgoing notifications keep the
                    // engine's state machine moving; nothing to dispatch.
                }
                Ok(Err(err)) => {
                    self.teardown();
                    return Err(SessionError::SessionDropped(err.to_string()));
                }
                Err(_) => break, // nothing queued right now
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(client) = self.client.as_mut() {
            let _ = client.disconnect();
        }
        self.teardown();
    }
}

/// Drive a fresh connection until the broker acknowledges the session.
///
/// Acceptance is the ConnAck packet alone: connection errors map to
/// `TransportUnavailable`, a refusal code to `BrokerRejected`, and an
/// exhausted window to `TransportUnavailable`.
fn wait_for_connack(
    connection: &mut Connection,
    timeout: Duration,
) -> Result<(), SessionError> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SessionError::TransportUnavailable(
                "timed out waiting for broker acknowledgement".to_string(),
            ));
        }
        match connection.recv_timeout(remaining) {
            Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(SessionError::BrokerRejected(format!("{code:?}"))),
                };
            }
            Ok(Ok(_)) => continue,
            Ok(Err(err)) => return Err(SessionError::TransportUnavailable(err.to_string())),
            Err(_) => {
                return Err(SessionError::TransportUnavailable(
                    "timed out waiting for broker acknowledgement".to_string(),
                ));
            }
        }
    }
}
