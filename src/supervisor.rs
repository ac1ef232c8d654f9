//! Connect/retry state machine
//!
//! The supervisor owns everything about getting a session up: fresh client
//! identities, the fixed retry delay, and re-applying the subscription set
//! after every successful (re)connect. Subscriptions do not survive a
//! session reset broker-side, so the full set is re-issued each time; the
//! operation is idempotent at the protocol level.

use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::session::Session;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5000);

/// Drives a [`Session`] back to the connected state whenever it is down.
pub struct ReconnectSupervisor {
    client_id_prefix: String,
    subscriptions: Vec<String>,
    retry_delay: Duration,
    /// Failed attempts since the last successful connect. Bounds nothing;
    /// it only feeds the retry log line.
    attempts: u64,
}

impl ReconnectSupervisor {
    pub fn new(
        client_id_prefix: impl Into<String>,
        subscriptions: Vec<String>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            client_id_prefix: client_id_prefix.into(),
            subscriptions,
            retry_delay,
            attempts: 0,
        }
    }

    /// Return immediately if the session is healthy; otherwise retry until a
    /// connect succeeds, sleeping the fixed delay between failures.
    ///
    /// Blocks the caller for the whole retry cycle: while the session is
    /// down, no telemetry is emitted and no messages are serviced.
    pub fn ensure_connected<S, C>(&mut self, session: &mut S, clock: &C)
    where
        S: Session + ?Sized,
        C: Clock + ?Sized,
    {
        if session.is_connected() {
            return;
        }

        loop {
            let client_id = self.next_client_id();
            info!(client_id = %client_id, "connecting to broker");
            match session.connect(&client_id) {
                Ok(()) => {
                    self.attempts = 0;
                    info!("connected to broker");
                    self.apply_subscriptions(session);
                    return;
                }
                Err(err) => {
                    self.attempts += 1;
                    warn!(
                        attempt = self.attempts,
                        error = %err,
                        "connect failed, retrying in {} ms",
                        self.retry_delay.as_millis()
                    );
                    clock.sleep(self.retry_delay);
                }
            }
        }
    }

    /// Re-issue the full subscription set. A failed subscribe is logged and
    /// skipped; the session stays in use with whatever subset took effect.
    fn apply_subscriptions<S: Session + ?Sized>(&self, session: &mut S) {
        for topic in &self.subscriptions {
            match session.subscribe(topic) {
                Ok(()) => info!(topic = %topic, "subscribed"),
                Err(err) => warn!(topic = %topic, error = %err, "subscribe failed"),
            }
        }
    }

    /// Fresh identity per attempt: a random 16-bit suffix in hex. Brokers
    /// reject a second session under an id that is still considered live.
    fn next_client_id(&self) -> String {
        let suffix: u16 = rand::thread_rng().gen();
        format!("{}-{:04x}", self.client_id_prefix, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{ManualClock, MockSession};

    fn supervisor() -> ReconnectSupervisor {
        ReconnectSupervisor::new(
            "homelink",
            vec!["home/messages".to_string()],
            DEFAULT_RETRY_DELAY,
        )
    }

    #[test]
    fn fast_path_skips_connect_when_session_is_healthy() {
        let mut session = MockSession::connected();
        let clock = ManualClock::new();
        supervisor().ensure_connected(&mut session, &clock);

        assert!(session.connect_ids.is_empty());
        assert!(session.subscribed.is_empty());
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn retries_with_fixed_delay_then_subscribes_exactly_once() {
        // Three refusals, then success: the subscription set is applied once,
        // and each failure is followed by the 5 s pause.
        let mut session = MockSession::new();
        session.script_connect_failures(3);
        let clock = ManualClock::new();

        supervisor().ensure_connected(&mut session, &clock);

        assert!(session.is_connected());
        assert_eq!(session.connect_ids.len(), 4);
        assert_eq!(session.subscribed, vec!["home/messages".to_string()]);
        assert_eq!(clock.sleeps().len(), 3);
        assert!(clock.sleeps().iter().all(|d| *d == DEFAULT_RETRY_DELAY));
    }

    #[test]
    fn resubscribes_on_every_reconnect() {
        let mut session = MockSession::new();
        let clock = ManualClock::new();
        let mut supervisor = supervisor();

        supervisor.ensure_connected(&mut session, &clock);
        session.force_drop();
        supervisor.ensure_connected(&mut session, &clock);

        assert_eq!(
            session.subscribed,
            vec!["home/messages".to_string(), "home/messages".to_string()]
        );
    }

    #[test]
    fn subscribe_failure_is_tolerated() {
        let mut session = MockSession::new();
        session.fail_subscribes = true;
        let clock = ManualClock::new();

        supervisor().ensure_connected(&mut session, &clock);

        // The connection stays usable despite the failed subscribe.
        assert!(session.is_connected());
        assert!(session.subscribed.is_empty());
    }

    #[test]
    fn client_ids_carry_prefix_and_hex_suffix() {
        let supervisor = supervisor();
        for _ in 0..50 {
            let id = supervisor.next_client_id();
            let suffix = id
                .strip_prefix("homelink-")
                .expect("prefix should be kept");
            assert_eq!(suffix.len(), 4);
            assert!(u16::from_str_radix(suffix, 16).is_ok());
        }
    }

    #[test]
    fn client_ids_vary_between_attempts() {
        let supervisor = supervisor();
        let ids: std::collections::HashSet<String> =
            (0..50).map(|_| supervisor.next_client_id()).collect();
        assert!(ids.len() > 1, "expected some variety across 50 draws");
    }

    #[test]
    fn attempt_counter_resets_after_success() {
        let mut session = MockSession::new();
        session.script_connect_failures(2);
        let clock = ManualClock::new();
        let mut supervisor = supervisor();

        supervisor.ensure_connected(&mut session, &clock);
        assert_eq!(supervisor.attempts, 0);

        // A later outage starts counting from zero again.
        session.force_drop();
        session.script_connect_failures(1);
        supervisor.ensure_connected(&mut session, &clock);
        assert_eq!(supervisor.attempts, 0);
        assert_eq!(clock.sleeps().len(), 3);
    }
}
