//! The cooperative control loop
//!
//! One loop, three duties per iteration, in a fixed order: make sure the
//! session is up, drain inbound traffic, then evaluate the telemetry tick.
//! The order guarantees a freshly reconnected session is serviced before a
//! publish is attempted against it. Between iterations the loop idles for
//! [`IDLE_INTERVAL`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::scheduler::{ReadingSource, TelemetryScheduler, TickOutcome};
use crate::session::Session;
use crate::supervisor::ReconnectSupervisor;

/// Idle pause between loop iterations; also the cadence of keepalive
/// servicing, so it must stay well under the session keep-alive window.
pub const IDLE_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the session, supervisor, scheduler and clock, and runs them as a
/// single-threaded cooperative loop.
pub struct TelemetryAgent<S, C, R>
where
    S: Session,
    C: Clock,
    R: ReadingSource,
{
    session: S,
    supervisor: ReconnectSupervisor,
    scheduler: TelemetryScheduler<R>,
    clock: C,
}

impl<S, C, R> TelemetryAgent<S, C, R>
where
    S: Session,
    C: Clock,
    R: ReadingSource,
{
    pub fn new(
        session: S,
        supervisor: ReconnectSupervisor,
        scheduler: TelemetryScheduler<R>,
        clock: C,
    ) -> Self {
        Self {
            session,
            supervisor,
            scheduler,
            clock,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// One loop iteration: reconnect check, service, telemetry tick.
    pub fn step(&mut self) -> TickOutcome {
        if !self.session.is_connected() {
            warn!("session lost, reconnecting");
        }
        self.supervisor
            .ensure_connected(&mut self.session, &self.clock);

        if let Err(err) = self.session.service() {
            // The session marked itself disconnected; the next iteration's
            // reconnect check recovers.
            warn!(error = %err, "service failed");
        }

        let now = self.clock.now_millis();
        self.scheduler.maybe_publish(&mut self.session, now)
    }

    /// Establish the initial session, then loop until `shutdown` is set.
    ///
    /// The initial connect is mandatory: steady-state scheduling does not
    /// begin until a connection has succeeded at least once.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        self.supervisor
            .ensure_connected(&mut self.session, &self.clock);
        info!("entering control loop");

        while !shutdown.load(Ordering::Relaxed) {
            self.step();
            self.clock.sleep(IDLE_INTERVAL);
        }

        info!("shutdown requested, closing session");
        self.session.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::DEFAULT_INTERVAL_MS;
    use crate::supervisor::DEFAULT_RETRY_DELAY;
    use crate::testing::mocks::{ManualClock, MockSession};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FixedSource(f64);

    impl ReadingSource for FixedSource {
        fn sample(&mut self) -> f64 {
            self.0
        }
    }

    fn agent(session: MockSession) -> TelemetryAgent<MockSession, ManualClock, FixedSource> {
        let supervisor = ReconnectSupervisor::new(
            "homelink",
            vec!["home/messages".to_string()],
            DEFAULT_RETRY_DELAY,
        );
        let scheduler = TelemetryScheduler::new(
            "home/room1/temperature",
            DEFAULT_INTERVAL_MS,
            FixedSource(24.0),
        );
        TelemetryAgent::new(session, supervisor, scheduler, ManualClock::new())
    }

    #[test]
    fn step_orders_reconnect_before_service_before_publish() {
        let mut agent = agent(MockSession::new());
        let outcome = agent.step();

        assert_eq!(outcome, TickOutcome::Published);
        let ops = &agent.session().ops;
        let connect = ops.iter().position(|op| *op == "connect").unwrap();
        let service = ops.iter().position(|op| *op == "service").unwrap();
        let publish = ops.iter().position(|op| *op == "publish").unwrap();
        assert!(connect < service, "reconnect precedes service: {ops:?}");
        assert!(service < publish, "service precedes publish: {ops:?}");
    }

    #[test]
    fn inbound_message_is_dispatched_exactly_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();

        let mut session = MockSession::connected();
        session.on_message(Box::new(move |topic, payload| {
            sink.borrow_mut()
                .push((topic.to_string(), payload.to_vec()));
        }));
        session.push_inbound("home/messages", b"ON".to_vec());

        let mut agent = agent(session);
        agent.step();
        agent.step();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "home/messages");
        assert_eq!(seen[0].1, b"ON".to_vec());
    }

    #[test]
    fn service_drains_the_whole_queue_in_one_step() {
        let seen = Rc::new(RefCell::new(0usize));
        let sink = seen.clone();

        let mut session = MockSession::connected();
        session.on_message(Box::new(move |_, _| {
            *sink.borrow_mut() += 1;
        }));
        for i in 0..1_000 {
            session.push_inbound("home/messages", format!("msg-{i}").into_bytes());
        }

        let mut agent = agent(session);
        agent.step();

        assert_eq!(*seen.borrow(), 1_000);
        assert_eq!(agent.session().service_calls, 1);
    }

    #[test]
    fn drop_during_service_recovers_on_next_step() {
        let mut session = MockSession::connected();
        session.drop_during_next_service();
        let mut agent = agent(session);

        // The drop is observed in this step; telemetry for this tick is lost.
        let outcome = agent.step();
        assert_eq!(outcome, TickOutcome::Dropped);
        assert!(!agent.session().is_connected());

        // Next step reconnects and re-applies the subscription set.
        agent.step();
        assert!(agent.session().is_connected());
        assert_eq!(agent.session().subscribed, vec!["home/messages".to_string()]);
    }

    #[test]
    fn telemetry_resumes_after_an_outage() {
        let mut agent = agent(MockSession::new());

        assert_eq!(agent.step(), TickOutcome::Published);

        // Outage: reconnect succeeds within the same step, and once the
        // interval elapses the scheduler publishes again.
        agent.session_mut().force_drop();
        agent.clock().advance(DEFAULT_INTERVAL_MS + 1);
        assert_eq!(agent.step(), TickOutcome::Published);
        assert_eq!(agent.session().connect_ids.len(), 2);
        assert_eq!(agent.session().published.len(), 2);
    }

    #[test]
    fn run_connects_before_steady_state_and_closes_on_shutdown() {
        let mut session = MockSession::new();
        session.script_connect_failures(2);
        let mut agent = agent(session);

        // Shutdown already requested: run still performs the mandatory
        // initial connect, then exits without a steady-state iteration.
        let shutdown = AtomicBool::new(true);
        agent.run(&shutdown);

        assert_eq!(agent.session().connect_ids.len(), 3);
        assert_eq!(agent.session().subscribed, vec!["home/messages".to_string()]);
        assert!(!agent.session().is_connected());
        assert_eq!(agent.clock().sleeps().len(), 2, "two retry pauses");
    }
}
