//! Periodic telemetry publishing
//!
//! The scheduler never blocks: each call compares the clock against the last
//! tick and performs at most one publish attempt. The tick timestamp
//! advances whenever an attempt is made, successful or not; a failed
//! attempt waits out a full interval like any other.

use rand::Rng;
use tracing::{info, warn};

use crate::session::Session;

pub const DEFAULT_INTERVAL_MS: u64 = 20_000;

/// Source of telemetry readings.
pub trait ReadingSource {
    fn sample(&mut self) -> f64;
}

/// Uniform random readings at one-decimal resolution in `[min, max]`,
/// standing in for a real sensor.
pub struct SimulatedSensor {
    lo_tenths: i64,
    hi_tenths: i64,
}

impl SimulatedSensor {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            lo_tenths: (min * 10.0).round() as i64,
            hi_tenths: (max * 10.0).round() as i64,
        }
    }
}

impl ReadingSource for SimulatedSensor {
    fn sample(&mut self) -> f64 {
        let tenths = rand::thread_rng().gen_range(self.lo_tenths..=self.hi_tenths);
        tenths as f64 / 10.0
    }
}

/// Render a reading as the wire payload: decimal with exactly one
/// fractional digit.
pub fn format_reading(value: f64) -> String {
    format!("{value:.1}")
}

/// Outcome of a single tick evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The interval has not elapsed; nothing was attempted.
    NotDue,
    Published,
    /// An attempt was made and failed; the reading is dropped and the next
    /// attempt waits for the next scheduled tick.
    Dropped,
}

/// Fires one publish attempt per elapsed interval, measured on the caller's
/// clock.
pub struct TelemetryScheduler<R: ReadingSource> {
    topic: String,
    interval_ms: u64,
    /// `None` until the first attempt, so the first eligible loop iteration
    /// fires immediately regardless of the clock value.
    last_tick: Option<u64>,
    source: R,
}

impl<R: ReadingSource> TelemetryScheduler<R> {
    pub fn new(topic: impl Into<String>, interval_ms: u64, source: R) -> Self {
        Self {
            topic: topic.into(),
            interval_ms,
            last_tick: None,
            source,
        }
    }

    /// Evaluate the tick at `now` and publish a fresh reading if due.
    ///
    /// A publish failure is logged and swallowed; in particular, a session
    /// that has never connected fails here cleanly every interval.
    pub fn maybe_publish<S>(&mut self, session: &mut S, now: u64) -> TickOutcome
    where
        S: Session + ?Sized,
    {
        if let Some(last) = self.last_tick {
            if now.saturating_sub(last) < self.interval_ms {
                return TickOutcome::NotDue;
            }
        }
        self.last_tick = Some(now);

        let value = self.source.sample();
        let payload = format_reading(value);
        match session.publish(&self.topic, payload.as_bytes()) {
            Ok(()) => {
                info!(topic = %self.topic, value = %payload, "telemetry published");
                TickOutcome::Published
            }
            Err(err) => {
                warn!(topic = %self.topic, error = %err, "telemetry publish failed");
                TickOutcome::Dropped
            }
        }
    }
}
