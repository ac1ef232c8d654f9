//! homelink - resilient MQTT telemetry client
//!
//! Maintains a publish/subscribe session over an unreliable link,
//! publishes a periodic reading without blocking message reception, and
//! recovers autonomously from connection loss.
//!
//! # Architecture
//!
//! Everything runs on one thread, in one cooperative loop
//! ([`agent::TelemetryAgent`]). Per iteration:
//!
//! 1. the [`supervisor::ReconnectSupervisor`] checks session health and, if
//!    the session is down, blocks in a fixed-delay retry cycle until it is
//!    back up, re-applying the subscription set on success;
//! 2. the session's `service()` drains inbound messages and keepalives;
//! 3. the [`scheduler::TelemetryScheduler`] evaluates its tick and performs
//!    at most one publish attempt.
//!
//! The wire protocol is delegated to rumqttc behind the [`session::Session`]
//! trait; timing goes through the [`clock::Clock`] trait so the whole loop
//! is testable against mocks with virtual time.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use std::time::Duration;
//! use homelink::agent::TelemetryAgent;
//! use homelink::clock::SystemClock;
//! use homelink::scheduler::{SimulatedSensor, TelemetryScheduler};
//! use homelink::session::rumqtt::{RumqttSession, SessionOptions};
//! use homelink::supervisor::ReconnectSupervisor;
//!
//! let session = RumqttSession::new(
//!     SessionOptions {
//!         host: "localhost".to_string(),
//!         port: 1883,
//!         keep_alive: Duration::from_secs(15),
//!         connect_timeout: Duration::from_secs(10),
//!     },
//!     Box::new(|topic, payload| {
//!         println!("{topic}: {}", String::from_utf8_lossy(payload));
//!     }),
//! );
//! let supervisor = ReconnectSupervisor::new(
//!     "homelink",
//!     vec!["home/messages".to_string()],
//!     Duration::from_millis(5000),
//! );
//! let scheduler = TelemetryScheduler::new(
//!     "home/room1/temperature",
//!     20_000,
//!     SimulatedSensor::new(20.0, 30.0),
//! );
//!
//! let mut agent = TelemetryAgent::new(session, supervisor, scheduler, SystemClock::new());
//! agent.run(&AtomicBool::new(false));
//! ```

pub mod agent;
pub mod clock;
pub mod config;
pub mod link;
pub mod logging;
pub mod scheduler;
pub mod session;
pub mod supervisor;
pub mod testing;

pub use agent::TelemetryAgent;
pub use clock::{Clock, SystemClock};
pub use config::AppConfig;
pub use scheduler::{ReadingSource, SimulatedSensor, TelemetryScheduler};
pub use session::{Session, SessionError};
pub use supervisor::ReconnectSupervisor;
