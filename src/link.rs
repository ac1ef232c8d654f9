//! Startup wait for network reachability
//!
//! Before the first broker connect the process blocks until the link is up,
//! probing once per second. There is no timeout or retry ceiling; startup
//! stalls until the network appears.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{info, warn};

use crate::clock::Clock;

const PROBE_INTERVAL: Duration = Duration::from_secs(1);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Reachability check for the broker endpoint.
pub trait LinkProbe {
    /// Returns true when the endpoint currently accepts connections.
    fn is_up(&self) -> bool;
}

/// Probes the broker's TCP endpoint directly.
pub struct TcpLinkProbe {
    host: String,
    port: u16,
}

impl TcpLinkProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl LinkProbe for TcpLinkProbe {
    fn is_up(&self) -> bool {
        let addrs = match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(_) => return false,
        };
        for addr in addrs {
            if TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok() {
                return true;
            }
        }
        false
    }
}

/// Block until the probe reports the link up, sleeping one second between
/// attempts. Returns the number of failed probes that preceded success.
pub fn await_link(probe: &dyn LinkProbe, clock: &dyn Clock) -> u64 {
    let mut misses = 0u64;
    info!("waiting for network link");
    while !probe.is_up() {
        misses += 1;
        if misses % 10 == 0 {
            warn!(misses, "network link still down");
        }
        clock.sleep(PROBE_INTERVAL);
    }
    info!(misses, "network link is up");
    misses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::ManualClock;
    use std::cell::Cell;

    struct ScriptedProbe {
        failures_left: Cell<u32>,
    }

    impl LinkProbe for ScriptedProbe {
        fn is_up(&self) -> bool {
            let left = self.failures_left.get();
            if left == 0 {
                true
            } else {
                self.failures_left.set(left - 1);
                false
            }
        }
    }

    #[test]
    fn returns_immediately_when_link_is_up() {
        let probe = ScriptedProbe {
            failures_left: Cell::new(0),
        };
        let clock = ManualClock::new();
        assert_eq!(await_link(&probe, &clock), 0);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn sleeps_one_second_between_failed_probes() {
        let probe = ScriptedProbe {
            failures_left: Cell::new(3),
        };
        let clock = ManualClock::new();
        assert_eq!(await_link(&probe, &clock), 3);
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(1)
            ]
        );
    }

    #[test]
    fn unreachable_endpoint_reports_down() {
        // Port 1 on localhost is essentially never listening.
        let probe = TcpLinkProbe::new("127.0.0.1", 1);
        assert!(!probe.is_up());
    }
}
