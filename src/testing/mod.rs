//! Test doubles for the session and clock seams
//!
//! Compiled into the crate (not behind `cfg(test)`) so the integration suite
//! under `tests/` can drive the cooperative loop without a broker.

pub mod mocks;
