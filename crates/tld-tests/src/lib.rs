//! Integration test crate for the TLD tracker.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on tld-core and tld-tracking to verify they work together.

#[cfg(test)]
mod integrator;

#[cfg(test)]
mod session;
