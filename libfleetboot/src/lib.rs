#![forbid(unsafe_code)]

//! # fleetboot
//!
//! The shared code for fleetboot. Encapsulates abstractions for things like:
//!
//! - Driving one command across a list of hosts, one session at a time
//! - Classifying each host's outcome and aggregating a final report
//! - Cooperative cancellation of a batch in flight
//! - Remote sessions, with an SSH implementation
//! - Logging and tracing

pub mod batch;
pub mod error_log;
pub mod event;
pub mod log;
pub mod report;
pub mod session;
