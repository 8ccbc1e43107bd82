//! Domain types for the Lime-Frog job client.
//!
//! This crate has no I/O. It defines the job status state machine
//! vocabulary, submission options, shared statistics payloads and the
//! download formats understood by the remote site-check service.

pub mod download;
pub mod error;
pub mod job_status;
pub mod options;
pub mod stats;
pub mod types;
