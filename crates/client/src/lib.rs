//! Job lifecycle and polling engine for the Lime-Frog site-check service.
//!
//! Provides the HTTP API wrapper, the status poller and its
//! [`PollLease`](lease::PollLease), the [`JobController`](controller::JobController)
//! that owns the active job, background liveness/statistics signals and
//! the download dispatcher.

pub mod api;
pub mod background;
pub mod config;
pub mod controller;
pub mod download;
pub mod events;
pub mod lease;
pub mod poller;
