//! Post job outcomes to a Slack channel through an incoming webhook.
//!
//! The pipeline is linear: run the optional command through the shell,
//! capture and truncate its output, escape it, assemble the payload and hand
//! it to a [`sink::Sink`].

pub mod cli;
pub mod config;
pub mod error;
pub mod payload;
pub mod report;
pub mod runner;
pub mod sink;
pub mod telemetry;

pub use error::{ReportError, Result};
