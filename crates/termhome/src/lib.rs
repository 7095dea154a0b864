//! # termhome
//!
//! Terminal homepage with live service status.
//!
//! termhome provides:
//! - YAML configuration of grouped services
//! - A `watch` command streaming status changes
//! - A `status` command printing a one-shot status table

#![warn(missing_docs)]

pub mod cli;
pub mod config;

pub use config::HomeConfig;
