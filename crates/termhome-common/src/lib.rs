//! # termhome-common
//!
//! Shared utilities and types for termhome.
//!
//! This crate provides functionality used by every termhome crate:
//! - Common error types
//! - Standard configuration file locations

#![warn(missing_docs)]

pub mod error;
pub mod paths;

pub use error::{TermhomeError, TermhomeResult};
pub use paths::HomePaths;
