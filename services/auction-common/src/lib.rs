//! Auction Common - shared configuration, logging and validation.
//!
//! This crate provides:
//! - Configuration types and modular loading
//! - Configuration validation
//! - Error types
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{Config, TushareConfig};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
