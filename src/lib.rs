//! pangea-login - browser-based Pangea AuthN login for the terminal
//!
//! Runs the authorization code flow through a one-shot loopback listener:
//! no persistent service, no stored tokens.

pub mod auth;
pub mod cli;
pub mod core;

pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
