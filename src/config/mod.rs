//! # Configuration
//!
//! Controller configuration from environment variables and command-line flags.

mod args;
mod controller;

pub use args::ControllerArgs;
pub use controller::ControllerConfig;
