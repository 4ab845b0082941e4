//! Shared plumbing for the simulator binaries
//!
//! - logging initialisation (console + optional daily file)
//! - layered settings loading (defaults, YAML file, environment)
//! - shutdown signal handling

pub mod config_loader;
pub mod logging;
pub mod shutdown;

pub use config_loader::load_settings;
pub use shutdown::{shutdown_token, wait_for_shutdown};
