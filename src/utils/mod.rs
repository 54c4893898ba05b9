pub mod config;
pub mod imgpipe_toml;
pub mod logger;

pub use config::*;
pub use logger::setup_logging;
