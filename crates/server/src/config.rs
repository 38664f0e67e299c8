use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_BASE_PORT: u16 = 5000;
pub const DEFAULT_PORT_ATTEMPTS: u16 = 20;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub output_dir: PathBuf,
    pub host: String,
    /// First candidate port. `0` lets the OS pick an ephemeral one.
    pub base_port: u16,
    pub port_attempts: u16,
    /// Quiet period after the last report change before broadcasting.
    pub debounce: Duration,
}

impl ServerConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            host: DEFAULT_HOST.to_string(),
            base_port: DEFAULT_BASE_PORT,
            port_attempts: DEFAULT_PORT_ATTEMPTS,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}
