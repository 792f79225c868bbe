//! Command-line configuration for the server binary.

use clap::Parser;
use shared::game::DEFAULT_MAX_UNRELIABLE_MESSAGE_SIZE;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct ServerConfig {
    /// Address to bind both sockets to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,
    /// TCP port for the reliable channel
    #[clap(short, long, default_value_t = 44445)]
    pub port: u16,
    /// UDP port for the unreliable channel
    #[clap(short, long, default_value_t = 44446)]
    pub udp_port: u16,
    /// Target duration of one tick in milliseconds
    #[clap(long, default_value_t = 5)]
    pub tick_ms: u64,
    /// Seconds between inactive-connection sweeps
    #[clap(long, default_value_t = 60)]
    pub housekeeping_secs: u64,
    /// Seconds without traffic before a connection is dropped
    #[clap(long, default_value_t = 30)]
    pub inactivity_secs: u64,
    /// Maximum number of simultaneous connections
    #[clap(short, long, default_value_t = 64)]
    pub max_clients: usize,
    /// Largest datagram sent on the unreliable channel
    #[clap(long, default_value_t = DEFAULT_MAX_UNRELIABLE_MESSAGE_SIZE)]
    pub max_unreliable_size: usize,
    /// File holding account records
    #[clap(long, default_value = "accounts.bin")]
    pub accounts: PathBuf,
    /// Reject logins for unknown account names instead of creating them
    #[clap(long)]
    pub no_auto_register: bool,
}

impl ServerConfig {
    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn udp_addr(&self) -> String {
        format!("{}:{}", self.host, self.udp_port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_secs)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 44445,
            udp_port: 44446,
            tick_ms: 5,
            housekeeping_secs: 60,
            inactivity_secs: 30,
            max_clients: 64,
            max_unreliable_size: DEFAULT_MAX_UNRELIABLE_MESSAGE_SIZE,
            accounts: PathBuf::from("accounts.bin"),
            no_auto_register: false,
        }
    }
}
