use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use hub::{HubConfig, PumpConfig};
use log::{warn, LevelFilter};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    /// A single `*` allows any origin.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "*"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "0.0.0.0")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 8080)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// Sustained number of requests per second allowed from one client IP
    #[arg(long, env, default_value_t = 10)]
    pub rate_limit_per_second: u32,

    /// Number of requests one client IP may burst above the sustained rate
    #[arg(long, env, default_value_t = 20)]
    pub rate_limit_burst: u32,

    /// Seconds between heartbeat messages broadcast to WebSocket clients
    #[arg(long, env, default_value_t = 30)]
    pub heartbeat_interval_secs: u64,

    /// Seconds between pings sent to each WebSocket client
    #[arg(long, env, default_value_t = 54)]
    pub ping_interval_secs: u64,

    /// Seconds a WebSocket client may stay silent before it is disconnected
    #[arg(long, env, default_value_t = 60)]
    pub pong_wait_secs: u64,

    /// Deadline in seconds for writing one frame to a WebSocket client
    #[arg(long, env, default_value_t = 10)]
    pub write_wait_secs: u64,

    /// Number of messages buffered per WebSocket client before it is dropped
    #[arg(long, env, default_value_t = 256)]
    pub client_queue_capacity: usize,

    /// Number of broadcasts buffered ahead of the hub's event loop
    #[arg(long, env, default_value_t = 256)]
    pub broadcast_buffer: usize,

    /// Seconds to wait for in-flight requests during graceful shutdown
    #[arg(long, env, default_value_t = 30)]
    pub shutdown_timeout_secs: u64,

    /// Load the demo users into the store at startup
    #[arg(
        long,
        env,
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub seed_demo_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }

    /// `interface:port` the listener binds to.
    pub fn listen_address(&self) -> String {
        format!(
            "{}:{}",
            self.interface.as_deref().unwrap_or("0.0.0.0"),
            self.port
        )
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs.max(1)),
            broadcast_buffer: self.broadcast_buffer.max(1),
            client_queue_capacity: self.client_queue_capacity.max(1),
        }
    }

    /// Pump timing. A ping period that would not fit inside the read deadline
    /// is pulled down to nine tenths of it.
    pub fn pump_config(&self) -> PumpConfig {
        let pong_wait = Duration::from_secs(self.pong_wait_secs.max(1));
        let mut ping_period = Duration::from_secs(self.ping_interval_secs.max(1));
        if ping_period >= pong_wait {
            warn!(
                "Ping interval {}s is not shorter than pong wait {}s, adjusting",
                self.ping_interval_secs, self.pong_wait_secs
            );
            ping_period = pong_wait * 9 / 10;
        }

        PumpConfig {
            ping_period,
            pong_wait,
            write_wait: Duration::from_secs(self.write_wait_secs.max(1)),
        }
    }
}
