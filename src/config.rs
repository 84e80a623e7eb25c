use clap::Parser;
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "tcp-probe", version, about = "Probe a host with repeated TCP connects")]
pub struct Cli {
    /// Host name or IP address to connect to
    pub host: Option<String>,

    /// Port to connect to
    #[arg(short, long, default_value_t = 80, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Number of probes to send (default: infinite)
    #[arg(short, long)]
    pub count: Option<u32>,

    /// Connection timeout in milliseconds (0 disables it)
    #[arg(short, long, value_name = "MS", default_value_t = 1000)]
    pub timeout: u64,

    /// Interval between probes in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub interval: u64,

    /// Force IPv4 resolution
    #[arg(short = '4')]
    pub ipv4: bool,

    /// Force IPv6 resolution
    #[arg(short = '6')]
    pub ipv6: bool,

    /// Emit JSON lines instead of text
    #[arg(long)]
    pub json: bool,

    /// Diagnostic log level (trace, debug, info, warn, error), written to stderr
    #[arg(long, env = "PROBE_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    /// A bare `?` in place of the host asks for help.
    pub fn wants_help(&self) -> bool {
        self.host.as_deref() == Some("?")
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Any,
    V4,
    V6,
}

impl AddressFamily {
    pub fn admits(self, ip: IpAddr) -> bool {
        match self {
            AddressFamily::Any => true,
            AddressFamily::V4 => ip.is_ipv4(),
            AddressFamily::V6 => ip.is_ipv6(),
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Any => f.write_str("any"),
            AddressFamily::V4 => f.write_str("IPv4"),
            AddressFamily::V6 => f.write_str("IPv6"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeCount {
    Finite(u32),
    Infinite,
}

impl ProbeCount {
    /// Whether another attempt may start after `done` attempts.
    pub fn allows(self, done: u32) -> bool {
        match self {
            ProbeCount::Finite(n) => done < n,
            ProbeCount::Infinite => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProbeConfig {
    pub host: String,
    pub port: u16,
    pub count: ProbeCount,
    pub timeout_ms: u64,
    pub interval_ms: u64,
    pub family: AddressFamily,
    #[serde(skip)]
    pub format: OutputFormat,
    #[serde(skip)]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Host is required.")]
    MissingHost,
    #[error("Cannot specify both -4 and -6.")]
    ConflictingFamilies,
    #[error("Count must be at least 1.")]
    ZeroCount,
    #[error("Invalid log level: {0}. Valid levels are: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

impl ProbeConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if cli.ipv4 && cli.ipv6 {
            return Err(ConfigError::ConflictingFamilies);
        }
        let host = match cli.host {
            Some(h) if !h.trim().is_empty() => h,
            _ => return Err(ConfigError::MissingHost),
        };
        let count = match cli.count {
            Some(0) => return Err(ConfigError::ZeroCount),
            Some(n) => ProbeCount::Finite(n),
            None => ProbeCount::Infinite,
        };
        let family = if cli.ipv4 {
            AddressFamily::V4
        } else if cli.ipv6 {
            AddressFamily::V6
        } else {
            AddressFamily::Any
        };

        let config = ProbeConfig {
            host,
            port: cli.port,
            count,
            timeout_ms: cli.timeout,
            interval_ms: cli.interval,
            family,
            format: if cli.json { OutputFormat::Json } else { OutputFormat::Text },
            log_level: cli.log_level,
        };
        config.validate_log_level()?;
        Ok(config)
    }

    /// `None` when the timeout is disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(ConfigError::InvalidLogLevel(self.log_level.clone())),
        }
    }

    pub fn validate_log_level(&self) -> Result<(), ConfigError> {
        self.get_tracing_level().map(|_| ())
    }
}
