//! Command-line configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use ztnc_core::NetworkId;
use ztnc_streaming::PumpConfig;

use crate::commands::Command;

pub const DEFAULT_STACK_PORT: u16 = 9994;

/// How long to wait for the node to report it is down after `stop`.
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ztnc",
    version,
    about = "netcat over a virtual network",
    after_help = "Connect:  ztnc <address> <port>\nListen:   ztnc -l <port>"
)]
pub struct CliConfig {
    /// Remote address to connect to
    #[arg(required_unless_present = "listen")]
    pub address: Option<IpAddr>,

    /// Remote port to connect to
    #[arg(required_unless_present = "listen")]
    pub port: Option<u16>,

    /// Listen for one incoming connection on this port
    #[arg(
        short,
        long,
        value_name = "PORT",
        visible_short_alias = 'p',
        conflicts_with_all = ["address", "port"]
    )]
    pub listen: Option<u16>,

    /// Network to join (hex id, optional 0x prefix)
    #[arg(short, long, value_name = "NWID", default_value_t = NetworkId::EARTH)]
    pub network: NetworkId,

    /// Keep node credentials in this directory instead of a temporary one
    #[arg(short, long, value_name = "DIR")]
    pub cache: Option<PathBuf>,

    /// Underlay port used by the network stack
    #[arg(long, default_value_t = DEFAULT_STACK_PORT)]
    pub stack_port: u16,

    /// Upper bound on shutdown latency, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 100, hide = true)]
    pub poll_ms: u64,

    /// Largest chunk relayed per read
    #[arg(long, value_name = "BYTES", default_value_t = 1024, hide = true)]
    pub buffer_size: usize,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Validated settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub command: Command,
    pub network: NetworkId,
    /// `None` means a temporary directory removed on exit.
    pub cache_dir: Option<PathBuf>,
    pub stack_port: u16,
    pub pump: PumpConfig,
    pub teardown_timeout: Duration,
    pub verbose: u8,
}

/// Arguments that parse but do not describe a runnable session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError(pub &'static str);

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for UsageError {}

impl CliConfig {
    pub fn options(&self) -> Result<Options, UsageError> {
        let command = match (self.listen, self.address, self.port) {
            (Some(port), None, None) => Command::Listen(port),
            (None, Some(ip), Some(port)) => Command::Connect(SocketAddr::new(ip, port)),
            (Some(_), _, _) => return Err(UsageError("cannot both listen and connect")),
            _ => return Err(UsageError("need <address> <port> or -l <port>")),
        };
        if self.poll_ms == 0 {
            return Err(UsageError("poll interval must be positive"));
        }
        if self.buffer_size == 0 {
            return Err(UsageError("buffer size must be positive"));
        }
        Ok(Options {
            command,
            network: self.network,
            cache_dir: self.cache.clone(),
            stack_port: self.stack_port,
            pump: PumpConfig {
                buffer_size: self.buffer_size,
                poll_interval: Duration::from_millis(self.poll_ms),
            },
            teardown_timeout: TEARDOWN_TIMEOUT,
            verbose: self.verbose,
        })
    }
}
