use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::core::controller::MonitorConfig;
use crate::core::error::Result;
use crate::core::filter::MulticastPolicy;
use crate::core::recorder::{LogFormat, DEFAULT_LOG_FILE};
use crate::core::resolver::{parse_subnet, DEFAULT_SUBNET};

#[derive(Parser, Debug)]
#[command(
    name = "lanwatch",
    version,
    about = "Find the hosts on a LAN segment, pick one, and log its live traffic (DNS names, HTTP, TLS, UDP) to CSV."
)]
pub struct Args {
    /// Subnet to sweep with ARP, in CIDR notation
    #[arg(short, long, env = "LANWATCH_SUBNET", default_value = DEFAULT_SUBNET)]
    pub subnet: String,

    /// Interface used for both the ARP sweep and the capture (default: auto)
    #[arg(short, long, env = "LANWATCH_INTERFACE")]
    pub interface: Option<String>,

    /// Session log path; truncated at start
    #[arg(short, long, env = "LANWATCH_OUTPUT", default_value = DEFAULT_LOG_FILE)]
    pub output: PathBuf,

    /// Session log format
    #[arg(long, value_enum, default_value_t = FormatArg::Csv)]
    pub format: FormatArg,

    /// Seconds to wait for ARP replies
    #[arg(long, default_value_t = 2)]
    pub probe_timeout: u64,

    /// Destinations dropped as multicast noise
    #[arg(long, value_enum, default_value_t = MulticastArg::Legacy)]
    pub multicast: MulticastArg,

    /// Skip discovery and monitor this address directly
    #[arg(short, long)]
    pub target: Option<Ipv4Addr>,

    /// Do not echo events to the console
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,

    /// List capture interfaces and exit
    #[arg(long, default_value_t = false)]
    pub list_interfaces: bool,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Jsonl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MulticastArg {
    /// 224.0.0.0/8 and 239.0.0.0/8
    Legacy,
    /// All of 224.0.0.0/4 plus 255.255.255.255
    Full,
}

impl From<FormatArg> for LogFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Csv => LogFormat::Csv,
            FormatArg::Jsonl => LogFormat::Jsonl,
        }
    }
}

impl From<MulticastArg> for MulticastPolicy {
    fn from(m: MulticastArg) -> Self {
        match m {
            MulticastArg::Legacy => MulticastPolicy::Legacy,
            MulticastArg::Full => MulticastPolicy::Full,
        }
    }
}

impl Args {
    pub fn monitor_config(&self) -> Result<MonitorConfig> {
        Ok(MonitorConfig {
            subnet: parse_subnet(&self.subnet)?,
            probe_timeout: Duration::from_secs(self.probe_timeout),
            output: self.output.clone(),
            format: self.format.into(),
            multicast: self.multicast.into(),
            target: self.target,
        })
    }

    /// Filtre tracing par défaut si `RUST_LOG` absent
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
