pub mod core {
    pub mod capture;
    pub mod classifier;
    pub mod controller;
    pub mod display;
    pub mod dns;
    pub mod error;
    pub mod filter;
    pub mod models;
    pub mod parser;
    pub mod recorder;
    pub mod resolver;
    pub mod session;
}

pub mod config;

pub use crate::core::capture::{Interrupt, PacketFeed, PcapFeed};
pub use crate::core::controller::{Monitor, MonitorConfig, MonitorOutcome, MonitorState};
pub use crate::core::error::{MonitorError, Result};
pub use crate::core::models::{ClassifiedEvent, Host, Packet, Protocol};
pub use crate::core::resolver::{HostDiscovery, PnetArpProbe, Resolver};

/// Interfaces dispo pour la capture (libpcap)
pub fn devices() -> Vec<String> {
    core::capture::list_devices()
}
