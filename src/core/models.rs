use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Local};
use pnet::util::MacAddr;

/// Valeur de `Host::hostname` quand le reverse DNS échoue
pub const UNKNOWN_HOSTNAME: &str = "N/A";

/// Vue décodée d'une trame. `timestamp` = heure de capture
#[derive(Debug, Clone)]
pub struct Packet {
    pub timestamp: DateTime<Local>,
    pub ip: Option<IpHeader>,
    pub transport: Option<TransportProtocol>,
    pub dns: Option<DnsLayer>,
}

#[derive(Debug, Clone)]
pub struct IpHeader {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
}

#[derive(Debug, Clone)]
pub enum TransportProtocol {
    Tcp(TcpHeader),
    Udp(UdpHeader),
    /// ICMP et le reste : pas de ports
    Other,
}

#[derive(Debug, Clone)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
}

#[derive(Debug, Clone)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
}

/// Message DNS brut trouvé sur port 53/5353. Le décodage est fait par le
/// classifier : une question illisible ne cache pas la couche DNS.
#[derive(Debug, Clone)]
pub struct DnsLayer {
    pub message: Vec<u8>,
}

impl TcpHeader {
    pub fn uses_port(&self, port: u16) -> bool {
        self.src_port == port || self.dst_port == port
    }
}

impl Packet {
    pub fn tcp(&self) -> Option<&TcpHeader> {
        match &self.transport {
            Some(TransportProtocol::Tcp(t)) => Some(t),
            _ => None,
        }
    }

    pub fn udp(&self) -> Option<&UdpHeader> {
        match &self.transport {
            Some(TransportProtocol::Udp(u)) => Some(u),
            _ => None,
        }
    }
}

/// Machine qui a répondu au scan ARP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub hostname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Dns,
    Http,
    Https,
    Udp,
    Unknown,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Dns => "DNS",
            Protocol::Http => "HTTP",
            Protocol::Https => "TLS/HTTPS",
            Protocol::Udp => "UDP",
            Protocol::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Un paquet retenu, classé et horodaté, tel qu'il part dans le log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub timestamp: DateTime<Local>,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub protocol: Protocol,
    pub queried_host: String,
}

impl ClassifiedEvent {
    /// `HH:MM:SS` (le log ne garde que ça)
    pub fn clock(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }

    /// Version une ligne pour la console
    pub fn summary(&self) -> String {
        format!(
            "{} | {} → {} | {} | {}",
            self.clock(),
            self.source,
            self.destination,
            self.protocol,
            self.queried_host
        )
    }
}
