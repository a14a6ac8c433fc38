use std::net::Ipv4Addr;

use crate::core::models::Packet;

/// Quelles destinations on considère comme du bruit multicast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MulticastPolicy {
    /// Seulement 224.x.x.x et 239.x.x.x (mDNS, SSDP...)
    #[default]
    Legacy,
    /// Toute la classe D 224.0.0.0/4 + 255.255.255.255
    Full,
}

impl MulticastPolicy {
    pub fn is_noise(&self, dst: Ipv4Addr) -> bool {
        match self {
            MulticastPolicy::Legacy => matches!(dst.octets()[0], 224 | 239),
            MulticastPolicy::Full => dst.is_multicast() || dst.is_broadcast(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureFilter {
    target: Ipv4Addr,
    multicast: MulticastPolicy,
}

impl CaptureFilter {
    pub fn new(target: Ipv4Addr, multicast: MulticastPolicy) -> Self {
        Self { target, multicast }
    }

    pub fn target(&self) -> Ipv4Addr {
        self.target
    }

    pub fn accepts(&self, packet: &Packet) -> bool {
        let ip = match &packet.ip {
            Some(ip) => ip,
            None => return false,
        };

        if ip.src_ip != self.target && ip.dst_ip != self.target {
            return false;
        }

        !self.multicast.is_noise(ip.dst_ip)
    }
}
