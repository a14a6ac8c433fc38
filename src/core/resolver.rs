//! Découverte des machines par scan ARP.
//!
//! Un who-has en broadcast pour chaque adresse du sous-réseau, depuis
//! l'interface locale qui y a une adresse ; on ramasse les réponses jusqu'à
//! la fin de la fenêtre. Reverse DNS ensuite, une fois par machine.

use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use ipnetwork::{IpNetwork, Ipv4Network};
use pnet::datalink::{self, Channel::Ethernet, Config as PnetConfig, NetworkInterface};
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::Packet as _;
use pnet::util::MacAddr;
use tracing::{debug, info, warn};

use crate::core::error::{MonitorError, Result};
use crate::core::models::{Host, UNKNOWN_HOSTNAME};

pub const DEFAULT_SUBNET: &str = "192.168.1.0/24";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

const ETH_HEADER_LEN: usize = 14;
const ARP_PACKET_LEN: usize = 28;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn parse_subnet(subnet: &str) -> Result<Ipv4Network> {
    subnet
        .trim()
        .parse()
        .map_err(|_| MonitorError::InvalidSubnet(subnet.to_string()))
}

/// Trouve les machines actives d'un sous-réseau
pub trait HostDiscovery {
    fn discover(&self, subnet: Ipv4Network, timeout: Duration) -> Result<Vec<Host>>;

    /// Interface par laquelle on joint `subnet` : la capture écoute là où
    /// le scan a tourné
    fn interface(&self, _subnet: Ipv4Network) -> Option<String> {
        None
    }
}

/// Qui a répondu à l'ARP, dans l'ordre d'arrivée
pub trait ArpProbe {
    fn probe(&self, subnet: Ipv4Network, timeout: Duration) -> Result<Vec<(Ipv4Addr, MacAddr)>>;

    fn interface(&self, _subnet: Ipv4Network) -> Option<String> {
        None
    }
}

pub trait ReverseLookup {
    fn hostname(&self, ip: Ipv4Addr) -> Option<String>;
}

/// Résolveur système, un seul essai
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

impl ReverseLookup for SystemLookup {
    fn hostname(&self, ip: Ipv4Addr) -> Option<String> {
        let name = dns_lookup::lookup_addr(&IpAddr::V4(ip)).ok()?;
        // sans PTR, getnameinfo renvoie l'IP en texte
        if name.is_empty() || name == ip.to_string() {
            return None;
        }
        Some(name)
    }
}

pub struct Resolver<P, L = SystemLookup> {
    probe: P,
    lookup: L,
}

impl<P: ArpProbe> Resolver<P, SystemLookup> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            lookup: SystemLookup,
        }
    }
}

impl<P: ArpProbe, L: ReverseLookup> Resolver<P, L> {
    pub fn with_lookup(probe: P, lookup: L) -> Self {
        Self { probe, lookup }
    }
}

impl<P: ArpProbe, L: ReverseLookup> HostDiscovery for Resolver<P, L> {
    fn discover(&self, subnet: Ipv4Network, timeout: Duration) -> Result<Vec<Host>> {
        info!("Scanning {subnet} (probe window {:?})", timeout);
        let replies = self.probe.probe(subnet, timeout)?;
        let hosts = hosts_from_replies(subnet, replies, &self.lookup);
        info!("{} host(s) answered on {subnet}", hosts.len());
        Ok(hosts)
    }

    fn interface(&self, subnet: Ipv4Network) -> Option<String> {
        self.probe.interface(subnet)
    }
}

/// Réponses → hosts : première réponse par IP gagnante, hors sous-réseau
/// ignoré, ordre d'arrivée conservé
pub fn hosts_from_replies<L: ReverseLookup>(
    subnet: Ipv4Network,
    replies: Vec<(Ipv4Addr, MacAddr)>,
    lookup: &L,
) -> Vec<Host> {
    let mut seen = HashSet::new();
    let mut hosts = Vec::new();

    for (ip, mac) in replies {
        if !subnet.contains(ip) {
            debug!("Ignoring ARP reply from {ip}, outside {subnet}");
            continue;
        }
        if !seen.insert(ip) {
            continue;
        }
        let hostname = lookup
            .hostname(ip)
            .unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string());
        hosts.push(Host { ip, mac, hostname });
    }

    hosts
}

/// Scan ARP via un channel datalink `pnet`
#[derive(Debug, Clone, Default)]
pub struct PnetArpProbe {
    interface: Option<String>,
}

impl PnetArpProbe {
    /// `None` : première interface up, hors loopback, avec une adresse dans
    /// le sous-réseau
    pub fn new(interface: Option<String>) -> Self {
        Self { interface }
    }

    fn resolve_interface(&self, subnet: Ipv4Network) -> Result<NetworkInterface> {
        let interfaces = datalink::interfaces();

        if let Some(ref name) = self.interface {
            interfaces
                .into_iter()
                .find(|iface| &iface.name == name)
                .ok_or_else(|| MonitorError::Discovery(format!("interface not found: {name}")))
        } else {
            interfaces
                .into_iter()
                .find(|iface| {
                    iface.is_up() && !iface.is_loopback() && source_address(iface, subnet).is_some()
                })
                .ok_or_else(|| {
                    MonitorError::Discovery(format!("no interface has an address in {subnet}"))
                })
        }
    }
}

fn source_address(iface: &NetworkInterface, subnet: Ipv4Network) -> Option<Ipv4Addr> {
    iface.ips.iter().find_map(|net| match net {
        IpNetwork::V4(n) if subnet.contains(n.ip()) => Some(n.ip()),
        _ => None,
    })
}

impl ArpProbe for PnetArpProbe {
    fn interface(&self, subnet: Ipv4Network) -> Option<String> {
        self.resolve_interface(subnet).ok().map(|iface| iface.name)
    }

    fn probe(&self, subnet: Ipv4Network, timeout: Duration) -> Result<Vec<(Ipv4Addr, MacAddr)>> {
        let iface = self.resolve_interface(subnet)?;
        let source_mac = iface
            .mac
            .ok_or_else(|| MonitorError::Discovery(format!("{} has no MAC address", iface.name)))?;
        let source_ip = source_address(&iface, subnet).ok_or_else(|| {
            MonitorError::Discovery(format!("{} has no address in {subnet}", iface.name))
        })?;

        let mut config = PnetConfig::default();
        config.read_timeout = Some(POLL_INTERVAL);

        let (mut tx, mut rx) = match datalink::channel(&iface, config) {
            Ok(Ethernet(tx, rx)) => (tx, rx),
            Ok(_) => {
                return Err(MonitorError::Discovery("unsupported channel type".into()));
            }
            Err(e) => {
                return Err(MonitorError::Discovery(format!(
                    "cannot open channel on {}: {e}",
                    iface.name
                )));
            }
        };

        let mut sent = 0usize;
        for target in probe_targets(subnet, source_ip) {
            let Some(frame) = arp_request(source_mac, source_ip, target) else {
                continue;
            };
            match tx.send_to(&frame, None) {
                Some(Ok(())) => sent += 1,
                Some(Err(e)) => warn!("ARP probe to {target} not sent: {e}"),
                None => warn!("ARP probe to {target} not sent: channel closed"),
            }
        }
        debug!("Sent {sent} ARP probes from {source_ip} on {}", iface.name);

        let deadline = Instant::now() + timeout;
        let mut replies: Vec<(Ipv4Addr, MacAddr)> = Vec::new();

        while Instant::now() < deadline {
            match rx.next() {
                Ok(frame) => {
                    if let Some((ip, mac)) = parse_arp_reply(frame, source_ip) {
                        debug!("ARP reply: {ip} is at {mac}");
                        replies.push((ip, mac));
                    }
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    continue;
                }
                Err(e) => {
                    return Err(MonitorError::Discovery(format!("ARP receive failed: {e}")));
                }
            }
        }

        Ok(replies)
    }
}

/// Toutes les adresses du sous-réseau sauf la nôtre (réseau et broadcast
/// exclus quand le préfixe en a)
fn probe_targets(subnet: Ipv4Network, own: Ipv4Addr) -> impl Iterator<Item = Ipv4Addr> {
    let has_edges = subnet.prefix() < 31;
    let network = subnet.network();
    let broadcast = subnet.broadcast();
    subnet.iter().filter(move |ip| {
        *ip != own && !(has_edges && (*ip == network || *ip == broadcast))
    })
}

fn arp_request(source_mac: MacAddr, source_ip: Ipv4Addr, target: Ipv4Addr) -> Option<Vec<u8>> {
    let mut arp_buf = [0u8; ARP_PACKET_LEN];
    let mut arp = MutableArpPacket::new(&mut arp_buf)?;
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(ArpOperations::Request);
    arp.set_sender_hw_addr(source_mac);
    arp.set_sender_proto_addr(source_ip);
    arp.set_target_hw_addr(MacAddr::zero());
    arp.set_target_proto_addr(target);

    let mut frame = vec![0u8; ETH_HEADER_LEN + ARP_PACKET_LEN];
    {
        let mut eth = MutableEthernetPacket::new(&mut frame)?;
        eth.set_destination(MacAddr::broadcast());
        eth.set_source(source_mac);
        eth.set_ethertype(EtherTypes::Arp);
        eth.set_payload(arp.packet());
    }
    Some(frame)
}

/// Émetteur d'une réponse ARP adressée à `own`
fn parse_arp_reply(frame: &[u8], own: Ipv4Addr) -> Option<(Ipv4Addr, MacAddr)> {
    let eth = EthernetPacket::new(frame)?;
    if eth.get_ethertype() != EtherTypes::Arp {
        return None;
    }
    let arp = ArpPacket::new(eth.payload())?;
    if arp.get_operation() != ArpOperations::Reply || arp.get_target_proto_addr() != own {
        return None;
    }
    Some((arp.get_sender_proto_addr(), arp.get_sender_hw_addr()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pnet::packet::{MutablePacket, Packet};

    use super::*;

    struct FixedLookup(HashMap<Ipv4Addr, String>);

    impl ReverseLookup for FixedLookup {
        fn hostname(&self, ip: Ipv4Addr) -> Option<String> {
            self.0.get(&ip).cloned()
        }
    }

    struct FixedProbe(Vec<(Ipv4Addr, MacAddr)>);

    impl ArpProbe for FixedProbe {
        fn probe(&self, _: Ipv4Network, _: Duration) -> Result<Vec<(Ipv4Addr, MacAddr)>> {
            Ok(self.0.clone())
        }
    }

    struct WlanProbe;

    impl ArpProbe for WlanProbe {
        fn probe(&self, _: Ipv4Network, _: Duration) -> Result<Vec<(Ipv4Addr, MacAddr)>> {
            Ok(Vec::new())
        }

        fn interface(&self, _: Ipv4Network) -> Option<String> {
            Some("wlan0".into())
        }
    }

    fn mac(last: u8) -> MacAddr {
        MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, last)
    }

    fn subnet() -> Ipv4Network {
        parse_subnet(DEFAULT_SUBNET).unwrap()
    }

    #[test]
    fn subnet_parsing() {
        assert_eq!(subnet().prefix(), 24);
        assert!(matches!(parse_subnet("192.168.1.0/33"), Err(MonitorError::InvalidSubnet(_))));
        assert!(parse_subnet("not a subnet").is_err());
    }

    #[test]
    fn unresolved_names_get_sentinel() {
        let probe = FixedProbe(vec![(Ipv4Addr::new(192, 168, 1, 5), mac(1))]);
        let resolver = Resolver::with_lookup(probe, FixedLookup(HashMap::new()));
        let hosts = resolver.discover(subnet(), DEFAULT_PROBE_TIMEOUT).unwrap();
        assert_eq!(
            hosts,
            vec![Host {
                ip: Ipv4Addr::new(192, 168, 1, 5),
                mac: mac(1),
                hostname: "N/A".into(),
            }]
        );
        assert_eq!(hosts[0].mac.to_string(), "aa:bb:cc:dd:ee:01");
    }

    #[test]
    fn keeps_arrival_order_and_drops_duplicates() {
        let mut names = HashMap::new();
        names.insert(Ipv4Addr::new(192, 168, 1, 1), "router.lan".to_string());
        let replies = vec![
            (Ipv4Addr::new(192, 168, 1, 20), mac(20)),
            (Ipv4Addr::new(192, 168, 1, 1), mac(1)),
            (Ipv4Addr::new(192, 168, 1, 20), mac(99)),
            (Ipv4Addr::new(10, 0, 0, 1), mac(2)),
        ];
        let hosts = hosts_from_replies(subnet(), replies, &FixedLookup(names));
        let ips: Vec<_> = hosts.iter().map(|h| h.ip).collect();
        assert_eq!(ips, vec![Ipv4Addr::new(192, 168, 1, 20), Ipv4Addr::new(192, 168, 1, 1)]);
        assert_eq!(hosts[0].mac, mac(20));
        assert_eq!(hosts[1].hostname, "router.lan");
    }

    #[test]
    fn no_replies_is_not_an_error() {
        let resolver = Resolver::with_lookup(FixedProbe(vec![]), FixedLookup(HashMap::new()));
        assert!(resolver.discover(subnet(), DEFAULT_PROBE_TIMEOUT).unwrap().is_empty());
    }

    #[test]
    fn resolver_reports_the_probe_interface() {
        let resolver = Resolver::with_lookup(WlanProbe, FixedLookup(HashMap::new()));
        assert_eq!(resolver.interface(subnet()).as_deref(), Some("wlan0"));

        let silent = Resolver::with_lookup(FixedProbe(vec![]), FixedLookup(HashMap::new()));
        assert_eq!(silent.interface(subnet()), None);
    }

    #[test]
    fn probe_targets_skip_edges_and_self() {
        let own = Ipv4Addr::new(192, 168, 1, 10);
        let targets: Vec<_> = probe_targets(subnet(), own).collect();
        assert_eq!(targets.len(), 253);
        assert!(!targets.contains(&own));
        assert!(!targets.contains(&Ipv4Addr::new(192, 168, 1, 0)));
        assert!(!targets.contains(&Ipv4Addr::new(192, 168, 1, 255)));

        let pair = parse_subnet("10.0.0.0/31").unwrap();
        assert_eq!(probe_targets(pair, Ipv4Addr::new(10, 0, 0, 0)).count(), 1);
    }

    #[test]
    fn request_frame_is_broadcast_who_has() {
        let src_ip = Ipv4Addr::new(192, 168, 1, 10);
        let frame = arp_request(mac(10), src_ip, Ipv4Addr::new(192, 168, 1, 5)).unwrap();
        assert_eq!(frame.len(), 42);

        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_destination(), MacAddr::broadcast());
        assert_eq!(eth.get_ethertype(), EtherTypes::Arp);

        let arp = ArpPacket::new(eth.payload()).unwrap();
        assert_eq!(arp.get_operation(), ArpOperations::Request);
        assert_eq!(arp.get_sender_proto_addr(), src_ip);
        assert_eq!(arp.get_target_proto_addr(), Ipv4Addr::new(192, 168, 1, 5));
    }

    fn reply_frame(sender: Ipv4Addr, sender_mac: MacAddr, target: Ipv4Addr) -> Vec<u8> {
        // on part d'une requête et on la passe en réponse
        let mut frame = arp_request(sender_mac, sender, target).unwrap();
        {
            let mut eth = MutableEthernetPacket::new(&mut frame).unwrap();
            let mut arp = MutableArpPacket::new(eth.payload_mut()).unwrap();
            arp.set_operation(ArpOperations::Reply);
        }
        frame
    }

    #[test]
    fn reply_parsing_checks_target() {
        let own = Ipv4Addr::new(192, 168, 1, 10);
        let peer = Ipv4Addr::new(192, 168, 1, 5);

        let reply = reply_frame(peer, mac(1), own);
        assert_eq!(parse_arp_reply(&reply, own), Some((peer, mac(1))));

        let for_someone_else = reply_frame(peer, mac(1), Ipv4Addr::new(192, 168, 1, 11));
        assert_eq!(parse_arp_reply(&for_someone_else, own), None);

        let request = arp_request(mac(1), peer, own).unwrap();
        assert_eq!(parse_arp_reply(&request, own), None);
    }
}
