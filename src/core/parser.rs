use chrono::Local;
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet as _;

use crate::core::dns;
use crate::core::models::*;

const IPV4_MIN_HEADER_LEN: usize = 20;

/// Décode une trame Ethernet II.
///
/// `None` seulement si la trame est trop courte pour l'en-tête Ethernet.
/// Hors IPv4 : pas de couche réseau.
pub fn parse_packet(raw: &[u8]) -> Option<Packet> {
    let eth = EthernetPacket::new(raw)?;

    let mut packet = Packet {
        timestamp: Local::now(),
        ip: None,
        transport: None,
        dns: None,
    };

    if eth.get_ethertype() == EtherTypes::Ipv4 {
        parse_ipv4(eth.payload(), &mut packet);
    }

    Some(packet)
}

fn parse_ipv4(data: &[u8], packet: &mut Packet) {
    let Some(ipv4) = Ipv4Packet::new(data) else {
        return;
    };
    // IHL incohérent avec ce qu'on a reçu : on ne garde rien
    let header_len = ipv4.get_header_length() as usize * 4;
    if ipv4.get_version() != 4 || header_len < IPV4_MIN_HEADER_LEN || data.len() < header_len {
        return;
    }

    packet.ip = Some(IpHeader {
        src_ip: ipv4.get_source(),
        dst_ip: ipv4.get_destination(),
    });

    let (transport, dns) = match ipv4.get_next_level_protocol() {
        IpNextHeaderProtocols::Tcp => parse_tcp(ipv4.payload()),
        IpNextHeaderProtocols::Udp => parse_udp(ipv4.payload()),
        _ => (Some(TransportProtocol::Other), None),
    };
    packet.transport = transport;
    packet.dns = dns;
}

fn parse_tcp(data: &[u8]) -> (Option<TransportProtocol>, Option<DnsLayer>) {
    let Some(tcp) = TcpPacket::new(data) else {
        return (None, None);
    };
    let src_port = tcp.get_source();
    let dst_port = tcp.get_destination();

    // DNS sur TCP : préfixe de longueur sur 2 octets
    let dns = if dns::is_dns_port(src_port) || dns::is_dns_port(dst_port) {
        tcp.payload().get(2..).and_then(dns_layer)
    } else {
        None
    };

    let header = TcpHeader { src_port, dst_port };
    (Some(TransportProtocol::Tcp(header)), dns)
}

fn parse_udp(data: &[u8]) -> (Option<TransportProtocol>, Option<DnsLayer>) {
    let Some(udp) = UdpPacket::new(data) else {
        return (None, None);
    };
    let src_port = udp.get_source();
    let dst_port = udp.get_destination();

    let dns = if dns::is_dns_port(src_port) || dns::is_dns_port(dst_port) {
        dns_layer(udp.payload())
    } else {
        None
    };

    let header = UdpHeader { src_port, dst_port };
    (Some(TransportProtocol::Udp(header)), dns)
}

fn dns_layer(message: &[u8]) -> Option<DnsLayer> {
    if message.len() < dns::DNS_HEADER_LEN {
        return None;
    }
    Some(DnsLayer {
        message: message.to_vec(),
    })
}
