use crate::core::dns;
use crate::core::models::{Packet, Protocol};

const HTTP_PORT: u16 = 80;
const HTTPS_PORT: u16 = 443;

/// Classe un paquet et, pour le DNS, sort le nom demandé.
///
/// Premier match gagnant : la couche DNS passe avant le transport, donc du
/// DNS sur UDP n'est jamais `UDP`. Host vide pour tout le reste.
pub fn classify(packet: &Packet) -> (Protocol, String) {
    if let Some(layer) = &packet.dns {
        let host = dns::first_question_name(&layer.message).unwrap_or_default();
        return (Protocol::Dns, host);
    }

    if let Some(tcp) = packet.tcp() {
        let proto = if tcp.uses_port(HTTP_PORT) {
            Protocol::Http
        } else if tcp.uses_port(HTTPS_PORT) {
            Protocol::Https
        } else {
            Protocol::Unknown
        };
        return (proto, String::new());
    }

    if packet.udp().is_some() {
        return (Protocol::Udp, String::new());
    }

    (Protocol::Unknown, String::new())
}
