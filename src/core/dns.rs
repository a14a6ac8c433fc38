//! Décodage DNS minimal.
//!
//! On ne lit que la section question : ce qui nous intéresse c'est le nom
//! demandé par la machine, pas la réponse.
//!
//! ```text
//! | ID | FLAGS | QDCOUNT | ANCOUNT | NSCOUNT | ARCOUNT | QUESTION ... |
//!   2     2       2         2         2         2
//! ```

pub const DNS_HEADER_LEN: usize = 12;

/// DNS classique + mDNS
pub const DNS_PORTS: [u16; 2] = [53, 5353];

const MAX_NAME_LEN: usize = 255;
const MAX_POINTER_JUMPS: usize = 16;

pub fn is_dns_port(port: u16) -> bool {
    DNS_PORTS.contains(&port)
}

pub fn question_count(msg: &[u8]) -> Option<u16> {
    if msg.len() < DNS_HEADER_LEN {
        return None;
    }
    Some(u16::from_be_bytes([msg[4], msg[5]]))
}

/// Nom de la première question, sans le point final.
///
/// `None` si pas de question, message tronqué, label invalide (bits
/// réservés ou pas UTF-8), boucle de pointeurs ou nom > 255 octets.
pub fn first_question_name(msg: &[u8]) -> Option<String> {
    if question_count(msg)? == 0 {
        return None;
    }
    read_name(msg, DNS_HEADER_LEN)
}

/// Lit un nom (éventuellement compressé) à partir de `start`.
pub fn read_name(msg: &[u8], start: usize) -> Option<String> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = start;
    let mut jumps = 0;
    let mut total = 0usize;

    loop {
        let len = *msg.get(pos)? as usize;

        match len & 0xC0 {
            0x00 => {
                if len == 0 {
                    break;
                }
                let label = msg.get(pos + 1..pos + 1 + len)?;
                total += len + 1;
                if total > MAX_NAME_LEN {
                    return None;
                }
                labels.push(std::str::from_utf8(label).ok()?.to_string());
                pos += 1 + len;
            }
            0xC0 => {
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return None;
                }
                let low = *msg.get(pos + 1)? as usize;
                pos = ((len & 0x3F) << 8) | low;
            }
            _ => return None,
        }
    }

    Some(labels.join("."))
}
