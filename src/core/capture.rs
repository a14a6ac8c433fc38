use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone};
use pcap::{Capture, Device, Error, Linktype};
use tracing::{debug, info};

use crate::core::error::{MonitorError, Result};
use crate::core::models::Packet;
use crate::core::parser::parse_packet;

/// Timeout de lecture : fréquence à laquelle la boucle regarde le flag
/// d'interruption quand il n'y a pas de trafic
const READ_TIMEOUT_MS: i32 = 1000;
const SNAPLEN: i32 = 65535;

pub fn list_devices() -> Vec<String> {
    Device::list()
        .unwrap_or_default()
        .into_iter()
        .map(|d| d.name)
        .collect()
}

/// Interruption (Ctrl+C) partagée entre le watcher de signal et la boucle
/// de capture
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    requested: Arc<AtomicBool>,
    capturing: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn set_capturing(&self, capturing: bool) {
        self.capturing.store(capturing, Ordering::SeqCst);
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

/// Flux live de paquets décodés, non redémarrable.
///
/// `run` passe chaque paquet à `handler` dans l'ordre d'arrivée et ne
/// demande le suivant qu'une fois le handler revenu. `Ok` sur interruption,
/// sinon la première erreur (handler ou capture).
pub trait PacketFeed {
    fn run(
        &mut self,
        interrupt: &Interrupt,
        handler: &mut dyn FnMut(&Packet) -> Result<()>,
    ) -> Result<()>;

    /// Écoute sur `interface`, sauf si une interface a été imposée
    fn use_interface(&mut self, _interface: &str) {}
}

/// Capture libpcap sur une interface
#[derive(Debug, Clone, Default)]
pub struct PcapFeed {
    device: Option<String>,
}

impl PcapFeed {
    /// `None` : interface du scan ARP, sinon device par défaut de libpcap
    pub fn new(device: Option<String>) -> Self {
        Self { device }
    }

    fn device_name(&self) -> Result<String> {
        if let Some(name) = &self.device {
            return Ok(name.clone());
        }
        Device::lookup()
            .map_err(|e| MonitorError::Feed(e.to_string()))?
            .map(|d| d.name)
            .ok_or_else(|| MonitorError::Feed("no capture device available".into()))
    }
}

/// Le parseur ne lit que de l'Ethernet II : `any` (SLL) ou un tun (RAW)
/// ne donneraient aucun paquet exploitable.
fn ensure_ethernet(device: &str, link: Linktype) -> Result<()> {
    if link == Linktype::ETHERNET {
        return Ok(());
    }
    let name = link.get_name().unwrap_or_else(|_| format!("DLT {}", link.0));
    Err(MonitorError::Feed(format!(
        "unsupported link type {name} on {device}, only Ethernet is decoded"
    )))
}

fn capture_time(secs: i64, micros: i64) -> DateTime<Local> {
    let nanos = (micros.clamp(0, 999_999) * 1_000) as u32;
    Local
        .timestamp_opt(secs, nanos)
        .single()
        .unwrap_or_else(Local::now)
}

impl PacketFeed for PcapFeed {
    fn use_interface(&mut self, interface: &str) {
        if self.device.is_none() {
            self.device = Some(interface.to_string());
        }
    }

    fn run(
        &mut self,
        interrupt: &Interrupt,
        handler: &mut dyn FnMut(&Packet) -> Result<()>,
    ) -> Result<()> {
        let device_name = self.device_name()?;
        let mut cap = Capture::from_device(device_name.as_str())
            .and_then(|d| {
                d.promisc(true)
                    .timeout(READ_TIMEOUT_MS)
                    .snaplen(SNAPLEN)
                    .open()
            })
            .map_err(|e| MonitorError::Feed(format!("cannot open {device_name}: {e}")))?;
        ensure_ethernet(&device_name, cap.get_datalink())?;

        info!("Capture loop started on {device_name}");

        loop {
            if interrupt.is_requested() {
                info!("Capture on {device_name} interrupted");
                return Ok(());
            }

            match cap.next_packet() {
                Ok(raw) => {
                    debug!("Captured frame: {} bytes", raw.data.len());
                    if let Some(mut parsed) = parse_packet(raw.data) {
                        parsed.timestamp =
                            capture_time(raw.header.ts.tv_sec as i64, raw.header.ts.tv_usec as i64);
                        handler(&parsed)?;
                    }
                }
                Err(Error::TimeoutExpired) => continue,
                Err(e) => {
                    return Err(MonitorError::Feed(format!(
                        "capture on {device_name} failed: {e}"
                    )));
                }
            }
        }
    }
}
