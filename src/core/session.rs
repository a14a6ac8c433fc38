use std::io::Write;
use std::net::Ipv4Addr;

use tracing::debug;

use crate::core::classifier::classify;
use crate::core::error::Result;
use crate::core::filter::CaptureFilter;
use crate::core::models::{ClassifiedEvent, Packet};
use crate::core::recorder::SessionRecorder;

/// Une session = une cible, son filtre et son log.
///
/// La session possède le recorder : le log est fermé quand elle disparaît,
/// quelle que soit la raison de fin de capture.
pub struct Session<W: Write> {
    filter: CaptureFilter,
    recorder: SessionRecorder<W>,
}

impl<W: Write> Session<W> {
    pub fn new(filter: CaptureFilter, recorder: SessionRecorder<W>) -> Self {
        Self { filter, recorder }
    }

    pub fn target(&self) -> Ipv4Addr {
        self.filter.target()
    }

    /// filtre → classifier → recorder. `None` si le paquet est écarté.
    pub fn handle(&mut self, packet: &Packet) -> Result<Option<ClassifiedEvent>> {
        if !self.filter.accepts(packet) {
            return Ok(None);
        }
        let ip = match &packet.ip {
            Some(ip) => ip,
            None => return Ok(None),
        };

        let (protocol, queried_host) = classify(packet);
        let event = ClassifiedEvent {
            timestamp: packet.timestamp,
            source: ip.src_ip,
            destination: ip.dst_ip,
            protocol,
            queried_host,
        };
        debug!("{}", event.summary());

        self.recorder.record(&event)?;
        Ok(Some(event))
    }

    pub fn events(&self) -> u64 {
        self.recorder.rows()
    }

    pub fn close(self) -> Result<W> {
        self.recorder.finish()
    }
}
