use std::io::{BufRead, Write};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crossbeam::channel::Sender;
use ipnetwork::Ipv4Network;
use tracing::{debug, error, info};

use crate::core::capture::{Interrupt, PacketFeed};
use crate::core::display::host_table;
use crate::core::error::{MonitorError, Result};
use crate::core::filter::{CaptureFilter, MulticastPolicy};
use crate::core::models::{ClassifiedEvent, Host};
use crate::core::recorder::{LogFormat, SessionRecorder, DEFAULT_LOG_FILE};
use crate::core::resolver::{HostDiscovery, DEFAULT_PROBE_TIMEOUT, DEFAULT_SUBNET};
use crate::core::session::Session;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub subnet: Ipv4Network,
    pub probe_timeout: Duration,
    pub output: PathBuf,
    pub format: LogFormat,
    pub multicast: MulticastPolicy,
    /// Cible directe : pas de scan ni de choix
    pub target: Option<Ipv4Addr>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            subnet: DEFAULT_SUBNET
                .parse()
                .unwrap_or_else(|_| Ipv4Network::from(Ipv4Addr::new(192, 168, 1, 0))),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            output: PathBuf::from(DEFAULT_LOG_FILE),
            format: LogFormat::default(),
            multicast: MulticastPolicy::default(),
            target: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Discovering,
    AwaitingSelection,
    Capturing,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Personne n'a répondu au scan, pas de log ouvert
    NoDevices,
    /// Fin d'entrée avant un index valide, pas de log ouvert
    NoSelection,
    Captured {
        target: Ipv4Addr,
        events: u64,
        log: PathBuf,
    },
}

/// Scan → choix → capture, pour un run
pub struct Monitor<D, F> {
    config: MonitorConfig,
    discovery: D,
    feed: F,
    interrupt: Interrupt,
    mirror: Option<Sender<ClassifiedEvent>>,
    state: MonitorState,
}

impl<D: HostDiscovery, F: PacketFeed> Monitor<D, F> {
    pub fn new(config: MonitorConfig, discovery: D, feed: F, interrupt: Interrupt) -> Self {
        Self {
            config,
            discovery,
            feed,
            interrupt,
            mirror: None,
            state: MonitorState::Idle,
        }
    }

    /// Copie chaque événement vers `tx` pour l'affichage live
    pub fn with_mirror(mut self, tx: Sender<ClassifiedEvent>) -> Self {
        self.mirror = Some(tx);
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Questions sur `out`, réponse lue sur `input`.
    pub fn run<R: BufRead, W: Write>(&mut self, input: &mut R, out: &mut W) -> Result<MonitorOutcome> {
        let result = self.run_inner(input, out);
        self.state = MonitorState::Terminated;
        result
    }

    fn run_inner<R: BufRead, W: Write>(&mut self, input: &mut R, out: &mut W) -> Result<MonitorOutcome> {
        let target = match self.config.target {
            Some(ip) => ip,
            None => {
                self.state = MonitorState::Discovering;
                writeln!(out, "\n🔍 Scanning {}...\n", self.config.subnet)?;
                let hosts = self
                    .discovery
                    .discover(self.config.subnet, self.config.probe_timeout)?;

                if hosts.is_empty() {
                    writeln!(out, "❌ No devices found on {}", self.config.subnet)?;
                    info!("Discovery on {} found no devices", self.config.subnet);
                    return Ok(MonitorOutcome::NoDevices);
                }

                self.state = MonitorState::AwaitingSelection;
                writeln!(out, "{}", host_table(&hosts))?;

                match prompt_selection(&hosts, input, out)? {
                    Some(index) => hosts[index].ip,
                    None => {
                        writeln!(out, "No host selected.")?;
                        return Ok(MonitorOutcome::NoSelection);
                    }
                }
            }
        };

        self.capture(target, out)
    }

    fn capture<W: Write>(&mut self, target: Ipv4Addr, out: &mut W) -> Result<MonitorOutcome> {
        // même interface que le scan ARP, sinon on écoute le mauvais segment
        if let Some(iface) = self.discovery.interface(self.config.subnet) {
            debug!("Capture bound to {iface}, where {} is reached", self.config.subnet);
            self.feed.use_interface(&iface);
        }

        let recorder =
            SessionRecorder::create(&self.config.output, self.config.format, self.mirror.take())?;
        let mut session = Session::new(CaptureFilter::new(target, self.config.multicast), recorder);

        writeln!(out, "\n📡 Live audit of {target}")?;
        writeln!(out, "Ctrl+C to stop\n")?;
        out.flush()?;

        self.state = MonitorState::Capturing;
        self.interrupt.set_capturing(true);
        info!("Capturing traffic of {target} into {}", self.config.output.display());

        let fed = self
            .feed
            .run(&self.interrupt, &mut |packet| session.handle(packet).map(|_| ()));

        self.interrupt.set_capturing(false);
        let events = session.events();
        let closed = session.close();

        if let Err(e) = &fed {
            error!("Capture of {target} stopped: {e}");
        }
        fed?;
        closed?;

        info!("Session for {target} closed after {events} event(s)");
        Ok(MonitorOutcome::Captured {
            target,
            events,
            log: self.config.output.clone(),
        })
    }
}

/// Demande un index tant qu'il n'est pas valide (pas un nombre, hors
/// limites → on redemande). `None` en fin d'entrée.
pub fn prompt_selection<R: BufRead, W: Write>(
    hosts: &[Host],
    input: &mut R,
    out: &mut W,
) -> Result<Option<usize>> {
    if hosts.is_empty() {
        return Ok(None);
    }

    loop {
        write!(out, "\n👉 Index of the host to monitor: ")?;
        out.flush()?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .map_err(|e| MonitorError::Prompt(e.to_string()))?;
        if read == 0 {
            return Ok(None);
        }

        match line.trim().parse::<usize>() {
            Ok(idx) if idx < hosts.len() => return Ok(Some(idx)),
            _ => {
                writeln!(
                    out,
                    "Invalid index, enter a number between 0 and {}.",
                    hosts.len() - 1
                )?;
            }
        }
    }
}
