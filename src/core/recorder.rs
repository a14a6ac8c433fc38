use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crossbeam::channel::Sender;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::error::{MonitorError, Result};
use crate::core::models::ClassifiedEvent;

pub const DEFAULT_LOG_FILE: &str = "audit_log.csv";

pub const LOG_HEADER: [&str; 5] = ["Timestamp", "Source", "Destination", "Protocol", "Host"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Csv,
    Jsonl,
}

/// Une ligne du log, dans l'ordre des colonnes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Destination")]
    pub destination: String,
    #[serde(rename = "Protocol")]
    pub protocol: String,
    #[serde(rename = "Host")]
    pub host: String,
}

impl From<&ClassifiedEvent> for LogRow {
    fn from(ev: &ClassifiedEvent) -> Self {
        Self {
            timestamp: ev.clock(),
            source: ev.source.to_string(),
            destination: ev.destination.to_string(),
            protocol: ev.protocol.to_string(),
            host: ev.queried_host.clone(),
        }
    }
}

enum Sink<W: Write> {
    Csv(csv::Writer<W>),
    Jsonl(W),
}

/// Log de session en ajout seul. Chaque ligne est flushée avant que
/// `record` rende la main : si le process est tué on perd au pire la ligne
/// en cours.
///
/// Le miroir (optionnel) reçoit une copie pour la console ; s'il n'y a
/// plus personne en face, on l'oublie et le log continue.
pub struct SessionRecorder<W: Write> {
    sink: Sink<W>,
    mirror: Option<Sender<ClassifiedEvent>>,
    rows: u64,
}

impl SessionRecorder<File> {
    /// Crée (ou vide) le log à `path` et écrit l'en-tête.
    pub fn create(
        path: &Path,
        format: LogFormat,
        mirror: Option<Sender<ClassifiedEvent>>,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(path)?;
        info!("Session log opened at {}", path.display());
        Self::new(file, format, mirror)
    }
}

impl<W: Write> SessionRecorder<W> {
    pub fn new(writer: W, format: LogFormat, mirror: Option<Sender<ClassifiedEvent>>) -> Result<Self> {
        let sink = match format {
            LogFormat::Csv => {
                let mut w = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(writer);
                w.write_record(LOG_HEADER)?;
                w.flush()?;
                Sink::Csv(w)
            }
            LogFormat::Jsonl => Sink::Jsonl(writer),
        };

        Ok(Self {
            sink,
            mirror,
            rows: 0,
        })
    }

    pub fn record(&mut self, event: &ClassifiedEvent) -> Result<()> {
        let row = LogRow::from(event);

        match &mut self.sink {
            Sink::Csv(w) => {
                w.serialize(&row)?;
                w.flush()?;
            }
            Sink::Jsonl(w) => {
                let line = serde_json::to_string(&row)?;
                writeln!(w, "{line}")?;
                w.flush()?;
            }
        }
        self.rows += 1;

        if let Some(tx) = &self.mirror {
            if tx.send(event.clone()).is_err() {
                debug!("Console mirror disconnected, continuing with log only");
                self.mirror = None;
            }
        }

        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush + rend le writer
    pub fn finish(self) -> Result<W> {
        match self.sink {
            Sink::Csv(w) => w
                .into_inner()
                .map_err(|e| MonitorError::Io(e.into_error())),
            Sink::Jsonl(mut w) => {
                w.flush()?;
                Ok(w)
            }
        }
    }
}

/// Relit un log de session (csv ou jsonl)
pub fn read_log(path: &Path, format: LogFormat) -> Result<Vec<LogRow>> {
    let file = File::open(path)?;

    match format {
        LogFormat::Csv => {
            let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
            let mut rows = Vec::new();
            for row in rdr.deserialize::<LogRow>() {
                rows.push(row?);
            }
            Ok(rows)
        }
        LogFormat::Jsonl => {
            let mut rows = Vec::new();
            for line in BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                rows.push(serde_json::from_str::<LogRow>(&line)?);
            }
            Ok(rows)
        }
    }
}
