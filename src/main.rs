use std::io;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::{unbounded, Receiver};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lanwatch::config::Args;
use lanwatch::{
    ClassifiedEvent, Interrupt, Monitor, MonitorOutcome, PcapFeed, PnetArpProbe, Resolver,
};

/// Écho console des événements enregistrés, une ligne chacun
fn listen_to_events(rx: Receiver<ClassifiedEvent>) {
    for event in rx.iter() {
        println!("{}", event.summary());
    }
}

/// Ctrl+C : pendant la capture on lève juste le flag (le log se ferme
/// proprement), avant on quitte direct, rien à libérer.
fn spawn_interrupt_watcher(interrupt: Interrupt) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl+C: {e}");
                return;
            }
            if interrupt.is_capturing() {
                info!("Interrupt received, stopping capture");
                interrupt.request();
            } else {
                eprintln!("\nInterrupted.");
                std::process::exit(130);
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level())),
        )
        .with_writer(io::stderr)
        .init();

    if args.list_interfaces {
        println!("🧭 Capture interfaces:");
        for (i, dev) in lanwatch::devices().iter().enumerate() {
            println!("  {i:>2} → {dev}");
        }
        return Ok(());
    }

    let config = args.monitor_config().context("invalid configuration")?;

    let interrupt = Interrupt::new();
    spawn_interrupt_watcher(interrupt.clone());

    let discovery = Resolver::new(PnetArpProbe::new(args.interface.clone()));
    let feed = PcapFeed::new(args.interface.clone());
    let mut monitor = Monitor::new(config, discovery, feed, interrupt);

    let printer = if args.quiet {
        None
    } else {
        let (tx, rx) = unbounded::<ClassifiedEvent>();
        monitor = monitor.with_mirror(tx);
        Some(thread::spawn(move || listen_to_events(rx)))
    };

    let outcome = tokio::task::spawn_blocking(move || {
        let mut input = io::stdin().lock();
        let mut out = io::stdout();
        monitor.run(&mut input, &mut out)
    })
    .await
    .context("monitor task failed")?;

    if let Some(handle) = printer {
        if handle.join().is_err() {
            warn!("Console printer thread panicked");
        }
    }

    match outcome.context("monitoring failed")? {
        MonitorOutcome::NoDevices | MonitorOutcome::NoSelection => {}
        MonitorOutcome::Captured { target, events, log } => {
            println!(
                "\n✅ {events} event(s) for {target} written to {}",
                log.display()
            );
        }
    }

    Ok(())
}
