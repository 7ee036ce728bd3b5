//! `coiltrack` – treatment-coil hotspot locator entry point.
//!
//! This binary wires the full stack together:
//!
//! 1. Loads `~/.coiltrack/config.toml` (`COILTRACK_*` env overrides apply)
//!    and resolves tool roles, the frame trigger, and calibration timing.
//! 2. Builds the event bus and the locator dispatch loop.
//! 3. Optionally pumps a JSON-Lines pose capture through the bus in place of
//!    live tracking hardware (`--replay`).
//! 4. Prints diagnostics (phase changes, the calibration report, degraded
//!    tracking) to the terminal.
//! 5. Reads operator commands from stdin and intercepts **Ctrl-C** for an
//!    orderly shutdown.

mod config;
mod console;

use clap::Parser;
use colored::Colorize;
use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use coiltrack_middleware::{EventBus, ReplayAdapter, Topic, TopicReceiver, TrackerAdapter};
use coiltrack_runtime::LocatorLoop;
use coiltrack_types::{CalibrationSummary, Event, EventPayload, FrameTrigger, TrackError};

const SOURCE: &str = "coiltrack-cli";

/// Real-time hotspot locator over two tracked rigid bodies.
#[derive(Debug, Parser)]
#[command(author, version, about = "Real-time treatment-coil hotspot locator")]
struct Args {
    /// Path to the config file. Defaults to ~/.coiltrack/config.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay a JSON-Lines pose capture instead of live tracking.
    #[arg(long)]
    replay: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = try_main().await {
        eprintln!("{} {err}", "error:".red().bold());
        std::process::exit(1);
    }
}

async fn try_main() -> Result<(), TrackError> {
    let args = Args::parse();
    init_tracing();
    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let config_path = args.config.clone().unwrap_or_else(config::config_path);
    let cfg = match config::load_from(&config_path)? {
        Some(cfg) => {
            println!(
                "  Config loaded from {}",
                config_path.display().to_string().bold()
            );
            cfg
        }
        None => {
            println!(
                "  No config at {} – using defaults.",
                config_path.display().to_string().dimmed()
            );
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    let mut locator_config = cfg.resolve()?;

    // A replay capture is a generated-sample source; follow it regardless of
    // the configured live trigger.
    if args.replay.is_some() && locator_config.trigger != FrameTrigger::SampleGenerated {
        info!(
            configured = locator_config.trigger.name(),
            "replay active, following SAMPLE_GENERATED frames"
        );
        locator_config.trigger = FrameTrigger::SampleGenerated;
    }
    let trigger = locator_config.trigger;

    println!(
        "  Plate {} (id {}), marker {} (id {}), trigger {}.",
        cfg.plate_tool.bold(),
        locator_config.roles.plate_id(),
        cfg.marker_tool.bold(),
        locator_config.roles.marker_id(),
        trigger.name().bold()
    );

    // ── Bus and dispatch loop ─────────────────────────────────────────────
    let bus = EventBus::new(cfg.bus_capacity);
    let mut locator = LocatorLoop::new(bus.clone(), locator_config);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let bus = bus.clone();
        let shutdown = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!();
            println!("{}", "⚠  Ctrl-C received – requesting shutdown …".yellow().bold());
            let _ = bus.publish_to(Topic::Control, Event::new(SOURCE, EventPayload::Shutdown));
            shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!(error = %e, "Failed to install Ctrl-C handler; use 'q' to exit");
        }
    }

    // ── Diagnostics printer ───────────────────────────────────────────────
    tokio::spawn(print_diagnostics(bus.subscribe_to(Topic::Diagnostics)));

    // ── Frame source ──────────────────────────────────────────────────────
    match args.replay {
        Some(path) => {
            let adapter = Arc::new(ReplayAdapter::from_path(&path)?);
            println!(
                "  Replaying {} sample(s) from {}.\n",
                adapter.len(),
                path.display().to_string().bold()
            );
            // Subscribe before the first frame is pumped so no report is lost.
            let reports = bus.subscribe_to(Topic::HotspotReports);
            tokio::spawn(pump_reports(reports, adapter.clone()));
            tokio::spawn(pump_frames(bus.clone(), adapter));
        }
        None => {
            println!(
                "  No replay file – waiting for an in-process {} source.\n",
                trigger.name().bold()
            );
        }
    }

    // ── Operator console ──────────────────────────────────────────────────
    {
        let bus = bus.clone();
        let shutdown = shutdown.clone();
        std::thread::spawn(move || console::run(bus, shutdown));
    }

    locator.run().await?;
    println!("{}", "  ✓ Locator disconnected. Exiting.".green());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Initialise tracing-subscriber using RUST_LOG (defaults to "info").
/// Set COILTRACK_LOG_FORMAT=json to emit newline-delimited JSON logs suitable
/// for log aggregators. Operator-facing output still uses println! for UX
/// consistency.
fn init_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("COILTRACK_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bus pumps
// ─────────────────────────────────────────────────────────────────────────────

/// Drain the replay stream onto the tracker-frames lane at capture pace.
async fn pump_frames(bus: EventBus, adapter: Arc<ReplayAdapter>) {
    let mut frames = adapter.frame_stream().await;
    while let Some(payload) = frames.next().await {
        // Best-effort publish – no subscribers is not an error.
        let _ = bus.publish_to(Topic::TrackerFrames, Event::new(SOURCE, payload));
    }
    info!("replay stream finished");
}

/// Hand hotspot reports back to the adapter, the same path a live bridge
/// would stream to its downstream consumer.
async fn pump_reports(mut reports: TopicReceiver, adapter: Arc<ReplayAdapter>) {
    loop {
        match reports.recv().await {
            Ok(event) => {
                if let EventPayload::Hotspot(report) = event.payload {
                    if let Err(err) = adapter.deliver_report(report).await {
                        warn!(error = %err, "report delivery failed");
                    }
                }
            }
            Err(RecvError::Lagged(n)) => warn!(lagged_by = n, "report consumer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Diagnostics printer
// ─────────────────────────────────────────────────────────────────────────────

async fn print_diagnostics(mut diagnostics: TopicReceiver) {
    loop {
        match diagnostics.recv().await {
            Ok(event) => match event.payload {
                EventPayload::PhaseChanged { phase } => {
                    println!("  {} {}", "phase".cyan(), phase.bold());
                }
                EventPayload::CalibrationComplete(summary) => print_summary(&summary),
                EventPayload::CalibrationAborted { reason } => {
                    println!("  {} {}", "✗ Calibration aborted:".red().bold(), reason);
                    println!("  Press {} to retry.", "Enter".bold());
                }
                EventPayload::DegradedTracking { sequence } => {
                    println!(
                        "  {} sample {} – marker may have left the capture volume",
                        "degraded tracking".yellow(),
                        sequence
                    );
                }
                _ => {}
            },
            Err(RecvError::Lagged(n)) => warn!(lagged_by = n, "diagnostics printer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// The five averaged quantities frozen at calibration, in the same order the
/// locator logs them.
fn print_summary(summary: &CalibrationSummary) {
    let quad = |q: [f64; 4]| format!("{:.5e}  {:.5e}  {:.5e}  {:.5e}", q[0], q[1], q[2], q[3]);
    let triple = |v: [f64; 3]| format!("{:.5e}  {:.5e}  {:.5e}", v[0], v[1], v[2]);
    println!();
    println!("  {}", "✓ Calibration complete".green().bold());
    println!("    plate orientation  : {}", quad(summary.plate_orientation));
    println!("    plate position     : {}", triple(summary.plate_position));
    println!("    marker orientation : {}", quad(summary.marker_orientation));
    println!("    marker position    : {}", triple(summary.marker_position));
    println!("    hotspot offset     : {}", triple(summary.offset));
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║      C O I L T R A C K               ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!(
        "  {} {}",
        "CoilTrack".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Real-time treatment-coil hotspot locator");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn args_parse_config_and_replay_paths() {
        let args = Args::parse_from([
            "coiltrack",
            "--config",
            "custom.toml",
            "--replay",
            "capture.jsonl",
        ]);
        assert_eq!(args.config.as_deref(), Some(Path::new("custom.toml")));
        assert_eq!(args.replay.as_deref(), Some(Path::new("capture.jsonl")));
    }

    #[test]
    fn args_default_to_no_replay() {
        let args = Args::parse_from(["coiltrack"]);
        assert!(args.config.is_none());
        assert!(args.replay.is_none());
    }
}
