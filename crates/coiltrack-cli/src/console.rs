//! Operator console – line-oriented command loop for the interactive shell.
//!
//! Supported commands:
//!   <enter> | c  – begin calibration
//!   r            – recalibrate (discard the frozen vector, collect again)
//!   p            – ping the locator
//!   h | help     – show this list
//!   q | quit     – shut down

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use coiltrack_middleware::{EventBus, Topic};
use coiltrack_types::{Event, EventPayload};

const SOURCE: &str = "coiltrack-cli::console";

/// Entry point for the operator loop. Runs on its own blocking thread.
///
/// `shutdown` is polled each iteration; when set the loop exits cleanly.
pub fn run(bus: EventBus, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!(
        "  Press {} to calibrate, {} for commands.\n",
        "Enter".bold().cyan(),
        "h".bold().cyan()
    );

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "coiltrack>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        match line.trim() {
            "" | "c" => {
                publish(&bus, EventPayload::BeginCalibration);
                println!("{}", "  Calibration requested – hold both tools still.".green());
            }
            "r" => {
                publish(&bus, EventPayload::Recalibrate);
                println!("{}", "  Recalibration requested.".green());
            }
            "p" => publish(&bus, EventPayload::Ping),
            "h" | "help" => cmd_help(),
            "q" | "quit" | "exit" => {
                publish(&bus, EventPayload::Shutdown);
                println!("{}", "  Shutting down.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            other => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "h".bold()
                );
            }
        }
    }
}

fn publish(bus: &EventBus, payload: EventPayload) {
    // Best-effort publish – no subscribers is not an error.
    let _ = bus.publish_to(Topic::Control, Event::new(SOURCE, payload));
}

fn cmd_help() {
    println!();
    println!("{}", "CoilTrack Commands".bold().underline());
    println!("  {}  – begin calibration (hold both tools still)", "<enter>  c".bold().cyan());
    println!("  {}           – discard the calibration and collect again", "r".bold().cyan());
    println!("  {}           – ping the locator loop", "p".bold().cyan());
    println!("  {}   – shut down", "q  quit".bold().cyan());
    println!();
}
