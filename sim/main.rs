#![forbid(unsafe_code)]

//! `scope-intercom-sim` — Controller-side simulator for `scope-intercom`.
//!
//! Plays the acquisition controller's half of the handshake over the named
//! pipes, for driving the Analyzer by hand without a microscope attached.
//! Start the Analyzer first so the pipes exist; every write blocks until the
//! Analyzer opens its reading end.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "scope-intercom-sim",
    about = "Acquisition-controller simulator for scope-intercom",
    version,
    long_about = None
)]
struct Cli {
    /// Pipe the Controller writes to (the Analyzer's receive pipe).
    #[arg(long, default_value = "/tmp/sendPipeMMCaImAn.ser")]
    send_pipe: PathBuf,

    /// Pipe the Controller reads from (the Analyzer's send pipe).
    #[arg(long, default_value = "/tmp/getPipeMMCaImAn.ser")]
    receive_pipe: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send the session identifier (the filename notice).
    Filename {
        /// Session identifier, e.g. `run42`.
        session: String,
    },

    /// Send a raw line (a trigger token, or anything else to probe the
    /// Analyzer's exact-match gating).
    Send {
        /// Line to send verbatim.
        line: String,
    },

    /// Block until the Analyzer's ready signal arrives and print it.
    AwaitReady,

    /// Walk a full session: filename, init trigger, ready signal, stream
    /// trigger, pausing for Enter where the real controller would wait for
    /// frames.
    Run {
        /// Session identifier, e.g. `run42`.
        session: String,
    },
}

fn main() {
    let args = Cli::parse();

    let result = match &args.command {
        Command::Filename { session } => send_line(&args.send_pipe, session),
        Command::Send { line } => send_line(&args.send_pipe, line),
        Command::AwaitReady => await_ready(&args.receive_pipe),
        Command::Run { session } => run_session(&args, session),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run_session(args: &Cli, session: &str) -> std::io::Result<()> {
    send_line(&args.send_pipe, session)?;
    println!("filename sent: {session}");

    pause("press Enter once the initialization frames would be captured");
    send_line(&args.send_pipe, "startInitProcess")?;
    println!("init trigger sent, waiting for the Analyzer's ready signal");

    await_ready(&args.receive_pipe)?;

    pause("press Enter once acquisition would be continuing");
    send_line(&args.send_pipe, "startStreamAnalysis")?;
    println!("stream trigger sent");
    Ok(())
}

/// Open the write end (blocks until the Analyzer reads), write `line\n`.
fn send_line(pipe: &PathBuf, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(pipe)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()
}

/// Open the read end (blocks until the Analyzer writes), read one line.
fn await_ready(pipe: &PathBuf) -> std::io::Result<()> {
    let file = File::open(pipe)?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line)?;
    println!("received: {}", line.trim_end());
    Ok(())
}

fn pause(prompt: &str) {
    println!("{prompt}");
    let mut sink = String::new();
    let _ = std::io::stdin().read_line(&mut sink);
}
