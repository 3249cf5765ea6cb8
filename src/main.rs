//! fmrec - context-aware feature-model reasoner
//!
//! Main entry point: parses the command line, builds the problem model and
//! dispatches to the selected engine. The run writes exactly one JSON
//! result line; diagnostics go to stderr.

use std::fs;
use std::io::Write;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use fmrec::cli::{Cli, Mode};
use fmrec::engines::{analysis, explain, interface, reconfigure, validate};
use fmrec::output::write_reply;
use fmrec::translate::ExprTranslator;
use fmrec::{InputDocument, InterfaceDocument, build_problem};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let result = run(&cli);

    if let Err(ref e) = result {
        tracing::error!("run failed: {:#}", e);
    }

    result
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let started = Instant::now();

    // flag conflicts fail before any file is touched
    let mode = cli.mode()?;

    tracing::info!(?mode, input = %cli.input_file.display(), "starting run");

    let text = fs::read_to_string(&cli.input_file)
        .with_context(|| format!("failed to read {}", cli.input_file.display()))?;
    let doc = InputDocument::from_json(&text)
        .with_context(|| format!("failed to parse {}", cli.input_file.display()))?;

    let translator = ExprTranslator;
    let problem = build_problem(&doc, cli.encoding(), &translator, cli.num_of_process.max(1))?;
    let opts = cli.engine_options();

    let solve_started = Instant::now();
    let reply = match mode {
        Mode::Reconfigure => reconfigure::run(&problem, &opts)?,
        Mode::Validate { grid_search: false } => validate::run(&problem, &opts)?,
        Mode::Validate { grid_search: true } => validate::run_grid(&problem, &opts)?,
        Mode::Explain => explain::run(&problem, &opts)?,
        Mode::CheckInterface(path) => {
            let iface_text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let iface = InterfaceDocument::from_json(&iface_text)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            interface::run(&problem, &iface, &translator, &opts)?
        }
        Mode::CheckFeatures => analysis::run(&problem, &opts)?,
    };
    tracing::info!(
        elapsed_ms = solve_started.elapsed().as_millis() as u64,
        "engine finished"
    );

    match &cli.output_file {
        Some(path) => {
            let mut file = fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_reply(&mut file, &reply)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write_reply(&mut lock, &reply)?;
            lock.flush()?;
        }
    }

    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run complete"
    );

    Ok(())
}

/// Initialize logging to stderr; stdout carries only the result line
fn init_logging(verbose: u8) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default_level = match verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("fmrec={default_level}"))),
        )
        .init();

    Ok(())
}
