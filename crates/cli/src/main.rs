//! changescan - snapshot a directory tree and report what changed
//!
//! Entry point for the CLI application.

mod args;
mod progress;
mod report;

use std::fs::File;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use changescan_filesystem::{ChangeScanner, RunSummary, ScanConfiguration};
use clap::Parser;
use env_logger::{Builder, Target};
use log::LevelFilter;

use crate::args::CliArgs;
use crate::progress::{print_summary, SpinnerProgress};
use crate::report::HtmlReportGenerator;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: CliArgs = CliArgs::parse();
    init_logger(&args)?;

    let show_progress: bool = !args.quiet && !args.verbose;
    let config: ScanConfiguration = args
        .into_configuration()
        .context("Invalid configuration")?;
    let scanless: bool = config.is_scanless_comparison;

    let cancel: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
    let handler_flag: Arc<AtomicBool> = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping scan...");
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let mut scanner: ChangeScanner = ChangeScanner::new(config).with_cancel_flag(cancel);
    scanner.add_report_generator(Box::new(HtmlReportGenerator::new()));
    if show_progress && !scanless {
        scanner.add_listener(Arc::new(SpinnerProgress::new()));
    }

    let summary: RunSummary = scanner.run();
    if show_progress && summary.failure.is_none() {
        print_summary(&summary);
    }

    // Failures were already logged by the run.
    if summary.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Configure env_logger from the verbosity flags.
///
/// `RUST_LOG` overrides the flags. With `--log-file` the log goes to that
/// file instead of stderr.
fn init_logger(args: &CliArgs) -> Result<()> {
    let level: LevelFilter = if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    let mut builder: Builder = Builder::new();
    builder
        .filter_level(LevelFilter::Warn)
        .filter_module("changescan", level)
        .filter_module("changescan_filesystem", level)
        .format_target(false)
        .parse_default_env();

    if let Some(path) = &args.log_file {
        let file: File = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder.init();
    Ok(())
}
