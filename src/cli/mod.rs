//! Command line interface for the mod release tool.
//!
//! Parses arguments, assembles the run configuration and drives one
//! [`Pipeline`] run, reporting progress and failures on the terminal.

mod args;
mod output;

pub use args::{Args, RuntimeConfig};
pub use output::OutputManager;

use crate::config::Config;
use crate::error::{ReleaseError, Result};
use crate::pipeline::{Pipeline, RunReport};
use std::io::Write;
use std::path::Path;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    let runtime = RuntimeConfig::from(&args);
    let cwd = std::env::current_dir()?;

    let result = execute(&args, &runtime, &cwd).await;
    Ok(conclude(&runtime, &result, &mut std::io::stdout().lock()))
}

/// Reports the outcome of a run and returns the process exit code.
///
/// Terminal output is best-effort: once the release is published the run
/// has succeeded, whether or not the summary can be written.
pub fn conclude(runtime: &RuntimeConfig, result: &Result<RunReport>, stdout: &mut dyn Write) -> i32 {
    match result {
        Ok(report) => {
            if let Err(e) = print_summary(runtime, report, stdout) {
                log::warn!("Failed to print run summary: {}", e);
            }
            0
        }
        Err(error) => {
            if let Err(e) = report_error(runtime, error) {
                log::warn!("Failed to print error report: {}", e);
            }
            error.exit_code()
        }
    }
}

/// Loads the configuration for `args` and runs the release pipeline once.
pub async fn execute(args: &Args, runtime: &RuntimeConfig, cwd: &Path) -> Result<RunReport> {
    let config = Config::load(args, cwd)?;
    log::debug!("Run configuration: {:?}", config);

    let builder = config.build_backend()?;
    let host = config.release_host()?;
    let mut pipeline = Pipeline::new(config.name, config.tag, config.notes, builder, host);
    pipeline.run(runtime).await
}

fn print_summary(runtime: &RuntimeConfig, report: &RunReport, stdout: &mut dyn Write) -> std::io::Result<()> {
    let action = if report.publish.created {
        "Created"
    } else {
        "Updated"
    };
    runtime.success(&format!(
        "{} release {} with {} asset(s)",
        action,
        report.version.tag(),
        report.publish.uploaded.len()
    ))?;
    if !report.publish.replaced.is_empty() {
        runtime.verbose_println(&format!("Replaced {}", report.publish.replaced.join(", ")))?;
    }
    let elapsed = report.finished_at - report.started_at;
    runtime.verbose_println(&format!("Finished in {} ms", elapsed.num_milliseconds()))?;

    writeln!(stdout, "{}", report.output.display())?;
    writeln!(stdout, "{}", report.sidecar.path.display())?;
    stdout.flush()
}

fn report_error(runtime: &RuntimeConfig, error: &ReleaseError) -> std::io::Result<()> {
    let output = runtime.output();
    output.error(&error.to_string())?;

    // The top-level message already embeds its direct source.
    let mut source = std::error::Error::source(error).and_then(|e| e.source());
    while let Some(cause) = source {
        output.indent(&format!("caused by: {cause}"))?;
        source = cause.source();
    }

    for suggestion in error.recovery_suggestions() {
        output.indent(&format!("hint: {suggestion}"))?;
    }
    Ok(())
}
