//! Torture command implementation.

use super::{CliError, OutputFormat};
use boundtx_testkit::{run_torture, TestEnv, TortureConfig};
use std::time::Duration;
use tracing::{info, warn};

/// Runs the torture scenario and prints its report.
pub fn run(
    units: usize,
    threads: usize,
    timeout_secs: u64,
    format: OutputFormat,
) -> Result<(), CliError> {
    let config = TortureConfig {
        units,
        threads,
        timeout: Duration::from_secs(timeout_secs),
    };
    info!(units, threads, timeout_secs, "starting torture run");

    let env = TestEnv::new();
    let report = run_torture(&env, &config)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => report.print_summary("torture"),
    }

    if report.is_consistent() {
        info!(elapsed_ms = report.elapsed_ms, "torture run consistent");
        Ok(())
    } else {
        warn!(timed_out = report.timed_out, unexpected = report.unexpected, "torture run inconsistent");
        let actual = match &report.count_error {
            Some(err) => format!("count failed: {err}"),
            None => format!("{} rows", report.persisted_rows),
        };
        Err(CliError::mismatch(
            "torture",
            format!("{} rows", report.expected_rows),
            actual,
        ))
    }
}
