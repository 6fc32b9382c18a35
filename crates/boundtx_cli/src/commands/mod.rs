//! CLI command implementations.

pub mod demo;
pub mod torture;

use boundtx_core::TxError;
use clap::ValueEnum;
use thiserror::Error;

/// Output format for commands that print a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A manager operation failed.
    #[error(transparent)]
    Tx(#[from] TxError),

    /// Worker threads could not be started.
    #[error("failed to start workers: {0}")]
    Spawn(#[from] std::io::Error),

    /// The report could not be serialized.
    #[error("failed to render report: {0}")]
    Render(#[from] serde_json::Error),

    /// A scenario produced a different result than expected.
    #[error("{scenario}: expected {expected}, got {actual}")]
    Mismatch {
        /// Scenario name.
        scenario: &'static str,
        /// Expected value.
        expected: String,
        /// Observed value.
        actual: String,
    },
}

impl CliError {
    /// Creates a mismatch error.
    pub fn mismatch(
        scenario: &'static str,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::Mismatch {
            scenario,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
