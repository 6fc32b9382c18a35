//! Concurrent torture runs.
//!
//! Many threads share one manager and each runs units of work that insert a
//! person. Every odd-numbered unit fails after its insert, so a consistent
//! run leaves exactly the even-numbered rows committed.

use crate::fixtures::{insert_person, persons_count, TestEnv};
use boundtx_core::{TxError, TxKit};
use serde::Serialize;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Failure raised by odd-numbered units.
pub const UNLUCKY_UNIT: &str = "Odd have no luck...";

/// Configuration for a torture run.
#[derive(Debug, Clone)]
pub struct TortureConfig {
    /// Number of units of work.
    pub units: usize,
    /// Number of worker threads sharing the manager.
    pub threads: usize,
    /// Time allowed for all units to complete.
    pub timeout: Duration,
}

impl Default for TortureConfig {
    fn default() -> Self {
        Self {
            units: 1_000,
            threads: 50,
            timeout: Duration::from_secs(15),
        }
    }
}

impl TortureConfig {
    /// Returns the number of units expected to commit.
    pub fn expected_rows(&self) -> u64 {
        self.units.div_ceil(2) as u64
    }
}

/// Outcome of a torture run.
#[derive(Debug, Clone, Serialize)]
pub struct TortureReport {
    /// Units scheduled.
    pub units: usize,
    /// Worker threads used.
    pub threads: usize,
    /// Units that finished before the deadline.
    pub completed: usize,
    /// Units that committed.
    pub committed: usize,
    /// Units that failed with the expected unit-of-work failure.
    pub failed: usize,
    /// Units that failed in any other way.
    pub unexpected: usize,
    /// Rows committed at the end of the run.
    pub persisted_rows: u64,
    /// Why the final row count could not be taken, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_error: Option<String>,
    /// Rows a consistent run commits.
    pub expected_rows: u64,
    /// True if the deadline passed before every unit finished.
    pub timed_out: bool,
    /// Wall time until the last unit finished or the deadline passed.
    pub elapsed_ms: u64,
    /// Completed units per second.
    pub units_per_second: f64,
}

impl TortureReport {
    /// Returns true if every unit finished in time and exactly the
    /// succeeding units left rows behind.
    pub fn is_consistent(&self) -> bool {
        !self.timed_out
            && self.unexpected == 0
            && self.completed == self.units
            && self.count_error.is_none()
            && self.persisted_rows == self.expected_rows
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Units: {} on {} threads", self.units, self.threads);
        println!("Completed: {}", self.completed);
        println!("Committed: {}", self.committed);
        println!("Failed as expected: {}", self.failed);
        println!("Unexpected failures: {}", self.unexpected);
        match &self.count_error {
            Some(err) => println!("Rows: count failed: {err}"),
            None => println!("Rows: {} (expected {})", self.persisted_rows, self.expected_rows),
        }
        println!("Duration: {} ms", self.elapsed_ms);
        println!("Throughput: {:.2} units/sec", self.units_per_second);
    }
}

enum UnitOutcome {
    Committed,
    Failed,
    Unexpected,
}

fn run_unit(kit: &TxKit, index: usize) -> UnitOutcome {
    let source = kit.source();
    let result = kit.manager().tx(|| {
        insert_person(source, 1, "Mr Foo")?;
        if index % 2 == 1 {
            return Err(UNLUCKY_UNIT.into());
        }
        Ok(())
    });
    match result {
        Ok(()) => UnitOutcome::Committed,
        Err(TxError::TransactionFailure { source })
            if source.to_string() == UNLUCKY_UNIT =>
        {
            UnitOutcome::Failed
        }
        Err(_) => UnitOutcome::Unexpected,
    }
}

/// Runs `config.units` units of work on `config.threads` threads against
/// `env`, then counts the committed persons in a fresh transaction.
///
/// Workers that are still busy when the deadline passes are left running.
///
/// # Errors
///
/// Returns an error if a worker thread cannot be spawned.
pub fn run_torture(env: &TestEnv, config: &TortureConfig) -> io::Result<TortureReport> {
    let next = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();
    let start = Instant::now();
    let deadline = start + config.timeout;

    let mut handles = Vec::with_capacity(config.threads);
    for worker in 0..config.threads.max(1) {
        let kit = env.kit.clone();
        let next = Arc::clone(&next);
        let tx = tx.clone();
        let units = config.units;
        let handle = thread::Builder::new()
            .name(format!("torture-{worker}"))
            .spawn(move || loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                if index >= units {
                    break;
                }
                if tx.send(run_unit(&kit, index)).is_err() {
                    break;
                }
            })?;
        handles.push(handle);
    }
    drop(tx);

    let (mut committed, mut failed, mut unexpected) = (0, 0, 0);
    let mut timed_out = false;
    while committed + failed + unexpected < config.units {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(UnitOutcome::Committed) => committed += 1,
            Ok(UnitOutcome::Failed) => failed += 1,
            Ok(UnitOutcome::Unexpected) => unexpected += 1,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                timed_out = true;
                break;
            }
            // Every worker exited; the missing units panicked.
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    let elapsed = start.elapsed();

    if !timed_out {
        for handle in handles {
            if handle.join().is_err() {
                unexpected += 1;
            }
        }
    }

    let (persisted_rows, count_error) = match env
        .manager()
        .tx_result(|| Ok(persons_count(env.source())?))
    {
        Ok(rows) => (rows, None),
        Err(err) => {
            warn!(error = %err, "final row count failed");
            (0, Some(err.to_string()))
        }
    };
    let completed = committed + failed + unexpected;
    let seconds = elapsed.as_secs_f64();

    Ok(TortureReport {
        units: config.units,
        threads: config.threads,
        completed,
        committed,
        failed,
        unexpected,
        persisted_rows,
        count_error,
        expected_rows: config.expected_rows(),
        timed_out,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        units_per_second: if seconds > 0.0 {
            completed as f64 / seconds
        } else {
            0.0
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use boundtx_store::FaultPoint;

    #[test]
    fn expected_rows_counts_even_units() {
        let config = |units| TortureConfig {
            units,
            ..Default::default()
        };
        assert_eq!(config(1_000).expected_rows(), 500);
        assert_eq!(config(7).expected_rows(), 4);
        assert_eq!(config(0).expected_rows(), 0);
    }

    #[test]
    fn small_run_is_consistent() {
        let env = TestEnv::new();
        let config = TortureConfig {
            units: 40,
            threads: 4,
            timeout: Duration::from_secs(10),
        };
        let report = run_torture(&env, &config).unwrap();
        assert!(report.is_consistent(), "{report:?}");
        assert_eq!(report.committed, 20);
        assert_eq!(report.failed, 20);
        assert_eq!(env.store.stats().open_now(), 0);
        assert!(report.count_error.is_none());
    }

    #[test]
    fn failed_final_count_is_reported() {
        let env = TestEnv::new();
        env.store.faults().arm_once(FaultPoint::Connect);
        let config = TortureConfig {
            units: 0,
            threads: 1,
            timeout: Duration::from_secs(10),
        };
        let report = run_torture(&env, &config).unwrap();
        assert!(report.count_error.is_some());
        assert!(!report.is_consistent());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["count_error"].is_string());
    }
}
