//! Many threads sharing one manager.

use boundtx_testkit::prelude::*;
use std::time::Duration;

#[test]
fn many_threads_torture_scenario() {
    let env = TestEnv::new();
    let config = TortureConfig {
        units: 1_000,
        threads: 50,
        timeout: Duration::from_secs(15),
    };

    let report = run_torture(&env, &config).unwrap();

    assert!(!report.timed_out, "{report:?}");
    assert_eq!(report.completed, 1_000);
    assert_eq!(report.unexpected, 0);
    assert_eq!(report.persisted_rows, 500);
    assert_eq!(env.committed_persons(), 500);
    assert_eq!(env.store.stats().open_now(), 0);
    assert_eq!(env.store.stats().abandoned(), 0);

    let stats = env.manager().stats().snapshot();
    // The final count adds one committed transaction.
    assert_eq!(stats.begun, 1_001);
    assert_eq!(stats.committed, 501);
    assert_eq!(stats.rolled_back, 500);
    assert_eq!(stats.connections_bound, 1_001);
}

#[test]
fn report_serializes_to_json() {
    let env = TestEnv::new();
    let config = TortureConfig {
        units: 10,
        threads: 2,
        timeout: Duration::from_secs(10),
    };
    let report = run_torture(&env, &config).unwrap();
    assert!(report.is_consistent());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["units"], 10);
    assert_eq!(json["persisted_rows"], 5);
    assert_eq!(json["timed_out"], false);
}
