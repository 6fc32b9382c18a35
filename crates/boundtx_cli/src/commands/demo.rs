//! Demo command implementation.

use super::CliError;
use boundtx_core::{TxError, TxKit};
use boundtx_testkit::{insert_person, persons_count, TestEnv};
use tracing::info;

/// Runs the demo scenarios against a fresh memory store.
pub fn run() -> Result<(), CliError> {
    let env = TestEnv::new();
    let kit = &env.kit;

    round_trip(kit)?;
    expect_committed(&env, "round trip", 1)?;

    rolled_back(kit)?;
    expect_committed(&env, "rollback", 1)?;

    failing_unit(kit)?;
    expect_committed(&env, "failing unit", 1)?;

    protocol_violations(kit);

    let stats = kit.manager().stats().snapshot();
    let store = env.store.stats().snapshot();
    println!();
    println!(
        "Transactions: {} begun, {} committed, {} rolled back, {} without connection",
        stats.begun, stats.committed, stats.rolled_back, stats.empty
    );
    println!("Connections:  {} opened, {} closed", store.opened, store.closed);
    Ok(())
}

fn round_trip(kit: &TxKit) -> Result<(), CliError> {
    let (manager, source) = (kit.manager(), kit.source());
    println!("== begin, insert, commit");
    manager.begin()?;
    insert_person(source, 1, "Mr Foo")?;
    let inside = persons_count(source)?;
    manager.commit()?;
    println!("   rows inside the transaction: {inside}");

    manager.begin()?;
    let after = persons_count(source)?;
    manager.commit()?;
    println!("   rows after commit: {after}");
    info!(rows = after, "round trip finished");
    Ok(())
}

fn rolled_back(kit: &TxKit) -> Result<(), CliError> {
    let (manager, source) = (kit.manager(), kit.source());
    println!("== begin, insert, rollback");
    manager.begin()?;
    insert_person(source, 2, "Mrs Bar")?;
    let inside = persons_count(source)?;
    manager.rollback()?;
    println!("   rows inside the transaction: {inside}");
    Ok(())
}

fn failing_unit(kit: &TxKit) -> Result<(), CliError> {
    let source = kit.source();
    println!("== unit of work failing after its insert");
    let result = kit.manager().tx(|| {
        insert_person(source, 3, "Mr Baz")?;
        Err("Something happened!".into())
    });
    match result {
        Err(err @ TxError::TransactionFailure { .. }) => {
            println!("   unit failed: {err}");
            Ok(())
        }
        Err(err) => Err(err.into()),
        Ok(()) => Err(CliError::mismatch("failing unit", "a failure", "success")),
    }
}

fn protocol_violations(kit: &TxKit) {
    let manager = kit.manager();
    println!("== protocol violations");
    for (what, result) in [
        ("commit without begin", manager.commit()),
        ("connection without begin", kit.source().connection().map(drop)),
    ] {
        if let Err(err) = result {
            println!("   {what}: {err}");
        }
    }
}

fn expect_committed(env: &TestEnv, scenario: &'static str, expected: usize) -> Result<(), CliError> {
    let actual = env.committed_persons();
    if actual == expected {
        Ok(())
    } else {
        Err(CliError::mismatch(scenario, expected, actual))
    }
}
