//! Thread exit with an active transaction while a log subscriber is installed.

use boundtx_testkit::prelude::*;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

#[test]
fn thread_exit_rolls_back_under_debug_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();

    let env = Arc::new(TestEnv::new());
    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let env = Arc::clone(&env);
            thread::spawn(move || {
                env.manager().begin().unwrap();
                insert_person(env.source(), worker, "Mr Foo").unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(env.committed_persons(), 0);
    assert_eq!(env.store.stats().rollbacks(), 4);
    assert_eq!(env.store.stats().open_now(), 0);
    assert_eq!(env.store.stats().abandoned(), 0);

    // The manager is still usable from the main thread.
    env.manager()
        .tx(|| {
            insert_person(env.source(), 9, "Mrs Bar")?;
            Ok(())
        })
        .unwrap();
    assert_eq!(env.committed_persons(), 1);
}
