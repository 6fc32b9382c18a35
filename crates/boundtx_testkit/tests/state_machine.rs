//! Random operation sequences checked against the reference model.

use boundtx_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn manager_matches_model(ops in tx_ops_strategy(40)) {
        let env = TestEnv::new();
        let mut model = ProtocolModel::new();

        for (step, op) in ops.iter().enumerate() {
            let expected = model.apply(*op);
            let actual = execute_op(&env, *op);
            prop_assert_eq!(&actual, &expected, "step {} ({:?})", step, op);
            prop_assert_eq!(env.manager().status(), model.status());
        }

        // Close whatever the sequence left open.
        if env.manager().is_active() {
            env.manager().rollback().unwrap();
            model.apply(TxOp::Rollback);
        }

        prop_assert_eq!(env.committed_persons() as u64, model.committed_rows());
        prop_assert_eq!(env.manager().stats().connections_bound(), model.connections_bound());
        prop_assert_eq!(env.store.stats().open_now(), 0);
    }

    #[test]
    fn failed_units_never_commit(ids in prop::collection::vec(0i64..50, 1..20), fail in any::<bool>()) {
        let env = TestEnv::new();
        let source = env.source();
        let result = env.manager().tx(|| {
            for id in &ids {
                insert_person(source, *id, "generated")?;
            }
            if fail {
                return Err("unit failed".into());
            }
            Ok(())
        });

        prop_assert_eq!(result.is_err(), fail);
        let expected = if fail { 0 } else { ids.len() };
        prop_assert_eq!(env.committed_persons(), expected);
        prop_assert_eq!(env.manager().status(), boundtx_core::TxStatus::Absent);
    }
}
