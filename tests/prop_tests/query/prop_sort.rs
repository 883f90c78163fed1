use nexus_shell::document::Document;
use nexus_shell::engine::Engine;
use nexus_shell::query::{Filter, FindOptions, Order, SortSpec, find_docs};
use proptest::prelude::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 64,
        .. proptest::test_runner::Config::default()
    })]
    #[test]
    fn prop_multi_key_sort_non_decreasing(v in proptest::collection::vec((any::<i64>(), -3i32..3), 0..15)) {
        let engine = Engine::new();
        let col = engine.create_collection("srt").unwrap();
        for (a, b) in &v {
            col.insert_document(Document::new(bson::doc!{"a": *a, "b": *b})).unwrap();
        }
        let opts = FindOptions {
            sort: Some(vec![
                SortSpec { field: "b".into(), order: Order::Desc },
                SortSpec { field: "a".into(), order: Order::Asc },
            ]),
            ..FindOptions::default()
        };
        let docs = find_docs(&col, &Filter::True, &opts).to_vec();
        prop_assert_eq!(docs.len(), v.len());
        for w in docs.windows(2) {
            let (a0, b0) = (w[0].data.get_i64("a").unwrap(), w[0].data.get_i32("b").unwrap());
            let (a1, b1) = (w[1].data.get_i64("a").unwrap(), w[1].data.get_i32("b").unwrap());
            prop_assert!(b0 > b1 || (b0 == b1 && a0 <= a1));
        }
    }

    #[test]
    fn prop_skip_limit_window(n in 0usize..20, skip in 0usize..25, limit in 0usize..25) {
        let engine = Engine::new();
        let col = engine.create_collection("win").unwrap();
        for i in 0..n {
            col.insert_document(Document::new(bson::doc!{"i": i64::try_from(i).unwrap()})).unwrap();
        }
        let opts = FindOptions { skip: Some(skip), limit: Some(limit), ..FindOptions::default() };
        let got = find_docs(&col, &Filter::True, &opts).to_vec();
        let remaining = n.saturating_sub(skip);
        let expected = if limit == 0 { remaining } else { remaining.min(limit) };
        prop_assert_eq!(got.len(), expected);
        if let Some(first) = got.first() {
            prop_assert_eq!(first.data.get_i64("i").unwrap(), i64::try_from(skip).unwrap());
        }
    }
}
