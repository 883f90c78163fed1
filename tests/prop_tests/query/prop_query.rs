use bson::Bson;
use nexus_shell::document::Document;
use nexus_shell::query::{CmpOp, Filter, apply_update, eval_filter, parse_update};
use proptest::prelude::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        .. proptest::test_runner::Config::default()
    })]
    #[test]
    fn prop_eq_symmetry(v in any_bson_number(), w in any_bson_number()) {
        let doc_v = bson::doc!{"x": v.clone()};
        let doc_w = bson::doc!{"x": w.clone()};
        let f_eq_v = Filter::Cmp { path: "x".into(), op: CmpOp::Eq, value: w };
        let f_eq_w = Filter::Cmp { path: "x".into(), op: CmpOp::Eq, value: v };
        prop_assert_eq!(eval_filter(&doc_v, &f_eq_v), eval_filter(&doc_w, &f_eq_w));
    }

    // integers form a total order, so gt and lte are complementary
    #[test]
    fn prop_order_consistency(i in -1_000_000i64..1_000_000, j in -1_000_000i32..1_000_000) {
        let doc = bson::doc!{"x": i};
        let f_gt = Filter::Cmp { path: "x".into(), op: CmpOp::Gt, value: Bson::Int32(j) };
        let f_lte = Filter::Cmp { path: "x".into(), op: CmpOp::Lte, value: Bson::Int32(j) };
        prop_assert_eq!(eval_filter(&doc, &f_gt), !eval_filter(&doc, &f_lte));
    }

    #[test]
    fn prop_in_matches_any_member(x in 0i32..20, set in proptest::collection::vec(0i32..20, 1..6)) {
        let doc = bson::doc!{"x": x};
        let values: Vec<Bson> = set.iter().copied().map(Bson::Int32).collect();
        let f_in = Filter::In { path: "x".into(), values: values.clone() };
        let f_nin = Filter::Nin { path: "x".into(), values };
        prop_assert_eq!(eval_filter(&doc, &f_in), set.contains(&x));
        prop_assert_eq!(eval_filter(&doc, &f_nin), !set.contains(&x));
    }

    #[test]
    fn prop_add_to_set_is_idempotent(start in proptest::collection::vec(0i32..5, 0..6), add in 0i32..5) {
        let mut d = Document::new(bson::doc!{"_id": 1, "s": start.clone()});
        let upd = parse_update(&bson::doc!{"$addToSet": {"s": add}}).unwrap();
        let first = apply_update(&mut d, &upd).unwrap();
        prop_assert_eq!(first, !start.contains(&add));
        let snapshot = d.data.clone();
        prop_assert!(!apply_update(&mut d, &upd).unwrap());
        prop_assert_eq!(d.data, snapshot);
    }

    #[test]
    fn prop_pull_removes_every_match(start in proptest::collection::vec(0i32..4, 0..8), gone in 0i32..4) {
        let mut d = Document::new(bson::doc!{"_id": 1, "s": start.clone()});
        let upd = parse_update(&bson::doc!{"$pull": {"s": gone}}).unwrap();
        let changed = apply_update(&mut d, &upd).unwrap();
        let expected: Vec<Bson> = start.iter().copied().filter(|v| *v != gone).map(Bson::Int32).collect();
        prop_assert_eq!(changed, expected.len() != start.len());
        prop_assert_eq!(d.data.get_array("s").unwrap(), &expected);
    }
}

fn any_bson_number() -> impl Strategy<Value = Bson> {
    prop_oneof![
        any::<i32>().prop_map(Bson::Int32),
        any::<i64>().prop_map(Bson::Int64),
        (-1.0e12f64..1.0e12f64).prop_map(Bson::Double),
    ]
}
