use bson::Bson;
use nexus_shell::Database;
use nexus_shell::shell::{OutputEvent, needs_more_input, parse_program, tokenize};
use proptest::prelude::*;

fn echoed(db: &Database, src: &str) -> Bson {
    match db.run_script(src).unwrap().remove(0) {
        OutputEvent::Result { value, .. } => value,
        OutputEvent::Log { args, .. } => Bson::Array(args),
    }
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        .. proptest::test_runner::Config::default()
    })]
    #[test]
    fn prop_integer_literals_are_int32(n in any::<i32>()) {
        let db = Database::new();
        prop_assert_eq!(echoed(&db, &format!("NumberInt({n})")), Bson::Int32(n));
        db.run_script(&format!("db.lit.insertOne({{ _id: 1, v: {n} }})")).unwrap();
        let stored = db.get_collection("lit").unwrap().get_all_documents().remove(0).data;
        prop_assert_eq!(stored.get("v"), Some(&Bson::Int32(n)));
    }

    #[test]
    fn prop_wide_integers_become_doubles(n in (i64::from(i32::MAX) + 1)..(1i64 << 52)) {
        let db = Database::new();
        db.run_script(&format!("db.lit.insertOne({{ _id: 1, v: {n}, w: -{n} }})")).unwrap();
        let stored = db.get_collection("lit").unwrap().get_all_documents().remove(0).data;
        #[allow(clippy::cast_precision_loss)]
        let f = n as f64;
        prop_assert_eq!(stored.get("v"), Some(&Bson::Double(f)));
        prop_assert_eq!(stored.get("w"), Some(&Bson::Double(-f)));
    }

    #[test]
    fn prop_string_literals_round_trip(s in "[a-zA-Z0-9 _.,:;!?-]{0,24}") {
        let db = Database::new();
        prop_assert_eq!(echoed(&db, &format!("'{s}'")), Bson::String(s.clone()));
        prop_assert_eq!(echoed(&db, &format!("\"{s}\"")), Bson::String(s));
    }

    #[test]
    fn prop_front_end_never_panics(src in "[ -~\\n]{0,64}") {
        let _ = tokenize(&src);
        let _ = needs_more_input(&src);
        if let Ok(program) = parse_program(&src) {
            prop_assert!(program.len() <= src.len() + 1);
        }
    }

    #[test]
    fn prop_unclosed_brackets_need_more_input(depth in 1usize..8) {
        let open = "db.c.insertMany([{ a: [".repeat(depth);
        prop_assert!(needs_more_input(&open));
    }
}
