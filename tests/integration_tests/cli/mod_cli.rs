use nexus_shell::Database;
use nexus_shell::cli::{Command, OutputMode, run_with_writer};

use crate::integration_tests::support::script_path;

fn run(db: &Database, cmd: Command, mode: OutputMode) -> Result<String, String> {
    let mut out = Vec::new();
    run_with_writer(db.engine(), cmd, mode, &mut out).map_err(|e| e.to_string())?;
    Ok(String::from_utf8(out).unwrap())
}

#[test]
fn run_scripts_in_json_mode_numbers_statements() {
    let db = Database::new();
    let text = run(
        &db,
        Command::RunScripts { paths: vec![script_path("products.js")], echo: true },
        OutputMode::Json,
    )
    .unwrap();
    let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 21);
    assert_eq!(lines[0]["stmt"], 1);
    assert_eq!(lines[0]["result"]["acknowledged"], true);
    assert_eq!(lines[2]["result"]["name"], "Laptop");
    assert_eq!(lines[20]["result"]["modifiedCount"], 1);
}

#[test]
fn seed_then_practice_shares_one_session() {
    let db = Database::new();
    let text = run(
        &db,
        Command::RunScripts { paths: vec![script_path("users_seed.js"), script_path("users.js")], echo: false },
        OutputMode::Plain,
    )
    .unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 7, "{text}");
    assert!(lines[0].starts_with("Documents with age > 30: [{\"name\":\"Ana\""), "{text}");
    assert_eq!(lines[3], "Documents with skills in JavaScript and Java: []");
    assert_eq!(lines[6], "Removed Kotlin skill for user with email aminextleveldeveloper@gmail.com");
}

#[test]
fn quiet_runs_print_only_logs() {
    let db = Database::new();
    let text = run(
        &db,
        Command::Eval { code: "db.q.insertOne({ a: 1 }); print('done')".into(), echo: false },
        OutputMode::Plain,
    )
    .unwrap();
    assert_eq!(text, "done\n");
}

#[test]
fn script_errors_name_the_file_and_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.js");
    std::fs::write(&path, "db.t.insertOne({ a: 1 })\ndb.t.find({ $where: 1 })\ndb.t.insertOne({ a: 2 })\n").unwrap();
    let db = Database::new();
    let err = run(&db, Command::RunScripts { paths: vec![path], echo: true }, OutputMode::Plain).unwrap_err();
    assert!(err.contains("bad.js"), "{err}");
    assert!(err.contains("script error at 2:1"), "{err}");
    // statements before the failure have taken effect, later ones have not
    assert_eq!(db.get_collection("t").map(|c| c.len()), Some(1));
}

#[test]
fn missing_script_is_reported() {
    let db = Database::new();
    let err = run(
        &db,
        Command::RunScripts { paths: vec!["does/not/exist.js".into()], echo: true },
        OutputMode::Human,
    )
    .unwrap_err();
    assert!(err.contains("does/not/exist.js"), "{err}");
}

#[test]
fn data_dir_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Database::open(dir.path()).unwrap();
        run(
            &db,
            Command::RunScripts { paths: vec![script_path("products.js")], echo: false },
            OutputMode::Plain,
        )
        .unwrap();
        db.save().unwrap();
    }
    let db = Database::open(dir.path()).unwrap();
    assert_eq!(run(&db, Command::ColList, OutputMode::Plain).unwrap(), "products\n");
    let text = run(
        &db,
        Command::Eval { code: "db.products.findOne({ name: 'Laptop' }, { tags: 1, _id: 0 })".into(), echo: true },
        OutputMode::Plain,
    )
    .unwrap();
    assert_eq!(text, "{\"tags\":[\"office\"]}\n");

    let exported = run(&db, Command::Export { collection: "products".into(), out: None }, OutputMode::Plain).unwrap();
    assert_eq!(exported.lines().count(), 5);
}
