use bson::{Bson, doc};
use nexus_shell::Database;
use nexus_shell::shell::OutputEvent;

use crate::integration_tests::support::{array_len, logs, names, results};

const SEED: &str = include_str!("../../../scripts/users_seed.js");
const PRACTICE: &str = include_str!("../../../scripts/users.js");

fn run_practice() -> (Database, Vec<OutputEvent>) {
    let db = Database::new();
    let mut session = db.session();
    let mut events = Vec::new();
    session.run_script(SEED, &mut events).unwrap();
    session.run_script(PRACTICE, &mut events).unwrap();
    (db, events)
}

#[test]
fn seed_supports_the_skill_name_query() {
    let (_db, events) = run_practice();
    let r = results(&events);
    assert_eq!(r[1], Bson::Array(vec![Bson::Document(doc! {"name": "Chloe"})]));
}

#[test]
fn logged_query_results() {
    let (_db, events) = run_practice();
    let l = logs(&events);
    assert_eq!(l.len(), 7);

    assert_eq!(l[0][0], Bson::String("Documents with age > 30:".into()));
    assert_eq!(
        l[0][1],
        Bson::Array(vec![
            Bson::Document(doc! {"name": "Ana", "email": "aminextleveldeveloper@gmail.com"}),
            Bson::Document(doc! {"name": "Chloe", "email": "chloe@example.com"}),
        ])
    );
    assert_eq!(names(&l[1][1]), vec!["Ana", "Ben"]);
    assert_eq!(names(&l[2][1]), vec!["Ben"]);
    // skills hold records, so matching them against plain strings finds nothing
    assert_eq!(array_len(&l[3][1]), 0);
    assert_eq!(
        l[4],
        vec![Bson::String("Added Python skill for user with email aminextleveldeveloper@gmail.com".into())]
    );
}

#[test]
fn updates_reshape_the_target_user() {
    let (db, events) = run_practice();
    let acks: Vec<Bson> = results(&events).into_iter().skip(2).collect();
    assert_eq!(acks.len(), 3);
    for a in &acks {
        assert_eq!(a.as_document().unwrap().get_i32("modifiedCount").unwrap(), 1);
    }

    let found = db
        .run_script("db.users.findOne({ email: 'aminextleveldeveloper@gmail.com' }, { skills: 1, languages: 1, _id: 0 })")
        .unwrap();
    assert_eq!(
        results(&found).remove(0),
        Bson::Document(doc! {
            "skills": [
                {"name": "JavaScript", "level": "Expert", "isLearning": false},
                {"name": "Python", "level": "Beginner", "isLearning": true},
            ],
            "languages": ["English", "Bangla", "Spanish"],
        })
    );
}

#[test]
fn log_events_carry_their_statement_numbers() {
    let (_db, events) = run_practice();
    let log_stmts: Vec<usize> =
        events.iter().filter(|e| matches!(e, OutputEvent::Log { .. })).map(OutputEvent::stmt).collect();
    assert_eq!(log_stmts, vec![5, 7, 9, 11, 13, 15, 17]);
}

#[test]
fn running_the_practice_twice_is_stable() {
    let (db, _) = run_practice();
    let mut session = db.session();
    let mut events = Vec::new();
    session.run_script(PRACTICE, &mut events).unwrap();
    let acks = results(&events);
    // the push adds a second Python skill; addToSet and pull change nothing
    let modified: Vec<i32> =
        acks.iter().map(|a| a.as_document().unwrap().get_i32("modifiedCount").unwrap()).collect();
    assert_eq!(modified, vec![1, 0, 0]);
}
