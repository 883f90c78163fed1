#[path = "mod_query.rs"]
mod query_tests;
