#[path = "mod_database.rs"]
mod database_tests;
