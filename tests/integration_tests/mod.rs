// Aggregates per-module test suites
mod cli;
mod database;
mod query;
mod scripts;
mod support;
