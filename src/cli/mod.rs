mod command;
mod runner;

pub use command::Command;
pub use runner::{OutputMode, WriterSink, run, run_repl, run_with_format, run_with_writer};
