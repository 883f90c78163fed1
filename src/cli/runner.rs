use crate::engine::Engine;
use crate::errors::DbError;
use crate::persist::export_ndjson;
use crate::query::telemetry;
use crate::shell::{OutputEvent, OutputSink, Session, needs_more_input, render_log, render_value};
use crate::utils::json::bson_to_json;
use std::error::Error;
use std::io::{BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;

use super::command::Command;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OutputMode {
    #[default]
    Human,
    Plain,
    Json,
}

impl FromStr for OutputMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(DbError::Config(format!("unknown output format '{other}' (human|plain|json)"))),
        }
    }
}

/// One line of output for `event` in `mode`.
#[must_use]
pub fn render_event(event: &OutputEvent, mode: OutputMode) -> String {
    match (mode, event) {
        (OutputMode::Json, OutputEvent::Result { stmt, value }) => {
            serde_json::json!({"stmt": stmt, "result": bson_to_json(value)}).to_string()
        }
        (OutputMode::Json, OutputEvent::Log { stmt, args }) => {
            serde_json::json!({"stmt": stmt, "log": render_log(args, false)}).to_string()
        }
        (m, OutputEvent::Result { value, .. }) => render_value(value, m == OutputMode::Human),
        (m, OutputEvent::Log { args, .. }) => render_log(args, m == OutputMode::Human),
    }
}

/// Writes each event as it happens.
pub struct WriterSink<'a> {
    out: &'a mut dyn Write,
    mode: OutputMode,
}

impl<'a> WriterSink<'a> {
    pub fn new(out: &'a mut dyn Write, mode: OutputMode) -> Self {
        Self { out, mode }
    }
}

impl OutputSink for WriterSink<'_> {
    fn emit(&mut self, event: OutputEvent) -> Result<(), DbError> {
        writeln!(self.out, "{}", render_event(&event, self.mode))?;
        Ok(())
    }
}

fn write_error(out: &mut dyn Write, mode: OutputMode, err: &DbError) -> std::io::Result<()> {
    match mode {
        OutputMode::Json => writeln!(out, "{}", serde_json::json!({"error": err.to_string()})),
        _ => writeln!(out, "error: {err}"),
    }
}

/// Interactive loop: statements run as soon as their brackets balance, errors are
/// reported and the session continues. `.exit` or end of input stops.
///
/// # Errors
/// Returns an error when reading input or writing output fails.
pub fn run_repl<R: BufRead>(
    engine: &Arc<Engine>,
    reader: R,
    mode: OutputMode,
    out: &mut dyn Write,
    prompt: bool,
) -> Result<(), Box<dyn Error>> {
    let mut session = Session::new(Arc::clone(engine));
    let mut buf = String::new();
    let show_prompt = |out: &mut dyn Write, cont: bool| -> std::io::Result<()> {
        if prompt {
            write!(out, "{}", if cont { "... " } else { "> " })?;
            out.flush()?;
        }
        Ok(())
    };
    show_prompt(out, false)?;
    for line in reader.lines() {
        let line = line?;
        if buf.is_empty() && line.trim() == ".exit" {
            break;
        }
        buf.push_str(&line);
        buf.push('\n');
        if needs_more_input(&buf) {
            show_prompt(out, true)?;
            continue;
        }
        let src = std::mem::take(&mut buf);
        let result = session.run_script(&src, &mut WriterSink::new(out, mode));
        if let Err(e) = result {
            write_error(out, mode, &e)?;
        }
        show_prompt(out, false)?;
    }
    if !buf.trim().is_empty() {
        let result = session.run_script(&buf, &mut WriterSink::new(out, mode));
        if let Err(e) = result {
            write_error(out, mode, &e)?;
        }
    }
    log::debug!("repl finished after {} statements", session.statements_run());
    Ok(())
}

/// Run `cmd`, writing everything it prints to `out`.
///
/// # Errors
/// Returns the first script, I/O, or lookup error.
pub fn run_with_writer(
    engine: &Arc<Engine>,
    cmd: Command,
    mode: OutputMode,
    out: &mut dyn Write,
) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::RunScripts { paths, echo } => {
            let mut session = Session::new(Arc::clone(engine)).with_echo(echo);
            for path in &paths {
                let src = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
                log::info!("running script {}", path.display());
                session
                    .run_script(&src, &mut WriterSink::new(out, mode))
                    .map_err(|e| format!("{}: {e}", path.display()))?;
            }
            Ok(())
        }
        Command::Eval { code, echo } => {
            let mut session = Session::new(Arc::clone(engine)).with_echo(echo);
            session.run_script(&code, &mut WriterSink::new(out, mode))?;
            Ok(())
        }
        Command::Repl => {
            use std::io::IsTerminal;
            let stdin = std::io::stdin();
            let prompt = stdin.is_terminal();
            run_repl(engine, stdin.lock(), mode, out, prompt)
        }
        Command::Export { collection, out: file } => {
            let col = engine
                .get_collection(&collection)
                .ok_or_else(|| DbError::NoSuchCollection(collection.clone()))?;
            let Some(path) = file else {
                export_ndjson(&col, &mut *out)?;
                return Ok(());
            };
            let n = export_ndjson(&col, std::fs::File::create(&path)?)?;
            log::info!("exported {n} documents from {collection} to {}", path.display());
            match mode {
                OutputMode::Json => {
                    let json = serde_json::json!({"exported": n, "collection": collection, "file": path.display().to_string()});
                    writeln!(out, "{json}")?;
                }
                OutputMode::Plain => writeln!(out, "{n}")?,
                OutputMode::Human => writeln!(out, "exported={n} collection={collection} file={}", path.display())?,
            }
            Ok(())
        }
        Command::ColList => {
            let names = engine.list_collection_names();
            match mode {
                OutputMode::Json => {
                    let names_json = serde_json::to_string(&names)?;
                    writeln!(out, "{names_json}")?;
                }
                _ => {
                    for n in names {
                        writeln!(out, "{n}")?;
                    }
                }
            }
            Ok(())
        }
        Command::Metrics => {
            write!(out, "{}", telemetry::metrics_text())?;
            Ok(())
        }
    }
}

/// # Errors
/// See [`run_with_writer`].
pub fn run_with_format(engine: &Arc<Engine>, cmd: Command, mode: OutputMode) -> Result<(), Box<dyn Error>> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    run_with_writer(engine, cmd, mode, &mut lock)
}

/// # Errors
/// See [`run_with_writer`].
pub fn run(engine: &Arc<Engine>, cmd: Command) -> Result<(), Box<dyn Error>> {
    run_with_format(engine, cmd, OutputMode::Human)
}
