use clap::{Parser, Subcommand};
use nexus_shell::cli::{self as prog_cli, OutputMode};
use nexus_shell::config::AppConfig;
use nexus_shell::{Database, logger, telemetry};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nexus-shell", version, about = "Run database-shell scripts against an embedded document store", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). Defaults to ./nexus-shell.toml when present.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Directory of <collection>.bson dumps, loaded before and written after each command")]
    data_dir: Option<PathBuf>,
    #[arg(long, help = "Output format: human|plain|json")]
    format: Option<String>,
    #[arg(long, help = "Directory for app/audit/metrics logs")]
    log_dir: Option<PathBuf>,
    #[arg(long, help = "Log level: off|error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run script files in order in one session")]
    Run {
        #[arg(required = true, help = "Script files (e.g., scripts/products.js)")]
        scripts: Vec<PathBuf>,
        #[arg(long, help = "Do not print the value of bare expression statements")]
        quiet: bool,
    },
    #[command(about = "Run inline code")]
    Eval {
        #[arg(help = "Code, e.g. \"db.products.find({ price: { $gt: 100 } })\"")]
        code: String,
        #[arg(long, help = "Do not print the value of bare expression statements")]
        quiet: bool,
    },
    #[command(about = "Read statements from stdin; .exit quits")]
    Repl,
    #[command(about = "Write a collection as NDJSON")]
    Export {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(long, help = "Output file; stdout when omitted")]
        out: Option<PathBuf>,
    },
    #[command(name = "collections", about = "List collections")]
    ColList,
    #[command(about = "Print query and write counters")]
    Metrics,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = real_main(cli) {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let from_cli = AppConfig {
        data_dir: cli.data_dir,
        format: cli.format,
        log_dir: cli.log_dir,
        log_level: cli.log_level,
        audit: None,
    };
    let cwd = std::env::current_dir().ok();
    let cfg = AppConfig::load(from_cli, cli.config.as_deref(), cwd.as_deref(), |k| std::env::var(k).ok())?;

    // logging stays off unless a log directory is configured
    if cfg.log_dir.is_some() || std::env::var_os("NEXUS_SHELL_LOG_DIR").is_some() {
        logger::configure_from_env(cfg.log_dir.as_deref(), cfg.log_level.as_deref())?;
    }
    telemetry::set_audit_enabled(cfg.audit.unwrap_or(true));

    let mode: OutputMode = cfg.format.as_deref().unwrap_or("human").parse()?;
    let db = match &cfg.data_dir {
        Some(dir) => Database::open(dir)?,
        None => Database::new(),
    };

    let cmd = match cli.command {
        Commands::Run { scripts, quiet } => prog_cli::Command::RunScripts { paths: scripts, echo: !quiet },
        Commands::Eval { code, quiet } => prog_cli::Command::Eval { code, echo: !quiet },
        Commands::Repl => prog_cli::Command::Repl,
        Commands::Export { collection, out } => prog_cli::Command::Export { collection, out },
        Commands::ColList => prog_cli::Command::ColList,
        Commands::Metrics => prog_cli::Command::Metrics,
    };
    let writes = cmd.writes();
    let result = prog_cli::run_with_format(db.engine(), cmd, mode);
    // statements that ran before a failure keep their effects
    if writes {
        db.save()?;
    }
    result
}
