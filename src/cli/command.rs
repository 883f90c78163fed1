use std::path::PathBuf;

pub enum Command {
    /// Run script files in order, sharing one session.
    RunScripts {
        paths: Vec<PathBuf>,
        echo: bool,
    },
    /// Run inline code.
    Eval {
        code: String,
        echo: bool,
    },
    /// Read statements from stdin until EOF or `.exit`.
    Repl,
    Export {
        collection: String,
        // stdout when None
        out: Option<PathBuf>,
    },
    ColList,
    Metrics,
}

impl Command {
    /// Whether the command can change stored data.
    #[must_use]
    pub const fn writes(&self) -> bool {
        matches!(self, Self::RunScripts { .. } | Self::Eval { .. } | Self::Repl)
    }
}
