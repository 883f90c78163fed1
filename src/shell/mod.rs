//! Interpreter for the database shell's JavaScript dialect: enough of it to run
//! collection scripts (literals, bindings, method chains, `console.log`).

mod interp;
mod lexer;
mod output;
mod parser;

pub use interp::{CursorSpec, DB_NAME, Session, Value};
pub use lexer::{Tok, Token, needs_more_input, tokenize};
pub use output::{OutputEvent, OutputSink, render_log, render_value};
pub use parser::{Expr, ExprKind, Stmt, StmtKind, parse_program};
