use crate::errors::DbError;

use super::lexer::{Tok, Token, tokenize};

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    Num(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Member { object: Box<Expr>, prop: String },
    Index { object: Box<Expr>, index: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    New { callee: String, args: Vec<Expr> },
    Neg(Box<Expr>),
    Pos(Box<Expr>),
}

/// An expression node and the position of its first token.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Let { name: String, init: Option<Expr>, constant: bool },
    Assign { name: String, value: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
    pub col: usize,
}

const MAX_NESTING: usize = 200;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, n: usize) -> &Tok {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].tok
    }

    fn next(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if &self.peek().tok == tok {
            self.next();
            true
        } else {
            false
        }
    }

    fn error_at(t: &Token, msg: impl Into<String>) -> DbError {
        DbError::ScriptError { line: t.line, col: t.col, msg: msg.into() }
    }

    fn unexpected(&self) -> DbError {
        let t = self.peek();
        let what = match &t.tok {
            Tok::Eof => "unexpected end of input".to_string(),
            other => format!("unexpected token {}", describe(other)),
        };
        Self::error_at(t, what)
    }

    fn expect(&mut self, tok: &Tok) -> Result<Token, DbError> {
        if &self.peek().tok == tok {
            Ok(self.next())
        } else {
            let t = self.peek();
            Err(Self::error_at(t, format!("expected {} but found {}", describe(tok), describe(&t.tok))))
        }
    }

    fn ident(&mut self) -> Result<String, DbError> {
        match self.peek().tok.clone() {
            Tok::Ident(s) => {
                self.next();
                Ok(s)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn statement(&mut self) -> Result<Stmt, DbError> {
        let start = self.peek().clone();
        if let Tok::Ident(kw) = &start.tok
            && matches!(kw.as_str(), "const" | "let" | "var")
        {
            self.next();
            let name = self.ident()?;
            let init = if self.eat(&Tok::Eq) { Some(self.expr()?) } else { None };
            let constant = kw == "const";
            if constant && init.is_none() {
                return Err(Self::error_at(&start, "missing initializer in const declaration"));
            }
            return Ok(Stmt { kind: StmtKind::Let { name, init, constant }, line: start.line, col: start.col });
        }
        if let Tok::Ident(name) = &start.tok
            && self.peek_at(1) == &Tok::Eq
        {
            let name = name.clone();
            self.next();
            self.next();
            let value = self.expr()?;
            return Ok(Stmt { kind: StmtKind::Assign { name, value }, line: start.line, col: start.col });
        }
        let e = self.expr()?;
        Ok(Stmt { kind: StmtKind::Expr(e), line: start.line, col: start.col })
    }

    fn expr(&mut self) -> Result<Expr, DbError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let t = self.peek().clone();
            return Err(Self::error_at(&t, "expression nested too deeply"));
        }
        let r = self.unary();
        self.depth -= 1;
        r
    }

    fn unary(&mut self) -> Result<Expr, DbError> {
        let t = self.peek().clone();
        match &t.tok {
            Tok::Minus => {
                self.next();
                let inner = self.expr()?;
                Ok(Expr { kind: ExprKind::Neg(Box::new(inner)), line: t.line, col: t.col })
            }
            Tok::Plus => {
                self.next();
                let inner = self.expr()?;
                Ok(Expr { kind: ExprKind::Pos(Box::new(inner)), line: t.line, col: t.col })
            }
            Tok::Ident(kw) if kw == "new" => {
                self.next();
                let callee = self.ident()?;
                let args = if self.peek().tok == Tok::LParen { self.args()? } else { Vec::new() };
                let base = Expr { kind: ExprKind::New { callee, args }, line: t.line, col: t.col };
                self.postfix(base)
            }
            _ => {
                let base = self.primary()?;
                self.postfix(base)
            }
        }
    }

    /// Member, index and call nodes take the position where their chain starts.
    fn postfix(&mut self, mut e: Expr) -> Result<Expr, DbError> {
        loop {
            let t = self.peek().clone();
            match t.tok {
                Tok::Dot => {
                    self.next();
                    let prop = self.ident()?;
                    let (line, col) = (e.line, e.col);
                    e = Expr { kind: ExprKind::Member { object: Box::new(e), prop }, line, col };
                }
                Tok::LBracket => {
                    self.next();
                    let index = self.expr()?;
                    self.expect(&Tok::RBracket)?;
                    let (line, col) = (e.line, e.col);
                    e = Expr { kind: ExprKind::Index { object: Box::new(e), index: Box::new(index) }, line, col };
                }
                Tok::LParen => {
                    let args = self.args()?;
                    let (line, col) = (e.line, e.col);
                    e = Expr { kind: ExprKind::Call { callee: Box::new(e), args }, line, col };
                }
                _ => return Ok(e),
            }
        }
    }

    fn args(&mut self) -> Result<Vec<Expr>, DbError> {
        self.expect(&Tok::LParen)?;
        let mut out = Vec::new();
        while !self.eat(&Tok::RParen) {
            out.push(self.expr()?);
            if !self.eat(&Tok::Comma) {
                self.expect(&Tok::RParen)?;
                break;
            }
        }
        Ok(out)
    }

    fn primary(&mut self) -> Result<Expr, DbError> {
        let t = self.peek().clone();
        let kind = match t.tok {
            Tok::Num(n) => {
                self.next();
                ExprKind::Num(n)
            }
            Tok::Str(ref s) => {
                let s = s.clone();
                self.next();
                ExprKind::Str(s)
            }
            Tok::Ident(ref s) => {
                let kind = match s.as_str() {
                    "true" => ExprKind::Bool(true),
                    "false" => ExprKind::Bool(false),
                    "null" => ExprKind::Null,
                    "undefined" => ExprKind::Undefined,
                    other => ExprKind::Ident(other.to_string()),
                };
                self.next();
                kind
            }
            Tok::LBrace => self.object()?,
            Tok::LBracket => {
                self.next();
                let mut items = Vec::new();
                while !self.eat(&Tok::RBracket) {
                    items.push(self.expr()?);
                    if !self.eat(&Tok::Comma) {
                        self.expect(&Tok::RBracket)?;
                        break;
                    }
                }
                ExprKind::Array(items)
            }
            Tok::LParen => {
                self.next();
                let inner = self.expr()?;
                self.expect(&Tok::RParen)?;
                return Ok(inner);
            }
            _ => return Err(self.unexpected()),
        };
        Ok(Expr { kind, line: t.line, col: t.col })
    }

    fn object(&mut self) -> Result<ExprKind, DbError> {
        self.expect(&Tok::LBrace)?;
        let mut fields: Vec<(String, Expr)> = Vec::new();
        while !self.eat(&Tok::RBrace) {
            let kt = self.next();
            let key = match &kt.tok {
                Tok::Ident(s) | Tok::Str(s) => s.clone(),
                Tok::Num(n) => n.to_string(),
                other => {
                    return Err(Self::error_at(&kt, format!("unexpected token {} in object key", describe(other))));
                }
            };
            let value = if self.eat(&Tok::Colon) {
                self.expr()?
            } else if matches!(kt.tok, Tok::Ident(_)) {
                // shorthand `{ name }`
                Expr { kind: ExprKind::Ident(key.clone()), line: kt.line, col: kt.col }
            } else {
                return Err(self.unexpected());
            };
            // later keys replace earlier ones but keep the first position
            if let Some(slot) = fields.iter_mut().find(|(k, _)| *k == key) {
                slot.1 = value;
            } else {
                fields.push((key, value));
            }
            if !self.eat(&Tok::Comma) {
                self.expect(&Tok::RBrace)?;
                break;
            }
        }
        Ok(ExprKind::Object(fields))
    }
}

fn describe(t: &Tok) -> String {
    match t {
        Tok::Ident(s) => format!("'{s}'"),
        Tok::Num(n) => format!("number {n}"),
        Tok::Str(_) => "string".into(),
        Tok::LBrace => "'{'".into(),
        Tok::RBrace => "'}'".into(),
        Tok::LBracket => "'['".into(),
        Tok::RBracket => "']'".into(),
        Tok::LParen => "'('".into(),
        Tok::RParen => "')'".into(),
        Tok::Comma => "','".into(),
        Tok::Colon => "':'".into(),
        Tok::Semi => "';'".into(),
        Tok::Dot => "'.'".into(),
        Tok::Eq => "'='".into(),
        Tok::Minus => "'-'".into(),
        Tok::Plus => "'+'".into(),
        Tok::Eof => "end of input".into(),
    }
}

/// Parse a whole script into statements.
///
/// # Errors
/// Returns `ScriptError` with the position of the offending token.
pub fn parse_program(src: &str) -> Result<Vec<Stmt>, DbError> {
    let mut p = Parser { tokens: tokenize(src)?, pos: 0, depth: 0 };
    let mut out = Vec::new();
    loop {
        while p.eat(&Tok::Semi) {}
        if p.peek().tok == Tok::Eof {
            return Ok(out);
        }
        let stmt = p.statement()?;
        let next = p.peek().clone();
        // a statement ends at ';', end of input, or a line break
        let prev_line = p.tokens[p.pos.saturating_sub(1)].line;
        if !matches!(next.tok, Tok::Semi | Tok::Eof) && next.line == prev_line {
            return Err(p.unexpected());
        }
        out.push(stmt);
    }
}
