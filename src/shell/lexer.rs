use crate::errors::DbError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Num(f64),
    Str(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Colon,
    Semi,
    Dot,
    Eq,
    Minus,
    Plus,
    Eof,
}

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
    pub col: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    col: usize,
}

impl Lexer<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn err(&self, msg: impl Into<String>) -> DbError {
        DbError::ScriptError { line: self.line, col: self.col, msg: msg.into() }
    }

    /// Skip whitespace and comments. Returns an error for an unterminated block comment.
    fn skip_trivia(&mut self) -> Result<(), DbError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    match ahead.next() {
                        Some('/') => {
                            while let Some(c) = self.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        Some('*') => {
                            let (line, col) = (self.line, self.col);
                            self.bump();
                            self.bump();
                            let mut prev = '\0';
                            loop {
                                match self.bump() {
                                    Some('/') if prev == '*' => break,
                                    Some(c) => prev = c,
                                    None => {
                                        return Err(DbError::ScriptError {
                                            line,
                                            col,
                                            msg: UNTERMINATED_COMMENT.into(),
                                        });
                                    }
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self) -> Result<Tok, DbError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            let exp_sign = matches!(c, '+' | '-') && text.ends_with(['e', 'E']);
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '_' || exp_sign {
                if c != '_' {
                    text.push(c);
                }
                self.bump();
            } else {
                break;
            }
        }
        text.parse::<f64>().map(Tok::Num).map_err(|_| self.err(format!("invalid number '{text}'")))
    }

    fn string(&mut self, quote: char) -> Result<Tok, DbError> {
        let (line, col) = (self.line, self.col);
        self.bump();
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(DbError::ScriptError { line, col, msg: UNTERMINATED_STRING.into() });
            };
            match c {
                c if c == quote => return Ok(Tok::Str(out)),
                '\n' if quote != '`' => {
                    return Err(DbError::ScriptError { line, col, msg: UNTERMINATED_STRING.into() });
                }
                '\\' => {
                    let esc = self.bump().ok_or_else(|| self.err(UNTERMINATED_STRING))?;
                    match esc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'u' => {
                            let hex: String = (0..4).filter_map(|_| self.bump()).collect();
                            let ch = u32::from_str_radix(&hex, 16)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| self.err(format!("invalid unicode escape '\\u{hex}'")))?;
                            out.push(ch);
                        }
                        '\n' => {}
                        other => out.push(other),
                    }
                }
                c => out.push(c),
            }
        }
    }
}

const UNTERMINATED_COMMENT: &str = "unterminated comment";
const UNTERMINATED_STRING: &str = "unterminated string literal";

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

/// Split script source into tokens, ending with `Tok::Eof`.
///
/// # Errors
/// Returns `ScriptError` for unterminated strings or comments, bad numbers, and
/// unexpected characters.
pub fn tokenize(src: &str) -> Result<Vec<Token>, DbError> {
    let mut lx = Lexer { chars: src.chars().peekable(), line: 1, col: 1 };
    let mut out = Vec::new();
    loop {
        lx.skip_trivia()?;
        let (line, col) = (lx.line, lx.col);
        let Some(c) = lx.peek() else {
            out.push(Token { tok: Tok::Eof, line, col });
            return Ok(out);
        };
        let tok = match c {
            '\'' | '"' | '`' => lx.string(c)?,
            c if c.is_ascii_digit() => lx.number()?,
            '.' => {
                let mut ahead = lx.chars.clone();
                ahead.next();
                if ahead.peek().is_some_and(char::is_ascii_digit) {
                    lx.number()?
                } else {
                    lx.bump();
                    Tok::Dot
                }
            }
            c if is_ident_start(c) => {
                let mut s = String::new();
                while let Some(c) = lx.peek() {
                    if is_ident_start(c) || c.is_ascii_digit() {
                        s.push(c);
                        lx.bump();
                    } else {
                        break;
                    }
                }
                Tok::Ident(s)
            }
            _ => {
                lx.bump();
                match c {
                    '{' => Tok::LBrace,
                    '}' => Tok::RBrace,
                    '[' => Tok::LBracket,
                    ']' => Tok::RBracket,
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    ',' => Tok::Comma,
                    ':' => Tok::Colon,
                    ';' => Tok::Semi,
                    '=' => Tok::Eq,
                    '-' => Tok::Minus,
                    '+' => Tok::Plus,
                    other => {
                        return Err(DbError::ScriptError {
                            line,
                            col,
                            msg: format!("unexpected character '{other}'"),
                        });
                    }
                }
            }
        };
        out.push(Token { tok, line, col });
    }
}

/// Whether `src` stops inside an open bracket, string, or comment, so an interactive
/// reader should ask for another line.
#[must_use]
pub fn needs_more_input(src: &str) -> bool {
    match tokenize(src) {
        Ok(tokens) => {
            let mut depth = 0i64;
            for t in &tokens {
                match t.tok {
                    Tok::LBrace | Tok::LBracket | Tok::LParen => depth += 1,
                    Tok::RBrace | Tok::RBracket | Tok::RParen => depth -= 1,
                    _ => {}
                }
            }
            depth > 0
        }
        Err(DbError::ScriptError { msg, .. }) => {
            msg == UNTERMINATED_COMMENT || (msg == UNTERMINATED_STRING && src.contains('`'))
        }
        Err(_) => false,
    }
}
