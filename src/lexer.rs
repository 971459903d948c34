use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Var,
    Mut,
    Const,
    Fn,
    If,
    Else,
    Loop,
    While,
    For,
    In,
    Break,
    Continue,
    Return,
    True,
    False,
    None,
    Try,
    Catch,
    Throw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Keyword(Keyword),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pipe,
    DoubleAmpersand,
    DoublePipe,
    Bang,
    BangEqual,
    EqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Unknown,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: SourceSpan,
    /// A line break separates this token from the previous one.
    pub starts_line: bool,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current: usize,
    starts_line: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current: 0,
            starts_line: true,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let Some((start, ch)) = self.bump() else {
                tokens.push(self.token(self.current, TokenKind::Eof));
                return Ok(tokens);
            };
            let token = match ch {
                c if c.is_alphabetic() || c == '_' => self.identifier_or_keyword(start),
                '0'..='9' => self.number_literal(start),
                '"' => self.string_literal(start)?,
                '(' => self.token(start, TokenKind::LParen),
                ')' => self.token(start, TokenKind::RParen),
                '{' => self.token(start, TokenKind::LBrace),
                '}' => self.token(start, TokenKind::RBrace),
                '[' => self.token(start, TokenKind::LBracket),
                ']' => self.token(start, TokenKind::RBracket),
                ',' => self.token(start, TokenKind::Comma),
                '.' => self.token(start, TokenKind::Dot),
                ';' => self.token(start, TokenKind::Semicolon),
                ':' => self.token(start, TokenKind::Colon),
                '+' => self.token(start, TokenKind::Plus),
                '-' => self.token(start, TokenKind::Minus),
                '*' => self.token(start, TokenKind::Star),
                '/' => self.token(start, TokenKind::Slash),
                '%' => self.token(start, TokenKind::Percent),
                '=' => self.either(start, '=', TokenKind::EqualEqual, TokenKind::Assign),
                '!' => self.either(start, '=', TokenKind::BangEqual, TokenKind::Bang),
                '<' => self.either(start, '=', TokenKind::LessEqual, TokenKind::Less),
                '>' => self.either(start, '=', TokenKind::GreaterEqual, TokenKind::Greater),
                '|' => self.either(start, '|', TokenKind::DoublePipe, TokenKind::Pipe),
                '&' => self.either(start, '&', TokenKind::DoubleAmpersand, TokenKind::Unknown),
                _ => self.token(start, TokenKind::Unknown),
            };
            if token.kind == TokenKind::Unknown {
                return Err(Diagnostic::new(
                    DiagnosticKind::Lexer,
                    format!("unexpected character `{}`", token.lexeme),
                )
                .with_span(token.span));
            }
            tokens.push(token);
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let (idx, ch) = self.chars.next()?;
        self.current = idx + ch.len_utf8();
        Some((idx, ch))
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, ch)| ch)
    }

    fn token(&mut self, start: usize, kind: TokenKind) -> Token {
        Token {
            kind,
            lexeme: self.source[start..self.current].to_string(),
            span: SourceSpan::new(start, self.current),
            starts_line: std::mem::take(&mut self.starts_line),
        }
    }

    /// Two-character operator when `next` follows, otherwise the single one.
    fn either(&mut self, start: usize, next: char, double: TokenKind, single: TokenKind) -> Token {
        if self.peek_char() == Some(next) {
            self.bump();
            self.token(start, double)
        } else {
            self.token(start, single)
        }
    }

    fn skip_trivia(&mut self) -> Result<(), Diagnostic> {
        loop {
            match (self.peek_char(), self.peek_second()) {
                (Some(ch), _) if ch.is_whitespace() => {
                    self.starts_line |= ch == '\n';
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(ch) = self.peek_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => self.block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn block_comment(&mut self) -> Result<(), Diagnostic> {
        let start = self.current;
        self.bump();
        self.bump();
        let mut depth = 1;
        while let Some((_, ch)) = self.bump() {
            match (ch, self.peek_char()) {
                ('/', Some('*')) => {
                    self.bump();
                    depth += 1;
                }
                ('*', Some('/')) => {
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(
            Diagnostic::new(DiagnosticKind::Lexer, "unterminated block comment")
                .with_span(SourceSpan::new(start, self.current))
                .with_note(format!("{depth} nested comment level(s) still open")),
        )
    }

    fn identifier_or_keyword(&mut self, start: usize) -> Token {
        while matches!(self.peek_char(), Some(ch) if ch.is_alphanumeric() || ch == '_') {
            self.bump();
        }
        let lexeme = &self.source[start..self.current];
        let kind = keyword_for(lexeme).map_or(TokenKind::Identifier, TokenKind::Keyword);
        self.token(start, kind)
    }

    fn number_literal(&mut self, start: usize) -> Token {
        let mut seen_dot = false;
        while let Some(ch) = self.peek_char() {
            match ch {
                '0'..='9' | '_' => {
                    self.bump();
                }
                // `1.field` is not a float; require a digit after the dot.
                '.' if !seen_dot && matches!(self.peek_second(), Some('0'..='9')) => {
                    seen_dot = true;
                    self.bump();
                }
                'e' | 'E' => {
                    self.bump();
                    if matches!(self.peek_char(), Some('+' | '-')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        self.token(start, TokenKind::Number)
    }

    fn string_literal(&mut self, start: usize) -> Result<Token, Diagnostic> {
        let mut value = String::new();
        while let Some((_, ch)) = self.bump() {
            match ch {
                '"' => {
                    return Ok(Token {
                        kind: TokenKind::String,
                        lexeme: value,
                        span: SourceSpan::new(start, self.current),
                        starts_line: std::mem::take(&mut self.starts_line),
                    });
                }
                '\\' => match self.bump() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, '0')) => value.push('\0'),
                    Some((_, other)) => value.push(other),
                    None => break,
                },
                _ => value.push(ch),
            }
        }
        Err(
            Diagnostic::new(DiagnosticKind::Lexer, "unterminated string literal")
                .with_span(SourceSpan::new(start, self.current)),
        )
    }
}

fn keyword_for(ident: &str) -> Option<Keyword> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "var" => Kw::Var,
        "mut" => Kw::Mut,
        "const" => Kw::Const,
        "fn" => Kw::Fn,
        "if" => Kw::If,
        "else" => Kw::Else,
        "loop" => Kw::Loop,
        "while" => Kw::While,
        "for" => Kw::For,
        "in" => Kw::In,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        "return" => Kw::Return,
        "true" => Kw::True,
        "false" => Kw::False,
        "none" => Kw::None,
        "try" => Kw::Try,
        "catch" => Kw::Catch,
        "throw" => Kw::Throw,
        _ => return None,
    };
    Some(keyword)
}
