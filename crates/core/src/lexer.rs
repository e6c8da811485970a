//! Tokenizer for BSL source text.
//!
//! Keywords are not separated from identifiers here; the parser matches them
//! case-insensitively in both their Russian and English spellings.

use crate::result::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(f64),
    /// String literal value with `""` escapes and `|` continuations resolved.
    Str(String),
    /// Digits of a `'...'` date literal.
    Date(String),
    /// `~name`
    Label(String),
    /// `&name`
    Directive(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Question,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.trim_start_matches('\u{feff}').chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn at_line_start(&self) -> bool {
        self.chars[..self.pos]
            .iter()
            .rev()
            .take_while(|c| **c != '\n')
            .all(|c| c.is_whitespace())
    }

    fn run(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            }
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    column,
                });
                return Ok(tokens);
            };

            if c == '/' && self.peek_at(1) == Some('/') {
                self.skip_line();
                continue;
            }
            // Preprocessor and region markers.
            if c == '#' && self.at_line_start() {
                self.skip_line();
                continue;
            }

            let kind = match c {
                '"' => TokenKind::Str(self.string()?),
                '\'' => TokenKind::Date(self.date()?),
                '~' => {
                    self.bump();
                    TokenKind::Label(self.word())
                }
                '&' => {
                    self.bump();
                    TokenKind::Directive(self.word())
                }
                c if c.is_ascii_digit() => TokenKind::Number(self.number()?),
                c if c.is_alphabetic() || c == '_' => TokenKind::Ident(self.word()),
                _ => {
                    self.bump();
                    match c {
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        '[' => TokenKind::LBracket,
                        ']' => TokenKind::RBracket,
                        ',' => TokenKind::Comma,
                        ';' => TokenKind::Semicolon,
                        ':' => TokenKind::Colon,
                        '.' => TokenKind::Dot,
                        '?' => TokenKind::Question,
                        '=' => TokenKind::Eq,
                        '+' => TokenKind::Plus,
                        '-' => TokenKind::Minus,
                        '*' => TokenKind::Star,
                        '/' => TokenKind::Slash,
                        '%' => TokenKind::Percent,
                        '<' => match self.peek() {
                            Some('>') => {
                                self.bump();
                                TokenKind::NotEq
                            }
                            Some('=') => {
                                self.bump();
                                TokenKind::LtEq
                            }
                            _ => TokenKind::Lt,
                        },
                        '>' => {
                            if self.peek() == Some('=') {
                                self.bump();
                                TokenKind::GtEq
                            } else {
                                TokenKind::Gt
                            }
                        }
                        other => {
                            return Err(Error::Parse {
                                line,
                                column,
                                message: format!("unexpected character '{other}'"),
                            })
                        }
                    }
                }
            };
            tokens.push(Token { kind, line, column });
        }
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    fn number(&mut self) -> Result<f64> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        text.parse()
            .map_err(|_| self.error(format!("invalid number literal '{text}'")))
    }

    /// Reads a string literal. A line break inside the quotes continues on the
    /// next line after optional whitespace and a `|` marker.
    fn string(&mut self) -> Result<String> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some('"') => {
                    if self.peek() == Some('"') {
                        self.bump();
                        value.push('"');
                    } else {
                        return Ok(value);
                    }
                }
                Some('\r') => {}
                Some('\n') => {
                    value.push('\n');
                    loop {
                        while self.peek().is_some_and(|c| c == ' ' || c == '\t' || c == '\r') {
                            self.bump();
                        }
                        // Comment lines may sit between continuation lines.
                        if self.peek() == Some('/') && self.peek_at(1) == Some('/') {
                            self.skip_line();
                            self.bump();
                            continue;
                        }
                        break;
                    }
                    if self.peek() == Some('|') {
                        self.bump();
                    }
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn date(&mut self) -> Result<String> {
        self.bump();
        let mut digits = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated date literal")),
                Some('\'') => return Ok(digits),
                Some(c) if c.is_ascii_digit() => digits.push(c),
                Some(_) => {}
            }
        }
    }
}
