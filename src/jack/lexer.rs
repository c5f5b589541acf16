//! Lexer for Jack source.
//!
//! Converts source text into a stream of [`Token`]s.

use super::error::CompileError;
use super::token::{Keyword, Token, TokenKind, SYMBOLS};

/// Largest integer constant the language admits.
pub const MAX_INT_CONST: u16 = 32767;

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia()?;

            if self.is_at_end() {
                break;
            }

            let ch = self.peek();
            let token = match ch {
                '"' => self.lex_string()?,
                '0'..='9' => self.lex_integer()?,
                'a'..='z' | 'A'..='Z' | '_' => self.lex_word(),
                c if SYMBOLS.contains(c) => self.single_char(TokenKind::Symbol(c)),
                _ => {
                    return Err(CompileError::lex(
                        format!("unexpected character: '{ch}'"),
                        self.line,
                        self.col,
                    ));
                }
            };

            tokens.push(token);
        }

        Ok(tokens)
    }

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.pos];
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        ch
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Skip whitespace and all three comment forms until the next token or EOF.
    fn skip_trivia(&mut self) -> Result<(), CompileError> {
        loop {
            while !self.is_at_end() && self.peek().is_whitespace() {
                self.advance();
            }
            if self.is_at_end() || self.peek() != '/' {
                return Ok(());
            }
            match self.peek_next() {
                Some('/') => {
                    while !self.is_at_end() && self.peek() != '\n' {
                        self.advance();
                    }
                }
                Some('*') => self.skip_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), CompileError> {
        let line = self.line;
        let col = self.col;
        self.advance(); // '/'
        self.advance(); // '*'
        while !self.is_at_end() {
            if self.peek() == '*' && self.peek_next() == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }
        Err(CompileError::lex("unclosed block comment", line, col))
    }

    fn single_char(&mut self, kind: TokenKind) -> Token {
        let line = self.line;
        let col = self.col;
        self.advance();
        Token { kind, line, col }
    }

    fn lex_string(&mut self) -> Result<Token, CompileError> {
        let line = self.line;
        let col = self.col;
        self.advance(); // consume opening '"'
        let mut s = String::new();
        while !self.is_at_end() && self.peek() != '"' && self.peek() != '\n' {
            if !self.peek().is_ascii() {
                return Err(CompileError::lex(
                    format!("non-ASCII character in string constant: '{}'", self.peek()),
                    self.line,
                    self.col,
                ));
            }
            s.push(self.advance());
        }
        if self.is_at_end() || self.peek() == '\n' {
            return Err(CompileError::lex("unclosed string literal", line, col));
        }
        self.advance(); // consume closing '"'
        if s.len() > usize::from(MAX_INT_CONST) {
            return Err(CompileError::lex(
                format!("string constant longer than {MAX_INT_CONST} characters"),
                line,
                col,
            ));
        }
        Ok(Token {
            kind: TokenKind::StringConst(s),
            line,
            col,
        })
    }

    fn lex_integer(&mut self) -> Result<Token, CompileError> {
        let line = self.line;
        let col = self.col;
        let mut s = String::new();
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            s.push(self.advance());
        }

        let value = s
            .parse::<u32>()
            .ok()
            .filter(|&v| v <= u32::from(MAX_INT_CONST))
            .ok_or_else(|| {
                CompileError::lex(
                    format!("integer constant out of range 0..={MAX_INT_CONST}: {s}"),
                    line,
                    col,
                )
            })?;

        Ok(Token {
            kind: TokenKind::IntConst(value as u16),
            line,
            col,
        })
    }

    fn lex_word(&mut self) -> Token {
        let line = self.line;
        let col = self.col;
        let mut s = String::new();

        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == '_') {
            s.push(self.advance());
        }

        let kind = match Keyword::from_word(&s) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier(s),
        };

        Token { kind, line, col }
    }
}
