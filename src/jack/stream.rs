//! Token source consumed by the compilation engine.
//!
//! A forward cursor over the lexer's output with a bounded pushback window.
//! Before the first [`TokenStream::advance`] there is no current token.

use super::error::CompileError;
use super::token::{Keyword, Token, TokenClass, TokenKind, BINARY_OPERATORS};

/// How many consecutive [`TokenStream::push_back`] calls are supported.
pub const MAX_PUSHBACK: usize = 2;

pub struct TokenStream {
    tokens: Vec<Token>,
    /// Number of tokens consumed; the current token is `tokens[consumed - 1]`.
    consumed: usize,
    pushed_back: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            consumed: 0,
            pushed_back: 0,
        }
    }

    pub fn has_more(&self) -> bool {
        self.consumed < self.tokens.len()
    }

    /// Make the next token current. Fails at end of input.
    pub fn advance(&mut self) -> Result<&Token, CompileError> {
        if !self.has_more() {
            let (line, col) = self.location();
            return Err(CompileError::structural(
                "more input",
                "end of input",
                line,
                col,
            ));
        }
        self.consumed += 1;
        self.pushed_back = self.pushed_back.saturating_sub(1);
        Ok(&self.tokens[self.consumed - 1])
    }

    /// Un-consume the current token so the previous one is current again.
    pub fn push_back(&mut self) {
        debug_assert!(self.consumed > 0, "push_back before first advance");
        debug_assert!(
            self.pushed_back < MAX_PUSHBACK,
            "push_back deeper than {MAX_PUSHBACK}"
        );
        self.consumed -= 1;
        self.pushed_back += 1;
    }

    /// The token `n` places past the current one, without consuming anything.
    /// `peek(0)` is the token the next `advance` would return.
    pub fn peek(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.consumed + n)
    }

    /// Every token consumed so far, in order. Pushed-back tokens are excluded.
    pub fn consumed(&self) -> &[Token] {
        &self.tokens[..self.consumed]
    }

    pub fn current(&self) -> Option<&Token> {
        self.consumed
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
    }

    pub fn token_kind(&self) -> Option<TokenClass> {
        self.current().map(|t| t.kind.class())
    }

    pub fn keyword(&self) -> Option<Keyword> {
        match self.current()?.kind {
            TokenKind::Keyword(kw) => Some(kw),
            _ => None,
        }
    }

    pub fn symbol(&self) -> Option<char> {
        match self.current()?.kind {
            TokenKind::Symbol(c) => Some(c),
            _ => None,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        match &self.current()?.kind {
            TokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn int_val(&self) -> Option<u16> {
        match self.current()?.kind {
            TokenKind::IntConst(n) => Some(n),
            _ => None,
        }
    }

    pub fn string_val(&self) -> Option<&str> {
        match &self.current()?.kind {
            TokenKind::StringConst(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_binary_operator(&self) -> bool {
        self.symbol().is_some_and(|c| BINARY_OPERATORS.contains(c))
    }

    /// Source position used for diagnostics: the upcoming token, else the
    /// current one, else the start of input.
    pub fn location(&self) -> (usize, usize) {
        self.peek(0)
            .or_else(|| self.current())
            .or_else(|| self.tokens.last())
            .map(|t| (t.line, t.col))
            .unwrap_or((1, 1))
    }

    /// Human-readable description of the upcoming token.
    pub fn describe_next(&self) -> String {
        match self.peek(0) {
            Some(t) => t.kind.to_string(),
            None => "end of input".to_string(),
        }
    }
}
