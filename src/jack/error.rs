//! Error types for the Jack compiler.

use std::fmt;

/// An error that aborted compilation of a class.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub line: usize,
    pub col: usize,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// Source text that does not form a token.
    Lex,
    /// A grammar violation: a required token was missing or unexpected.
    Structural,
    /// A name declared twice in the same scope.
    DuplicateDefinition,
}

impl CompileError {
    pub fn lex(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            message: message.into(),
            line,
            col,
            kind: ErrorKind::Lex,
        }
    }

    /// A required token was not found. `found` describes what was there instead.
    pub fn structural(expected: &str, found: &str, line: usize, col: usize) -> Self {
        Self {
            message: format!("expected {expected}, found {found}"),
            line,
            col,
            kind: ErrorKind::Structural,
        }
    }

    pub fn duplicate(name: &str, line: usize, col: usize) -> Self {
        Self {
            message: format!("'{name}' is already defined in this scope"),
            line,
            col,
            kind: ErrorKind::DuplicateDefinition,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{}] {:?}: {}",
            self.line, self.col, self.kind, self.message
        )
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_message_names_both_tokens() {
        let err = CompileError::structural("'{'", "'('", 3, 14);
        assert_eq!(err.kind, ErrorKind::Structural);
        assert_eq!(err.to_string(), "[3:14] Structural: expected '{', found '('");
    }

    #[test]
    fn duplicate_message() {
        let err = CompileError::duplicate("x", 1, 1);
        assert_eq!(err.kind, ErrorKind::DuplicateDefinition);
        assert!(err.message.contains("'x'"));
    }
}
