//! Token types for the Jack lexer.

use std::fmt;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

/// The kind of token, carrying its value.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Symbol(char),
    Identifier(String),
    IntConst(u16),
    StringConst(String),
}

/// Coarse token classification, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Keyword,
    Symbol,
    Identifier,
    IntConst,
    StringConst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Class,
    Constructor,
    Function,
    Method,
    Field,
    Static,
    Var,
    Int,
    Char,
    Boolean,
    Void,
    True,
    False,
    Null,
    This,
    Let,
    Do,
    If,
    Else,
    While,
    Return,
}

/// Characters the lexer accepts as single-character symbols.
pub const SYMBOLS: &str = "{}()[].,;+-*/&|<>=~";

/// Symbols that may appear between two terms of an expression.
pub const BINARY_OPERATORS: &str = "+-*/&|<>=";

impl Keyword {
    pub fn from_word(word: &str) -> Option<Self> {
        let kw = match word {
            "class" => Self::Class,
            "constructor" => Self::Constructor,
            "function" => Self::Function,
            "method" => Self::Method,
            "field" => Self::Field,
            "static" => Self::Static,
            "var" => Self::Var,
            "int" => Self::Int,
            "char" => Self::Char,
            "boolean" => Self::Boolean,
            "void" => Self::Void,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            "this" => Self::This,
            "let" => Self::Let,
            "do" => Self::Do,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "return" => Self::Return,
            _ => return None,
        };
        Some(kw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Constructor => "constructor",
            Self::Function => "function",
            Self::Method => "method",
            Self::Field => "field",
            Self::Static => "static",
            Self::Var => "var",
            Self::Int => "int",
            Self::Char => "char",
            Self::Boolean => "boolean",
            Self::Void => "void",
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::This => "this",
            Self::Let => "let",
            Self::Do => "do",
            Self::If => "if",
            Self::Else => "else",
            Self::While => "while",
            Self::Return => "return",
        }
    }
}

impl TokenKind {
    pub fn class(&self) -> TokenClass {
        match self {
            Self::Keyword(_) => TokenClass::Keyword,
            Self::Symbol(_) => TokenClass::Symbol,
            Self::Identifier(_) => TokenClass::Identifier,
            Self::IntConst(_) => TokenClass::IntConst,
            Self::StringConst(_) => TokenClass::StringConst,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(kw) => write!(f, "keyword '{}'", kw.as_str()),
            Self::Symbol(c) => write!(f, "'{c}'"),
            Self::Identifier(name) => write!(f, "identifier '{name}'"),
            Self::IntConst(n) => write!(f, "integer {n}"),
            Self::StringConst(s) => write!(f, "string \"{s}\""),
        }
    }
}
