//! The stack-machine instruction set.
//!
//! [`Instruction`]'s `Display` renders the exact textual line the downstream
//! translator reads, and `FromStr` parses it back using that translator's
//! line grammar.

use std::fmt;
use std::str::FromStr;

/// A named storage region addressed by a zero-based index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

/// Stack arithmetic, logic and comparison commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Push(Segment, u16),
    Pop(Segment, u16),
    Arithmetic(ArithmeticOp),
    Label(String),
    Goto(String),
    IfGoto(String),
    Call { name: String, args: u16 },
    Function { name: String, locals: u16 },
    Return,
}

/// A line that is not a valid instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionParseError {
    pub line: String,
    pub reason: String,
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Argument => "argument",
            Self::Local => "local",
            Self::Static => "static",
            Self::This => "this",
            Self::That => "that",
            Self::Pointer => "pointer",
            Self::Temp => "temp",
        }
    }
}

impl FromStr for Segment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let seg = match s {
            "constant" => Self::Constant,
            "argument" => Self::Argument,
            "local" => Self::Local,
            "static" => Self::Static,
            "this" => Self::This,
            "that" => Self::That,
            "pointer" => Self::Pointer,
            "temp" => Self::Temp,
            _ => return Err(format!("unknown segment '{s}'")),
        };
        Ok(seg)
    }
}

impl ArithmeticOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Neg => "neg",
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
        }
    }
}

impl FromStr for ArithmeticOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s {
            "add" => Self::Add,
            "sub" => Self::Sub,
            "neg" => Self::Neg,
            "eq" => Self::Eq,
            "gt" => Self::Gt,
            "lt" => Self::Lt,
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            _ => return Err(format!("unknown command '{s}'")),
        };
        Ok(op)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push(seg, idx) => write!(f, "push {} {idx}", seg.as_str()),
            Self::Pop(seg, idx) => write!(f, "pop {} {idx}", seg.as_str()),
            Self::Arithmetic(op) => f.write_str(op.as_str()),
            Self::Label(label) => write!(f, "label {label}"),
            Self::Goto(label) => write!(f, "goto {label}"),
            Self::IfGoto(label) => write!(f, "if-goto {label}"),
            Self::Call { name, args } => write!(f, "call {name} {args}"),
            Self::Function { name, locals } => write!(f, "function {name} {locals}"),
            Self::Return => f.write_str("return"),
        }
    }
}

impl FromStr for Instruction {
    type Err = InstructionParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fail = |reason: String| InstructionParseError {
            line: line.to_string(),
            reason,
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        let arity = |n: usize| {
            if parts.len() == n + 1 {
                Ok(())
            } else {
                Err(fail(format!(
                    "'{}' takes {n} argument(s), got {}",
                    parts[0],
                    parts.len() - 1
                )))
            }
        };
        let number = |s: &str| {
            s.parse::<u16>()
                .map_err(|_| fail(format!("expected a non-negative integer, got '{s}'")))
        };

        let Some(&command) = parts.first() else {
            return Err(fail("empty line".to_string()));
        };

        match command {
            "push" | "pop" => {
                arity(2)?;
                let seg: Segment = parts[1].parse().map_err(fail)?;
                let idx = number(parts[2])?;
                if command == "push" {
                    Ok(Self::Push(seg, idx))
                } else if seg == Segment::Constant {
                    Err(fail("cannot pop into the constant segment".to_string()))
                } else {
                    Ok(Self::Pop(seg, idx))
                }
            }
            "label" | "goto" | "if-goto" => {
                arity(1)?;
                let label = parts[1].to_string();
                Ok(match command {
                    "label" => Self::Label(label),
                    "goto" => Self::Goto(label),
                    _ => Self::IfGoto(label),
                })
            }
            "call" => {
                arity(2)?;
                Ok(Self::Call {
                    name: parts[1].to_string(),
                    args: number(parts[2])?,
                })
            }
            "function" => {
                arity(2)?;
                Ok(Self::Function {
                    name: parts[1].to_string(),
                    locals: number(parts[2])?,
                })
            }
            "return" => {
                arity(0)?;
                Ok(Self::Return)
            }
            other => {
                arity(0)?;
                other.parse().map(Self::Arithmetic).map_err(fail)
            }
        }
    }
}

impl fmt::Display for InstructionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid instruction '{}': {}", self.line, self.reason)
    }
}

impl std::error::Error for InstructionParseError {}

/// Parse a whole VM program, skipping blank lines and `//` comments.
pub fn parse_program(text: &str) -> Result<Vec<Instruction>, InstructionParseError> {
    text.lines()
        .map(|line| match line.find("//") {
            Some(idx) => &line[..idx],
            None => line,
        })
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::parse)
        .collect()
}
