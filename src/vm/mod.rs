//! Stack-machine target: instruction set and emitter.

pub mod instruction;
pub mod writer;

pub use instruction::{parse_program, ArithmeticOp, Instruction, InstructionParseError, Segment};
pub use writer::{render, VmWriter};
