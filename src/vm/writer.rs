//! Instruction emitter.
//!
//! One method per instruction shape; each appends exactly one instruction,
//! in call order.

use super::instruction::{ArithmeticOp, Instruction, Segment};

#[derive(Debug, Default)]
pub struct VmWriter {
    out: Vec<Instruction>,
}

impl VmWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_push(&mut self, segment: Segment, index: u16) {
        self.out.push(Instruction::Push(segment, index));
    }

    pub fn write_pop(&mut self, segment: Segment, index: u16) {
        debug_assert!(segment != Segment::Constant, "pop into constant segment");
        self.out.push(Instruction::Pop(segment, index));
    }

    pub fn write_arithmetic(&mut self, op: ArithmeticOp) {
        self.out.push(Instruction::Arithmetic(op));
    }

    pub fn write_label(&mut self, label: &str) {
        self.out.push(Instruction::Label(label.to_string()));
    }

    pub fn write_goto(&mut self, label: &str) {
        self.out.push(Instruction::Goto(label.to_string()));
    }

    pub fn write_if(&mut self, label: &str) {
        self.out.push(Instruction::IfGoto(label.to_string()));
    }

    pub fn write_call(&mut self, name: &str, args: u16) {
        self.out.push(Instruction::Call {
            name: name.to_string(),
            args,
        });
    }

    pub fn write_function(&mut self, name: &str, locals: u16) {
        self.out.push(Instruction::Function {
            name: name.to_string(),
            locals,
        });
    }

    pub fn write_return(&mut self) {
        self.out.push(Instruction::Return);
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.out
    }

    pub fn into_instructions(self) -> Vec<Instruction> {
        self.out
    }

    /// The emitted program as text, one newline-terminated line per instruction.
    pub fn render(&self) -> String {
        render(&self.out)
    }
}

pub fn render(instructions: &[Instruction]) -> String {
    let mut text = String::new();
    for instr in instructions {
        text.push_str(&instr.to_string());
        text.push('\n');
    }
    text
}
