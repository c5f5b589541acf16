//! Jack compiler — source text → tokens → single-pass engine → VM instructions.

pub mod engine;
pub mod error;
pub mod lexer;
pub mod stream;
pub mod symbol_table;
pub mod token;
pub mod tree;
pub mod xml;

pub use engine::CompilationEngine;
pub use error::{CompileError, ErrorKind};
pub use stream::TokenStream;
pub use symbol_table::{Symbol, SymbolKind, SymbolTable};
pub use token::{Keyword, Token, TokenKind};
pub use tree::{NoTree, ParseTreeSink};
pub use xml::XmlTree;

use lexer::Lexer;

use crate::vm::{Instruction, VmWriter};

/// The Jack compiler.
///
/// Each call compiles one class, start to finish, with fresh state.
pub struct Compiler;

impl Compiler {
    /// Lex Jack source into tokens.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
        Lexer::new(source).tokenize()
    }

    /// Compile one class into VM instructions.
    pub fn compile(source: &str) -> Result<Vec<Instruction>, CompileError> {
        let tokens = Self::tokenize(source)?;
        Self::compile_tokens(tokens)
    }

    /// Compile an already-lexed class.
    pub fn compile_tokens(tokens: Vec<Token>) -> Result<Vec<Instruction>, CompileError> {
        let engine = CompilationEngine::new(TokenStream::new(tokens), VmWriter::new());
        Ok(engine.compile_class()?.into_instructions())
    }

    /// Compile an already-lexed class, also rendering its parse tree as XML.
    pub fn compile_tokens_with_tree(
        tokens: Vec<Token>,
    ) -> Result<(Vec<Instruction>, String), CompileError> {
        let engine =
            CompilationEngine::with_tree(TokenStream::new(tokens), VmWriter::new(), XmlTree::new());
        let (writer, tree) = engine.compile_class_with_tree()?;
        Ok((writer.into_instructions(), tree.into_xml()))
    }

    /// Compile one class into VM program text.
    pub fn compile_to_text(source: &str) -> Result<String, CompileError> {
        Ok(crate::vm::render(&Self::compile(source)?))
    }
}
