//! Compilation engine.
//!
//! A single-pass recursive-descent recognizer over a [`TokenStream`]. Each
//! `compile_*` method consumes exactly the tokens of its production and emits
//! the matching VM code through a [`VmWriter`]. Any grammar violation aborts
//! the class with a structural [`CompileError`].
//!
//! Productions are also reported to a [`ParseTreeSink`]. Tokens reach the
//! sink lazily, on the next production boundary, so lookahead that gets
//! pushed back is never reported inside the wrong production.

use tracing::debug;

use crate::vm::{ArithmeticOp, Segment, VmWriter};

use super::error::CompileError;
use super::lexer::MAX_INT_CONST;
use super::stream::TokenStream;
use super::symbol_table::{DefineError, Symbol, SymbolKind, SymbolTable};
use super::token::{Keyword, TokenKind};
use super::tree::{NoTree, ParseTreeSink};

/// Most explicit arguments a call may pass; a method call adds the receiver.
const MAX_CALL_ARGS: u16 = u16::MAX - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

/// How a call site resolves its target.
enum CallTarget {
    /// `name(args)`: a function or constructor of the class being compiled.
    /// No receiver is passed, so the callee must not be a method.
    Local { name: String },
    /// `var.name(args)`: a method on the object held in `receiver`.
    Method { receiver: Symbol, name: String },
    /// `Class.name(args)`: a function or constructor of another class.
    Qualified { class: String, name: String },
}

pub struct CompilationEngine<T: ParseTreeSink = NoTree> {
    tokens: TokenStream,
    symbols: SymbolTable,
    writer: VmWriter,
    tree: T,
    /// Tokens already handed to `tree`.
    reported: usize,
    class_name: String,
    subroutine_name: String,
    label_index: usize,
}

impl CompilationEngine {
    pub fn new(tokens: TokenStream, writer: VmWriter) -> Self {
        Self::with_tree(tokens, writer, NoTree)
    }
}

impl<T: ParseTreeSink> CompilationEngine<T> {
    pub fn with_tree(tokens: TokenStream, writer: VmWriter, tree: T) -> Self {
        Self {
            tokens,
            symbols: SymbolTable::new(),
            writer,
            tree,
            reported: 0,
            class_name: String::new(),
            subroutine_name: String::new(),
            label_index: 0,
        }
    }

    /// Compile one class: `'class' name '{' classVarDec* subroutineDec* '}'`.
    ///
    /// Consumes the engine; on success the writer holds the class's VM code.
    pub fn compile_class(self) -> Result<VmWriter, CompileError> {
        self.compile_class_with_tree().map(|(writer, _)| writer)
    }

    /// Like [`compile_class`](Self::compile_class), also returning the sink.
    pub fn compile_class_with_tree(mut self) -> Result<(VmWriter, T), CompileError> {
        self.open("class");
        self.expect_keyword(Keyword::Class)?;
        self.class_name = self.expect_identifier("class name")?;
        self.expect_symbol('{')?;

        while self.check_keyword(&[Keyword::Static, Keyword::Field]).is_some() {
            self.compile_class_var_dec()?;
        }
        while self
            .check_keyword(&[Keyword::Constructor, Keyword::Function, Keyword::Method])
            .is_some()
        {
            self.compile_subroutine()?;
        }

        self.expect_symbol('}')?;
        if self.tokens.has_more() {
            return Err(self.error_expected("end of input"));
        }
        self.close("class");

        debug!(
            class = %self.class_name,
            instructions = self.writer.instructions().len(),
            "compiled class"
        );
        Ok((self.writer, self.tree))
    }

    /// `('static'|'field') type varName (',' varName)* ';'`
    fn compile_class_var_dec(&mut self) -> Result<(), CompileError> {
        self.open("classVarDec");
        let kind = match self.peek_keyword() {
            Some(Keyword::Static) => SymbolKind::Static,
            Some(Keyword::Field) => SymbolKind::Field,
            _ => return Err(self.error_expected("keyword 'static' or 'field'")),
        };
        self.tokens.advance()?;
        let ty = self.compile_type()?;
        self.compile_var_names(&ty, kind)?;
        self.close("classVarDec");
        Ok(())
    }

    /// `varName (',' varName)* ';'`, defining each name with `kind`.
    fn compile_var_names(&mut self, ty: &str, kind: SymbolKind) -> Result<(), CompileError> {
        loop {
            let name = self.expect_identifier("variable name")?;
            self.define(&name, ty, kind)?;
            if !self.check_symbol(',') {
                break;
            }
            self.tokens.advance()?;
        }
        self.expect_symbol(';')
    }

    /// `('constructor'|'function'|'method') ('void'|type) name '(' parameterList ')' body`
    fn compile_subroutine(&mut self) -> Result<(), CompileError> {
        self.open("subroutineDec");
        let kind = match self.peek_keyword() {
            Some(Keyword::Constructor) => SubroutineKind::Constructor,
            Some(Keyword::Function) => SubroutineKind::Function,
            Some(Keyword::Method) => SubroutineKind::Method,
            _ => return Err(self.error_expected("'constructor', 'function' or 'method'")),
        };
        self.tokens.advance()?;

        self.symbols.start_scope();
        if kind == SubroutineKind::Method {
            let class_name = self.class_name.clone();
            self.define("this", &class_name, SymbolKind::Argument)?;
        }

        if self.check_keyword(&[Keyword::Void]).is_some() {
            self.tokens.advance()?;
        } else {
            self.compile_type()?;
        }

        let name = self.expect_identifier("subroutine name")?;
        self.subroutine_name = format!("{}.{}", self.class_name, name);

        self.expect_symbol('(')?;
        self.compile_parameter_list()?;
        self.expect_symbol(')')?;
        self.compile_subroutine_body(kind)?;
        self.close("subroutineDec");

        debug!(
            subroutine = %self.subroutine_name,
            kind = ?kind,
            args = self.symbols.count(SymbolKind::Argument),
            locals = self.symbols.count(SymbolKind::Local),
            "compiled subroutine"
        );
        Ok(())
    }

    /// `((type varName) (',' type varName)*)?`
    fn compile_parameter_list(&mut self) -> Result<(), CompileError> {
        self.open("parameterList");
        if !self.check_symbol(')') {
            loop {
                let ty = self.compile_type()?;
                let name = self.expect_identifier("parameter name")?;
                self.define(&name, &ty, SymbolKind::Argument)?;
                if !self.check_symbol(',') {
                    break;
                }
                self.tokens.advance()?;
            }
        }
        self.close("parameterList");
        Ok(())
    }

    /// `'{' varDec* statements '}'`
    ///
    /// The function header is written only after every `var` is known, since
    /// it carries the local count.
    fn compile_subroutine_body(&mut self, kind: SubroutineKind) -> Result<(), CompileError> {
        self.open("subroutineBody");
        self.expect_symbol('{')?;
        while self.check_keyword(&[Keyword::Var]).is_some() {
            self.open("varDec");
            self.tokens.advance()?;
            let ty = self.compile_type()?;
            self.compile_var_names(&ty, SymbolKind::Local)?;
            self.close("varDec");
        }

        let locals = self.symbols.count(SymbolKind::Local);
        self.writer.write_function(&self.subroutine_name, locals);
        match kind {
            SubroutineKind::Method => {
                self.writer.write_push(Segment::Argument, 0);
                self.writer.write_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Constructor => {
                let fields = self.symbols.count(SymbolKind::Field);
                self.writer.write_push(Segment::Constant, fields);
                self.writer.write_call("Memory.alloc", 1);
                self.writer.write_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Function => {}
        }

        self.compile_statements()?;
        self.expect_symbol('}')?;
        self.close("subroutineBody");
        Ok(())
    }

    /// Zero or more statements, up to the closing `}`.
    fn compile_statements(&mut self) -> Result<(), CompileError> {
        self.open("statements");
        while !self.check_symbol('}') {
            match self.peek_keyword() {
                Some(Keyword::Let) => self.compile_let()?,
                Some(Keyword::If) => self.compile_if()?,
                Some(Keyword::While) => self.compile_while()?,
                Some(Keyword::Do) => self.compile_do()?,
                Some(Keyword::Return) => self.compile_return()?,
                _ => return Err(self.error_expected("statement or '}'")),
            }
        }
        self.close("statements");
        Ok(())
    }

    /// `'let' varName ('[' expression ']')? '=' expression ';'`
    fn compile_let(&mut self) -> Result<(), CompileError> {
        self.open("letStatement");
        self.tokens.advance()?;
        let name = self.expect_identifier("variable name")?;
        let (line, col) = self.current_location();
        let target = self.resolve_variable(&name, line, col)?;
        let segment = target.kind.segment();

        if self.check_symbol('[') {
            self.tokens.advance()?;
            self.writer.write_push(segment, target.index);
            self.compile_expression()?;
            self.expect_symbol(']')?;
            self.writer.write_arithmetic(ArithmeticOp::Add);

            self.expect_symbol('=')?;
            self.compile_expression()?;
            self.expect_symbol(';')?;

            // Element address sits under the value; park the value in temp 0
            // while `that` is pointed at the element.
            self.writer.write_pop(Segment::Temp, 0);
            self.writer.write_pop(Segment::Pointer, 1);
            self.writer.write_push(Segment::Temp, 0);
            self.writer.write_pop(Segment::That, 0);
        } else {
            self.expect_symbol('=')?;
            self.compile_expression()?;
            self.expect_symbol(';')?;
            self.writer.write_pop(segment, target.index);
        }
        self.close("letStatement");
        Ok(())
    }

    /// `'if' '(' expression ')' '{' statements '}' ('else' '{' statements '}')?`
    fn compile_if(&mut self) -> Result<(), CompileError> {
        self.open("ifStatement");
        self.tokens.advance()?;
        let n = self.next_label_index();
        let else_label = format!("IF_ELSE_{n}");
        let end_label = format!("IF_END_{n}");

        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;
        self.writer.write_arithmetic(ArithmeticOp::Not);
        self.writer.write_if(&else_label);

        self.compile_block()?;
        self.writer.write_goto(&end_label);
        self.writer.write_label(&else_label);

        if self.check_keyword(&[Keyword::Else]).is_some() {
            self.tokens.advance()?;
            self.compile_block()?;
        }
        self.writer.write_label(&end_label);
        self.close("ifStatement");
        Ok(())
    }

    /// `'while' '(' expression ')' '{' statements '}'`
    fn compile_while(&mut self) -> Result<(), CompileError> {
        self.open("whileStatement");
        self.tokens.advance()?;
        let n = self.next_label_index();
        let start_label = format!("WHILE_START_{n}");
        let end_label = format!("WHILE_END_{n}");

        self.writer.write_label(&start_label);
        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;
        self.writer.write_arithmetic(ArithmeticOp::Not);
        self.writer.write_if(&end_label);

        self.compile_block()?;
        self.writer.write_goto(&start_label);
        self.writer.write_label(&end_label);
        self.close("whileStatement");
        Ok(())
    }

    fn compile_block(&mut self) -> Result<(), CompileError> {
        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')
    }

    /// `'do' subroutineCall ';'`. The callee's return value is discarded.
    fn compile_do(&mut self) -> Result<(), CompileError> {
        self.open("doStatement");
        self.tokens.advance()?;
        self.compile_subroutine_call()?;
        self.expect_symbol(';')?;
        self.writer.write_pop(Segment::Temp, 0);
        self.close("doStatement");
        Ok(())
    }

    /// `'return' expression? ';'`. A bare return yields the dummy value 0.
    fn compile_return(&mut self) -> Result<(), CompileError> {
        self.open("returnStatement");
        self.tokens.advance()?;
        if self.check_symbol(';') {
            self.writer.write_push(Segment::Constant, 0);
        } else {
            self.compile_expression()?;
        }
        self.expect_symbol(';')?;
        self.writer.write_return();
        self.close("returnStatement");
        Ok(())
    }

    /// `term (op term)*`, applied strictly left to right.
    fn compile_expression(&mut self) -> Result<(), CompileError> {
        self.open("expression");
        self.compile_term()?;
        while self.tokens.has_more() {
            self.tokens.advance()?;
            let op = match self.tokens.symbol() {
                Some(op) if self.tokens.is_binary_operator() => op,
                _ => {
                    self.tokens.push_back();
                    break;
                }
            };
            self.compile_term()?;
            self.write_binary_op(op);
        }
        self.close("expression");
        Ok(())
    }

    fn write_binary_op(&mut self, op: char) {
        match op {
            '+' => self.writer.write_arithmetic(ArithmeticOp::Add),
            '-' => self.writer.write_arithmetic(ArithmeticOp::Sub),
            '*' => self.writer.write_call("Math.multiply", 2),
            '/' => self.writer.write_call("Math.divide", 2),
            '&' => self.writer.write_arithmetic(ArithmeticOp::And),
            '|' => self.writer.write_arithmetic(ArithmeticOp::Or),
            '<' => self.writer.write_arithmetic(ArithmeticOp::Lt),
            '>' => self.writer.write_arithmetic(ArithmeticOp::Gt),
            '=' => self.writer.write_arithmetic(ArithmeticOp::Eq),
            _ => unreachable!("'{op}' is not a binary operator"),
        }
    }

    /// A single term, leaving exactly one value on the stack.
    fn compile_term(&mut self) -> Result<(), CompileError> {
        self.open("term");
        let token = self.tokens.advance()?.clone();
        match token.kind {
            TokenKind::IntConst(n) => self.writer.write_push(Segment::Constant, n),
            TokenKind::StringConst(s) => self.compile_string(&s, token.line, token.col)?,
            TokenKind::Keyword(Keyword::True) => {
                self.writer.write_push(Segment::Constant, 0);
                self.writer.write_arithmetic(ArithmeticOp::Not);
            }
            TokenKind::Keyword(Keyword::False | Keyword::Null) => {
                self.writer.write_push(Segment::Constant, 0);
            }
            TokenKind::Keyword(Keyword::This) => self.writer.write_push(Segment::Pointer, 0),
            TokenKind::Symbol('(') => {
                self.compile_expression()?;
                self.expect_symbol(')')?;
            }
            TokenKind::Symbol('-') => {
                self.compile_term()?;
                self.writer.write_arithmetic(ArithmeticOp::Neg);
            }
            TokenKind::Symbol('~') => {
                self.compile_term()?;
                self.writer.write_arithmetic(ArithmeticOp::Not);
            }
            TokenKind::Identifier(name) => {
                // Two-token lookahead: `[`, `(`/`.` or anything else decides
                // between array element, call and plain variable.
                let advanced = self.tokens.has_more();
                let follow = if advanced {
                    self.tokens.advance()?;
                    self.tokens.symbol()
                } else {
                    None
                };
                match follow {
                    Some('[') => {
                        let base = self.resolve_variable(&name, token.line, token.col)?;
                        self.writer.write_push(base.kind.segment(), base.index);
                        self.compile_expression()?;
                        self.expect_symbol(']')?;
                        self.writer.write_arithmetic(ArithmeticOp::Add);
                        self.writer.write_pop(Segment::Pointer, 1);
                        self.writer.write_push(Segment::That, 0);
                    }
                    Some('(' | '.') => {
                        self.tokens.push_back();
                        self.tokens.push_back();
                        self.compile_subroutine_call()?;
                    }
                    _ => {
                        if advanced {
                            self.tokens.push_back();
                        }
                        let var = self.resolve_variable(&name, token.line, token.col)?;
                        self.writer.write_push(var.kind.segment(), var.index);
                    }
                }
            }
            other => {
                return Err(CompileError::structural(
                    "term",
                    &other.to_string(),
                    token.line,
                    token.col,
                ));
            }
        }
        self.close("term");
        Ok(())
    }

    /// `String.new(len)` followed by one `appendChar` per character.
    fn compile_string(&mut self, s: &str, line: usize, col: usize) -> Result<(), CompileError> {
        let len = u16::try_from(s.len())
            .ok()
            .filter(|&n| n <= MAX_INT_CONST)
            .ok_or_else(|| {
                CompileError::structural(
                    &format!("a string constant of at most {MAX_INT_CONST} characters"),
                    &format!("{} characters", s.len()),
                    line,
                    col,
                )
            })?;
        self.writer.write_push(Segment::Constant, len);
        self.writer.write_call("String.new", 1);
        for byte in s.bytes() {
            self.writer.write_push(Segment::Constant, u16::from(byte));
            self.writer.write_call("String.appendChar", 2);
        }
        Ok(())
    }

    /// `name '(' expressionList ')'` or `(class|var) '.' name '(' expressionList ')'`
    fn compile_subroutine_call(&mut self) -> Result<(), CompileError> {
        let first = self.expect_identifier("subroutine, class or variable name")?;
        let target = if self.check_symbol('.') {
            self.tokens.advance()?;
            let name = self.expect_identifier("subroutine name")?;
            match self.symbols.lookup(&first) {
                Some(receiver) => CallTarget::Method {
                    receiver: receiver.clone(),
                    name,
                },
                None => CallTarget::Qualified { class: first, name },
            }
        } else {
            CallTarget::Local { name: first }
        };

        let (callee, implicit_args) = match target {
            CallTarget::Local { name } => (format!("{}.{}", self.class_name, name), 0),
            CallTarget::Method { receiver, name } => {
                self.writer.write_push(receiver.kind.segment(), receiver.index);
                (format!("{}.{}", receiver.ty, name), 1)
            }
            CallTarget::Qualified { class, name } => (format!("{class}.{name}"), 0),
        };

        self.expect_symbol('(')?;
        let explicit_args = self.compile_expression_list()?;
        self.expect_symbol(')')?;
        self.writer.write_call(&callee, explicit_args + implicit_args);
        Ok(())
    }

    /// `(expression (',' expression)*)?`, returning the number of expressions.
    fn compile_expression_list(&mut self) -> Result<u16, CompileError> {
        self.open("expressionList");
        let mut count = 0;
        if !self.check_symbol(')') {
            self.compile_expression()?;
            count = 1;
            while self.check_symbol(',') {
                if count == MAX_CALL_ARGS {
                    return Err(self.error_expected(&format!("at most {MAX_CALL_ARGS} arguments")));
                }
                self.tokens.advance()?;
                self.compile_expression()?;
                count += 1;
            }
        }
        self.close("expressionList");
        Ok(count)
    }

    /// `'int' | 'char' | 'boolean' | className`
    fn compile_type(&mut self) -> Result<String, CompileError> {
        let ty = match self.tokens.peek(0).map(|t| &t.kind) {
            Some(TokenKind::Keyword(kw @ (Keyword::Int | Keyword::Char | Keyword::Boolean))) => {
                kw.as_str().to_string()
            }
            Some(TokenKind::Identifier(name)) => name.clone(),
            _ => return Err(self.error_expected("type")),
        };
        self.tokens.advance()?;
        Ok(ty)
    }

    fn define(&mut self, name: &str, ty: &str, kind: SymbolKind) -> Result<(), CompileError> {
        let (line, col) = self.current_location();
        match self.symbols.define(name, ty, kind) {
            Ok(_) => Ok(()),
            Err(DefineError::Duplicate { name }) => Err(CompileError::duplicate(&name, line, col)),
            Err(DefineError::Exhausted { kind }) => Err(CompileError::structural(
                &format!("at most {} {kind:?} variables", u16::MAX),
                &format!("'{name}'"),
                line,
                col,
            )),
        }
    }

    fn resolve_variable(
        &self,
        name: &str,
        line: usize,
        col: usize,
    ) -> Result<Symbol, CompileError> {
        self.symbols.lookup(name).cloned().ok_or_else(|| {
            CompileError::structural(
                "a declared variable",
                &format!("identifier '{name}'"),
                line,
                col,
            )
        })
    }

    fn next_label_index(&mut self) -> usize {
        let n = self.label_index;
        self.label_index += 1;
        n
    }

    fn open(&mut self, production: &'static str) {
        self.report_tokens();
        self.tree.open(production);
    }

    fn close(&mut self, production: &'static str) {
        self.report_tokens();
        self.tree.close(production);
    }

    /// Hand every token consumed since the last production boundary to the tree.
    fn report_tokens(&mut self) {
        let consumed = self.tokens.consumed();
        for token in consumed.get(self.reported..).unwrap_or_default() {
            self.tree.token(token);
        }
        self.reported = self.reported.max(consumed.len());
    }

    fn peek_keyword(&self) -> Option<Keyword> {
        match self.tokens.peek(0)?.kind {
            TokenKind::Keyword(kw) => Some(kw),
            _ => None,
        }
    }

    fn check_keyword(&self, any_of: &[Keyword]) -> Option<Keyword> {
        self.peek_keyword().filter(|kw| any_of.contains(kw))
    }

    fn check_symbol(&self, c: char) -> bool {
        matches!(self.tokens.peek(0), Some(t) if t.kind == TokenKind::Symbol(c))
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<(), CompileError> {
        if self.check_keyword(&[kw]).is_none() {
            return Err(self.error_expected(&format!("keyword '{}'", kw.as_str())));
        }
        self.tokens.advance()?;
        Ok(())
    }

    fn expect_symbol(&mut self, c: char) -> Result<(), CompileError> {
        if !self.check_symbol(c) {
            return Err(self.error_expected(&format!("'{c}'")));
        }
        self.tokens.advance()?;
        Ok(())
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, CompileError> {
        let name = match self.tokens.peek(0).map(|t| &t.kind) {
            Some(TokenKind::Identifier(name)) => name.clone(),
            _ => return Err(self.error_expected(what)),
        };
        self.tokens.advance()?;
        Ok(name)
    }

    fn current_location(&self) -> (usize, usize) {
        self.tokens
            .current()
            .map(|t| (t.line, t.col))
            .unwrap_or_else(|| self.tokens.location())
    }

    fn error_expected(&self, expected: &str) -> CompileError {
        let (line, col) = self.tokens.location();
        CompileError::structural(expected, &self.tokens.describe_next(), line, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jack::error::ErrorKind;
    use crate::jack::lexer::Lexer;
    use crate::jack::xml::XmlTree;

    fn compile(src: &str) -> Result<Vec<String>, CompileError> {
        let tokens = Lexer::new(src).tokenize()?;
        let engine = CompilationEngine::new(TokenStream::new(tokens), VmWriter::new());
        let writer = engine.compile_class()?;
        Ok(writer
            .instructions()
            .iter()
            .map(|i| i.to_string())
            .collect())
    }

    /// Compile `body` as the statements of `function void f()` in class `T`,
    /// returning only the body's code (header dropped).
    fn body(decls: &str, stmts: &str) -> Vec<String> {
        let src = format!("class T {{ function void f() {{ {decls} {stmts} }} }}");
        let mut lines = compile(&src).unwrap();
        lines.remove(0);
        lines
    }

    #[test]
    fn bare_return_pushes_dummy_zero() {
        assert_eq!(body("", "return;"), vec!["push constant 0", "return"]);
    }

    #[test]
    fn return_expression_emits_one_return() {
        assert_eq!(body("", "return 7;"), vec!["push constant 7", "return"]);
    }

    #[test]
    fn expression_is_strictly_left_to_right() {
        assert_eq!(
            body("", "return 1 + 2 * 3;"),
            vec![
                "push constant 1",
                "push constant 2",
                "add",
                "push constant 3",
                "call Math.multiply 2",
                "return",
            ]
        );
    }

    #[test]
    fn parentheses_group_subexpressions() {
        assert_eq!(
            body("", "return 8 / (4 - 2);"),
            vec![
                "push constant 8",
                "push constant 4",
                "push constant 2",
                "sub",
                "call Math.divide 2",
                "return",
            ]
        );
    }

    #[test]
    fn comparison_and_logic_operators() {
        assert_eq!(
            body("var int a;", "return (a < 1) & (a > 2) | (a = 3);"),
            vec![
                "push local 0",
                "push constant 1",
                "lt",
                "push local 0",
                "push constant 2",
                "gt",
                "and",
                "push local 0",
                "push constant 3",
                "eq",
                "or",
                "return",
            ]
        );
    }

    #[test]
    fn keyword_constants() {
        assert_eq!(body("", "return true;"), vec!["push constant 0", "not", "return"]);
        assert_eq!(body("", "return false;"), vec!["push constant 0", "return"]);
        assert_eq!(body("", "return null;"), vec!["push constant 0", "return"]);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(body("var int x;", "return -x;"), vec!["push local 0", "neg", "return"]);
        assert_eq!(body("var boolean b;", "return ~b;"), vec!["push local 0", "not", "return"]);
    }

    #[test]
    fn string_literal_builds_string_object() {
        assert_eq!(
            body("", "return \"Hi\";"),
            vec![
                "push constant 2",
                "call String.new 1",
                "push constant 72",
                "call String.appendChar 2",
                "push constant 105",
                "call String.appendChar 2",
                "return",
            ]
        );
    }

    #[test]
    fn while_loop_shape() {
        let code = body("var int i;", "while (i < 3) { let i = i + 1; } return;");
        assert_eq!(
            code,
            vec![
                "label WHILE_START_0",
                "push local 0",
                "push constant 3",
                "lt",
                "not",
                "if-goto WHILE_END_0",
                "push local 0",
                "push constant 1",
                "add",
                "pop local 0",
                "goto WHILE_START_0",
                "label WHILE_END_0",
                "push constant 0",
                "return",
            ]
        );
    }

    #[test]
    fn labels_are_unique_across_nested_and_sibling_constructs() {
        let src = "class T {
            function void f() {
                while (true) { while (false) { } if (true) { } }
                return;
            }
            function void g() { while (true) { } return; }
        }";
        let code = compile(src).unwrap();
        let labels: Vec<&String> = code.iter().filter(|l| l.starts_with("label ")).collect();
        let mut unique = labels.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(labels.len(), 8);
        assert_eq!(unique.len(), labels.len());
    }

    #[test]
    fn if_else_shape() {
        let code = body(
            "var int x;",
            "if (x) { let x = 1; } else { let x = 2; } return;",
        );
        assert_eq!(
            code,
            vec![
                "push local 0",
                "not",
                "if-goto IF_ELSE_0",
                "push constant 1",
                "pop local 0",
                "goto IF_END_0",
                "label IF_ELSE_0",
                "push constant 2",
                "pop local 0",
                "label IF_END_0",
                "push constant 0",
                "return",
            ]
        );
    }

    #[test]
    fn if_without_else_still_emits_both_labels() {
        let code = body("", "if (true) { } return;");
        assert_eq!(
            code,
            vec![
                "push constant 0",
                "not",
                "not",
                "if-goto IF_ELSE_0",
                "goto IF_END_0",
                "label IF_ELSE_0",
                "label IF_END_0",
                "push constant 0",
                "return",
            ]
        );
    }

    #[test]
    fn array_element_assignment() {
        let code = body("var Array a; var int i;", "let a[i] = a[1]; return;");
        assert_eq!(
            code,
            vec![
                "push local 0",
                "push local 1",
                "add",
                "push local 0",
                "push constant 1",
                "add",
                "pop pointer 1",
                "push that 0",
                "pop temp 0",
                "pop pointer 1",
                "push temp 0",
                "pop that 0",
                "push constant 0",
                "return",
            ]
        );
    }

    #[test]
    fn let_targets_each_segment() {
        let src = "class T {
            static int s; field int f;
            method void m(int a) { var int l;
                let s = 1; let f = 2; let a = 3; let l = 4;
                return;
            }
        }";
        let code = compile(src).unwrap();
        assert!(code.contains(&"pop static 0".to_string()));
        assert!(code.contains(&"pop this 0".to_string()));
        assert!(code.contains(&"pop argument 1".to_string()));
        assert!(code.contains(&"pop local 0".to_string()));
    }

    #[test]
    fn method_prologue_binds_receiver() {
        let src = "class P { field int x; method int getX() { return x; } }";
        assert_eq!(
            compile(src).unwrap(),
            vec![
                "function P.getX 0",
                "push argument 0",
                "pop pointer 0",
                "push this 0",
                "return",
            ]
        );
    }

    #[test]
    fn method_parameters_start_at_index_one() {
        let src = "class P { method int pick(int a, int b, int c) { return c; } }";
        let code = compile(src).unwrap();
        assert_eq!(code[3], "push argument 3");
    }

    #[test]
    fn constructor_allocates_fields() {
        let src = "class P {
            field int x, y; static int count;
            constructor P new(int ax) { let x = ax; return this; }
        }";
        assert_eq!(
            compile(src).unwrap(),
            vec![
                "function P.new 0",
                "push constant 2",
                "call Memory.alloc 1",
                "pop pointer 0",
                "push argument 0",
                "pop this 0",
                "push pointer 0",
                "return",
            ]
        );
    }

    #[test]
    fn function_header_counts_all_locals() {
        let src = "class T { function int f() { var int a, b; var char c; return 0; } }";
        assert_eq!(compile(src).unwrap()[0], "function T.f 3");
    }

    #[test]
    fn call_on_variable_pushes_receiver() {
        let code = body("var Point p;", "do p.move(1, 2); return;");
        assert_eq!(
            code,
            vec![
                "push local 0",
                "push constant 1",
                "push constant 2",
                "call Point.move 3",
                "pop temp 0",
                "push constant 0",
                "return",
            ]
        );
    }

    #[test]
    fn call_on_class_name_has_no_receiver() {
        let code = body("", "do Screen.drawPixel(1, 2); return;");
        assert_eq!(code[2], "call Screen.drawPixel 2");
    }

    #[test]
    fn unqualified_call_targets_current_class() {
        let code = body("", "do helper(); return;");
        assert_eq!(code[0], "call T.helper 0");
        assert_eq!(code[1], "pop temp 0");
    }

    #[test]
    fn call_inside_expression() {
        let code = body("var Point p;", "return 1 + p.getX();");
        assert_eq!(
            code,
            vec![
                "push constant 1",
                "push local 0",
                "call Point.getX 1",
                "add",
                "return",
            ]
        );
    }

    #[test]
    fn nested_call_arguments_are_counted_per_call() {
        let code = body("", "do Output.printInt(Math.max(1, Math.abs(-2))); return;");
        assert_eq!(
            code,
            vec![
                "push constant 1",
                "push constant 2",
                "neg",
                "call Math.abs 1",
                "call Math.max 2",
                "call Output.printInt 1",
                "pop temp 0",
                "push constant 0",
                "return",
            ]
        );
    }

    #[test]
    fn this_keyword_pushes_pointer() {
        let src = "class P { method P me() { return this; } }";
        assert_eq!(compile(src).unwrap()[3], "push pointer 0");
    }

    #[test]
    fn missing_brace_is_structural_error() {
        let err = compile("class Main { function void main() { return; }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert!(err.message.contains("'}'"), "{}", err.message);
    }

    #[test]
    fn missing_class_keyword() {
        let err = compile("Main { }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert!(err.message.contains("keyword 'class'"));
    }

    #[test]
    fn trailing_tokens_after_class() {
        let err = compile("class A { } class B { }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn bad_statement_keyword() {
        let err = compile("class A { function void f() { var int x; var int y; x = 1; } }")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert!(err.message.contains("statement"));
    }

    #[test]
    fn malformed_type() {
        let err = compile("class A { field 3 x; }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert!(err.message.contains("type"));
    }

    #[test]
    fn missing_term() {
        let err = compile("class A { function int f() { return 1 + ; } }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert!(err.message.contains("term"));
    }

    #[test]
    fn assignment_to_undeclared_variable() {
        let err = compile("class A { function void f() { let y = 1; return; } }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert_eq!((err.line, err.col), (1, 35));
    }

    #[test]
    fn duplicate_local_is_rejected() {
        let err = compile("class A { function void f(int x) { var int x; return; } }")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateDefinition);
    }

    #[test]
    fn duplicate_field_is_rejected() {
        let err = compile("class A { field int x; static boolean x; }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateDefinition);
    }

    #[test]
    fn same_name_in_sibling_subroutines_is_fine() {
        let src = "class A {
            function void f() { var int i; return; }
            function void g() { var boolean i; return; }
        }";
        assert!(compile(src).is_ok());
    }

    #[test]
    fn unexpected_end_of_input() {
        let err = compile("class A { function void f() { return").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn class_var_dec_only_accepts_static_or_field() {
        let tokens = Lexer::new("var int x;").tokenize().unwrap();
        let mut engine = CompilationEngine::new(TokenStream::new(tokens), VmWriter::new());
        let err = engine.compile_class_var_dec().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert!(err.message.contains("'static' or 'field'"), "{}", err.message);
    }

    #[test]
    fn subroutine_dec_only_accepts_subroutine_keywords() {
        let tokens = Lexer::new("field int x;").tokenize().unwrap();
        let mut engine = CompilationEngine::new(TokenStream::new(tokens), VmWriter::new());
        let err = engine.compile_subroutine().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert!(err.message.contains("'constructor', 'function' or 'method'"));
    }

    #[test]
    fn oversized_string_constant_is_rejected() {
        let mut tokens = Lexer::new("class T { function void f() { return \"s\"; } }")
            .tokenize()
            .unwrap();
        for token in &mut tokens {
            if let TokenKind::StringConst(s) = &mut token.kind {
                *s = "a".repeat(32768);
            }
        }
        let engine = CompilationEngine::new(TokenStream::new(tokens), VmWriter::new());
        let err = engine.compile_class().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        assert!(err.message.contains("string constant"), "{}", err.message);
    }

    fn tree(src: &str) -> String {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let engine =
            CompilationEngine::with_tree(TokenStream::new(tokens), VmWriter::new(), XmlTree::new());
        let (_, tree) = engine.compile_class_with_tree().unwrap();
        tree.into_xml()
    }

    /// Trimmed lines from the first `<tag>` up to the first `</tag>`.
    fn element(xml: &str, tag: &str) -> Vec<String> {
        let lines: Vec<&str> = xml.lines().map(str::trim).collect();
        let open = format!("<{tag}>");
        let close = format!("</{tag}>");
        let start = lines.iter().position(|l| *l == open).unwrap();
        let len = lines[start..].iter().position(|l| *l == close).unwrap();
        lines[start..=start + len].iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn tree_for_let_statement() {
        let xml = tree("class T { function void f() { var int x; let x = 1; return; } }");
        assert_eq!(
            element(&xml, "letStatement"),
            vec![
                "<letStatement>",
                "<keyword> let </keyword>",
                "<identifier> x </identifier>",
                "<symbol> = </symbol>",
                "<expression>",
                "<term>",
                "<integerConstant> 1 </integerConstant>",
                "</term>",
                "</expression>",
                "<symbol> ; </symbol>",
                "</letStatement>",
            ]
        );
        // class > subroutineDec > subroutineBody > statements > letStatement
        assert!(xml.contains("\n        <letStatement>\n"));
    }

    #[test]
    fn tree_wraps_whole_class() {
        let xml = tree("class T { field int a; function void f() { return; } }");
        assert!(xml.starts_with(
            "<class>\n  <keyword> class </keyword>\n  <identifier> T </identifier>\n  \
             <symbol> { </symbol>\n  <classVarDec>\n"
        ));
        assert!(xml.contains("<parameterList>\n    </parameterList>\n"));
        assert!(xml.ends_with("  <symbol> } </symbol>\n</class>\n"));
    }

    #[test]
    fn tree_keeps_lookahead_out_of_terms() {
        let xml = tree("class T { function int f() { var int x; return x; } }");
        assert_eq!(
            element(&xml, "returnStatement"),
            vec![
                "<returnStatement>",
                "<keyword> return </keyword>",
                "<expression>",
                "<term>",
                "<identifier> x </identifier>",
                "</term>",
                "</expression>",
                "<symbol> ; </symbol>",
                "</returnStatement>",
            ]
        );
    }

    #[test]
    fn tree_places_call_tokens_inside_term() {
        let src = "class T { function void f() { var int x; let x = Math.max(x, 2); return; } }";
        let xml = tree(src);
        assert_eq!(
            element(&xml, "letStatement"),
            vec![
                "<letStatement>",
                "<keyword> let </keyword>",
                "<identifier> x </identifier>",
                "<symbol> = </symbol>",
                "<expression>",
                "<term>",
                "<identifier> Math </identifier>",
                "<symbol> . </symbol>",
                "<identifier> max </identifier>",
                "<symbol> ( </symbol>",
                "<expressionList>",
                "<expression>",
                "<term>",
                "<identifier> x </identifier>",
                "</term>",
                "</expression>",
                "<symbol> , </symbol>",
                "<expression>",
                "<term>",
                "<integerConstant> 2 </integerConstant>",
                "</term>",
                "</expression>",
                "</expressionList>",
                "<symbol> ) </symbol>",
                "</term>",
                "</expression>",
                "<symbol> ; </symbol>",
                "</letStatement>",
            ]
        );
    }

    #[test]
    fn tree_does_not_change_vm_code() {
        let src = "class T { field int n;
            method int f(Array a) { var int i;
                while (i < n) { let a[i] = -i; let i = i + 1; }
                if (~(i = 0)) { do Output.printInt(a[0]); }
                return i;
            }
        }";
        let tokens = Lexer::new(src).tokenize().unwrap();
        let engine =
            CompilationEngine::with_tree(TokenStream::new(tokens), VmWriter::new(), XmlTree::new());
        let (writer, _) = engine.compile_class_with_tree().unwrap();
        let with_tree: Vec<String> = writer.instructions().iter().map(|i| i.to_string()).collect();
        assert_eq!(with_tree, compile(src).unwrap());
    }
}
