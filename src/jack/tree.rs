//! Parse-tree sink.
//!
//! The engine reports every production it enters and leaves, and every token
//! it consumes in between. A sink observes that stream; it never affects the
//! emitted VM code.

use super::token::Token;

/// Receives the shape of the parse as it happens.
///
/// Productions nest strictly: each [`open`](Self::open) is matched by a
/// [`close`](Self::close) with the same name. All methods default to no-ops.
pub trait ParseTreeSink {
    fn open(&mut self, _production: &'static str) {}

    fn close(&mut self, _production: &'static str) {}

    fn token(&mut self, _token: &Token) {}
}

/// Discards the tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTree;

impl ParseTreeSink for NoTree {}
