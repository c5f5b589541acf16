//! XML diagnostics: a flat token listing and an indented parse tree. Both
//! are independent of VM emission.

use super::token::{Token, TokenKind};
use super::tree::ParseTreeSink;

/// Render tokens as a `<tokens>` document, one element per token.
pub fn tokens_to_xml(tokens: &[Token]) -> String {
    let mut xml = String::from("<tokens>\n");
    for token in tokens {
        xml.push_str(&token_element(token));
        xml.push('\n');
    }
    xml.push_str("</tokens>\n");
    xml
}

/// Collects the parse tree as XML, one element per production and per
/// terminal, indented two spaces per level.
#[derive(Debug, Default)]
pub struct XmlTree {
    xml: String,
    depth: usize,
}

impl XmlTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_xml(self) -> String {
        self.xml
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.xml.push_str("  ");
        }
        self.xml.push_str(text);
        self.xml.push('\n');
    }
}

impl ParseTreeSink for XmlTree {
    fn open(&mut self, production: &'static str) {
        self.line(&format!("<{production}>"));
        self.depth += 1;
    }

    fn close(&mut self, production: &'static str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(&format!("</{production}>"));
    }

    fn token(&mut self, token: &Token) {
        self.line(&token_element(token));
    }
}

fn token_element(token: &Token) -> String {
    let (tag, text) = match &token.kind {
        TokenKind::Keyword(kw) => ("keyword", kw.as_str().to_string()),
        TokenKind::Symbol(c) => ("symbol", c.to_string()),
        TokenKind::Identifier(name) => ("identifier", name.clone()),
        TokenKind::IntConst(n) => ("integerConstant", n.to_string()),
        TokenKind::StringConst(s) => ("stringConstant", s.clone()),
    };
    format!("<{tag}> {} </{tag}>", escape(&text))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
