//! Two-scope symbol table.
//!
//! Class scope holds `static` and `field` symbols for the whole class;
//! subroutine scope holds `argument` and `local` symbols and is cleared at
//! the start of every subroutine. Lookups search the subroutine scope first.

use std::collections::HashMap;

use crate::vm::Segment;

/// Storage class of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Static,
    Field,
    Argument,
    Local,
}

impl SymbolKind {
    /// The VM segment this kind of variable lives in.
    pub fn segment(self) -> Segment {
        match self {
            Self::Static => Segment::Static,
            Self::Field => Segment::This,
            Self::Argument => Segment::Argument,
            Self::Local => Segment::Local,
        }
    }

    fn is_class_scoped(self) -> bool {
        matches!(self, Self::Static | Self::Field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: String,
    pub kind: SymbolKind,
    pub index: u16,
}

/// Why [`SymbolTable::define`] refused a name.
#[derive(Debug, Clone, PartialEq)]
pub enum DefineError {
    /// The name already exists in the scope the new symbol would land in.
    Duplicate { name: String },
    /// Every index for this kind is taken.
    Exhausted { kind: SymbolKind },
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    class_scope: HashMap<String, Symbol>,
    subroutine_scope: HashMap<String, Symbol>,
    counts: HashMap<SymbolKind, u16>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the subroutine scope and restart argument/local numbering.
    pub fn start_scope(&mut self) {
        self.subroutine_scope.clear();
        self.counts.remove(&SymbolKind::Argument);
        self.counts.remove(&SymbolKind::Local);
    }

    /// Define `name` with the next index for `kind`.
    pub fn define(
        &mut self,
        name: &str,
        ty: &str,
        kind: SymbolKind,
    ) -> Result<&Symbol, DefineError> {
        let scope = if kind.is_class_scoped() {
            &mut self.class_scope
        } else {
            &mut self.subroutine_scope
        };
        if scope.contains_key(name) {
            return Err(DefineError::Duplicate {
                name: name.to_string(),
            });
        }

        let counter = self.counts.entry(kind).or_insert(0);
        let index = *counter;
        *counter = index
            .checked_add(1)
            .ok_or(DefineError::Exhausted { kind })?;

        let symbol = Symbol {
            name: name.to_string(),
            ty: ty.to_string(),
            kind,
            index,
        };
        Ok(scope.entry(name.to_string()).or_insert(symbol))
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.subroutine_scope
            .get(name)
            .or_else(|| self.class_scope.get(name))
    }

    pub fn count(&self, kind: SymbolKind) -> u16 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}
