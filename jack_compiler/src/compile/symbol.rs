//! Two-scope symbol table.
use super::vm::Segment;

use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Declaration category of a symbol.
///
/// The kind decides both the owning scope and the memory segment
/// the symbol lowers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Static,
    Field,
    Arg,
    Local,
}

impl SymbolKind {
    /// Memory segment a symbol of this kind is addressed through.
    pub fn segment(&self) -> Segment {
        match self {
            SymbolKind::Static => Segment::Static,
            SymbolKind::Field => Segment::This,
            SymbolKind::Arg => Segment::Argument,
            SymbolKind::Local => Segment::Local,
        }
    }

    /// Statics and fields live in the class scope; arguments and
    /// locals in the subroutine scope.
    fn is_class_scope(&self) -> bool {
        matches!(self, SymbolKind::Static | SymbolKind::Field)
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: SmolStr,
    /// Primitive or class name. Method dispatch qualifies call
    /// targets with the receiver's type text.
    pub ty: SmolStr,
    pub kind: SymbolKind,
    /// Running index within the owning scope, counted per kind.
    pub index: u16,
}

/// Symbol table with a class scope and a subroutine scope.
///
/// The class scope persists for the whole class compilation. The
/// subroutine scope is replaced at the start of every subroutine.
/// Lookup searches the subroutine scope first, so subroutine names
/// shadow class names of the same text.
#[derive(Debug, Default)]
pub struct SymbolTable {
    class_scope: BTreeMap<SmolStr, Symbol>,
    subroutine_scope: BTreeMap<SmolStr, Symbol>,
    static_count: u16,
    field_count: u16,
    arg_count: u16,
    local_count: u16,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the subroutine scope with an empty one.
    /// The class scope is untouched.
    pub fn start_subroutine(&mut self) {
        self.subroutine_scope.clear();
        self.arg_count = 0;
        self.local_count = 0;
    }

    /// Define a new symbol and assign it the next running index of
    /// its kind. The caller is responsible for rejecting duplicates
    /// beforehand with [`is_defined_in_scope`](Self::is_defined_in_scope).
    pub fn define(
        &mut self,
        name: impl Into<SmolStr>,
        ty: impl Into<SmolStr>,
        kind: SymbolKind,
    ) -> u16 {
        let index = self.next_index(kind);
        let symbol = Symbol {
            name: name.into(),
            ty: ty.into(),
            kind,
            index,
        };

        if kind.is_class_scope() {
            self.class_scope.insert(symbol.name.clone(), symbol);
        } else {
            self.subroutine_scope.insert(symbol.name.clone(), symbol);
        }

        index
    }

    /// Whether the scope owning the given kind already defines the name.
    ///
    /// Shadowing a name from the other scope is allowed, so only the
    /// kind's own scope is consulted.
    pub fn is_defined_in_scope(&self, name: &str, kind: SymbolKind) -> bool {
        if kind.is_class_scope() {
            self.class_scope.contains_key(name)
        } else {
            self.subroutine_scope.contains_key(name)
        }
    }

    /// Lookup the given symbol name according to the scope rules.
    ///
    /// First search the subroutine scope for the symbol, then fall
    /// back to the class scope.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.subroutine_scope
            .get(name)
            .or_else(|| self.class_scope.get(name))
    }

    /// Lookup the given symbol name according to the scope rules.
    ///
    /// Returns `true` if the symbol is found.
    pub fn contains_symbol(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Number of symbols of the given kind defined in the scope that
    /// owns the kind.
    pub fn var_count(&self, kind: SymbolKind) -> u16 {
        match kind {
            SymbolKind::Static => self.static_count,
            SymbolKind::Field => self.field_count,
            SymbolKind::Arg => self.arg_count,
            SymbolKind::Local => self.local_count,
        }
    }

    fn next_index(&mut self, kind: SymbolKind) -> u16 {
        let count = match kind {
            SymbolKind::Static => &mut self.static_count,
            SymbolKind::Field => &mut self.field_count,
            SymbolKind::Arg => &mut self.arg_count,
            SymbolKind::Local => &mut self.local_count,
        };
        let index = *count;
        *count += 1;
        index
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_indices_assigned_per_kind() {
        let mut table = SymbolTable::new();

        // Kinds count independently, each starting at zero.
        assert_eq!(table.define("a", "int", SymbolKind::Field), 0);
        assert_eq!(table.define("b", "int", SymbolKind::Static), 0);
        assert_eq!(table.define("c", "int", SymbolKind::Field), 1);
        assert_eq!(table.define("x", "int", SymbolKind::Arg), 0);
        assert_eq!(table.define("y", "int", SymbolKind::Local), 0);
        assert_eq!(table.define("z", "int", SymbolKind::Local), 1);

        assert_eq!(table.var_count(SymbolKind::Field), 2);
        assert_eq!(table.var_count(SymbolKind::Static), 1);
        assert_eq!(table.var_count(SymbolKind::Arg), 1);
        assert_eq!(table.var_count(SymbolKind::Local), 2);
    }

    #[test]
    fn test_start_subroutine_clears_subroutine_scope() {
        let mut table = SymbolTable::new();
        table.define("size", "int", SymbolKind::Field);
        table.define("i", "int", SymbolKind::Local);

        table.start_subroutine();

        assert!(table.resolve("i").is_none());
        assert_eq!(table.var_count(SymbolKind::Local), 0);
        assert_eq!(table.var_count(SymbolKind::Arg), 0);

        // Class scope names survive unchanged.
        let size = table.resolve("size").expect("field survives");
        assert_eq!(size.kind, SymbolKind::Field);
        assert_eq!(size.index, 0);

        // Indices restart in the fresh scope.
        assert_eq!(table.define("j", "int", SymbolKind::Local), 0);
    }

    #[test]
    fn test_shadowing() {
        let mut table = SymbolTable::new();
        table.define("value", "int", SymbolKind::Field);
        table.define("value", "boolean", SymbolKind::Local);

        // Subroutine scope wins the lookup.
        let symbol = table.resolve("value").expect("resolves");
        assert_eq!(symbol.kind, SymbolKind::Local);
        assert_eq!(symbol.ty, "boolean");

        // Same-scope duplicates are visible to the caller's check.
        assert!(table.is_defined_in_scope("value", SymbolKind::Local));
        assert!(table.is_defined_in_scope("value", SymbolKind::Field));
        assert!(!table.is_defined_in_scope("other", SymbolKind::Local));
    }

    #[test]
    fn test_resolve_undeclared() {
        let table = SymbolTable::new();
        assert!(table.resolve("nope").is_none());
        assert!(!table.contains_symbol("nope"));
    }

    #[test]
    fn test_segments() {
        assert_eq!(SymbolKind::Static.segment(), Segment::Static);
        assert_eq!(SymbolKind::Field.segment(), Segment::This);
        assert_eq!(SymbolKind::Arg.segment(), Segment::Argument);
        assert_eq!(SymbolKind::Local.segment(), Segment::Local);
    }
}
