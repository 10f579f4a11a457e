//! Symbols, scopes, and the user-defined type registry.
//!
//! Scopes are kept as a stack: index 0 is the global scope and the last
//! entry is the innermost one. Name lookup walks from the top of the stack
//! toward global. Struct types do not live in ordinary scopes; they go
//! into a flat registry keyed by name.

use std::collections::HashMap;

use crate::types::Type;

/// A function parameter as recorded on a function symbol: ordered name,
/// type, and mutability.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParam {
    pub name: String,
    pub ty: Type,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable,
    Parameter { index: usize },
    Function { params: Vec<FunctionParam> },
    Struct { fields: Vec<Symbol> },
    Field,
}

/// A named entity. `ty` is the variable type, the function return type,
/// the struct's nominal type, or the field type, depending on `kind`.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    pub mutable: bool,
    pub initialized: bool,
}

impl Symbol {
    pub fn variable(name: impl Into<String>, ty: Type, mutable: bool) -> Self {
        Symbol {
            name: name.into(),
            kind: SymbolKind::Variable,
            ty,
            mutable,
            initialized: false,
        }
    }

    pub fn parameter(name: impl Into<String>, ty: Type, index: usize) -> Self {
        Symbol {
            name: name.into(),
            kind: SymbolKind::Parameter { index },
            ty,
            mutable: false,
            initialized: true,
        }
    }

    pub fn function(
        name: impl Into<String>,
        return_type: Type,
        params: Vec<FunctionParam>,
    ) -> Self {
        Symbol {
            name: name.into(),
            kind: SymbolKind::Function { params },
            ty: return_type,
            mutable: false,
            initialized: true,
        }
    }

    pub fn field(name: impl Into<String>, ty: Type) -> Self {
        Symbol {
            name: name.into(),
            kind: SymbolKind::Field,
            ty,
            mutable: false,
            initialized: false,
        }
    }

    pub fn structure(name: impl Into<String>, fields: Vec<Symbol>) -> Self {
        let name = name.into();
        Symbol {
            ty: Type::structure(name.clone()),
            name,
            kind: SymbolKind::Struct { fields },
            mutable: false,
            initialized: true,
        }
    }

    /// The parameter list of a function symbol.
    pub fn function_params(&self) -> Option<&[FunctionParam]> {
        match &self.kind {
            SymbolKind::Function { params } => Some(params),
            _ => None,
        }
    }

    /// The fields of a struct symbol.
    pub fn struct_fields(&self) -> Option<&[Symbol]> {
        match &self.kind {
            SymbolKind::Struct { fields } => Some(fields),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
    /// Loop bodies, tracked for `break`/`continue` validation.
    Loop,
    /// Impl blocks, tracked so `self` can resolve to the target struct.
    Struct,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    symbols: HashMap<String, Symbol>,
    /// Declared return type, on Function scopes.
    pub return_type: Option<Type>,
    /// Implementing struct name, on Struct scopes.
    pub struct_name: Option<String>,
    /// Depth from global (global is 0).
    pub level: usize,
}

impl Scope {
    fn new(kind: ScopeKind, level: usize) -> Self {
        Scope {
            kind,
            symbols: HashMap::new(),
            return_type: None,
            struct_name: None,
            level,
        }
    }
}

/// The scope stack plus the flat registry of user-defined types.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    types: HashMap<String, Symbol>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::new(ScopeKind::Global, 0)],
            types: HashMap::new(),
        }
    }

    pub fn enter_scope(&mut self, kind: ScopeKind) {
        let level = self.scopes.len();
        self.scopes.push(Scope::new(kind, level));
    }

    pub fn enter_function_scope(&mut self, return_type: Type) {
        self.enter_scope(ScopeKind::Function);
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .return_type = Some(return_type);
    }

    pub fn enter_struct_scope(&mut self, struct_name: impl Into<String>) {
        self.enter_scope(ScopeKind::Struct);
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .struct_name = Some(struct_name.into());
    }

    /// Pops the innermost scope. The global scope is never popped.
    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// True when the current scope is the global one.
    pub fn at_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    pub fn current_level(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Defines a symbol in the current scope. Returns `None` when a symbol
    /// of the same name already exists in that scope.
    pub fn define(&mut self, symbol: Symbol) -> Option<&mut Symbol> {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        if scope.symbols.contains_key(&symbol.name) {
            return None;
        }
        let name = symbol.name.clone();
        scope.symbols.insert(name.clone(), symbol);
        scope.symbols.get_mut(&name)
    }

    /// Looks a name up through the scope chain, innermost first.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(name))
    }

    /// Looks a name up in the current scope only.
    pub fn lookup_current_scope(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .last()
            .expect("scope stack is never empty")
            .symbols
            .get(name)
    }

    pub fn lookup_function(&self, name: &str) -> Option<&Symbol> {
        self.lookup(name)
            .filter(|sym| matches!(sym.kind, SymbolKind::Function { .. }))
    }

    /// Marks a binding as initialized, wherever in the chain it lives.
    pub fn mark_initialized(&mut self, name: &str) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(symbol) = scope.symbols.get_mut(name) {
                symbol.initialized = true;
                return;
            }
        }
    }

    /// Registers a user-defined type. Returns `false` when the name is
    /// already taken.
    pub fn register_type(&mut self, symbol: Symbol) -> bool {
        if self.types.contains_key(&symbol.name) {
            return false;
        }
        self.types.insert(symbol.name.clone(), symbol);
        true
    }

    pub fn lookup_type(&self, name: &str) -> Option<&Symbol> {
        self.types.get(name)
    }

    pub fn lookup_struct(&self, name: &str) -> Option<&Symbol> {
        self.lookup_type(name)
            .filter(|sym| matches!(sym.kind, SymbolKind::Struct { .. }))
    }

    /// True when any enclosing scope is a loop body.
    pub fn in_loop(&self) -> bool {
        self.scopes.iter().any(|scope| scope.kind == ScopeKind::Loop)
    }

    pub fn in_function(&self) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.kind == ScopeKind::Function)
    }

    /// The declared return type of the nearest enclosing function scope.
    pub fn return_type(&self) -> Option<&Type> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.kind == ScopeKind::Function)
            .and_then(|scope| scope.return_type.as_ref())
    }

    /// The struct being implemented by the nearest enclosing impl scope.
    pub fn current_struct(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.kind == ScopeKind::Struct)
            .and_then(|scope| scope.struct_name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_and_looks_up_through_scope_chain() {
        let mut table = SymbolTable::new();
        table
            .define(Symbol::variable("x", Type::I32, false))
            .expect("define x");
        table.enter_scope(ScopeKind::Block);
        assert!(table.lookup("x").is_some());
        assert!(table.lookup_current_scope("x").is_none());
    }

    #[test]
    fn rejects_duplicates_in_same_scope_only() {
        let mut table = SymbolTable::new();
        assert!(table.define(Symbol::variable("x", Type::I32, false)).is_some());
        assert!(table.define(Symbol::variable("x", Type::I64, true)).is_none());

        table.enter_scope(ScopeKind::Block);
        assert!(
            table.define(Symbol::variable("x", Type::I64, true)).is_some(),
            "shadowing in an inner scope is allowed"
        );
    }

    #[test]
    fn inner_definitions_shadow_outer_ones() {
        let mut table = SymbolTable::new();
        table
            .define(Symbol::variable("x", Type::I32, false))
            .expect("outer x");
        table.enter_scope(ScopeKind::Block);
        table
            .define(Symbol::variable("x", Type::F64, true))
            .expect("inner x");
        assert_eq!(table.lookup("x").expect("x").ty, Type::F64);
        table.exit_scope();
        assert_eq!(table.lookup("x").expect("x").ty, Type::I32);
    }

    #[test]
    fn loop_detection_sees_through_nested_blocks() {
        let mut table = SymbolTable::new();
        assert!(!table.in_loop());
        table.enter_scope(ScopeKind::Loop);
        table.enter_scope(ScopeKind::Block);
        table.enter_scope(ScopeKind::Block);
        assert!(table.in_loop());
        table.exit_scope();
        table.exit_scope();
        table.exit_scope();
        assert!(!table.in_loop());
    }

    #[test]
    fn function_detection_sees_through_nested_scopes() {
        let mut table = SymbolTable::new();
        assert!(!table.in_function());
        table.enter_function_scope(Type::Void);
        table.enter_scope(ScopeKind::Loop);
        table.enter_scope(ScopeKind::Block);
        assert!(table.in_function());
        table.exit_scope();
        table.exit_scope();
        table.exit_scope();
        assert!(!table.in_function());
    }

    #[test]
    fn function_scope_carries_return_type() {
        let mut table = SymbolTable::new();
        assert!(table.return_type().is_none());
        table.enter_function_scope(Type::I32);
        table.enter_scope(ScopeKind::Block);
        assert_eq!(table.return_type(), Some(&Type::I32));
    }

    #[test]
    fn struct_scope_carries_target_name() {
        let mut table = SymbolTable::new();
        table.enter_struct_scope("Vec2");
        table.enter_function_scope(Type::F64);
        assert_eq!(table.current_struct(), Some("Vec2"));
    }

    #[test]
    fn registry_rejects_duplicate_types() {
        let mut table = SymbolTable::new();
        assert!(table.register_type(Symbol::structure("P", vec![])));
        assert!(!table.register_type(Symbol::structure("P", vec![])));
        assert!(table.lookup_struct("P").is_some());
        assert!(table.lookup_struct("Q").is_none());
    }

    #[test]
    fn global_scope_is_never_popped() {
        let mut table = SymbolTable::new();
        table.exit_scope();
        table.exit_scope();
        assert!(table.at_global_scope());
        assert_eq!(table.current_level(), 0);
    }

    #[test]
    fn function_symbol_exposes_parameters() {
        let mut table = SymbolTable::new();
        let params = vec![FunctionParam {
            name: "n".to_string(),
            ty: Type::I32,
            mutable: false,
        }];
        table
            .define(Symbol::function("fib", Type::I32, params))
            .expect("define fib");
        let sym = table.lookup_function("fib").expect("fib");
        assert_eq!(sym.ty, Type::I32);
        assert_eq!(sym.function_params().expect("params").len(), 1);
        assert!(table.lookup_function("missing").is_none());
    }
}
