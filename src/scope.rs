// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Chained local/global view over a [`SymbolTable`].
//!
//! The descriptor is never mutated. Inferred types and the function
//! definitions bound to symbols live in an environment owned by the
//! [`ScopeTable`], keyed by scope id and symbol name.

use crate::ast::{FunctionDef, Ref};
use crate::symtable::{Scope, ScopeId, Symbol, SymbolTable};
use crate::types::Type;

use std::collections::BTreeMap;

use anyhow::Result;
use thiserror::Error;

/// Mismatch between the tree being analyzed and its scope descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("unknown scope id {id}")]
    UnknownScope { id: ScopeId },

    #[error("unknown symbol `{name}` in scope `{scope}`")]
    UnknownSymbol { scope: String, name: String },

    #[error("unknown child scope `{name}` of scope `{scope}`")]
    UnknownChildScope { scope: String, name: String },

    #[error("no definition registered for symbol `{name}` in scope `{scope}`")]
    NoDefinition { scope: String, name: String },
}

/// A node of the chained table: the scope names are resolved in and the
/// scope that names marked global fall back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    pub local: ScopeId,
    pub global: ScopeId,
}

impl Namespace {
    /// The module namespace. Local and global are the same scope.
    pub fn module() -> Self {
        Self {
            local: SymbolTable::ROOT,
            global: SymbolTable::ROOT,
        }
    }

    /// Namespace of `child` whose global fallback is this namespace's local scope.
    pub fn enter_child(&self, child: ScopeId) -> Self {
        Self {
            local: child,
            global: self.local,
        }
    }
}

pub struct ScopeTable<'a> {
    table: &'a SymbolTable,
    types: BTreeMap<(ScopeId, String), Type>,
    definitions: BTreeMap<(ScopeId, String), Ref<FunctionDef>>,
}

impl<'a> ScopeTable<'a> {
    pub fn new(table: &'a SymbolTable) -> Self {
        Self {
            table,
            types: BTreeMap::new(),
            definitions: BTreeMap::new(),
        }
    }

    fn scope(&self, id: ScopeId) -> Result<&'a Scope> {
        match self.table.scope(id) {
            Some(scope) => Ok(scope),
            None => Err(ScopeError::UnknownScope { id }.into()),
        }
    }

    fn symbol(&self, id: ScopeId, name: &str) -> Result<&'a Symbol> {
        let scope = self.scope(id)?;
        match scope.lookup(name) {
            Some(symbol) => Ok(symbol),
            None => Err(ScopeError::UnknownSymbol {
                scope: scope.name.clone(),
                name: name.to_string(),
            }
            .into()),
        }
    }

    // The scope holding the state of `name` as seen from `ns`. None when the
    // name is global but not declared in the global scope.
    fn owner(&self, ns: Namespace, name: &str) -> Result<Option<ScopeId>> {
        let symbol = self.symbol(ns.local, name)?;
        if !symbol.is_global() {
            return Ok(Some(ns.local));
        }
        let global = self.scope(ns.global)?;
        Ok(global.lookup(name).map(|_| ns.global))
    }

    /// Type inferred for `name`. Global names are resolved one level up only.
    pub fn get_inferred_type(&self, ns: Namespace, name: &str) -> Result<Option<&Type>> {
        Ok(match self.owner(ns, name)? {
            Some(id) => self.types.get(&(id, name.to_string())),
            None => None,
        })
    }

    /// Record (or clear) the type of a name declared in the local scope.
    pub fn set_inferred_type(&mut self, ns: Namespace, name: &str, ty: Option<Type>) -> Result<()> {
        self.symbol(ns.local, name)?;
        let key = (ns.local, name.to_string());
        match ty {
            Some(ty) => {
                self.types.insert(key, ty);
            }
            None => {
                self.types.remove(&key);
            }
        }
        Ok(())
    }

    /// Namespace of the child scope `name`, searching the local scope's
    /// children first and then the global scope's.
    pub fn lookup_child_scope(&self, ns: Namespace, name: &str) -> Result<Namespace> {
        if let Some(child) = self.table.find_child(ns.local, name) {
            return Ok(Namespace {
                local: child,
                global: ns.local,
            });
        }
        if let Some(child) = self.table.find_child(ns.global, name) {
            return Ok(Namespace {
                local: child,
                global: ns.global,
            });
        }
        Err(ScopeError::UnknownChildScope {
            scope: self.scope(ns.local)?.name.clone(),
            name: name.to_string(),
        }
        .into())
    }

    /// Namespace of the scope opened by `def`, entered from `ns`. The
    /// global fallback is the scope the definition appears in.
    pub fn definition_scope(&self, ns: Namespace, def: &FunctionDef) -> Result<Namespace> {
        let scope = self
            .table
            .function_scope(def.sidx)
            .and_then(|id| self.table.scope(id));
        match scope {
            Some(scope) => Ok(Namespace {
                local: scope.id,
                global: scope.parent.unwrap_or(ns.global),
            }),
            None => Err(ScopeError::UnknownChildScope {
                scope: self.scope(ns.local)?.name.clone(),
                name: def.name.text().to_string(),
            }
            .into()),
        }
    }

    pub fn register_definition(
        &mut self,
        ns: Namespace,
        name: &str,
        def: Ref<FunctionDef>,
    ) -> Result<()> {
        self.symbol(ns.local, name)?;
        self.definitions.insert((ns.local, name.to_string()), def);
        Ok(())
    }

    pub fn lookup_definition(&self, ns: Namespace, name: &str) -> Result<Ref<FunctionDef>> {
        let def = match self.owner(ns, name)? {
            Some(id) => self.definitions.get(&(id, name.to_string())),
            None => None,
        };
        match def {
            Some(def) => Ok(def.clone()),
            None => Err(ScopeError::NoDefinition {
                scope: self.scope(ns.local)?.name.clone(),
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// Whether a definition is bound to `name`. Undeclared names have none.
    pub fn has_definition(&self, ns: Namespace, name: &str) -> bool {
        self.lookup_definition(ns, name).is_ok()
    }

    pub fn name(&self, ns: Namespace) -> Result<&'a str> {
        Ok(self.scope(ns.local)?.name.as_str())
    }

    pub fn symbols(&self, ns: Namespace) -> Result<impl Iterator<Item = &'a Symbol>> {
        Ok(self.scope(ns.local)?.symbols.values())
    }

    /// Locally bound symbols of `ns` that carry an inferred type.
    pub fn known_types(&self, ns: Namespace) -> Result<BTreeMap<String, Type>> {
        let mut known = BTreeMap::new();
        for symbol in self.symbols(ns)?.filter(|s| s.is_local()) {
            if let Some(ty) = self.types.get(&(ns.local, symbol.name.clone())) {
                known.insert(symbol.name.clone(), ty.clone());
            }
        }
        Ok(known)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtable::{Binding, ScopeKind};

    // top: boto3, f (local), g
    //   f: boto3 (global), c (local), len (global)
    //   g: f (global)
    fn table() -> SymbolTable {
        let mut table = SymbolTable::new();
        let root = SymbolTable::ROOT;
        for name in ["boto3", "f", "g"] {
            table.declare(root, name, Binding::Local).unwrap();
        }
        let f = table.add_scope(root, "f", ScopeKind::Function).unwrap();
        table.declare(f, "boto3", Binding::GlobalImplicit).unwrap();
        table.declare(f, "c", Binding::Local).unwrap();
        table.declare(f, "len", Binding::GlobalImplicit).unwrap();
        let g = table.add_scope(root, "g", ScopeKind::Function).unwrap();
        table.declare(g, "f", Binding::GlobalImplicit).unwrap();
        table
    }

    #[test]
    fn global_fallback() {
        let table = table();
        let mut scopes = ScopeTable::new(&table);
        let module = Namespace::module();
        scopes
            .set_inferred_type(module, "boto3", Some(Type::ModuleHandle))
            .unwrap();

        let f = scopes.lookup_child_scope(module, "f").unwrap();
        assert_eq!(f.global, SymbolTable::ROOT);
        assert_eq!(
            scopes.get_inferred_type(f, "boto3").unwrap(),
            Some(&Type::ModuleHandle)
        );
        // Global but not declared in the global scope.
        assert_eq!(scopes.get_inferred_type(f, "len").unwrap(), None);

        scopes
            .set_inferred_type(f, "c", Some(Type::service_client("s3")))
            .unwrap();
        assert_eq!(
            scopes.known_types(f).unwrap(),
            BTreeMap::from([("c".to_string(), Type::service_client("s3"))])
        );
        assert_eq!(
            scopes.known_types(module).unwrap(),
            BTreeMap::from([("boto3".to_string(), Type::ModuleHandle)])
        );

        scopes.set_inferred_type(f, "c", None).unwrap();
        assert!(scopes.known_types(f).unwrap().is_empty());
    }

    #[test]
    fn unknown_symbols_are_fatal() {
        let table = table();
        let mut scopes = ScopeTable::new(&table);
        let module = Namespace::module();

        let err = scopes.get_inferred_type(module, "nope").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ScopeError>(),
            Some(&ScopeError::UnknownSymbol {
                scope: "top".to_string(),
                name: "nope".to_string()
            })
        );
        assert!(scopes
            .set_inferred_type(module, "nope", Some(Type::ModuleHandle))
            .is_err());

        let err = scopes.lookup_child_scope(module, "h").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScopeError>(),
            Some(ScopeError::UnknownChildScope { .. })
        ));
    }

    #[test]
    fn child_scope_search_order() {
        let table = table();
        let scopes = ScopeTable::new(&table);
        let g = scopes
            .lookup_child_scope(Namespace::module(), "g")
            .unwrap();
        // `f` is not a child of `g`, it is found among the global scope's children.
        let f = scopes.lookup_child_scope(g, "f").unwrap();
        assert_eq!(f.global, SymbolTable::ROOT);
        assert_eq!(scopes.name(f).unwrap(), "f");
        assert_eq!(Namespace::module().enter_child(f.local).global, SymbolTable::ROOT);
        assert_eq!(g.enter_child(f.local).global, g.local);
    }

    #[test]
    fn definitions() {
        let table = table();
        let source = crate::lexer::Source::from_contents(
            "test.py".to_string(),
            "def f():\n    pass\n".to_string(),
        )
        .unwrap();
        let module = crate::parser::Parser::new(&source)
            .unwrap()
            .parse()
            .unwrap();
        let def = match module.body[0].as_ref() {
            crate::ast::Stmt::FunctionDef(def) => def.clone(),
            s => panic!("unexpected statement {s:?}"),
        };

        let mut scopes = ScopeTable::new(&table);
        let module_ns = Namespace::module();
        let g = scopes.lookup_child_scope(module_ns, "g").unwrap();
        assert!(!scopes.has_definition(module_ns, "f"));
        assert!(!scopes.has_definition(module_ns, "undeclared"));

        scopes
            .register_definition(module_ns, "f", def.clone())
            .unwrap();
        assert!(scopes.has_definition(module_ns, "f"));
        // Resolved through the global fallback.
        assert!(scopes.lookup_definition(g, "f").unwrap() == def);

        let err = scopes.lookup_definition(module_ns, "g").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScopeError>(),
            Some(ScopeError::NoDefinition { .. })
        ));

        // The hand built table knows no definition statements.
        let err = scopes.definition_scope(module_ns, &def).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScopeError>(),
            Some(ScopeError::UnknownChildScope { .. })
        ));

        let built = SymbolTable::build(&module).unwrap();
        let scopes = ScopeTable::new(&built);
        assert_eq!(
            scopes.definition_scope(module_ns, &def).unwrap(),
            scopes.lookup_child_scope(module_ns, "f").unwrap()
        );
    }
}
