// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Hierarchical scope descriptor of a module.
//!
//! Every `def`, `class` and `lambda` opens a scope. Each scope declares the
//! names bound or referenced in it and classifies them the way Python does:
//! local, explicitly or implicitly global, or free (a closure variable bound
//! in an enclosing function). Comprehensions do not open scopes; their
//! targets are declared in the enclosing scope.

use crate::ast::*;
use crate::scope::ScopeError;

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;

pub type ScopeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Class,
    Lambda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Local,
    // Declared with `global`.
    GlobalExplicit,
    // Referenced but bound neither here nor in an enclosing function.
    GlobalImplicit,
    // Bound in an enclosing function or declared `nonlocal`.
    Free,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub binding: Binding,
    pub assigned: bool,
    pub referenced: bool,
    pub parameter: bool,
}

impl Symbol {
    /// Whether the name refers to the enclosing global scope.
    pub fn is_global(&self) -> bool {
        matches!(self.binding, Binding::GlobalExplicit | Binding::GlobalImplicit)
    }

    pub fn is_local(&self) -> bool {
        self.binding == Binding::Local
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub name: String,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub symbols: BTreeMap<String, Symbol>,
    // In definition order.
    pub children: Vec<ScopeId>,
}

impl Scope {
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    // Scope opened by each `def`, keyed by the statement index of the definition.
    function_scopes: BTreeMap<u32, ScopeId>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub const ROOT: ScopeId = 0;

    /// A table holding just an empty module scope named `top`.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                id: Self::ROOT,
                name: "top".to_string(),
                kind: ScopeKind::Module,
                parent: None,
                symbols: BTreeMap::new(),
                children: vec![],
            }],
            function_scopes: BTreeMap::new(),
        }
    }

    /// Derive the scopes of a parsed module.
    pub fn build(module: &Module) -> Result<Self> {
        let mut builder = Builder {
            table: Self::new(),
            current: Self::ROOT,
            explicit: BTreeMap::new(),
        };
        builder.visit_stmts(&module.body)?;
        builder.resolve();
        Ok(builder.table)
    }

    pub fn root(&self) -> &Scope {
        &self.scopes[0]
    }

    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id as usize)
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    fn scope_mut(&mut self, id: ScopeId) -> Result<&mut Scope> {
        match self.scopes.get_mut(id as usize) {
            Some(scope) => Ok(scope),
            None => Err(ScopeError::UnknownScope { id }.into()),
        }
    }

    /// Scope opened by the function definition with statement index `sidx`.
    /// Unlike [`SymbolTable::find_child`] this tells apart definitions that
    /// share a name.
    pub fn function_scope(&self, sidx: u32) -> Option<ScopeId> {
        self.function_scopes.get(&sidx).copied()
    }

    /// First child of `scope` with the given name.
    pub fn find_child(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        self.scope(scope)?
            .children
            .iter()
            .copied()
            .find(|c| self.scope(*c).is_some_and(|s| s.name == name))
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.scope(scope)?.lookup(name)
    }

    /// Add a child scope. Used by the builder and for constructing tables by hand.
    pub fn add_scope(&mut self, parent: ScopeId, name: &str, kind: ScopeKind) -> Result<ScopeId> {
        let id = self.scopes.len() as ScopeId;
        self.scope_mut(parent)?.children.push(id);
        self.scopes.push(Scope {
            id,
            name: name.to_string(),
            kind,
            parent: Some(parent),
            symbols: BTreeMap::new(),
            children: vec![],
        });
        Ok(id)
    }

    /// Declare a symbol with a fixed binding.
    pub fn declare(&mut self, scope: ScopeId, name: &str, binding: Binding) -> Result<()> {
        let symbol = Symbol {
            name: name.to_string(),
            binding,
            assigned: binding == Binding::Local,
            referenced: false,
            parameter: false,
        };
        self.scope_mut(scope)?
            .symbols
            .insert(name.to_string(), symbol);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Use {
    Assign,
    Reference,
    Parameter,
}

struct Builder {
    table: SymbolTable,
    current: ScopeId,
    // `global` and `nonlocal` declarations.
    explicit: BTreeMap<(ScopeId, String), Binding>,
}

impl Builder {
    fn note(&mut self, name: &str, usage: Use) -> Result<()> {
        let scope = self.table.scope_mut(self.current)?;
        let symbol = scope
            .symbols
            .entry(name.to_string())
            .or_insert_with(|| Symbol {
                name: name.to_string(),
                binding: Binding::GlobalImplicit,
                assigned: false,
                referenced: false,
                parameter: false,
            });
        match usage {
            Use::Assign => symbol.assigned = true,
            Use::Reference => symbol.referenced = true,
            Use::Parameter => {
                symbol.parameter = true;
                symbol.assigned = true;
            }
        }
        Ok(())
    }

    fn in_child<F>(&mut self, name: &str, kind: ScopeKind, f: F) -> Result<ScopeId>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let child = self.table.add_scope(self.current, name, kind)?;
        let saved = self.current;
        self.current = child;
        let result = f(self);
        self.current = saved;
        result.map(|_| child)
    }

    fn declare_params(&mut self, params: &Parameters) -> Result<()> {
        for p in params.iter() {
            self.note(p.name(), Use::Parameter)?;
        }
        Ok(())
    }

    // Defaults and annotations are evaluated in the defining scope.
    fn visit_param_exprs(&mut self, params: &Parameters) -> Result<()> {
        for p in params.iter() {
            if let Some(default) = &p.default {
                self.visit_expr(default)?;
            }
            if let Some(annotation) = &p.annotation {
                self.visit_expr(annotation)?;
            }
        }
        Ok(())
    }

    fn visit_stmts(&mut self, stmts: &[Ref<Stmt>]) -> Result<()> {
        for stmt in stmts {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn visit_exprs(&mut self, exprs: &[Ref<Expr>]) -> Result<()> {
        for expr in exprs {
            self.visit_expr(expr)?;
        }
        Ok(())
    }

    fn visit_target(&mut self, target: &Expr) -> Result<()> {
        match target {
            Expr::Name { span, .. } => self.note(span.text(), Use::Assign),
            Expr::Tuple { items, .. } | Expr::List { items, .. } => {
                for item in items {
                    self.visit_target(item)?;
                }
                Ok(())
            }
            Expr::Starred { value, .. } => self.visit_target(value),
            _ => self.visit_expr(target),
        }
    }

    fn visit_comprehensions(&mut self, generators: &[Comprehension]) -> Result<()> {
        for g in generators {
            self.visit_expr(&g.iter)?;
            self.visit_target(&g.target)?;
            self.visit_exprs(&g.ifs)?;
        }
        Ok(())
    }

    fn visit_keywords(&mut self, keywords: &[Keyword]) -> Result<()> {
        for k in keywords {
            self.visit_expr(&k.value)?;
        }
        Ok(())
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Name { span, .. } => self.note(span.text(), Use::Reference),
            Expr::Str { .. } | Expr::Number { .. } | Expr::Constant { .. } => Ok(()),
            Expr::Attribute { value, .. } | Expr::Starred { value, .. } => self.visit_expr(value),
            Expr::Await { value, .. } => self.visit_expr(value),
            Expr::Subscript { value, index, .. } => {
                self.visit_expr(value)?;
                self.visit_expr(index)
            }
            Expr::Slice {
                lower, upper, step, ..
            } => {
                for e in [lower, upper, step].into_iter().flatten() {
                    self.visit_expr(e)?;
                }
                Ok(())
            }
            Expr::Call {
                func,
                args,
                keywords,
                ..
            } => {
                self.visit_expr(func)?;
                self.visit_exprs(args)?;
                self.visit_keywords(keywords)
            }
            Expr::List { items, .. } | Expr::Tuple { items, .. } | Expr::Set { items, .. } => {
                self.visit_exprs(items)
            }
            Expr::Dict { items, .. } => {
                for (key, value) in items {
                    if let Some(key) = key {
                        self.visit_expr(key)?;
                    }
                    self.visit_expr(value)?;
                }
                Ok(())
            }
            Expr::ListCompr {
                elt, generators, ..
            }
            | Expr::SetCompr {
                elt, generators, ..
            }
            | Expr::GeneratorExpr {
                elt, generators, ..
            } => {
                self.visit_comprehensions(generators)?;
                self.visit_expr(elt)
            }
            Expr::DictCompr {
                key,
                value,
                generators,
                ..
            } => {
                self.visit_comprehensions(generators)?;
                self.visit_expr(key)?;
                self.visit_expr(value)
            }
            Expr::Lambda { params, body, .. } => {
                self.visit_param_exprs(params)?;
                self.in_child("lambda", ScopeKind::Lambda, |b| {
                    b.declare_params(params)?;
                    b.visit_expr(body)
                })?;
                Ok(())
            }
            Expr::UnaryExpr { operand, .. } => self.visit_expr(operand),
            Expr::BinExpr { lhs, rhs, .. } | Expr::BoolExpr { lhs, rhs, .. } => {
                self.visit_expr(lhs)?;
                self.visit_expr(rhs)
            }
            Expr::Compare {
                lhs, comparisons, ..
            } => {
                self.visit_expr(lhs)?;
                for (_, rhs) in comparisons {
                    self.visit_expr(rhs)?;
                }
                Ok(())
            }
            Expr::IfExpr {
                test, body, orelse, ..
            } => {
                self.visit_expr(test)?;
                self.visit_expr(body)?;
                self.visit_expr(orelse)
            }
            Expr::NamedExpr { target, value, .. } => {
                self.visit_expr(value)?;
                self.visit_target(target)
            }
            Expr::Yield { value, .. } => match value {
                Some(value) => self.visit_expr(value),
                None => Ok(()),
            },
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr { value, .. } => self.visit_expr(value),
            Stmt::Assign { targets, value, .. } => {
                self.visit_expr(value)?;
                for target in targets {
                    self.visit_target(target)?;
                }
                Ok(())
            }
            Stmt::AugAssign { target, value, .. } => {
                self.visit_expr(value)?;
                if let Expr::Name { span, .. } = target.as_ref() {
                    self.note(span.text(), Use::Reference)?;
                }
                self.visit_target(target)
            }
            Stmt::AnnAssign {
                target,
                annotation,
                value,
                ..
            } => {
                self.visit_expr(annotation)?;
                if let Some(value) = value {
                    self.visit_expr(value)?;
                }
                self.visit_target(target)
            }
            Stmt::Import { names, .. } | Stmt::ImportFrom { names, .. } => {
                for alias in names.iter().filter(|a| a.name != "*") {
                    self.note(alias.bound_name(), Use::Assign)?;
                }
                Ok(())
            }
            Stmt::FunctionDef(def) => {
                self.visit_exprs(&def.decorators)?;
                self.visit_param_exprs(&def.params)?;
                if let Some(returns) = &def.returns {
                    self.visit_expr(returns)?;
                }
                self.note(def.name.text(), Use::Assign)?;
                let child = self.in_child(def.name.text(), ScopeKind::Function, |b| {
                    b.declare_params(&def.params)?;
                    b.visit_stmts(&def.body)
                })?;
                self.table.function_scopes.insert(def.sidx, child);
                Ok(())
            }
            Stmt::ClassDef(def) => {
                self.visit_exprs(&def.decorators)?;
                self.visit_exprs(&def.bases)?;
                self.visit_keywords(&def.keywords)?;
                self.note(def.name.text(), Use::Assign)?;
                self.in_child(def.name.text(), ScopeKind::Class, |b| {
                    b.visit_stmts(&def.body)
                })?;
                Ok(())
            }
            Stmt::Return { value, .. } => match value {
                Some(value) => self.visit_expr(value),
                None => Ok(()),
            },
            Stmt::If {
                test, body, orelse, ..
            }
            | Stmt::While {
                test, body, orelse, ..
            } => {
                self.visit_expr(test)?;
                self.visit_stmts(body)?;
                self.visit_stmts(orelse)
            }
            Stmt::For {
                target,
                iter,
                body,
                orelse,
                ..
            } => {
                self.visit_expr(iter)?;
                self.visit_target(target)?;
                self.visit_stmts(body)?;
                self.visit_stmts(orelse)
            }
            Stmt::With { items, body, .. } => {
                for item in items {
                    self.visit_expr(&item.context)?;
                    if let Some(vars) = &item.vars {
                        self.visit_target(vars)?;
                    }
                }
                self.visit_stmts(body)
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            } => {
                self.visit_stmts(body)?;
                for handler in handlers {
                    if let Some(typ) = &handler.typ {
                        self.visit_expr(typ)?;
                    }
                    if let Some(name) = &handler.name {
                        self.note(name.text(), Use::Assign)?;
                    }
                    self.visit_stmts(&handler.body)?;
                }
                self.visit_stmts(orelse)?;
                self.visit_stmts(finalbody)
            }
            Stmt::Raise { exc, cause, .. } => {
                for e in [exc, cause].into_iter().flatten() {
                    self.visit_expr(e)?;
                }
                Ok(())
            }
            Stmt::Assert { test, msg, .. } => {
                self.visit_expr(test)?;
                match msg {
                    Some(msg) => self.visit_expr(msg),
                    None => Ok(()),
                }
            }
            Stmt::Delete { targets, .. } => {
                for target in targets {
                    self.visit_target(target)?;
                }
                Ok(())
            }
            Stmt::Global { names, .. } | Stmt::Nonlocal { names, .. } => {
                let binding = match stmt {
                    Stmt::Global { .. } => Binding::GlobalExplicit,
                    _ => Binding::Free,
                };
                for name in names {
                    self.note(name.text(), Use::Reference)?;
                    self.explicit
                        .insert((self.current, name.text().to_string()), binding);
                }
                Ok(())
            }
            Stmt::Pass { .. } | Stmt::Break { .. } | Stmt::Continue { .. } => Ok(()),
        }
    }

    // Whether `name` is bound in a function scope enclosing `scope`.
    // Class scopes are skipped; the search stops at the module.
    fn bound_in_enclosing_function(&self, scope: &Scope, name: &str) -> bool {
        let mut parent = scope.parent;
        while let Some(id) = parent {
            let Some(enclosing) = self.table.scope(id) else {
                break;
            };
            match enclosing.kind {
                ScopeKind::Module => break,
                ScopeKind::Class => (),
                ScopeKind::Function | ScopeKind::Lambda => {
                    match self.explicit.get(&(id, name.to_string())) {
                        Some(Binding::GlobalExplicit) => return false,
                        Some(_) => return true,
                        None => (),
                    }
                    if enclosing.lookup(name).is_some_and(|s| s.assigned) {
                        return true;
                    }
                }
            }
            parent = enclosing.parent;
        }
        false
    }

    fn resolve(&mut self) {
        let mut resolved = vec![];
        for scope in self.table.scopes.iter() {
            for symbol in scope.symbols.values() {
                let binding = match self.explicit.get(&(scope.id, symbol.name.clone())) {
                    Some(binding) => *binding,
                    None if scope.kind == ScopeKind::Module => {
                        if symbol.assigned {
                            Binding::Local
                        } else {
                            Binding::GlobalImplicit
                        }
                    }
                    None if symbol.assigned => Binding::Local,
                    None if self.bound_in_enclosing_function(scope, &symbol.name) => Binding::Free,
                    None => Binding::GlobalImplicit,
                };
                resolved.push((scope.id, symbol.name.clone(), binding));
            }
        }

        for (id, name, binding) in resolved {
            if let Some(symbol) = self
                .table
                .scopes
                .get_mut(id as usize)
                .and_then(|s| s.symbols.get_mut(&name))
            {
                symbol.binding = binding;
            }
        }
    }
}
