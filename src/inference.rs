// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Abstract interpretation of a module over the [`Type`] lattice.
//!
//! Types flow through assignments, attribute access, calls and returns.
//! Functions are analyzed lazily: a definition is only registered against
//! its name, and its body is walked when a call to it is encountered, with
//! the types of the call's positional arguments mapped onto the parameters.
//! Analysis is not flow sensitive. The last write to a name wins.

use crate::ast::*;
use crate::config::AnalyzerConfig;
use crate::lookup::NodeTypes;
use crate::scope::{Namespace, ScopeTable};
use crate::symtable::SymbolTable;
use crate::types::Type;

use anyhow::Result;
use tracing::{debug, trace};

pub struct TypeInference<'a> {
    config: AnalyzerConfig,
    scopes: ScopeTable<'a>,
    types: NodeTypes,
    ns: Namespace,
    // Function whose body is being walked, receives the types of returns.
    current_function: Option<Ref<FunctionDef>>,
    // Functions being analyzed, innermost last.
    active: Vec<Ref<FunctionDef>>,
}

impl<'a> TypeInference<'a> {
    pub fn new(table: &'a SymbolTable, module: &Module, config: AnalyzerConfig) -> Self {
        Self {
            config,
            scopes: ScopeTable::new(table),
            types: NodeTypes::new(module.num_expressions, module.num_statements),
            ns: Namespace::module(),
            current_function: None,
            active: vec![],
        }
    }

    /// Run inference over the module body.
    pub fn bind_types(&mut self, module: &Module) -> Result<()> {
        self.ns = Namespace::module();
        self.current_function = None;
        self.visit_stmts(&module.body)
    }

    pub fn node_types(&self) -> &NodeTypes {
        &self.types
    }

    pub fn scopes(&self) -> &ScopeTable<'a> {
        &self.scopes
    }

    fn type_of(&self, expr: &Expr) -> Option<Type> {
        self.types.expr(expr).cloned()
    }

    fn annotate(&mut self, expr: &Expr, ty: Option<Type>) -> Result<()> {
        Ok(self.types.set_expr(expr, ty)?)
    }

    fn bind(&mut self, name: &str, ty: Option<Type>) -> Result<()> {
        match &ty {
            Some(ty) => trace!("`{name}` : {ty}"),
            None => trace!("`{name}` : none"),
        }
        self.scopes.set_inferred_type(self.ns, name, ty)
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

    fn visit_opt_expr(&mut self, expr: &Option<Ref<Expr>>) -> Result<()> {
        match expr {
            Some(expr) => self.visit_expr(expr),
            None => Ok(()),
        }
    }

    fn visit_keywords(&mut self, keywords: &[Keyword]) -> Result<()> {
        for k in keywords {
            self.visit_expr(&k.value)?;
        }
        Ok(())
    }

    fn visit_comprehensions(&mut self, generators: &[Comprehension]) -> Result<()> {
        for g in generators {
            self.visit_expr(&g.target)?;
            self.visit_expr(&g.iter)?;
            self.visit_exprs(&g.ifs)?;
        }
        Ok(())
    }

    fn visit_assignment(&mut self, targets: &[Ref<Expr>], value: &Expr) -> Result<()> {
        self.visit_exprs(targets)?;
        self.visit_expr(value)?;

        let mut ty = self.type_of(value);
        if ty.is_none() {
            if let Some(literal) = value.string_literal() {
                let literal = Type::string_literal(literal);
                self.annotate(value, Some(literal.clone()))?;
                ty = Some(literal);
            }
        }

        for target in targets {
            if let Expr::Name { span, .. } = target.as_ref() {
                self.bind(span.text(), ty.clone())?;
                self.annotate(target, ty.clone())?;
            }
        }
        Ok(())
    }

    fn visit_import(&mut self, stmt: &Stmt) -> Result<()> {
        let sdk = self.config.sdk_module.clone();
        let factory = self.config.client_factory.clone();
        match stmt {
            Stmt::Import { names, .. } => {
                for alias in names.iter().filter(|a| a.name == sdk) {
                    self.bind(alias.bound_name(), Some(Type::ModuleHandle))?;
                }
            }
            Stmt::ImportFrom {
                module: Some(module),
                level: 0,
                names,
                ..
            } if *module == sdk => {
                for alias in names.iter().filter(|a| a.name == factory) {
                    self.bind(alias.bound_name(), Some(Type::ClientFactory))?;
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr { value, .. } => self.visit_expr(value),
            Stmt::Assign { targets, value, .. } => self.visit_assignment(targets, value),
            Stmt::AnnAssign {
                target,
                annotation,
                value,
                ..
            } => match value {
                Some(value) => {
                    self.visit_expr(annotation)?;
                    self.visit_assignment(core::slice::from_ref(target), value)
                }
                None => {
                    self.visit_expr(target)?;
                    self.visit_expr(annotation)
                }
            },
            Stmt::AugAssign { target, value, .. } => {
                self.visit_expr(target)?;
                self.visit_expr(value)
            }
            Stmt::Import { .. } | Stmt::ImportFrom { .. } => self.visit_import(stmt),
            Stmt::FunctionDef(def) => {
                // Analyzed when called.
                self.scopes
                    .register_definition(self.ns, def.name.text(), def.clone())
            }
            // Class bodies are not analyzed.
            Stmt::ClassDef(_) => Ok(()),
            Stmt::Return { value, sidx, .. } => {
                let Some(value) = value else {
                    return Ok(());
                };
                self.visit_expr(value)?;
                if let Some(ty) = self.type_of(value) {
                    self.types.set_stmt(*sidx, ty.clone())?;
                    if let Some(def) = &self.current_function {
                        self.types.set_stmt(def.sidx, Type::function(ty))?;
                    }
                }
                Ok(())
            }
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
                self.visit_expr(target)?;
                self.visit_expr(iter)?;
                self.visit_stmts(body)?;
                self.visit_stmts(orelse)
            }
            Stmt::With { items, body, .. } => {
                for item in items {
                    self.visit_expr(&item.context)?;
                    self.visit_opt_expr(&item.vars)?;
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
                    self.visit_opt_expr(&handler.typ)?;
                    self.visit_stmts(&handler.body)?;
                }
                self.visit_stmts(orelse)?;
                self.visit_stmts(finalbody)
            }
            Stmt::Raise { exc, cause, .. } => {
                self.visit_opt_expr(exc)?;
                self.visit_opt_expr(cause)
            }
            Stmt::Assert { test, msg, .. } => {
                self.visit_expr(test)?;
                self.visit_opt_expr(msg)
            }
            Stmt::Delete { targets, .. } => self.visit_exprs(targets),
            Stmt::Global { .. }
            | Stmt::Nonlocal { .. }
            | Stmt::Pass { .. }
            | Stmt::Break { .. }
            | Stmt::Continue { .. } => Ok(()),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Name { span, .. } => {
                let ty = self
                    .scopes
                    .get_inferred_type(self.ns, span.text())?
                    .cloned();
                self.annotate(expr, ty)
            }
            Expr::Attribute { value, attr, .. } => {
                self.visit_expr(value)?;
                let ty = match self.type_of(value) {
                    Some(Type::ModuleHandle) if attr.text() == self.config.client_factory => {
                        Some(Type::ClientFactory)
                    }
                    Some(Type::ServiceClient { service }) => {
                        Some(Type::method_ref(&service, attr.text()))
                    }
                    _ => None,
                };
                match ty {
                    Some(ty) => self.annotate(expr, Some(ty)),
                    None => Ok(()),
                }
            }
            Expr::Call {
                func,
                args,
                keywords,
                ..
            } => {
                self.visit_expr(func)?;
                self.visit_exprs(args)?;
                self.visit_keywords(keywords)?;
                match self.infer_call(func, args, keywords)? {
                    Some(ty) => self.annotate(expr, Some(ty)),
                    None => Ok(()),
                }
            }
            // Lambda bodies are not analyzed.
            Expr::Lambda { .. } => Ok(()),
            Expr::Str { .. } | Expr::Number { .. } | Expr::Constant { .. } => Ok(()),
            Expr::Subscript { value, index, .. } => {
                self.visit_expr(value)?;
                self.visit_expr(index)
            }
            Expr::Slice {
                lower, upper, step, ..
            } => {
                self.visit_opt_expr(lower)?;
                self.visit_opt_expr(upper)?;
                self.visit_opt_expr(step)
            }
            Expr::Starred { value, .. } | Expr::Await { value, .. } => self.visit_expr(value),
            Expr::List { items, .. } | Expr::Tuple { items, .. } | Expr::Set { items, .. } => {
                self.visit_exprs(items)
            }
            Expr::Dict { items, .. } => {
                for (key, value) in items {
                    self.visit_opt_expr(key)?;
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
                self.visit_expr(elt)?;
                self.visit_comprehensions(generators)
            }
            Expr::DictCompr {
                key,
                value,
                generators,
                ..
            } => {
                self.visit_expr(key)?;
                self.visit_expr(value)?;
                self.visit_comprehensions(generators)
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
                self.visit_expr(target)?;
                self.visit_expr(value)
            }
            Expr::Yield { value, .. } => self.visit_opt_expr(value),
        }
    }

    // Service name passed to the client factory: the first positional
    // argument or, without positional arguments, the `service_name` keyword.
    fn service_name(&self, args: &[Ref<Expr>], keywords: &[Keyword]) -> Option<String> {
        let arg = match args.first() {
            Some(arg) => arg,
            None => {
                &keywords
                    .iter()
                    .find(|k| k.arg.as_ref().is_some_and(|a| a.text() == "service_name"))?
                    .value
            }
        };

        if let Some(literal) = arg.string_literal() {
            return Some(literal.to_string());
        }
        self.type_of(arg)?.as_string_literal().map(str::to_string)
    }

    fn infer_call(
        &mut self,
        func: &Expr,
        args: &[Ref<Expr>],
        keywords: &[Keyword],
    ) -> Result<Option<Type>> {
        Ok(match self.type_of(func) {
            Some(Type::ClientFactory) => self
                .service_name(args, keywords)
                .map(|service| Type::service_client(&service)),
            Some(Type::ServiceMethodRef { service, method }) => {
                Some(Type::invocation(&service, &method))
            }
            Some(Type::FunctionSignature { returns }) => Some(*returns),
            _ => match func {
                Expr::Name { span, .. } if self.scopes.has_definition(self.ns, span.text()) => {
                    self.infer_function_call(span.text(), args)?
                }
                _ => None,
            },
        })
    }

    // Analyze a user defined function at a call site and return the type
    // of calling it.
    fn infer_function_call(&mut self, name: &str, args: &[Ref<Expr>]) -> Result<Option<Type>> {
        let def = self.scopes.lookup_definition(self.ns, name)?;
        let callee_ns = self.scopes.definition_scope(self.ns, &def)?;

        if self.config.recursion_guard && self.active.contains(&def) {
            debug!("recursive call to `{name}` is not analyzed");
            return Ok(None);
        }

        // Only positional arguments with a known type are mapped.
        for (arg, param) in args.iter().zip(def.params.args.iter()) {
            if let Some(ty) = self.type_of(arg) {
                trace!("`{name}` parameter `{}` : {ty}", param.name());
                self.scopes
                    .set_inferred_type(callee_ns, param.name(), Some(ty))?;
            }
        }

        debug!("analyzing call to `{name}`");
        let saved_ns = self.ns;
        let saved_function = self.current_function.replace(def.clone());
        self.ns = callee_ns;
        self.active.push(def.clone());

        let result = self.visit_stmts(&def.body);

        self.active.pop();
        self.ns = saved_ns;
        self.current_function = saved_function;
        result?;

        let function_type = self.types.stmt(def.sidx).cloned();
        self.bind(name, function_type.clone())?;
        Ok(match function_type {
            Some(Type::FunctionSignature { returns }) => Some(*returns),
            _ => None,
        })
    }
}
