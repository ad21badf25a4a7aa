// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Lookup tables for associating data with AST nodes.
//!
//! Expressions and statements carry a per-module index (`eidx` / `sidx`)
//! assigned by the parser. A [`Lookup`] stores optional data in a slot per
//! index so that analyses can annotate the tree without mutating it.

use crate::ast::{Expr, Stmt};
use crate::types::Type;
use core::fmt;

/// Error indicating that a node index is out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupIndexError {
    pub node_idx: u32,
    pub nodes: usize,
}

impl fmt::Display for LookupIndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node_idx {} out of bounds (nodes={})",
            self.node_idx, self.nodes
        )
    }
}

impl std::error::Error for LookupIndexError {}

pub type LookupResult<T> = core::result::Result<T, LookupIndexError>;

/// Generic lookup table that stores data indexed by node index.
#[derive(Debug, Clone)]
pub struct Lookup<T: Clone> {
    slots: Vec<Option<T>>,
}

impl<T: Clone> Lookup<T> {
    /// Create a lookup table with a slot for each of `nodes` indices.
    pub fn with_len(nodes: u32) -> Self {
        Self {
            slots: vec![None; nodes as usize],
        }
    }

    /// Set data at the given index.
    pub fn set_checked(&mut self, node_idx: u32, value: T) -> LookupResult<()> {
        let n = self.validate_index(node_idx)?;
        self.slots[n] = Some(value);
        Ok(())
    }

    /// Returns Ok(None) if the entry is unset, Err if the index is out of range.
    pub fn get_checked(&self, node_idx: u32) -> LookupResult<Option<&T>> {
        let n = self.validate_index(node_idx)?;
        Ok(self.slots[n].as_ref())
    }

    /// Clear data at the given index.
    pub fn clear(&mut self, node_idx: u32) {
        if let Some(slot) = self.slots.get_mut(node_idx as usize) {
            *slot = None;
        }
    }

    fn validate_index(&self, node_idx: u32) -> LookupResult<usize> {
        let n = node_idx as usize;
        if n >= self.slots.len() {
            return Err(LookupIndexError {
                node_idx,
                nodes: self.slots.len(),
            });
        }
        Ok(n)
    }
}

/// Inferred types attached to the nodes of one module.
#[derive(Debug, Clone)]
pub struct NodeTypes {
    exprs: Lookup<Type>,
    stmts: Lookup<Type>,
}

impl NodeTypes {
    pub fn new(num_expressions: u32, num_statements: u32) -> Self {
        Self {
            exprs: Lookup::with_len(num_expressions),
            stmts: Lookup::with_len(num_statements),
        }
    }

    pub fn expr(&self, expr: &Expr) -> Option<&Type> {
        self.exprs.get_checked(expr.eidx()).ok().flatten()
    }

    /// Annotate an expression. `None` removes an earlier annotation.
    pub fn set_expr(&mut self, expr: &Expr, ty: Option<Type>) -> LookupResult<()> {
        match ty {
            Some(ty) => self.exprs.set_checked(expr.eidx(), ty),
            None => {
                self.exprs.get_checked(expr.eidx())?;
                self.exprs.clear(expr.eidx());
                Ok(())
            }
        }
    }

    pub fn stmt(&self, sidx: u32) -> Option<&Type> {
        self.stmts.get_checked(sidx).ok().flatten()
    }

    pub fn set_stmt(&mut self, sidx: u32, ty: Type) -> LookupResult<()> {
        self.stmts.set_checked(sidx, ty)
    }

    pub fn stmt_of(&self, stmt: &Stmt) -> Option<&Type> {
        self.stmt(stmt.sidx())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear() {
        let mut lookup = Lookup::with_len(3);
        assert_eq!(lookup.get_checked(1), Ok(None));
        lookup.set_checked(1, Type::ModuleHandle).unwrap();
        assert_eq!(lookup.get_checked(1), Ok(Some(&Type::ModuleHandle)));
        lookup.clear(1);
        assert_eq!(lookup.get_checked(1), Ok(None));
    }

    #[test]
    fn out_of_bounds() {
        let mut lookup: Lookup<Type> = Lookup::with_len(2);
        let err = lookup.set_checked(2, Type::ClientFactory).unwrap_err();
        assert_eq!(
            err,
            LookupIndexError {
                node_idx: 2,
                nodes: 2
            }
        );
        assert_eq!(err.to_string(), "node_idx 2 out of bounds (nodes=2)");
        assert!(lookup.get_checked(2).is_err());
    }

    #[test]
    fn clearing_an_expression_annotation() {
        let source = crate::lexer::Source::from_contents(
            "test.py".to_string(),
            "x\n".to_string(),
        )
        .unwrap();
        let module = crate::parser::Parser::new(&source)
            .unwrap()
            .parse()
            .unwrap();
        let expr = match module.body[0].as_ref() {
            Stmt::Expr { value, .. } => value.clone(),
            s => panic!("unexpected statement {s:?}"),
        };

        let mut types = NodeTypes::new(module.num_expressions, module.num_statements);
        types.set_expr(&expr, Some(Type::ModuleHandle)).unwrap();
        assert_eq!(types.expr(&expr), Some(&Type::ModuleHandle));
        types.set_expr(&expr, None).unwrap();
        assert_eq!(types.expr(&expr), None);

        types.set_stmt(0, Type::ClientFactory).unwrap();
        assert_eq!(types.stmt_of(&module.body[0]), Some(&Type::ClientFactory));
        assert!(types.set_stmt(module.num_statements, Type::ClientFactory).is_err());
    }
}
