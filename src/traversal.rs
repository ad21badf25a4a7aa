// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;

use anyhow::Result;

#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Stmt(&'a Ref<Stmt>),
    Expr(&'a Ref<Expr>),
}

type Visit<'f> = dyn FnMut(Node<'_>) -> Result<bool> + 'f;

/// Visit every statement and expression of `stmts` in source order,
/// including function, class and lambda bodies. Children of a node are
/// skipped when `f` returns false for it.
pub fn traverse_stmts(stmts: &[Ref<Stmt>], f: &mut Visit<'_>) -> Result<()> {
    for stmt in stmts {
        traverse_stmt(stmt, f)?;
    }
    Ok(())
}

fn traverse_exprs(exprs: &[Ref<Expr>], f: &mut Visit<'_>) -> Result<()> {
    for expr in exprs {
        traverse_expr(expr, f)?;
    }
    Ok(())
}

fn traverse_opt(expr: &Option<Ref<Expr>>, f: &mut Visit<'_>) -> Result<()> {
    match expr {
        Some(expr) => traverse_expr(expr, f),
        None => Ok(()),
    }
}

fn traverse_params(params: &Parameters, f: &mut Visit<'_>) -> Result<()> {
    for p in params.iter() {
        traverse_opt(&p.annotation, f)?;
        traverse_opt(&p.default, f)?;
    }
    Ok(())
}

fn traverse_keywords(keywords: &[Keyword], f: &mut Visit<'_>) -> Result<()> {
    for k in keywords {
        traverse_expr(&k.value, f)?;
    }
    Ok(())
}

fn traverse_comprehensions(generators: &[Comprehension], f: &mut Visit<'_>) -> Result<()> {
    for g in generators {
        traverse_expr(&g.target, f)?;
        traverse_expr(&g.iter, f)?;
        traverse_exprs(&g.ifs, f)?;
    }
    Ok(())
}

pub fn traverse_stmt(stmt: &Ref<Stmt>, f: &mut Visit<'_>) -> Result<()> {
    if !f(Node::Stmt(stmt))? {
        return Ok(());
    }

    match stmt.as_ref() {
        Stmt::Expr { value, .. } => traverse_expr(value, f)?,
        Stmt::Assign { targets, value, .. } => {
            traverse_exprs(targets, f)?;
            traverse_expr(value, f)?;
        }
        Stmt::AugAssign { target, value, .. } => {
            traverse_expr(target, f)?;
            traverse_expr(value, f)?;
        }
        Stmt::AnnAssign {
            target,
            annotation,
            value,
            ..
        } => {
            traverse_expr(target, f)?;
            traverse_expr(annotation, f)?;
            traverse_opt(value, f)?;
        }
        Stmt::FunctionDef(def) => {
            traverse_exprs(&def.decorators, f)?;
            traverse_params(&def.params, f)?;
            traverse_opt(&def.returns, f)?;
            traverse_stmts(&def.body, f)?;
        }
        Stmt::ClassDef(def) => {
            traverse_exprs(&def.decorators, f)?;
            traverse_exprs(&def.bases, f)?;
            traverse_keywords(&def.keywords, f)?;
            traverse_stmts(&def.body, f)?;
        }
        Stmt::Return { value, .. } => traverse_opt(value, f)?,
        Stmt::If {
            test, body, orelse, ..
        }
        | Stmt::While {
            test, body, orelse, ..
        } => {
            traverse_expr(test, f)?;
            traverse_stmts(body, f)?;
            traverse_stmts(orelse, f)?;
        }
        Stmt::For {
            target,
            iter,
            body,
            orelse,
            ..
        } => {
            traverse_expr(target, f)?;
            traverse_expr(iter, f)?;
            traverse_stmts(body, f)?;
            traverse_stmts(orelse, f)?;
        }
        Stmt::With { items, body, .. } => {
            for item in items {
                traverse_expr(&item.context, f)?;
                traverse_opt(&item.vars, f)?;
            }
            traverse_stmts(body, f)?;
        }
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
            ..
        } => {
            traverse_stmts(body, f)?;
            for handler in handlers {
                traverse_opt(&handler.typ, f)?;
                traverse_stmts(&handler.body, f)?;
            }
            traverse_stmts(orelse, f)?;
            traverse_stmts(finalbody, f)?;
        }
        Stmt::Raise { exc, cause, .. } => {
            traverse_opt(exc, f)?;
            traverse_opt(cause, f)?;
        }
        Stmt::Assert { test, msg, .. } => {
            traverse_expr(test, f)?;
            traverse_opt(msg, f)?;
        }
        Stmt::Delete { targets, .. } => traverse_exprs(targets, f)?,
        Stmt::Import { .. }
        | Stmt::ImportFrom { .. }
        | Stmt::Global { .. }
        | Stmt::Nonlocal { .. }
        | Stmt::Pass { .. }
        | Stmt::Break { .. }
        | Stmt::Continue { .. } => (),
    }

    Ok(())
}

pub fn traverse_expr(expr: &Ref<Expr>, f: &mut Visit<'_>) -> Result<()> {
    if !f(Node::Expr(expr))? {
        return Ok(());
    }

    match expr.as_ref() {
        Expr::Name { .. } | Expr::Str { .. } | Expr::Number { .. } | Expr::Constant { .. } => (),

        Expr::Attribute { value, .. } | Expr::Starred { value, .. } | Expr::Await { value, .. } => {
            traverse_expr(value, f)?
        }

        Expr::Subscript { value, index, .. } => {
            traverse_expr(value, f)?;
            traverse_expr(index, f)?;
        }

        Expr::Slice {
            lower, upper, step, ..
        } => {
            traverse_opt(lower, f)?;
            traverse_opt(upper, f)?;
            traverse_opt(step, f)?;
        }

        Expr::Call {
            func,
            args,
            keywords,
            ..
        } => {
            traverse_expr(func, f)?;
            traverse_exprs(args, f)?;
            traverse_keywords(keywords, f)?;
        }

        Expr::List { items, .. } | Expr::Tuple { items, .. } | Expr::Set { items, .. } => {
            traverse_exprs(items, f)?
        }

        Expr::Dict { items, .. } => {
            for (key, value) in items {
                traverse_opt(key, f)?;
                traverse_expr(value, f)?;
            }
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
            traverse_expr(elt, f)?;
            traverse_comprehensions(generators, f)?;
        }

        Expr::DictCompr {
            key,
            value,
            generators,
            ..
        } => {
            traverse_expr(key, f)?;
            traverse_expr(value, f)?;
            traverse_comprehensions(generators, f)?;
        }

        Expr::Lambda { params, body, .. } => {
            traverse_params(params, f)?;
            traverse_expr(body, f)?;
        }

        Expr::UnaryExpr { operand, .. } => traverse_expr(operand, f)?,

        Expr::BinExpr { lhs, rhs, .. } | Expr::BoolExpr { lhs, rhs, .. } => {
            traverse_expr(lhs, f)?;
            traverse_expr(rhs, f)?;
        }

        Expr::Compare {
            lhs, comparisons, ..
        } => {
            traverse_expr(lhs, f)?;
            for (_, rhs) in comparisons {
                traverse_expr(rhs, f)?;
            }
        }

        Expr::IfExpr {
            test, body, orelse, ..
        } => {
            traverse_expr(test, f)?;
            traverse_expr(body, f)?;
            traverse_expr(orelse, f)?;
        }

        Expr::NamedExpr { target, value, .. } => {
            traverse_expr(target, f)?;
            traverse_expr(value, f)?;
        }

        Expr::Yield { value, .. } => traverse_opt(value, f)?,
    }

    Ok(())
}
