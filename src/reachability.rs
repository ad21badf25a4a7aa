// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Makes framework request handlers reachable.
//!
//! A function decorated with `@<anything>.route(<arg>, ...)` is assumed to be
//! invoked by the framework. A synthetic `handler()` call statement is
//! inserted right after each such definition so that inference analyzes its
//! body. Statement lists of compound statements and class bodies are
//! transformed as well; function bodies are not.

use crate::ast::*;

use tracing::debug;

pub struct EntryPoints<'c> {
    route_method: &'c str,
    num_expressions: u32,
    num_statements: u32,
}

impl<'c> EntryPoints<'c> {
    pub fn new(route_method: &'c str) -> Self {
        Self {
            route_method,
            num_expressions: 0,
            num_statements: 0,
        }
    }

    /// Return a copy of `module` with entry points invoked. Synthetic nodes
    /// are numbered after the nodes of `module`.
    pub fn transform(&mut self, module: &Module) -> Module {
        self.num_expressions = module.num_expressions;
        self.num_statements = module.num_statements;
        let body = self.transform_stmts(&module.body);
        Module {
            source: module.source.clone(),
            body,
            num_expressions: self.num_expressions,
            num_statements: self.num_statements,
        }
    }

    pub fn is_entry_point(&self, def: &FunctionDef) -> bool {
        def.decorators.iter().any(|d| match d.as_ref() {
            Expr::Call { func, args, .. } => {
                matches!(func.as_ref(), Expr::Attribute { attr, .. } if attr.text() == self.route_method)
                    && !args.is_empty()
            }
            _ => false,
        })
    }

    fn auto_invoke(&mut self, def: &FunctionDef) -> Ref<Stmt> {
        let span = def.name.clone();
        let func = Expr::Name {
            span: span.clone(),
            eidx: self.num_expressions,
        };
        let call = Expr::Call {
            span: span.clone(),
            func: Ref::new(func),
            args: vec![],
            keywords: vec![],
            eidx: self.num_expressions + 1,
        };
        self.num_expressions += 2;

        let stmt = Stmt::Expr {
            span,
            value: Ref::new(call),
            sidx: self.num_statements,
        };
        self.num_statements += 1;
        Ref::new(stmt)
    }

    fn transform_stmts(&mut self, stmts: &[Ref<Stmt>]) -> Vec<Ref<Stmt>> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            out.push(self.transform_stmt(stmt));
            if let Stmt::FunctionDef(def) = stmt.as_ref() {
                if self.is_entry_point(def) {
                    debug!("invoking entry point `{}`", def.name.text());
                    out.push(self.auto_invoke(def));
                }
            }
        }
        out
    }

    fn transform_stmt(&mut self, stmt: &Ref<Stmt>) -> Ref<Stmt> {
        let transformed = match stmt.as_ref() {
            Stmt::If {
                span,
                test,
                body,
                orelse,
                sidx,
            } => Stmt::If {
                span: span.clone(),
                test: test.clone(),
                body: self.transform_stmts(body),
                orelse: self.transform_stmts(orelse),
                sidx: *sidx,
            },
            Stmt::While {
                span,
                test,
                body,
                orelse,
                sidx,
            } => Stmt::While {
                span: span.clone(),
                test: test.clone(),
                body: self.transform_stmts(body),
                orelse: self.transform_stmts(orelse),
                sidx: *sidx,
            },
            Stmt::For {
                span,
                target,
                iter,
                body,
                orelse,
                is_async,
                sidx,
            } => Stmt::For {
                span: span.clone(),
                target: target.clone(),
                iter: iter.clone(),
                body: self.transform_stmts(body),
                orelse: self.transform_stmts(orelse),
                is_async: *is_async,
                sidx: *sidx,
            },
            Stmt::With {
                span,
                items,
                body,
                is_async,
                sidx,
            } => Stmt::With {
                span: span.clone(),
                items: items.clone(),
                body: self.transform_stmts(body),
                is_async: *is_async,
                sidx: *sidx,
            },
            Stmt::Try {
                span,
                body,
                handlers,
                orelse,
                finalbody,
                sidx,
            } => Stmt::Try {
                span: span.clone(),
                body: self.transform_stmts(body),
                handlers: handlers
                    .iter()
                    .map(|h| ExceptHandler {
                        span: h.span.clone(),
                        typ: h.typ.clone(),
                        name: h.name.clone(),
                        body: self.transform_stmts(&h.body),
                    })
                    .collect(),
                orelse: self.transform_stmts(orelse),
                finalbody: self.transform_stmts(finalbody),
                sidx: *sidx,
            },
            Stmt::ClassDef(def) => Stmt::ClassDef(Ref::new(ClassDef {
                span: def.span.clone(),
                name: def.name.clone(),
                bases: def.bases.clone(),
                keywords: def.keywords.clone(),
                decorators: def.decorators.clone(),
                body: self.transform_stmts(&def.body),
                sidx: def.sidx,
            })),
            // Function bodies and simple statements are kept as is.
            _ => return stmt.clone(),
        };
        Ref::new(transformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Source;
    use crate::parser::Parser;

    fn transform(code: &str) -> (Module, Module) {
        let source = Source::from_contents("app.py".to_string(), code.to_string()).unwrap();
        let module = Parser::new(&source).unwrap().parse().unwrap();
        let transformed = EntryPoints::new("route").transform(&module);
        (module, transformed)
    }

    fn invoked(stmt: &Stmt) -> Option<String> {
        match stmt {
            Stmt::Expr { value, .. } => match value.as_ref() {
                Expr::Call { func, args, .. } if args.is_empty() => {
                    func.name().map(str::to_string)
                }
                _ => None,
            },
            _ => None,
        }
    }

    #[test]
    fn inserts_call_after_view() {
        let code = "\
app = Chalice(app_name='x')
@app.route('/')
def index():
    pass
@app.schedule('rate(1 hour)')
def job(event):
    pass
";
        let (module, transformed) = transform(code);
        assert_eq!(module.body.len(), 3);
        assert_eq!(transformed.body.len(), 4);
        assert_eq!(invoked(&transformed.body[2]).as_deref(), Some("index"));
        assert!(transformed.body[1] == module.body[1]);

        assert_eq!(transformed.num_statements, module.num_statements + 1);
        assert_eq!(transformed.num_expressions, module.num_expressions + 2);
        match transformed.body[2].as_ref() {
            Stmt::Expr { value, sidx, .. } => {
                assert_eq!(*sidx, module.num_statements);
                assert!(value.eidx() >= module.num_expressions);
            }
            s => panic!("unexpected statement {s:?}"),
        }
    }

    #[test]
    fn route_requires_positional_argument() {
        let code = "\
@app.route()
def a():
    pass
@route('/')
def b():
    pass
@app.route(path='/')
def c():
    pass
";
        let (module, transformed) = transform(code);
        assert_eq!(module.body.len(), transformed.body.len());
    }

    #[test]
    fn nested_statement_lists() {
        let code = "\
if debug:
    @app.route('/debug')
    def debug_view():
        pass
class Views:
    @app.route('/c')
    def view(self):
        pass
def outer():
    @app.route('/inner')
    def inner():
        pass
";
        let (_, transformed) = transform(code);
        match transformed.body[0].as_ref() {
            Stmt::If { body, .. } => {
                assert_eq!(body.len(), 2);
                assert_eq!(invoked(&body[1]).as_deref(), Some("debug_view"));
            }
            s => panic!("unexpected statement {s:?}"),
        }
        match transformed.body[1].as_ref() {
            Stmt::ClassDef(def) => assert_eq!(def.body.len(), 2),
            s => panic!("unexpected statement {s:?}"),
        }
        match transformed.body[2].as_ref() {
            Stmt::FunctionDef(def) => assert_eq!(def.body.len(), 1),
            s => panic!("unexpected statement {s:?}"),
        }
    }
}
