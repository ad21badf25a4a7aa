// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{anyhow, bail, Result};
use clientcalls::unstable::*;
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

macro_rules! my_assert_eq {
    ($left:expr, $right:expr, $($arg:tt)+) => {
	match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
		    return Err(anyhow!("mismatch:\nleft  = {:?}\nright = {:?}\n{}",
		     		       &$left, &$right, format_args!($($arg)+)));
                }
            }
	}
    }
}

fn parse(code: &str) -> Result<Module> {
    let source = Source::from_contents("test.py".to_string(), code.to_string())?;
    Parser::new(&source)?.parse()
}

// Variant name of a node, taken from its debug representation.
fn kind<T: core::fmt::Debug>(node: &T) -> String {
    format!("{node:?}")
        .chars()
        .take_while(|c| c.is_alphanumeric())
        .collect()
}

fn stmt_kinds(stmts: &[Ref<Stmt>]) -> Vec<String> {
    stmts.iter().map(kind).collect()
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct Case {
    note: String,
    source: String,
    stmts: Option<Vec<String>>,
    error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Test {
    cases: Vec<Case>,
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {}", file);

    let yaml = std::fs::read_to_string(file)?;
    let test: Test = serde_yaml::from_str(&yaml)?;

    for case in &test.cases {
        print!("case {} ", &case.note);
        match parse(&case.source) {
            Ok(module) => {
                if case.error.is_some() {
                    bail!("parsing succeeded and did not produce any errors");
                }
                if let Some(expected) = &case.stmts {
                    my_assert_eq!(stmt_kinds(&module.body), *expected, "{}", case.note);
                }
            }
            Err(actual) => match &case.error {
                Some(expected) => {
                    let actual = actual.to_string();
                    if !actual.contains(expected) {
                        bail!(
                            "Error message\n`{}\n`\ndoes not contain `{}`",
                            actual,
                            expected
                        );
                    }
                }
                _ => return Err(actual),
            },
        }
        println!("passed");
    }

    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{e}");
        }
    }
}

#[test_resources("tests/parser/**/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}

fn first_expr(module: &Module) -> Result<&Ref<Expr>> {
    match module.body.first().map(|s| s.as_ref()) {
        Some(Stmt::Expr { value, .. }) => Ok(value),
        s => bail!("expected expression statement, found {s:?}"),
    }
}

#[test]
fn imports() -> Result<()> {
    let module = parse(
        "\
import a.b.c as d, e.f
from ..pkg.mod import (x as y, z,)
from . import w
from m import *
",
    )?;

    match module.body[0].as_ref() {
        Stmt::Import { names, .. } => {
            assert_eq!(names.len(), 2);
            assert_eq!(names[0].name, "a.b.c");
            assert_eq!(names[0].bound_name(), "d");
            assert_eq!(names[1].name, "e.f");
            assert_eq!(names[1].bound_name(), "e");
        }
        s => bail!("unexpected statement {s:?}"),
    }

    match module.body[1].as_ref() {
        Stmt::ImportFrom {
            module: m,
            level,
            names,
            ..
        } => {
            assert_eq!(m.as_deref(), Some("pkg.mod"));
            assert_eq!(*level, 2);
            assert_eq!(names.len(), 2);
            assert_eq!(names[0].bound_name(), "y");
            assert_eq!(names[1].bound_name(), "z");
        }
        s => bail!("unexpected statement {s:?}"),
    }

    match module.body[2].as_ref() {
        Stmt::ImportFrom {
            module: m, level, ..
        } => {
            assert!(m.is_none());
            assert_eq!(*level, 1);
        }
        s => bail!("unexpected statement {s:?}"),
    }

    match module.body[3].as_ref() {
        Stmt::ImportFrom { names, .. } => assert_eq!(names[0].name, "*"),
        s => bail!("unexpected statement {s:?}"),
    }
    Ok(())
}

#[test]
fn call_arguments() -> Result<()> {
    let module = parse("f(1, *rest, key=2, **options)\n")?;
    match first_expr(&module)?.as_ref() {
        Expr::Call { args, keywords, .. } => {
            assert_eq!(args.len(), 2);
            assert_eq!(kind(&args[1]), "Starred");
            assert_eq!(keywords.len(), 2);
            assert_eq!(keywords[0].arg.as_ref().map(|a| a.text()), Some("key"));
            assert!(keywords[1].arg.is_none());
        }
        e => bail!("unexpected expression {e:?}"),
    }
    Ok(())
}

#[test]
fn generator_argument() -> Result<()> {
    let module = parse("sum(x for x in items if x)\n")?;
    match first_expr(&module)?.as_ref() {
        Expr::Call { args, .. } => {
            assert_eq!(args.len(), 1);
            assert_eq!(kind(&args[0]), "GeneratorExpr");
        }
        e => bail!("unexpected expression {e:?}"),
    }
    Ok(())
}

#[test]
fn string_concatenation() -> Result<()> {
    let module = parse("'ab' \"cd\"\n")?;
    assert_eq!(first_expr(&module)?.string_literal(), Some("abcd"));

    let module = parse("f'{x}'\n")?;
    assert_eq!(first_expr(&module)?.string_literal(), None);

    let err = parse("b'a' 'b'\n").err().map(|e| e.to_string());
    assert!(err.is_some_and(|e| e.contains("cannot mix bytes and nonbytes literals")));
    Ok(())
}

#[test]
fn decorated_function() -> Result<()> {
    let module = parse(
        "\
@app.route('/', methods=['GET'])
@cached
async def index(a, b=1, /, c=2, *args, d, e=3, **kw) -> dict:
    return {}
",
    )?;
    match module.body[0].as_ref() {
        Stmt::FunctionDef(def) => {
            assert_eq!(def.name.text(), "index");
            assert!(def.is_async);
            assert_eq!(def.decorators.len(), 2);
            match def.decorators[0].as_ref() {
                Expr::Call { func, args, .. } => {
                    assert!(
                        matches!(func.as_ref(), Expr::Attribute { attr, .. } if attr.text() == "route")
                    );
                    assert_eq!(args.len(), 1);
                }
                e => bail!("unexpected decorator {e:?}"),
            }
            let names: Vec<&str> = def.params.args.iter().map(|p| p.name()).collect();
            assert_eq!(names, ["a", "b", "c"]);
            assert_eq!(def.params.vararg.as_ref().map(|p| p.name()), Some("args"));
            let kwonly: Vec<&str> = def.params.kwonly.iter().map(|p| p.name()).collect();
            assert_eq!(kwonly, ["d", "e"]);
            assert_eq!(def.params.kwarg.as_ref().map(|p| p.name()), Some("kw"));
            assert!(def.returns.is_some());
            assert_eq!(stmt_kinds(&def.body), ["Return"]);
        }
        s => bail!("unexpected statement {s:?}"),
    }
    Ok(())
}

#[test]
fn comparison_chain() -> Result<()> {
    let module = parse("a < b not in c is not d\n")?;
    match first_expr(&module)?.as_ref() {
        Expr::Compare { comparisons, .. } => {
            let ops: Vec<CmpOp> = comparisons.iter().map(|(op, _)| *op).collect();
            assert_eq!(ops, [CmpOp::Lt, CmpOp::NotIn, CmpOp::IsNot]);
        }
        e => bail!("unexpected expression {e:?}"),
    }
    Ok(())
}

#[test]
fn assignment_targets() -> Result<()> {
    let module = parse("a = b = c, d = 1, 2\n")?;
    match module.body[0].as_ref() {
        Stmt::Assign { targets, value, .. } => {
            assert_eq!(targets.len(), 3);
            assert_eq!(targets[0].name(), Some("a"));
            assert_eq!(kind(&targets[2]), "Tuple");
            assert_eq!(kind(value), "Tuple");
        }
        s => bail!("unexpected statement {s:?}"),
    }
    Ok(())
}

#[test]
fn indices_are_dense() -> Result<()> {
    let module = parse(
        "\
import boto3
def f(x=lambda y: y):
    return [boto3.client(n) for n in x]
",
    )?;

    let mut eidxs = vec![];
    let mut sidxs = vec![];
    traverse_stmts(&module.body, &mut |node| {
        match node {
            Node::Stmt(s) => sidxs.push(s.sidx()),
            Node::Expr(e) => eidxs.push(e.eidx()),
        }
        Ok(true)
    })?;
    eidxs.sort();
    sidxs.sort();
    assert_eq!(eidxs, (0..module.num_expressions).collect::<Vec<_>>());
    assert_eq!(sidxs, (0..module.num_statements).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn nesting_limit() -> Result<()> {
    let nested = |open: &str, close: &str, n: usize| {
        format!("x = {}1{}\n", open.repeat(n), close.repeat(n))
    };

    parse(&nested("(", ")", 20))?;
    parse(&nested("f(", ")", 20))?;

    for code in [
        nested("(", ")", 40),
        nested("[", "]", 40),
        nested("f(", ")", 40),
        nested("[*", "]", 40),
        nested("-", "", 1000),
        nested("not ", "", 1000),
        nested("2 ** ", "", 1000),
        nested("lambda: ", "", 1000),
    ] {
        let err = match parse(&code) {
            Ok(_) => bail!("parsing `{code}` succeeded"),
            Err(err) => err.to_string(),
        };
        if !err.contains("--> test.py:1:") || !err.contains("expression is nested too deeply") {
            bail!("unexpected error {err}");
        }
    }
    Ok(())
}
