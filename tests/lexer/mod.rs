// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::{bail, Result};
use clientcalls::unstable::*;
use serde::{Deserialize, Serialize};
use std::env;
use test_generator::test_resources;

fn get_tokens(source: &Source) -> Result<Vec<Token>> {
    let mut tokens = vec![];
    let mut lex = Lexer::new(source);
    loop {
        let tok = lex.next_token()?;
        tokens.push(tok.clone());
        if tok.0 == TokenKind::Eof {
            break;
        }
    }

    Ok(tokens)
}

// Layout tokens are shown by kind since they carry no meaningful text.
fn display(tok: &Token) -> String {
    match tok.0 {
        TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof => {
            format!("{:?}", tok.0)
        }
        _ => tok.1.text().to_string(),
    }
}

fn check_loc(tok: &Token) -> Result<()> {
    if matches!(
        tok.0,
        TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof
    ) {
        return Ok(());
    }

    let msg = tok.1.message("", "");
    let lines: Vec<&str> = msg.split('\n').collect();
    let source_line = lines[3];
    let caret_line = lines[4];
    let Some(caret) = caret_line.find('^') else {
        bail!("could not find caret for {tok:#?} {msg}");
    };

    // Both lines share the `N | ` prefix. Columns are counted in characters.
    let text = tok.1.text().split('\n').next().unwrap_or_default();
    let at_caret: String = source_line.chars().skip(caret).collect();
    assert!(
        at_caret.starts_with(text),
        "location mismatch for {tok:#?} {msg}\n{text}\n{at_caret}"
    );
    Ok(())
}

#[test]
#[ignore = "intended for lexing a single python file"]
fn one_file() -> Result<()> {
    let mut file = String::default();
    for a in env::args() {
        if a.ends_with(".py") {
            file = a.clone();
        }
    }

    if file.is_empty() {
        bail!("missing <file.py>")
    }

    let source = Source::from_file(&file)?;
    for tok in &get_tokens(&source)? {
        check_loc(tok)?;
        println!("{:?}", tok);
    }

    Ok(())
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
struct Case {
    pub note: String,
    pub source: String,
    pub tokens: Option<Vec<String>>,
    pub kinds: Option<Vec<String>>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Test {
    cases: Vec<Case>,
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {}", file);

    let yaml = std::fs::read_to_string(file)?;
    let test: Test = serde_yaml::from_str(&yaml)?;

    for case in &test.cases {
        let source = Source::from_contents("case.py".to_string(), case.source.clone())?;

        print!("case {} ", &case.note);

        match get_tokens(&source) {
            Ok(tokens) => {
                if case.error.is_some() {
                    bail!("lexing succeeded and did not produce any errors");
                }
                let texts: Vec<String> = tokens.iter().map(display).collect();
                if let Some(expected) = &case.tokens {
                    assert_eq!(&texts, expected, "token mismatch");
                }
                if let Some(expected) = &case.kinds {
                    let kinds: Vec<String> = tokens.iter().map(|t| format!("{:?}", t.0)).collect();
                    assert_eq!(&kinds, expected, "token kind mismatch");
                }
                for tok in &tokens {
                    check_loc(tok)?;
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
    println!("{} cases passed.", test.cases.len());
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

#[test_resources("tests/lexer/**/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
