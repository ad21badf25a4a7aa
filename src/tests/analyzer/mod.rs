// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::print_stderr
)] // test harness asserts and unwraps to validate analyzer behavior

use std::collections::BTreeMap;
use std::env;

use crate::test_utils::{check_output, check_value};
use crate::*;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    source: String,
    // Analyze as a framework application.
    #[serde(default)]
    app: bool,
    config: Option<AnalyzerConfig>,
    want_result: Option<ClientCalls>,
    // Types known in the module scope, or in `types_scope`.
    want_types: Option<BTreeMap<String, Type>>,
    types_scope: Option<String>,
    error: Option<String>,
    skip: Option<bool>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn analyze(case: &TestCase, analyzer: &Analyzer) -> Result<ClientCalls> {
    let source = Source::from_contents("app.py".to_string(), case.source.clone())?;
    let calls = if case.app {
        analyzer.analyze_application(&source)?
    } else {
        analyzer.analyze(&source)?
    };

    if let Some(want_types) = &case.want_types {
        let types = analyzer.known_types(&source, case.types_scope.as_deref())?;
        check_value(&types, want_types)?;
    }
    Ok(calls)
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    std::println!("running {file}");

    for case in test.cases {
        std::print!("case {} ", case.note);
        if case.skip == Some(true) {
            std::println!("skipped");
            continue;
        }

        match (&case.want_result, &case.error) {
            (Some(_), None) | (None, Some(_)) => (),
            _ => panic!("either want_result or error must be specified in test case."),
        }

        let analyzer = Analyzer::with_config(case.config.clone().unwrap_or_default());

        match analyze(&case, &analyzer) {
            Ok(calls) => match &case.want_result {
                Some(want_result) => {
                    check_output(&calls, want_result)?;

                    // Convenience entry points agree with the analyzer on
                    // default settings.
                    if case.config.is_none() {
                        let convenience = if case.app {
                            get_client_calls_for_app(&case.source)?
                        } else {
                            get_client_calls(&case.source)?
                        };
                        check_output(&convenience, want_result)?;
                    }
                }
                _ => bail!("analysis succeeded and did not produce any errors"),
            },
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
                    std::println!("{actual}");
                }
                _ => return Err(actual),
            },
        }

        std::println!("passed");
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

#[test]
fn yaml_test_basic() -> Result<()> {
    yaml_test("tests/analyzer/cases/basic.yaml")
}

#[test]
#[ignore = "intended for running a single case file"]
fn one_yaml() -> Result<()> {
    let mut file = String::default();

    for a in env::args() {
        if a.ends_with(".yaml") {
            file = a;
        }
    }

    if file.is_empty() {
        bail!("missing <yaml-file>");
    }

    yaml_test(file.as_str())
}

#[test_resources("tests/analyzer/cases/**/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}

#[test]
fn analyzer_is_reusable() -> Result<()> {
    let analyzer = Analyzer::new();
    let code = "import boto3\nboto3.client('s3').list_buckets()\n";
    let source = Source::from_contents("a.py".to_string(), code.to_string())?;
    let first = analyzer.analyze(&source)?;
    let second = analyzer.analyze(&source)?;
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    Ok(())
}
