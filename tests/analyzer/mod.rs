// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use std::env;
use std::path::Path;

use anyhow::{bail, Result};
use clientcalls::*;
use walkdir::WalkDir;

// Each `<name>.py` fixture has a `<name>.json` sibling holding the expected
// client calls. Fixtures under an `app` directory are analyzed as
// applications.
fn check_fixture(path: &Path) -> Result<()> {
    let expected = std::fs::read_to_string(path.with_extension("json"))?;
    let expected: ClientCalls = serde_json::from_str(&expected)?;

    let application = path
        .parent()
        .and_then(|p| p.file_name())
        .is_some_and(|d| d == "app");
    let calls = Analyzer::new().analyze_file(path, application)?;
    if calls != expected {
        bail!(
            "{}: expected {} but found {}",
            path.display(),
            serde_json::to_string(&expected)?,
            serde_json::to_string(&calls)?
        );
    }
    Ok(())
}

#[test]
fn fixtures() -> Result<()> {
    let mut count = 0;
    for entry in WalkDir::new("tests/analyzer/fixtures")
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "py") {
            println!("analyzing {}", path.display());
            check_fixture(path)?;
            count += 1;
        }
    }
    assert!(count > 0, "no fixtures found");
    Ok(())
}

#[test]
#[ignore = "intended for analyzing a single python file"]
fn one_file() -> Result<()> {
    let mut file = String::default();
    let mut application = false;
    for a in env::args() {
        if a.ends_with(".py") {
            file = a;
        } else if a == "app" {
            application = true;
        }
    }

    if file.is_empty() {
        bail!("missing <file.py>");
    }

    let calls = Analyzer::new().analyze_file(&file, application)?;
    println!("{}", serde_json::to_string_pretty(&calls)?);
    Ok(())
}

#[test]
fn missing_file() {
    let err = Analyzer::new().analyze_file("tests/analyzer/fixtures/missing.py", false);
    assert!(err.is_err_and(|e| e.to_string().contains("Failed to read")));
}

#[test]
fn parse_errors_carry_location() {
    let err = get_client_calls("import boto3\nboto3.client('s3'\n").unwrap_err();
    assert!(err.to_string().contains("--> app.py:"), "{err}");
}

#[test]
fn config_from_json() -> Result<()> {
    let config = AnalyzerConfig::from_json_str(r#"{ "sdkModule": "aws" }"#)?;
    assert_eq!(config.client_factory, "client");

    let source = Source::from_contents(
        "main.py".to_string(),
        "import aws\naws.client('s3').list_buckets()\n".to_string(),
    )?;
    let calls = Analyzer::with_config(config).analyze(&source)?;
    assert!(calls["s3"].contains("list_buckets"));

    assert!(AnalyzerConfig::from_json_str(r#"{ "sdk": "aws" }"#).is_err());
    Ok(())
}

#[test]
fn type_serialization() -> Result<()> {
    let ty: Type = serde_json::from_str(r#"{"type": "serviceClient", "service": "s3"}"#)?;
    assert_eq!(ty, Type::service_client("s3"));
    assert_eq!(ty.to_string(), "ServiceClient(s3)");
    Ok(())
}
