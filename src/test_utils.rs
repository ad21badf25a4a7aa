// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::pattern_type_mismatch)]

//! Shared helpers for YAML-driven tests.

use crate::ClientCalls;
use anyhow::{bail, Result};
use serde::Serialize;

fn pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Compare two serializable results and show a diff on mismatch.
pub fn check_value<T: Serialize + PartialEq>(computed: &T, expected: &T) -> Result<()> {
    if computed != expected {
        let computed = pretty(computed)?;
        let expected = pretty(expected)?;
        std::println!(
            "mismatch:\n{}",
            prettydiff::diff_chars(&expected, &computed)
        );
        bail!("expected\n{expected}\nbut computed\n{computed}");
    }
    Ok(())
}

pub fn check_output(computed: &ClientCalls, expected: &ClientCalls) -> Result<()> {
    check_value(computed, expected)
}
