// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Settings of an [`Analyzer`](crate::Analyzer).
///
/// Missing fields take their default value, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Top-level module of the tracked SDK.
    pub sdk_module: String,

    /// Attribute of the SDK module that constructs service clients.
    pub client_factory: String,

    /// Decorator attribute marking framework entry points in application mode.
    pub route_method: String,

    /// Re-entrant analysis of a function already being analyzed yields no
    /// type instead of recursing. Disabling it makes recursive programs
    /// loop forever.
    pub recursion_guard: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sdk_module: "boto3".to_string(),
            client_factory: "client".to_string(),
            route_method: "route".to_string(),
            recursion_guard: true,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid analyzer configuration")
    }

    pub fn to_json_str(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
