// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod analyzer;
mod ast;
mod collector;
mod config;
mod inference;
mod lexer;
mod lookup;
mod parser;
mod reachability;
mod scope;
mod symtable;
mod traversal;
mod types;

pub use analyzer::{get_client_calls, get_client_calls_for_app, Analyzer};
pub use collector::ClientCalls;
pub use config::AnalyzerConfig;
pub use lexer::Source;
pub use scope::ScopeError;
pub use types::Type;

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::ast::*;
    pub use crate::collector::ApiCallCollector;
    pub use crate::inference::TypeInference;
    pub use crate::lexer::*;
    pub use crate::lookup::*;
    pub use crate::parser::*;
    pub use crate::reachability::EntryPoints;
    pub use crate::scope::*;
    pub use crate::symtable::*;
    pub use crate::traversal::*;
}

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod tests;
