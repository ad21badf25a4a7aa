// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::collector::*;
use crate::config::AnalyzerConfig;
use crate::inference::TypeInference;
use crate::lexer::*;
use crate::parser::*;
use crate::reachability::EntryPoints;
use crate::scope::Namespace;
use crate::symtable::SymbolTable;
use crate::types::Type;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use tracing::debug;

/// Infers the service client calls made by Python source code.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Service to methods mapping of every call site proven to invoke a
    /// service method.
    ///
    /// ```
    /// use clientcalls::*;
    ///
    /// let source = Source::from_contents(
    ///     "app.py".to_string(),
    ///     "import boto3\nboto3.client('s3').list_objects()\n".to_string(),
    /// )?;
    /// let calls = Analyzer::new().analyze(&source)?;
    /// assert!(calls["s3"].contains("list_objects"));
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn analyze(&self, source: &Source) -> Result<ClientCalls> {
        let module = Parser::new(source)?.parse()?;
        self.run(&module)
    }

    /// Like [`Analyzer::analyze`] but assumes that the framework invokes
    /// every function decorated as a route.
    pub fn analyze_application(&self, source: &Source) -> Result<ClientCalls> {
        let module = Parser::new(source)?.parse()?;
        let module = EntryPoints::new(&self.config.route_method).transform(&module);
        self.run(&module)
    }

    pub fn analyze_file<P: AsRef<Path>>(&self, path: P, application: bool) -> Result<ClientCalls> {
        let source = Source::from_file(path)?;
        if application {
            self.analyze_application(&source)
        } else {
            self.analyze(&source)
        }
    }

    /// Types inferred for the locally bound names of the module, or of the
    /// named child scope of the module.
    pub fn known_types(
        &self,
        source: &Source,
        scope: Option<&str>,
    ) -> Result<BTreeMap<String, Type>> {
        let module = Parser::new(source)?.parse()?;
        let table = SymbolTable::build(&module)?;
        let inference = self.infer(&table, &module)?;

        let mut ns = Namespace::module();
        if let Some(scope) = scope {
            ns = inference.scopes().lookup_child_scope(ns, scope)?;
        }
        inference.scopes().known_types(ns)
    }

    fn infer<'a>(&self, table: &'a SymbolTable, module: &Module) -> Result<TypeInference<'a>> {
        let mut inference = TypeInference::new(table, module, self.config.clone());
        inference.bind_types(module)?;
        Ok(inference)
    }

    fn run(&self, module: &Module) -> Result<ClientCalls> {
        let table = SymbolTable::build(module)?;
        let inference = self.infer(&table, module)?;
        let calls = ApiCallCollector::new(inference.node_types()).collect_api_calls(module)?;
        debug!(
            "{}: {} service(s) called",
            module.source.file(),
            calls.len()
        );
        Ok(calls)
    }
}

/// Client calls made by `code`, analyzed with the default configuration.
pub fn get_client_calls(code: &str) -> Result<ClientCalls> {
    let source = Source::from_contents("app.py".to_string(), code.to_string())?;
    Analyzer::new().analyze(&source)
}

/// Client calls made by the application `code`, including the calls made
/// by its route handlers.
pub fn get_client_calls_for_app(code: &str) -> Result<ClientCalls> {
    let source = Source::from_contents("app.py".to_string(), code.to_string())?;
    Analyzer::new().analyze_application(&source)
}
