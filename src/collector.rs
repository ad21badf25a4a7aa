// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::Module;
use crate::lookup::NodeTypes;
use crate::traversal::{traverse_stmts, Node};

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;

/// Service name to the names of the methods invoked on its clients.
pub type ClientCalls = BTreeMap<String, BTreeSet<String>>;

/// Harvests the call sites inference proved to invoke a service method.
///
/// Every node of the tree is visited, including bodies inference never
/// reached. The tree and the annotations are not modified, so collecting
/// twice yields the same result.
pub struct ApiCallCollector<'t> {
    types: &'t NodeTypes,
}

impl<'t> ApiCallCollector<'t> {
    pub fn new(types: &'t NodeTypes) -> Self {
        Self { types }
    }

    pub fn collect_api_calls(&self, module: &Module) -> Result<ClientCalls> {
        let mut calls = ClientCalls::new();
        traverse_stmts(&module.body, &mut |node| {
            let ty = match node {
                Node::Stmt(stmt) => self.types.stmt_of(stmt),
                Node::Expr(expr) => self.types.expr(expr),
            };
            if let Some((service, method)) = ty.and_then(|t| t.as_invocation()) {
                calls
                    .entry(service.to_string())
                    .or_default()
                    .insert(method.to_string());
            }
            Ok(true)
        })?;
        Ok(calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::inference::TypeInference;
    use crate::lexer::Source;
    use crate::parser::Parser;
    use crate::symtable::SymbolTable;

    #[test]
    fn collects_and_is_idempotent() {
        let code = "\
import boto3
s3 = boto3.client('s3')
s3.list_objects(Bucket='b')
if s3.head_bucket(Bucket='b'):
    boto3.client('sqs').send_message()
";
        let source = Source::from_contents("test.py".to_string(), code.to_string()).unwrap();
        let module = Parser::new(&source).unwrap().parse().unwrap();
        let table = SymbolTable::build(&module).unwrap();
        let mut inference = TypeInference::new(&table, &module, AnalyzerConfig::default());
        inference.bind_types(&module).unwrap();

        let collector = ApiCallCollector::new(inference.node_types());
        let first = collector.collect_api_calls(&module).unwrap();
        let second = collector.collect_api_calls(&module).unwrap();
        assert_eq!(first, second);

        let expected = ClientCalls::from([
            (
                "s3".to_string(),
                BTreeSet::from(["head_bucket".to_string(), "list_objects".to_string()]),
            ),
            (
                "sqs".to_string(),
                BTreeSet::from(["send_message".to_string()]),
            ),
        ]);
        assert_eq!(first, expected);
    }

    #[test]
    fn nothing_annotated() {
        let source =
            Source::from_contents("test.py".to_string(), "x = 1\n".to_string()).unwrap();
        let module = Parser::new(&source).unwrap().parse().unwrap();
        let types = NodeTypes::new(module.num_expressions, module.num_statements);
        let calls = ApiCallCollector::new(&types)
            .collect_api_calls(&module)
            .unwrap();
        assert!(calls.is_empty());
    }
}
