// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use clientcalls::{unstable, Analyzer, AnalyzerConfig, ClientCalls};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn read_config(file: Option<String>) -> Result<AnalyzerConfig> {
    let Some(file) = file else {
        return Ok(AnalyzerConfig::default());
    };
    let contents =
        std::fs::read_to_string(&file).with_context(|| format!("Failed to read {file}"))?;
    if file.ends_with(".yaml") || file.ends_with(".yml") {
        Ok(serde_yaml::from_str(&contents)?)
    } else if file.ends_with(".json") {
        AnalyzerConfig::from_json_str(&contents)
    } else {
        bail!("Unsupported config file `{file}`. Must be json or yaml.")
    }
}

fn python_files(path: &str) -> Result<Vec<String>> {
    if !Path::new(path).is_dir() {
        return Ok(vec![path.to_string()]);
    }

    let mut files = vec![];
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "py") {
            files.push(entry.path().display().to_string());
        }
    }
    Ok(files)
}

fn analyze(paths: &[String], app: bool, config: Option<String>) -> Result<()> {
    let analyzer = Analyzer::with_config(read_config(config)?);

    // Merge the calls of all the files.
    let mut calls = ClientCalls::new();
    for path in paths {
        for file in python_files(path)? {
            for (service, methods) in analyzer.analyze_file(&file, app)? {
                calls.entry(service).or_default().extend(methods);
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&calls)?);
    Ok(())
}

fn types(file: String, scope: Option<String>, config: Option<String>) -> Result<()> {
    let analyzer = Analyzer::with_config(read_config(config)?);
    let source = unstable::Source::from_file(&file)?;
    let types = analyzer.known_types(&source, scope.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&types)?);
    Ok(())
}

fn lex(file: String, verbose: bool) -> Result<()> {
    let source = unstable::Source::from_file(&file)?;

    // Create lexer.
    let mut lexer = unstable::Lexer::new(&source);

    // Read tokens until EOF.
    loop {
        let token = lexer.next_token()?;
        if token.0 == unstable::TokenKind::Eof {
            break;
        }

        if verbose {
            // Print each token's line and mark with with ^.
            println!("{}", token.1.message("", ""));
        }

        // Print the token.
        println!("{token:?}");
    }
    Ok(())
}

fn parse(file: String) -> Result<()> {
    let source = unstable::Source::from_file(&file)?;

    // Create a parser and parse the source.
    let mut parser = unstable::Parser::new(&source)?;
    let ast = parser.parse()?;
    println!("{ast:#?}");

    Ok(())
}

fn symbols(file: String) -> Result<()> {
    let source = unstable::Source::from_file(&file)?;
    let module = unstable::Parser::new(&source)?.parse()?;
    let table = unstable::SymbolTable::build(&module)?;
    for scope in table.scopes() {
        println!("{} ({:?})", scope.name, scope.kind);
        for symbol in scope.symbols.values() {
            println!("  {} {:?}", symbol.name, symbol.binding);
        }
    }
    Ok(())
}

#[derive(Subcommand)]
enum Command {
    /// Print the service client calls made by python files.
    Analyze {
        /// Python files or directories holding python files.
        #[arg(required(true))]
        paths: Vec<String>,

        /// Treat the files as framework applications whose routes are invoked.
        #[arg(long, short)]
        app: bool,

        /// Analyzer configuration. json or yaml.
        #[arg(long, short, value_name = "config.json|config.yaml")]
        config: Option<String>,
    },

    /// Print the types inferred for the names of a module or function scope.
    Types {
        /// Python file.
        file: String,

        /// Function scope of the module.
        #[arg(long, short)]
        scope: Option<String>,

        /// Analyzer configuration. json or yaml.
        #[arg(long, short, value_name = "config.json|config.yaml")]
        config: Option<String>,
    },

    /// Tokenize a python file.
    Lex {
        /// Python file.
        file: String,

        /// Verbose output.
        #[arg(long, short)]
        verbose: bool,
    },

    /// Parse a python file.
    Parse {
        /// Python file.
        file: String,
    },

    /// Print the scopes and symbols of a python file.
    Symbols {
        /// Python file.
        file: String,
    },
}

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    init_logging();

    // Parse and dispatch command.
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze { paths, app, config } => analyze(&paths, app, config),
        Command::Types {
            file,
            scope,
            config,
        } => types(file, scope, config),
        Command::Lex { file, verbose } => lex(file, verbose),
        Command::Parse { file } => parse(file),
        Command::Symbols { file } => symbols(file),
    }
}
