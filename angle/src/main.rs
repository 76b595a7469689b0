mod assert;
mod common;
mod diff;
mod format;
mod query;
mod transform;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, about, version, long_about)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an XML document and write it back with formatting options.
    Format(format::Format),
    /// Evaluate an XPath expression against an XML document.
    Query(query::Query),
    /// Run a Schematron schema against an XML document.
    Assert(assert::Assert),
    /// Transform an XML document using an XSLT stylesheet.
    Transform(transform::Transform),
    /// Structurally compare two XML documents.
    #[command(alias = "compare")]
    Diff(diff::Diff),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Format(format) => format.run(),
        Commands::Query(query) => query.run(),
        Commands::Assert(assert) => assert.run(),
        Commands::Transform(transform) => transform.run(),
        Commands::Diff(diff) => diff.run(),
    };
    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(common::classify(&err))
        }
    }
}
