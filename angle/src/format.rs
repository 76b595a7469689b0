use std::path::PathBuf;

use angle_name::Namespaces;
use angle_xml::{CaseStyle, Forest, ParseOptions, SerializeOptions};
use angle_xpath::{parse, CompileOptions, Context, Environment, Evaluator, Item};
use clap::{Parser, ValueEnum};

use crate::common;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CaseType {
    Snake,
    Kebab,
    Lower,
}

#[derive(Debug, Parser)]
pub(crate) struct Format {
    /// input xml file or url (default stdin)
    infile: Option<PathBuf>,
    /// output file (default stdout)
    #[arg(short = 'f', long = "file")]
    outfile: Option<PathBuf>,
    /// Write without indentation
    #[arg(long)]
    compact: bool,
    /// Drop xmlns attributes
    #[arg(long = "no-namespace")]
    no_namespace: bool,
    /// Drop the XML declaration
    #[arg(long = "no-prolog")]
    no_prolog: bool,
    /// Drop comments
    #[arg(long = "no-comment")]
    no_comment: bool,
    /// Rewrite element and attribute names
    #[arg(long = "case-type", value_enum)]
    case_type: Option<CaseType>,
    /// Serialize only the nodes selected by this XPath query
    #[arg(short = 'q', long = "query")]
    query: Option<String>,
    /// Drop whitespace-only text nodes on parse
    #[arg(long = "trim-space")]
    trim_space: bool,
}

impl Format {
    pub(crate) fn run(&self) -> anyhow::Result<u8> {
        let text = common::read_input(self.infile.as_ref())?;
        let mut forest = Forest::new();
        let options = ParseOptions {
            trim_space: self.trim_space,
            ..ParseOptions::default()
        };
        let doc = common::parse_document(&mut forest, &text, &options)?;

        let serialize_options = SerializeOptions {
            indent: if self.compact { None } else { Some(2) },
            omit_namespaces: self.no_namespace,
            omit_comments: self.no_comment,
            omit_prolog: self.no_prolog,
            case: self.case_type.map(|case| match case {
                CaseType::Snake => CaseStyle::Snake,
                CaseType::Kebab => CaseStyle::Kebab,
                CaseType::Lower => CaseStyle::Lower,
            }),
            custom_prolog: None,
        };

        let output = match &self.query {
            None => forest.serialize(doc, &serialize_options),
            Some(query) => {
                let expr = parse(query, &Namespaces::default(), &CompileOptions::default())?;
                let mut env = Environment::new();
                let mut evaluator = Evaluator::new(&forest, &mut env);
                let result = evaluator.evaluate(&expr, &Context::new(Item::Node(doc)))?;
                let mut parts = Vec::new();
                for item in result.iter() {
                    match item {
                        Item::Node(node) => {
                            parts.push(forest.serialize(*node, &serialize_options))
                        }
                        Item::Atomic(atomic) => parts.push(atomic.string_value()),
                    }
                }
                parts.join("\n")
            }
        };
        common::write_output(self.outfile.as_ref(), &output)?;
        Ok(0)
    }
}
