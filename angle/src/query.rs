use std::path::PathBuf;

use angle_name::Name;
use angle_xml::{Forest, Node, ParseOptions, SerializeOptions, Value};
use angle_xpath::{parse, CompileOptions, Context, Environment, Evaluator, Item};
use clap::Parser;

use crate::common;

#[derive(Debug, Parser)]
pub(crate) struct Query {
    /// XPath expression
    query: String,
    /// input xml file or url (default stdin)
    infile: Option<PathBuf>,
    /// Print at most this many result items
    #[arg(long)]
    limit: Option<usize>,
    /// Prune serialized results below this depth
    #[arg(long)]
    level: Option<usize>,
    /// Print string values instead of serialized nodes
    #[arg(long)]
    text: bool,
    /// Print nothing; only the exit status reports the outcome
    #[arg(short = 'q', long)]
    quiet: bool,
    /// Fail on prefixes without a namespace binding
    #[arg(long = "strict-ns")]
    strict_ns: bool,
    /// Allow a document without an XML prolog
    #[arg(long = "omit-prolog")]
    omit_prolog: bool,
    /// Context file binding variables for the evaluation
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Query {
    pub(crate) fn run(&self) -> anyhow::Result<u8> {
        let text = common::read_input(self.infile.as_ref())?;
        let mut forest = Forest::new();
        let options = ParseOptions {
            strict_ns: self.strict_ns,
            require_prolog: !self.omit_prolog,
            ..ParseOptions::default()
        };
        let doc = common::parse_document(&mut forest, &text, &options)?;

        let mut env = Environment::new();
        if let Some(config) = &self.config {
            bind_context(&mut forest, &mut env, config, doc)?;
        }

        let compile_options = CompileOptions {
            strict: self.strict_ns,
            ..CompileOptions::default()
        };
        let namespaces = env.namespaces.clone();
        let expr = parse(&self.query, &namespaces, &compile_options)?;
        let mut evaluator = Evaluator::new(&forest, &mut env);
        let result = evaluator.evaluate(&expr, &Context::new(Item::Node(doc)))?;

        if !self.quiet {
            let limit = self.limit.unwrap_or(usize::MAX);
            let serialize_options = SerializeOptions::default();
            let mut lines = Vec::new();
            for item in result.iter().take(limit) {
                match item {
                    Item::Atomic(atomic) => lines.push(atomic.string_value()),
                    Item::Node(node) => {
                        if self.text {
                            lines.push(forest.string_value(*node));
                        } else {
                            let printed = match self.level {
                                Some(level) => {
                                    let pruned = prune(&mut forest, *node, level);
                                    forest.serialize(pruned, &serialize_options)
                                }
                                None => forest.serialize(*node, &serialize_options),
                            };
                            lines.push(printed);
                        }
                    }
                }
            }
            common::write_output(None, &lines.join("\n"))?;
        }

        if result.is_empty() {
            Ok(common::EXIT_UNSATISFIED)
        } else {
            Ok(0)
        }
    }
}

/// Clone a subtree, dropping children below `level`.
fn prune(forest: &mut Forest, node: Node, level: usize) -> Node {
    let clone = forest.clone_node(node);
    prune_below(forest, clone, level);
    clone
}

fn prune_below(forest: &mut Forest, node: Node, level: usize) {
    if level == 0 {
        while let Some(&child) = forest.children(node).first() {
            forest.detach(child);
        }
        return;
    }
    for child in forest.children(node).to_vec() {
        prune_below(forest, child, level - 1);
    }
}

/// A context document binds variables for the query:
/// `<context><variable name="n" select="expr"/></context>`. A variable
/// without `select` binds its text content as a string.
fn bind_context(
    forest: &mut Forest,
    env: &mut Environment,
    config: &PathBuf,
    doc: Node,
) -> anyhow::Result<()> {
    let text = common::read_input(Some(config))?;
    let context_doc = forest.parse(&text)?;
    let root = forest
        .document_element(context_doc)
        .ok_or_else(|| anyhow::anyhow!("context file has no root element"))?;
    for &child in &forest.children(root).to_vec() {
        if !forest.is_element(child) {
            continue;
        }
        if forest.name(child).map(|n| n.local_name()) != Some("variable") {
            continue;
        }
        let name = forest
            .attribute_str(child, "name")
            .ok_or_else(|| anyhow::anyhow!("context variable without a name"))?
            .to_string();
        let value = match forest.attribute_str(child, "select") {
            Some(select) => {
                let namespaces = env.namespaces.clone();
                let expr = parse(select, &namespaces, &CompileOptions::default())?;
                let mut evaluator = Evaluator::new(forest, env);
                evaluator.evaluate(&expr, &Context::new(Item::Node(doc)))?
            }
            None => match forest.value(child) {
                Value::Element(_) => {
                    angle_xpath::Sequence::singleton(forest.string_value(child))
                }
                _ => angle_xpath::Sequence::new(),
            },
        };
        env.define(Name::local(name), value);
    }
    Ok(())
}
