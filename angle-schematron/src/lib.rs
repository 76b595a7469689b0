//! A Schematron-style validator: rules select contexts with XPath, asserts
//! test them, results are collected per assert.

use ahash::{HashMap, HashMapExt};
use angle_name::Namespaces;
use angle_xml::{Forest, Node};
use angle_xpath::ast::Expr;
use angle_xpath::{
    parse, Cancellation, CompileMode, CompileOptions, Context, Environment, Evaluator, Item,
};
use thiserror::Error;

pub const SCHEMATRON_NAMESPACE: &str = "http://purl.oclc.org/dsdl/schematron";

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("schema error: {0}")]
    Load(String),
    #[error(transparent)]
    Parse(#[from] angle_xml::ParseError),
    #[error(transparent)]
    Xpath(#[from] angle_xpath::Error),
}

/// Assert severity, from the `role` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Level {
    Info,
    Warning,
    #[default]
    Error,
}

impl Level {
    fn from_role(role: Option<&str>) -> Result<Level> {
        match role {
            None | Some("error") | Some("fatal") => Ok(Level::Error),
            Some("warning") | Some("warn") => Ok(Level::Warning),
            Some("info") | Some("information") => Ok(Level::Info),
            Some(other) => Err(Error::Load(format!("unknown role {:?}", other))),
        }
    }
}

#[derive(Debug)]
struct Assert {
    id: Option<String>,
    test: Expr,
    test_text: String,
    message: String,
    level: Level,
    /// A `report` fires when the test is true; an `assert` when it is false.
    reported: bool,
}

#[derive(Debug)]
struct Rule {
    context: Expr,
    context_text: String,
    asserts: Vec<Assert>,
}

#[derive(Debug)]
struct SchemaPattern {
    id: Option<String>,
    rules: Vec<Rule>,
}

/// A loaded schema: namespaces, phases and patterns of rules.
#[derive(Debug)]
pub struct Schema {
    namespaces: Namespaces,
    phases: HashMap<String, Vec<String>>,
    patterns: Vec<SchemaPattern>,
}

/// Outcome of one assert across every context node it saw.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertResult {
    pub id: Option<String>,
    pub context: String,
    pub test: String,
    pub message: String,
    pub level: Level,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Path identities of the offending nodes.
    pub offenders: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub results: Vec<AssertResult>,
}

impl Report {
    pub fn failed(&self) -> usize {
        self.results.iter().map(|result| result.failed).sum()
    }

    pub fn passed(&self) -> usize {
        self.results.iter().map(|result| result.passed).sum()
    }

    /// Failures at or above a severity level.
    pub fn failed_at_level(&self, level: Level) -> usize {
        self.results
            .iter()
            .filter(|result| result.level >= level)
            .map(|result| result.failed)
            .sum()
    }
}

#[derive(Debug, Default)]
pub struct RunOptions {
    pub phase: Option<String>,
    /// Restrict the run to one pattern id.
    pub group: Option<String>,
    pub fail_fast: bool,
    pub cancellation: Cancellation,
}

impl Schema {
    pub fn load(forest: &mut Forest, text: &str) -> Result<Schema> {
        let doc = forest.parse(text)?;
        let root = forest
            .document_element(doc)
            .ok_or_else(|| Error::Load("schema document has no root element".to_string()))?;

        let mut namespaces = Namespaces::default();
        let mut phases = HashMap::new();
        let mut patterns = Vec::new();

        // ns declarations first: rule contexts depend on them
        for &child in forest.children(root) {
            if schematron_local(forest, child).as_deref() == Some("ns") {
                let prefix = forest
                    .attribute_str(child, "prefix")
                    .ok_or_else(|| Error::Load("ns without prefix".to_string()))?;
                let uri = forest
                    .attribute_str(child, "uri")
                    .ok_or_else(|| Error::Load("ns without uri".to_string()))?;
                namespaces.add(prefix, uri);
            }
        }

        for &child in forest.children(root) {
            match schematron_local(forest, child).as_deref() {
                Some("phase") => {
                    let id = forest
                        .attribute_str(child, "id")
                        .ok_or_else(|| Error::Load("phase without id".to_string()))?
                        .to_string();
                    let mut active = Vec::new();
                    for &active_el in forest.children(child) {
                        if schematron_local(forest, active_el).as_deref() == Some("active") {
                            if let Some(pattern) = forest.attribute_str(active_el, "pattern") {
                                active.push(pattern.to_string());
                            }
                        }
                    }
                    phases.insert(id, active);
                }
                Some("pattern") => {
                    patterns.push(load_pattern(forest, child, &namespaces)?);
                }
                _ => {}
            }
        }

        Ok(Schema {
            namespaces,
            phases,
            patterns,
        })
    }

    /// Evaluate every active rule against the document, collecting pass and
    /// fail counts per assert.
    pub fn run(&self, forest: &Forest, doc: Node, options: &RunOptions) -> Result<Report> {
        let active: Option<&Vec<String>> = match &options.phase {
            Some(phase) => Some(
                self.phases
                    .get(phase)
                    .ok_or_else(|| Error::Load(format!("unknown phase {:?}", phase)))?,
            ),
            None => None,
        };

        let mut env = Environment::new();
        env.namespaces = self.namespaces.clone();
        env.cancellation = options.cancellation.clone();

        let mut report = Report::default();
        'patterns: for pattern in &self.patterns {
            if let Some(active) = active {
                let included = pattern
                    .id
                    .as_ref()
                    .map(|id| active.contains(id))
                    .unwrap_or(false);
                if !included {
                    continue;
                }
            }
            if let Some(group) = &options.group {
                if pattern.id.as_deref() != Some(group.as_str()) {
                    continue;
                }
            }
            for rule in &pattern.rules {
                options.cancellation.check().map_err(Error::from)?;
                let mut evaluator = Evaluator::new(forest, &mut env);
                let selected = evaluator.evaluate(&rule.context, &Context::new(Item::Node(doc)))?;
                let nodes = selected.nodes()?;
                for assert in &rule.asserts {
                    let mut result = AssertResult {
                        id: assert.id.clone(),
                        context: rule.context_text.clone(),
                        test: assert.test_text.clone(),
                        message: assert.message.clone(),
                        level: assert.level,
                        total: 0,
                        passed: 0,
                        failed: 0,
                        offenders: Vec::new(),
                    };
                    let size = nodes.len();
                    for (index, &node) in nodes.iter().enumerate() {
                        options.cancellation.check().map_err(Error::from)?;
                        let context = Context::with_focus(Item::Node(node), index + 1, size);
                        let mut evaluator = Evaluator::new(forest, &mut env);
                        let outcome = evaluator
                            .evaluate(&assert.test, &context)?
                            .effective_boolean_value()?;
                        let holds = outcome != assert.reported;
                        result.total += 1;
                        if holds {
                            result.passed += 1;
                        } else {
                            result.failed += 1;
                            result.offenders.push(forest.path(node));
                        }
                    }
                    let stop = options.fail_fast && result.failed > 0;
                    report.results.push(result);
                    if stop {
                        break 'patterns;
                    }
                }
            }
        }
        Ok(report)
    }
}

fn schematron_local(forest: &Forest, node: Node) -> Option<String> {
    let name = forest.name(node)?;
    if !forest.is_element(node) {
        return None;
    }
    match name.uri() {
        // tolerate schemas written without the namespace
        Some(SCHEMATRON_NAMESPACE) | None => Some(name.local_name().to_string()),
        _ => None,
    }
}

fn load_pattern(
    forest: &Forest,
    element: Node,
    namespaces: &Namespaces,
) -> Result<SchemaPattern> {
    let mut rules = Vec::new();
    // rule contexts follow Schematron semantics: a bare path is rebased on
    // the document root
    let options = CompileOptions {
        mode: CompileMode::Xsl,
        ..CompileOptions::default()
    };
    for &rule_el in forest.children(element) {
        if schematron_local(forest, rule_el).as_deref() != Some("rule") {
            continue;
        }
        let context_text = forest
            .attribute_str(rule_el, "context")
            .ok_or_else(|| Error::Load("rule without context".to_string()))?
            .to_string();
        let context = parse(&context_text, namespaces, &options)?;
        let mut asserts = Vec::new();
        for &assert_el in forest.children(rule_el) {
            let (reported, is_assert) = match schematron_local(forest, assert_el).as_deref() {
                Some("assert") => (false, true),
                Some("report") => (true, true),
                _ => (false, false),
            };
            if !is_assert {
                continue;
            }
            let test_text = forest
                .attribute_str(assert_el, "test")
                .ok_or_else(|| Error::Load("assert without test".to_string()))?
                .to_string();
            let test = parse(&test_text, namespaces, &CompileOptions::default())?;
            asserts.push(Assert {
                id: forest.attribute_str(assert_el, "id").map(|s| s.to_string()),
                test,
                test_text,
                message: forest.string_value(assert_el).trim().to_string(),
                level: Level::from_role(forest.attribute_str(assert_el, "role"))?,
                reported,
            });
        }
        rules.push(Rule {
            context,
            context_text,
            asserts,
        });
    }
    Ok(SchemaPattern {
        id: forest.attribute_str(element, "id").map(|s| s.to_string()),
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron">
  <pattern id="counts">
    <rule context="order">
      <assert test="@id" id="order-id">every order carries an id</assert>
      <assert test="count(item) &gt; 0">orders are not empty</assert>
      <report test="@deprecated" role="warning">deprecated order form</report>
    </rule>
  </pattern>
  <phase id="smoke">
    <active pattern="counts"/>
  </phase>
</schema>"#;

    const DOCUMENT: &str = r#"<orders>
  <order id="1"><item/></order>
  <order><item/><item/></order>
  <order id="3" deprecated="yes"><item/></order>
</orders>"#;

    fn run(schema_text: &str, doc_text: &str, options: &RunOptions) -> Report {
        let mut forest = Forest::new();
        let schema = Schema::load(&mut forest, schema_text).unwrap();
        let doc = forest.parse(doc_text).unwrap();
        schema.run(&forest, doc, options).unwrap()
    }

    #[test]
    fn test_counts_and_offenders() {
        let report = run(SCHEMA, DOCUMENT, &RunOptions::default());
        assert_eq!(report.results.len(), 3);
        let id_assert = &report.results[0];
        assert_eq!(id_assert.total, 3);
        assert_eq!(id_assert.passed, 2);
        assert_eq!(id_assert.failed, 1);
        assert_eq!(id_assert.offenders.len(), 1);
        let non_empty = &report.results[1];
        assert_eq!(non_empty.failed, 0);
        // the report fires on the deprecated order
        let deprecated = &report.results[2];
        assert_eq!(deprecated.failed, 1);
        assert_eq!(deprecated.level, Level::Warning);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.failed_at_level(Level::Error), 1);
    }

    #[test]
    fn test_fail_fast_stops_early() {
        let options = RunOptions {
            fail_fast: true,
            ..RunOptions::default()
        };
        let report = run(SCHEMA, DOCUMENT, &options);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_unknown_phase_errors() {
        let mut forest = Forest::new();
        let schema = Schema::load(&mut forest, SCHEMA).unwrap();
        let doc = forest.parse(DOCUMENT).unwrap();
        let options = RunOptions {
            phase: Some("nope".to_string()),
            ..RunOptions::default()
        };
        assert!(schema.run(&forest, doc, &options).is_err());
    }

    #[test]
    fn test_phase_selects_patterns() {
        let options = RunOptions {
            phase: Some("smoke".to_string()),
            ..RunOptions::default()
        };
        let report = run(SCHEMA, DOCUMENT, &options);
        assert_eq!(report.results.len(), 3);
    }
}
