use ahash::{HashMap, HashMapExt};
use angle_name::{Name, Namespaces, XSLT_NAMESPACE};
use angle_xml::{Forest, Node, ParseOptions, PiHandlers};
use angle_xpath::ast::Expr;
use angle_xpath::{parse, CompileOptions, Pattern};

use crate::error::{Error, Result};
use crate::output::OutputSpec;

/// Loads the text of an `include`/`import`/`source-document` href.
pub type Resolver<'a> = dyn Fn(&str) -> Result<String> + 'a;

fn failing_resolver(href: &str) -> Result<String> {
    Err(Error::Load(format!(
        "no resolver configured for href {:?}",
        href
    )))
}

/// A template parameter or a global stylesheet parameter.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: Name,
    pub select: Option<Expr>,
    pub body: Vec<Node>,
}

/// `xsl:mode` recovery policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoMatchPolicy {
    #[default]
    TextOnlyCopy,
    ShallowCopy,
    DeepCopy,
    ShallowSkip,
    DeepSkip,
    Fail,
}

#[derive(Debug, Clone, Default)]
pub struct ModeDecl {
    pub name: Option<String>,
    pub on_no_match: NoMatchPolicy,
    /// `true` means fail on ties instead of taking the last declaration.
    pub fail_on_multiple_match: bool,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: Option<String>,
    pub pattern: Option<Pattern>,
    pub mode: Option<String>,
    pub params: Vec<ParamDecl>,
    /// Body nodes in the stylesheet document (cloned per run).
    pub body: Vec<Node>,
    /// 0 is the importing sheet; higher is weaker.
    pub precedence: usize,
    /// Declaration order, used to prefer later declarations on ties.
    pub order: usize,
}

/// A loaded stylesheet: template index, modes, global parameters, attribute
/// sets and output declarations. Imported sheets are flattened in with
/// weaker precedence.
#[derive(Debug)]
pub struct Stylesheet {
    pub root: Node,
    pub templates: Vec<Template>,
    pub modes: HashMap<Option<String>, ModeDecl>,
    pub params: Vec<ParamDecl>,
    /// Top-level `xsl:variable` declarations, bound at run start.
    pub variables: Vec<ParamDecl>,
    pub attribute_sets: HashMap<String, Vec<Node>>,
    pub outputs: Vec<OutputSpec>,
    pub namespaces: Namespaces,
    /// Number of precedence levels (1 plus the flattened import chain).
    pub precedence_levels: usize,
}

impl Stylesheet {
    /// Load a stylesheet that must not reach for external documents.
    pub fn load(forest: &mut Forest, text: &str) -> Result<Stylesheet> {
        Self::load_with_resolver(forest, text, &failing_resolver)
    }

    pub fn load_with_resolver(
        forest: &mut Forest,
        text: &str,
        resolver: &Resolver,
    ) -> Result<Stylesheet> {
        let doc = forest.parse_with(text, &ParseOptions::default(), &PiHandlers::new())?;
        let root = forest
            .document_element(doc)
            .ok_or_else(|| Error::Load("stylesheet document has no root element".to_string()))?;
        Self::from_root(forest, root, resolver)
    }

    fn from_root(forest: &mut Forest, root: Node, resolver: &Resolver) -> Result<Stylesheet> {
        let mut namespaces = Namespaces::default();
        for (prefix, uri) in forest.namespaces_in_scope(root) {
            // the default xmlns applies to literal result elements, not to
            // XPath name tests
            if prefix.is_empty() {
                continue;
            }
            namespaces.add(&prefix, &uri);
        }

        let root_name = forest
            .name(root)
            .ok_or_else(|| Error::Load("stylesheet root is not an element".to_string()))?;
        let is_sheet = root_name.uri() == Some(XSLT_NAMESPACE)
            && matches!(root_name.local_name(), "stylesheet" | "transform");

        let mut sheet = Stylesheet {
            root,
            templates: Vec::new(),
            modes: HashMap::new(),
            params: Vec::new(),
            variables: Vec::new(),
            attribute_sets: HashMap::new(),
            outputs: Vec::new(),
            namespaces,
            precedence_levels: 1,
        };

        if !is_sheet {
            // simplified stylesheet: the root element (with an xsl:version
            // attribute) becomes the body of an implicit match="/" template
            let has_version = forest.attributes(root).iter().any(|&a| {
                forest
                    .name(a)
                    .map(|name| {
                        name.local_name() == "version" && name.uri() == Some(XSLT_NAMESPACE)
                    })
                    .unwrap_or(false)
            });
            if !has_version {
                return Err(Error::Load(
                    "root element is neither xsl:stylesheet nor a simplified stylesheet"
                        .to_string(),
                ));
            }
            sheet.templates.push(Template {
                name: None,
                pattern: Some(Pattern::parse("/", &sheet.namespaces, false)?),
                mode: None,
                params: Vec::new(),
                body: vec![root],
                precedence: 0,
                order: 0,
            });
            return Ok(sheet);
        }

        sheet.collect(forest, root, resolver)?;
        Ok(sheet)
    }

    fn collect(&mut self, forest: &mut Forest, root: Node, resolver: &Resolver) -> Result<()> {
        let children: Vec<Node> = forest.children(root).to_vec();
        for child in children {
            let Some(local) = xsl_local(forest, child) else {
                continue;
            };
            match local.as_str() {
                "template" => self.collect_template(forest, child)?,
                "output" => self.outputs.push(OutputSpec::from_element(forest, child)),
                "param" => {
                    let param = param_decl(forest, child, &self.namespaces)?;
                    self.params.push(param);
                }
                "variable" => {
                    let variable = param_decl(forest, child, &self.namespaces)?;
                    self.variables.push(variable);
                }
                "attribute-set" => {
                    let name = required_attribute(forest, child, "name")?;
                    self.attribute_sets
                        .insert(name, forest.children(child).to_vec());
                }
                "mode" => {
                    let mode = mode_decl(forest, child)?;
                    self.modes.insert(mode.name.clone(), mode);
                }
                "include" => {
                    let href = required_attribute(forest, child, "href")?;
                    let text = resolver(&href)?;
                    let included = Stylesheet::load_with_resolver(forest, &text, resolver)?;
                    self.merge(included, 0);
                }
                "import" => {
                    let href = required_attribute(forest, child, "href")?;
                    let text = resolver(&href)?;
                    let imported = Stylesheet::load_with_resolver(forest, &text, resolver)?;
                    let offset = self.precedence_levels;
                    self.merge(imported, offset);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn collect_template(&mut self, forest: &Forest, element: Node) -> Result<()> {
        let pattern = match forest.attribute_str(element, "match") {
            Some(text) => {
                let declared = forest
                    .attribute_str(element, "priority")
                    .map(|p| {
                        p.parse::<f64>().map_err(|_| {
                            Error::Load(format!("bad template priority {:?}", p))
                        })
                    })
                    .transpose()?;
                Some(
                    Pattern::parse(text, &self.namespaces, false)?
                        .with_declared_priority(declared),
                )
            }
            None => None,
        };
        let name = forest.attribute_str(element, "name").map(|s| s.to_string());
        if pattern.is_none() && name.is_none() {
            return Err(Error::Load(
                "template needs a match pattern or a name".to_string(),
            ));
        }
        let mode = forest
            .attribute_str(element, "mode")
            .filter(|m| *m != "#default")
            .map(|s| s.to_string());

        let mut params = Vec::new();
        let mut body = Vec::new();
        for &child in forest.children(element) {
            if xsl_local(forest, child).as_deref() == Some("param") {
                params.push(param_decl(forest, child, &self.namespaces)?);
            } else {
                body.push(child);
            }
        }
        self.templates.push(Template {
            name,
            pattern,
            mode,
            params,
            body,
            precedence: 0,
            order: self.templates.len(),
        });
        Ok(())
    }

    /// Merge another sheet's declarations at the given precedence offset;
    /// offset 0 is an include, anything higher an import.
    fn merge(&mut self, other: Stylesheet, offset: usize) {
        let base_order = self.templates.len();
        for mut template in other.templates {
            template.precedence += offset;
            template.order += base_order;
            self.templates.push(template);
        }
        for (name, mode) in other.modes {
            self.modes.entry(name).or_insert(mode);
        }
        for (name, set) in other.attribute_sets {
            self.attribute_sets.entry(name).or_insert(set);
        }
        self.params.extend(other.params);
        self.variables.extend(other.variables);
        self.outputs.extend(other.outputs);
        self.precedence_levels = self.precedence_levels.max(offset + other.precedence_levels);
    }

    pub fn named_template(&self, name: &str) -> Option<&Template> {
        // the strongest precedence wins; imports are searched too
        self.templates
            .iter()
            .filter(|template| template.name.as_deref() == Some(name))
            .min_by_key(|template| template.precedence)
    }

    pub fn mode(&self, name: Option<&str>) -> ModeDecl {
        self.modes
            .get(&name.map(|s| s.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn output(&self, name: Option<&str>) -> OutputSpec {
        self.outputs
            .iter()
            .find(|output| output.name.as_deref() == name)
            .cloned()
            .unwrap_or_default()
    }
}

/// The local name of an element in the XSLT namespace.
pub(crate) fn xsl_local(forest: &Forest, node: Node) -> Option<String> {
    let name = forest.name(node)?;
    if forest.is_element(node) && name.uri() == Some(XSLT_NAMESPACE) {
        Some(name.local_name().to_string())
    } else {
        None
    }
}

pub(crate) fn required_attribute(forest: &Forest, element: Node, name: &str) -> Result<String> {
    forest
        .attribute_str(element, name)
        .map(|s| s.to_string())
        .ok_or_else(|| {
            Error::Load(format!(
                "xsl:{} is missing the {} attribute",
                forest
                    .name(element)
                    .map(|n| n.local_name().to_string())
                    .unwrap_or_default(),
                name
            ))
        })
}

fn param_decl(forest: &Forest, element: Node, namespaces: &Namespaces) -> Result<ParamDecl> {
    let name_text = required_attribute(forest, element, "name")?;
    let (prefix, local) = Name::split_prefix(&name_text);
    let name = match prefix {
        Some(prefix) => Name::new(
            local,
            namespaces.by_prefix(prefix).map(|s| s.to_string()),
            Some(prefix.to_string()),
        ),
        None => Name::local(local),
    };
    let select = forest
        .attribute_str(element, "select")
        .map(|text| parse(text, namespaces, &CompileOptions::default()))
        .transpose()?;
    Ok(ParamDecl {
        name,
        select,
        body: forest.children(element).to_vec(),
    })
}

fn mode_decl(forest: &Forest, element: Node) -> Result<ModeDecl> {
    let on_no_match = match forest.attribute_str(element, "on-no-match") {
        None | Some("text-only-copy") => NoMatchPolicy::TextOnlyCopy,
        Some("shallow-copy") => NoMatchPolicy::ShallowCopy,
        Some("deep-copy") => NoMatchPolicy::DeepCopy,
        Some("shallow-skip") => NoMatchPolicy::ShallowSkip,
        Some("deep-skip") => NoMatchPolicy::DeepSkip,
        Some("fail") => NoMatchPolicy::Fail,
        Some(other) => {
            return Err(Error::Load(format!(
                "unknown on-no-match policy {:?}",
                other
            )))
        }
    };
    let fail_on_multiple_match = match forest.attribute_str(element, "on-multiple-match") {
        None | Some("use-last") => false,
        Some("fail") => true,
        Some(other) => {
            return Err(Error::Load(format!(
                "unknown on-multiple-match policy {:?}",
                other
            )))
        }
    };
    Ok(ModeDecl {
        name: forest.attribute_str(element, "name").map(|s| s.to_string()),
        on_no_match,
        fail_on_multiple_match,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"<xsl:stylesheet version="3.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:output method="html" indent="yes"/>
  <xsl:param name="greeting" select="'hello'"/>
  <xsl:mode on-no-match="deep-skip"/>
  <xsl:template match="/">
    <out/>
  </xsl:template>
  <xsl:template name="helper">
    <xsl:param name="x" select="1"/>
  </xsl:template>
</xsl:stylesheet>"#;

    #[test]
    fn test_load_collects_declarations() {
        let mut forest = Forest::new();
        let sheet = Stylesheet::load(&mut forest, SHEET).unwrap();
        assert_eq!(sheet.templates.len(), 2);
        assert_eq!(sheet.params.len(), 1);
        assert!(sheet.named_template("helper").is_some());
        assert_eq!(
            sheet.mode(None).on_no_match,
            NoMatchPolicy::DeepSkip
        );
        assert_eq!(sheet.output(None).indent, true);
        let helper = sheet.named_template("helper").unwrap();
        assert_eq!(helper.params.len(), 1);
    }

    #[test]
    fn test_simplified_stylesheet() {
        let mut forest = Forest::new();
        let text = r#"<html xsl:version="3.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"><body/></html>"#;
        let sheet = Stylesheet::load(&mut forest, text).unwrap();
        assert_eq!(sheet.templates.len(), 1);
        assert!(sheet.templates[0].pattern.is_some());
        assert_eq!(sheet.templates[0].body.len(), 1);
    }

    #[test]
    fn test_not_a_stylesheet() {
        let mut forest = Forest::new();
        assert!(matches!(
            Stylesheet::load(&mut forest, "<plain/>"),
            Err(Error::Load(_))
        ));
    }

    #[test]
    fn test_include_merges_and_import_weakens() {
        let included = r#"<xsl:stylesheet version="3.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="a"><inc/></xsl:template>
</xsl:stylesheet>"#;
        let imported = r#"<xsl:stylesheet version="3.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="a"><imp/></xsl:template>
</xsl:stylesheet>"#;
        let main = r#"<xsl:stylesheet version="3.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:include href="included.xsl"/>
  <xsl:import href="imported.xsl"/>
</xsl:stylesheet>"#;
        let mut forest = Forest::new();
        let resolver = |href: &str| -> Result<String> {
            match href {
                "included.xsl" => Ok(included.to_string()),
                "imported.xsl" => Ok(imported.to_string()),
                other => Err(Error::Load(format!("unknown href {:?}", other))),
            }
        };
        let sheet = Stylesheet::load_with_resolver(&mut forest, main, &resolver).unwrap();
        assert_eq!(sheet.templates.len(), 2);
        assert_eq!(sheet.templates[0].precedence, 0);
        assert_eq!(sheet.templates[1].precedence, 1);
        assert_eq!(sheet.precedence_levels, 2);
    }
}
