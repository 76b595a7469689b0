use crate::forest::{Forest, Node};
use crate::xmlvalue::Value;

/// Name rewriting applied to element and attribute names on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStyle {
    Snake,
    Kebab,
    Lower,
}

impl CaseStyle {
    fn apply(&self, name: &str) -> String {
        match self {
            CaseStyle::Lower => name.to_ascii_lowercase(),
            CaseStyle::Snake => rewrite_separated(name, '_'),
            CaseStyle::Kebab => rewrite_separated(name, '-'),
        }
    }
}

/// Lower-case with a separator at camelCase boundaries and in place of
/// existing separators.
fn rewrite_separated(name: &str, separator: char) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '-' || c == '_' || c == '.' {
            out.push(separator);
            prev_lower = false;
        } else if c.is_ascii_uppercase() {
            if prev_lower {
                out.push(separator);
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// Serializer configuration.
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    /// Spaces per indent level; `None` writes compact output.
    pub indent: Option<usize>,
    /// Drop `xmlns` attributes.
    pub omit_namespaces: bool,
    /// Drop comment nodes.
    pub omit_comments: bool,
    /// Drop the XML declaration.
    pub omit_prolog: bool,
    /// Rewrite element and attribute names.
    pub case: Option<CaseStyle>,
    /// Replaces the XML declaration, e.g. `<!DOCTYPE html>` for HTML output.
    pub custom_prolog: Option<String>,
}

impl SerializeOptions {
    pub fn indented() -> Self {
        SerializeOptions {
            indent: Some(2),
            ..SerializeOptions::default()
        }
    }
}

impl Forest {
    /// Serialize a node (usually a document) back to XML text.
    pub fn serialize(&self, node: Node, options: &SerializeOptions) -> String {
        let mut out = String::new();
        if let Value::Document(document) = self.value(node) {
            if let Some(prolog) = &options.custom_prolog {
                out.push_str(prolog);
                out.push('\n');
            } else if !options.omit_prolog {
                if let Some(version) = &document.version {
                    out.push_str(&format!("<?xml version=\"{}\"", version));
                    if let Some(encoding) = &document.encoding {
                        out.push_str(&format!(" encoding=\"{}\"", encoding));
                    }
                    if let Some(standalone) = document.standalone {
                        out.push_str(&format!(
                            " standalone=\"{}\"",
                            if standalone { "yes" } else { "no" }
                        ));
                    }
                    out.push_str("?>");
                    if options.indent.is_some() {
                        out.push('\n');
                    }
                }
            }
            if let Some(doctype) = &document.doctype {
                out.push_str(&format!("<!DOCTYPE {}>", doctype.content));
                if options.indent.is_some() {
                    out.push('\n');
                }
            }
            let mut first = true;
            for &child in self.children(node) {
                if options.omit_comments && matches!(self.value(child), Value::Comment(_)) {
                    continue;
                }
                if !first && options.indent.is_some() {
                    out.push('\n');
                }
                self.write_node(child, options, 0, &mut out);
                first = false;
            }
        } else {
            self.write_node(node, options, 0, &mut out);
        }
        out
    }

    fn write_node(&self, node: Node, options: &SerializeOptions, depth: usize, out: &mut String) {
        match self.value(node) {
            Value::Document(_) => {
                out.push_str(&self.serialize(node, options));
            }
            Value::Element(_) => self.write_element(node, options, depth, out),
            Value::Attribute(_) => {}
            Value::Text(text) => out.push_str(&escape_text(text.get())),
            Value::Cdata(text) => {
                out.push_str("<![CDATA[");
                out.push_str(text.get());
                out.push_str("]]>");
            }
            Value::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment.get());
                out.push_str("-->");
            }
            Value::ProcessingInstruction(pi) => {
                out.push_str("<?");
                out.push_str(pi.name());
                if !pi.data().is_empty() {
                    out.push(' ');
                    out.push_str(pi.data());
                }
                out.push_str("?>");
            }
        }
    }

    fn write_element(
        &self,
        node: Node,
        options: &SerializeOptions,
        depth: usize,
        out: &mut String,
    ) {
        let name = self.output_name(node, options);
        out.push('<');
        out.push_str(&name);
        for &attribute in self.attributes(node) {
            let Value::Attribute(a) = self.value(attribute) else {
                continue;
            };
            if options.omit_namespaces && a.is_namespace_declaration() {
                continue;
            }
            let attr_name = if a.is_namespace_declaration() {
                a.name().full_name()
            } else {
                self.rewrite_name(&a.name().full_name(), a.name().prefix(), options)
            };
            out.push(' ');
            out.push_str(&attr_name);
            out.push_str("=\"");
            out.push_str(&escape_attribute(a.value()));
            out.push('"');
        }

        let children: Vec<Node> = self
            .children(node)
            .iter()
            .copied()
            .filter(|&child| {
                !(options.omit_comments && matches!(self.value(child), Value::Comment(_)))
            })
            .collect();

        if children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');

        let has_text = children.iter().any(|&child| {
            matches!(self.value(child), Value::Text(_) | Value::Cdata(_))
        });
        let indent = match options.indent {
            Some(width) if !has_text => Some(width),
            _ => None,
        };

        for &child in &children {
            if let Some(width) = indent {
                out.push('\n');
                out.push_str(&" ".repeat(width * (depth + 1)));
            }
            self.write_node(child, options, depth + 1, out);
        }
        if let Some(width) = indent {
            out.push('\n');
            out.push_str(&" ".repeat(width * depth));
        }
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }

    fn output_name(&self, node: Node, options: &SerializeOptions) -> String {
        let name = self.name(node).expect("element has a name");
        self.rewrite_name(&name.full_name(), name.prefix(), options)
    }

    fn rewrite_name(
        &self,
        full: &str,
        prefix: Option<&str>,
        options: &SerializeOptions,
    ) -> String {
        match options.case {
            None => full.to_string(),
            Some(case) => {
                // the prefix is left alone; only the local part is rewritten
                let (_, local) = angle_name::Name::split_prefix(full);
                match prefix {
                    Some(prefix) if !prefix.is_empty() => {
                        format!("{}:{}", prefix, case.apply(local))
                    }
                    _ => case.apply(local),
                }
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &str) -> String {
        let mut forest = Forest::new();
        let doc = forest.parse(input).unwrap();
        forest.serialize(doc, &SerializeOptions::default())
    }

    #[test]
    fn test_roundtrip_plain() {
        let input = r#"<r><n k="1">a</n><n>b &amp; c</n></r>"#;
        assert_eq!(roundtrip(input), input);
    }

    #[test]
    fn test_roundtrip_prolog_and_namespaces() {
        let input = r#"<?xml version="1.0" encoding="UTF-8"?><r xmlns:x="urn:n"><x:a/></r>"#;
        assert_eq!(roundtrip(input), input);
    }

    #[test]
    fn test_indent() {
        let mut forest = Forest::new();
        let doc = forest.parse("<r><a><b/></a><c>text</c></r>").unwrap();
        insta::assert_snapshot!(
            forest.serialize(doc, &SerializeOptions::indented()),
            @r###"
        <r>
          <a>
            <b/>
          </a>
          <c>text</c>
        </r>
        "###
        );
    }

    #[test]
    fn test_omit_namespaces_and_comments() {
        let mut forest = Forest::new();
        let doc = forest
            .parse(r#"<r xmlns:x="urn:n"><!--note--><x:a/></r>"#)
            .unwrap();
        let options = SerializeOptions {
            omit_namespaces: true,
            omit_comments: true,
            ..SerializeOptions::default()
        };
        assert_eq!(forest.serialize(doc, &options), "<r><x:a/></r>");
    }

    #[test]
    fn test_case_rewrite() {
        let mut forest = Forest::new();
        let doc = forest.parse(r#"<FooBar BazQux="1"/>"#).unwrap();
        let snake = SerializeOptions {
            case: Some(CaseStyle::Snake),
            ..SerializeOptions::default()
        };
        assert_eq!(forest.serialize(doc, &snake), r#"<foo_bar baz_qux="1"/>"#);
        let kebab = SerializeOptions {
            case: Some(CaseStyle::Kebab),
            ..SerializeOptions::default()
        };
        assert_eq!(forest.serialize(doc, &kebab), r#"<foo-bar baz-qux="1"/>"#);
    }

    #[test]
    fn test_custom_prolog() {
        let mut forest = Forest::new();
        let doc = forest.parse("<html><body/></html>").unwrap();
        let options = SerializeOptions {
            custom_prolog: Some("<!DOCTYPE html>".to_string()),
            ..SerializeOptions::default()
        };
        assert_eq!(
            forest.serialize(doc, &options),
            "<!DOCTYPE html>\n<html><body/></html>"
        );
    }

    #[test]
    fn test_escaping() {
        let mut forest = Forest::new();
        let doc = forest.new_document();
        let root = forest.new_element(angle_name::Name::local("r"));
        forest.append_child(doc, root);
        forest.set_attribute(root, angle_name::Name::local("q"), "a\"b<c");
        let text = forest.new_text("1 < 2 & 3");
        forest.append_child(root, text);
        assert_eq!(
            forest.serialize(doc, &SerializeOptions::default()),
            r#"<r q="a&quot;b&lt;c">1 &lt; 2 &amp; 3</r>"#
        );
    }
}
