use angle_xml::{Forest, Node, SerializeOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMethod {
    #[default]
    Xml,
    Html,
    Text,
}

/// A named or unnamed `xsl:output` declaration.
#[derive(Debug, Clone, Default)]
pub struct OutputSpec {
    pub name: Option<String>,
    pub method: OutputMethod,
    pub indent: bool,
    pub omit_xml_declaration: bool,
}

impl OutputSpec {
    pub(crate) fn from_element(forest: &Forest, element: Node) -> OutputSpec {
        let method = match forest.attribute_str(element, "method") {
            Some("html") => OutputMethod::Html,
            Some("text") => OutputMethod::Text,
            _ => OutputMethod::Xml,
        };
        OutputSpec {
            name: forest.attribute_str(element, "name").map(|s| s.to_string()),
            method,
            indent: forest.attribute_str(element, "indent") == Some("yes"),
            omit_xml_declaration: forest.attribute_str(element, "omit-xml-declaration")
                == Some("yes"),
        }
    }

    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions {
            indent: if self.indent { Some(2) } else { None },
            omit_prolog: self.omit_xml_declaration,
            custom_prolog: match self.method {
                OutputMethod::Html => Some("<!DOCTYPE html>".to_string()),
                _ => None,
            },
            ..SerializeOptions::default()
        }
    }

    /// Render a result document according to the declaration.
    pub fn render(&self, forest: &Forest, doc: Node) -> String {
        match self.method {
            OutputMethod::Text => forest.string_value(doc),
            _ => forest.serialize(doc, &self.serialize_options()),
        }
    }
}
