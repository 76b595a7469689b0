use angle_name::Name;

/// The kind of a node, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Cdata,
    Comment,
    ProcessingInstruction,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Element => "element",
            NodeKind::Attribute => "attribute",
            NodeKind::Text => "text",
            NodeKind::Cdata => "cdata",
            NodeKind::Comment => "comment",
            NodeKind::ProcessingInstruction => "processing-instruction",
        }
    }
}

/// A document type declaration, kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct DocType {
    pub content: String,
}

/// Document payload: prolog information and an optional doctype.
///
/// The document's children (comments, processing instructions and exactly one
/// root element) are stored in the arena, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub version: Option<String>,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
    pub doctype: Option<DocType>,
}

impl Document {
    pub fn new() -> Self {
        Document {
            version: None,
            encoding: None,
            standalone: None,
            doctype: None,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Element payload. Attribute nodes are owned by the arena; the element keeps
/// their ids in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub(crate) name: Name,
    pub(crate) attributes: Vec<super::Node>,
}

impl Element {
    pub fn new(name: Name) -> Self {
        Element {
            name,
            attributes: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn set_name(&mut self, name: Name) {
        self.name = name;
    }

    #[inline]
    pub fn attribute_nodes(&self) -> &[super::Node] {
        &self.attributes
    }
}

/// Attribute payload. The owner element and ordinal live in the node's
/// parent/position links.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub(crate) name: Name,
    pub(crate) value: String,
}

impl Attribute {
    pub fn new(name: Name, value: String) -> Self {
        Attribute { name, value }
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: String) {
        self.value = value;
    }

    /// Whether this attribute is a namespace declaration (`xmlns` or
    /// `xmlns:prefix`).
    pub fn is_namespace_declaration(&self) -> bool {
        self.name.prefix() == Some("xmlns")
            || (self.name.prefix().is_none() && self.name.local_name() == "xmlns")
    }

    /// The prefix a namespace declaration introduces; empty for the default
    /// namespace. `None` if this is not a declaration.
    pub fn declared_prefix(&self) -> Option<&str> {
        if self.name.prefix() == Some("xmlns") {
            Some(self.name.local_name())
        } else if self.name.prefix().is_none() && self.name.local_name() == "xmlns" {
            Some("")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub(crate) content: String,
}

impl Text {
    pub fn new(content: String) -> Self {
        Text { content }
    }

    #[inline]
    pub fn get(&self) -> &str {
        &self.content
    }

    pub fn set(&mut self, content: String) {
        self.content = content;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub(crate) content: String,
}

impl Comment {
    pub fn new(content: String) -> Self {
        Comment { content }
    }

    #[inline]
    pub fn get(&self) -> &str {
        &self.content
    }
}

/// Processing instruction payload: a name (no namespace) and pseudo
/// attributes, plus the raw data as written.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingInstruction {
    pub(crate) name: String,
    pub(crate) data: String,
    pub(crate) attributes: Vec<(String, String)>,
}

impl ProcessingInstruction {
    pub fn new(name: String, data: String, attributes: Vec<(String, String)>) -> Self {
        ProcessingInstruction {
            name,
            data,
            attributes,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Node payload: one variant per node kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Document(Document),
    Element(Element),
    Attribute(Attribute),
    Text(Text),
    Cdata(Text),
    Comment(Comment),
    ProcessingInstruction(ProcessingInstruction),
}

impl Value {
    pub fn kind(&self) -> NodeKind {
        match self {
            Value::Document(_) => NodeKind::Document,
            Value::Element(_) => NodeKind::Element,
            Value::Attribute(_) => NodeKind::Attribute,
            Value::Text(_) => NodeKind::Text,
            Value::Cdata(_) => NodeKind::Cdata,
            Value::Comment(_) => NodeKind::Comment,
            Value::ProcessingInstruction(_) => NodeKind::ProcessingInstruction,
        }
    }
}
