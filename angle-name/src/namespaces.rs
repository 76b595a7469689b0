use ahash::{HashMap, HashMapExt};

pub const FN_NAMESPACE: &str = "http://www.w3.org/2005/xpath-functions";
pub const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

const STATIC_NAMESPACES: [(&str, &str); 3] = [
    ("xs", XS_NAMESPACE),
    ("fn", FN_NAMESPACE),
    ("xsl", XSLT_NAMESPACE),
];

/// Flat prefix to URI bindings used during query compilation.
#[derive(Debug, Clone)]
pub struct Namespaces {
    namespaces: HashMap<String, String>,
    default_element_namespace: String,
}

impl Namespaces {
    pub fn new(namespaces: HashMap<String, String>, default_element_namespace: String) -> Self {
        Self {
            namespaces,
            default_element_namespace,
        }
    }

    pub fn default_namespaces() -> HashMap<String, String> {
        let mut namespaces = HashMap::new();
        namespaces.insert("xml".to_string(), XML_NAMESPACE.to_string());
        for (prefix, uri) in STATIC_NAMESPACES.into_iter() {
            namespaces.insert(prefix.to_string(), uri.to_string());
        }
        namespaces
    }

    pub fn add(&mut self, prefix: &str, uri: &str) {
        if prefix.is_empty() {
            self.default_element_namespace = uri.to_string();
        } else {
            self.namespaces.insert(prefix.to_string(), uri.to_string());
        }
    }

    #[inline]
    pub fn by_prefix(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(|s| s.as_str())
    }

    #[inline]
    pub fn default_element_namespace(&self) -> &str {
        &self.default_element_namespace
    }
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::new(Self::default_namespaces(), String::new())
    }
}

/// Stacked prefix to URI scopes used while parsing a document.
///
/// Entering an element pushes a frame with the declarations the element
/// introduces; leaving it pops the frame. Lookup walks the stack from the
/// innermost frame outward.
#[derive(Debug, Default)]
pub struct NamespaceStack {
    frames: Vec<HashMap<String, String>>,
}

impl NamespaceStack {
    pub fn new() -> Self {
        let mut stack = NamespaceStack { frames: Vec::new() };
        let mut base = HashMap::new();
        base.insert("xml".to_string(), XML_NAMESPACE.to_string());
        base.insert("xmlns".to_string(), XMLNS_NAMESPACE.to_string());
        stack.frames.push(base);
        stack
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1);
        self.frames.pop();
    }

    /// Declare a prefix in the current frame. An empty prefix declares the
    /// default namespace.
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        self.frames
            .last_mut()
            .unwrap()
            .insert(prefix.to_string(), uri.to_string());
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        for frame in self.frames.iter().rev() {
            if let Some(uri) = frame.get(prefix) {
                return Some(uri.as_str());
            }
        }
        None
    }

    /// The in-scope default namespace, if any. An empty URI undeclares it.
    pub fn default_namespace(&self) -> Option<&str> {
        self.resolve("").filter(|uri| !uri.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_scoping() {
        let mut stack = NamespaceStack::new();
        stack.push();
        stack.declare("a", "http://example.com/outer");
        stack.push();
        stack.declare("a", "http://example.com/inner");
        assert_eq!(stack.resolve("a"), Some("http://example.com/inner"));
        stack.pop();
        assert_eq!(stack.resolve("a"), Some("http://example.com/outer"));
        stack.pop();
        assert_eq!(stack.resolve("a"), None);
    }

    #[test]
    fn test_default_namespace_undeclare() {
        let mut stack = NamespaceStack::new();
        stack.push();
        stack.declare("", "http://example.com");
        assert_eq!(stack.default_namespace(), Some("http://example.com"));
        stack.push();
        stack.declare("", "");
        assert_eq!(stack.default_namespace(), None);
        stack.pop();
        stack.pop();
    }

    #[test]
    fn test_xml_prefix_is_predeclared() {
        let stack = NamespaceStack::new();
        assert_eq!(stack.resolve("xml"), Some(XML_NAMESPACE));
    }
}
