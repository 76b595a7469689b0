use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use angle_name::{Name, NamespaceStack};

use crate::error::{ParseError, ParseErrorKind};
use crate::forest::{Forest, Node};
use crate::lexer::{Lexer, Token};
use crate::xmlvalue::{DocType, ProcessingInstruction, Value};

/// Parser configuration.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Drop whitespace-only text nodes and trim the edges of the rest.
    pub trim_space: bool,
    /// Fail when the `<?xml ...?>` prolog is missing.
    pub require_prolog: bool,
    /// Maximum element nesting depth.
    pub max_depth: usize,
    /// Fail on prefixes without an in-scope namespace binding.
    pub strict_ns: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            trim_space: false,
            require_prolog: false,
            max_depth: 512,
            strict_ns: false,
        }
    }
}

/// Host callback for a recognized processing instruction. Returning a node
/// substitutes it for the instruction; `None` keeps the instruction itself.
pub type PiHandler =
    Box<dyn Fn(&mut Forest, &ProcessingInstruction) -> Result<Option<Node>>>;

/// Processing-instruction handlers keyed by target name.
#[derive(Default)]
pub struct PiHandlers {
    handlers: HashMap<String, PiHandler>,
}

impl PiHandlers {
    pub fn new() -> Self {
        PiHandlers {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, target: impl Into<String>, handler: PiHandler) {
        self.handlers.insert(target.into(), handler);
    }

    fn get(&self, target: &str) -> Option<&PiHandler> {
        self.handlers.get(target)
    }
}

impl Forest {
    /// Parse a document with default options.
    pub fn parse(&mut self, input: &str) -> Result<Node> {
        self.parse_with(input, &ParseOptions::default(), &PiHandlers::new())
    }

    /// Parse a document with explicit options and PI handlers.
    pub fn parse_with(
        &mut self,
        input: &str,
        options: &ParseOptions,
        handlers: &PiHandlers,
    ) -> Result<Node> {
        let mut parser = Parser {
            lexer: Lexer::new(input),
            peeked: None,
            forest: self,
            options,
            handlers,
            namespaces: NamespaceStack::new(),
        };
        parser.document()
    }
}

struct Parser<'a, 'o> {
    lexer: Lexer<'a>,
    peeked: Option<Token>,
    forest: &'o mut Forest,
    options: &'o ParseOptions,
    handlers: &'o PiHandlers,
    namespaces: NamespaceStack,
}

type Result<T> = std::result::Result<T, ParseError>;

impl Parser<'_, '_> {
    fn error(&self, kind: ParseErrorKind, message: impl Into<String>) -> ParseError {
        ParseError::new(self.lexer.line(), self.lexer.column(), kind, message)
    }

    fn next(&mut self) -> Result<Token> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.lexer.next_token(),
        }
    }

    fn peek(&mut self) -> Result<&Token> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        Ok(self.peeked.as_ref().unwrap())
    }

    fn document(&mut self) -> Result<Node> {
        let doc = self.forest.new_document();
        self.prolog(doc)?;
        let mut root = None;
        loop {
            match self.next()? {
                Token::Eof => break,
                Token::Text(text) => {
                    if !text.trim().is_empty() {
                        return Err(self.error(
                            ParseErrorKind::Document,
                            "text content outside the root element",
                        ));
                    }
                }
                Token::Comment(content) => {
                    let node = self.forest.new_comment(content);
                    self.forest.append_child(doc, node);
                }
                Token::Doctype(content) => {
                    if root.is_some() {
                        return Err(self.error(
                            ParseErrorKind::Doctype,
                            "doctype after the root element",
                        ));
                    }
                    if let Value::Document(document) = self.forest.value_mut(doc) {
                        document.doctype = Some(DocType { content });
                    }
                }
                Token::PiStart => {
                    if let Some(node) = self.processing_instruction()? {
                        self.forest.append_child(doc, node);
                    }
                }
                Token::OpenStart => {
                    if root.is_some() {
                        return Err(self.error(
                            ParseErrorKind::Document,
                            "more than one root element",
                        ));
                    }
                    let element = self.element(1)?;
                    self.forest.append_child(doc, element);
                    root = Some(element);
                }
                token => {
                    return Err(self.error(
                        ParseErrorKind::Document,
                        format!("unexpected {:?} at document level", token),
                    ));
                }
            }
        }
        if root.is_none() {
            return Err(self.error(ParseErrorKind::Document, "missing root element"));
        }
        Ok(doc)
    }

    /// The optional `<?xml version="1.0" encoding="UTF-8"?>` declaration.
    fn prolog(&mut self, doc: Node) -> Result<()> {
        let is_decl = match self.peek()? {
            Token::PiStart => true,
            _ => false,
        };
        let mut seen = false;
        if is_decl {
            // only the xml target is the prolog; any other PI is content
            self.next()?;
            let target = match self.next()? {
                Token::Name(name) => name,
                token => {
                    return Err(self.error(
                        ParseErrorKind::ProcessingInstruction,
                        format!("expected target name, found {:?}", token),
                    ))
                }
            };
            if target == "xml" {
                seen = true;
                let (attributes, _) = self.pi_content()?;
                self.apply_prolog(doc, attributes)?;
            } else {
                let node = self.finish_processing_instruction(target)?;
                if let Some(node) = node {
                    self.forest.append_child(doc, node);
                }
            }
        }
        if !seen && self.options.require_prolog {
            return Err(self.error(ParseErrorKind::Prolog, "missing XML prolog"));
        }
        Ok(())
    }

    fn apply_prolog(&mut self, doc: Node, attributes: Vec<(String, String)>) -> Result<()> {
        let mut version = None;
        let mut encoding = None;
        let mut standalone = None;
        for (name, value) in attributes {
            match name.as_str() {
                "version" => {
                    if value != "1.0" {
                        return Err(self.error(
                            ParseErrorKind::Prolog,
                            format!("unsupported XML version {:?}", value),
                        ));
                    }
                    version = Some(value);
                }
                "encoding" => {
                    if !value.eq_ignore_ascii_case("utf-8") {
                        return Err(self.error(
                            ParseErrorKind::Prolog,
                            format!("unsupported encoding {:?}", value),
                        ));
                    }
                    encoding = Some(value);
                }
                "standalone" => {
                    standalone = Some(match value.as_str() {
                        "yes" => true,
                        "no" => false,
                        _ => {
                            return Err(self.error(
                                ParseErrorKind::Prolog,
                                format!("bad standalone value {:?}", value),
                            ))
                        }
                    });
                }
                _ => {
                    return Err(self.error(
                        ParseErrorKind::Prolog,
                        format!("unknown prolog attribute {:?}", name),
                    ));
                }
            }
        }
        if version.is_none() {
            return Err(self.error(ParseErrorKind::Prolog, "prolog without version"));
        }
        if let Value::Document(document) = self.forest.value_mut(doc) {
            document.version = version;
            document.encoding = encoding;
            document.standalone = standalone;
        }
        Ok(())
    }

    /// A processing instruction after its `<?` token.
    fn processing_instruction(&mut self) -> Result<Option<Node>> {
        let target = match self.next()? {
            Token::Name(name) => name,
            token => {
                return Err(self.error(
                    ParseErrorKind::ProcessingInstruction,
                    format!("expected target name, found {:?}", token),
                ))
            }
        };
        if target == "xml" {
            return Err(self.error(
                ParseErrorKind::Prolog,
                "XML declaration not at the start of the document",
            ));
        }
        self.finish_processing_instruction(target)
    }

    fn finish_processing_instruction(&mut self, target: String) -> Result<Option<Node>> {
        if target.contains(':') {
            return Err(self.error(
                ParseErrorKind::ProcessingInstruction,
                "processing instruction targets take no prefix",
            ));
        }
        let (attributes, data) = self.pi_content()?;
        let pi = ProcessingInstruction::new(target.clone(), data, attributes);
        if let Some(handler) = self.handlers.get(&target) {
            return handler(self.forest, &pi);
        }
        let node = self
            .forest
            .new_processing_instruction(pi.name().to_string(), pi.data().to_string(), pi.attributes.clone());
        Ok(Some(node))
    }

    /// Pseudo attributes of a processing instruction, up to `?>`. Bare names
    /// without a value are kept in the data string only.
    fn pi_content(&mut self) -> Result<(Vec<(String, String)>, String)> {
        let mut attributes = Vec::new();
        let mut data_parts: Vec<String> = Vec::new();
        loop {
            match self.next()? {
                Token::PiEnd => break,
                Token::Name(name) => {
                    if matches!(self.peek()?, Token::Equals) {
                        self.next()?;
                        match self.next()? {
                            Token::AttrValue(value) => {
                                data_parts.push(format!("{}=\"{}\"", name, value));
                                attributes.push((name, value));
                            }
                            token => {
                                return Err(self.error(
                                    ParseErrorKind::ProcessingInstruction,
                                    format!("expected quoted value, found {:?}", token),
                                ))
                            }
                        }
                    } else {
                        data_parts.push(name);
                    }
                }
                token => {
                    return Err(self.error(
                        ParseErrorKind::ProcessingInstruction,
                        format!("unexpected {:?} in processing instruction", token),
                    ))
                }
            }
        }
        Ok((attributes, data_parts.join(" ")))
    }

    /// An element after its `<` token.
    fn element(&mut self, depth: usize) -> Result<Node> {
        if depth > self.options.max_depth {
            return Err(self.error(
                ParseErrorKind::Element,
                format!("nesting deeper than {} elements", self.options.max_depth),
            ));
        }
        let raw_name = match self.next()? {
            Token::Name(name) => name,
            token => {
                return Err(self.error(
                    ParseErrorKind::Element,
                    format!("expected element name, found {:?}", token),
                ))
            }
        };

        // raw attributes as written, in order
        let mut raw_attributes: Vec<(String, String)> = Vec::new();
        let self_closing = loop {
            match self.next()? {
                Token::TagEnd => break false,
                Token::SelfCloseEnd => break true,
                Token::Name(name) => {
                    match self.next()? {
                        Token::Equals => {}
                        token => {
                            return Err(self.error(
                                ParseErrorKind::Attribute,
                                format!("expected '=' after {:?}, found {:?}", name, token),
                            ))
                        }
                    }
                    match self.next()? {
                        Token::AttrValue(value) => raw_attributes.push((name, value)),
                        token => {
                            return Err(self.error(
                                ParseErrorKind::Attribute,
                                format!("expected quoted value, found {:?}", token),
                            ))
                        }
                    }
                }
                token => {
                    return Err(self.error(
                        ParseErrorKind::Element,
                        format!("unexpected {:?} in tag", token),
                    ));
                }
            }
        };

        // the element scopes the declarations it introduces
        self.namespaces.push();
        for (name, value) in &raw_attributes {
            let (prefix, local) = Name::split_prefix(name);
            if prefix == Some("xmlns") {
                self.namespaces.declare(local, value);
            } else if prefix.is_none() && local == "xmlns" {
                self.namespaces.declare("", value);
            }
        }

        let name = self.resolve_element_name(&raw_name)?;
        let element = self.forest.new_element(name);

        let mut seen: HashSet<Name> = HashSet::new();
        for (raw, value) in raw_attributes {
            let name = self.resolve_attribute_name(&raw)?;
            if !seen.insert(name.clone()) {
                self.namespaces.pop();
                return Err(self.error(
                    ParseErrorKind::Attribute,
                    format!("duplicate attribute {:?}", raw),
                ));
            }
            self.forest.set_attribute(element, name, value);
        }

        if !self_closing {
            self.children(element, &raw_name, depth)?;
        }
        self.namespaces.pop();
        Ok(element)
    }

    fn children(&mut self, element: Node, open_name: &str, depth: usize) -> Result<()> {
        loop {
            match self.next()? {
                Token::Eof => {
                    return Err(self.error(
                        ParseErrorKind::Element,
                        format!("missing close tag for {:?}", open_name),
                    ));
                }
                Token::Text(text) => {
                    let content = if self.options.trim_space {
                        let trimmed = text.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        trimmed.to_string()
                    } else {
                        text
                    };
                    let node = self.forest.new_text(content);
                    self.forest.append_child(element, node);
                }
                Token::Cdata(content) => {
                    let node = self.forest.new_cdata(content);
                    self.forest.append_child(element, node);
                }
                Token::Comment(content) => {
                    let node = self.forest.new_comment(content);
                    self.forest.append_child(element, node);
                }
                Token::PiStart => {
                    if let Some(node) = self.processing_instruction()? {
                        self.forest.append_child(element, node);
                    }
                }
                Token::OpenStart => {
                    let child = self.element(depth + 1)?;
                    self.forest.append_child(element, child);
                }
                Token::CloseStart => {
                    let close_name = match self.next()? {
                        Token::Name(name) => name,
                        token => {
                            return Err(self.error(
                                ParseErrorKind::Element,
                                format!("expected element name, found {:?}", token),
                            ))
                        }
                    };
                    if close_name != open_name {
                        return Err(self.error(
                            ParseErrorKind::Element,
                            format!("close tag {:?} does not match {:?}", close_name, open_name),
                        ));
                    }
                    match self.next()? {
                        Token::TagEnd => return Ok(()),
                        token => {
                            return Err(self.error(
                                ParseErrorKind::Element,
                                format!("expected '>', found {:?}", token),
                            ))
                        }
                    }
                }
                token => {
                    return Err(self.error(
                        ParseErrorKind::Element,
                        format!("unexpected {:?} in element content", token),
                    ));
                }
            }
        }
    }

    fn resolve_element_name(&self, raw: &str) -> Result<Name> {
        let (prefix, local) = Name::split_prefix(raw);
        match prefix {
            Some(prefix) => match self.namespaces.resolve(prefix) {
                Some(uri) => Ok(Name::prefixed(prefix, local, uri)),
                None => self.unbound_prefix(raw, prefix, local),
            },
            None => match self.namespaces.default_namespace() {
                Some(uri) => Ok(Name::namespaced(local, uri)),
                None => Ok(Name::local(local)),
            },
        }
    }

    /// Unprefixed attributes are in no namespace; the default namespace does
    /// not apply to them.
    fn resolve_attribute_name(&self, raw: &str) -> Result<Name> {
        let (prefix, local) = Name::split_prefix(raw);
        match prefix {
            Some(prefix) => match self.namespaces.resolve(prefix) {
                Some(uri) => Ok(Name::prefixed(prefix, local, uri)),
                None => self.unbound_prefix(raw, prefix, local),
            },
            None => Ok(Name::local(local)),
        }
    }

    fn unbound_prefix(&self, raw: &str, prefix: &str, local: &str) -> Result<Name> {
        if self.options.strict_ns {
            Err(self.error(
                ParseErrorKind::Namespace,
                format!("prefix {:?} is not bound to a namespace", prefix),
            ))
        } else {
            Ok(Name::new(local, None, Some(prefix.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmlvalue::NodeKind;

    #[test]
    fn test_parse_simple() {
        let mut forest = Forest::new();
        let doc = forest.parse("<r><n>1</n><n>2</n></r>").unwrap();
        let root = forest.document_element(doc).unwrap();
        assert_eq!(forest.name(root).unwrap().local_name(), "r");
        assert_eq!(forest.children(root).len(), 2);
        assert_eq!(forest.string_value(root), "12");
    }

    #[test]
    fn test_parse_prolog() {
        let mut forest = Forest::new();
        let doc = forest
            .parse("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><r/>")
            .unwrap();
        match forest.value(doc) {
            Value::Document(document) => {
                assert_eq!(document.version.as_deref(), Some("1.0"));
                assert_eq!(document.encoding.as_deref(), Some("UTF-8"));
                assert_eq!(document.standalone, Some(true));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_reject_non_utf8_encoding() {
        let mut forest = Forest::new();
        let err = forest
            .parse("<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r/>")
            .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Prolog);
    }

    #[test]
    fn test_require_prolog() {
        let mut forest = Forest::new();
        let options = ParseOptions {
            require_prolog: true,
            ..ParseOptions::default()
        };
        let err = forest
            .parse_with("<r/>", &options, &PiHandlers::new())
            .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Prolog);
    }

    #[test]
    fn test_mismatched_close_tag() {
        let mut forest = Forest::new();
        let err = forest.parse("<a><b></c></a>").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Element);
    }

    #[test]
    fn test_duplicate_attribute() {
        let mut forest = Forest::new();
        let err = forest.parse(r#"<a b="1" b="2"/>"#).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Attribute);
    }

    #[test]
    fn test_duplicate_attribute_via_namespace() {
        let mut forest = Forest::new();
        // x:b and y:b resolve to the same (local, uri) pair
        let err = forest
            .parse(r#"<a xmlns:x="urn:n" xmlns:y="urn:n" x:b="1" y:b="2"/>"#)
            .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Attribute);
    }

    #[test]
    fn test_namespace_scoping() {
        let mut forest = Forest::new();
        let doc = forest
            .parse(r#"<a xmlns="urn:outer"><b xmlns="urn:inner"/><c/></a>"#)
            .unwrap();
        let a = forest.document_element(doc).unwrap();
        let b = forest.children(a)[0];
        let c = forest.children(a)[1];
        assert_eq!(forest.name(a).unwrap().uri(), Some("urn:outer"));
        assert_eq!(forest.name(b).unwrap().uri(), Some("urn:inner"));
        assert_eq!(forest.name(c).unwrap().uri(), Some("urn:outer"));
    }

    #[test]
    fn test_strict_ns() {
        let mut forest = Forest::new();
        let options = ParseOptions {
            strict_ns: true,
            ..ParseOptions::default()
        };
        let err = forest
            .parse_with("<x:a/>", &options, &PiHandlers::new())
            .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Namespace);
        // without strict-ns the prefix is kept without a URI
        assert!(forest.parse("<x:a/>").is_ok());
    }

    #[test]
    fn test_max_depth() {
        let mut forest = Forest::new();
        let options = ParseOptions {
            max_depth: 3,
            ..ParseOptions::default()
        };
        assert!(forest
            .parse_with("<a><b><c/></b></a>", &options, &PiHandlers::new())
            .is_ok());
        let err = forest
            .parse_with("<a><b><c><d/></c></b></a>", &options, &PiHandlers::new())
            .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Element);
    }

    #[test]
    fn test_trim_space() {
        let mut forest = Forest::new();
        let options = ParseOptions {
            trim_space: true,
            ..ParseOptions::default()
        };
        let doc = forest
            .parse_with("<a>\n  <b> hi </b>\n</a>", &options, &PiHandlers::new())
            .unwrap();
        let a = forest.document_element(doc).unwrap();
        assert_eq!(forest.children(a).len(), 1);
        assert_eq!(forest.string_value(a), "hi");
    }

    #[test]
    fn test_two_roots_fail() {
        let mut forest = Forest::new();
        let err = forest.parse("<a/><b/>").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Document);
    }

    #[test]
    fn test_pi_handler_substitution() {
        let mut forest = Forest::new();
        let mut handlers = PiHandlers::new();
        handlers.register(
            "angle-include",
            Box::new(|forest, pi| {
                let name = pi.attribute("as").unwrap_or("included");
                Ok(Some(forest.new_element(Name::local(name.to_string()))))
            }),
        );
        let doc = forest
            .parse_with(
                r#"<a><?angle-include as="part"?></a>"#,
                &ParseOptions::default(),
                &handlers,
            )
            .unwrap();
        let a = forest.document_element(doc).unwrap();
        let child = forest.children(a)[0];
        assert_eq!(forest.kind(child), NodeKind::Element);
        assert_eq!(forest.name(child).unwrap().local_name(), "part");
    }

    #[test]
    fn test_pi_kept_without_handler() {
        let mut forest = Forest::new();
        let doc = forest.parse(r#"<a><?target key="v"?></a>"#).unwrap();
        let a = forest.document_element(doc).unwrap();
        let child = forest.children(a)[0];
        assert_eq!(forest.kind(child), NodeKind::ProcessingInstruction);
        match forest.value(child) {
            Value::ProcessingInstruction(pi) => {
                assert_eq!(pi.name(), "target");
                assert_eq!(pi.attribute("key"), Some("v"));
            }
            _ => unreachable!(),
        }
    }
}
