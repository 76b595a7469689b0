use thiserror::Error;

/// What part of the document the parser was working on when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    Prolog,
    Doctype,
    Element,
    Attribute,
    Text,
    Comment,
    Cdata,
    ProcessingInstruction,
    Entity,
    Namespace,
    Document,
}

impl ParseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::Prolog => "prolog",
            ParseErrorKind::Doctype => "doctype",
            ParseErrorKind::Element => "element",
            ParseErrorKind::Attribute => "attribute",
            ParseErrorKind::Text => "text",
            ParseErrorKind::Comment => "comment",
            ParseErrorKind::Cdata => "cdata",
            ParseErrorKind::ProcessingInstruction => "processing-instruction",
            ParseErrorKind::Entity => "entity",
            ParseErrorKind::Namespace => "namespace",
            ParseErrorKind::Document => "document",
        }
    }
}

/// A parse failure with its position and the construct being parsed.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{line}:{column}: {}: {message}", kind.as_str())]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub kind: ParseErrorKind,
    pub message: String,
}

impl ParseError {
    pub fn new(line: u32, column: u32, kind: ParseErrorKind, message: impl Into<String>) -> Self {
        ParseError {
            line,
            column,
            kind,
            message: message.into(),
        }
    }
}
