//! Token definitions and lexer for the XPath grammar.

mod lexer;
mod reserved;

pub use lexer::{tokenize, Span, SpannedToken, Token};
pub use reserved::keyword_text;
