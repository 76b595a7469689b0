use std::borrow::Cow;

use logos::{Lexer, Logos};

pub type Span = std::ops::Range<usize>;

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken<'a> {
    pub token: Token<'a>,
    pub span: Span,
}

#[derive(Logos, Clone, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(subpattern name_start_char_without_colon = r"[A-Za-z_\u{c0}-\u{d6}\u{d8}-\u{f6}\u{f8}-\u{2ff}\u{370}-\u{37d}\u{37f}-\u{1fff}\u{200c}-\u{200d}\u{2070}-\u{218f}\u{2c00}-\u{2fef}\u{3001}-\u{d7ff}\u{f900}-\u{fdfc}\u{fdf0}-\u{fffd}\u{10000}-\u{effff}]")]
#[logos(subpattern name_char_without_colon = r"(?&name_start_char_without_colon)|[\-\.0-9\u{b7}\u{300}-\u{36F}\u{203f}-\u{2040}]")]
#[logos(subpattern ncname = r"(?&name_start_char_without_colon)(?&name_char_without_colon)*")]
pub enum Token<'a> {
    Error,

    #[regex(r"[0-9]+", integer_literal, priority = 3)]
    IntegerLiteral(i64),
    #[regex(r"(\.[0-9]+)|([0-9]+\.[0-9]*)", number_literal, priority = 2)]
    DecimalLiteral(f64),
    #[regex(
        r"(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][+-]?[0-9]+)",
        number_literal,
        priority = 2
    )]
    DoubleLiteral(f64),
    #[regex(r#""(?:""|[^"])*"|'(?:''|[^'])*'"#, string_literal, priority = 1)]
    StringLiteral(Cow<'a, str>),
    // QNames are assembled in the parser; the lexer only knows NCNames, so
    // `ns:local` arrives as NCName Colon NCName without interior whitespace
    #[regex(r"(?&ncname)", priority = 2)]
    NCName(&'a str),

    #[token("!=")]
    NotEqual,
    #[token("$")]
    Dollar,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("*")]
    Asterisk,
    #[token("+")]
    Plus,
    #[token(",")]
    Comma,
    #[token("-")]
    Minus,
    #[token(".")]
    Dot,
    #[token("..")]
    DotDot,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token(":")]
    Colon,
    #[token("::")]
    DoubleColon,
    #[token(":=")]
    ColonEqual,
    #[token("<")]
    LessThan,
    #[token("<=")]
    LessThanEqual,
    #[token("=")]
    Equal,
    #[token(">")]
    GreaterThan,
    #[token(">=")]
    GreaterThanEqual,
    #[token("?")]
    QuestionMark,
    #[token("@")]
    At,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("|")]
    Pipe,
    #[token("||")]
    DoublePipe,

    #[token("ancestor")]
    Ancestor,
    #[token("ancestor-or-self")]
    AncestorOrSelf,
    #[token("and")]
    And,
    #[token("as")]
    As,
    #[token("attribute")]
    Attribute,
    #[token("cast")]
    Cast,
    #[token("castable")]
    Castable,
    #[token("child")]
    Child,
    #[token("comment")]
    Comment,
    #[token("descendant")]
    Descendant,
    #[token("descendant-or-self")]
    DescendantOrSelf,
    #[token("div")]
    Div,
    #[token("document-node")]
    DocumentNode,
    #[token("element")]
    Element,
    #[token("else")]
    Else,
    #[token("eq")]
    Eq,
    #[token("every")]
    Every,
    #[token("except")]
    Except,
    #[token("following")]
    Following,
    #[token("following-sibling")]
    FollowingSibling,
    #[token("for")]
    For,
    #[token("ge")]
    Ge,
    #[token("gt")]
    Gt,
    #[token("if")]
    If,
    #[token("in")]
    In,
    #[token("instance")]
    Instance,
    #[token("intersect")]
    Intersect,
    #[token("le")]
    Le,
    #[token("let")]
    Let,
    #[token("lt")]
    Lt,
    #[token("mod")]
    Mod,
    #[token("ne")]
    Ne,
    #[token("node")]
    NodeKeyword,
    #[token("of")]
    Of,
    #[token("or")]
    Or,
    #[token("parent")]
    Parent,
    #[token("preceding")]
    Preceding,
    #[token("preceding-sibling")]
    PrecedingSibling,
    #[token("processing-instruction")]
    ProcessingInstructionKeyword,
    #[token("return")]
    Return,
    #[token("satisfies")]
    Satisfies,
    #[token("self")]
    SelfKeyword,
    #[token("some")]
    Some,
    #[token("text")]
    TextKeyword,
    #[token("then")]
    Then,
    #[token("to")]
    To,
    #[token("union")]
    Union,
}

fn integer_literal<'a>(lexer: &mut Lexer<'a, Token<'a>>) -> Option<i64> {
    lexer.slice().parse().ok()
}

fn number_literal<'a>(lexer: &mut Lexer<'a, Token<'a>>) -> Option<f64> {
    lexer.slice().parse().ok()
}

fn string_literal<'a>(lexer: &mut Lexer<'a, Token<'a>>) -> Cow<'a, str> {
    let slice = lexer.slice();
    let quote = &slice[0..1];
    let inner = &slice[1..slice.len() - 1];
    let doubled = [quote, quote].concat();
    if inner.contains(&doubled) {
        Cow::Owned(inner.replace(&doubled, quote))
    } else {
        Cow::Borrowed(inner)
    }
}

/// Tokenize a whole expression. Unlexable input surfaces as [`Token::Error`]
/// with the offending span.
pub fn tokenize(input: &str) -> Vec<SpannedToken<'_>> {
    Token::lexer(input)
        .spanned()
        .map(|(token, span)| SpannedToken {
            token: token.unwrap_or(Token::Error),
            span,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token<'_>> {
        tokenize(input).into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_path_tokens() {
        assert_eq!(
            kinds("/a//b[@c]"),
            vec![
                Token::Slash,
                Token::NCName("a"),
                Token::DoubleSlash,
                Token::NCName("b"),
                Token::LeftBracket,
                Token::At,
                Token::NCName("c"),
                Token::RightBracket,
            ]
        );
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(
            kinds("1 2.5 .5 1e3"),
            vec![
                Token::IntegerLiteral(1),
                Token::DecimalLiteral(2.5),
                Token::DecimalLiteral(0.5),
                Token::DoubleLiteral(1000.0),
            ]
        );
    }

    #[test]
    fn test_string_literal_doubled_quotes() {
        assert_eq!(
            kinds(r#""say ""hi""""#),
            vec![Token::StringLiteral(Cow::Owned(r#"say "hi""#.to_string()))]
        );
        assert_eq!(
            kinds("'it''s'"),
            vec![Token::StringLiteral(Cow::Owned("it's".to_string()))]
        );
    }

    #[test]
    fn test_keywords_and_ncnames() {
        assert_eq!(
            kinds("some $x in android"),
            vec![
                Token::Some,
                Token::Dollar,
                Token::NCName("x"),
                Token::In,
                Token::NCName("android"),
            ]
        );
    }

    #[test]
    fn test_prefixed_name() {
        assert_eq!(
            kinds("xs:integer"),
            vec![Token::NCName("xs"), Token::Colon, Token::NCName("integer")]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a != b || 'x'"),
            vec![
                Token::NCName("a"),
                Token::NotEqual,
                Token::NCName("b"),
                Token::DoublePipe,
                Token::StringLiteral(Cow::Borrowed("x")),
            ]
        );
    }

    #[test]
    fn test_error_token() {
        assert!(kinds("a # b").contains(&Token::Error));
    }
}
