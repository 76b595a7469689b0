use angle_name::Namespaces;
use angle_xpath::ast::Expr;
use angle_xpath::{parse, CompileOptions, Context, Evaluator};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Part {
    Text(String),
    Expr(Expr),
}

/// An attribute-value template: literal text with `{expr}` substitutions.
/// `{{` and `}}` escape literal braces.
#[derive(Debug, Clone)]
pub struct Avt {
    parts: Vec<Part>,
}

impl Avt {
    pub fn parse(text: &str, namespaces: &Namespaces) -> Result<Avt> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    if !literal.is_empty() {
                        parts.push(Part::Text(std::mem::take(&mut literal)));
                    }
                    let mut expr_text = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        expr_text.push(inner);
                    }
                    if !closed {
                        return Err(Error::Load(format!(
                            "unterminated value template in {:?}",
                            text
                        )));
                    }
                    let expr = parse(&expr_text, namespaces, &CompileOptions::default())?;
                    parts.push(Part::Expr(expr));
                }
                '}' => {
                    return Err(Error::Load(format!(
                        "stray '}}' in value template {:?}",
                        text
                    )))
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Text(literal));
        }
        Ok(Avt { parts })
    }

    /// Whether the text contains substitutions at all.
    pub fn is_literal(&self) -> bool {
        self.parts.iter().all(|part| matches!(part, Part::Text(_)))
    }

    pub fn expand(&self, evaluator: &mut Evaluator, context: &Context) -> Result<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Expr(expr) => {
                    let value = evaluator.evaluate(expr, context)?;
                    out.push_str(&value.string_join(evaluator.forest, " "));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use angle_xml::Forest;
    use angle_xpath::{Environment, Item};

    fn expand(text: &str, doc_text: &str) -> String {
        let mut forest = Forest::new();
        let doc = forest.parse(doc_text).unwrap();
        let root = forest.document_element(doc).unwrap();
        let avt = Avt::parse(text, &Namespaces::default()).unwrap();
        let mut env = Environment::new();
        let mut evaluator = Evaluator::new(&forest, &mut env);
        avt.expand(&mut evaluator, &Context::new(Item::Node(root)))
            .unwrap()
    }

    #[test]
    fn test_literal_and_expr() {
        assert_eq!(
            expand("id-{@k}-end", r#"<r k="7"/>"#),
            "id-7-end"
        );
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(expand("a{{b}}c", "<r/>"), "a{b}c");
    }

    #[test]
    fn test_unterminated_fails() {
        assert!(Avt::parse("x{@k", &Namespaces::default()).is_err());
    }
}
