//! Pratt-style precedence parser from tokens to the expression tree.

use angle_name::{Name, Namespaces, FN_NAMESPACE};
use angle_xpath_lexer::{keyword_text, tokenize, SpannedToken, Token};

use crate::ast::{
    Axis, BinaryOp, Binding, Expr, KindTest, Literal, NameTest, NodeTest, PathExpr, PathRoot, Step,
};
use crate::error::{Error, Result};
use crate::types::XdmType;

/// How bare relative paths are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileMode {
    /// Plain XPath: relative paths start at the context item.
    #[default]
    Xpath,
    /// Schematron-style contexts: a top-level bare path like `Foo/Bar` is
    /// rebased on `//` from the document root.
    Xsl,
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub mode: CompileMode,
    /// Fail compilation on prefixes without a namespace binding.
    pub strict: bool,
}

/// Compile an expression against a namespace list.
pub fn parse(input: &str, namespaces: &Namespaces, options: &CompileOptions) -> Result<Expr> {
    let tokens = tokenize(input);
    let mut parser = Parser {
        tokens,
        pos: 0,
        namespaces,
        options,
    };
    let expr = parser.expr()?;
    parser.expect_eof()?;
    Ok(match options.mode {
        CompileMode::Xpath => expr,
        CompileMode::Xsl => rebase(expr),
    })
}

/// Rebase top-level relative paths on `//` from the document root.
fn rebase(expr: Expr) -> Expr {
    match expr {
        Expr::Path(path) if path.root == PathRoot::Relative => Expr::Path(PathExpr {
            root: PathRoot::DocumentDescendant,
            steps: path.steps,
        }),
        Expr::Binary { op, left, right }
            if matches!(op, BinaryOp::Union | BinaryOp::Intersect | BinaryOp::Except) =>
        {
            Expr::Binary {
                op,
                left: Box::new(rebase(*left)),
                right: Box::new(rebase(*right)),
            }
        }
        Expr::SequenceExpr(exprs) => Expr::SequenceExpr(exprs.into_iter().map(rebase).collect()),
        other => other,
    }
}

struct Parser<'a, 'o> {
    tokens: Vec<SpannedToken<'a>>,
    pos: usize,
    namespaces: &'o Namespaces,
    options: &'o CompileOptions,
}

/// Binding powers for the infix ladder, loosest first.
fn binding_power(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => 1,
        BinaryOp::And => 2,
        BinaryOp::GeneralEq
        | BinaryOp::GeneralNe
        | BinaryOp::GeneralLt
        | BinaryOp::GeneralLe
        | BinaryOp::GeneralGt
        | BinaryOp::GeneralGe
        | BinaryOp::ValueEq
        | BinaryOp::ValueNe
        | BinaryOp::ValueLt
        | BinaryOp::ValueLe
        | BinaryOp::ValueGt
        | BinaryOp::ValueGe => 3,
        BinaryOp::Concat => 4,
        BinaryOp::Range => 5,
        BinaryOp::Add | BinaryOp::Subtract => 6,
        BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 7,
        BinaryOp::Union => 8,
        BinaryOp::Intersect | BinaryOp::Except => 9,
    }
}

impl<'a> Parser<'a, '_> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token<'a>> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {:?}", token)))
        }
    }

    fn expect_eof(&self) -> Result<()> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(self.unexpected("expected end of expression"))
        }
    }

    fn unexpected(&self, context: &str) -> Error {
        match self.tokens.get(self.pos) {
            Some(token) => Error::Compile(format!("{}, found {:?}", context, token.token)),
            None => Error::Compile(format!("{} at end of input", context)),
        }
    }

    /// Top level: comma-separated sequence.
    fn expr(&mut self) -> Result<Expr> {
        let first = self.expr_single()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&Token::Comma) {
            exprs.push(self.expr_single()?);
        }
        Ok(Expr::SequenceExpr(exprs))
    }

    fn expr_single(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::If) if self.peek_at(1) == Some(&Token::LeftParen) => self.if_expr(),
            Some(Token::For) if self.peek_at(1) == Some(&Token::Dollar) => self.for_expr(),
            Some(Token::Let) if self.peek_at(1) == Some(&Token::Dollar) => self.let_expr(),
            Some(Token::Some | Token::Every) if self.peek_at(1) == Some(&Token::Dollar) => {
                self.quantified_expr()
            }
            _ => self.binary_expr(0),
        }
    }

    fn if_expr(&mut self) -> Result<Expr> {
        self.expect(&Token::If)?;
        self.expect(&Token::LeftParen)?;
        let condition = self.expr()?;
        self.expect(&Token::RightParen)?;
        self.expect(&Token::Then)?;
        let then = self.expr_single()?;
        self.expect(&Token::Else)?;
        let otherwise = self.expr_single()?;
        Ok(Expr::If {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn bindings(&mut self, separator: &Token) -> Result<Vec<Binding>> {
        let mut bindings = Vec::new();
        loop {
            self.expect(&Token::Dollar)?;
            let name = self.variable_name()?;
            self.expect(separator)?;
            let expr = self.expr_single()?;
            bindings.push(Binding { name, expr });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(bindings)
    }

    fn for_expr(&mut self) -> Result<Expr> {
        self.expect(&Token::For)?;
        let bindings = self.bindings(&Token::In)?;
        self.expect(&Token::Return)?;
        let body = self.expr_single()?;
        Ok(Expr::For {
            bindings,
            body: Box::new(body),
        })
    }

    fn let_expr(&mut self) -> Result<Expr> {
        self.expect(&Token::Let)?;
        let bindings = self.bindings(&Token::ColonEqual)?;
        self.expect(&Token::Return)?;
        let body = self.expr_single()?;
        Ok(Expr::Let {
            bindings,
            body: Box::new(body),
        })
    }

    fn quantified_expr(&mut self) -> Result<Expr> {
        let every = match self.advance() {
            Some(Token::Some) => false,
            Some(Token::Every) => true,
            _ => unreachable!("caller checked the quantifier keyword"),
        };
        let bindings = self.bindings(&Token::In)?;
        self.expect(&Token::Satisfies)?;
        let satisfies = self.expr_single()?;
        Ok(Expr::Quantified {
            every,
            bindings,
            satisfies: Box::new(satisfies),
        })
    }

    fn infix_op(&self) -> Option<BinaryOp> {
        Some(match self.peek()? {
            Token::Or => BinaryOp::Or,
            Token::And => BinaryOp::And,
            Token::Equal => BinaryOp::GeneralEq,
            Token::NotEqual => BinaryOp::GeneralNe,
            Token::LessThan => BinaryOp::GeneralLt,
            Token::LessThanEqual => BinaryOp::GeneralLe,
            Token::GreaterThan => BinaryOp::GeneralGt,
            Token::GreaterThanEqual => BinaryOp::GeneralGe,
            Token::Eq => BinaryOp::ValueEq,
            Token::Ne => BinaryOp::ValueNe,
            Token::Lt => BinaryOp::ValueLt,
            Token::Le => BinaryOp::ValueLe,
            Token::Gt => BinaryOp::ValueGt,
            Token::Ge => BinaryOp::ValueGe,
            Token::DoublePipe => BinaryOp::Concat,
            Token::To => BinaryOp::Range,
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Subtract,
            Token::Asterisk => BinaryOp::Multiply,
            Token::Div => BinaryOp::Divide,
            Token::Mod => BinaryOp::Modulo,
            Token::Pipe | Token::Union => BinaryOp::Union,
            Token::Intersect => BinaryOp::Intersect,
            Token::Except => BinaryOp::Except,
            _ => return None,
        })
    }

    fn binary_expr(&mut self, min_power: u8) -> Result<Expr> {
        let mut left = self.unary_expr()?;
        while let Some(op) = self.infix_op() {
            let power = binding_power(op);
            if power < min_power {
                break;
            }
            self.advance();
            let right = self.binary_expr(power + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            let operand = self.unary_expr()?;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        // unary plus is a no-op
        if self.eat(&Token::Plus) {
            return self.unary_expr();
        }
        self.typed_expr()
    }

    /// `cast as`, `castable as` and `instance of` postfix forms.
    fn typed_expr(&mut self) -> Result<Expr> {
        let expr = self.path_expr()?;
        match self.peek() {
            Some(Token::Cast) if self.peek_at(1) == Some(&Token::As) => {
                self.advance();
                self.advance();
                let (target, optional) = self.type_name()?;
                Ok(Expr::Cast {
                    expr: Box::new(expr),
                    target,
                    optional,
                })
            }
            Some(Token::Castable) if self.peek_at(1) == Some(&Token::As) => {
                self.advance();
                self.advance();
                let (target, optional) = self.type_name()?;
                Ok(Expr::Castable {
                    expr: Box::new(expr),
                    target,
                    optional,
                })
            }
            Some(Token::Instance) if self.peek_at(1) == Some(&Token::Of) => {
                self.advance();
                self.advance();
                let (target, optional) = self.type_name()?;
                Ok(Expr::InstanceOf {
                    expr: Box::new(expr),
                    target,
                    optional,
                })
            }
            _ => Ok(expr),
        }
    }

    fn type_name(&mut self) -> Result<(XdmType, bool)> {
        // kind-test style types double as sequence types here
        let target = match self.peek() {
            Some(Token::NodeKeyword) if self.peek_at(1) == Some(&Token::LeftParen) => {
                self.advance();
                self.advance();
                self.expect(&Token::RightParen)?;
                XdmType::Node
            }
            _ => {
                let name = self.qname(false)?;
                XdmType::by_name(&name)?
            }
        };
        let optional = self.eat(&Token::QuestionMark);
        Ok((target, optional))
    }

    // --- paths

    fn path_expr(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Slash) => {
                self.advance();
                if self.starts_step() {
                    let steps = self.relative_steps()?;
                    Ok(Expr::Path(PathExpr {
                        root: PathRoot::Document,
                        steps,
                    }))
                } else {
                    Ok(Expr::Root)
                }
            }
            Some(Token::DoubleSlash) => {
                self.advance();
                let steps = self.relative_steps()?;
                Ok(Expr::Path(PathExpr {
                    root: PathRoot::DocumentDescendant,
                    steps,
                }))
            }
            _ => self.relative_path(),
        }
    }

    fn relative_path(&mut self) -> Result<Expr> {
        let first = self.step_expr()?;
        let continues = matches!(self.peek(), Some(Token::Slash | Token::DoubleSlash));
        match first {
            StepOrExpr::Step(step) => {
                let mut steps = vec![step];
                if continues {
                    steps.extend(self.more_steps()?);
                }
                Ok(Expr::Path(PathExpr {
                    root: PathRoot::Relative,
                    steps,
                }))
            }
            StepOrExpr::Expr(expr) => {
                if continues {
                    let steps = self.more_steps()?;
                    Ok(Expr::Path(PathExpr {
                        root: PathRoot::Expr(Box::new(expr)),
                        steps,
                    }))
                } else {
                    Ok(expr)
                }
            }
        }
    }

    fn relative_steps(&mut self) -> Result<Vec<Step>> {
        let mut steps = Vec::new();
        match self.step_expr()? {
            StepOrExpr::Step(step) => steps.push(step),
            StepOrExpr::Expr(_) => {
                return Err(Error::Compile(
                    "a primary expression cannot follow '/' or '//'".to_string(),
                ))
            }
        }
        steps.extend(self.more_steps()?);
        Ok(steps)
    }

    fn more_steps(&mut self) -> Result<Vec<Step>> {
        let mut steps = Vec::new();
        loop {
            if self.eat(&Token::DoubleSlash) {
                steps.push(Step {
                    axis: Axis::DescendantOrSelf,
                    test: NodeTest::Kind(KindTest::Node),
                    predicates: Vec::new(),
                });
            } else if !self.eat(&Token::Slash) {
                break;
            }
            match self.step_expr()? {
                StepOrExpr::Step(step) => steps.push(step),
                StepOrExpr::Expr(_) => {
                    return Err(Error::Compile(
                        "a primary expression cannot follow '/' or '//'".to_string(),
                    ))
                }
            }
        }
        Ok(steps)
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::NCName(_)
                    | Token::Asterisk
                    | Token::At
                    | Token::DotDot
                    | Token::Dot
                    | Token::NodeKeyword
                    | Token::TextKeyword
                    | Token::Comment
                    | Token::ProcessingInstructionKeyword
                    | Token::Element
                    | Token::Attribute
                    | Token::DocumentNode
            )
        ) || self
            .peek()
            .map(|t| keyword_text(t).is_some())
            .unwrap_or(false)
    }

    fn step_expr(&mut self) -> Result<StepOrExpr> {
        // reverse step shorthand
        if self.eat(&Token::DotDot) {
            return Ok(StepOrExpr::Step(Step {
                axis: Axis::Parent,
                test: NodeTest::Kind(KindTest::Node),
                predicates: self.predicates()?,
            }));
        }
        // attribute shorthand
        if self.eat(&Token::At) {
            let test = self.node_test(Axis::Attribute)?;
            return Ok(StepOrExpr::Step(Step {
                axis: Axis::Attribute,
                test,
                predicates: self.predicates()?,
            }));
        }
        // explicit axis
        if let Some(axis) = self.leading_axis() {
            self.advance();
            self.advance();
            let test = self.node_test(axis)?;
            return Ok(StepOrExpr::Step(Step {
                axis,
                test,
                predicates: self.predicates()?,
            }));
        }
        // kind tests and name tests in the default child axis
        if self.starts_node_test() {
            let test = self.node_test(Axis::Child)?;
            // an attribute kind test selects from the attribute axis
            let axis = match &test {
                NodeTest::Kind(KindTest::Attribute(_)) => Axis::Attribute,
                _ => Axis::Child,
            };
            return Ok(StepOrExpr::Step(Step {
                axis,
                test,
                predicates: self.predicates()?,
            }));
        }
        // otherwise: a primary expression with optional predicates
        let base = self.primary_expr()?;
        let predicates = self.predicates()?;
        if predicates.is_empty() {
            Ok(StepOrExpr::Expr(base))
        } else {
            Ok(StepOrExpr::Expr(Expr::Filter {
                base: Box::new(base),
                predicates,
            }))
        }
    }

    fn leading_axis(&self) -> Option<Axis> {
        if self.peek_at(1) != Some(&Token::DoubleColon) {
            return None;
        }
        Some(match self.peek()? {
            Token::Child => Axis::Child,
            Token::Parent => Axis::Parent,
            Token::SelfKeyword => Axis::SelfAxis,
            Token::Ancestor => Axis::Ancestor,
            Token::AncestorOrSelf => Axis::AncestorOrSelf,
            Token::Descendant => Axis::Descendant,
            Token::DescendantOrSelf => Axis::DescendantOrSelf,
            Token::Following => Axis::Following,
            Token::FollowingSibling => Axis::FollowingSibling,
            Token::Preceding => Axis::Preceding,
            Token::PrecedingSibling => Axis::PrecedingSibling,
            Token::Attribute => Axis::Attribute,
            _ => return None,
        })
    }

    fn starts_node_test(&self) -> bool {
        match self.peek() {
            Some(Token::Asterisk) => true,
            Some(
                Token::NodeKeyword
                | Token::TextKeyword
                | Token::Comment
                | Token::ProcessingInstructionKeyword
                | Token::Element
                | Token::Attribute
                | Token::DocumentNode,
            ) if self.peek_at(1) == Some(&Token::LeftParen) => true,
            Some(Token::NCName(_)) => {
                // a name followed by '(' is a function call, not a name test
                self.peek_at(1) != Some(&Token::LeftParen)
                    && !(self.peek_at(1) == Some(&Token::Colon)
                        && self.peek_at(3) == Some(&Token::LeftParen))
            }
            Some(token) => {
                keyword_text(token).is_some() && self.peek_at(1) != Some(&Token::LeftParen)
            }
            None => false,
        }
    }

    fn node_test(&mut self, axis: Axis) -> Result<NodeTest> {
        match self.peek() {
            Some(Token::Asterisk) => {
                self.advance();
                // *:local
                if self.peek() == Some(&Token::Colon) {
                    self.advance();
                    let local = self.ncname()?;
                    return Ok(NodeTest::Name(NameTest::LocalName(local)));
                }
                Ok(NodeTest::Name(NameTest::Star))
            }
            Some(Token::NodeKeyword) if self.peek_at(1) == Some(&Token::LeftParen) => {
                self.advance();
                self.advance();
                self.expect(&Token::RightParen)?;
                Ok(NodeTest::Kind(KindTest::Node))
            }
            Some(Token::TextKeyword) if self.peek_at(1) == Some(&Token::LeftParen) => {
                self.advance();
                self.advance();
                self.expect(&Token::RightParen)?;
                Ok(NodeTest::Kind(KindTest::Text))
            }
            Some(Token::Comment) if self.peek_at(1) == Some(&Token::LeftParen) => {
                self.advance();
                self.advance();
                self.expect(&Token::RightParen)?;
                Ok(NodeTest::Kind(KindTest::Comment))
            }
            Some(Token::DocumentNode) if self.peek_at(1) == Some(&Token::LeftParen) => {
                self.advance();
                self.advance();
                self.expect(&Token::RightParen)?;
                Ok(NodeTest::Kind(KindTest::Document))
            }
            Some(Token::ProcessingInstructionKeyword)
                if self.peek_at(1) == Some(&Token::LeftParen) =>
            {
                self.advance();
                self.advance();
                let target = match self.peek() {
                    Some(Token::RightParen) => None,
                    Some(Token::StringLiteral(s)) => {
                        let target = s.to_string();
                        self.advance();
                        Some(target)
                    }
                    Some(Token::NCName(name)) => {
                        let target = name.to_string();
                        self.advance();
                        Some(target)
                    }
                    _ => return Err(self.unexpected("expected a target name")),
                };
                self.expect(&Token::RightParen)?;
                Ok(NodeTest::Kind(KindTest::ProcessingInstruction(target)))
            }
            Some(Token::Element) if self.peek_at(1) == Some(&Token::LeftParen) => {
                self.advance();
                self.advance();
                let name = self.optional_kind_name(Axis::Child)?;
                self.expect(&Token::RightParen)?;
                Ok(NodeTest::Kind(KindTest::Element(name)))
            }
            Some(Token::Attribute) if self.peek_at(1) == Some(&Token::LeftParen) => {
                self.advance();
                self.advance();
                let name = self.optional_kind_name(Axis::Attribute)?;
                self.expect(&Token::RightParen)?;
                Ok(NodeTest::Kind(KindTest::Attribute(name)))
            }
            _ => {
                let test = self.name_test(axis)?;
                Ok(NodeTest::Name(test))
            }
        }
    }

    fn optional_kind_name(&mut self, axis: Axis) -> Result<Option<Name>> {
        match self.peek() {
            Some(Token::RightParen) => Ok(None),
            Some(Token::Asterisk) => {
                self.advance();
                Ok(None)
            }
            _ => match self.name_test(axis)? {
                NameTest::Name(name) => Ok(Some(name)),
                _ => Err(self.unexpected("expected a qualified name")),
            },
        }
    }

    fn name_test(&mut self, axis: Axis) -> Result<NameTest> {
        let first = self.ncname()?;
        if self.peek() == Some(&Token::Colon) {
            self.advance();
            // ns:*
            if self.eat(&Token::Asterisk) {
                let uri = self.resolve_prefix(&first)?;
                return Ok(NameTest::Namespace(uri.unwrap_or_default()));
            }
            let local = self.ncname()?;
            let uri = self.resolve_prefix(&first)?;
            return Ok(NameTest::Name(Name::new(local, uri, Some(first))));
        }
        // unprefixed element names live in the default element namespace
        let name = if axis.principal_node_kind() == crate::ast::PrincipalNodeKind::Element {
            let default = self.namespaces.default_element_namespace();
            if default.is_empty() {
                Name::local(first)
            } else {
                Name::namespaced(first, default)
            }
        } else {
            Name::local(first)
        };
        Ok(NameTest::Name(name))
    }

    fn ncname(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::NCName(name)) => {
                let name = name.to_string();
                self.advance();
                Ok(name)
            }
            Some(token) => match keyword_text(token) {
                Some(text) => {
                    let text = text.to_string();
                    self.advance();
                    Ok(text)
                }
                None => Err(self.unexpected("expected a name")),
            },
            None => Err(self.unexpected("expected a name")),
        }
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<Option<String>> {
        match self.namespaces.by_prefix(prefix) {
            Some(uri) => Ok(Some(uri.to_string())),
            None if self.options.strict => Err(Error::Compile(format!(
                "prefix {:?} is not bound to a namespace",
                prefix
            ))),
            None => Ok(None),
        }
    }

    fn qname(&mut self, function_position: bool) -> Result<Name> {
        let first = self.ncname()?;
        if self.peek() == Some(&Token::Colon) {
            self.advance();
            let local = self.ncname()?;
            let uri = self.resolve_prefix(&first)?;
            return Ok(Name::new(local, uri, Some(first)));
        }
        if function_position {
            // unprefixed function names resolve in the function namespace
            Ok(Name::namespaced(first, FN_NAMESPACE))
        } else {
            Ok(Name::local(first))
        }
    }

    fn variable_name(&mut self) -> Result<Name> {
        self.qname(false)
    }

    fn predicates(&mut self) -> Result<Vec<Expr>> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LeftBracket) {
            let predicate = self.expr()?;
            self.expect(&Token::RightBracket)?;
            predicates.push(predicate);
        }
        Ok(predicates)
    }

    fn primary_expr(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Token::Dot) => {
                self.advance();
                Ok(Expr::ContextItem)
            }
            Some(Token::IntegerLiteral(value)) => {
                self.advance();
                Ok(Expr::Literal(Literal::Integer(value)))
            }
            Some(Token::DecimalLiteral(value) | Token::DoubleLiteral(value)) => {
                self.advance();
                Ok(Expr::Literal(Literal::Decimal(value)))
            }
            Some(Token::StringLiteral(value)) => {
                let value = value.to_string();
                self.advance();
                Ok(Expr::Literal(Literal::String(value)))
            }
            Some(Token::Dollar) => {
                self.advance();
                let name = self.variable_name()?;
                Ok(Expr::VarRef(name))
            }
            Some(Token::LeftParen) => {
                self.advance();
                if self.eat(&Token::RightParen) {
                    return Ok(Expr::SequenceExpr(Vec::new()));
                }
                let expr = self.expr()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }
            Some(Token::NCName(_)) => self.function_call(),
            Some(ref token) if keyword_text(token).is_some() => self.function_call(),
            _ => Err(self.unexpected("expected an expression")),
        }
    }

    fn function_call(&mut self) -> Result<Expr> {
        let name = self.qname(true)?;
        self.expect(&Token::LeftParen)?;
        let mut args = Vec::new();
        if !self.eat(&Token::RightParen) {
            loop {
                args.push(self.expr_single()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RightParen)?;
        }
        Ok(Expr::Call { name, args })
    }
}

enum StepOrExpr {
    Step(Step),
    Expr(Expr),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(input: &str) -> Expr {
        parse(input, &Namespaces::default(), &CompileOptions::default()).unwrap()
    }

    #[test]
    fn test_simple_path() {
        let expr = compile("/r/n");
        match expr {
            Expr::Path(path) => {
                assert_eq!(path.root, PathRoot::Document);
                assert_eq!(path.steps.len(), 2);
                assert_eq!(path.steps[0].axis, Axis::Child);
            }
            other => panic!("expected a path, got {:?}", other),
        }
    }

    #[test]
    fn test_descendant_shorthand() {
        let expr = compile("//c");
        match expr {
            Expr::Path(path) => {
                assert_eq!(path.root, PathRoot::DocumentDescendant);
                assert_eq!(path.steps.len(), 1);
            }
            other => panic!("expected a path, got {:?}", other),
        }
        // // between steps expands to descendant-or-self::node()
        let expr = compile("a//b");
        match expr {
            Expr::Path(path) => {
                assert_eq!(path.steps.len(), 3);
                assert_eq!(path.steps[1].axis, Axis::DescendantOrSelf);
            }
            other => panic!("expected a path, got {:?}", other),
        }
    }

    #[test]
    fn test_star_is_wildcard_and_multiply() {
        let expr = compile("a[b * 2 = 4]/*");
        match expr {
            Expr::Path(path) => {
                assert_eq!(path.steps.len(), 2);
                assert_eq!(path.steps[0].predicates.len(), 1);
                match &path.steps[0].predicates[0] {
                    Expr::Binary { op, left, .. } => {
                        assert_eq!(*op, BinaryOp::GeneralEq);
                        assert!(matches!(
                            **left,
                            Expr::Binary {
                                op: BinaryOp::Multiply,
                                ..
                            }
                        ));
                    }
                    other => panic!("expected a comparison, got {:?}", other),
                }
                assert_eq!(
                    path.steps[1].test,
                    NodeTest::Name(NameTest::Star)
                );
            }
            other => panic!("expected a path, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = compile("1 + 2 * 3");
        match expr {
            Expr::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(
                    *right,
                    Expr::Binary {
                        op: BinaryOp::Multiply,
                        ..
                    }
                ));
            }
            other => panic!("expected addition, got {:?}", other),
        }
        // or is looser than and
        let expr = compile("1 = 1 or 2 = 2 and 3 = 3");
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Or, .. }));
    }

    #[test]
    fn test_axes() {
        let expr = compile("ancestor-or-self::n/following-sibling::*");
        match expr {
            Expr::Path(path) => {
                assert_eq!(path.steps[0].axis, Axis::AncestorOrSelf);
                assert_eq!(path.steps[1].axis, Axis::FollowingSibling);
            }
            other => panic!("expected a path, got {:?}", other),
        }
    }

    #[test]
    fn test_let_for_quantified() {
        assert!(matches!(
            compile("let $x := 1 return $x + 1"),
            Expr::Let { .. }
        ));
        assert!(matches!(
            compile("for $x in (1, 2), $y in (3, 4) return $x * $y"),
            Expr::For { .. }
        ));
        match compile("some $x in (1, 2, 3) satisfies $x mod 2 = 0") {
            Expr::Quantified { every, bindings, .. } => {
                assert!(!every);
                assert_eq!(bindings.len(), 1);
            }
            other => panic!("expected a quantifier, got {:?}", other),
        }
    }

    #[test]
    fn test_if_expr() {
        assert!(matches!(
            compile("if (a) then 1 else 2"),
            Expr::If { .. }
        ));
    }

    #[test]
    fn test_cast_family() {
        assert!(matches!(
            compile("'4' cast as xs:integer"),
            Expr::Cast {
                target: XdmType::Integer,
                optional: false,
                ..
            }
        ));
        assert!(matches!(
            compile("$x castable as xs:date?"),
            Expr::Castable { optional: true, .. }
        ));
        assert!(matches!(
            compile("1 instance of xs:decimal"),
            Expr::InstanceOf { .. }
        ));
    }

    #[test]
    fn test_function_call_with_keyword_name() {
        // `text` is a keyword, but text(...) with arguments is not a kind test
        let expr = compile("count(//c)");
        match expr {
            Expr::Call { name, args } => {
                assert_eq!(name.local_name(), "count");
                assert_eq!(name.uri(), Some(FN_NAMESPACE));
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected a call, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_on_parenthesized() {
        let expr = compile("(1, 2, 3)[2]");
        assert!(matches!(expr, Expr::Filter { .. }));
    }

    #[test]
    fn test_union_and_set_ops() {
        assert!(matches!(
            compile("a | b"),
            Expr::Binary {
                op: BinaryOp::Union,
                ..
            }
        ));
        assert!(matches!(
            compile("a intersect b except c"),
            Expr::Binary { .. }
        ));
    }

    #[test]
    fn test_xsl_mode_rebases() {
        let options = CompileOptions {
            mode: CompileMode::Xsl,
            ..CompileOptions::default()
        };
        let expr = parse("Foo/Bar", &Namespaces::default(), &options).unwrap();
        match expr {
            Expr::Path(path) => assert_eq!(path.root, PathRoot::DocumentDescendant),
            other => panic!("expected a path, got {:?}", other),
        }
        // absolute paths are left alone
        let expr = parse("/Foo", &Namespaces::default(), &options).unwrap();
        match expr {
            Expr::Path(path) => assert_eq!(path.root, PathRoot::Document),
            other => panic!("expected a path, got {:?}", other),
        }
    }

    #[test]
    fn test_strict_prefix() {
        let options = CompileOptions {
            strict: true,
            ..CompileOptions::default()
        };
        assert!(parse("unknown:a", &Namespaces::default(), &options).is_err());
        assert!(parse("xs:a", &Namespaces::default(), &options).is_ok());
    }

    #[test]
    fn test_trailing_tokens_fail() {
        assert!(parse("1 1", &Namespaces::default(), &CompileOptions::default()).is_err());
    }
}
