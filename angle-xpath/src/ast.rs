//! The expression tree produced by the compiler.

use angle_name::Name;

use crate::types::XdmType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Parent,
    SelfAxis,
    Ancestor,
    AncestorOrSelf,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Preceding,
    PrecedingSibling,
    Attribute,
}

impl Axis {
    /// The node kind a `*` test matches on this axis.
    pub fn principal_node_kind(&self) -> PrincipalNodeKind {
        match self {
            Axis::Attribute => PrincipalNodeKind::Attribute,
            _ => PrincipalNodeKind::Element,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalNodeKind {
    Element,
    Attribute,
}

/// A name test against (local, uri); the prefix is resolved at compile time.
#[derive(Debug, Clone, PartialEq)]
pub enum NameTest {
    Name(Name),
    /// `*`
    Star,
    /// `ns:*`, carrying the resolved URI.
    Namespace(String),
    /// `*:local`
    LocalName(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum KindTest {
    /// `node()`
    Node,
    /// `text()`, matching text and CDATA
    Text,
    /// `comment()`
    Comment,
    /// `processing-instruction()` with optional target
    ProcessingInstruction(Option<String>),
    /// `element()` / `element(q)`
    Element(Option<Name>),
    /// `attribute()` / `attribute(q)`
    Attribute(Option<Name>),
    /// `document-node()`
    Document,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    Name(NameTest),
    Kind(KindTest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

/// Where a path starts.
#[derive(Debug, Clone, PartialEq)]
pub enum PathRoot {
    /// `/...`: the document containing the context node.
    Document,
    /// `//...`: the document plus a `descendant-or-self::node()` step.
    DocumentDescendant,
    /// A relative path starting at the context item.
    Relative,
    /// Steps applied to the result of an arbitrary expression.
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub root: PathRoot,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    /// General comparisons over atomized sequences.
    GeneralEq,
    GeneralNe,
    GeneralLt,
    GeneralLe,
    GeneralGt,
    GeneralGe,
    /// Value comparisons requiring singletons.
    ValueEq,
    ValueNe,
    ValueLt,
    ValueLe,
    ValueGt,
    ValueGe,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Union,
    Intersect,
    Except,
    /// `||`
    Concat,
    /// `to`
    Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Decimal(f64),
}

/// One variable binding of a `let`, `for` or quantified expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: Name,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// `.`
    ContextItem,
    /// `/` on its own
    Root,
    Path(PathExpr),
    /// Predicates applied to a non-path expression.
    Filter {
        base: Box<Expr>,
        predicates: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary minus.
    Negate(Box<Expr>),
    /// Comma sequence.
    SequenceExpr(Vec<Expr>),
    If {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Let {
        bindings: Vec<Binding>,
        body: Box<Expr>,
    },
    For {
        bindings: Vec<Binding>,
        body: Box<Expr>,
    },
    Quantified {
        every: bool,
        bindings: Vec<Binding>,
        satisfies: Box<Expr>,
    },
    Call {
        name: Name,
        args: Vec<Expr>,
    },
    VarRef(Name),
    Cast {
        expr: Box<Expr>,
        target: XdmType,
        /// `?` after the type: an empty sequence is allowed through.
        optional: bool,
    },
    Castable {
        expr: Box<Expr>,
        target: XdmType,
        optional: bool,
    },
    InstanceOf {
        expr: Box<Expr>,
        target: XdmType,
        optional: bool,
    },
}
