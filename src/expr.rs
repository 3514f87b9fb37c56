use crate::token::Token;

/// Stable identity of a reference-site expression.
///
/// The parser hands out ids from a monotonically increasing counter at node
/// construction time.  The resolver keys its hop-count table on these ids, so
/// two syntactically identical references at different source positions
/// resolve independently of their structural content.
pub type ExprId = usize;

/// A **literal constant** that appears directly in the source code.
///
/// These variants are the *terminal leaves* of the expression tree and
/// therefore do **not** retain a reference to the originating [`Token`]; the
/// parser copies (or converts) the value at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal, stored as IEEE-754 `f64`.
    /// Integral lexemes such as `"3"` are still parsed as `3.0`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    /// The boolean constant `true`.
    True,

    /// The boolean constant `false`.
    False,

    /// The `nil` literal.
    Nil,
}

/// **Abstract-syntax-tree node** representing every kind of *expression*.
/// The lifetime `'a` ties nodes that contain token references back to the
/// borrowed token slice held by the parser.  The tree is acyclic and
/// immutable after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// Prefix unary operator expression, e.g. `!isReady` or `-42`.
    Unary {
        /// The operator token (`!` or `-`).
        operator: &'a Token<'a>,
        /// Operand to which the operator is applied.
        right: Box<Expr<'a>>,
    },

    /// Infix binary operator expression, e.g. `a + b`, `x <= y`.
    Binary {
        left: Box<Expr<'a>>,
        /// Operator token such as `+`, `*`, `==`, …
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// Parenthesised sub-expression: `"(" expression ")"`.
    Grouping(Box<Expr<'a>>),

    /// Variable access; resolves to the identifier's current value at runtime.
    Variable {
        id: ExprId,
        name: &'a Token<'a>,
    },

    /// Assignment expression: `identifier "=" expression`.
    Assign {
        id: ExprId,
        name: &'a Token<'a>,
        value: Box<Expr<'a>>,
    },

    /// Short-circuiting logical operators `and` / `or`.
    Logical {
        left: Box<Expr<'a>>,
        operator: &'a Token<'a>, // `AND` or `OR`
        right: Box<Expr<'a>>,
    },

    /// Function, method, or class call expression, e.g. `clock()`, `add(1, 2)`.
    Call {
        /// Expression that evaluates to a callable (variable, property, etc.).
        callee: Box<Expr<'a>>,
        /// The closing `)` token, retained for error reporting.
        paren: &'a Token<'a>,
        /// Argument list (may be empty).
        arguments: Vec<Expr<'a>>,
    },

    /// Property access: `object.property`.
    Get {
        object: Box<Expr<'a>>,
        name: &'a Token<'a>,
    },

    /// Property assignment: `object.property = value`.
    Set {
        object: Box<Expr<'a>>,
        name: &'a Token<'a>,
        value: Box<Expr<'a>>,
    },

    /// The `this` keyword inside a method.
    This {
        id: ExprId,
        keyword: &'a Token<'a>,
    },

    /// `super.method` inside a subclass method.
    Super {
        id: ExprId,
        keyword: &'a Token<'a>,
        method: &'a Token<'a>,
    },
}
