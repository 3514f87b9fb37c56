use crate::expr::{Expr, ExprId};
use crate::token::Token;

/// **Abstract-syntax-tree node** for *statements* (complete executable
/// constructs).  A program is a sequence of these nodes returned by
/// [`Parser::parse`](crate::parser::Parser::parse).
///
/// There is deliberately no `for` variant: the parser desugars `for` loops
/// into an equivalent `Block`/`While` shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt<'a> {
    /// Stand-alone expression terminated by a semicolon.
    Expression(Expr<'a>),

    /// `print` statement used for output.
    Print(Expr<'a>),

    /// Variable declaration: `"var" IDENT ("=" initializer)? ";"`.
    Var {
        name: &'a Token<'a>,
        initializer: Option<Expr<'a>>,
    },

    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt<'a>>),

    /// `if` / `else` conditional.
    If {
        condition: Expr<'a>,
        then_branch: Box<Stmt<'a>>,
        else_branch: Option<Box<Stmt<'a>>>,
    },

    /// `while` loop (also the desugared form of `for`).
    While {
        condition: Expr<'a>,
        body: Box<Stmt<'a>>,
    },

    /// Function declaration; becomes a first-class callable value.
    Function {
        name: &'a Token<'a>,

        /// Parameter name tokens (arity ≤ 255).
        params: Vec<&'a Token<'a>>,

        /// Body executed when the function is called.
        body: Vec<Stmt<'a>>,
    },

    /// `return` statement inside a function body.
    Return {
        /// The `return` keyword token (for error locations).
        keyword: &'a Token<'a>,

        /// Optional expression to return.  Absent ⇒ `nil` is returned.
        value: Option<Expr<'a>>,
    },

    /// Class declaration with an optional superclass clause.
    Class {
        name: &'a Token<'a>,

        /// The superclass reference, when present: a resolvable id (it is a
        /// variable reference like any other) plus the name token.
        superclass: Option<(ExprId, &'a Token<'a>)>,

        /// Method declarations; every element is a `Stmt::Function`.
        methods: Vec<Stmt<'a>>,
    },
}
