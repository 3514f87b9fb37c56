//! Static scope resolution.
//!
//! A single pass between parsing and execution that walks the AST with a
//! stack of lexical scopes, records for each local reference site how many
//! environments up its binding lives, and rejects structurally invalid
//! programs (`return` at top level, `this` outside a class, a class
//! inheriting from itself, and so on).  Errors are reported and resolution
//! continues, so one bad construct does not hide the next; the driver checks
//! the reporter before running anything.
//!
//! Scopes here model only block structure.  The global scope is deliberately
//! not on the stack: globals stay late-bound, which is what lets two
//! top-level functions call each other regardless of declaration order.

use std::collections::HashMap;

use log::debug;

use crate::expr::{Expr, ExprId};
use crate::interpreter::Interpreter;
use crate::reporter::Reporter;
use crate::stmt::Stmt;
use crate::token::Token;

/// What kind of function body we are currently inside, for `return` checks.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

/// What kind of class body we are currently inside, for `this`/`super` checks.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver<'a, 'i, 'r> {
    interpreter: &'i mut Interpreter<'a>,
    reporter: &'r mut Reporter,

    /// Innermost scope last.  The bool is the declared/defined split: a name
    /// is pushed `false` at declaration and flipped `true` once its
    /// initializer has been resolved, which is how `var a = a;` is caught.
    scopes: Vec<HashMap<&'a str, bool>>,

    current_function: FunctionType,
    current_class: ClassType,
}

impl<'a, 'i, 'r> Resolver<'a, 'i, 'r> {
    pub fn new(interpreter: &'i mut Interpreter<'a>, reporter: &'r mut Reporter) -> Self {
        Resolver {
            interpreter,
            reporter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    pub fn resolve(&mut self, statements: &'a [Stmt<'a>]) {
        debug!("Resolving {} statements", statements.len());

        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    // ───────────────────────── statements ─────────────────────────

    fn resolve_stmt(&mut self, stmt: &'a Stmt<'a>) {
        match stmt {
            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),

            Stmt::Var { name, initializer } => {
                self.declare(name);

                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }

                self.define(name);
            }

            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve(statements);
                self.end_scope();
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Function { name, params, body } => {
                // Defined before the body resolves, so the function can
                // recurse into itself.
                self.declare(name);
                self.define(name);

                self.resolve_function(params, body, FunctionType::Function);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.reporter
                        .error_at(keyword, "Cannot return from top-level code");
                }

                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.reporter
                            .error_at(keyword, "Cannot return a value from an initializer");
                    }

                    self.resolve_expr(value);
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_class(
        &mut self,
        name: &'a Token<'a>,
        superclass: Option<&(ExprId, &'a Token<'a>)>,
        methods: &'a [Stmt<'a>],
    ) {
        let enclosing_class: ClassType = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some((id, sup_name)) = superclass {
            if sup_name.lexeme == name.lexeme {
                self.reporter
                    .error_at(sup_name, "A class cannot inherit from itself");
            }

            self.current_class = ClassType::Subclass;
            self.resolve_local(*id, sup_name.lexeme);

            // `super` resolves through a dedicated scope wrapped around all
            // method bodies, mirroring the environment layer the runtime
            // inserts at class declaration.
            self.begin_scope();
            self.scope_insert("super");
        }

        self.begin_scope();
        self.scope_insert("this");

        for method in methods {
            if let Stmt::Function {
                name: method_name,
                params,
                body,
            } = method
            {
                let declaration: FunctionType = if method_name.lexeme == "init" {
                    FunctionType::Initializer
                } else {
                    FunctionType::Method
                };

                self.resolve_function(params, body, declaration);
            }
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_function(
        &mut self,
        params: &'a [&'a Token<'a>],
        body: &'a [Stmt<'a>],
        function_type: FunctionType,
    ) {
        let enclosing_function: FunctionType = self.current_function;
        self.current_function = function_type;

        self.begin_scope();

        for param in params {
            self.declare(param);
            self.define(param);
        }

        self.resolve(body);

        self.end_scope();

        self.current_function = enclosing_function;
    }

    // ───────────────────────── expressions ────────────────────────

    fn resolve_expr(&mut self, expr: &'a Expr<'a>) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.lexeme) == Some(&false) {
                        self.reporter
                            .error_at(name, "Cannot read local variable in its own initializer");
                    }
                }

                self.resolve_local(*id, name.lexeme);
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name.lexeme);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.reporter
                        .error_at(keyword, "Cannot use 'this' outside of a class");

                    return;
                }

                self.resolve_local(*id, keyword.lexeme);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.reporter
                            .error_at(keyword, "Cannot use 'super' outside of a class");

                        return;
                    }

                    ClassType::Class => {
                        self.reporter.error_at(
                            keyword,
                            "Cannot use 'super' in a class with no superclass",
                        );

                        return;
                    }

                    ClassType::Subclass => {}
                }

                self.resolve_local(*id, keyword.lexeme);
            }
        }
    }

    // ─────────────────────────── scopes ───────────────────────────

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Insert an implicit, already-defined binding (`this`, `super`).
    fn scope_insert(&mut self, name: &'a str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, true);
        }
    }

    fn declare(&mut self, name: &'a Token<'a>) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        // Redeclaration is legal in globals but a mistake in a local scope.
        if scope.contains_key(name.lexeme) {
            self.reporter
                .error_at(name, "Variable already declared in this scope");
        }

        scope.insert(name.lexeme, false);
    }

    fn define(&mut self, name: &'a Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme, true);
        }
    }

    /// Find `name` in the scope stack and record its hop-count with the
    /// interpreter.  Not found means global; nothing is recorded and the
    /// runtime falls back to a dynamic global lookup.
    fn resolve_local(&mut self, id: ExprId, name: &str) {
        for (hops, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                self.interpreter.note_local(id, hops);

                return;
            }
        }
    }
}
