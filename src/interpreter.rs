//! Tree-walking interpreter.
//!
//! Executes resolved statements against a chain of runtime environments.
//! Statement execution returns [`Flow`]: either the statement completed
//! normally, or a `return` is unwinding.  Every statement-sequence executor
//! checks the flow after each statement and propagates a `Return` upward
//! immediately, so unwinding stops exactly at the enclosing function-call
//! boundary ([`LoxFunction::call`](crate::function::LoxFunction::call)
//! converts it into the call's result).  Runtime errors travel through the
//! ordinary `Result` channel and abort the whole `interpret` call.
//!
//! All per-run mutable state (resolution table, global environment, output
//! channel) lives on the `Interpreter` value; nothing is process-global.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use log::{debug, info};

use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId, LiteralValue};
use crate::function::{LoxFunction, NativeFunction};
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Outcome of executing a statement: completed normally, or unwinding a
/// `return` carrying the value to hand to the enclosing call.
#[derive(Debug)]
pub enum Flow<'a> {
    Normal,
    Return(Value<'a>),
}

pub struct Interpreter<'a> {
    globals: Rc<RefCell<Environment<'a>>>,
    environment: Rc<RefCell<Environment<'a>>>,

    /// Hop-counts recorded by the resolver, keyed by reference-site id.
    /// References absent from the table are global lookups.
    locals: HashMap<ExprId, usize>,

    /// Where `print` writes.  Stdout by default; tests substitute a buffer.
    output: Box<dyn Write>,
}

/// Seconds since the Unix epoch, as a float.
fn clock_native<'a>(_args: &[Value<'a>]) -> std::result::Result<Value<'a>, String> {
    let timestamp: f64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e: SystemTimeError| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Create an interpreter printing to the given channel.  The globals are
    /// pre-populated with the native `clock` function.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::Native(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: clock_native,
            })),
        );

        let environment: Rc<RefCell<Environment<'a>>> = Rc::clone(&globals);

        Self {
            globals,
            environment,
            locals: HashMap::new(),
            output,
        }
    }

    /// Record a reference site as local at `depth` hops.  Called by the
    /// resolver; sites it never records fall back to global lookup.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Reference #{} resolved at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// Interpret a program.  Stops at the first runtime error, which the
    /// caller reports; the host process survives either way.
    pub fn interpret(&mut self, statements: &'a [Stmt<'a>]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            self.execute(stmt)?;
        }

        info!("Interpretation completed successfully");

        Ok(())
    }

    // ───────────────────────── statements ─────────────────────────

    fn execute(&mut self, stmt: &'a Stmt<'a>) -> Result<Flow<'a>> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value<'a> = self.evaluate(expr)?;

                writeln!(self.output, "{}", value)?;

                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value<'a> = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);

                self.environment.borrow_mut().define(name.lexeme, value);

                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));

                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Function { name, params, body } => {
                debug!("Defining fn '{}'", name.lexeme);

                let function = LoxFunction {
                    name,
                    params,
                    body,
                    closure: Rc::clone(&self.environment),
                    is_initializer: false,
                };

                self.environment
                    .borrow_mut()
                    .define(name.lexeme, Value::Function(Rc::new(function)));

                Ok(Flow::Normal)
            }

            Stmt::Return { keyword: _, value } => {
                let value: Value<'a> = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Swap in `environment`, run the statements, and restore the previous
    /// environment on every exit path (normal, error, or early return).
    pub fn execute_block(
        &mut self,
        statements: &'a [Stmt<'a>],
        environment: Rc<RefCell<Environment<'a>>>,
    ) -> Result<Flow<'a>> {
        let previous: Rc<RefCell<Environment<'a>>> =
            std::mem::replace(&mut self.environment, environment);

        let result: Result<Flow<'a>> = self.run_sequence(statements);

        self.environment = previous;

        result
    }

    fn run_sequence(&mut self, statements: &'a [Stmt<'a>]) -> Result<Flow<'a>> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    fn execute_class(
        &mut self,
        name: &'a Token<'a>,
        superclass: Option<&(ExprId, &'a Token<'a>)>,
        methods: &'a [Stmt<'a>],
    ) -> Result<Flow<'a>> {
        let superclass_value: Option<Rc<LoxClass<'a>>> = match superclass {
            Some((id, sup_name)) => match self.look_up_variable(*id, sup_name)? {
                Value::Class(class) => Some(class),

                _ => {
                    return Err(LoxError::runtime(
                        sup_name.line,
                        "Superclass must be a class",
                    ));
                }
            },

            None => None,
        };

        // Two-stage binding lets methods refer to the class by name.
        self.environment.borrow_mut().define(name.lexeme, Value::Nil);

        // Methods of a subclass close over an extra layer defining `super`.
        let method_env: Rc<RefCell<Environment<'a>>> = match &superclass_value {
            Some(superclass) => {
                let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));

                env.borrow_mut()
                    .define("super", Value::Class(Rc::clone(superclass)));

                env
            }

            None => Rc::clone(&self.environment),
        };

        let mut method_map: HashMap<&'a str, Rc<LoxFunction<'a>>> = HashMap::new();

        for method in methods {
            if let Stmt::Function {
                name: method_name,
                params,
                body,
            } = method
            {
                let function = LoxFunction {
                    name: method_name,
                    params,
                    body,
                    closure: Rc::clone(&method_env),
                    is_initializer: method_name.lexeme == "init",
                };

                method_map.insert(method_name.lexeme, Rc::new(function));
            }
        }

        debug!(
            "Class '{}' defined with {} method(s)",
            name.lexeme,
            method_map.len()
        );

        let class = Value::Class(Rc::new(LoxClass {
            name: name.lexeme,
            superclass: superclass_value,
            methods: method_map,
        }));

        self.environment
            .borrow_mut()
            .assign(name.lexeme, class, name.line)?;

        Ok(Flow::Normal)
    }

    // ───────────────────────── expressions ────────────────────────

    pub fn evaluate(&mut self, expr: &'a Expr<'a>) -> Result<Value<'a>> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value<'a> = self.evaluate(left)?;

                // Short-circuit, yielding the operand value itself.
                match operator.token_type {
                    TokenType::OR if is_truthy(&left_val) => Ok(left_val),
                    TokenType::AND if !is_truthy(&left_val) => Ok(left_val),
                    _ => self.evaluate(right),
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value<'a> = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => Environment::assign_at(
                        &self.environment,
                        distance,
                        name.lexeme,
                        value.clone(),
                        name.line,
                    )?,

                    None => {
                        self.globals
                            .borrow_mut()
                            .assign(name.lexeme, value.clone(), name.line)?
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val: Value<'a> = self.evaluate(callee)?;

                let mut args: Vec<Value<'a>> = Vec::with_capacity(arguments.len());

                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                self.call_value(callee_val, paren, args)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),

                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value: Value<'a> = self.evaluate(value)?;

                    instance.borrow_mut().set(name, value.clone());

                    Ok(value)
                }

                _ => Err(LoxError::runtime(name.line, "Only instances have fields")),
            },

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &'a Token<'a>) -> Result<Value<'a>> {
        match self.locals.get(&id) {
            Some(&distance) => {
                Environment::get_at(&self.environment, distance, name.lexeme, name.line)
            }

            None => self.globals.borrow().get(name.lexeme, name.line),
        }
    }

    /// `super.method` lookup begins at the superclass recorded for the
    /// lexical class, bypassing the subclass's own override, and binds the
    /// found method to the current `this` (one environment closer).
    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &'a Token<'a>,
        method: &'a Token<'a>,
    ) -> Result<Value<'a>> {
        let distance: usize = match self.locals.get(&id) {
            Some(&distance) => distance,

            None => {
                return Err(LoxError::runtime(
                    keyword.line,
                    "Cannot use 'super' outside of a class",
                ));
            }
        };

        let superclass: Rc<LoxClass<'a>> =
            match Environment::get_at(&self.environment, distance, "super", keyword.line)? {
                Value::Class(class) => class,

                _ => {
                    return Err(LoxError::runtime(
                        keyword.line,
                        "Superclass must be a class",
                    ));
                }
            };

        let object: Rc<RefCell<LoxInstance<'a>>> =
            match Environment::get_at(&self.environment, distance - 1, "this", keyword.line)? {
                Value::Instance(instance) => instance,

                _ => {
                    return Err(LoxError::runtime(
                        keyword.line,
                        "Cannot use 'super' outside of a method",
                    ));
                }
            };

        let found: Rc<LoxFunction<'a>> = superclass.find_method(method.lexeme).ok_or_else(|| {
            LoxError::runtime(
                method.line,
                format!("Undefined property '{}'", method.lexeme),
            )
        })?;

        Ok(Value::Function(Rc::new(found.bind(object))))
    }

    fn evaluate_unary(&mut self, operator: &'a Token<'a>, right: &'a Expr<'a>) -> Result<Value<'a>> {
        let right_val: Value<'a> = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right_val {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operand must be a number",
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&right_val))),

            _ => Err(LoxError::runtime(operator.line, "Invalid unary operator")),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &'a Expr<'a>,
        operator: &'a Token<'a>,
        right: &'a Expr<'a>,
    ) -> Result<Value<'a>> {
        let left_val: Value<'a> = self.evaluate(left)?;
        let right_val: Value<'a> = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings",
                )),
            },

            TokenType::MINUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
                _ => Err(self.numbers_error(operator)),
            },

            TokenType::STAR => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
                _ => Err(self.numbers_error(operator)),
            },

            TokenType::SLASH => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => {
                    if b == 0.0 {
                        Err(LoxError::runtime(operator.line, "Division by zero"))
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }

                _ => Err(self.numbers_error(operator)),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            TokenType::LESS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),
                _ => Err(self.numbers_error(operator)),
            },

            TokenType::LESS_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),
                _ => Err(self.numbers_error(operator)),
            },

            TokenType::GREATER => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),
                _ => Err(self.numbers_error(operator)),
            },

            TokenType::GREATER_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),
                _ => Err(self.numbers_error(operator)),
            },

            _ => Err(LoxError::runtime(operator.line, "Invalid binary operator")),
        }
    }

    fn numbers_error(&self, operator: &Token<'a>) -> LoxError {
        LoxError::runtime(operator.line, "Operands must be numbers")
    }

    /// The uniform call contract: natives, user functions, and classes all
    /// check exact arity, then run.
    fn call_value(
        &mut self,
        callee: Value<'a>,
        paren: &'a Token<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        match callee {
            Value::Native(native) => {
                check_arity(native.arity, arguments.len(), paren)?;

                (native.func)(&arguments).map_err(|msg| LoxError::runtime(paren.line, msg))
            }

            Value::Function(function) => {
                check_arity(function.arity(), arguments.len(), paren)?;

                function.call(self, arguments)
            }

            Value::Class(class) => {
                check_arity(class.arity(), arguments.len(), paren)?;

                let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(&class))));

                // The initializer's own return value is discarded; the
                // constructed instance is the call's result regardless.
                if let Some(init) = class.find_method("init") {
                    init.bind(Rc::clone(&instance)).call(self, arguments)?;
                }

                Ok(Value::Instance(instance))
            }

            _ => Err(LoxError::runtime(
                paren.line,
                "Can only call functions and classes",
            )),
        }
    }
}

impl<'a> Default for Interpreter<'a> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_arity(expected: usize, actual: usize, paren: &Token<'_>) -> Result<()> {
    if expected != actual {
        return Err(LoxError::runtime(
            paren.line,
            format!("Expected {} arguments but got {}", expected, actual),
        ));
    }

    Ok(())
}

/// `nil` and `false` are falsy; every other value (including `0` and the
/// empty string) is truthy.
pub fn is_truthy(value: &Value<'_>) -> bool {
    match value {
        Value::Nil => false,
        Value::Bool(b) => *b,
        _ => true,
    }
}
