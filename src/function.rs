//! Callable values: user-declared functions (closures) and host natives.
//!
//! A `LoxFunction` pairs its declaration (borrowed straight from the AST)
//! with the environment that was active when the declaration executed.
//! Binding a method to an instance produces a *new* function sharing the
//! same declaration, with a fresh environment layer defining `this`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::class::LoxInstance;
use crate::environment::Environment;
use crate::error::Result;
use crate::interpreter::{Flow, Interpreter};
use crate::stmt::Stmt;
use crate::token::Token;
use crate::value::Value;

/// A host-provided function exposed to programs (e.g. `clock`).
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: for<'a> fn(&[Value<'a>]) -> std::result::Result<Value<'a>, String>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// A user-declared function value: declaration plus captured environment.
pub struct LoxFunction<'a> {
    pub name: &'a Token<'a>,
    pub params: &'a [&'a Token<'a>],
    pub body: &'a [Stmt<'a>],
    pub closure: Rc<RefCell<Environment<'a>>>,
    pub is_initializer: bool,
}

impl<'a> LoxFunction<'a> {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Produce a copy of this function whose closure has an extra layer
    /// defining `this` as `instance`.  For methods inherited through a
    /// superclass the original closure already carries the `super` layer.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance<'a>>>) -> LoxFunction<'a> {
        let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &self.closure,
        ))));

        env.borrow_mut().define("this", Value::Instance(instance));

        LoxFunction {
            name: self.name,
            params: self.params,
            body: self.body,
            closure: env,
            is_initializer: self.is_initializer,
        }
    }

    /// Invoke the function: bind arguments in a fresh environment enclosing
    /// the closure, execute the body, and convert a `Return` flow into the
    /// call's result.  Initializers return `this` no matter how the body
    /// exited.
    pub fn call(
        &self,
        interpreter: &mut Interpreter<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        debug!(
            "Calling fn '{}' with {} argument(s)",
            self.name.lexeme,
            arguments.len()
        );

        let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &self.closure,
        ))));

        for (param, argument) in self.params.iter().zip(arguments) {
            env.borrow_mut().define(param.lexeme, argument);
        }

        let flow: Flow<'a> = interpreter.execute_block(self.body, env)?;

        if self.is_initializer {
            // `this` lives in the binding layer directly under the body.
            return Environment::get_at(&self.closure, 0, "this", self.name.line);
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

impl<'a> fmt::Debug for LoxFunction<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name.lexeme)
    }
}
