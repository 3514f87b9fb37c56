//! Classes and instances.
//!
//! Method lookup walks the superclass chain (a subclass method of the same
//! name shadows the parent's).  Instance fields are created lazily on first
//! assignment and shadow methods on read.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::function::LoxFunction;
use crate::token::Token;
use crate::value::Value;

pub struct LoxClass<'a> {
    pub name: &'a str,
    pub superclass: Option<Rc<LoxClass<'a>>>,
    pub methods: HashMap<&'a str, Rc<LoxFunction<'a>>>,
}

impl<'a> LoxClass<'a> {
    /// Look up `name` on this class, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction<'a>>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// A class called as a constructor takes whatever its `init` takes.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

impl<'a> fmt::Debug for LoxClass<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

pub struct LoxInstance<'a> {
    class: Rc<LoxClass<'a>>,
    fields: HashMap<&'a str, Value<'a>>,
}

impl<'a> LoxInstance<'a> {
    pub fn new(class: Rc<LoxClass<'a>>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class(&self) -> &Rc<LoxClass<'a>> {
        &self.class
    }

    /// Property read: fields first, then methods, binding a found method to
    /// this instance.  A name that is neither is a runtime error.
    pub fn get(instance: &Rc<RefCell<LoxInstance<'a>>>, name: &Token<'a>) -> Result<Value<'a>> {
        if let Some(value) = instance.borrow().fields.get(name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = instance.borrow().class.find_method(name.lexeme) {
            return Ok(Value::Function(Rc::new(method.bind(Rc::clone(instance)))));
        }

        Err(LoxError::runtime(
            name.line,
            format!("Undefined property '{}'", name.lexeme),
        ))
    }

    /// Property write: fields are created on first assignment.
    pub fn set(&mut self, name: &'a Token<'a>, value: Value<'a>) {
        self.fields.insert(name.lexeme, value);
    }
}

impl<'a> fmt::Debug for LoxInstance<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class.name)
    }
}
