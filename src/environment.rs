//! Runtime environments: mutable name→value maps chained through an optional
//! enclosing link.
//!
//! Environments form a chain, not a tree; many children may share one parent
//! (every invocation of a function shares its defining environment), and a
//! closure keeps its captured environment alive through the `Rc`.  Writes
//! through any holder are visible to all holders, which is what lets two
//! closures over the same counter observe each other's updates.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::value::Value;

#[derive(Debug)]
pub struct Environment<'a> {
    values: HashMap<&'a str, Value<'a>>,
    enclosing: Option<Rc<RefCell<Environment<'a>>>>,
}

impl<'a> Environment<'a> {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment<'a>>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Bind `name` in this environment, shadowing any outer binding.
    pub fn define(&mut self, name: &'a str, value: Value<'a>) {
        self.values.insert(name, value);
    }

    /// Dynamic lookup walking the enclosing chain (global references).
    pub fn get(&self, name: &str, line: usize) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'", name),
            ))
        }
    }

    /// Dynamic assignment walking the enclosing chain (global references).
    pub fn assign(&mut self, name: &str, value: Value<'a>, line: usize) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;

            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'", name),
            ))
        }
    }

    /// Read `name` exactly `distance` environments up the chain, as recorded
    /// by the resolver for local references.
    pub fn get_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Value<'a>> {
        let target: Rc<RefCell<Environment<'a>>> = Self::ancestor(env, distance, name, line)?;

        let value: Option<Value<'a>> = target.borrow().values.get(name).cloned();

        value.ok_or_else(|| LoxError::runtime(line, format!("Undefined variable '{}'", name)))
    }

    /// Write `name` exactly `distance` environments up the chain.
    pub fn assign_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &str,
        value: Value<'a>,
        line: usize,
    ) -> Result<()> {
        let target: Rc<RefCell<Environment<'a>>> = Self::ancestor(env, distance, name, line)?;

        let mut target = target.borrow_mut();

        match target.values.get_mut(name) {
            Some(slot) => {
                *slot = value;

                Ok(())
            }

            None => Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'", name),
            )),
        }
    }

    fn ancestor(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Rc<RefCell<Environment<'a>>>> {
        let mut current: Rc<RefCell<Environment<'a>>> = Rc::clone(env);

        for _ in 0..distance {
            let enclosing: Option<Rc<RefCell<Environment<'a>>>> =
                current.borrow().enclosing.as_ref().map(Rc::clone);

            match enclosing {
                Some(parent) => current = parent,

                // A hop-count past the top of the chain means the resolver
                // and the runtime disagree about scope shape.
                None => {
                    return Err(LoxError::runtime(
                        line,
                        format!("Undefined variable '{}'", name),
                    ));
                }
            }
        }

        Ok(current)
    }
}

impl<'a> Default for Environment<'a> {
    fn default() -> Self {
        Self::new()
    }
}
