//! Lexical environment frames.
//!
//! A frame owns its bindings and an optional handle on the enclosing
//! frame; live closures alias ancestor frames through `Rc<RefCell<_>>`, so
//! a mutation through one closure is visible to every sibling that
//! captured the same frame.  `define` allows redefinition (REPL-style
//! redeclaration), while `get`/`assign` walk the chain dynamically and the
//! `*_at` variants jump straight to the depth the resolver computed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// Shared handle on a frame.
pub type EnvRef<'a> = Rc<RefCell<Environment<'a>>>;

#[derive(Debug)]
pub struct Environment<'a> {
    values: HashMap<&'a str, Value<'a>>,
    enclosing: Option<EnvRef<'a>>,
}

impl<'a> Environment<'a> {
    /// The outermost (global) frame.
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    /// A child frame chained to `enclosing`.
    pub fn with_enclosing(enclosing: EnvRef<'a>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Insert or overwrite a binding in this frame.
    pub fn define(&mut self, name: &'a str, value: Value<'a>) {
        debug!("define '{}'", name);

        self.values.insert(name, value);
    }

    /// Walk the chain outward until `name` is found.
    pub fn get(&self, name: &Token<'a>) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(enclosing) = &self.enclosing {
            return enclosing.borrow().get(name);
        }

        Err(LoxError::runtime(
            name,
            format!("Undefined variable '{}'.", name.lexeme),
        ))
    }

    /// Walk the chain outward and overwrite the first binding of `name`.
    pub fn assign(&mut self, name: &Token<'a>, value: Value<'a>) -> Result<()> {
        if self.values.contains_key(name.lexeme) {
            self.values.insert(name.lexeme, value);
            return Ok(());
        }

        if let Some(enclosing) = &self.enclosing {
            return enclosing.borrow_mut().assign(name, value);
        }

        Err(LoxError::runtime(
            name,
            format!("Undefined variable '{}'.", name.lexeme),
        ))
    }

    /// Read a binding exactly `distance` frames out.  No existence check:
    /// the resolver guarantees the binding is there, so absence is a bug
    /// in the resolver, not a runtime condition.
    pub fn get_at(env: &EnvRef<'a>, distance: usize, name: &str) -> Value<'a> {
        Self::ancestor(env, distance)
            .borrow()
            .values
            .get(name)
            .cloned()
            .expect("binding missing at resolved depth")
    }

    /// Store a binding exactly `distance` frames out.  Same contract as
    /// [`Self::get_at`].
    pub fn assign_at(env: &EnvRef<'a>, distance: usize, name: &Token<'a>, value: Value<'a>) {
        Self::ancestor(env, distance)
            .borrow_mut()
            .values
            .insert(name.lexeme, value);
    }

    fn ancestor(env: &EnvRef<'a>, distance: usize) -> EnvRef<'a> {
        let mut frame = Rc::clone(env);

        for _ in 0..distance {
            let enclosing = frame
                .borrow()
                .enclosing
                .clone()
                .expect("scope distance outruns the environment chain");

            frame = enclosing;
        }

        frame
    }
}

impl Default for Environment<'_> {
    fn default() -> Self {
        Self::new()
    }
}
