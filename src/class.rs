//! Classes and instances.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::function::LoxFunction;
use crate::interpreter::{Exec, Interpreter};
use crate::token::Token;
use crate::value::Value;

/// A class value: created once when its declaration executes, then used
/// both for method lookup and as the constructor when called.  The method
/// whose name equals the class's own name is the initializer.
pub struct LoxClass<'a> {
    pub name: &'a str,
    superclass: Option<Rc<LoxClass<'a>>>,
    methods: HashMap<&'a str, Rc<LoxFunction<'a>>>,
}

impl<'a> LoxClass<'a> {
    pub fn new(
        name: &'a str,
        superclass: Option<Rc<LoxClass<'a>>>,
        methods: HashMap<&'a str, Rc<LoxFunction<'a>>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Look `name` up on this class, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction<'a>>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// A constructor call takes whatever the initializer takes; a class
    /// without one takes no arguments.
    pub fn arity(&self) -> usize {
        self.find_method(self.name)
            .map_or(0, |initializer| initializer.arity())
    }

    /// Construct a new instance, running the initializer (if any) bound to
    /// it.  The call always yields the instance, regardless of what the
    /// initializer body did.
    pub fn instantiate(
        class: &Rc<LoxClass<'a>>,
        interpreter: &mut Interpreter<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Exec<'a, Value<'a>> {
        debug!("Instantiating class '{}'", class.name);

        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(class))));

        if let Some(initializer) = class.find_method(class.name) {
            initializer
                .bind(Rc::clone(&instance))
                .call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl fmt::Debug for LoxClass<'_> {
    // Shallow: method closures can cycle back to this class.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

/// An instance: a class reference plus fields created lazily on first
/// assignment.
pub struct LoxInstance<'a> {
    class: Rc<LoxClass<'a>>,
    fields: HashMap<&'a str, Value<'a>>,
}

impl<'a> LoxInstance<'a> {
    pub fn new(class: Rc<LoxClass<'a>>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class_name(&self) -> &'a str {
        self.class.name
    }

    /// Property read: fields shadow methods; a method access returns the
    /// method bound to this instance.
    pub fn get(instance: &Rc<RefCell<LoxInstance<'a>>>, name: &Token<'a>) -> Result<Value<'a>> {
        if let Some(field) = instance.borrow().fields.get(name.lexeme) {
            return Ok(field.clone());
        }

        let class = Rc::clone(&instance.borrow().class);

        if let Some(method) = class.find_method(name.lexeme) {
            return Ok(Value::Function(Rc::new(method.bind(Rc::clone(instance)))));
        }

        Err(LoxError::runtime(
            name,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    /// Property write: creates the field if it does not exist yet.
    pub fn set(&mut self, name: &Token<'a>, value: Value<'a>) {
        self.fields.insert(name.lexeme, value);
    }
}

impl fmt::Debug for LoxInstance<'_> {
    // Shallow: fields can hold values that reference this instance.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}
