//! User-defined functions and methods.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::class::LoxInstance;
use crate::environment::{EnvRef, Environment};
use crate::interpreter::{Exec, Interpreter, Unwind};
use crate::value::Value;

/// A function value: a shared declaration plus the frame captured at the
/// point of definition.  Binding a method produces a new `LoxFunction`
/// whose closure has `this` defined in front of the original one, which is
/// how one method body serves every instance.
pub struct LoxFunction<'a> {
    declaration: Rc<FunctionDecl<'a>>,
    closure: EnvRef<'a>,
    /// True for the method whose name equals its class's name.
    is_initializer: bool,
}

impl<'a> LoxFunction<'a> {
    pub fn new(declaration: Rc<FunctionDecl<'a>>, closure: EnvRef<'a>, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &'a str {
        self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// A copy of this function with `this` bound to `instance`.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance<'a>>>) -> LoxFunction<'a> {
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));
        environment.define("this", Value::Instance(instance));

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        }
    }

    /// Run the body in a fresh frame chained to the captured closure,
    /// parameters bound positionally.  Falling off the end yields `nil`,
    /// a return unwind yields its value, and an initializer always yields
    /// `this` no matter how the body completed.
    pub fn call(
        &self,
        interpreter: &mut Interpreter<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Exec<'a, Value<'a>> {
        debug!("Calling <fn {}>", self.name());

        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(param.lexeme, argument);
        }

        let frame = Rc::new(RefCell::new(environment));

        match interpreter.execute_block(&self.declaration.body, frame) {
            Ok(()) => {
                if self.is_initializer {
                    Ok(Environment::get_at(&self.closure, 0, "this"))
                } else {
                    Ok(Value::Nil)
                }
            }

            Err(Unwind::Return(value)) => {
                if self.is_initializer {
                    Ok(Environment::get_at(&self.closure, 0, "this"))
                } else {
                    Ok(value)
                }
            }

            Err(other) => Err(other),
        }
    }
}

impl fmt::Debug for LoxFunction<'_> {
    // Shallow on purpose: the closure chain can cycle back through values
    // holding this function.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}
