//! Runtime values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::class::{LoxClass, LoxInstance};
use crate::function::LoxFunction;

/// Signature of a native (host-provided) function.  Arity is validated by
/// the interpreter before the call; a returned `Err` becomes a runtime
/// error anchored at the call site.
pub type NativeFn<'a> = fn(&[Value<'a>]) -> std::result::Result<Value<'a>, String>;

/// Every value a Lox program can produce.  Numbers, strings, and booleans
/// compare by value; functions, classes, and instances by identity.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),

    /// Host-provided global such as `clock`.
    Native {
        name: &'static str,
        arity: usize,
        func: NativeFn<'a>,
    },

    Function(Rc<LoxFunction<'a>>),
    Class(Rc<LoxClass<'a>>),
    Instance(Rc<RefCell<LoxInstance<'a>>>),
}

impl fmt::Display for Value<'_> {
    /// Canonical text forms: `nil`, bare numbers (integral values print
    /// with no fractional part), raw string contents, `<fn name>`, the
    /// class name, `<name> instance`, `<native fn>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => {
                let truncated = *n as i64;

                if truncated as f64 == *n {
                    let mut buf = itoa::Buffer::new();
                    f.write_str(buf.format(truncated))
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::Str(s) => f.write_str(s),

            Value::Native { .. } => f.write_str("<native fn>"),

            Value::Function(function) => write!(f, "<fn {}>", function.name()),

            Value::Class(class) => f.write_str(class.name),

            Value::Instance(instance) => write!(f, "{} instance", instance.borrow().class_name()),
        }
    }
}
