//! Tree-walking evaluator.
//!
//! Statements execute for effect and expressions evaluate to [`Value`]s,
//! with variable references located in O(1) through the resolver's side
//! table.  Non-local control transfer (`return` to the nearest call
//! boundary, `break N` through N enclosing loops) travels as an
//! [`Unwind`] in the error channel of every statement result: each `while`
//! absorbs one break level, each function call absorbs a return, and
//! genuine runtime errors pass through both untouched.
//!
//! One `Interpreter` is one session: it owns the global frame, the
//! resolved-locals table, and the output sink, so independent sessions can
//! coexist in one process.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::class::{LoxClass, LoxInstance};
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::function::LoxFunction;
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::{NativeFn, Value};

/// A signal travelling outward through statement execution until the
/// nearest construct of the matching kind intercepts it.  Runtime errors
/// share the channel but are never intercepted.
#[derive(Debug)]
pub enum Unwind<'a> {
    /// A genuine error; propagates to the pipeline boundary.
    Raise(LoxError),

    /// `return`, carrying the value; absorbed at the call boundary.
    Return(Value<'a>),

    /// `break N`; each enclosing loop absorbs one level.
    Break { levels: usize },
}

impl From<LoxError> for Unwind<'_> {
    fn from(error: LoxError) -> Self {
        Unwind::Raise(error)
    }
}

/// Result alias for statement execution and expression evaluation.
pub type Exec<'a, T> = std::result::Result<T, Unwind<'a>>;

pub struct Interpreter<'a> {
    globals: EnvRef<'a>,
    environment: EnvRef<'a>,
    locals: Locals,
    /// Expression-identity watermark; interactive sessions thread it back
    /// into each new parser so identities never collide across chunks.
    next_id: ExprId,
    /// Where `print` writes.  Stdout by default; tests substitute a buffer.
    output: Box<dyn Write>,
}

impl<'a> Interpreter<'a> {
    /// A session printing to stdout, with the native globals defined.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// A session printing to an arbitrary sink.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing interpreter session");

        let globals = Rc::new(RefCell::new(Environment::new()));

        let mut interpreter = Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            next_id: 0,
            output,
        };

        interpreter.define_native("clock", 0, native_clock);
        interpreter.define_native("readLine", 0, native_read_line);
        interpreter.define_native("mod", 2, native_mod);

        interpreter
    }

    /// Registration hook for host-provided globals; must run before any
    /// user code that references them.
    pub fn define_native(&mut self, name: &'static str, arity: usize, func: NativeFn<'a>) {
        debug!("Defining native function '{}'", name);

        self.globals
            .borrow_mut()
            .define(name, Value::Native { name, arity, func });
    }

    /// First expression identity not yet used by this session.
    pub fn next_expr_id(&self) -> ExprId {
        self.next_id
    }

    /// Advance the identity watermark past a freshly parsed chunk.
    pub fn set_next_expr_id(&mut self, next_id: ExprId) {
        self.next_id = next_id;
    }

    /// Execute a resolved program.
    pub fn interpret(&mut self, statements: &[Stmt<'a>], locals: Locals) -> Result<()> {
        info!(
            "Interpreting {} statement(s), {} resolved local(s)",
            statements.len(),
            locals.len()
        );

        self.locals.extend(locals);

        for statement in statements {
            match self.execute(statement) {
                Ok(()) => {}
                Err(Unwind::Raise(error)) => return Err(error),
                Err(Unwind::Return(_)) | Err(Unwind::Break { .. }) => {
                    unreachable!("resolver rejects 'return' and 'break' at top level")
                }
            }
        }

        Ok(())
    }

    // ───────────────────────── statements ─────────────────────────

    fn execute(&mut self, stmt: &Stmt<'a>) -> Exec<'a, ()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value).map_err(LoxError::from)?;
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}'", name.lexeme);

                self.environment.borrow_mut().define(name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let frame = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));

                self.execute_block(statements, frame)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    match self.execute(body) {
                        Ok(()) => {}

                        // Absorb one break level here; re-raise the rest
                        // for the loops further out.
                        Err(Unwind::Break { levels }) => {
                            if levels > 1 {
                                return Err(Unwind::Break { levels: levels - 1 });
                            }

                            break;
                        }

                        Err(other) => return Err(other),
                    }
                }
            }

            Stmt::Break { levels, .. } => {
                debug!("Break unwinding {} level(s)", levels);

                return Err(Unwind::Break { levels: *levels });
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                let function = Value::Function(Rc::new(LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                )));

                self.environment
                    .borrow_mut()
                    .define(declaration.name.lexeme, function);
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                return Err(Unwind::Return(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.execute_class(name, superclass.as_ref(), methods)?;
            }
        }

        Ok(())
    }

    /// Execute `statements` in `frame`, restoring the previous environment
    /// on every exit path, including a propagating unwind.
    pub fn execute_block(&mut self, statements: &[Stmt<'a>], frame: EnvRef<'a>) -> Exec<'a, ()> {
        let previous = std::mem::replace(&mut self.environment, frame);

        let result = statements
            .iter()
            .try_for_each(|statement| self.execute(statement));

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token<'a>,
        superclass: Option<&Expr<'a>>,
        methods: &[Rc<FunctionDecl<'a>>],
    ) -> Exec<'a, ()> {
        debug!("Declaring class '{}'", name.lexeme);

        let superclass_value = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    let token = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => name,
                    };

                    return Err(Unwind::Raise(LoxError::runtime(
                        token,
                        "Superclass must be a class.",
                    )));
                }
            },
            None => None,
        };

        // Bind the name to nil first so method bodies can refer to the
        // class recursively through their closures.
        self.environment.borrow_mut().define(name.lexeme, Value::Nil);

        // Subclass methods close over an intermediate frame holding
        // `super`; it exists only as their closure parent and is never
        // pushed onto the execution chain.
        let method_closure = match &superclass_value {
            Some(superclass) => {
                let mut enclosing = Environment::with_enclosing(Rc::clone(&self.environment));
                enclosing.define("super", Value::Class(Rc::clone(superclass)));

                Rc::new(RefCell::new(enclosing))
            }
            None => Rc::clone(&self.environment),
        };

        let mut method_table: HashMap<&'a str, Rc<LoxFunction<'a>>> = HashMap::new();

        for method in methods {
            let is_initializer = method.name.lexeme == name.lexeme;

            method_table.insert(
                method.name.lexeme,
                Rc::new(LoxFunction::new(
                    Rc::clone(method),
                    Rc::clone(&method_closure),
                    is_initializer,
                )),
            );
        }

        let class = Value::Class(Rc::new(LoxClass::new(
            name.lexeme,
            superclass_value,
            method_table,
        )));

        self.environment.borrow_mut().assign(name, class)?;

        Ok(())
    }

    // ───────────────────────── expressions ────────────────────────

    fn evaluate(&mut self, expr: &Expr<'a>) -> Exec<'a, Value<'a>> {
        match expr {
            Expr::Literal(literal) => Ok(literal_value(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(Unwind::Raise(LoxError::runtime(
                            operator,
                            "Operand must be a number.",
                        ))),
                    },

                    TokenType::BANG => Ok(Value::Bool(!is_truthy(&right))),

                    _ => unreachable!("invalid unary operator"),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;

                self.evaluate_binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                // Short circuit, yielding the deciding operand itself.
                let short_circuits = match operator.token_type {
                    TokenType::OR => is_truthy(&left),
                    TokenType::AND => !is_truthy(&left),
                    _ => unreachable!("invalid logical operator"),
                };

                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(name, *id),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone());
                    }
                    None => {
                        self.globals.borrow_mut().assign(name, value.clone())?;
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut evaluated = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    evaluated.push(self.evaluate(argument)?);
                }

                self.call_value(callee, paren, evaluated)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Ok(LoxInstance::get(&instance, name)?),

                _ => Err(Unwind::Raise(LoxError::runtime(
                    name,
                    "Only instances have properties.",
                ))),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;

                    instance.borrow_mut().set(name, value.clone());

                    Ok(value)
                }

                _ => Err(Unwind::Raise(LoxError::runtime(
                    name,
                    "Only instances have fields.",
                ))),
            },

            Expr::This { id, keyword } => self.look_up_variable(keyword, *id),

            Expr::Super {
                id,
                keyword: _,
                method,
            } => {
                let distance = *self
                    .locals
                    .get(id)
                    .expect("'super' always resolves as a local");

                let superclass = match Environment::get_at(&self.environment, distance, "super") {
                    Value::Class(class) => class,
                    _ => unreachable!("'super' bound to a non-class"),
                };

                // `this` lives in the binding frame just inside `super`.
                let object = match Environment::get_at(&self.environment, distance - 1, "this") {
                    Value::Instance(instance) => instance,
                    _ => unreachable!("'this' bound to a non-instance"),
                };

                match superclass.find_method(method.lexeme) {
                    Some(found) => Ok(Value::Function(Rc::new(found.bind(object)))),

                    None => Err(Unwind::Raise(LoxError::runtime(
                        method,
                        format!("Undefined property '{}'.", method.lexeme),
                    ))),
                }
            }
        }
    }

    fn evaluate_binary(
        &mut self,
        operator: &Token<'a>,
        left: Value<'a>,
        right: Value<'a>,
    ) -> Exec<'a, Value<'a>> {
        match operator.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),

                _ => Err(Unwind::Raise(LoxError::runtime(
                    operator,
                    "Operands must be two numbers or two strings.",
                ))),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a * b))
            }

            // IEEE semantics: division by zero yields an infinity.
            TokenType::SLASH => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(is_equal(&left, &right))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!is_equal(&left, &right))),

            _ => unreachable!("invalid binary operator"),
        }
    }

    fn look_up_variable(&self, name: &Token<'a>, id: ExprId) -> Exec<'a, Value<'a>> {
        match self.locals.get(&id) {
            Some(&distance) => Ok(Environment::get_at(&self.environment, distance, name.lexeme)),
            None => Ok(self.globals.borrow().get(name)?),
        }
    }

    /// Dispatch a call to whatever kind of callable `callee` is, checking
    /// the argument count against its arity first.
    fn call_value(
        &mut self,
        callee: Value<'a>,
        paren: &Token<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Exec<'a, Value<'a>> {
        match callee {
            Value::Native { name, arity, func } => {
                debug!("Calling native function '{}'", name);

                check_arity(arity, arguments.len(), paren)?;

                func(&arguments)
                    .map_err(|message| Unwind::Raise(LoxError::runtime(paren, message)))
            }

            Value::Function(function) => {
                check_arity(function.arity(), arguments.len(), paren)?;

                function.call(self, arguments)
            }

            Value::Class(class) => {
                check_arity(class.arity(), arguments.len(), paren)?;

                LoxClass::instantiate(&class, self, arguments)
            }

            _ => Err(Unwind::Raise(LoxError::runtime(
                paren,
                "Can only call functions and classes.",
            ))),
        }
    }
}

impl Default for Interpreter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────── helpers ───────────────────────────

fn literal_value<'a>(literal: &LiteralValue) -> Value<'a> {
    match literal {
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::Str(s) => Value::Str(s.clone()),
        LiteralValue::True => Value::Bool(true),
        LiteralValue::False => Value::Bool(false),
        LiteralValue::Nil => Value::Nil,
    }
}

fn number_operands<'a>(
    operator: &Token<'a>,
    left: Value<'a>,
    right: Value<'a>,
) -> Exec<'a, (f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),

        _ => Err(Unwind::Raise(LoxError::runtime(
            operator,
            "Operands must be numbers.",
        ))),
    }
}

fn check_arity<'a>(expected: usize, got: usize, paren: &Token<'a>) -> Exec<'a, ()> {
    if expected != got {
        return Err(Unwind::Raise(LoxError::runtime(
            paren,
            format!("Expected {} arguments but got {}.", expected, got),
        )));
    }

    Ok(())
}

/// Only `nil` and `false` are falsy.
pub fn is_truthy(value: &Value<'_>) -> bool {
    match value {
        Value::Nil => false,
        Value::Bool(b) => *b,
        _ => true,
    }
}

/// Value equality for primitives, identity for everything else.
pub fn is_equal<'a>(left: &Value<'a>, right: &Value<'a>) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,

        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),

        (
            Value::Native {
                name: a, arity: x, ..
            },
            Value::Native {
                name: b, arity: y, ..
            },
        ) => a == b && x == y,

        _ => false,
    }
}

// ─────────────────────────── natives ───────────────────────────

/// `clock()` → fractional seconds since the Unix epoch.
fn native_clock<'a>(_args: &[Value<'a>]) -> std::result::Result<Value<'a>, String> {
    Ok(Value::Number(Utc::now().timestamp_micros() as f64 / 1e6))
}

/// `readLine()` → one line from stdin, or nil at end of input.
fn native_read_line<'a>(_args: &[Value<'a>]) -> std::result::Result<Value<'a>, String> {
    let mut line = String::new();

    match io::stdin().read_line(&mut line) {
        Ok(0) => Ok(Value::Nil),
        Ok(_) => {
            line.truncate(line.trim_end_matches(['\r', '\n']).len());
            Ok(Value::Str(line))
        }
        Err(error) => Err(error.to_string()),
    }
}

/// `mod(a, b)` → floating-point remainder of `a` over `b`.
fn native_mod<'a>(args: &[Value<'a>]) -> std::result::Result<Value<'a>, String> {
    match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a % b)),
        _ => Err("Operands must be numbers.".to_string()),
    }
}
