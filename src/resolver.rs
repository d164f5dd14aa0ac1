//! Static resolution pass, run once per program before any execution.
//!
//! One AST walk does three jobs:
//! 1. Build lexical scopes (a stack of `HashMap<&str, bool>` tracking
//!    declared-but-not-yet-defined names).
//! 2. Record, for every `Variable`/`Assign`/`This`/`Super` occurrence, how
//!    many frames outward its declaring scope sits: the side table the
//!    interpreter uses for O(1) lookup.  Names found in no scope are left
//!    out of the table and resolve in the globals at run time.
//! 3. Reject scope-related semantic errors before a single statement runs:
//!    redeclaration, reading a local in its own initializer, `return`
//!    outside a function, returning a value from an initializer,
//!    `this`/`super` outside a (sub)class, self-inheritance, and `break`
//!    outside a loop or deeper than the loops that enclose it.
//!
//! Each program gets a fresh resolver, so resolution never observes state
//! from a previous program.

use std::collections::HashMap;

use log::{debug, info};

use crate::ast::{Expr, ExprId, Stmt};
use crate::error::{LoxError, Result};
use crate::token::Token;

/// What kind of function body, if any, encloses the current node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// What kind of class body, if any, encloses the current node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Scope-distance side table: expression identity → frames outward.
pub type Locals = HashMap<ExprId, usize>;

pub struct Resolver<'a> {
    /// Innermost scope last; `false` until the name's initializer has been
    /// resolved, `true` once the name is usable.
    scopes: Vec<HashMap<&'a str, bool>>,
    locals: Locals,
    current_function: FunctionType,
    current_class: ClassType,
    /// Loops enclosing the current node; resets inside function bodies.
    loop_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
        }
    }

    /// Walk all top-level statements and hand back the side table.
    pub fn resolve(mut self, statements: &[Stmt<'a>]) -> Result<Locals> {
        info!("Resolving {} top-level statement(s)", statements.len());

        for statement in statements {
            self.resolve_stmt(statement)?;
        }

        Ok(self.locals)
    }

    // ───────────────────────── statements ─────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt<'a>) -> Result<()> {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for statement in statements {
                    self.resolve_stmt(statement)?;
                }
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                self.declare(name)?;
                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }
                self.define(name);
            }

            Stmt::Function(declaration) => {
                // The name is usable inside its own body; recursion works.
                self.declare(&declaration.name)?;
                self.define(&declaration.name);

                self.resolve_function(
                    &declaration.params,
                    &declaration.body,
                    FunctionType::Function,
                )?;
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch)?;
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;

                self.loop_depth += 1;
                let result = self.resolve_stmt(body);
                self.loop_depth -= 1;

                result?;
            }

            Stmt::Break { keyword, levels } => {
                if self.loop_depth == 0 {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't use 'break' outside of a loop.",
                    ));
                }

                if *levels > self.loop_depth {
                    return Err(LoxError::resolve(
                        keyword,
                        format!(
                            "Break count {} exceeds the {} enclosing loop(s).",
                            levels, self.loop_depth
                        ),
                    ));
                }
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't return from top-level code.",
                    ));
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        return Err(LoxError::resolve(
                            keyword,
                            "Can't return a value from an initializer.",
                        ));
                    }

                    self.resolve_expr(expr)?;
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let enclosing_class = self.current_class;
                self.current_class = ClassType::Class;

                self.declare(name)?;
                self.define(name);

                if let Some(superclass_expr) = superclass {
                    if let Expr::Variable {
                        name: super_name, ..
                    } = superclass_expr
                    {
                        if super_name.lexeme == name.lexeme {
                            return Err(LoxError::resolve(
                                super_name,
                                "A class can't inherit from itself.",
                            ));
                        }
                    }

                    self.current_class = ClassType::Subclass;
                    self.resolve_expr(superclass_expr)?;

                    // Method closures of a subclass see `super` one scope
                    // outside `this`.
                    self.begin_scope();
                    self.define_implicit("super");
                }

                self.begin_scope();
                self.define_implicit("this");

                for method in methods {
                    let declaration = if method.name.lexeme == name.lexeme {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };

                    self.resolve_function(&method.params, &method.body, declaration)?;
                }

                self.end_scope();

                if superclass.is_some() {
                    self.end_scope();
                }

                self.current_class = enclosing_class;
            }
        }

        Ok(())
    }

    // ───────────────────────── expressions ────────────────────────

    fn resolve_expr(&mut self, expr: &Expr<'a>) -> Result<()> {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner)?;
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right)?;
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.lexeme) == Some(&false) {
                        return Err(LoxError::resolve(
                            name,
                            "Can't read local variable in its own initializer.",
                        ));
                    }
                }

                self.resolve_local(*id, name.lexeme);
            }

            Expr::Assign { id, name, value } => {
                // RHS first, then bind the target.
                self.resolve_expr(value)?;
                self.resolve_local(*id, name.lexeme);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;
                for argument in arguments {
                    self.resolve_expr(argument)?;
                }
            }

            Expr::Get { object, .. } => {
                // Property names are looked up dynamically; only the
                // object expression resolves.
                self.resolve_expr(object)?;
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object)?;
                self.resolve_expr(value)?;
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't use 'this' outside of a class.",
                    ));
                }

                self.resolve_local(*id, keyword.lexeme);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        return Err(LoxError::resolve(
                            keyword,
                            "Can't use 'super' outside of a class.",
                        ));
                    }
                    ClassType::Class => {
                        return Err(LoxError::resolve(
                            keyword,
                            "Can't use 'super' in a class with no superclass.",
                        ));
                    }
                    ClassType::Subclass => {}
                }

                self.resolve_local(*id, keyword.lexeme);
            }
        }

        Ok(())
    }

    // ───────────────────────── function helper ────────────────────

    /// Fresh scope for a function's parameters and body.  `break` cannot
    /// reach out of a function, so the loop depth resets for the body.
    fn resolve_function(
        &mut self,
        params: &[Token<'a>],
        body: &[Stmt<'a>],
        declaration: FunctionType,
    ) -> Result<()> {
        let enclosing_function = self.current_function;
        let enclosing_loop_depth = self.loop_depth;

        self.current_function = declaration;
        self.loop_depth = 0;

        self.begin_scope();

        for param in params {
            self.declare(param)?;
            self.define(param);
        }
        for statement in body {
            self.resolve_stmt(statement)?;
        }

        self.end_scope();

        self.current_function = enclosing_function;
        self.loop_depth = enclosing_loop_depth;

        Ok(())
    }

    // ───────────────────────── scope management ───────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token<'a>) -> Result<()> {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name.lexeme) {
                return Err(LoxError::resolve(
                    name,
                    "Variable with this name already in scope.",
                ));
            }

            scope.insert(name.lexeme, false);
        }

        Ok(())
    }

    fn define(&mut self, name: &Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme, true);
        }
    }

    /// Inserts a language-defined binding (`this`, `super`) into the scope
    /// just pushed for it.
    fn define_implicit(&mut self, name: &'static str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, true);
        }
    }

    /// Record this occurrence as a local at the depth of the innermost
    /// scope declaring it, or leave it global by recording nothing.
    fn resolve_local(&mut self, id: ExprId, name: &str) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                debug!("Resolved '{}' at depth {}", name, depth);

                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name);
    }
}

impl Default for Resolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}
