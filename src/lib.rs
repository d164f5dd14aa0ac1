//! A tree-walking interpreter for the Lox language: scanner → parser →
//! resolver → interpreter, plus the runtime object model (environments,
//! functions, classes, instances) they operate on.

pub mod ast;
pub mod ast_printer;
pub mod class;
pub mod environment;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

use error::Result;
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// Run one chunk of source through the full pipeline against an existing
/// session.  The first error of any stage aborts the chunk and is handed
/// back for the front end to report; nothing executes unless scanning,
/// parsing, and resolution all succeeded.
pub fn run<'a>(source: &'a [u8], interpreter: &mut Interpreter<'a>) -> Result<()> {
    run_chunk(source, interpreter, false)
}

/// Like [`run`], but a chunk consisting of a single expression statement
/// is echoed as if wrapped in `print` (the interactive-prompt nicety).
pub fn run_interactive<'a>(source: &'a [u8], interpreter: &mut Interpreter<'a>) -> Result<()> {
    run_chunk(source, interpreter, true)
}

fn run_chunk<'a>(
    source: &'a [u8],
    interpreter: &mut Interpreter<'a>,
    echo_expressions: bool,
) -> Result<()> {
    let tokens = Scanner::new(source).scan_tokens()?;

    let mut parser = Parser::with_first_id(&tokens, interpreter.next_expr_id());
    let mut program = parser.parse()?;
    interpreter.set_next_expr_id(parser.next_id());

    if echo_expressions && matches!(program.as_slice(), [ast::Stmt::Expression(_)]) {
        if let Some(ast::Stmt::Expression(expr)) = program.pop() {
            program.push(ast::Stmt::Print(expr));
        }
    }

    let locals = Resolver::new().resolve(&program)?;

    interpreter.interpret(&program, locals)
}
