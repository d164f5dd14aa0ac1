use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rulox::ast_printer::AstPrinter;
use rulox::interpreter::Interpreter;
use rulox::parser::Parser;
use rulox::scanner::Scanner;
use rulox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scans a file and prints each token
    Tokenize {
        filename: PathBuf,

        /// Emit the token stream as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses a file and prints each statement's syntax tree
    Parse { filename: PathBuf },

    /// Runs a file as a Lox program
    Run { filename: PathBuf },

    /// Starts an interactive prompt
    Repl,
}

/// Maps a script read-only; the scanner works straight off the mapping.
fn map_source(path: &Path) -> Result<Mmap> {
    info!("Mapping file: {:?}", path);

    let file = File::open(path).context(format!("Failed to open file {:?}", path))?;

    // SAFETY: the mapping is read-only and lives only for this run.
    let mmap = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", path))?;

    info!("Mapped {} bytes from {:?}", mmap.len(), path);

    Ok(mmap)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Record format: [module:line] - message, with the crate prefix
    // stripped from the module path.
    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rulox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));

            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to app.log");

    Ok(())
}

fn tokenize(filename: &Path, json: bool) -> Result<()> {
    let mmap = map_source(filename)?;

    if json {
        // JSON mode collects first, so it aborts on the first scan error.
        match Scanner::new(&mmap).scan_tokens() {
            Ok(tokens) => {
                let rendered = serde_json::to_string_pretty(&tokens)
                    .context("Failed to serialize tokens")?;

                println!("{rendered}");
            }

            Err(error) => {
                eprintln!("{error}");
                process::exit(65);
            }
        }

        return Ok(());
    }

    let mut clean = true;

    for result in Scanner::new(&mmap) {
        match result {
            Ok(token) => println!("{token}"),

            Err(error) => {
                clean = false;
                eprintln!("{error}");
            }
        }
    }

    if !clean {
        debug!("Tokenization hit errors, exiting with code 65");
        process::exit(65);
    }

    Ok(())
}

fn parse(filename: &Path) -> Result<()> {
    let mmap = map_source(filename)?;

    let tokens: Vec<Token<'_>> = match Scanner::new(&mmap).scan_tokens() {
        Ok(tokens) => tokens,
        Err(error) => {
            eprintln!("{error}");
            process::exit(65);
        }
    };

    match Parser::new(&tokens).parse() {
        Ok(program) => {
            for statement in &program {
                println!("{}", AstPrinter::print_stmt(statement));
            }
        }

        Err(error) => {
            eprintln!("{error}");
            process::exit(65);
        }
    }

    Ok(())
}

fn run_file(filename: &Path) -> Result<()> {
    let mmap = map_source(filename)?;
    let mut interpreter = Interpreter::new();

    if let Err(error) = rulox::run(&mmap, &mut interpreter) {
        eprintln!("{error}");
        process::exit(error.exit_code());
    }

    info!("Program executed successfully");

    Ok(())
}

fn repl() -> Result<()> {
    let mut interpreter: Interpreter<'static> = Interpreter::new();
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // end of input
        }

        if line.trim().is_empty() {
            continue;
        }

        // Values defined on this line may be referenced by any later line,
        // so the buffer has to live for the rest of the session.
        let source: &'static [u8] = Box::leak(line.into_bytes().into_boxed_slice());

        if let Err(error) = rulox::run_interactive(source, &mut interpreter) {
            eprintln!("{error}");
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        // Minimal logger so log macros have a target.
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.command {
        Commands::Tokenize { filename, json } => tokenize(&filename, json),
        Commands::Parse { filename } => parse(&filename),
        Commands::Run { filename } => run_file(&filename),
        Commands::Repl => repl(),
    }
}
