use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rlox::ast_printer::AstPrinter;
use rlox::interpreter::Interpreter;
use rlox::parser::Parser;
use rlox::reporter::Reporter;
use rlox::resolver::Resolver;
use rlox::scanner;
use rlox::stmt::Stmt;
use rlox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize { filename: Option<PathBuf> },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Runs input from a file as a Lox program
    Run { filename: Option<PathBuf> },
}

/// Reads the contents of a file into a Vec<u8>
fn read_file(filename: PathBuf) -> Result<Vec<u8>> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Write to file with module path (crate prefix stripped) and source line
    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rlox::")
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
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename } => match filename {
            Some(filename) => {
                info!("Running Tokenize subcommand");
                let buf = read_file(filename)?;
                let mut reporter = Reporter::new();

                let tokens: Vec<Token<'_>> = scanner::scan(&buf, &mut reporter);

                for token in &tokens {
                    debug!("Scanned token: {}", token);

                    println!("{}", token);
                }

                if reporter.had_error() {
                    debug!("Tokenization failed, exiting with code 65");

                    std::process::exit(65);
                }

                info!("Tokenization completed successfully");
            }
            None => {
                info!("No filepath provided for Tokenize");

                println!("No input filepath was provided. Exiting...");

                std::process::exit(0);
            }
        },

        Commands::Parse { filename } => match filename {
            Some(filename) => {
                info!("Running Parse subcommand");
                let buf = read_file(filename)?;
                let mut reporter = Reporter::new();

                let tokens: Vec<Token<'_>> = scanner::scan(&buf, &mut reporter);
                let mut parser = Parser::new(&tokens, &mut reporter);

                match parser.parse_expression() {
                    Some(expr) if !reporter.had_error() => {
                        let ast_str = AstPrinter::print(&expr);

                        debug!("AST: {}", ast_str);
                        println!("{}", ast_str);
                    }

                    _ => {
                        debug!("Parse failed, exiting with code 65");

                        std::process::exit(65);
                    }
                }

                info!("Parse subcommand completed");
            }
            None => {
                info!("No filepath provided for Parse");
                println!("No input filepath was provided. Exiting...");
                std::process::exit(0);
            }
        },

        Commands::Run { filename } => match filename {
            Some(filename) => {
                info!("Running Run subcommand");
                let buf = read_file(filename)?;
                let mut reporter = Reporter::new();

                let tokens: Vec<Token<'_>> = scanner::scan(&buf, &mut reporter);

                let statements: Vec<Stmt<'_>> = {
                    let mut parser = Parser::new(&tokens, &mut reporter);
                    parser.parse()
                };

                // Static errors (lex or parse) stop the run before execution.
                if reporter.had_error() {
                    debug!("Static errors before resolution, exiting with code 65");

                    std::process::exit(65);
                }

                info!("Parsed {} statements", statements.len());

                let mut interpreter = Interpreter::new();

                {
                    let mut resolver = Resolver::new(&mut interpreter, &mut reporter);
                    resolver.resolve(&statements);
                }

                if reporter.had_error() {
                    debug!("Resolution errors, exiting with code 65");

                    std::process::exit(65);
                }

                match interpreter.interpret(&statements) {
                    Ok(()) => {
                        info!("Program executed successfully");
                    }

                    Err(e) => {
                        debug!("Runtime debug: {}", e);
                        reporter.runtime_error(&e);
                        std::process::exit(70);
                    }
                }
            }

            None => {
                info!("No filepath provided for Run");
                println!("No input filepath was provided. Exiting...");
                std::process::exit(0);
            }
        },
    }

    Ok(())
}
