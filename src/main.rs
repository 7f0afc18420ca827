//! Box compiler CLI
//!
//! The `boxc` command drives the front-end core: lex, parse, optimize and
//! run the memory-safety analyzer over a source file, printing rendered
//! diagnostics. File resolution for imports, code generation and linking
//! belong to the full toolchain, not this binary.

use boxc::{lexer, memory, optimizer, parser};
use clap::{Parser as ClapParser, Subcommand};
use std::fs;
use std::path::PathBuf;

#[derive(ClapParser)]
#[command(name = "boxc")]
#[command(version = boxc::VERSION)]
#[command(about = "The Box compiler front end", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a file: parse, optimize and run the memory-safety analyzer
    Check {
        /// Input file to check
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Optimization level (0-3)
        #[arg(short = 'O', long, default_value = "2")]
        opt_level: u8,

        /// Report would-be warnings from the analyzer as hard errors
        #[arg(long, default_value = "true")]
        strict: bool,
    },

    /// Tokenize a file and print tokens
    Tokenize {
        /// Input file to tokenize
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Parse a file and print the AST
    Parse {
        /// Input file to parse
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Print the AST after the optimizer pipeline reaches a fixed point
    Optimize {
        /// Input file to optimize
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Optimization level (0-3)
        #[arg(short = 'O', long, default_value = "2")]
        opt_level: u8,
    },
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            input,
            opt_level,
            strict,
        } => {
            let source = read_source(&input)?;
            let statements = parse_source(&source)?;

            let config = optimizer::OptimizerConfig::for_level(opt_level);
            let optimized = optimizer::optimize(&statements, config);

            let mut analyzer = memory::MemorySafetyAnalyzer::with_strict_mode(strict);
            let result = analyzer.analyze(&optimized);

            print!("{}", result.report);

            if !result.safe {
                return Err(miette::miette!(
                    "Found {} memory safety error(s)",
                    result.errors.len()
                ));
            }

            println!("{}: no errors found", input.display());
            Ok(())
        }

        Commands::Tokenize { input } => {
            let source = read_source(&input)?;

            match lexer::lex(&source) {
                Ok(tokens) => {
                    for token in &tokens {
                        println!(
                            "{:>4}:{:<4} {:16} {:?}",
                            token.line,
                            token.column,
                            format!("{:?}", token.kind),
                            token.lexeme
                        );
                    }
                    Ok(())
                }
                Err(errors) => {
                    eprint!("{}", lexer::render_errors(&errors));
                    Err(miette::miette!("Found {} lexical error(s)", errors.len()))
                }
            }
        }

        Commands::Parse { input } => {
            let source = read_source(&input)?;
            let statements = parse_source(&source)?;
            println!("{:#?}", statements);
            Ok(())
        }

        Commands::Optimize { input, opt_level } => {
            let source = read_source(&input)?;
            let statements = parse_source(&source)?;

            let config = optimizer::OptimizerConfig::for_level(opt_level);
            let optimized = optimizer::optimize(&statements, config);

            println!("{:#?}", optimized);
            Ok(())
        }
    }
}

fn read_source(input: &PathBuf) -> miette::Result<String> {
    fs::read_to_string(input).map_err(|e| miette::miette!("Failed to read file: {}", e))
}

fn parse_source(source: &str) -> miette::Result<Vec<boxc::ast::Stmt>> {
    let tokens = match lexer::lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            eprint!("{}", lexer::render_errors(&errors));
            return Err(miette::miette!("Found {} lexical error(s)", errors.len()));
        }
    };

    match parser::parse(tokens, source) {
        Ok(statements) => Ok(statements),
        Err(errors) => {
            eprint!("{}", parser::render_errors(&errors));
            Err(miette::miette!("Found {} parse error(s)", errors.len()))
        }
    }
}
