//! Box compiler front end
//!
//! The front-end and static-analysis core of the Box language compiler:
//! everything from source text up to an optimized, memory-checked AST.
//! Code generation consumes that AST and is deliberately not part of this
//! crate.
//!
//! # Architecture
//!
//! ```text
//! Source Code (.box)
//!       │
//!       ▼
//! ┌─────────────┐
//! │    Lexer    │  → Tokens (+ lexical diagnostics)
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Parser    │  → AST (+ parse diagnostics)
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │  Optimizer  │  → AST (pass pipeline, fixed point)
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │ Mem. Safety │  → verdict, errors, warnings, report
//! └─────────────┘
//! ```
//!
//! Each phase owns its output and accumulates its diagnostics; a phase
//! with errors returns them as a bundle rather than stopping at the
//! first.

pub mod ast;
pub mod diagnostics;
pub mod lexer;
pub mod memory;
pub mod optimizer;
pub mod parser;
pub mod span;
pub mod token;

// Re-exports for convenience
pub use lexer::Lexer;
pub use memory::MemorySafetyAnalyzer;
pub use optimizer::{Optimizer, OptimizerConfig};
pub use parser::Parser;
pub use span::{LineIndex, Position, Span};
pub use token::{Literal, Token, TokenKind};

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File extension for Box source files
pub const FILE_EXTENSION: &str = "box";
