//! Lexing and parsing for Tamarin source text.
//!
//! The grammar lives in `grammar.pest`; expressions are parsed with a
//! Pratt parser on top of the pest token pairs. All AST nodes are
//! allocated in the caller-provided `bumpalo` arena.

mod ast;
pub mod error;
pub mod parser;
mod syntax;

pub use ast::{Block, Expr, Program, Statement};
pub use error::ParseError;
pub use parser::{Rule, TamarinParser, parse};
pub use syntax::{BinaryOp, Span, UnaryOp};
