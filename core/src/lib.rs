//! Tamarin — a small dynamically-typed expression language.
//!
//! The crate contains two execution engines over one value model:
//!
//! - a single-pass bytecode [`compiler`] feeding a stack-based virtual
//!   machine ([`vm`]), and
//! - a tree-walking [`evaluator`].
//!
//! Both consume the arena-allocated AST produced by [`parser`] and
//! agree on observable results for well-typed programs.
//!
//! # Quick start
//!
//! ```
//! use bumpalo::Bump;
//! use tamarin_core::{compiler::Compiler, parser, vm::Vm};
//!
//! let arena = Bump::new();
//! let program = parser::parse(&arena, "let x = 2; x * 21").unwrap();
//!
//! let mut compiler = Compiler::new();
//! compiler.compile(&program).unwrap();
//!
//! let mut vm = Vm::new(compiler.bytecode());
//! vm.run().unwrap();
//! assert_eq!(vm.last_popped_stack_elem().to_string(), "42");
//! ```

pub mod compiler;
pub mod evaluator;
pub mod parser;
pub mod values;
pub mod vm;

/// Test utilities for enabling logging in tests.
#[cfg(test)]
pub mod test_utils {
    /// Initialize a tracing subscriber for tests. Call at the start of
    /// a test to see `RUST_LOG`-filtered output; repeated calls are
    /// no-ops.
    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, fmt};

        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }
}
