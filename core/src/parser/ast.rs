//! Arena-allocated AST for Tamarin programs.
//!
//! All nodes borrow from the `bumpalo` arena handed to [`parse`]; nodes
//! are plain `Copy` values holding arena references, so the tree can be
//! traversed and shared freely without ownership bookkeeping.
//!
//! The `Display` impls print source-shaped text. The compiler relies on
//! this for deterministic hash-literal key ordering, and the parser
//! tests use it to assert precedence (infix and prefix expressions
//! print fully parenthesized).
//!
//! [`parse`]: super::parse

use core::fmt;

use crate::parser::syntax::{BinaryOp, UnaryOp};

/// A whole program: the root node produced by the parser.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Program<'a> {
    pub statements: &'a [Statement<'a>],
}

/// A brace-delimited statement list (if-branches and function bodies).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Block<'a> {
    pub statements: &'a [Statement<'a>],
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Statement<'a> {
    Let { name: &'a str, value: &'a Expr<'a> },
    Return { value: &'a Expr<'a> },
    Expression { value: &'a Expr<'a> },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Expr<'a> {
    Integer(i64),
    Boolean(bool),
    Str(&'a str),
    Ident(&'a str),
    Prefix {
        op: UnaryOp,
        right: &'a Expr<'a>,
    },
    Infix {
        op: BinaryOp,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    },
    If {
        condition: &'a Expr<'a>,
        consequence: &'a Block<'a>,
        alternative: Option<&'a Block<'a>>,
    },
    Function {
        parameters: &'a [&'a str],
        body: &'a Block<'a>,
    },
    Call {
        function: &'a Expr<'a>,
        arguments: &'a [Expr<'a>],
    },
    Array {
        elements: &'a [Expr<'a>],
    },
    Hash {
        pairs: &'a [(Expr<'a>, Expr<'a>)],
    },
    Index {
        left: &'a Expr<'a>,
        index: &'a Expr<'a>,
    },
}

// Program and Block print identically: statements separated by a space.
fn fmt_statements(statements: &[Statement<'_>], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, statement) in statements.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", statement)?;
    }
    Ok(())
}

impl fmt::Display for Program<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_statements(self.statements, f)
    }
}

impl fmt::Display for Block<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_statements(self.statements, f)
    }
}

impl fmt::Display for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let { name, value } => write!(f, "let {} = {};", name, value),
            Statement::Return { value } => write!(f, "return {};", value),
            Statement::Expression { value } => write!(f, "{}", value),
        }
    }
}

impl fmt::Display for Expr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer(value) => write!(f, "{}", value),
            Expr::Boolean(value) => write!(f, "{}", value),
            Expr::Str(value) => write!(f, "\"{}\"", value),
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::Prefix { op, right } => write!(f, "({}{})", op, right),
            Expr::Infix { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if ({}) {{ {} }}", condition, consequence)?;
                if let Some(alternative) = alternative {
                    write!(f, " else {{ {} }}", alternative)?;
                }
                Ok(())
            }
            Expr::Function { parameters, body } => {
                write!(f, "fn({}) {{ {} }}", parameters.join(", "), body)
            }
            Expr::Call {
                function,
                arguments,
            } => {
                write!(f, "{}(", function)?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", argument)?;
                }
                write!(f, ")")
            }
            Expr::Array { elements } => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Expr::Hash { pairs } => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Expr::Index { left, index } => write!(f, "({}[{}])", left, index),
        }
    }
}
