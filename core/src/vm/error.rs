//! Runtime errors of the virtual machine.
//!
//! Errors are values returned from `run`; the VM never unwinds or
//! panics on user programs.

use core::fmt;

use crate::values::BuiltinError;
use crate::vm::instruction_set::Opcode;

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    UnsupportedBinaryTypes {
        left: &'static str,
        right: &'static str,
    },
    UnknownIntegerOperator(Opcode),
    UnknownStringOperator(Opcode),
    UnknownOperator {
        left: &'static str,
        operator: &'static str,
        right: &'static str,
    },
    UnsupportedNegation(&'static str),
    IndexNotSupported(&'static str),
    UnusableHashKey(&'static str),
    DivisionByZero,
    CallingNonFunction,
    NotAFunction(&'static str),
    WrongArgumentCount {
        want: usize,
        got: usize,
    },
    StackOverflow,
    FrameOverflow,
    UndefinedOpcode(u8),
    Builtin(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UnsupportedBinaryTypes { left, right } => {
                write!(f, "unsupported types for binary operation: {} {}", left, right)
            }
            RuntimeError::UnknownIntegerOperator(op) => {
                write!(f, "unknown integer operator: {}", op.definition().name)
            }
            RuntimeError::UnknownStringOperator(op) => {
                write!(f, "unknown string operator: {}", op.definition().name)
            }
            RuntimeError::UnknownOperator {
                left,
                operator,
                right,
            } => write!(f, "unknown operator: {} {} {}", left, operator, right),
            RuntimeError::UnsupportedNegation(type_name) => {
                write!(f, "unsupported type for negation: {}", type_name)
            }
            RuntimeError::IndexNotSupported(type_name) => {
                write!(f, "index operator not supported: {}", type_name)
            }
            RuntimeError::UnusableHashKey(type_name) => {
                write!(f, "unusable as hash key: {}", type_name)
            }
            RuntimeError::DivisionByZero => write!(f, "division by zero"),
            RuntimeError::CallingNonFunction => {
                write!(f, "calling non-closure and non-builtin")
            }
            RuntimeError::NotAFunction(type_name) => {
                write!(f, "not a function: {}", type_name)
            }
            RuntimeError::WrongArgumentCount { want, got } => {
                write!(f, "wrong number of arguments: want={}, got={}", want, got)
            }
            RuntimeError::StackOverflow => write!(f, "stack overflow"),
            RuntimeError::FrameOverflow => write!(f, "frame overflow"),
            RuntimeError::UndefinedOpcode(byte) => write!(f, "undefined opcode {}", byte),
            RuntimeError::Builtin(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<BuiltinError> for RuntimeError {
    fn from(err: BuiltinError) -> Self {
        RuntimeError::Builtin(err.0)
    }
}
