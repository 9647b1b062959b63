//! Built-in functions.
//!
//! The registry is shared by both engines: the evaluator resolves
//! builtins by name when an identifier misses the environment, while
//! compiled code addresses them by index through `OpGetBuiltin` — so
//! the order of [`BUILTINS`] is part of the compiled-code ABI.
//!
//! All builtins are pure except `puts`, which writes to stdout.

use core::fmt;

use ecow::EcoVec;

use crate::values::Value;

/// Error produced by a builtin; the calling engine wraps it into its
/// own runtime error type.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinError(pub String);

impl fmt::Display for BuiltinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BuiltinError {}

pub type BuiltinFn = for<'a> fn(&[Value<'a>]) -> Result<Value<'a>, BuiltinError>;

pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// The builtin registry, addressable by `OpGetBuiltin` operand.
pub static BUILTINS: [Builtin; 6] = [
    Builtin { name: "len", func: len },
    Builtin { name: "puts", func: puts },
    Builtin { name: "first", func: first },
    Builtin { name: "last", func: last },
    Builtin { name: "rest", func: rest },
    Builtin { name: "push", func: push },
];

/// Look up a builtin by name (used by the evaluator and the REPL).
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|builtin| builtin.name == name)
}

fn expect_arity(args: &[Value<'_>], want: usize) -> Result<(), BuiltinError> {
    if args.len() != want {
        return Err(BuiltinError(format!(
            "wrong number of arguments. got={}, want={}",
            args.len(),
            want
        )));
    }
    Ok(())
}

fn len<'a>(args: &[Value<'a>]) -> Result<Value<'a>, BuiltinError> {
    expect_arity(args, 1)?;
    match &args[0] {
        Value::Str(value) => Ok(Value::Integer(value.len() as i64)),
        Value::Array(elements) => Ok(Value::Integer(elements.len() as i64)),
        other => Err(BuiltinError(format!(
            "argument to `len` not supported, got {}",
            other.type_name()
        ))),
    }
}

fn puts<'a>(args: &[Value<'a>]) -> Result<Value<'a>, BuiltinError> {
    for arg in args {
        println!("{}", arg);
    }
    Ok(Value::Null)
}

fn first<'a>(args: &[Value<'a>]) -> Result<Value<'a>, BuiltinError> {
    expect_arity(args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(elements.first().cloned().unwrap_or(Value::Null)),
        other => Err(BuiltinError(format!(
            "argument to `first` must be ARRAY, got {}",
            other.type_name()
        ))),
    }
}

fn last<'a>(args: &[Value<'a>]) -> Result<Value<'a>, BuiltinError> {
    expect_arity(args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(elements.last().cloned().unwrap_or(Value::Null)),
        other => Err(BuiltinError(format!(
            "argument to `last` must be ARRAY, got {}",
            other.type_name()
        ))),
    }
}

fn rest<'a>(args: &[Value<'a>]) -> Result<Value<'a>, BuiltinError> {
    expect_arity(args, 1)?;
    match &args[0] {
        Value::Array(elements) => {
            if elements.is_empty() {
                return Ok(Value::Null);
            }
            let rest: EcoVec<Value<'a>> = elements.iter().skip(1).cloned().collect();
            Ok(Value::Array(rest))
        }
        other => Err(BuiltinError(format!(
            "argument to `rest` must be ARRAY, got {}",
            other.type_name()
        ))),
    }
}

fn push<'a>(args: &[Value<'a>]) -> Result<Value<'a>, BuiltinError> {
    expect_arity(args, 2)?;
    match &args[0] {
        Value::Array(elements) => {
            let mut pushed = elements.clone();
            pushed.push(args[1].clone());
            Ok(Value::Array(pushed))
        }
        other => Err(BuiltinError(format!(
            "argument to `push` must be ARRAY, got {}",
            other.type_name()
        ))),
    }
}
