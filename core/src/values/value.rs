//! The Tamarin value model.
//!
//! Values are a tagged union over a closed set of shapes. Compound
//! content (strings, arrays, hashes, functions) is immutable at the
//! language level and shared by ownership: `EcoString`/`EcoVec` clone
//! by reference-count bump, hashes and functions sit behind `Rc`. A
//! `Value` clone is therefore always cheap, which the VM relies on —
//! popping the stack clones the slot rather than moving out of it.

use core::fmt;
use std::rc::Rc;

use ecow::{EcoString, EcoVec};
use hashbrown::HashMap;

use crate::evaluator::Env;
use crate::parser::Block;
use crate::values::builtins::Builtin;
use crate::vm::instruction_set::Instructions;

#[derive(Clone)]
pub enum Value<'a> {
    Integer(i64),
    Boolean(bool),
    Null,
    Str(EcoString),
    Array(EcoVec<Value<'a>>),
    Hash(Rc<HashMap<HashKey, HashPair<'a>>>),
    /// A function value in the tree-walking engine.
    Function(Rc<Function<'a>>),
    /// A unit of compiled bytecode; only ever wrapped into a [`Closure`]
    /// before being called.
    Compiled(Rc<CompiledFunction>),
    Closure(Rc<Closure<'a>>),
    Builtin(&'static Builtin),
}

/// Value shapes usable as hash keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Integer(i64),
    Boolean(bool),
    Str(EcoString),
}

/// A hash entry keeps the original key value alongside the mapped value
/// so that inspection can print the key as written.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair<'a> {
    pub key: Value<'a>,
    pub value: Value<'a>,
}

/// A function literal closed over the environment it was evaluated in.
/// Used only by the tree-walking engine; the VM's counterpart is
/// [`Closure`].
pub struct Function<'a> {
    pub parameters: &'a [&'a str],
    pub body: &'a Block<'a>,
    pub env: Env<'a>,
}

/// Bytecode plus the frame layout the VM needs to call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A compiled function bundled with the free variables it captured.
#[derive(Debug, Clone)]
pub struct Closure<'a> {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Value<'a>>,
}

impl<'a> Value<'a> {
    /// The type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::Null => "NULL",
            Value::Str(_) => "STRING",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::Function(_) => "FUNCTION",
            Value::Compiled(_) => "COMPILED_FUNCTION",
            Value::Closure(_) => "CLOSURE",
            Value::Builtin(_) => "BUILTIN",
        }
    }

    /// `false` and `null` are falsy; every other value is truthy,
    /// including integer zero.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    /// The hash-key form of this value, if it has one.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(value) => Some(HashKey::Integer(*value)),
            Value::Boolean(value) => Some(HashKey::Boolean(*value)),
            Value::Str(value) => Some(HashKey::Str(value.clone())),
            _ => None,
        }
    }

    /// Language-level `==`: integers, booleans, and strings compare by
    /// content, `null` equals `null`, and every other pairing
    /// (including cross-variant ones) is unequal. Shared by both
    /// engines so `==`/`!=` agree everywhere.
    pub fn equals(&self, other: &Value<'a>) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

// Structural equality for tests and constant comparison. Function-shaped
// values compare by identity; recursing into a captured environment
// could cycle back to the function itself.
impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b) || **a == **b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Compiled(a), Value::Compiled(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => core::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "Integer({})", value),
            Value::Boolean(value) => write!(f, "Boolean({})", value),
            Value::Null => write!(f, "Null"),
            Value::Str(value) => write!(f, "Str({:?})", value.as_str()),
            Value::Array(elements) => {
                write!(f, "Array(")?;
                f.debug_list().entries(elements.iter()).finish()?;
                write!(f, ")")
            }
            Value::Hash(map) => write!(f, "Hash({} entries)", map.len()),
            Value::Function(func) => write!(f, "{:?}", func),
            Value::Compiled(func) => write!(
                f,
                "CompiledFunction(locals: {}, parameters: {})",
                func.num_locals, func.num_parameters
            ),
            Value::Closure(closure) => write!(f, "Closure(free: {})", closure.free.len()),
            Value::Builtin(builtin) => write!(f, "Builtin({})", builtin.name),
        }
    }
}

// Shallow on purpose: the captured environment can refer back to this
// very function.
impl fmt::Debug for Function<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.parameters.join(", "))
    }
}

/// Inspection: the notation the REPL and `puts` print. Strings print
/// raw (unquoted); hashes print sorted by key text so that both engines
/// and repeated runs produce identical output.
impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{}", value),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::Null => write!(f, "null"),
            Value::Str(value) => write!(f, "{}", value),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Value::Hash(map) => {
                let mut entries: Vec<String> = map
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                entries.sort();
                write!(f, "{{{}}}", entries.join(", "))
            }
            Value::Function(func) => {
                write!(f, "fn({}) {{ {} }}", func.parameters.join(", "), func.body)
            }
            Value::Compiled(func) => write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(func)),
            Value::Closure(closure) => write!(f, "Closure[{:p}]", Rc::as_ptr(closure)),
            Value::Builtin(_) => write!(f, "builtin function"),
        }
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKey::Integer(value) => write!(f, "{}", value),
            HashKey::Boolean(value) => write!(f, "{}", value),
            HashKey::Str(value) => write!(f, "{}", value),
        }
    }
}
