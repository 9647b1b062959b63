//! The bytecode bundle passed from the compiler to the VM.

use core::fmt;
use std::rc::Rc;

use ecow::EcoString;
use serde::{Deserialize, Serialize};

use crate::values::{CompiledFunction, Value};
use crate::vm::instruction_set::Instructions;

/// Compiled program: a flat instruction buffer plus the constant pool
/// it indexes into. Logically immutable once produced — the VM only
/// reads it.
#[derive(Clone, PartialEq)]
pub struct Code<'a> {
    pub instructions: Instructions,
    pub constants: Vec<Value<'a>>,
}

impl fmt::Debug for Code<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Code {{")?;

        if !self.constants.is_empty() {
            writeln!(f, "  constants: [")?;
            for (i, constant) in self.constants.iter().enumerate() {
                writeln!(f, "    [{}] = {:?}", i, constant)?;
            }
            writeln!(f, "  ]")?;
        } else {
            writeln!(f, "  constants: []")?;
        }

        writeln!(f, "  instructions:")?;
        for line in self.instructions.to_string().lines() {
            writeln!(f, "    {}", line)?;
        }

        write!(f, "}}")
    }
}

/// Failure to serialize or deserialize a bundle.
#[derive(Debug)]
pub enum BundleError {
    /// The constant pool held a value shape with no serialized form.
    /// The compiler only ever emits integers, strings, and compiled
    /// functions into the pool.
    UnsupportedConstant(&'static str),
    Codec(postcard::Error),
}

impl fmt::Display for BundleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleError::UnsupportedConstant(type_name) => {
                write!(f, "constant not serializable: {}", type_name)
            }
            BundleError::Codec(err) => write!(f, "bundle codec error: {}", err),
        }
    }
}

impl std::error::Error for BundleError {}

impl From<postcard::Error> for BundleError {
    fn from(err: postcard::Error) -> Self {
        BundleError::Codec(err)
    }
}

/// Wire form of a constant pool entry. The opcode numbering and this
/// enum's variant order are the bundle ABI.
#[derive(Serialize, Deserialize)]
enum ConstantRepr {
    Int(i64),
    Str(String),
    Function {
        instructions: Vec<u8>,
        num_locals: usize,
        num_parameters: usize,
    },
}

#[derive(Serialize, Deserialize)]
struct CodeRepr {
    instructions: Vec<u8>,
    constants: Vec<ConstantRepr>,
}

impl Code<'_> {
    /// Serialize the bundle with postcard.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BundleError> {
        let constants = self
            .constants
            .iter()
            .map(|constant| match constant {
                Value::Integer(value) => Ok(ConstantRepr::Int(*value)),
                Value::Str(value) => Ok(ConstantRepr::Str(value.to_string())),
                Value::Compiled(func) => Ok(ConstantRepr::Function {
                    instructions: func.instructions.as_bytes().to_vec(),
                    num_locals: func.num_locals,
                    num_parameters: func.num_parameters,
                }),
                other => Err(BundleError::UnsupportedConstant(other.type_name())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let repr = CodeRepr {
            instructions: self.instructions.as_bytes().to_vec(),
            constants,
        };
        Ok(postcard::to_allocvec(&repr)?)
    }

    /// Deserialize a bundle previously produced by [`Code::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Code<'static>, BundleError> {
        let repr: CodeRepr = postcard::from_bytes(bytes)?;

        let constants = repr
            .constants
            .into_iter()
            .map(|constant| match constant {
                ConstantRepr::Int(value) => Value::Integer(value),
                ConstantRepr::Str(value) => Value::Str(EcoString::from(value)),
                ConstantRepr::Function {
                    instructions,
                    num_locals,
                    num_parameters,
                } => Value::Compiled(Rc::new(CompiledFunction {
                    instructions: Instructions::from_bytes(instructions),
                    num_locals,
                    num_parameters,
                })),
            })
            .collect();

        Ok(Code {
            instructions: Instructions::from_bytes(repr.instructions),
            constants,
        })
    }
}
