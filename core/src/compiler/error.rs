use core::fmt;

/// Compilation fails fast: the first error aborts the compile.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Reserved for operators the lowering has no opcode mapping for.
    /// With the current closed operator set every operator lowers, so
    /// this is never produced in practice.
    UnknownOperator(String),
    UndefinedVariable(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnknownOperator(op) => write!(f, "unknown operator {}", op),
            CompileError::UndefinedVariable(name) => write!(f, "undefined variable {}", name),
        }
    }
}

impl std::error::Error for CompileError {}
