use std::rc::Rc;

use crate::values::Closure;

/// Per-invocation record: the closure being executed, the instruction
/// pointer, and the stack index where the frame's locals begin.
#[derive(Debug)]
pub struct Frame<'a> {
    pub closure: Rc<Closure<'a>>,
    /// Index of the byte most recently fetched; starts at -1 and the
    /// dispatch loop pre-increments.
    pub ip: i64,
    /// Bottom of this frame's local slots on the shared value stack.
    /// The callee value itself sits one slot below.
    pub base_pointer: usize,
}

impl<'a> Frame<'a> {
    pub fn new(closure: Rc<Closure<'a>>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: -1,
            base_pointer,
        }
    }
}
