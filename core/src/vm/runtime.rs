//! The Tamarin virtual machine.
//!
//! A strictly single-threaded fetch-decode-execute loop over a shared
//! value stack. Call frames carve the stack into regions: each frame's
//! `base_pointer` marks the bottom of its local slots, with the callee
//! value one slot below. Execution finishes when the outermost frame
//! runs out of instructions; the program's observable result is then
//! [`Vm::last_popped_stack_elem`].

use std::rc::Rc;

use ecow::EcoVec;
use hashbrown::HashMap;
use tracing::trace;

use crate::values::builtins::BUILTINS;
use crate::values::{Builtin, Closure, CompiledFunction, HashPair, Value};
use crate::vm::code::Code;
use crate::vm::error::RuntimeError;
use crate::vm::frame::Frame;
use crate::vm::instruction_set::{Opcode, read_u16};
use crate::vm::stack::ValueStack;

/// Capacity of the value stack.
pub const STACK_SIZE: usize = 2048;
/// Number of addressable global slots (the range of a u16 operand).
pub const GLOBALS_SIZE: usize = 65536;
/// Maximum call depth.
pub const MAX_FRAMES: usize = 1024;

pub struct Vm<'a> {
    constants: Vec<Value<'a>>,
    stack: ValueStack<'a>,
    globals: Vec<Value<'a>>,
    frames: Vec<Frame<'a>>,
}

impl<'a> Vm<'a> {
    pub fn new(code: Code<'a>) -> Self {
        Self::with_globals(code, vec![Value::Null; GLOBALS_SIZE])
    }

    /// Build a VM around an existing globals array. The REPL threads
    /// the same array (and the compiler's symbol table) through every
    /// input so that global indices stay stable across compilations.
    pub fn with_globals(code: Code<'a>, globals: Vec<Value<'a>>) -> Self {
        let main_func = Rc::new(CompiledFunction {
            instructions: code.instructions,
            num_locals: 0,
            num_parameters: 0,
        });
        let main_closure = Rc::new(Closure {
            func: main_func,
            free: Vec::new(),
        });

        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(main_closure, 0));

        Self {
            constants: code.constants,
            stack: ValueStack::new(STACK_SIZE),
            globals,
            frames,
        }
    }

    /// Recover the globals array for the next REPL round.
    pub fn into_globals(self) -> Vec<Value<'a>> {
        self.globals
    }

    /// The value most recently popped off the stack — the observable
    /// result of the program after `run` completes.
    pub fn last_popped_stack_elem(&self) -> Value<'a> {
        self.stack.last_popped()
    }

    #[cfg(test)]
    pub(crate) fn stack_pointer(&self) -> usize {
        self.stack.sp()
    }

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            // Fetch and decode under a single borrow of the current
            // frame; execution below needs `&mut self`.
            let (op, operand1, operand2) = {
                let Some(frame) = self.frames.last_mut() else {
                    break;
                };
                let ins = frame.closure.func.instructions.as_bytes();
                if frame.ip + 1 >= ins.len() as i64 {
                    break;
                }
                frame.ip += 1;
                let ip = frame.ip as usize;

                let byte = ins[ip];
                let op =
                    Opcode::try_from(byte).map_err(|_| RuntimeError::UndefinedOpcode(byte))?;

                let mut operands = [0usize; 2];
                let mut offset = ip + 1;
                for (slot, width) in operands.iter_mut().zip(op.definition().operand_widths) {
                    *slot = match width {
                        2 => read_u16(&ins[offset..]) as usize,
                        _ => ins[offset] as usize,
                    };
                    offset += width;
                }
                frame.ip = offset as i64 - 1;

                (op, operands[0], operands[1])
            };

            match op {
                Opcode::Constant => {
                    let constant = self.constants[operand1].clone();
                    self.stack.push(constant)?;
                }
                Opcode::Pop => {
                    self.stack.pop();
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_binary_operation(op)?;
                }
                Opcode::True => self.stack.push(Value::Boolean(true))?,
                Opcode::False => self.stack.push(Value::Boolean(false))?,
                Opcode::Null => self.stack.push(Value::Null)?,
                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                    self.execute_comparison(op)?;
                }
                Opcode::Bang => {
                    let operand = self.stack.pop();
                    self.stack.push(Value::Boolean(!operand.is_truthy()))?;
                }
                Opcode::Minus => {
                    let operand = self.stack.pop();
                    match operand {
                        Value::Integer(value) => {
                            self.stack.push(Value::Integer(value.wrapping_neg()))?
                        }
                        other => {
                            return Err(RuntimeError::UnsupportedNegation(other.type_name()));
                        }
                    }
                }
                Opcode::Jump => {
                    self.current_frame_mut().ip = operand1 as i64 - 1;
                }
                Opcode::JumpNotTruthy => {
                    let condition = self.stack.pop();
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = operand1 as i64 - 1;
                    }
                }
                Opcode::SetGlobal => {
                    self.globals[operand1] = self.stack.pop();
                }
                Opcode::GetGlobal => {
                    let value = self.globals[operand1].clone();
                    self.stack.push(value)?;
                }
                Opcode::SetLocal => {
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.stack.pop();
                    self.stack.set(base_pointer + operand1, value);
                }
                Opcode::GetLocal => {
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.stack.get(base_pointer + operand1).clone();
                    self.stack.push(value)?;
                }
                Opcode::GetBuiltin => {
                    self.stack.push(Value::Builtin(&BUILTINS[operand1]))?;
                }
                Opcode::GetFree => {
                    let value = self.current_frame().closure.free[operand1].clone();
                    self.stack.push(value)?;
                }
                Opcode::CurrentClosure => {
                    let closure = Rc::clone(&self.current_frame().closure);
                    self.stack.push(Value::Closure(closure))?;
                }
                Opcode::Array => {
                    let elements: EcoVec<Value<'a>> =
                        self.stack.top_slice(operand1).iter().cloned().collect();
                    self.stack.shrink(operand1);
                    self.stack.push(Value::Array(elements))?;
                }
                Opcode::Hash => {
                    let hash = self.build_hash(operand1)?;
                    self.stack.shrink(operand1);
                    self.stack.push(hash)?;
                }
                Opcode::Index => self.execute_index_expression()?,
                Opcode::Call => self.execute_call(operand1)?,
                Opcode::ReturnValue => {
                    let return_value = self.stack.pop();
                    if self.pop_frame_and_push(return_value)? {
                        break;
                    }
                }
                Opcode::Return => {
                    if self.pop_frame_and_push(Value::Null)? {
                        break;
                    }
                }
                Opcode::Closure => self.push_closure(operand1, operand2)?,
            }
        }

        Ok(())
    }

    fn current_frame(&self) -> &Frame<'a> {
        self.frames.last().expect("frame stack is never empty mid-run")
    }

    fn current_frame_mut(&mut self) -> &mut Frame<'a> {
        self.frames
            .last_mut()
            .expect("frame stack is never empty mid-run")
    }

    /// Tear down the current frame — dropping its locals and the callee
    /// value — and push `value` as the call's result. Returns `true`
    /// when the outermost frame was popped.
    fn pop_frame_and_push(&mut self, value: Value<'a>) -> Result<bool, RuntimeError> {
        let frame = self
            .frames
            .pop()
            .expect("frame stack is never empty mid-run");
        trace!(base_pointer = frame.base_pointer, "returning from frame");
        self.stack.set_sp(frame.base_pointer.saturating_sub(1))?;
        self.stack.push(value)?;
        Ok(self.frames.is_empty())
    }

    fn execute_binary_operation(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        let right = self.stack.pop();
        let left = self.stack.pop();

        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                self.execute_binary_integer_operation(op, *l, *r)
            }
            (Value::Str(l), Value::Str(r)) => {
                if op != Opcode::Add {
                    return Err(RuntimeError::UnknownStringOperator(op));
                }
                let mut concatenated = l.clone();
                concatenated.push_str(r);
                self.stack.push(Value::Str(concatenated))
            }
            _ => Err(RuntimeError::UnsupportedBinaryTypes {
                left: left.type_name(),
                right: right.type_name(),
            }),
        }
    }

    fn execute_binary_integer_operation(
        &mut self,
        op: Opcode,
        left: i64,
        right: i64,
    ) -> Result<(), RuntimeError> {
        let result = match op {
            Opcode::Add => left.wrapping_add(right),
            Opcode::Sub => left.wrapping_sub(right),
            Opcode::Mul => left.wrapping_mul(right),
            Opcode::Div => {
                if right == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                left.wrapping_div(right)
            }
            other => return Err(RuntimeError::UnknownIntegerOperator(other)),
        };
        self.stack.push(Value::Integer(result))
    }

    fn execute_comparison(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        let right = self.stack.pop();
        let left = self.stack.pop();

        if let (Value::Integer(l), Value::Integer(r)) = (&left, &right) {
            let result = match op {
                Opcode::Equal => l == r,
                Opcode::NotEqual => l != r,
                Opcode::GreaterThan => l > r,
                other => return Err(RuntimeError::UnknownIntegerOperator(other)),
            };
            return self.stack.push(Value::Boolean(result));
        }

        match op {
            Opcode::Equal => {
                let equal = left.equals(&right);
                self.stack.push(Value::Boolean(equal))
            }
            Opcode::NotEqual => {
                let equal = left.equals(&right);
                self.stack.push(Value::Boolean(!equal))
            }
            _ => Err(RuntimeError::UnknownOperator {
                left: left.type_name(),
                operator: operator_symbol(op),
                right: right.type_name(),
            }),
        }
    }

    fn execute_index_expression(&mut self) -> Result<(), RuntimeError> {
        let index = self.stack.pop();
        let left = self.stack.pop();

        match (&left, &index) {
            (Value::Array(elements), Value::Integer(i)) => {
                let value = if *i < 0 || *i as usize >= elements.len() {
                    Value::Null
                } else {
                    elements[*i as usize].clone()
                };
                self.stack.push(value)
            }
            (Value::Hash(map), key) => {
                let hash_key = key
                    .hash_key()
                    .ok_or_else(|| RuntimeError::UnusableHashKey(key.type_name()))?;
                let value = map
                    .get(&hash_key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Value::Null);
                self.stack.push(value)
            }
            _ => Err(RuntimeError::IndexNotSupported(left.type_name())),
        }
    }

    fn build_hash(&self, count: usize) -> Result<Value<'a>, RuntimeError> {
        let slice = self.stack.top_slice(count);
        let mut map = HashMap::with_capacity(count / 2);
        for pair in slice.chunks_exact(2) {
            let key = &pair[0];
            let value = &pair[1];
            let hash_key = key
                .hash_key()
                .ok_or_else(|| RuntimeError::UnusableHashKey(key.type_name()))?;
            map.insert(
                hash_key,
                HashPair {
                    key: key.clone(),
                    value: value.clone(),
                },
            );
        }
        Ok(Value::Hash(Rc::new(map)))
    }

    fn execute_call(&mut self, num_args: usize) -> Result<(), RuntimeError> {
        let callee = self.stack.get(self.stack.sp() - 1 - num_args).clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, num_args),
            Value::Builtin(builtin) => self.call_builtin(builtin, num_args),
            _ => Err(RuntimeError::CallingNonFunction),
        }
    }

    fn call_closure(
        &mut self,
        closure: Rc<Closure<'a>>,
        num_args: usize,
    ) -> Result<(), RuntimeError> {
        if num_args != closure.func.num_parameters {
            return Err(RuntimeError::WrongArgumentCount {
                want: closure.func.num_parameters,
                got: num_args,
            });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::FrameOverflow);
        }

        trace!(num_args, "calling closure");
        let base_pointer = self.stack.sp() - num_args;
        let num_locals = closure.func.num_locals;
        self.frames.push(Frame::new(closure, base_pointer));
        // Reserve the frame's local slots above the arguments.
        self.stack.set_sp(base_pointer + num_locals)
    }

    fn call_builtin(
        &mut self,
        builtin: &'static Builtin,
        num_args: usize,
    ) -> Result<(), RuntimeError> {
        let args = self.stack.top_slice(num_args).to_vec();
        let result = (builtin.func)(&args)?;
        // Drop the arguments and the callee below them.
        self.stack.shrink(num_args + 1);
        self.stack.push(result)
    }

    fn push_closure(&mut self, const_index: usize, num_free: usize) -> Result<(), RuntimeError> {
        match self.constants[const_index].clone() {
            Value::Compiled(func) => {
                // Free values were pushed in source order: the first
                // pushed is free[0].
                let free = self.stack.top_slice(num_free).to_vec();
                self.stack.shrink(num_free);
                self.stack.push(Value::Closure(Rc::new(Closure { func, free })))
            }
            other => Err(RuntimeError::NotAFunction(other.type_name())),
        }
    }
}

/// Source-level symbol for an opcode, for error messages.
fn operator_symbol(op: Opcode) -> &'static str {
    match op {
        Opcode::Add => "+",
        Opcode::Sub => "-",
        Opcode::Mul => "*",
        Opcode::Div => "/",
        Opcode::Equal => "==",
        Opcode::NotEqual => "!=",
        Opcode::GreaterThan => ">",
        other => other.definition().name,
    }
}
