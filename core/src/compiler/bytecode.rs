//! Single-pass bytecode compiler.
//!
//! The compiler walks the AST once, emitting instructions into the top
//! of a stack of compilation scopes — one scope per function body being
//! compiled. Jump targets are back-patched once the jumped-over code
//! has a known length, and the last two emissions are tracked per scope
//! so a trailing `Pop` can be peepholed away inside if-branches and
//! replaced by `ReturnValue` at function ends. Peephole edits rewrite
//! bytes in place and never change an instruction's length.

use std::rc::Rc;

use ecow::EcoString;
use tracing::{debug, trace};

use crate::compiler::error::CompileError;
use crate::compiler::symbol_table::{Symbol, SymbolScope, SymbolTable};
use crate::parser::{BinaryOp, Block, Expr, Program, Statement, UnaryOp};
use crate::values::builtins::BUILTINS;
use crate::values::{CompiledFunction, Value};
use crate::vm::code::Code;
use crate::vm::instruction_set::{Instructions, Opcode, make};

/// The opcode and position of an instruction the compiler emitted.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Instruction buffer for one function body being compiled, plus the
/// last two emissions for peephole edits.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

pub struct Compiler<'a> {
    constants: Vec<Value<'a>>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl<'a> Compiler<'a> {
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (i, builtin) in BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(i as u16, builtin.name);
        }
        Self::with_state(symbol_table, Vec::new())
    }

    /// Resume compilation with the symbol table and constant pool of a
    /// previous compile. The REPL uses this so global indices and
    /// constant indices stay stable across inputs.
    pub fn with_state(symbol_table: SymbolTable, constants: Vec<Value<'a>>) -> Self {
        Self {
            constants,
            symbol_table,
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Hand the symbol table and constant pool back for the next
    /// [`Compiler::with_state`].
    pub fn into_state(self) -> (SymbolTable, Vec<Value<'a>>) {
        (self.symbol_table, self.constants)
    }

    /// The compiled bundle for the outermost scope.
    pub fn bytecode(&self) -> Code<'a> {
        Code {
            instructions: self.current_scope().instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    pub fn compile(&mut self, program: &Program<'a>) -> Result<(), CompileError> {
        debug!(statements = program.statements.len(), "compiling program");
        for statement in program.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, statement: &Statement<'a>) -> Result<(), CompileError> {
        match *statement {
            Statement::Expression { value } => {
                self.compile_expression(value)?;
                self.emit(Opcode::Pop, &[]);
            }
            Statement::Let { name, value } => {
                // Define before compiling the value so the body of a
                // `let f = fn() { ... }` can resolve `f`.
                let symbol = self.symbol_table.define(name);
                if let Expr::Function { parameters, body } = *value {
                    self.compile_function(parameters, body, Some(name))?;
                } else {
                    self.compile_expression(value)?;
                }
                let op = if symbol.scope == SymbolScope::Global {
                    Opcode::SetGlobal
                } else {
                    Opcode::SetLocal
                };
                self.emit(op, &[symbol.index as usize]);
            }
            Statement::Return { value } => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block<'a>) -> Result<(), CompileError> {
        for statement in block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expr<'a>) -> Result<(), CompileError> {
        match *expr {
            Expr::Integer(value) => {
                let const_index = self.add_constant(Value::Integer(value));
                self.emit(Opcode::Constant, &[const_index]);
            }
            Expr::Str(value) => {
                let const_index = self.add_constant(Value::Str(EcoString::from(value)));
                self.emit(Opcode::Constant, &[const_index]);
            }
            Expr::Boolean(true) => {
                self.emit(Opcode::True, &[]);
            }
            Expr::Boolean(false) => {
                self.emit(Opcode::False, &[]);
            }
            Expr::Prefix { op, right } => {
                self.compile_expression(right)?;
                match op {
                    UnaryOp::Not => self.emit(Opcode::Bang, &[]),
                    UnaryOp::Neg => self.emit(Opcode::Minus, &[]),
                };
            }
            Expr::Infix { op, left, right } => {
                // There is no less-than opcode: compile the operands in
                // reverse and test greater-than.
                if op == BinaryOp::Lt {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Opcode::GreaterThan, &[]);
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;
                let opcode = match op {
                    BinaryOp::Add => Opcode::Add,
                    BinaryOp::Sub => Opcode::Sub,
                    BinaryOp::Mul => Opcode::Mul,
                    BinaryOp::Div => Opcode::Div,
                    BinaryOp::Eq => Opcode::Equal,
                    BinaryOp::NotEq => Opcode::NotEqual,
                    BinaryOp::Gt => Opcode::GreaterThan,
                    BinaryOp::Lt => unreachable!("handled above"),
                };
                self.emit(opcode, &[]);
            }
            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;

                // Patched once the consequence length is known.
                let jump_not_truthy_pos = self.emit(Opcode::JumpNotTruthy, &[9999]);

                self.compile_block(consequence)?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_pop();
                }

                // Skip the alternative once the consequence ran.
                let jump_pos = self.emit(Opcode::Jump, &[9999]);

                let after_consequence = self.current_scope().instructions.len();
                self.change_operand(jump_not_truthy_pos, after_consequence);

                match alternative {
                    Some(alternative) => {
                        self.compile_block(alternative)?;
                        if self.last_instruction_is(Opcode::Pop) {
                            self.remove_last_pop();
                        }
                    }
                    // If-expressions always leave a value.
                    None => {
                        self.emit(Opcode::Null, &[]);
                    }
                }

                let after_alternative = self.current_scope().instructions.len();
                self.change_operand(jump_pos, after_alternative);
            }
            Expr::Ident(name) => {
                let symbol = self
                    .symbol_table
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.to_string()))?;
                self.load_symbol(&symbol);
            }
            Expr::Function { parameters, body } => {
                self.compile_function(parameters, body, None)?;
            }
            Expr::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Opcode::Call, &[arguments.len()]);
            }
            Expr::Array { elements } => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()]);
            }
            Expr::Hash { pairs } => {
                // Sort keys by their printed form for deterministic
                // output.
                let mut sorted: Vec<&(Expr<'a>, Expr<'a>)> = pairs.iter().collect();
                sorted.sort_by_cached_key(|pair| pair.0.to_string());
                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2]);
            }
            Expr::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[]);
            }
        }
        Ok(())
    }

    fn compile_function(
        &mut self,
        parameters: &'a [&'a str],
        body: &'a Block<'a>,
        name: Option<&str>,
    ) -> Result<(), CompileError> {
        self.enter_scope();

        if let Some(name) = name {
            self.symbol_table.define_function_name(name);
        }
        for parameter in parameters {
            self.symbol_table.define(parameter);
        }

        self.compile_block(body)?;

        // A body ending in an expression statement returns its value; a
        // body emitting nothing at all returns null.
        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[]);
        }

        let free_symbols = std::mem::take(&mut self.symbol_table.free_symbols);
        let num_locals = self.symbol_table.num_definitions as usize;
        let instructions = self.leave_scope();

        // Load each captured variable (against its original symbol in
        // the scope we just returned to) so OpClosure can pack them.
        for symbol in &free_symbols {
            self.load_symbol(symbol);
        }

        let func = CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
        };
        let const_index = self.add_constant(Value::Compiled(Rc::new(func)));
        self.emit(Opcode::Closure, &[const_index, free_symbols.len()]);
        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index as usize]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index as usize]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index as usize]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index as usize]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        };
    }

    // === Scope management ===

    fn current_scope(&self) -> &CompilationScope {
        self.scopes.last().expect("scope stack is never empty")
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("scope stack is never empty");
        let table = std::mem::take(&mut self.symbol_table);
        self.symbol_table = table.into_outer().expect("cannot leave the global scope");
        scope.instructions
    }

    // === Instruction emission ===

    fn add_constant(&mut self, value: Value<'a>) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let position = self.current_scope_mut().instructions.append(instruction);
        trace!(?op, position, "emit");
        self.set_last_instruction(op, position);
        position
    }

    fn set_last_instruction(&mut self, opcode: Opcode, position: usize) {
        let scope = self.current_scope_mut();
        scope.previous = scope.last;
        scope.last = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, opcode: Opcode) -> bool {
        self.current_scope()
            .last
            .is_some_and(|last| last.opcode == opcode)
    }

    /// Truncate the just-emitted `Pop`, restoring the previous emission
    /// as the last one.
    fn remove_last_pop(&mut self) {
        let scope = self.current_scope_mut();
        if let Some(last) = scope.last {
            scope.instructions.truncate(last.position);
            scope.last = scope.previous;
        }
    }

    /// Rewrite bytes in place; the replacement must have the same
    /// length as the instruction it overwrites.
    fn replace_instruction(&mut self, position: usize, replacement: Instructions) {
        self.current_scope_mut()
            .instructions
            .splice(position, &replacement);
    }

    /// Re-encode the instruction at `position` with a new operand of
    /// the same width.
    fn change_operand(&mut self, position: usize, operand: usize) {
        let op = Opcode::try_from(self.current_scope().instructions[position])
            .expect("rewriting an instruction the compiler emitted");
        self.replace_instruction(position, make(op, &[operand]));
    }

    fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = self.current_scope().last {
            self.replace_instruction(last.position, make(Opcode::ReturnValue, &[]));
            self.current_scope_mut().last = Some(EmittedInstruction {
                opcode: Opcode::ReturnValue,
                position: last.position,
            });
        }
    }
}

impl Default for Compiler<'_> {
    fn default() -> Self {
        Self::new()
    }
}
