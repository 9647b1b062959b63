//! Core evaluation logic of the tree-walking engine.
//!
//! The evaluator recurses over the same AST the compiler lowers and
//! shares the value model, truthiness rules, integer semantics, and
//! builtin registry with the VM — on a well-typed program the two
//! engines produce the same observable result.
//!
//! `return` unwinds through [`Flow`]: every evaluation step reports
//! whether it produced a value or hit a `return`, and the nearest
//! function boundary (or the program itself) absorbs the unwind.

use std::rc::Rc;

use ecow::{EcoString, EcoVec};
use hashbrown::HashMap;

use crate::evaluator::environment::{Env, Environment};
use crate::evaluator::error::EvalError;
use crate::parser::{BinaryOp, Block, Expr, Program, Statement, UnaryOp};
use crate::values::{Function, HashPair, Value, builtins};

/// Default recursion depth limit.
pub const MAX_DEPTH: usize = 1000;

enum Flow<'a> {
    Value(Value<'a>),
    Return(Value<'a>),
}

/// Unwrap a `Flow`, propagating a `return` to the enclosing boundary.
macro_rules! value_of {
    ($flow:expr) => {
        match $flow? {
            Flow::Return(value) => return Ok(Flow::Return(value)),
            Flow::Value(value) => value,
        }
    };
}

/// Evaluate a program in `env` with the default depth limit.
pub fn eval_program<'a>(program: &Program<'a>, env: &Env<'a>) -> Result<Value<'a>, EvalError> {
    Evaluator::new(MAX_DEPTH).eval_program(program, env)
}

pub struct Evaluator {
    depth: usize,
    max_depth: usize,
}

impl Evaluator {
    pub fn new(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth,
        }
    }

    pub fn eval_program<'a>(
        &mut self,
        program: &Program<'a>,
        env: &Env<'a>,
    ) -> Result<Value<'a>, EvalError> {
        let mut result = Value::Null;
        for statement in program.statements {
            match self.eval_statement(statement, env)? {
                // A top-level `return` ends the program.
                Flow::Return(value) => return Ok(value),
                Flow::Value(value) => result = value,
            }
        }
        Ok(result)
    }

    fn eval_statement<'a>(
        &mut self,
        statement: &Statement<'a>,
        env: &Env<'a>,
    ) -> Result<Flow<'a>, EvalError> {
        match *statement {
            Statement::Let { name, value } => {
                let value = value_of!(self.eval_expression(value, env));
                env.borrow_mut().set(name, value);
                Ok(Flow::Value(Value::Null))
            }
            Statement::Return { value } => {
                let value = value_of!(self.eval_expression(value, env));
                Ok(Flow::Return(value))
            }
            Statement::Expression { value } => self.eval_expression(value, env),
        }
    }

    fn eval_block<'a>(&mut self, block: &Block<'a>, env: &Env<'a>) -> Result<Flow<'a>, EvalError> {
        let mut result = Flow::Value(Value::Null);
        for statement in block.statements {
            match self.eval_statement(statement, env)? {
                flow @ Flow::Return(_) => return Ok(flow),
                flow => result = flow,
            }
        }
        Ok(result)
    }

    fn eval_expression<'a>(
        &mut self,
        expr: &Expr<'a>,
        env: &Env<'a>,
    ) -> Result<Flow<'a>, EvalError> {
        if self.depth >= self.max_depth {
            return Err(EvalError::StackOverflow {
                max_depth: self.max_depth,
            });
        }
        self.depth += 1;
        let result = self.eval_expression_inner(expr, env);
        self.depth -= 1;
        result
    }

    fn eval_expression_inner<'a>(
        &mut self,
        expr: &Expr<'a>,
        env: &Env<'a>,
    ) -> Result<Flow<'a>, EvalError> {
        match *expr {
            Expr::Integer(value) => Ok(Flow::Value(Value::Integer(value))),
            Expr::Boolean(value) => Ok(Flow::Value(Value::Boolean(value))),
            Expr::Str(value) => Ok(Flow::Value(Value::Str(EcoString::from(value)))),

            Expr::Ident(name) => {
                if let Some(value) = env.borrow().get(name) {
                    return Ok(Flow::Value(value));
                }
                match builtins::lookup(name) {
                    Some(builtin) => Ok(Flow::Value(Value::Builtin(builtin))),
                    None => Err(EvalError::IdentifierNotFound(name.to_string())),
                }
            }

            Expr::Prefix { op, right } => {
                let right = value_of!(self.eval_expression(right, env));
                let value = match op {
                    UnaryOp::Not => Value::Boolean(!right.is_truthy()),
                    UnaryOp::Neg => match right {
                        Value::Integer(value) => Value::Integer(value.wrapping_neg()),
                        other => {
                            return Err(EvalError::UnknownPrefixOperator {
                                operator: op.to_string(),
                                right: other.type_name(),
                            });
                        }
                    },
                };
                Ok(Flow::Value(value))
            }

            Expr::Infix { op, left, right } => {
                let left = value_of!(self.eval_expression(left, env));
                let right = value_of!(self.eval_expression(right, env));
                Ok(Flow::Value(self.eval_infix(op, left, right)?))
            }

            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                let condition = value_of!(self.eval_expression(condition, env));
                if condition.is_truthy() {
                    self.eval_block(consequence, env)
                } else {
                    match alternative {
                        Some(alternative) => self.eval_block(alternative, env),
                        None => Ok(Flow::Value(Value::Null)),
                    }
                }
            }

            Expr::Function { parameters, body } => Ok(Flow::Value(Value::Function(Rc::new(
                Function {
                    parameters,
                    body,
                    env: env.clone(),
                },
            )))),

            Expr::Call {
                function,
                arguments,
            } => {
                let callee = value_of!(self.eval_expression(function, env));
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(value_of!(self.eval_expression(argument, env)));
                }
                Ok(Flow::Value(self.apply_function(callee, args)?))
            }

            Expr::Array { elements } => {
                let mut values = EcoVec::with_capacity(elements.len());
                for element in elements {
                    values.push(value_of!(self.eval_expression(element, env)));
                }
                Ok(Flow::Value(Value::Array(values)))
            }

            Expr::Hash { pairs } => {
                let mut map = HashMap::with_capacity(pairs.len());
                for (key_expr, value_expr) in pairs {
                    let key = value_of!(self.eval_expression(key_expr, env));
                    let value = value_of!(self.eval_expression(value_expr, env));
                    let hash_key = key
                        .hash_key()
                        .ok_or_else(|| EvalError::UnusableHashKey(key.type_name()))?;
                    map.insert(hash_key, HashPair { key, value });
                }
                Ok(Flow::Value(Value::Hash(Rc::new(map))))
            }

            Expr::Index { left, index } => {
                let left = value_of!(self.eval_expression(left, env));
                let index = value_of!(self.eval_expression(index, env));
                Ok(Flow::Value(self.eval_index(left, index)?))
            }
        }
    }

    fn eval_infix<'a>(
        &mut self,
        op: BinaryOp,
        left: Value<'a>,
        right: Value<'a>,
    ) -> Result<Value<'a>, EvalError> {
        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => self.eval_integer_infix(op, *l, *r),
            (Value::Str(l), Value::Str(r)) => match op {
                BinaryOp::Add => {
                    let mut concatenated = l.clone();
                    concatenated.push_str(r);
                    Ok(Value::Str(concatenated))
                }
                BinaryOp::Eq => Ok(Value::Boolean(l == r)),
                BinaryOp::NotEq => Ok(Value::Boolean(l != r)),
                _ => Err(EvalError::UnknownInfixOperator {
                    left: left.type_name(),
                    operator: op.to_string(),
                    right: right.type_name(),
                }),
            },
            _ => match op {
                BinaryOp::Eq => Ok(Value::Boolean(left.equals(&right))),
                BinaryOp::NotEq => Ok(Value::Boolean(!left.equals(&right))),
                _ if left.type_name() != right.type_name() => Err(EvalError::TypeMismatch {
                    left: left.type_name(),
                    operator: op.to_string(),
                    right: right.type_name(),
                }),
                _ => Err(EvalError::UnknownInfixOperator {
                    left: left.type_name(),
                    operator: op.to_string(),
                    right: right.type_name(),
                }),
            },
        }
    }

    fn eval_integer_infix<'a>(
        &mut self,
        op: BinaryOp,
        left: i64,
        right: i64,
    ) -> Result<Value<'a>, EvalError> {
        let value = match op {
            BinaryOp::Add => Value::Integer(left.wrapping_add(right)),
            BinaryOp::Sub => Value::Integer(left.wrapping_sub(right)),
            BinaryOp::Mul => Value::Integer(left.wrapping_mul(right)),
            BinaryOp::Div => {
                if right == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                Value::Integer(left.wrapping_div(right))
            }
            BinaryOp::Lt => Value::Boolean(left < right),
            BinaryOp::Gt => Value::Boolean(left > right),
            BinaryOp::Eq => Value::Boolean(left == right),
            BinaryOp::NotEq => Value::Boolean(left != right),
        };
        Ok(value)
    }

    fn eval_index<'a>(&mut self, left: Value<'a>, index: Value<'a>) -> Result<Value<'a>, EvalError> {
        match (&left, &index) {
            (Value::Array(elements), Value::Integer(i)) => {
                if *i < 0 || *i as usize >= elements.len() {
                    Ok(Value::Null)
                } else {
                    Ok(elements[*i as usize].clone())
                }
            }
            (Value::Hash(map), key) => {
                let hash_key = key
                    .hash_key()
                    .ok_or_else(|| EvalError::UnusableHashKey(key.type_name()))?;
                Ok(map
                    .get(&hash_key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Value::Null))
            }
            _ => Err(EvalError::IndexNotSupported(left.type_name())),
        }
    }

    fn apply_function<'a>(
        &mut self,
        callee: Value<'a>,
        args: Vec<Value<'a>>,
    ) -> Result<Value<'a>, EvalError> {
        match callee {
            Value::Function(func) => {
                if args.len() != func.parameters.len() {
                    return Err(EvalError::WrongNumberOfArguments {
                        want: func.parameters.len(),
                        got: args.len(),
                    });
                }
                let env = Environment::enclosed(func.env.clone());
                for (parameter, arg) in func.parameters.iter().zip(args) {
                    env.borrow_mut().set(parameter, arg);
                }
                match self.eval_block(func.body, &env)? {
                    Flow::Return(value) | Flow::Value(value) => Ok(value),
                }
            }
            Value::Builtin(builtin) => Ok((builtin.func)(&args)?),
            other => Err(EvalError::NotAFunction(other.type_name())),
        }
    }
}
