use core::cell::Cell;

use bumpalo::Bump;
use lazy_static::lazy_static;
use pest::Parser;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use crate::parser::ast::{Block, Expr, Program, Statement};
use crate::parser::error::{ParseError, ParseErrorKind, convert_pest_error};
use crate::parser::syntax::{BinaryOp, Span, UnaryOp};

lazy_static! {
    // Note: precedence is defined lowest to highest.
    static ref PRATT_PARSER: PrattParser<Rule> = PrattParser::new()
        // Equality operators.
        .op(Op::infix(Rule::eq, Assoc::Left) | Op::infix(Rule::neq, Assoc::Left))
        // Ordering operators.
        .op(Op::infix(Rule::lt, Assoc::Left) | Op::infix(Rule::gt, Assoc::Left))
        // Arithmetic operators.
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left) | Op::infix(Rule::div, Assoc::Left))
        // Prefix operators.
        .op(Op::prefix(Rule::not) | Op::prefix(Rule::neg))
        // Postfix operators (highest precedence).
        .op(Op::postfix(Rule::call_op) | Op::postfix(Rule::index_op));
}

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
pub struct TamarinParser;

/// Maximum expression nesting depth before parsing is aborted. Guards
/// the recursive descent (and everything downstream of it) against
/// stack exhaustion on adversarial inputs.
const MAX_DEPTH: usize = 200;

struct ParseContext<'a> {
    arena: &'a Bump,
    depth: Cell<usize>,
}

/// Parse `input` into an arena-allocated [`Program`].
pub fn parse<'a>(arena: &'a Bump, input: &str) -> Result<Program<'a>, ParseError> {
    let pairs = TamarinParser::parse(Rule::program, input).map_err(convert_pest_error)?;

    let ctx = ParseContext {
        arena,
        depth: Cell::new(0),
    };

    let mut statements = Vec::new();
    for pair in pairs {
        if pair.as_rule() != Rule::program {
            continue;
        }
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::statement => statements.push(ctx.parse_statement(inner)?),
                Rule::EOI => {}
                other => return Err(unexpected(other, Span::new(0, input.len()))),
            }
        }
    }

    Ok(Program {
        statements: arena.alloc_slice_copy(&statements),
    })
}

fn span_of(pair: &Pair<'_, Rule>) -> Span {
    let span = pair.as_span();
    Span::new(span.start(), span.end())
}

fn unexpected(rule: Rule, span: Span) -> ParseError {
    ParseError::new(
        ParseErrorKind::UnexpectedToken {
            expected: format!("a different construct, found {:?}", rule),
        },
        span,
    )
}

fn missing(expected: &str, span: Span) -> ParseError {
    ParseError::new(
        ParseErrorKind::UnexpectedToken {
            expected: expected.to_string(),
        },
        span,
    )
}

/// Take the single inner pair of `pair`, erroring instead of panicking
/// if the grammar invariant is somehow violated.
fn first_inner(pair: Pair<'_, Rule>) -> Result<Pair<'_, Rule>, ParseError> {
    let span = span_of(&pair);
    pair.into_inner().next().ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::UnexpectedToken {
                expected: "an inner expression".to_string(),
            },
            span,
        )
    })
}

impl<'a> ParseContext<'a> {
    fn check_depth(&self, pair: &Pair<'_, Rule>) -> Result<(), ParseError> {
        let current = self.depth.get();
        if current >= MAX_DEPTH {
            return Err(ParseError::new(
                ParseErrorKind::MaxDepthExceeded {
                    max_depth: MAX_DEPTH,
                },
                span_of(pair),
            ));
        }
        self.depth.set(current + 1);
        Ok(())
    }

    fn parse_statement(&self, pair: Pair<'_, Rule>) -> Result<Statement<'a>, ParseError> {
        let inner = first_inner(pair)?;
        // Keyword pairs (kw_let, kw_return) sit alongside the parts we
        // care about; select inner pairs by rule, not by position.
        match inner.as_rule() {
            Rule::let_statement => {
                let span = span_of(&inner);
                let mut name: Option<&'a str> = None;
                let mut value = None;
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::ident => name = Some(self.arena.alloc_str(part.as_str())),
                        Rule::expression => value = Some(self.parse_expression(part)?),
                        _ => {}
                    }
                }
                let name = name.ok_or_else(|| missing("an identifier", span))?;
                let value = value.ok_or_else(|| missing("an expression", span))?;
                Ok(Statement::Let { name, value })
            }
            Rule::return_statement => {
                let span = span_of(&inner);
                let value_pair = inner
                    .into_inner()
                    .find(|part| part.as_rule() == Rule::expression)
                    .ok_or_else(|| missing("an expression", span))?;
                Ok(Statement::Return {
                    value: self.parse_expression(value_pair)?,
                })
            }
            Rule::expression_statement => Ok(Statement::Expression {
                value: self.parse_expression(first_inner(inner)?)?,
            }),
            other => Err(unexpected(other, span_of(&inner))),
        }
    }

    fn parse_block(&self, pair: Pair<'_, Rule>) -> Result<&'a Block<'a>, ParseError> {
        let mut statements = Vec::new();
        for inner in pair.into_inner() {
            statements.push(self.parse_statement(inner)?);
        }
        Ok(self.arena.alloc(Block {
            statements: self.arena.alloc_slice_copy(&statements),
        }))
    }

    fn parse_expression(&self, pair: Pair<'_, Rule>) -> Result<&'a Expr<'a>, ParseError> {
        self.check_depth(&pair)?;
        let result = PRATT_PARSER
            .map_primary(|primary| self.parse_primary(primary))
            .map_prefix(|op, rhs| {
                let right = rhs?;
                let op = match op.as_rule() {
                    Rule::not => UnaryOp::Not,
                    Rule::neg => UnaryOp::Neg,
                    other => unreachable!("unknown prefix operator: {:?}", other),
                };
                Ok(&*self.arena.alloc(Expr::Prefix { op, right }))
            })
            .map_infix(|lhs, op, rhs| {
                let left = lhs?;
                let right = rhs?;
                let op = match op.as_rule() {
                    Rule::eq => BinaryOp::Eq,
                    Rule::neq => BinaryOp::NotEq,
                    Rule::lt => BinaryOp::Lt,
                    Rule::gt => BinaryOp::Gt,
                    Rule::add => BinaryOp::Add,
                    Rule::sub => BinaryOp::Sub,
                    Rule::mul => BinaryOp::Mul,
                    Rule::div => BinaryOp::Div,
                    other => unreachable!("unknown infix operator: {:?}", other),
                };
                Ok(&*self.arena.alloc(Expr::Infix { op, left, right }))
            })
            .map_postfix(|lhs, op| {
                let left = lhs?;
                match op.as_rule() {
                    Rule::call_op => {
                        let arguments = match op.into_inner().next() {
                            Some(list) => self.parse_expression_list(list)?,
                            None => &[],
                        };
                        Ok(&*self.arena.alloc(Expr::Call {
                            function: left,
                            arguments,
                        }))
                    }
                    Rule::index_op => {
                        let index = self.parse_expression(first_inner(op)?)?;
                        Ok(&*self.arena.alloc(Expr::Index { left, index }))
                    }
                    other => unreachable!("unknown postfix operator: {:?}", other),
                }
            })
            .parse(pair.into_inner());
        self.depth.set(self.depth.get() - 1);
        result
    }

    fn parse_expression_list(&self, pair: Pair<'_, Rule>) -> Result<&'a [Expr<'a>], ParseError> {
        let mut expressions = Vec::new();
        for inner in pair.into_inner() {
            expressions.push(*self.parse_expression(inner)?);
        }
        Ok(self.arena.alloc_slice_copy(&expressions))
    }

    fn parse_primary(&self, pair: Pair<'_, Rule>) -> Result<&'a Expr<'a>, ParseError> {
        match pair.as_rule() {
            Rule::integer => {
                let text = pair.as_str();
                let value: i64 = text.parse().map_err(|_| {
                    ParseError::new(
                        ParseErrorKind::InvalidNumber {
                            text: text.to_string(),
                        },
                        span_of(&pair),
                    )
                })?;
                Ok(self.arena.alloc(Expr::Integer(value)))
            }
            Rule::boolean => Ok(self.arena.alloc(Expr::Boolean(pair.as_str() == "true"))),
            Rule::string => {
                let inner = first_inner(pair)?;
                Ok(self
                    .arena
                    .alloc(Expr::Str(self.arena.alloc_str(inner.as_str()))))
            }
            Rule::ident => Ok(self
                .arena
                .alloc(Expr::Ident(self.arena.alloc_str(pair.as_str())))),
            Rule::grouped => self.parse_expression(first_inner(pair)?),
            Rule::array => {
                let elements = match pair.into_inner().next() {
                    Some(list) => self.parse_expression_list(list)?,
                    None => &[],
                };
                Ok(self.arena.alloc(Expr::Array { elements }))
            }
            Rule::hash => {
                let mut pairs = Vec::new();
                for entry in pair.into_inner() {
                    let span = span_of(&entry);
                    let mut parts = entry.into_inner();
                    let key_pair = parts.next().ok_or_else(|| missing("a hash key", span))?;
                    let value_pair = parts.next().ok_or_else(|| missing("a hash value", span))?;
                    pairs.push((
                        *self.parse_expression(key_pair)?,
                        *self.parse_expression(value_pair)?,
                    ));
                }
                Ok(self.arena.alloc(Expr::Hash {
                    pairs: self.arena.alloc_slice_copy(&pairs),
                }))
            }
            Rule::if_expr => {
                let span = span_of(&pair);
                let mut condition = None;
                let mut consequence = None;
                let mut alternative = None;
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::expression => condition = Some(self.parse_expression(part)?),
                        Rule::block => {
                            let block = self.parse_block(part)?;
                            if consequence.is_none() {
                                consequence = Some(block);
                            } else {
                                alternative = Some(block);
                            }
                        }
                        _ => {}
                    }
                }
                let condition = condition.ok_or_else(|| missing("a condition", span))?;
                let consequence = consequence.ok_or_else(|| missing("a block", span))?;
                Ok(self.arena.alloc(Expr::If {
                    condition,
                    consequence,
                    alternative,
                }))
            }
            Rule::function_lit => {
                let span = span_of(&pair);
                let mut parameters: &[&str] = &[];
                let mut body = None;
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::param_list => {
                            let names: Vec<&str> = part
                                .into_inner()
                                .map(|ident| &*self.arena.alloc_str(ident.as_str()))
                                .collect();
                            parameters = self.arena.alloc_slice_copy(&names);
                        }
                        Rule::block => body = Some(self.parse_block(part)?),
                        _ => {}
                    }
                }
                let body = body.ok_or_else(|| missing("a function body", span))?;
                Ok(self.arena.alloc(Expr::Function { parameters, body }))
            }
            other => Err(unexpected(other, span_of(&pair))),
        }
    }
}
