//! Evaluation of computed variables
//!
//! A computed variable is a postfix (RPN) expression over other variables.
//! Its operands are extracted once per evaluation, nested computed operands are
//! evaluated recursively, then the expression is reduced on a stack.

use crate::errors::{ExtractError, Result};
use crate::time_series::{ExtractionParams, Region, TimeSeries};
use crate::variable::{ComputedVariable, Variable};
use std::collections::HashMap;
use tracing::debug;

/// Binary element-wise operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl Operator {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "+" => Some(Operator::Add),
            "-" => Some(Operator::Sub),
            "*" => Some(Operator::Mul),
            "/" => Some(Operator::Div),
            "^" => Some(Operator::Pow),
            _ => None,
        }
    }

    fn apply(&self, a: f32, b: f32) -> f32 {
        match self {
            Operator::Add => a + b,
            Operator::Sub => a - b,
            Operator::Mul => a * b,
            Operator::Div => a / b,
            Operator::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RpnToken<'a> {
    Operand(&'a str),
    Number(f32),
    Operator(Operator),
}

impl<'a> RpnToken<'a> {
    pub fn parse_expression(expression: &'a str) -> Result<Vec<RpnToken<'a>>> {
        let tokens: Vec<RpnToken<'a>> = expression
            .split_whitespace()
            .map(|token| {
                if let Some(op) = Operator::from_token(token) {
                    RpnToken::Operator(op)
                } else if let Ok(value) = token.parse::<f32>() {
                    RpnToken::Number(value)
                } else {
                    RpnToken::Operand(token)
                }
            })
            .collect();

        if tokens.is_empty() {
            return Err(ExtractError::evaluation(expression, "empty expression"));
        }
        Ok(tokens)
    }
}

/// Stack value: an extracted region or a scalar literal
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Region(Region),
    Scalar(f32),
}

impl Value {
    fn combine(self, other: Value, op: Operator, expression: &str) -> Result<Value> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(op.apply(a, b))),
            (Value::Region(mut a), Value::Scalar(b)) => {
                a.mapv_inplace(|x| op.apply(x, b));
                Ok(Value::Region(a))
            }
            (Value::Scalar(a), Value::Region(mut b)) => {
                b.mapv_inplace(|x| op.apply(a, x));
                Ok(Value::Region(b))
            }
            (Value::Region(mut a), Value::Region(b)) => {
                if a.dim() != b.dim() {
                    return Err(ExtractError::evaluation(
                        expression,
                        format!("shape mismatch {:?} vs {:?}", a.dim(), b.dim()),
                    ));
                }
                a.zip_mut_with(&b, |x, &y| *x = op.apply(*x, y));
                Ok(Value::Region(a))
            }
        }
    }
}

/// Postfix calculator over already resolved regions
pub struct RpnCalculator<'a> {
    expression: &'a str,
    resolved: &'a HashMap<String, Region>,
}

impl<'a> RpnCalculator<'a> {
    pub fn new(expression: &'a str, resolved: &'a HashMap<String, Region>) -> Self {
        Self {
            expression,
            resolved,
        }
    }

    pub fn compute(&self) -> Result<Value> {
        let mut stack: Vec<Value> = Vec::new();

        for token in RpnToken::parse_expression(self.expression)? {
            match token {
                RpnToken::Number(value) => stack.push(Value::Scalar(value)),
                RpnToken::Operand(id) => {
                    let region = self.resolved.get(id).ok_or_else(|| {
                        ExtractError::evaluation(
                            self.expression,
                            format!("unresolved operand '{}'", id),
                        )
                    })?;
                    stack.push(Value::Region(region.clone()));
                }
                RpnToken::Operator(op) => {
                    let (b, a) = match (stack.pop(), stack.pop()) {
                        (Some(b), Some(a)) => (b, a),
                        _ => {
                            return Err(ExtractError::evaluation(
                                self.expression,
                                format!("operator {:?} lacks operands", op),
                            ))
                        }
                    };
                    stack.push(a.combine(b, op, self.expression)?);
                }
            }
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(value), true) => Ok(value),
            _ => Err(ExtractError::evaluation(
                self.expression,
                "expression does not reduce to a single value",
            )),
        }
    }

    /// Computes the expression and requires a region as result.
    pub fn compute_region(&self) -> Result<Region> {
        match self.compute()? {
            Value::Region(region) => Ok(region),
            Value::Scalar(_) => Err(ExtractError::evaluation(
                self.expression,
                "expression reduces to a scalar, not a region",
            )),
        }
    }
}

/// Extracts the operands of `variable` and reduces its expression.
///
/// Each operand is extracted at most once per call; nothing is cached across calls.
pub fn evaluate(
    time_series: &TimeSeries,
    variable: &ComputedVariable,
    params: &ExtractionParams,
) -> Result<Region> {
    debug!(variable = %variable.common.id, expression = %variable.expression, "evaluating computed variable");

    let mut resolved: HashMap<String, Region> = HashMap::with_capacity(variable.operands.len());
    for operand in &variable.operands {
        if resolved.contains_key(operand.id()) {
            continue;
        }
        let region = match operand {
            Variable::SingleLevel(_) | Variable::MultiLevel(_) => {
                time_series.extract_direct(operand, params)?
            }
            Variable::Computed(nested) => evaluate(time_series, nested, params)?,
        };
        resolved.insert(operand.id().to_string(), region);
    }

    RpnCalculator::new(&variable.expression, &resolved).compute_region()
}
