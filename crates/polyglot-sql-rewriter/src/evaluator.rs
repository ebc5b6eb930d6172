//! Constant evaluation of expressions and three-valued evaluation of criteria
//!
//! The rewriter folds subtrees through the [`Evaluator`] trait so callers can plug in an
//! engine with wider coverage. [`DefaultEvaluator`] handles everything the rewriter
//! itself produces: literals, bound variables and references, resolved function calls,
//! CASE expressions and the scalar predicates.

use std::cmp::Ordering;

use crate::context::CommandContext;
use crate::criteria::{CompareOp, Criteria, LogicalOp, MatchCriteria};
use crate::error::{Error, Result};
use crate::expressions::{Constant, Expression};
use crate::types::{convert_value, Value};

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// A single value
    Scalar(Value),
    /// A list-valued constant returned as is
    MultiValued(Constant),
}

/// Evaluates expressions and criteria whose inputs are all known
pub trait Evaluator {
    /// Evaluate an expression to a value
    fn evaluate(&self, expr: &Expression, context: Option<&CommandContext>) -> Result<Evaluation>;

    /// Evaluate a criteria under three-valued logic; `None` is UNKNOWN
    fn evaluate_tvl(
        &self,
        criteria: &Criteria,
        context: Option<&CommandContext>,
    ) -> Result<Option<bool>>;
}

/// Evaluator over the built-in function library
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEvaluator;

impl DefaultEvaluator {
    fn value(&self, expr: &Expression, context: Option<&CommandContext>) -> Result<Value> {
        match self.evaluate(expr, context)? {
            Evaluation::Scalar(value) => Ok(value),
            Evaluation::MultiValued(c) => Err(Error::evaluation(format!(
                "multi-valued constant {c} used where a single value is expected"
            ))),
        }
    }

    fn variable(&self, name: &str, context: Option<&CommandContext>) -> Result<Value> {
        context
            .and_then(|ctx| ctx.variable(name))
            .cloned()
            .ok_or_else(|| Error::evaluation(format!("no value bound for {name}")))
    }

    fn compare(
        &self,
        left: &Expression,
        right: &Expression,
        context: Option<&CommandContext>,
    ) -> Result<Option<Ordering>> {
        let a = self.value(left, context)?;
        let b = self.value(right, context)?;
        compare_values(&a, &b)
    }
}

/// Compare two values, coercing the right operand to the left type when they differ.
/// NULL on either side compares as unknown.
fn compare_values(a: &Value, b: &Value) -> Result<Option<Ordering>> {
    if a.is_null() || b.is_null() {
        return Ok(None);
    }
    if let Some(ordering) = a.compare(b) {
        return Ok(Some(ordering));
    }
    let coerced = convert_value(b, a.data_type())?;
    a.compare(&coerced)
        .map(Some)
        .ok_or_else(|| Error::evaluation(format!("cannot compare {a} with {b}")))
}

fn compare_holds(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    }
}

fn negate_if(value: Option<bool>, negated: bool) -> Option<bool> {
    value.map(|v| v != negated)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternToken {
    Literal(char),
    One,
    Any,
}

fn tokenize_pattern(pattern: &str, escape: Option<char>) -> Result<Vec<PatternToken>> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            match chars.next() {
                Some(next) => tokens.push(PatternToken::Literal(next)),
                None => {
                    return Err(Error::evaluation(format!(
                        "LIKE pattern '{pattern}' ends with the escape character"
                    )))
                }
            }
        } else if c == MatchCriteria::WILDCARD {
            tokens.push(PatternToken::Any);
        } else if c == MatchCriteria::MATCH_ONE {
            tokens.push(PatternToken::One);
        } else {
            tokens.push(PatternToken::Literal(c));
        }
    }
    Ok(tokens)
}

/// LIKE matching over the whole input
pub(crate) fn like_matches(text: &str, pattern: &str, escape: Option<char>) -> Result<bool> {
    let tokens = tokenize_pattern(pattern, escape)?;
    let text: Vec<char> = text.chars().collect();

    // matched[j]: the first i chars of text match the first j tokens
    let mut matched = vec![false; tokens.len() + 1];
    matched[0] = true;
    for (j, token) in tokens.iter().enumerate() {
        if *token == PatternToken::Any {
            matched[j + 1] = matched[j];
        }
    }
    for c in text {
        let mut next = vec![false; tokens.len() + 1];
        for (j, token) in tokens.iter().enumerate() {
            next[j + 1] = match token {
                PatternToken::Any => next[j] || matched[j + 1],
                PatternToken::One => matched[j],
                PatternToken::Literal(l) => matched[j] && *l == c,
            };
        }
        matched = next;
    }
    Ok(matched[tokens.len()])
}

impl Evaluator for DefaultEvaluator {
    fn evaluate(&self, expr: &Expression, context: Option<&CommandContext>) -> Result<Evaluation> {
        let value = match expr {
            Expression::Constant(c) if c.multi_valued => {
                return Ok(Evaluation::MultiValued(c.clone()))
            }
            Expression::Constant(c) => c.value.clone(),
            Expression::Element(e) if e.external => self.variable(&e.canonical_name(), context)?,
            Expression::Reference(r) => match (&r.element, r.position) {
                (Some(element), _) => self.variable(&element.canonical_name(), context)?,
                (None, Some(position)) => context
                    .and_then(|ctx| ctx.reference(position))
                    .cloned()
                    .ok_or_else(|| {
                        Error::evaluation(format!("no value bound for parameter {position}"))
                    })?,
                (None, None) => return Err(Error::evaluation("unbound reference")),
            },
            Expression::Function(f) => {
                let descriptor = f.descriptor.as_ref().ok_or_else(|| {
                    Error::evaluation(format!("function {} is not resolved", f.name))
                })?;
                let args = f
                    .args
                    .iter()
                    .map(|arg| self.value(arg, context))
                    .collect::<Result<Vec<_>>>()?;
                descriptor.invoke(&args)?
            }
            Expression::Case(case) => {
                let operand = self.value(&case.operand, context)?;
                let mut result = None;
                for (when, then) in case.whens.iter().zip(&case.thens) {
                    let candidate = self.value(when, context)?;
                    if compare_values(&operand, &candidate)? == Some(Ordering::Equal) {
                        result = Some(self.value(then, context)?);
                        break;
                    }
                }
                match (result, &case.else_expr) {
                    (Some(value), _) => value,
                    (None, Some(else_expr)) => self.value(else_expr, context)?,
                    (None, None) => Value::Null,
                }
            }
            Expression::SearchedCase(case) => {
                let mut result = None;
                for (when, then) in case.whens.iter().zip(&case.thens) {
                    if self.evaluate_tvl(when, context)? == Some(true) {
                        result = Some(self.value(then, context)?);
                        break;
                    }
                }
                match (result, &case.else_expr) {
                    (Some(value), _) => value,
                    (None, Some(else_expr)) => self.value(else_expr, context)?,
                    (None, None) => Value::Null,
                }
            }
            Expression::Element(_) | Expression::Aggregate(_) | Expression::ScalarSubquery(_) => {
                return Err(Error::evaluation(format!("cannot evaluate {expr}")))
            }
        };
        Ok(Evaluation::Scalar(value))
    }

    fn evaluate_tvl(
        &self,
        criteria: &Criteria,
        context: Option<&CommandContext>,
    ) -> Result<Option<bool>> {
        Ok(match criteria {
            Criteria::True => Some(true),
            Criteria::False => Some(false),
            Criteria::Unknown => None,
            Criteria::Compare(c) => self
                .compare(&c.left, &c.right, context)?
                .map(|ordering| compare_holds(c.op, ordering)),
            Criteria::Compound(c) => {
                // Kleene logic: a dominating value short-circuits, otherwise any UNKNOWN wins
                let dominant = c.op == LogicalOp::Or;
                let mut unknown = false;
                for child in &c.criteria {
                    match self.evaluate_tvl(child, context)? {
                        Some(v) if v == dominant => return Ok(Some(dominant)),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                (!unknown).then_some(!dominant)
            }
            Criteria::Not(inner) => self.evaluate_tvl(inner, context)?.map(|v| !v),
            Criteria::Between(c) => {
                let lower = self
                    .compare(&c.expression, &c.lower, context)?
                    .map(|o| o != Ordering::Less);
                let upper = self
                    .compare(&c.expression, &c.upper, context)?
                    .map(|o| o != Ordering::Greater);
                let within = match (lower, upper) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                };
                negate_if(within, c.negated)
            }
            Criteria::Match(c) => {
                let left = self.value(&c.left, context)?;
                let right = self.value(&c.right, context)?;
                if left.is_null() || right.is_null() {
                    None
                } else {
                    let text = left.to_plain_string();
                    let pattern = right.to_plain_string();
                    negate_if(Some(like_matches(&text, &pattern, c.escape)?), c.negated)
                }
            }
            Criteria::Set(c) => {
                let value = self.value(&c.expression, context)?;
                let mut unknown = value.is_null();
                let mut found = false;
                if !unknown {
                    for candidate in &c.values {
                        match compare_values(&value, &self.value(candidate, context)?)? {
                            Some(Ordering::Equal) => {
                                found = true;
                                break;
                            }
                            Some(_) => {}
                            None => unknown = true,
                        }
                    }
                }
                let result = if found {
                    Some(true)
                } else if unknown {
                    None
                } else {
                    Some(false)
                };
                negate_if(result, c.negated)
            }
            Criteria::IsNull(c) => {
                Some(self.value(&c.expression, context)?.is_null() != c.negated)
            }
            other => return Err(Error::evaluation(format!("cannot evaluate {other}"))),
        })
    }
}
