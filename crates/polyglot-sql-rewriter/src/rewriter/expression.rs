//! Expression rewriting: variable substitution, function canonicalization, CASE
//! simplification and constant folding.

use std::collections::HashMap;
use std::sync::LazyLock;

use log::trace;

use super::QueryRewriter;
use crate::builder::{conversion, string};
use crate::criteria::{CompareOp, Criteria};
use crate::error::{Error, Result};
use crate::evaluator::Evaluation;
use crate::expressions::{
    AggregateFunction, AggregateSymbol, CaseExpression, ElementSymbol, Expression, Function,
    Reference, SearchedCaseExpression, CHANGING, INPUT, INPUTS,
};
use crate::functions::{epoch, FunctionDescriptor};
use crate::metadata::Metadata;
use crate::traversal::{is_fully_evaluatable, will_become_constant};
use crate::types::{convert_value, DataType, Value};

/// Alternate spellings normalized to one canonical function name
static FUNCTION_ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("lower", "lcase"),
        ("upper", "ucase"),
        ("cast", "convert"),
        ("nvl", "ifnull"),
        ("||", "concat"),
        ("chr", "char"),
    ])
});

/// Functions expressed through other functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionRewrite {
    Space,
    FromUnixtime,
    NullIf,
    Coalesce,
    Concat2,
    TimestampAdd,
    ParseTemporal,
    FormatTemporal,
}

/// Keyed by the name as written, before alias normalization
static FUNCTION_REWRITES: LazyLock<HashMap<&'static str, FunctionRewrite>> = LazyLock::new(|| {
    use FunctionRewrite::*;
    HashMap::from([
        ("space", Space),
        ("from_unixtime", FromUnixtime),
        ("nullif", NullIf),
        ("coalesce", Coalesce),
        ("concat2", Concat2),
        ("timestampadd", TimestampAdd),
        ("parsedate", ParseTemporal),
        ("parsetime", ParseTemporal),
        ("formatdate", FormatTemporal),
        ("formattime", FormatTemporal),
    ])
});

/// Result of canonicalizing a function call
enum Canonical {
    /// Fully rewritten replacement
    Finished(Expression),
    /// Call whose arguments still need rewriting
    Call(Function),
}

impl QueryRewriter<'_> {
    /// Rewrite an expression tree and fold what can be evaluated
    pub(crate) fn rewrite_expression(&mut self, expr: Expression) -> Result<Expression> {
        let expr = match expr {
            Expression::Constant(_) => return Ok(expr),
            Expression::Element(element) => return self.rewrite_element(element),
            Expression::Function(function) => self.rewrite_function(*function)?,
            Expression::Case(case) => self.rewrite_case(*case)?,
            Expression::SearchedCase(case) => self.rewrite_searched_case(*case)?,
            Expression::Aggregate(aggregate) => self.rewrite_aggregate(*aggregate)?,
            Expression::ScalarSubquery(mut subquery) => {
                subquery.command =
                    self.rewrite_subcommand(subquery.command, subquery.planned, true)?;
                return Ok(Expression::ScalarSubquery(subquery));
            }
            reference @ Expression::Reference(_) => reference,
        };
        self.fold(expr)
    }

    /// Evaluate an expression whose inputs are all known
    fn fold(&self, expr: Expression) -> Result<Expression> {
        if matches!(expr, Expression::Constant(_)) {
            return Ok(expr);
        }
        let foldable = match self.data_manager {
            None => is_fully_evaluatable(&expr, true),
            Some(_) => is_fully_evaluatable(&expr, false),
        };
        if !foldable {
            return Ok(expr);
        }
        let data_type = expr.data_type();
        let folded = match self.evaluator.evaluate(&expr, self.context)? {
            Evaluation::Scalar(value) => {
                Expression::constant(convert_value(&value, data_type)?, data_type)
            }
            Evaluation::MultiValued(constant) => Expression::Constant(constant),
        };
        trace!("folded {expr} to {folded}");
        Ok(folded)
    }

    /// Substitute external references (procedure variables, INPUT and CHANGING values)
    fn rewrite_element(&self, element: ElementSymbol) -> Result<Expression> {
        if !element.external {
            return Ok(element.into());
        }
        if self.data_manager.is_some() {
            let bound = self
                .context
                .and_then(|context| context.variable(&element.canonical_name()));
            return Ok(match bound {
                Some(value) => {
                    Expression::constant(convert_value(value, element.data_type)?, element.data_type)
                }
                None => element.into(),
            });
        }
        let Some(variables) = &self.variables else {
            return Ok(Expression::Reference(Box::new(Reference::to_element(element))));
        };

        match variables.get(&element.canonical_name()) {
            None if element.is_in_group(INPUT) || element.is_in_group(INPUTS) => {
                Ok(Expression::null(element.data_type))
            }
            None if element.is_in_group(CHANGING) => Err(Error::component(format!(
                "no CHANGING value bound for {element}"
            ))),
            Some(Expression::Constant(constant)) if constant.data_type == element.data_type => {
                Ok(Expression::Constant(constant.clone()))
            }
            Some(Expression::Constant(constant)) => {
                let value = convert_value(&constant.value, element.data_type)
                    .map_err(|e| Error::validation(e.to_string()))?;
                Ok(Expression::constant(value, element.data_type))
            }
            _ => Ok(Expression::Reference(Box::new(Reference::to_element(element)))),
        }
    }

    fn descriptor(&self, name: &str, types: &[DataType]) -> Result<FunctionDescriptor> {
        self.metadata
            .function_library()
            .find_function(name, types)
            .cloned()
            .ok_or_else(|| {
                Error::component(format!("no function {name} accepting {types:?} is registered"))
            })
    }

    fn convert_to(&self, expr: Expression, target: DataType) -> Result<Function> {
        conversion(self.metadata.function_library(), expr, target)
    }

    fn rewrite_function(&mut self, mut function: Function) -> Result<Expression> {
        let written = function.name.to_lowercase();
        if let Some(canonical) = FUNCTION_ALIASES.get(written.as_str()) {
            function.name = canonical.to_string();
        }

        if let Some(rewrite) = FUNCTION_REWRITES.get(written.as_str()) {
            function = match self.canonicalize(*rewrite, function)? {
                Canonical::Finished(expr) => return Ok(expr),
                Canonical::Call(call) => call,
            };
        }

        let mut args = Vec::with_capacity(function.args.len());
        for arg in std::mem::take(&mut function.args) {
            let arg = self.rewrite_expression(arg)?;
            if arg.is_null_constant() && !function.is_null_dependent() {
                return Ok(Expression::null(function.data_type));
            }
            args.push(arg);
        }
        function.args = args;

        if function.is_named("convert") && function.args.len() == 2 {
            let target = function.args[1]
                .as_constant()
                .and_then(|c| c.value.as_str())
                .and_then(DataType::from_name);
            if target == Some(function.args[0].data_type()) {
                return Ok(function.args.swap_remove(0));
            }
        }

        if function.is_named("decodestring") || function.is_named("decodeinteger") {
            return self.rewrite_decode(function);
        }
        Ok(function.into())
    }

    fn canonicalize(&mut self, rewrite: FunctionRewrite, mut function: Function) -> Result<Canonical> {
        let data_type = function.data_type;
        match rewrite {
            FunctionRewrite::Space if function.args.len() == 1 => {
                let descriptor = self.descriptor("repeat", &[DataType::String, DataType::Integer])?;
                let count = function.args.swap_remove(0);
                Ok(Canonical::Call(Function::new(
                    "repeat",
                    vec![string(" "), count],
                    descriptor,
                )))
            }
            FunctionRewrite::FromUnixtime if function.args.len() == 1 => {
                let descriptor = self.descriptor(
                    "timestampadd",
                    &[DataType::String, DataType::Integer, DataType::Timestamp],
                )?;
                let seconds = function.args.swap_remove(0);
                Ok(Canonical::Call(Function::new(
                    "timestampadd",
                    vec![
                        string("SQL_TSI_SECOND"),
                        seconds,
                        Expression::constant(Value::Timestamp(epoch()), DataType::Timestamp),
                    ],
                    descriptor,
                )))
            }
            FunctionRewrite::NullIf if function.args.len() == 2 => {
                let right = function.args.pop();
                let left = function.args.pop();
                let (Some(left), Some(right)) = (left, right) else {
                    return Ok(Canonical::Call(function));
                };
                let case = SearchedCaseExpression {
                    whens: vec![Criteria::compare(left.clone(), CompareOp::Eq, right)],
                    thens: vec![Expression::null(data_type)],
                    else_expr: Some(left),
                    data_type,
                };
                self.rewrite_expression(Expression::SearchedCase(Box::new(case)))
                    .map(Canonical::Finished)
            }
            FunctionRewrite::Coalesce if function.args.len() == 2 => {
                function.descriptor = Some(self.descriptor("ifnull", &[data_type, data_type])?);
                function.name = "ifnull".to_string();
                Ok(Canonical::Call(function))
            }
            FunctionRewrite::Concat2 if function.args.len() == 2 => {
                let concat = self.descriptor("concat", &[DataType::String, DataType::String])?;
                let ifnull = self.descriptor("ifnull", &[DataType::String, DataType::String])?;
                let both_null = Criteria::and(
                    function
                        .args
                        .iter()
                        .map(|arg| Criteria::is_null(arg.clone(), false))
                        .collect(),
                );
                let mut padded = Vec::with_capacity(2);
                for arg in function.args {
                    let arg = if arg.data_type() == DataType::String {
                        arg
                    } else {
                        self.convert_to(arg, DataType::String)?.into()
                    };
                    padded.push(Function::new("ifnull", vec![arg, string("")], ifnull.clone()).into());
                }
                let case = SearchedCaseExpression {
                    whens: vec![both_null],
                    thens: vec![Expression::null(DataType::String)],
                    else_expr: Some(Function::new("concat", padded, concat).into()),
                    data_type: DataType::String,
                };
                self.rewrite_expression(Expression::SearchedCase(Box::new(case)))
                    .map(Canonical::Finished)
            }
            FunctionRewrite::TimestampAdd
                if data_type != DataType::Timestamp && function.args.len() == 3 =>
            {
                let descriptor = self.descriptor(
                    "timestampadd",
                    &[DataType::String, DataType::Integer, DataType::Timestamp],
                )?;
                let value = function.args.swap_remove(2);
                let value = self.convert_to(value, DataType::Timestamp)?;
                function.args.push(value.into());
                function.descriptor = Some(descriptor);
                function.data_type = DataType::Timestamp;
                self.convert_to(function.into(), data_type).map(Canonical::Call)
            }
            FunctionRewrite::ParseTemporal => {
                function.descriptor =
                    Some(self.descriptor("parsetimestamp", &[DataType::String, DataType::String])?);
                function.name = "parsetimestamp".to_string();
                function.data_type = DataType::Timestamp;
                self.convert_to(function.into(), data_type).map(Canonical::Call)
            }
            FunctionRewrite::FormatTemporal if !function.args.is_empty() => {
                function.descriptor = Some(
                    self.descriptor("formattimestamp", &[DataType::Timestamp, DataType::String])?,
                );
                function.name = "formattimestamp".to_string();
                let value = function.args.remove(0);
                function
                    .args
                    .insert(0, self.convert_to(value, DataType::Timestamp)?.into());
                Ok(Canonical::Call(function))
            }
            _ => Ok(Canonical::Call(function)),
        }
    }

    /// Expand `decodestring(x, 'a,b,c,d[,e]'[, delim])` into a searched CASE
    fn rewrite_decode(&mut self, function: Function) -> Result<Expression> {
        let decode = function
            .args
            .get(1)
            .and_then(|e| e.as_constant())
            .and_then(|c| c.value.as_str());
        let delimiter = match function.args.get(2) {
            None => Some(","),
            Some(expr) => expr.as_constant().and_then(|c| c.value.as_str()),
        };
        let (Some(decode), Some(delimiter)) = (decode, delimiter) else {
            return Ok(function.into());
        };
        if delimiter.is_empty() {
            return Ok(function.into());
        }

        let data_type = function.data_type;
        let input = function.args[0].clone();
        let tokens: Vec<&str> = if decode.is_empty() {
            Vec::new()
        } else {
            decode.split(delimiter).map(str::trim).collect()
        };

        let mut whens = Vec::with_capacity(tokens.len() / 2);
        let mut thens = Vec::with_capacity(tokens.len() / 2);
        let mut pairs = tokens.chunks_exact(2);
        for pair in &mut pairs {
            let when = match decode_token(pair[0]) {
                None => Criteria::is_null(input.clone(), false),
                Some(text) => Criteria::compare(input.clone(), CompareOp::Eq, string(&text)),
            };
            whens.push(when);
            thens.push(decoded_result(decode_token(pair[1]), data_type)?);
        }
        let else_expr = match pairs.remainder() {
            [last] => decoded_result(decode_token(last), data_type)?,
            _ if input.data_type() == data_type => input,
            _ => self.convert_to(input, data_type)?.into(),
        };

        let case = SearchedCaseExpression {
            whens,
            thens,
            else_expr: Some(else_expr),
            data_type,
        };
        self.rewrite_expression(Expression::SearchedCase(Box::new(case)))
    }

    fn rewrite_case(&mut self, case: CaseExpression) -> Result<Expression> {
        let CaseExpression {
            operand,
            whens,
            thens,
            else_expr,
            data_type,
        } = case;
        let whens = whens
            .into_iter()
            .map(|when| Criteria::compare(operand.clone(), CompareOp::Eq, when))
            .collect();
        self.rewrite_searched_case(SearchedCaseExpression {
            whens,
            thens,
            else_expr,
            data_type,
        })
    }

    fn rewrite_searched_case(&mut self, case: SearchedCaseExpression) -> Result<Expression> {
        let data_type = case.data_type;
        let mut else_expr = case.else_expr;
        let mut whens = Vec::with_capacity(case.whens.len());
        let mut thens = Vec::with_capacity(case.thens.len());

        for (when, then) in case.whens.into_iter().zip(case.thens) {
            match self.rewrite_criteria(when)? {
                Criteria::True if whens.is_empty() => return self.rewrite_expression(then),
                // later branches are unreachable
                Criteria::True => {
                    else_expr = Some(then);
                    break;
                }
                Criteria::False | Criteria::Unknown => continue,
                when => {
                    whens.push(when);
                    thens.push(self.rewrite_expression(then)?);
                }
            }
        }

        let else_expr = else_expr.map(|e| self.rewrite_expression(e)).transpose()?;
        if whens.is_empty() {
            return Ok(else_expr.unwrap_or_else(|| Expression::null(data_type)));
        }
        if let Some(else_expr) = &else_expr {
            if thens.iter().all(|then| then == else_expr) {
                return Ok(else_expr.clone());
            }
        }
        Ok(Expression::SearchedCase(Box::new(SearchedCaseExpression {
            whens,
            thens,
            else_expr,
            data_type,
        })))
    }

    fn rewrite_aggregate(&mut self, mut aggregate: AggregateSymbol) -> Result<Expression> {
        aggregate.expression = aggregate
            .expression
            .map(|e| self.rewrite_expression(e))
            .transpose()?;
        let collapsible = !matches!(
            aggregate.function,
            AggregateFunction::Count | AggregateFunction::Sum
        );
        match aggregate.expression.take() {
            Some(inner) if collapsible && will_become_constant(&inner) => {
                if inner.data_type() == aggregate.data_type {
                    Ok(inner)
                } else {
                    self.convert_to(inner, aggregate.data_type).map(Expression::from)
                }
            }
            inner => {
                aggregate.expression = inner;
                Ok(Expression::Aggregate(Box::new(aggregate)))
            }
        }
    }
}

/// One entry of a decode string; `None` stands for NULL
fn decode_token(raw: &str) -> Option<String> {
    let token = raw.trim();
    if token.is_empty() || token.eq_ignore_ascii_case("null") {
        return None;
    }
    let quoted = token.len() >= 2
        && ((token.starts_with('\'') && token.ends_with('\''))
            || (token.starts_with('"') && token.ends_with('"')));
    if quoted {
        return Some(token[1..token.len() - 1].to_string());
    }
    Some(token.to_string())
}

fn decoded_result(token: Option<String>, data_type: DataType) -> Result<Expression> {
    match token {
        None => Ok(Expression::null(data_type)),
        Some(text) => {
            let value = convert_value(&Value::String(text), data_type)
                .map_err(|e| Error::validation(e.to_string()))?;
            Ok(Expression::constant(value, data_type))
        }
    }
}
