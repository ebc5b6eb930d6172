//! Inverse-function simplification of comparisons against constants
//!
//! A comparison `f(x, k) op c` is turned into `x op' g(c, k)` when `g` is an exact
//! inverse of `f`: arithmetic, type conversions and parse/format pairs. When the
//! constant side is unreachable for `f` the comparison collapses to a truth value.

use std::cmp::Ordering;

use log::trace;

use super::QueryRewriter;
use crate::criteria::{CompareCriteria, CompareOp, Criteria, SetCriteria};
use crate::error::{Error, Result};
use crate::expressions::{Expression, Function};
use crate::metadata::Metadata;
use crate::types::{convert_value, is_implicit_conversion, DataType, Value};

/// Outcome of one inverse-function step
pub(crate) enum Simplified {
    /// No rule applied
    Unchanged(CompareCriteria),
    /// The left side was peeled; another step may apply
    Changed(CompareCriteria),
    /// The comparison reduced to something that is no longer a comparison
    Resolved(Criteria),
}

fn inverse_operator(name: &str) -> Option<&'static str> {
    match name {
        "+" => Some("-"),
        "-" => Some("+"),
        "*" => Some("/"),
        "/" => Some("*"),
        _ => None,
    }
}

fn is_conversion(function: &Function) -> bool {
    function.is_named("convert") || function.is_named("cast")
}

impl QueryRewriter<'_> {
    /// Apply one inverse step to a comparison whose right side will become constant
    pub(super) fn simplify_with_inverse(&self, compare: CompareCriteria) -> Result<Simplified> {
        let Some(function) = compare.left.as_function() else {
            return Ok(Simplified::Unchanged(compare));
        };
        if inverse_operator(&function.name).is_some() && function.args.len() == 2 {
            return self.simplify_mathematical(compare);
        }
        if is_conversion(function) {
            return Ok(self.simplify_convert(compare));
        }
        Ok(self.simplify_parse_format(compare))
    }

    /// `x + k op c` becomes `x op c - k`, flipping `op` for a negative multiplier
    fn simplify_mathematical(&self, compare: CompareCriteria) -> Result<Simplified> {
        let Some(function) = compare.left.as_function() else {
            return Ok(Simplified::Unchanged(compare));
        };
        let (constant, expr) = match (&function.args[0], &function.args[1]) {
            (expr, Expression::Constant(k)) => (k.clone(), expr.clone()),
            (Expression::Constant(k), expr) if matches!(function.name.as_str(), "+" | "*") => {
                (k.clone(), expr.clone())
            }
            _ => return Ok(Simplified::Unchanged(compare)),
        };
        let name = function.name.clone();
        let Some(opposite) = inverse_operator(&name) else {
            return Ok(Simplified::Unchanged(compare));
        };

        let library = self.metadata.function_library();
        let Some(descriptor) = library
            .find_function(opposite, &[compare.right.data_type(), constant.data_type])
            .cloned()
        else {
            return Ok(Simplified::Unchanged(compare));
        };

        if descriptor.return_type.is_integral() {
            // integer division truncates, so only exact multiples invert cleanly
            if name == "/" {
                return Ok(Simplified::Unchanged(compare));
            }
            if name == "*" {
                let exact = compare
                    .right
                    .as_constant()
                    .and_then(|right| Some((right.value.as_i128()?, constant.value.as_i128()?)))
                    .is_some_and(|(right, k)| k != 0 && right % k == 0);
                if !exact {
                    return Ok(Simplified::Unchanged(compare));
                }
            }
        }

        let mut op = compare.op;
        if !matches!(op, CompareOp::Eq | CompareOp::Ne) && matches!(opposite, "*" | "/") {
            match constant.value.signum() {
                Some(Ordering::Less) => op = op.reversed(),
                Some(_) => {}
                None => return Ok(Simplified::Unchanged(compare)),
            }
        }

        let combined: Expression = match &compare.right {
            Expression::Constant(right) => {
                let value = descriptor
                    .invoke(&[right.value.clone(), constant.value.clone()])
                    .map_err(|e| {
                        Error::validation(format!(
                            "Error simplifying criteria {} {} {}: {e}",
                            compare.left,
                            compare.op.symbol(),
                            compare.right
                        ))
                    })?;
                Expression::constant(value, descriptor.return_type)
            }
            right => {
                let mut inverse =
                    Function::new(opposite, vec![right.clone(), constant.into()], descriptor);
                inverse.data_type = compare.left.data_type();
                inverse.into()
            }
        };

        trace!("inverted {name} in {}", compare.left);
        Ok(Simplified::Changed(CompareCriteria::new(expr, op, combined)))
    }

    /// `convert(x, T) = c` becomes `x = convert(c, type(x))` when the round trip is exact
    fn simplify_convert(&self, compare: CompareCriteria) -> Simplified {
        if !matches!(compare.op, CompareOp::Eq | CompareOp::Ne) {
            return Simplified::Unchanged(compare);
        }
        let (Some(function), Some(right)) = (compare.left.as_function(), compare.right.as_constant())
        else {
            return Simplified::Unchanged(compare);
        };
        let Some(inner) = function.args.first().cloned() else {
            return Simplified::Unchanged(compare);
        };
        let inner_type = inner.data_type();
        let right_type = right.data_type;

        let converted = match round_trip(&right.value, inner_type, right_type) {
            Some(value) => value,
            None => {
                let outcome = compare.op != CompareOp::Eq;
                return Simplified::Resolved(self.simplified(
                    Criteria::Compare(Box::new(compare)),
                    &inner,
                    outcome,
                ));
            }
        };
        if !is_implicit_conversion(inner_type, right_type) {
            return Simplified::Unchanged(compare);
        }
        Simplified::Changed(CompareCriteria::new(
            inner,
            compare.op,
            Expression::constant(converted, inner_type),
        ))
    }

    /// `parseX(s, fmt) = c` is FALSE (or TRUE for `<>`) when `c` is not a value the
    /// function can produce under `fmt`, and likewise for `formatX`
    fn simplify_parse_format(&self, compare: CompareCriteria) -> Simplified {
        if !matches!(compare.op, CompareOp::Eq | CompareOp::Ne) {
            return Simplified::Unchanged(compare);
        }
        let (Some(function), Some(right)) = (compare.left.as_function(), compare.right.as_constant())
        else {
            return Simplified::Unchanged(compare);
        };
        let name = function.name.to_lowercase();
        let inverse_name = if let Some(suffix) = name.strip_prefix("parse") {
            format!("format{suffix}")
        } else if let Some(suffix) = name.strip_prefix("format") {
            format!("parse{suffix}")
        } else {
            return Simplified::Unchanged(compare);
        };
        let Some(format) = function.args.get(1).and_then(Expression::as_constant) else {
            return Simplified::Unchanged(compare);
        };
        let (Some(own), Some(inverse)) = (
            function.descriptor.as_ref(),
            self.metadata
                .function_library()
                .find_function(&inverse_name, &[right.data_type, format.data_type]),
        ) else {
            return Simplified::Unchanged(compare);
        };

        let round = inverse
            .invoke(&[right.value.clone(), format.value.clone()])
            .and_then(|parsed| own.invoke(&[parsed, format.value.clone()]));
        match round {
            Ok(value) if right.value.compare(&value) != Some(Ordering::Equal) => {
                let inner = function.args[0].clone();
                let outcome = compare.op != CompareOp::Eq;
                Simplified::Resolved(self.simplified(
                    Criteria::Compare(Box::new(compare)),
                    &inner,
                    outcome,
                ))
            }
            _ => Simplified::Unchanged(compare),
        }
    }

    /// `convert(x, T) IN (c1, c2)` becomes `x IN (...)` with each constant converted back
    pub(super) fn simplify_convert_set(&mut self, mut set: SetCriteria) -> Result<Criteria> {
        let Some(inner) = set
            .expression
            .as_function()
            .and_then(|f| f.args.first())
            .cloned()
        else {
            return Ok(Criteria::Set(Box::new(set)));
        };
        let inner_type = inner.data_type();

        let mut converted_all = true;
        let mut removed_some = false;
        let original = std::mem::take(&mut set.values);
        let mut kept = Vec::with_capacity(original.len());
        let mut converted = Vec::with_capacity(original.len());
        for value in &original {
            let Expression::Constant(constant) = value else {
                converted_all = false;
                kept.push(value.clone());
                continue;
            };
            match round_trip(&constant.value, inner_type, constant.data_type) {
                None => removed_some = true,
                Some(back) => {
                    if is_implicit_conversion(inner_type, constant.data_type) {
                        converted.push(Expression::constant(back, inner_type));
                    } else {
                        converted_all = false;
                    }
                    kept.push(value.clone());
                }
            }
        }

        if !converted_all {
            if !removed_some {
                set.values = kept;
                return Ok(Criteria::Set(Box::new(set)));
            }
            set.values = kept;
            return self.rewrite_set(set);
        }
        if converted.is_empty() {
            // no value is reachable through the conversion
            let negated = set.negated;
            set.values = original;
            return Ok(self.simplified(Criteria::Set(Box::new(set)), &inner, negated));
        }
        set.expression = inner;
        set.values = converted;
        self.rewrite_set(set)
    }

    /// `concat(formatdate(d, f1), formattime(t, f2)) = 'v'` becomes
    /// `d = date(v) AND t = time(v)` where `v` is parsed with `f1 || f2`
    pub(super) fn merge_formatted_timestamp(&self, compare: &CompareCriteria) -> Option<Criteria> {
        if compare.op != CompareOp::Eq {
            return None;
        }
        let concat = compare.left.as_function()?;
        if !(concat.is_named("concat") || concat.is_named("||")) || concat.args.len() != 2 {
            return None;
        }
        let text = compare.right.as_constant()?.value.as_str()?;
        let (date, date_format) = formatted_part(&concat.args[0], "formatdate", DataType::Date)?;
        let (time, time_format) = formatted_part(&concat.args[1], "formattime", DataType::Time)?;

        let parse = self
            .metadata
            .function_library()
            .find_function("parsetimestamp", &[DataType::String, DataType::String])?;
        let parsed = parse
            .invoke(&[
                Value::String(text.to_string()),
                Value::String(format!("{date_format}{time_format}")),
            ])
            .ok()?;
        let Value::Timestamp(ts) = parsed else {
            return None;
        };
        Some(Criteria::and(vec![
            Criteria::compare(
                date,
                CompareOp::Eq,
                Expression::constant(Value::Date(ts.date()), DataType::Date),
            ),
            Criteria::compare(
                time,
                CompareOp::Eq,
                Expression::constant(Value::Time(ts.time()), DataType::Time),
            ),
        ]))
    }

    /// Replacement for a predicate whose outcome no longer depends on `expr`'s value,
    /// only on whether it is NULL
    pub(super) fn simplified(&self, criteria: Criteria, expr: &Expression, outcome: bool) -> Criteria {
        if !outcome {
            return Criteria::False;
        }
        if !expr.is_nullable() {
            return Criteria::True;
        }
        if self.data_manager.is_some() {
            return criteria;
        }
        Criteria::is_null(expr.clone(), true)
    }
}

/// Convert `value` to `target` and back to `source`; `None` unless it survives unchanged
fn round_trip(value: &Value, target: DataType, source: DataType) -> Option<Value> {
    let converted = convert_value(value, target).ok()?;
    let back = convert_value(&converted, source).ok()?;
    (back.compare(value) == Some(Ordering::Equal)).then_some(converted)
}

/// The value and format of `formatdate(x, f)`, also accepted in its canonical
/// `formattimestamp(convert(x, timestamp), f)` form
fn formatted_part(expr: &Expression, name: &str, data_type: DataType) -> Option<(Expression, String)> {
    let function = expr.as_function()?;
    let format = function.args.get(1)?.as_constant()?.value.as_str()?.to_string();
    let value = function.args.first()?;
    if function.is_named(name) {
        return Some((value.clone(), format));
    }
    if !function.is_named("formattimestamp") {
        return None;
    }
    let conversion = value.as_function().filter(|f| is_conversion(f))?;
    let original = conversion.args.first()?;
    (original.data_type() == data_type).then(|| (original.clone(), format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;
    use crate::context::{CommandContext, ContextDataManager};
    use crate::metadata::MappingMetadata;
    use crate::rewriter::RewriterConfig;

    fn a() -> Expression {
        col("t", "a", DataType::Integer)
    }

    fn rewrite(criteria: Criteria) -> Result<Criteria> {
        let metadata = MappingMetadata::new();
        QueryRewriter::new(&metadata, RewriterConfig::default()).rewrite_criteria(criteria)
    }

    #[test]
    fn test_inverse_addition() {
        let crit = eq(func("+", vec![a(), int(1)]).unwrap(), int(5));
        assert_eq!(rewrite(crit).unwrap().to_string(), "t.a = 4");

        let crit = gt(func("+", vec![int(1), a()]).unwrap(), int(5));
        assert_eq!(rewrite(crit).unwrap().to_string(), "t.a > 4");
    }

    #[test]
    fn test_negative_multiplier_flips_operator() {
        let crit = lt(func("*", vec![a(), int(-2)]).unwrap(), int(6));
        assert_eq!(rewrite(crit).unwrap().to_string(), "t.a > -3");
    }

    #[test]
    fn test_inexact_integer_division_kept() {
        let crit = eq(func("*", vec![a(), int(2)]).unwrap(), int(5));
        assert_eq!(rewrite(crit).unwrap().to_string(), "(t.a * 2) = 5");

        let crit = eq(func("/", vec![a(), int(2)]).unwrap(), int(3));
        assert_eq!(rewrite(crit).unwrap().to_string(), "(t.a / 2) = 3");
    }

    #[test]
    fn test_convert_round_trip() {
        let crit = eq(convert(a(), DataType::String).unwrap(), string("5"));
        assert_eq!(rewrite(crit).unwrap().to_string(), "t.a = 5");

        let crit = eq(convert(a(), DataType::String).unwrap(), string("x"));
        assert_eq!(rewrite(crit).unwrap(), Criteria::False);

        let crit = ne(convert(a(), DataType::String).unwrap(), string("05"));
        assert_eq!(rewrite(crit).unwrap().to_string(), "t.a IS NOT NULL");
    }

    #[test]
    fn test_convert_set() {
        let crit = in_list(
            convert(a(), DataType::String).unwrap(),
            vec![string("1"), string("x"), string("2")],
        );
        assert_eq!(rewrite(crit).unwrap().to_string(), "t.a IN (1, 2)");
    }

    #[test]
    fn test_convert_set_without_reachable_values() {
        let unreachable = || {
            Criteria::not(in_list(
                convert(a(), DataType::String).unwrap(),
                vec![string("x"), string("y")],
            ))
        };
        assert_eq!(rewrite(unreachable()).unwrap().to_string(), "t.a IS NOT NULL");

        let crit = in_list(
            convert(a(), DataType::String).unwrap(),
            vec![string("x"), string("y")],
        );
        assert_eq!(rewrite(crit).unwrap(), Criteria::False);

        // at processing time the original list is kept
        let metadata = MappingMetadata::new();
        let context = CommandContext::new();
        let config = RewriterConfig::new()
            .with_context(&context)
            .with_data_manager(&ContextDataManager);
        let rewritten = QueryRewriter::new(&metadata, config)
            .rewrite_criteria(unreachable())
            .unwrap();
        assert_eq!(
            rewritten.to_string(),
            "convert(t.a, string) NOT IN ('x', 'y')"
        );
    }

    #[test]
    fn test_parse_format_unreachable_constant() {
        let ts = col("t", "ts", DataType::Timestamp);
        let formatted = func("formattimestamp", vec![ts, string("%Y-%m-%d")]).unwrap();

        // parses, but formatting never yields an unpadded month
        let crit = eq(formatted.clone(), string("2020-1-05"));
        assert_eq!(rewrite(crit).unwrap(), Criteria::False);

        let crit = eq(formatted, string("2020-01-05"));
        assert_eq!(
            rewrite(crit).unwrap().to_string(),
            "formattimestamp(t.ts, '%Y-%m-%d') = '2020-01-05'"
        );
    }
}
