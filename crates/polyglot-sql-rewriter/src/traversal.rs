//! Tree walking utilities for expressions and criteria
//!
//! - Collectors: [`elements_in_criteria`], [`elements_in_expression`],
//!   [`aggregates_in_expression`], [`predicates`]
//! - Evaluatability analysis: [`evaluation_level`], [`is_fully_evaluatable`],
//!   [`will_become_constant`]
//! - Result-returning top-down mapping: [`map_expression`], [`map_criteria`]
//!
//! None of these descend into nested commands (subqueries are opaque).

use crate::criteria::Criteria;
use crate::error::Result;
use crate::expressions::{AggregateSymbol, ElementSymbol, Expression};

/// Earliest point at which an expression can be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EvaluationLevel {
    /// Constant at rewrite time
    Planning,
    /// Needs values bound at execution (references, non-deterministic functions)
    Processing,
    /// Needs source rows (columns, aggregates, subqueries)
    PushDown,
}

/// Level required to evaluate an expression
pub fn evaluation_level(expr: &Expression) -> EvaluationLevel {
    match expr {
        Expression::Constant(_) => EvaluationLevel::Planning,
        Expression::Element(e) if e.external => EvaluationLevel::Processing,
        Expression::Element(_) => EvaluationLevel::PushDown,
        Expression::Reference(_) => EvaluationLevel::Processing,
        Expression::Aggregate(_) | Expression::ScalarSubquery(_) => EvaluationLevel::PushDown,
        Expression::Function(f) => {
            let own = match &f.descriptor {
                Some(d) if d.deterministic => EvaluationLevel::Planning,
                Some(_) => EvaluationLevel::Processing,
                None => EvaluationLevel::PushDown,
            };
            f.args.iter().map(evaluation_level).fold(own, Ord::max)
        }
        Expression::Case(c) => std::iter::once(&c.operand)
            .chain(&c.whens)
            .chain(&c.thens)
            .chain(&c.else_expr)
            .map(evaluation_level)
            .fold(EvaluationLevel::Planning, Ord::max),
        Expression::SearchedCase(c) => c
            .thens
            .iter()
            .chain(&c.else_expr)
            .map(evaluation_level)
            .chain(c.whens.iter().map(criteria_evaluation_level))
            .fold(EvaluationLevel::Planning, Ord::max),
    }
}

/// Level required to evaluate a criteria
pub fn criteria_evaluation_level(criteria: &Criteria) -> EvaluationLevel {
    let max = |exprs: &[&Expression]| {
        exprs
            .iter()
            .map(|e| evaluation_level(e))
            .fold(EvaluationLevel::Planning, Ord::max)
    };
    match criteria {
        Criteria::True | Criteria::False | Criteria::Unknown => EvaluationLevel::Planning,
        Criteria::Compare(c) => max(&[&c.left, &c.right]),
        Criteria::Compound(c) => c
            .criteria
            .iter()
            .map(criteria_evaluation_level)
            .fold(EvaluationLevel::Planning, Ord::max),
        Criteria::Not(inner) => criteria_evaluation_level(inner),
        Criteria::Between(c) => max(&[&c.expression, &c.lower, &c.upper]),
        Criteria::Match(c) => max(&[&c.left, &c.right]),
        Criteria::Set(c) => c
            .values
            .iter()
            .map(evaluation_level)
            .fold(evaluation_level(&c.expression), Ord::max),
        Criteria::IsNull(c) => evaluation_level(&c.expression),
        Criteria::Exists(_)
        | Criteria::SubqueryCompare(_)
        | Criteria::SubquerySet(_)
        | Criteria::DependentSet(_)
        | Criteria::Has(_)
        | Criteria::Translate(_) => EvaluationLevel::PushDown,
    }
}

/// Whether the expression can be folded now (`during_planning`) or at execution
pub fn is_fully_evaluatable(expr: &Expression, during_planning: bool) -> bool {
    evaluation_level(expr) <= target_level(during_planning)
}

pub fn is_criteria_fully_evaluatable(criteria: &Criteria, during_planning: bool) -> bool {
    criteria_evaluation_level(criteria) <= target_level(during_planning)
}

fn target_level(during_planning: bool) -> EvaluationLevel {
    if during_planning {
        EvaluationLevel::Planning
    } else {
        EvaluationLevel::Processing
    }
}

/// Whether the expression is constant for any single execution
pub fn will_become_constant(expr: &Expression) -> bool {
    evaluation_level(expr) <= EvaluationLevel::Processing
}

fn collect_elements<'a>(expr: &'a Expression, out: &mut Vec<&'a ElementSymbol>) {
    match expr {
        Expression::Element(e) => out.push(e),
        Expression::Constant(_) | Expression::ScalarSubquery(_) => {}
        Expression::Reference(r) => out.extend(r.element.as_ref()),
        Expression::Function(f) => f.args.iter().for_each(|a| collect_elements(a, out)),
        Expression::Case(c) => {
            collect_elements(&c.operand, out);
            c.whens
                .iter()
                .chain(&c.thens)
                .chain(&c.else_expr)
                .for_each(|e| collect_elements(e, out));
        }
        Expression::SearchedCase(c) => {
            c.whens.iter().for_each(|w| collect_criteria_elements(w, out));
            c.thens
                .iter()
                .chain(&c.else_expr)
                .for_each(|e| collect_elements(e, out));
        }
        Expression::Aggregate(a) => {
            if let Some(e) = &a.expression {
                collect_elements(e, out);
            }
        }
    }
}

fn collect_criteria_elements<'a>(criteria: &'a Criteria, out: &mut Vec<&'a ElementSymbol>) {
    match criteria {
        Criteria::True | Criteria::False | Criteria::Unknown => {}
        Criteria::Compare(c) => {
            collect_elements(&c.left, out);
            collect_elements(&c.right, out);
        }
        Criteria::Compound(c) => c
            .criteria
            .iter()
            .for_each(|child| collect_criteria_elements(child, out)),
        Criteria::Not(inner) => collect_criteria_elements(inner, out),
        Criteria::Between(c) => {
            collect_elements(&c.expression, out);
            collect_elements(&c.lower, out);
            collect_elements(&c.upper, out);
        }
        Criteria::Match(c) => {
            collect_elements(&c.left, out);
            collect_elements(&c.right, out);
        }
        Criteria::Set(c) => {
            collect_elements(&c.expression, out);
            c.values.iter().for_each(|v| collect_elements(v, out));
        }
        Criteria::IsNull(c) => collect_elements(&c.expression, out),
        Criteria::SubqueryCompare(c) => collect_elements(&c.left, out),
        Criteria::SubquerySet(c) => collect_elements(&c.expression, out),
        Criteria::DependentSet(c) => collect_elements(&c.expression, out),
        Criteria::Exists(_) => {}
        Criteria::Has(c) => out.extend(&c.selector.elements),
        Criteria::Translate(c) => out.extend(&c.selector.elements),
    }
}

/// Element references of an expression, in tree order
pub fn elements_in_expression(expr: &Expression) -> Vec<&ElementSymbol> {
    let mut out = Vec::new();
    collect_elements(expr, &mut out);
    out
}

/// Element references of a criteria, in tree order
pub fn elements_in_criteria(criteria: &Criteria) -> Vec<&ElementSymbol> {
    let mut out = Vec::new();
    collect_criteria_elements(criteria, &mut out);
    out
}

fn collect_aggregates<'a>(expr: &'a Expression, out: &mut Vec<&'a AggregateSymbol>) {
    match expr {
        Expression::Aggregate(a) => out.push(a),
        Expression::Function(f) => f.args.iter().for_each(|a| collect_aggregates(a, out)),
        Expression::Case(c) => std::iter::once(&c.operand)
            .chain(&c.whens)
            .chain(&c.thens)
            .chain(&c.else_expr)
            .for_each(|e| collect_aggregates(e, out)),
        Expression::SearchedCase(c) => {
            c.whens
                .iter()
                .for_each(|w| out.extend(aggregates_in_criteria(w)));
            c.thens
                .iter()
                .chain(&c.else_expr)
                .for_each(|e| collect_aggregates(e, out));
        }
        Expression::Constant(_)
        | Expression::Element(_)
        | Expression::ScalarSubquery(_)
        | Expression::Reference(_) => {}
    }
}

/// Aggregate calls in an expression
pub fn aggregates_in_expression(expr: &Expression) -> Vec<&AggregateSymbol> {
    let mut out = Vec::new();
    collect_aggregates(expr, &mut out);
    out
}

/// Aggregate calls in a criteria (HAVING)
pub fn aggregates_in_criteria(criteria: &Criteria) -> Vec<&AggregateSymbol> {
    let mut out = Vec::new();
    for_each_criteria_expression(criteria, &mut |e| collect_aggregates(e, &mut out));
    out
}

fn for_each_criteria_expression<'a>(criteria: &'a Criteria, f: &mut impl FnMut(&'a Expression)) {
    match criteria {
        Criteria::Compare(c) => {
            f(&c.left);
            f(&c.right);
        }
        Criteria::Compound(c) => c
            .criteria
            .iter()
            .for_each(|child| for_each_criteria_expression(child, f)),
        Criteria::Not(inner) => for_each_criteria_expression(inner, f),
        Criteria::Between(c) => {
            f(&c.expression);
            f(&c.lower);
            f(&c.upper);
        }
        Criteria::Match(c) => {
            f(&c.left);
            f(&c.right);
        }
        Criteria::Set(c) => {
            f(&c.expression);
            c.values.iter().for_each(|v| f(v));
        }
        Criteria::IsNull(c) => f(&c.expression),
        Criteria::SubqueryCompare(c) => f(&c.left),
        Criteria::SubquerySet(c) => f(&c.expression),
        Criteria::DependentSet(c) => f(&c.expression),
        Criteria::True
        | Criteria::False
        | Criteria::Unknown
        | Criteria::Exists(_)
        | Criteria::Has(_)
        | Criteria::Translate(_) => {}
    }
}

/// Leaf predicates of a criteria tree, looking through AND/OR/NOT
pub fn predicates(criteria: &Criteria) -> Vec<&Criteria> {
    fn walk<'a>(criteria: &'a Criteria, out: &mut Vec<&'a Criteria>) {
        match criteria {
            Criteria::Compound(c) => c.criteria.iter().for_each(|child| walk(child, out)),
            Criteria::Not(inner) => walk(inner, out),
            c if c.is_predicate() => out.push(c),
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(criteria, &mut out);
    out
}

/// Top-down, result-returning expression mapping.
///
/// `f` is offered each node before its children; returning `Some` replaces the node
/// (its children are not visited), `None` descends. The first error aborts the walk.
pub fn map_expression<F>(expr: Expression, f: &mut F) -> Result<Expression>
where
    F: FnMut(&Expression) -> Result<Option<Expression>>,
{
    if let Some(replacement) = f(&expr)? {
        return Ok(replacement);
    }
    Ok(match expr {
        Expression::Function(mut func) => {
            func.args = func
                .args
                .into_iter()
                .map(|a| map_expression(a, f))
                .collect::<Result<_>>()?;
            Expression::Function(func)
        }
        Expression::Case(mut case) => {
            case.operand = map_expression(case.operand, f)?;
            case.whens = case
                .whens
                .into_iter()
                .map(|w| map_expression(w, f))
                .collect::<Result<_>>()?;
            case.thens = case
                .thens
                .into_iter()
                .map(|t| map_expression(t, f))
                .collect::<Result<_>>()?;
            case.else_expr = case.else_expr.map(|e| map_expression(e, f)).transpose()?;
            Expression::Case(case)
        }
        Expression::SearchedCase(mut case) => {
            case.whens = case
                .whens
                .into_iter()
                .map(|w| map_criteria(w, f))
                .collect::<Result<_>>()?;
            case.thens = case
                .thens
                .into_iter()
                .map(|t| map_expression(t, f))
                .collect::<Result<_>>()?;
            case.else_expr = case.else_expr.map(|e| map_expression(e, f)).transpose()?;
            Expression::SearchedCase(case)
        }
        Expression::Aggregate(mut agg) => {
            agg.expression = agg.expression.map(|e| map_expression(e, f)).transpose()?;
            Expression::Aggregate(agg)
        }
        other => other,
    })
}

/// Apply [`map_expression`] to every expression slot of a criteria tree
pub fn map_criteria<F>(criteria: Criteria, f: &mut F) -> Result<Criteria>
where
    F: FnMut(&Expression) -> Result<Option<Expression>>,
{
    Ok(match criteria {
        Criteria::Compare(mut c) => {
            c.left = map_expression(c.left, f)?;
            c.right = map_expression(c.right, f)?;
            Criteria::Compare(c)
        }
        Criteria::Compound(mut c) => {
            c.criteria = c
                .criteria
                .into_iter()
                .map(|child| map_criteria(child, f))
                .collect::<Result<_>>()?;
            Criteria::Compound(c)
        }
        Criteria::Not(inner) => Criteria::not(map_criteria(*inner, f)?),
        Criteria::Between(mut c) => {
            c.expression = map_expression(c.expression, f)?;
            c.lower = map_expression(c.lower, f)?;
            c.upper = map_expression(c.upper, f)?;
            Criteria::Between(c)
        }
        Criteria::Match(mut c) => {
            c.left = map_expression(c.left, f)?;
            c.right = map_expression(c.right, f)?;
            Criteria::Match(c)
        }
        Criteria::Set(mut c) => {
            c.expression = map_expression(c.expression, f)?;
            c.values = c
                .values
                .into_iter()
                .map(|v| map_expression(v, f))
                .collect::<Result<_>>()?;
            Criteria::Set(c)
        }
        Criteria::IsNull(mut c) => {
            c.expression = map_expression(c.expression, f)?;
            Criteria::IsNull(c)
        }
        Criteria::SubqueryCompare(mut c) => {
            c.left = map_expression(c.left, f)?;
            Criteria::SubqueryCompare(c)
        }
        Criteria::SubquerySet(mut c) => {
            c.expression = map_expression(c.expression, f)?;
            Criteria::SubquerySet(c)
        }
        Criteria::DependentSet(mut c) => {
            c.expression = map_expression(c.expression, f)?;
            Criteria::DependentSet(c)
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::CompareOp;
    use crate::expressions::{AggregateFunction, Function, Reference};
    use crate::functions::BUILTIN_FUNCTIONS;
    use crate::types::{DataType, Value};

    fn col(name: &str) -> Expression {
        ElementSymbol::new(Some("t"), name, DataType::Integer).into()
    }

    fn int(v: i32) -> Expression {
        Expression::constant(Value::Integer(v), DataType::Integer)
    }

    fn plus(a: Expression, b: Expression) -> Expression {
        let d = BUILTIN_FUNCTIONS
            .find_function("+", &[DataType::Integer, DataType::Integer])
            .cloned()
            .unwrap();
        Function::new("+", vec![a, b], d).into()
    }

    #[test]
    fn test_evaluation_levels() {
        assert!(is_fully_evaluatable(&plus(int(1), int(2)), true));
        assert!(!is_fully_evaluatable(&plus(col("a"), int(2)), true));

        let reference = Expression::Reference(Box::new(Reference::positional(0, DataType::Integer)));
        let with_ref = plus(reference, int(1));
        assert!(!is_fully_evaluatable(&with_ref, true));
        assert!(is_fully_evaluatable(&with_ref, false));
        assert!(will_become_constant(&with_ref));

        let now = BUILTIN_FUNCTIONS.find_function("now", &[]).cloned().unwrap();
        let now: Expression = Function::new("now", vec![], now).into();
        assert_eq!(evaluation_level(&now), EvaluationLevel::Processing);
    }

    #[test]
    fn test_collectors() {
        let crit = Criteria::and(vec![
            Criteria::compare(col("a"), CompareOp::Eq, int(1)),
            Criteria::not(Criteria::is_null(col("b"), false)),
        ]);
        let names: Vec<_> = elements_in_criteria(&crit).iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(predicates(&crit).len(), 2);

        let agg = Expression::Aggregate(Box::new(AggregateSymbol {
            function: AggregateFunction::Max,
            expression: Some(col("a")),
            distinct: false,
            data_type: DataType::Integer,
        }));
        assert_eq!(aggregates_in_expression(&plus(agg, int(1))).len(), 1);
    }

    #[test]
    fn test_map_expression_replaces_top_down() {
        let target = plus(col("a"), int(1));
        let expr = plus(target.clone(), int(2));
        let mapped = map_expression(expr, &mut |e| {
            Ok((*e == target).then(|| col("x")))
        })
        .unwrap();
        assert_eq!(mapped.to_string(), "(t.x + 2)");
    }
}
