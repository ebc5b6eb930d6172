//! Criteria rewriting
//!
//! Predicates are simplified bottom-up. Any predicate that ends up depending only on
//! planning-time values is evaluated and replaced by one of the truth value variants.

use log::trace;

use super::simplify::Simplified;
use super::QueryRewriter;
use crate::builder::convert_in;
use crate::commands::Command;
use crate::criteria::{
    BetweenCriteria, CompareCriteria, CompareOp, CompoundCriteria, Criteria, CriteriaSelector,
    DependentSetCriteria, LogicalOp, MatchCriteria, Quantifier, SelectorType, SetCriteria,
    TranslateCriteria,
};
use crate::error::{Error, Result};
use crate::expressions::{Constant, ElementSymbol, Expression};
use crate::metadata::Metadata;
use crate::traversal::{
    elements_in_criteria, is_criteria_fully_evaluatable, map_criteria, predicates,
    will_become_constant,
};
use crate::types::{convert_value, DataType, Value};

/// Accumulates the children of an AND/OR, short-circuiting on absorbing values
struct CompoundBuilder {
    op: LogicalOp,
    children: Vec<Criteria>,
}

impl CompoundBuilder {
    fn new(op: LogicalOp) -> Self {
        CompoundBuilder {
            op,
            children: Vec::new(),
        }
    }

    /// Add a simplified child; returns the whole compound's value when it is decided
    fn push(&mut self, child: Criteria) -> Option<Criteria> {
        match (child, self.op) {
            (Criteria::True, LogicalOp::Or) => Some(Criteria::True),
            (Criteria::False | Criteria::Unknown, LogicalOp::And) => Some(Criteria::False),
            (Criteria::True | Criteria::False | Criteria::Unknown, _) => None,
            (Criteria::Compound(nested), op) if nested.op == op => {
                for grandchild in nested.criteria {
                    self.add(grandchild);
                }
                None
            }
            (other, _) => {
                self.add(other);
                None
            }
        }
    }

    fn add(&mut self, child: Criteria) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    fn finish(mut self) -> Criteria {
        match self.children.len() {
            0 => Criteria::from_bool(self.op == LogicalOp::And),
            1 => self.children.pop().unwrap_or(Criteria::True),
            _ => Criteria::compound(self.op, self.children),
        }
    }
}

/// Flatten and deduplicate a compound without rewriting its leaf predicates.
///
/// TRUE/FALSE/UNKNOWN children are absorbed under the same rules as a full rewrite.
pub fn optimize_criteria(criteria: CompoundCriteria) -> Criteria {
    let mut builder = CompoundBuilder::new(criteria.op);
    for child in criteria.criteria {
        let child = match child {
            Criteria::Compound(nested) => optimize_criteria(*nested),
            other => other,
        };
        if let Some(decided) = builder.push(child) {
            return decided;
        }
    }
    builder.finish()
}

impl QueryRewriter<'_> {
    /// Rewrite a criteria tree
    pub(crate) fn rewrite_criteria(&mut self, criteria: Criteria) -> Result<Criteria> {
        let rewritten = match criteria {
            Criteria::Compound(compound) => return self.rewrite_compound(*compound),
            Criteria::Not(inner) => self.rewrite_not(*inner)?,
            Criteria::Compare(compare) => self.rewrite_compare(*compare)?,
            Criteria::Between(between) => self.rewrite_between(*between)?,
            Criteria::Match(matching) => self.rewrite_match(*matching)?,
            Criteria::Set(set) => self.rewrite_set(*set)?,
            Criteria::IsNull(mut is_null) => {
                is_null.expression = self.rewrite_expression(is_null.expression)?;
                Criteria::IsNull(is_null)
            }
            Criteria::Exists(mut exists) => {
                exists.command = self.rewrite_subcommand(exists.command, exists.planned, true)?;
                Criteria::Exists(exists)
            }
            Criteria::SubqueryCompare(mut sub) => {
                sub.left = self.rewrite_expression(sub.left)?;
                if sub.left.is_null_constant() {
                    return Ok(Criteria::Unknown);
                }
                if sub.quantifier == Quantifier::Any {
                    sub.quantifier = Quantifier::Some;
                }
                sub.command = self.rewrite_subcommand(sub.command, sub.planned, true)?;
                Criteria::SubqueryCompare(sub)
            }
            Criteria::SubquerySet(mut sub) => {
                sub.expression = self.rewrite_expression(sub.expression)?;
                if sub.expression.is_null_constant() {
                    return Ok(Criteria::Unknown);
                }
                sub.command = self.rewrite_subcommand(sub.command, sub.planned, true)?;
                Criteria::SubquerySet(sub)
            }
            Criteria::DependentSet(dependent) => self.rewrite_dependent_set(*dependent)?,
            Criteria::Has(has) => Criteria::from_bool(self.has_criteria(&has.selector)?),
            Criteria::Translate(translate) => self.rewrite_translate(*translate)?,
            sentinel => sentinel,
        };
        self.evaluate_criteria(rewritten)
    }

    /// Replace a criteria that only depends on planning-time values with its truth value
    fn evaluate_criteria(&self, criteria: Criteria) -> Result<Criteria> {
        if criteria.is_sentinel() || !is_criteria_fully_evaluatable(&criteria, true) {
            return Ok(criteria);
        }
        let value = self
            .evaluator
            .evaluate_tvl(&criteria, self.context)
            .map_err(|e| match e {
                Error::Evaluation { message } => {
                    Error::validation(format!("Error evaluating criteria {criteria}: {message}"))
                }
                other => other,
            })?;
        trace!("evaluated {criteria} to {value:?}");
        Ok(match value {
            Some(true) => Criteria::True,
            Some(false) => Criteria::False,
            None => Criteria::Unknown,
        })
    }

    fn rewrite_compound(&mut self, compound: CompoundCriteria) -> Result<Criteria> {
        let mut builder = CompoundBuilder::new(compound.op);
        for child in compound.criteria {
            let child = self.rewrite_criteria(child)?;
            if let Some(decided) = builder.push(child) {
                return Ok(decided);
            }
        }
        Ok(builder.finish())
    }

    fn rewrite_not(&mut self, inner: Criteria) -> Result<Criteria> {
        match inner {
            Criteria::Compound(compound) => {
                self.rewrite_criteria(Criteria::to_conjunctive_normal_form(*compound))
            }
            Criteria::Not(double) => self.rewrite_criteria(*double),
            negatable if negatable.is_negatable() => self.rewrite_criteria(negatable.negate()),
            other => Ok(match self.rewrite_criteria(other)? {
                Criteria::True => Criteria::False,
                Criteria::False => Criteria::True,
                Criteria::Unknown => Criteria::Unknown,
                rewritten => Criteria::not(rewritten),
            }),
        }
    }

    fn rewrite_between(&mut self, between: BetweenCriteria) -> Result<Criteria> {
        let BetweenCriteria {
            expression,
            lower,
            upper,
            negated,
        } = between;
        let expanded = if negated {
            Criteria::or(vec![
                Criteria::compare(expression.clone(), CompareOp::Lt, lower),
                Criteria::compare(expression, CompareOp::Gt, upper),
            ])
        } else {
            Criteria::and(vec![
                Criteria::compare(expression.clone(), CompareOp::Ge, lower),
                Criteria::compare(expression, CompareOp::Le, upper),
            ])
        };
        self.rewrite_criteria(expanded)
    }

    fn rewrite_compare(&mut self, mut compare: CompareCriteria) -> Result<Criteria> {
        compare.left = self.rewrite_expression(compare.left)?;
        compare.right = self.rewrite_expression(compare.right)?;

        if compare.left.is_null_constant() || compare.right.is_null_constant() {
            return Ok(Criteria::Unknown);
        }

        let mut right_constant = will_become_constant(&compare.right);
        if !right_constant && will_become_constant(&compare.left) {
            std::mem::swap(&mut compare.left, &mut compare.right);
            compare.op = compare.op.reversed();
            right_constant = true;
        }

        if right_constant {
            while matches!(compare.left, Expression::Function(_)) {
                match self.simplify_with_inverse(compare)? {
                    Simplified::Changed(next) => compare = next,
                    Simplified::Unchanged(same) => {
                        compare = same;
                        break;
                    }
                    Simplified::Resolved(result) => return Ok(result),
                }
            }
        }

        if let Some(merged) = self.merge_formatted_timestamp(&compare) {
            return Ok(merged);
        }
        if let Some(merged) = merge_timestamp_create(&compare) {
            return Ok(merged);
        }
        Ok(Criteria::Compare(Box::new(compare)))
    }

    fn rewrite_match(&mut self, mut matching: MatchCriteria) -> Result<Criteria> {
        matching.left = self.rewrite_expression(matching.left)?;
        matching.right = self.rewrite_expression(matching.right)?;

        if matching.left.is_null_constant() || matching.right.is_null_constant() {
            return Ok(Criteria::Unknown);
        }

        let Expression::Constant(Constant {
            value: Value::String(pattern),
            ..
        }) = &matching.right
        else {
            return Ok(Criteria::Match(Box::new(matching)));
        };
        let pattern = pattern.clone();

        if matching.escape.is_some_and(|escape| !pattern.contains(escape)) {
            matching.escape = None;
        }

        if pattern == MatchCriteria::WILDCARD.to_string() {
            let left = matching.left.clone();
            let outcome = !matching.negated;
            return Ok(self.simplified(Criteria::Match(Box::new(matching)), &left, outcome));
        }

        let plain = matching.escape.is_none()
            && !pattern.contains(MatchCriteria::WILDCARD)
            && !pattern.contains(MatchCriteria::MATCH_ONE);
        if plain && matching.left.data_type() == DataType::String {
            let op = if matching.negated {
                CompareOp::Ne
            } else {
                CompareOp::Eq
            };
            return self.rewrite_criteria(Criteria::compare(matching.left, op, matching.right));
        }

        Ok(Criteria::Match(Box::new(matching)))
    }

    pub(super) fn rewrite_set(&mut self, mut set: SetCriteria) -> Result<Criteria> {
        set.expression = self.rewrite_expression(set.expression)?;
        if set.expression.is_null_constant() {
            return Ok(Criteria::Unknown);
        }

        let mut values: Vec<Expression> = Vec::with_capacity(set.values.len());
        let mut dropped_null = false;
        for value in set.values {
            let value = self.rewrite_expression(value)?;
            if value.is_null_constant() {
                dropped_null = true;
            } else if !values.contains(&value) {
                values.push(value);
            }
        }

        // x NOT IN (..., NULL) is never TRUE
        if set.negated && dropped_null {
            return Ok(Criteria::False);
        }

        match values.len() {
            0 => return Ok(Criteria::False),
            1 => {
                let op = if set.negated {
                    CompareOp::Ne
                } else {
                    CompareOp::Eq
                };
                let value = values.remove(0);
                return self.rewrite_criteria(Criteria::compare(set.expression, op, value));
            }
            _ => {}
        }
        set.values = values;

        if set
            .expression
            .as_function()
            .is_some_and(|f| f.is_named("convert") || f.is_named("cast"))
        {
            return self.simplify_convert_set(set);
        }
        Ok(Criteria::Set(Box::new(set)))
    }

    fn rewrite_dependent_set(&mut self, mut dependent: DependentSetCriteria) -> Result<Criteria> {
        let Some(data_manager) = self.data_manager else {
            dependent.expression = self.rewrite_expression(dependent.expression)?;
            if dependent.expression.is_null_constant() {
                return Ok(Criteria::Unknown);
            }
            return Ok(Criteria::DependentSet(Box::new(dependent)));
        };
        let context = self.context.ok_or_else(|| {
            Error::component(format!(
                "no command context to resolve dependent values {}",
                dependent.source
            ))
        })?;

        let data_type = dependent.expression.data_type();
        let raw = data_manager.dependent_values(
            context,
            &dependent.source,
            &dependent.value_expression,
        )?;
        let mut values: Vec<Expression> = Vec::with_capacity(raw.len());
        for value in raw {
            let value = Expression::constant(convert_value(&value, data_type)?, data_type);
            if !values.contains(&value) {
                values.push(value);
            }
        }
        trace!(
            "materialized {} dependent values from {}",
            values.len(),
            dependent.source
        );
        self.rewrite_criteria(Criteria::Set(Box::new(SetCriteria {
            expression: dependent.expression,
            values,
            negated: dependent.negated,
        })))
    }

    /// Criteria of the user command handled by the enclosing update procedure
    fn user_criteria(&self, selector: &CriteriaSelector) -> Result<Option<&Criteria>> {
        let scope = self.procedure.as_ref().ok_or_else(|| {
            Error::validation(format!(
                "criteria selector {selector} is only valid inside an update procedure"
            ))
        })?;
        Ok(match &scope.user_command {
            Some(Command::Update(update)) => update.criteria.as_ref(),
            Some(Command::Delete(delete)) => delete.criteria.as_ref(),
            _ => None,
        })
    }

    /// Evaluate `HAS selector` against the user command's criteria
    fn has_criteria(&self, selector: &CriteriaSelector) -> Result<bool> {
        let Some(user_criteria) = self.user_criteria(selector)? else {
            return Ok(false);
        };

        if !selector.elements.is_empty() {
            let used = elements_in_criteria(user_criteria);
            let all_used = selector
                .elements
                .iter()
                .all(|wanted| used.iter().any(|e| e.same_column(wanted)));
            if !all_used {
                return Ok(false);
            }
        }

        if selector.selector_type == SelectorType::Any {
            return Ok(true);
        }
        Ok(predicates(user_criteria)
            .into_iter()
            .any(|predicate| is_selected(selector, predicate)))
    }

    /// Rewrite `TRANSLATE selector` into the user criteria mapped onto the view definition
    fn rewrite_translate(&mut self, translate: TranslateCriteria) -> Result<Criteria> {
        if !self.has_criteria(&translate.selector)? {
            return Ok(Criteria::False);
        }
        let Some(user_criteria) = self.user_criteria(&translate.selector)?.cloned() else {
            return Ok(Criteria::False);
        };
        let symbol_map = self
            .procedure
            .as_ref()
            .map(|scope| scope.symbol_map.clone())
            .unwrap_or_default();

        let translated = self.translate_predicates(user_criteria, &translate, &symbol_map)?;

        if let Some(scope) = self.procedure.as_mut() {
            let parameters = translate
                .translations
                .iter()
                .map(|(element, expr)| (element.name.clone(), expr.clone()));
            match &mut scope.user_command {
                Some(Command::Update(update)) => update.implicit_parameters.extend(parameters),
                Some(Command::Delete(delete)) => delete.implicit_parameters.extend(parameters),
                _ => {}
            }
        }

        self.rewrite_criteria(translated)
    }

    fn translate_predicates(
        &self,
        criteria: Criteria,
        translate: &TranslateCriteria,
        symbol_map: &[(ElementSymbol, Expression)],
    ) -> Result<Criteria> {
        match criteria {
            Criteria::Compound(mut compound) => {
                compound.criteria = compound
                    .criteria
                    .into_iter()
                    .map(|child| self.translate_predicates(child, translate, symbol_map))
                    .collect::<Result<_>>()?;
                Ok(Criteria::Compound(compound))
            }
            Criteria::Not(inner) => Ok(Criteria::not(self.translate_predicates(
                *inner,
                translate,
                symbol_map,
            )?)),
            predicate if is_selected(&translate.selector, &predicate) => {
                let library = self.metadata.function_library();
                map_criteria(predicate, &mut |expr| {
                    let Expression::Element(element) = expr else {
                        return Ok(None);
                    };
                    let mapped = translate
                        .translations
                        .iter()
                        .chain(symbol_map)
                        .find(|(key, _)| key.same_column(element))
                        .map(|(_, value)| value.clone());
                    match mapped {
                        Some(value) if value.data_type() != element.data_type => {
                            convert_in(library, value, element.data_type).map(Some)
                        }
                        other => Ok(other),
                    }
                })
            }
            other => Ok(other),
        }
    }
}

/// Whether a leaf predicate is picked by a HAS/TRANSLATE selector
fn is_selected(selector: &CriteriaSelector, predicate: &Criteria) -> bool {
    if !selector.matches_kind(predicate) {
        return false;
    }
    selector.elements.is_empty()
        || elements_in_criteria(predicate)
            .iter()
            .any(|e| selector.elements.iter().any(|wanted| wanted.same_column(e)))
}

/// `timestampcreate(d, t) = ts` becomes `d = date(ts) AND t = time(ts)`
fn merge_timestamp_create(compare: &CompareCriteria) -> Option<Criteria> {
    if compare.op != CompareOp::Eq {
        return None;
    }
    let function = compare.left.as_function()?;
    if !function.is_named("timestampcreate") || function.args.len() != 2 {
        return None;
    }
    let Some(Value::Timestamp(ts)) = compare.right.as_constant().map(|c| &c.value) else {
        return None;
    };
    Some(Criteria::and(vec![
        Criteria::compare(
            function.args[0].clone(),
            CompareOp::Eq,
            Expression::constant(Value::Date(ts.date()), DataType::Date),
        ),
        Criteria::compare(
            function.args[1].clone(),
            CompareOp::Eq,
            Expression::constant(Value::Time(ts.time()), DataType::Time),
        ),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;
    use crate::criteria::HasCriteria;
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
    fn test_compound_absorbs_truth_values() {
        let crit = Criteria::and(vec![eq(int(1), int(1)), eq(a(), int(2))]);
        assert_eq!(rewrite(crit).unwrap().to_string(), "t.a = 2");

        let crit = Criteria::or(vec![eq(a(), int(2)), eq(int(1), int(1))]);
        assert_eq!(rewrite(crit).unwrap(), Criteria::True);

        let crit = Criteria::and(vec![eq(a(), int(2)), eq(a(), null(DataType::Integer))]);
        assert_eq!(rewrite(crit).unwrap(), Criteria::False);
    }

    #[test]
    fn test_compound_flattens_and_dedups() {
        let crit = Criteria::and(vec![
            eq(a(), int(1)),
            Criteria::and(vec![eq(a(), int(1)), gt(a(), int(0))]),
        ]);
        assert_eq!(rewrite(crit).unwrap().to_string(), "(t.a = 1) AND (t.a > 0)");
    }

    #[test]
    fn test_optimize_leaves_predicates_alone() {
        let compound = CompoundCriteria {
            op: LogicalOp::Or,
            criteria: vec![
                Criteria::False,
                Criteria::or(vec![eq(int(1), int(1)), eq(a(), int(3))]),
            ],
        };
        assert_eq!(
            optimize_criteria(compound).to_string(),
            "(1 = 1) OR (t.a = 3)"
        );
    }

    #[test]
    fn test_not_pushdown() {
        let crit = Criteria::not(Criteria::and(vec![eq(a(), int(1)), lt(a(), int(5))]));
        assert_eq!(rewrite(crit).unwrap().to_string(), "(t.a <> 1) OR (t.a >= 5)");

        let crit = Criteria::not(Criteria::not(eq(a(), int(1))));
        assert_eq!(rewrite(crit).unwrap().to_string(), "t.a = 1");
    }

    #[test]
    fn test_between_expands() {
        let crit = between(a(), int(1), int(5));
        assert_eq!(rewrite(crit).unwrap().to_string(), "(t.a >= 1) AND (t.a <= 5)");
    }

    #[test]
    fn test_compare_swaps_constant_to_right() {
        let crit = lt(int(5), a());
        assert_eq!(rewrite(crit).unwrap().to_string(), "t.a > 5");
    }

    #[test]
    fn test_set_collapses() {
        let crit = in_list(a(), vec![int(1), int(1)]);
        assert_eq!(rewrite(crit).unwrap().to_string(), "t.a = 1");

        let crit = in_list(a(), vec![null(DataType::Integer), int(1), int(2)]);
        assert_eq!(rewrite(crit).unwrap().to_string(), "t.a IN (1, 2)");
    }

    #[test]
    fn test_has_outside_procedure_fails() {
        let crit = Criteria::Has(Box::new(HasCriteria {
            selector: CriteriaSelector::new(SelectorType::Any, vec![]),
        }));
        assert!(matches!(rewrite(crit), Err(Error::Validation(_))));
    }
}
