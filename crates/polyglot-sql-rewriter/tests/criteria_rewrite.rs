//! Criteria Rewrite Tests
//!
//! Predicate simplification through the public entry points.

mod common;

use common::*;
use polyglot_sql_rewriter::builder::*;
use polyglot_sql_rewriter::criteria::DependentSetCriteria;
use polyglot_sql_rewriter::expressions::Reference;
use polyglot_sql_rewriter::{
    evaluate_and_rewrite, optimize_criteria, Command, CommandContext, CompoundCriteria,
    ContextDataManager, Criteria, DataType, DependentValueSource, Error, Expression,
    LogicalOp, Value,
};

// ============================================================================
// Compound Criteria
// ============================================================================

mod compound {
    use super::*;

    #[test]
    fn test_or_with_true_is_true() {
        let crit = Criteria::or(vec![eq(a(), int(1)), ge(int(2), int(1))]);
        assert_eq!(rewrite_crit(crit).unwrap(), Criteria::True);
    }

    #[test]
    fn test_and_with_false_is_false() {
        let crit = Criteria::and(vec![eq(a(), int(1)), lt(int(2), int(1))]);
        assert_eq!(rewrite_crit(crit).unwrap(), Criteria::False);
    }

    #[test]
    fn test_or_drops_unknown_children() {
        let crit = Criteria::or(vec![eq(a(), null(DataType::Integer)), eq(a(), int(3))]);
        assert_eq!(crit_sql(crit), "t.a = 3");
    }

    #[test]
    fn test_all_children_removed() {
        let crit = Criteria::and(vec![eq(int(1), int(1)), eq(string("x"), string("x"))]);
        assert_eq!(rewrite_crit(crit).unwrap(), Criteria::True);

        let crit = Criteria::or(vec![eq(int(1), int(2)), eq(a(), null(DataType::Integer))]);
        assert_eq!(rewrite_crit(crit).unwrap(), Criteria::False);
    }

    #[test]
    fn test_nested_same_operator_flattened() {
        let crit = Criteria::or(vec![
            eq(a(), int(1)),
            Criteria::or(vec![eq(a(), int(2)), eq(a(), int(1))]),
        ]);
        assert_eq!(crit_sql(crit), "(t.a = 1) OR (t.a = 2)");
    }

    #[test]
    fn test_optimize_criteria_is_structural() {
        let compound = CompoundCriteria {
            op: LogicalOp::And,
            criteria: vec![
                Criteria::True,
                eq(a(), int(1)),
                Criteria::and(vec![eq(a(), int(1)), eq(b(), string("x"))]),
            ],
        };
        assert_eq!(
            optimize_criteria(compound).to_string(),
            "(t.a = 1) AND (t.b = 'x')"
        );
    }
}

// ============================================================================
// Negation
// ============================================================================

mod negation {
    use super::*;

    #[test]
    fn test_not_of_or_becomes_and() {
        let crit = Criteria::not(Criteria::or(vec![eq(a(), int(1)), is_null(b())]));
        assert_eq!(crit_sql(crit), "(t.a <> 1) AND (t.b IS NOT NULL)");
    }

    #[test]
    fn test_not_of_truth_values() {
        assert_eq!(
            rewrite_crit(Criteria::not(eq(int(1), int(1)))).unwrap(),
            Criteria::False
        );
        assert_eq!(
            rewrite_crit(Criteria::not(eq(a(), null(DataType::Integer)))).unwrap(),
            Criteria::Unknown
        );
    }

    #[test]
    fn test_not_between() {
        let mut crit = between(a(), int(1), int(9));
        if let Criteria::Between(inner) = &mut crit {
            inner.negated = true;
        }
        assert_eq!(crit_sql(crit), "(t.a < 1) OR (t.a > 9)");
    }
}

// ============================================================================
// Comparisons
// ============================================================================

mod comparisons {
    use super::*;

    #[test]
    fn test_constant_moves_right() {
        assert_eq!(crit_sql(ge(int(3), a())), "t.a <= 3");
    }

    #[test]
    fn test_arithmetic_inverted() {
        let crit = eq(func("-", vec![a(), int(3)]).unwrap(), int(7));
        assert_eq!(crit_sql(crit), "t.a = 10");
    }

    #[test]
    fn test_right_side_folded_before_inverting() {
        let right = func("*", vec![int(2), int(3)]).unwrap();
        let crit = lt(func("+", vec![a(), int(1)]).unwrap(), right);
        assert_eq!(crit_sql(crit), "t.a < 5");
    }

    #[test]
    fn test_conversion_removed() {
        let crit = eq(convert(a(), DataType::String).unwrap(), string("12"));
        assert_eq!(crit_sql(crit), "t.a = 12");
    }

    #[test]
    fn test_conversion_to_unreachable_value() {
        let crit = eq(convert(a(), DataType::String).unwrap(), string("twelve"));
        assert_eq!(rewrite_crit(crit).unwrap(), Criteria::False);
    }
}

// ============================================================================
// Timestamp Decomposition
// ============================================================================

mod timestamps {
    use super::*;

    const SPLIT: &str = "(t.d = {d'2020-01-05'}) AND (t.tm = {t'10:11:12'})";

    fn formatted_timestamp() -> Expression {
        func(
            "concat",
            vec![
                func("formatdate", vec![d(), string("%Y-%m-%d")]).unwrap(),
                func("formattime", vec![tm(), string(" %H:%M:%S")]).unwrap(),
            ],
        )
        .unwrap()
    }

    fn timestamp(text: &str) -> Expression {
        convert(string(text), DataType::Timestamp).unwrap()
    }

    #[test]
    fn test_timestamp_create_split() {
        let crit = eq(
            func("timestampcreate", vec![d(), tm()]).unwrap(),
            timestamp("2020-01-05 10:11:12"),
        );
        assert_eq!(crit_sql(crit), SPLIT);
    }

    #[test]
    fn test_timestamp_create_range_kept() {
        let crit = lt(
            func("timestampcreate", vec![d(), tm()]).unwrap(),
            timestamp("2020-01-05 10:11:12"),
        );
        let rewritten = rewrite_crit(crit).unwrap();
        assert!(matches!(rewritten, Criteria::Compare(_)), "got {rewritten}");
        assert!(rewritten.to_string().starts_with("timestampcreate(t.d, t.tm) < "));
    }

    #[test]
    fn test_formatted_timestamp_split() {
        let crit = eq(formatted_timestamp(), string("2020-01-05 10:11:12"));
        assert_eq!(crit_sql(crit), SPLIT);
    }

    #[test]
    fn test_unparseable_formatted_timestamp_kept() {
        let crit = eq(formatted_timestamp(), string("not a timestamp"));
        let rewritten = rewrite_crit(crit).unwrap();
        assert!(matches!(rewritten, Criteria::Compare(_)), "got {rewritten}");
        let sql = rewritten.to_string();
        assert!(sql.starts_with("concat("), "got {sql}");
        assert!(sql.ends_with(" = 'not a timestamp'"), "got {sql}");
    }
}

// ============================================================================
// LIKE
// ============================================================================

mod matching {
    use super::*;

    #[test]
    fn test_pattern_without_wildcards() {
        assert_eq!(crit_sql(like(b(), "abc")), "t.b = 'abc'");
    }

    #[test]
    fn test_pattern_with_wildcards_kept() {
        assert_eq!(crit_sql(like(b(), "ab%")), "t.b LIKE 'ab%'");
        assert_eq!(crit_sql(like(b(), "a_c")), "t.b LIKE 'a_c'");
    }

    #[test]
    fn test_match_everything() {
        assert_eq!(rewrite_crit(like(nn(), "%")).unwrap(), Criteria::True);
        assert_eq!(crit_sql(like(b(), "%")), "t.b IS NOT NULL");
    }

    #[test]
    fn test_null_pattern_is_unknown() {
        let crit = like(null(DataType::String), "a%");
        assert_eq!(rewrite_crit(crit).unwrap(), Criteria::Unknown);
    }
}

// ============================================================================
// IN lists
// ============================================================================

mod sets {
    use super::*;

    #[test]
    fn test_duplicates_removed() {
        let crit = in_list(a(), vec![int(1), int(2), int(1), int(3)]);
        assert_eq!(crit_sql(crit), "t.a IN (1, 2, 3)");
    }

    #[test]
    fn test_values_folded() {
        let crit = in_list(a(), vec![func("+", vec![int(1), int(1)]).unwrap(), int(2)]);
        assert_eq!(crit_sql(crit), "t.a = 2");
    }

    #[test]
    fn test_not_in_with_null() {
        let mut crit = in_list(a(), vec![int(1), null(DataType::Integer)]);
        if let Criteria::Set(inner) = &mut crit {
            inner.negated = true;
        }
        assert_eq!(rewrite_crit(crit).unwrap(), Criteria::False);
    }
}

// ============================================================================
// Processing-time rewrites
// ============================================================================

mod processing {
    use super::*;

    fn dependent(source: &str) -> Criteria {
        Criteria::DependentSet(Box::new(DependentSetCriteria {
            expression: a(),
            source: source.to_string(),
            value_expression: col("s", "x", DataType::Long),
            negated: false,
        }))
    }

    fn where_query(criteria: Criteria) -> Command {
        select([a()]).from("t").where_(criteria).build()
    }

    #[test]
    fn test_dependent_values_materialized() {
        let mut context = CommandContext::new();
        context.add_dependent_source(
            "s",
            DependentValueSource::new(
                vec!["x".into()],
                vec![
                    vec![Value::Long(1)],
                    vec![Value::Long(2)],
                    vec![Value::Long(2)],
                ],
            ),
        );
        let rewritten = evaluate_and_rewrite(
            where_query(dependent("s")),
            &ContextDataManager,
            &context,
            &metadata(),
        )
        .unwrap();
        assert_eq!(rewritten.to_string(), "SELECT t.a FROM t WHERE t.a IN (1, 2)");
    }

    #[test]
    fn test_no_dependent_values_filters_everything() {
        let mut context = CommandContext::new();
        context.add_dependent_source("s", DependentValueSource::new(vec!["x".into()], vec![]));
        let rewritten = evaluate_and_rewrite(
            where_query(dependent("s")),
            &ContextDataManager,
            &context,
            &metadata(),
        )
        .unwrap();
        assert_eq!(rewritten.to_string(), "SELECT t.a FROM t WHERE FALSE");
    }

    #[test]
    fn test_missing_dependent_source() {
        let result = evaluate_and_rewrite(
            where_query(dependent("nowhere")),
            &ContextDataManager,
            &CommandContext::new(),
            &metadata(),
        );
        assert!(matches!(result, Err(Error::Component(_))));
    }

    #[test]
    fn test_dependent_set_untouched_at_planning_time() {
        let crit = rewrite_crit(dependent("s")).unwrap();
        assert!(matches!(crit, Criteria::DependentSet(_)));
    }

    #[test]
    fn test_references_bound_from_context() {
        let mut context = CommandContext::new();
        context.set_references(vec![Value::Integer(4)]);
        let reference = Expression::Reference(Box::new(Reference::positional(0, DataType::Integer)));
        let rewritten = evaluate_and_rewrite(
            where_query(eq(a(), reference)),
            &ContextDataManager,
            &context,
            &metadata(),
        )
        .unwrap();
        assert_eq!(rewritten.to_string(), "SELECT t.a FROM t WHERE t.a = 4");
    }
}
