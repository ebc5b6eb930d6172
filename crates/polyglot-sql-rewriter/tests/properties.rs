//! Rewrite Property Tests
//!
//! Laws every rewrite must satisfy, checked over small representative inputs.

mod common;

use common::*;
use polyglot_sql_rewriter::builder::*;
use polyglot_sql_rewriter::expressions::SearchedCaseExpression;
use polyglot_sql_rewriter::{AggregateFunction, Command, Criteria, DataType, Expression};

fn samples() -> Vec<Criteria> {
    vec![
        eq(a(), int(1)),
        gt(func("+", vec![a(), int(2)]).unwrap(), int(7)),
        like(b(), "x%"),
        is_null(b()),
        in_list(a(), vec![int(1), int(2), int(3)]),
        Criteria::or(vec![eq(a(), int(1)), lt(a(), int(0))]),
    ]
}

// ============================================================================
// Idempotence
// ============================================================================

mod idempotence {
    use super::*;

    fn commands() -> Vec<Command> {
        let plus = func("+", vec![a(), int(1)]).unwrap();
        vec![
            select([a(), b()])
                .from("t")
                .where_(Criteria::and(vec![eq(int(1), int(1)), between(a(), int(1), int(5))]))
                .build(),
            select([plus.clone(), aggregate(AggregateFunction::Max, b())])
                .from("t")
                .group_by([plus.clone()])
                .build(),
            select([a()]).from("t").order_by(plus, false).limit(10).build(),
            select([a(), b()]).from("t").into_group("t2").build(),
        ]
    }

    #[test]
    fn test_criteria_rewrite_is_idempotent() {
        for criteria in samples() {
            let once = rewrite_crit(criteria).unwrap();
            let twice = rewrite_crit(once.clone()).unwrap();
            assert_eq!(once, twice, "rewriting {once} again changed it");
        }
    }

    #[test]
    fn test_command_rewrite_is_idempotent() {
        for command in commands() {
            let once = rewrite_query(command).unwrap();
            let twice = rewrite_query(once.clone()).unwrap();
            assert_eq!(once.to_string(), twice.to_string());
        }
    }
}

// ============================================================================
// Boolean Identities
// ============================================================================

mod identities {
    use super::*;

    #[test]
    fn test_and_true_is_identity() {
        for x in samples() {
            let expected = rewrite_crit(x.clone()).unwrap();
            let crit = Criteria::and(vec![eq(int(1), int(1)), x]);
            assert_eq!(rewrite_crit(crit).unwrap(), expected);
        }
    }

    #[test]
    fn test_or_false_is_identity() {
        for x in samples() {
            let expected = rewrite_crit(x.clone()).unwrap();
            let crit = Criteria::or(vec![x, eq(int(1), int(2))]);
            assert_eq!(rewrite_crit(crit).unwrap(), expected);
        }
    }

    #[test]
    fn test_double_negation() {
        for x in samples() {
            let expected = rewrite_crit(x.clone()).unwrap();
            let crit = Criteria::not(Criteria::not(x));
            assert_eq!(rewrite_crit(crit).unwrap(), expected);
        }
    }

    #[test]
    fn test_and_of_unknowns_is_false() {
        let unknown = || eq(a(), null(DataType::Integer));
        let crit = Criteria::and(vec![unknown(), unknown()]);
        assert_eq!(rewrite_crit(crit).unwrap(), Criteria::False);
    }
}

// ============================================================================
// Predicate Equivalences
// ============================================================================

mod equivalences {
    use super::*;

    #[test]
    fn test_between_matches_range() {
        let range = Criteria::and(vec![ge(a(), int(2)), le(a(), int(8))]);
        assert_eq!(
            rewrite_crit(between(a(), int(2), int(8))).unwrap(),
            rewrite_crit(range).unwrap()
        );
    }

    #[test]
    fn test_null_comparisons_are_unknown() {
        let null_int = || null(DataType::Integer);
        for crit in [
            eq(a(), null_int()),
            ne(null_int(), a()),
            lt(a(), null_int()),
            eq(null_int(), null_int()),
        ] {
            assert_eq!(rewrite_crit(crit).unwrap(), Criteria::Unknown);
        }
    }

    #[test]
    fn test_like_without_wildcards_is_equality() {
        assert_eq!(
            rewrite_crit(like(b(), "abc")).unwrap(),
            rewrite_crit(eq(b(), string("abc"))).unwrap()
        );
    }

    #[test]
    fn test_single_value_in_is_equality() {
        assert_eq!(
            rewrite_crit(in_list(a(), vec![int(5)])).unwrap(),
            rewrite_crit(eq(a(), int(5))).unwrap()
        );
    }

    #[test]
    fn test_in_only_null_is_false() {
        let crit = in_list(a(), vec![null(DataType::Integer)]);
        assert_eq!(rewrite_crit(crit).unwrap(), Criteria::False);
    }
}

// ============================================================================
// Expressions
// ============================================================================

mod expressions {
    use super::*;

    fn searched_case(whens: Vec<Criteria>, thens: Vec<Expression>) -> Expression {
        Expression::SearchedCase(Box::new(SearchedCaseExpression {
            whens,
            thens,
            else_expr: Some(string("z")),
            data_type: DataType::String,
        }))
    }

    #[test]
    fn test_case_with_decided_branches() {
        let case = searched_case(
            vec![eq(int(1), int(2)), eq(int(1), int(1))],
            vec![string("a"), b()],
        );
        assert_eq!(rewrite_expr(case).unwrap(), b());
    }

    #[test]
    fn test_case_true_branch_becomes_else() {
        let case = searched_case(
            vec![eq(a(), int(1)), eq(int(1), int(1)), eq(a(), int(2))],
            vec![string("a"), string("b"), string("c")],
        );
        assert_eq!(
            rewrite_expr(case).unwrap().to_string(),
            "CASE WHEN t.a = 1 THEN 'a' ELSE 'b' END"
        );
    }

    #[test]
    fn test_decodestring_becomes_case() {
        let expr = func("decodestring", vec![b(), string("y,yes,n,no")]).unwrap();
        assert_eq!(
            rewrite_expr(expr).unwrap().to_string(),
            "CASE WHEN t.b = 'y' THEN 'yes' WHEN t.b = 'n' THEN 'no' ELSE t.b END"
        );
    }

    #[test]
    fn test_constants_fold() {
        let expr = func(
            "concat",
            vec![string("a"), func("lcase", vec![string("BC")]).unwrap()],
        )
        .unwrap();
        assert_eq!(rewrite_expr(expr).unwrap(), string("abc"));
    }
}
