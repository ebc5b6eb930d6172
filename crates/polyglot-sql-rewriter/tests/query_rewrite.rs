//! Query Rewrite Tests
//!
//! Whole-command rewrites: clause simplification, shape normalization and DML.

mod common;

use common::*;
use polyglot_sql_rewriter::builder::*;
use polyglot_sql_rewriter::criteria::ExistsCriteria;
use polyglot_sql_rewriter::{
    create_inline_view_query, make_select_unique, rewrite, AggregateFunction, Command,
    Criteria, DataType, ElementSymbol, Error, Expression, GroupSymbol, Insert, Query,
    RewriterConfig, Select, SelectSymbol,
};

fn x() -> Expression {
    col("t2", "x", DataType::Long)
}

fn exists(command: Command) -> Criteria {
    Criteria::Exists(Box::new(ExistsCriteria {
        command,
        planned: false,
    }))
}

// ============================================================================
// Clause Simplification
// ============================================================================

mod clauses {
    use super::*;

    #[test]
    fn test_where_removed_for_non_null_column() {
        let query = select([func("+", vec![a(), int(1)]).unwrap()])
            .from("t")
            .where_(Criteria::and(vec![eq(int(1), int(1)), like(nn(), "%")]))
            .build();
        assert_eq!(rewrite_query(query).unwrap().to_string(), "SELECT (t.a + 1) FROM t");
    }

    #[test]
    fn test_where_kept_for_nullable_column() {
        let query = select([func("+", vec![a(), int(1)]).unwrap()])
            .from("t")
            .where_(Criteria::and(vec![eq(int(1), int(1)), like(b(), "%")]))
            .build();
        assert_eq!(
            rewrite_query(query).unwrap().to_string(),
            "SELECT (t.a + 1) FROM t WHERE t.b IS NOT NULL"
        );
    }

    #[test]
    fn test_false_where_kept() {
        let query = select([a()]).from("t").where_(eq(int(1), int(0))).build();
        assert_eq!(
            rewrite_query(query).unwrap().to_string(),
            "SELECT t.a FROM t WHERE FALSE"
        );
    }

    #[test]
    fn test_true_having_kept() {
        let query = select([a(), count_star()])
            .from("t")
            .group_by([a()])
            .having(eq(int(1), int(1)))
            .build();
        assert_eq!(
            rewrite_query(query).unwrap().to_string(),
            "SELECT t.a, COUNT(*) FROM t GROUP BY t.a HAVING TRUE"
        );
    }

    #[test]
    fn test_rewritten_column_keeps_its_name() {
        let query = select([convert(b(), DataType::String).unwrap()])
            .alias("b")
            .from("t")
            .build();
        assert_eq!(rewrite_query(query).unwrap().to_string(), "SELECT t.b AS b FROM t");
    }
}

// ============================================================================
// Subqueries
// ============================================================================

mod subqueries {
    use super::*;

    fn nested() -> Command {
        select([x()])
            .from("t2")
            .where_(eq(int(1), int(1)))
            .order_by(x(), true)
            .build()
    }

    #[test]
    fn test_exists_subquery_rewritten() {
        let query = select([a()]).from("t").where_(exists(nested())).build();
        assert_eq!(
            rewrite_query(query).unwrap().to_string(),
            "SELECT t.a FROM t WHERE EXISTS (SELECT t2.x FROM t2)"
        );
    }

    #[test]
    fn test_subcommands_left_alone_when_disabled() {
        let query = select([a()]).from("t").where_(exists(nested())).build();
        let config = RewriterConfig::new().with_rewrite_subcommands(false);
        let rewritten = rewrite(query, &metadata(), config).unwrap();
        assert_eq!(
            rewritten.to_string(),
            "SELECT t.a FROM t WHERE EXISTS (SELECT t2.x FROM t2 WHERE 1 = 1 ORDER BY t2.x)"
        );
    }
}

// ============================================================================
// Shape Normalization
// ============================================================================

mod shape {
    use super::*;

    #[test]
    fn test_group_by_expression_with_having() {
        let upper = func("upper", vec![b()]).unwrap();
        let query = select([upper.clone(), aggregate(AggregateFunction::Sum, a())])
            .from("t")
            .group_by([upper])
            .having(gt(aggregate(AggregateFunction::Max, a()), int(3)))
            .build();
        assert_eq!(
            rewrite_query(query).unwrap().to_string(),
            "SELECT X_1.EXPR0, SUM(X_1.a) FROM (SELECT ucase(t.b) AS EXPR0, t.a FROM t) AS X_1 \
             GROUP BY X_1.EXPR0 HAVING MAX(X_1.a) > 3"
        );
    }

    #[test]
    fn test_select_into_matching_types() {
        let query = select([x(), col("t2", "b", DataType::String)])
            .from("t2")
            .into_group("t2")
            .build();
        assert_eq!(
            rewrite_query(query).unwrap().to_string(),
            "INSERT INTO t2 (x, b) SELECT t2.x, t2.b FROM t2"
        );
    }

    #[test]
    fn test_select_into_unknown_group() {
        let query = select([a()]).from("t").into_group("nope").build();
        assert!(matches!(rewrite_query(query), Err(Error::Validation(_))));
    }

    #[test]
    fn test_insert_query_types_corrected() {
        let insert = Command::Insert(Box::new(Insert {
            group: GroupSymbol::new("t2"),
            variables: vec![ElementSymbol::new(Some("t2"), "x", DataType::Long)],
            values: Vec::new(),
            query: Some(select([a()]).from("t").order_by(a(), true).build()),
            temp_metadata: Default::default(),
        }));
        assert_eq!(
            rewrite_query(insert).unwrap().to_string(),
            "INSERT INTO t2 (x) SELECT convert(t2_1.a, long) AS x FROM (SELECT t.a FROM t) AS t2_1"
        );
    }
}

// ============================================================================
// Inline Views
// ============================================================================

mod inline_views {
    use super::*;

    #[test]
    fn test_inline_view_registers_columns() {
        let nested = select([a(), int(1)]).from("t").build();
        let actual = vec![
            SelectSymbol::new(col("v", "a", DataType::Integer)),
            SelectSymbol::new(col("v", "one", DataType::Integer)),
        ];
        let view: Query = create_inline_view_query("v", nested, &metadata(), &actual).unwrap();
        assert_eq!(
            view.to_string(),
            "SELECT v_1.a, v_1.expr AS one FROM (SELECT t.a, 1 AS expr FROM t) AS v_1"
        );
        let columns = view.temp_metadata.get("v_1").unwrap();
        assert!(columns[0].nullable);
        assert!(!columns[1].nullable);
    }

    #[test]
    fn test_make_select_unique_case_insensitive() {
        let mut select = Select::new(vec![
            SelectSymbol::new(b()),
            SelectSymbol::new(col("t2", "B", DataType::String)),
            SelectSymbol::new(col("u", "b_0", DataType::String)),
        ]);
        make_select_unique(&mut select, false);
        let names: Vec<&str> = select.symbols.iter().map(SelectSymbol::name).collect();
        assert_eq!(names, vec!["b", "B_0", "b_0_0"]);
    }
}

// ============================================================================
// Data Modification
// ============================================================================

mod dml {
    use super::*;

    #[test]
    fn test_update_criteria_simplified() {
        let command = update_a(
            func("+", vec![int(2), int(2)]).unwrap(),
            Some(eq(func("+", vec![a(), int(1)]).unwrap(), int(5))),
        );
        assert_eq!(
            rewrite_query(command).unwrap().to_string(),
            "UPDATE t SET a = 4 WHERE t.a = 4"
        );
    }

    #[test]
    fn test_update_true_criteria_kept() {
        let command = update_a(int(1), Some(eq(int(1), int(1))));
        assert_eq!(
            rewrite_query(command).unwrap().to_string(),
            "UPDATE t SET a = 1 WHERE TRUE"
        );
    }
}
