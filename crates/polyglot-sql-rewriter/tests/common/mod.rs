//! Shared fixtures for the rewriter integration tests
#![allow(dead_code)]

use polyglot_sql_rewriter::builder::*;
use polyglot_sql_rewriter::{
    Command, Criteria, DataType, ElementSymbol, Expression, GroupSymbol, MappingMetadata,
    Result, RewriterConfig, SetClause, Update,
};

/// Metadata with `t(a integer, b string, nn string, d date, tm time, ts timestamp)`,
/// `t2(x long, b string)` and the view `v(a integer, b string)`
pub fn metadata() -> MappingMetadata {
    MappingMetadata::new()
        .group(
            "t",
            &[
                ("a", DataType::Integer),
                ("b", DataType::String),
                ("nn", DataType::String),
                ("d", DataType::Date),
                ("tm", DataType::Time),
                ("ts", DataType::Timestamp),
            ],
        )
        .group("t2", &[("x", DataType::Long), ("b", DataType::String)])
        .group("v", &[("a", DataType::Integer), ("b", DataType::String)])
}

pub fn a() -> Expression {
    col("t", "a", DataType::Integer)
}

/// Nullable string column
pub fn b() -> Expression {
    col("t", "b", DataType::String)
}

/// String column declared NOT NULL
pub fn nn() -> Expression {
    ElementSymbol::new(Some("t"), "nn", DataType::String)
        .not_null()
        .into()
}

pub fn d() -> Expression {
    col("t", "d", DataType::Date)
}

pub fn tm() -> Expression {
    col("t", "tm", DataType::Time)
}

pub fn rewrite_query(command: Command) -> Result<Command> {
    polyglot_sql_rewriter::rewrite(command, &metadata(), RewriterConfig::default())
}

pub fn rewrite_crit(criteria: Criteria) -> Result<Criteria> {
    polyglot_sql_rewriter::rewrite_criteria(criteria, &metadata(), RewriterConfig::default())
}

pub fn rewrite_expr(expression: Expression) -> Result<Expression> {
    polyglot_sql_rewriter::rewrite_expression(expression, &metadata(), RewriterConfig::default())
}

/// Rewrite a criteria and render it
pub fn crit_sql(criteria: Criteria) -> String {
    rewrite_crit(criteria).unwrap().to_string()
}

/// `UPDATE t SET a = <value> WHERE <criteria>`
pub fn update_a(value: Expression, criteria: Option<Criteria>) -> Command {
    Command::Update(Box::new(Update {
        group: GroupSymbol::new("t"),
        changes: vec![SetClause {
            symbol: ElementSymbol::new(Some("t"), "a", DataType::Integer),
            value,
        }],
        criteria,
        implicit_parameters: Vec::new(),
        temp_metadata: Default::default(),
    }))
}
