//! Builders for resolved command trees
//!
//! The rewriter consumes trees that a resolver already typed. These helpers produce
//! such trees directly, which is what tests, benchmarks and the rewriter itself (when
//! it synthesizes new calls) need.
//!
//! - **Leaves** ([`col`], [`int`], [`long`], [`string`], [`boolean`], [`null`], [`constant`])
//! - **Calls** ([`func`], [`func_in`], [`convert`], [`convert_in`], [`conversion`]) resolve their
//!   descriptor and insert implicit conversions for widened arguments
//! - **Predicates** ([`eq`], [`ne`], [`lt`], [`le`], [`gt`], [`ge`], [`like`], [`in_list`],
//!   [`between`], [`is_null`])
//! - **Queries** ([`select`]) return a [`QueryBuilder`]
//!
//! # Examples
//!
//! ```
//! use polyglot_sql_rewriter::builder::*;
//! use polyglot_sql_rewriter::DataType;
//!
//! // SELECT t.a FROM t WHERE t.a = 1
//! let query = select([col("t", "a", DataType::Integer)])
//!     .from("t")
//!     .where_(eq(col("t", "a", DataType::Integer), int(1)))
//!     .build();
//! assert_eq!(query.to_string(), "SELECT t.a FROM t WHERE t.a = 1");
//! ```

use crate::commands::{
    Command, From, FromClause, GroupBy, GroupSymbol, IntoClause, Limit, OrderBy, OrderByItem,
    Query, Select,
};
use crate::criteria::{BetweenCriteria, CompareOp, Criteria, MatchCriteria, SetCriteria};
use crate::error::{Error, Result};
use crate::expressions::{
    AggregateFunction, AggregateSymbol, ElementSymbol, Expression, Function, SelectSymbol,
};
use crate::functions::{FunctionLibrary, BUILTIN_FUNCTIONS};
use crate::types::{DataType, Value};

/// Column `group.name` of type `data_type`
pub fn col(group: &str, name: &str, data_type: DataType) -> Expression {
    ElementSymbol::new(Some(group), name, data_type).into()
}

pub fn constant(value: Value) -> Expression {
    let data_type = value.data_type();
    Expression::constant(value, data_type)
}

pub fn int(value: i32) -> Expression {
    constant(Value::Integer(value))
}

pub fn long(value: i64) -> Expression {
    constant(Value::Long(value))
}

pub fn string(value: &str) -> Expression {
    constant(Value::String(value.to_string()))
}

pub fn boolean(value: bool) -> Expression {
    constant(Value::Boolean(value))
}

/// Typed NULL literal
pub fn null(data_type: DataType) -> Expression {
    Expression::null(data_type)
}

/// The `CONVERT(expr, target)` call node, resolved against `library`
pub fn conversion(library: &FunctionLibrary, expr: Expression, target: DataType) -> Result<Function> {
    let descriptor = library
        .find_function("convert", &[expr.data_type(), DataType::String])
        .cloned()
        .ok_or_else(|| Error::component("function convert is not registered"))?;
    let mut function = Function::new("convert", vec![expr, string(target.name())], descriptor);
    function.data_type = target;
    Ok(function)
}

/// `CONVERT(expr, target)` resolved against `library`
pub fn convert_in(library: &FunctionLibrary, expr: Expression, target: DataType) -> Result<Expression> {
    conversion(library, expr, target).map(Expression::from)
}

/// `CONVERT(expr, target)` resolved against the built-in library
pub fn convert(expr: Expression, target: DataType) -> Result<Expression> {
    convert_in(&BUILTIN_FUNCTIONS, expr, target)
}

/// Resolve `name(args)` against `library`, converting arguments that only match after
/// implicit widening.
pub fn func_in(library: &FunctionLibrary, name: &str, args: Vec<Expression>) -> Result<Expression> {
    let types: Vec<DataType> = args.iter().map(Expression::data_type).collect();
    let descriptor = library.resolve(name, &types).cloned().ok_or_else(|| {
        Error::component(format!("no function {name} accepting {types:?}"))
    })?;
    let args = args
        .into_iter()
        .enumerate()
        .map(|(i, arg)| {
            let param = descriptor
                .arg_types
                .get(i)
                .or(descriptor.arg_types.last())
                .copied()
                .unwrap_or(DataType::Object);
            let ty = arg.data_type();
            if param == ty || param == DataType::Object || ty == DataType::Null {
                Ok(arg)
            } else {
                convert_in(library, arg, param)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Function::new(name, args, descriptor).into())
}

/// Resolve `name(args)` against the built-in library
pub fn func(name: &str, args: Vec<Expression>) -> Result<Expression> {
    func_in(&BUILTIN_FUNCTIONS, name, args)
}

pub fn aggregate(function: AggregateFunction, expression: Expression) -> Expression {
    let data_type = match function {
        AggregateFunction::Count => DataType::Integer,
        AggregateFunction::Avg if expression.data_type().is_integral() => DataType::BigDecimal,
        _ => expression.data_type(),
    };
    Expression::Aggregate(Box::new(AggregateSymbol {
        function,
        expression: Some(expression),
        distinct: false,
        data_type,
    }))
}

pub fn count_star() -> Expression {
    Expression::Aggregate(Box::new(AggregateSymbol {
        function: AggregateFunction::Count,
        expression: None,
        distinct: false,
        data_type: DataType::Integer,
    }))
}

pub fn compare(left: Expression, op: CompareOp, right: Expression) -> Criteria {
    Criteria::compare(left, op, right)
}

pub fn eq(left: Expression, right: Expression) -> Criteria {
    compare(left, CompareOp::Eq, right)
}

pub fn ne(left: Expression, right: Expression) -> Criteria {
    compare(left, CompareOp::Ne, right)
}

pub fn lt(left: Expression, right: Expression) -> Criteria {
    compare(left, CompareOp::Lt, right)
}

pub fn le(left: Expression, right: Expression) -> Criteria {
    compare(left, CompareOp::Le, right)
}

pub fn gt(left: Expression, right: Expression) -> Criteria {
    compare(left, CompareOp::Gt, right)
}

pub fn ge(left: Expression, right: Expression) -> Criteria {
    compare(left, CompareOp::Ge, right)
}

pub fn like(left: Expression, pattern: &str) -> Criteria {
    Criteria::Match(Box::new(MatchCriteria {
        left,
        right: string(pattern),
        escape: None,
        negated: false,
    }))
}

pub fn in_list(expression: Expression, values: Vec<Expression>) -> Criteria {
    Criteria::Set(Box::new(SetCriteria {
        expression,
        values,
        negated: false,
    }))
}

pub fn between(expression: Expression, lower: Expression, upper: Expression) -> Criteria {
    Criteria::Between(Box::new(BetweenCriteria {
        expression,
        lower,
        upper,
        negated: false,
    }))
}

pub fn is_null(expression: Expression) -> Criteria {
    Criteria::is_null(expression, false)
}

/// Start a query projecting `expressions`
pub fn select(expressions: impl IntoIterator<Item = Expression>) -> QueryBuilder {
    QueryBuilder {
        query: Query {
            select: Select::new(expressions.into_iter().map(SelectSymbol::new).collect()),
            ..Query::default()
        },
    }
}

/// Fluent builder for [`Query`]
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Alias the most recently added select symbol
    pub fn alias(mut self, name: &str) -> Self {
        if let Some(symbol) = self.query.select.symbols.last_mut() {
            symbol.alias = Some(name.to_string());
        }
        self
    }

    pub fn distinct(mut self) -> Self {
        self.query.select.distinct = true;
        self
    }

    pub fn from(self, group: &str) -> Self {
        self.from_clause(FromClause::Group(GroupSymbol::new(group)))
    }

    pub fn from_clause(mut self, clause: FromClause) -> Self {
        self.query
            .from
            .get_or_insert_with(From::default)
            .clauses
            .push(clause);
        self
    }

    pub fn where_(mut self, criteria: Criteria) -> Self {
        self.query.criteria = Some(criteria);
        self
    }

    pub fn group_by(mut self, expressions: impl IntoIterator<Item = Expression>) -> Self {
        self.query.group_by = Some(GroupBy {
            expressions: expressions.into_iter().collect(),
        });
        self
    }

    pub fn having(mut self, criteria: Criteria) -> Self {
        self.query.having = Some(criteria);
        self
    }

    /// Order by an expression; items matching a projected expression refer to its position
    pub fn order_by(mut self, expression: Expression, ascending: bool) -> Self {
        let position = self
            .query
            .select
            .symbols
            .iter()
            .position(|s| s.expression == expression);
        let symbol = match position {
            Some(i) => self.query.select.symbols[i].clone(),
            None => SelectSymbol::new(expression),
        };
        self.query
            .order_by
            .get_or_insert_with(|| OrderBy { items: Vec::new() })
            .items
            .push(OrderByItem::new(symbol, ascending, position));
        self
    }

    pub fn limit(mut self, row_limit: i32) -> Self {
        self.query.limit = Some(Limit {
            offset: None,
            row_limit: Some(int(row_limit)),
        });
        self
    }

    pub fn into_group(mut self, group: &str) -> Self {
        self.query.into = Some(IntoClause {
            group: GroupSymbol::new(group),
        });
        self
    }

    pub fn build_query(self) -> Query {
        self.query
    }

    pub fn build(self) -> Command {
        Command::Query(Box::new(self.query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_func_inserts_implicit_conversion() {
        let expr = func("+", vec![col("t", "a", DataType::Integer), long(1)]).unwrap();
        assert_eq!(expr.data_type(), DataType::Long);
        assert_eq!(expr.to_string(), "(convert(t.a, long) + 1)");
        assert!(func("nosuch", vec![]).is_err());
    }

    #[test]
    fn test_query_builder() {
        let a = col("t", "a", DataType::Integer);
        let query = select([a.clone()])
            .from("t")
            .order_by(a, false)
            .limit(5)
            .build();
        assert_eq!(query.to_string(), "SELECT t.a FROM t ORDER BY t.a DESC LIMIT 5");
        assert_eq!(query.order_by().unwrap().items[0].position, Some(0));
    }
}
