//! Query shape normalization
//!
//! Clause-by-clause rewriting of queries, set operations and DML, plus the structural
//! rewrites that need an inline view: GROUP BY over expressions, ORDER BY over
//! unprojected expressions and SELECT INTO.

use log::debug;

use super::inline_view::{create_inline_view_query, make_select_unique};
use super::QueryRewriter;
use crate::builder::convert_in;
use crate::commands::{
    Command, CommandType, Delete, FromClause, GroupBy, Insert, JoinPredicate, JoinType, Limit,
    OrderBy, ParameterDirection, Query, Select, SetQuery, StoredProcedure, Update,
};
use crate::criteria::{Criteria, LogicalOp};
use crate::error::{Error, Result};
use crate::expressions::{Expression, SelectSymbol, CHANGING, INPUT, INPUTS};
use crate::metadata::Metadata;
use crate::traversal::{
    aggregates_in_criteria, aggregates_in_expression, elements_in_expression,
    is_fully_evaluatable, map_criteria, map_expression,
};
use crate::types::DataType;

/// Group-by wrapping maps original expressions to inline view columns
type ExpressionMap = Vec<(Expression, Expression)>;

fn lookup(map: &ExpressionMap, expr: &Expression) -> Option<Expression> {
    map.iter()
        .find(|(original, _)| original == expr)
        .map(|(_, replacement)| replacement.clone())
}

fn remap(expr: Expression, map: &ExpressionMap) -> Result<Expression> {
    map_expression(expr, &mut |e: &Expression| Ok(lookup(map, e)))
}

/// Replace a select symbol's expression, keeping the output name of a named column
fn rename_preserving<F>(symbol: SelectSymbol, f: F) -> Result<SelectSymbol>
where
    F: FnOnce(Expression) -> Result<Expression>,
{
    let named = !symbol.is_expression_symbol();
    let original = symbol.name().to_string();
    let mut symbol = SelectSymbol {
        expression: f(symbol.expression)?,
        alias: symbol.alias,
    };
    if named && symbol.alias.is_none() && symbol.name() != original {
        symbol.alias = Some(original);
    }
    Ok(symbol)
}

impl QueryRewriter<'_> {
    pub(super) fn rewrite_query(&mut self, mut query: Query) -> Result<Command> {
        match query.from.as_mut() {
            Some(from) => {
                from.clauses = std::mem::take(&mut from.clauses)
                    .into_iter()
                    .map(|clause| self.rewrite_from_clause(clause))
                    .collect::<Result<_>>()?;
            }
            None => query.order_by = None,
        }

        if let Some(criteria) = query.criteria.take() {
            query.criteria = match self.rewrite_criteria(criteria)? {
                Criteria::True => None,
                rewritten => Some(rewritten),
            };
        }

        let mut query = self.rewrite_group_by(query)?;

        if let Some(having) = query.having.take() {
            query.having = Some(self.rewrite_criteria(having)?);
        }

        query.select.symbols = std::mem::take(&mut query.select.symbols)
            .into_iter()
            .map(|symbol| rename_preserving(symbol, |expr| self.rewrite_expression(expr)))
            .collect::<Result<_>>()?;

        let mut command = self.rewrite_order_by(Command::Query(Box::new(query)))?;
        self.rewrite_limit(&mut command)?;

        match command {
            Command::Query(query) if query.into.is_some() => self.rewrite_select_into(*query),
            other => Ok(other),
        }
    }

    /// Move GROUP BY expressions into an inline view so the outer query groups by columns
    fn rewrite_group_by(&mut self, mut query: Query) -> Result<Query> {
        let has_expression = query
            .group_by
            .as_ref()
            .is_some_and(|g| g.expressions.iter().any(|e| e.as_element().is_none()));
        if !has_expression {
            return Ok(query);
        }

        let group_by = query.group_by.take().map(|g| g.expressions).unwrap_or_default();
        let having = query.having.take();
        let order_by = query.order_by.take();
        let limit = query.limit.take();
        let into = query.into.take();
        let select = std::mem::take(&mut query.select);

        let mut columns: Vec<Expression> = Vec::new();
        let mut add_column = |expr: &Expression| {
            if !columns.contains(expr) {
                columns.push(expr.clone());
            }
        };
        group_by.iter().for_each(&mut add_column);
        let mut aggregates: Vec<_> = select
            .symbols
            .iter()
            .flat_map(|s| aggregates_in_expression(&s.expression))
            .collect();
        if let Some(having) = &having {
            aggregates.extend(aggregates_in_criteria(having));
        }
        for aggregate in aggregates {
            if let Some(arg) = &aggregate.expression {
                add_column(arg);
            }
        }

        let mut inner_symbols = Vec::with_capacity(columns.len());
        let mut index = 0;
        for column in &columns {
            let rewritten = self.rewrite_expression(column.clone())?;
            inner_symbols.push(match column {
                Expression::Element(_) => SelectSymbol::new(rewritten),
                _ => {
                    let symbol = SelectSymbol::aliased(rewritten, format!("EXPR{index}"));
                    index += 1;
                    symbol
                }
            });
        }
        query.select = Select::new(inner_symbols);
        let actual = query.select.symbols.clone();

        let mut outer = create_inline_view_query(
            "X",
            Command::Query(Box::new(query)),
            &self.metadata,
            &actual,
        )?;
        let map: ExpressionMap = columns
            .into_iter()
            .zip(outer.select.symbols.iter().map(|s| s.expression.clone()))
            .collect();
        debug!("moved {} GROUP BY column(s) into an inline view", map.len());

        outer.group_by = Some(GroupBy {
            expressions: group_by
                .into_iter()
                .map(|e| remap(e, &map))
                .collect::<Result<_>>()?,
        });
        outer.having = having
            .map(|h| map_criteria(h, &mut |e: &Expression| Ok(lookup(&map, e))))
            .transpose()?;
        outer.order_by = order_by
            .map(|mut order_by| {
                for item in &mut order_by.items {
                    let expr = std::mem::replace(
                        &mut item.symbol.expression,
                        Expression::null(DataType::Null),
                    );
                    item.symbol.expression = remap(expr, &map)?;
                }
                Ok::<_, Error>(order_by)
            })
            .transpose()?;
        outer.limit = limit;
        outer.into = into;
        outer.select = Select {
            symbols: select
                .symbols
                .into_iter()
                .map(|symbol| rename_preserving(symbol, |e| remap(e, &map)))
                .collect::<Result<_>>()?,
            distinct: select.distinct,
        };
        Ok(outer)
    }

    /// Drop redundant ORDER BY terms and wrap queries ordered by unprojected expressions.
    ///
    /// Terms repeating an already ordered projection, or ordering a query by a constant,
    /// are removed. When an unrelated term is an expression, the query projects it as an
    /// extra column inside an inline view and the outer query orders by that column.
    pub(crate) fn rewrite_order_by(&mut self, mut command: Command) -> Result<Command> {
        let is_query = matches!(command, Command::Query(_));
        let order_by = match &mut command {
            Command::Query(q) => q.order_by.take(),
            Command::SetQuery(s) => s.order_by.take(),
            _ => None,
        };
        let Some(order_by) = order_by else {
            return Ok(command);
        };

        let projected = command.projected_symbols();
        let mut ordered: Vec<&Expression> = Vec::new();
        let mut has_unrelated_expression = false;
        let mut items = Vec::with_capacity(order_by.items.len());
        for mut item in order_by.items {
            let Some(position) = item.position else {
                has_unrelated_expression |= item.symbol.expression.as_element().is_none();
                items.push(item);
                continue;
            };
            let symbol = projected.get(position).ok_or_else(|| {
                Error::component(format!("ORDER BY refers to missing column {}", position + 1))
            })?;
            let expr = &symbol.expression;
            if ordered.contains(&expr) || (is_query && is_fully_evaluatable(expr, true)) {
                continue;
            }
            ordered.push(expr);
            item.symbol = symbol.clone();
            items.push(item);
        }

        if items.is_empty() {
            return Ok(command);
        }
        let order_by = OrderBy { items };
        match command {
            Command::Query(query) if has_unrelated_expression => {
                self.wrap_unrelated_order_by(*query, order_by)
            }
            Command::Query(mut query) => {
                query.order_by = Some(order_by);
                Ok(Command::Query(query))
            }
            Command::SetQuery(mut set_query) => {
                set_query.order_by = Some(order_by);
                Ok(Command::SetQuery(set_query))
            }
            other => Ok(other),
        }
    }

    fn wrap_unrelated_order_by(&mut self, mut query: Query, mut order_by: OrderBy) -> Result<Command> {
        let original_count = query.select.symbols.len();
        query.select.symbols.extend(
            order_by
                .items
                .iter()
                .filter(|item| item.position.is_none())
                .map(|item| item.symbol.clone()),
        );
        make_select_unique(&mut query.select, false);

        let into = query.into.take();
        let limit = query.limit.take();
        let actual = query.select.symbols.clone();
        let mut top = create_inline_view_query(
            "X",
            Command::Query(Box::new(query)),
            &self.metadata,
            &actual,
        )?;

        let mut next_unrelated = original_count;
        for item in &mut order_by.items {
            let position = match item.position {
                Some(position) => position,
                None => {
                    next_unrelated += 1;
                    next_unrelated - 1
                }
            };
            item.symbol = top.select.symbols.get(position).cloned().ok_or_else(|| {
                Error::component(format!("inline view has no column {}", position + 1))
            })?;
        }
        debug!(
            "wrapped query in an inline view for {} unrelated ORDER BY term(s)",
            next_unrelated - original_count
        );

        top.select.symbols.truncate(original_count);
        top.into = into;
        top.limit = limit;
        top.order_by = Some(order_by);
        Ok(Command::Query(Box::new(top)))
    }

    fn rewrite_limit(&mut self, command: &mut Command) -> Result<()> {
        let slot = match command {
            Command::Query(q) => &mut q.limit,
            Command::SetQuery(s) => &mut s.limit,
            _ => return Ok(()),
        };
        if let Some(limit) = slot.take() {
            *slot = Some(Limit {
                offset: limit.offset.map(|e| self.rewrite_expression(e)).transpose()?,
                row_limit: limit.row_limit.map(|e| self.rewrite_expression(e)).transpose()?,
            });
        }
        Ok(())
    }

    /// `SELECT ... INTO g` becomes `INSERT INTO g (all columns) SELECT ...`
    fn rewrite_select_into(&mut self, mut query: Query) -> Result<Command> {
        let Some(into) = query.into.take() else {
            return Ok(Command::Query(Box::new(query)));
        };
        let variables = self
            .metadata
            .elements_in_group(into.group.metadata_name())
            .map_err(|e| Error::validation(format!("invalid INTO target {}: {e}", into.group)))?;
        debug!("converting SELECT INTO {} to INSERT", into.group);

        let insert = Insert {
            group: into.group,
            variables,
            values: Vec::new(),
            query: Some(Command::Query(Box::new(query))),
            temp_metadata: Default::default(),
        };
        self.correct_datatypes(insert)
            .map(|insert| Command::Insert(Box::new(insert)))
    }

    /// Wrap an INSERT source whose column types differ from the target columns
    fn correct_datatypes(&mut self, mut insert: Insert) -> Result<Insert> {
        let Some(source) = insert.query.take() else {
            return Ok(insert);
        };
        let projected = source.projected_symbols();
        let needs_view = insert
            .variables
            .iter()
            .zip(&projected)
            .any(|(variable, symbol)| variable.data_type != symbol.data_type());

        insert.query = Some(if needs_view {
            let actual: Vec<SelectSymbol> = insert
                .variables
                .iter()
                .map(|v| SelectSymbol::new(v.clone().into()))
                .collect();
            let view = create_inline_view_query(&insert.group.name, source, &self.metadata, &actual)?;
            Command::Query(Box::new(view))
        } else {
            source
        });
        Ok(insert)
    }

    /// Convert the columns of a set operation branch to the operation's column types
    fn correct_projected_types(&self, types: &[DataType], query: &mut Query) -> Result<()> {
        let library = self.metadata.function_library();
        for (symbol, &target) in query.select.symbols.iter_mut().zip(types) {
            if symbol.data_type() == target {
                continue;
            }
            let name = symbol.name().to_string();
            let expr = std::mem::replace(&mut symbol.expression, Expression::null(DataType::Null));
            let expr = if expr.is_null_constant() {
                Expression::null(target)
            } else {
                convert_in(library, expr, target)?
            };
            *symbol = SelectSymbol::aliased(expr, name);
        }
        Ok(())
    }

    pub(super) fn rewrite_set_query(&mut self, mut set_query: SetQuery) -> Result<Command> {
        if let Some(types) = set_query.projected_types.take() {
            for branch in [&mut set_query.left, &mut set_query.right] {
                if let Command::Query(query) = branch {
                    self.correct_projected_types(&types, query)?;
                }
            }
        }

        set_query.left = self.rewrite_command(set_query.left, true)?;
        set_query.right = self.rewrite_command(set_query.right, true)?;

        let mut command = self.rewrite_order_by(Command::SetQuery(Box::new(set_query)))?;
        self.rewrite_limit(&mut command)?;
        Ok(command)
    }

    fn rewrite_from_clause(&mut self, clause: FromClause) -> Result<FromClause> {
        match clause {
            FromClause::Join(join) => self.rewrite_join(*join),
            FromClause::Subquery(mut subquery) => {
                subquery.command = self.rewrite_subcommand(subquery.command, subquery.planned, true)?;
                Ok(FromClause::Subquery(subquery))
            }
            group @ FromClause::Group(_) => Ok(group),
        }
    }

    fn rewrite_join(&mut self, mut join: JoinPredicate) -> Result<FromClause> {
        if !join.criteria.is_empty() {
            let criteria = Criteria::and(std::mem::take(&mut join.criteria));
            join.criteria = match self.rewrite_criteria(criteria)? {
                Criteria::Compound(compound) if compound.op == LogicalOp::And => compound.criteria,
                other => vec![other],
            };
        }

        match join.join_type {
            JoinType::Union => {
                debug!("rewriting UNION JOIN as FULL OUTER JOIN ON FALSE");
                join.join_type = JoinType::FullOuter;
                join.criteria = vec![Criteria::False];
            }
            JoinType::RightOuter => {
                join.join_type = JoinType::LeftOuter;
                std::mem::swap(&mut join.left, &mut join.right);
            }
            _ => {}
        }

        join.left = self.rewrite_from_clause(join.left)?;
        join.right = self.rewrite_from_clause(join.right)?;
        Ok(FromClause::Join(Box::new(join)))
    }

    pub(super) fn rewrite_exec(&mut self, mut procedure: StoredProcedure) -> Result<Command> {
        procedure.display_named_parameters = false;
        for parameter in &mut procedure.parameters {
            if !matches!(parameter.direction, ParameterDirection::In | ParameterDirection::InOut) {
                continue;
            }
            if let Some(expr) = parameter.expression.take() {
                parameter.expression = Some(self.rewrite_expression(expr)?);
            }
        }
        Ok(Command::StoredProcedure(Box::new(procedure)))
    }

    pub(super) fn rewrite_insert(&mut self, mut insert: Insert) -> Result<Command> {
        if let Some(source) = insert.query.take() {
            insert.query = Some(self.rewrite_command(source, true)?);
            return self
                .correct_datatypes(insert)
                .map(|insert| Command::Insert(Box::new(insert)));
        }
        insert.values = std::mem::take(&mut insert.values)
            .into_iter()
            .map(|value| self.rewrite_expression(value))
            .collect::<Result<_>>()?;
        Ok(Command::Insert(Box::new(insert)))
    }

    pub(super) fn rewrite_update(&mut self, mut update: Update) -> Result<Command> {
        if self.command_type == CommandType::Update && self.variables.is_some() {
            let mut kept = Vec::with_capacity(update.changes.len());
            for change in update.changes {
                if self.check_input_variables(&change.value)? {
                    kept.push(change);
                } else {
                    debug!("dropping unchanged SET clause for {}", change.symbol.name);
                }
            }
            update.changes = kept;
        }

        for change in &mut update.changes {
            let value = std::mem::replace(&mut change.value, Expression::null(DataType::Null));
            change.value = self.rewrite_expression(value)?;
        }
        if let Some(criteria) = update.criteria.take() {
            update.criteria = Some(self.rewrite_criteria(criteria)?);
        }
        Ok(Command::Update(Box::new(update)))
    }

    /// Whether a SET value built from INPUT variables should be kept.
    ///
    /// Every INPUT variable in the value must agree on its CHANGING flag; the value is kept
    /// when they are all changing or when it uses no INPUT variable at all.
    fn check_input_variables(&self, value: &Expression) -> Result<bool> {
        let Some(variables) = &self.variables else {
            return Ok(true);
        };
        let mut changing = None;
        for variable in elements_in_expression(value) {
            if !variable.external || !(variable.is_in_group(INPUT) || variable.is_in_group(INPUTS)) {
                continue;
            }
            let key = format!("{CHANGING}.{}", variable.short_canonical_name());
            let state = variables
                .get(&key)
                .and_then(Expression::as_constant)
                .and_then(|c| c.value.as_bool())
                .ok_or_else(|| Error::component(format!("no CHANGING value bound for {key}")))?;
            match changing {
                None => changing = Some(state),
                Some(previous) if previous != state => {
                    return Err(Error::validation(format!(
                        "INPUT variables in {value} must all have the same CHANGING state"
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(changing.unwrap_or(true))
    }

    pub(super) fn rewrite_delete(&mut self, mut delete: Delete) -> Result<Command> {
        if let Some(criteria) = delete.criteria.take() {
            delete.criteria = Some(self.rewrite_criteria(criteria)?);
        }
        Ok(Command::Delete(Box::new(delete)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;
    use crate::commands::{GroupSymbol, SetClause, SetOperation, SpParameter, SubqueryFromClause};
    use crate::context::VariableBindings;
    use crate::expressions::{AggregateFunction, ElementSymbol};
    use crate::metadata::MappingMetadata;
    use crate::rewriter::RewriterConfig;

    fn metadata() -> MappingMetadata {
        MappingMetadata::new()
            .group("t", &[("a", DataType::Integer), ("b", DataType::String)])
            .group("u", &[("a", DataType::Integer)])
            .group("t2", &[("x", DataType::Long), ("y", DataType::String)])
            .group("t3", &[("x", DataType::Integer), ("y", DataType::String)])
    }

    fn a() -> Expression {
        col("t", "a", DataType::Integer)
    }

    fn b() -> Expression {
        col("t", "b", DataType::String)
    }

    fn rewrite(command: Command) -> Result<Command> {
        let md = metadata();
        QueryRewriter::new(&md, RewriterConfig::default()).rewrite_command(command, false)
    }

    fn rewrite_sql(command: Command) -> String {
        rewrite(command).unwrap().to_string()
    }

    #[test]
    fn test_true_where_is_removed() {
        let query = select([a()]).from("t").where_(eq(int(1), int(1))).build();
        assert_eq!(rewrite_sql(query), "SELECT t.a FROM t");
    }

    #[test]
    fn test_order_by_dropped_without_from() {
        let query = select([int(1)]).order_by(int(1), true).build();
        assert_eq!(rewrite_sql(query), "SELECT 1");
    }

    #[test]
    fn test_order_by_drops_duplicates_and_constants() {
        let query = select([int(1), a()])
            .alias("one")
            .from("t")
            .order_by(a(), true)
            .order_by(a(), false)
            .build();
        assert_eq!(rewrite_sql(query), "SELECT 1, t.a AS one FROM t ORDER BY one");

        let query = select([int(1)]).alias("one").from("t").order_by(int(1), true).build();
        assert_eq!(rewrite_sql(query), "SELECT 1 AS one FROM t");
    }

    #[test]
    fn test_unrelated_order_by_expression_is_wrapped() {
        let plus = func("+", vec![a(), int(1)]).unwrap();
        let query = select([a()]).from("t").order_by(plus, false).limit(3).build();
        assert_eq!(
            rewrite_sql(query),
            "SELECT X_1.a FROM (SELECT t.a, (t.a + 1) AS expr FROM t) AS X_1 ORDER BY X_1.expr DESC LIMIT 3"
        );
    }

    #[test]
    fn test_unrelated_order_by_column_is_kept() {
        let query = select([a()]).from("t").order_by(b(), true).build();
        assert_eq!(rewrite_sql(query), "SELECT t.a FROM t ORDER BY t.b");
    }

    #[test]
    fn test_group_by_expression_uses_inline_view() {
        let plus = func("+", vec![a(), int(1)]).unwrap();
        let query = select([plus.clone(), aggregate(AggregateFunction::Max, b())])
            .from("t")
            .group_by([plus])
            .build();
        assert_eq!(
            rewrite_sql(query),
            "SELECT X_1.EXPR0, MAX(X_1.b) FROM (SELECT (t.a + 1) AS EXPR0, t.b FROM t) AS X_1 GROUP BY X_1.EXPR0"
        );
    }

    #[test]
    fn test_group_by_columns_left_alone() {
        let query = select([a(), count_star()]).from("t").group_by([a()]).build();
        assert_eq!(rewrite_sql(query), "SELECT t.a, COUNT(*) FROM t GROUP BY t.a");
    }

    #[test]
    fn test_select_into_becomes_insert() {
        let query = select([a(), b()]).from("t").into_group("t3").build();
        assert_eq!(rewrite_sql(query), "INSERT INTO t3 (x, y) SELECT t.a, t.b FROM t");

        let query = select([a(), b()]).from("t").into_group("t2").build();
        assert_eq!(
            rewrite_sql(query),
            "INSERT INTO t2 (x, y) SELECT convert(t2_1.a, long) AS x, t2_1.b AS y FROM (SELECT t.a, t.b FROM t) AS t2_1"
        );

        let query = select([a()]).from("t").into_group("missing").build();
        assert!(matches!(rewrite(query), Err(Error::Validation(_))));
    }

    #[test]
    fn test_set_query_corrects_branch_types() {
        let set_query = Command::SetQuery(Box::new(SetQuery {
            operation: SetOperation::Union,
            all: false,
            left: select([a()]).from("t").order_by(a(), true).build(),
            right: select([b()]).from("t").build(),
            order_by: None,
            limit: None,
            projected_types: Some(vec![DataType::String]),
            temp_metadata: Default::default(),
        }));
        assert_eq!(
            rewrite_sql(set_query),
            "SELECT convert(t.a, string) AS a FROM t UNION SELECT t.b FROM t"
        );
    }

    #[test]
    fn test_join_normalization() {
        let join = |join_type, criteria| {
            FromClause::Join(Box::new(JoinPredicate {
                left: FromClause::Group(GroupSymbol::new("t")),
                right: FromClause::Group(GroupSymbol::new("u")),
                join_type,
                criteria,
            }))
        };
        let u_a = col("u", "a", DataType::Integer);

        let query = select([a()])
            .from_clause(join(
                JoinType::RightOuter,
                vec![eq(a(), u_a.clone()), eq(int(1), int(1))],
            ))
            .build();
        assert_eq!(
            rewrite_sql(query),
            "SELECT t.a FROM u LEFT OUTER JOIN t ON t.a = u.a"
        );

        let query = select([a()])
            .from_clause(join(JoinType::Union, vec![]))
            .build();
        assert_eq!(
            rewrite_sql(query),
            "SELECT t.a FROM t FULL OUTER JOIN u ON FALSE"
        );

        let query = select([a()])
            .from_clause(join(
                JoinType::Inner,
                vec![eq(a(), u_a.clone()), gt(u_a, int(2))],
            ))
            .build();
        let Command::Query(query) = rewrite(query).unwrap() else {
            panic!("expected a query");
        };
        let Some(FromClause::Join(join)) = query.from.as_ref().map(|f| f.clauses[0].clone()) else {
            panic!("expected a join");
        };
        assert_eq!(join.criteria.len(), 2);
    }

    #[test]
    fn test_subquery_in_from_drops_order_by() {
        let inner = select([a()]).from("t").order_by(a(), true).build();
        let query = select([col("v", "a", DataType::Integer)])
            .from_clause(FromClause::Subquery(Box::new(SubqueryFromClause {
                name: "v".into(),
                command: inner,
                planned: false,
            })))
            .build();
        assert_eq!(rewrite_sql(query), "SELECT v.a FROM (SELECT t.a FROM t) AS v");
    }

    #[test]
    fn test_exec_rewrites_inputs() {
        let procedure = Command::StoredProcedure(Box::new(StoredProcedure {
            name: "p".into(),
            parameters: vec![
                SpParameter {
                    name: "x".into(),
                    direction: ParameterDirection::In,
                    expression: Some(func("+", vec![int(1), int(2)]).unwrap()),
                    data_type: DataType::Integer,
                },
                SpParameter {
                    name: "r".into(),
                    direction: ParameterDirection::ResultSet,
                    expression: None,
                    data_type: DataType::String,
                },
            ],
            display_named_parameters: true,
            temp_metadata: Default::default(),
        }));
        assert_eq!(rewrite_sql(procedure), "EXEC p(3)");
    }

    #[test]
    fn test_insert_values_folded() {
        let insert = Command::Insert(Box::new(Insert {
            group: GroupSymbol::new("t"),
            variables: vec![ElementSymbol::new(Some("t"), "a", DataType::Integer)],
            values: vec![func("*", vec![int(2), int(3)]).unwrap()],
            query: None,
            temp_metadata: Default::default(),
        }));
        assert_eq!(rewrite_sql(insert), "INSERT INTO t (a) VALUES (6)");
    }

    fn update(changes: Vec<SetClause>) -> Command {
        Command::Update(Box::new(Update {
            group: GroupSymbol::new("t"),
            changes,
            criteria: Some(eq(a(), int(1))),
            implicit_parameters: Vec::new(),
            temp_metadata: Default::default(),
        }))
    }

    fn set(name: &str, data_type: DataType, value: Expression) -> SetClause {
        SetClause {
            symbol: ElementSymbol::new(Some("t"), name, data_type),
            value,
        }
    }

    fn input(name: &str, data_type: DataType) -> Expression {
        ElementSymbol::external("INPUT", name, data_type).into()
    }

    fn rewrite_with_changing(command: Command) -> Result<Command> {
        let md = metadata();
        let mut variables = VariableBindings::new();
        variables.insert("INPUT.A".into(), int(5));
        variables.insert("CHANGING.A".into(), boolean(true));
        variables.insert("CHANGING.B".into(), boolean(false));
        let config = RewriterConfig::new()
            .with_variables(variables)
            .with_command_type(CommandType::Update);
        QueryRewriter::new(&md, config).rewrite_command(command, false)
    }

    #[test]
    fn test_update_keeps_only_changing_inputs() {
        let command = update(vec![
            set("a", DataType::Integer, input("a", DataType::Integer)),
            set("b", DataType::String, input("b", DataType::String)),
            set("c", DataType::String, string("x")),
        ]);
        assert_eq!(
            rewrite_with_changing(command).unwrap().to_string(),
            "UPDATE t SET a = 5, c = 'x' WHERE t.a = 1"
        );
    }

    #[test]
    fn test_update_mixed_changing_states_rejected() {
        let a_text = convert(input("a", DataType::Integer), DataType::String).unwrap();
        let mixed = func("concat", vec![a_text, input("b", DataType::String)]).unwrap();
        let command = update(vec![set("b", DataType::String, mixed)]);
        assert!(matches!(rewrite_with_changing(command), Err(Error::Validation(_))));

        let command = update(vec![set("d", DataType::Integer, input("d", DataType::Integer))]);
        assert!(matches!(rewrite_with_changing(command), Err(Error::Component(_))));
    }

    #[test]
    fn test_delete_keeps_true_criteria() {
        let delete = Command::Delete(Box::new(Delete {
            group: GroupSymbol::new("t"),
            criteria: Some(ge(int(2), int(1))),
            implicit_parameters: Vec::new(),
            temp_metadata: Default::default(),
        }));
        assert_eq!(rewrite_sql(delete), "DELETE FROM t WHERE TRUE");
    }
}
