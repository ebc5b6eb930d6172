//! Command AST: queries, set operations, DML, procedure calls and update procedures.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::criteria::Criteria;
use crate::expressions::{ElementSymbol, Expression, SelectSymbol};
use crate::metadata::TempMetadataStore;
use crate::procedure::Block;
use crate::types::DataType;

/// A table, view or inline view reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSymbol {
    /// Name the group is referenced by (alias or table name)
    pub name: String,
    /// Underlying table name when `name` is an alias
    pub definition: Option<String>,
}

impl GroupSymbol {
    pub fn new(name: impl Into<String>) -> Self {
        GroupSymbol {
            name: name.into(),
            definition: None,
        }
    }

    pub fn aliased(definition: impl Into<String>, name: impl Into<String>) -> Self {
        GroupSymbol {
            name: name.into(),
            definition: Some(definition.into()),
        }
    }

    /// Name used for metadata lookups
    pub fn metadata_name(&self) -> &str {
        self.definition.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Display for GroupSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.definition {
            Some(definition) => write!(f, "{} AS {}", definition, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    Cross,
    LeftOuter,
    RightOuter,
    FullOuter,
    /// Full outer join that never matches: every row of both sides, padded with NULLs
    Union,
}

impl JoinType {
    pub fn sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Cross => "CROSS JOIN",
            JoinType::LeftOuter => "LEFT OUTER JOIN",
            JoinType::RightOuter => "RIGHT OUTER JOIN",
            JoinType::FullOuter => "FULL OUTER JOIN",
            JoinType::Union => "UNION JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPredicate {
    pub left: FromClause,
    pub right: FromClause,
    pub join_type: JoinType,
    /// Conjuncts of the ON clause
    #[serde(default)]
    pub criteria: Vec<Criteria>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubqueryFromClause {
    pub name: String,
    pub command: Command,
    #[serde(default)]
    pub planned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FromClause {
    Group(GroupSymbol),
    Join(Box<JoinPredicate>),
    Subquery(Box<SubqueryFromClause>),
}

impl fmt::Display for FromClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromClause::Group(group) => write!(f, "{group}"),
            FromClause::Join(join) => {
                write!(f, "{} {} ", join.left, join.join_type.sql())?;
                match &join.right {
                    FromClause::Join(_) => write!(f, "({})", join.right)?,
                    other => write!(f, "{other}")?,
                }
                if !join.criteria.is_empty() {
                    f.write_str(" ON ")?;
                    for (i, crit) in join.criteria.iter().enumerate() {
                        if i > 0 {
                            f.write_str(" AND ")?;
                        }
                        write!(f, "{crit}")?;
                    }
                }
                Ok(())
            }
            FromClause::Subquery(sub) => write!(f, "({}) AS {}", sub.command, sub.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Select {
    pub symbols: Vec<SelectSymbol>,
    #[serde(default)]
    pub distinct: bool,
}

impl Select {
    pub fn new(symbols: Vec<SelectSymbol>) -> Self {
        Select {
            symbols,
            distinct: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBy {
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub symbol: SelectSymbol,
    pub ascending: bool,
    /// Index of the projected column this item refers to, `None` when unrelated
    pub position: Option<usize>,
}

impl OrderByItem {
    pub fn new(symbol: SelectSymbol, ascending: bool, position: Option<usize>) -> Self {
        OrderByItem {
            symbol,
            ascending,
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub items: Vec<OrderByItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    pub offset: Option<Expression>,
    pub row_limit: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntoClause {
    pub group: GroupSymbol,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct From {
    pub clauses: Vec<FromClause>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    pub select: Select,
    pub from: Option<From>,
    pub criteria: Option<Criteria>,
    pub group_by: Option<GroupBy>,
    pub having: Option<Criteria>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Limit>,
    pub into: Option<IntoClause>,
    #[serde(default)]
    pub temp_metadata: TempMetadataStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOperation {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetQuery {
    pub operation: SetOperation,
    #[serde(default)]
    pub all: bool,
    pub left: Command,
    pub right: Command,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Limit>,
    /// Column types the branches must be coerced to, pending correction
    pub projected_types: Option<Vec<DataType>>,
    #[serde(default)]
    pub temp_metadata: TempMetadataStore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub group: GroupSymbol,
    pub variables: Vec<ElementSymbol>,
    #[serde(default)]
    pub values: Vec<Expression>,
    /// `INSERT ... SELECT` source
    pub query: Option<Command>,
    #[serde(default)]
    pub temp_metadata: TempMetadataStore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetClause {
    pub symbol: ElementSymbol,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub group: GroupSymbol,
    pub changes: Vec<SetClause>,
    pub criteria: Option<Criteria>,
    /// Values bound by TRANSLATE CRITERIA in the handling update procedure
    #[serde(default)]
    pub implicit_parameters: Vec<(String, Expression)>,
    #[serde(default)]
    pub temp_metadata: TempMetadataStore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub group: GroupSymbol,
    pub criteria: Option<Criteria>,
    #[serde(default)]
    pub implicit_parameters: Vec<(String, Expression)>,
    #[serde(default)]
    pub temp_metadata: TempMetadataStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterDirection {
    In,
    InOut,
    Out,
    Return,
    ResultSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpParameter {
    pub name: String,
    pub direction: ParameterDirection,
    pub expression: Option<Expression>,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProcedure {
    pub name: String,
    pub parameters: Vec<SpParameter>,
    #[serde(default)]
    pub display_named_parameters: bool,
    #[serde(default)]
    pub temp_metadata: TempMetadataStore,
}

/// A virtual update procedure handling one user INSERT/UPDATE/DELETE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateProcedure {
    pub block: Block,
    /// The user command the procedure handles
    pub user_command: Option<Command>,
    /// View column to definition expression, used by TRANSLATE CRITERIA
    #[serde(default)]
    pub symbol_map: Vec<(ElementSymbol, Expression)>,
    #[serde(default)]
    pub temp_metadata: TempMetadataStore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchedUpdate {
    pub commands: Vec<Command>,
}

/// Kind of a command, as passed alongside variable bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    #[default]
    Unknown,
    Query,
    Insert,
    Update,
    Delete,
    StoredProcedure,
    UpdateProcedure,
    BatchedUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Query(Box<Query>),
    SetQuery(Box<SetQuery>),
    Insert(Box<Insert>),
    Update(Box<Update>),
    Delete(Box<Delete>),
    StoredProcedure(Box<StoredProcedure>),
    UpdateProcedure(Box<UpdateProcedure>),
    BatchedUpdate(Box<BatchedUpdate>),
}

impl Command {
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Query(_) | Command::SetQuery(_) => CommandType::Query,
            Command::Insert(_) => CommandType::Insert,
            Command::Update(_) => CommandType::Update,
            Command::Delete(_) => CommandType::Delete,
            Command::StoredProcedure(_) => CommandType::StoredProcedure,
            Command::UpdateProcedure(_) => CommandType::UpdateProcedure,
            Command::BatchedUpdate(_) => CommandType::BatchedUpdate,
        }
    }

    /// Temporary metadata overlay owned by the command
    pub fn temp_metadata(&self) -> Option<&TempMetadataStore> {
        let store = match self {
            Command::Query(q) => &q.temp_metadata,
            Command::SetQuery(q) => &q.temp_metadata,
            Command::Insert(i) => &i.temp_metadata,
            Command::Update(u) => &u.temp_metadata,
            Command::Delete(d) => &d.temp_metadata,
            Command::StoredProcedure(p) => &p.temp_metadata,
            Command::UpdateProcedure(p) => &p.temp_metadata,
            Command::BatchedUpdate(_) => return None,
        };
        (!store.is_empty()).then_some(store)
    }

    /// Whether this is a query or set query
    pub fn is_query_command(&self) -> bool {
        matches!(self, Command::Query(_) | Command::SetQuery(_))
    }

    /// The query whose SELECT defines the output columns (left-most branch of a set query)
    pub fn projected_query(&self) -> Option<&Query> {
        match self {
            Command::Query(q) => Some(q),
            Command::SetQuery(s) => s.left.projected_query(),
            _ => None,
        }
    }

    pub fn projected_query_mut(&mut self) -> Option<&mut Query> {
        match self {
            Command::Query(q) => Some(q),
            Command::SetQuery(s) => s.left.projected_query_mut(),
            _ => None,
        }
    }

    /// Output columns of the command
    pub fn projected_symbols(&self) -> Vec<SelectSymbol> {
        match self {
            Command::Query(_) | Command::SetQuery(_) => self
                .projected_query()
                .map(|q| q.select.symbols.clone())
                .unwrap_or_default(),
            Command::StoredProcedure(p) => p
                .parameters
                .iter()
                .filter(|param| param.direction == ParameterDirection::ResultSet)
                .map(|param| {
                    SelectSymbol::new(ElementSymbol::new(None, &param.name, param.data_type).into())
                })
                .collect(),
            _ => vec![SelectSymbol::new(
                ElementSymbol::new(None, "Count", DataType::Integer).into(),
            )],
        }
    }

    pub fn order_by(&self) -> Option<&OrderBy> {
        match self {
            Command::Query(q) => q.order_by.as_ref(),
            Command::SetQuery(s) => s.order_by.as_ref(),
            _ => None,
        }
    }

    pub fn limit(&self) -> Option<&Limit> {
        match self {
            Command::Query(q) => q.limit.as_ref(),
            Command::SetQuery(s) => s.limit.as_ref(),
            _ => None,
        }
    }

    /// Drop the ORDER BY of a query command
    pub fn clear_order_by(&mut self) {
        match self {
            Command::Query(q) => q.order_by = None,
            Command::SetQuery(s) => s.order_by = None,
            _ => {}
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ORDER BY ")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match &item.symbol.alias {
                Some(alias) => f.write_str(alias)?,
                None => write!(f, "{}", item.symbol.expression)?,
            }
            if !item.ascending {
                f.write_str(" DESC")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.offset, &self.row_limit) {
            (Some(offset), Some(limit)) => write!(f, "LIMIT {offset}, {limit}"),
            (None, Some(limit)) => write!(f, "LIMIT {limit}"),
            (Some(offset), None) => write!(f, "OFFSET {offset} ROWS"),
            (None, None) => Ok(()),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.select.distinct {
            f.write_str("DISTINCT ")?;
        }
        for (i, symbol) in self.select.symbols.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{symbol}")?;
        }
        if let Some(into) = &self.into {
            write!(f, " INTO {}", into.group)?;
        }
        if let Some(from) = &self.from {
            f.write_str(" FROM ")?;
            for (i, clause) in from.clauses.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{clause}")?;
            }
        }
        if let Some(criteria) = &self.criteria {
            write!(f, " WHERE {criteria}")?;
        }
        if let Some(group_by) = &self.group_by {
            f.write_str(" GROUP BY ")?;
            for (i, expr) in group_by.expressions.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{expr}")?;
            }
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {having}")?;
        }
        if let Some(order_by) = &self.order_by {
            write!(f, " {order_by}")?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " {limit}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Query(q) => write!(f, "{q}"),
            Command::SetQuery(s) => {
                let op = match s.operation {
                    SetOperation::Union => "UNION",
                    SetOperation::Intersect => "INTERSECT",
                    SetOperation::Except => "EXCEPT",
                };
                let all = if s.all { " ALL" } else { "" };
                write!(f, "{} {}{} ", s.left, op, all)?;
                match &s.right {
                    Command::SetQuery(_) => write!(f, "({})", s.right)?,
                    right => write!(f, "{right}")?,
                }
                if let Some(order_by) = &s.order_by {
                    write!(f, " {order_by}")?;
                }
                if let Some(limit) = &s.limit {
                    write!(f, " {limit}")?;
                }
                Ok(())
            }
            Command::Insert(i) => {
                write!(f, "INSERT INTO {} (", i.group)?;
                for (n, var) in i.variables.iter().enumerate() {
                    if n > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&var.name)?;
                }
                f.write_str(")")?;
                match &i.query {
                    Some(query) => write!(f, " {query}"),
                    None => {
                        f.write_str(" VALUES (")?;
                        for (n, value) in i.values.iter().enumerate() {
                            if n > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{value}")?;
                        }
                        f.write_str(")")
                    }
                }
            }
            Command::Update(u) => {
                write!(f, "UPDATE {} SET ", u.group)?;
                for (n, change) in u.changes.iter().enumerate() {
                    if n > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} = {}", change.symbol.name, change.value)?;
                }
                if let Some(criteria) = &u.criteria {
                    write!(f, " WHERE {criteria}")?;
                }
                Ok(())
            }
            Command::Delete(d) => {
                write!(f, "DELETE FROM {}", d.group)?;
                if let Some(criteria) = &d.criteria {
                    write!(f, " WHERE {criteria}")?;
                }
                Ok(())
            }
            Command::StoredProcedure(p) => {
                write!(f, "EXEC {}(", p.name)?;
                let inputs = p
                    .parameters
                    .iter()
                    .filter_map(|param| param.expression.as_ref().map(|e| (param, e)));
                for (n, (param, expr)) in inputs.enumerate() {
                    if n > 0 {
                        f.write_str(", ")?;
                    }
                    if p.display_named_parameters {
                        write!(f, "{} => ", param.name)?;
                    }
                    write!(f, "{expr}")?;
                }
                f.write_str(")")
            }
            Command::UpdateProcedure(p) => write!(f, "CREATE PROCEDURE {}", p.block),
            Command::BatchedUpdate(b) => {
                for (n, command) in b.commands.iter().enumerate() {
                    if n > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{command}")?;
                }
                Ok(())
            }
        }
    }
}
