//! Polyglot Rewriter - canonicalization of resolved SQL command trees
//!
//! This library takes a command tree that a resolver has already typed and bound to
//! metadata, and rewrites it into an equivalent tree that is simpler to plan.
//!
//! # Architecture
//!
//! The rewrite is a single pass over the tree:
//! 1. **Commands** - dispatch on the command kind, rewrite each clause and normalize
//!    the query shape (GROUP BY expressions, unrelated ORDER BY terms, SELECT INTO,
//!    set operation branch types, joins)
//! 2. **Criteria** - three-valued simplification down to `TRUE`/`FALSE`/`UNKNOWN` where
//!    the outcome is known, algebraic inversion and conversion elimination otherwise
//! 3. **Expressions** - function identities, CASE pruning and constant folding through
//!    an [`Evaluator`]
//! 4. **Procedures** - dead branch pruning in update procedures, with INPUT and CHANGING
//!    values bound from the user command
//!
//! # Example
//!
//! ```
//! use polyglot_sql_rewriter::builder::*;
//! use polyglot_sql_rewriter::{rewrite, Criteria, DataType, MappingMetadata, RewriterConfig};
//!
//! let metadata = MappingMetadata::new().group("t", &[("a", DataType::Integer)]);
//! let a = col("t", "a", DataType::Integer);
//!
//! // SELECT t.a FROM t WHERE t.a + 5 = 10 AND 1 = 1
//! let query = select([a.clone()])
//!     .from("t")
//!     .where_(Criteria::and(vec![
//!         eq(func("+", vec![a.clone(), int(5)]).unwrap(), int(10)),
//!         eq(int(1), int(1)),
//!     ]))
//!     .build();
//!
//! let rewritten = rewrite(query, &metadata, RewriterConfig::default()).unwrap();
//! assert_eq!(rewritten.to_string(), "SELECT t.a FROM t WHERE t.a = 5");
//! ```

pub mod builder;
pub mod commands;
pub mod context;
pub mod criteria;
pub mod error;
pub mod evaluator;
pub mod expressions;
pub mod functions;
pub mod metadata;
pub mod procedure;
mod rewriter;
pub mod traversal;
pub mod types;

pub use commands::{
    BatchedUpdate, Command, CommandType, Delete, FromClause, GroupBy, GroupSymbol, Insert,
    IntoClause, JoinPredicate, JoinType, Limit, OrderBy, OrderByItem, ParameterDirection, Query,
    Select, SetClause, SetOperation, SetQuery, SpParameter, StoredProcedure, SubqueryFromClause,
    Update, UpdateProcedure,
};
pub use context::{
    CommandContext, ContextDataManager, DependentValueSource, ProcessorDataManager,
    VariableBindings,
};
pub use criteria::{
    CompareOp, CompoundCriteria, Criteria, CriteriaSelector, LogicalOp, SelectorType,
};
pub use error::{Error, Result};
pub use evaluator::{DefaultEvaluator, Evaluation, Evaluator};
pub use expressions::{
    AggregateFunction, Constant, ElementSymbol, Expression, Function, SelectSymbol,
};
pub use functions::{FunctionDescriptor, FunctionLibrary, BUILTIN_FUNCTIONS};
pub use metadata::{MappingMetadata, Metadata, TempMetadataStore};
pub use procedure::{Block, Statement};
pub use rewriter::{
    create_inline_view_query, make_select_unique, optimize_criteria, RewriterConfig,
};
pub use types::{DataType, Value};

use rewriter::QueryRewriter;

/// Rewrite a command and everything nested in it.
///
/// # Example
/// ```
/// use polyglot_sql_rewriter::builder::*;
/// use polyglot_sql_rewriter::{rewrite, DataType, MappingMetadata, RewriterConfig};
///
/// let metadata = MappingMetadata::new().group("t", &[("a", DataType::Integer)]);
/// let query = select([func("+", vec![int(1), int(2)]).unwrap()]).from("t").build();
/// let rewritten = rewrite(query, &metadata, RewriterConfig::default()).unwrap();
/// assert_eq!(rewritten.to_string(), "SELECT 3 FROM t");
/// ```
pub fn rewrite(
    command: Command,
    metadata: &dyn Metadata,
    config: RewriterConfig<'_>,
) -> Result<Command> {
    QueryRewriter::new(metadata, config).rewrite_command(command, false)
}

/// Rewrite a command at processing time.
///
/// References and external elements bound in `context` are evaluated, and dependent set
/// criteria are materialized from the values `data_manager` provides.
pub fn evaluate_and_rewrite(
    command: Command,
    data_manager: &dyn ProcessorDataManager,
    context: &CommandContext,
    metadata: &dyn Metadata,
) -> Result<Command> {
    let config = RewriterConfig::new()
        .with_context(context)
        .with_data_manager(data_manager);
    rewrite(command, metadata, config)
}

/// Rewrite a standalone criteria
pub fn rewrite_criteria(
    criteria: Criteria,
    metadata: &dyn Metadata,
    config: RewriterConfig<'_>,
) -> Result<Criteria> {
    QueryRewriter::new(metadata, config).rewrite_criteria(criteria)
}

/// Rewrite a standalone expression
pub fn rewrite_expression(
    expression: Expression,
    metadata: &dyn Metadata,
    config: RewriterConfig<'_>,
) -> Result<Expression> {
    QueryRewriter::new(metadata, config).rewrite_expression(expression)
}
