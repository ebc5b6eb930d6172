//! Query rewriter
//!
//! Turns a resolved command tree into an equivalent canonical tree:
//!
//! - three-valued simplification of criteria ([`criteria`], [`simplify`])
//! - constant folding and function identities ([`expression`])
//! - query shape normalization: GROUP BY expressions, unrelated ORDER BY terms,
//!   SELECT INTO, set operations and joins ([`query`], [`inline_view`])
//! - dead branch pruning in update procedures ([`procedure`])
//!
//! Every step consumes its input by value and returns the rewritten node. Failures
//! abort the whole rewrite; no partially rewritten tree is ever returned.

mod criteria;
mod expression;
mod inline_view;
mod procedure;
mod query;
mod simplify;

pub use criteria::optimize_criteria;
pub use inline_view::{create_inline_view_query, make_select_unique};

use log::debug;

use crate::commands::{Command, CommandType};
use crate::context::{CommandContext, ProcessorDataManager, VariableBindings};
use crate::error::Result;
use crate::evaluator::{DefaultEvaluator, Evaluator};
use crate::expressions::{ElementSymbol, Expression};
use crate::metadata::{LayeredMetadata, Metadata};

/// Configuration for a rewrite
pub struct RewriterConfig<'a> {
    /// Values bound for evaluation (variables, parameter references, dependent sources)
    pub context: Option<&'a CommandContext>,
    /// Constant folding engine; [`DefaultEvaluator`] when unset
    pub evaluator: Option<&'a dyn Evaluator>,
    /// Enables processing-time evaluation of references and dependent sets
    pub data_manager: Option<&'a dyn ProcessorDataManager>,
    /// Procedural substitutions keyed by canonical element name
    pub variables: Option<VariableBindings>,
    /// Kind of the user command the rewrite runs for
    pub command_type: CommandType,
    /// Whether nested commands (subqueries, procedure statements) are rewritten
    pub rewrite_subcommands: bool,
}

impl Default for RewriterConfig<'_> {
    fn default() -> Self {
        Self {
            context: None,
            evaluator: None,
            data_manager: None,
            variables: None,
            command_type: CommandType::Unknown,
            rewrite_subcommands: true,
        }
    }
}

impl<'a> RewriterConfig<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: &'a CommandContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_evaluator(mut self, evaluator: &'a dyn Evaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_data_manager(mut self, data_manager: &'a dyn ProcessorDataManager) -> Self {
        self.data_manager = Some(data_manager);
        self
    }

    pub fn with_variables(mut self, variables: VariableBindings) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_command_type(mut self, command_type: CommandType) -> Self {
        self.command_type = command_type;
        self
    }

    pub fn with_rewrite_subcommands(mut self, rewrite_subcommands: bool) -> Self {
        self.rewrite_subcommands = rewrite_subcommands;
        self
    }
}

/// The update procedure whose block is being rewritten
pub(crate) struct ProcedureScope {
    /// The INSERT/UPDATE/DELETE the procedure handles
    pub(crate) user_command: Option<Command>,
    /// View column to definition expression
    pub(crate) symbol_map: Vec<(ElementSymbol, Expression)>,
}

/// Rewrite state for one invocation
pub(crate) struct QueryRewriter<'a> {
    metadata: LayeredMetadata<'a>,
    evaluator: &'a dyn Evaluator,
    context: Option<&'a CommandContext>,
    data_manager: Option<&'a dyn ProcessorDataManager>,
    variables: Option<VariableBindings>,
    command_type: CommandType,
    procedure: Option<ProcedureScope>,
    rewrite_subcommands: bool,
}

impl<'a> QueryRewriter<'a> {
    pub(crate) fn new(metadata: &'a dyn Metadata, config: RewriterConfig<'a>) -> Self {
        QueryRewriter {
            metadata: LayeredMetadata::new(metadata),
            evaluator: config.evaluator.unwrap_or(&DefaultEvaluator),
            context: config.context,
            data_manager: config.data_manager,
            variables: config.variables,
            command_type: config.command_type,
            procedure: None,
            rewrite_subcommands: config.rewrite_subcommands,
        }
    }

    /// Rewrite a command and everything nested in it.
    ///
    /// `remove_order_by` drops the ORDER BY of a query command without a LIMIT; nested
    /// queries (subqueries, set operation branches, insert sources) never need their order.
    pub(crate) fn rewrite_command(&mut self, command: Command, remove_order_by: bool) -> Result<Command> {
        let overlay = command.temp_metadata().cloned();
        let pushed = overlay.is_some();
        if let Some(store) = overlay {
            self.metadata.push(store);
        }

        let result = self.dispatch_command(command, remove_order_by);

        if pushed {
            self.metadata.pop();
        }
        result
    }

    fn dispatch_command(&mut self, command: Command, remove_order_by: bool) -> Result<Command> {
        debug!("rewriting {:?} command", command.command_type());
        let mut command = match command {
            Command::Query(query) => self.rewrite_query(*query)?,
            Command::SetQuery(set_query) => self.rewrite_set_query(*set_query)?,
            Command::StoredProcedure(procedure) => self.rewrite_exec(*procedure)?,
            Command::Insert(insert) => self.rewrite_insert(*insert)?,
            Command::Update(update) => self.rewrite_update(*update)?,
            Command::Delete(delete) => self.rewrite_delete(*delete)?,
            Command::UpdateProcedure(procedure) => self.rewrite_update_procedure(*procedure)?,
            Command::BatchedUpdate(mut batch) => {
                batch.commands = batch
                    .commands
                    .into_iter()
                    .map(|command| self.rewrite_command(command, false))
                    .collect::<Result<_>>()?;
                Command::BatchedUpdate(batch)
            }
        };
        if remove_order_by && command.is_query_command() && command.limit().is_none() {
            command.clear_order_by();
        }
        Ok(command)
    }

    /// Rewrite a nested command unless it is already planned or subcommand rewriting is off
    pub(crate) fn rewrite_subcommand(
        &mut self,
        command: Command,
        planned: bool,
        remove_order_by: bool,
    ) -> Result<Command> {
        if self.rewrite_subcommands && !planned {
            self.rewrite_command(command, remove_order_by)
        } else {
            Ok(command)
        }
    }
}
