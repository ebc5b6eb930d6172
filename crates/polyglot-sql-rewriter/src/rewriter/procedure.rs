//! Update procedure rewriting
//!
//! Blocks are rewritten statement by statement. Statically decided IF and WHILE
//! conditions are pruned, nested commands go back through the command dispatch and
//! updates left without SET clauses become no-ops.

use log::debug;

use super::{ProcedureScope, QueryRewriter};
use crate::builder::{boolean, int};
use crate::commands::{Command, UpdateProcedure};
use crate::context::VariableBindings;
use crate::criteria::Criteria;
use crate::error::{Error, Result};
use crate::expressions::{CHANGING, INPUT, INPUTS};
use crate::metadata::Metadata;
use crate::procedure::{AssignmentValue, Block, Statement};

/// An UPDATE whose SET list was emptied by INPUT variable elimination
fn is_empty_update(command: &Command) -> bool {
    matches!(command, Command::Update(update) if update.changes.is_empty())
}

impl QueryRewriter<'_> {
    pub(super) fn rewrite_update_procedure(
        &mut self,
        mut procedure: UpdateProcedure,
    ) -> Result<Command> {
        let saved_variables = self.variables.clone();
        let saved_command_type = self.command_type;
        if let Some(user_command) = &procedure.user_command {
            self.variables = Some(self.variable_values(user_command)?);
            self.command_type = user_command.command_type();
        }

        let scope = ProcedureScope {
            user_command: procedure.user_command.take(),
            symbol_map: std::mem::take(&mut procedure.symbol_map),
        };
        let saved_scope = self.procedure.replace(scope);

        let block = self.rewrite_block(std::mem::take(&mut procedure.block));

        let scope = std::mem::replace(&mut self.procedure, saved_scope);
        self.variables = saved_variables;
        self.command_type = saved_command_type;
        if let Some(scope) = scope {
            procedure.user_command = scope.user_command;
            procedure.symbol_map = scope.symbol_map;
        }

        procedure.block = block?;
        Ok(Command::UpdateProcedure(Box::new(procedure)))
    }

    /// INPUT, INPUTS and CHANGING values described by the user command.
    ///
    /// Every column of the target group starts as not changing; the columns an INSERT or
    /// UPDATE sets are changing and bind their new value as `INPUT.col` and `INPUTS.col`.
    fn variable_values(&self, user_command: &Command) -> Result<VariableBindings> {
        let (group, changes) = match user_command {
            Command::Insert(insert) => (
                &insert.group,
                insert
                    .variables
                    .iter()
                    .enumerate()
                    .map(|(i, variable)| (variable, insert.values.get(i)))
                    .collect::<Vec<_>>(),
            ),
            Command::Update(update) => (
                &update.group,
                update
                    .changes
                    .iter()
                    .map(|change| (&change.symbol, Some(&change.value)))
                    .collect(),
            ),
            _ => return Ok(VariableBindings::new()),
        };

        let mut values = VariableBindings::new();
        for element in self.metadata.elements_in_group(group.metadata_name())? {
            let name = element.short_canonical_name();
            values.insert(format!("{CHANGING}.{name}"), boolean(false));
        }
        for (element, value) in changes {
            let name = element.short_canonical_name();
            values.insert(format!("{CHANGING}.{name}"), boolean(true));
            if let Some(value) = value {
                values.insert(format!("{INPUT}.{name}"), value.clone());
                values.insert(format!("{INPUTS}.{name}"), value.clone());
            }
        }
        Ok(values)
    }

    fn rewrite_block(&mut self, block: Block) -> Result<Block> {
        let mut statements = Vec::with_capacity(block.statements.len());
        for statement in block.statements {
            statements.extend(self.rewrite_statement(statement)?);
        }
        Ok(Block::new(statements))
    }

    /// Rewrite one statement into the statements that replace it (none when it is pruned)
    fn rewrite_statement(&mut self, statement: Statement) -> Result<Vec<Statement>> {
        match statement {
            Statement::If(if_statement) => {
                let mut if_statement = *if_statement;
                match self.rewrite_criteria(if_statement.condition)? {
                    Criteria::True => {
                        debug!("IF condition is always true, inlining its block");
                        Ok(self.rewrite_block(if_statement.if_block)?.statements)
                    }
                    Criteria::False | Criteria::Unknown => {
                        debug!("IF condition is never true, dropping its block");
                        match if_statement.else_block {
                            Some(else_block) => Ok(self.rewrite_block(else_block)?.statements),
                            None => Ok(Vec::new()),
                        }
                    }
                    condition => {
                        if_statement.condition = condition;
                        if_statement.if_block = self.rewrite_block(if_statement.if_block)?;
                        if_statement.else_block = if_statement
                            .else_block
                            .map(|block| self.rewrite_block(block))
                            .transpose()?;
                        Ok(vec![Statement::If(Box::new(if_statement))])
                    }
                }
            }
            Statement::While(while_statement) => {
                let mut while_statement = *while_statement;
                match self.rewrite_criteria(while_statement.condition)? {
                    Criteria::True => Err(Error::validation(
                        "WHILE condition is always true; the loop would never terminate",
                    )),
                    Criteria::False | Criteria::Unknown => Ok(Vec::new()),
                    condition => {
                        while_statement.condition = condition;
                        while_statement.block = self.rewrite_block(while_statement.block)?;
                        if while_statement.block.is_empty() {
                            return Ok(Vec::new());
                        }
                        Ok(vec![Statement::While(Box::new(while_statement))])
                    }
                }
            }
            Statement::Loop(loop_statement) => {
                let mut loop_statement = *loop_statement;
                loop_statement.command =
                    self.rewrite_subcommand(loop_statement.command, loop_statement.planned, false)?;
                loop_statement.block = self.rewrite_block(loop_statement.block)?;
                if loop_statement.block.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![Statement::Loop(Box::new(loop_statement))])
            }
            Statement::Assignment(mut assignment) => {
                assignment.value = self.rewrite_assignment_value(assignment.value)?;
                Ok(vec![Statement::Assignment(assignment)])
            }
            Statement::Declare(mut declare) => {
                declare.value = declare
                    .value
                    .map(|value| self.rewrite_assignment_value(value))
                    .transpose()?;
                Ok(vec![Statement::Declare(declare)])
            }
            Statement::Error(mut error) => {
                error.expression = self.rewrite_expression(error.expression)?;
                Ok(vec![Statement::Error(error)])
            }
            Statement::Command(command_statement) => {
                let mut command_statement = *command_statement;
                command_statement.command = self.rewrite_subcommand(
                    command_statement.command,
                    command_statement.planned,
                    false,
                )?;
                if is_empty_update(&command_statement.command) {
                    debug!("dropping UPDATE statement without SET clauses");
                    return Ok(Vec::new());
                }
                Ok(vec![Statement::Command(Box::new(command_statement))])
            }
            Statement::Break | Statement::Continue => Ok(vec![statement]),
        }
    }

    fn rewrite_assignment_value(&mut self, value: AssignmentValue) -> Result<AssignmentValue> {
        match value {
            AssignmentValue::Expression(expr) => {
                Ok(AssignmentValue::Expression(self.rewrite_expression(expr)?))
            }
            AssignmentValue::Command { command, planned } => {
                let command = self.rewrite_subcommand(command, planned, false)?;
                if is_empty_update(&command) {
                    return Ok(AssignmentValue::Expression(int(0)));
                }
                Ok(AssignmentValue::Command { command, planned })
            }
        }
    }
}
