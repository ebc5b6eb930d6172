//! Execution context available to the rewriter
//!
//! A [`CommandContext`] holds the values known when a command is rewritten at
//! processing time: procedure variables, positional parameter values and the dependent
//! value sources produced by earlier steps of a running plan.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::expressions::Expression;
use crate::types::Value;

/// Procedural substitutions keyed by canonical element name (`INPUT.COL`, `CHANGING.COL`)
pub type VariableBindings = HashMap<String, Expression>;

/// Rows produced by a prior plan step, consumed by dependent set criteria
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependentValueSource {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl DependentValueSource {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        DependentValueSource { columns, rows }
    }

    /// Values of the column `value_expression` names, in row order
    pub fn values_for(&self, value_expression: &Expression) -> Result<Vec<Value>> {
        let element = value_expression.as_element().ok_or_else(|| {
            Error::component(format!(
                "dependent values can only be read by column, not {value_expression}"
            ))
        })?;
        let index = self
            .columns
            .iter()
            .position(|c| {
                c.eq_ignore_ascii_case(&element.name)
                    || c.eq_ignore_ascii_case(&element.canonical_name())
            })
            .ok_or_else(|| {
                Error::component(format!("dependent value source has no column {element}"))
            })?;
        Ok(self
            .rows
            .iter()
            .filter_map(|row| row.get(index).cloned())
            .collect())
    }
}

/// Values bound for one command execution
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    variables: HashMap<String, Value>,
    references: Vec<Value>,
    dependent_sources: HashMap<String, DependentValueSource>,
}

impl CommandContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable by canonical name
    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_uppercase(), value);
    }

    pub fn with_variable(mut self, name: &str, value: Value) -> Self {
        self.set_variable(name, value);
        self
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(&name.to_uppercase())
    }

    /// Values for positional `?` references
    pub fn set_references(&mut self, values: Vec<Value>) {
        self.references = values;
    }

    pub fn reference(&self, position: usize) -> Option<&Value> {
        self.references.get(position)
    }

    pub fn add_dependent_source(&mut self, name: &str, source: DependentValueSource) {
        self.dependent_sources.insert(name.to_uppercase(), source);
    }

    pub fn dependent_source(&self, name: &str) -> Option<&DependentValueSource> {
        self.dependent_sources.get(&name.to_uppercase())
    }
}

/// Access to live data while a plan executes.
///
/// Its presence allows the rewriter to evaluate references against the context and to
/// materialize dependent set criteria; without one only pure constants are folded.
pub trait ProcessorDataManager {
    /// Values a dependent set criteria tests against
    fn dependent_values(
        &self,
        context: &CommandContext,
        source: &str,
        value_expression: &Expression,
    ) -> Result<Vec<Value>> {
        context
            .dependent_source(source)
            .ok_or_else(|| Error::component(format!("dependent value source {source} not found")))?
            .values_for(value_expression)
    }
}

/// Data manager that serves dependent values straight from the [`CommandContext`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextDataManager;

impl ProcessorDataManager for ContextDataManager {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::ElementSymbol;
    use crate::types::DataType;

    #[test]
    fn test_dependent_values_by_column() {
        let source = DependentValueSource::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::Integer(1), Value::String("a".into())],
                vec![Value::Integer(2), Value::String("b".into())],
            ],
        );
        let mut context = CommandContext::new();
        context.add_dependent_source("dep", source);

        let column: Expression = ElementSymbol::new(Some("x"), "ID", DataType::Integer).into();
        let values = ContextDataManager
            .dependent_values(&context, "DEP", &column)
            .unwrap();
        assert_eq!(values, vec![Value::Integer(1), Value::Integer(2)]);

        assert!(ContextDataManager
            .dependent_values(&context, "other", &column)
            .is_err());
    }

    #[test]
    fn test_variables_are_case_insensitive() {
        let context = CommandContext::new().with_variable("input.a", Value::Integer(3));
        assert_eq!(context.variable("INPUT.A"), Some(&Value::Integer(3)));
    }
}
