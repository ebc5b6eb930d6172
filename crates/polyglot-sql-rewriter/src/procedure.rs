//! Procedural language AST: blocks and statements of update procedures.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::commands::Command;
use crate::criteria::Criteria;
use crate::expressions::{ElementSymbol, Expression};
use crate::types::DataType;

/// `BEGIN stmt; ... END`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Block { statements }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Right-hand side of an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentValue {
    Expression(Expression),
    Command {
        command: Command,
        #[serde(default)]
        planned: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub condition: Criteria,
    pub if_block: Block,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    pub condition: Criteria,
    pub block: Block,
}

/// `LOOP ON (query) AS cursor BEGIN ... END`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopStatement {
    pub cursor_name: String,
    pub command: Command,
    #[serde(default)]
    pub planned: bool,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentStatement {
    pub variable: ElementSymbol,
    pub value: AssignmentValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareStatement {
    pub variable: ElementSymbol,
    pub data_type: DataType,
    pub value: Option<AssignmentValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorStatement {
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandStatement {
    pub command: Command,
    #[serde(default)]
    pub planned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    If(Box<IfStatement>),
    While(Box<WhileStatement>),
    Loop(Box<LoopStatement>),
    Assignment(Box<AssignmentStatement>),
    Declare(Box<DeclareStatement>),
    Error(Box<ErrorStatement>),
    Command(Box<CommandStatement>),
    Break,
    Continue,
}

impl fmt::Display for AssignmentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentValue::Expression(expr) => write!(f, "{expr}"),
            AssignmentValue::Command { command, .. } => write!(f, "({command})"),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BEGIN")?;
        for statement in &self.statements {
            write!(f, " {statement}")?;
        }
        f.write_str(" END")
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::If(s) => {
                write!(f, "IF({}) {}", s.condition, s.if_block)?;
                if let Some(else_block) = &s.else_block {
                    write!(f, " ELSE {else_block}")?;
                }
                Ok(())
            }
            Statement::While(s) => write!(f, "WHILE({}) {}", s.condition, s.block),
            Statement::Loop(s) => {
                write!(f, "LOOP ON ({}) AS {} {}", s.command, s.cursor_name, s.block)
            }
            Statement::Assignment(s) => write!(f, "{} = {};", s.variable, s.value),
            Statement::Declare(s) => {
                write!(f, "DECLARE {} {}", s.data_type, s.variable)?;
                if let Some(value) = &s.value {
                    write!(f, " = {value}")?;
                }
                f.write_str(";")
            }
            Statement::Error(s) => write!(f, "ERROR {};", s.expression),
            Statement::Command(s) => write!(f, "{};", s.command),
            Statement::Break => f.write_str("BREAK;"),
            Statement::Continue => f.write_str("CONTINUE;"),
        }
    }
}
