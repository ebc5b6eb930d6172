//! Scalar expression AST
//!
//! Expressions arrive fully resolved: every node carries its [`DataType`] and every
//! function carries the [`FunctionDescriptor`] the resolver bound it to. The rewriter
//! consumes expressions by value and returns new ones of the same declared type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::commands::Command;
use crate::criteria::Criteria;
use crate::functions::FunctionDescriptor;
use crate::types::{DataType, Value};

/// Helper function for serde default value
fn default_true() -> bool {
    true
}

/// Pseudo-group holding the values of the user command inside an update procedure
pub const INPUT: &str = "INPUT";
/// Alternate spelling of [`INPUT`]
pub const INPUTS: &str = "INPUTS";
/// Pseudo-group holding per-column "was this column set" flags
pub const CHANGING: &str = "CHANGING";

/// A typed literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub value: Value,
    pub data_type: DataType,
    /// Set when `value` is a [`Value::List`] bound for batched substitution
    #[serde(default)]
    pub multi_valued: bool,
}

impl Constant {
    pub fn new(value: Value, data_type: DataType) -> Self {
        Constant {
            value,
            data_type,
            multi_valued: false,
        }
    }

    /// A constant typed by its value's natural type
    pub fn of(value: Value) -> Self {
        let data_type = value.data_type();
        Constant::new(value, data_type)
    }

    pub fn null(data_type: DataType) -> Self {
        Constant::new(Value::Null, data_type)
    }

    pub fn multi_valued(values: Vec<Value>, data_type: DataType) -> Self {
        Constant {
            value: Value::List(values),
            data_type,
            multi_valued: true,
        }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A resolved column reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSymbol {
    /// Owning group name (table, view alias or procedural pseudo-group)
    pub group: Option<String>,
    pub name: String,
    pub data_type: DataType,
    /// Reference to a value bound outside the command (procedure variables, INPUT/CHANGING)
    #[serde(default)]
    pub external: bool,
    #[serde(default = "default_true")]
    pub nullable: bool,
}

impl ElementSymbol {
    pub fn new(group: Option<&str>, name: impl Into<String>, data_type: DataType) -> Self {
        ElementSymbol {
            group: group.map(str::to_string),
            name: name.into(),
            data_type,
            external: false,
            nullable: true,
        }
    }

    /// An external reference such as `INPUT.col` or a procedure variable
    pub fn external(group: &str, name: impl Into<String>, data_type: DataType) -> Self {
        ElementSymbol {
            external: true,
            ..ElementSymbol::new(Some(group), name, data_type)
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Case-insensitive key `GROUP.NAME`
    pub fn canonical_name(&self) -> String {
        match &self.group {
            Some(group) => format!("{}.{}", group, self.name).to_uppercase(),
            None => self.name.to_uppercase(),
        }
    }

    pub fn short_canonical_name(&self) -> String {
        self.name.to_uppercase()
    }

    /// Whether the element belongs to the named group (case-insensitive)
    pub fn is_in_group(&self, group: &str) -> bool {
        self.group
            .as_deref()
            .is_some_and(|g| g.eq_ignore_ascii_case(group))
    }

    /// Same column, ignoring nullability and external flags
    pub fn same_column(&self, other: &ElementSymbol) -> bool {
        self.canonical_name() == other.canonical_name()
    }
}

impl fmt::Display for ElementSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}.{}", group, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A resolved scalar function call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub args: Vec<Expression>,
    pub data_type: DataType,
    pub descriptor: Option<FunctionDescriptor>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        args: Vec<Expression>,
        descriptor: FunctionDescriptor,
    ) -> Self {
        Function {
            name: name.into(),
            data_type: descriptor.return_type,
            args,
            descriptor: Some(descriptor),
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn is_null_dependent(&self) -> bool {
        self.descriptor.as_ref().is_some_and(|d| d.null_dependent)
    }

    fn is_infix(&self) -> bool {
        self.args.len() == 2 && matches!(self.name.as_str(), "+" | "-" | "*" | "/")
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infix() {
            return write!(f, "({} {} {})", self.args[0], self.name, self.args[1]);
        }
        write!(f, "{}(", self.name)?;
        let is_conversion = self.is_named("convert") || self.is_named("cast");
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match arg {
                Expression::Constant(Constant {
                    value: Value::String(type_name),
                    ..
                }) if is_conversion && i == 1 => f.write_str(type_name)?,
                _ => write!(f, "{arg}")?,
            }
        }
        f.write_str(")")
    }
}

/// `CASE operand WHEN v THEN r ... ELSE e END`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseExpression {
    pub operand: Expression,
    pub whens: Vec<Expression>,
    pub thens: Vec<Expression>,
    pub else_expr: Option<Expression>,
    pub data_type: DataType,
}

/// `CASE WHEN criteria THEN r ... ELSE e END`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchedCaseExpression {
    pub whens: Vec<Criteria>,
    pub thens: Vec<Expression>,
    pub else_expr: Option<Expression>,
    pub data_type: DataType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

/// An aggregate call; `expression` is `None` for `COUNT(*)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSymbol {
    pub function: AggregateFunction,
    pub expression: Option<Expression>,
    #[serde(default)]
    pub distinct: bool,
    pub data_type: DataType,
}

/// A subquery used as a scalar value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarSubquery {
    pub command: Command,
    pub data_type: DataType,
    /// The command was already lowered to a processor plan
    #[serde(default)]
    pub planned: bool,
}

/// A parameter placeholder bound at execution time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// The external element the placeholder stands for, if any
    pub element: Option<ElementSymbol>,
    /// Positional index for `?` markers
    pub position: Option<usize>,
    pub data_type: DataType,
}

impl Reference {
    pub fn to_element(element: ElementSymbol) -> Self {
        Reference {
            data_type: element.data_type,
            element: Some(element),
            position: None,
        }
    }

    pub fn positional(position: usize, data_type: DataType) -> Self {
        Reference {
            element: None,
            position: Some(position),
            data_type,
        }
    }
}

/// Resolved scalar expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Constant(Constant),
    Element(ElementSymbol),
    Function(Box<Function>),
    Case(Box<CaseExpression>),
    SearchedCase(Box<SearchedCaseExpression>),
    Aggregate(Box<AggregateSymbol>),
    ScalarSubquery(Box<ScalarSubquery>),
    Reference(Box<Reference>),
}

impl Expression {
    /// Declared type of the expression
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Constant(c) => c.data_type,
            Expression::Element(e) => e.data_type,
            Expression::Function(f) => f.data_type,
            Expression::Case(c) => c.data_type,
            Expression::SearchedCase(c) => c.data_type,
            Expression::Aggregate(a) => a.data_type,
            Expression::ScalarSubquery(s) => s.data_type,
            Expression::Reference(r) => r.data_type,
        }
    }

    pub fn constant(value: Value, data_type: DataType) -> Self {
        Expression::Constant(Constant::new(value, data_type))
    }

    pub fn null(data_type: DataType) -> Self {
        Expression::Constant(Constant::null(data_type))
    }

    /// Whether this is a constant holding NULL
    pub fn is_null_constant(&self) -> bool {
        matches!(self, Expression::Constant(c) if c.is_null())
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Expression::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Expression::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementSymbol> {
        match self {
            Expression::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the expression may evaluate to NULL
    pub fn is_nullable(&self) -> bool {
        match self {
            Expression::Constant(c) => c.is_null(),
            Expression::Element(e) => e.nullable,
            Expression::Aggregate(a) => a.function != AggregateFunction::Count,
            _ => true,
        }
    }
}

impl From<ElementSymbol> for Expression {
    fn from(element: ElementSymbol) -> Self {
        Expression::Element(element)
    }
}

impl From<Constant> for Expression {
    fn from(constant: Constant) -> Self {
        Expression::Constant(constant)
    }
}

impl From<Function> for Expression {
    fn from(function: Function) -> Self {
        Expression::Function(Box::new(function))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(c) => write!(f, "{c}"),
            Expression::Element(e) => write!(f, "{e}"),
            Expression::Function(func) => write!(f, "{func}"),
            Expression::Case(case) => {
                write!(f, "CASE {}", case.operand)?;
                for (when, then) in case.whens.iter().zip(&case.thens) {
                    write!(f, " WHEN {when} THEN {then}")?;
                }
                if let Some(else_expr) = &case.else_expr {
                    write!(f, " ELSE {else_expr}")?;
                }
                f.write_str(" END")
            }
            Expression::SearchedCase(case) => {
                f.write_str("CASE")?;
                for (when, then) in case.whens.iter().zip(&case.thens) {
                    write!(f, " WHEN {when} THEN {then}")?;
                }
                if let Some(else_expr) = &case.else_expr {
                    write!(f, " ELSE {else_expr}")?;
                }
                f.write_str(" END")
            }
            Expression::Aggregate(agg) => {
                write!(f, "{}(", agg.function.name())?;
                if agg.distinct {
                    f.write_str("DISTINCT ")?;
                }
                match &agg.expression {
                    Some(expr) => write!(f, "{expr})"),
                    None => f.write_str("*)"),
                }
            }
            Expression::ScalarSubquery(sub) => write!(f, "({})", sub.command),
            Expression::Reference(_) => f.write_str("?"),
        }
    }
}

/// One projected column of a SELECT clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectSymbol {
    pub expression: Expression,
    pub alias: Option<String>,
}

impl SelectSymbol {
    pub fn new(expression: Expression) -> Self {
        SelectSymbol {
            expression,
            alias: None,
        }
    }

    pub fn aliased(expression: Expression, alias: impl Into<String>) -> Self {
        SelectSymbol {
            expression,
            alias: Some(alias.into()),
        }
    }

    /// Output column name
    pub fn name(&self) -> &str {
        match (&self.alias, &self.expression) {
            (Some(alias), _) => alias,
            (None, Expression::Element(e)) => &e.name,
            (None, _) => "expr",
        }
    }

    pub fn short_canonical_name(&self) -> String {
        self.name().to_uppercase()
    }

    /// An unaliased computed column
    pub fn is_expression_symbol(&self) -> bool {
        self.alias.is_none() && !matches!(self.expression, Expression::Element(_))
    }

    pub fn data_type(&self) -> DataType {
        self.expression.data_type()
    }
}

impl fmt::Display for SelectSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {}", self.expression, alias),
            None => write!(f, "{}", self.expression),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_canonical_name() {
        let e = ElementSymbol::new(Some("pm1.g1"), "e1", DataType::String);
        assert_eq!(e.canonical_name(), "PM1.G1.E1");
        assert_eq!(e.to_string(), "pm1.g1.e1");
        assert!(e.is_in_group("PM1.G1"));
    }

    #[test]
    fn test_select_symbol_names() {
        let col = SelectSymbol::new(ElementSymbol::new(Some("t"), "a", DataType::Integer).into());
        assert_eq!(col.name(), "a");
        assert!(!col.is_expression_symbol());

        let lit = SelectSymbol::new(Expression::constant(Value::Integer(1), DataType::Integer));
        assert_eq!(lit.name(), "expr");
        assert!(lit.is_expression_symbol());

        let aliased = SelectSymbol::aliased(lit.expression.clone(), "one");
        assert_eq!(aliased.short_canonical_name(), "ONE");
        assert!(!aliased.is_expression_symbol());
    }

    #[test]
    fn test_nullability() {
        let nullable: Expression = ElementSymbol::new(Some("t"), "b", DataType::String).into();
        let not_null: Expression = ElementSymbol::new(Some("t"), "b", DataType::String)
            .not_null()
            .into();
        assert!(nullable.is_nullable());
        assert!(!not_null.is_nullable());
        assert!(Expression::null(DataType::Integer).is_nullable());
        assert!(!Expression::constant(Value::Integer(1), DataType::Integer).is_nullable());
    }
}
