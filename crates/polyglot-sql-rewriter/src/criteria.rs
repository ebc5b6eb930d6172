//! Predicate (criteria) AST
//!
//! Statically resolved truth values are dedicated variants ([`Criteria::True`],
//! [`Criteria::False`], [`Criteria::Unknown`]) so sentinel checks are plain tag matches.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::commands::Command;
use crate::expressions::{ElementSymbol, Expression};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Operator that holds when the operands are swapped (`a < b` ⇔ `b > a`)
    pub fn reversed(self) -> CompareOp {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Ge => CompareOp::Le,
            other => other,
        }
    }

    /// Logical complement (`NOT a < b` ⇔ `a >= b`)
    pub fn negated(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Le => CompareOp::Gt,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn flipped(self) -> LogicalOp {
        match self {
            LogicalOp::And => LogicalOp::Or,
            LogicalOp::Or => LogicalOp::And,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantifier {
    Any,
    Some,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareCriteria {
    pub left: Expression,
    pub op: CompareOp,
    pub right: Expression,
}

impl CompareCriteria {
    pub fn new(left: Expression, op: CompareOp, right: Expression) -> Self {
        CompareCriteria { left, op, right }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundCriteria {
    pub op: LogicalOp,
    pub criteria: Vec<Criteria>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetweenCriteria {
    pub expression: Expression,
    pub lower: Expression,
    pub upper: Expression,
    #[serde(default)]
    pub negated: bool,
}

/// `expr [NOT] LIKE pattern [ESCAPE c]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCriteria {
    pub left: Expression,
    pub right: Expression,
    pub escape: Option<char>,
    #[serde(default)]
    pub negated: bool,
}

impl MatchCriteria {
    pub const WILDCARD: char = '%';
    pub const MATCH_ONE: char = '_';
}

/// `expr [NOT] IN (v1, v2, ...)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetCriteria {
    pub expression: Expression,
    pub values: Vec<Expression>,
    #[serde(default)]
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsNullCriteria {
    pub expression: Expression,
    #[serde(default)]
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistsCriteria {
    pub command: Command,
    #[serde(default)]
    pub planned: bool,
}

/// `expr op ANY|SOME|ALL (subquery)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubqueryCompareCriteria {
    pub left: Expression,
    pub op: CompareOp,
    pub quantifier: Quantifier,
    pub command: Command,
    #[serde(default)]
    pub planned: bool,
}

/// `expr [NOT] IN (subquery)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubquerySetCriteria {
    pub expression: Expression,
    pub command: Command,
    #[serde(default)]
    pub negated: bool,
    #[serde(default)]
    pub planned: bool,
}

/// An IN list whose values come from a dependent value source at execution time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependentSetCriteria {
    pub expression: Expression,
    /// Name of the value source registered in the command context
    pub source: String,
    /// Expression evaluated against each row of the source
    pub value_expression: Expression,
    #[serde(default)]
    pub negated: bool,
}

/// Kind of predicate a HAS/TRANSLATE selector matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorType {
    /// Any predicate kind
    Any,
    Compare(CompareOp),
    In,
    Like,
    IsNull,
    Between,
}

/// `[op] CRITERIA [ON (e1, e2, ...)]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaSelector {
    pub selector_type: SelectorType,
    #[serde(default)]
    pub elements: Vec<ElementSymbol>,
}

impl CriteriaSelector {
    pub fn new(selector_type: SelectorType, elements: Vec<ElementSymbol>) -> Self {
        CriteriaSelector {
            selector_type,
            elements,
        }
    }

    /// Whether the predicate's kind matches the selector type
    pub fn matches_kind(&self, predicate: &Criteria) -> bool {
        match (self.selector_type, predicate) {
            (SelectorType::Any, _) => true,
            (SelectorType::Compare(op), Criteria::Compare(c)) => c.op == op,
            (SelectorType::In, Criteria::Set(_)) => true,
            (SelectorType::Like, Criteria::Match(_)) => true,
            (SelectorType::IsNull, Criteria::IsNull(_)) => true,
            (SelectorType::Between, Criteria::Between(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CriteriaSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.selector_type {
            SelectorType::Any => {}
            SelectorType::Compare(op) => write!(f, "{} ", op.symbol())?,
            SelectorType::In => f.write_str("IN ")?,
            SelectorType::Like => f.write_str("LIKE ")?,
            SelectorType::IsNull => f.write_str("IS NULL ")?,
            SelectorType::Between => f.write_str("BETWEEN ")?,
        }
        f.write_str("CRITERIA")?;
        if !self.elements.is_empty() {
            f.write_str(" ON (")?;
            for (i, e) in self.elements.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{e}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// `HAS selector`: procedural test on the shape of the user command's criteria
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HasCriteria {
    pub selector: CriteriaSelector,
}

/// `TRANSLATE selector [WITH (e = expr, ...)]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateCriteria {
    pub selector: CriteriaSelector,
    /// Explicit element translations
    #[serde(default)]
    pub translations: Vec<(ElementSymbol, Expression)>,
}

/// Resolved boolean predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criteria {
    True,
    False,
    Unknown,
    Compare(Box<CompareCriteria>),
    Compound(Box<CompoundCriteria>),
    Not(Box<Criteria>),
    Between(Box<BetweenCriteria>),
    Match(Box<MatchCriteria>),
    Set(Box<SetCriteria>),
    IsNull(Box<IsNullCriteria>),
    Exists(Box<ExistsCriteria>),
    SubqueryCompare(Box<SubqueryCompareCriteria>),
    SubquerySet(Box<SubquerySetCriteria>),
    DependentSet(Box<DependentSetCriteria>),
    Has(Box<HasCriteria>),
    Translate(Box<TranslateCriteria>),
}

impl Criteria {
    pub fn compare(left: Expression, op: CompareOp, right: Expression) -> Criteria {
        Criteria::Compare(Box::new(CompareCriteria::new(left, op, right)))
    }

    pub fn compound(op: LogicalOp, criteria: Vec<Criteria>) -> Criteria {
        Criteria::Compound(Box::new(CompoundCriteria { op, criteria }))
    }

    pub fn and(criteria: Vec<Criteria>) -> Criteria {
        Criteria::compound(LogicalOp::And, criteria)
    }

    pub fn or(criteria: Vec<Criteria>) -> Criteria {
        Criteria::compound(LogicalOp::Or, criteria)
    }

    pub fn not(inner: Criteria) -> Criteria {
        Criteria::Not(Box::new(inner))
    }

    pub fn is_null(expression: Expression, negated: bool) -> Criteria {
        Criteria::IsNull(Box::new(IsNullCriteria {
            expression,
            negated,
        }))
    }

    pub fn from_bool(value: bool) -> Criteria {
        if value {
            Criteria::True
        } else {
            Criteria::False
        }
    }

    /// Whether this is one of the truth-value variants
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Criteria::True | Criteria::False | Criteria::Unknown)
    }

    /// A leaf predicate: anything that is neither a compound, a NOT nor a sentinel
    pub fn is_predicate(&self) -> bool {
        !matches!(self, Criteria::Compound(_) | Criteria::Not(_)) && !self.is_sentinel()
    }

    /// Whether [`Criteria::negate`] can push a NOT into this predicate
    pub fn is_negatable(&self) -> bool {
        matches!(
            self,
            Criteria::Compare(_)
                | Criteria::Between(_)
                | Criteria::Match(_)
                | Criteria::Set(_)
                | Criteria::IsNull(_)
                | Criteria::SubquerySet(_)
                | Criteria::DependentSet(_)
        )
    }

    /// Push a negation into a negatable predicate; other criteria are wrapped in NOT.
    pub fn negate(self) -> Criteria {
        match self {
            Criteria::Compare(mut c) => {
                c.op = c.op.negated();
                Criteria::Compare(c)
            }
            Criteria::Between(mut c) => {
                c.negated = !c.negated;
                Criteria::Between(c)
            }
            Criteria::Match(mut c) => {
                c.negated = !c.negated;
                Criteria::Match(c)
            }
            Criteria::Set(mut c) => {
                c.negated = !c.negated;
                Criteria::Set(c)
            }
            Criteria::IsNull(mut c) => {
                c.negated = !c.negated;
                Criteria::IsNull(c)
            }
            Criteria::SubquerySet(mut c) => {
                c.negated = !c.negated;
                Criteria::SubquerySet(c)
            }
            Criteria::DependentSet(mut c) => {
                c.negated = !c.negated;
                Criteria::DependentSet(c)
            }
            other => Criteria::not(other),
        }
    }

    /// Convert `NOT (compound)` to conjunctive normal form via De Morgan's laws.
    ///
    /// Negation is pushed through nested compounds; leaves are wrapped in NOT so the
    /// predicate rewriter can push it further.
    pub fn to_conjunctive_normal_form(compound: CompoundCriteria) -> Criteria {
        let op = compound.op.flipped();
        let criteria = compound
            .criteria
            .into_iter()
            .map(|child| match child {
                Criteria::Compound(inner) => Criteria::to_conjunctive_normal_form(*inner),
                Criteria::Not(inner) => *inner,
                other => Criteria::not(other),
            })
            .collect();
        Criteria::compound(op, criteria)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = |negated: bool| if negated { "NOT " } else { "" };
        match self {
            Criteria::True => f.write_str("TRUE"),
            Criteria::False => f.write_str("FALSE"),
            Criteria::Unknown => f.write_str("UNKNOWN"),
            Criteria::Compare(c) => write!(f, "{} {} {}", c.left, c.op.symbol(), c.right),
            Criteria::Compound(c) => {
                let op = match c.op {
                    LogicalOp::And => " AND ",
                    LogicalOp::Or => " OR ",
                };
                for (i, child) in c.criteria.iter().enumerate() {
                    if i > 0 {
                        f.write_str(op)?;
                    }
                    write!(f, "({child})")?;
                }
                Ok(())
            }
            Criteria::Not(inner) => write!(f, "NOT ({inner})"),
            Criteria::Between(c) => write!(
                f,
                "{} {}BETWEEN {} AND {}",
                c.expression,
                not(c.negated),
                c.lower,
                c.upper
            ),
            Criteria::Match(c) => {
                write!(f, "{} {}LIKE {}", c.left, not(c.negated), c.right)?;
                if let Some(escape) = c.escape {
                    write!(f, " ESCAPE '{escape}'")?;
                }
                Ok(())
            }
            Criteria::Set(c) => {
                write!(f, "{} {}IN (", c.expression, not(c.negated))?;
                write_list(f, &c.values)?;
                f.write_str(")")
            }
            Criteria::IsNull(c) => write!(f, "{} IS {}NULL", c.expression, not(c.negated)),
            Criteria::Exists(c) => write!(f, "EXISTS ({})", c.command),
            Criteria::SubqueryCompare(c) => {
                let quantifier = match c.quantifier {
                    Quantifier::Any => "ANY",
                    Quantifier::Some => "SOME",
                    Quantifier::All => "ALL",
                };
                write!(
                    f,
                    "{} {} {} ({})",
                    c.left,
                    c.op.symbol(),
                    quantifier,
                    c.command
                )
            }
            Criteria::SubquerySet(c) => {
                write!(f, "{} {}IN ({})", c.expression, not(c.negated), c.command)
            }
            Criteria::DependentSet(c) => write!(
                f,
                "{} {}IN (<dependent values {}>)",
                c.expression,
                not(c.negated),
                c.source
            ),
            Criteria::Has(c) => write!(f, "HAS {}", c.selector),
            Criteria::Translate(c) => {
                write!(f, "TRANSLATE {}", c.selector)?;
                if !c.translations.is_empty() {
                    f.write_str(" WITH (")?;
                    for (i, (element, expr)) in c.translations.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{element} = {expr}")?;
                    }
                    f.write_str(")")?;
                }
                Ok(())
            }
        }
    }
}
