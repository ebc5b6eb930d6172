//! Runtime data types and typed values
//!
//! Every resolved expression carries a [`DataType`]. Constants carry a [`Value`] whose
//! natural type may be narrower than the declared one; [`convert_value`] moves a value
//! between types and [`is_implicit_conversion`] answers whether the resolver would apply
//! a conversion silently.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// Default rendering pattern for DATE values
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Default rendering pattern for TIME values
pub const TIME_FORMAT: &str = "%H:%M:%S";
/// Default rendering pattern for TIMESTAMP values
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Resolved runtime type of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    BigInteger,
    Float,
    Double,
    BigDecimal,
    String,
    Char,
    Date,
    Time,
    Timestamp,
    Object,
    Null,
}

impl DataType {
    /// Canonical lowercase type name, as accepted by `convert(x, <name>)`
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Byte => "byte",
            DataType::Short => "short",
            DataType::Integer => "integer",
            DataType::Long => "long",
            DataType::BigInteger => "biginteger",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::BigDecimal => "bigdecimal",
            DataType::String => "string",
            DataType::Char => "char",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::Timestamp => "timestamp",
            DataType::Object => "object",
            DataType::Null => "null",
        }
    }

    /// Look up a type by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<DataType> {
        let ty = match name.to_ascii_lowercase().as_str() {
            "boolean" => DataType::Boolean,
            "byte" | "tinyint" => DataType::Byte,
            "short" | "smallint" => DataType::Short,
            "integer" | "int" => DataType::Integer,
            "long" | "bigint" => DataType::Long,
            "biginteger" => DataType::BigInteger,
            "float" | "real" => DataType::Float,
            "double" => DataType::Double,
            "bigdecimal" | "decimal" => DataType::BigDecimal,
            "string" | "varchar" => DataType::String,
            "char" => DataType::Char,
            "date" => DataType::Date,
            "time" => DataType::Time,
            "timestamp" => DataType::Timestamp,
            "object" => DataType::Object,
            "null" => DataType::Null,
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_approximate() || *self == DataType::BigDecimal
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            DataType::Byte
                | DataType::Short
                | DataType::Integer
                | DataType::Long
                | DataType::BigInteger
        )
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::Time | DataType::Timestamp)
    }

    /// Position in the numeric widening order
    fn numeric_rank(&self) -> Option<u8> {
        match self {
            DataType::Byte => Some(0),
            DataType::Short => Some(1),
            DataType::Integer => Some(2),
            DataType::Long => Some(3),
            DataType::BigInteger => Some(4),
            DataType::Float => Some(5),
            DataType::Double => Some(6),
            DataType::BigDecimal => Some(7),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether the resolver converts `source` to `target` without an explicit CONVERT.
///
/// Widening numeric conversions, anything to string, CHAR to string and DATE/TIME to
/// TIMESTAMP are implicit. Narrowing and string parsing are explicit.
pub fn is_implicit_conversion(source: DataType, target: DataType) -> bool {
    if source == target || target == DataType::Object || source == DataType::Null {
        return true;
    }
    match (source, target) {
        (_, DataType::String) => source != DataType::Object,
        (DataType::Boolean, t) => t.is_numeric(),
        (DataType::Date | DataType::Time, DataType::Timestamp) => true,
        (s, t) => match (s.numeric_rank(), t.numeric_rank()) {
            (Some(from), Some(to)) => {
                // BIGINTEGER does not widen into the approximate types
                from < to && !(s == DataType::BigInteger && t.is_approximate())
            }
            _ => false,
        },
    }
}

/// A typed runtime value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    BigInteger(i128),
    Float(f32),
    Double(f64),
    BigDecimal(Decimal),
    String(String),
    Char(char),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    /// Several values bound to one parameter (batched substitution)
    List(Vec<Value>),
}

impl Value {
    /// Natural type of the value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Boolean(_) => DataType::Boolean,
            Value::Byte(_) => DataType::Byte,
            Value::Short(_) => DataType::Short,
            Value::Integer(_) => DataType::Integer,
            Value::Long(_) => DataType::Long,
            Value::BigInteger(_) => DataType::BigInteger,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::BigDecimal(_) => DataType::BigDecimal,
            Value::String(_) => DataType::String,
            Value::Char(_) => DataType::Char,
            Value::Date(_) => DataType::Date,
            Value::Time(_) => DataType::Time,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::List(_) => DataType::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Exact integral view of the value, if it has one
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Byte(v) => Some(*v as i128),
            Value::Short(v) => Some(*v as i128),
            Value::Integer(v) => Some(*v as i128),
            Value::Long(v) => Some(*v as i128),
            Value::BigInteger(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::BigDecimal(d) => d.to_f64(),
            other => other.as_i128().map(|v| v as f64),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::BigDecimal(d) => Some(*d),
            Value::Float(v) => Decimal::from_f32(*v),
            Value::Double(v) => Decimal::from_f64(*v),
            other => other.as_i128().and_then(|v| Decimal::try_from_i128_with_scale(v, 0).ok()),
        }
    }

    /// Sign of a numeric value, `None` for non-numeric values
    pub fn signum(&self) -> Option<Ordering> {
        if let Some(v) = self.as_i128() {
            return Some(v.cmp(&0));
        }
        match self {
            Value::BigDecimal(d) => Some(d.cmp(&Decimal::ZERO)),
            _ => self.as_f64().and_then(|v| v.partial_cmp(&0.0)),
        }
    }

    /// Compare two non-null values, promoting numerics and temporals to a common type.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
            (Value::Char(a), Value::String(b)) => Some(a.to_string().as_str().cmp(b.as_str())),
            (Value::String(a), Value::Char(b)) => Some(a.as_str().cmp(b.to_string().as_str())),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Timestamp(b)) => Some(a.and_time(NaiveTime::MIN).cmp(b)),
            (Value::Timestamp(a), Value::Date(b)) => Some(a.cmp(&b.and_time(NaiveTime::MIN))),
            (a, b) if a.data_type().is_numeric() && b.data_type().is_numeric() => {
                if let (Some(x), Some(y)) = (a.as_i128(), b.as_i128()) {
                    return Some(x.cmp(&y));
                }
                let approximate =
                    a.data_type().is_approximate() || b.data_type().is_approximate();
                if !approximate {
                    if let (Some(x), Some(y)) = (a.as_decimal(), b.as_decimal()) {
                        return Some(x.cmp(&y));
                    }
                }
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            _ => None,
        }
    }

    /// Unquoted string form, as produced by `convert(x, string)`
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Byte(v) => v.to_string(),
            Value::Short(v) => v.to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::BigInteger(v) => v.to_string(),
            Value::Float(v) => format_float(*v as f64),
            Value::Double(v) => format_float(*v),
            Value::BigDecimal(d) => d.to_string(),
            Value::String(s) => s.clone(),
            Value::Char(c) => c.to_string(),
            Value::Date(d) => d.format(DATE_FORMAT).to_string(),
            Value::Time(t) => t.format(TIME_FORMAT).to_string(),
            Value::Timestamp(ts) => format_timestamp(ts),
            Value::List(values) => values
                .iter()
                .map(Value::to_plain_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        format!("{}.0", ts.format("%Y-%m-%d %H:%M:%S"))
    } else {
        ts.format(TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for Value {
    /// SQL literal form
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(true) => f.write_str("TRUE"),
            Value::Boolean(false) => f.write_str("FALSE"),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Char(c) => write!(f, "'{}'", c.to_string().replace('\'', "''")),
            Value::Date(_) => write!(f, "{{d'{}'}}", self.to_plain_string()),
            Value::Time(_) => write!(f, "{{t'{}'}}", self.to_plain_string()),
            Value::Timestamp(_) => write!(f, "{{ts'{}'}}", self.to_plain_string()),
            Value::List(values) => {
                f.write_str("(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
            other => f.write_str(&other.to_plain_string()),
        }
    }
}

fn conversion_error(value: &Value, target: DataType) -> Error {
    Error::evaluation(format!(
        "cannot convert {} value {} to {}",
        value.data_type(),
        value,
        target
    ))
}

fn integral_to(value: &Value, v: i128, target: DataType) -> Result<Value> {
    let out_of_range = || conversion_error(value, target);
    Ok(match target {
        DataType::Byte => Value::Byte(i8::try_from(v).map_err(|_| out_of_range())?),
        DataType::Short => Value::Short(i16::try_from(v).map_err(|_| out_of_range())?),
        DataType::Integer => Value::Integer(i32::try_from(v).map_err(|_| out_of_range())?),
        DataType::Long => Value::Long(i64::try_from(v).map_err(|_| out_of_range())?),
        DataType::BigInteger => Value::BigInteger(v),
        DataType::Float => Value::Float(v as f32),
        DataType::Double => Value::Double(v as f64),
        DataType::BigDecimal => Value::BigDecimal(
            Decimal::try_from_i128_with_scale(v, 0).map_err(|_| out_of_range())?,
        ),
        DataType::Boolean => Value::Boolean(v != 0),
        _ => return Err(out_of_range()),
    })
}

fn numeric_to(value: &Value, target: DataType) -> Result<Value> {
    if let Some(v) = value.as_i128() {
        return integral_to(value, v, target);
    }
    match target {
        DataType::Float => value
            .as_f64()
            .map(|v| Value::Float(v as f32))
            .ok_or_else(|| conversion_error(value, target)),
        DataType::Double => value
            .as_f64()
            .map(Value::Double)
            .ok_or_else(|| conversion_error(value, target)),
        DataType::BigDecimal => value
            .as_decimal()
            .map(Value::BigDecimal)
            .ok_or_else(|| conversion_error(value, target)),
        DataType::Boolean => Ok(Value::Boolean(value.signum() != Some(Ordering::Equal))),
        t if t.is_integral() => {
            // Truncates toward zero
            let truncated = match value {
                Value::BigDecimal(d) => d.trunc().to_i128(),
                other => other.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i128),
            };
            let v = truncated.ok_or_else(|| conversion_error(value, target))?;
            integral_to(value, v, target)
        }
        _ => Err(conversion_error(value, target)),
    }
}

fn parse_string(value: &Value, s: &str, target: DataType) -> Result<Value> {
    let trimmed = s.trim();
    let err = || conversion_error(value, target);
    Ok(match target {
        DataType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => return Err(err()),
        },
        DataType::Char => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::Char(c),
                _ => return Err(err()),
            }
        }
        t if t.is_integral() => {
            let v: i128 = trimmed.parse().map_err(|_| err())?;
            integral_to(value, v, t)?
        }
        DataType::Float => Value::Float(trimmed.parse().map_err(|_| err())?),
        DataType::Double => Value::Double(trimmed.parse().map_err(|_| err())?),
        DataType::BigDecimal => Value::BigDecimal(trimmed.parse().map_err(|_| err())?),
        DataType::Date => {
            Value::Date(NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| err())?)
        }
        DataType::Time => {
            Value::Time(NaiveTime::parse_from_str(trimmed, TIME_FORMAT).map_err(|_| err())?)
        }
        DataType::Timestamp => Value::Timestamp(
            NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
                .or_else(|_| {
                    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                        .map(|d| d.and_time(NaiveTime::MIN))
                })
                .map_err(|_| err())?,
        ),
        _ => return Err(err()),
    })
}

/// Convert `value` to `target`, failing with an evaluation error when the value does not
/// fit or cannot be parsed.
pub fn convert_value(value: &Value, target: DataType) -> Result<Value> {
    let source = value.data_type();
    if source == target || target == DataType::Object || value.is_null() {
        return Ok(value.clone());
    }
    if target == DataType::String {
        return Ok(Value::String(value.to_plain_string()));
    }
    match value {
        Value::String(s) => parse_string(value, s, target),
        Value::Char(c) => parse_string(value, &c.to_string(), target),
        Value::Boolean(b) if target.is_numeric() => {
            integral_to(value, if *b { 1 } else { 0 }, target)
        }
        v if source.is_numeric() => numeric_to(v, target),
        Value::Date(d) if target == DataType::Timestamp => {
            Ok(Value::Timestamp(d.and_time(NaiveTime::MIN)))
        }
        Value::Time(t) if target == DataType::Timestamp => Ok(Value::Timestamp(
            NaiveDate::from_ymd_opt(1970, 1, 1)
                .ok_or_else(|| conversion_error(value, target))?
                .and_time(*t),
        )),
        Value::Timestamp(ts) if target == DataType::Date => Ok(Value::Date(ts.date())),
        Value::Timestamp(ts) if target == DataType::Time => Ok(Value::Time(ts.time())),
        _ => Err(conversion_error(value, target)),
    }
}
