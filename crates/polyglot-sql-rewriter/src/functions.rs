//! Function library
//!
//! Resolved functions carry a [`FunctionDescriptor`] naming the signature the resolver
//! picked and the [`BuiltinFunction`] implementing it. The rewriter looks descriptors up
//! by name and argument types when it synthesizes new calls, and invokes them when it
//! folds constants or checks inverse functions.

use chrono::{Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::types::{convert_value, is_implicit_conversion, DataType, Value};

/// Implementation selector for a function signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinFunction {
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
    Concat2,
    IfNull,
    Coalesce,
    NullIf,
    Repeat,
    Space,
    LCase,
    UCase,
    Char,
    Length,
    Convert,
    TimestampAdd,
    TimestampCreate,
    FromUnixtime,
    ParseTimestamp,
    FormatTimestamp,
    ParseDate,
    ParseTime,
    FormatDate,
    FormatTime,
    DecodeString,
    DecodeInteger,
    Now,
}

/// A resolved function signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    /// Parameter types; `Object` accepts any argument type
    pub arg_types: Vec<DataType>,
    pub return_type: DataType,
    /// The last parameter type may repeat
    #[serde(default)]
    pub varargs: bool,
    /// The function handles NULL arguments itself instead of returning NULL
    #[serde(default)]
    pub null_dependent: bool,
    pub deterministic: bool,
    pub method: BuiltinFunction,
}

impl FunctionDescriptor {
    pub fn new(
        name: &str,
        arg_types: &[DataType],
        return_type: DataType,
        method: BuiltinFunction,
    ) -> Self {
        FunctionDescriptor {
            name: name.to_string(),
            arg_types: arg_types.to_vec(),
            return_type,
            varargs: false,
            null_dependent: false,
            deterministic: true,
            method,
        }
    }

    fn null_dependent(mut self) -> Self {
        self.null_dependent = true;
        self
    }

    fn varargs(mut self) -> Self {
        self.varargs = true;
        self
    }

    fn nondeterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }

    fn param_type(&self, index: usize) -> Option<DataType> {
        match self.arg_types.get(index) {
            Some(ty) => Some(*ty),
            None if self.varargs => self.arg_types.last().copied(),
            None => None,
        }
    }

    fn accepts_arity(&self, count: usize) -> bool {
        if self.varargs {
            count >= self.arg_types.len()
        } else {
            count == self.arg_types.len()
        }
    }

    /// Whether the signature accepts exactly these argument types
    pub fn matches(&self, types: &[DataType]) -> bool {
        self.accepts_arity(types.len())
            && types.iter().enumerate().all(|(i, ty)| {
                self.param_type(i).is_some_and(|param| {
                    param == *ty || param == DataType::Object || *ty == DataType::Null
                })
            })
    }

    /// Whether the signature accepts these types after implicit conversion
    pub fn matches_implicitly(&self, types: &[DataType]) -> bool {
        self.accepts_arity(types.len())
            && types.iter().enumerate().all(|(i, ty)| {
                self.param_type(i)
                    .is_some_and(|param| is_implicit_conversion(*ty, param))
            })
    }

    /// Invoke the function on already evaluated arguments
    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        if !self.null_dependent && args.iter().any(Value::is_null) {
            return Ok(Value::Null);
        }
        let result = invoke_builtin(self, args)?;
        if result.is_null() || self.return_type == DataType::Object {
            return Ok(result);
        }
        convert_value(&result, self.return_type)
    }
}

fn arg<'a>(descriptor: &FunctionDescriptor, args: &'a [Value], index: usize) -> Result<&'a Value> {
    args.get(index).ok_or_else(|| {
        Error::evaluation(format!(
            "{} expects at least {} arguments",
            descriptor.name,
            index + 1
        ))
    })
}

fn string_arg<'a>(descriptor: &FunctionDescriptor, args: &'a [Value], index: usize) -> Result<&'a str> {
    arg(descriptor, args, index)?
        .as_str()
        .ok_or_else(|| Error::evaluation(format!("{} expects a string argument", descriptor.name)))
}

fn integer_arg(descriptor: &FunctionDescriptor, args: &[Value], index: usize) -> Result<i64> {
    arg(descriptor, args, index)?
        .as_i128()
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| {
            Error::evaluation(format!("{} expects an integer argument", descriptor.name))
        })
}

/// Longest string `repeat` and `space` may build, in bytes
pub const MAX_REPEAT_LENGTH: usize = 1 << 20;

fn repeated(descriptor: &FunctionDescriptor, text: &str, count: i64) -> Result<Value> {
    let count = usize::try_from(count.max(0)).unwrap_or(usize::MAX);
    match text.len().checked_mul(count) {
        Some(length) if length <= MAX_REPEAT_LENGTH => Ok(Value::String(text.repeat(count))),
        _ => Err(Error::evaluation(format!(
            "{} result would exceed {MAX_REPEAT_LENGTH} bytes",
            descriptor.name
        ))),
    }
}

fn timestamp_arg(descriptor: &FunctionDescriptor, args: &[Value], index: usize) -> Result<NaiveDateTime> {
    match convert_value(arg(descriptor, args, index)?, DataType::Timestamp)? {
        Value::Timestamp(ts) => Ok(ts),
        other => Err(Error::evaluation(format!(
            "{} expects a timestamp argument, got {}",
            descriptor.name, other
        ))),
    }
}

/// 1970-01-01 00:00:00
pub(crate) fn epoch() -> NaiveDateTime {
    NaiveDateTime::default()
}

fn arithmetic(descriptor: &FunctionDescriptor, args: &[Value]) -> Result<Value> {
    let left = arg(descriptor, args, 0)?;
    let right = arg(descriptor, args, 1)?;
    let op = descriptor.method;
    let overflow = || Error::evaluation(format!("arithmetic overflow in {left} {} {right}", descriptor.name));
    let ty = descriptor.return_type;

    if ty.is_integral() {
        let (a, b) = match (left.as_i128(), right.as_i128()) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(overflow()),
        };
        let value = match op {
            BuiltinFunction::Add => a.checked_add(b),
            BuiltinFunction::Subtract => a.checked_sub(b),
            BuiltinFunction::Multiply => a.checked_mul(b),
            _ => {
                if b == 0 {
                    return Err(Error::evaluation("division by zero"));
                }
                a.checked_div(b)
            }
        }
        .ok_or_else(overflow)?;
        return convert_value(&Value::BigInteger(value), ty);
    }

    if ty == DataType::BigDecimal {
        let (a, b) = match (left.as_decimal(), right.as_decimal()) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(overflow()),
        };
        let value = match op {
            BuiltinFunction::Add => a.checked_add(b),
            BuiltinFunction::Subtract => a.checked_sub(b),
            BuiltinFunction::Multiply => a.checked_mul(b),
            _ => {
                if b == Decimal::ZERO {
                    return Err(Error::evaluation("division by zero"));
                }
                a.checked_div(b)
            }
        }
        .ok_or_else(overflow)?;
        return Ok(Value::BigDecimal(value));
    }

    let (a, b) = match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(overflow()),
    };
    let value = match op {
        BuiltinFunction::Add => a + b,
        BuiltinFunction::Subtract => a - b,
        BuiltinFunction::Multiply => a * b,
        _ => {
            if b == 0.0 {
                return Err(Error::evaluation("division by zero"));
            }
            a / b
        }
    };
    convert_value(&Value::Double(value), ty)
}

fn timestamp_add(descriptor: &FunctionDescriptor, args: &[Value]) -> Result<Value> {
    let interval = string_arg(descriptor, args, 0)?.to_ascii_uppercase();
    let count = integer_arg(descriptor, args, 1)?;
    let original = arg(descriptor, args, 2)?;
    let ts = timestamp_arg(descriptor, args, 2)?;
    let out_of_range = || Error::evaluation(format!("timestampadd overflow for {original}"));
    let result = match interval.as_str() {
        "SQL_TSI_FRAC_SECOND" => ts.checked_add_signed(TimeDelta::nanoseconds(count)),
        "SQL_TSI_SECOND" => TimeDelta::try_seconds(count).and_then(|d| ts.checked_add_signed(d)),
        "SQL_TSI_MINUTE" => TimeDelta::try_minutes(count).and_then(|d| ts.checked_add_signed(d)),
        "SQL_TSI_HOUR" => TimeDelta::try_hours(count).and_then(|d| ts.checked_add_signed(d)),
        "SQL_TSI_DAY" => TimeDelta::try_days(count).and_then(|d| ts.checked_add_signed(d)),
        "SQL_TSI_WEEK" => TimeDelta::try_weeks(count).and_then(|d| ts.checked_add_signed(d)),
        "SQL_TSI_MONTH" | "SQL_TSI_QUARTER" | "SQL_TSI_YEAR" => {
            let months = match interval.as_str() {
                "SQL_TSI_MONTH" => count,
                "SQL_TSI_QUARTER" => count.checked_mul(3).ok_or_else(out_of_range)?,
                _ => count.checked_mul(12).ok_or_else(out_of_range)?,
            };
            let magnitude = Months::new(u32::try_from(months.unsigned_abs()).map_err(|_| out_of_range())?);
            if months >= 0 {
                ts.checked_add_months(magnitude)
            } else {
                ts.checked_sub_months(magnitude)
            }
        }
        other => {
            return Err(Error::evaluation(format!(
                "unknown timestampadd interval {other}"
            )))
        }
    }
    .ok_or_else(out_of_range)?;
    convert_value(&Value::Timestamp(result), original.data_type())
}

fn parse_timestamp(text: &str, format: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, format)
        .or_else(|_| NaiveDate::parse_from_str(text, format).map(|d| d.and_time(NaiveTime::MIN)))
        .or_else(|_| NaiveTime::parse_from_str(text, format).map(|t| epoch().date().and_time(t)))
        .map_err(|e| {
            Error::evaluation(format!("cannot parse '{text}' with format '{format}': {e}"))
        })
}

fn format_timestamp(ts: &NaiveDateTime, format: &str) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", ts.format(format))
        .map_err(|_| Error::evaluation(format!("invalid format pattern '{format}'")))?;
    Ok(out)
}

fn invoke_builtin(descriptor: &FunctionDescriptor, args: &[Value]) -> Result<Value> {
    use BuiltinFunction::*;

    match descriptor.method {
        Add | Subtract | Multiply | Divide => arithmetic(descriptor, args),
        Concat => Ok(Value::String(format!(
            "{}{}",
            string_arg(descriptor, args, 0)?,
            string_arg(descriptor, args, 1)?
        ))),
        Concat2 => {
            let a = arg(descriptor, args, 0)?;
            let b = arg(descriptor, args, 1)?;
            if a.is_null() && b.is_null() {
                return Ok(Value::Null);
            }
            let text = |v: &Value| if v.is_null() { String::new() } else { v.to_plain_string() };
            Ok(Value::String(format!("{}{}", text(a), text(b))))
        }
        IfNull | Coalesce => Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)),
        NullIf => {
            let a = arg(descriptor, args, 0)?;
            let b = arg(descriptor, args, 1)?;
            if a.compare(b) == Some(std::cmp::Ordering::Equal) {
                Ok(Value::Null)
            } else {
                Ok(a.clone())
            }
        }
        Repeat => repeated(
            descriptor,
            string_arg(descriptor, args, 0)?,
            integer_arg(descriptor, args, 1)?,
        ),
        Space => repeated(descriptor, " ", integer_arg(descriptor, args, 0)?),
        LCase => Ok(Value::String(string_arg(descriptor, args, 0)?.to_lowercase())),
        UCase => Ok(Value::String(string_arg(descriptor, args, 0)?.to_uppercase())),
        Char => {
            let code = integer_arg(descriptor, args, 0)?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(Value::Char)
                .ok_or_else(|| Error::evaluation(format!("invalid character code {code}")))
        }
        Length => Ok(Value::Integer(
            i32::try_from(string_arg(descriptor, args, 0)?.chars().count())
                .map_err(|_| Error::evaluation("string too long"))?,
        )),
        Convert => {
            let type_name = string_arg(descriptor, args, 1)?;
            let target = DataType::from_name(type_name)
                .ok_or_else(|| Error::evaluation(format!("unknown type {type_name}")))?;
            convert_value(arg(descriptor, args, 0)?, target)
        }
        TimestampAdd => timestamp_add(descriptor, args),
        TimestampCreate => {
            let date = match convert_value(arg(descriptor, args, 0)?, DataType::Date)? {
                Value::Date(d) => d,
                other => return Err(Error::evaluation(format!("expected date, got {other}"))),
            };
            let time = match convert_value(arg(descriptor, args, 1)?, DataType::Time)? {
                Value::Time(t) => t,
                other => return Err(Error::evaluation(format!("expected time, got {other}"))),
            };
            Ok(Value::Timestamp(date.and_time(time)))
        }
        FromUnixtime => {
            let seconds = integer_arg(descriptor, args, 0)?;
            TimeDelta::try_seconds(seconds)
                .and_then(|d| epoch().checked_add_signed(d))
                .map(Value::Timestamp)
                .ok_or_else(|| Error::evaluation(format!("from_unixtime overflow for {seconds}")))
        }
        ParseTimestamp | ParseDate | ParseTime => {
            let ts = parse_timestamp(
                string_arg(descriptor, args, 0)?,
                string_arg(descriptor, args, 1)?,
            )?;
            Ok(Value::Timestamp(ts))
        }
        FormatTimestamp | FormatDate | FormatTime => {
            let ts = timestamp_arg(descriptor, args, 0)?;
            Ok(Value::String(format_timestamp(
                &ts,
                string_arg(descriptor, args, 1)?,
            )?))
        }
        DecodeString | DecodeInteger => Err(Error::evaluation(format!(
            "{} is expanded to a CASE expression before evaluation",
            descriptor.name
        ))),
        Now => Ok(Value::Timestamp(Utc::now().naive_utc())),
    }
}

/// Registry of function signatures keyed by lowercase name
#[derive(Debug, Clone, Default)]
pub struct FunctionLibrary {
    functions: HashMap<String, Vec<FunctionDescriptor>>,
}

impl FunctionLibrary {
    /// An empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the built-in library
    pub fn builtin() -> Self {
        BUILTIN_FUNCTIONS.clone()
    }

    pub fn register(&mut self, descriptor: FunctionDescriptor) {
        self.functions
            .entry(descriptor.name.to_lowercase())
            .or_default()
            .push(descriptor);
    }

    /// Exact signature lookup
    pub fn find_function(&self, name: &str, types: &[DataType]) -> Option<&FunctionDescriptor> {
        self.functions
            .get(&name.to_lowercase())?
            .iter()
            .find(|d| d.matches(types))
    }

    /// Lookup allowing implicit argument conversions; exact matches win
    pub fn resolve(&self, name: &str, types: &[DataType]) -> Option<&FunctionDescriptor> {
        self.find_function(name, types).or_else(|| {
            self.functions
                .get(&name.to_lowercase())?
                .iter()
                .find(|d| d.matches_implicitly(types))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }
}

const ARITHMETIC_TYPES: &[DataType] = &[
    DataType::Integer,
    DataType::Long,
    DataType::BigInteger,
    DataType::Float,
    DataType::Double,
    DataType::BigDecimal,
];

const VALUE_TYPES: &[DataType] = &[
    DataType::Boolean,
    DataType::Byte,
    DataType::Short,
    DataType::Integer,
    DataType::Long,
    DataType::BigInteger,
    DataType::Float,
    DataType::Double,
    DataType::BigDecimal,
    DataType::String,
    DataType::Char,
    DataType::Date,
    DataType::Time,
    DataType::Timestamp,
    DataType::Object,
];

/// Built-in function signatures
pub static BUILTIN_FUNCTIONS: LazyLock<FunctionLibrary> = LazyLock::new(|| {
    use BuiltinFunction as F;
    use DataType::*;

    let mut lib = FunctionLibrary::new();

    for &ty in ARITHMETIC_TYPES {
        for (name, method) in [
            ("+", F::Add),
            ("-", F::Subtract),
            ("*", F::Multiply),
            ("/", F::Divide),
        ] {
            lib.register(FunctionDescriptor::new(name, &[ty, ty], ty, method));
        }
    }

    for &ty in VALUE_TYPES {
        lib.register(FunctionDescriptor::new("ifnull", &[ty, ty], ty, F::IfNull).null_dependent());
        lib.register(FunctionDescriptor::new("nvl", &[ty, ty], ty, F::IfNull).null_dependent());
        lib.register(FunctionDescriptor::new("nullif", &[ty, ty], ty, F::NullIf).null_dependent());
        lib.register(
            FunctionDescriptor::new("coalesce", &[ty, ty], ty, F::Coalesce)
                .null_dependent()
                .varargs(),
        );
    }

    for name in ["concat", "||"] {
        lib.register(FunctionDescriptor::new(name, &[String, String], String, F::Concat));
    }
    lib.register(
        FunctionDescriptor::new("concat2", &[String, String], String, F::Concat2).null_dependent(),
    );
    lib.register(FunctionDescriptor::new("repeat", &[String, Integer], String, F::Repeat));
    lib.register(FunctionDescriptor::new("space", &[Integer], String, F::Space));
    for name in ["lcase", "lower"] {
        lib.register(FunctionDescriptor::new(name, &[String], String, F::LCase));
    }
    for name in ["ucase", "upper"] {
        lib.register(FunctionDescriptor::new(name, &[String], String, F::UCase));
    }
    for name in ["char", "chr"] {
        lib.register(FunctionDescriptor::new(name, &[Integer], Char, F::Char));
    }
    lib.register(FunctionDescriptor::new("length", &[String], Integer, F::Length));
    for name in ["convert", "cast"] {
        lib.register(FunctionDescriptor::new(name, &[Object, String], Object, F::Convert));
    }

    for ty in [Timestamp, Date, Time] {
        lib.register(FunctionDescriptor::new(
            "timestampadd",
            &[String, Integer, ty],
            ty,
            F::TimestampAdd,
        ));
    }
    lib.register(FunctionDescriptor::new(
        "timestampcreate",
        &[Date, Time],
        Timestamp,
        F::TimestampCreate,
    ));
    lib.register(FunctionDescriptor::new(
        "from_unixtime",
        &[Integer],
        Timestamp,
        F::FromUnixtime,
    ));
    lib.register(FunctionDescriptor::new(
        "parsetimestamp",
        &[String, String],
        Timestamp,
        F::ParseTimestamp,
    ));
    lib.register(FunctionDescriptor::new(
        "formattimestamp",
        &[Timestamp, String],
        String,
        F::FormatTimestamp,
    ));
    lib.register(FunctionDescriptor::new("parsedate", &[String, String], Date, F::ParseDate));
    lib.register(FunctionDescriptor::new("parsetime", &[String, String], Time, F::ParseTime));
    lib.register(FunctionDescriptor::new("formatdate", &[Date, String], String, F::FormatDate));
    lib.register(FunctionDescriptor::new("formattime", &[Time, String], String, F::FormatTime));

    lib.register(FunctionDescriptor::new(
        "decodestring",
        &[String, String],
        String,
        F::DecodeString,
    ));
    lib.register(FunctionDescriptor::new(
        "decodestring",
        &[String, String, String],
        String,
        F::DecodeString,
    ));
    lib.register(FunctionDescriptor::new(
        "decodeinteger",
        &[String, String],
        Integer,
        F::DecodeInteger,
    ));
    lib.register(FunctionDescriptor::new(
        "decodeinteger",
        &[String, String, String],
        Integer,
        F::DecodeInteger,
    ));

    lib.register(FunctionDescriptor::new("now", &[], Timestamp, F::Now).nondeterministic());

    lib
});

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str, types: &[DataType]) -> FunctionDescriptor {
        BUILTIN_FUNCTIONS
            .find_function(name, types)
            .cloned()
            .unwrap_or_else(|| panic!("missing {name}{types:?}"))
    }

    #[test]
    fn test_find_function() {
        let plus = lookup("+", &[DataType::Integer, DataType::Integer]);
        assert_eq!(plus.return_type, DataType::Integer);
        assert!(BUILTIN_FUNCTIONS
            .find_function("+", &[DataType::Integer, DataType::Long])
            .is_none());
        let widened = BUILTIN_FUNCTIONS
            .resolve("+", &[DataType::Integer, DataType::Long])
            .unwrap();
        assert_eq!(widened.return_type, DataType::Long);
        assert!(lookup("convert", &[DataType::Date, DataType::String]).method == BuiltinFunction::Convert);
    }

    #[test]
    fn test_arithmetic() {
        let div = lookup("/", &[DataType::Integer, DataType::Integer]);
        assert_eq!(div.invoke(&[Value::Integer(7), Value::Integer(2)]).unwrap(), Value::Integer(3));
        assert!(div.invoke(&[Value::Integer(7), Value::Integer(0)]).is_err());
        assert_eq!(div.invoke(&[Value::Integer(7), Value::Null]).unwrap(), Value::Null);

        let add = lookup("+", &[DataType::Integer, DataType::Integer]);
        assert!(add.invoke(&[Value::Integer(i32::MAX), Value::Integer(1)]).is_err());
    }

    #[test]
    fn test_repeat_length_bounded() {
        let repeat = lookup("repeat", &[DataType::String, DataType::Integer]);
        let ab = Value::String("ab".into());
        assert_eq!(
            repeat.invoke(&[ab.clone(), Value::Integer(3)]).unwrap(),
            Value::String("ababab".into())
        );
        assert_eq!(
            repeat.invoke(&[ab.clone(), Value::Integer(-1)]).unwrap(),
            Value::String(String::new())
        );
        assert!(repeat.invoke(&[ab, Value::Integer(i32::MAX)]).is_err());

        let space = lookup("space", &[DataType::Integer]);
        let limit = i32::try_from(MAX_REPEAT_LENGTH).unwrap();
        assert!(space.invoke(&[Value::Integer(limit)]).is_ok());
        assert!(matches!(
            space.invoke(&[Value::Integer(limit + 1)]),
            Err(Error::Evaluation { .. })
        ));
    }

    #[test]
    fn test_null_dependent() {
        let ifnull = lookup("ifnull", &[DataType::String, DataType::String]);
        assert_eq!(
            ifnull.invoke(&[Value::Null, Value::String("x".into())]).unwrap(),
            Value::String("x".into())
        );
    }

    #[test]
    fn test_parse_and_format() {
        let parse = lookup("parsetimestamp", &[DataType::String, DataType::String]);
        let format = lookup("formattimestamp", &[DataType::Timestamp, DataType::String]);
        let fmt = Value::String("%Y%m%d".into());
        let ts = parse.invoke(&[Value::String("20240131".into()), fmt.clone()]).unwrap();
        assert_eq!(
            format.invoke(&[ts, fmt]).unwrap(),
            Value::String("20240131".into())
        );
        assert!(parse
            .invoke(&[Value::String("garbage".into()), Value::String("%Y%m%d".into())])
            .is_err());
    }

    #[test]
    fn test_timestampadd_keeps_type() {
        let add = lookup(
            "timestampadd",
            &[DataType::String, DataType::Integer, DataType::Date],
        );
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let result = add
            .invoke(&[
                Value::String("SQL_TSI_MONTH".into()),
                Value::Integer(1),
                Value::Date(date),
            ])
            .unwrap();
        assert_eq!(result, Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
    }
}
