//! Driver-independent CQL types and values.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, TimeDelta};
use uuid::Uuid;

/// Type of a result column or schema column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Ascii,
    Text,
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Counter,
    Varint,
    Float,
    Double,
    Decimal,
    Blob,
    Uuid,
    Timeuuid,
    Inet,
    Timestamp,
    Date,
    Time,
    Duration,
    List(Box<ColumnType>),
    Set(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Tuple(Vec<ColumnType>),
    UserDefined { keyspace: String, name: String },
    Custom(String),
}

impl ColumnType {
    /// Whole-number types.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt
                | ColumnType::SmallInt
                | ColumnType::Int
                | ColumnType::BigInt
                | ColumnType::Counter
                | ColumnType::Varint
        )
    }

    /// Floating point and arbitrary precision decimal types.
    pub fn is_floating(&self) -> bool {
        matches!(
            self,
            ColumnType::Float | ColumnType::Double | ColumnType::Decimal
        )
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, ColumnType::Boolean)
    }

    /// Character types (`ascii`, `text`/`varchar`).
    pub fn is_string(&self) -> bool {
        matches!(self, ColumnType::Ascii | ColumnType::Text)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Ascii => f.write_str("ascii"),
            ColumnType::Text => f.write_str("text"),
            ColumnType::Boolean => f.write_str("boolean"),
            ColumnType::TinyInt => f.write_str("tinyint"),
            ColumnType::SmallInt => f.write_str("smallint"),
            ColumnType::Int => f.write_str("int"),
            ColumnType::BigInt => f.write_str("bigint"),
            ColumnType::Counter => f.write_str("counter"),
            ColumnType::Varint => f.write_str("varint"),
            ColumnType::Float => f.write_str("float"),
            ColumnType::Double => f.write_str("double"),
            ColumnType::Decimal => f.write_str("decimal"),
            ColumnType::Blob => f.write_str("blob"),
            ColumnType::Uuid => f.write_str("uuid"),
            ColumnType::Timeuuid => f.write_str("timeuuid"),
            ColumnType::Inet => f.write_str("inet"),
            ColumnType::Timestamp => f.write_str("timestamp"),
            ColumnType::Date => f.write_str("date"),
            ColumnType::Time => f.write_str("time"),
            ColumnType::Duration => f.write_str("duration"),
            ColumnType::List(elem) => write!(f, "list<{}>", elem),
            ColumnType::Set(elem) => write!(f, "set<{}>", elem),
            ColumnType::Map(key, value) => write!(f, "map<{}, {}>", key, value),
            ColumnType::Tuple(elems) => {
                f.write_str("tuple<")?;
                write_separated(f, elems.iter(), |f, t| write!(f, "{}", t))?;
                f.write_str(">")
            }
            ColumnType::UserDefined { name, .. } => f.write_str(name),
            ColumnType::Custom(class) => write!(f, "'{}'", class),
        }
    }
}

/// A single CQL value as returned by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Ascii(String),
    Text(String),
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Counter(i64),
    /// Arbitrary precision integer, already in decimal notation.
    Varint(String),
    Float(f32),
    Double(f64),
    /// Arbitrary precision decimal, already in decimal notation.
    Decimal(String),
    Blob(Vec<u8>),
    Uuid(Uuid),
    Timeuuid(Uuid),
    Inet(IpAddr),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    /// Days since the epoch, centred at 2^31.
    Date(u32),
    /// Nanoseconds since midnight.
    Time(i64),
    Duration {
        months: i32,
        days: i32,
        nanoseconds: i64,
    },
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Tuple(Vec<Option<Value>>),
    UserDefined(Vec<(String, Option<Value>)>),
    Empty,
}

impl Value {
    /// Borrow the string content of `ascii`/`text` values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Ascii(s) | Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Widen any fixed-size integer to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(*v as i64),
            Value::SmallInt(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::BigInt(v) | Value::Counter(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) | Value::Timeuuid(u) => Some(*u),
            _ => None,
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Ascii(s) | Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            other => write!(f, "{}", other),
        }
    }
}

fn write_separated<I, T, F>(f: &mut fmt::Formatter<'_>, items: I, mut each: F) -> fmt::Result
where
    I: IntoIterator<Item = T>,
    F: FnMut(&mut fmt::Formatter<'_>, T) -> fmt::Result,
{
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        each(f, item)?;
    }
    Ok(())
}

fn fmt_optional(f: &mut fmt::Formatter<'_>, value: &Option<Value>) -> fmt::Result {
    match value {
        Some(v) => v.fmt_nested(f),
        None => f.write_str("null"),
    }
}

const EPOCH_DAY_OFFSET: i64 = 1 << 31;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Ascii(s) | Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) | Value::Counter(v) => write!(f, "{}", v),
            Value::Varint(s) | Value::Decimal(s) => f.write_str(s),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Blob(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            Value::Uuid(u) | Value::Timeuuid(u) => write!(f, "{}", u.hyphenated()),
            Value::Inet(addr) => write!(f, "{}", addr),
            Value::Timestamp(millis) => match DateTime::from_timestamp_millis(*millis) {
                Some(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.3f%z")),
                None => write!(f, "{}", millis),
            },
            Value::Date(days) => {
                let offset = *days as i64 - EPOCH_DAY_OFFSET;
                let date = TimeDelta::try_days(offset).and_then(|delta| {
                    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(delta)
                });
                match date {
                    Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
                    None => write!(f, "{}", offset),
                }
            }
            Value::Time(nanos) => {
                let secs = nanos / NANOS_PER_SECOND;
                write!(
                    f,
                    "{:02}:{:02}:{:02}.{:09}",
                    secs / 3600,
                    (secs / 60) % 60,
                    secs % 60,
                    nanos % NANOS_PER_SECOND
                )
            }
            Value::Duration {
                months,
                days,
                nanoseconds,
            } => {
                if *months == 0 && *days == 0 && *nanoseconds == 0 {
                    return f.write_str("0s");
                }
                if *months != 0 {
                    write!(f, "{}mo", months)?;
                }
                if *days != 0 {
                    write!(f, "{}d", days)?;
                }
                if *nanoseconds != 0 {
                    write!(f, "{}ns", nanoseconds)?;
                }
                Ok(())
            }
            Value::List(items) => {
                f.write_str("[")?;
                write_separated(f, items, |f, v| v.fmt_nested(f))?;
                f.write_str("]")
            }
            Value::Set(items) => {
                f.write_str("{")?;
                write_separated(f, items, |f, v| v.fmt_nested(f))?;
                f.write_str("}")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                write_separated(f, entries, |f, (k, v)| {
                    k.fmt_nested(f)?;
                    f.write_str(": ")?;
                    v.fmt_nested(f)
                })?;
                f.write_str("}")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                write_separated(f, items, fmt_optional)?;
                f.write_str(")")
            }
            Value::UserDefined(fields) => {
                f.write_str("{")?;
                write_separated(f, fields, |f, (name, v)| {
                    write!(f, "{}: ", name)?;
                    fmt_optional(f, v)
                })?;
                f.write_str("}")
            }
            Value::Empty => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_predicates() {
        assert!(ColumnType::Counter.is_integral());
        assert!(ColumnType::Varint.is_integral());
        assert!(ColumnType::Decimal.is_floating());
        assert!(ColumnType::Boolean.is_boolean());
        assert!(ColumnType::Text.is_string());
        assert!(ColumnType::Ascii.is_string());
        assert!(!ColumnType::Uuid.is_string());
        assert!(!ColumnType::List(Box::new(ColumnType::Text)).is_string());
    }

    #[test]
    fn test_type_names() {
        let map = ColumnType::Map(Box::new(ColumnType::Text), Box::new(ColumnType::Int));
        assert_eq!(map.to_string(), "map<text, int>");
        let frozen = ColumnType::List(Box::new(ColumnType::Tuple(vec![
            ColumnType::Int,
            ColumnType::Timestamp,
        ])));
        assert_eq!(frozen.to_string(), "list<tuple<int, timestamp>>");
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Value::Blob(vec![0xca, 0xfe]).to_string(), "0xcafe");
        assert_eq!(Value::Timestamp(0).to_string(), "1970-01-01 00:00:00.000+0000");
        assert_eq!(Value::Date(1 << 31).to_string(), "1970-01-01");
        assert_eq!(Value::Date((1 << 31) + 365).to_string(), "1971-01-01");
        assert_eq!(
            Value::Time(13 * 3600 * NANOS_PER_SECOND + 5).to_string(),
            "13:00:00.000000005"
        );
        let duration = Value::Duration {
            months: 1,
            days: 2,
            nanoseconds: 0,
        };
        assert_eq!(duration.to_string(), "1mo2d");
    }

    #[test]
    fn test_collection_display() {
        let list = Value::List(vec![Value::Text("a".into()), Value::Text("it's".into())]);
        assert_eq!(list.to_string(), "['a', 'it''s']");

        let map = Value::Map(vec![(Value::Text("k".into()), Value::Int(1))]);
        assert_eq!(map.to_string(), "{'k': 1}");

        let tuple = Value::Tuple(vec![Some(Value::Int(1)), None]);
        assert_eq!(tuple.to_string(), "(1, null)");

        let udt = Value::UserDefined(vec![
            ("street".into(), Some(Value::Text("Main".into()))),
            ("zip".into(), None),
        ]);
        assert_eq!(udt.to_string(), "{street: 'Main', zip: null}");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Text("x".into()).as_text(), Some("x"));
        assert_eq!(Value::SmallInt(7).as_i64(), Some(7));
        assert_eq!(Value::Double(1.0).as_i64(), None);
        let id = Uuid::from_u128(42);
        assert_eq!(Value::Timeuuid(id).as_uuid(), Some(id));
    }
}
