use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::error::{Error, Result};
use crate::types::XdmType;

/// An atomic value: the non-node half of an item.
#[derive(Debug, Clone, PartialEq)]
pub enum Atomic {
    /// Untyped data atomized out of a node.
    Untyped(Rc<str>),
    String(Rc<str>),
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Binary(Rc<[u8]>),
}

impl Atomic {
    /// The value's position in the type lattice.
    pub fn xdm_type(&self) -> XdmType {
        match self {
            Atomic::Untyped(_) => XdmType::Untyped,
            Atomic::String(_) => XdmType::String,
            Atomic::Boolean(_) => XdmType::Boolean,
            Atomic::Integer(_) => XdmType::Integer,
            Atomic::Decimal(_) => XdmType::Decimal,
            Atomic::Date(_) => XdmType::Date,
            Atomic::DateTime(_) => XdmType::DateTime,
            Atomic::Binary(_) => XdmType::Binary,
        }
    }

    pub fn string_value(&self) -> String {
        match self {
            Atomic::Untyped(s) | Atomic::String(s) => s.to_string(),
            Atomic::Boolean(b) => b.to_string(),
            Atomic::Integer(i) => i.to_string(),
            Atomic::Decimal(d) => format_number(*d),
            Atomic::Date(d) => d.format("%Y-%m-%d").to_string(),
            Atomic::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            Atomic::Binary(b) => hex::encode(b),
        }
    }

    /// Effective boolean value.
    pub fn effective_boolean_value(&self) -> Result<bool> {
        match self {
            Atomic::Untyped(s) | Atomic::String(s) => Ok(!s.is_empty()),
            Atomic::Boolean(b) => Ok(*b),
            Atomic::Integer(i) => Ok(*i != 0),
            Atomic::Decimal(d) => Ok(!(*d == 0.0 || d.is_nan())),
            _ => Err(Error::type_error(format!(
                "no effective boolean value for {}",
                self.type_label()
            ))),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Atomic::Integer(_) | Atomic::Decimal(_))
    }

    /// Numeric value of an already numeric atomic.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Atomic::Integer(i) => Some(*i as f64),
            Atomic::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Convert to a number the way arithmetic atomization does: numerics
    /// pass through, untyped data is parsed, everything else is a type error.
    pub fn to_number(&self) -> Result<f64> {
        match self {
            Atomic::Integer(i) => Ok(*i as f64),
            Atomic::Decimal(d) => Ok(*d),
            Atomic::Untyped(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::cast(format!("cannot convert {:?} to a number", s))),
            other => Err(Error::type_error(format!(
                "{} is not a number",
                other.type_label()
            ))),
        }
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            Atomic::Untyped(_) => "untypedAtomic",
            Atomic::String(_) => "string",
            Atomic::Boolean(_) => "boolean",
            Atomic::Integer(_) => "integer",
            Atomic::Decimal(_) => "decimal",
            Atomic::Date(_) => "date",
            Atomic::DateTime(_) => "dateTime",
            Atomic::Binary(_) => "binary",
        }
    }
}

impl fmt::Display for Atomic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.string_value())
    }
}

/// Format a number the way `fn:string` does: integral values without a
/// fraction, NaN and infinities with their XPath spellings.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INF" } else { "-INF" }.to_string()
    } else if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl From<bool> for Atomic {
    fn from(b: bool) -> Self {
        Atomic::Boolean(b)
    }
}

impl From<i64> for Atomic {
    fn from(i: i64) -> Self {
        Atomic::Integer(i)
    }
}

impl From<usize> for Atomic {
    fn from(i: usize) -> Self {
        Atomic::Integer(i as i64)
    }
}

impl From<f64> for Atomic {
    fn from(d: f64) -> Self {
        Atomic::Decimal(d)
    }
}

impl From<String> for Atomic {
    fn from(s: String) -> Self {
        Atomic::String(Rc::from(s.as_str()))
    }
}

impl From<&str> for Atomic {
    fn from(s: &str) -> Self {
        Atomic::String(Rc::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(6.0), "6");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "INF");
    }

    #[test]
    fn test_effective_boolean_value() {
        assert!(Atomic::from("x").effective_boolean_value().unwrap());
        assert!(!Atomic::from("").effective_boolean_value().unwrap());
        assert!(!Atomic::Decimal(f64::NAN).effective_boolean_value().unwrap());
        assert!(Atomic::Integer(-1).effective_boolean_value().unwrap());
        assert!(Atomic::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .effective_boolean_value()
            .is_err());
    }

    #[test]
    fn test_to_number_from_untyped() {
        assert_eq!(Atomic::Untyped(" 4 ".into()).to_number().unwrap(), 4.0);
        assert!(Atomic::Untyped("x".into()).to_number().is_err());
        assert!(Atomic::from("4").to_number().is_err());
    }
}
