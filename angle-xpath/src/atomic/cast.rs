use std::rc::Rc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::{Error, Result};
use crate::types::XdmType;

use super::atomic_core::Atomic;

impl Atomic {
    /// `cast as` semantics over the type lattice.
    pub fn cast_to(&self, target: XdmType) -> Result<Atomic> {
        if self.xdm_type() == target {
            return Ok(self.clone());
        }
        match target {
            XdmType::Untyped => Ok(Atomic::Untyped(Rc::from(self.string_value().as_str()))),
            XdmType::String => Ok(Atomic::from(self.string_value())),
            XdmType::Boolean => self.cast_boolean(),
            XdmType::Integer => self.cast_integer(),
            XdmType::Decimal => self.cast_decimal(),
            XdmType::Date => self.cast_date(),
            XdmType::DateTime => self.cast_datetime(),
            XdmType::Binary => Err(Error::cast(format!(
                "cannot cast {} to binary",
                self.type_label()
            ))),
            XdmType::Any | XdmType::Atomic | XdmType::Node => Err(Error::cast(format!(
                "cannot cast to abstract type {:?}",
                target
            ))),
        }
    }

    /// `castable as`: never errors.
    pub fn castable_to(&self, target: XdmType) -> bool {
        self.cast_to(target).is_ok()
    }

    fn cast_boolean(&self) -> Result<Atomic> {
        match self {
            Atomic::Boolean(b) => Ok(Atomic::Boolean(*b)),
            Atomic::Integer(i) => Ok(Atomic::Boolean(*i != 0)),
            Atomic::Decimal(d) => Ok(Atomic::Boolean(!(*d == 0.0 || d.is_nan()))),
            Atomic::Untyped(s) | Atomic::String(s) => match s.trim() {
                "true" | "1" => Ok(Atomic::Boolean(true)),
                "false" | "0" => Ok(Atomic::Boolean(false)),
                other => Err(Error::cast(format!("{:?} is not a boolean", other))),
            },
            other => Err(Error::cast(format!(
                "cannot cast {} to boolean",
                other.type_label()
            ))),
        }
    }

    fn cast_integer(&self) -> Result<Atomic> {
        match self {
            Atomic::Integer(i) => Ok(Atomic::Integer(*i)),
            Atomic::Decimal(d) => {
                if d.is_finite() {
                    Ok(Atomic::Integer(d.trunc() as i64))
                } else {
                    Err(Error::cast(format!("{} has no integer value", d)))
                }
            }
            Atomic::Boolean(b) => Ok(Atomic::Integer(if *b { 1 } else { 0 })),
            Atomic::Untyped(s) | Atomic::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Atomic::Integer)
                .map_err(|_| Error::cast(format!("{:?} is not an integer", s))),
            other => Err(Error::cast(format!(
                "cannot cast {} to integer",
                other.type_label()
            ))),
        }
    }

    fn cast_decimal(&self) -> Result<Atomic> {
        match self {
            Atomic::Decimal(d) => Ok(Atomic::Decimal(*d)),
            Atomic::Integer(i) => Ok(Atomic::Decimal(*i as f64)),
            Atomic::Boolean(b) => Ok(Atomic::Decimal(if *b { 1.0 } else { 0.0 })),
            Atomic::Untyped(s) | Atomic::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Atomic::Decimal)
                .map_err(|_| Error::cast(format!("{:?} is not a number", s))),
            other => Err(Error::cast(format!(
                "cannot cast {} to decimal",
                other.type_label()
            ))),
        }
    }

    fn cast_date(&self) -> Result<Atomic> {
        match self {
            Atomic::Date(d) => Ok(Atomic::Date(*d)),
            Atomic::DateTime(dt) => Ok(Atomic::Date(dt.date_naive())),
            Atomic::Untyped(s) | Atomic::String(s) => {
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(Atomic::Date)
                    .map_err(|_| Error::cast(format!("{:?} is not a date", s)))
            }
            other => Err(Error::cast(format!(
                "cannot cast {} to date",
                other.type_label()
            ))),
        }
    }

    fn cast_datetime(&self) -> Result<Atomic> {
        match self {
            Atomic::DateTime(dt) => Ok(Atomic::DateTime(*dt)),
            Atomic::Date(d) => {
                let midnight = d.and_time(NaiveTime::MIN);
                let dt = Utc
                    .from_utc_datetime(&midnight)
                    .with_timezone(&FixedOffset::east_opt(0).unwrap());
                Ok(Atomic::DateTime(dt))
            }
            Atomic::Untyped(s) | Atomic::String(s) => parse_datetime(s.trim())
                .map(Atomic::DateTime)
                .ok_or_else(|| Error::cast(format!("{:?} is not a dateTime", s))),
            other => Err(Error::cast(format!(
                "cannot cast {} to dateTime",
                other.type_label()
            ))),
        }
    }
}

fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    // a dateTime without zone offset is taken as UTC
    text.parse::<chrono::NaiveDateTime>()
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_string_to_number() {
        assert_eq!(
            Atomic::from("42").cast_to(XdmType::Integer).unwrap(),
            Atomic::Integer(42)
        );
        assert_eq!(
            Atomic::from("2.5").cast_to(XdmType::Decimal).unwrap(),
            Atomic::Decimal(2.5)
        );
    }

    #[test]
    fn test_cast_is_stable_on_same_type() {
        let value = Atomic::Integer(7);
        assert_eq!(value.cast_to(XdmType::Integer).unwrap(), value);
    }

    #[test]
    fn test_castable_never_errors() {
        assert!(!Atomic::from("nope").castable_to(XdmType::Integer));
        assert!(Atomic::from("3").castable_to(XdmType::Integer));
        assert!(!Atomic::Boolean(true).castable_to(XdmType::Date));
    }

    #[test]
    fn test_cast_dates() {
        let date = Atomic::from("2024-03-01").cast_to(XdmType::Date).unwrap();
        assert_eq!(date.string_value(), "2024-03-01");
        let dt = date.cast_to(XdmType::DateTime).unwrap();
        assert_eq!(dt.string_value(), "2024-03-01T00:00:00+00:00");
        assert_eq!(dt.cast_to(XdmType::Date).unwrap(), date);
    }

    #[test]
    fn test_cast_boolean_lexical() {
        assert_eq!(
            Atomic::from("1").cast_to(XdmType::Boolean).unwrap(),
            Atomic::Boolean(true)
        );
        assert!(Atomic::from("yes").cast_to(XdmType::Boolean).is_err());
    }
}
