// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoded field values.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// A decoded field value.
///
/// The daemon delivers every field as a string; [`Type::decode`] turns that
/// string into one of these variants. Two special members exist beside the
/// plain data carriers:
///
/// * [`Value::Na`] - the daemon has no value (`-`, `-:-`, `-:-:-`, `-.-.-`).
/// * [`Value::Invalid`] - the string did not fit the field type. The
///   original string is preserved so nothing is lost; the rest of the
///   message stays intact.
///
/// [`Type::decode`]: crate::Type::decode
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Not available, the daemon reported the sentinel for the field type.
    Na,
    /// Integer value.
    Int(i64),
    /// Fractional value (integer types with divider, float types).
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// String value (string, enumeration, weekday, pin and pass-through types).
    Str(String),
    /// Hex octet sequence.
    Hex(Vec<u8>),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day. `seconds` records whether the wire form carries seconds,
    /// so the value renders the way the daemon sent it.
    Time {
        /// The time of day.
        time: NaiveTime,
        /// `false` for minute-resolution types (`HH:MM` wire form).
        seconds: bool,
    },
    /// Combined date and time (synthesized virtual fields).
    DateTime(NaiveDateTime),
    /// The payload string could not be decoded into the field type.
    Invalid {
        /// The original payload string.
        raw: String,
        /// Why the decode failed.
        reason: String,
    },
}

impl Value {
    /// `true` for every variant except [`Value::Na`] and [`Value::Invalid`].
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !matches!(self, Value::Na | Value::Invalid { .. })
    }

    /// `true` if the daemon reported no value.
    #[must_use]
    pub fn is_na(&self) -> bool {
        matches!(self, Value::Na)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Na => write!(f, "-"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::Hex(octets) => {
                for (i, octet) in octets.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "0x{:02x}", octet)?;
                }
                Ok(())
            }
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time { time, seconds } => {
                if *seconds {
                    write!(f, "{}", time.format("%H:%M:%S"))
                } else {
                    write!(f, "{}", time.format("%H:%M"))
                }
            }
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Value::Invalid { raw, .. } => write!(f, "!{}", raw),
        }
    }
}

/// Build a time-of-day value, normalizing the seconds flag.
pub(crate) fn time_value(time: NaiveTime, seconds: bool) -> Value {
    let time = if seconds {
        time
    } else {
        // drop a stray seconds component for minute-resolution types
        time.with_second(0).unwrap_or(time)
    };
    Value::Time { time, seconds }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(Value::Na.to_string(), "-");
        assert_eq!(Value::Int(-5).to_string(), "-5");
        assert_eq!(Value::Float(27.5).to_string(), "27.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Hex(vec![0x07, 0xa0]).to_string(), "0x07 0xa0");
        let d = NaiveDate::from_ymd_opt(2019, 12, 14).unwrap();
        assert_eq!(Value::Date(d).to_string(), "2019-12-14");
        let t = NaiveTime::from_hms_opt(20, 47, 1).unwrap();
        assert_eq!(
            Value::Time { time: t, seconds: true }.to_string(),
            "20:47:01"
        );
        let t = NaiveTime::from_hms_opt(20, 47, 0).unwrap();
        assert_eq!(
            Value::Time { time: t, seconds: false }.to_string(),
            "20:47"
        );
        assert_eq!(
            Value::DateTime(d.and_time(NaiveTime::from_hms_opt(20, 47, 1).unwrap())).to_string(),
            "2019-12-14T20:47:01"
        );
        let invalid = Value::Invalid {
            raw: "x".into(),
            reason: "nope".into(),
        };
        assert_eq!(invalid.to_string(), "!x");
    }

    #[test]
    fn usability() {
        assert!(Value::Int(1).is_usable());
        assert!(!Value::Na.is_usable());
        assert!(Value::Na.is_na());
        assert!(!Value::Invalid { raw: String::new(), reason: String::new() }.is_usable());
    }
}
