// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The EBUS primitive type system.
//!
//! Every field carries one of roughly forty daemon data types (`UCH`,
//! `D2C`, `BDA`, ...). This module models them as one closed sum,
//! [`Type`], plus a process-wide registry mapping daemon type names to
//! instances. Static entries are seeded once; length-parameterized
//! families (`STR:n`, `NTS:n`, `HEX:n`, `BI0..BI7[:w]`) grow lazily on
//! first use.
//!
//! Decoding never panics and never aborts a message: an undecodable
//! string becomes [`Value::Invalid`], keeping the original payload.

mod registry;
mod value;

pub use registry::get_type;
pub use value::Value;

use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveTime};
use std::hash::{Hash, Hasher};

/// Sentinel strings the daemon uses for "no value".
const NA_SENTINELS: [&str; 4] = ["-", "-:-", "-:-:-", "-.-.-"];

/// Integer type parameters.
///
/// `min`/`max` bound the *logical* value; `divider` scales the raw wire
/// integer by `1/divider` to obtain it. Bounds are `f64` because divider
/// types have fractional ranges (`D2B` spans ±127.99).
#[derive(Debug, Clone)]
pub struct IntSpec {
    /// Lower limit of the logical value.
    pub min: f64,
    /// Upper limit of the logical value.
    pub max: f64,
    /// Granularity: the logical value is a multiple of `1/divider`.
    pub divider: Option<f64>,
}

impl PartialEq for IntSpec {
    fn eq(&self, other: &Self) -> bool {
        self.min.to_bits() == other.min.to_bits()
            && self.max.to_bits() == other.max.to_bits()
            && self.divider.map(f64::to_bits) == other.divider.map(f64::to_bits)
    }
}

impl Eq for IntSpec {}

impl Hash for IntSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.min.to_bits().hash(state);
        self.max.to_bits().hash(state);
        self.divider.map(f64::to_bits).hash(state);
    }
}

/// Time type parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeSpec {
    /// Minute resolution (10/15/30 for the truncated time types).
    pub minres: Option<u8>,
    /// `true` when the wire form omits seconds (`HH:MM`).
    pub no_second: bool,
}

/// An EBUS primitive type.
///
/// A closed tagged union: decoding dispatches on the tag, no trait
/// objects involved. Instances are value-equal and hashable, so racing
/// inserts into the registry are benign.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Character string with optional maximum length.
    Str {
        /// Maximum length; `None` is unbounded (`STR:*`).
        length: Option<usize>,
    },
    /// Space-separated hex octets with optional exact length.
    Hex {
        /// Exact octet count; `None` is unbounded (`HEX:*`).
        length: Option<usize>,
    },
    /// Integer, possibly scaled by a divider.
    Int(IntSpec),
    /// Boolean (`0` / `1` on the wire).
    Bool,
    /// Floating point.
    Float,
    /// Calendar date, `dd.mm.yyyy` on the wire.
    Date,
    /// Time of day, `HH:MM:SS` or `HH:MM` on the wire.
    Time(TimeSpec),
    /// Combined date and time. Only produced by virtual fields; on the
    /// wire this never appears as a single field.
    DateTime,
    /// Weekday name, passed through as string.
    Weekday,
    /// BCD pin code, passed through as string.
    Pin,
    /// Enumeration of the daemon's `k=v;...` value labels.
    Enum {
        /// Allowed value labels.
        values: Vec<String>,
    },
}

impl Type {
    /// Integer type shorthand used by the registry tables.
    pub(crate) fn int(min: f64, max: f64) -> Type {
        Type::Int(IntSpec {
            min,
            max,
            divider: None,
        })
    }

    /// Integer type with divider, used by the registry tables.
    pub(crate) fn int_div(min: f64, max: f64, divider: f64) -> Type {
        Type::Int(IntSpec {
            min,
            max,
            divider: Some(divider),
        })
    }

    /// Return a copy with `divider` applied.
    ///
    /// Composes multiplicatively with an existing divider and scales the
    /// bounds by `1/divider`. Only integer types support dividers; any
    /// other type yields `Error::Parse`, which the catalog parser reports
    /// for the offending line.
    pub fn with_divider(&self, divider: f64) -> Result<Type> {
        match self {
            Type::Int(spec) => {
                let composed = divider * spec.divider.unwrap_or(1.0);
                Ok(Type::Int(IntSpec {
                    min: spec.min / divider,
                    max: spec.max / divider,
                    divider: Some(composed),
                }))
            }
            _ => Err(Error::Parse(format!(
                "type {:?} does not take a divider",
                self
            ))),
        }
    }

    /// Decode a daemon payload string into a [`Value`].
    ///
    /// The four sentinel strings decode to [`Value::Na`] regardless of the
    /// type. A string that does not fit the type becomes
    /// [`Value::Invalid`] carrying the original text.
    #[must_use]
    pub fn decode(&self, raw: &str) -> Value {
        let raw = raw.trim();
        if NA_SENTINELS.contains(&raw) {
            return Value::Na;
        }
        match self.try_decode(raw) {
            Ok(value) => value,
            Err(reason) => Value::Invalid {
                raw: raw.to_string(),
                reason,
            },
        }
    }

    fn try_decode(&self, raw: &str) -> core::result::Result<Value, String> {
        match self {
            Type::Str { length } => {
                if let Some(max) = length {
                    if raw.chars().count() > *max {
                        return Err(format!("string exceeds length {}", max));
                    }
                }
                Ok(Value::Str(raw.to_string()))
            }
            Type::Hex { length } => {
                let octets = raw
                    .split(' ')
                    .filter(|part| !part.is_empty())
                    .map(|part| u8::from_str_radix(part, 16))
                    .collect::<core::result::Result<Vec<u8>, _>>()
                    .map_err(|e| format!("invalid hex octet: {}", e))?;
                if let Some(expected) = length {
                    if octets.len() != *expected {
                        return Err(format!(
                            "hex value {:?} has not expected length of {}",
                            raw, expected
                        ));
                    }
                }
                Ok(Value::Hex(octets))
            }
            Type::Int(spec) => {
                if spec.divider.is_some_and(|d| d > 0.0) {
                    raw.parse::<f64>()
                        .map(Value::Float)
                        .map_err(|e| e.to_string())
                } else {
                    raw.parse::<i64>().map(Value::Int).map_err(|e| e.to_string())
                }
            }
            Type::Bool => {
                let n: i64 = raw.parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
                Ok(Value::Bool(n != 0))
            }
            Type::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| e.to_string()),
            Type::Date => NaiveDate::parse_from_str(raw, "%d.%m.%Y")
                .map(Value::Date)
                .map_err(|e| e.to_string()),
            Type::Time(spec) => {
                let format = if spec.no_second { "%H:%M" } else { "%H:%M:%S" };
                NaiveTime::parse_from_str(raw, format)
                    .map(|t| value::time_value(t, !spec.no_second))
                    .map_err(|e| e.to_string())
            }
            // never on the wire as a single field, keep the text
            Type::DateTime | Type::Weekday | Type::Pin => Ok(Value::Str(raw.to_string())),
            Type::Enum { values } => {
                if values.iter().any(|v| v == raw) {
                    Ok(Value::Str(raw.to_string()))
                } else {
                    Err(format!("not one of {:?}", values))
                }
            }
        }
    }

    /// Encode a logical [`Value`] into the daemon's wire form.
    ///
    /// [`Value::Na`] encodes as the sentinel matching the type. Integer
    /// types multiply the logical value by the divider and render an
    /// integer string.
    pub fn encode(&self, value: &Value) -> Result<String> {
        if value.is_na() {
            return Ok(self.na_sentinel().to_string());
        }
        match (self, value) {
            (Type::Str { length }, Value::Str(s)) => {
                if let Some(max) = length {
                    if s.chars().count() > *max {
                        return Err(Error::Encode(format!(
                            "string {:?} exceeds length {}",
                            s, max
                        )));
                    }
                }
                Ok(s.clone())
            }
            (Type::Hex { length }, Value::Hex(octets)) => {
                if let Some(expected) = length {
                    if octets.len() != *expected {
                        return Err(Error::Encode(format!(
                            "expected {} hex octets, got {}",
                            expected,
                            octets.len()
                        )));
                    }
                }
                Ok(octets
                    .iter()
                    .map(|o| format!("{:02x}", o))
                    .collect::<Vec<_>>()
                    .join(" "))
            }
            (Type::Int(spec), value) => {
                let logical = match value {
                    Value::Int(i) => *i as f64,
                    Value::Float(x) => *x,
                    other => {
                        return Err(Error::Encode(format!(
                            "cannot encode {:?} as integer",
                            other
                        )))
                    }
                };
                if logical < spec.min || logical > spec.max {
                    return Err(Error::Encode(format!(
                        "{} out of range [{}, {}]",
                        logical, spec.min, spec.max
                    )));
                }
                let raw = logical * spec.divider.unwrap_or(1.0);
                Ok(format!("{}", raw.round() as i64))
            }
            (Type::Bool, Value::Bool(b)) => Ok(if *b { "1" } else { "0" }.to_string()),
            (Type::Float, Value::Float(x)) => Ok(format!("{}", x)),
            (Type::Float, Value::Int(i)) => Ok(format!("{}", i)),
            (Type::Date, Value::Date(d)) => Ok(d.format("%d.%m.%Y").to_string()),
            (Type::Time(spec), Value::Time { time, .. }) => {
                let format = if spec.no_second { "%H:%M" } else { "%H:%M:%S" };
                Ok(time.format(format).to_string())
            }
            (Type::Enum { values }, Value::Str(s)) => {
                if values.iter().any(|v| v == s) {
                    Ok(s.clone())
                } else {
                    Err(Error::Encode(format!("{:?} is not one of {:?}", s, values)))
                }
            }
            (Type::DateTime | Type::Weekday | Type::Pin, Value::Str(s)) => Ok(s.clone()),
            (type_, value) => Err(Error::Encode(format!(
                "value {:?} does not fit type {:?}",
                value, type_
            ))),
        }
    }

    /// The "not available" wire sentinel for this type.
    #[must_use]
    pub fn na_sentinel(&self) -> &'static str {
        match self {
            Type::Date => "-.-.-",
            Type::Time(spec) if spec.no_second => "-:-",
            Type::Time(_) => "-:-:-",
            _ => "-",
        }
    }
}
