// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide registry of daemon type names.
//!
//! Seeded once with the static entries of the ebusd builtin data types
//! (<https://github.com/john30/ebusd/wiki/4.3.-Builtin-data-types>) and
//! grown lazily for the length-parameterized families. Entries are
//! value-equal, so two threads racing to insert the same name is
//! harmless.

use super::{Type, TimeSpec};
use dashmap::DashMap;
use regex::Regex;
use std::sync::OnceLock;

static REGISTRY: OnceLock<DashMap<String, Type>> = OnceLock::new();
static RE_BIT: OnceLock<Regex> = OnceLock::new();

/// Look up the [`Type`] for a daemon type name.
///
/// Returns `None` for names outside the builtin set and the
/// parameterized families; the catalog parser turns that into a parse
/// error for the offending line.
#[must_use]
pub fn get_type(name: &str) -> Option<Type> {
    let registry = REGISTRY.get_or_init(seed);
    if let Some(entry) = registry.get(name) {
        return Some(entry.clone());
    }
    let created = create_parameterized(name)?;
    registry.insert(name.to_string(), created.clone());
    Some(created)
}

/// Build `STR:n` / `NTS:n` / `HEX:n` / `BI0..BI7[:w]` types on demand.
fn create_parameterized(name: &str) -> Option<Type> {
    if let Some(len) = name.strip_prefix("STR:").or_else(|| name.strip_prefix("NTS:")) {
        return parse_length(len).map(|length| Type::Str { length });
    }
    if let Some(len) = name.strip_prefix("HEX:") {
        return parse_length(len).map(|length| Type::Hex { length });
    }
    let re_bit = RE_BIT.get_or_init(|| Regex::new(r"\ABI[0-7](:([1-7]))?\z").unwrap());
    if let Some(captures) = re_bit.captures(name) {
        let width: u32 = captures
            .get(2)
            .map_or(1, |m| m.as_str().parse().unwrap_or(1));
        if width > 1 {
            return Some(Type::int(0.0, f64::from(2_u32.pow(width) - 1)));
        }
        return Some(Type::Bool);
    }
    None
}

/// `*` means unbounded, otherwise a decimal length.
fn parse_length(len: &str) -> Option<Option<usize>> {
    if len == "*" {
        Some(None)
    } else {
        len.parse::<usize>().ok().map(Some)
    }
}

fn seed() -> DashMap<String, Type> {
    let map = DashMap::new();
    let time = || Type::Time(TimeSpec { minres: None, no_second: false });
    let short_time = || Type::Time(TimeSpec { minres: None, no_second: true });
    let trunc_time = |minres| Type::Time(TimeSpec { minres: Some(minres), no_second: true });

    // BCD / hex dates, day first
    map.insert("BDA".into(), Type::Date);
    map.insert("BDA:3".into(), Type::Date);
    map.insert("HDA".into(), Type::Date);
    map.insert("HDA:3".into(), Type::Date);
    // times with seconds
    map.insert("BTI".into(), time());
    map.insert("HTI".into(), time());
    map.insert("VTI".into(), time());
    // times without seconds
    map.insert("BTM".into(), short_time());
    map.insert("HTM".into(), short_time());
    map.insert("VTM".into(), short_time());
    map.insert("MIN".into(), short_time());
    // truncated times, multiples of 10/30/15 minutes
    map.insert("TTM".into(), trunc_time(10));
    map.insert("TTH".into(), trunc_time(30));
    map.insert("TTQ".into(), trunc_time(15));
    // weekdays
    map.insert("BDY".into(), Type::Weekday);
    map.insert("HDY".into(), Type::Weekday);
    // unsigned BCD
    map.insert("BCD".into(), Type::int(0.0, 99.0));
    map.insert("BCD:2".into(), Type::int(0.0, 9999.0));
    map.insert("BCD:3".into(), Type::int(0.0, 999_999.0));
    map.insert("BCD:4".into(), Type::int(0.0, 99_999_999.0));
    map.insert("PIN".into(), Type::Pin);
    // one-byte integers
    map.insert("UCH".into(), Type::int(0.0, 254.0));
    map.insert("SCH".into(), Type::int(-127.0, 127.0));
    map.insert("D1B".into(), Type::int(-127.0, 127.0));
    // scaled numbers
    map.insert("D1C".into(), Type::int_div(0.0, 100.0, 2.0));
    map.insert("D2B".into(), Type::int_div(-127.99, 127.99, 256.0));
    map.insert("D2C".into(), Type::int_div(-2047.9, 2047.9, 16.0));
    map.insert("FLT".into(), Type::int_div(-32.767, 32.767, 1000.0));
    map.insert("FLR".into(), Type::int_div(-32.767, 32.767, 1000.0));
    // floats
    map.insert("EXP".into(), Type::Float);
    map.insert("EXR".into(), Type::Float);
    // two-byte integers
    map.insert("UIN".into(), Type::int(0.0, 65534.0));
    map.insert("UIR".into(), Type::int(0.0, 65534.0));
    map.insert("SIN".into(), Type::int(-32767.0, 32767.0));
    map.insert("SIR".into(), Type::int(-32767.0, 32767.0));
    // three-byte integers
    map.insert("U3N".into(), Type::int(0.0, 16_777_214.0));
    map.insert("U3R".into(), Type::int(0.0, 16_777_214.0));
    map.insert("S3N".into(), Type::int(-8_388_607.0, 8_388_607.0));
    map.insert("S3R".into(), Type::int(-8_388_607.0, 8_388_607.0));
    // four-byte integers
    map.insert("ULG".into(), Type::int(0.0, 4_294_967_294.0));
    map.insert("ULR".into(), Type::int(0.0, 4_294_967_294.0));
    map.insert("SLG".into(), Type::int(-2_147_483_647.0, 2_147_483_647.0));
    map.insert("SLR".into(), Type::int(-2_147_483_647.0, 2_147_483_647.0));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn static_entries() {
        assert_eq!(get_type("UCH"), Some(Type::int(0.0, 254.0)));
        assert_eq!(get_type("D2C"), Some(Type::int_div(-2047.9, 2047.9, 16.0)));
        assert_eq!(get_type("BDA"), Some(Type::Date));
        assert_eq!(get_type("nonsense"), None);
    }

    #[test]
    fn parameterized_strings() {
        assert_eq!(get_type("STR:10"), Some(Type::Str { length: Some(10) }));
        assert_eq!(get_type("NTS:5"), Some(Type::Str { length: Some(5) }));
        assert_eq!(get_type("STR:*"), Some(Type::Str { length: None }));
        assert_eq!(get_type("HEX:4"), Some(Type::Hex { length: Some(4) }));
        assert_eq!(get_type("HEX:*"), Some(Type::Hex { length: None }));
        assert_eq!(get_type("STR:x"), None);
    }

    #[test]
    fn parameterized_bits() {
        assert_eq!(get_type("BI0"), Some(Type::Bool));
        assert_eq!(get_type("BI3:1"), Some(Type::Bool));
        assert_eq!(get_type("BI0:7"), Some(Type::int(0.0, 127.0)));
        assert_eq!(get_type("BI8"), None);
    }

    #[test]
    fn repeated_lookup_is_stable() {
        let first = get_type("STR:12").unwrap();
        let second = get_type("STR:12").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn bit_field_decodes_as_int() {
        let t = get_type("BI0:3").unwrap();
        assert_eq!(t.decode("5"), Value::Int(5));
    }
}
