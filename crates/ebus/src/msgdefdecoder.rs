// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Catalog line parser.
//!
//! The daemon command `find -a -F type,circuit,name,fields` lists every
//! message it knows, one line each:
//!
//! ```text
//! type,circuit,name,[fieldname,part,datatype,divider-or-values,unit,comment]...
//! ```
//!
//! Field tuples are six columns wide; the trailing tuple may omit the
//! last columns. Comments may contain commas inside double quotes.
//! See <https://github.com/john30/ebusd/wiki/4.1.-Message-definition>.

use crate::error::{Error, Result};
use crate::msgdef::{FieldDef, MsgDef, VirtFieldDef, VirtKind};
use crate::types::{get_type, Type};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

static RE_FLAGS: OnceLock<Regex> = OnceLock::new();

/// Decode one catalog line into a [`MsgDef`].
///
/// # Errors
///
/// `Error::Parse` if the line has a malformed field-tuple count, an
/// unknown data type or an unusable divider. The caller (catalog load)
/// logs and skips such lines.
pub fn decode_msgdef(line: &str) -> Result<MsgDef> {
    let values = split_quoted(line);
    if values.len() < 3 {
        return Err(Error::Parse(format!("{:?}", line)));
    }
    let (read, prio, write, update) = decode_type_flags(&values[0]);
    let circuit = values[1].clone();
    let name = values[2].clone();
    let fields = decode_fields(&values[3..])
        .map_err(|detail| Error::Parse(format!("{:?} ({})", line, detail)))?;
    let virtfields = synthesize_virtfields(&fields);
    Ok(MsgDef::new(
        circuit, name, fields, virtfields, read, prio, write, update,
    ))
}

/// Decode the message flag column.
///
/// `r` with an optional priority digit marks readable, `w` anywhere
/// marks writable, and any remaining flag character marks the
/// update-on-change forms (`u`, `uw`).
pub fn decode_type_flags(flags: &str) -> (bool, Option<u8>, bool, bool) {
    let re = RE_FLAGS.get_or_init(|| Regex::new(r"\A(r)([1-9]?)").unwrap());
    let (read, prio) = match re.captures(flags) {
        Some(captures) => {
            let prio = captures.get(2).and_then(|m| m.as_str().parse::<u8>().ok());
            (true, prio)
        }
        None => (false, None),
    };
    let write = flags.contains('w');
    let update = !read && flags.len() > usize::from(write);
    (read, prio, write, update)
}

/// Comma-split honoring double-quoted segments; quotes are stripped.
fn split_quoted(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => values.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    values.push(current);
    values
}

fn decode_fields(columns: &[String]) -> core::result::Result<Vec<FieldDef>, String> {
    if !matches!(columns.len() % 6, 0 | 3 | 4 | 5) {
        return Err(format!("unexpected field column count {}", columns.len()));
    }
    let chunks: Vec<&[String]> = columns.chunks(6).collect();

    // ignored fields are dropped entirely and do not take a payload slot
    let kept: Vec<&[String]> = chunks
        .iter()
        .copied()
        .filter(|chunk| !chunk[2].starts_with("IGN"))
        .collect();

    // duplicate names get `.0`, `.1`, ... suffixes in encounter order
    let mut name_counts: HashMap<&str, usize> = HashMap::new();
    for chunk in &kept {
        *name_counts.entry(chunk[0].as_str()).or_insert(0) += 1;
    }
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut fields = Vec::with_capacity(kept.len());
    for (idx, chunk) in kept.iter().enumerate() {
        let base = chunk[0].as_str();
        let name = if name_counts[base] > 1 {
            let n = seen.entry(base).or_insert(0);
            let name = format!("{}.{}", base, n);
            *n += 1;
            name
        } else {
            base.to_string()
        };
        fields.push(decode_field(idx, name, chunk)?);
    }
    Ok(fields)
}

fn decode_field(
    idx: usize,
    name: String,
    chunk: &[String],
) -> core::result::Result<FieldDef, String> {
    let datatype = chunk[2]
        .split(',')
        .next()
        .unwrap_or_default();
    let mut type_ =
        get_type(datatype).ok_or_else(|| format!("unknown type {:?}", datatype))?;
    let dividervalues = chunk.get(3).map(String::as_str).unwrap_or_default();
    if !dividervalues.is_empty() {
        if dividervalues.contains('=') {
            type_ = Type::Enum {
                values: enum_values(dividervalues),
            };
        } else {
            let raw: i64 = dividervalues
                .parse()
                .map_err(|_| format!("invalid divider {:?}", dividervalues))?;
            if raw == 0 {
                return Err("divider must not be zero".to_string());
            }
            // negative means inverse: -N scales by N instead of 1/N
            let divider = if raw < 0 {
                -1.0 / raw as f64
            } else {
                raw as f64
            };
            type_ = type_.with_divider(divider).map_err(|e| e.to_string())?;
        }
    }
    let unit = chunk.get(4).cloned();
    let comment = chunk.get(5).cloned();
    Ok(FieldDef::new(idx, name, type_, unit, comment))
}

/// Value labels of a `k=v;...` string.
fn enum_values(dividervalues: &str) -> Vec<String> {
    dividervalues
        .split(';')
        .map(|pair| match pair.split_once('=') {
            Some((_, label)) => label.to_string(),
            None => pair.to_string(),
        })
        .collect()
}

/// Scan the physical fields once for the known virtual-field patterns.
///
/// A date field adjacent to a time field yields a combined datetime
/// (gated by a `dcfstate` field when one exists); a trailing field named
/// `sensor` yields a status-gated view of the first field. Only the
/// first date/time pair is considered.
fn synthesize_virtfields(fields: &[FieldDef]) -> Vec<VirtFieldDef> {
    let mut virtfields = Vec::new();
    let date_idx = fields.iter().position(|f| f.type_ == Type::Date);
    let time_idx = fields
        .iter()
        .position(|f| matches!(f.type_, Type::Time(_)));
    if let (Some(date_idx), Some(time_idx)) = (date_idx, time_idx) {
        if date_idx.abs_diff(time_idx) == 1 {
            let state_idx = fields.iter().position(|f| f.name == "dcfstate");
            let mut name = format!("+{}+{}", fields[date_idx].name, fields[time_idx].name);
            if state_idx.is_some() {
                name.push_str("+dcfstate");
            }
            virtfields.push(VirtFieldDef {
                name,
                type_: Type::DateTime,
                unit: None,
                kind: VirtKind::DateTimeFromParts {
                    date_idx,
                    time_idx,
                    state_idx,
                },
            });
        }
    }
    if fields.len() > 1 {
        if let Some(last) = fields.last() {
            if last.name == "sensor" {
                let value = &fields[0];
                virtfields.push(VirtFieldDef {
                    name: format!("+{}+{}", value.name, last.name),
                    type_: value.type_.clone(),
                    unit: value.unit.clone(),
                    kind: VirtKind::SensorGated {
                        value_idx: 0,
                        sensor_idx: fields.len() - 1,
                    },
                });
            }
        }
    }
    virtfields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_read_message() {
        let m = decode_msgdef(r#"r,mc.4,OtShutdownLimit,temp,s,UCH,,°C,"text, text""#).unwrap();
        assert_eq!(m.circuit, "mc.4");
        assert_eq!(m.name, "OtShutdownLimit");
        assert!(m.read && !m.write && !m.update);
        assert_eq!(m.prio, None);
        assert_eq!(m.fields.len(), 1);
        let f = &m.fields[0];
        assert_eq!((f.idx, f.name.as_str()), (0, "temp"));
        assert_eq!(f.type_, Type::int(0.0, 254.0));
        assert_eq!(f.unit.as_deref(), Some("°C"));
        assert_eq!(f.comment.as_deref(), Some("text, text"));
    }

    #[test]
    fn write_message_with_divider_type() {
        let m = decode_msgdef("w,ui,TempIncrease,temp,m,D2C,,°C,Temperatur").unwrap();
        assert!(!m.read && m.write && !m.update);
        assert_eq!(m.fields[0].type_, Type::int_div(-2047.9, 2047.9, 16.0));
        assert_eq!(m.fields[0].comment.as_deref(), Some("Temperatur"));
    }

    #[test]
    fn flag_forms() {
        assert_eq!(decode_type_flags("r"), (true, None, false, false));
        assert_eq!(decode_type_flags("r5"), (true, Some(5), false, false));
        assert_eq!(decode_type_flags("rw"), (true, None, true, false));
        assert_eq!(decode_type_flags("w"), (false, None, true, false));
        assert_eq!(decode_type_flags("u"), (false, None, false, true));
        assert_eq!(decode_type_flags("uw"), (false, None, true, true));
    }

    #[test]
    fn duplicate_names_are_suffixed() {
        let m = decode_msgdef(
            "r,mc,Timer,from,s,TTM,,,,to,s,TTM,,,,from,s,TTM,,,,to,s,TTM,,,",
        )
        .unwrap();
        let names: Vec<&str> = m.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["from.0", "to.0", "from.1", "to.1"]);
        let idxs: Vec<usize> = m.fields.iter().map(|f| f.idx).collect();
        assert_eq!(idxs, [0, 1, 2, 3]);
    }

    #[test]
    fn ignored_fields_take_no_slot() {
        let m = decode_msgdef("r,bai,Status,temp,s,UCH,,°C,,x,s,IGN:2,,,,press,s,UCH,,bar,")
            .unwrap();
        let names: Vec<&str> = m.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["temp", "press"]);
        assert_eq!(m.fields[1].idx, 1);
    }

    #[test]
    fn divider_values_become_enum() {
        let m = decode_msgdef("r,bai,Mode,mode,s,UCH,0=off;1=on;2=auto,,").unwrap();
        assert_eq!(
            m.fields[0].type_,
            Type::Enum {
                values: vec!["off".into(), "on".into(), "auto".into()]
            }
        );
    }

    #[test]
    fn negative_divider_is_inverse() {
        let m = decode_msgdef("r,bai,Energy,count,s,UCH,-10,,").unwrap();
        match &m.fields[0].type_ {
            Type::Int(spec) => {
                assert_eq!(spec.divider, Some(0.1));
                assert_eq!(spec.max, 2540.0);
            }
            other => panic!("unexpected type {:?}", other),
        }
    }

    #[test]
    fn short_trailing_tuple() {
        // 3, 4 and 5 trailing columns are all legal
        assert!(decode_msgdef("r,bai,A,x,s,UCH").is_ok());
        assert!(decode_msgdef("r,bai,A,x,s,UCH,").is_ok());
        assert!(decode_msgdef("r,bai,A,x,s,UCH,,°C").is_ok());
    }

    #[test]
    fn malformed_lines_fail() {
        assert!(decode_msgdef("r,bai").is_err());
        assert!(decode_msgdef("r,bai,A,x,s").is_err());
        assert!(decode_msgdef("r,bai,A,x,s,NOPE,,,").is_err());
        assert!(decode_msgdef("r,bai,A,x,s,UCH,0,,").is_err());
    }

    #[test]
    fn datetime_virt_with_dcfstate() {
        let m = decode_msgdef(
            "u,broadcast,datetime,outsidetemp,s,D2B,,°C,,time,s,BTI,,,,date,s,BDA,,,,dcfstate,s,UCH,0=nosignal;1=ok;2=sync;3=valid,,",
        )
        .unwrap();
        assert_eq!(m.virtfields.len(), 1);
        let v = &m.virtfields[0];
        assert_eq!(v.name, "+date+time+dcfstate");
        assert_eq!(v.type_, Type::DateTime);
        assert_eq!(
            v.kind,
            VirtKind::DateTimeFromParts {
                date_idx: 2,
                time_idx: 1,
                state_idx: Some(3)
            }
        );
    }

    #[test]
    fn datetime_virt_requires_adjacency() {
        let m = decode_msgdef(
            "r,x,Y,date,s,BDA,,,,gap,s,UCH,,,,time,s,BTI,,,",
        )
        .unwrap();
        assert!(m.virtfields.is_empty());
    }

    #[test]
    fn sensor_virt() {
        let m = decode_msgdef("r,bai,FlowTemp,temp,s,D2C,,°C,,sensor,s,UCH,0=ok;85=circuit,,")
            .unwrap();
        assert_eq!(m.virtfields.len(), 1);
        let v = &m.virtfields[0];
        assert_eq!(v.name, "+temp+sensor");
        assert_eq!(v.unit.as_deref(), Some("°C"));
        assert_eq!(
            v.kind,
            VirtKind::SensorGated {
                value_idx: 0,
                sensor_idx: 1
            }
        );
    }

    #[test]
    fn quoted_split() {
        assert_eq!(
            split_quoted(r#"a,"b,c",d"#),
            vec!["a".to_string(), "b,c".to_string(), "d".to_string()]
        );
        assert_eq!(split_quoted("a,,c"), vec!["a", "", "c"]);
    }
}
