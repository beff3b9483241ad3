// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event line decoding.
//!
//! Turns daemon event lines (`circuit name = v1;v2;...`) into [`Msg`]
//! values by looking the message up in the catalog and dispatching each
//! payload slot to its field type. Per-field failures stay inside the
//! message as error markers; payload-level failures yield a
//! [`BrokenMsg`].

use crate::error::{Error, Result};
use crate::msg::{BrokenMsg, Decoded, Field, Msg};
use crate::msgdef::{MsgDef, VirtFieldDef, VirtKind};
use crate::msgdefs::MsgDefs;
use crate::types::Value;
use regex::Regex;
use std::sync::{Arc, OnceLock};

static RE_LINE: OnceLock<Regex> = OnceLock::new();

/// Decode one event line against the catalog.
///
/// # Errors
///
/// `Error::Format` if the line does not match the event grammar,
/// `Error::UnknownMsg` if the catalog has no entry for it.
pub fn decode_line(msgdefs: &MsgDefs, line: &str) -> Result<Decoded> {
    // identifier class is [A-z0-9]: letters, digits and the punctuation
    // between Z and a (ebusd names may carry e.g. '_')
    let re = RE_LINE.get_or_init(|| {
        Regex::new(r"\A([\x41-\x7A0-9]+(?:\.[\x41-\x7A0-9]+)?) (\S+) (?:= )?(.*)\z").unwrap()
    });
    let captures = re
        .captures(line)
        .ok_or_else(|| Error::Format(line.to_string()))?;
    let circuit = captures.get(1).map_or("", |m| m.as_str());
    let name = captures.get(2).map_or("", |m| m.as_str());
    let payload = captures.get(3).map_or("", |m| m.as_str());
    let msgdef = msgdefs.get(circuit, name).ok_or_else(|| Error::UnknownMsg {
        circuit: circuit.to_string(),
        name: name.to_string(),
    })?;
    Ok(decode_value(msgdef, payload))
}

/// Decode a payload string against a message definition.
///
/// An empty payload, `no data stored`, an embedded `ERR:` or a field
/// count not matching an unnarrowed definition all yield
/// [`Decoded::Broken`]. Narrowed definitions (field subsets from pattern
/// resolution) pick their slots by payload position; positions beyond
/// the payload decode to NA.
#[must_use]
pub fn decode_value(msgdef: &Arc<MsgDef>, payload: &str) -> Decoded {
    let payload = payload.trim();
    if payload.is_empty() || payload == "no data stored" || payload.contains("ERR:") {
        return Decoded::Broken(BrokenMsg {
            msgdef: Arc::clone(msgdef),
            error: payload.to_string(),
        });
    }
    let values: Vec<&str> = payload.split(';').collect();
    if is_contiguous(msgdef) && values.len() != msgdef.fields.len() {
        return Decoded::Broken(BrokenMsg {
            msgdef: Arc::clone(msgdef),
            error: format!(
                "expected {} fields, got {} ({:?})",
                msgdef.fields.len(),
                values.len(),
                payload
            ),
        });
    }
    let mut fields: Vec<Field> = msgdef
        .fields
        .iter()
        .map(|fielddef| {
            let value = match values.get(fielddef.idx) {
                Some(raw) => fielddef.type_.decode(raw),
                None => Value::Na,
            };
            Field {
                name: fielddef.name.clone(),
                idx: Some(fielddef.idx),
                unit: fielddef.unit.clone(),
                comment: fielddef.comment.clone(),
                value,
            }
        })
        .collect();
    for virt in &msgdef.virtfields {
        let value = derive_virt(virt, &fields);
        fields.push(Field {
            name: virt.name.clone(),
            idx: None,
            unit: virt.unit.clone(),
            comment: None,
            value,
        });
    }
    Decoded::Msg(Msg {
        msgdef: Arc::clone(msgdef),
        fields,
    })
}

/// `true` when the definition covers payload positions `0..n` without
/// gaps, i.e. it is not a narrowed field selection.
fn is_contiguous(msgdef: &MsgDef) -> bool {
    msgdef
        .fields
        .last()
        .map_or(true, |last| last.idx + 1 == msgdef.fields.len())
}

fn derive_virt(virt: &VirtFieldDef, fields: &[Field]) -> Value {
    match &virt.kind {
        VirtKind::DateTimeFromParts {
            date_idx,
            time_idx,
            state_idx,
        } => {
            let date = match fields.get(*date_idx).map(|f| &f.value) {
                Some(Value::Date(date)) => *date,
                _ => return Value::Na,
            };
            let time = match fields.get(*time_idx).map(|f| &f.value) {
                Some(Value::Time { time, .. }) => *time,
                _ => return Value::Na,
            };
            let state = state_idx.and_then(|idx| fields.get(idx)).map(|f| &f.value);
            match state {
                None => Value::DateTime(date.and_time(time)),
                Some(Value::Str(s)) if s == "valid" => Value::DateTime(date.and_time(time)),
                Some(other) => other.clone(),
            }
        }
        VirtKind::SensorGated {
            value_idx,
            sensor_idx,
        } => {
            let sensor = fields.get(*sensor_idx).map(|f| &f.value);
            match sensor {
                Some(Value::Str(status)) if status == "ok" => fields
                    .get(*value_idx)
                    .map_or(Value::Na, |f| f.value.clone()),
                Some(other) => other.clone(),
                None => Value::Na,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgdefdecoder::decode_msgdef;

    fn catalog(lines: &[&str]) -> MsgDefs {
        let mut defs = MsgDefs::new();
        for line in lines {
            defs.add(Arc::new(decode_msgdef(line).unwrap()));
        }
        defs
    }

    #[test]
    fn decode_simple_temp() {
        let defs = catalog(&[r#"r,bai,Status01,temp1,s,D2C,,°C,"""#]);
        let decoded = decode_line(&defs, "bai Status01 = 27.5").unwrap();
        let msg = decoded.msg().unwrap();
        assert_eq!(msg.ident(), "bai/Status01");
        assert_eq!(msg.fields.len(), 1);
        assert_eq!(msg.fields[0].name, "temp1");
        assert_eq!(msg.fields[0].value, Value::Float(27.5));
        assert_eq!(msg.fields[0].unit.as_deref(), Some("°C"));
    }

    #[test]
    fn decode_without_equals_separator() {
        let defs = catalog(&["r,bai,Status01,temp1,s,UCH,,,"]);
        let msg = decode_line(&defs, "bai Status01 9").unwrap().msg().unwrap();
        assert_eq!(msg.fields[0].value, Value::Int(9));
    }

    #[test]
    fn decode_dotted_circuit() {
        let defs = catalog(&["r,mc.5,Status,temp,s,UCH,,,"]);
        let msg = decode_line(&defs, "mc.5 Status = 11").unwrap().msg().unwrap();
        assert_eq!(msg.ident(), "mc.5/Status");
    }

    #[test]
    fn decode_underscore_identifiers() {
        let defs = catalog(&["r,general_broadcast,outside_temp,temp,s,D2C,,°C,"]);
        let msg = decode_line(&defs, "general_broadcast outside_temp = 4.5")
            .unwrap()
            .msg()
            .unwrap();
        assert_eq!(msg.ident(), "general_broadcast/outside_temp");
        assert_eq!(msg.fields[0].value, Value::Float(4.5));
    }

    #[test]
    fn bad_format_and_unknown_message() {
        let defs = catalog(&["r,bai,Status01,temp1,s,UCH,,,"]);
        assert!(matches!(
            decode_line(&defs, "###"),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            decode_line(&defs, "hc Status0 = 1"),
            Err(Error::UnknownMsg { .. })
        ));
    }

    #[test]
    fn combined_datetime_virt() {
        let defs = catalog(&[
            "u,broadcast,datetime,outsidetemp,s,EXP,,°C,,time,s,BTI,,,,date,s,BDA,,,,dcfstate,s,UCH,0=nosignal;1=ok;2=sync;3=valid,,",
        ]);
        let msg = decode_line(
            &defs,
            "broadcast datetime = 4.500;20:47:01;14.12.2019;valid",
        )
        .unwrap()
        .msg()
        .unwrap();
        let virt = msg.fields.last().unwrap();
        assert_eq!(virt.name, "+date+time+dcfstate");
        assert_eq!(virt.idx, None);
        assert_eq!(virt.value.to_string(), "2019-12-14T20:47:01");
    }

    #[test]
    fn datetime_virt_passes_state_through() {
        let defs = catalog(&[
            "u,broadcast,datetime,outsidetemp,s,EXP,,°C,,time,s,BTI,,,,date,s,BDA,,,,dcfstate,s,UCH,0=nosignal;1=ok;2=sync;3=valid,,",
        ]);
        let msg = decode_line(
            &defs,
            "broadcast datetime = 4.500;20:47:01;14.12.2019;nosignal",
        )
        .unwrap()
        .msg()
        .unwrap();
        assert_eq!(msg.fields.last().unwrap().value, Value::Str("nosignal".into()));
    }

    #[test]
    fn datetime_virt_na_without_parts() {
        let defs = catalog(&[
            "u,broadcast,datetime,outsidetemp,s,EXP,,°C,,time,s,BTI,,,,date,s,BDA,,,,dcfstate,s,UCH,0=nosignal;1=ok;2=sync;3=valid,,",
        ]);
        let msg = decode_line(&defs, "broadcast datetime = 4.500;-:-:-;-.-.-;valid")
            .unwrap()
            .msg()
            .unwrap();
        assert_eq!(msg.fields.last().unwrap().value, Value::Na);
    }

    #[test]
    fn sensor_virt_gates_on_status() {
        let line = "r,bai,FlowTemp,temp,s,D2C,,°C,,sensor,s,UCH,0=ok;85=circuit,,";
        let defs = catalog(&[line]);
        let msg = decode_line(&defs, "bai FlowTemp = 27.5;ok")
            .unwrap()
            .msg()
            .unwrap();
        assert_eq!(msg.fields.last().unwrap().value, Value::Float(27.5));

        let msg = decode_line(&defs, "bai FlowTemp = 27.5;circuit")
            .unwrap()
            .msg()
            .unwrap();
        assert_eq!(msg.fields.last().unwrap().value, Value::Str("circuit".into()));
    }

    #[test]
    fn broken_payloads() {
        let defs = catalog(&["r,bai,Status01,temp1,s,UCH,,,"]);
        let msgdef = defs.get("bai", "Status01").unwrap();
        assert!(matches!(
            decode_value(msgdef, ""),
            Decoded::Broken(_)
        ));
        assert!(matches!(
            decode_value(msgdef, "no data stored"),
            Decoded::Broken(_)
        ));
        assert!(matches!(
            decode_value(msgdef, "ERR: element not found"),
            Decoded::Broken(_)
        ));
        assert!(matches!(
            decode_value(msgdef, "1;2;3"),
            Decoded::Broken(_)
        ));
    }

    #[test]
    fn field_decode_error_keeps_message_intact() {
        let defs = catalog(&["r,bai,Status,a,s,UCH,,,,b,s,UCH,,,"]);
        let msg = decode_line(&defs, "bai Status = xx;7").unwrap().msg().unwrap();
        assert!(matches!(msg.fields[0].value, Value::Invalid { .. }));
        assert_eq!(msg.fields[1].value, Value::Int(7));
    }

    #[test]
    fn narrowed_definition_picks_payload_positions() {
        let defs = catalog(&["r,hc,FlowTemp,a,s,UCH,,,,b,s,UCH,,,"]);
        let narrowed = defs.resolve("hc/FlowTemp/b").unwrap();
        let msgdef = narrowed.get("hc", "FlowTemp").unwrap();
        let msg = decode_value(msgdef, "9;11").msg().unwrap();
        assert_eq!(msg.fields.len(), 1);
        assert_eq!(msg.fields[0].value, Value::Int(11));
    }

    #[test]
    fn sentinel_values_decode_to_na() {
        let defs = catalog(&["r,bai,Status,a,s,UCH,,,,b,s,BDA,,,"]);
        let msg = decode_line(&defs, "bai Status = -;-.-.-").unwrap().msg().unwrap();
        assert_eq!(msg.fields[0].value, Value::Na);
        assert_eq!(msg.fields[1].value, Value::Na);
    }
}
