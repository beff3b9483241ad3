// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoded messages.

use crate::msgdef::MsgDef;
use crate::msgdefs::MsgDefs;
use crate::types::Value;
use std::sync::Arc;

/// One decoded field of a message.
///
/// Self-contained copy of the definition facts a consumer needs, plus
/// the decoded value. `idx` is `None` for virtual fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Unique field name within the message.
    pub name: String,
    /// Payload position; `None` for virtual fields.
    pub idx: Option<usize>,
    /// Unit of the value, if any.
    pub unit: Option<String>,
    /// Comment from the catalog, if any.
    pub comment: Option<String>,
    /// The decoded value.
    pub value: Value,
}

impl Field {
    /// Value with the unit appended (`27.5°C`), or just the value.
    #[must_use]
    pub fn unitvalue(&self) -> String {
        if !self.value.is_usable() {
            return self.value.to_string();
        }
        match &self.unit {
            Some(unit) => format!("{}{}", self.value, unit),
            None => self.value.to_string(),
        }
    }
}

/// A decoded message: the definition it was decoded against plus one
/// [`Field`] per definition child, physical fields first.
#[derive(Debug, Clone, PartialEq)]
pub struct Msg {
    /// The definition the payload was decoded against.
    pub msgdef: Arc<MsgDef>,
    /// Decoded fields, in definition order.
    pub fields: Vec<Field>,
}

impl Msg {
    /// `circuit/name` identifier.
    #[must_use]
    pub fn ident(&self) -> String {
        self.msgdef.ident()
    }

    /// `circuit/name/field` identifier for one of this message's fields.
    #[must_use]
    pub fn field_ident(&self, field: &Field) -> String {
        format!("{}/{}", self.msgdef.ident(), field.name)
    }
}

/// A message whose payload could not be parsed into field values
/// (`no data stored`, embedded `ERR:`, bad field count).
///
/// Carried as a value so one unusable payload never aborts a stream;
/// the consumer can report it and move on.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokenMsg {
    /// The definition the payload belongs to.
    pub msgdef: Arc<MsgDef>,
    /// The offending payload or daemon error text.
    pub error: String,
}

impl BrokenMsg {
    /// `circuit/name` identifier.
    #[must_use]
    pub fn ident(&self) -> String {
        self.msgdef.ident()
    }
}

/// Outcome of decoding one daemon payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The payload decoded into a message.
    Msg(Msg),
    /// The payload was present but unusable.
    Broken(BrokenMsg),
}

impl Decoded {
    /// The decoded message, if the payload was usable.
    #[must_use]
    pub fn msg(self) -> Option<Msg> {
        match self {
            Decoded::Msg(msg) => Some(msg),
            Decoded::Broken(_) => None,
        }
    }

    /// The definition the payload was decoded against.
    #[must_use]
    pub fn msgdef(&self) -> &Arc<MsgDef> {
        match self {
            Decoded::Msg(msg) => &msg.msgdef,
            Decoded::Broken(broken) => &broken.msgdef,
        }
    }
}

/// Strip a message down to a selection.
///
/// `None` when the selection holds no entry with the message's identity.
/// When the selection entry equals the message's own definition the
/// message passes through untouched; otherwise a new message is built
/// carrying only the fields present in the selection entry (virtual
/// fields are dropped from narrowed messages).
#[must_use]
pub fn filter_msg(msg: &Msg, msgdefs: &MsgDefs) -> Option<Msg> {
    let selected = msgdefs.get(&msg.msgdef.circuit, &msg.msgdef.name)?;
    if *selected == msg.msgdef {
        return Some(msg.clone());
    }
    let fields = msg
        .fields
        .iter()
        .filter(|field| {
            selected
                .fields
                .iter()
                .any(|fd| Some(fd.idx) == field.idx && fd.name == field.name)
        })
        .cloned()
        .collect();
    Some(Msg {
        msgdef: Arc::clone(selected),
        fields,
    })
}
