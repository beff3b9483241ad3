// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message and field definitions.
//!
//! These records are immutable once built: the catalog parser constructs
//! them, the catalog store hands out shared references, and narrowing
//! (pattern resolution) always produces fresh copies. Structural equality
//! and hashing over the full tuple of members makes deduplication in
//! `resolve` trivial.

use crate::types::Type;

/// One physical field of a message payload.
///
/// `idx` is the field's semicolon position in the daemon payload, counted
/// across all non-ignored fields. Names are unique within a message:
/// the parser suffixes duplicates with `.0`, `.1`, ... in encounter
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDef {
    /// Semicolon position within the payload.
    pub idx: usize,
    /// Unique field name within the message.
    pub name: String,
    /// Field data type.
    pub type_: Type,
    /// Unit of the value (`°C`, `bar`, ...), passed through opaquely.
    pub unit: Option<String>,
    /// Comment from the catalog, passed through opaquely.
    pub comment: Option<String>,
}

impl FieldDef {
    /// New field definition; empty unit/comment strings collapse to `None`.
    #[must_use]
    pub fn new(
        idx: usize,
        name: impl Into<String>,
        type_: Type,
        unit: Option<String>,
        comment: Option<String>,
    ) -> FieldDef {
        FieldDef {
            idx,
            name: name.into(),
            type_,
            unit: unit.filter(|u| !u.is_empty()),
            comment: comment.filter(|c| !c.is_empty()),
        }
    }
}

/// How a virtual field derives its value from the physical fields.
///
/// Indices refer to positions within the message's physical field list
/// (which equal the payload positions for an unnarrowed definition).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VirtKind {
    /// Combine a date field and an adjacent time field into a datetime.
    /// With a `dcfstate` field present, the state gates the result: only
    /// `valid` yields a datetime, any other state passes through as text.
    DateTimeFromParts {
        /// Position of the date field.
        date_idx: usize,
        /// Position of the time field.
        time_idx: usize,
        /// Position of the `dcfstate` field, if any.
        state_idx: Option<usize>,
    },
    /// Expose the value field when the sensor reports `ok`, otherwise the
    /// sensor status string.
    SensorGated {
        /// Position of the value field.
        value_idx: usize,
        /// Position of the trailing `sensor` field.
        sensor_idx: usize,
    },
}

/// A synthesized field derived from physical fields of the same message.
///
/// Virtual fields have no payload position of their own; they are
/// appended after the physical fields when a message is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtFieldDef {
    /// Name, conventionally `+part+part` over the source field names.
    pub name: String,
    /// Result type.
    pub type_: Type,
    /// Unit inherited from the source value field, if any.
    pub unit: Option<String>,
    /// Derivation rule.
    pub kind: VirtKind,
}

/// An immutable message definition.
///
/// Equality and hash cover the whole record, so two definitions with the
/// same identity but different field subsets (as produced by pattern
/// resolution) compare unequal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MsgDef {
    /// Circuit name (`bai`, `mc.5`, ...).
    pub circuit: String,
    /// Message name.
    pub name: String,
    /// Physical fields, ordered by payload position.
    pub fields: Vec<FieldDef>,
    /// Virtual fields, appended after the physical fields.
    pub virtfields: Vec<VirtFieldDef>,
    /// Message is intended to be read.
    pub read: bool,
    /// Polling priority, only meaningful for readable messages.
    pub prio: Option<u8>,
    /// Message is intended to be written.
    pub write: bool,
    /// Message is seen automatically on every value change.
    pub update: bool,
}

impl MsgDef {
    /// New message definition.
    ///
    /// Enforces the invariant that non-readable messages carry no
    /// priority.
    #[must_use]
    pub fn new(
        circuit: impl Into<String>,
        name: impl Into<String>,
        fields: Vec<FieldDef>,
        virtfields: Vec<VirtFieldDef>,
        read: bool,
        prio: Option<u8>,
        write: bool,
        update: bool,
    ) -> MsgDef {
        MsgDef {
            circuit: circuit.into(),
            name: name.into(),
            fields,
            virtfields,
            read,
            prio: if read { prio } else { None },
            write,
            update,
        }
    }

    /// `circuit/name` identifier.
    #[must_use]
    pub fn ident(&self) -> String {
        format!("{}/{}", self.circuit, self.name)
    }

    /// Four-character flag string: `r|-`, `prio|-`, `w|-`, `u|-`.
    #[must_use]
    pub fn type_(&self) -> String {
        let mut s = String::with_capacity(4);
        s.push(if self.read { 'r' } else { '-' });
        match self.prio {
            Some(prio) => s.push_str(&prio.to_string()),
            None => s.push('-'),
        }
        s.push(if self.write { 'w' } else { '-' });
        s.push(if self.update { 'u' } else { '-' });
        s
    }

    /// Find a physical field by (unique) name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Join with a second definition of the same identity and fields,
    /// merging the direction flags. `None` if the definitions differ in
    /// anything but flags.
    #[must_use]
    pub fn join(&self, other: &MsgDef) -> Option<MsgDef> {
        if (self.circuit.as_str(), self.name.as_str(), &self.fields)
            != (other.circuit.as_str(), other.name.as_str(), &other.fields)
        {
            return None;
        }
        Some(MsgDef::new(
            self.circuit.clone(),
            self.name.clone(),
            self.fields.clone(),
            self.virtfields.clone(),
            self.read || other.read,
            self.prio.or(other.prio),
            self.write || other.write,
            self.update || other.update,
        ))
    }
}

impl std::fmt::Display for MsgDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ident())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uch() -> Type {
        Type::int(0.0, 254.0)
    }

    fn msgdef(read: bool, prio: Option<u8>, write: bool, update: bool) -> MsgDef {
        MsgDef::new(
            "mc",
            "Status0a",
            vec![FieldDef::new(0, "temp", uch(), Some("°C".into()), None)],
            vec![],
            read,
            prio,
            write,
            update,
        )
    }

    #[test]
    fn ident_joins_circuit_and_name() {
        assert_eq!(msgdef(true, None, false, false).ident(), "mc/Status0a");
    }

    #[test]
    fn prio_dropped_without_read() {
        assert_eq!(msgdef(false, Some(3), true, false).prio, None);
        assert_eq!(msgdef(true, Some(3), false, false).prio, Some(3));
    }

    #[test]
    fn type_string() {
        assert_eq!(msgdef(true, Some(1), true, false).type_(), "r1w-");
        assert_eq!(msgdef(false, None, false, true).type_(), "---u");
        assert_eq!(msgdef(true, None, false, false).type_(), "r---");
    }

    #[test]
    fn empty_unit_collapses() {
        let f = FieldDef::new(0, "x", uch(), Some(String::new()), Some(String::new()));
        assert_eq!(f.unit, None);
        assert_eq!(f.comment, None);
    }

    #[test]
    fn join_merges_flags() {
        let r = msgdef(true, Some(2), false, false);
        let w = msgdef(false, None, true, false);
        let joined = r.join(&w).unwrap();
        assert!(joined.read && joined.write);
        assert_eq!(joined.prio, Some(2));

        let other = MsgDef::new("hc", "Status0a", vec![], vec![], true, None, false, false);
        assert!(r.join(&other).is_none());
    }

    #[test]
    fn structural_equality() {
        assert_eq!(msgdef(true, None, false, false), msgdef(true, None, false, false));
        assert_ne!(msgdef(true, None, false, false), msgdef(true, Some(1), false, false));
    }
}
