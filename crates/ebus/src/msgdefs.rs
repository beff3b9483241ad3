// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message definition container.
//!
//! A two-level mapping `circuit -> name -> [MsgDef]` ordered by
//! `(circuit, name)`. A bucket may hold several definitions with the
//! same key (distinct field selections produced by pattern resolution);
//! [`MsgDefs::get`] returns the first, which is the one originally added
//! from the daemon catalog.

use crate::error::{Error, Result};
use crate::msgdef::MsgDef;
use globset::{Glob, GlobMatcher};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

static RE_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Message definitions container.
#[derive(Debug, Clone, Default)]
pub struct MsgDefs {
    msgdefs: BTreeMap<String, BTreeMap<String, Vec<Arc<MsgDef>>>>,
}

impl MsgDefs {
    /// Empty container.
    #[must_use]
    pub fn new() -> MsgDefs {
        MsgDefs::default()
    }

    /// Remove all stored message definitions.
    pub fn clear(&mut self) {
        self.msgdefs.clear();
    }

    /// Add a message definition to its `circuit[name]` bucket.
    pub fn add(&mut self, msgdef: Arc<MsgDef>) {
        self.msgdefs
            .entry(msgdef.circuit.clone())
            .or_default()
            .entry(msgdef.name.clone())
            .or_default()
            .push(msgdef);
    }

    /// The first definition stored for `(circuit, name)`, if any.
    #[must_use]
    pub fn get(&self, circuit: &str, name: &str) -> Option<&Arc<MsgDef>> {
        self.msgdefs.get(circuit)?.get(name)?.first()
    }

    /// `true` if an equal definition is already stored.
    #[must_use]
    pub fn contains(&self, msgdef: &MsgDef) -> bool {
        self.msgdefs
            .get(&msgdef.circuit)
            .and_then(|names| names.get(&msgdef.name))
            .is_some_and(|bucket| bucket.iter().any(|stored| **stored == *msgdef))
    }

    /// Glob-filter by circuit and name pattern, yielding a new container.
    ///
    /// # Errors
    ///
    /// `Error::Pattern` if a glob does not compile.
    pub fn find(&self, circuit: &str, name: &str) -> Result<MsgDefs> {
        let circuit_glob = glob(circuit)?;
        let name_glob = glob(name)?;
        let mut found = MsgDefs::new();
        for msgdef in self.iter() {
            if circuit_glob.is_match(&msgdef.circuit) && name_glob.is_match(&msgdef.name) {
                found.add(Arc::clone(msgdef));
            }
        }
        Ok(found)
    }

    /// Resolve `;`-separated path patterns into a new container.
    ///
    /// Each pattern matches `circuit/name(#prio)?(/field)?` with glob
    /// segments. A field pattern narrows the definition to the matching
    /// fields; a priority suffix overrides the priority of readable
    /// messages. Results union over all patterns; duplicates collapse.
    ///
    /// # Errors
    ///
    /// `Error::Pattern` if a pattern does not match the grammar.
    pub fn resolve(&self, patterns: &str) -> Result<MsgDefs> {
        self.resolve_filtered(patterns, |_| true)
    }

    /// [`resolve`](MsgDefs::resolve) keeping only definitions accepted by
    /// `filter`.
    pub fn resolve_filtered(
        &self,
        patterns: &str,
        filter: impl Fn(&MsgDef) -> bool,
    ) -> Result<MsgDefs> {
        let mut resolved = MsgDefs::new();
        for pattern in patterns.split(';') {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }
            for msgdef in self.resolve_one(pattern)? {
                if !resolved.contains(&msgdef) && filter(&msgdef) {
                    resolved.add(Arc::new(msgdef));
                }
            }
        }
        Ok(resolved)
    }

    fn resolve_one(&self, pattern: &str) -> Result<Vec<MsgDef>> {
        let re = RE_PATTERN.get_or_init(|| {
            Regex::new(r"\A([^/#]+)/([^/#]+)(?:#([0-9]))?(?:/([^/#]*))?\z").unwrap()
        });
        let captures = re
            .captures(pattern)
            .ok_or_else(|| Error::Pattern(pattern.to_string()))?;
        let circuit = captures.get(1).map_or("", |m| m.as_str());
        let name = captures.get(2).map_or("", |m| m.as_str());
        let prio: Option<u8> = captures.get(3).and_then(|m| m.as_str().parse().ok());
        let fieldname = captures.get(4).map(|m| m.as_str());
        let field_glob = fieldname.map(glob).transpose()?;

        let mut resolved = Vec::new();
        for msgdef in self.find(circuit, name)?.iter() {
            let fields: Vec<_> = match &field_glob {
                None => msgdef.fields.clone(),
                Some(matcher) => msgdef
                    .fields
                    .iter()
                    .filter(|f| matcher.is_match(&f.name))
                    .cloned()
                    .collect(),
            };
            if fields.is_empty() {
                continue;
            }
            if fields == msgdef.fields && (prio.is_none() || !msgdef.read) {
                resolved.push((**msgdef).clone());
            } else {
                resolved.push(MsgDef::new(
                    msgdef.circuit.clone(),
                    msgdef.name.clone(),
                    fields,
                    vec![],
                    msgdef.read,
                    prio.or(msgdef.prio),
                    msgdef.write,
                    msgdef.update,
                ));
            }
        }
        Ok(resolved)
    }

    /// `"N messages (R read, U update, W write) with F fields"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let total = self.len();
        let fields: usize = self.iter().map(|m| m.fields.len()).sum();
        let read = self.iter().filter(|m| m.read).count();
        let update = self.iter().filter(|m| m.update).count();
        let write = self.iter().filter(|m| m.write).count();
        format!(
            "{} messages ({} read, {} update, {} write) with {} fields",
            total, read, update, write, fields
        )
    }

    /// Iterate all stored definitions, ordered by `(circuit, name)`.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MsgDef>> {
        self.msgdefs
            .values()
            .flat_map(BTreeMap::values)
            .flatten()
    }

    /// Number of stored definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.msgdefs
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.msgdefs.is_empty()
    }
}

fn glob(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|_| Error::Pattern(pattern.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgdef::FieldDef;
    use crate::types::Type;

    fn uch() -> Type {
        Type::int(0.0, 254.0)
    }

    fn fielddefs(names: &[&str]) -> Vec<FieldDef> {
        names
            .iter()
            .enumerate()
            .map(|(idx, name)| FieldDef::new(idx, *name, uch(), None, None))
            .collect()
    }

    fn catalog() -> MsgDefs {
        let mut defs = MsgDefs::new();
        defs.add(Arc::new(MsgDef::new(
            "mc.5",
            "Timer.Friday",
            fielddefs(&["from.0", "to.0", "from.1", "to.1", "from.2", "to.2"]),
            vec![],
            true,
            None,
            true,
            false,
        )));
        defs.add(Arc::new(MsgDef::new(
            "hc",
            "Status0",
            fielddefs(&["temp", "temp0"]),
            vec![],
            true,
            None,
            false,
            false,
        )));
        defs.add(Arc::new(MsgDef::new(
            "bai",
            "FlowTemp",
            fielddefs(&["temp", "sensor"]),
            vec![],
            true,
            Some(2),
            false,
            true,
        )));
        defs
    }

    #[test]
    fn get_returns_first_added() {
        let mut defs = catalog();
        let original = Arc::clone(defs.get("hc", "Status0").unwrap());
        defs.add(Arc::new(MsgDef::new(
            "hc",
            "Status0",
            fielddefs(&["temp"]),
            vec![],
            true,
            None,
            false,
            false,
        )));
        assert_eq!(defs.get("hc", "Status0").unwrap(), &original);
        assert_eq!(defs.len(), 4);
    }

    #[test]
    fn find_globs() {
        let defs = catalog();
        assert_eq!(defs.find("mc*", "*").unwrap().len(), 1);
        assert_eq!(defs.find("*", "*Temp").unwrap().len(), 1);
        assert_eq!(defs.find("*", "*").unwrap().len(), 3);
        assert_eq!(defs.find("nope", "*").unwrap().len(), 0);
    }

    #[test]
    fn resolve_field_subset_with_prio_override() {
        let defs = catalog();
        let resolved = defs.resolve("mc.5/Timer.Friday#3/to*").unwrap();
        assert_eq!(resolved.len(), 1);
        let msgdef = resolved.iter().next().unwrap();
        assert_eq!(msgdef.ident(), "mc.5/Timer.Friday");
        let names: Vec<&str> = msgdef.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["to.0", "to.1", "to.2"]);
        let idxs: Vec<usize> = msgdef.fields.iter().map(|f| f.idx).collect();
        assert_eq!(idxs, [1, 3, 5]);
        assert_eq!(msgdef.prio, Some(3));
        assert!(msgdef.read);
    }

    #[test]
    fn resolve_full_match_returns_original() {
        let defs = catalog();
        let resolved = defs.resolve("hc/Status0").unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(
            resolved.iter().next().unwrap(),
            defs.get("hc", "Status0").unwrap()
        );
    }

    #[test]
    fn resolve_is_idempotent() {
        let defs = catalog();
        let once = defs.resolve("mc.5/Timer.Friday#3/to*").unwrap();
        let twice = defs
            .resolve("mc.5/Timer.Friday#3/to*;mc.5/Timer.Friday#3/to*")
            .unwrap();
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn resolve_unions_patterns() {
        let defs = catalog();
        let resolved = defs.resolve("hc/*;bai/*").unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn resolve_no_field_match_drops_message() {
        let defs = catalog();
        let resolved = defs.resolve("hc/Status0/bogus*").unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn resolve_rejects_bad_grammar() {
        let defs = catalog();
        assert!(matches!(defs.resolve("no-slash"), Err(Error::Pattern(_))));
        assert!(matches!(defs.resolve("a/b/c/d"), Err(Error::Pattern(_))));
    }

    #[test]
    fn invalid_glob_is_pattern_error() {
        let defs = catalog();
        assert!(matches!(defs.find("[", "*"), Err(Error::Pattern(_))));
    }

    #[test]
    fn resolve_prio_on_unreadable_message_is_ignored() {
        let mut defs = MsgDefs::new();
        defs.add(Arc::new(MsgDef::new(
            "ui",
            "TempIncrease",
            fielddefs(&["temp"]),
            vec![],
            false,
            None,
            true,
            false,
        )));
        let resolved = defs.resolve("ui/TempIncrease#5").unwrap();
        let msgdef = resolved.iter().next().unwrap();
        assert_eq!(msgdef.prio, None);
        assert!(msgdef.write);
    }

    #[test]
    fn resolve_filtered_applies_predicate() {
        let defs = catalog();
        let resolved = defs.resolve_filtered("*/*", |m| m.update).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.iter().next().unwrap().ident(), "bai/FlowTemp");
    }

    #[test]
    fn summary_counts() {
        let defs = catalog();
        assert_eq!(
            defs.summary(),
            "3 messages (3 read, 1 update, 1 write) with 10 fields"
        );
    }
}
