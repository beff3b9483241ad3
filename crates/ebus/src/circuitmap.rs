// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Circuit display names.

use std::collections::BTreeMap;

/// Mapping of circuit names to human-readable display names.
///
/// Resolution tries the exact name first; for a numbered instance
/// (`bai.3`) the base name is tried next, appending `#3`. Unmapped
/// names pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct CircuitMap {
    map: BTreeMap<String, String>,
}

impl CircuitMap {
    /// Empty map.
    #[must_use]
    pub fn new() -> CircuitMap {
        CircuitMap::default()
    }

    /// Map with the predefined default names loaded.
    #[must_use]
    pub fn with_defaults() -> CircuitMap {
        let mut map = CircuitMap::new();
        map.add("broadcast", "*");
        map.add("bai", "Heater");
        map.add("mc", "Mixer");
        map.add("hwc", "Water");
        map
    }

    /// Add or override a mapping.
    pub fn add(&mut self, circuitname: impl Into<String>, displayname: impl Into<String>) {
        self.map.insert(circuitname.into(), displayname.into());
    }

    /// Display name for `circuitname`.
    #[must_use]
    pub fn displayname(&self, circuitname: &str) -> String {
        if let Some(displayname) = self.map.get(circuitname) {
            return displayname.clone();
        }
        if let Some((base, suffix)) = circuitname.split_once('.') {
            if let Some(displayname) = self.map.get(base) {
                return format!("{}#{}", displayname, suffix);
            }
        }
        circuitname.to_string()
    }

    /// Iterate all mappings.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_suffixed_lookup() {
        let map = CircuitMap::with_defaults();
        assert_eq!(map.displayname("bai"), "Heater");
        assert_eq!(map.displayname("bai.7"), "Heater#7");
        assert_eq!(map.displayname("mc.4"), "Mixer#4");
    }

    #[test]
    fn unmapped_passes_through() {
        let map = CircuitMap::with_defaults();
        assert_eq!(map.displayname("xyz"), "xyz");
        assert_eq!(map.displayname("xyz.7"), "xyz.7");
    }

    #[test]
    fn overrides_win_over_suffix_rule() {
        let mut map = CircuitMap::with_defaults();
        map.add("mc.4", "Mixer Unit 2");
        assert_eq!(map.displayname("mc.4"), "Mixer Unit 2");
        assert_eq!(map.displayname("mc.5"), "Mixer#5");
    }
}
