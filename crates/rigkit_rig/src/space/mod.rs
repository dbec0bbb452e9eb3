// SPDX-License-Identifier: MIT OR Apache-2.0
//! Space-blend solver.
//!
//! A driven transform follows a weighted blend of two spaces picked out of
//! an ordered [`SpaceSet`]:
//!
//! - [`sort_spaces`] orders space names by the configured priority table,
//!   appending unknown names from the custom band
//! - [`add_blend_attr`] exposes the A/B selectors, the blend weight and its
//!   locked complement on a host node
//! - [`blend_slot`] wires one driven transform to the two selected candidates
//! - [`add_visibility_switch`] derives a per-space visibility signal from the
//!   same selectors

mod blend;
mod visibility;

pub use blend::{add_blend_attr, blend_slot, BlendAttrs, BlendSlot};
pub use visibility::{add_visibility_switch, space_visible, visible_port};

use crate::config::SpaceConfig;
use crate::error::{RigError, RigResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered space names with their selector indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceSet {
    spaces: IndexMap<String, i32>,
    default_a: i32,
    default_b: i32,
}

impl SpaceSet {
    /// Space names in index order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.spaces.keys().map(String::as_str)
    }

    /// `(name, index)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.spaces.iter().map(|(name, index)| (name.as_str(), *index))
    }

    /// Selector index of a space
    pub fn index_of(&self, name: &str) -> Option<i32> {
        self.spaces.get(name).copied()
    }

    /// Selector index of a space, failing when absent
    pub fn require(&self, name: &str) -> RigResult<i32> {
        self.index_of(name)
            .ok_or_else(|| RigError::UnknownSpace(name.to_string()))
    }

    /// Space holding a selector index
    pub fn name_of(&self, index: i32) -> Option<&str> {
        self.iter().find(|(_, i)| *i == index).map(|(name, _)| name)
    }

    /// Number of spaces
    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    /// Default index of selector A
    pub fn default_a(&self) -> i32 {
        self.default_a
    }

    /// Default index of selector B
    pub fn default_b(&self) -> i32 {
        self.default_b
    }

    /// Enumeration fields for a selector port
    pub fn enum_fields(&self) -> Vec<(String, i32)> {
        self.spaces
            .iter()
            .map(|(name, index)| (name.clone(), *index))
            .collect()
    }
}

/// Order `names` by the priority table.
///
/// Listed names take their configured index. Unlisted names get consecutive
/// indices from `custom_band_start`, in first-seen order. Duplicates are
/// dropped. Each default resolves to its space's index, or to the lowest
/// index when not given; a default naming a space outside the set fails.
pub fn sort_spaces<S: AsRef<str>>(
    names: &[S],
    default_a: Option<&str>,
    default_b: Option<&str>,
    config: &SpaceConfig,
) -> RigResult<SpaceSet> {
    let mut next_custom = config.custom_band_start;
    let mut indexed: IndexMap<String, i32> = IndexMap::new();
    for name in names {
        let name = name.as_ref();
        if indexed.contains_key(name) {
            tracing::debug!("Dropping duplicate space '{}'", name);
            continue;
        }
        let index = match config.priorities.get(name) {
            Some(index) => *index,
            None => {
                let index = next_custom;
                next_custom += 1;
                index
            }
        };
        indexed.insert(name.to_string(), index);
    }
    if indexed.is_empty() {
        return Err(RigError::invalid_arg("spaces", "at least one space is required"));
    }
    indexed.sort_by(|_, a, _, b| a.cmp(b));

    let lowest = indexed.values().copied().min().unwrap_or_default();
    let resolve = |name: Option<&str>| -> RigResult<i32> {
        match name {
            Some(name) => indexed
                .get(name)
                .copied()
                .ok_or_else(|| RigError::UnknownSpace(name.to_string())),
            None => Ok(lowest),
        }
    };
    let default_a = resolve(default_a)?;
    let default_b = resolve(default_b)?;

    Ok(SpaceSet {
        spaces: indexed,
        default_a,
        default_b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_strictly_increase() {
        let config = SpaceConfig::default();
        let set = sort_spaces(
            &["hand", "prop", "world", "chest", "weapon"],
            None,
            None,
            &config,
        )
        .unwrap();
        let indices: Vec<i32> = set.iter().map(|(_, i)| i).collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]), "{indices:?}");
        assert_eq!(
            set.names().collect::<Vec<_>>(),
            vec!["world", "chest", "hand", "prop", "weapon"]
        );
    }

    #[test]
    fn test_custom_band_in_first_seen_order() {
        let config = SpaceConfig::default();
        let set = sort_spaces(&["zeta", "world", "alpha"], None, None, &config).unwrap();
        assert_eq!(set.index_of("zeta"), Some(100));
        assert_eq!(set.index_of("alpha"), Some(101));
        assert_eq!(set.index_of("world"), Some(0));
    }

    #[test]
    fn test_defaults_resolve_by_name() {
        let config = SpaceConfig::default();
        let set = sort_spaces(&["head", "world", "cog"], Some("cog"), Some("head"), &config)
            .unwrap();
        assert_eq!(set.default_a(), 3);
        assert_eq!(set.default_b(), 7);
    }

    #[test]
    fn test_defaults_fall_back_to_lowest() {
        let config = SpaceConfig::default();
        let set = sort_spaces(&["head", "cog"], None, None, &config).unwrap();
        assert_eq!(set.default_a(), 3);
        assert_eq!(set.default_b(), 3);
    }

    #[test]
    fn test_missing_default_is_lookup_error() {
        let config = SpaceConfig::default();
        let err = sort_spaces(&["head", "cog"], Some("world"), None, &config).unwrap_err();
        assert!(matches!(err, RigError::UnknownSpace(name) if name == "world"));
    }

    #[test]
    fn test_duplicates_dropped() {
        let config = SpaceConfig::default();
        let set = sort_spaces(&["prop", "prop", "world"], None, None, &config).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.name_of(100), Some("prop"));
    }

    #[test]
    fn test_empty_is_rejected() {
        let config = SpaceConfig::default();
        let names: [&str; 0] = [];
        assert!(sort_spaces(&names, None, None, &config).is_err());
    }
}
