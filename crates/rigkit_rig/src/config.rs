// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rig configuration: naming convention, side table and space priorities.
//!
//! Configuration is an explicit value handed to every rig operation through
//! [`crate::RigContext`]. It can be loaded from RON; every field has a
//! default so partial files work.

use crate::error::{ConfigError, RigResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// What flipping does with a side that has no mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlipPolicy {
    /// Center-like sides flip to themselves
    #[default]
    Keep,
    /// Flipping an unmirrored side is an error
    Strict,
}

/// One side token and its mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEntry {
    /// Token as it appears in names ("L", "R", "C", ...)
    pub token: String,
    /// Mirrored token, if the side has one
    #[serde(default)]
    pub mirror: Option<String>,
}

impl SideEntry {
    /// Side with a mirror
    pub fn mirrored(token: &str, mirror: &str) -> Self {
        Self {
            token: token.to_string(),
            mirror: Some(mirror.to_string()),
        }
    }

    /// Side without a mirror
    pub fn unmirrored(token: &str) -> Self {
        Self {
            token: token.to_string(),
            mirror: None,
        }
    }
}

/// Naming convention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Token separator
    pub separator: String,
    /// Zero padding of the index token
    pub index_padding: usize,
    /// Known sides
    pub sides: Vec<SideEntry>,
    /// Behaviour for unmirrored sides
    pub flip_policy: FlipPolicy,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
            index_padding: 2,
            sides: vec![
                SideEntry::mirrored("L", "R"),
                SideEntry::mirrored("R", "L"),
                SideEntry::unmirrored("C"),
                SideEntry::unmirrored("G"),
            ],
            flip_policy: FlipPolicy::Keep,
        }
    }
}

/// Space priority table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Well-known spaces and their fixed indices
    pub priorities: IndexMap<String, i32>,
    /// First index handed to spaces missing from `priorities`
    pub custom_band_start: i32,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        let priorities = [
            "world", "master", "root", "cog", "hips", "chest", "neck", "head", "clavicle",
            "shoulder", "hand", "foot",
        ]
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_string(), i as i32))
        .collect();
        Self {
            priorities,
            custom_band_start: 100,
        }
    }
}

/// Complete rig configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Naming convention
    pub naming: NamingConfig,
    /// Space priorities
    pub spaces: SpaceConfig,
}

impl RigConfig {
    /// Parse and validate a RON config
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON config file
    pub fn load(path: impl AsRef<Path>) -> RigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Ok(Self::from_ron(&source)?)
    }

    /// Check the side table and priority table for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let naming = &self.naming;
        if naming.separator.is_empty() {
            return Err(ConfigError::InvalidToken {
                token: String::new(),
                reason: "separator must not be empty".to_string(),
            });
        }
        for side in &naming.sides {
            if side.token.is_empty() || side.token.contains(naming.separator.as_str()) {
                return Err(ConfigError::InvalidToken {
                    token: side.token.clone(),
                    reason: "side tokens must be non-empty and separator-free".to_string(),
                });
            }
            if let Some(mirror) = &side.mirror {
                let back = naming
                    .sides
                    .iter()
                    .find(|s| &s.token == mirror)
                    .and_then(|s| s.mirror.as_ref());
                if back != Some(&side.token) {
                    return Err(ConfigError::AsymmetricSide {
                        side: side.token.clone(),
                        mirror: mirror.clone(),
                    });
                }
            }
        }

        let band = self.spaces.custom_band_start;
        let mut seen: HashMap<i32, &str> = HashMap::new();
        for (space, index) in &self.spaces.priorities {
            if *index < 0 || *index >= band {
                return Err(ConfigError::PriorityInCustomBand {
                    space: space.clone(),
                    index: *index,
                    band,
                });
            }
            if let Some(first) = seen.insert(*index, space) {
                return Err(ConfigError::DuplicatePriority {
                    first: first.to_string(),
                    second: space.clone(),
                    index: *index,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RigConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = RigConfig::from_ron("(spaces: (custom_band_start: 50))").unwrap();
        assert_eq!(config.spaces.custom_band_start, 50);
        assert_eq!(config.naming.separator, "_");
        assert_eq!(config.spaces.priorities.get("world"), Some(&0));
    }

    #[test]
    fn test_asymmetric_side_rejected() {
        let mut config = RigConfig::default();
        config.naming.sides = vec![SideEntry::mirrored("L", "R"), SideEntry::unmirrored("R")];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::AsymmetricSide { .. })
        ));
    }

    #[test]
    fn test_priority_inside_custom_band_rejected() {
        let mut config = RigConfig::default();
        config.spaces.priorities.insert("prop".to_string(), 150);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PriorityInCustomBand { index: 150, .. })
        ));
    }

    #[test]
    fn test_shared_priority_rejected() {
        let mut config = RigConfig::default();
        config.spaces.priorities.insert("prop".to_string(), 3);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicatePriority { index: 3, .. })
        ));
    }

    #[test]
    fn test_bad_ron_is_parse_error() {
        assert!(matches!(
            RigConfig::from_ron("(naming: 3)"),
            Err(ConfigError::Parse(_))
        ));
    }
}
