// SPDX-License-Identifier: MIT OR Apache-2.0
//! Naming convention: name tuples, composition and side flipping.
//!
//! A composed name is the separator-joined sequence
//! `side, description, index[, limbIndex], extra..., suffix`, e.g.
//! `L_arm_00_twist_jnt`. The index is zero padded; a limb index, when present,
//! is the second numeric token. Extra tokens may not start with a digit so
//! the two numeric tokens stay unambiguous.

use crate::config::{FlipPolicy, NamingConfig};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured name of a rig node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameTuple {
    /// Side token
    pub side: String,
    /// Description token
    pub description: String,
    /// Index within side and description
    #[serde(default)]
    pub index: u32,
    /// Index of the limb this node belongs to
    #[serde(default)]
    pub limb_index: Option<u32>,
    /// Extra descriptive tokens
    #[serde(default)]
    pub extra: Vec<String>,
}

impl NameTuple {
    /// Create a name with no limb index or extra tokens
    pub fn new(side: impl Into<String>, description: impl Into<String>, index: u32) -> Self {
        Self {
            side: side.into(),
            description: description.into(),
            index,
            limb_index: None,
            extra: Vec::new(),
        }
    }

    /// Set the limb index
    pub fn with_limb_index(mut self, limb_index: u32) -> Self {
        self.limb_index = Some(limb_index);
        self
    }

    /// Append an extra token
    pub fn with_extra(mut self, token: impl Into<String>) -> Self {
        self.extra.push(token.into());
        self
    }
}

impl fmt::Display for NameTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{:02}", self.side, self.description, self.index)?;
        if let Some(limb) = self.limb_index {
            write!(f, "_{limb:02}")?;
        }
        for token in &self.extra {
            write!(f, "_{token}")?;
        }
        Ok(())
    }
}

/// Naming service bound to one convention
#[derive(Debug, Clone, Default)]
pub struct Naming {
    config: NamingConfig,
}

impl Naming {
    /// Create a naming service
    pub fn new(config: NamingConfig) -> Self {
        Self { config }
    }

    /// The convention in use
    pub fn config(&self) -> &NamingConfig {
        &self.config
    }

    /// Whether `token` is a known side
    pub fn is_side(&self, token: &str) -> bool {
        self.config.sides.iter().any(|s| s.token == token)
    }

    fn check_token(&self, token: &str, what: &str) -> Result<(), ConfigError> {
        if token.is_empty() || token.contains(self.config.separator.as_str()) {
            return Err(ConfigError::InvalidToken {
                token: token.to_string(),
                reason: format!("{what} must be non-empty and separator-free"),
            });
        }
        Ok(())
    }

    /// Validate a name tuple against the convention
    pub fn validate(&self, name: &NameTuple) -> Result<(), ConfigError> {
        if !self.is_side(&name.side) {
            return Err(ConfigError::UnknownSide(name.side.clone()));
        }
        self.check_token(&name.description, "description")?;
        for token in &name.extra {
            self.check_token(token, "extra tokens")?;
            if token.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(ConfigError::InvalidToken {
                    token: token.clone(),
                    reason: "extra tokens may not start with a digit".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Compose a scene name from a tuple and a suffix
    pub fn compose(&self, name: &NameTuple, suffix: &str) -> Result<String, ConfigError> {
        self.validate(name)?;
        let pad = self.config.index_padding;
        let mut tokens = vec![
            name.side.clone(),
            name.description.clone(),
            format!("{:0pad$}", name.index),
        ];
        if let Some(limb) = name.limb_index {
            tokens.push(format!("{limb:0pad$}"));
        }
        tokens.extend(name.extra.iter().cloned());
        if !suffix.is_empty() {
            self.check_token(suffix, "suffix")?;
            tokens.push(suffix.to_string());
        }
        Ok(tokens.join(&self.config.separator))
    }

    /// Split a composed name back into its tuple and suffix
    pub fn decompose(&self, full: &str) -> Result<(NameTuple, String), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidToken {
            token: full.to_string(),
            reason: reason.to_string(),
        };
        let tokens: Vec<&str> = full.split(self.config.separator.as_str()).collect();
        let [side, description, index, rest @ ..] = tokens.as_slice() else {
            return Err(invalid("expected side, description and index tokens"));
        };
        if !self.is_side(side) {
            return Err(ConfigError::UnknownSide(side.to_string()));
        }
        let index: u32 = index.parse().map_err(|_| invalid("index is not a number"))?;

        let mut rest = rest.to_vec();
        let suffix = rest.pop().map(str::to_string).unwrap_or_default();
        let limb_index = match rest.first().map(|t| t.parse::<u32>()) {
            Some(Ok(limb)) => {
                rest.remove(0);
                Some(limb)
            }
            _ => None,
        };
        let name = NameTuple {
            side: side.to_string(),
            description: description.to_string(),
            index,
            limb_index,
            extra: rest.into_iter().map(str::to_string).collect(),
        };
        Ok((name, suffix))
    }

    /// Mirror a side token
    pub fn flip_side(&self, side: &str) -> Result<String, ConfigError> {
        let entry = self
            .config
            .sides
            .iter()
            .find(|s| s.token == side)
            .ok_or_else(|| ConfigError::UnknownSide(side.to_string()))?;
        match (&entry.mirror, self.config.flip_policy) {
            (Some(mirror), _) => Ok(mirror.clone()),
            (None, FlipPolicy::Keep) => Ok(side.to_string()),
            (None, FlipPolicy::Strict) => Err(ConfigError::NotFlippable(side.to_string())),
        }
    }

    /// Mirror a name tuple
    pub fn flip(&self, name: &NameTuple) -> Result<NameTuple, ConfigError> {
        Ok(NameTuple {
            side: self.flip_side(&name.side)?,
            ..name.clone()
        })
    }

    /// Mirror a composed scene name. Names that do not start with a side
    /// token are returned unchanged.
    pub fn flip_name(&self, full: &str) -> Result<String, ConfigError> {
        let sep = self.config.separator.as_str();
        let (first, rest) = match full.split_once(sep) {
            Some((first, rest)) => (first, Some(rest)),
            None => (full, None),
        };
        if !self.is_side(first) {
            return Ok(full.to_string());
        }
        let flipped = self.flip_side(first)?;
        Ok(match rest {
            Some(rest) => format!("{flipped}{sep}{rest}"),
            None => flipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SideEntry;

    fn naming() -> Naming {
        Naming::new(NamingConfig::default())
    }

    #[test]
    fn test_compose() {
        let name = NameTuple::new("L", "arm", 0).with_extra("upper");
        assert_eq!(naming().compose(&name, "jnt").unwrap(), "L_arm_00_upper_jnt");

        let finger = NameTuple::new("R", "finger", 3).with_limb_index(1);
        assert_eq!(naming().compose(&finger, "rig").unwrap(), "R_finger_03_01_rig");
    }

    #[test]
    fn test_compose_rejects_unknown_side() {
        let name = NameTuple::new("Q", "arm", 0);
        assert!(matches!(
            naming().compose(&name, "rig"),
            Err(ConfigError::UnknownSide(_))
        ));
    }

    #[test]
    fn test_compose_rejects_separator_in_description() {
        let name = NameTuple::new("L", "upper_arm", 0);
        assert!(matches!(
            naming().compose(&name, "rig"),
            Err(ConfigError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_decompose_inverts_compose() {
        let naming = naming();
        let name = NameTuple::new("L", "finger", 2)
            .with_limb_index(4)
            .with_extra("tip");
        let full = naming.compose(&name, "ctl").unwrap();
        let (parsed, suffix) = naming.decompose(&full).unwrap();
        assert_eq!(parsed, name);
        assert_eq!(suffix, "ctl");
    }

    #[test]
    fn test_flip_is_an_involution() {
        let naming = naming();
        for side in ["L", "R", "C", "G"] {
            let name = NameTuple::new(side, "leg", 1).with_extra("knee");
            let twice = naming.flip(&naming.flip(&name).unwrap()).unwrap();
            assert_eq!(twice, name);
        }
        assert_eq!(naming.flip_side("L").unwrap(), "R");
        assert_eq!(naming.flip_side("C").unwrap(), "C");
    }

    #[test]
    fn test_flip_name() {
        let naming = naming();
        assert_eq!(naming.flip_name("L_arm_00_rig").unwrap(), "R_arm_00_rig");
        assert_eq!(
            naming.flip_name("L_arm_00_rig.outputMatrix").unwrap(),
            "R_arm_00_rig.outputMatrix"
        );
        assert_eq!(naming.flip_name("world").unwrap(), "world");
        assert_eq!(naming.flip_name("C_spine_00_rig").unwrap(), "C_spine_00_rig");
    }

    #[test]
    fn test_strict_policy_rejects_center() {
        let config = NamingConfig {
            flip_policy: FlipPolicy::Strict,
            sides: vec![
                SideEntry::mirrored("L", "R"),
                SideEntry::mirrored("R", "L"),
                SideEntry::unmirrored("C"),
            ],
            ..NamingConfig::default()
        };
        let naming = Naming::new(config);
        assert!(matches!(
            naming.flip_side("C"),
            Err(ConfigError::NotFlippable(_))
        ));
        assert_eq!(naming.flip_side("R").unwrap(), "L");
    }
}
