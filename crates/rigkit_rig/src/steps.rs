// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ordered, named step lists.

use crate::error::{RigError, RigResult};
use indexmap::IndexMap;

/// Lifecycle section a step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Runs during `build()`
    Build,
    /// Runs during `connect()`
    Connect,
}

/// Position a new step is inserted after
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// After the step with this name
    Name(String),
    /// After the step at this position
    Index(usize),
}

impl From<&str> for Anchor {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<usize> for Anchor {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Ordered list of uniquely named steps.
///
/// Registering a name that already exists replaces its function. Without an
/// anchor the step keeps its position; with one it moves after the anchor.
#[derive(Debug, Clone)]
pub struct StepList<F> {
    steps: IndexMap<String, F>,
}

impl<F> Default for StepList<F> {
    fn default() -> Self {
        Self {
            steps: IndexMap::new(),
        }
    }
}

impl<F: Copy> StepList<F> {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(&self, anchor: &Anchor) -> RigResult<usize> {
        match anchor {
            Anchor::Name(name) => self
                .steps
                .get_index_of(name)
                .ok_or_else(|| RigError::UnknownStep(name.clone())),
            Anchor::Index(index) if *index < self.steps.len() => Ok(*index),
            Anchor::Index(index) => Err(RigError::StepIndexOutOfRange {
                index: *index,
                len: self.steps.len(),
            }),
        }
    }

    /// Register a step, optionally after an anchor
    pub fn insert(&mut self, name: &str, step: F, after: Option<Anchor>) -> RigResult<()> {
        let Some(anchor) = after else {
            match self.steps.get_mut(name) {
                Some(existing) => *existing = step,
                None => {
                    self.steps.insert(name.to_string(), step);
                }
            }
            return Ok(());
        };

        let position = self.resolve(&anchor)?;
        if self.steps.get_index_of(name) == Some(position) {
            self.steps.insert(name.to_string(), step);
            return Ok(());
        }

        // Resolve before removing so a bad anchor leaves the list untouched,
        // then again because removal may shift positions
        let anchor_name = self
            .steps
            .get_index(position)
            .map(|(anchor_name, _)| anchor_name.clone())
            .ok_or_else(|| RigError::UnknownStep(name.to_string()))?;
        self.steps.shift_remove(name);
        let position = self.resolve(&Anchor::Name(anchor_name))?;
        self.steps.shift_insert(position + 1, name.to_string(), step);
        Ok(())
    }

    /// Remove a step
    pub fn remove(&mut self, name: &str) -> Option<F> {
        self.steps.shift_remove(name)
    }

    /// Position of a step
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.get_index_of(name)
    }

    /// Whether a step is registered
    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Step names in run order
    pub fn names(&self) -> Vec<&str> {
        self.steps.keys().map(String::as_str).collect()
    }

    /// Steps in run order
    pub fn iter(&self) -> impl Iterator<Item = (&str, F)> + '_ {
        self.steps.iter().map(|(name, step)| (name.as_str(), *step))
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(names: &[&str]) -> StepList<u32> {
        let mut steps = StepList::new();
        for (i, name) in names.iter().enumerate() {
            steps.insert(name, i as u32, None).unwrap();
        }
        steps
    }

    #[test]
    fn test_insert_after_name() {
        let mut steps = list(&["a", "x", "b"]);
        steps.insert("y", 9, Some("x".into())).unwrap();
        assert_eq!(steps.names(), vec!["a", "x", "y", "b"]);
    }

    #[test]
    fn test_insert_after_index() {
        let mut steps = list(&["a", "b"]);
        steps.insert("z", 9, Some(0.into())).unwrap();
        assert_eq!(steps.names(), vec!["a", "z", "b"]);
    }

    #[test]
    fn test_unknown_anchor_fails() {
        let mut steps = list(&["a"]);
        assert!(matches!(
            steps.insert("y", 1, Some("missing".into())),
            Err(RigError::UnknownStep(_))
        ));
        assert!(matches!(
            steps.insert("y", 1, Some(5.into())),
            Err(RigError::StepIndexOutOfRange { index: 5, len: 1 })
        ));
        assert_eq!(steps.names(), vec!["a"]);
    }

    #[test]
    fn test_reregister_replaces_in_place() {
        let mut steps = list(&["a", "b", "c"]);
        steps.insert("b", 42, None).unwrap();
        assert_eq!(steps.names(), vec!["a", "b", "c"]);
        assert_eq!(steps.iter().nth(1), Some(("b", 42)));
    }

    #[test]
    fn test_reregister_with_anchor_moves() {
        let mut steps = list(&["a", "b", "c", "d"]);
        steps.insert("a", 7, Some("c".into())).unwrap();
        assert_eq!(steps.names(), vec!["b", "c", "a", "d"]);

        // Index anchors refer to positions before the move
        let mut steps = list(&["a", "b", "c", "d"]);
        steps.insert("a", 7, Some(2.into())).unwrap();
        assert_eq!(steps.names(), vec!["b", "c", "a", "d"]);
    }
}
