//! Ordered taxon label sets with stable 1-based ids.
//!
//! Ids are issued in insertion order starting at 1 and are never reused, so
//! after a removal the id space may be sparse. Algorithms index distance
//! matrix rows by these ids and require them to be dense (see
//! [`Taxa::is_dense`]).

use std::collections::HashMap;

use crate::error::{OrdoError, Result};
use crate::traits::Summarizable;

/// A bijective mapping between 1-based integer ids and string labels.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Taxa {
    /// `labels[id - 1]`; `None` marks a removed id.
    labels: Vec<Option<String>>,
    ids: HashMap<String, usize>,
}

impl Taxa {
    /// An empty taxa set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a taxa set from labels, assigning ids 1, 2, ... in order.
    ///
    /// # Errors
    ///
    /// Returns an error if a label occurs twice.
    pub fn from_labels<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut taxa = Self::new();
        for label in labels {
            let label = label.into();
            if taxa.contains(&label) {
                return Err(OrdoError::InvalidInput(format!(
                    "duplicate taxon label '{}'",
                    label
                )));
            }
            taxa.add(label);
        }
        Ok(taxa)
    }

    /// Add a label and return its id.
    ///
    /// If the label is already present its existing id is returned.
    pub fn add(&mut self, label: impl Into<String>) -> usize {
        let label = label.into();
        if let Some(&id) = self.ids.get(&label) {
            return id;
        }
        self.labels.push(Some(label.clone()));
        let id = self.labels.len();
        self.ids.insert(label, id);
        id
    }

    /// Remove a label, returning the id it held. The id is never reissued.
    pub fn remove(&mut self, label: &str) -> Option<usize> {
        let id = self.ids.remove(label)?;
        self.labels[id - 1] = None;
        Some(id)
    }

    /// Label assigned to `id`, if any.
    pub fn label(&self, id: usize) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.labels.get(id - 1).and_then(|l| l.as_deref())
    }

    /// Id of `label`, if present.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    /// True if `label` is present.
    pub fn contains(&self, label: &str) -> bool {
        self.ids.contains_key(label)
    }

    /// Number of currently assigned ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if no ids are assigned.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Largest id ever issued (0 for a fresh set).
    pub fn max_id(&self) -> usize {
        self.labels.len()
    }

    /// True when the assigned ids are exactly `1..=len()`.
    pub fn is_dense(&self) -> bool {
        self.max_id() == self.len()
    }

    /// `(id, label)` pairs in increasing id order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.as_deref().map(|l| (i + 1, l)))
    }

    /// Labels in increasing id order.
    pub fn labels(&self) -> Vec<String> {
        self.iter().map(|(_, l)| l.to_string()).collect()
    }
}

impl Summarizable for Taxa {
    fn summary(&self) -> String {
        format!("Taxa: {} labels (max id {})", self.len(), self.max_id())
    }
}
