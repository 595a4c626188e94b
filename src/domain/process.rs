//! Process types and the ordered catalogs that sequence them.
//!
//! A catalog is the per-deployment list of jobs run once per day, in
//! order. Catalogs are validated when configuration is loaded so the
//! runner never sees an empty or ambiguous sequence.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of one unit of batch work (e.g. `RECEIVE_UNIVERSE`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProcessType(String);

impl ProcessType {
    /// Create a process type, rejecting blank names
    pub fn new(name: impl Into<String>) -> Result<Self, CatalogError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(CatalogError::BlankName);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProcessType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProcessType {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProcessType> for String {
    fn from(value: ProcessType) -> Self {
        value.0
    }
}

/// Ordered, non-empty, duplicate-free sequence of process types
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    steps: Vec<ProcessType>,
}

impl Catalog {
    /// Validate and build a catalog from an ordered list
    pub fn new(steps: Vec<ProcessType>) -> Result<Self, CatalogError> {
        if steps.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.as_str()) {
                return Err(CatalogError::Duplicate(step.clone()));
            }
        }

        Ok(Self { steps })
    }

    /// Parse a catalog from raw names (config file entries, CLI lists)
    pub fn from_names<I, S>(names: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let steps = names
            .into_iter()
            .map(|n| ProcessType::new(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(steps)
    }

    /// Suffix of this catalog beginning at `start` (used to resume a day's run)
    pub fn starting_from(&self, start: &ProcessType) -> Result<Self, CatalogError> {
        let idx = self
            .position(start)
            .ok_or_else(|| CatalogError::UnknownStart(start.clone()))?;
        Ok(Self {
            steps: self.steps[idx..].to_vec(),
        })
    }

    pub fn position(&self, process_type: &ProcessType) -> Option<usize> {
        self.steps.iter().position(|p| p == process_type)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProcessType> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn as_slice(&self) -> &[ProcessType] {
        &self.steps
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a ProcessType;
    type IntoIter = std::slice::Iter<'a, ProcessType>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.steps.iter().map(ProcessType::as_str).collect();
        f.write_str(&names.join(", "))
    }
}

/// Catalog validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Catalog must contain at least one process type")]
    Empty,

    #[error("Process type name cannot be blank")]
    BlankName,

    #[error("Process type '{0}' appears more than once")]
    Duplicate(ProcessType),

    #[error("Process type '{0}' is not part of the catalog")]
    UnknownStart(ProcessType),
}
