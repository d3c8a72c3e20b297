use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Axiomatic cost of a root item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BaseCost {
    Finite(f64),
    /// The item exists but can never be obtained. Any decomposition through
    /// it scores as infinitely expensive.
    Unobtainable,
}

impl BaseCost {
    pub fn value(self) -> f64 {
        match self {
            BaseCost::Finite(v) => v,
            BaseCost::Unobtainable => f64::INFINITY,
        }
    }

    pub fn is_obtainable(self) -> bool {
        matches!(self, BaseCost::Finite(_))
    }
}

/// A base cost that is neither positive and finite nor `+inf`.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("base cost must be positive or +inf, got {0}")]
pub struct InvalidBaseCost(pub f64);

impl TryFrom<f64> for BaseCost {
    type Error = InvalidBaseCost;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value == f64::INFINITY {
            Ok(BaseCost::Unobtainable)
        } else if value.is_finite() && value > 0.0 {
            Ok(BaseCost::Finite(value))
        } else {
            Err(InvalidBaseCost(value))
        }
    }
}

/// External base-cost table, keyed by item name.
#[derive(Debug, Clone, Default)]
pub struct BaseCostTable {
    costs: HashMap<String, BaseCost>,
}

impl BaseCostTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from raw numbers, rejecting any that is not a valid
    /// base cost.
    pub fn from_values<S: Into<String>>(
        values: impl IntoIterator<Item = (S, f64)>,
    ) -> Result<Self, InvalidBaseCost> {
        values
            .into_iter()
            .map(|(name, value)| BaseCost::try_from(value).map(|cost| (name, cost)))
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, cost: BaseCost) {
        self.costs.insert(name.into(), cost);
    }

    pub fn get(&self, name: &str) -> Option<BaseCost> {
        self.costs.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.costs.contains_key(name)
    }

    /// Unit score of a root item, if the table defines one.
    pub fn score(&self, name: &str) -> Option<f64> {
        self.get(name).map(BaseCost::value)
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    /// Entries ordered by name.
    pub fn sorted(&self) -> Vec<(&str, BaseCost)> {
        let mut entries: Vec<(&str, BaseCost)> =
            self.costs.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl<S: Into<String>> FromIterator<(S, BaseCost)> for BaseCostTable {
    fn from_iter<T: IntoIterator<Item = (S, BaseCost)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (name, cost) in iter {
            table.insert(name, cost);
        }
        table
    }
}
