//! Loading configuration.
//!
//! Read from an optional `config` source in the data directory. Every field
//! has a default, so an empty file (or no file) gives the stock behaviour.

use costgraph_core::registry::DEFAULT_ROOT_CATEGORIES;
use costgraph_tech_tree::{ProgressiveOptions, detect_progressive_rows};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::schema::RecipeData;

/// Tunables for turning data sources into a cost graph.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Categories whose recipes make their products root items.
    pub root_categories: Vec<String>,
    /// Items and fluids never registered. Recipes mentioning them are dropped.
    pub excluded_items: BTreeSet<String>,
    /// Items registered even though the item table lacks them.
    pub extra_items: Vec<String>,
    /// Only the container's own recipe may produce a container item.
    pub container_items: BTreeSet<String>,
    pub skipped_recipe_categories: BTreeSet<String>,
    /// Recipes available without research.
    pub start_unlocked_recipes: BTreeSet<String>,
    /// The facility that has no item of its own.
    pub hand_crafting_machine: String,
    /// Extra categories per facility. Unknown facilities are added.
    pub machine_categories: BTreeMap<String, Vec<String>>,
    /// Technology modifier that enables mining resources that need a fluid.
    pub fluid_mining_modifier: String,
    /// Detect `<name>-1`, `<name>-2`, ... rows among the technologies.
    pub auto_progressive: bool,
    /// Explicit progressive rows. Replace detected rows of the same name.
    pub progressive: BTreeMap<String, Vec<String>>,
    /// Source row appended onto target row.
    pub progressive_merge: BTreeMap<String, String>,
    /// Detected rows to discard.
    pub progressive_drop: BTreeSet<String>,
    pub keep_useless: BTreeSet<String>,
}

impl Default for CostConfig {
    fn default() -> Self {
        let mut excluded_items: BTreeSet<String> =
            ["pistol", "fluid-unknown"].into_iter().map(String::from).collect();
        excluded_items.extend((0..10).map(|n| format!("parameter-{n}")));

        Self {
            root_categories: DEFAULT_ROOT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            excluded_items,
            extra_items: vec!["rocket-part".to_string()],
            container_items: ["barrel", "bob-gas-canister", "bob-empty-canister"]
                .into_iter()
                .map(String::from)
                .collect(),
            skipped_recipe_categories: BTreeSet::from(["parameters".to_string()]),
            start_unlocked_recipes: BTreeSet::new(),
            hand_crafting_machine: "character".to_string(),
            machine_categories: BTreeMap::new(),
            fluid_mining_modifier: "mining-with-fluid".to_string(),
            auto_progressive: true,
            progressive: BTreeMap::new(),
            progressive_merge: BTreeMap::new(),
            progressive_drop: BTreeSet::new(),
            keep_useless: BTreeSet::new(),
        }
    }
}

/// Why a recipe is left out of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Category,
    Container,
    ExcludedItem,
}

impl CostConfig {
    pub fn is_excluded(&self, item: &str) -> bool {
        self.excluded_items.contains(item)
    }

    pub fn skip_reason(&self, name: &str, recipe: &RecipeData) -> Option<SkipReason> {
        if self.skipped_recipe_categories.contains(&recipe.category) {
            return Some(SkipReason::Category);
        }
        let foreign_container = self
            .container_items
            .iter()
            .any(|c| c != name && recipe.products.contains_key(c));
        if foreign_container {
            return Some(SkipReason::Container);
        }
        if self.excluded_items.iter().any(|item| recipe.mentions(item)) {
            return Some(SkipReason::ExcludedItem);
        }
        None
    }

    /// Progressive rows for the given atomic technology names.
    pub fn progressive_options<'a, I>(&self, tech_names: I) -> ProgressiveOptions
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut rows = if self.auto_progressive {
            detect_progressive_rows(tech_names)
        } else {
            BTreeMap::new()
        };
        rows.retain(|row, _| !self.progressive_drop.contains(row));
        rows.extend(self.progressive.clone());

        ProgressiveOptions {
            rows,
            merges: self.progressive_merge.clone(),
            keep_useless: self.keep_useless.clone(),
        }
    }
}
