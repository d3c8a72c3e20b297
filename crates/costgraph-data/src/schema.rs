//! Serde structs for the on-disk data sources.
//!
//! Sources are keyed by name so that every format (RON, JSON, TOML) can
//! express them as a top-level map. They are resolved into a
//! [`CostGraph`](costgraph_core::CostGraph) by [`crate::resolve`].

use costgraph_core::cost::BaseCost;
use serde::Deserialize;
use std::collections::BTreeMap;

pub use costgraph_tech_tree::TechnologyDef;

/// Item name to stack size.
pub type ItemsData = BTreeMap<String, u32>;

/// Technology name to definition.
pub type TechsData = BTreeMap<String, TechnologyDef>;

/// Facility name to the production categories it handles.
pub type MachinesData = BTreeMap<String, Vec<String>>;

/// Production category to facility name.
pub type CategoriesData = BTreeMap<String, String>;

// ===========================================================================
// Recipes
// ===========================================================================

/// A recipe definition, keyed by recipe name.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub category: String,
    #[serde(default)]
    pub ingredients: BTreeMap<String, f64>,
    pub products: BTreeMap<String, f64>,
    /// Crafting time in seconds.
    #[serde(default)]
    pub energy: f64,
}

impl RecipeData {
    pub fn mentions(&self, item: &str) -> bool {
        self.ingredients.contains_key(item) || self.products.contains_key(item)
    }
}

pub type RecipesData = BTreeMap<String, RecipeData>;

// ===========================================================================
// Resources
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceProduct {
    pub name: String,
    pub amount: f64,
}

/// A mineable resource. Loaded as the recipe `mining-<name>`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceData {
    pub category: String,
    pub mining_time: f64,
    #[serde(default)]
    pub products: BTreeMap<String, ResourceProduct>,
    #[serde(default)]
    pub required_fluid: Option<String>,
    #[serde(default)]
    pub fluid_amount: Option<f64>,
}

impl ResourceData {
    pub fn recipe_name(resource: &str) -> String {
        format!("mining-{resource}")
    }

    /// The equivalent recipe definition. A required fluid becomes the only
    /// ingredient.
    pub fn to_recipe(&self) -> RecipeData {
        let ingredients = match &self.required_fluid {
            Some(fluid) => BTreeMap::from([(fluid.clone(), self.fluid_amount.unwrap_or(1.0))]),
            None => BTreeMap::new(),
        };
        RecipeData {
            category: self.category.clone(),
            ingredients,
            products: self
                .products
                .values()
                .map(|p| (p.name.clone(), p.amount))
                .collect(),
            energy: self.mining_time,
        }
    }
}

pub type ResourcesData = BTreeMap<String, ResourceData>;

// ===========================================================================
// Base costs
// ===========================================================================

/// A base cost: a number, or `"inf"` for items that cannot be obtained.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BaseCostData {
    Number(f64),
    Text(String),
}

impl BaseCostData {
    /// Numbers must be positive or `+inf`; text must spell infinity.
    pub fn to_base_cost(&self) -> Result<BaseCost, String> {
        match self {
            BaseCostData::Number(value) => BaseCost::try_from(*value).map_err(|e| e.to_string()),
            BaseCostData::Text(text) => match text.to_ascii_lowercase().as_str() {
                "inf" | "infinity" | "unobtainable" => Ok(BaseCost::Unobtainable),
                _ => Err(format!("'{text}' is neither a number nor \"inf\"")),
            },
        }
    }
}

pub type BaseCostsData = BTreeMap<String, BaseCostData>;
