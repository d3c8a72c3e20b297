use crate::id::{ItemId, TechId};
use std::collections::{BTreeMap, BTreeSet};

/// A recipe as handed to [`Registry::register_recipe`](crate::registry::Registry::register_recipe).
///
/// Repeated entries for the same item are summed on registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDef {
    pub name: String,
    pub category: String,
    pub ingredients: Vec<(ItemId, f64)>,
    pub products: Vec<(ItemId, f64)>,
    /// Crafting time. Not used by cost selection.
    pub energy: f64,
}

impl RecipeDef {
    pub fn new(name: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            ingredients: Vec::new(),
            products: Vec::new(),
            energy: 0.0,
        }
    }

    pub fn with_ingredient(mut self, item: ItemId, quantity: f64) -> Self {
        self.ingredients.push((item, quantity));
        self
    }

    pub fn with_product(mut self, item: ItemId, quantity: f64) -> Self {
        self.products.push((item, quantity));
        self
    }

    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = energy;
        self
    }
}

/// Raw-ingredient totals for one craft of a recipe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeCost {
    pub raw_ingredients: BTreeMap<ItemId, f64>,
    pub technologies: BTreeSet<TechId>,
    pub categories: BTreeSet<String>,
}

impl RecipeCost {
    /// An empty result means an ingredient chain failed, usually mid-cycle.
    pub fn is_usable(&self) -> bool {
        !self.raw_ingredients.is_empty()
    }
}

/// A registered recipe linking ingredient items to product items.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub(crate) name: String,
    pub(crate) category: String,
    pub(crate) ingredients: BTreeMap<ItemId, f64>,
    pub(crate) products: BTreeMap<ItemId, f64>,
    pub(crate) energy: f64,
    /// Set by recipe generation outside the evaluator.
    pub productivity: bool,
    pub(crate) cache: Option<RecipeCost>,
}

impl Recipe {
    pub(crate) fn from_def(def: RecipeDef) -> Self {
        let mut ingredients = BTreeMap::new();
        for (item, quantity) in def.ingredients {
            *ingredients.entry(item).or_insert(0.0) += quantity;
        }
        let mut products = BTreeMap::new();
        for (item, quantity) in def.products {
            *products.entry(item).or_insert(0.0) += quantity;
        }
        Self {
            name: def.name,
            category: def.category,
            ingredients,
            products,
            energy: def.energy,
            productivity: false,
            cache: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn ingredients(&self) -> &BTreeMap<ItemId, f64> {
        &self.ingredients
    }

    pub fn products(&self) -> &BTreeMap<ItemId, f64> {
        &self.products
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Quantity of `item` produced by one craft, or 0 if it is not a product.
    pub fn produced(&self, item: ItemId) -> f64 {
        self.products.get(&item).copied().unwrap_or(0.0)
    }

    pub fn consumes(&self, item: ItemId) -> bool {
        self.ingredients.contains_key(&item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_entries_are_summed() {
        let def = RecipeDef::new("circuit", "crafting")
            .with_ingredient(ItemId(0), 1.0)
            .with_ingredient(ItemId(1), 3.0)
            .with_ingredient(ItemId(0), 0.5)
            .with_product(ItemId(2), 1.0);
        let recipe = Recipe::from_def(def);
        assert_eq!(recipe.ingredients()[&ItemId(0)], 1.5);
        assert_eq!(recipe.ingredients().len(), 2);
        assert!(recipe.consumes(ItemId(1)));
    }

    #[test]
    fn produced_defaults_to_zero() {
        let recipe = Recipe::from_def(
            RecipeDef::new("gear", "crafting")
                .with_ingredient(ItemId(0), 2.0)
                .with_product(ItemId(1), 1.0)
                .with_energy(0.5),
        );
        assert_eq!(recipe.produced(ItemId(1)), 1.0);
        assert_eq!(recipe.produced(ItemId(0)), 0.0);
        assert_eq!(recipe.energy(), 0.5);
        assert!(!recipe.productivity);
    }

    #[test]
    fn empty_recipe_cost_is_unusable() {
        assert!(!RecipeCost::default().is_usable());
    }
}
