use crate::id::*;
use crate::item::Item;
use crate::recipe::{Recipe, RecipeDef};
use slotmap::SlotMap;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Categories whose recipes make their products root items (mining, pumping).
pub const DEFAULT_ROOT_CATEGORIES: [&str; 4] = ["basic-solid", "basic-fluid", "water", "bob-air-pump"];

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate item: {0}")]
    DuplicateItem(String),
    #[error("duplicate recipe: {0}")]
    DuplicateRecipe(String),
    #[error("invalid item reference: {0:?}")]
    UnknownItem(ItemId),
    #[error("recipe {recipe} has invalid quantity {quantity} for {item:?}")]
    InvalidQuantity {
        recipe: String,
        item: ItemId,
        quantity: f64,
    },
    #[error("recipe {recipe} has invalid energy {energy}")]
    InvalidEnergy { recipe: String, energy: f64 },
    #[error("recipe not found: {0:?}")]
    RecipeNotFound(RecipeId),
}

/// Arena of items and recipes.
///
/// Items live for the lifetime of the registry. Recipes can be registered and
/// retracted at any time; both keep the producer/consumer sets of the
/// affected items in sync and invalidate every cached cost downstream.
#[derive(Debug, Clone)]
pub struct Registry {
    items: Vec<Item>,
    item_name_to_id: HashMap<String, ItemId>,
    recipes: SlotMap<RecipeId, Recipe>,
    recipe_name_to_id: HashMap<String, RecipeId>,
    root_categories: BTreeSet<String>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_CATEGORIES)
    }
}

impl Registry {
    pub fn new<I, S>(root_categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: Vec::new(),
            item_name_to_id: HashMap::new(),
            recipes: SlotMap::with_key(),
            recipe_name_to_id: HashMap::new(),
            root_categories: root_categories.into_iter().map(Into::into).collect(),
        }
    }

    // -- Registration --

    /// Register an item or fluid. Names are unique across both.
    pub fn register_item(
        &mut self,
        name: &str,
        is_fluid: bool,
        stack_size: Option<u32>,
    ) -> Result<ItemId, RegistryError> {
        if self.item_name_to_id.contains_key(name) {
            return Err(RegistryError::DuplicateItem(name.to_string()));
        }
        let id = ItemId(self.items.len() as u32);
        self.items.push(Item::new(name, is_fluid, stack_size));
        self.item_name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Register a recipe and link it into the producer/consumer sets of its
    /// items. A recipe in a root category binds itself as the root recipe of
    /// each of its products.
    pub fn register_recipe(&mut self, def: RecipeDef) -> Result<RecipeId, RegistryError> {
        if self.recipe_name_to_id.contains_key(&def.name) {
            return Err(RegistryError::DuplicateRecipe(def.name));
        }
        for &(item, quantity) in def.ingredients.iter().chain(def.products.iter()) {
            if item.0 as usize >= self.items.len() {
                return Err(RegistryError::UnknownItem(item));
            }
            if !quantity.is_finite() || quantity <= 0.0 {
                return Err(RegistryError::InvalidQuantity {
                    recipe: def.name.clone(),
                    item,
                    quantity,
                });
            }
        }
        if !def.energy.is_finite() || def.energy < 0.0 {
            return Err(RegistryError::InvalidEnergy {
                recipe: def.name.clone(),
                energy: def.energy,
            });
        }

        let is_root = self.root_categories.contains(&def.category);
        let name = def.name.clone();
        let recipe = Recipe::from_def(def);
        let products: Vec<ItemId> = recipe.products.keys().copied().collect();
        let ingredients: Vec<ItemId> = recipe.ingredients.keys().copied().collect();

        let id = self.recipes.insert(recipe);
        self.recipe_name_to_id.insert(name, id);

        for &product in &products {
            let item = &mut self.items[product.0 as usize];
            item.producers.insert(id);
            if is_root {
                item.root_recipe = Some(id);
            }
        }
        for &ingredient in &ingredients {
            self.items[ingredient.0 as usize].consumers.insert(id);
        }
        for product in products {
            self.invalidate_downstream(product);
        }
        Ok(id)
    }

    /// Retract a recipe. Leaves no references to it behind and invalidates
    /// every cost that could have depended on it.
    pub fn remove_recipe(&mut self, id: RecipeId) -> Result<Recipe, RegistryError> {
        let recipe = self
            .recipes
            .remove(id)
            .ok_or(RegistryError::RecipeNotFound(id))?;
        self.recipe_name_to_id.remove(&recipe.name);

        for &product in recipe.products.keys() {
            self.items[product.0 as usize].producers.remove(&id);
            if self.items[product.0 as usize].root_recipe == Some(id) {
                let rebound = self.rebind_root(product);
                self.items[product.0 as usize].root_recipe = rebound;
            }
        }
        for &ingredient in recipe.ingredients.keys() {
            self.items[ingredient.0 as usize].consumers.remove(&id);
        }
        for &product in recipe.products.keys() {
            self.invalidate_downstream(product);
        }
        Ok(recipe)
    }

    /// Mark a recipe as productivity-eligible.
    pub fn set_productivity(&mut self, id: RecipeId, productivity: bool) -> Result<(), RegistryError> {
        let recipe = self
            .recipes
            .get_mut(id)
            .ok_or(RegistryError::RecipeNotFound(id))?;
        recipe.productivity = productivity;
        Ok(())
    }

    /// Pick the remaining root-category producer with the smallest name.
    fn rebind_root(&self, item: ItemId) -> Option<RecipeId> {
        self.items[item.0 as usize]
            .producers
            .iter()
            .filter_map(|&r| self.recipes.get(r).map(|recipe| (r, recipe)))
            .filter(|(_, recipe)| self.root_categories.contains(&recipe.category))
            .min_by(|a, b| a.1.name.cmp(&b.1.name))
            .map(|(r, _)| r)
    }

    // -- Invalidation --

    /// Drop the cached cost of `item` and of everything produced from it,
    /// transitively, together with the cached totals of consuming recipes.
    pub fn invalidate_downstream(&mut self, item: ItemId) {
        let mut stack = vec![item];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(entry) = self.items.get_mut(current.0 as usize) else {
                continue;
            };
            entry.invalidate();
            let consumers: Vec<RecipeId> = entry.consumers.iter().copied().collect();
            for consumer in consumers {
                if let Some(recipe) = self.recipes.get_mut(consumer) {
                    recipe.cache = None;
                    stack.extend(recipe.products.keys().copied());
                }
            }
        }
    }

    /// Drop every cached cost.
    pub fn invalidate_all(&mut self) {
        for item in &mut self.items {
            item.invalidate();
        }
        for recipe in self.recipes.values_mut() {
            recipe.cache = None;
        }
    }

    // -- Queries --

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.0 as usize)
    }

    pub(crate) fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(id.0 as usize)
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    pub(crate) fn recipe_mut(&mut self, id: RecipeId) -> Option<&mut Recipe> {
        self.recipes.get_mut(id)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    pub fn item_name(&self, id: ItemId) -> Option<&str> {
        self.item(id).map(Item::name)
    }

    pub fn recipe_name(&self, id: RecipeId) -> Option<&str> {
        self.recipe(id).map(Recipe::name)
    }

    pub fn items(&self) -> impl Iterator<Item = (ItemId, &Item)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (ItemId(i as u32), item))
    }

    pub fn recipes(&self) -> impl Iterator<Item = (RecipeId, &Recipe)> {
        self.recipes.iter()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    pub fn root_categories(&self) -> &BTreeSet<String> {
        &self.root_categories
    }

    pub fn is_root_category(&self, category: &str) -> bool {
        self.root_categories.contains(category)
    }

    /// Recipes producing `item`, ordered by recipe name.
    pub fn producers_by_name(&self, item: ItemId) -> Vec<RecipeId> {
        let Some(entry) = self.item(item) else {
            return Vec::new();
        };
        let mut producers: Vec<(&str, RecipeId)> = entry
            .producers
            .iter()
            .filter_map(|&r| self.recipes.get(r).map(|recipe| (recipe.name.as_str(), r)))
            .collect();
        producers.sort_by(|a, b| a.0.cmp(b.0));
        producers.into_iter().map(|(_, r)| r).collect()
    }

    /// All item ids, ordered by item name.
    pub fn item_ids_by_name(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = (0..self.items.len() as u32).map(ItemId).collect();
        ids.sort_by(|a, b| self.items[a.0 as usize].name.cmp(&self.items[b.0 as usize].name));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemCost;

    fn setup() -> (Registry, ItemId, ItemId) {
        let mut reg = Registry::default();
        let ore = reg.register_item("iron-ore", false, Some(50)).unwrap();
        let plate = reg.register_item("iron-plate", false, Some(100)).unwrap();
        reg.register_recipe(
            RecipeDef::new("iron-plate", "smelting")
                .with_ingredient(ore, 1.0)
                .with_product(plate, 1.0)
                .with_energy(3.2),
        )
        .unwrap();
        (reg, ore, plate)
    }

    #[test]
    fn register_and_lookup() {
        let (reg, ore, plate) = setup();
        assert_eq!(reg.item_count(), 2);
        assert_eq!(reg.recipe_count(), 1);
        assert_eq!(reg.item_id("iron-ore"), Some(ore));
        assert_eq!(reg.item_name(plate), Some("iron-plate"));
        let recipe = reg.recipe_id("iron-plate").unwrap();
        assert!(reg.item(plate).unwrap().producers().any(|r| r == recipe));
        assert!(reg.item(ore).unwrap().consumers().any(|r| r == recipe));
    }

    #[test]
    fn duplicate_names_rejected() {
        let (mut reg, ore, plate) = setup();
        assert!(matches!(
            reg.register_item("iron-ore", true, None),
            Err(RegistryError::DuplicateItem(_))
        ));
        let dup = RecipeDef::new("iron-plate", "smelting")
            .with_ingredient(ore, 2.0)
            .with_product(plate, 1.0);
        assert!(matches!(
            reg.register_recipe(dup),
            Err(RegistryError::DuplicateRecipe(_))
        ));
    }

    #[test]
    fn invalid_quantities_rejected() {
        let (mut reg, ore, plate) = setup();
        let zero = RecipeDef::new("bad", "crafting")
            .with_ingredient(ore, 0.0)
            .with_product(plate, 1.0);
        assert!(matches!(
            reg.register_recipe(zero),
            Err(RegistryError::InvalidQuantity { .. })
        ));
        let nan = RecipeDef::new("bad", "crafting").with_product(plate, f64::NAN);
        assert!(reg.register_recipe(nan).is_err());
        let negative_energy = RecipeDef::new("bad", "crafting")
            .with_product(plate, 1.0)
            .with_energy(-1.0);
        assert!(matches!(
            reg.register_recipe(negative_energy),
            Err(RegistryError::InvalidEnergy { .. })
        ));
    }

    #[test]
    fn unknown_item_reference_rejected() {
        let (mut reg, _, plate) = setup();
        let def = RecipeDef::new("ghost", "crafting")
            .with_ingredient(ItemId(999), 1.0)
            .with_product(plate, 1.0);
        match reg.register_recipe(def) {
            Err(RegistryError::UnknownItem(id)) => assert_eq!(id, ItemId(999)),
            other => panic!("expected UnknownItem, got: {other:?}"),
        }
    }

    #[test]
    fn root_category_binds_root_recipe() {
        let mut reg = Registry::default();
        let ore = reg.register_item("copper-ore", false, None).unwrap();
        let mining = reg
            .register_recipe(RecipeDef::new("mining-copper-ore", "basic-solid").with_product(ore, 1.0))
            .unwrap();
        let item = reg.item(ore).unwrap();
        assert!(item.is_root());
        assert_eq!(item.root_recipe(), Some(mining));
    }

    #[test]
    fn remove_recipe_cleans_links() {
        let (mut reg, ore, plate) = setup();
        let recipe = reg.recipe_id("iron-plate").unwrap();
        let removed = reg.remove_recipe(recipe).unwrap();
        assert_eq!(removed.name(), "iron-plate");
        assert!(reg.recipe(recipe).is_none());
        assert!(reg.recipe_id("iron-plate").is_none());
        assert!(!reg.item(plate).unwrap().has_producers());
        assert_eq!(reg.item(ore).unwrap().consumers().count(), 0);
        assert!(matches!(
            reg.remove_recipe(recipe),
            Err(RegistryError::RecipeNotFound(_))
        ));
    }

    #[test]
    fn removing_root_recipe_rebinds_to_remaining_root_producer() {
        let mut reg = Registry::default();
        let water = reg.register_item("water", true, None).unwrap();
        let a = reg
            .register_recipe(RecipeDef::new("pump-a", "water").with_product(water, 10.0))
            .unwrap();
        let b = reg
            .register_recipe(RecipeDef::new("pump-b", "water").with_product(water, 10.0))
            .unwrap();
        assert_eq!(reg.item(water).unwrap().root_recipe(), Some(b));

        reg.remove_recipe(b).unwrap();
        assert_eq!(reg.item(water).unwrap().root_recipe(), Some(a));

        reg.remove_recipe(a).unwrap();
        assert_eq!(reg.item(water).unwrap().root_recipe(), None);
    }

    #[test]
    fn new_recipe_invalidates_downstream_caches() {
        let (mut reg, ore, plate) = setup();
        let gear = reg.register_item("gear", false, None).unwrap();
        reg.register_recipe(
            RecipeDef::new("gear", "crafting")
                .with_ingredient(plate, 2.0)
                .with_product(gear, 1.0),
        )
        .unwrap();
        reg.item_mut(gear).unwrap().store(ItemCost::terminal(ore));
        reg.item_mut(plate).unwrap().store(ItemCost::terminal(ore));
        assert!(reg.item(gear).unwrap().cached_cost().is_some());

        reg.register_recipe(RecipeDef::new("plate-from-nothing", "crafting").with_product(plate, 1.0))
            .unwrap();

        assert!(reg.item(plate).unwrap().cached_cost().is_none());
        assert!(reg.item(gear).unwrap().cached_cost().is_none());
    }

    #[test]
    fn producers_are_ordered_by_name() {
        let mut reg = Registry::default();
        let a = reg.register_item("a", false, None).unwrap();
        let z = reg.register_recipe(RecipeDef::new("zeta", "crafting").with_product(a, 1.0)).unwrap();
        let m = reg.register_recipe(RecipeDef::new("mu", "crafting").with_product(a, 1.0)).unwrap();
        let b = reg.register_recipe(RecipeDef::new("beta", "crafting").with_product(a, 1.0)).unwrap();
        assert_eq!(reg.producers_by_name(a), vec![b, m, z]);
    }

    #[test]
    fn items_ordered_by_name() {
        let mut reg = Registry::default();
        let z = reg.register_item("zinc", false, None).unwrap();
        let c = reg.register_item("coal", false, None).unwrap();
        assert_eq!(reg.item_ids_by_name(), vec![c, z]);
    }

    #[test]
    fn error_display_messages() {
        let msg = format!("{}", RegistryError::DuplicateItem("coal".into()));
        assert!(msg.contains("duplicate item"), "got: {msg}");
        let msg = format!(
            "{}",
            RegistryError::InvalidEnergy { recipe: "gear".into(), energy: -1.0 }
        );
        assert!(msg.contains("invalid energy"), "got: {msg}");
    }
}
