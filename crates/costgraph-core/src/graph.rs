use crate::cost::BaseCostTable;
use crate::cycle::{CycleRegistry, LoopError};
use crate::evaluator::Traversal;
use crate::id::*;
use crate::item::ItemCost;
use crate::recipe::{Recipe, RecipeCost, RecipeDef};
use crate::registry::{Registry, RegistryError};
use crate::unlock::{MachineTable, UnlockIndex};
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while evaluating costs.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("unknown item: {0:?}")]
    UnknownItem(ItemId),
    #[error("unknown item name: {0}")]
    UnknownItemName(String),
    #[error("unknown recipe: {0:?}")]
    UnknownRecipe(RecipeId),
    #[error(transparent)]
    Loop(#[from] LoopError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Counters maintained by the evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// Item evaluations that missed the cache and descended.
    pub item_evaluations: u64,
    /// Recipe evaluations that missed the cache and descended.
    pub recipe_evaluations: u64,
    pub loops_registered: u64,
}

// ---------------------------------------------------------------------------
// CostGraph
// ---------------------------------------------------------------------------

/// The production graph together with everything cost evaluation consults:
/// base costs, the recipe unlock index, the facility per category, and the
/// loops detected so far.
///
/// Evaluation is single-threaded. Every public entry point starts a fresh
/// [`Traversal`] unless one is passed in explicitly.
#[derive(Debug, Clone, Default)]
pub struct CostGraph {
    pub(crate) registry: Registry,
    pub(crate) cycles: CycleRegistry,
    pub(crate) base_costs: BaseCostTable,
    pub(crate) unlocks: UnlockIndex,
    pub(crate) machines: MachineTable,
    pub(crate) stats: EvalStats,
}

impl CostGraph {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    // -- Accessors --

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cycles(&self) -> &CycleRegistry {
        &self.cycles
    }

    pub fn base_costs(&self) -> &BaseCostTable {
        &self.base_costs
    }

    pub fn unlocks(&self) -> &UnlockIndex {
        &self.unlocks
    }

    pub fn machines(&self) -> &MachineTable {
        &self.machines
    }

    pub fn machines_mut(&mut self) -> &mut MachineTable {
        &mut self.machines
    }

    pub fn stats(&self) -> EvalStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = EvalStats::default();
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.registry.item_id(name)
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.registry.recipe_id(name)
    }

    // -- Configuration --

    /// Replace the base-cost table. Scores change, so every cache is dropped.
    pub fn set_base_costs(&mut self, table: BaseCostTable) {
        self.base_costs = table;
        self.registry.invalidate_all();
    }

    /// Replace the recipe unlock index. Every cache is dropped.
    pub fn set_unlock_index(&mut self, index: UnlockIndex) {
        self.unlocks = index;
        self.registry.invalidate_all();
    }

    pub fn set_machines(&mut self, machines: MachineTable) {
        self.machines = machines;
    }

    // -- Mutation --

    pub fn register_item(
        &mut self,
        name: &str,
        is_fluid: bool,
        stack_size: Option<u32>,
    ) -> Result<ItemId, RegistryError> {
        self.registry.register_item(name, is_fluid, stack_size)
    }

    pub fn register_recipe(&mut self, def: RecipeDef) -> Result<RecipeId, RegistryError> {
        self.registry.register_recipe(def)
    }

    /// Retract a recipe. Loops running through it are dissolved.
    pub fn remove_recipe(&mut self, recipe: RecipeId) -> Result<Recipe, EvalError> {
        if self.registry.recipe(recipe).is_none() {
            return Err(EvalError::UnknownRecipe(recipe));
        }
        self.cycles.dissolve_recipe(recipe, &mut self.registry);
        Ok(self.registry.remove_recipe(recipe)?)
    }

    pub fn set_productivity(&mut self, recipe: RecipeId, productivity: bool) -> Result<(), EvalError> {
        Ok(self.registry.set_productivity(recipe, productivity)?)
    }

    /// Drop the cached cost of `item` and everything made from it.
    pub fn invalidate(&mut self, item: ItemId) {
        self.registry.invalidate_downstream(item);
    }

    pub fn invalidate_all(&mut self) {
        self.registry.invalidate_all();
    }

    /// Install a precomputed result as the cached cost of `item`.
    pub fn seed_cache(&mut self, item: ItemId, cost: ItemCost) -> Result<(), EvalError> {
        let entry = self
            .registry
            .item_mut(item)
            .ok_or(EvalError::UnknownItem(item))?;
        entry.store(cost);
        Ok(())
    }

    // -- Evaluation --

    /// Cheapest decomposition of one unit of `item` into root items.
    pub fn evaluate(&mut self, item: ItemId) -> Result<ItemCost, EvalError> {
        let mut traversal = Traversal::new();
        self.evaluate_with(item, &mut traversal)
    }

    pub fn evaluate_with(
        &mut self,
        item: ItemId,
        traversal: &mut Traversal,
    ) -> Result<ItemCost, EvalError> {
        let result = self.eval_item(item, traversal);
        if result.is_err() {
            self.abort(traversal);
        }
        result
    }

    pub fn evaluate_by_name(&mut self, name: &str) -> Result<ItemCost, EvalError> {
        let item = self
            .item_id(name)
            .ok_or_else(|| EvalError::UnknownItemName(name.to_string()))?;
        self.evaluate(item)
    }

    /// Raw-ingredient totals for one craft of `recipe`.
    pub fn evaluate_recipe(&mut self, recipe: RecipeId) -> Result<RecipeCost, EvalError> {
        let mut traversal = Traversal::new();
        let result = self.eval_recipe(recipe, &mut traversal);
        if result.is_err() {
            self.abort(&mut traversal);
        }
        result
    }

    /// Score of one unit of `item`, from the base-cost table where defined.
    pub fn unit_score(&mut self, item: ItemId) -> Result<f64, EvalError> {
        let mut traversal = Traversal::new();
        let result = self.score_of(item, &mut traversal);
        if result.is_err() {
            self.abort(&mut traversal);
        }
        result
    }

    pub fn best_recipe(&mut self, item: ItemId) -> Result<Option<RecipeId>, EvalError> {
        Ok(self.evaluate(item)?.best_recipe)
    }

    /// Evaluate every item once, in item-name order.
    pub fn precompute(&mut self) -> Result<Vec<(ItemId, ItemCost)>, EvalError> {
        let ids = self.registry.item_ids_by_name();
        let mut results = Vec::with_capacity(ids.len());
        for item in ids {
            let cost = self.evaluate(item)?;
            results.push((item, cost));
        }
        Ok(results)
    }

    /// Crafting time of one craft of `recipe` including, per ingredient, the
    /// time of its best recipe chain.
    pub fn total_energy(&mut self, recipe: RecipeId) -> Result<f64, EvalError> {
        let mut visiting = HashSet::new();
        self.total_energy_guarded(recipe, &mut visiting)
    }

    fn total_energy_guarded(
        &mut self,
        recipe: RecipeId,
        visiting: &mut HashSet<RecipeId>,
    ) -> Result<f64, EvalError> {
        let entry = self
            .registry
            .recipe(recipe)
            .ok_or(EvalError::UnknownRecipe(recipe))?;
        let mut total = entry.energy();
        let ingredients: Vec<(ItemId, f64)> =
            entry.ingredients().iter().map(|(&i, &q)| (i, q)).collect();

        visiting.insert(recipe);
        for (ingredient, quantity) in ingredients {
            let Some(best) = self.evaluate(ingredient)?.best_recipe else {
                continue;
            };
            if visiting.contains(&best) {
                continue;
            }
            let produced = self
                .registry
                .recipe(best)
                .ok_or(EvalError::UnknownRecipe(best))?
                .produced(ingredient);
            if produced <= 0.0 {
                continue;
            }
            total += self.total_energy_guarded(best, visiting)? / produced * quantity;
        }
        visiting.remove(&recipe);
        Ok(total)
    }

    fn abort(&mut self, traversal: &mut Traversal) {
        self.cycles.reset_entries(&mut self.registry);
        traversal.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn cost_arithmetic() {
        let (mut graph, [x, y, z]) = cost_arithmetic_graph();
        let cost = graph.evaluate(z).unwrap();
        assert_eq!(cost.raw_ingredients.get(&x), Some(&2.0));
        assert_eq!(cost.raw_ingredients.get(&y), Some(&1.0));
        assert_eq!(cost.raw_ingredients.len(), 2);
        assert_eq!(graph.unit_score(z).unwrap(), 4.0);
    }

    #[test]
    fn second_evaluation_hits_cache() {
        let (mut graph, [_, _, z]) = cost_arithmetic_graph();
        let first = graph.evaluate(z).unwrap();
        let after_first = graph.stats();
        assert!(after_first.item_evaluations > 0);

        let second = graph.evaluate(z).unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.stats(), after_first);
    }

    #[test]
    fn cheaper_recipe_changes_best_choice() {
        let (mut graph, [x, _, z]) = cost_arithmetic_graph();
        let old = graph.evaluate(z).unwrap().best_recipe;

        let cheap = add_recipe(&mut graph, "z-from-x", "crafting", &[(x, 1.0)], &[(z, 1.0)]);
        let new = graph.evaluate(z).unwrap().best_recipe;
        assert_ne!(old, new);
        assert_eq!(new, Some(cheap));
    }

    #[test]
    fn removing_only_recipe_falls_back_to_self() {
        let (mut graph, [_, _, z]) = cost_arithmetic_graph();
        let recipe = graph.evaluate(z).unwrap().best_recipe.unwrap();
        graph.remove_recipe(recipe).unwrap();

        let cost = graph.evaluate(z).unwrap();
        assert!(cost.is_self_decomposition(z));
        assert_eq!(cost.best_recipe, None);
        assert!(matches!(
            graph.remove_recipe(recipe),
            Err(EvalError::UnknownRecipe(_))
        ));
    }

    #[test]
    fn two_cycle_terminates_with_registered_loop() {
        let (mut graph, [a, b], _) = two_cycle_graph();
        let cost_a = graph.evaluate(a).unwrap();
        let cost_b = graph.evaluate(b).unwrap();
        assert!(!cost_a.is_empty());
        assert!(!cost_b.is_empty());
        assert_eq!(graph.cycles().len(), 1);
        assert_eq!(graph.cycles().iter().next().unwrap().len(), 2);
        assert_eq!(graph.stats().loops_registered, 1);
    }

    #[test]
    fn root_recipe_short_circuits_alternatives() {
        let mut graph = CostGraph::default();
        let ore = graph.register_item("iron-ore", false, None).unwrap();
        let scrap = graph.register_item("scrap", false, None).unwrap();
        add_recipe(&mut graph, "a-recycle-ore", "crafting", &[(scrap, 0.1)], &[(ore, 1.0)]);
        let mining = add_recipe(&mut graph, "mining-iron-ore", "basic-solid", &[], &[(ore, 1.0)]);

        assert!(graph.registry().item(ore).unwrap().is_root());
        let cost = graph.evaluate(ore).unwrap();
        assert_eq!(cost.best_recipe, Some(mining));
        assert!(cost.is_self_decomposition(ore));
        assert!(cost.categories.contains("basic-solid"));
    }

    #[test]
    fn precompute_is_name_ordered_and_deterministic() {
        let (mut graph, _) = cost_arithmetic_graph();
        let first = graph.precompute().unwrap();
        let names: Vec<&str> = first
            .iter()
            .map(|(id, _)| graph.registry().item_name(*id).unwrap())
            .collect();
        assert_eq!(names, vec!["x", "y", "z"]);

        graph.invalidate_all();
        let second = graph.precompute().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn seeded_cache_skips_descent() {
        let (mut graph, [x, _, z]) = cost_arithmetic_graph();
        let seeded = ItemCost::terminal(x);
        graph.seed_cache(z, seeded.clone()).unwrap();
        assert_eq!(graph.evaluate(z).unwrap(), seeded);
        assert_eq!(graph.stats().item_evaluations, 0);
        assert!(matches!(
            graph.seed_cache(ItemId(77), seeded),
            Err(EvalError::UnknownItem(_))
        ));
    }

    #[test]
    fn total_energy_follows_best_recipes() {
        let mut graph = CostGraph::default();
        let ore = graph.register_item("ore", false, None).unwrap();
        let plate = graph.register_item("plate", false, None).unwrap();
        let gear = graph.register_item("gear", false, None).unwrap();
        graph
            .register_recipe(
                RecipeDef::new("plate", "smelting")
                    .with_ingredient(ore, 1.0)
                    .with_product(plate, 2.0)
                    .with_energy(4.0),
            )
            .unwrap();
        let gear_recipe = graph
            .register_recipe(
                RecipeDef::new("gear", "crafting")
                    .with_ingredient(plate, 2.0)
                    .with_product(gear, 1.0)
                    .with_energy(0.5),
            )
            .unwrap();
        // 0.5 + 4.0 / 2 * 2
        assert_eq!(graph.total_energy(gear_recipe).unwrap(), 4.5);
    }

    #[test]
    fn total_energy_survives_cycles() {
        let (mut graph, _, [r1, _]) = two_cycle_graph();
        assert!(graph.total_energy(r1).unwrap().is_finite());
    }

    #[test]
    fn unknown_name_reported() {
        let mut graph = CostGraph::default();
        match graph.evaluate_by_name("nothing") {
            Err(EvalError::UnknownItemName(name)) => assert_eq!(name, "nothing"),
            other => panic!("expected UnknownItemName, got: {other:?}"),
        }
    }

    #[test]
    fn base_cost_change_drops_caches() {
        let (mut graph, [_, _, z]) = cost_arithmetic_graph();
        graph.evaluate(z).unwrap();
        graph.set_base_costs(BaseCostTable::new());
        assert_eq!(graph.unit_score(z).unwrap(), 3.0);
    }
}
