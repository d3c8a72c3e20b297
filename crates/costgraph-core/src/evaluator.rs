//! Depth-first cost evaluation.
//!
//! All recursion state lives in a [`Traversal`] passed down the calls, so
//! independent evaluations never share their active path. Everything that
//! outlives one evaluation (caches, loops, loop entry state) lives on the
//! [`CostGraph`].

use crate::cycle::LoopEdge;
use crate::graph::{CostGraph, EvalError};
use crate::id::{ItemId, LoopId, RecipeId};
use crate::item::{Item, ItemCost};
use crate::recipe::RecipeCost;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

#[derive(Debug)]
struct Frame {
    item: ItemId,
    /// Candidate recipe currently being evaluated for `item`.
    recipe: Option<RecipeId>,
    /// Loops this frame transitioned into the entered state.
    entered: Vec<LoopId>,
}

/// State of one depth-first evaluation: the stack of (item, recipe) edges
/// being descended and the set of items on it.
#[derive(Debug, Default)]
pub struct Traversal {
    frames: Vec<Frame>,
    on_path: HashSet<ItemId>,
    scoring: HashSet<ItemId>,
}

impl Traversal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on_path(&self, item: ItemId) -> bool {
        self.on_path.contains(&item)
    }

    /// The (item, recipe) edges from the first frame of `item` to the top.
    fn path_from(&self, item: ItemId) -> Option<(usize, Vec<LoopEdge>)> {
        let start = self.frames.iter().position(|f| f.item == item)?;
        let edges = self.frames[start..]
            .iter()
            .filter_map(|f| f.recipe.map(|recipe| LoopEdge { item: f.item, recipe }))
            .collect();
        Some((start, edges))
    }

    fn set_recipe(&mut self, recipe: RecipeId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.recipe = Some(recipe);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
        self.on_path.clear();
        self.scoring.clear();
    }
}

impl CostGraph {
    fn item_or_err(&self, item: ItemId) -> Result<&Item, EvalError> {
        self.registry.item(item).ok_or(EvalError::UnknownItem(item))
    }

    fn loop_entered(&self, item: ItemId) -> bool {
        self.registry.item(item).is_some_and(Item::is_loop_entered)
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    pub(crate) fn eval_item(
        &mut self,
        item: ItemId,
        t: &mut Traversal,
    ) -> Result<ItemCost, EvalError> {
        let entry = self.item_or_err(item)?;
        if let Some(cost) = entry.cached_cost() {
            return Ok(cost.clone());
        }
        if t.is_on_path(item) {
            return Ok(ItemCost::default());
        }
        let has_producers = entry.has_producers();
        let root_recipe = entry.root_recipe();
        let loops: Vec<LoopId> = entry.loops().collect();
        let has_base_cost = self.base_costs.contains(entry.name());
        self.stats.item_evaluations += 1;

        if !has_producers {
            if !has_base_cost {
                warn!(
                    item = self.registry.item_name(item).unwrap_or_default(),
                    "item has no recipe and no base cost, defaulting to 1"
                );
            }
            let cost = ItemCost::terminal(item);
            if let Some(entry) = self.registry.item_mut(item) {
                entry.store(cost.clone());
            }
            return Ok(cost);
        }

        t.on_path.insert(item);
        let mut entered = Vec::new();
        for id in loops {
            if self.cycles.enter(id, item, &mut self.registry)? {
                entered.push(id);
            }
        }
        t.frames.push(Frame {
            item,
            recipe: None,
            entered,
        });

        let result = match root_recipe {
            Some(recipe) => self.eval_root(item, recipe, t),
            None => self.select_cheapest(item, t),
        };

        let frame = t.frames.pop();
        t.on_path.remove(&item);
        if let Some(frame) = frame {
            for id in frame.entered {
                self.cycles.exit(id, item, &mut self.registry)?;
            }
        }
        let mut cost = result?;

        if root_recipe.is_none() && self.loop_entered(item) {
            // Only valid for the current path through the loop.
            return Ok(cost);
        }
        if cost.is_empty() {
            if root_recipe.is_none() && !has_base_cost {
                warn!(
                    item = self.registry.item_name(item).unwrap_or_default(),
                    "no usable recipe, defaulting to 1"
                );
            }
            cost.raw_ingredients = BTreeMap::from([(item, 1.0)]);
        }
        if let Some(entry) = self.registry.item_mut(item) {
            entry.store(cost.clone());
        }
        Ok(cost)
    }

    /// Root items take their bound recipe without comparing alternatives.
    fn eval_root(
        &mut self,
        item: ItemId,
        recipe: RecipeId,
        t: &mut Traversal,
    ) -> Result<ItemCost, EvalError> {
        t.set_recipe(recipe);
        let cost = self.eval_recipe(recipe, t)?;
        let produced = self
            .registry
            .recipe(recipe)
            .ok_or(EvalError::UnknownRecipe(recipe))?
            .produced(item);
        Ok(ItemCost {
            raw_ingredients: per_unit(cost.raw_ingredients, produced),
            best_recipe: Some(recipe),
            technologies: cost.technologies,
            categories: cost.categories,
        })
    }

    /// Greedy choice over all producers, in recipe-name order. The first
    /// usable candidate wins unless a later one scores strictly lower.
    fn select_cheapest(&mut self, item: ItemId, t: &mut Traversal) -> Result<ItemCost, EvalError> {
        let mut best: Option<(f64, ItemCost)> = None;

        for recipe in self.registry.producers_by_name(item) {
            if self.item_or_err(item)?.is_blocked(recipe) {
                debug!(
                    item = self.registry.item_name(item).unwrap_or_default(),
                    recipe = self.registry.recipe_name(recipe).unwrap_or_default(),
                    "skipping recipe blocked by entered loop"
                );
                continue;
            }
            t.set_recipe(recipe);
            let cost = self.eval_recipe(recipe, t)?;
            if !cost.is_usable() {
                continue;
            }
            let produced = self
                .registry
                .recipe(recipe)
                .ok_or(EvalError::UnknownRecipe(recipe))?
                .produced(item);
            let raw = per_unit(cost.raw_ingredients, produced);
            let score = self.ingredient_score(&raw, t)?;

            if best.as_ref().is_some_and(|(lowest, _)| score >= *lowest) {
                continue;
            }
            best = Some((
                score,
                ItemCost {
                    raw_ingredients: raw,
                    best_recipe: Some(recipe),
                    technologies: cost.technologies,
                    categories: cost.categories,
                },
            ));
        }
        Ok(best.map(|(_, cost)| cost).unwrap_or_default())
    }

    // -----------------------------------------------------------------------
    // Recipes
    // -----------------------------------------------------------------------

    pub(crate) fn eval_recipe(
        &mut self,
        recipe: RecipeId,
        t: &mut Traversal,
    ) -> Result<RecipeCost, EvalError> {
        let entry = self
            .registry
            .recipe(recipe)
            .ok_or(EvalError::UnknownRecipe(recipe))?;
        let ingredients: Vec<(ItemId, f64)> =
            entry.ingredients().iter().map(|(&i, &q)| (i, q)).collect();

        let in_loop = ingredients.iter().any(|(i, _)| self.loop_entered(*i));
        if !in_loop {
            if let Some(cached) = &entry.cache {
                return Ok(cached.clone());
            }
        }
        self.stats.recipe_evaluations += 1;

        let mut cost = RecipeCost {
            raw_ingredients: BTreeMap::new(),
            technologies: self.unlocks.technologies_for(entry.name()),
            categories: BTreeSet::from([entry.category().to_string()]),
        };

        for &(ingredient, quantity) in &ingredients {
            if t.is_on_path(ingredient) {
                self.register_cycle(ingredient, t)?;
                return Ok(RecipeCost::default());
            }
            let sub = self.eval_item(ingredient, t)?;
            if sub.is_empty() {
                return Ok(RecipeCost::default());
            }
            for (raw, amount) in sub.raw_ingredients {
                *cost.raw_ingredients.entry(raw).or_insert(0.0) += amount * quantity;
            }
            cost.technologies.extend(sub.technologies);
            cost.categories.extend(sub.categories);
        }

        let in_loop = ingredients.iter().any(|(i, _)| self.loop_entered(*i));
        if !in_loop {
            if let Some(entry) = self.registry.recipe_mut(recipe) {
                entry.cache = Some(cost.clone());
            }
        }
        Ok(cost)
    }

    /// Record the loop closed by reaching `item` again. A newly found loop is
    /// entered right away through `item`, and the frame of `item` takes care
    /// of leaving it.
    fn register_cycle(&mut self, item: ItemId, t: &mut Traversal) -> Result<(), EvalError> {
        let Some((start, edges)) = t.path_from(item) else {
            return Ok(());
        };
        if edges.is_empty() {
            return Ok(());
        }
        let (id, created) = self.cycles.register(edges, &mut self.registry);
        if created {
            self.stats.loops_registered += 1;
            if self.cycles.enter(id, item, &mut self.registry)? {
                t.frames[start].entered.push(id);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Scores
    // -----------------------------------------------------------------------

    /// Score of one unit of `item`: its base cost if it has one, 1 if it
    /// does not decompose into anything but itself, the weighted sum of its
    /// raw ingredients otherwise.
    pub(crate) fn score_of(&mut self, item: ItemId, t: &mut Traversal) -> Result<f64, EvalError> {
        let name = self.item_or_err(item)?.name();
        if let Some(score) = self.base_costs.score(name) {
            return Ok(score);
        }
        if !t.scoring.insert(item) {
            return Ok(1.0);
        }
        let result = match self.eval_item(item, t) {
            Ok(cost) if cost.is_empty() || cost.is_self_decomposition(item) => Ok(1.0),
            Ok(cost) => self.ingredient_score(&cost.raw_ingredients, t),
            Err(e) => Err(e),
        };
        t.scoring.remove(&item);
        result
    }

    pub(crate) fn ingredient_score(
        &mut self,
        raw: &BTreeMap<ItemId, f64>,
        t: &mut Traversal,
    ) -> Result<f64, EvalError> {
        let mut total = 0.0;
        for (&item, &amount) in raw {
            total += self.score_of(item, t)? * amount;
        }
        Ok(total)
    }
}

fn per_unit(raw: BTreeMap<ItemId, f64>, produced: f64) -> BTreeMap<ItemId, f64> {
    if produced <= 0.0 {
        return raw;
    }
    raw.into_iter().map(|(k, v)| (k, v / produced)).collect()
}
