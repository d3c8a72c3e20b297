//! Detected recipe loops and their entry/exit state machine.
//!
//! A loop is the ordered chain of (item, recipe) edges found on the active
//! traversal path when an item shows up a second time: each edge's recipe
//! produces its item and consumes the item of the following edge, the last
//! edge's recipe consuming the first item again.

use crate::id::{ItemId, LoopId, RecipeId};
use crate::registry::Registry;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("exit from {0:?} called without an active entry")]
    ExitWithoutEntry(LoopId),
    #[error("item {item:?} is not part of {loop_id:?}")]
    NotAMember { loop_id: LoopId, item: ItemId },
    #[error("loop not found: {0:?}")]
    NotFound(LoopId),
    #[error("{loop_id:?} references retracted recipe {recipe:?}")]
    StaleRecipe { loop_id: LoopId, recipe: RecipeId },
}

/// One step of a loop: `recipe` produces `item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopEdge {
    pub item: ItemId,
    pub recipe: RecipeId,
}

/// A detected loop. Edges are stored in canonical rotation.
#[derive(Debug, Clone)]
pub struct RecipeLoop {
    id: LoopId,
    edges: Vec<LoopEdge>,
    entry: Option<ItemId>,
    blocked: Option<RecipeId>,
}

impl RecipeLoop {
    pub fn id(&self) -> LoopId {
        self.id
    }

    pub fn edges(&self) -> &[LoopEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The item through which the active traversal entered this loop.
    pub fn entry(&self) -> Option<ItemId> {
        self.entry
    }

    /// The recipe that would close the loop again while it is entered.
    pub fn blocked_recipe(&self) -> Option<RecipeId> {
        self.blocked
    }

    pub fn is_entered(&self) -> bool {
        self.entry.is_some()
    }

    pub fn contains_item(&self, item: ItemId) -> bool {
        self.position(item).is_some()
    }

    pub fn contains_recipe(&self, recipe: RecipeId) -> bool {
        self.edges.iter().any(|e| e.recipe == recipe)
    }

    fn position(&self, item: ItemId) -> Option<usize> {
        self.edges.iter().position(|e| e.item == item)
    }

    /// Ingredients needed to make one `item` by going once around the loop,
    /// starting at `item`.
    ///
    /// Each step scales the edge recipe to the demand for its product and
    /// passes the demand for the next loop item along instead of recording
    /// it. What the last edge consumes of `item` itself shows up in the
    /// result under `item` and acts as the loop's discount factor.
    pub fn cost_of(
        &self,
        item: ItemId,
        registry: &Registry,
    ) -> Result<BTreeMap<ItemId, f64>, LoopError> {
        let start = self.position(item).ok_or(LoopError::NotAMember {
            loop_id: self.id,
            item,
        })?;
        let n = self.edges.len();
        let mut result: BTreeMap<ItemId, f64> = BTreeMap::new();
        let mut demand: BTreeMap<ItemId, f64> = BTreeMap::from([(item, 1.0)]);

        for step in 0..n {
            let edge = self.edges[(start + step) % n];
            let recipe = registry.recipe(edge.recipe).ok_or(LoopError::StaleRecipe {
                loop_id: self.id,
                recipe: edge.recipe,
            })?;
            let produced = recipe.produced(edge.item);
            if produced <= 0.0 {
                return Err(LoopError::StaleRecipe {
                    loop_id: self.id,
                    recipe: edge.recipe,
                });
            }
            let wanted = demand.get(&edge.item).copied().unwrap_or(0.0);
            demand = recipe
                .ingredients()
                .iter()
                .map(|(&ingredient, &quantity)| (ingredient, quantity / produced * wanted))
                .collect();

            let next = (step + 1 < n).then(|| self.edges[(start + step + 1) % n].item);
            for (&ingredient, &amount) in &demand {
                if Some(ingredient) == next {
                    continue;
                }
                *result.entry(ingredient).or_insert(0.0) += amount;
            }
        }
        Ok(result)
    }
}

/// Deduplicated set of every loop detected so far.
#[derive(Debug, Clone, Default)]
pub struct CycleRegistry {
    loops: BTreeMap<LoopId, RecipeLoop>,
    by_edges: HashMap<Vec<LoopEdge>, LoopId>,
    next_id: u32,
}

impl CycleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    pub fn get(&self, id: LoopId) -> Option<&RecipeLoop> {
        self.loops.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecipeLoop> {
        self.loops.values()
    }

    /// Rotate `edges` so the edge with the smallest (item name, recipe name)
    /// comes first. Two detections of the same loop from different entry
    /// points produce the same sequence.
    pub fn canonicalize(mut edges: Vec<LoopEdge>, registry: &Registry) -> Vec<LoopEdge> {
        let key = |e: &LoopEdge| {
            (
                registry.item_name(e.item).unwrap_or_default().to_string(),
                registry.recipe_name(e.recipe).unwrap_or_default().to_string(),
            )
        };
        if let Some(first) = edges
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| key(e))
            .map(|(i, _)| i)
        {
            edges.rotate_left(first);
        }
        edges
    }

    /// Look up the loop formed by `edges`, inserting it if unseen.
    ///
    /// Returns the loop id and whether it was newly created. New loops are
    /// registered on every member item.
    pub fn register(&mut self, edges: Vec<LoopEdge>, registry: &mut Registry) -> (LoopId, bool) {
        let edges = Self::canonicalize(edges, registry);
        if let Some(&id) = self.by_edges.get(&edges) {
            return (id, false);
        }
        let id = LoopId(self.next_id);
        self.next_id += 1;

        for edge in &edges {
            if let Some(item) = registry.item_mut(edge.item) {
                item.loops.insert(id);
            }
        }
        debug!(
            loop_id = id.0,
            len = edges.len(),
            start = edges
                .first()
                .and_then(|e| registry.item_name(e.item))
                .unwrap_or_default(),
            "registered recipe loop"
        );

        self.by_edges.insert(edges.clone(), id);
        self.loops.insert(
            id,
            RecipeLoop {
                id,
                edges,
                entry: None,
                blocked: None,
            },
        );
        if self.loops.len() % 100 == 0 {
            info!(loops = self.loops.len(), "recipe loops detected");
        }
        (id, true)
    }

    /// Enter loop `id` through `item`.
    ///
    /// Returns `Ok(false)` if the loop is already entered. On a real
    /// transition every member item records its own edge recipe as entered,
    /// and the item preceding `item` gets its edge recipe blocked.
    pub fn enter(
        &mut self,
        id: LoopId,
        item: ItemId,
        registry: &mut Registry,
    ) -> Result<bool, LoopError> {
        let lp = self.loops.get_mut(&id).ok_or(LoopError::NotFound(id))?;
        if lp.entry.is_some() {
            return Ok(false);
        }
        let pos = lp
            .position(item)
            .ok_or(LoopError::NotAMember { loop_id: id, item })?;
        let n = lp.edges.len();
        let preceding = lp.edges[(pos + n - 1) % n];
        lp.entry = Some(item);
        lp.blocked = Some(preceding.recipe);

        for edge in &lp.edges {
            if let Some(member) = registry.item_mut(edge.item) {
                member.entered_edges.push((id, edge.recipe));
            }
        }
        if let Some(member) = registry.item_mut(preceding.item) {
            member.blocked.push((id, preceding.recipe));
        }
        Ok(true)
    }

    /// Leave loop `id`. Only the item that entered it can leave it; any other
    /// member gets `Ok(false)`.
    pub fn exit(
        &mut self,
        id: LoopId,
        item: ItemId,
        registry: &mut Registry,
    ) -> Result<bool, LoopError> {
        let lp = self.loops.get_mut(&id).ok_or(LoopError::NotFound(id))?;
        let Some(entry) = lp.entry else {
            return Err(LoopError::ExitWithoutEntry(id));
        };
        if entry != item {
            return Ok(false);
        }
        lp.entry = None;
        lp.blocked = None;
        for edge in &lp.edges {
            Self::clear_member(registry, edge.item, id);
        }
        Ok(true)
    }

    /// Force every loop out of its entered state.
    pub fn reset_entries(&mut self, registry: &mut Registry) {
        for lp in self.loops.values_mut() {
            if lp.entry.take().is_some() {
                lp.blocked = None;
                for edge in &lp.edges {
                    Self::clear_member(registry, edge.item, lp.id);
                }
            }
        }
    }

    /// Drop every loop running through `recipe`. Returns the dropped ids.
    pub fn dissolve_recipe(&mut self, recipe: RecipeId, registry: &mut Registry) -> Vec<LoopId> {
        let doomed: Vec<LoopId> = self
            .loops
            .values()
            .filter(|lp| lp.contains_recipe(recipe))
            .map(|lp| lp.id)
            .collect();
        for id in &doomed {
            if let Some(lp) = self.loops.remove(id) {
                for edge in &lp.edges {
                    Self::clear_member(registry, edge.item, *id);
                    if let Some(member) = registry.item_mut(edge.item) {
                        member.loops.remove(id);
                    }
                }
                self.by_edges.remove(&lp.edges);
                debug!(loop_id = id.0, "dissolved recipe loop");
            }
        }
        doomed
    }

    fn clear_member(registry: &mut Registry, item: ItemId, id: LoopId) {
        if let Some(member) = registry.item_mut(item) {
            member.entered_edges.retain(|(l, _)| *l != id);
            member.blocked.retain(|(l, _)| *l != id);
        }
    }
}
