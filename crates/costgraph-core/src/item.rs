use crate::id::{ItemId, LoopId, RecipeId, TechId};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Evaluation result
// ---------------------------------------------------------------------------

/// The evaluated cost of one unit of an item.
///
/// `raw_ingredients` is the decomposition into root items by quantity (not by
/// cost); the score of a decomposition is computed from the base-cost table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemCost {
    /// Root items needed to produce one unit, by quantity.
    pub raw_ingredients: BTreeMap<ItemId, f64>,
    /// The recipe chosen as cheapest. `None` for root items and fallbacks.
    pub best_recipe: Option<RecipeId>,
    /// Technologies unlocking the recipes of the chosen decomposition.
    pub technologies: BTreeSet<TechId>,
    /// Production categories the chosen decomposition passes through.
    pub categories: BTreeSet<String>,
}

impl ItemCost {
    /// The decomposition of an item into itself: `{item: 1}`.
    pub fn terminal(item: ItemId) -> Self {
        Self {
            raw_ingredients: BTreeMap::from([(item, 1.0)]),
            ..Self::default()
        }
    }

    /// An empty decomposition signals "no usable recipe in this context".
    pub fn is_empty(&self) -> bool {
        self.raw_ingredients.is_empty()
    }

    /// Whether the decomposition is just the item itself.
    pub fn is_self_decomposition(&self, item: ItemId) -> bool {
        self.raw_ingredients.len() == 1 && self.raw_ingredients.contains_key(&item)
    }
}

/// A cached evaluation, tagged with the item version it was computed at.
#[derive(Debug, Clone)]
pub(crate) struct CachedCost {
    pub(crate) version: u64,
    pub(crate) cost: ItemCost,
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// An item or fluid in the production graph.
///
/// Items are owned by the [`Registry`](crate::registry::Registry) for the
/// lifetime of the graph. Recipes and loops refer to them by [`ItemId`].
#[derive(Debug, Clone)]
pub struct Item {
    pub(crate) name: String,
    pub(crate) is_fluid: bool,
    pub(crate) stack_size: Option<u32>,
    /// Set when a root-category recipe produces this item.
    pub(crate) root_recipe: Option<RecipeId>,
    pub(crate) producers: BTreeSet<RecipeId>,
    pub(crate) consumers: BTreeSet<RecipeId>,
    pub(crate) loops: BTreeSet<LoopId>,
    /// This item's edge recipe in every loop that is currently entered.
    pub(crate) entered_edges: Vec<(LoopId, RecipeId)>,
    /// Recipes of this item that would close a currently entered loop.
    pub(crate) blocked: Vec<(LoopId, RecipeId)>,
    /// Bumped whenever the item's recipe set (or anything upstream) changes.
    pub(crate) version: u64,
    pub(crate) cache: Option<CachedCost>,
}

impl Item {
    pub(crate) fn new(name: &str, is_fluid: bool, stack_size: Option<u32>) -> Self {
        Self {
            name: name.to_string(),
            is_fluid,
            stack_size,
            root_recipe: None,
            producers: BTreeSet::new(),
            consumers: BTreeSet::new(),
            loops: BTreeSet::new(),
            entered_edges: Vec::new(),
            blocked: Vec::new(),
            version: 0,
            cache: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_fluid(&self) -> bool {
        self.is_fluid
    }

    pub fn stack_size(&self) -> Option<u32> {
        self.stack_size
    }

    /// Root items have an axiomatic cost: either nothing produces them, or a
    /// root-category recipe (mining, pumping) is bound as their sole recipe.
    pub fn is_root(&self) -> bool {
        self.root_recipe.is_some() || self.producers.is_empty()
    }

    /// The root-category recipe bound to this item, if any.
    pub fn root_recipe(&self) -> Option<RecipeId> {
        self.root_recipe
    }

    pub fn has_producers(&self) -> bool {
        !self.producers.is_empty()
    }

    pub fn producers(&self) -> impl Iterator<Item = RecipeId> + '_ {
        self.producers.iter().copied()
    }

    pub fn consumers(&self) -> impl Iterator<Item = RecipeId> + '_ {
        self.consumers.iter().copied()
    }

    /// Loops this item participates in.
    pub fn loops(&self) -> impl Iterator<Item = LoopId> + '_ {
        self.loops.iter().copied()
    }

    /// Returns `true` while any loop containing this item is entered.
    pub fn is_loop_entered(&self) -> bool {
        !self.entered_edges.is_empty()
    }

    /// Returns `true` if `recipe` would re-enter a loop that is active.
    pub fn is_blocked(&self, recipe: RecipeId) -> bool {
        self.blocked.iter().any(|(_, r)| *r == recipe)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// The cached evaluation, if it is still valid.
    ///
    /// A cache entry is stale once the version moved on. It is also refused
    /// while the item sits in an entered loop and the cached choice is the
    /// item's own edge in that loop, since that cost was derived through the
    /// loop entry that is being evaluated right now.
    pub fn cached_cost(&self) -> Option<&ItemCost> {
        let cached = self.cache.as_ref()?;
        if cached.version != self.version {
            return None;
        }
        let suspect = self
            .entered_edges
            .iter()
            .any(|(_, recipe)| cached.cost.best_recipe == Some(*recipe));
        (!suspect).then_some(&cached.cost)
    }

    pub(crate) fn store(&mut self, cost: ItemCost) {
        self.cache = Some(CachedCost {
            version: self.version,
            cost,
        });
    }

    pub(crate) fn invalidate(&mut self) {
        self.version += 1;
        self.cache = None;
    }
}
