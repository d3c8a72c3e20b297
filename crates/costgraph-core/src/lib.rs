//! Costgraph Core -- recursive cost resolution over a production graph.
//!
//! Items are produced by recipes that consume other items. For every item
//! the engine finds the cheapest decomposition into root items, the
//! technologies that unlock the recipes along it, and the production
//! categories it passes through.
//!
//! # Evaluation
//!
//! Evaluation is a greedy depth-first descent:
//!
//! 1. **Root items** -- items nothing produces score from the base-cost
//!    table; items bound to a root-category recipe take that recipe.
//! 2. **Candidates** -- every other item tries each producer in name order
//!    and keeps the one with the lowest score per unit produced.
//! 3. **Loops** -- reaching an item already on the active path records a
//!    loop in the [`cycle::CycleRegistry`] and makes that candidate unusable
//!    for the current path. Results computed inside an entered loop are
//!    never cached.
//!
//! ```rust,ignore
//! let mut graph = CostGraph::default();
//! let ore = graph.register_item("iron-ore", false, Some(50))?;
//! let plate = graph.register_item("iron-plate", false, Some(100))?;
//! graph.register_recipe(
//!     RecipeDef::new("iron-plate", "smelting")
//!         .with_ingredient(ore, 1.0)
//!         .with_product(plate, 1.0),
//! )?;
//! let cost = graph.evaluate(plate)?;
//! ```
//!
//! # Key Types
//!
//! - [`graph::CostGraph`] -- Owns the registry, loops, base costs, unlock
//!   index and machine table; all evaluation entry points live here.
//! - [`registry::Registry`] -- Item and recipe arenas with producer/consumer
//!   links and downstream cache invalidation.
//! - [`item::ItemCost`] -- Evaluation result for one unit of an item.
//! - [`cycle::RecipeLoop`] -- A detected loop with its entry state.
//! - [`unlock::MachineTable`] -- Facility per production category.

pub mod cost;
pub mod cycle;
pub mod evaluator;
pub mod graph;
pub mod id;
pub mod item;
pub mod recipe;
pub mod registry;
pub mod unlock;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use graph::{CostGraph, EvalError, EvalStats};
