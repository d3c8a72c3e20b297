//! Property-based tests for the cost graph core.
//!
//! Generates rings of recipes, layered chains and raw base-cost values,
//! then checks loop canonicalization, cost arithmetic and invalidation.

use costgraph_core::CostGraph;
use costgraph_core::cost::BaseCost;
use costgraph_core::cycle::{CycleRegistry, LoopEdge};
use costgraph_core::id::*;
use costgraph_core::recipe::RecipeDef;
use costgraph_core::test_utils::*;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

/// A loop of `n` items where `ring-i` is made from `ring-(i-1)`. Returns the
/// edges in registration order.
fn ring(n: usize) -> (CostGraph, Vec<LoopEdge>) {
    let mut graph = CostGraph::default();
    let items: Vec<ItemId> = (0..n)
        .map(|i| graph.register_item(&format!("ring-{i}"), false, None).unwrap())
        .collect();
    let edges = (0..n)
        .map(|i| {
            let item = items[i];
            let previous = items[(i + n - 1) % n];
            let recipe = graph
                .register_recipe(
                    RecipeDef::new(&format!("make-ring-{i}"), "crafting")
                        .with_ingredient(previous, 1.0)
                        .with_product(item, 1.0),
                )
                .unwrap();
            LoopEdge { item, recipe }
        })
        .collect();
    (graph, edges)
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every rotation of a loop canonicalizes to the same edge sequence.
    #[test]
    fn canonical_form_ignores_entry_point(n in 2..8usize, shift in 0..8usize) {
        let (graph, edges) = ring(n);
        let mut rotated = edges.clone();
        rotated.rotate_left(shift % n);

        let a = CycleRegistry::canonicalize(edges, graph.registry());
        let b = CycleRegistry::canonicalize(rotated, graph.registry());
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(graph.registry().item_name(a[0].item), Some("ring-0"));
    }

    /// Evaluating any item of a pure ring terminates and registers exactly
    /// one loop.
    #[test]
    fn pure_ring_registers_one_loop(n in 1..8usize, start in 0..8usize) {
        let (mut graph, edges) = ring(n);
        let item = edges[start % n].item;
        let cost = graph.evaluate(item).unwrap();
        prop_assert!(cost.is_self_decomposition(item));
        prop_assert_eq!(graph.cycles().len(), 1);
        prop_assert_eq!(graph.cycles().iter().next().unwrap().len(), n);
    }

    /// Base costs accept exactly the positive numbers and `+inf`.
    #[test]
    fn base_cost_accepts_only_positive(value in any::<f64>()) {
        let valid = value == f64::INFINITY || (value.is_finite() && value > 0.0);
        prop_assert_eq!(BaseCost::try_from(value).is_ok(), valid);
    }

    /// Part `n` of the layered chain needs `2^(n+1)` iron ore and
    /// `2^(n+1) - 1` copper ore.
    #[test]
    fn layered_costs_double_per_level(depth in 1..12usize) {
        let mut graph = layered_graph(depth);
        let top = graph.item_id(&format!("part-{:04}", depth - 1)).unwrap();
        let iron = graph.item_id("iron-ore").unwrap();
        let copper = graph.item_id("copper-ore").unwrap();

        let cost = graph.evaluate(top).unwrap();
        let expected = (1u64 << depth) as f64;
        prop_assert_eq!(cost.raw_ingredients[&iron], expected);
        prop_assert_eq!(cost.raw_ingredients[&copper], expected - 1.0);
    }

    /// Adding a cheaper recipe and retracting it again restores the
    /// original result.
    #[test]
    fn retracting_a_shortcut_restores_cost(depth in 2..10usize, level in 0..10usize) {
        let mut graph = layered_graph(depth);
        let top = graph.item_id(&format!("part-{:04}", depth - 1)).unwrap();
        let part = graph.item_id(&format!("part-{:04}", level % depth)).unwrap();
        let copper = graph.item_id("copper-ore").unwrap();
        let before = graph.evaluate(top).unwrap();

        let shortcut = add_recipe(&mut graph, "a-shortcut", "crafting", &[(copper, 0.5)], &[(part, 1.0)]);
        prop_assert_ne!(graph.evaluate(top).unwrap(), before.clone());

        graph.remove_recipe(shortcut).unwrap();
        prop_assert_eq!(graph.evaluate(top).unwrap(), before);
    }
}
