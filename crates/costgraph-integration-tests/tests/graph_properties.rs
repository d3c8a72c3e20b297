//! Cross-crate checks of the evaluation guarantees: cost arithmetic, cache
//! behaviour, invalidation, loop handling and technology aggregation with a
//! technology table built by `costgraph-tech-tree`.

use std::collections::{BTreeMap, BTreeSet};

use costgraph_core::CostGraph;
use costgraph_core::cost::BaseCostTable;
use costgraph_core::id::*;
use costgraph_core::recipe::RecipeDef;
use costgraph_core::test_utils::*;
use costgraph_core::unlock::{Machine, MachineTable};
use costgraph_tech_tree::{TechTable, TechnologyDef};

fn unlocks(recipes: &[&str]) -> TechnologyDef {
    TechnologyDef {
        unlocks: recipes.iter().map(|r| r.to_string()).collect(),
        modifiers: Vec::new(),
    }
}

// ===========================================================================
// Cost arithmetic and caching
// ===========================================================================

#[test]
fn cost_arithmetic() {
    let (mut graph, [x, y, z]) = cost_arithmetic_graph();

    let cost = graph.evaluate(z).unwrap();
    assert_eq!(cost.raw_ingredients, BTreeMap::from([(x, 2.0), (y, 1.0)]));
    assert_eq!(cost.best_recipe, graph.recipe_id("r"));
    assert_eq!(graph.unit_score(z).unwrap(), 4.0);
}

#[test]
fn second_evaluation_is_served_from_cache() {
    let mut graph = layered_graph(20);
    let top = graph.item_id("part-0019").unwrap();

    let first = graph.evaluate(top).unwrap();
    assert!(graph.stats().recipe_evaluations > 0);

    graph.reset_stats();
    let second = graph.evaluate(top).unwrap();
    assert_eq!(first, second);
    assert_eq!(graph.stats().item_evaluations, 0);
    assert_eq!(graph.stats().recipe_evaluations, 0);
}

#[test]
fn layered_graph_prefers_cheap_recipes() {
    let mut graph = layered_graph(4);
    let top = graph.item_id("part-0003").unwrap();
    let cost = graph.evaluate(top).unwrap();

    assert_eq!(cost.best_recipe, graph.recipe_id("part-0003-cheap"));
    let iron = graph.item_id("iron-ore").unwrap();
    let copper = graph.item_id("copper-ore").unwrap();
    // part-n = 2 part-(n-1) + 1 copper, part-(-1) = iron ore.
    assert_eq!(cost.raw_ingredients[&iron], 16.0);
    assert_eq!(cost.raw_ingredients[&copper], 15.0);
}

#[test]
fn determinism_across_identical_graphs() {
    let mut a = layered_graph(30);
    let mut b = layered_graph(30);
    assert_eq!(a.precompute().unwrap(), b.precompute().unwrap());

    let (mut a, _, _) = two_cycle_graph();
    let (mut b, _, _) = two_cycle_graph();
    assert_eq!(a.precompute().unwrap(), b.precompute().unwrap());
}

// ===========================================================================
// Invalidation
// ===========================================================================

#[test]
fn cheaper_recipe_changes_best_recipe() {
    let (mut graph, [x, _, z]) = cost_arithmetic_graph();
    graph.evaluate(z).unwrap();

    let cheap = add_recipe(&mut graph, "s", "crafting", &[(x, 1.0)], &[(z, 1.0)]);
    let cost = graph.evaluate(z).unwrap();
    assert_eq!(cost.best_recipe, Some(cheap));
    assert_eq!(cost.raw_ingredients, BTreeMap::from([(x, 1.0)]));
}

#[test]
fn removing_only_recipe_falls_back_to_root() {
    let (mut graph, [_, _, z]) = cost_arithmetic_graph();
    let recipe = graph.recipe_id("r").unwrap();
    graph.evaluate(z).unwrap();

    graph.remove_recipe(recipe).unwrap();
    let cost = graph.evaluate(z).unwrap();
    assert_eq!(cost.best_recipe, None);
    assert!(cost.is_self_decomposition(z));
}

#[test]
fn invalidation_reaches_consumers_downstream() {
    let mut graph = layered_graph(3);
    let top = graph.item_id("part-0002").unwrap();
    let bottom = graph.item_id("part-0000").unwrap();
    let copper = graph.item_id("copper-ore").unwrap();
    graph.evaluate(top).unwrap();

    // A free way to make the bottom part only pays off if the top is
    // re-evaluated.
    add_recipe(&mut graph, "part-0000-free", "crafting", &[(copper, 0.5)], &[(bottom, 1.0)]);
    let cost = graph.evaluate(top).unwrap();
    let iron = graph.item_id("iron-ore").unwrap();
    assert!(!cost.raw_ingredients.contains_key(&iron));
}

// ===========================================================================
// Loops
// ===========================================================================

#[test]
fn two_cycle_terminates_with_one_loop() {
    let (mut graph, [a, b], [r1, r2]) = two_cycle_graph();

    let cost_a = graph.evaluate(a).unwrap();
    let cost_b = graph.evaluate(b).unwrap();
    assert!(!cost_a.is_empty());
    assert!(!cost_b.is_empty());

    assert_eq!(graph.cycles().len(), 1);
    let lp = graph.cycles().iter().next().unwrap();
    assert_eq!(lp.len(), 2);
    assert!(lp.contains_recipe(r1) && lp.contains_recipe(r2));
    assert!(!lp.is_entered(), "loop left after evaluation");
}

#[test]
fn loop_with_exit_to_root_picks_the_exit() {
    let (mut graph, [a, b], _) = two_cycle_graph();
    let [ore] = add_items(&mut graph, ["ore"]);
    graph.set_base_costs(BaseCostTable::from_values([("ore", 1.0)]).unwrap());
    let smelt = add_recipe(&mut graph, "r0-smelt", "crafting", &[(ore, 2.0)], &[(a, 1.0)]);

    let cost = graph.evaluate(b).unwrap();
    assert_eq!(cost.raw_ingredients, BTreeMap::from([(ore, 2.0)]));
    assert_eq!(graph.evaluate(a).unwrap().best_recipe, Some(smelt));
}

#[test]
fn retracting_a_loop_recipe_dissolves_the_loop() {
    let (mut graph, [a, _], [r1, _]) = two_cycle_graph();
    graph.evaluate(a).unwrap();
    assert_eq!(graph.cycles().len(), 1);

    graph.remove_recipe(r1).unwrap();
    assert!(graph.cycles().is_empty());
    assert!(graph.evaluate(a).unwrap().is_self_decomposition(a));
}

// ===========================================================================
// Root short-circuit
// ===========================================================================

#[test]
fn root_category_recipe_wins_over_cheaper_alternative() {
    let mut graph = CostGraph::default();
    let [ore, dust] = add_items(&mut graph, ["iron-ore", "dust"]);
    graph.set_base_costs(BaseCostTable::from_values([("dust", 0.001)]).unwrap());
    let mining = add_recipe(&mut graph, "mine-iron", "basic-solid", &[], &[(ore, 1.0)]);
    add_recipe(&mut graph, "sift-iron", "crafting", &[(dust, 1.0)], &[(ore, 1.0)]);

    let entry = graph.registry().item(ore).unwrap();
    assert!(entry.is_root());
    assert_eq!(entry.root_recipe(), Some(mining));
    assert_eq!(graph.evaluate(ore).unwrap().best_recipe, Some(mining));
}

// ===========================================================================
// Technology aggregation with a technology table
// ===========================================================================

#[test]
fn technologies_include_recipe_and_facility_unlocks() {
    let mut graph = CostGraph::default();
    let [plate, gear, assembler] = add_items(&mut graph, ["iron-plate", "gear", "assembler"]);
    graph.set_base_costs(BaseCostTable::from_values([("iron-plate", 1.0)]).unwrap());
    add_recipe(&mut graph, "gear", "machining", &[(plate, 2.0)], &[(gear, 1.0)]);
    add_recipe(&mut graph, "assembler", "crafting", &[(plate, 9.0)], &[(assembler, 1.0)]);

    let mut techs = TechTable::new();
    techs
        .register_all([
            ("automation".to_string(), unlocks(&["assembler"])),
            ("gears".to_string(), unlocks(&["gear"])),
        ])
        .unwrap();
    graph.set_unlock_index(techs.unlock_index());

    let mut machines = MachineTable::new();
    machines.add_machine(Machine::new("character", None).with_category("crafting"));
    machines.add_machine(Machine::new("assembler", Some(assembler)).with_category("machining"));
    graph.set_machines(machines);
    graph.fill_cheapest_machines().unwrap();

    let t1 = techs.id_of("gears").unwrap();
    let t2 = techs.id_of("automation").unwrap();
    let all = graph.all_unlocking_technologies(gear).unwrap();
    assert!(all.is_superset(&BTreeSet::from([t1, t2])));
    assert_eq!(graph.evaluate(gear).unwrap().technologies, BTreeSet::from([t1]));
    assert_eq!(
        graph.machine_unlocking_technologies("machining").unwrap(),
        BTreeSet::from([t2])
    );
}

#[test]
fn tech_chain_fixture_aggregates_both_technologies() {
    let (mut graph, chain) = tech_chain_graph();
    let all = graph.all_unlocking_technologies(chain.circuit).unwrap();
    assert_eq!(all, BTreeSet::from([chain.automation, chain.electronics]));

    // The furnace is hand-crafted and needs nothing.
    assert!(graph.all_unlocking_technologies(chain.furnace).unwrap().is_empty());
    assert_eq!(
        graph.all_unlocking_technologies(chain.assembler).unwrap(),
        BTreeSet::from([chain.automation])
    );
}

#[test]
fn total_energy_follows_best_recipes() {
    let mut graph = CostGraph::default();
    let [ore, plate, gear] = add_items(&mut graph, ["ore", "plate", "gear"]);
    graph.set_base_costs(BaseCostTable::from_values([("ore", 1.0)]).unwrap());
    graph
        .register_recipe(
            RecipeDef::new("plate", "smelting")
                .with_ingredient(ore, 1.0)
                .with_product(plate, 1.0)
                .with_energy(3.0),
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

    assert_eq!(graph.total_energy(gear_recipe).unwrap(), 0.5 + 2.0 * 3.0);
}

#[test]
fn tech_ids_are_stable_across_tables() {
    let defs = || {
        [
            ("b".to_string(), unlocks(&["x"])),
            ("a".to_string(), unlocks(&["y"])),
        ]
    };
    let mut first = TechTable::new();
    first.register_all(defs()).unwrap();
    let mut second = TechTable::new();
    second.register_all(defs()).unwrap();

    assert_eq!(first.id_of("a").unwrap(), TechId(costgraph_tech_tree::TECH_ID_BASE));
    assert_eq!(first.id_of("b").unwrap(), second.id_of("b").unwrap());
}
