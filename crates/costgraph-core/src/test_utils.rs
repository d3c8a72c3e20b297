//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::cost::BaseCostTable;
use crate::graph::CostGraph;
use crate::id::*;
use crate::recipe::RecipeDef;
use crate::unlock::{Machine, MachineTable, UnlockIndex};

// ===========================================================================
// Builders
// ===========================================================================

/// Register a recipe from slices. Panics on invalid input.
pub fn add_recipe(
    graph: &mut CostGraph,
    name: &str,
    category: &str,
    ingredients: &[(ItemId, f64)],
    products: &[(ItemId, f64)],
) -> RecipeId {
    let mut def = RecipeDef::new(name, category);
    for &(item, quantity) in ingredients {
        def = def.with_ingredient(item, quantity);
    }
    for &(item, quantity) in products {
        def = def.with_product(item, quantity);
    }
    graph.register_recipe(def).expect("fixture recipe should register")
}

pub fn add_items<const N: usize>(graph: &mut CostGraph, names: [&str; N]) -> [ItemId; N] {
    names.map(|name| {
        graph
            .register_item(name, false, None)
            .expect("fixture item should register")
    })
}

// ===========================================================================
// Fixtures
// ===========================================================================

/// Root items `x` (cost 1) and `y` (cost 2), and `r: 2x + 1y -> 1z`.
pub fn cost_arithmetic_graph() -> (CostGraph, [ItemId; 3]) {
    let mut graph = CostGraph::default();
    let [x, y, z] = add_items(&mut graph, ["x", "y", "z"]);
    graph.set_base_costs(
        BaseCostTable::from_values([("x", 1.0), ("y", 2.0)]).expect("fixture base costs should be valid"),
    );
    add_recipe(&mut graph, "r", "crafting", &[(x, 2.0), (y, 1.0)], &[(z, 1.0)]);
    (graph, [x, y, z])
}

/// `a <- r1 (b -> a)` and `b <- r2 (a -> b)`, nothing else.
pub fn two_cycle_graph() -> (CostGraph, [ItemId; 2], [RecipeId; 2]) {
    let mut graph = CostGraph::default();
    let [a, b] = add_items(&mut graph, ["a", "b"]);
    let r1 = add_recipe(&mut graph, "r1", "crafting", &[(b, 1.0)], &[(a, 1.0)]);
    let r2 = add_recipe(&mut graph, "r2", "crafting", &[(a, 1.0)], &[(b, 1.0)]);
    (graph, [a, b], [r1, r2])
}

pub struct TechChain {
    pub circuit: ItemId,
    pub assembler: ItemId,
    pub furnace: ItemId,
    pub automation: TechId,
    pub electronics: TechId,
}

/// `circuit` is made in `advanced-crafting` (an assembling machine) and is
/// unlocked by `electronics`; the assembling machine itself is hand-crafted
/// and unlocked by `automation`.
pub fn tech_chain_graph() -> (CostGraph, TechChain) {
    let mut graph = CostGraph::default();
    let [iron, copper, circuit, assembler, stone, furnace] = add_items(
        &mut graph,
        [
            "iron-plate",
            "copper-plate",
            "electronic-circuit",
            "assembling-machine",
            "stone",
            "stone-furnace",
        ],
    );
    graph.set_base_costs(
        BaseCostTable::from_values([("iron-plate", 1.0), ("copper-plate", 1.0), ("stone", 1.0)])
            .expect("fixture base costs should be valid"),
    );
    add_recipe(
        &mut graph,
        "electronic-circuit",
        "advanced-crafting",
        &[(iron, 1.0), (copper, 1.5)],
        &[(circuit, 1.0)],
    );
    add_recipe(
        &mut graph,
        "assembling-machine",
        "crafting",
        &[(iron, 9.0)],
        &[(assembler, 1.0)],
    );
    add_recipe(&mut graph, "stone-furnace", "crafting", &[(stone, 5.0)], &[(furnace, 1.0)]);

    let automation = TechId(131_072);
    let electronics = TechId(131_073);
    let index: UnlockIndex = [
        ("assembling-machine", automation),
        ("electronic-circuit", electronics),
    ]
    .into_iter()
    .collect();
    graph.set_unlock_index(index);

    let mut machines = MachineTable::new();
    machines.add_machine(Machine::new("character", None).with_category("crafting"));
    machines.add_machine(
        Machine::new("assembling-machine", Some(assembler)).with_category("advanced-crafting"),
    );
    machines.assign("crafting", "character");
    machines.assign("advanced-crafting", "assembling-machine");
    graph.set_machines(machines);

    (
        graph,
        TechChain {
            circuit,
            assembler,
            furnace,
            automation,
            electronics,
        },
    )
}

/// A chain of `depth` intermediate products over two ores, each step
/// offering a cheap and an expensive recipe.
pub fn layered_graph(depth: usize) -> CostGraph {
    let mut graph = CostGraph::default();
    let [iron, copper] = add_items(&mut graph, ["iron-ore", "copper-ore"]);
    graph.set_base_costs(
        BaseCostTable::from_values([("iron-ore", 1.0), ("copper-ore", 1.5)])
            .expect("fixture base costs should be valid"),
    );
    let mut previous = iron;
    for level in 0..depth {
        let name = format!("part-{level:04}");
        let [part] = add_items(&mut graph, [name.as_str()]);
        add_recipe(
            &mut graph,
            &format!("{name}-cheap"),
            "crafting",
            &[(previous, 2.0), (copper, 1.0)],
            &[(part, 1.0)],
        );
        add_recipe(
            &mut graph,
            &format!("{name}-dear"),
            "crafting",
            &[(previous, 3.0), (iron, 4.0)],
            &[(part, 1.0)],
        );
        previous = part;
    }
    graph
}
