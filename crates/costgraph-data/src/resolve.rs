//! Resolution pipeline: reads every source of a data directory, resolves
//! names and builds a ready-to-evaluate [`CostGraph`].
//!
//! All files are read and parsed before the graph is touched. With the
//! `parallel` feature the reads run on the rayon pool.

use costgraph_core::CostGraph;
use costgraph_core::cost::BaseCostTable;
use costgraph_core::id::ItemId;
use costgraph_core::recipe::RecipeDef;
use costgraph_core::registry::Registry;
use costgraph_core::unlock::{Machine, MachineTable};
use costgraph_tech_tree::TechTable;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::CostConfig;
use crate::loader::{
    DataLoadError, Source, check_duplicate, deserialize_list, load_optional, load_required,
    require_data_file, resolve_item,
};
use crate::precalc::{PrecalcTable, apply_precalc, read_precalc};
use crate::schema::*;

/// A loaded data directory.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub graph: CostGraph,
    pub techs: TechTable,
    pub config: CostConfig,
    /// Recipes present in the data but left out of the graph, by name.
    pub skipped_recipes: Vec<String>,
    /// Number of items seeded from a precalc artifact.
    pub precalc_seeded: usize,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Seed caches from `precalc.*` when present.
    pub use_precalc: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { use_precalc: true }
    }
}

/// Every source of a data directory, parsed but not yet resolved.
struct Sources {
    items: Source<ItemsData>,
    fluids: Source<Vec<String>>,
    recipes: Source<RecipesData>,
    resources: Option<Source<ResourcesData>>,
    techs: Source<TechsData>,
    machines: Source<MachinesData>,
    base_costs: Option<Source<BaseCostsData>>,
    categories: Option<Source<CategoriesData>>,
    precalc: Option<Source<PrecalcTable>>,
}

#[cfg(feature = "parallel")]
fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    rayon::join(a, b)
}

#[cfg(not(feature = "parallel"))]
fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA,
    B: FnOnce() -> RB,
{
    (a(), b())
}

fn load_fluids(dir: &Path) -> Result<Source<Vec<String>>, DataLoadError> {
    let path = require_data_file(dir, "fluids")?;
    let data = deserialize_list(&path, "fluids")?;
    Ok(Source { path, data })
}

fn read_sources(dir: &Path, options: &LoadOptions) -> Result<Sources, DataLoadError> {
    let ((items, fluids), (recipes, resources)) = join(
        || join(|| load_required::<ItemsData>(dir, "items"), || load_fluids(dir)),
        || {
            join(
                || load_required::<RecipesData>(dir, "recipes"),
                || load_optional::<ResourcesData>(dir, "resources"),
            )
        },
    );
    let ((techs, machines), (base_costs, (categories, precalc))) = join(
        || {
            join(
                || load_required::<TechsData>(dir, "techs"),
                || load_required::<MachinesData>(dir, "machines"),
            )
        },
        || {
            join(
                || load_optional::<BaseCostsData>(dir, "base_costs"),
                || {
                    join(
                        || load_optional::<CategoriesData>(dir, "categories"),
                        || {
                            if options.use_precalc {
                                read_precalc(dir)
                            } else {
                                Ok(None)
                            }
                        },
                    )
                },
            )
        },
    );

    Ok(Sources {
        items: items?,
        fluids: fluids?,
        recipes: recipes?,
        resources: resources?,
        techs: techs?,
        machines: machines?,
        base_costs: base_costs?,
        categories: categories?,
        precalc: precalc?,
    })
}

/// Load the data directory `dir` with default options.
pub fn load_cost_graph(dir: &Path) -> Result<LoadedData, DataLoadError> {
    load_cost_graph_with(dir, &LoadOptions::default())
}

pub fn load_cost_graph_with(dir: &Path, options: &LoadOptions) -> Result<LoadedData, DataLoadError> {
    let config = match load_optional::<CostConfig>(dir, "config")? {
        Some(source) => source.data,
        None => CostConfig::default(),
    };
    let sources = read_sources(dir, options)?;

    let mut graph = CostGraph::new(Registry::new(config.root_categories.iter().cloned()));
    register_items(&mut graph, &config, &sources)?;
    let (skipped_recipes, fluid_mining) = register_recipes(&mut graph, &config, &sources)?;

    let mut techs = TechTable::new().with_start_unlocked(config.start_unlocked_recipes.iter().cloned());
    techs.register_all(sources.techs.data.clone())?;
    let progressive = config.progressive_options(techs.atomic().map(|t| t.name.as_str()));
    techs.add_progressive(&progressive)?;

    let mut unlocks = techs.unlock_index();
    let fluid_miners = techs.with_modifier(&config.fluid_mining_modifier);
    for recipe in &fluid_mining {
        for &tech in &fluid_miners {
            unlocks.insert(recipe.as_str(), tech);
        }
    }
    graph.set_unlock_index(unlocks);

    let machines = build_machines(&graph, &config, &sources)?;
    graph.set_machines(machines);

    if let Some(source) = &sources.base_costs {
        graph.set_base_costs(base_cost_table(source)?);
    }

    let mut precalc_seeded = 0;
    if let Some(source) = &sources.precalc {
        precalc_seeded = apply_precalc(&mut graph, &techs, &source.data, &source.path)?;
    }

    graph.fill_cheapest_machines()?;

    info!(
        dir = %dir.display(),
        items = graph.registry().item_count(),
        recipes = graph.registry().recipe_count(),
        technologies = techs.len(),
        skipped = skipped_recipes.len(),
        precalc = precalc_seeded,
        "loaded cost graph"
    );

    Ok(LoadedData {
        graph,
        techs,
        config,
        skipped_recipes,
        precalc_seeded,
    })
}

// ===========================================================================
// Resolution steps
// ===========================================================================

fn register_items(
    graph: &mut CostGraph,
    config: &CostConfig,
    sources: &Sources,
) -> Result<(), DataLoadError> {
    let mut fluids = sources.fluids.data.clone();
    fluids.sort();
    for name in &fluids {
        if config.is_excluded(name) {
            continue;
        }
        check_duplicate(graph, name, &sources.fluids.path)?;
        graph.register_item(name, true, None)?;
    }

    for (name, &stack_size) in &sources.items.data {
        if config.is_excluded(name) {
            continue;
        }
        check_duplicate(graph, name, &sources.items.path)?;
        graph.register_item(name, false, Some(stack_size))?;
    }

    for name in &config.extra_items {
        if graph.item_id(name).is_none() {
            graph.register_item(name, false, None)?;
        }
    }
    Ok(())
}

/// Returns the skipped recipe names and the mining recipes that need a
/// fluid.
fn register_recipes(
    graph: &mut CostGraph,
    config: &CostConfig,
    sources: &Sources,
) -> Result<(Vec<String>, Vec<String>), DataLoadError> {
    let mut all: BTreeMap<String, (RecipeData, &Path)> = sources
        .recipes
        .data
        .iter()
        .map(|(name, data)| (name.clone(), (data.clone(), sources.recipes.path.as_path())))
        .collect();

    let mut fluid_mining = Vec::new();
    if let Some(resources) = &sources.resources {
        for (resource, data) in &resources.data {
            let name = ResourceData::recipe_name(resource);
            if all.contains_key(&name) {
                return Err(DataLoadError::DuplicateName {
                    file: resources.path.clone(),
                    name,
                });
            }
            if data.required_fluid.is_some() {
                fluid_mining.push(name.clone());
            }
            all.insert(name, (data.to_recipe(), resources.path.as_path()));
        }
    }

    let mut skipped = Vec::new();
    for (name, (data, file)) in &all {
        if let Some(reason) = config.skip_reason(name, data) {
            debug!(recipe = name.as_str(), ?reason, "skipping recipe");
            skipped.push(name.clone());
            continue;
        }
        let mut def = RecipeDef::new(name, &data.category).with_energy(data.energy);
        def.ingredients = resolve_amounts(graph, &data.ingredients, file)?;
        def.products = resolve_amounts(graph, &data.products, file)?;
        graph.register_recipe(def)?;
    }
    fluid_mining.retain(|name| !skipped.contains(name));
    Ok((skipped, fluid_mining))
}

fn resolve_amounts(
    graph: &CostGraph,
    amounts: &BTreeMap<String, f64>,
    file: &Path,
) -> Result<Vec<(ItemId, f64)>, DataLoadError> {
    amounts
        .iter()
        .map(|(name, &amount)| Ok((resolve_item(graph, name, file)?, amount)))
        .collect()
}

fn machine_item(
    graph: &CostGraph,
    config: &CostConfig,
    name: &str,
    file: &Path,
) -> Result<Option<ItemId>, DataLoadError> {
    if name == config.hand_crafting_machine {
        Ok(None)
    } else {
        resolve_item(graph, name, file).map(Some)
    }
}

/// Facilities from the machine source and the configuration, with the
/// explicit category table applied.
fn build_machines(
    graph: &CostGraph,
    config: &CostConfig,
    sources: &Sources,
) -> Result<MachineTable, DataLoadError> {
    let mut machines = MachineTable::new();
    let config_file = PathBuf::from("config");
    let declared = sources
        .machines
        .data
        .iter()
        .map(|(name, categories)| (name, categories, sources.machines.path.as_path()))
        .chain(
            config
                .machine_categories
                .iter()
                .map(|(name, categories)| (name, categories, config_file.as_path())),
        );

    for (name, categories, file) in declared {
        let item = machine_item(graph, config, name, file)?;
        let mut machine = Machine::new(name, item);
        machine.categories.extend(categories.iter().cloned());
        machines.add_machine(machine);
    }

    if let Some(source) = &sources.categories {
        for (category, machine) in &source.data {
            if !machines.assign(category, machine) {
                return Err(DataLoadError::UnresolvedRef {
                    file: source.path.clone(),
                    name: machine.clone(),
                    expected_kind: "machine",
                });
            }
        }
    }
    Ok(machines)
}

fn base_cost_table(source: &Source<BaseCostsData>) -> Result<BaseCostTable, DataLoadError> {
    let mut table = BaseCostTable::new();
    for (name, value) in &source.data {
        let cost = value.to_base_cost().map_err(|detail| DataLoadError::Parse {
            file: source.path.clone(),
            detail: format!("base cost of '{name}': {detail}"),
        })?;
        table.insert(name.as_str(), cost);
    }
    Ok(table)
}
