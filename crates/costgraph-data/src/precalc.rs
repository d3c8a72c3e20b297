//! Precomputed evaluation results.
//!
//! A [`PrecalcTable`] records, per item name, the result of evaluating that
//! item on a fully loaded graph. Seeding a fresh graph with it makes later
//! evaluation return the same results without descending the graph.
//!
//! Two encodings exist: pretty JSON with sorted keys (`precalc.json`, also
//! accepted as RON or TOML) and a bitcode snapshot (`precalc.bin`) with a
//! magic number and version header.

use costgraph_core::CostGraph;
use costgraph_core::id::TechId;
use costgraph_core::item::ItemCost;
use costgraph_tech_tree::{TechTable, TechTreeError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

use crate::loader::{
    DataLoadError, Source, find_data_file, deserialize_file, resolve_item, resolve_recipe,
};

/// `CPC1` in ASCII.
pub const PRECALC_MAGIC: u32 = 0x4350_4331;
pub const PRECALC_VERSION: u32 = 1;

/// File name of the binary artifact inside a data directory.
pub const PRECALC_BINARY_FILE: &str = "precalc.bin";

/// The evaluation result of one item, by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecalcEntry {
    pub raw_ingredients: BTreeMap<String, f64>,
    pub best_recipe: Option<String>,
    /// Sorted technology names.
    pub technologies: Vec<String>,
    /// Sorted production categories.
    pub category: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrecalcTable {
    entries: BTreeMap<String, PrecalcEntry>,
}

impl PrecalcTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: impl Into<String>, entry: PrecalcEntry) {
        self.entries.insert(item.into(), entry);
    }

    pub fn get(&self, item: &str) -> Option<&PrecalcEntry> {
        self.entries.get(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PrecalcEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct PrecalcSnapshot {
    magic: u32,
    version: u32,
    table: PrecalcTable,
}

// ===========================================================================
// Export
// ===========================================================================

fn tech_name(techs: &TechTable, id: TechId) -> Result<String, DataLoadError> {
    techs
        .name_of(id)
        .map(str::to_string)
        .ok_or_else(|| TechTreeError::NotFound(id.0.to_string()).into())
}

/// Describe `cost` by names.
pub fn entry_for(
    graph: &CostGraph,
    techs: &TechTable,
    cost: &ItemCost,
) -> Result<PrecalcEntry, DataLoadError> {
    let registry = graph.registry();
    let mut raw_ingredients = BTreeMap::new();
    for (&item, &quantity) in &cost.raw_ingredients {
        let name = registry
            .item_name(item)
            .ok_or(costgraph_core::EvalError::UnknownItem(item))?;
        raw_ingredients.insert(name.to_string(), quantity);
    }
    let best_recipe = match cost.best_recipe {
        Some(recipe) => Some(
            registry
                .recipe_name(recipe)
                .ok_or(costgraph_core::EvalError::UnknownRecipe(recipe))?
                .to_string(),
        ),
        None => None,
    };
    let technologies: BTreeSet<String> = cost
        .technologies
        .iter()
        .map(|&id| tech_name(techs, id))
        .collect::<Result<_, _>>()?;

    Ok(PrecalcEntry {
        raw_ingredients,
        best_recipe,
        technologies: technologies.into_iter().collect(),
        category: cost.categories.iter().cloned().collect(),
    })
}

/// Evaluate every item in name order and record the results.
pub fn precompute(graph: &mut CostGraph, techs: &TechTable) -> Result<PrecalcTable, DataLoadError> {
    let results = graph.precompute()?;
    let mut table = PrecalcTable::new();
    for (item, cost) in &results {
        let entry = entry_for(graph, techs, cost)?;
        let name = graph
            .registry()
            .item_name(*item)
            .ok_or(costgraph_core::EvalError::UnknownItem(*item))?;
        table.insert(name, entry);
    }
    info!(items = table.len(), loops = graph.cycles().len(), "precompute finished");
    Ok(table)
}

// ===========================================================================
// Import
// ===========================================================================

/// Install every entry of `table` as the cached cost of its item. Returns
/// the number of items seeded. `file` is only used in error messages.
pub fn apply_precalc(
    graph: &mut CostGraph,
    techs: &TechTable,
    table: &PrecalcTable,
    file: &Path,
) -> Result<usize, DataLoadError> {
    for (name, entry) in table.iter() {
        let item = resolve_item(graph, name, file)?;
        let mut raw_ingredients = BTreeMap::new();
        for (ingredient, &quantity) in &entry.raw_ingredients {
            raw_ingredients.insert(resolve_item(graph, ingredient, file)?, quantity);
        }
        let best_recipe = entry
            .best_recipe
            .as_deref()
            .map(|recipe| resolve_recipe(graph, recipe, file))
            .transpose()?;
        let mut technologies = BTreeSet::new();
        for tech in &entry.technologies {
            let Some(found) = techs.get(tech) else {
                return Err(DataLoadError::UnresolvedRef {
                    file: file.to_path_buf(),
                    name: tech.clone(),
                    expected_kind: "technology",
                });
            };
            technologies.insert(found.id);
        }

        graph.seed_cache(
            item,
            ItemCost {
                raw_ingredients,
                best_recipe,
                technologies,
                categories: entry.category.iter().cloned().collect(),
            },
        )?;
    }
    Ok(table.len())
}

// ===========================================================================
// Encodings
// ===========================================================================

pub fn to_json(table: &PrecalcTable) -> Result<String, DataLoadError> {
    serde_json::to_string_pretty(table).map_err(|e| DataLoadError::Encode {
        detail: e.to_string(),
    })
}

pub fn from_json(content: &str, file: &Path) -> Result<PrecalcTable, DataLoadError> {
    serde_json::from_str(content).map_err(|e| DataLoadError::Parse {
        file: file.to_path_buf(),
        detail: e.to_string(),
    })
}

pub fn to_bitcode(table: &PrecalcTable) -> Result<Vec<u8>, DataLoadError> {
    let snapshot = PrecalcSnapshot {
        magic: PRECALC_MAGIC,
        version: PRECALC_VERSION,
        table: table.clone(),
    };
    bitcode::serialize(&snapshot).map_err(|e| DataLoadError::Encode {
        detail: e.to_string(),
    })
}

/// Decode a binary artifact, rejecting foreign data and other versions.
pub fn from_bitcode(data: &[u8]) -> Result<PrecalcTable, DataLoadError> {
    let snapshot: PrecalcSnapshot = bitcode::deserialize(data).map_err(|e| DataLoadError::Decode {
        detail: e.to_string(),
    })?;
    if snapshot.magic != PRECALC_MAGIC {
        return Err(DataLoadError::Decode {
            detail: format!("invalid magic number 0x{:08X}", snapshot.magic),
        });
    }
    if snapshot.version != PRECALC_VERSION {
        return Err(DataLoadError::Decode {
            detail: format!("unsupported precalc version {}", snapshot.version),
        });
    }
    Ok(snapshot.table)
}

/// Write `table` to `path`: bitcode for a `.bin` extension, JSON otherwise.
pub fn write_precalc(table: &PrecalcTable, path: &Path) -> Result<(), DataLoadError> {
    if path.extension().is_some_and(|ext| ext == "bin") {
        std::fs::write(path, to_bitcode(table)?)?;
    } else {
        std::fs::write(path, to_json(table)?)?;
    }
    Ok(())
}

/// Find the precalc artifact of a data directory, in either encoding.
pub fn read_precalc(dir: &Path) -> Result<Option<Source<PrecalcTable>>, DataLoadError> {
    let text = find_data_file(dir, "precalc")?;
    let binary = dir.join(PRECALC_BINARY_FILE);
    match (text, binary.exists()) {
        (Some(a), true) => Err(DataLoadError::ConflictingFormats { a, b: binary }),
        (Some(path), false) => {
            let data = deserialize_file(&path)?;
            Ok(Some(Source { path, data }))
        }
        (None, true) => {
            let data = from_bitcode(&std::fs::read(&binary)?)?;
            Ok(Some(Source { path: binary, data }))
        }
        (None, false) => Ok(None),
    }
}
