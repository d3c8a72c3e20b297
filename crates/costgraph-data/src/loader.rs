//! File discovery, format detection and deserialization for data sources.
//!
//! Every source is looked up by base name (`items`, `recipes`, ...) and may
//! be written in RON, TOML or JSON. Exactly one format per base name is
//! accepted.

use costgraph_core::{CostGraph, EvalError};
use costgraph_core::id::{ItemId, RecipeId};
use costgraph_core::registry::RegistryError;
use costgraph_tech_tree::TechTreeError;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    #[error("precalc encoding failed: {detail}")]
    Encode { detail: String },

    #[error("precalc decoding failed: {detail}")]
    Decode { detail: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Tech(#[from] TechTreeError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan `dir` for `{base_name}.ron`, `{base_name}.toml` and
/// `{base_name}.json`.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its format.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML has no top-level arrays, so there the list is
/// read from `toml_key` of the top-level table.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

/// A deserialized source together with the file it came from.
#[derive(Debug, Clone)]
pub struct Source<T> {
    pub path: PathBuf,
    pub data: T,
}

/// Find and deserialize `base_name` in `dir`, if present.
pub fn load_optional<T: DeserializeOwned>(
    dir: &Path,
    base_name: &str,
) -> Result<Option<Source<T>>, DataLoadError> {
    let Some(path) = find_data_file(dir, base_name)? else {
        return Ok(None);
    };
    let data = deserialize_file(&path)?;
    Ok(Some(Source { path, data }))
}

/// Find and deserialize `base_name` in `dir`; a missing file is an error.
pub fn load_required<T: DeserializeOwned>(
    dir: &Path,
    base_name: &str,
) -> Result<Source<T>, DataLoadError> {
    let path = require_data_file(dir, base_name)?;
    let data = deserialize_file(&path)?;
    Ok(Source { path, data })
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up an item or fluid by name.
pub fn resolve_item(graph: &CostGraph, name: &str, file: &Path) -> Result<ItemId, DataLoadError> {
    graph.item_id(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind: "item",
    })
}

pub fn resolve_recipe(
    graph: &CostGraph,
    name: &str,
    file: &Path,
) -> Result<RecipeId, DataLoadError> {
    graph.recipe_id(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind: "recipe",
    })
}

/// Items and fluids share one namespace.
pub fn check_duplicate(graph: &CostGraph, name: &str, file: &Path) -> Result<(), DataLoadError> {
    if graph.item_id(name).is_some() {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
