//! Technology table for the costgraph engine.
//!
//! Technologies unlock recipes. Atomic technologies come straight from the
//! data files; progressive technologies bundle a row of atomic ones
//! (`logistics-1`, `logistics-2`, ...) into a single unlock that is granted
//! one step at a time.
//!
//! # Ids
//!
//! Ids are assigned once, in registration order, starting at
//! [`TECH_ID_BASE`]. Atomic technologies are registered in name order, and
//! progressive ones after all atomic ones, also in name order, so the same
//! data always yields the same ids.
//!
//! # Unlock index
//!
//! [`TechTable::unlock_index`] turns the table into the recipe to technology
//! mapping consumed by the evaluator.

use costgraph_core::id::TechId;
use costgraph_core::unlock::UnlockIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// First technology id.
pub const TECH_ID_BASE: u32 = 1 << 17;

// ---------------------------------------------------------------------------
// Technology definition
// ---------------------------------------------------------------------------

/// What a technology unlocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unlocks {
    /// Recipe names, for atomic technologies.
    Recipes(BTreeSet<String>),
    /// Whether any component unlocks something, for progressive ones.
    Any(bool),
}

impl Unlocks {
    pub fn unlocks_anything(&self) -> bool {
        match self {
            Unlocks::Recipes(recipes) => !recipes.is_empty(),
            Unlocks::Any(any) => *any,
        }
    }

    pub fn recipes(&self) -> impl Iterator<Item = &str> {
        let recipes = match self {
            Unlocks::Recipes(recipes) => Some(recipes),
            Unlocks::Any(_) => None,
        };
        recipes.into_iter().flatten().map(String::as_str)
    }
}

/// A technology as stored in a data file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnologyDef {
    #[serde(default)]
    pub unlocks: BTreeSet<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// A registered technology. Immutable after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technology {
    pub id: TechId,
    pub name: String,
    /// Component technology names, empty for atomic technologies.
    pub progressive: Vec<String>,
    pub unlocks: Unlocks,
    pub modifiers: Vec<String>,
}

impl Technology {
    pub fn is_progressive(&self) -> bool {
        !self.progressive.is_empty()
    }

    pub fn has_modifiers(&self) -> bool {
        !self.modifiers.is_empty()
    }

    pub fn has_modifier(&self, tag: &str) -> bool {
        self.modifiers.iter().any(|m| m == tag)
    }

    /// A technology is useful if it changes anything at all.
    pub fn is_useful(&self) -> bool {
        self.has_modifiers() || self.unlocks.unlocks_anything()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TechTreeError {
    #[error("duplicate technology: {0}")]
    DuplicateTechnology(String),

    #[error("progressive technology {row} references unknown technology {component}")]
    UnknownComponent { row: String, component: String },

    #[error("technology not found: {0}")]
    NotFound(String),

    #[error("atomic technology {0} registered after progressive technologies")]
    Sealed(String),
}

// ---------------------------------------------------------------------------
// Progressive rows
// ---------------------------------------------------------------------------

/// Options for building progressive technologies.
#[derive(Debug, Clone, Default)]
pub struct ProgressiveOptions {
    /// Row name to component names.
    pub rows: BTreeMap<String, Vec<String>>,
    /// Source row to target row. The source row's components are appended
    /// to the target row; the source row still exists on its own.
    pub merges: BTreeMap<String, String>,
    /// Technologies kept in rows even though they change nothing.
    pub keep_useless: BTreeSet<String>,
}

fn split_suffix(name: &str) -> Option<(&str, u32)> {
    let (base, number) = name.rsplit_once('-')?;
    if base.is_empty() || number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    number.parse().ok().map(|n| (base, n))
}

/// Move `<base>-<from>`, `<base>-<from + 1>`, ... out of `numbered` into
/// `row` until a number is missing.
fn take_run(base: &str, from: u32, row: &mut Vec<String>, numbered: &mut BTreeSet<&str>) {
    let mut next = from;
    loop {
        let seeking = format!("{base}-{next}");
        if !numbered.remove(seeking.as_str()) {
            break;
        }
        row.push(seeking);
        next += 1;
    }
}

/// Group numbered technologies into progressive rows.
///
/// `<base>-1, <base>-2, ...` becomes `progressive-<base>`. A run starting at
/// `<base>-2` becomes a row too when `<base>` itself is a technology, which
/// then leads the row. Runs stop at the first missing number.
pub fn detect_progressive_rows<'a, I>(names: I) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: BTreeSet<&str> = names.into_iter().collect();
    let mut numbered: BTreeSet<&str> = names
        .iter()
        .copied()
        .filter(|n| matches!(split_suffix(n), Some((_, k)) if k >= 2))
        .collect();
    let mut rows = BTreeMap::new();

    for name in names.iter().copied() {
        if let Some((base, 1)) = split_suffix(name) {
            let mut row = vec![name.to_string()];
            take_run(base, 2, &mut row, &mut numbered);
            rows.insert(format!("progressive-{base}"), row);
        }
    }

    let bases: Vec<String> = numbered
        .iter()
        .filter_map(|n| match split_suffix(n) {
            Some((base, 2)) => Some(base.to_string()),
            _ => None,
        })
        .collect();
    for base in bases {
        if !names.contains(base.as_str()) {
            continue;
        }
        let mut row = vec![base.clone()];
        take_run(&base, 2, &mut row, &mut numbered);
        rows.insert(format!("progressive-{base}"), row);
    }
    rows
}

// ---------------------------------------------------------------------------
// TechTable
// ---------------------------------------------------------------------------

/// All technologies, atomic and progressive, by name.
#[derive(Debug, Clone)]
pub struct TechTable {
    technologies: BTreeMap<String, Technology>,
    by_id: HashMap<TechId, String>,
    progressive_lookup: HashMap<String, String>,
    start_unlocked: BTreeSet<String>,
    next_id: u32,
    sealed: bool,
}

impl Default for TechTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TechTable {
    pub fn new() -> Self {
        Self {
            technologies: BTreeMap::new(),
            by_id: HashMap::new(),
            progressive_lookup: HashMap::new(),
            start_unlocked: BTreeSet::new(),
            next_id: TECH_ID_BASE,
            sealed: false,
        }
    }

    /// Recipes available from the start. They are dropped from the unlock
    /// sets of technologies registered afterwards.
    pub fn with_start_unlocked<I, S>(mut self, recipes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.start_unlocked = recipes.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_start_unlocked(&self, recipe: &str) -> bool {
        self.start_unlocked.contains(recipe)
    }

    fn allocate_id(&mut self) -> TechId {
        let id = TechId(self.next_id);
        self.next_id += 1;
        id
    }

    // -- Registration --

    pub fn register_atomic(&mut self, name: &str, def: TechnologyDef) -> Result<TechId, TechTreeError> {
        if self.sealed {
            return Err(TechTreeError::Sealed(name.to_string()));
        }
        if self.technologies.contains_key(name) {
            return Err(TechTreeError::DuplicateTechnology(name.to_string()));
        }
        let unlocks = def
            .unlocks
            .into_iter()
            .filter(|r| !self.start_unlocked.contains(r))
            .collect();
        let id = self.allocate_id();
        self.insert(Technology {
            id,
            name: name.to_string(),
            progressive: Vec::new(),
            unlocks: Unlocks::Recipes(unlocks),
            modifiers: def.modifiers,
        });
        Ok(id)
    }

    /// Register every definition, in name order.
    pub fn register_all(
        &mut self,
        defs: impl IntoIterator<Item = (String, TechnologyDef)>,
    ) -> Result<Vec<TechId>, TechTreeError> {
        let sorted: BTreeMap<String, TechnologyDef> = defs.into_iter().collect();
        sorted
            .into_iter()
            .map(|(name, def)| self.register_atomic(&name, def))
            .collect()
    }

    /// Build progressive technologies from `options`. Components that change
    /// nothing are dropped from their rows unless kept explicitly; rows left
    /// empty are skipped. Afterwards no atomic technology can be added.
    pub fn add_progressive(&mut self, options: &ProgressiveOptions) -> Result<Vec<TechId>, TechTreeError> {
        self.sealed = true;

        let mut rows = options.rows.clone();
        for (source, target) in &options.merges {
            let Some(extra) = rows.get(source).cloned() else {
                return Err(TechTreeError::NotFound(source.clone()));
            };
            rows.get_mut(target)
                .ok_or_else(|| TechTreeError::NotFound(target.clone()))?
                .extend(extra);
        }

        let useless: BTreeSet<&str> = self
            .technologies
            .values()
            .filter(|t| !t.is_progressive() && !t.is_useful())
            .map(|t| t.name.as_str())
            .filter(|n| !options.keep_useless.contains(*n))
            .collect();

        let mut built = Vec::new();
        for (row, components) in &rows {
            if self.technologies.contains_key(row) {
                return Err(TechTreeError::DuplicateTechnology(row.clone()));
            }
            let kept: Vec<String> = components
                .iter()
                .filter(|c| !useless.contains(c.as_str()))
                .cloned()
                .collect();
            if kept.is_empty() {
                debug!(row = row.as_str(), "skipping progressive technology without useful components");
                continue;
            }

            let mut modifiers = BTreeSet::new();
            let mut unlocks_any = false;
            for component in &kept {
                let tech = self.technologies.get(component).ok_or_else(|| {
                    TechTreeError::UnknownComponent {
                        row: row.clone(),
                        component: component.clone(),
                    }
                })?;
                modifiers.extend(tech.modifiers.iter().cloned());
                unlocks_any |= tech.unlocks.unlocks_anything();
            }
            built.push((row.clone(), kept, modifiers, unlocks_any));
        }

        let mut ids = Vec::with_capacity(built.len());
        for (row, kept, modifiers, unlocks_any) in built {
            if !options.merges.contains_key(&row) {
                for component in &kept {
                    self.progressive_lookup.insert(component.clone(), row.clone());
                }
            }
            let id = self.allocate_id();
            self.insert(Technology {
                id,
                name: row,
                progressive: kept,
                unlocks: Unlocks::Any(unlocks_any),
                modifiers: modifiers.into_iter().collect(),
            });
            ids.push(id);
        }
        Ok(ids)
    }

    fn insert(&mut self, tech: Technology) {
        self.by_id.insert(tech.id, tech.name.clone());
        self.technologies.insert(tech.name.clone(), tech);
    }

    // -- Query API --

    pub fn get(&self, name: &str) -> Option<&Technology> {
        self.technologies.get(name)
    }

    pub fn get_by_id(&self, id: TechId) -> Option<&Technology> {
        self.by_id.get(&id).and_then(|n| self.technologies.get(n))
    }

    pub fn id_of(&self, name: &str) -> Result<TechId, TechTreeError> {
        self.get(name)
            .map(|t| t.id)
            .ok_or_else(|| TechTreeError::NotFound(name.to_string()))
    }

    pub fn name_of(&self, id: TechId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// The progressive technology `name` belongs to, if any.
    pub fn progressive_of(&self, name: &str) -> Option<&Technology> {
        self.progressive_lookup
            .get(name)
            .and_then(|row| self.technologies.get(row))
    }

    /// All technologies in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Technology> {
        self.technologies.values()
    }

    pub fn atomic(&self) -> impl Iterator<Item = &Technology> {
        self.iter().filter(|t| !t.is_progressive())
    }

    pub fn progressive(&self) -> impl Iterator<Item = &Technology> {
        self.iter().filter(|t| t.is_progressive())
    }

    /// Atomic technologies carrying modifier `tag`.
    pub fn with_modifier(&self, tag: &str) -> Vec<TechId> {
        self.atomic()
            .filter(|t| t.has_modifier(tag))
            .map(|t| t.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.technologies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.technologies.is_empty()
    }

    /// Recipe name to the atomic technologies unlocking it.
    pub fn unlock_index(&self) -> UnlockIndex {
        let mut index = UnlockIndex::new();
        for tech in self.atomic() {
            for recipe in tech.unlocks.recipes() {
                index.insert(recipe, tech.id);
            }
        }
        index
    }
}
