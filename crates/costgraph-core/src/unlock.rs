use crate::graph::{CostGraph, EvalError};
use crate::id::{ItemId, TechId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Recipe unlock index
// ---------------------------------------------------------------------------

/// Recipe name to the technologies that unlock it. A recipe unlocked by any
/// one of its technologies is available; a recipe without an entry is
/// available from the start.
#[derive(Debug, Clone, Default)]
pub struct UnlockIndex {
    by_recipe: HashMap<String, BTreeSet<TechId>>,
}

impl UnlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, recipe: impl Into<String>, tech: TechId) {
        self.by_recipe.entry(recipe.into()).or_default().insert(tech);
    }

    pub fn get(&self, recipe: &str) -> Option<&BTreeSet<TechId>> {
        self.by_recipe.get(recipe)
    }

    /// Direct unlock technologies of `recipe`, empty for starting recipes.
    pub fn technologies_for(&self, recipe: &str) -> BTreeSet<TechId> {
        self.by_recipe.get(recipe).cloned().unwrap_or_default()
    }

    pub fn remove(&mut self, recipe: &str) -> Option<BTreeSet<TechId>> {
        self.by_recipe.remove(recipe)
    }

    pub fn len(&self) -> usize {
        self.by_recipe.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_recipe.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, TechId)> for UnlockIndex {
    fn from_iter<T: IntoIterator<Item = (S, TechId)>>(iter: T) -> Self {
        let mut index = Self::new();
        for (recipe, tech) in iter {
            index.insert(recipe, tech);
        }
        index
    }
}

// ---------------------------------------------------------------------------
// Machines
// ---------------------------------------------------------------------------

/// A production facility. `item` is `None` for hand crafting.
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    pub name: String,
    pub item: Option<ItemId>,
    pub categories: BTreeSet<String>,
}

impl Machine {
    pub fn new(name: &str, item: Option<ItemId>) -> Self {
        Self {
            name: name.to_string(),
            item,
            categories: BTreeSet::new(),
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.categories.insert(category.to_string());
        self
    }
}

/// Known facilities and the one chosen for each production category.
#[derive(Debug, Clone, Default)]
pub struct MachineTable {
    machines: BTreeMap<String, Machine>,
    per_category: BTreeMap<String, String>,
}

impl MachineTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a facility. Categories of an already known facility are merged.
    pub fn add_machine(&mut self, machine: Machine) {
        match self.machines.get_mut(&machine.name) {
            Some(existing) => existing.categories.extend(machine.categories),
            None => {
                self.machines.insert(machine.name.clone(), machine);
            }
        }
    }

    pub fn machine(&self, name: &str) -> Option<&Machine> {
        self.machines.get(name)
    }

    pub fn machines(&self) -> impl Iterator<Item = &Machine> {
        self.machines.values()
    }

    /// Bind `category` to a known facility. Returns `false` if the facility
    /// is unknown.
    pub fn assign(&mut self, category: &str, machine: &str) -> bool {
        if !self.machines.contains_key(machine) {
            return false;
        }
        self.per_category
            .insert(category.to_string(), machine.to_string());
        true
    }

    pub fn machine_for(&self, category: &str) -> Option<&Machine> {
        self.per_category
            .get(category)
            .and_then(|name| self.machines.get(name))
    }

    pub fn is_assigned(&self, category: &str) -> bool {
        self.per_category.contains_key(category)
    }

    /// Category to facility name, ordered by category.
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.per_category
            .iter()
            .map(|(c, m)| (c.as_str(), m.as_str()))
    }

    /// Every category some facility supports but none is assigned to.
    pub fn unassigned_categories(&self) -> BTreeSet<String> {
        self.machines
            .values()
            .flat_map(|m| m.categories.iter())
            .filter(|c| !self.per_category.contains_key(*c))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Technology aggregation
// ---------------------------------------------------------------------------

/// Items and facilities currently being resolved by one aggregation call.
#[derive(Debug, Default)]
struct UnlockGuard {
    items: HashSet<ItemId>,
    machines: HashSet<String>,
}

impl CostGraph {
    /// Every technology needed to make `item` along its best decomposition,
    /// plus those needed to build the facility of every category the
    /// decomposition passes through.
    ///
    /// Branches that loop back to an item or facility already being
    /// resolved contribute nothing.
    pub fn all_unlocking_technologies(&mut self, item: ItemId) -> Result<BTreeSet<TechId>, EvalError> {
        let mut guard = UnlockGuard::default();
        self.item_technologies(item, &mut guard)
    }

    /// Technologies needed to build the facility assigned to `category`.
    pub fn machine_unlocking_technologies(
        &mut self,
        category: &str,
    ) -> Result<BTreeSet<TechId>, EvalError> {
        let mut guard = UnlockGuard::default();
        self.machine_technologies(category, &mut guard)
    }

    fn item_technologies(
        &mut self,
        item: ItemId,
        guard: &mut UnlockGuard,
    ) -> Result<BTreeSet<TechId>, EvalError> {
        if !guard.items.insert(item) {
            return Ok(BTreeSet::new());
        }
        let cost = self.evaluate(item)?;
        let mut technologies = cost.technologies;
        for category in &cost.categories {
            technologies.extend(self.machine_technologies(category, guard)?);
        }
        guard.items.remove(&item);
        Ok(technologies)
    }

    fn machine_technologies(
        &mut self,
        category: &str,
        guard: &mut UnlockGuard,
    ) -> Result<BTreeSet<TechId>, EvalError> {
        let Some(machine) = self.machines.machine_for(category) else {
            warn!(category, "no facility registered for category");
            return Ok(BTreeSet::new());
        };
        let Some(item) = machine.item else {
            return Ok(BTreeSet::new());
        };
        let name = machine.name.clone();
        if !guard.machines.insert(name.clone()) {
            return Ok(BTreeSet::new());
        }
        let technologies = self.item_technologies(item, guard);
        guard.machines.remove(&name);
        technologies
    }

    /// Assign every category that has no facility yet to the facility whose
    /// own decomposition needs the fewest technologies. Hand crafting needs
    /// none; ties go to the smaller name.
    pub fn fill_cheapest_machines(&mut self) -> Result<(), EvalError> {
        let categories = self.machines.unassigned_categories();
        if categories.is_empty() {
            return Ok(());
        }

        let candidates: Vec<(String, Option<ItemId>)> = self
            .machines
            .machines()
            .map(|m| (m.name.clone(), m.item))
            .collect();
        let mut tech_count: BTreeMap<String, usize> = BTreeMap::new();
        for (name, item) in candidates {
            let count = match item {
                Some(item) => self.evaluate(item)?.technologies.len(),
                None => 0,
            };
            tech_count.insert(name, count);
        }

        for category in categories {
            let cheapest = self
                .machines
                .machines()
                .filter(|m| m.categories.contains(&category))
                .map(|m| (tech_count.get(&m.name).copied().unwrap_or(usize::MAX), m.name.clone()))
                .min();
            if let Some((count, name)) = cheapest {
                debug!(category = category.as_str(), machine = name.as_str(), technologies = count, "assigned facility");
                self.machines.assign(&category, &name);
            }
        }
        Ok(())
    }
}
