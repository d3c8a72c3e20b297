use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a recipe in the registry. Recipes can be retracted, so the
    /// key is generational: a removed recipe's key never resolves again.
    pub struct RecipeId;
}

/// Identifies an item (or fluid) in the registry. Cheap to copy and compare.
///
/// Items are never removed, so the id is a plain index into the item arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Identifies a technology. Assigned once at load time and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TechId(pub u32);

/// Identifies a detected recipe loop in the cycle registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoopId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn item_id_ordering_follows_index() {
        assert!(ItemId(0) < ItemId(1));
        assert_eq!(ItemId(3), ItemId(3));
    }

    #[test]
    fn removed_recipe_key_does_not_resolve() {
        let mut arena: SlotMap<RecipeId, &str> = SlotMap::with_key();
        let a = arena.insert("smelt");
        arena.remove(a);
        let b = arena.insert("smelt-again");
        assert_ne!(a, b);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b), Some(&"smelt-again"));
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(TechId(131_072), "automation");
        map.insert(TechId(131_073), "logistics");
        assert_eq!(map[&TechId(131_072)], "automation");
    }
}
