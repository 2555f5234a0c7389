//! Read-only availability resolution.
//!
//! Everything here is a pure function of the `Stores` snapshot it is given, so
//! the UI can call it every frame. Nothing in this module mutates a source.

use bevy::log::warn;

use super::error::{CraftingError, Deficiency};
use super::stores::Stores;
use crate::shared::*;

/// One stack that satisfies a requirement, and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedStack {
    pub at: StackRef,
    pub item_id: ItemId,
    pub quality: ItemQuality,
    pub count: u32,
}

/// How much of a requirement the stores can cover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Availability {
    pub total: u32,
    /// Source-encounter order. Empty for currency requirements.
    pub matched: Vec<MatchedStack>,
}

impl Availability {
    pub fn covers(&self, needed: u32) -> bool {
        self.total >= needed
    }

    /// Matched stacks in the order they should be drawn down.
    /// The sort is stable, so equal qualities keep encounter order.
    pub fn consumption_order(&self, low_quality_first: bool) -> Vec<&MatchedStack> {
        let mut order: Vec<&MatchedStack> = self.matched.iter().collect();
        if low_quality_first {
            order.sort_by_key(|m| m.quality);
        }
        order
    }
}

/// Does `item_id` satisfy `pattern`? Items with no category never match a category.
pub fn pattern_matches(pattern: &IngredientPattern, item_id: &str, registry: &ItemRegistry) -> bool {
    match pattern {
        IngredientPattern::Item(id) => id == item_id,
        IngredientPattern::Category(code) => registry.category_of(item_id) == Some(*code),
    }
}

/// Total available for `requirement` across the player and the external sources,
/// ignoring stacks above `max_quality` and sources that can't be extracted from.
pub fn get_available(
    requirement: &IngredientRequirement,
    stores: &Stores,
    registry: &ItemRegistry,
    max_quality: ItemQuality,
) -> Availability {
    match requirement {
        IngredientRequirement::Currency { kind, .. } => Availability {
            total: stores.wallet.balance(*kind),
            matched: Vec::new(),
        },
        IngredientRequirement::Item { pattern, .. } => {
            if let IngredientPattern::Category(code) = pattern {
                if registry.category(*code).is_none() {
                    warn!("{}, treating as unavailable", CraftingError::UnresolvableCategory(*code));
                    return Availability::default();
                }
            }

            let mut availability = Availability::default();
            for (source_id, source) in stores.iter() {
                if !source.can_extract {
                    continue;
                }
                for (slot, stack) in source.stacks() {
                    if stack.quality > max_quality || stack.count == 0 {
                        continue;
                    }
                    if !pattern_matches(pattern, &stack.item_id, registry) {
                        continue;
                    }
                    availability.total = availability.total.saturating_add(stack.count);
                    availability.matched.push(MatchedStack {
                        at: StackRef {
                            source: source_id,
                            slot,
                        },
                        item_id: stack.item_id.clone(),
                        quality: stack.quality,
                        count: stack.count,
                    });
                }
            }
            availability
        }
    }
}

/// Per-requirement status for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementStatus {
    pub name: String,
    pub icon: Option<ItemId>,
    pub available: u32,
    pub needed_per_craft: u32,
    pub deficiency: Option<Deficiency>,
}

/// Status of every requirement of `recipe` for a batch of `crafts` crafts,
/// in the recipe's declared order.
pub fn requirement_status(
    recipe: &CraftingRecipe,
    stores: &Stores,
    registry: &ItemRegistry,
    max_quality: ItemQuality,
    crafts: u32,
) -> Vec<RequirementStatus> {
    recipe
        .ingredients
        .iter()
        .map(|req| {
            let available = get_available(req, stores, registry, max_quality).total;
            let (name, icon) = match req {
                IngredientRequirement::Item { pattern, .. } => {
                    (registry.pattern_name(pattern), registry.pattern_icon(pattern))
                }
                IngredientRequirement::Currency { kind, .. } => (format!("{:?}", kind), None),
            };
            RequirementStatus {
                name,
                icon,
                available,
                needed_per_craft: req.quantity(),
                deficiency: Deficiency::classify(available, req.quantity(), crafts.max(1)),
            }
        })
        .collect()
}
