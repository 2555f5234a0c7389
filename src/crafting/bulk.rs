//! Bulk craft quantity arithmetic.
//!
//! Quantities here are item counts: always a multiple of the recipe's yield.
//! Craft counts (how many times the recipe runs) are the quantity divided by
//! the yield.

use super::availability::get_available;
use super::consumption::{verify, ConsumePolicy};
use super::stores::Stores;
use crate::shared::*;

/// How many whole crafts the ingredients support. Recipes with no ingredients
/// support none; they are rejected by `CraftingRecipe::validate` anyway.
pub fn ingredient_craft_limit(
    recipe: &CraftingRecipe,
    stores: &Stores,
    registry: &ItemRegistry,
    max_quality: ItemQuality,
) -> u32 {
    recipe
        .ingredients
        .iter()
        .map(|req| {
            let available = get_available(req, stores, registry, max_quality).total;
            available / req.quantity().max(1)
        })
        .min()
        .unwrap_or(0)
}

/// Largest craft count up to `upper` that phase one can actually reserve.
/// Per-requirement totals overstate what overlapping patterns can share.
fn reservable_crafts(
    recipe: &CraftingRecipe,
    upper: u32,
    stores: &Stores,
    registry: &ItemRegistry,
    policy: ConsumePolicy,
) -> u32 {
    let fits = |crafts: u32| verify(&recipe.ingredients, crafts, stores, registry, policy).is_ok();
    if upper == 0 || fits(upper) {
        return upper;
    }
    // fits(lo) holds, fits(hi) does not.
    let (mut lo, mut hi) = (0, upper);
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// The most items the player may request in one bulk craft.
///
/// `seasoning_crafts` is the number of crafts the seasoning supply covers; pass
/// it only when seasoning is mandatory; it then binds if it is the smaller.
pub fn compute_limit(
    recipe: &CraftingRecipe,
    stores: &Stores,
    registry: &ItemRegistry,
    policy: ConsumePolicy,
    seasoning_crafts: Option<u32>,
    session_cap: u32,
) -> u32 {
    let yield_per_craft = recipe.yield_per_craft.max(1);
    let mut crafts = ingredient_craft_limit(recipe, stores, registry, policy.max_quality);
    if let Some(seasoned) = seasoning_crafts {
        crafts = crafts.min(seasoned);
    }
    // The cap trims in whole crafts, so the limit stays a multiple of the yield.
    crafts = crafts.min(session_cap / yield_per_craft);
    reservable_crafts(recipe, crafts, stores, registry, policy).saturating_mul(yield_per_craft)
}

/// Round `requested` up to a whole craft, then clamp into `[yield, limit]`.
/// Returns 0 when not even one craft is possible.
pub fn normalize_quantity(requested: u32, yield_per_craft: u32, limit: u32) -> u32 {
    let yield_per_craft = yield_per_craft.max(1);
    if limit < yield_per_craft {
        return 0;
    }
    let rounded = requested
        .div_ceil(yield_per_craft)
        .saturating_mul(yield_per_craft);
    // A clamped limit is a yield multiple already, but callers may pass any number.
    let max = (limit / yield_per_craft) * yield_per_craft;
    rounded.clamp(yield_per_craft, max)
}

/// Number of crafts a normalised quantity represents.
pub fn crafts_for(quantity: u32, yield_per_craft: u32) -> u32 {
    quantity / yield_per_craft.max(1)
}
