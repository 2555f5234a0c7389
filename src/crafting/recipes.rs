use crate::shared::*;

// Category codes used by recipes below. Display data lives in the item registry.
const FISH: i32 = -4;
const EGG: i32 = -5;
const MILK: i32 = -6;
const VEGETABLE: i32 = -75;
const FRUIT: i32 = -79;
const FORAGE: i32 = -81;

fn recipe(
    id: &str,
    name: &str,
    ingredients: Vec<IngredientRequirement>,
    yield_per_craft: u32,
    is_cooking: bool,
) -> CraftingRecipe {
    CraftingRecipe {
        id: id.into(),
        name: name.into(),
        ingredients,
        output: id.into(),
        yield_per_craft,
        is_cooking,
        can_produce: CanProduce::always(),
    }
}

fn item(id: &str, quantity: u32) -> IngredientRequirement {
    IngredientRequirement::item(id, quantity)
}

fn any(code: i32, quantity: u32) -> IngredientRequirement {
    IngredientRequirement::category(code, quantity)
}

/// Build a crafting (non-cooking) recipe by id.
/// Returns None if the id is not recognized.
pub fn make_crafting_recipe(id: &str) -> Option<CraftingRecipe> {
    let r = match id {
        // ── Sprinklers ──────────────────────────────────────────────────────
        "sprinkler" => recipe(id, "Sprinkler", vec![item("copper_bar", 1), item("iron_bar", 1)], 1, false),
        "quality_sprinkler" => recipe(
            id,
            "Quality Sprinkler",
            vec![item("iron_bar", 1), item("gold_bar", 1), item("refined_quartz", 1)],
            1,
            false,
        ),
        // ── Fences & Paths ──────────────────────────────────────────────────
        "fence" => recipe(id, "Fence", vec![item("wood", 2)], 1, false),
        "path" => recipe(id, "Path", vec![item("stone", 1)], 1, false),
        // ── Storage ─────────────────────────────────────────────────────────
        "chest" => recipe(id, "Chest", vec![item("wood", 50)], 1, false),
        // ── Lighting ────────────────────────────────────────────────────────
        "torch" => recipe(id, "Torch", vec![item("wood", 1), item("sap", 2)], 3, false),
        "campfire" => recipe(
            id,
            "Campfire",
            vec![item("stone", 10), item("wood", 10), item("fiber", 10)],
            1,
            false,
        ),
        // ── Farming ─────────────────────────────────────────────────────────
        "wild_seeds" => recipe(id, "Wild Seeds", vec![any(FORAGE, 4)], 10, false),
        "bait" => recipe(id, "Bait", vec![item("bug_meat", 1)], 5, false),
        // ── Festival & Shop Goods ───────────────────────────────────────────
        "festival_hat" => recipe(
            id,
            "Festival Hat",
            vec![item("cloth", 1), IngredientRequirement::currency(CurrencyKind::StarTokens, 200)],
            1,
            false,
        ),
        "warp_totem" => recipe(
            id,
            "Warp Totem",
            vec![
                item("hardwood", 1),
                any(FRUIT, 1),
                IngredientRequirement::currency(CurrencyKind::Gold, 250),
            ],
            1,
            false,
        ),
        _ => return None,
    };
    Some(r)
}

/// Build a cooking recipe by id.
pub fn make_cooking_recipe(id: &str) -> Option<CraftingRecipe> {
    let r = match id {
        "fried_egg" => recipe(id, "Fried Egg", vec![any(EGG, 1)], 1, true),
        "omelet" => recipe(id, "Omelet", vec![any(EGG, 1), any(MILK, 1)], 1, true),
        "cooked_fish" => recipe(id, "Cooked Fish", vec![any(FISH, 1)], 1, true),
        "fish_stew" => recipe(
            id,
            "Fish Stew",
            vec![any(FISH, 2), item("tomato", 1), IngredientRequirement::currency(CurrencyKind::Gold, 20)],
            1,
            true,
        ),
        "salad" => recipe(id, "Salad", vec![any(VEGETABLE, 2), item("dandelion", 1)], 1, true),
        "cookie" => recipe(
            id,
            "Cookie",
            vec![item("wheat_flour", 1), item("sugar", 1), any(EGG, 1)],
            3,
            true,
        ),
        "heart_cake" => recipe(
            id,
            "Heart Cake",
            vec![item("wheat_flour", 1), IngredientRequirement::currency(CurrencyKind::HeartTokens, 5)],
            1,
            true,
        ),
        _ => return None,
    };
    Some(r)
}

/// All crafting recipe ids (for data plugin initialization).
pub const ALL_CRAFTING_RECIPE_IDS: &[&str] = &[
    "sprinkler",
    "quality_sprinkler",
    "fence",
    "path",
    "chest",
    "torch",
    "campfire",
    "wild_seeds",
    "bait",
    "festival_hat",
    "warp_totem",
];

/// All cooking recipe ids (for data plugin initialization).
pub const ALL_COOKING_RECIPE_IDS: &[&str] = &[
    "fried_egg",
    "omelet",
    "cooked_fish",
    "fish_stew",
    "salad",
    "cookie",
    "heart_cake",
];

/// Populate the RecipeRegistry with all known recipes.
pub fn populate_recipe_registry(registry: &mut RecipeRegistry) {
    let recipes = ALL_CRAFTING_RECIPE_IDS
        .iter()
        .filter_map(|id| make_crafting_recipe(id))
        .chain(ALL_COOKING_RECIPE_IDS.iter().filter_map(|id| make_cooking_recipe(id)));
    for recipe in recipes {
        registry.insert(recipe);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_recipe_builds_and_validates() {
        let mut registry = RecipeRegistry::default();
        populate_recipe_registry(&mut registry);
        assert_eq!(
            registry.recipes.len(),
            ALL_CRAFTING_RECIPE_IDS.len() + ALL_COOKING_RECIPE_IDS.len()
        );
        for recipe in registry.recipes.values() {
            assert!(recipe.validate().is_ok(), "{} should validate", recipe.id);
        }
    }

    #[test]
    fn test_cooking_flag_matches_list() {
        for id in ALL_COOKING_RECIPE_IDS {
            assert!(make_cooking_recipe(id).is_some_and(|r| r.is_cooking));
            assert!(make_crafting_recipe(id).is_none());
        }
    }
}
