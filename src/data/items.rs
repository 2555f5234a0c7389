use crate::shared::*;

const GEM: i32 = -2;
const FISH: i32 = -4;
const EGG: i32 = -5;
const MILK: i32 = -6;
const COOKING: i32 = -7;
const CRAFTING: i32 = -8;
const MINERAL: i32 = -12;
const METAL: i32 = -15;
const BUILDING: i32 = -16;
const VEGETABLE: i32 = -75;
const FRUIT: i32 = -79;
const FORAGE: i32 = -81;
const WILD_SEEDS: i32 = -777;

/// (id, name, category, stack size)
const ITEM_TABLE: &[(&str, &str, Option<i32>, u32)] = &[
    // ── Building resources ───────────────────────────────────────────────
    ("wood", "Wood", Some(BUILDING), 999),
    ("stone", "Stone", Some(BUILDING), 999),
    ("hardwood", "Hardwood", Some(BUILDING), 999),
    ("fiber", "Fiber", None, 999),
    ("sap", "Sap", None, 999),
    ("cloth", "Cloth", None, 999),
    ("bug_meat", "Bug Meat", None, 999),
    // ── Metals & minerals ────────────────────────────────────────────────
    ("copper_bar", "Copper Bar", Some(METAL), 999),
    ("iron_bar", "Iron Bar", Some(METAL), 999),
    ("gold_bar", "Gold Bar", Some(METAL), 999),
    ("quartz", "Quartz", Some(MINERAL), 999),
    ("refined_quartz", "Refined Quartz", Some(METAL), 999),
    ("amethyst", "Amethyst", Some(GEM), 999),
    // ── Fish ─────────────────────────────────────────────────────────────
    ("sardine", "Sardine", Some(FISH), 999),
    ("tuna", "Tuna", Some(FISH), 999),
    ("catfish", "Catfish", Some(FISH), 999),
    // ── Animal products ──────────────────────────────────────────────────
    ("egg", "Egg", Some(EGG), 999),
    ("large_egg", "Large Egg", Some(EGG), 999),
    ("milk", "Milk", Some(MILK), 999),
    ("goat_milk", "Goat Milk", Some(MILK), 999),
    // ── Produce & forage ─────────────────────────────────────────────────
    ("parsnip", "Parsnip", Some(VEGETABLE), 999),
    ("tomato", "Tomato", Some(VEGETABLE), 999),
    ("potato", "Potato", Some(VEGETABLE), 999),
    ("apple", "Apple", Some(FRUIT), 999),
    ("blueberry", "Blueberry", Some(FRUIT), 999),
    ("dandelion", "Dandelion", Some(FORAGE), 999),
    ("leek", "Leek", Some(FORAGE), 999),
    // ── Pantry ───────────────────────────────────────────────────────────
    ("wheat_flour", "Wheat Flour", None, 999),
    ("sugar", "Sugar", None, 999),
    ("salt", "Salt", None, 999),
    ("qi_seasoning", "Qi Seasoning", None, 999),
    // ── Crafted ──────────────────────────────────────────────────────────
    ("sprinkler", "Sprinkler", Some(CRAFTING), 999),
    ("quality_sprinkler", "Quality Sprinkler", Some(CRAFTING), 999),
    ("fence", "Fence", Some(CRAFTING), 999),
    ("path", "Path", Some(CRAFTING), 999),
    ("chest", "Chest", Some(CRAFTING), 999),
    ("torch", "Torch", Some(CRAFTING), 999),
    ("campfire", "Campfire", Some(CRAFTING), 999),
    ("wild_seeds", "Wild Seeds", Some(WILD_SEEDS), 999),
    ("bait", "Bait", Some(CRAFTING), 999),
    ("festival_hat", "Festival Hat", None, 1),
    ("warp_totem", "Warp Totem", Some(CRAFTING), 999),
    // ── Cooked ───────────────────────────────────────────────────────────
    ("fried_egg", "Fried Egg", Some(COOKING), 999),
    ("omelet", "Omelet", Some(COOKING), 999),
    ("cooked_fish", "Cooked Fish", Some(COOKING), 999),
    ("fish_stew", "Fish Stew", Some(COOKING), 999),
    ("salad", "Salad", Some(COOKING), 999),
    ("cookie", "Cookie", Some(COOKING), 999),
    ("heart_cake", "Heart Cake", Some(COOKING), 999),
];

pub fn populate_items(registry: &mut ItemRegistry) {
    for &(id, name, category, stack_size) in ITEM_TABLE {
        registry.items.insert(
            id.to_string(),
            ItemDef {
                id: id.to_string(),
                name: name.to_string(),
                category: category.map(CategoryCode),
                stack_size,
            },
        );
    }
}
