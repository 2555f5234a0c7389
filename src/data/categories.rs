use crate::shared::*;

/// (code, display name, icon fallback item)
const CATEGORY_TABLE: &[(i32, &str, Option<&str>)] = &[
    (-2, "Gem", Some("amethyst")),
    (-4, "Fish", Some("sardine")),
    (-5, "Egg", Some("egg")),
    (-6, "Milk", Some("milk")),
    (-7, "Cooking", None),
    (-8, "Crafting", None),
    (-12, "Mineral", Some("quartz")),
    (-15, "Metal Resource", Some("copper_bar")),
    (-16, "Building Resource", Some("wood")),
    (-75, "Vegetable", Some("parsnip")),
    (-79, "Fruit", Some("apple")),
    (-81, "Forage", Some("dandelion")),
    (-777, "Wild Seeds", Some("wild_seeds")),
];

pub fn populate_categories(registry: &mut ItemRegistry) {
    for &(code, name, icon) in CATEGORY_TABLE {
        registry.categories.insert(
            CategoryCode(code),
            CategoryInfo {
                name: name.to_string(),
                icon_item: icon.map(str::to_string),
            },
        );
    }
}
