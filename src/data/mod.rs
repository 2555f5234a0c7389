//! Data layer: populates the registries at startup.
//!
//! This plugin runs in OnEnter(GameState::Loading), fills ItemRegistry (items
//! and the category table), RecipeRegistry and the default seasoning sources
//! from the hard-coded data in submodules, then moves to GameState::Playing.

mod categories;
mod items;

use bevy::prelude::*;

use crate::crafting::{
    populate_recipe_registry, AugmentationCandidate, SeasoningRegistry, StaticSeasoning,
};
use crate::shared::*;

pub use categories::populate_categories;
pub use items::populate_items;

pub struct DataPlugin;

impl Plugin for DataPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ItemRegistry>()
            .init_resource::<RecipeRegistry>()
            .init_resource::<SeasoningRegistry>()
            .add_systems(OnEnter(GameState::Loading), load_all_data);
    }
}

/// The pantry seasoning: a pinch of salt lifts any cooked dish to silver.
pub fn pantry_seasoning() -> StaticSeasoning {
    StaticSeasoning {
        name: "pantry".to_string(),
        outputs: Some(
            crate::crafting::ALL_COOKING_RECIPE_IDS
                .iter()
                .map(|id| id.to_string())
                .collect(),
        ),
        candidates: vec![AugmentationCandidate::new(
            vec![IngredientRequirement::item("salt", 1)],
            ItemQuality::Silver,
        )
        .with_message("A pinch of salt.")],
    }
}

fn load_all_data(
    mut item_registry: ResMut<ItemRegistry>,
    mut recipe_registry: ResMut<RecipeRegistry>,
    mut seasoning: ResMut<SeasoningRegistry>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    info!("DataPlugin: populating registries…");

    items::populate_items(&mut item_registry);
    categories::populate_categories(&mut item_registry);
    info!(
        "  Items loaded: {}, categories: {}",
        item_registry.items.len(),
        item_registry.categories.len()
    );

    populate_recipe_registry(&mut recipe_registry);
    for recipe in recipe_registry.recipes.values() {
        if let Err(e) = recipe.validate() {
            warn!("  {}", e);
        }
    }
    info!("  Recipes loaded: {}", recipe_registry.recipes.len());

    if seasoning.is_empty() {
        seasoning.register(pantry_seasoning());
    }
    info!("  Seasoning sources: {}", seasoning.len());

    next_state.set(GameState::Playing);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (ItemRegistry, RecipeRegistry) {
        let mut items = ItemRegistry::default();
        populate_items(&mut items);
        populate_categories(&mut items);
        let mut recipes = RecipeRegistry::default();
        populate_recipe_registry(&mut recipes);
        (items, recipes)
    }

    #[test]
    fn test_every_recipe_item_is_registered() {
        let (items, recipes) = seeded();
        for recipe in recipes.recipes.values() {
            assert!(
                items.get(&recipe.output).is_some(),
                "output '{}' of '{}' missing",
                recipe.output,
                recipe.id
            );
            for req in &recipe.ingredients {
                match req {
                    IngredientRequirement::Item {
                        pattern: IngredientPattern::Item(id),
                        ..
                    } => assert!(items.get(id).is_some(), "ingredient '{}' missing", id),
                    IngredientRequirement::Item {
                        pattern: IngredientPattern::Category(code),
                        ..
                    } => assert!(items.category(*code).is_some(), "category {} missing", code),
                    IngredientRequirement::Currency { .. } => {}
                }
            }
        }
    }

    #[test]
    fn test_every_category_has_a_member_or_no_icon() {
        let (items, _) = seeded();
        for (code, info) in &items.categories {
            if let Some(icon) = &info.icon_item {
                assert_eq!(
                    items.category_of(icon),
                    Some(*code),
                    "icon '{}' should belong to category {}",
                    icon,
                    code
                );
            }
        }
    }

    #[test]
    fn test_pantry_seasoning_only_targets_cooking() {
        use crate::crafting::SeasoningSource;
        let pantry = pantry_seasoning();
        let omelet = ItemStack::new("omelet", ItemQuality::Normal, 1);
        let fence = ItemStack::new("fence", ItemQuality::Normal, 1);
        assert_eq!(pantry.candidates(&omelet).len(), 1);
        assert!(pantry.candidates(&fence).is_empty());
    }
}
