//! Seasoning: an optional pass after a craft that spends extra, recipe-external
//! ingredients to raise the quality of what was produced.
//!
//! Sources are consulted in registration order. Each source applies at most
//! its first fully-available candidate. When several sources apply, only the
//! last applied message is shown. Exclusive candidates (the top-tier bonus
//! ingredient) are held back until every other source has run, and apply only
//! while the item is still at base quality.

use bevy::log::{debug, info, warn};
use bevy::prelude::Resource;

use super::consumption::{consume, verify, ConsumePolicy};
use super::stores::{Stores, StoresMut};
use super::availability::get_available;
use crate::shared::*;

/// One set of extra ingredients a source offers for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentationCandidate {
    pub ingredients: Vec<IngredientRequirement>,
    /// Quality the item is raised to. Never lowers the item.
    pub quality: ItemQuality,
    pub message: Option<String>,
    /// Top-tier bonus: evaluated last, only on unaugmented items, sets the highest tier.
    pub exclusive: bool,
}

impl AugmentationCandidate {
    pub fn new(ingredients: Vec<IngredientRequirement>, quality: ItemQuality) -> Self {
        Self {
            ingredients,
            quality,
            message: None,
            exclusive: false,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The single well-known bonus ingredient.
    pub fn exclusive_bonus(item_id: impl Into<ItemId>, message: impl Into<String>) -> Self {
        Self {
            ingredients: vec![IngredientRequirement::item(item_id, 1)],
            quality: ItemQuality::HIGHEST,
            message: Some(message.into()),
            exclusive: true,
        }
    }
}

/// A contributor of seasoning candidates, registered with `SeasoningRegistry`.
pub trait SeasoningSource: Send + Sync {
    fn name(&self) -> &str;

    /// Zero or more candidates for the item just produced, best first.
    fn candidates(&self, item: &ItemStack) -> Vec<AugmentationCandidate>;
}

/// Fixed candidate list, optionally limited to some output items.
#[derive(Debug, Clone)]
pub struct StaticSeasoning {
    pub name: String,
    /// None = applies to every item.
    pub outputs: Option<Vec<ItemId>>,
    pub candidates: Vec<AugmentationCandidate>,
}

impl SeasoningSource for StaticSeasoning {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(&self, item: &ItemStack) -> Vec<AugmentationCandidate> {
        match &self.outputs {
            Some(outputs) if !outputs.contains(&item.item_id) => Vec::new(),
            _ => self.candidates.clone(),
        }
    }
}

/// Registered seasoning sources, in priority (registration) order.
#[derive(Resource, Default)]
pub struct SeasoningRegistry {
    sources: Vec<Box<dyn SeasoningSource>>,
}

impl SeasoningRegistry {
    pub fn register(&mut self, source: impl SeasoningSource + 'static) {
        info!("Registered seasoning source '{}'", source.name());
        self.sources.push(Box::new(source));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn SeasoningSource> {
        self.sources.iter().map(|s| s.as_ref())
    }
}

/// Result of one seasoning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentOutcome {
    pub item: ItemStack,
    /// The last candidate applied, if any.
    pub applied: Option<AugmentationCandidate>,
    /// Message of the last applied candidate only.
    pub message: Option<String>,
}

/// Run the seasoning pass over `base`, which was produced by `crafts` crafts.
/// Candidate ingredients are scaled by `crafts` and consumed as their own
/// best-effort transactions; a failure there never undoes the craft itself.
pub fn try_augment(
    base: ItemStack,
    crafts: u32,
    stores: &mut StoresMut,
    registry: &ItemRegistry,
    policy: ConsumePolicy,
    sources: &SeasoningRegistry,
    bonus: Option<&AugmentationCandidate>,
) -> AugmentOutcome {
    let mut outcome = AugmentOutcome {
        item: base,
        applied: None,
        message: None,
    };
    let mut deferred: Vec<AugmentationCandidate> = Vec::new();

    for source in sources.iter() {
        for candidate in source.candidates(&outcome.item) {
            if candidate.exclusive {
                deferred.push(candidate);
                continue;
            }
            if apply_candidate(&candidate, crafts, stores, registry, policy) {
                debug!("Seasoning from '{}' applied to {}", source.name(), outcome.item.item_id);
                outcome.item.quality = outcome.item.quality.max(candidate.quality);
                outcome.message = candidate.message.clone();
                outcome.applied = Some(candidate);
                break;
            }
        }
    }

    deferred.extend(bonus.cloned());
    for candidate in deferred {
        if outcome.item.quality > ItemQuality::Normal {
            debug!(
                "{} already seasoned, skipping exclusive bonus",
                outcome.item.item_id
            );
            break;
        }
        if apply_candidate(&candidate, crafts, stores, registry, policy) {
            outcome.item.quality = ItemQuality::HIGHEST;
            outcome.message = candidate.message.clone();
            outcome.applied = Some(candidate);
            break;
        }
    }

    if outcome.applied.is_some() {
        info!(
            "Seasoned {} x{} to {:?}",
            outcome.item.item_id, outcome.item.count, outcome.item.quality
        );
    }
    outcome
}

/// Read-only availability check, then an independent consumption.
fn apply_candidate(
    candidate: &AugmentationCandidate,
    crafts: u32,
    stores: &mut StoresMut,
    registry: &ItemRegistry,
    policy: ConsumePolicy,
) -> bool {
    if candidate.ingredients.is_empty() {
        return true;
    }
    if verify(&candidate.ingredients, crafts, &stores.view(), registry, policy).is_err() {
        return false;
    }
    match consume(&candidate.ingredients, crafts, stores, registry, policy) {
        Ok(_) => true,
        Err(e) => {
            warn!("Seasoning skipped: {}", e);
            false
        }
    }
}

/// Every quality the pass could leave `item` at. Always includes the base.
pub fn reachable_qualities(
    item: &ItemStack,
    sources: &SeasoningRegistry,
    bonus: Option<&AugmentationCandidate>,
) -> Vec<ItemQuality> {
    let mut qualities: Vec<ItemQuality> = sources
        .iter()
        .flat_map(|s| s.candidates(item))
        .chain(bonus.cloned())
        .map(|c| {
            if c.exclusive {
                ItemQuality::HIGHEST
            } else {
                item.quality.max(c.quality)
            }
        })
        .collect();
    qualities.push(item.quality);
    qualities.sort();
    qualities.dedup();
    qualities
}

/// How many crafts of `item` the best single candidate can season.
/// Used as the binding limit when seasoning is mandatory.
pub fn seasoning_craft_limit(
    item: &ItemStack,
    stores: &Stores,
    registry: &ItemRegistry,
    max_quality: ItemQuality,
    sources: &SeasoningRegistry,
    bonus: Option<&AugmentationCandidate>,
) -> u32 {
    let mut candidates: Vec<AugmentationCandidate> =
        sources.iter().flat_map(|s| s.candidates(item)).collect();
    candidates.extend(bonus.cloned());

    candidates
        .iter()
        .map(|candidate| {
            candidate
                .ingredients
                .iter()
                .map(|req| {
                    get_available(req, stores, registry, max_quality).total / req.quantity().max(1)
                })
                .min()
                .unwrap_or(u32::MAX)
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ItemRegistry {
        let mut registry = ItemRegistry::default();
        for id in ["salt", "pepper", "qi_seasoning", "soup"] {
            registry.items.insert(
                id.to_string(),
                ItemDef {
                    id: id.to_string(),
                    name: id.to_string(),
                    category: None,
                    stack_size: 999,
                },
            );
        }
        registry
    }

    fn static_source(name: &str, candidates: Vec<AugmentationCandidate>) -> StaticSeasoning {
        StaticSeasoning {
            name: name.into(),
            outputs: None,
            candidates,
        }
    }

    fn soup() -> ItemStack {
        ItemStack::new("soup", ItemQuality::Normal, 1)
    }

    fn qi_bonus() -> AugmentationCandidate {
        AugmentationCandidate::exclusive_bonus("qi_seasoning", "Qi seasoned!")
    }

    #[test]
    fn test_no_candidates_passes_item_through() {
        let mut player = ItemSource::default();
        let mut wallet = Wallet::default();
        let mut stores = StoresMut::new(&mut player, &mut wallet);
        let outcome = try_augment(
            soup(),
            1,
            &mut stores,
            &registry(),
            ConsumePolicy::default(),
            &SeasoningRegistry::default(),
            Some(&qi_bonus()),
        );
        assert_eq!(outcome.item, soup());
        assert_eq!(outcome.applied, None);
        assert_eq!(outcome.message, None);
    }

    #[test]
    fn test_first_available_candidate_per_source_applies() {
        let mut player = ItemSource::from_stacks([ItemStack::new("pepper", ItemQuality::Normal, 3)]);
        let mut wallet = Wallet::default();
        let mut sources = SeasoningRegistry::default();
        sources.register(static_source(
            "spices",
            vec![
                AugmentationCandidate::new(vec![IngredientRequirement::item("salt", 1)], ItemQuality::Gold)
                    .with_message("Salted"),
                AugmentationCandidate::new(vec![IngredientRequirement::item("pepper", 1)], ItemQuality::Silver)
                    .with_message("Peppered"),
                AugmentationCandidate::new(vec![IngredientRequirement::item("pepper", 1)], ItemQuality::Gold)
                    .with_message("Double peppered"),
            ],
        ));

        let mut stores = StoresMut::new(&mut player, &mut wallet);
        let outcome = try_augment(
            soup(),
            1,
            &mut stores,
            &registry(),
            ConsumePolicy::default(),
            &sources,
            None,
        );
        assert_eq!(outcome.item.quality, ItemQuality::Silver);
        assert_eq!(outcome.message.as_deref(), Some("Peppered"));
        assert_eq!(player.count("pepper"), 2, "only one candidate is consumed");
    }

    #[test]
    fn test_last_applied_message_wins() {
        let mut player = ItemSource::from_stacks([
            ItemStack::new("salt", ItemQuality::Normal, 1),
            ItemStack::new("pepper", ItemQuality::Normal, 1),
        ]);
        let mut wallet = Wallet::default();
        let mut sources = SeasoningRegistry::default();
        sources.register(static_source(
            "salt_mod",
            vec![AugmentationCandidate::new(vec![IngredientRequirement::item("salt", 1)], ItemQuality::Gold)
                .with_message("Salted")],
        ));
        sources.register(static_source(
            "pepper_mod",
            vec![AugmentationCandidate::new(vec![IngredientRequirement::item("pepper", 1)], ItemQuality::Silver)
                .with_message("Peppered")],
        ));

        let mut stores = StoresMut::new(&mut player, &mut wallet);
        let outcome = try_augment(
            soup(),
            1,
            &mut stores,
            &registry(),
            ConsumePolicy::default(),
            &sources,
            None,
        );
        assert_eq!(outcome.message.as_deref(), Some("Peppered"));
        assert_eq!(outcome.item.quality, ItemQuality::Gold, "quality never drops");
        assert_eq!(player.count("salt") + player.count("pepper"), 0);
    }

    #[test]
    fn test_exclusive_bonus_applies_to_unseasoned_item() {
        let mut player =
            ItemSource::from_stacks([ItemStack::new("qi_seasoning", ItemQuality::Normal, 2)]);
        let mut wallet = Wallet::default();
        let mut stores = StoresMut::new(&mut player, &mut wallet);
        let outcome = try_augment(
            soup(),
            1,
            &mut stores,
            &registry(),
            ConsumePolicy::default(),
            &SeasoningRegistry::default(),
            Some(&qi_bonus()),
        );
        assert_eq!(outcome.item.quality, ItemQuality::Iridium);
        assert_eq!(outcome.message.as_deref(), Some("Qi seasoned!"));
        assert_eq!(player.count("qi_seasoning"), 1);
    }

    #[test]
    fn test_exclusive_bonus_skipped_after_other_seasoning() {
        let mut player = ItemSource::from_stacks([
            ItemStack::new("salt", ItemQuality::Normal, 1),
            ItemStack::new("qi_seasoning", ItemQuality::Normal, 1),
        ]);
        let mut wallet = Wallet::default();
        let mut sources = SeasoningRegistry::default();
        sources.register(static_source(
            "salt_mod",
            vec![AugmentationCandidate::new(vec![IngredientRequirement::item("salt", 1)], ItemQuality::Silver)
                .with_message("Salted")],
        ));

        let mut stores = StoresMut::new(&mut player, &mut wallet);
        let outcome = try_augment(
            soup(),
            1,
            &mut stores,
            &registry(),
            ConsumePolicy::default(),
            &sources,
            Some(&qi_bonus()),
        );
        assert_eq!(outcome.item.quality, ItemQuality::Silver);
        assert_eq!(outcome.message.as_deref(), Some("Salted"));
        assert_eq!(player.count("qi_seasoning"), 1, "bonus must not be spent");
    }

    #[test]
    fn test_source_flagged_exclusive_is_deferred() {
        let mut player = ItemSource::from_stacks([
            ItemStack::new("salt", ItemQuality::Normal, 1),
            ItemStack::new("qi_seasoning", ItemQuality::Normal, 1),
        ]);
        let mut wallet = Wallet::default();
        let mut sources = SeasoningRegistry::default();
        // Registered first, but exclusive: it waits until the salt source has run.
        sources.register(static_source("qi_mod", vec![qi_bonus()]));
        sources.register(static_source(
            "salt_mod",
            vec![AugmentationCandidate::new(vec![IngredientRequirement::item("salt", 1)], ItemQuality::Silver)],
        ));

        let mut stores = StoresMut::new(&mut player, &mut wallet);
        let outcome = try_augment(
            soup(),
            1,
            &mut stores,
            &registry(),
            ConsumePolicy::default(),
            &sources,
            None,
        );
        assert_eq!(outcome.item.quality, ItemQuality::Silver);
        assert_eq!(outcome.message, None);
        assert_eq!(player.count("qi_seasoning"), 1);
    }

    #[test]
    fn test_candidate_scaled_by_crafts() {
        let mut player = ItemSource::from_stacks([ItemStack::new("salt", ItemQuality::Normal, 3)]);
        let mut wallet = Wallet::default();
        let mut sources = SeasoningRegistry::default();
        sources.register(static_source(
            "salt_mod",
            vec![AugmentationCandidate::new(vec![IngredientRequirement::item("salt", 1)], ItemQuality::Gold)],
        ));

        let mut stores = StoresMut::new(&mut player, &mut wallet);
        let outcome = try_augment(
            ItemStack::new("soup", ItemQuality::Normal, 4),
            4,
            &mut stores,
            &registry(),
            ConsumePolicy::default(),
            &sources,
            None,
        );
        assert_eq!(outcome.item.quality, ItemQuality::Normal, "3 salt can't season 4 crafts");
        assert_eq!(player.count("salt"), 3);
    }

    #[test]
    fn test_outputs_filter() {
        let source = StaticSeasoning {
            name: "soups_only".into(),
            outputs: Some(vec!["soup".into()]),
            candidates: vec![qi_bonus()],
        };
        assert_eq!(source.candidates(&soup()).len(), 1);
        assert!(source
            .candidates(&ItemStack::new("fence", ItemQuality::Normal, 1))
            .is_empty());
    }

    #[test]
    fn test_seasoning_craft_limit_takes_best_candidate() {
        let player = ItemSource::from_stacks([
            ItemStack::new("salt", ItemQuality::Normal, 6),
            ItemStack::new("qi_seasoning", ItemQuality::Normal, 1),
        ]);
        let wallet = Wallet::default();
        let stores = Stores::new(&player, &wallet);
        let mut sources = SeasoningRegistry::default();
        sources.register(static_source(
            "salt_mod",
            vec![AugmentationCandidate::new(vec![IngredientRequirement::item("salt", 2)], ItemQuality::Gold)],
        ));

        let limit = seasoning_craft_limit(
            &soup(),
            &stores,
            &registry(),
            ItemQuality::HIGHEST,
            &sources,
            Some(&qi_bonus()),
        );
        assert_eq!(limit, 3);

        let none = seasoning_craft_limit(
            &soup(),
            &stores,
            &registry(),
            ItemQuality::HIGHEST,
            &SeasoningRegistry::default(),
            None,
        );
        assert_eq!(none, 0);
    }

    #[test]
    fn test_reachable_qualities() {
        assert_eq!(
            reachable_qualities(&soup(), &SeasoningRegistry::default(), None),
            vec![ItemQuality::Normal]
        );

        let mut sources = SeasoningRegistry::default();
        sources.register(static_source(
            "salt_mod",
            vec![AugmentationCandidate::new(vec![IngredientRequirement::item("salt", 1)], ItemQuality::Silver)],
        ));
        assert_eq!(
            reachable_qualities(&soup(), &sources, Some(&qi_bonus())),
            vec![ItemQuality::Normal, ItemQuality::Silver, ItemQuality::HIGHEST]
        );
    }
}
