use bevy::prelude::*;
use bevy::tasks::{block_on, futures_lite::future};

use super::availability::{requirement_status, RequirementStatus};
use super::bulk::{compute_limit, crafts_for, normalize_quantity};
use super::config::{CraftingConfig, SeasoningMode};
use super::consumption::{commit, verify, ConsumptionPlan};
use super::locks::{LockAcquisition, LockSet};
use super::seasoning::{
    reachable_qualities, seasoning_craft_limit, try_augment, AugmentOutcome, SeasoningRegistry,
};
use super::stores::{Stores, StoresMut};
use super::CraftingError;
use crate::shared::*;

// ──────────────────────────────────────────────────────────────────────────────
// CRAFTING UI STATE
// ──────────────────────────────────────────────────────────────────────────────

/// Resource tracking the state of the crafting UI while in GameState::Crafting.
#[derive(Resource, Debug, Clone, Default)]
pub struct CraftingUiState {
    /// Recipes shown to the player (matching mode, producible).
    pub available_recipes: Vec<String>,
    /// Index of currently highlighted recipe.
    pub selected_index: usize,
    /// True if the crafting UI was opened from a cooking surface (kitchen).
    pub is_cooking_mode: bool,
    /// Item count the player typed or dialled in.
    pub requested_quantity: u32,
    /// Most items the selected recipe can make right now.
    pub crafting_limit: u32,
    /// `requested_quantity` snapped to whole crafts within the limit. 0 = cannot craft.
    pub normalized_quantity: u32,
    /// Per-ingredient availability for the selected recipe.
    pub requirements: Vec<RequirementStatus>,
    /// Notification message shown after crafting (e.g. "Crafted Torch x3").
    pub feedback_message: Option<String>,
    /// Timer to clear feedback message.
    pub feedback_timer: f32,
}

impl CraftingUiState {
    pub fn selected_recipe_id(&self) -> Option<&str> {
        self.available_recipes
            .get(self.selected_index)
            .map(String::as_str)
    }

    pub fn move_selection_up(&mut self) {
        if !self.available_recipes.is_empty() {
            if self.selected_index == 0 {
                self.selected_index = self.available_recipes.len() - 1;
            } else {
                self.selected_index -= 1;
            }
        }
    }

    pub fn move_selection_down(&mut self) {
        if !self.available_recipes.is_empty() {
            self.selected_index = (self.selected_index + 1) % self.available_recipes.len();
        }
    }

    pub fn set_requested_quantity(&mut self, quantity: u32) {
        self.requested_quantity = quantity;
    }

    pub fn set_feedback(&mut self, msg: impl Into<String>) {
        self.feedback_message = Some(msg.into());
        self.feedback_timer = 3.0; // seconds
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// EVENTS
// ──────────────────────────────────────────────────────────────────────────────

/// Send to open the crafting bench (transitions to GameState::Crafting).
#[derive(Event, Debug, Clone)]
pub struct OpenCraftingEvent {
    /// True = opened from kitchen (cooking mode), False = crafting bench.
    pub cooking_mode: bool,
}

/// Send to close the crafting UI and return to Playing. Drops any pending craft.
#[derive(Event, Debug, Clone)]
pub struct CloseCraftingEvent;

/// Request a bulk craft. `quantity` is an item count; it is normalised to
/// whole crafts within the current limit before anything is checked.
#[derive(Event, Debug, Clone)]
pub struct CraftRequestEvent {
    pub recipe_id: String,
    pub quantity: u32,
}

/// Abandon the craft waiting on container locks. Nothing has been consumed yet.
#[derive(Event, Debug, Clone)]
pub struct CancelCraftEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraftSuccess {
    /// What landed in the player's stores, after seasoning.
    pub item: ItemStack,
    pub crafts: u32,
    /// Message from the last seasoning applied, if any.
    pub message: Option<String>,
}

/// Sent once per request, whether it succeeded or not.
#[derive(Event, Debug, Clone)]
pub struct CraftOutcomeEvent {
    pub recipe_id: String,
    pub result: Result<CraftSuccess, CraftingError>,
}

// ──────────────────────────────────────────────────────────────────────────────
// PENDING CRAFT
// ──────────────────────────────────────────────────────────────────────────────

/// A verified craft waiting for shared containers to grant their locks.
#[derive(Debug)]
pub struct InFlightCraft {
    pub recipe_id: String,
    pub quantity: u32,
    pub crafts: u32,
    pub acquisition: LockAcquisition,
    pub timer: Timer,
}

/// At most one craft waits on locks at a time.
#[derive(Resource, Debug, Default)]
pub struct PendingCraft {
    pub craft: Option<InFlightCraft>,
}

impl PendingCraft {
    pub fn is_busy(&self) -> bool {
        self.craft.is_some()
    }
}

/// Where a craft request ended up this frame.
#[derive(Debug)]
pub enum CraftStart {
    Done(CraftSuccess),
    Waiting(InFlightCraft),
}

// ──────────────────────────────────────────────────────────────────────────────
// CRAFT FLOW
// ──────────────────────────────────────────────────────────────────────────────

/// The bulk limit for `recipe`, with mandatory seasoning folded in.
pub fn craft_limit(
    recipe: &CraftingRecipe,
    stores: &Stores,
    items: &ItemRegistry,
    config: &CraftingConfig,
    seasoning: &SeasoningRegistry,
) -> u32 {
    let seasoning_crafts = (config.seasoning == SeasoningMode::Required).then(|| {
        let sample = ItemStack::new(recipe.output.clone(), ItemQuality::Normal, recipe.yield_per_craft);
        seasoning_craft_limit(
            &sample,
            stores,
            items,
            config.quality_ceiling,
            seasoning,
            config.bonus_candidate(recipe).as_ref(),
        )
    });
    compute_limit(
        recipe,
        stores,
        items,
        config.policy(),
        seasoning_crafts,
        config.session_cap,
    )
}

/// Explains a zero limit with the most specific error available.
fn nothing_craftable(
    recipe: &CraftingRecipe,
    stores: &Stores,
    items: &ItemRegistry,
    config: &CraftingConfig,
) -> CraftingError {
    if let Err(e) = verify(&recipe.ingredients, 1, stores, items, config.policy()) {
        return e;
    }
    if config.seasoning == SeasoningMode::Required {
        return CraftingError::SeasoningUnavailable;
    }
    CraftingError::Config(format!(
        "session cap {} is below the yield of '{}'",
        config.session_cap, recipe.id
    ))
}

/// Room for `quantity` of the output at every quality seasoning could leave it at.
fn ensure_room(
    recipe: &CraftingRecipe,
    quantity: u32,
    stores: &Stores,
    items: &ItemRegistry,
    config: &CraftingConfig,
    seasoning: &SeasoningRegistry,
) -> Result<(), CraftingError> {
    let base = ItemStack::new(recipe.output.clone(), ItemQuality::Normal, quantity);
    let qualities = match config.seasoning {
        SeasoningMode::Disabled => vec![ItemQuality::Normal],
        SeasoningMode::Optional | SeasoningMode::Required => {
            reachable_qualities(&base, seasoning, config.bonus_candidate(recipe).as_ref())
        }
    };
    let max_stack = items.stack_size(&recipe.output);
    let fits = qualities.into_iter().all(|quality| {
        let room = stores
            .iter()
            .filter(|(id, source)| id.is_player() || source.can_insert)
            .map(|(_, source)| source.room_for(&recipe.output, quality, max_stack))
            .fold(0u32, u32::saturating_add);
        room >= quantity
    });
    if fits {
        Ok(())
    } else {
        Err(CraftingError::InventoryFull {
            item_id: recipe.output.clone(),
            quantity,
        })
    }
}

/// Normalise the request, run phase one, and either finish immediately or
/// hand back the lock acquisition to be polled on later frames.
pub fn begin_craft(
    recipe: &CraftingRecipe,
    requested: u32,
    stores: &mut StoresMut,
    items: &ItemRegistry,
    config: &CraftingConfig,
    seasoning: &SeasoningRegistry,
) -> Result<CraftStart, CraftingError> {
    recipe.validate()?;
    if !recipe.can_produce() {
        return Err(CraftingError::RecipeLocked(recipe.id.clone()));
    }

    let view = stores.view();
    let limit = craft_limit(recipe, &view, items, config, seasoning);
    let quantity = normalize_quantity(requested, recipe.yield_per_craft, limit);
    if quantity == 0 {
        return Err(nothing_craftable(recipe, &view, items, config));
    }
    let crafts = crafts_for(quantity, recipe.yield_per_craft);
    ensure_room(recipe, quantity, &view, items, config, seasoning)?;
    let plan = verify(&recipe.ingredients, crafts, &view, items, config.policy())?;

    if !plan.needs_locks() {
        let success = complete_craft(recipe, plan, LockSet::none(), stores, items, config, seasoning)?;
        return Ok(CraftStart::Done(success));
    }

    let mut acquisition = plan.acquire_locks();
    match block_on(future::poll_once(&mut acquisition)) {
        Some(Ok(locks)) => {
            let success = complete_craft(recipe, plan, locks, stores, items, config, seasoning)?;
            Ok(CraftStart::Done(success))
        }
        Some(Err(e)) => Err(e),
        None => {
            info!(
                "Craft of {} x{} waiting on container locks: {:?}",
                recipe.id,
                quantity,
                acquisition.waiting_on().collect::<Vec<_>>()
            );
            Ok(CraftStart::Waiting(InFlightCraft {
                recipe_id: recipe.id.clone(),
                quantity,
                crafts,
                acquisition,
                timer: Timer::new(config.lock_timeout(), TimerMode::Once),
            }))
        }
    }
}

/// Phase one again, now that the locks are held. The stores may have moved on
/// while the craft was waiting.
pub fn resume_craft(
    recipe: &CraftingRecipe,
    crafts: u32,
    locks: LockSet,
    stores: &mut StoresMut,
    items: &ItemRegistry,
    config: &CraftingConfig,
    seasoning: &SeasoningRegistry,
) -> Result<CraftSuccess, CraftingError> {
    let view = stores.view();
    let quantity = recipe.yield_per_craft.saturating_mul(crafts);
    ensure_room(recipe, quantity, &view, items, config, seasoning)?;
    let plan = verify(&recipe.ingredients, crafts, &view, items, config.policy())?;
    complete_craft(recipe, plan, locks, stores, items, config, seasoning)
}

/// Phase two, then production, seasoning and placement.
fn complete_craft(
    recipe: &CraftingRecipe,
    plan: ConsumptionPlan,
    locks: LockSet,
    stores: &mut StoresMut,
    items: &ItemRegistry,
    config: &CraftingConfig,
    seasoning: &SeasoningRegistry,
) -> Result<CraftSuccess, CraftingError> {
    if let Some(container) = plan.shared_sources().find(|id| !locks.holds(*id)) {
        return Err(CraftingError::LockUnavailable { container });
    }
    let receipt = commit(plan, stores, &locks)?;
    // Seasoning takes its own locks.
    drop(locks);

    let quantity = recipe.yield_per_craft.saturating_mul(receipt.crafts);
    let base = ItemStack::new(recipe.output.clone(), ItemQuality::Normal, quantity);
    let outcome = match config.seasoning {
        SeasoningMode::Disabled => AugmentOutcome {
            item: base,
            applied: None,
            message: None,
        },
        SeasoningMode::Optional | SeasoningMode::Required => try_augment(
            base,
            receipt.crafts,
            stores,
            items,
            config.policy(),
            seasoning,
            config.bonus_candidate(recipe).as_ref(),
        ),
    };
    if config.seasoning == SeasoningMode::Required && outcome.applied.is_none() {
        warn!("Required seasoning for '{}' was no longer available", recipe.id);
    }

    let leftover = stores.place(&outcome.item, items.stack_size(&recipe.output));
    if leftover > 0 {
        error!(
            "{} x{} produced by '{}' could not be placed",
            outcome.item.item_id, leftover, recipe.id
        );
    }

    info!(
        "Crafted {} x{} ({:?}) in {} craft(s)",
        outcome.item.item_id, outcome.item.count, outcome.item.quality, receipt.crafts
    );
    Ok(CraftSuccess {
        item: ItemStack {
            count: outcome.item.count - leftover,
            ..outcome.item
        },
        crafts: receipt.crafts,
        message: outcome.message,
    })
}

// ──────────────────────────────────────────────────────────────────────────────
// HELPER FUNCTIONS
// ──────────────────────────────────────────────────────────────────────────────

/// Chests in a stable order so `SourceId`s mean the same thing across frames.
fn chest_sources<'a>(chests: &'a Query<(Entity, &StorageChest)>) -> Vec<&'a ItemSource> {
    let mut found: Vec<_> = chests.iter().collect();
    found.sort_by_key(|(entity, _)| *entity);
    found.into_iter().map(|(_, chest)| &chest.source).collect()
}

/// Same order as `chest_sources`. Change detection is left to `mark_touched`.
fn chests_mut<'a>(
    chests: &'a mut Query<(Entity, &mut StorageChest)>,
) -> Vec<Mut<'a, StorageChest>> {
    let mut found: Vec<_> = chests.iter_mut().collect();
    found.sort_by_key(|(entity, _)| *entity);
    found.into_iter().map(|(_, chest)| chest).collect()
}

fn chest_sources_mut<'a>(chests: &'a mut [Mut<'_, StorageChest>]) -> Vec<&'a mut ItemSource> {
    chests
        .iter_mut()
        .map(|chest| &mut chest.bypass_change_detection().source)
        .collect()
}

/// Flag only the chests a craft actually wrote to.
fn mark_touched(chests: &mut [Mut<'_, StorageChest>], touched: &[SourceId]) {
    for index in touched.iter().filter_map(|id| id.external_index()) {
        if let Some(chest) = chests.get_mut(index) {
            chest.set_changed();
        }
    }
}

fn report(
    recipe_id: &str,
    result: Result<CraftSuccess, CraftingError>,
    items: &ItemRegistry,
    ui_state: &mut CraftingUiState,
    outcomes: &mut EventWriter<CraftOutcomeEvent>,
    pickups: &mut EventWriter<ItemPickupEvent>,
    toasts: &mut EventWriter<ToastEvent>,
) {
    match &result {
        Ok(success) => {
            let name = items
                .get(&success.item.item_id)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| success.item.item_id.clone());
            let mut feedback = if success.item.count > 1 {
                format!("Crafted {} x{}", name, success.item.count)
            } else {
                format!("Crafted {}", name)
            };
            if let Some(message) = &success.message {
                feedback = format!("{} {}", feedback, message);
            }
            pickups.send(ItemPickupEvent {
                item_id: success.item.item_id.clone(),
                quality: success.item.quality,
                quantity: success.item.count,
            });
            toasts.send(ToastEvent {
                message: feedback.clone(),
                duration_secs: 2.5,
            });
            ui_state.set_feedback(feedback);
        }
        Err(e) => {
            warn!("Craft of '{}' failed: {}", recipe_id, e);
            ui_state.set_feedback(e.to_string());
        }
    }
    outcomes.send(CraftOutcomeEvent {
        recipe_id: recipe_id.to_string(),
        result,
    });
}

// ──────────────────────────────────────────────────────────────────────────────
// SYSTEMS
// ──────────────────────────────────────────────────────────────────────────────

/// Runs in Playing. Listens for OpenCraftingEvent and transitions to Crafting state.
pub fn handle_open_crafting(
    mut events: EventReader<OpenCraftingEvent>,
    mut next_state: ResMut<NextState<GameState>>,
    mut ui_state: ResMut<CraftingUiState>,
    recipe_registry: Res<RecipeRegistry>,
) {
    for event in events.read() {
        let cooking_mode = event.cooking_mode;

        let mut available: Vec<String> = recipe_registry
            .recipes
            .values()
            .filter(|r| r.is_cooking == cooking_mode && r.can_produce())
            .map(|r| r.id.clone())
            .collect();

        // Sort alphabetically for a consistent UI order
        available.sort();

        *ui_state = CraftingUiState {
            available_recipes: available,
            is_cooking_mode: cooking_mode,
            requested_quantity: 1,
            ..Default::default()
        };

        info!(
            "Opening {} UI with {} recipes",
            if cooking_mode { "cooking" } else { "crafting" },
            ui_state.available_recipes.len()
        );

        next_state.set(GameState::Crafting);
    }
}

/// Runs in Crafting. Listens for CloseCraftingEvent and returns to Playing.
pub fn handle_close_crafting(
    mut events: EventReader<CloseCraftingEvent>,
    mut next_state: ResMut<NextState<GameState>>,
    mut pending: ResMut<PendingCraft>,
) {
    if events.read().next().is_some() {
        if let Some(craft) = pending.craft.take() {
            info!("Abandoning pending craft of '{}'", craft.recipe_id);
        }
        info!("Closing crafting UI");
        next_state.set(GameState::Playing);
    }
}

/// Recompute limit, normalised quantity and ingredient status for the
/// selected recipe. Read-only with respect to the stores.
pub fn refresh_crafting_limits(
    mut ui_state: ResMut<CraftingUiState>,
    inventory: Res<Inventory>,
    wallet: Res<Wallet>,
    chests: Query<(Entity, &StorageChest)>,
    recipe_registry: Res<RecipeRegistry>,
    item_registry: Res<ItemRegistry>,
    config: Res<CraftingConfig>,
    seasoning: Res<SeasoningRegistry>,
) {
    let Some(recipe) = ui_state
        .selected_recipe_id()
        .and_then(|id| recipe_registry.get(id))
    else {
        if ui_state.crafting_limit != 0 || !ui_state.requirements.is_empty() {
            ui_state.crafting_limit = 0;
            ui_state.normalized_quantity = 0;
            ui_state.requirements.clear();
        }
        return;
    };

    let stores = Stores::new(&inventory.source, &wallet).with_external(chest_sources(&chests));
    let limit = craft_limit(recipe, &stores, &item_registry, &config, &seasoning);
    let normalized = normalize_quantity(ui_state.requested_quantity, recipe.yield_per_craft, limit);
    let crafts = crafts_for(normalized, recipe.yield_per_craft);
    let requirements = requirement_status(
        recipe,
        &stores,
        &item_registry,
        config.quality_ceiling,
        crafts,
    );

    let ui = ui_state.bypass_change_detection();
    let changed = ui.crafting_limit != limit
        || ui.normalized_quantity != normalized
        || ui.requirements != requirements;
    if changed {
        ui.crafting_limit = limit;
        ui.normalized_quantity = normalized;
        ui.requirements = requirements;
        ui_state.set_changed();
    }
}

/// Runs in Crafting. Turns CraftRequestEvents into finished or pending crafts.
pub fn handle_craft_request(
    mut events: EventReader<CraftRequestEvent>,
    mut ui_state: ResMut<CraftingUiState>,
    mut pending: ResMut<PendingCraft>,
    mut inventory: ResMut<Inventory>,
    mut wallet: ResMut<Wallet>,
    mut chests: Query<(Entity, &mut StorageChest)>,
    recipe_registry: Res<RecipeRegistry>,
    item_registry: Res<ItemRegistry>,
    config: Res<CraftingConfig>,
    seasoning: Res<SeasoningRegistry>,
    mut outcomes: EventWriter<CraftOutcomeEvent>,
    mut pickups: EventWriter<ItemPickupEvent>,
    mut toasts: EventWriter<ToastEvent>,
) {
    for event in events.read() {
        let result = if pending.is_busy() {
            Err(CraftingError::CraftInProgress)
        } else if let Some(recipe) = recipe_registry.get(&event.recipe_id) {
            let mut chests = chests_mut(&mut chests);
            let mut stores = StoresMut::new(&mut inventory.source, &mut wallet)
                .with_external(chest_sources_mut(&mut chests));
            let result = begin_craft(
                recipe,
                event.quantity,
                &mut stores,
                &item_registry,
                &config,
                &seasoning,
            );
            let touched = stores.touched().to_vec();
            drop(stores);
            mark_touched(&mut chests, &touched);
            result
        } else {
            Err(CraftingError::UnknownRecipe(event.recipe_id.clone()))
        };

        let result = match result {
            Ok(CraftStart::Waiting(craft)) => {
                ui_state.set_feedback("Waiting for shared storage…");
                pending.craft = Some(craft);
                continue;
            }
            Ok(CraftStart::Done(success)) => Ok(success),
            Err(e) => Err(e),
        };
        report(
            &event.recipe_id,
            result,
            &item_registry,
            &mut ui_state,
            &mut outcomes,
            &mut pickups,
            &mut toasts,
        );
    }
}

/// Polls the pending craft's locks once per frame. Grants resume the craft,
/// refusals and timeouts drop it (and with it every lock already granted).
pub fn poll_pending_craft(
    time: Res<Time>,
    mut pending: ResMut<PendingCraft>,
    mut ui_state: ResMut<CraftingUiState>,
    mut inventory: ResMut<Inventory>,
    mut wallet: ResMut<Wallet>,
    mut chests: Query<(Entity, &mut StorageChest)>,
    recipe_registry: Res<RecipeRegistry>,
    item_registry: Res<ItemRegistry>,
    config: Res<CraftingConfig>,
    seasoning: Res<SeasoningRegistry>,
    mut outcomes: EventWriter<CraftOutcomeEvent>,
    mut pickups: EventWriter<ItemPickupEvent>,
    mut toasts: EventWriter<ToastEvent>,
) {
    let Some(craft) = pending.craft.as_mut() else {
        return;
    };
    craft.timer.tick(time.delta());
    let polled = block_on(future::poll_once(&mut craft.acquisition));
    if polled.is_none() && !craft.timer.finished() {
        return;
    }
    let Some(craft) = pending.craft.take() else {
        return;
    };

    let result = match polled {
        None => {
            warn!(
                "Craft of '{}' timed out waiting on {:?}",
                craft.recipe_id,
                craft.acquisition.waiting_on().collect::<Vec<_>>()
            );
            Err(CraftingError::LockTimedOut)
        }
        Some(Err(e)) => Err(e),
        Some(Ok(locks)) => match recipe_registry.get(&craft.recipe_id) {
            Some(recipe) => {
                let mut chests = chests_mut(&mut chests);
                let mut stores = StoresMut::new(&mut inventory.source, &mut wallet)
                    .with_external(chest_sources_mut(&mut chests));
                let result = resume_craft(
                    recipe,
                    craft.crafts,
                    locks,
                    &mut stores,
                    &item_registry,
                    &config,
                    &seasoning,
                );
                let touched = stores.touched().to_vec();
                drop(stores);
                mark_touched(&mut chests, &touched);
                result
            }
            None => Err(CraftingError::UnknownRecipe(craft.recipe_id.clone())),
        },
    };
    report(
        &craft.recipe_id,
        result,
        &item_registry,
        &mut ui_state,
        &mut outcomes,
        &mut pickups,
        &mut toasts,
    );
}

/// Drops the pending craft. Phase two never ran, so nothing is undone.
pub fn handle_cancel_craft(
    mut events: EventReader<CancelCraftEvent>,
    mut pending: ResMut<PendingCraft>,
    mut ui_state: ResMut<CraftingUiState>,
) {
    if events.read().next().is_none() {
        return;
    }
    if let Some(craft) = pending.craft.take() {
        info!("Cancelled craft of '{}' x{}", craft.recipe_id, craft.quantity);
        ui_state.set_feedback("Craft cancelled");
    }
}

/// Clears the feedback line once its timer runs out.
pub fn tick_crafting_feedback(time: Res<Time>, mut ui_state: ResMut<CraftingUiState>) {
    if ui_state.feedback_message.is_none() {
        return;
    }
    ui_state.feedback_timer -= time.delta_secs();
    if ui_state.feedback_timer <= 0.0 {
        ui_state.feedback_message = None;
        ui_state.feedback_timer = 0.0;
    }
}
