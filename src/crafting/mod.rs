use bevy::prelude::*;
use crate::shared::*;

pub mod availability;
pub mod bench;
pub mod bulk;
pub mod config;
pub mod consumption;
mod error;
pub mod locks;
mod recipes;
pub mod seasoning;
pub mod stores;

pub use availability::{get_available, requirement_status, Availability, MatchedStack, RequirementStatus};
pub use bench::{
    begin_craft, craft_limit, resume_craft, CancelCraftEvent, CloseCraftingEvent, CraftOutcomeEvent,
    CraftRequestEvent, CraftStart, CraftSuccess, CraftingUiState, InFlightCraft, OpenCraftingEvent,
    PendingCraft,
};
pub use bulk::{compute_limit, crafts_for, normalize_quantity};
pub use config::{CraftingConfig, SeasoningMode};
pub use consumption::{commit, consume, verify, ConsumePolicy, ConsumeReceipt, ConsumptionPlan};
pub use error::{CraftingError, Deficiency};
pub use locks::{ContainerLock, LocalContainerLock, LockAcquisition, LockHandle, LockSet};
pub use recipes::{
    make_crafting_recipe, make_cooking_recipe, populate_recipe_registry,
    ALL_CRAFTING_RECIPE_IDS, ALL_COOKING_RECIPE_IDS,
};
pub use seasoning::{
    seasoning_craft_limit, try_augment, AugmentOutcome, AugmentationCandidate, SeasoningRegistry,
    SeasoningSource, StaticSeasoning,
};
pub use stores::{Stores, StoresMut};

pub struct CraftingPlugin;

impl Plugin for CraftingPlugin {
    fn build(&self, app: &mut App) {
        app
            // Stores the crafting engine reads and writes
            .init_resource::<Inventory>()
            .init_resource::<Wallet>()
            .init_resource::<ItemRegistry>()
            .init_resource::<RecipeRegistry>()
            // Crafting-specific resources
            .init_resource::<CraftingConfig>()
            .init_resource::<CraftingUiState>()
            .init_resource::<PendingCraft>()
            .init_resource::<SeasoningRegistry>()
            // Crafting-specific events
            .add_event::<OpenCraftingEvent>()
            .add_event::<CloseCraftingEvent>()
            .add_event::<CraftRequestEvent>()
            .add_event::<CancelCraftEvent>()
            .add_event::<CraftOutcomeEvent>()
            .add_event::<ItemPickupEvent>()
            .add_event::<ToastEvent>()
            // Playing state systems
            .add_systems(
                Update,
                bench::handle_open_crafting.run_if(in_state(GameState::Playing)),
            )
            // Crafting state systems
            .add_systems(
                Update,
                (
                    // Lock answers first, so a grant is committed before new requests queue behind it
                    bench::poll_pending_craft,
                    bench::handle_cancel_craft,
                    bench::handle_craft_request,
                    bench::refresh_crafting_limits,
                    bench::tick_crafting_feedback,
                    // Close last: it drops whatever is still pending
                    bench::handle_close_crafting,
                )
                    .chain()
                    .run_if(in_state(GameState::Crafting)),
            );
    }
}
