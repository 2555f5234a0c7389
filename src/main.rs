use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use std::time::Duration;

use hearthcraft::crafting::{
    CraftOutcomeEvent, CraftRequestEvent, CraftingConfig, CraftingPlugin, OpenCraftingEvent,
};
use hearthcraft::data::DataPlugin;
use hearthcraft::shared::*;

/// Headless demo: loads an optional `crafting.ron`, stocks a starter kit,
/// crafts a batch of torches and exits with the outcome logged.
fn main() {
    let mut app = App::new();
    app.add_plugins(
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(1.0 / 60.0))),
    )
    .add_plugins((LogPlugin::default(), StatesPlugin))
    .init_state::<GameState>();

    if let Some(path) = std::env::args().nth(1) {
        match CraftingConfig::load(&path) {
            Ok(config) => {
                app.insert_resource(config);
            }
            Err(e) => {
                error!("{}", e);
                return;
            }
        }
    }

    app.add_plugins((DataPlugin, CraftingPlugin))
        .add_systems(OnEnter(GameState::Playing), stock_starter_kit)
        .add_systems(OnEnter(GameState::Crafting), request_torches)
        .add_systems(Update, exit_on_outcome)
        .run();
}

fn stock_starter_kit(
    mut inventory: ResMut<Inventory>,
    mut wallet: ResMut<Wallet>,
    items: Res<ItemRegistry>,
    mut open: EventWriter<OpenCraftingEvent>,
) {
    for (id, count) in [("wood", 20), ("sap", 9), ("salt", 1)] {
        let stack = ItemStack::new(id, ItemQuality::Normal, count);
        inventory.source.try_add(&stack, items.stack_size(id));
    }
    wallet.set(CurrencyKind::Gold, 500);
    open.send(OpenCraftingEvent { cooking_mode: false });
}

fn request_torches(mut requests: EventWriter<CraftRequestEvent>) {
    requests.send(CraftRequestEvent {
        recipe_id: "torch".to_string(),
        quantity: 10,
    });
}

fn exit_on_outcome(mut outcomes: EventReader<CraftOutcomeEvent>, mut exit: EventWriter<AppExit>) {
    for outcome in outcomes.read() {
        match &outcome.result {
            Ok(success) => info!(
                "{}: {} x{} ({:?})",
                outcome.recipe_id, success.item.item_id, success.item.count, success.item.quality
            ),
            Err(e) => warn!("{}: {}", outcome.recipe_id, e),
        }
        exit.send(AppExit::Success);
    }
}
