//! Shared components, resources, events, and states for the crafting engine.
//!
//! This is the type contract. The crafting and data modules import from here;
//! neither imports from the other directly.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::crafting::CraftingError;
use crate::crafting::locks::LockHandle;

// ═══════════════════════════════════════════════════════════════════════
// GAME STATE: top-level state machine
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, States, Default)]
pub enum GameState {
    #[default]
    Loading,
    Playing,
    Crafting,
}

// ═══════════════════════════════════════════════════════════════════════
// ITEMS
// ═══════════════════════════════════════════════════════════════════════

/// Unique identifier for every item type in the game.
pub type ItemId = String;

/// Item quality tier. Ordered, so `quality <= ceiling` is a plain comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum ItemQuality {
    #[default]
    Normal,
    Silver,
    Gold,
    Iridium,
}

impl ItemQuality {
    pub const HIGHEST: ItemQuality = ItemQuality::Iridium;

    pub fn tier(self) -> u8 {
        match self {
            ItemQuality::Normal => 0,
            ItemQuality::Silver => 1,
            ItemQuality::Gold => 2,
            ItemQuality::Iridium => 3,
        }
    }

    pub fn from_tier(tier: u8) -> Option<Self> {
        match tier {
            0 => Some(ItemQuality::Normal),
            1 => Some(ItemQuality::Silver),
            2 => Some(ItemQuality::Gold),
            3 => Some(ItemQuality::Iridium),
            _ => None,
        }
    }
}

/// Negative sentinel code meaning "any item of category X".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryCode(pub i32);

impl fmt::Display for CategoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: ItemId,
    pub name: String,
    /// None = the item belongs to no matchable category.
    pub category: Option<CategoryCode>,
    pub stack_size: u32,
}

/// Display data for a category code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub name: String,
    /// Item whose sprite stands in for the category when it has no icon.
    pub icon_item: Option<ItemId>,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct ItemRegistry {
    pub items: HashMap<ItemId, ItemDef>,
    /// Injectable category lookup table.
    pub categories: HashMap<CategoryCode, CategoryInfo>,
}

impl ItemRegistry {
    pub fn get(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    pub fn category_of(&self, id: &str) -> Option<CategoryCode> {
        self.items.get(id).and_then(|d| d.category)
    }

    pub fn category(&self, code: CategoryCode) -> Option<&CategoryInfo> {
        self.categories.get(&code)
    }

    pub fn stack_size(&self, id: &str) -> u32 {
        self.get(id).map(|d| d.stack_size).unwrap_or(DEFAULT_STACK_SIZE)
    }

    /// Name shown for an ingredient pattern.
    pub fn pattern_name(&self, pattern: &IngredientPattern) -> String {
        match pattern {
            IngredientPattern::Item(id) => self
                .get(id)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| id.clone()),
            IngredientPattern::Category(code) => self
                .category(*code)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| format!("Category {}", code.0)),
        }
    }

    /// Item whose icon represents a pattern. Categories fall back to their icon item.
    pub fn pattern_icon(&self, pattern: &IngredientPattern) -> Option<ItemId> {
        match pattern {
            IngredientPattern::Item(id) => Some(id.clone()),
            IngredientPattern::Category(code) => self.category(*code).and_then(|c| c.icon_item.clone()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// INVENTORY SOURCES
// ═══════════════════════════════════════════════════════════════════════

/// A count of identical items at one quality tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: ItemId,
    pub quality: ItemQuality,
    pub count: u32,
}

impl ItemStack {
    pub fn new(item_id: impl Into<ItemId>, quality: ItemQuality, count: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quality,
            count,
        }
    }
}

/// Index of a source within one resolution call. 0 is always the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub usize);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SourceId {
    pub const PLAYER: SourceId = SourceId(0);

    pub fn external(index: usize) -> Self {
        SourceId(index + 1)
    }

    pub fn is_player(self) -> bool {
        self.0 == 0
    }

    /// Position in the external list, `None` for the player.
    pub fn external_index(self) -> Option<usize> {
        self.0.checked_sub(1)
    }
}

/// Back-reference from a matched stack to where it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackRef {
    pub source: SourceId,
    pub slot: usize,
}

/// An ordered, slotted collection of stacks: the player inventory or a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSource {
    pub slots: Vec<Option<ItemStack>>,
    pub can_insert: bool,
    pub can_extract: bool,
    /// Present only for containers shared between peers.
    #[serde(skip)]
    pub lock: Option<LockHandle>,
}

impl Default for ItemSource {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl ItemSource {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            can_insert: true,
            can_extract: true,
            lock: None,
        }
    }

    /// Builds a source whose slots are exactly the given stacks, in order.
    pub fn from_stacks(stacks: impl IntoIterator<Item = ItemStack>) -> Self {
        Self {
            slots: stacks.into_iter().map(Some).collect(),
            can_insert: true,
            can_extract: true,
            lock: None,
        }
    }

    pub fn shared(mut self, lock: LockHandle) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn stacks(&self) -> impl Iterator<Item = (usize, &ItemStack)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
    }

    pub fn count(&self, item_id: &str) -> u32 {
        self.stacks()
            .filter(|(_, s)| s.item_id == item_id)
            .map(|(_, s)| s.count)
            .sum()
    }

    pub fn count_at(&self, item_id: &str, quality: ItemQuality) -> u32 {
        self.stacks()
            .filter(|(_, s)| s.item_id == item_id && s.quality == quality)
            .map(|(_, s)| s.count)
            .sum()
    }

    /// How many of `item_id` at `quality` would fit.
    pub fn room_for(&self, item_id: &str, quality: ItemQuality, max_stack: u32) -> u32 {
        if !self.can_insert {
            return 0;
        }
        self.slots
            .iter()
            .map(|slot| match slot {
                None => max_stack,
                Some(s) if s.item_id == item_id && s.quality == quality => {
                    max_stack.saturating_sub(s.count)
                }
                Some(_) => 0,
            })
            .fold(0u32, |acc, n| acc.saturating_add(n))
    }

    /// Try to add a stack. Returns the quantity that couldn't fit.
    pub fn try_add(&mut self, stack: &ItemStack, max_stack: u32) -> u32 {
        if !self.can_insert {
            return stack.count;
        }
        let mut remaining = stack.count;

        // First pass: stack onto existing slots with the same item and quality
        for slot in self.slots.iter_mut() {
            if remaining == 0 {
                break;
            }
            if let Some(ref mut s) = slot {
                if s.item_id == stack.item_id && s.quality == stack.quality && s.count < max_stack {
                    let add = remaining.min(max_stack - s.count);
                    s.count += add;
                    remaining -= add;
                }
            }
        }

        // Second pass: fill empty slots
        for slot in self.slots.iter_mut() {
            if remaining == 0 {
                break;
            }
            if slot.is_none() {
                let add = remaining.min(max_stack);
                *slot = Some(ItemStack::new(stack.item_id.clone(), stack.quality, add));
                remaining -= add;
            }
        }

        remaining
    }
}

/// The player's backpack.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub source: ItemSource,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            source: ItemSource::with_capacity(TOTAL_INVENTORY_SLOTS),
        }
    }
}

/// Storage container placed in the world.
#[derive(Component, Debug, Clone)]
pub struct StorageChest {
    pub source: ItemSource,
    pub grid_pos: (i32, i32),
}

impl StorageChest {
    pub fn new(capacity: usize, x: i32, y: i32) -> Self {
        Self {
            source: ItemSource::with_capacity(capacity),
            grid_pos: (x, y),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// CURRENCIES
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyKind {
    /// Primary money.
    Gold,
    /// Festival score tokens.
    StarTokens,
    /// Earned through friendship.
    HeartTokens,
    /// Premium currency.
    Gems,
}

#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Wallet {
    pub balances: HashMap<CurrencyKind, u32>,
}

impl Wallet {
    pub fn balance(&self, kind: CurrencyKind) -> u32 {
        self.balances.get(&kind).copied().unwrap_or(0)
    }

    pub fn set(&mut self, kind: CurrencyKind, amount: u32) {
        self.balances.insert(kind, amount);
    }

    /// Deducts `amount` if the balance covers it.
    pub fn spend(&mut self, kind: CurrencyKind, amount: u32) -> bool {
        let balance = self.balances.entry(kind).or_insert(0);
        if *balance < amount {
            return false;
        }
        *balance -= amount;
        true
    }
}

// ═══════════════════════════════════════════════════════════════════════
// RECIPES
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IngredientPattern {
    Item(ItemId),
    Category(CategoryCode),
}

/// What a recipe needs per single craft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngredientRequirement {
    Item {
        pattern: IngredientPattern,
        quantity: u32,
    },
    Currency {
        kind: CurrencyKind,
        quantity: u32,
    },
}

impl IngredientRequirement {
    pub fn item(id: impl Into<ItemId>, quantity: u32) -> Self {
        IngredientRequirement::Item {
            pattern: IngredientPattern::Item(id.into()),
            quantity,
        }
    }

    pub fn category(code: i32, quantity: u32) -> Self {
        IngredientRequirement::Item {
            pattern: IngredientPattern::Category(CategoryCode(code)),
            quantity,
        }
    }

    pub fn currency(kind: CurrencyKind, quantity: u32) -> Self {
        IngredientRequirement::Currency { kind, quantity }
    }

    pub fn quantity(&self) -> u32 {
        match self {
            IngredientRequirement::Item { quantity, .. }
            | IngredientRequirement::Currency { quantity, .. } => *quantity,
        }
    }

    /// Same requirement with its quantity multiplied for `crafts` crafts.
    pub fn scaled(&self, crafts: u32) -> Self {
        let mut scaled = self.clone();
        match &mut scaled {
            IngredientRequirement::Item { quantity, .. }
            | IngredientRequirement::Currency { quantity, .. } => {
                *quantity = quantity.saturating_mul(crafts);
            }
        }
        scaled
    }
}

/// Opaque "can this recipe be produced right now" predicate.
#[derive(Clone)]
pub struct CanProduce(Arc<dyn Fn() -> bool + Send + Sync>);

impl CanProduce {
    pub fn new(f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn always() -> Self {
        Self::new(|| true)
    }
}

impl fmt::Debug for CanProduce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CanProduce(..)")
    }
}

#[derive(Debug, Clone)]
pub struct CraftingRecipe {
    pub id: String,
    pub name: String,
    pub ingredients: Vec<IngredientRequirement>,
    pub output: ItemId,
    pub yield_per_craft: u32,
    pub is_cooking: bool,
    pub can_produce: CanProduce,
}

impl CraftingRecipe {
    pub fn can_produce(&self) -> bool {
        (self.can_produce.0)()
    }

    /// Boundary check run before a recipe enters the resolver.
    pub fn validate(&self) -> Result<(), CraftingError> {
        let reason = if self.ingredients.is_empty() {
            Some("no ingredients".to_string())
        } else if self.yield_per_craft == 0 {
            Some("yield is zero".to_string())
        } else {
            self.ingredients
                .iter()
                .position(|r| r.quantity() == 0)
                .map(|i| format!("ingredient {} has zero quantity", i))
        };

        match reason {
            Some(reason) => Err(CraftingError::MalformedRecipe {
                recipe: self.id.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct RecipeRegistry {
    pub recipes: HashMap<String, CraftingRecipe>,
}

impl RecipeRegistry {
    pub fn get(&self, id: &str) -> Option<&CraftingRecipe> {
        self.recipes.get(id)
    }

    pub fn insert(&mut self, recipe: CraftingRecipe) {
        self.recipes.insert(recipe.id.clone(), recipe);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// EVENTS: cross-domain communication
// ═══════════════════════════════════════════════════════════════════════

#[derive(Event, Debug, Clone)]
pub struct ItemPickupEvent {
    pub item_id: ItemId,
    pub quality: ItemQuality,
    pub quantity: u32,
}

/// Toast notification for player feedback.
#[derive(Event, Debug, Clone)]
pub struct ToastEvent {
    pub message: String,
    pub duration_secs: f32,
}

// ═══════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════

pub const HOTBAR_SLOTS: usize = 12;
pub const BACKPACK_SLOTS: usize = 24;
pub const TOTAL_INVENTORY_SLOTS: usize = HOTBAR_SLOTS + BACKPACK_SLOTS;

pub const DEFAULT_STACK_SIZE: u32 = 999;

/// Hard ceiling on a single bulk craft.
pub const SESSION_CRAFT_CAP: u32 = 999;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_ordering_and_tiers() {
        assert!(ItemQuality::Normal < ItemQuality::Silver);
        assert!(ItemQuality::Gold < ItemQuality::Iridium);
        assert_eq!(ItemQuality::HIGHEST.tier(), 3);
        assert_eq!(ItemQuality::from_tier(2), Some(ItemQuality::Gold));
        assert_eq!(ItemQuality::from_tier(4), None);
    }

    #[test]
    fn test_try_add_stacks_then_fills_empty_slots() {
        let mut source = ItemSource::with_capacity(3);
        source.slots[1] = Some(ItemStack::new("wood", ItemQuality::Normal, 95));

        let leftover = source.try_add(&ItemStack::new("wood", ItemQuality::Normal, 10), 99);
        assert_eq!(leftover, 0);
        assert_eq!(source.slots[1].as_ref().map(|s| s.count), Some(99));
        assert_eq!(source.slots[0].as_ref().map(|s| s.count), Some(6));
        assert_eq!(source.count("wood"), 105);
    }

    #[test]
    fn test_try_add_keeps_qualities_apart() {
        let mut source = ItemSource::with_capacity(2);
        source.slots[0] = Some(ItemStack::new("egg", ItemQuality::Normal, 1));
        source.try_add(&ItemStack::new("egg", ItemQuality::Gold, 2), 99);
        assert_eq!(source.count_at("egg", ItemQuality::Normal), 1);
        assert_eq!(source.count_at("egg", ItemQuality::Gold), 2);
    }

    #[test]
    fn test_try_add_refused_when_insert_disabled() {
        let mut source = ItemSource::with_capacity(4);
        source.can_insert = false;
        assert_eq!(source.try_add(&ItemStack::new("stone", ItemQuality::Normal, 5), 99), 5);
        assert_eq!(source.room_for("stone", ItemQuality::Normal, 99), 0);
    }

    #[test]
    fn test_wallet_spend_never_goes_negative() {
        let mut wallet = Wallet::default();
        wallet.set(CurrencyKind::Gold, 100);
        assert!(!wallet.spend(CurrencyKind::Gold, 150));
        assert_eq!(wallet.balance(CurrencyKind::Gold), 100);
        assert!(wallet.spend(CurrencyKind::Gold, 60));
        assert_eq!(wallet.balance(CurrencyKind::Gold), 40);
        assert_eq!(wallet.balance(CurrencyKind::Gems), 0);
    }

    #[test]
    fn test_recipe_validation() {
        let mut recipe = CraftingRecipe {
            id: "fence".into(),
            name: "Fence".into(),
            ingredients: vec![IngredientRequirement::item("wood", 2)],
            output: "fence".into(),
            yield_per_craft: 1,
            is_cooking: false,
            can_produce: CanProduce::always(),
        };
        assert!(recipe.validate().is_ok());

        recipe.yield_per_craft = 0;
        assert!(matches!(
            recipe.validate(),
            Err(CraftingError::MalformedRecipe { .. })
        ));

        recipe.yield_per_craft = 1;
        recipe.ingredients.push(IngredientRequirement::currency(CurrencyKind::Gold, 0));
        assert!(recipe.validate().is_err());

        recipe.ingredients.clear();
        assert!(recipe.validate().is_err());
    }

    #[test]
    fn test_requirement_scaled() {
        let req = IngredientRequirement::category(-4, 3).scaled(5);
        assert_eq!(req.quantity(), 15);
        let req = IngredientRequirement::currency(CurrencyKind::Gold, u32::MAX).scaled(2);
        assert_eq!(req.quantity(), u32::MAX);
    }
}
