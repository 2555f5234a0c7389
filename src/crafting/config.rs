use bevy::prelude::*;
use serde::{Deserialize, Serialize};
#[cfg(not(target_arch = "wasm32"))]
use std::path::Path;
use std::time::Duration;

use super::consumption::ConsumePolicy;
use super::seasoning::AugmentationCandidate;
use super::CraftingError;
use crate::shared::{CraftingRecipe, ItemId, ItemQuality, SESSION_CRAFT_CAP};

/// Whether the seasoning pass runs, and whether it limits how much can be crafted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeasoningMode {
    Disabled,
    /// Applied when available, never blocks a craft.
    #[default]
    Optional,
    /// Every craft must be seasonable; the seasoning supply caps the batch.
    Required,
}

/// Player-facing crafting settings, usually loaded from `crafting.ron`.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CraftingConfig {
    pub quality_ceiling: ItemQuality,
    pub low_quality_first: bool,
    pub seasoning: SeasoningMode,
    /// The single top-tier bonus ingredient. None disables it.
    pub bonus_ingredient: Option<ItemId>,
    pub bonus_message: String,
    pub session_cap: u32,
    pub lock_timeout_secs: f32,
}

impl Default for CraftingConfig {
    fn default() -> Self {
        Self {
            quality_ceiling: ItemQuality::HIGHEST,
            low_quality_first: true,
            seasoning: SeasoningMode::Optional,
            bonus_ingredient: Some("qi_seasoning".to_string()),
            bonus_message: "Seasoned to perfection!".to_string(),
            session_cap: SESSION_CRAFT_CAP,
            lock_timeout_secs: 2.0,
        }
    }
}

impl CraftingConfig {
    pub fn from_ron(text: &str) -> Result<Self, CraftingError> {
        let config: CraftingConfig =
            ron::from_str(text).map_err(|e| CraftingError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CraftingError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CraftingError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_ron(&text)?;
        info!("Loaded crafting config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CraftingError> {
        if self.session_cap == 0 {
            return Err(CraftingError::Config("session_cap must be at least 1".into()));
        }
        if !(self.lock_timeout_secs > 0.0) {
            return Err(CraftingError::Config(format!(
                "lock_timeout_secs must be positive, got {}",
                self.lock_timeout_secs
            )));
        }
        Ok(())
    }

    pub fn policy(&self) -> ConsumePolicy {
        ConsumePolicy {
            max_quality: self.quality_ceiling,
            low_quality_first: self.low_quality_first,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.lock_timeout_secs)
    }

    /// The configured top-tier bonus as a seasoning candidate. Only cooked
    /// dishes take it.
    pub fn bonus_candidate(&self, recipe: &CraftingRecipe) -> Option<AugmentationCandidate> {
        if !recipe.is_cooking {
            return None;
        }
        self.bonus_ingredient
            .as_ref()
            .map(|id| AugmentationCandidate::exclusive_bonus(id.clone(), self.bonus_message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = CraftingConfig::from_ron(
            "(quality_ceiling: Gold, seasoning: Required, bonus_ingredient: None)",
        )
        .expect("valid config");
        assert_eq!(config.quality_ceiling, ItemQuality::Gold);
        assert_eq!(config.seasoning, SeasoningMode::Required);
        assert_eq!(config.bonus_ingredient, None);
        assert!(config.low_quality_first);
        assert_eq!(config.session_cap, 999);
    }

    #[test]
    fn test_rejects_zero_cap_and_bad_timeout() {
        assert!(matches!(
            CraftingConfig::from_ron("(session_cap: 0)"),
            Err(CraftingError::Config(_))
        ));
        assert!(matches!(
            CraftingConfig::from_ron("(lock_timeout_secs: 0.0)"),
            Err(CraftingError::Config(_))
        ));
        assert!(CraftingConfig::from_ron("(quality_ceiling: Diamond)").is_err());
    }

    #[test]
    fn test_policy_reflects_config() {
        let config = CraftingConfig {
            quality_ceiling: ItemQuality::Silver,
            low_quality_first: false,
            ..Default::default()
        };
        let policy = config.policy();
        assert_eq!(policy.max_quality, ItemQuality::Silver);
        assert!(!policy.low_quality_first);
    }

    fn dish(is_cooking: bool) -> CraftingRecipe {
        CraftingRecipe {
            id: "omelet".into(),
            name: "Omelet".into(),
            ingredients: Vec::new(),
            output: "omelet".into(),
            yield_per_craft: 1,
            is_cooking,
            can_produce: crate::shared::CanProduce::always(),
        }
    }

    #[test]
    fn test_bonus_candidate_follows_ingredient() {
        let config = CraftingConfig::default();
        let bonus = config.bonus_candidate(&dish(true)).expect("default has a bonus");
        assert!(bonus.exclusive);
        assert_eq!(bonus.quality, ItemQuality::HIGHEST);
        assert_eq!(bonus.message.as_deref(), Some("Seasoned to perfection!"));

        let none = CraftingConfig {
            bonus_ingredient: None,
            ..Default::default()
        };
        assert!(none.bonus_candidate(&dish(true)).is_none());
    }

    #[test]
    fn test_bonus_candidate_only_for_cooking() {
        let config = CraftingConfig::default();
        assert!(config.bonus_candidate(&dish(false)).is_none());
    }
}
