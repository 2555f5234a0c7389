use thiserror::Error;

use crate::shared::{CategoryCode, SourceId};

/// Everything that can stop a craft. None of these are fatal to the frame loop;
/// systems turn them into feedback and outcome events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CraftingError {
    #[error("requirement {requirement} needs {needed}, only {available} available")]
    InsufficientQuantity {
        requirement: usize,
        needed: u32,
        available: u32,
    },

    #[error("unknown ingredient category {0}")]
    UnresolvableCategory(CategoryCode),

    #[error("container {container} is locked by another player")]
    LockUnavailable { container: SourceId },

    #[error("no seasoning available for a required-seasoning craft")]
    SeasoningUnavailable,

    #[error("recipe '{0}' is locked")]
    RecipeLocked(String),

    #[error("unknown recipe '{0}'")]
    UnknownRecipe(String),

    #[error("another craft is still waiting on container locks")]
    CraftInProgress,

    #[error("timed out waiting for container locks")]
    LockTimedOut,

    #[error("recipe '{recipe}' is malformed: {reason}")]
    MalformedRecipe { recipe: String, reason: String },

    #[error("no room for {quantity} x {item_id}")]
    InventoryFull { item_id: String, quantity: u32 },

    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid crafting config: {0}")]
    Config(String),
}

/// How badly a requirement falls short. Shown as a marker next to the ingredient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deficiency {
    /// Not even one craft's worth.
    Critical,
    /// Enough for one craft, not for the requested batch.
    Warning,
}

impl Deficiency {
    pub fn classify(available: u32, per_craft: u32, crafts: u32) -> Option<Deficiency> {
        if available < per_craft {
            Some(Deficiency::Critical)
        } else if available < per_craft.saturating_mul(crafts) {
            Some(Deficiency::Warning)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deficiency_severity() {
        assert_eq!(Deficiency::classify(1, 2, 1), Some(Deficiency::Critical));
        assert_eq!(Deficiency::classify(3, 2, 2), Some(Deficiency::Warning));
        assert_eq!(Deficiency::classify(4, 2, 2), None);
        assert_eq!(Deficiency::classify(0, 1, 0), Some(Deficiency::Critical));
    }

    #[test]
    fn test_error_messages() {
        let err = CraftingError::LockUnavailable { container: SourceId(2) };
        assert_eq!(err.to_string(), "container 2 is locked by another player");
        let err = CraftingError::UnresolvableCategory(CategoryCode(-999));
        assert_eq!(err.to_string(), "unknown ingredient category -999");
    }
}
