//! All-or-nothing ingredient consumption.
//!
//! Phase one (`verify`) resolves every requirement against a snapshot and
//! produces a `ConsumptionPlan`. The plan can only be built by a successful
//! verification, and `commit` is the only function that mutates sources, so
//! nothing is ever deducted without a prior phase-one success. Shared
//! containers must be locked (`LockSet`) before `commit` will touch them.

use bevy::log::{debug, error, info, warn};
use std::collections::HashMap;

use super::availability::get_available;
use super::locks::{LockAcquisition, LockHandle, LockSet};
use super::stores::{Stores, StoresMut};
use super::CraftingError;
use crate::shared::*;

/// Quality rules for one consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumePolicy {
    pub max_quality: ItemQuality,
    pub low_quality_first: bool,
}

impl Default for ConsumePolicy {
    fn default() -> Self {
        Self {
            max_quality: ItemQuality::HIGHEST,
            low_quality_first: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StackTake {
    at: StackRef,
    item_id: ItemId,
    quality: ItemQuality,
    amount: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Deduction {
    Stacks(Vec<StackTake>),
    Currency { kind: CurrencyKind, amount: u32 },
}

/// A verified set of deductions. Only `verify` constructs one.
#[derive(Debug)]
pub struct ConsumptionPlan {
    deductions: Vec<Deduction>,
    shared: Vec<(SourceId, LockHandle)>,
    crafts: u32,
}

/// What a committed plan took, per requirement in recipe order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumeReceipt {
    pub crafts: u32,
    /// (item, quality, amount) taken per requirement. Currency requirements list nothing.
    pub taken: Vec<Vec<(ItemId, ItemQuality, u32)>>,
    pub spent: Vec<(CurrencyKind, u32)>,
}

impl ConsumptionPlan {
    pub fn crafts(&self) -> u32 {
        self.crafts
    }

    /// Shared containers this plan will mutate.
    pub fn shared_sources(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.shared.iter().map(|(id, _)| *id)
    }

    pub fn needs_locks(&self) -> bool {
        !self.shared.is_empty()
    }

    /// Issue lock requests for every shared container the plan touches.
    pub fn acquire_locks(&self) -> LockAcquisition {
        LockAcquisition::new(self.shared.iter().cloned())
    }

    fn touched_sources(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.deductions.iter().flat_map(|d| match d {
            Deduction::Stacks(takes) => takes.iter().map(|t| t.at.source).collect::<Vec<_>>(),
            Deduction::Currency { .. } => Vec::new(),
        })
    }
}

/// Exact item patterns reserve before category patterns, so a broad
/// requirement never takes the only stacks a narrow one could use.
fn reservation_rank(requirement: &IngredientRequirement) -> u8 {
    match requirement {
        IngredientRequirement::Item {
            pattern: IngredientPattern::Category(_),
            ..
        } => 1,
        _ => 0,
    }
}

/// Phase one. Checks every requirement for `crafts` crafts and reserves the
/// exact stacks that will be drawn down. Stacks matched by more than one
/// requirement are reserved once, so the plan never counts a unit twice.
pub fn verify(
    requirements: &[IngredientRequirement],
    crafts: u32,
    stores: &Stores,
    registry: &ItemRegistry,
    policy: ConsumePolicy,
) -> Result<ConsumptionPlan, CraftingError> {
    let mut reserved: HashMap<StackRef, u32> = HashMap::new();
    let mut reserved_currency: HashMap<CurrencyKind, u32> = HashMap::new();
    let mut slots: Vec<Option<Deduction>> = vec![None; requirements.len()];

    let mut order: Vec<usize> = (0..requirements.len()).collect();
    order.sort_by_key(|&i| reservation_rank(&requirements[i]));

    for index in order {
        let requirement = &requirements[index];
        let needed = requirement.scaled(crafts).quantity();
        let availability = get_available(requirement, stores, registry, policy.max_quality);

        match requirement {
            IngredientRequirement::Currency { kind, .. } => {
                let already = reserved_currency.entry(*kind).or_insert(0);
                let free = availability.total.saturating_sub(*already);
                if free < needed {
                    return Err(CraftingError::InsufficientQuantity {
                        requirement: index,
                        needed,
                        available: free,
                    });
                }
                *already += needed;
                slots[index] = Some(Deduction::Currency {
                    kind: *kind,
                    amount: needed,
                });
            }
            IngredientRequirement::Item { .. } => {
                let mut remaining = needed;
                let mut takes = Vec::new();
                for matched in availability.consumption_order(policy.low_quality_first) {
                    if remaining == 0 {
                        break;
                    }
                    let already = reserved.get(&matched.at).copied().unwrap_or(0);
                    let free = matched.count.saturating_sub(already);
                    if free == 0 {
                        continue;
                    }
                    let take = remaining.min(free);
                    takes.push(StackTake {
                        at: matched.at,
                        item_id: matched.item_id.clone(),
                        quality: matched.quality,
                        amount: take,
                    });
                    remaining -= take;
                }

                if remaining > 0 {
                    return Err(CraftingError::InsufficientQuantity {
                        requirement: index,
                        needed,
                        available: needed - remaining,
                    });
                }
                for take in &takes {
                    *reserved.entry(take.at).or_insert(0) += take.amount;
                }
                slots[index] = Some(Deduction::Stacks(takes));
            }
        }
    }

    let mut plan = ConsumptionPlan {
        deductions: slots.into_iter().flatten().collect(),
        shared: Vec::new(),
        crafts,
    };

    let mut touched: Vec<SourceId> = plan.touched_sources().collect();
    touched.sort();
    touched.dedup();
    plan.shared = touched
        .into_iter()
        .filter_map(|id| {
            stores
                .get(id)
                .and_then(|s| s.lock.clone())
                .map(|lock| (id, lock))
        })
        .collect();

    debug!(
        "Verified {} requirement(s) for {} craft(s), {} shared container(s)",
        requirements.len(),
        crafts,
        plan.shared.len()
    );
    Ok(plan)
}

/// Phase two. Applies a verified plan. Every shared container the plan
/// touches must be held in `locks`. The plan is re-checked against the current
/// stores before anything changes; a stale or unlocked plan is refused whole.
pub fn commit(
    plan: ConsumptionPlan,
    stores: &mut StoresMut,
    locks: &LockSet,
) -> Result<ConsumeReceipt, CraftingError> {
    if let Some(unlocked) = plan.shared_sources().find(|id| !locks.holds(*id)) {
        debug_assert!(false, "commit without lock on shared container {}", unlocked);
        error!("Refusing to commit: container {} is not locked", unlocked);
        return Err(CraftingError::InvariantViolation(format!(
            "container {} not locked",
            unlocked
        )));
    }

    check_plan_still_valid(&plan, &stores.view())?;

    let mut receipt = ConsumeReceipt {
        crafts: plan.crafts,
        ..Default::default()
    };
    for deduction in plan.deductions {
        match deduction {
            Deduction::Currency { kind, amount } => {
                let spent = stores.wallet.spend(kind, amount);
                debug_assert!(spent, "currency re-checked before commit");
                receipt.spent.push((kind, amount));
                receipt.taken.push(Vec::new());
            }
            Deduction::Stacks(takes) => {
                let mut taken = Vec::with_capacity(takes.len());
                for take in takes {
                    let Some(source) = stores.get_mut(take.at.source) else {
                        continue;
                    };
                    let Some(slot) = source.slots.get_mut(take.at.slot) else {
                        continue;
                    };
                    if let Some(ref mut stack) = slot {
                        stack.count -= take.amount;
                        if stack.count == 0 {
                            *slot = None;
                        }
                    }
                    taken.push((take.item_id, take.quality, take.amount));
                }
                receipt.taken.push(taken);
            }
        }
    }

    Ok(receipt)
}

/// Totals per stack/currency must still be present exactly as verified.
fn check_plan_still_valid(plan: &ConsumptionPlan, stores: &Stores) -> Result<(), CraftingError> {
    let mut per_stack: HashMap<StackRef, (&StackTake, u32)> = HashMap::new();
    let mut per_currency: HashMap<CurrencyKind, u32> = HashMap::new();
    for deduction in &plan.deductions {
        match deduction {
            Deduction::Stacks(takes) => {
                for take in takes {
                    per_stack.entry(take.at).or_insert((take, 0)).1 += take.amount;
                }
            }
            Deduction::Currency { kind, amount } => {
                *per_currency.entry(*kind).or_insert(0) += amount;
            }
        }
    }

    for (at, (take, amount)) in per_stack {
        let current = stores
            .get(at.source)
            .and_then(|s| s.slots.get(at.slot))
            .and_then(|s| s.as_ref());
        let still_there = matches!(
            current,
            Some(s) if s.item_id == take.item_id && s.quality == take.quality && s.count >= amount
        );
        if !still_there {
            warn!("Stack at {:?} changed since verification", at);
            return Err(CraftingError::InvariantViolation(format!(
                "stack {:?} changed since verification",
                at
            )));
        }
    }
    for (kind, amount) in per_currency {
        if stores.wallet.balance(kind) < amount {
            warn!("{:?} balance changed since verification", kind);
            return Err(CraftingError::InvariantViolation(format!(
                "{:?} balance changed since verification",
                kind
            )));
        }
    }
    Ok(())
}

/// Verify, lock, and commit in one call. Locks are polled once; a shared
/// container that doesn't grant immediately aborts the whole consumption.
/// Either every requirement is deducted or nothing is touched.
pub fn consume(
    requirements: &[IngredientRequirement],
    crafts: u32,
    stores: &mut StoresMut,
    registry: &ItemRegistry,
    policy: ConsumePolicy,
) -> Result<ConsumeReceipt, CraftingError> {
    let plan = verify(requirements, crafts, &stores.view(), registry, policy)?;
    let locks = if plan.needs_locks() {
        plan.acquire_locks().try_now()?
    } else {
        LockSet::none()
    };
    let receipt = commit(plan, stores, &locks)?;
    info!(
        "Consumed {} requirement(s) for {} craft(s)",
        requirements.len(),
        crafts
    );
    Ok(receipt)
}
