//! Per-call views over the player inventory, wallet and external containers.
//!
//! Sources are addressed by `SourceId`: the player is 0, external container
//! `i` is `i + 1`. Views are rebuilt for every resolution call and never kept.

use crate::shared::{ItemSource, ItemStack, SourceId, StackRef, Wallet};

/// Read-only snapshot handed to the availability resolver.
#[derive(Debug, Clone)]
pub struct Stores<'a> {
    pub player: &'a ItemSource,
    pub wallet: &'a Wallet,
    pub external: Vec<&'a ItemSource>,
}

impl<'a> Stores<'a> {
    pub fn new(player: &'a ItemSource, wallet: &'a Wallet) -> Self {
        Self {
            player,
            wallet,
            external: Vec::new(),
        }
    }

    pub fn with_external(mut self, external: impl IntoIterator<Item = &'a ItemSource>) -> Self {
        self.external.extend(external);
        self
    }

    pub fn get(&self, id: SourceId) -> Option<&'a ItemSource> {
        if id.is_player() {
            Some(self.player)
        } else {
            self.external.get(id.0 - 1).copied()
        }
    }

    /// Player first, then external sources in the order given.
    pub fn iter(&self) -> impl Iterator<Item = (SourceId, &'a ItemSource)> + '_ {
        std::iter::once((SourceId::PLAYER, self.player)).chain(
            self.external
                .iter()
                .enumerate()
                .map(|(i, s)| (SourceId::external(i), *s)),
        )
    }
}

/// Mutable counterpart, used only by the consumption engine and output placement.
#[derive(Debug)]
pub struct StoresMut<'a> {
    pub player: &'a mut ItemSource,
    pub wallet: &'a mut Wallet,
    pub external: Vec<&'a mut ItemSource>,
    touched: Vec<SourceId>,
}

impl<'a> StoresMut<'a> {
    pub fn new(player: &'a mut ItemSource, wallet: &'a mut Wallet) -> Self {
        Self {
            player,
            wallet,
            external: Vec::new(),
            touched: Vec::new(),
        }
    }

    pub fn with_external(
        mut self,
        external: impl IntoIterator<Item = &'a mut ItemSource>,
    ) -> Self {
        self.external.extend(external);
        self
    }

    pub fn view(&self) -> Stores<'_> {
        Stores {
            player: &*self.player,
            wallet: &*self.wallet,
            external: self.external.iter().map(|s| &**s).collect(),
        }
    }

    /// Mutable access to one source. The source counts as touched from here on.
    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut ItemSource> {
        self.touch(id);
        match id.external_index() {
            None => Some(&mut *self.player),
            Some(i) => self.external.get_mut(i).map(|s| &mut **s),
        }
    }

    /// Sources handed out mutably so far, in first-touch order.
    pub fn touched(&self) -> &[SourceId] {
        &self.touched
    }

    fn touch(&mut self, id: SourceId) {
        if !self.touched.contains(&id) {
            self.touched.push(id);
        }
    }

    pub fn slot_count(&self, at: StackRef) -> Option<u32> {
        self.view()
            .get(at.source)
            .and_then(|s| s.slots.get(at.slot))
            .and_then(|s| s.as_ref())
            .map(|s| s.count)
    }

    /// Put `stack` into the player first, then into external sources that
    /// accept inserts. Returns how many did not fit.
    pub fn place(&mut self, stack: &ItemStack, max_stack: u32) -> u32 {
        let targets = std::iter::once((SourceId::PLAYER, &mut *self.player)).chain(
            self.external
                .iter_mut()
                .enumerate()
                .map(|(i, s)| (SourceId::external(i), &mut **s))
                .filter(|(_, s)| s.can_insert),
        );
        let mut leftover = stack.count;
        let mut placed_in = Vec::new();
        for (id, target) in targets {
            if leftover == 0 {
                break;
            }
            let before = leftover;
            leftover = target.try_add(&ItemStack { count: leftover, ..stack.clone() }, max_stack);
            if leftover < before {
                placed_in.push(id);
            }
        }
        for id in placed_in {
            self.touch(id);
        }
        leftover
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ItemQuality;

    #[test]
    fn test_place_overflows_into_insertable_chests_only() {
        let mut player = ItemSource::with_capacity(1);
        player.try_add(&ItemStack::new("wood", ItemQuality::Normal, 1), 999);
        let mut sealed = ItemSource::with_capacity(4);
        sealed.can_insert = false;
        let mut open = ItemSource::with_capacity(4);
        let mut wallet = Wallet::default();
        let mut stores =
            StoresMut::new(&mut player, &mut wallet).with_external([&mut sealed, &mut open]);

        let leftover = stores.place(&ItemStack::new("torch", ItemQuality::Normal, 5), 999);
        assert_eq!(leftover, 0);
        assert_eq!(stores.touched(), &[SourceId::external(1)]);
        drop(stores);
        assert_eq!(sealed.count("torch"), 0);
        assert_eq!(open.count("torch"), 5);
    }
}
