//! Container store: the single source of truth for which item sits where.
//!
//! Every tier and the bank own an ordered sequence of item ids. Each loaded
//! item lives in exactly one container; nothing else may appear in one.

use std::collections::{HashMap, HashSet};

use shared::{
    domain::{ContainerId, ItemId, TierId},
    protocol::ArrangementData,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("item {item} appears in both {first} and {second}")]
    Duplicate {
        item: ItemId,
        first: ContainerId,
        second: ContainerId,
    },
    #[error("item {item} in {container} is not a loaded item")]
    UnknownItem { item: ItemId, container: ContainerId },
    #[error("loaded item {item} is in no container")]
    Missing { item: ItemId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStore {
    tier_order: Vec<TierId>,
    containers: HashMap<ContainerId, Vec<ItemId>>,
}

impl Default for ContainerStore {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl ContainerStore {
    /// Empty tiers and an empty bank.
    pub fn new(tier_ids: &[TierId]) -> Self {
        let mut store = Self {
            tier_order: Vec::new(),
            containers: HashMap::new(),
        };
        store.reset_for_item_set(tier_ids, &[]);
        store
    }

    /// Empties every tier and puts `item_ids` in the bank in catalog order.
    pub fn reset_for_item_set(&mut self, tier_ids: &[TierId], item_ids: &[ItemId]) {
        self.rebuild_tiers(tier_ids);
        let mut seen = HashSet::new();
        let bank = item_ids
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect::<Vec<_>>();
        debug!(
            tiers = self.tier_order.len(),
            items = bank.len(),
            "reset containers for item set"
        );
        self.containers.insert(ContainerId::Bank, bank);
    }

    /// Fills tiers from `saved` and puts every remaining loaded item in the bank,
    /// in catalog order.
    pub fn apply_saved_arrangement(
        &mut self,
        tier_ids: &[TierId],
        saved: &ArrangementData,
        all_item_ids: &[ItemId],
    ) {
        self.rebuild_tiers(tier_ids);

        for tier_id in saved.keys() {
            if !self.tier_order.contains(tier_id) {
                warn!(tier_id = %tier_id, "ignoring saved tier that is not on this board");
            }
        }

        let loaded: HashSet<&ItemId> = all_item_ids.iter().collect();
        let mut placed: HashSet<ItemId> = HashSet::new();
        for tier_id in &self.tier_order {
            let mut sequence = Vec::new();
            for item_id in saved.get(tier_id).into_iter().flatten() {
                if !loaded.contains(item_id) {
                    warn!(
                        tier_id = %tier_id,
                        item_id = %item_id,
                        "dropping saved item that is not in the current catalog"
                    );
                    continue;
                }
                if !placed.insert(item_id.clone()) {
                    warn!(
                        tier_id = %tier_id,
                        item_id = %item_id,
                        "dropping repeated saved item"
                    );
                    continue;
                }
                sequence.push(item_id.clone());
            }
            self.containers
                .insert(ContainerId::Tier(tier_id.clone()), sequence);
        }

        let bank = all_item_ids
            .iter()
            .filter(|id| placed.insert((*id).clone()))
            .cloned()
            .collect::<Vec<_>>();
        debug!(
            ranked = placed.len() - bank.len(),
            unranked = bank.len(),
            "applied saved arrangement"
        );
        self.containers.insert(ContainerId::Bank, bank);
    }

    /// Moves `item` out of `source` into `dest`.
    ///
    /// `dest_index` is the insertion index in `dest` measured after the item has
    /// been removed; out of range or `None` appends. Moving into a container the
    /// store does not know is a stale reference and leaves the store untouched.
    pub fn move_item(
        &mut self,
        item: &ItemId,
        source: &ContainerId,
        dest: &ContainerId,
        dest_index: Option<usize>,
    ) -> ClientResult<MoveOutcome> {
        if !self.containers.contains_key(dest) {
            warn!(item_id = %item, container = %dest, "rejecting move into unknown container");
            return Err(ClientError::stale(format!("container {dest} does not exist")));
        }

        let (source, from_index) = match self.index_in(source, item) {
            Some(index) => (source.clone(), index),
            None => self.repair_lookup(item, source).ok_or_else(|| {
                ClientError::stale(format!("item {item} is not in any container"))
            })?,
        };

        if source == *dest {
            let len = self.containers.get(dest).map_or(0, Vec::len);
            let target = match dest_index {
                Some(index) if index < len => index,
                _ => len.saturating_sub(1),
            };
            if target == from_index {
                return Ok(MoveOutcome::Unchanged);
            }
        }

        if let Some(sequence) = self.containers.get_mut(&source) {
            sequence.remove(from_index);
        }
        let Some(sequence) = self.containers.get_mut(dest) else {
            return Err(ClientError::stale(format!("container {dest} does not exist")));
        };
        let index = match dest_index {
            Some(index) if index <= sequence.len() => index,
            _ => sequence.len(),
        };
        sequence.insert(index, item.clone());
        debug!(
            item_id = %item,
            from = %source,
            to = %dest,
            index,
            "moved item"
        );
        Ok(MoveOutcome::Moved)
    }

    /// Appends items that are not on the board yet to the bank; returns how many were added.
    pub fn add_to_bank(&mut self, item_ids: &[ItemId]) -> usize {
        let mut added = 0;
        for item_id in item_ids {
            if self.container_of(item_id).is_some() {
                continue;
            }
            self.containers
                .entry(ContainerId::Bank)
                .or_default()
                .push(item_id.clone());
            added += 1;
        }
        added
    }

    pub fn tier_ids(&self) -> &[TierId] {
        &self.tier_order
    }

    /// Tiers in board order, then the bank.
    pub fn container_ids(&self) -> impl Iterator<Item = ContainerId> + '_ {
        self.tier_order
            .iter()
            .cloned()
            .map(ContainerId::Tier)
            .chain(std::iter::once(ContainerId::Bank))
    }

    pub fn contains_container(&self, container: &ContainerId) -> bool {
        self.containers.contains_key(container)
    }

    pub fn items_in(&self, container: &ContainerId) -> Option<&[ItemId]> {
        self.containers.get(container).map(Vec::as_slice)
    }

    pub fn bank(&self) -> &[ItemId] {
        self.items_in(&ContainerId::Bank).unwrap_or_default()
    }

    pub fn container_of(&self, item: &ItemId) -> Option<ContainerId> {
        self.position_of(item).map(|(container, _)| container)
    }

    pub fn position_of(&self, item: &ItemId) -> Option<(ContainerId, usize)> {
        self.container_ids().find_map(|container| {
            self.index_in(&container, item)
                .map(|index| (container, index))
        })
    }

    pub fn item_count(&self) -> usize {
        self.containers.values().map(Vec::len).sum()
    }

    /// Checks exclusivity and completeness against the loaded catalog.
    pub fn check_invariants(&self, loaded: &[ItemId]) -> Result<(), InvariantViolation> {
        let loaded_set: HashSet<&ItemId> = loaded.iter().collect();
        let mut seen: HashMap<&ItemId, ContainerId> = HashMap::new();
        for container in self.container_ids() {
            for item in self.items_in(&container).unwrap_or_default() {
                if let Some(first) = seen.get(item) {
                    return Err(InvariantViolation::Duplicate {
                        item: item.clone(),
                        first: first.clone(),
                        second: container.clone(),
                    });
                }
                if !loaded_set.contains(item) {
                    return Err(InvariantViolation::UnknownItem {
                        item: item.clone(),
                        container: container.clone(),
                    });
                }
                seen.insert(item, container.clone());
            }
        }
        match loaded.iter().find(|item| !seen.contains_key(item)) {
            Some(item) => Err(InvariantViolation::Missing { item: item.clone() }),
            None => Ok(()),
        }
    }

    fn rebuild_tiers(&mut self, tier_ids: &[TierId]) {
        self.containers.clear();
        self.tier_order.clear();
        for tier_id in tier_ids {
            if self.tier_order.contains(tier_id) {
                continue;
            }
            self.tier_order.push(tier_id.clone());
            self.containers
                .insert(ContainerId::Tier(tier_id.clone()), Vec::new());
        }
    }

    fn index_in(&self, container: &ContainerId, item: &ItemId) -> Option<usize> {
        self.containers
            .get(container)?
            .iter()
            .position(|candidate| candidate == item)
    }

    fn repair_lookup(&self, item: &ItemId, expected: &ContainerId) -> Option<(ContainerId, usize)> {
        let found = self.position_of(item);
        match &found {
            Some((actual, _)) => warn!(
                item_id = %item,
                expected = %expected,
                actual = %actual,
                "item was not in its expected source container; repaired from actual location"
            ),
            None => warn!(
                item_id = %item,
                expected = %expected,
                "item is not in any container"
            ),
        }
        found
    }
}

#[cfg(test)]
#[path = "tests/containers_tests.rs"]
mod tests;
