//! Conversion between persisted arrangements and full container state.

use shared::{
    domain::{ContainerId, ItemId, TemplateId, TierId},
    protocol::{ArrangementData, SaveArrangementRequest},
};
use tracing::debug;

use crate::containers::ContainerStore;

/// Rebuilds `store` from a sparse saved arrangement; the bank receives every
/// current item no tier claims.
pub fn load_saved_arrangement(
    store: &mut ContainerStore,
    arrangement: &ArrangementData,
    tier_ids: &[TierId],
    current_item_ids: &[ItemId],
) {
    store.apply_saved_arrangement(tier_ids, arrangement, current_item_ids);
}

/// Tier contents of `store` without the bank. Empty tiers are kept.
pub fn save_projection(store: &ContainerStore) -> ArrangementData {
    let data: ArrangementData = store
        .tier_ids()
        .iter()
        .map(|tier_id| {
            let items = store
                .items_in(&ContainerId::Tier(tier_id.clone()))
                .unwrap_or_default()
                .to_vec();
            (tier_id.clone(), items)
        })
        .collect();
    debug!(
        tiers = data.len(),
        ranked = data.values().map(Vec::len).sum::<usize>(),
        "projected arrangement for save"
    );
    data
}

/// Trims the list name; blank names are sent as no name.
pub fn normalize_list_name(name: Option<&str>) -> Option<String> {
    name.map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

pub fn build_save_request(
    store: &ContainerStore,
    template_id: TemplateId,
    name: Option<&str>,
    is_public: bool,
) -> SaveArrangementRequest {
    SaveArrangementRequest {
        template_id,
        name: normalize_list_name(name),
        is_public,
        data: save_projection(store),
    }
}
