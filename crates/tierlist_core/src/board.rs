//! The board: all session-scoped arrangement state in one explicit struct.
//!
//! Front ends translate pointer and network events into [`BoardEvent`]s and
//! feed them through [`Board::dispatch`], one at a time. Nothing else mutates
//! the container store.

use shared::{
    domain::{ContainerId, Item, ItemId, Template, TemplateId, Tier, TierId},
    protocol::{SaveArrangementRequest, SavedArrangement},
};
use tracing::{debug, info, warn};

use crate::{
    binding::{fallback_items, CatalogRequest, Selection, TemplateBinding},
    containers::{ContainerStore, InvariantViolation, MoveOutcome},
    drag::{DragSession, DropResolution, DropTarget, PointerPosition},
    error::{ClientError, ClientResult},
    reconciler,
};

#[derive(Debug, Clone)]
pub enum BoardEvent {
    PointerDown {
        item: ItemId,
        at: PointerPosition,
    },
    PointerMove {
        at: PointerPosition,
    },
    PointerUp {
        target: Option<DropTarget>,
    },
    DragCancelled,
    TemplateSelected(Option<Template>),
    CatalogLoaded {
        request: CatalogRequest,
        result: ClientResult<Vec<Item>>,
    },
    ArrangementLoaded {
        generation: u64,
        arrangement: SavedArrangement,
    },
    ItemsRegistered {
        generation: u64,
        template_id: TemplateId,
        items: Vec<Item>,
    },
    Saved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardUpdate {
    Unchanged,
    DragArmed,
    DragStarted {
        item: ItemId,
    },
    Moved {
        item: ItemId,
        from: ContainerId,
        to: ContainerId,
    },
    CatalogRequested(CatalogRequest),
    Reset {
        items: usize,
    },
    /// The catalog fetch failed; the board is now empty.
    CatalogUnavailable(ClientError),
    ArrangementApplied {
        ranked: usize,
    },
    ItemsAdded {
        count: usize,
    },
    StaleResponseDiscarded,
    Saved,
}

/// One container with its items resolved, in board order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerView {
    pub id: ContainerId,
    pub label: String,
    pub color: Option<String>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub struct Board {
    tiers: Vec<Tier>,
    items: Vec<Item>,
    fallback_items: Vec<Item>,
    store: ContainerStore,
    drag: DragSession,
    binding: TemplateBinding,
    dirty: bool,
}

impl Board {
    /// A board with no template selected, showing the fallback items.
    pub fn new(tiers: Vec<Tier>, activation_distance: f32) -> Self {
        Self::with_fallback_items(tiers, activation_distance, fallback_items())
    }

    pub fn with_fallback_items(
        mut tiers: Vec<Tier>,
        activation_distance: f32,
        fallback_items: Vec<Item>,
    ) -> Self {
        tiers.sort_by_key(|tier| tier.order);
        let tier_ids: Vec<TierId> = tiers.iter().map(|tier| tier.id.clone()).collect();
        let mut store = ContainerStore::new(&tier_ids);
        store.reset_for_item_set(&tier_ids, &item_ids(&fallback_items));
        Self {
            tiers,
            items: fallback_items.clone(),
            fallback_items,
            store,
            drag: DragSession::new(activation_distance),
            binding: TemplateBinding::default(),
            dirty: false,
        }
    }

    pub fn dispatch(&mut self, event: BoardEvent) -> ClientResult<BoardUpdate> {
        match event {
            BoardEvent::PointerDown { item, at } => self.on_pointer_down(item, at),
            BoardEvent::PointerMove { at } => Ok(self.on_pointer_move(at)),
            BoardEvent::PointerUp { target } => self.on_pointer_up(target),
            BoardEvent::DragCancelled => {
                self.drag.cancel();
                Ok(BoardUpdate::Unchanged)
            }
            BoardEvent::TemplateSelected(template) => Ok(self.on_template_selected(template)),
            BoardEvent::CatalogLoaded { request, result } => {
                Ok(self.on_catalog_loaded(&request, result))
            }
            BoardEvent::ArrangementLoaded {
                generation,
                arrangement,
            } => self.on_arrangement_loaded(generation, &arrangement),
            BoardEvent::ItemsRegistered {
                generation,
                template_id,
                items,
            } => Ok(self.on_items_registered(generation, &template_id, items)),
            BoardEvent::Saved => {
                self.dirty = false;
                Ok(BoardUpdate::Saved)
            }
        }
    }

    fn on_pointer_down(&mut self, item: ItemId, at: PointerPosition) -> ClientResult<BoardUpdate> {
        let source = self
            .store
            .container_of(&item)
            .ok_or_else(|| ClientError::stale(format!("item {item} is not on the board")))?;
        if self.drag.pointer_down(item, source, at) {
            Ok(BoardUpdate::DragArmed)
        } else {
            Ok(BoardUpdate::Unchanged)
        }
    }

    fn on_pointer_move(&mut self, at: PointerPosition) -> BoardUpdate {
        if !self.drag.pointer_move(at) {
            return BoardUpdate::Unchanged;
        }
        match self.drag.active_item() {
            Some(item) => BoardUpdate::DragStarted { item: item.clone() },
            None => BoardUpdate::Unchanged,
        }
    }

    fn on_pointer_up(&mut self, target: Option<DropTarget>) -> ClientResult<BoardUpdate> {
        let (item, source, target) = match self.drag.pointer_up(target) {
            DropResolution::Cancelled | DropResolution::SelfDrop { .. } => {
                return Ok(BoardUpdate::Unchanged)
            }
            DropResolution::Move {
                item,
                source,
                target,
            } => (item, source, target),
        };

        let (dest, dest_index) = match target {
            DropTarget::Container(container) => (container, None),
            DropTarget::Item(over) => {
                let (container, index) = self.store.position_of(&over).ok_or_else(|| {
                    warn!(item_id = %item, over = %over, "drop target item is no longer on the board");
                    ClientError::stale(format!("drop target {over} is no longer on the board"))
                })?;
                (container, Some(index))
            }
        };

        match self.store.move_item(&item, &source, &dest, dest_index)? {
            MoveOutcome::Unchanged => Ok(BoardUpdate::Unchanged),
            MoveOutcome::Moved => {
                self.dirty = true;
                Ok(BoardUpdate::Moved {
                    item,
                    from: source,
                    to: dest,
                })
            }
        }
    }

    fn on_template_selected(&mut self, template: Option<Template>) -> BoardUpdate {
        self.drag.cancel();
        self.dirty = false;
        let tier_ids = self.tier_ids();
        match self.binding.select(template) {
            Selection::Fallback => {
                self.items = self.fallback_items.clone();
                self.store
                    .reset_for_item_set(&tier_ids, &item_ids(&self.items));
                BoardUpdate::Reset {
                    items: self.items.len(),
                }
            }
            Selection::Fetch(request) => {
                self.items.clear();
                self.store.reset_for_item_set(&tier_ids, &[]);
                BoardUpdate::CatalogRequested(request)
            }
        }
    }

    fn on_catalog_loaded(
        &mut self,
        request: &CatalogRequest,
        result: ClientResult<Vec<Item>>,
    ) -> BoardUpdate {
        if !self.binding.complete(request) {
            return BoardUpdate::StaleResponseDiscarded;
        }
        self.drag.cancel();
        self.dirty = false;
        let tier_ids = self.tier_ids();
        match result {
            Ok(items) => {
                self.items = dedupe_items(items);
                self.store
                    .reset_for_item_set(&tier_ids, &item_ids(&self.items));
                info!(
                    template_id = %request.template_id,
                    items = self.items.len(),
                    "loaded template catalog"
                );
                BoardUpdate::Reset {
                    items: self.items.len(),
                }
            }
            Err(err) => {
                warn!(
                    template_id = %request.template_id,
                    error = %err,
                    "template catalog unavailable; showing empty board"
                );
                self.items.clear();
                self.store.reset_for_item_set(&tier_ids, &[]);
                BoardUpdate::CatalogUnavailable(err)
            }
        }
    }

    fn on_arrangement_loaded(
        &mut self,
        generation: u64,
        arrangement: &SavedArrangement,
    ) -> ClientResult<BoardUpdate> {
        if generation != self.binding.generation()
            || self.binding.selected_id() != Some(&arrangement.template_id)
        {
            debug!(
                arrangement_id = %arrangement.id,
                generation,
                current_generation = self.binding.generation(),
                "discarding arrangement for a superseded selection"
            );
            return Ok(BoardUpdate::StaleResponseDiscarded);
        }
        if self.binding.pending().is_some() {
            return Err(ClientError::stale(format!(
                "items for template {} are still loading",
                arrangement.template_id
            )));
        }

        self.drag.cancel();
        let tier_ids = self.tier_ids();
        reconciler::load_saved_arrangement(
            &mut self.store,
            &arrangement.data,
            &tier_ids,
            &item_ids(&self.items),
        );
        self.dirty = false;
        let ranked = self.store.item_count() - self.store.bank().len();
        info!(arrangement_id = %arrangement.id, ranked, "loaded saved arrangement");
        Ok(BoardUpdate::ArrangementApplied { ranked })
    }

    fn on_items_registered(
        &mut self,
        generation: u64,
        template_id: &TemplateId,
        items: Vec<Item>,
    ) -> BoardUpdate {
        if generation != self.binding.generation()
            || self.binding.selected_id() != Some(template_id)
        {
            debug!(template_id = %template_id, "registered items belong to a superseded selection");
            return BoardUpdate::StaleResponseDiscarded;
        }

        let mut fresh = Vec::new();
        for item in items {
            if self.item(&item.id).is_none() && !fresh.iter().any(|known: &Item| known.id == item.id) {
                fresh.push(item);
            }
        }
        let count = self.store.add_to_bank(&item_ids(&fresh));
        self.items.extend(fresh);
        if count > 0 {
            self.dirty = true;
        }
        BoardUpdate::ItemsAdded { count }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn tier_ids(&self) -> Vec<TierId> {
        self.tiers.iter().map(|tier| tier.id.clone()).collect()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn store(&self) -> &ContainerStore {
        &self.store
    }

    pub fn drag(&self) -> &DragSession {
        &self.drag
    }

    pub fn selected_template(&self) -> Option<&Template> {
        self.binding.selected()
    }

    pub fn pending_catalog(&self) -> Option<&CatalogRequest> {
        self.binding.pending()
    }

    pub fn generation(&self) -> u64 {
        self.binding.generation()
    }

    /// `true` once the arrangement differs from what was last loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.store.check_invariants(&item_ids(&self.items))
    }

    pub fn save_request(&self, name: Option<&str>, is_public: bool) -> ClientResult<SaveArrangementRequest> {
        let template = self
            .binding
            .selected()
            .ok_or_else(|| ClientError::validation("Select a template before saving."))?;
        if self.binding.pending().is_some() {
            return Err(ClientError::validation(
                "Wait for the template items to load before saving.",
            ));
        }
        Ok(reconciler::build_save_request(
            &self.store,
            template.id.clone(),
            name,
            is_public,
        ))
    }

    /// Tiers in order, then the bank, with items resolved from the catalog.
    pub fn containers_view(&self) -> Vec<ContainerView> {
        let resolve = |container: &ContainerId| -> Vec<Item> {
            self.store
                .items_in(container)
                .unwrap_or_default()
                .iter()
                .filter_map(|id| self.item(id).cloned())
                .collect()
        };

        let mut views: Vec<ContainerView> = self
            .tiers
            .iter()
            .map(|tier| {
                let id = ContainerId::Tier(tier.id.clone());
                ContainerView {
                    items: resolve(&id),
                    id,
                    label: tier.label.clone(),
                    color: Some(tier.color.clone()),
                }
            })
            .collect();
        views.push(ContainerView {
            items: resolve(&ContainerId::Bank),
            id: ContainerId::Bank,
            label: "Unranked".to_string(),
            color: None,
        });
        views
    }
}

fn item_ids(items: &[Item]) -> Vec<ItemId> {
    items.iter().map(|item| item.id.clone()).collect()
}

fn dedupe_items(items: Vec<Item>) -> Vec<Item> {
    let mut unique: Vec<Item> = Vec::with_capacity(items.len());
    for item in items {
        if unique.iter().any(|known| known.id == item.id) {
            warn!(item_id = %item.id, "catalog listed an item twice; keeping the first");
            continue;
        }
        unique.push(item);
    }
    unique
}

#[cfg(test)]
#[path = "tests/board_tests.rs"]
mod tests;
