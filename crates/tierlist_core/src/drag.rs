//! Drag session state machine.
//!
//! `Idle -> Dragging -> Idle`. A press only becomes a drag once the pointer has
//! travelled further than the activation distance, so plain clicks never move
//! anything. Every drag resolves back to `Idle`, including cancellation.

use shared::domain::{ContainerId, ItemId};
use tracing::debug;

pub const DEFAULT_ACTIVATION_DISTANCE: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerPosition {
    pub x: f32,
    pub y: f32,
}

impl PointerPosition {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Self) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// What the pointer was over when it was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Empty area of a container; the item is appended.
    Container(ContainerId),
    /// Another item; the dragged item takes its index.
    Item(ItemId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    /// Pointer is down on an item but has not passed the activation distance.
    Pressed {
        item: ItemId,
        source: ContainerId,
        origin: PointerPosition,
    },
    Dragging {
        item: ItemId,
        source: ContainerId,
        cursor: PointerPosition,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropResolution {
    /// Released outside any container, released before activation, or cancelled.
    Cancelled,
    /// Released on the dragged item itself.
    SelfDrop { item: ItemId },
    Move {
        item: ItemId,
        source: ContainerId,
        target: DropTarget,
    },
}

#[derive(Debug, Clone)]
pub struct DragSession {
    state: DragState,
    activation_distance: f32,
}

impl Default for DragSession {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVATION_DISTANCE)
    }
}

impl DragSession {
    pub fn new(activation_distance: f32) -> Self {
        Self {
            state: DragState::Idle,
            activation_distance: activation_distance.max(0.0),
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn activation_distance(&self) -> f32 {
        self.activation_distance
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// The item to render in the drag overlay.
    pub fn active_item(&self) -> Option<&ItemId> {
        match &self.state {
            DragState::Dragging { item, .. } => Some(item),
            _ => None,
        }
    }

    /// Arms a press on `item`. Ignored unless the session is idle.
    pub fn pointer_down(&mut self, item: ItemId, source: ContainerId, at: PointerPosition) -> bool {
        if !matches!(self.state, DragState::Idle) {
            debug!(item_id = %item, "ignoring press while another drag is unresolved");
            return false;
        }
        self.state = DragState::Pressed {
            item,
            source,
            origin: at,
        };
        true
    }

    /// Tracks the pointer; returns `true` on the move that activates the drag.
    pub fn pointer_move(&mut self, at: PointerPosition) -> bool {
        match &mut self.state {
            DragState::Idle => false,
            DragState::Dragging { cursor, .. } => {
                *cursor = at;
                false
            }
            DragState::Pressed {
                item,
                source,
                origin,
            } => {
                if origin.distance_to(at) <= self.activation_distance {
                    return false;
                }
                let item = item.clone();
                let source = source.clone();
                debug!(item_id = %item, from = %source, "drag started");
                self.state = DragState::Dragging {
                    item,
                    source,
                    cursor: at,
                };
                true
            }
        }
    }

    /// Releases the pointer and always returns the session to `Idle`.
    pub fn pointer_up(&mut self, target: Option<DropTarget>) -> DropResolution {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        let DragState::Dragging { item, source, .. } = state else {
            return DropResolution::Cancelled;
        };

        match target {
            None => {
                debug!(item_id = %item, "drag released outside any container");
                DropResolution::Cancelled
            }
            Some(DropTarget::Item(over)) if over == item => DropResolution::SelfDrop { item },
            Some(target) => DropResolution::Move {
                item,
                source,
                target,
            },
        }
    }

    pub fn cancel(&mut self) -> DropResolution {
        if let DragState::Dragging { item, .. } | DragState::Pressed { item, .. } = &self.state {
            debug!(item_id = %item, "drag cancelled");
        }
        self.state = DragState::Idle;
        DropResolution::Cancelled
    }
}

#[cfg(test)]
#[path = "tests/drag_tests.rs"]
mod tests;
