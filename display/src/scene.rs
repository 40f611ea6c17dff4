//! Scene Graph
//!
//! Displays live in a slot arena addressed by generational [`DisplayId`]s.
//! A separate vector holds the paint order, bottom to top, and is kept
//! sorted by layer. Within a layer, later entries were inserted or raised
//! more recently.

use alloc::vec::Vec;

use crate::display::{Display, DisplayId, DisplayLayer, OwnerId};

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    display: Option<Display>,
}

/// Z-ordered collection of every display.
#[derive(Debug, Default)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Paint order, bottom to top
    order: Vec<DisplayId>,
}

fn layer_of(slots: &[Slot], id: DisplayId) -> DisplayLayer {
    slots
        .get(id.idx as usize)
        .and_then(|slot| slot.display.as_ref())
        .map_or(DisplayLayer::Background, |d| d.layer)
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a display built by `build` on top of its layer.
    pub(crate) fn insert_with(
        &mut self,
        build: impl FnOnce(DisplayId) -> Display,
    ) -> DisplayId {
        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[idx as usize];
        let id = DisplayId {
            idx,
            generation: slot.generation,
        };
        let display = build(id);
        let layer = display.layer;
        slot.display = Some(display);

        let pos = self.top_of_layer(layer);
        self.order.insert(pos, id);
        id
    }

    /// Unlink a display and hand back its storage.
    pub(crate) fn remove(&mut self, id: DisplayId) -> Option<Display> {
        let slot = self.slots.get_mut(id.idx as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let display = slot.display.take()?;

        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.idx);
        self.order.retain(|&other| other != id);
        Some(display)
    }

    pub fn get(&self, id: DisplayId) -> Option<&Display> {
        self.slots
            .get(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.display.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: DisplayId) -> Option<&mut Display> {
        self.slots
            .get_mut(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.display.as_mut())
    }

    #[inline]
    pub fn contains(&self, id: DisplayId) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Index of `id` in paint order.
    pub fn position(&self, id: DisplayId) -> Option<usize> {
        self.order.iter().position(|&other| other == id)
    }

    /// Display ids in paint order, bottom to top.
    #[inline]
    pub fn ids(&self) -> &[DisplayId] {
        &self.order
    }

    /// Display at paint position `pos`.
    pub fn at(&self, pos: usize) -> Option<&Display> {
        self.order.get(pos).and_then(|&id| self.get(id))
    }

    /// Displays in paint order, bottom to top.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Display> + '_ {
        self.order.iter().filter_map(move |&id| self.get(id))
    }

    /// Displays painted after position `pos`, bottom to top.
    pub fn above(&self, pos: usize) -> impl Iterator<Item = &Display> + Clone + '_ {
        let start = (pos + 1).min(self.order.len());
        self.order[start..].iter().filter_map(move |&id| self.get(id))
    }

    /// Displays painted before position `pos`, top to bottom.
    pub fn below(&self, pos: usize) -> impl Iterator<Item = &Display> + '_ {
        let end = pos.min(self.order.len());
        self.order[..end].iter().rev().filter_map(move |&id| self.get(id))
    }

    /// Paint position just above the last display of `layer`.
    fn top_of_layer(&self, layer: DisplayLayer) -> usize {
        self.order
            .partition_point(|&other| layer_of(&self.slots, other) <= layer)
    }

    /// Whether nothing of the same layer is painted above `id`.
    pub fn is_top(&self, id: DisplayId) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        let layer = layer_of(&self.slots, id);

        self.order
            .get(pos + 1)
            .map_or(true, |&next| layer_of(&self.slots, next) != layer)
    }

    /// Move `id` to the top of its layer. Returns `false` if it was already
    /// there or is not in the scene.
    pub(crate) fn raise(&mut self, id: DisplayId) -> bool {
        if !self.contains(id) || self.is_top(id) {
            return false;
        }

        self.order.retain(|&other| other != id);
        let pos = self.top_of_layer(layer_of(&self.slots, id));
        self.order.insert(pos, id);
        true
    }

    /// Put `id` directly above `other`, adopting its layer.
    pub(crate) fn place_above(&mut self, id: DisplayId, other: DisplayId) -> bool {
        self.place_next_to(id, other, 1)
    }

    /// Put `id` directly below `other`, adopting its layer.
    pub(crate) fn place_below(&mut self, id: DisplayId, other: DisplayId) -> bool {
        self.place_next_to(id, other, 0)
    }

    fn place_next_to(&mut self, id: DisplayId, other: DisplayId, offset: usize) -> bool {
        if id == other || !self.contains(id) {
            return false;
        }
        let Some(layer) = self.get(other).map(|d| d.layer) else {
            return false;
        };

        self.order.retain(|&entry| entry != id);
        if let Some(display) = self.get_mut(id) {
            display.layer = layer;
        }

        let pos = self.position(other).map_or(self.order.len(), |pos| pos + offset);
        self.order.insert(pos, id);
        true
    }

    /// Move `id` to `layer`, below any display already in it.
    pub(crate) fn set_layer(&mut self, id: DisplayId, layer: DisplayLayer) -> bool {
        match self.get_mut(id) {
            Some(display) => display.layer = layer,
            None => return false,
        }

        self.order.retain(|&other| other != id);
        let pos = self
            .order
            .partition_point(|&other| layer_of(&self.slots, other) < layer);
        self.order.insert(pos, id);
        true
    }

    /// Topmost visible display whose hit area contains desktop `(x, y)`.
    ///
    /// With `include_non_interactive` the full bounds count as hit area,
    /// otherwise only the interact area does. With `below`, the search
    /// starts under that display.
    pub fn display_at(
        &self,
        x: i32,
        y: i32,
        include_non_interactive: bool,
        below: Option<DisplayId>,
    ) -> Option<DisplayId> {
        let start = match below {
            Some(below) => self.position(below)?,
            None => self.order.len(),
        };

        self.below(start)
            .find(|d| {
                if !d.visible || !d.bounds().contains(x, y) {
                    return false;
                }
                let area = if include_non_interactive {
                    d.local_bounds()
                } else {
                    d.interact_area
                };
                area.contains(x - d.x, y - d.y)
            })
            .map(|d| d.id)
    }

    /// Every display owned by `owner`, in paint order.
    pub fn owned_by(&self, owner: OwnerId) -> Vec<DisplayId> {
        self.iter()
            .filter(|d| d.owner == Some(owner))
            .map(|d| d.id)
            .collect()
    }
}
