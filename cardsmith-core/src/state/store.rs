//! # Layer store
//!
//! The authoritative, ordered list of layers and groups of the active page.
//!
//! Index 0 of the list is the front-most layer, so back-to-front render order is the list
//! reversed. Every group's members form one contiguous run of the list; each mutation that
//! could break that re-packs before returning.
//!
//! Caller mistakes (unknown ids, out of range indices, edits of locked layers) are no-ops and
//! never errors. Every effective mutation bumps [`LayerStore::revision`] and queues a
//! [`Change`].

use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::geometry::Geometry;
use crate::payload::{PayloadSource, PayloadTable};
use crate::persist::records::{
    materialize_layer, serialize_layer, GroupRecord, LayerRecord, MaterializeError, PageRecord,
};

use super::group::{Group, GroupId, Naming};
use super::layer::{
    Adjustments, DecodeError, ImageSource, Layer, LayerId, LayerKind, Placement, TextData,
};

/// How far a duplicate is moved from its source, on both axes, in canvas pixels.
pub const DUPLICATE_OFFSET_PX: f64 = 20.0;

/// Notification of a mutation, for whoever mirrors the store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Change {
    Added(LayerId),
    Removed(LayerId),
    /// Placement, flags, content or name of a layer changed.
    Modified(LayerId),
    /// Layers moved within the list.
    Order,
    /// Group membership or the group registry changed.
    Groups,
    Selection(Option<LayerId>),
    /// The whole contents were replaced.
    Reset,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumIter)]
pub enum AlignEdge {
    Left,
    CenterX,
    Right,
    Top,
    CenterY,
    Bottom,
}

#[derive(Debug)]
pub struct SkippedLayer {
    /// Position of the record in the page's layer list.
    pub index: usize,
    pub name: String,
    pub error: MaterializeError,
}

/// Outcome of replacing the store's contents from records.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedLayer>,
}

pub struct LayerStore {
    layers: Vec<Layer>,
    groups: Vec<Group>,
    group_counter: u32,
    text_counter: u32,
    selection: Option<LayerId>,
    geometry: Geometry,
    naming: Naming,
    changes: Vec<Change>,
    revision: u64,
}
impl Default for LayerStore {
    fn default() -> Self {
        Self::new(Geometry::default(), Naming::default())
    }
}
impl LayerStore {
    #[must_use]
    pub fn new(geometry: Geometry, naming: Naming) -> Self {
        Self {
            layers: Vec::new(),
            groups: Vec::new(),
            group_counter: 0,
            text_counter: 0,
            selection: None,
            geometry,
            naming,
            changes: Vec::new(),
            revision: 0,
        }
    }

    // ======== Reads ========

    /// All layers, front to back.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
    #[must_use]
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id() == id)
    }
    #[must_use]
    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id() == id)
    }
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|group| group.id() == id)
    }
    /// Members of a group, front to back.
    pub fn members(&self, group: GroupId) -> impl Iterator<Item = &Layer> + '_ {
        self.layers
            .iter()
            .filter(move |layer| layer.group == Some(group))
    }
    #[must_use]
    pub fn selection(&self) -> Option<LayerId> {
        self.selection
    }
    #[must_use]
    pub fn group_counter(&self) -> u32 {
        self.group_counter
    }
    #[must_use]
    pub fn text_counter(&self) -> u32 {
        self.text_counter
    }
    #[must_use]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }
    /// Swap in new correction factors. Layers keep their canvas positions.
    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
    }
    /// Increases with every effective mutation. Selection changes do not count.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }
    /// Drain the queued change notifications.
    pub fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }
    /// Where a group sits in the list: the start of its run, or its remembered position if empty.
    #[must_use]
    pub fn group_position(&self, group: GroupId) -> Option<usize> {
        match self.run_of(group) {
            Some(run) => Some(*run.start()),
            None => self.group(group).map(|group| self.resolve_hint(group)),
        }
    }
    /// Groups in list order. An empty group sorts before a populated one at the same position.
    #[must_use]
    pub fn group_order(&self) -> Vec<GroupId> {
        let mut order: Vec<_> = self
            .groups
            .iter()
            .map(|group| {
                let run = self.run_of(group.id());
                let position = run
                    .as_ref()
                    .map_or_else(|| self.resolve_hint(group), |run| *run.start());
                (position, run.is_some(), group.id())
            })
            .collect();
        // Stable, so ties keep registry order.
        order.sort_by_key(|&(position, populated, _)| (position, populated));
        order.into_iter().map(|(_, _, id)| id).collect()
    }
    /// Whether every group's members form a single run.
    #[must_use]
    pub fn groups_are_contiguous(&self) -> bool {
        let mut finished = hashbrown::HashSet::new();
        let mut current = None;
        for layer in &self.layers {
            if layer.group != current {
                if let Some(done) = current {
                    finished.insert(done);
                }
                if let Some(group) = layer.group {
                    if finished.contains(&group) {
                        return false;
                    }
                }
                current = layer.group;
            }
        }
        true
    }

    // ======== Creation ========

    /// Add an image, scaled to fit the printable frame and centered on it, at the front.
    ///
    /// A source that fails to decode leaves the store untouched.
    pub fn add_image(
        &mut self,
        bytes: impl Into<Arc<[u8]>>,
        file_name: &str,
    ) -> Result<LayerId, DecodeError> {
        let source = ImageSource::decode(bytes.into(), file_name)?;
        let frame = self.geometry.printable_frame();
        let [width, height] = source.size();
        let scale = (frame.width / f64::from(width)).min(frame.height / f64::from(height));
        let placement = Placement {
            scale_x: scale,
            scale_y: scale,
            ..Placement::at(frame.center_x(), frame.center_y())
        };
        let layer = Layer::new(file_name.to_owned(), placement, LayerKind::Image(source));
        Ok(self.insert_front(layer))
    }
    /// Add a text layer with default typography, centered on the printable frame, at the front.
    pub fn add_text(&mut self, content: Option<&str>) -> LayerId {
        self.text_counter += 1;
        let name = (self.naming.text)(self.text_counter);
        let content = content.map_or_else(self.naming.text_placeholder, str::to_owned);
        let frame = self.geometry.printable_frame();
        let layer = Layer::new(
            name,
            Placement::at(frame.center_x(), frame.center_y()),
            LayerKind::Text(TextData::new(content)),
        );
        self.insert_front(layer)
    }
    fn insert_front(&mut self, layer: Layer) -> LayerId {
        let id = layer.id();
        log::trace!("adding {id}");
        self.layers.insert(0, layer);
        self.hints_after_insert(0);
        self.touch(Change::Added(id));
        id
    }
    /// Copy a layer in directly in front of it, offset by [`DUPLICATE_OFFSET_PX`]. The copy
    /// keeps the source's group and shares its image bytes, and becomes the selection if it can.
    pub fn duplicate_layer(&mut self, id: LayerId) -> Option<LayerId> {
        let index = self.index_of(id)?;
        let copy = self.layers[index].duplicate(DUPLICATE_OFFSET_PX);
        let copy_id = copy.id();
        let selectable = copy.is_selectable();
        self.layers.insert(index, copy);
        // An empty group just in front of the source stays in front of the copy too.
        self.hints_after_insert(index + 1);
        self.touch(Change::Added(copy_id));
        if selectable {
            self.select(copy_id);
        }
        Some(copy_id)
    }

    // ======== Removal ========

    /// Remove a layer. Unknown ids are ignored.
    pub fn remove_layer(&mut self, id: LayerId) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        if self.selection == Some(id) {
            self.clear_selection();
        }
        let layer = self.layers.remove(index);
        self.hints_after_remove(index);
        if let Some(group) = layer.group {
            self.remember_if_empty(group, index);
        }
        self.touch(Change::Removed(id));
    }
    /// Remove every layer and group. Counters are kept, so names and ids are not reissued.
    pub fn clear(&mut self) {
        if self.layers.is_empty() && self.groups.is_empty() {
            return;
        }
        self.clear_selection();
        for layer in std::mem::take(&mut self.layers) {
            self.changes.push(Change::Removed(layer.id()));
        }
        self.groups.clear();
        self.touch(Change::Reset);
    }

    // ======== Ordering ========

    /// Move the layer at `from` so that it ends up at `to`.
    ///
    /// A grouped layer dropped away from the rest of its group leaves the group. A layer dropped
    /// strictly inside another group's run is pushed out of the run, past it in the direction
    /// it was travelling.
    pub fn reorder(&mut self, from: usize, to: usize) {
        let len = self.layers.len();
        if from >= len || to >= len || from == to {
            return;
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);

        if let Some(group) = self.layers[to].group {
            let has_others = self
                .layers
                .iter()
                .enumerate()
                .any(|(idx, layer)| idx != to && layer.group == Some(group));
            let adjacent = [to.checked_sub(1), to.checked_add(1)]
                .into_iter()
                .flatten()
                .filter_map(|idx| self.layers.get(idx))
                .any(|layer| layer.group == Some(group));
            if has_others && !adjacent {
                log::trace!("{} left {group}", self.layers[to].id());
                self.layers[to].group = None;
            }
        }
        if let Some(run) = self.enclosing_run(to) {
            let layer = self.layers.remove(to);
            // The run shrank by one when the layer was taken out of it.
            let dest = if to < from { *run.start() } else { *run.end() };
            self.layers.insert(dest, layer);
        }
        self.touch(Change::Order);
    }
    /// Move a whole group so its run starts at `index` of the list without it. An empty group
    /// just remembers the position.
    pub fn move_group_to_position(&mut self, group: GroupId, index: usize) {
        let Some(slot) = self.group_slot(group) else {
            return;
        };
        match self.run_of(group) {
            None => {
                self.groups[slot].position_hint = Some(index.min(self.layers.len()));
                self.touch(Change::Groups);
            }
            Some(run) => {
                self.splice_run(run, index);
                self.touch(Change::Order);
            }
        }
    }
    /// Move a group to directly in front of `target`.
    ///
    /// Empty groups have no run to move, so their position hints stand in:
    /// * populated before populated: the run moves in front of the target's run.
    /// * empty before populated: the hint becomes the start of the target's run.
    /// * populated before empty: the run moves to the target's hint, and the target's hint
    ///   moves to just behind the run.
    /// * empty before empty: the group takes the target's hint, and the target's hint moves
    ///   one place back.
    pub fn move_group_before(&mut self, group: GroupId, target: GroupId) {
        if group == target {
            return;
        }
        let (Some(slot), Some(target_slot)) = (self.group_slot(group), self.group_slot(target))
        else {
            return;
        };
        match (self.run_of(group), self.run_of(target)) {
            (Some(run), Some(_)) => {
                let block: Vec<Layer> = self.layers.drain(run).collect();
                let dest = self.run_of(target).map_or(0, |run| *run.start());
                self.layers.splice(dest..dest, block);
                self.touch(Change::Order);
            }
            (None, Some(target_run)) => {
                self.groups[slot].position_hint = Some(*target_run.start());
                self.touch(Change::Groups);
            }
            (Some(run), None) => {
                let block_len = run.end() - run.start() + 1;
                let hint = self.resolve_hint(&self.groups[target_slot]);
                let dest = self.splice_run(run, hint);
                self.groups[target_slot].position_hint = Some(dest + block_len);
                self.touch(Change::Order);
            }
            (None, None) => {
                let hint = self.resolve_hint(&self.groups[target_slot]);
                self.groups[slot].position_hint = Some(hint);
                self.groups[target_slot].position_hint = Some(hint + 1);
                self.touch(Change::Groups);
            }
        }
    }
    /// Take out the layers of `run` and reinsert them as one block at `index` of what remains,
    /// never splitting another group's run. Returns where the block landed.
    fn splice_run(&mut self, run: RangeInclusive<usize>, index: usize) -> usize {
        let block: Vec<Layer> = self.layers.drain(run).collect();
        let mut dest = index.min(self.layers.len());
        if let Some(foreign) = self.run_across_gap(dest) {
            dest = *foreign.end() + 1;
        }
        self.layers.splice(dest..dest, block);
        dest
    }

    // ======== Groups ========

    /// Create an empty, visible group at the front. Ids and default names come from the group
    /// counter, which never goes down.
    pub fn create_group(&mut self) -> GroupId {
        self.group_counter += 1;
        let id = GroupId(self.group_counter);
        let mut group = Group::new(id, (self.naming.group)(self.group_counter));
        group.position_hint = Some(0);
        self.groups.push(group);
        self.touch(Change::Groups);
        id
    }
    /// Delete a group *and every layer in it*. See [`Self::ungroup`] to keep the layers.
    pub fn delete_group(&mut self, group: GroupId) {
        let Some(slot) = self.group_slot(group) else {
            return;
        };
        if self
            .selection
            .and_then(|id| self.layer(id))
            .is_some_and(|layer| layer.group == Some(group))
        {
            self.clear_selection();
        }
        self.groups.remove(slot);
        // Back to front, so earlier indices stay valid.
        for index in (0..self.layers.len()).rev() {
            if self.layers[index].group == Some(group) {
                let layer = self.layers.remove(index);
                self.hints_after_remove(index);
                self.changes.push(Change::Removed(layer.id()));
            }
        }
        self.touch(Change::Groups);
    }
    /// Delete a group, keeping its layers in place.
    pub fn ungroup(&mut self, group: GroupId) {
        let Some(slot) = self.group_slot(group) else {
            return;
        };
        for layer in &mut self.layers {
            if layer.group == Some(group) {
                layer.group = None;
            }
        }
        self.groups.remove(slot);
        self.touch(Change::Groups);
    }
    /// Put a layer into a group, or take it out of its group with `None`.
    ///
    /// Joining a populated group moves the layer next to the group's run: in front of it if
    /// the layer was in front, behind it otherwise. A layer leaving from the middle of its
    /// group's run moves to just behind the run.
    pub fn set_group(&mut self, id: LayerId, group: Option<GroupId>) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        if group.is_some_and(|group| self.group_slot(group).is_none()) {
            return;
        }
        let current = self.layers[index].group;
        if current == group {
            return;
        }
        if let Some(old) = current {
            self.leave_group(index, old);
        }
        if let Some(new) = group {
            self.join_group(id, new);
        }
        self.touch(Change::Groups);
    }
    fn leave_group(&mut self, index: usize, group: GroupId) {
        let run = self.run_of(group);
        self.layers[index].group = None;
        match run {
            Some(run) if *run.start() < index && index < *run.end() => {
                let layer = self.layers.remove(index);
                self.layers.insert(*run.end(), layer);
            }
            _ => self.remember_if_empty(group, index),
        }
    }
    fn join_group(&mut self, id: LayerId, group: GroupId) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        match self.run_of(group) {
            None => {
                self.layers[index].group = Some(group);
                if let Some(slot) = self.group_slot(group) {
                    self.groups[slot].position_hint = None;
                }
            }
            Some(run) => {
                let mut layer = self.layers.remove(index);
                layer.group = Some(group);
                // Outside the run, so only a layer in front of it shifts the run's indices.
                let dest = if index < *run.start() {
                    *run.start() - 1
                } else {
                    *run.end() + 1
                };
                self.layers.insert(dest, layer);
            }
        }
    }
    pub fn rename_group(&mut self, group: GroupId, name: &str) -> bool {
        let name = name.trim();
        let Some(slot) = self.group_slot(group) else {
            return false;
        };
        if name.is_empty() || self.groups[slot].name == name {
            return false;
        }
        name.clone_into(&mut self.groups[slot].name);
        self.touch(Change::Groups);
        true
    }
    /// Flip a group's visibility and apply it to every member. Returns the new visibility.
    pub fn toggle_group_visibility(&mut self, group: GroupId) -> Option<bool> {
        let slot = self.group_slot(group)?;
        let visible = !self.groups[slot].visible;
        self.groups[slot].visible = visible;
        let mut modified = Vec::new();
        for layer in &mut self.layers {
            if layer.group == Some(group) && layer.visible != visible {
                layer.visible = visible;
                modified.push(layer.id());
            }
        }
        if !visible
            && self
                .selection
                .is_some_and(|selected| modified.contains(&selected))
        {
            self.clear_selection();
        }
        self.changes
            .extend(modified.into_iter().map(Change::Modified));
        self.touch(Change::Groups);
        Some(visible)
    }

    // ======== Flags and selection ========

    /// Returns the new visibility.
    pub fn toggle_visibility(&mut self, id: LayerId) -> Option<bool> {
        let index = self.index_of(id)?;
        let visible = !self.layers[index].visible;
        self.layers[index].visible = visible;
        if !visible && self.selection == Some(id) {
            self.clear_selection();
        }
        self.touch(Change::Modified(id));
        Some(visible)
    }
    /// Returns the new lock state.
    pub fn toggle_lock(&mut self, id: LayerId) -> Option<bool> {
        let index = self.index_of(id)?;
        let locked = !self.layers[index].locked;
        self.layers[index].locked = locked;
        if locked && self.selection == Some(id) {
            self.clear_selection();
        }
        self.touch(Change::Modified(id));
        Some(locked)
    }
    /// Select a layer. Hidden and locked layers cannot be selected.
    pub fn select(&mut self, id: LayerId) -> bool {
        if !self.layer(id).is_some_and(Layer::is_selectable) {
            return false;
        }
        if self.selection != Some(id) {
            self.selection = Some(id);
            self.changes.push(Change::Selection(Some(id)));
        }
        true
    }
    pub fn clear_selection(&mut self) {
        if self.selection.take().is_some() {
            self.changes.push(Change::Selection(None));
        }
    }

    // ======== Edits ========

    /// Replace a layer's placement. Locked layers refuse.
    pub fn set_placement(&mut self, id: LayerId, placement: Placement) -> bool {
        let Some(layer) = self.editable_mut(id) else {
            return false;
        };
        let placement = placement.sanitized();
        if layer.placement == placement {
            return true;
        }
        layer.placement = placement;
        self.touch(Change::Modified(id));
        true
    }
    /// Replace a text layer's content. Locked layers and image layers refuse.
    pub fn set_text(&mut self, id: LayerId, content: &str) -> bool {
        self.update_text(id, |text| content.clone_into(&mut text.content))
    }
    /// Edit a text layer's content or typography.
    pub fn update_text(&mut self, id: LayerId, edit: impl FnOnce(&mut TextData)) -> bool {
        let Some(layer) = self.editable_mut(id) else {
            return false;
        };
        let LayerKind::Text(text) = &mut layer.kind else {
            return false;
        };
        let mut edited = text.clone();
        edit(&mut edited);
        if !(edited.font_size.is_finite() && edited.font_size > 0.0) {
            edited.font_size = text.font_size;
        }
        if !(edited.width.is_finite() && edited.width > 0.0) {
            edited.width = text.width;
        }
        if edited == *text {
            return true;
        }
        *text = edited;
        self.touch(Change::Modified(id));
        true
    }
    /// Rename a layer. Blank names are refused.
    pub fn rename_layer(&mut self, id: LayerId, name: &str) -> bool {
        let name = name.trim();
        let Some(index) = self.index_of(id) else {
            return false;
        };
        if name.is_empty() || self.layers[index].name == name {
            return false;
        }
        name.clone_into(&mut self.layers[index].name);
        self.touch(Change::Modified(id));
        true
    }
    /// Set or clear a layer's color adjustments. Neutral adjustments are stored as none.
    pub fn set_adjustments(&mut self, id: LayerId, adjustments: Option<Adjustments>) -> bool {
        let Some(layer) = self.editable_mut(id) else {
            return false;
        };
        let adjustments = adjustments
            .map(Adjustments::sanitized)
            .filter(|adjustments| !adjustments.is_neutral());
        if layer.adjustments == adjustments {
            return true;
        }
        layer.adjustments = adjustments;
        self.touch(Change::Modified(id));
        true
    }
    /// Line the selection's rotated bounds up with the nearest card, by horizontal center.
    pub fn align_selected(&mut self, edge: AlignEdge) -> bool {
        let Some(id) = self.selection else {
            return false;
        };
        let Some(index) = self.index_of(id) else {
            return false;
        };
        if self.layers[index].locked {
            return false;
        }
        let bounds = self.layers[index].bounds();
        let card = self.geometry.card_frames()[self.geometry.nearest_card(bounds.center_x())];
        let (dx, dy) = match edge {
            AlignEdge::Left => (card.left() - bounds.left(), 0.0),
            AlignEdge::CenterX => (card.center_x() - bounds.center_x(), 0.0),
            AlignEdge::Right => (card.right() - bounds.right(), 0.0),
            AlignEdge::Top => (0.0, card.top() - bounds.top()),
            AlignEdge::CenterY => (0.0, card.center_y() - bounds.center_y()),
            AlignEdge::Bottom => (0.0, card.bottom() - bounds.bottom()),
        };
        let placement = &mut self.layers[index].placement;
        placement.x += dx;
        placement.y += dy;
        self.touch(Change::Modified(id));
        true
    }

    // ======== Records ========

    /// Plain record of the current contents. Color overrides are not the store's to fill in.
    #[must_use]
    pub fn page_record(&self) -> PageRecord {
        PageRecord {
            images: self.layers.iter().map(serialize_layer).collect(),
            groups: self.groups.iter().map(GroupRecord::from).collect(),
            group_counter: self.group_counter,
            text_counter: self.text_counter,
            background_color: None,
            mark_color: None,
        }
    }
    /// Bytes of every image in the store, by content key.
    #[must_use]
    pub fn payloads(&self) -> PayloadTable {
        self.layers
            .iter()
            .filter_map(Layer::as_image)
            .map(|image| (image.key().clone(), image.bytes().clone()))
            .collect()
    }
    /// Replace the contents with a page. Layers whose images cannot be found or decoded are
    /// skipped and reported.
    pub fn load_page(&mut self, page: &PageRecord, payloads: &impl PayloadSource) -> LoadReport {
        let report = self.replace_contents(&page.images, &page.groups, payloads);
        self.group_counter = page.group_counter.max(self.max_group_id());
        self.text_counter = page.text_counter;
        report
    }
    /// Replace the contents with a history snapshot. Counters never go backwards.
    pub fn restore(
        &mut self,
        images: &[LayerRecord],
        groups: &[GroupRecord],
        group_counter: u32,
        payloads: &impl PayloadSource,
    ) -> LoadReport {
        let report = self.replace_contents(images, groups, payloads);
        self.group_counter = self
            .group_counter
            .max(group_counter)
            .max(self.max_group_id());
        report
    }
    fn replace_contents(
        &mut self,
        images: &[LayerRecord],
        groups: &[GroupRecord],
        payloads: &impl PayloadSource,
    ) -> LoadReport {
        let mut report = LoadReport::default();
        let mut layers = Vec::with_capacity(images.len());
        for (index, record) in images.iter().enumerate() {
            match materialize_layer(record, payloads) {
                Ok(layer) => layers.push(layer),
                Err(error) => {
                    log::warn!("skipping layer {index} {:?}: {error}", record.name);
                    report.skipped.push(SkippedLayer {
                        index,
                        name: record.name.clone(),
                        error,
                    });
                }
            }
        }
        let mut registry: Vec<Group> = Vec::with_capacity(groups.len());
        for record in groups {
            if registry.iter().any(|group| group.id() == record.id) {
                log::warn!("ignoring duplicate {}", record.id);
                continue;
            }
            registry.push(Group::from(record));
        }
        for layer in &mut layers {
            if let Some(group) = layer.group {
                if !registry.iter().any(|known| known.id() == group) {
                    log::warn!("{} refers to unknown {group}", layer.id());
                    layer.group = None;
                }
            }
        }
        self.clear_selection();
        self.layers = layers;
        self.groups = registry;
        self.repack();
        report.loaded = self.layers.len();
        self.touch(Change::Reset);
        report
    }
    fn max_group_id(&self) -> u32 {
        self.groups
            .iter()
            .map(|group| group.id().0)
            .max()
            .unwrap_or(0)
    }
    /// Gather every group's members at the position of its front-most member, keeping
    /// relative order everywhere.
    fn repack(&mut self) {
        let mut members: hashbrown::HashMap<GroupId, Vec<usize>> = hashbrown::HashMap::new();
        for (idx, layer) in self.layers.iter().enumerate() {
            if let Some(group) = layer.group {
                members.entry(group).or_default().push(idx);
            }
        }
        let mut order = Vec::with_capacity(self.layers.len());
        for (idx, layer) in self.layers.iter().enumerate() {
            match layer.group {
                None => order.push(idx),
                Some(group) => {
                    if let Some(run) = members.remove(&group) {
                        order.extend(run);
                    }
                }
            }
        }
        if order.iter().copied().eq(0..self.layers.len()) {
            return;
        }
        log::warn!("re-packing non-contiguous groups");
        let mut slots: Vec<Option<Layer>> = std::mem::take(&mut self.layers)
            .into_iter()
            .map(Some)
            .collect();
        self.layers = order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect();
    }

    // ======== Internals ========

    fn touch(&mut self, change: Change) {
        self.revision += 1;
        self.changes.push(change);
    }
    fn group_slot(&self, group: GroupId) -> Option<usize> {
        self.groups.iter().position(|known| known.id() == group)
    }
    /// Layer that may be edited: present and unlocked.
    fn editable_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers
            .iter_mut()
            .find(|layer| layer.id() == id)
            .filter(|layer| !layer.locked)
    }
    /// First to last member of a group, or `None` if it has none.
    fn run_of(&self, group: GroupId) -> Option<RangeInclusive<usize>> {
        let start = self
            .layers
            .iter()
            .position(|layer| layer.group == Some(group))?;
        let end = self
            .layers
            .iter()
            .rposition(|layer| layer.group == Some(group))?;
        Some(start..=end)
    }
    /// The run of another group that the layer at `index` sits strictly inside of.
    fn enclosing_run(&self, index: usize) -> Option<RangeInclusive<usize>> {
        let before = self.layers.get(index.checked_sub(1)?)?.group?;
        let after = self.layers.get(index + 1)?.group?;
        if before != after || self.layers[index].group == Some(before) {
            return None;
        }
        self.run_of(before)
    }
    /// The run an insertion at `index` would split.
    fn run_across_gap(&self, index: usize) -> Option<RangeInclusive<usize>> {
        let before = self.layers.get(index.checked_sub(1)?)?.group?;
        let after = self.layers.get(index)?.group?;
        (before == after).then(|| self.run_of(before)).flatten()
    }
    fn resolve_hint(&self, group: &Group) -> usize {
        group.position_hint.unwrap_or(0).min(self.layers.len())
    }
    /// Keep remembered positions on the same neighbours after a layer was inserted at `index`.
    /// Positions at or behind `index` move back by one. Populated groups ignore their hint.
    fn hints_after_insert(&mut self, index: usize) {
        for group in &mut self.groups {
            if let Some(hint) = group.position_hint.as_mut().filter(|hint| **hint >= index) {
                *hint += 1;
            }
        }
    }
    /// As [`Self::hints_after_insert`], for the removal of the layer that was at `index`.
    fn hints_after_remove(&mut self, index: usize) {
        for group in &mut self.groups {
            if let Some(hint) = group.position_hint.as_mut().filter(|hint| **hint > index) {
                *hint -= 1;
            }
        }
    }
    fn remember_if_empty(&mut self, group: GroupId, index: usize) {
        if self.run_of(group).is_some() {
            return;
        }
        if let Some(slot) = self.group_slot(group) {
            self.groups[slot].position_hint = Some(index.min(self.layers.len()));
        }
    }
}
