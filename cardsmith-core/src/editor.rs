//! # Editor
//!
//! The single writer. Every mutation of the live page goes through here, so that history,
//! page bookkeeping and autosave scheduling stay in step with the store.
//!
//! Time is always passed in, never read, so the whole thing runs the same under test.

use std::io::{Read, Seek, Write};
use std::time::Instant;

use crate::color::Rgb;
use crate::geometry::Axis;
use crate::history::{HistoryData, HistoryManager, HISTORY_LIMIT};
use crate::pages::{Page, PageManager};
use crate::persist::archive::{self, ArchiveError, MissingAsset};
use crate::persist::autosave::{
    self, AutosaveRecord, AutosaveScheduler, KeyValueStore, PersistError,
};
use crate::persist::Session;
use crate::settings::Settings;
use crate::state::{LayerStore, LoadReport, Naming};
use crate::surface::SurfaceEvent;

/// What an autosave should write.
#[derive(Clone, Debug, PartialEq)]
pub struct AutosavePayload {
    pub state: AutosaveRecord,
    pub history: HistoryData,
}

pub struct Editor {
    store: LayerStore,
    history: HistoryManager,
    pages: PageManager,
    settings: Settings,
    autosave: AutosaveScheduler,
}
impl Default for Editor {
    fn default() -> Self {
        Self::new(Settings::default(), Naming::default(), AutosaveScheduler::default())
    }
}
impl Editor {
    #[must_use]
    pub fn new(settings: Settings, naming: Naming, autosave: AutosaveScheduler) -> Self {
        Self {
            store: LayerStore::new(settings.geometry(), naming),
            history: HistoryManager::new(HISTORY_LIMIT),
            pages: PageManager::default(),
            settings,
            autosave,
        }
    }
    #[must_use]
    pub fn store(&self) -> &LayerStore {
        &self.store
    }
    /// Drain the store's queued changes. Mutations go through [`Self::edit`].
    pub fn take_changes(&mut self) -> Vec<crate::state::Change> {
        self.store.take_changes()
    }
    #[must_use]
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }
    #[must_use]
    pub fn pages(&self) -> &PageManager {
        &self.pages
    }
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.autosave.is_dirty()
    }
    #[must_use]
    pub fn autosave_deadline(&self) -> Option<Instant> {
        self.autosave.deadline()
    }

    /// Run a mutation against the store. If it changed anything, the prior state becomes an
    /// undo step and an autosave is scheduled. Selection changes alone do neither.
    pub fn edit<R>(&mut self, now: Instant, mutate: impl FnOnce(&mut LayerStore) -> R) -> R {
        let revision = self.store.revision();
        let before = self.history.capture(&self.store);
        let out = mutate(&mut self.store);
        if self.store.revision() != revision {
            self.history.push(before);
            self.autosave.mark_dirty(now);
        }
        out
    }
    pub fn undo(&mut self, now: Instant) -> bool {
        let current = self.history.capture(&self.store);
        let Some(restore) = self.history.undo(current) else {
            return false;
        };
        self.apply(now, &restore);
        true
    }
    pub fn redo(&mut self, now: Instant) -> bool {
        let current = self.history.capture(&self.store);
        let Some(restore) = self.history.redo(current) else {
            return false;
        };
        self.apply(now, &restore);
        true
    }
    fn apply(&mut self, now: Instant, restore: &crate::history::Restore) {
        let snapshot = &restore.snapshot;
        let report = self.store.restore(
            &snapshot.images,
            &snapshot.groups,
            snapshot.group_counter,
            &restore.payloads,
        );
        if !report.skipped.is_empty() {
            log::warn!("{} layers lost restoring history", report.skipped.len());
        }
        self.autosave.mark_dirty(now);
    }

    // ======== Settings ========

    /// Edit the global settings. Corrections are re-applied to the store.
    pub fn update_settings(&mut self, now: Instant, update: impl FnOnce(&mut Settings)) {
        let before = self.settings.clone();
        update(&mut self.settings);
        if self.settings != before {
            self.store.set_geometry(self.settings.geometry());
            self.autosave.mark_dirty(now);
        }
    }
    /// Returns the factor actually stored.
    pub fn set_correction(&mut self, now: Instant, axis: Axis, value: f64) -> f64 {
        let mut stored = 0.0;
        self.update_settings(now, |settings| stored = settings.set_correction(axis, value));
        stored
    }
    /// Background of the active page, its override if any.
    #[must_use]
    pub fn background_color(&self) -> Rgb {
        self.pages
            .current()
            .record
            .background_color
            .unwrap_or(self.settings.background_color)
    }
    /// Cutting mark color of the active page, its override if any.
    #[must_use]
    pub fn mark_color(&self) -> Rgb {
        self.pages
            .current()
            .record
            .mark_color
            .unwrap_or(self.settings.mark_color)
    }
    pub fn set_page_background(&mut self, now: Instant, color: Option<Rgb>) {
        self.pages.set_background_override(color);
        self.autosave.mark_dirty(now);
    }
    pub fn set_page_marks(&mut self, now: Instant, color: Option<Rgb>) {
        self.pages.set_mark_override(color);
        self.autosave.mark_dirty(now);
    }

    // ======== Pages ========

    fn live_page(&self) -> Page {
        Page {
            record: self.store.page_record(),
            payloads: self.store.payloads(),
        }
    }
    /// Write the store back into the page list.
    fn stash(&mut self) {
        let page = self.live_page();
        self.pages.store_current(page);
    }
    fn load_current(&mut self) -> LoadReport {
        let page = self.pages.current().clone();
        // Undo steps belong to the page they were taken on.
        self.history.clear();
        self.store.load_page(&page.record, &page.payloads)
    }
    /// Append an empty page and make it active.
    pub fn add_page(&mut self, now: Instant) -> usize {
        self.stash();
        let index = self.pages.add_page();
        self.switch_page(now, index);
        index
    }
    pub fn switch_page(&mut self, now: Instant, index: usize) -> bool {
        self.stash();
        if self.pages.switch_to(index).is_none() {
            return false;
        }
        log::debug!("switching to page {index}");
        self.load_current();
        self.autosave.mark_dirty(now);
        true
    }
    /// Returns the active page afterwards.
    pub fn delete_page(&mut self, now: Instant, index: usize) -> usize {
        self.stash();
        let was_active = index == self.pages.current_index();
        let count = self.pages.len();
        let current = self.pages.delete_page(index);
        if self.pages.len() != count {
            if was_active {
                self.load_current();
            }
            self.autosave.mark_dirty(now);
        }
        current
    }
    pub fn duplicate_page(&mut self, now: Instant, index: usize) -> Option<usize> {
        self.stash();
        let copy = self.pages.duplicate_page(index)?;
        self.autosave.mark_dirty(now);
        Some(copy)
    }

    // ======== Surface ========

    /// Apply something the user did on the surface.
    pub fn handle_event(&mut self, now: Instant, event: SurfaceEvent) -> bool {
        match event {
            SurfaceEvent::SelectionChanged(Some(id)) => self.store.select(id),
            SurfaceEvent::SelectionChanged(None) => {
                self.store.clear_selection();
                true
            }
            SurfaceEvent::ObjectModified(id, placement) => {
                self.edit(now, |store| store.set_placement(id, placement))
            }
            SurfaceEvent::TextEditingExited(id, content) => self.edit(now, |store| {
                if !store.set_text(id, &content) {
                    return false;
                }
                let label = store
                    .layer(id)
                    .and_then(|layer| layer.as_text())
                    .and_then(crate::state::layer::TextData::label);
                if let Some(label) = label {
                    store.rename_layer(id, &label);
                }
                true
            }),
        }
    }

    // ======== Sessions ========

    /// Every page, the active one as currently edited.
    #[must_use]
    pub fn session(&self) -> Session {
        let mut pages = self.pages.pages().to_vec();
        let current = self.pages.current_index();
        let mut live = self.live_page();
        live.record.background_color = pages[current].record.background_color;
        live.record.mark_color = pages[current].record.mark_color;
        pages[current] = live;
        Session {
            pages,
            current_page: current,
            settings: self.settings.clone(),
        }
    }
    /// Replace everything with a session. History is cleared.
    pub fn restore_session(&mut self, session: Session) -> LoadReport {
        self.settings = session.settings;
        self.store.set_geometry(self.settings.geometry());
        self.pages.restore_pages(session.pages, session.current_page);
        self.load_current()
    }
    pub fn export_archive<W: Write + Seek>(&self, writer: W) -> Result<W, ArchiveError> {
        archive::write_archive(&self.session(), writer)
    }
    /// Replace the session with an archive's. Layers with missing images are reported back.
    /// On error nothing changes.
    pub fn import_archive<R: Read + Seek>(
        &mut self,
        now: Instant,
        reader: R,
    ) -> Result<Vec<MissingAsset>, ArchiveError> {
        let imported = archive::read_archive(reader)?;
        let report = self.restore_session(imported.session);
        if !report.skipped.is_empty() {
            log::warn!("{} imported layers could not be decoded", report.skipped.len());
        }
        self.autosave.mark_dirty(now);
        Ok(imported.warnings)
    }

    // ======== Autosave ========

    fn autosave_payload(&self) -> AutosavePayload {
        let session = self.session();
        AutosavePayload {
            state: AutosaveRecord::capture(
                &session.pages,
                session.current_page,
                &session.settings,
            ),
            history: self.history.export(),
        }
    }
    /// What to write, once the quiet period after the last change has passed.
    pub fn poll_autosave(&mut self, now: Instant) -> Option<AutosavePayload> {
        self.autosave.take_due(now).then(|| self.autosave_payload())
    }
    /// What to write right away, if anything changed since the last write.
    pub fn flush_now(&mut self) -> Option<AutosavePayload> {
        self.autosave.flush_now().then(|| self.autosave_payload())
    }
    /// Bring back the last autosaved session and its history. Returns whether there was one.
    pub fn recover(&mut self, store: &(impl KeyValueStore + ?Sized)) -> Result<bool, PersistError> {
        let Some(state) = autosave::load_state(store)? else {
            return Ok(false);
        };
        let report = self.restore_session(state.into_session());
        if !report.skipped.is_empty() {
            log::warn!("{} autosaved layers could not be restored", report.skipped.len());
        }
        match autosave::load_history(store) {
            Ok(Some(history)) => self.history = HistoryManager::from_data(history, HISTORY_LIMIT),
            Ok(None) => (),
            // History is a nicety, the session itself came back fine.
            Err(err) => log::warn!("discarding autosaved history: {err}"),
        }
        Ok(true)
    }
}

/// Write an autosave. Failures are for the caller to log, the next write may well succeed.
pub fn write_autosave(
    store: &(impl KeyValueStore + ?Sized),
    payload: &AutosavePayload,
) -> Result<(), PersistError> {
    autosave::save_state(store, &payload.state)?;
    autosave::save_history(store, &payload.history)
}
