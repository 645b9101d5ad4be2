//! # History
//!
//! Bounded undo/redo over whole-page snapshots.
//!
//! Snapshots are plain records, so they are cheap apart from the image bytes they refer to.
//! Those bytes live once in a side table keyed by content, counted once per reference across
//! both stacks, and dropped when the last reference goes away. Consecutive snapshots usually
//! share every image, so the table stays about as large as the images in use.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::payload::{decode_base64, encode_base64, PayloadKey, PayloadTable};
use crate::persist::records::{GroupRecord, LayerRecord};
use crate::state::LayerStore;

/// Default number of undo steps kept.
pub const HISTORY_LIMIT: usize = 20;

/// The state of a page at one point in time. Image records refer to payloads by key.
#[derive(Clone, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, deserialize_with = "crate::persist::records::lenient_layers")]
    pub images: Vec<LayerRecord>,
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
    #[serde(default)]
    pub group_counter: u32,
}
impl Snapshot {
    /// Every payload reference, once per occurrence.
    pub fn references(&self) -> impl Iterator<Item = &str> + '_ {
        self.images.iter().filter_map(LayerRecord::image_src)
    }
}

/// A snapshot to load, along with the bytes it needs.
#[derive(Debug)]
pub struct Restore {
    pub snapshot: Snapshot,
    pub payloads: PayloadTable,
}

struct Payload {
    bytes: Arc<[u8]>,
    references: usize,
}

/// Whole history as plain data, for persisting.
#[derive(Clone, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryData {
    /// Oldest first.
    #[serde(default)]
    pub undo: Vec<Snapshot>,
    /// Oldest first, the next redo last.
    #[serde(default)]
    pub redo: Vec<Snapshot>,
    /// Key to base64 bytes.
    #[serde(default)]
    pub payloads: BTreeMap<PayloadKey, String>,
}

pub struct HistoryManager {
    limit: usize,
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    payloads: hashbrown::HashMap<PayloadKey, Payload>,
}
impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(HISTORY_LIMIT)
    }
}
impl HistoryManager {
    /// # Panics
    /// If `limit` is zero.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "history needs room for at least one entry");
        Self {
            limit,
            undo: VecDeque::with_capacity(limit + 1),
            redo: Vec::new(),
            payloads: hashbrown::HashMap::new(),
        }
    }
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }
    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }
    /// Number of distinct payloads held.
    #[must_use]
    pub fn payload_count(&self) -> usize {
        self.payloads.len()
    }
    /// Make bytes available to snapshots about to be pushed. Registering does not count as
    /// a reference, and a payload nothing refers to is dropped at the next push.
    pub fn register_payload(&mut self, key: PayloadKey, bytes: Arc<[u8]>) {
        self.payloads.entry(key).or_insert(Payload {
            bytes,
            references: 0,
        });
    }
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<Arc<[u8]>> {
        self.payloads.get(key).map(|payload| payload.bytes.clone())
    }
    /// Snapshot the store, registering the bytes of every image in it.
    pub fn capture(&mut self, store: &LayerStore) -> Snapshot {
        for (key, bytes) in store.payloads() {
            self.register_payload(key, bytes);
        }
        let page = store.page_record();
        Snapshot {
            images: page.images,
            groups: page.groups,
            group_counter: page.group_counter,
        }
    }
    /// Record the state before a change. Drops all redo entries, and the oldest undo entry when
    /// over the limit.
    pub fn push(&mut self, snapshot: Snapshot) {
        for stale in std::mem::take(&mut self.redo) {
            self.release(&stale);
        }
        self.retain(&snapshot);
        self.undo.push_back(snapshot);
        while self.undo.len() > self.limit {
            if let Some(evicted) = self.undo.pop_front() {
                self.release(&evicted);
            }
        }
        self.sweep();
        log::trace!(
            "history: {} undo, {} payloads ({})",
            self.undo.len(),
            self.payloads.len(),
            human_bytes::human_bytes(self.payload_bytes() as f64)
        );
    }
    /// Step back. `current` is the state being left, and becomes the next redo.
    pub fn undo(&mut self, current: Snapshot) -> Option<Restore> {
        let Some(previous) = self.undo.pop_back() else {
            self.sweep();
            return None;
        };
        self.retain(&current);
        self.redo.push(current);
        Some(self.take(previous))
    }
    /// Step forward. `current` is the state being left, and becomes the next undo.
    pub fn redo(&mut self, current: Snapshot) -> Option<Restore> {
        let Some(next) = self.redo.pop() else {
            self.sweep();
            return None;
        };
        self.retain(&current);
        self.undo.push_back(current);
        while self.undo.len() > self.limit {
            if let Some(evicted) = self.undo.pop_front() {
                self.release(&evicted);
            }
        }
        Some(self.take(next))
    }
    /// Forget everything, payloads included.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.payloads.clear();
    }
    /// Copy out the whole history as plain data.
    #[must_use]
    pub fn export(&self) -> HistoryData {
        HistoryData {
            undo: self.undo.iter().cloned().collect(),
            redo: self.redo.clone(),
            payloads: self
                .payloads
                .iter()
                .filter(|(_, payload)| payload.references > 0)
                .map(|(key, payload)| (key.clone(), encode_base64(&payload.bytes)))
                .collect(),
        }
    }
    /// Rebuild from exported data. Reference counts are recounted from the stacks, and
    /// payloads that fail to decode or that nothing refers to are dropped.
    #[must_use]
    pub fn from_data(data: HistoryData, limit: usize) -> Self {
        let mut history = Self::new(limit);
        for (key, encoded) in data.payloads {
            match decode_base64(&encoded) {
                Ok(bytes) => history.register_payload(key, bytes.into()),
                Err(err) => log::warn!("dropping corrupt history payload {key}: {err}"),
            }
        }
        let skip = data.undo.len().saturating_sub(limit);
        for snapshot in data.undo.into_iter().skip(skip) {
            history.retain(&snapshot);
            history.undo.push_back(snapshot);
        }
        let skip = data.redo.len().saturating_sub(limit);
        for snapshot in data.redo.into_iter().skip(skip) {
            history.retain(&snapshot);
            history.redo.push(snapshot);
        }
        history.sweep();
        history
    }

    /// Hand a snapshot out of the stacks, with its bytes.
    fn take(&mut self, snapshot: Snapshot) -> Restore {
        let payloads = snapshot
            .references()
            .filter_map(|key| Some((PayloadKey::new(key), self.resolve(key)?)))
            .collect();
        self.release(&snapshot);
        Restore { snapshot, payloads }
    }
    fn retain(&mut self, snapshot: &Snapshot) {
        for key in snapshot.references() {
            if let Some(payload) = self.payloads.get_mut(key) {
                payload.references += 1;
            }
        }
    }
    fn release(&mut self, snapshot: &Snapshot) {
        for key in snapshot.references() {
            let Some(payload) = self.payloads.get_mut(key) else {
                continue;
            };
            payload.references = payload.references.saturating_sub(1);
            if payload.references == 0 {
                self.payloads.remove(key);
            }
        }
    }
    /// Drop registered payloads nothing refers to.
    fn sweep(&mut self) {
        self.payloads.retain(|_, payload| payload.references > 0);
    }
    fn payload_bytes(&self) -> usize {
        self.payloads.values().map(|payload| payload.bytes.len()).sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::persist::records::{ImageRecord, LayerKindRecord};

    fn image(src: &str) -> LayerRecord {
        LayerRecord {
            kind: LayerKindRecord::Image(ImageRecord {
                src: src.into(),
                file_name: format!("{src}.png"),
            }),
            ..serde_json::from_str(r#"{"type": "text"}"#).unwrap()
        }
    }
    fn snapshot(sources: &[&str], group_counter: u32) -> Snapshot {
        Snapshot {
            images: sources.iter().map(|src| image(src)).collect(),
            groups: Vec::new(),
            group_counter,
        }
    }
    fn bytes(tag: u8) -> Arc<[u8]> {
        Arc::from(vec![tag; 16])
    }

    #[test]
    fn bounded() {
        let mut history = HistoryManager::default();
        for n in 0..25 {
            history.register_payload(PayloadKey::new(format!("img-{n}")), bytes(n as u8));
            history.push(snapshot(&[format!("img-{n}").as_str()], n));
        }
        assert_eq!(history.undo_len(), HISTORY_LIMIT);
        // The five oldest are gone, along with the payloads only they used.
        for n in 0..5 {
            assert!(history.resolve(&format!("img-{n}")).is_none());
        }
        assert!(history.resolve("img-5").is_some());
        assert_eq!(history.payload_count(), HISTORY_LIMIT);
        // Oldest reachable is #5.
        let mut current = snapshot(&[], 99);
        let mut last = None;
        while let Some(restore) = history.undo(current.clone()) {
            current = restore.snapshot.clone();
            last = Some(restore.snapshot);
        }
        assert_eq!(last.map(|s| s.group_counter), Some(5));
    }
    #[test]
    fn counts_per_reference() {
        let mut history = HistoryManager::new(2);
        history.register_payload(PayloadKey::new("img-1"), bytes(1));
        // Two layers using the same image.
        history.push(snapshot(&["img-1", "img-1"], 1));
        history.push(snapshot(&["img-1"], 2));
        history.push(snapshot(&[], 3));
        // First snapshot evicted, the second still holds a reference.
        assert!(history.resolve("img-1").is_some());
        history.push(snapshot(&[], 4));
        assert!(history.resolve("img-1").is_none());
    }
    #[test]
    fn retained_across_both_stacks() {
        let mut history = HistoryManager::default();
        history.register_payload(PayloadKey::new("a"), bytes(1));
        history.push(snapshot(&["a"], 1));
        history.push(snapshot(&[], 2));

        let restore = history.undo(snapshot(&[], 3)).unwrap();
        assert_eq!(restore.snapshot.group_counter, 2);
        assert_eq!(history.redo_len(), 1);
        let restore = history.undo(restore.snapshot).unwrap();
        assert_eq!(restore.snapshot.group_counter, 1);
        // Handed out with its bytes, even though no stack refers to "a" any more.
        assert_eq!(restore.payloads.get("a"), Some(&bytes(1)));
        assert!(history.resolve("a").is_none());
        assert!(history.undo(snapshot(&[], 0)).is_none());

        // Redo it back: the state we leave holds "a" again.
        history.register_payload(PayloadKey::new("a"), bytes(1));
        let restore = history.redo(restore.snapshot).unwrap();
        assert_eq!(restore.snapshot.group_counter, 2);
        assert!(history.resolve("a").is_some());
        assert_eq!(history.undo_len(), 1);

        // A new push clears redo.
        history.push(snapshot(&[], 5));
        assert!(!history.can_redo());
        history.clear();
        assert!(!history.can_undo());
        assert_eq!(history.payload_count(), 0);
    }
    #[test]
    fn unreferenced_registrations_swept() {
        let mut history = HistoryManager::default();
        history.register_payload(PayloadKey::new("orphan"), bytes(9));
        assert!(history.resolve("orphan").is_some());
        history.push(snapshot(&[], 1));
        assert!(history.resolve("orphan").is_none());
    }
    #[test]
    fn export_recounts_on_import() {
        let mut history = HistoryManager::default();
        history.register_payload(PayloadKey::new("a"), bytes(1));
        history.register_payload(PayloadKey::new("b"), bytes(2));
        history.push(snapshot(&["a", "b"], 1));
        history.push(snapshot(&["a"], 2));
        let undone = history.undo(snapshot(&["b"], 3)).unwrap();
        assert_eq!(undone.snapshot.group_counter, 2);

        let mut data = history.export();
        assert_eq!(data.undo.len(), 1);
        assert_eq!(data.redo.len(), 1);
        assert_eq!(data.payloads.len(), 2);
        data.payloads
            .insert(PayloadKey::new("junk"), "not base64!".into());
        let json = serde_json::to_string(&data).unwrap();
        let data: HistoryData = serde_json::from_str(&json).unwrap();

        let mut restored = HistoryManager::from_data(data, HISTORY_LIMIT);
        assert_eq!(restored.undo_len(), 1);
        assert_eq!(restored.redo_len(), 1);
        assert!(restored.resolve("junk").is_none());
        assert_eq!(restored.resolve("b"), Some(bytes(2)));
        // "a" has one reference left, in the undo entry.
        let back = restored.undo(snapshot(&[], 0)).unwrap();
        assert_eq!(back.payloads.get("a"), Some(&bytes(1)));
        assert!(restored.resolve("a").is_none());
    }
}
