//! # Pages
//!
//! A project holds one or more independent pages, one of which is loaded into the
//! [`LayerStore`](crate::state::LayerStore) at a time. Pages other than the active one are
//! kept as plain records with their image bytes alongside.

use crate::color::Rgb;
use crate::payload::{PayloadSource, PayloadTable};
use crate::persist::records::PageRecord;

/// One page at rest.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub record: PageRecord,
    /// Bytes of every image the record refers to, by content key.
    pub payloads: PayloadTable,
}
impl Page {
    /// Copy sharing nothing mutable with `self`. Image bytes are immutable and stay shared.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        Self {
            record: self.record.clone(),
            payloads: self.payloads.clone(),
        }
    }
}
impl PayloadSource for Page {
    fn payload(&self, reference: &str) -> Option<std::sync::Arc<[u8]>> {
        self.payloads.payload(reference)
    }
}

/// The ordered pages of a project. Never empty.
#[derive(Debug)]
pub struct PageManager {
    pages: Vec<Page>,
    current: usize,
}
impl Default for PageManager {
    fn default() -> Self {
        Self {
            pages: vec![Page::default()],
            current: 0,
        }
    }
}
impl PageManager {
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }
    /// Always false, there is at least one page.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }
    #[must_use]
    pub fn current(&self) -> &Page {
        &self.pages[self.current]
    }
    #[must_use]
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }
    /// Overwrite the active page, typically with the live store's contents. The page's color
    /// overrides are kept.
    pub fn store_current(&mut self, mut page: Page) {
        let slot = &mut self.pages[self.current];
        page.record.background_color = slot.record.background_color;
        page.record.mark_color = slot.record.mark_color;
        *slot = page;
    }
    /// Append an empty page. The active page does not change.
    pub fn add_page(&mut self) -> usize {
        self.pages.push(Page::default());
        self.pages.len() - 1
    }
    /// Remove a page, returning the active index afterwards. The last page cannot be removed.
    pub fn delete_page(&mut self, index: usize) -> usize {
        if self.pages.len() <= 1 || index >= self.pages.len() {
            return self.current;
        }
        self.pages.remove(index);
        if self.current > index {
            self.current -= 1;
        }
        self.current = self.current.min(self.pages.len() - 1);
        self.current
    }
    /// Make another page active. Returns the page to load, or `None` if nothing changed.
    pub fn switch_to(&mut self, index: usize) -> Option<&Page> {
        if index == self.current || index >= self.pages.len() {
            return None;
        }
        self.current = index;
        Some(&self.pages[index])
    }
    /// Insert an independent copy of a page right after it. The active page does not change.
    pub fn duplicate_page(&mut self, index: usize) -> Option<usize> {
        let copy = self.pages.get(index)?.deep_copy();
        self.pages.insert(index + 1, copy);
        if self.current > index {
            self.current += 1;
        }
        Some(index + 1)
    }
    /// Replace every page. An empty list becomes one empty page.
    pub fn restore_pages(&mut self, pages: Vec<Page>, current: usize) {
        self.pages = if pages.is_empty() {
            vec![Page::default()]
        } else {
            pages
        };
        self.current = current.min(self.pages.len() - 1);
    }
    /// Set or clear the active page's background override.
    pub fn set_background_override(&mut self, color: Option<Rgb>) {
        self.pages[self.current].record.background_color = color;
    }
    /// Set or clear the active page's cutting mark override.
    pub fn set_mark_override(&mut self, color: Option<Rgb>) {
        self.pages[self.current].record.mark_color = color;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn named(counter: u32) -> Page {
        Page {
            record: PageRecord {
                text_counter: counter,
                ..PageRecord::default()
            },
            payloads: PayloadTable::new(),
        }
    }

    #[test]
    fn never_empty() {
        let mut pages = PageManager::default();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages.delete_page(0), 0);
        assert_eq!(pages.len(), 1);
        pages.restore_pages(Vec::new(), 7);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages.current_index(), 0);
    }
    #[test]
    fn delete_adjusts_current() {
        let mut pages = PageManager::default();
        pages.restore_pages((0..4).map(named).collect(), 2);
        // Before the current page: shift down.
        assert_eq!(pages.delete_page(0), 1);
        assert_eq!(pages.current().record.text_counter, 2);
        // Out of range: nothing.
        assert_eq!(pages.delete_page(9), 1);
        // The current page itself: the next page slides in.
        assert_eq!(pages.delete_page(1), 1);
        assert_eq!(pages.current().record.text_counter, 3);
        // Current page is last: clamp.
        assert_eq!(pages.delete_page(1), 0);
        assert_eq!(pages.current().record.text_counter, 1);
    }
    #[test]
    fn switching() {
        let mut pages = PageManager::default();
        let added = pages.add_page();
        assert_eq!(added, 1);
        assert_eq!(pages.current_index(), 0);
        assert!(pages.switch_to(0).is_none());
        assert!(pages.switch_to(5).is_none());
        assert!(pages.switch_to(1).is_some());
        assert_eq!(pages.current_index(), 1);
    }
    #[test]
    fn duplicate_is_independent() {
        let mut pages = PageManager::default();
        pages.restore_pages(vec![named(1), named(2)], 1);
        assert_eq!(pages.duplicate_page(0), Some(1));
        // Still on the same page, which moved along.
        assert_eq!(pages.current_index(), 2);
        assert_eq!(pages.current().record.text_counter, 2);
        assert_eq!(pages.duplicate_page(7), None);

        pages.switch_to(1);
        pages.set_background_override(Some(Rgb::BLACK));
        assert_eq!(pages.page(0).unwrap().record.background_color, None);
        assert_eq!(
            pages.page(1).unwrap().record.background_color,
            Some(Rgb::BLACK)
        );
    }
    #[test]
    fn store_keeps_overrides() {
        let mut pages = PageManager::default();
        pages.set_mark_override(Some(Rgb::WHITE));
        pages.store_current(named(4));
        assert_eq!(pages.current().record.text_counter, 4);
        assert_eq!(pages.current().record.mark_color, Some(Rgb::WHITE));
    }
}
