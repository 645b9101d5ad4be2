//! # Persistence
//!
//! Two ways out of memory, sharing one record shape ([`records`]):
//! * [`autosave`] - the whole session, written to a local key-value store after every change
//!   settles, and read back on startup.
//! * [`archive`] - a portable ZIP project file, saved and opened explicitly by the user.

pub mod archive;
pub mod autosave;
pub mod naming;
pub mod records;

use crate::pages::Page;
use crate::settings::Settings;

/// Everything needed to bring a session back: all pages and the global settings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub pages: Vec<Page>,
    pub current_page: usize,
    pub settings: Settings,
}
