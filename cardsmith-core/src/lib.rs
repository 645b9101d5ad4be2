pub mod color;
pub mod editor;
pub mod geometry;
pub mod history;
pub mod id;
pub mod pages;
pub mod payload;
pub mod persist;
pub mod settings;
pub mod state;
pub mod surface;
pub mod util;

pub use editor::Editor;
pub use state::{LayerId, LayerStore};
