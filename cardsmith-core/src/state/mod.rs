//! # State
//!
//! The live, in-memory contents of the active page.

pub mod group;
pub mod layer;
pub mod store;

pub use group::{Group, GroupId, Naming};
pub use layer::{Layer, LayerId, LayerKind, Placement};
pub use store::{AlignEdge, Change, LayerStore, LoadReport};
