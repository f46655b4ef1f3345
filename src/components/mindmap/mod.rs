mod collision;
mod component;
mod config;
mod error;
mod geometry;
mod graph;
mod interaction;
mod measure;
mod persist;
mod render;
mod scene;
mod seed;
mod state;
#[cfg(test)]
mod testing;
mod types;
mod viewport;

pub use component::MindmapCanvas;
pub use persist::{MemoryStore, MindmapStore};
pub use types::MindmapData;
