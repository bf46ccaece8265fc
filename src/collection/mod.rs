//! Labelled image collection: camera frames saved as original/mirror pairs
//! into a class-indexed tree, one quota per capture mode.

mod collector;
mod modes;
mod pipeline;
mod repository;

pub use collector::{ClassStatus, Collector, CollectorSnapshot, ModeProgress};
pub use modes::{
    CollectionMode, CollectorSettings, COLLECTION_MODES, SAVE_COOLDOWN, TARGET_PER_MODE,
};
pub use pipeline::CapturePipeline;
pub use repository::{DirectoryRepository, ImageRepository, SavedPair};
