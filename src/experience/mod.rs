//! Experience: persisted shortcuts and tips, curated after each task and
//! retrieved before the next one.

mod curation;
mod retrieval;
mod store;

pub use curation::{ShortcutMiner, TipMiner};
pub use retrieval::{ExperienceQuery, ShortcutSelector, TipSelector};
pub use store::{
    Experience, ExperienceStore, InMemoryExperienceStore, JsonExperienceStore, StoreError,
    SEED_TIPS,
};
