//! Durable, append-only event persistence
//!
//! One structured record set per day per event kind (JSON Lines), plus a
//! narrative markdown log per day and a write-once baseline snapshot.
//! Report generation is a pure function of this stored state: the offline
//! aggregation pass replays the structured files, never the narrative.
//!
//! Single writer per file; every append is one complete write so a crash
//! can never leave a torn record ahead of valid ones.

pub mod error;
pub mod events;

pub use error::{StoreError, StoreResult};
pub use events::EventStore;
