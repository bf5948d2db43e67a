//! The sync engine.
//!
//! A sync run for one venue goes through three parts:
//!
//! 1. **Directory**: the venue's picking areas, cached for three days
//! 2. **Resolver**: compiled location rules mapping a raw storage location
//!    to a picking area id
//! 3. **Pipeline**: fetch, persist, classify, export, write back
//!
//! The pipeline is shared (`Arc`) by the scheduler dispatcher and the
//! gateway; runs for the same venue are serialized.

pub mod directory;
pub mod pipeline;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use directory::PickingAreaDirectory;
pub use pipeline::{
    AssignmentPipeline, Classification, PipelineOptions, SyncCounts, SyncReport, UnavailableItem,
    UnavailableReason, VenueOverview,
};
pub use resolver::{CandidateTrace, LocationRules, candidates, normalize};
