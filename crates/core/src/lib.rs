//! # pickroute core
//!
//! Domain types, traits, and error definitions for the pickroute service.
//! This crate has **no I/O of its own**: it defines the venue model, the
//! remote catalog contract, and the document store contract that the other
//! crates implement against.
//!
//! ## Layout
//!
//! - [`venue`]: per-venue settings: endpoints, location rules, schedule
//! - [`catalog`]: picking areas, item configs, unassigned items, assignments,
//!   and the [`CatalogApi`] trait for the remote catalog
//! - [`store`]: the [`DocumentStore`] trait and typed snapshot accessors
//! - [`token`]: the process-wide OAuth token record and refresher trait

pub mod error;
pub mod venue;
pub mod catalog;
pub mod store;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use error::{AuthError, Error, RemoteError, Result, StoreError};
pub use venue::{
    BinMapping, Endpoints, LocationTransformation, OverflowLocation, Schedule, ScheduleType,
    VenueSettings,
};
pub use catalog::{
    Assignment, CatalogApi, ItemConfig, PickingArea, PickingAreaSnapshot, RawSnapshot,
    UnassignedItem,
};
pub use store::{Collection, DocumentStore, DocumentStoreExt};
pub use token::{TokenRecord, TokenRefresher};
