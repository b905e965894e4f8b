//! Seminar bag builders.
//!
//! Builders accumulate named filter predicates for events, categories,
//! organizers and registrations and compose them into a single SQL
//! restriction. Record stores execute the resulting queries.

pub mod bag;
pub mod config;
pub mod error;
pub mod store;

pub use bag::{
    BagBuild, BagContext, BagQuery, CategoryBagBuilder, EventBagBuilder, EventQuery,
    OrganizerBagBuilder, RegistrationBagBuilder, TimeFrame, Visibility,
};
pub use error::{BagError, BagResult};
pub use store::{OfflineStore, PgRecordStore, RecordStore, SqliteRecordStore};
