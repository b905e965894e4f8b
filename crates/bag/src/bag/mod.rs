//! Bag builders.
//!
//! This module provides:
//! - PredicateSet: named, overridable filter predicates
//! - BagBuilder / BagBuild: state and operations shared by every bag
//! - EventBagBuilder: event filters, time frames and full-text search
//! - CategoryBagBuilder, OrganizerBagBuilder, RegistrationBagBuilder
//! - EventQuery: serialisable event bag definitions
//! - Types: BagContext, Visibility, TableSpec, ObjectType, EventStatus, etc.

mod builder;
mod category;
mod definition;
mod event;
mod organizer;
mod predicate_set;
mod registration;
pub mod search;
pub mod sql;
mod time_frame;
pub mod types;

pub use builder::{BagBuild, BagBuilder, BagQuery};
pub use category::CategoryBagBuilder;
pub use definition::{EventQuery, RecordKinds};
pub use event::EventBagBuilder;
pub use organizer::OrganizerBagBuilder;
pub use predicate_set::PredicateSet;
pub use registration::RegistrationBagBuilder;
pub use time_frame::TimeFrame;
pub use types::{
    BagContext, EventRef, EventStatus, ObjectType, OrderTerm, ResultWindow, SECONDS_PER_DAY,
    SortDirection, TableSpec, Visibility,
};
