//! Declarative event bag definitions.
//!
//! An [`EventQuery`] is the serialisable form of an event bag: every field
//! maps onto one builder call, and absent fields leave the builder alone.
//!
//! ```json
//! {
//!   "sourcePages": "12,40",
//!   "recursion": 2,
//!   "timeFrame": "upcoming",
//!   "categories": [3],
//!   "vacancies": true,
//!   "orderBy": { "column": "begin_date" },
//!   "window": { "count": 20 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::builder::BagBuild;
use super::event::EventBagBuilder;
use super::time_frame::TimeFrame;
use super::types::{EventStatus, OrderTerm, ResultWindow, Visibility};
use crate::error::BagResult;
use crate::store::RecordStore;

/// Which event records a bag contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKinds {
    Topics,
    DatesAndSingleEvents,
}

/// Serialisable description of an event bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventQuery {
    /// Comma-separated page uids the events are stored on.
    pub source_pages: Option<String>,
    /// Subpage levels below `source_pages` to include.
    pub recursion: u32,
    pub time_frame: Option<TimeFrame>,
    pub record_kinds: Option<RecordKinds>,
    pub categories: Vec<u32>,
    pub places: Vec<u32>,
    pub cities: Vec<String>,
    pub countries: Vec<String>,
    pub languages: Vec<String>,
    pub event_types: Vec<u32>,
    pub organizers: Vec<u32>,
    pub owner: Option<u32>,
    pub event_manager: Option<u32>,
    pub attendee: Option<u32>,
    pub status: Option<EventStatus>,
    pub requires_registration: bool,
    pub vacancies: bool,
    pub days_before_begin: Option<u32>,
    pub earliest_date: Option<i64>,
    pub latest_date: Option<i64>,
    pub minimum_price: Option<u32>,
    pub maximum_price: Option<u32>,
    pub age: Option<u32>,
    pub search: Option<String>,
    pub visibility: Visibility,
    pub test_mode: bool,
    pub order_by: Option<OrderTerm>,
    pub window: Option<ResultWindow>,
}

impl EventQuery {
    /// Install every filter of this definition on `builder`.
    ///
    /// Stops at the first failing call; filters installed before it stay.
    pub async fn apply(
        &self,
        builder: &mut EventBagBuilder,
        store: &dyn RecordStore,
    ) -> BagResult<()> {
        if let Some(pages) = &self.source_pages {
            builder
                .set_source_pages(store, pages, self.recursion)
                .await?;
        }
        if let Some(frame) = self.time_frame {
            builder.set_time_frame(frame)?;
        }
        match self.record_kinds {
            Some(RecordKinds::Topics) => {
                builder.limit_to_topic_records();
            }
            Some(RecordKinds::DatesAndSingleEvents) => {
                builder.limit_to_date_and_single_records();
            }
            None => {}
        }

        builder
            .limit_to_categories(&self.categories)
            .limit_to_places(&self.places)
            .limit_to_cities(self.cities.as_slice())
            .limit_to_countries(self.countries.as_slice())
            .limit_to_languages(self.languages.as_slice())
            .limit_to_event_types(&self.event_types)
            .limit_to_organizers(&self.organizers);

        if let Some(owner) = self.owner {
            builder.limit_to_owner(owner);
        }
        if let Some(manager) = self.event_manager {
            builder.limit_to_event_manager(manager);
        }
        if let Some(user) = self.attendee {
            builder.limit_to_attendee(user)?;
        }
        if let Some(status) = self.status {
            builder.limit_to_status(status);
        }
        if self.requires_registration {
            builder.limit_to_requires_registration();
        }
        if self.vacancies {
            builder.limit_to_events_with_vacancies();
        }
        if let Some(days) = self.days_before_begin {
            builder.limit_to_days_before_begin_date(days);
        }
        if let Some(timestamp) = self.earliest_date {
            builder.limit_to_earliest_begin_or_end_date(timestamp);
        }
        if let Some(timestamp) = self.latest_date {
            builder.limit_to_latest_begin_or_end_date(timestamp);
        }
        if let Some(price) = self.minimum_price {
            builder.limit_to_minimum_price(price);
        }
        if let Some(price) = self.maximum_price {
            builder.limit_to_maximum_price(price);
        }
        if let Some(age) = self.age {
            builder.limit_to_age(age);
        }
        if let Some(phrase) = &self.search {
            builder.limit_to_full_text_search(phrase);
        }

        match self.visibility {
            Visibility::FrontEnd => {}
            Visibility::ShowHidden => {
                builder.show_hidden_records();
            }
            Visibility::IgnoreTiming => {
                builder.ignore_timing_of_records();
            }
            Visibility::BackEnd => {
                builder.set_back_end_mode();
            }
        }
        if self.test_mode {
            builder.set_test_mode();
        }
        if let Some(term) = &self.order_by {
            builder.set_order_by(&term.column, term.direction);
        }
        if let Some(window) = self.window {
            builder.set_result_window(window.offset, window.count);
        }

        debug!(
            filters = builder.predicates().len(),
            "event query applied"
        );
        Ok(())
    }
}
