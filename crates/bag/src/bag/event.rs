//! Event bag builder.
//!
//! Events come in three shapes sharing one table: single events, topics and
//! dates. Topic-level data (texts, categories, event type, target groups,
//! prices) lives on the topic for dates; everything else on the record.

use sea_query::{Alias, Expr, ExprTrait, Func, Query, SimpleExpr, SubQueryStatement};

use super::builder::{BagBuild, BagBuilder};
use super::search;
use super::sql::{
    EVENTS, EVENTS_CATEGORIES_MM, EVENTS_MANAGERS_MM, EVENTS_ORGANIZERS_MM, EVENTS_PLACES_MM,
    EVENTS_TARGET_GROUPS_MM, PLACES, REGISTRATIONS, TARGET_GROUPS, TOPICS, any_of, col, linked,
    object_type_is, object_type_is_not, record_correlation, select_column, select_one,
    topic_correlation, topic_records, topic_uid_in,
};
use super::time_frame::TimeFrame;
use super::types::{BagContext, EventRef, EventStatus, ObjectType, SECONDS_PER_DAY, TableSpec};
use crate::error::{BagError, BagResult};

const EVENT_TABLE: TableSpec = TableSpec {
    name: EVENTS,
    has_hidden: true,
    has_timing: true,
};

/// Builds bags of events.
#[derive(Debug, Clone)]
pub struct EventBagBuilder {
    base: BagBuilder,
}

impl BagBuild for EventBagBuilder {
    fn base(&self) -> &BagBuilder {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BagBuilder {
        &mut self.base
    }
}

impl EventBagBuilder {
    pub fn new(context: BagContext) -> BagResult<Self> {
        Ok(Self {
            base: BagBuilder::new(EVENT_TABLE, context)?,
        })
    }

    fn set(&mut self, key: &'static str, predicate: SimpleExpr) -> &mut Self {
        self.base.set_predicate(key, predicate);
        self
    }

    fn unset(&mut self, key: &str) -> &mut Self {
        self.base.remove_predicate(key);
        self
    }

    /// Install `predicate` under `key`, or remove `key` when there is none.
    fn set_or_unset(&mut self, key: &'static str, predicate: Option<SimpleExpr>) -> &mut Self {
        match predicate {
            Some(predicate) => self.set(key, predicate),
            None => self.unset(key),
        }
    }

    fn now(&self) -> i64 {
        self.context().now()
    }

    /// Events whose topic is in any of `categories`. An empty list removes the limit.
    pub fn limit_to_categories(&mut self, categories: &[u32]) -> &mut Self {
        let predicate = (!categories.is_empty()).then(|| {
            linked_to(
                EVENTS_CATEGORIES_MM,
                topic_correlation(EVENTS_CATEGORIES_MM),
                categories,
            )
        });
        self.set_or_unset("categories", predicate)
    }

    /// Events taking place at any of `places`. An empty list removes the limit.
    pub fn limit_to_places(&mut self, places: &[u32]) -> &mut Self {
        let predicate = (!places.is_empty()).then(|| {
            linked_to(
                EVENTS_PLACES_MM,
                record_correlation(EVENTS_PLACES_MM),
                places,
            )
        });
        self.set_or_unset("places", predicate)
    }

    /// Events taking place in any of `cities`. An empty list removes the limit.
    pub fn limit_to_cities<S: AsRef<str>>(&mut self, cities: &[S]) -> &mut Self {
        let predicate = (!cities.is_empty()).then(|| place_column_in("city", cities));
        self.set_or_unset("cities", predicate)
    }

    /// Events taking place in any of the given ISO country codes. An empty
    /// list removes the limit.
    pub fn limit_to_countries<S: AsRef<str>>(&mut self, countries: &[S]) -> &mut Self {
        let predicate = (!countries.is_empty()).then(|| place_column_in("country", countries));
        self.set_or_unset("countries", predicate)
    }

    /// Events held in any of the given language codes. An empty list removes the limit.
    pub fn limit_to_languages<S: AsRef<str>>(&mut self, languages: &[S]) -> &mut Self {
        let predicate = (!languages.is_empty()).then(|| {
            col(EVENTS, "language").is_in(languages.iter().map(|l| l.as_ref().to_string()))
        });
        self.set_or_unset("languages", predicate)
    }

    /// Events whose topic has any of `event_types`. An empty list removes the limit.
    pub fn limit_to_event_types(&mut self, event_types: &[u32]) -> &mut Self {
        let predicate = (!event_types.is_empty()).then(|| {
            let mut topics = topic_records();
            topics.and_where(col(TOPICS, "event_type").is_in(event_types.iter().copied()));
            topic_uid_in(topics)
        });
        self.set_or_unset("eventTypes", predicate)
    }

    /// Events organized by any of `organizers`. An empty list removes the limit.
    pub fn limit_to_organizers(&mut self, organizers: &[u32]) -> &mut Self {
        let predicate = (!organizers.is_empty()).then(|| {
            linked_to(
                EVENTS_ORGANIZERS_MM,
                record_correlation(EVENTS_ORGANIZERS_MM),
                organizers,
            )
        });
        self.set_or_unset("organizers", predicate)
    }

    /// Events owned by front-end user `owner`. Zero removes the limit.
    pub fn limit_to_owner(&mut self, owner: u32) -> &mut Self {
        let predicate = (owner > 0).then(|| col(EVENTS, "owner_feuser").eq(owner));
        self.set_or_unset("owner", predicate)
    }

    pub fn remove_limit_to_owner(&mut self) -> &mut Self {
        self.unset("owner")
    }

    /// Events managed by front-end user `manager`. Zero removes the limit.
    pub fn limit_to_event_manager(&mut self, manager: u32) -> &mut Self {
        let predicate = (manager > 0).then(|| {
            linked_to(
                EVENTS_MANAGERS_MM,
                record_correlation(EVENTS_MANAGERS_MM),
                &[manager],
            )
        });
        self.set_or_unset("eventManager", predicate)
    }

    pub fn remove_limit_to_event_manager(&mut self) -> &mut Self {
        self.unset("eventManager")
    }

    /// Events `user` holds a regular or queued registration for.
    pub fn limit_to_attendee(&mut self, user: u32) -> BagResult<&mut Self> {
        if user == 0 {
            return Err(BagError::invalid("attendee uid must be positive"));
        }

        let mut registrations = select_one(REGISTRATIONS);
        registrations
            .and_where(
                col(REGISTRATIONS, "seminar").equals((Alias::new(EVENTS), Alias::new("uid"))),
            )
            .and_where(col(REGISTRATIONS, "user").eq(user))
            .and_where(col(REGISTRATIONS, "deleted").eq(0));
        Ok(self.set("attendee", Expr::exists(registrations)))
    }

    pub fn remove_limit_to_attendee(&mut self) -> &mut Self {
        self.unset("attendee")
    }

    /// Topics for none of whose dates `user` has registered.
    pub fn limit_to_topics_without_registration_by_user(
        &mut self,
        user: u32,
    ) -> BagResult<&mut Self> {
        if user == 0 {
            return Err(BagError::invalid("user uid must be positive"));
        }

        let mut registered = select_column(REGISTRATIONS, "seminar");
        registered
            .and_where(col(REGISTRATIONS, "user").eq(user))
            .and_where(col(REGISTRATIONS, "deleted").eq(0));

        let mut registered_topics = select_column(EVENTS, "topic");
        registered_topics
            .and_where(object_type_is(ObjectType::Date))
            .and_where(col(EVENTS, "uid").in_subquery(registered));

        let predicate = object_type_is(ObjectType::Topic)
            .and(col(EVENTS, "uid").not_in_subquery(registered_topics));
        Ok(self.set("topicsWithoutRegistration", predicate))
    }

    pub fn remove_limit_to_topics_without_registration_by_user(&mut self) -> &mut Self {
        self.unset("topicsWithoutRegistration")
    }

    pub fn limit_to_status(&mut self, status: EventStatus) -> &mut Self {
        self.set("status", col(EVENTS, "cancelled").eq(status.as_i32()))
    }

    pub fn remove_limit_to_status(&mut self) -> &mut Self {
        self.unset("status")
    }

    pub fn limit_to_requires_registration(&mut self) -> &mut Self {
        self.set("requiresRegistration", col(EVENTS, "needs_registration").eq(1))
    }

    pub fn remove_limit_to_requires_registration(&mut self) -> &mut Self {
        self.unset("requiresRegistration")
    }

    pub fn limit_to_topic_records(&mut self) -> &mut Self {
        self.set("objectType", object_type_is(ObjectType::Topic))
    }

    /// Dates and single events, i.e. everything that actually takes place.
    pub fn limit_to_date_and_single_records(&mut self) -> &mut Self {
        self.set("objectType", object_type_is_not(ObjectType::Topic))
    }

    pub fn remove_limit_to_object_type(&mut self) -> &mut Self {
        self.unset("objectType")
    }

    pub fn limit_to_cancelation_deadline_reminder_not_sent(&mut self) -> &mut Self {
        self.set(
            "cancelationReminderNotSent",
            col(EVENTS, "cancelation_deadline_reminder_sent").eq(0),
        )
    }

    pub fn limit_to_event_takes_place_reminder_not_sent(&mut self) -> &mut Self {
        self.set(
            "eventTakesPlaceReminderNotSent",
            col(EVENTS, "event_takes_place_reminder_sent").eq(0),
        )
    }

    /// The other dates of the topic `date` belongs to.
    pub fn limit_to_other_dates_for_topic(&mut self, date: &EventRef) -> BagResult<&mut Self> {
        if date.object_type != ObjectType::Date {
            return Err(BagError::Precondition(format!(
                "event {} is not a date",
                date.uid
            )));
        }

        let predicate = object_type_is(ObjectType::Date)
            .and(col(EVENTS, "topic").eq(date.topic))
            .and(col(EVENTS, "uid").ne(date.uid));
        Ok(self.set("otherDates", predicate))
    }

    pub fn remove_limit_to_other_dates_for_topic(&mut self) -> &mut Self {
        self.unset("otherDates")
    }

    /// Dates of the same topic beginning after `event` has ended, at the
    /// latest on the local day after its end.
    pub fn limit_to_events_next_day(&mut self, event: &EventRef) -> BagResult<&mut Self> {
        if event.end_date <= 0 {
            return Err(BagError::Precondition(format!(
                "event {} has no end date",
                event.uid
            )));
        }

        let (_, end_of_next_day) = self
            .context()
            .day_bounds(event.end_date + SECONDS_PER_DAY)?;

        let predicate = object_type_is(ObjectType::Date)
            .and(col(EVENTS, "topic").eq(event.topic_uid()))
            .and(col(EVENTS, "uid").ne(event.uid))
            .and(col(EVENTS, "begin_date").gte(event.end_date))
            .and(col(EVENTS, "begin_date").lte(end_of_next_day));
        Ok(self.set("nextDay", predicate))
    }

    pub fn remove_limit_to_events_next_day(&mut self) -> &mut Self {
        self.unset("nextDay")
    }

    /// Limit to a time frame relative to now. [`TimeFrame::All`] removes the limit.
    pub fn set_time_frame(&mut self, frame: TimeFrame) -> BagResult<&mut Self> {
        let predicate = frame.predicate(self.context())?;
        Ok(self.set_or_unset("timeFrame", predicate))
    }

    /// [`EventBagBuilder::set_time_frame`] addressed by key, e.g. `"upcoming"`.
    pub fn set_time_frame_key(&mut self, key: &str) -> BagResult<&mut Self> {
        let frame: TimeFrame = key.parse()?;
        self.set_time_frame(frame)
    }

    /// Events beginning within the next `days` days. Zero removes the limit.
    pub fn limit_to_days_before_begin_date(&mut self, days: u32) -> &mut Self {
        let now = self.now();
        let predicate = (days > 0).then(|| {
            col(EVENTS, "begin_date")
                .gt(now)
                .and(col(EVENTS, "begin_date").lte(now + i64::from(days) * SECONDS_PER_DAY))
        });
        self.set_or_unset("daysBeforeBegin", predicate)
    }

    /// Events beginning or ending at `timestamp` or later. Zero removes the limit.
    pub fn limit_to_earliest_begin_or_end_date(&mut self, timestamp: i64) -> &mut Self {
        let predicate = (timestamp != 0).then(|| {
            col(EVENTS, "begin_date")
                .gte(timestamp)
                .or(col(EVENTS, "end_date").gte(timestamp))
        });
        self.set_or_unset("earliestDate", predicate)
    }

    /// Events beginning at `timestamp` or earlier. Zero removes the limit.
    pub fn limit_to_latest_begin_or_end_date(&mut self, timestamp: i64) -> &mut Self {
        let predicate = (timestamp != 0).then(|| col(EVENTS, "begin_date").lte(timestamp));
        self.set_or_unset("latestDate", predicate)
    }

    /// Events that can still take registrations.
    pub fn limit_to_events_with_vacancies(&mut self) -> &mut Self {
        let mut seats = Query::select();
        seats
            .expr(Expr::col((Alias::new(REGISTRATIONS), Alias::new("seats"))).sum())
            .from(Alias::new(REGISTRATIONS))
            .and_where(
                col(REGISTRATIONS, "seminar").equals((Alias::new(EVENTS), Alias::new("uid"))),
            )
            .and_where(col(REGISTRATIONS, "registration_queue").eq(0))
            .and_where(col(REGISTRATIONS, "deleted").eq(0));

        let seats_taken = Func::coalesce([
            SimpleExpr::SubQuery(None, Box::new(SubQueryStatement::SelectStatement(seats))),
            Expr::val(0).into(),
        ]);
        let occupied = Expr::expr(seats_taken).add(col(EVENTS, "offline_attendees"));

        let predicate = col(EVENTS, "needs_registration")
            .eq(0)
            .or(col(EVENTS, "attendees_max").eq(0))
            .or(Expr::expr(occupied).lt(col(EVENTS, "attendees_max")));
        self.set("vacancies", predicate)
    }

    pub fn remove_limit_to_events_with_vacancies(&mut self) -> &mut Self {
        self.unset("vacancies")
    }

    /// Events with a currently applicable price of at least `price`. Zero
    /// removes the limit.
    pub fn limit_to_minimum_price(&mut self, price: u32) -> &mut Self {
        let predicate = (price > 0).then(|| price_limit(PriceBound::Minimum, price, self.now()));
        self.set_or_unset("minimumPrice", predicate)
    }

    /// Events with a currently applicable price of at most `price`. Zero
    /// removes the limit.
    pub fn limit_to_maximum_price(&mut self, price: u32) -> &mut Self {
        let predicate = (price > 0).then(|| price_limit(PriceBound::Maximum, price, self.now()));
        self.set_or_unset("maximumPrice", predicate)
    }

    /// Events without target groups, or with a target group whose age range
    /// contains `age`. Zero removes the limit.
    pub fn limit_to_age(&mut self, age: u32) -> &mut Self {
        let predicate = (age > 0).then(|| {
            let mut any_group = select_one(EVENTS_TARGET_GROUPS_MM);
            any_group.and_where(topic_correlation(EVENTS_TARGET_GROUPS_MM));

            let mut fitting_group = linked(EVENTS_TARGET_GROUPS_MM, TARGET_GROUPS);
            fitting_group
                .and_where(topic_correlation(EVENTS_TARGET_GROUPS_MM))
                .and_where(col(TARGET_GROUPS, "minimum_age").lte(age))
                .and_where(
                    col(TARGET_GROUPS, "maximum_age")
                        .eq(0)
                        .or(col(TARGET_GROUPS, "maximum_age").gte(age)),
                );

            Expr::exists(any_group)
                .not()
                .or(Expr::exists(fitting_group))
        });
        self.set_or_unset("age", predicate)
    }

    pub fn remove_limit_to_age(&mut self) -> &mut Self {
        self.unset("age")
    }

    /// Events matching every keyword of `phrase`. A phrase without keywords
    /// of searchable length removes the limit.
    pub fn limit_to_full_text_search(&mut self, phrase: &str) -> &mut Self {
        self.set_or_unset("search", search::compile(phrase))
    }

    pub fn remove_limit_to_full_text_search(&mut self) -> &mut Self {
        self.unset("search")
    }
}

/// EXISTS a row in `mm_table` matching `correlation` and pointing to one of `uids`.
fn linked_to(mm_table: &str, correlation: SimpleExpr, uids: &[u32]) -> SimpleExpr {
    let mut query = select_one(mm_table);
    query
        .and_where(correlation)
        .and_where(col(mm_table, "uid_foreign").is_in(uids.iter().copied()));
    Expr::exists(query)
}

/// EXISTS a place of the record whose `column` is one of `values`.
fn place_column_in<S: AsRef<str>>(column: &str, values: &[S]) -> SimpleExpr {
    let mut query = linked(EVENTS_PLACES_MM, PLACES);
    query
        .and_where(record_correlation(EVENTS_PLACES_MM))
        .and_where(col(PLACES, column).is_in(values.iter().map(|v| v.as_ref().to_string())));
    Expr::exists(query)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriceBound {
    Minimum,
    Maximum,
}

/// Restricts events whose topic-level record has a price within `bound` of `price`.
///
/// While the early-bird deadline lies in the future, early-bird prices
/// replace their regular counterparts unless they are zero. For the maximum,
/// optional tiers (special and board prices) only count when set.
fn price_limit(bound: PriceBound, price: u32, now: i64) -> SimpleExpr {
    let price_col = |name: &str| col(TOPICS, name);
    let within = |name: &str| match bound {
        PriceBound::Minimum => price_col(name).gte(price),
        PriceBound::Maximum => price_col(name).lte(price),
    };
    let optional = |name: &str| match bound {
        PriceBound::Minimum => within(name),
        PriceBound::Maximum => price_col(name).gt(0).and(within(name)),
    };
    let early_or = |early: &str, fallback: SimpleExpr| {
        price_col(early)
            .eq(0)
            .and(fallback)
            .or(price_col(early).gt(0).and(within(early)))
    };

    let regular_period = any_of([
        within("price_regular"),
        optional("price_special"),
        optional("price_regular_board"),
        optional("price_special_board"),
    ]);
    let early_bird_period = any_of([
        early_or("price_regular_early", within("price_regular")),
        early_or("price_special_early", optional("price_special")),
        optional("price_regular_board"),
        optional("price_special_board"),
    ]);

    let mut topics = topic_records();
    topics.and_where(
        price_col("deadline_early_bird")
            .lte(now)
            .and(regular_period)
            .or(price_col("deadline_early_bird").gt(now).and(early_bird_period)),
    );
    topic_uid_in(topics)
}
