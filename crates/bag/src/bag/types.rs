//! Bag builder types.
//!
//! Provides the value types shared by every builder:
//! - BagContext: current instant and local timezone for time-relative filters
//! - Visibility: which soft-hidden records a bag may return
//! - TableSpec: main-table metadata a builder is declared with
//! - ObjectType / EventStatus: event record enumerations
//! - OrderTerm / ResultWindow: ordering and paging of the result set

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BagError, BagResult};

/// Seconds in one calendar day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Request-scoped context handed to every builder at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BagContext {
    now: i64,
    timezone: FixedOffset,
}

impl BagContext {
    /// Create a context for the given unix timestamp and timezone.
    pub fn new(now: i64, timezone: FixedOffset) -> Self {
        Self { now, timezone }
    }

    /// Create a context in UTC.
    pub fn utc(now: i64) -> Self {
        Self {
            now,
            timezone: Utc.fix(),
        }
    }

    /// The reference instant as a unix timestamp.
    pub fn now(&self) -> i64 {
        self.now
    }

    /// The timezone calendar-day filters are evaluated in.
    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    /// Inclusive `[start, end]` unix timestamps of the local day containing `timestamp`.
    pub fn day_bounds(&self, timestamp: i64) -> BagResult<(i64, i64)> {
        let local = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| {
                BagError::Configuration(format!("timestamp {timestamp} is out of range"))
            })?
            .with_timezone(&self.timezone);

        let start = local
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_local_timezone(self.timezone)
            .single()
            .ok_or_else(|| {
                BagError::Configuration(format!("no local midnight for timestamp {timestamp}"))
            })?
            .timestamp();

        Ok((start, start + SECONDS_PER_DAY - 1))
    }

    /// Inclusive bounds of the local day containing `now`.
    pub fn today(&self) -> BagResult<(i64, i64)> {
        self.day_bounds(self.now)
    }
}

/// Which soft-hidden records a bag may return.
///
/// Deleted records are never returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    /// Hidden records and records outside their start/end window are excluded.
    #[default]
    FrontEnd,
    /// Hidden records are included; the start/end window still applies.
    ShowHidden,
    /// The start/end window is ignored; hidden records are excluded.
    IgnoreTiming,
    /// Only deleted records are excluded.
    BackEnd,
}

impl Visibility {
    /// Whether hidden records are included.
    pub fn shows_hidden(self) -> bool {
        matches!(self, Visibility::ShowHidden | Visibility::BackEnd)
    }

    /// Whether the start/end time window is ignored.
    pub fn ignores_timing(self) -> bool {
        matches!(self, Visibility::IgnoreTiming | Visibility::BackEnd)
    }

    /// This visibility with hidden records included.
    pub fn with_hidden(self) -> Self {
        if self.ignores_timing() {
            Visibility::BackEnd
        } else {
            Visibility::ShowHidden
        }
    }

    /// This visibility with the start/end window ignored.
    pub fn with_timing_ignored(self) -> Self {
        if self.shows_hidden() {
            Visibility::BackEnd
        } else {
            Visibility::IgnoreTiming
        }
    }
}

/// Main-table metadata a builder is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name.
    pub name: &'static str,
    /// Whether the table has a `hidden` column.
    pub has_hidden: bool,
    /// Whether the table has `starttime`/`endtime` columns.
    pub has_timing: bool,
}

/// Record kinds stored in the events table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectType {
    /// A standalone event.
    SingleEvent,
    /// A topic: title, description and prices shared by its dates.
    Topic,
    /// A concrete occurrence of a topic.
    Date,
}

impl ObjectType {
    /// Value of the `object_type` column.
    pub fn as_i32(self) -> i32 {
        match self {
            ObjectType::SingleEvent => 0,
            ObjectType::Topic => 1,
            ObjectType::Date => 2,
        }
    }
}

/// Event status (`cancelled` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventStatus {
    Planned,
    Canceled,
    Confirmed,
}

impl EventStatus {
    /// Value of the `cancelled` column.
    pub fn as_i32(self) -> i32 {
        match self {
            EventStatus::Planned => 0,
            EventStatus::Canceled => 1,
            EventStatus::Confirmed => 2,
        }
    }
}

/// The parts of an already-loaded event some filters are relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRef {
    pub uid: u32,
    pub object_type: ObjectType,
    /// Topic uid for dates, 0 otherwise.
    pub topic: u32,
    pub begin_date: i64,
    pub end_date: i64,
}

impl EventRef {
    /// Uid of the record carrying topic-level data.
    pub fn topic_uid(&self) -> u32 {
        match self.object_type {
            ObjectType::Date => self.topic,
            _ => self.uid,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY term. `column` may be qualified as `table.column`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Offset and row count of the result set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ResultWindow {
    #[serde(default)]
    pub offset: u64,
    pub count: u64,
}
