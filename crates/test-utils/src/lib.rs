//! Seminar bag test utilities.
//!
//! Helpers for integration testing: an in-memory SQLite database with the
//! seminar schema, fixture builders for events and registrations, and insert
//! helpers for the records events are linked to.

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// Schema of every table the bag builders query.
pub const SCHEMA: &str = include_str!("schema.sql");

pub const CATEGORIES_MM: &str = "tx_seminars_seminars_categories_mm";
pub const PLACES_MM: &str = "tx_seminars_seminars_place_mm";
pub const SPEAKERS_MM: &str = "tx_seminars_seminars_speakers_mm";
pub const TARGET_GROUPS_MM: &str = "tx_seminars_seminars_target_groups_mm";
pub const ORGANIZERS_MM: &str = "tx_seminars_seminars_organizers_mm";
pub const MANAGERS_MM: &str = "tx_seminars_seminars_feusers_mm";

/// Open a fresh in-memory database with the schema applied.
///
/// The pool holds a single connection that never expires, so every query
/// sees the same database.
pub async fn memory_pool() -> sqlx::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(&pool).await?;
    }

    Ok(pool)
}

fn uid(id: i64) -> u32 {
    u32::try_from(id).unwrap_or(u32::MAX)
}

/// Create a visible single event with default values.
pub fn test_event(title: &str) -> TestEvent {
    TestEvent {
        title: title.to_string(),
        ..TestEvent::default()
    }
}

/// An event builder for creating test fixtures.
#[derive(Debug, Clone, Default)]
pub struct TestEvent {
    pub pid: u32,
    pub hidden: bool,
    pub deleted: bool,
    pub starttime: i64,
    pub endtime: i64,
    pub dummy: bool,
    pub object_type: i32,
    pub topic: u32,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub accreditation_number: String,
    pub event_type: u32,
    pub language: String,
    pub begin_date: i64,
    pub end_date: i64,
    pub deadline_registration: i64,
    pub deadline_early_bird: i64,
    pub needs_registration: bool,
    pub attendees_max: u32,
    pub offline_attendees: u32,
    pub cancelled: i32,
    pub owner: u32,
    pub price_regular: u32,
    pub price_regular_early: u32,
    pub price_regular_board: u32,
    pub price_special: u32,
    pub price_special_early: u32,
    pub price_special_board: u32,
    pub cancelation_reminder_sent: bool,
    pub takes_place_reminder_sent: bool,
}

impl TestEvent {
    /// Make this a topic record.
    pub fn topic(mut self) -> Self {
        self.object_type = 1;
        self
    }

    /// Make this a date of `topic`.
    pub fn date_of(mut self, topic: u32) -> Self {
        self.object_type = 2;
        self.topic = topic;
        self
    }

    /// Store on page `pid`.
    pub fn on_page(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Limit publication to `[starttime, endtime)`; zero means open.
    pub fn published_between(mut self, starttime: i64, endtime: i64) -> Self {
        self.starttime = starttime;
        self.endtime = endtime;
        self
    }

    /// Flag as a test fixture record.
    pub fn dummy(mut self) -> Self {
        self.dummy = true;
        self
    }

    pub fn with_subtitle(mut self, subtitle: &str) -> Self {
        self.subtitle = subtitle.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_accreditation_number(mut self, number: &str) -> Self {
        self.accreditation_number = number.to_string();
        self
    }

    pub fn with_event_type(mut self, event_type: u32) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Set begin and end date; zero means unset.
    pub fn between(mut self, begin_date: i64, end_date: i64) -> Self {
        self.begin_date = begin_date;
        self.end_date = end_date;
        self
    }

    pub fn with_registration_deadline(mut self, deadline: i64) -> Self {
        self.deadline_registration = deadline;
        self
    }

    pub fn with_early_bird_deadline(mut self, deadline: i64) -> Self {
        self.deadline_early_bird = deadline;
        self
    }

    /// Require registration with at most `attendees_max` attendees (zero: unlimited).
    pub fn with_registration(mut self, attendees_max: u32) -> Self {
        self.needs_registration = true;
        self.attendees_max = attendees_max;
        self
    }

    pub fn with_offline_attendees(mut self, count: u32) -> Self {
        self.offline_attendees = count;
        self
    }

    /// Set the `cancelled` status column (0 planned, 1 canceled, 2 confirmed).
    pub fn with_status(mut self, status: i32) -> Self {
        self.cancelled = status;
        self
    }

    pub fn owned_by(mut self, owner: u32) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_regular_price(mut self, price: u32, early: u32) -> Self {
        self.price_regular = price;
        self.price_regular_early = early;
        self
    }

    pub fn with_special_price(mut self, price: u32, early: u32) -> Self {
        self.price_special = price;
        self.price_special_early = early;
        self
    }

    pub fn with_board_prices(mut self, regular: u32, special: u32) -> Self {
        self.price_regular_board = regular;
        self.price_special_board = special;
        self
    }

    pub fn with_reminders_sent(mut self, cancelation: bool, takes_place: bool) -> Self {
        self.cancelation_reminder_sent = cancelation;
        self.takes_place_reminder_sent = takes_place;
        self
    }

    /// Insert the event and return its uid.
    pub async fn insert(&self, pool: &SqlitePool) -> sqlx::Result<u32> {
        let result = sqlx::query(
            "INSERT INTO tx_seminars_seminars (
                pid, hidden, deleted, starttime, endtime, is_dummy_record, object_type, topic,
                title, subtitle, description, accreditation_number, event_type, language,
                begin_date, end_date, deadline_registration, deadline_early_bird,
                needs_registration, attendees_max, offline_attendees, cancelled, owner_feuser,
                price_regular, price_regular_early, price_regular_board,
                price_special, price_special_early, price_special_board,
                cancelation_deadline_reminder_sent, event_takes_place_reminder_sent
            ) VALUES (
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            )",
        )
        .bind(self.pid)
        .bind(self.hidden)
        .bind(self.deleted)
        .bind(self.starttime)
        .bind(self.endtime)
        .bind(self.dummy)
        .bind(self.object_type)
        .bind(self.topic)
        .bind(&self.title)
        .bind(&self.subtitle)
        .bind(&self.description)
        .bind(&self.accreditation_number)
        .bind(self.event_type)
        .bind(&self.language)
        .bind(self.begin_date)
        .bind(self.end_date)
        .bind(self.deadline_registration)
        .bind(self.deadline_early_bird)
        .bind(self.needs_registration)
        .bind(self.attendees_max)
        .bind(self.offline_attendees)
        .bind(self.cancelled)
        .bind(self.owner)
        .bind(self.price_regular)
        .bind(self.price_regular_early)
        .bind(self.price_regular_board)
        .bind(self.price_special)
        .bind(self.price_special_early)
        .bind(self.price_special_board)
        .bind(self.cancelation_reminder_sent)
        .bind(self.takes_place_reminder_sent)
        .execute(pool)
        .await?;

        Ok(uid(result.last_insert_rowid()))
    }
}

/// Create a regular, unpaid one-seat registration of `user` for `event`.
pub fn test_registration(event: u32, user: u32) -> TestRegistration {
    TestRegistration {
        event,
        user,
        seats: 1,
        ..TestRegistration::default()
    }
}

/// A registration builder for creating test fixtures.
#[derive(Debug, Clone, Default)]
pub struct TestRegistration {
    pub event: u32,
    pub user: u32,
    pub seats: u32,
    pub on_queue: bool,
    pub paid_at: i64,
    pub hidden: bool,
    pub deleted: bool,
}

impl TestRegistration {
    pub fn with_seats(mut self, seats: u32) -> Self {
        self.seats = seats;
        self
    }

    pub fn on_queue(mut self) -> Self {
        self.on_queue = true;
        self
    }

    pub fn paid_at(mut self, timestamp: i64) -> Self {
        self.paid_at = timestamp;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Insert the registration and return its uid.
    pub async fn insert(&self, pool: &SqlitePool) -> sqlx::Result<u32> {
        let result = sqlx::query(
            "INSERT INTO tx_seminars_attendances
                (seminar, user, seats, registration_queue, datepaid, hidden, deleted)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.event)
        .bind(self.user)
        .bind(self.seats)
        .bind(self.on_queue)
        .bind(self.paid_at)
        .bind(self.hidden)
        .bind(self.deleted)
        .execute(pool)
        .await?;

        Ok(uid(result.last_insert_rowid()))
    }
}

async fn insert_titled(pool: &SqlitePool, table: &str, title: &str) -> sqlx::Result<u32> {
    let result = sqlx::query(&format!("INSERT INTO {table} (title) VALUES (?)"))
        .bind(title)
        .execute(pool)
        .await?;
    Ok(uid(result.last_insert_rowid()))
}

pub async fn insert_category(pool: &SqlitePool, title: &str) -> sqlx::Result<u32> {
    insert_titled(pool, "tx_seminars_categories", title).await
}

pub async fn insert_organizer(pool: &SqlitePool, title: &str) -> sqlx::Result<u32> {
    insert_titled(pool, "tx_seminars_organizers", title).await
}

pub async fn insert_speaker(pool: &SqlitePool, title: &str) -> sqlx::Result<u32> {
    insert_titled(pool, "tx_seminars_speakers", title).await
}

pub async fn insert_event_type(pool: &SqlitePool, title: &str) -> sqlx::Result<u32> {
    insert_titled(pool, "tx_seminars_event_types", title).await
}

pub async fn insert_place(
    pool: &SqlitePool,
    title: &str,
    city: &str,
    country: &str,
) -> sqlx::Result<u32> {
    let result =
        sqlx::query("INSERT INTO tx_seminars_sites (title, city, country) VALUES (?, ?, ?)")
            .bind(title)
            .bind(city)
            .bind(country)
            .execute(pool)
            .await?;
    Ok(uid(result.last_insert_rowid()))
}

/// Insert a target group for ages `[minimum_age, maximum_age]`; a zero maximum is open.
pub async fn insert_target_group(
    pool: &SqlitePool,
    title: &str,
    minimum_age: u32,
    maximum_age: u32,
) -> sqlx::Result<u32> {
    let result = sqlx::query(
        "INSERT INTO tx_seminars_target_groups (title, minimum_age, maximum_age) VALUES (?, ?, ?)",
    )
    .bind(title)
    .bind(minimum_age)
    .bind(maximum_age)
    .execute(pool)
    .await?;
    Ok(uid(result.last_insert_rowid()))
}

/// Insert a page below `pid`.
pub async fn insert_page(pool: &SqlitePool, pid: u32, deleted: bool) -> sqlx::Result<u32> {
    let result = sqlx::query("INSERT INTO pages (pid, deleted) VALUES (?, ?)")
        .bind(pid)
        .bind(deleted)
        .execute(pool)
        .await?;
    Ok(uid(result.last_insert_rowid()))
}

pub async fn insert_front_end_user(
    pool: &SqlitePool,
    username: &str,
    deleted: bool,
    disabled: bool,
) -> sqlx::Result<u32> {
    let result = sqlx::query("INSERT INTO fe_users (username, deleted, disable) VALUES (?, ?, ?)")
        .bind(username)
        .bind(deleted)
        .bind(disabled)
        .execute(pool)
        .await?;
    Ok(uid(result.last_insert_rowid()))
}

/// Link `local` to `foreign` through `mm_table`, appended after existing links of `local`.
pub async fn link(pool: &SqlitePool, mm_table: &str, local: u32, foreign: u32) -> sqlx::Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {mm_table} (uid_local, uid_foreign, sorting)
         VALUES (?, ?, (SELECT COUNT(*) + 1 FROM {mm_table} WHERE uid_local = ?))"
    ))
    .bind(local)
    .bind(foreign)
    .bind(local)
    .execute(pool)
    .await?;
    Ok(())
}
