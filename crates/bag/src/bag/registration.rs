//! Registration bag builder.

use sea_query::{Alias, Expr, ExprTrait};

use super::builder::{BagBuild, BagBuilder};
use super::sql::{EVENTS, FRONT_END_USERS, REGISTRATIONS, col, select_one};
use super::types::{BagContext, SortDirection, TableSpec};
use crate::error::{BagError, BagResult};

const REGISTRATION_TABLE: TableSpec = TableSpec {
    name: REGISTRATIONS,
    has_hidden: true,
    has_timing: false,
};

/// Builds bags of registrations.
#[derive(Debug, Clone)]
pub struct RegistrationBagBuilder {
    base: BagBuilder,
}

impl BagBuild for RegistrationBagBuilder {
    fn base(&self) -> &BagBuilder {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BagBuilder {
        &mut self.base
    }
}

impl RegistrationBagBuilder {
    pub fn new(context: BagContext) -> BagResult<Self> {
        Ok(Self {
            base: BagBuilder::new(REGISTRATION_TABLE, context)?,
        })
    }

    /// Registrations for event `event`.
    pub fn limit_to_event(&mut self, event: u32) -> BagResult<&mut Self> {
        if event == 0 {
            return Err(BagError::invalid("event uid must be positive"));
        }
        self.base
            .set_predicate("event", col(REGISTRATIONS, "seminar").eq(event));
        Ok(self)
    }

    pub fn limit_to_paid(&mut self) -> &mut Self {
        self.base
            .set_predicate("paid", col(REGISTRATIONS, "datepaid").gt(0));
        self
    }

    pub fn limit_to_unpaid(&mut self) -> &mut Self {
        self.base
            .set_predicate("paid", col(REGISTRATIONS, "datepaid").eq(0));
        self
    }

    pub fn remove_payment_limitation(&mut self) -> &mut Self {
        self.base.remove_predicate("paid");
        self
    }

    /// Registrations waiting on the queue.
    pub fn limit_to_on_queue(&mut self) -> &mut Self {
        self.base
            .set_predicate("queue", col(REGISTRATIONS, "registration_queue").eq(1));
        self
    }

    /// Registrations holding a seat.
    pub fn limit_to_regular(&mut self) -> &mut Self {
        self.base
            .set_predicate("queue", col(REGISTRATIONS, "registration_queue").eq(0));
        self
    }

    pub fn remove_queue_limitation(&mut self) -> &mut Self {
        self.base.remove_predicate("queue");
        self
    }

    /// Registrations for at most `seats` seats. Zero removes the limit.
    pub fn limit_to_seats_at_most(&mut self, seats: i32) -> BagResult<&mut Self> {
        if seats < 0 {
            return Err(BagError::invalid(format!(
                "seat count must not be negative, got {seats}"
            )));
        }

        if seats == 0 {
            self.base.remove_predicate("seats");
        } else {
            self.base
                .set_predicate("seats", col(REGISTRATIONS, "seats").lte(seats));
        }
        Ok(self)
    }

    /// Registrations of front-end user `user`. Zero removes the limit.
    pub fn limit_to_attendee(&mut self, user: u32) -> &mut Self {
        if user == 0 {
            return self.remove_limit_to_attendee();
        }
        self.base
            .set_predicate("attendee", col(REGISTRATIONS, "user").eq(user));
        self
    }

    pub fn remove_limit_to_attendee(&mut self) -> &mut Self {
        self.base.remove_predicate("attendee");
        self
    }

    /// Registrations whose front-end user still exists and is enabled.
    pub fn limit_to_existing_users(&mut self) -> &mut Self {
        let mut users = select_one(FRONT_END_USERS);
        users
            .and_where(
                col(FRONT_END_USERS, "uid")
                    .equals((Alias::new(REGISTRATIONS), Alias::new("user"))),
            )
            .and_where(col(FRONT_END_USERS, "deleted").eq(0))
            .and_where(col(FRONT_END_USERS, "disable").eq(0));
        self.base.set_predicate("existingUsers", Expr::exists(users));
        self
    }

    /// Sort by `column` of the registered event, e.g. `begin_date`.
    pub fn order_by_event_column(
        &mut self,
        column: &str,
        direction: SortDirection,
    ) -> BagResult<&mut Self> {
        if column.is_empty() {
            return Err(BagError::invalid("event column must not be empty"));
        }

        self.add_additional_table_name(EVENTS)?;
        self.base.set_join_predicate(
            "eventJoin",
            EVENTS,
            col(REGISTRATIONS, "seminar").equals((Alias::new(EVENTS), Alias::new("uid"))),
        );
        self.set_order_by(&format!("{EVENTS}.{column}"), direction);
        Ok(self)
    }
}
