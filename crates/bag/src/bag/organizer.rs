//! Organizer bag builder.

use sea_query::{Alias, ExprTrait, SimpleExpr};

use super::builder::{BagBuild, BagBuilder};
use super::sql::{EVENTS_ORGANIZERS_MM, ORGANIZERS, col, select_column};
use super::types::{BagContext, SortDirection, TableSpec};
use crate::error::{BagError, BagResult};

const RELATION_ORDER: &str = "relationOrder";

const ORGANIZER_TABLE: TableSpec = TableSpec {
    name: ORGANIZERS,
    has_hidden: false,
    has_timing: false,
};

/// Builds bags of organizers.
#[derive(Debug, Clone)]
pub struct OrganizerBagBuilder {
    base: BagBuilder,
    event: Option<u32>,
}

impl BagBuild for OrganizerBagBuilder {
    fn base(&self) -> &BagBuilder {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BagBuilder {
        &mut self.base
    }
}

impl OrganizerBagBuilder {
    pub fn new(context: BagContext) -> BagResult<Self> {
        Ok(Self {
            base: BagBuilder::new(ORGANIZER_TABLE, context)?,
            event: None,
        })
    }

    /// Organizers of event `event`.
    pub fn limit_to_event(&mut self, event: u32) -> BagResult<&mut Self> {
        if event == 0 {
            return Err(BagError::invalid("event uid must be positive"));
        }

        let mut organizing = select_column(EVENTS_ORGANIZERS_MM, "uid_foreign");
        organizing.and_where(col(EVENTS_ORGANIZERS_MM, "uid_local").eq(event));

        self.base
            .set_predicate("event", col(ORGANIZERS, "uid").in_subquery(organizing));
        self.event = Some(event);
        if self.predicates().has(RELATION_ORDER) {
            self.base.set_join_predicate(
                RELATION_ORDER,
                EVENTS_ORGANIZERS_MM,
                relation_order(event),
            );
        }
        Ok(self)
    }

    /// Order by position in the event's organizer list.
    ///
    /// Requires [`OrganizerBagBuilder::limit_to_event`] first.
    pub fn sort_by_relation_order(&mut self) -> BagResult<&mut Self> {
        let Some(event) = self.event else {
            return Err(BagError::Precondition(
                "relation order needs an event to be set first".to_string(),
            ));
        };

        self.add_additional_table_name(EVENTS_ORGANIZERS_MM)?;
        self.base.set_join_predicate(
            RELATION_ORDER,
            EVENTS_ORGANIZERS_MM,
            relation_order(event),
        );
        self.set_order_by(
            &format!("{EVENTS_ORGANIZERS_MM}.sorting"),
            SortDirection::Asc,
        );
        Ok(self)
    }
}

/// Joins the relation table rows of `event`.
fn relation_order(event: u32) -> SimpleExpr {
    col(EVENTS_ORGANIZERS_MM, "uid_local").eq(event).and(
        col(EVENTS_ORGANIZERS_MM, "uid_foreign")
            .equals((Alias::new(ORGANIZERS), Alias::new("uid"))),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn builder() -> OrganizerBagBuilder {
        OrganizerBagBuilder::new(BagContext::utc(0)).unwrap()
    }

    #[test]
    fn zero_event_is_rejected() {
        let err = builder().limit_to_event(0).unwrap_err();
        assert!(err.is_configuration(), "{err}");
    }

    #[test]
    fn relation_order_requires_event() {
        let err = builder().sort_by_relation_order().unwrap_err();
        assert!(err.is_precondition(), "{err}");
    }

    #[test]
    fn organizers_of_event() {
        let mut b = builder();
        b.limit_to_event(8).unwrap();
        let sql = b.build().to_postgres();

        assert!(sql.contains("\"tx_seminars_organizers\".\"uid\" IN (SELECT"), "{sql}");
        assert!(sql.contains("\"uid_local\" = 8"), "{sql}");
        assert!(!sql.contains("ORDER BY"), "{sql}");
    }

    #[test]
    fn relation_order_sorts_by_mm_sorting() {
        let mut b = builder();
        b.limit_to_event(8).unwrap().sort_by_relation_order().unwrap();

        assert_eq!(
            b.additional_table_names(),
            vec!["tx_seminars_seminars_organizers_mm"]
        );
        assert_eq!(b.order_by()[0].column, "tx_seminars_seminars_organizers_mm.sorting");
    }

    #[test]
    fn relation_order_follows_new_event() {
        let mut b = builder();
        b.limit_to_event(8).unwrap().sort_by_relation_order().unwrap();
        b.limit_to_event(9).unwrap();
        let sql = b.build().to_postgres();

        assert!(!sql.contains("= 8"), "{sql}");
        assert_eq!(sql.matches("\"uid_local\" = 9").count(), 2, "{sql}");
    }
}
