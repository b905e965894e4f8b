//! Category bag builder.

use sea_query::{Alias, ExprTrait, SimpleExpr};

use super::builder::{BagBuild, BagBuilder};
use super::sql::{CATEGORIES, EVENTS_CATEGORIES_MM, col, select_column};
use super::types::{BagContext, SortDirection, TableSpec};
use crate::error::{BagError, BagResult};

const RELATION_ORDER: &str = "relationOrder";

const CATEGORY_TABLE: TableSpec = TableSpec {
    name: CATEGORIES,
    has_hidden: false,
    has_timing: false,
};

/// Builds bags of categories.
#[derive(Debug, Clone)]
pub struct CategoryBagBuilder {
    base: BagBuilder,
    events: Vec<u32>,
}

impl BagBuild for CategoryBagBuilder {
    fn base(&self) -> &BagBuilder {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BagBuilder {
        &mut self.base
    }
}

impl CategoryBagBuilder {
    pub fn new(context: BagContext) -> BagResult<Self> {
        Ok(Self {
            base: BagBuilder::new(CATEGORY_TABLE, context)?,
            events: Vec::new(),
        })
    }

    /// Categories assigned to any of `events` (topic or single event uids).
    pub fn limit_to_events(&mut self, events: &[u32]) -> BagResult<&mut Self> {
        if events.is_empty() {
            return Err(BagError::invalid("event uid list must not be empty"));
        }

        let mut assigned = select_column(EVENTS_CATEGORIES_MM, "uid_foreign");
        assigned.and_where(col(EVENTS_CATEGORIES_MM, "uid_local").is_in(events.iter().copied()));

        self.base
            .set_predicate("events", col(CATEGORIES, "uid").in_subquery(assigned));
        self.events = events.to_vec();
        if self.predicates().has(RELATION_ORDER) {
            let relation = self.relation_order();
            self.base.set_join_predicate(RELATION_ORDER, EVENTS_CATEGORIES_MM, relation);
        }
        Ok(self)
    }

    /// Order by the position of each category in its event's category list.
    ///
    /// Requires [`CategoryBagBuilder::limit_to_events`] first.
    pub fn sort_by_relation_order(&mut self) -> BagResult<&mut Self> {
        if self.events.is_empty() {
            return Err(BagError::Precondition(
                "relation order needs the events to be limited first".to_string(),
            ));
        }

        self.add_additional_table_name(EVENTS_CATEGORIES_MM)?;
        let relation = self.relation_order();
        self.base.set_join_predicate(RELATION_ORDER, EVENTS_CATEGORIES_MM, relation);
        self.set_order_by(
            &format!("{EVENTS_CATEGORIES_MM}.sorting"),
            SortDirection::Asc,
        );
        Ok(self)
    }

    /// Joins the relation table rows of the limited events.
    fn relation_order(&self) -> SimpleExpr {
        col(EVENTS_CATEGORIES_MM, "uid_local")
            .is_in(self.events.iter().copied())
            .and(
                col(EVENTS_CATEGORIES_MM, "uid_foreign")
                    .equals((Alias::new(CATEGORIES), Alias::new("uid"))),
            )
    }
}
