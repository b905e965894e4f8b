//! Table names and expression helpers shared by the builders.
//!
//! Every fragment is a `sea_query::SimpleExpr`; nothing here renders SQL text.

use sea_query::{Alias, Expr, ExprTrait, Query, SelectStatement, SimpleExpr};

use super::types::ObjectType;

pub const EVENTS: &str = "tx_seminars_seminars";
pub const REGISTRATIONS: &str = "tx_seminars_attendances";
pub const CATEGORIES: &str = "tx_seminars_categories";
pub const ORGANIZERS: &str = "tx_seminars_organizers";
pub const SPEAKERS: &str = "tx_seminars_speakers";
pub const PLACES: &str = "tx_seminars_sites";
pub const EVENT_TYPES: &str = "tx_seminars_event_types";
pub const TARGET_GROUPS: &str = "tx_seminars_target_groups";
pub const PAGES: &str = "pages";
pub const FRONT_END_USERS: &str = "fe_users";

pub const EVENTS_CATEGORIES_MM: &str = "tx_seminars_seminars_categories_mm";
pub const EVENTS_PLACES_MM: &str = "tx_seminars_seminars_place_mm";
pub const EVENTS_SPEAKERS_MM: &str = "tx_seminars_seminars_speakers_mm";
pub const EVENTS_TARGET_GROUPS_MM: &str = "tx_seminars_seminars_target_groups_mm";
pub const EVENTS_ORGANIZERS_MM: &str = "tx_seminars_seminars_organizers_mm";
pub const EVENTS_MANAGERS_MM: &str = "tx_seminars_seminars_feusers_mm";

/// Alias of the events table in uncorrelated sub-selects over topic-level records.
pub const TOPICS: &str = "topics";

/// Escape character used in every LIKE pattern built here.
pub const LIKE_ESCAPE: char = '!';

/// Qualified column reference `table.column`.
pub fn col(table: &str, column: &str) -> Expr {
    Expr::col((Alias::new(table), Alias::new(column)))
}

/// Column reference that may or may not be qualified (`table.column` or `column`).
pub fn column_ref(name: &str) -> Expr {
    match name.split_once('.') {
        Some((table, column)) => col(table, column),
        None => Expr::col(Alias::new(name)),
    }
}

/// The always-true restriction.
pub fn tautology() -> SimpleExpr {
    Expr::val(1).eq(1)
}

/// The always-false restriction.
pub fn contradiction() -> SimpleExpr {
    Expr::val(1).eq(0)
}

/// AND of all expressions; the tautology when there are none.
pub fn all_of(exprs: impl IntoIterator<Item = SimpleExpr>) -> SimpleExpr {
    exprs
        .into_iter()
        .reduce(|acc, expr| acc.and(expr))
        .unwrap_or_else(tautology)
}

/// OR of all expressions; the contradiction when there are none.
pub fn any_of(exprs: impl IntoIterator<Item = SimpleExpr>) -> SimpleExpr {
    exprs
        .into_iter()
        .reduce(|acc, expr| acc.or(expr))
        .unwrap_or_else(contradiction)
}

/// `SELECT 1 FROM table`, the body of an EXISTS sub-query.
pub fn select_one(table: &str) -> SelectStatement {
    let mut query = Query::select();
    query.expr(Expr::val(1)).from(Alias::new(table));
    query
}

/// `SELECT column FROM table`, the body of an IN sub-query.
pub fn select_column(table: &str, column: &str) -> SelectStatement {
    let mut query = Query::select();
    query.column((Alias::new(table), Alias::new(column))).from(Alias::new(table));
    query
}

/// `events.object_type = <kind>`.
pub fn object_type_is(kind: ObjectType) -> SimpleExpr {
    col(EVENTS, "object_type").eq(kind.as_i32())
}

/// `events.object_type <> <kind>`.
pub fn object_type_is_not(kind: ObjectType) -> SimpleExpr {
    col(EVENTS, "object_type").ne(kind.as_i32())
}

/// Correlates `mm_table.uid_local` with the record holding topic-level data
/// for the current event row: the topic for dates, the record itself otherwise.
pub fn topic_correlation(mm_table: &str) -> SimpleExpr {
    let own = object_type_is_not(ObjectType::Date)
        .and(col(mm_table, "uid_local").equals((Alias::new(EVENTS), Alias::new("uid"))));
    let via_topic = object_type_is(ObjectType::Date)
        .and(col(mm_table, "uid_local").equals((Alias::new(EVENTS), Alias::new("topic"))));
    own.or(via_topic)
}

/// Correlates `mm_table.uid_local` with the current event row itself.
pub fn record_correlation(mm_table: &str) -> SimpleExpr {
    col(mm_table, "uid_local").equals((Alias::new(EVENTS), Alias::new("uid")))
}

/// Restricts events whose topic-level record uid is produced by `topic_uids`.
///
/// Single events and topics match on their own uid, dates on their topic.
pub fn topic_uid_in(topic_uids: SelectStatement) -> SimpleExpr {
    let own = object_type_is_not(ObjectType::Date)
        .and(col(EVENTS, "uid").in_subquery(topic_uids.clone()));
    let via_topic =
        object_type_is(ObjectType::Date).and(col(EVENTS, "topic").in_subquery(topic_uids));
    own.or(via_topic)
}

/// `SELECT topics.uid FROM events AS topics` over topic-level records
/// (topics and single events) that are not deleted.
///
/// Hidden records are included; the visibility mode of the bag decides.
pub fn topic_records() -> SelectStatement {
    let mut query = Query::select();
    query
        .column((Alias::new(TOPICS), Alias::new("uid")))
        .from_as(Alias::new(EVENTS), Alias::new(TOPICS))
        .and_where(
            col(TOPICS, "object_type")
                .ne(ObjectType::Date.as_i32())
                .and(col(TOPICS, "deleted").eq(0)),
        );
    query
}

/// [`topic_records`] without hidden records.
pub fn visible_topics() -> SelectStatement {
    let mut query = topic_records();
    query.and_where(col(TOPICS, "hidden").eq(0));
    query
}

/// `SELECT 1 FROM mm_table, table WHERE mm_table.uid_foreign = table.uid`
/// over records of `table` that are not deleted.
pub fn linked(mm_table: &str, table: &str) -> SelectStatement {
    let mut query = select_one(mm_table);
    query
        .from(Alias::new(table))
        .and_where(col(mm_table, "uid_foreign").equals((Alias::new(table), Alias::new("uid"))))
        .and_where(col(table, "deleted").eq(0));
    query
}

/// Escape LIKE wildcard characters (`%`, `_`) and the escape character itself.
pub fn escape_like_wildcards(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == LIKE_ESCAPE || c == '%' || c == '_' {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sea_query::PostgresQueryBuilder;

    fn render(expr: SimpleExpr) -> String {
        let mut query = Query::select();
        query.expr(Expr::val(1)).and_where(expr);
        query.to_string(PostgresQueryBuilder)
    }

    #[test]
    fn empty_conjunction_is_tautology() {
        assert_eq!(all_of(Vec::new()), tautology());
        assert_eq!(any_of(Vec::new()), contradiction());
    }

    #[test]
    fn single_expression_passes_through() {
        let expr = col(EVENTS, "uid").eq(3);
        assert_eq!(all_of(vec![expr.clone()]), expr);
    }

    #[test]
    fn column_ref_handles_qualified_names() {
        let sql = render(column_ref("tx_seminars_seminars.title").is_not_null());
        assert!(sql.contains("\"tx_seminars_seminars\".\"title\""), "{sql}");

        let sql = render(column_ref("title").is_not_null());
        assert!(sql.contains("\"title\" IS NOT NULL"), "{sql}");
    }

    #[test]
    fn topic_records_leave_hidden_to_the_bag() {
        let sql = topic_records().to_string(PostgresQueryBuilder);
        assert!(sql.contains("\"topics\".\"deleted\" = 0"), "{sql}");
        assert!(!sql.contains("hidden"), "{sql}");

        let sql = visible_topics().to_string(PostgresQueryBuilder);
        assert!(sql.contains("\"topics\".\"hidden\" = 0"), "{sql}");
    }

    #[test]
    fn topic_correlation_covers_dates() {
        let sql = render(topic_correlation(EVENTS_CATEGORIES_MM));
        assert!(sql.contains("\"object_type\" <> 2"), "{sql}");
        assert!(sql.contains("\"object_type\" = 2"), "{sql}");
        assert!(sql.contains("\"tx_seminars_seminars\".\"topic\""), "{sql}");
    }

    #[test]
    fn escape_like_wildcards_function() {
        assert_eq!(escape_like_wildcards("hello"), "hello");
        assert_eq!(escape_like_wildcards("100%"), "100!%");
        assert_eq!(escape_like_wildcards("a_b"), "a!_b");
        assert_eq!(escape_like_wildcards("wow!"), "wow!!");
    }
}
