//! Abstract bag builder shared by every entity builder.
//!
//! A builder owns the main-table metadata, the request context, a
//! [`PredicateSet`] and the query configuration (additional tables, ordering,
//! result window, visibility). `build()` turns that state into a [`BagQuery`],
//! which renders to SQL through SeaQuery.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use sea_query::{
    Alias, Asterisk, Expr, ExprTrait, Order, PostgresQueryBuilder, Query, SelectStatement,
    SimpleExpr, SqliteQueryBuilder,
};
use tracing::{debug, warn};

use super::predicate_set::PredicateSet;
use super::sql::{all_of, col, column_ref};
use super::types::{BagContext, OrderTerm, ResultWindow, SortDirection, TableSpec, Visibility};
use crate::error::{BagError, BagResult};
use crate::store::RecordStore;

const SOURCE_PAGES: &str = "pages";
const TEST_MODE: &str = "tests";

/// Comma-separated list of non-negative integers, without blanks. ASCII digits only.
#[allow(clippy::expect_used)]
static PID_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(,[0-9]+)*$").expect("literal pattern is valid"));

/// Query state common to all bags.
#[derive(Debug, Clone)]
pub struct BagBuilder {
    table: TableSpec,
    context: BagContext,
    predicates: PredicateSet,
    additional_tables: BTreeSet<String>,
    /// Predicate keys that correlate an additional table, by key.
    joins: BTreeMap<&'static str, String>,
    order_by: Vec<OrderTerm>,
    window: Option<ResultWindow>,
    visibility: Visibility,
}

impl BagBuilder {
    /// Create a builder for `table`.
    ///
    /// Fails with a configuration error when the table name is empty.
    pub fn new(table: TableSpec, context: BagContext) -> BagResult<Self> {
        if table.name.is_empty() {
            return Err(BagError::Configuration(
                "a bag builder needs a table name".to_string(),
            ));
        }

        Ok(Self {
            table,
            context,
            predicates: PredicateSet::new(),
            additional_tables: BTreeSet::new(),
            joins: BTreeMap::new(),
            order_by: Vec::new(),
            window: None,
            visibility: Visibility::default(),
        })
    }

    /// Install or replace the predicate for `key`.
    pub(crate) fn set_predicate(&mut self, key: &'static str, predicate: SimpleExpr) {
        self.joins.remove(key);
        self.predicates.set(key, predicate);
    }

    /// Install a predicate correlating the additional table `table`.
    ///
    /// The predicate is dropped together with the table.
    pub(crate) fn set_join_predicate(
        &mut self,
        key: &'static str,
        table: &str,
        predicate: SimpleExpr,
    ) {
        self.predicates.set(key, predicate);
        self.joins.insert(key, table.to_string());
    }

    /// Drop the predicate for `key`, if any.
    pub(crate) fn remove_predicate(&mut self, key: &str) {
        self.joins.remove(key);
        self.predicates.remove(key);
    }

    /// Drop every predicate and sort term referring to `table`.
    fn forget_table(&mut self, table: &str) {
        self.order_by
            .retain(|term| term.column.split_once('.').map(|(t, _)| t) != Some(table));

        let keys: Vec<&'static str> = self
            .joins
            .iter()
            .filter(|(_, joined)| joined.as_str() == table)
            .map(|(key, _)| *key)
            .collect();
        for key in keys {
            self.remove_predicate(key);
        }
    }

    /// Restriction selecting the records the current visibility allows.
    fn visibility_restriction(&self) -> SimpleExpr {
        let table = self.table.name;
        let mut parts = vec![col(table, "deleted").eq(0)];

        if self.table.has_hidden && !self.visibility.shows_hidden() {
            parts.push(col(table, "hidden").eq(0));
        }

        if self.table.has_timing && !self.visibility.ignores_timing() {
            let now = self.context.now();
            parts.push(col(table, "starttime").lte(now));
            parts.push(
                col(table, "endtime")
                    .eq(0)
                    .or(col(table, "endtime").gt(now)),
            );
        }

        all_of(parts)
    }
}

/// Operations shared by every bag builder.
///
/// Entity builders embed a [`BagBuilder`] and expose it through `base`;
/// everything else is provided.
#[allow(async_fn_in_trait)]
pub trait BagBuild {
    fn base(&self) -> &BagBuilder;

    fn base_mut(&mut self) -> &mut BagBuilder;

    /// Main table this builder selects from.
    fn table_name(&self) -> &'static str {
        self.base().table.name
    }

    fn context(&self) -> &BagContext {
        &self.base().context
    }

    fn predicates(&self) -> &PredicateSet {
        &self.base().predicates
    }

    /// Limit the bag to records stored on the given pages and their subpages.
    ///
    /// `pid_list` must be a comma-separated list of page uids. Anything else
    /// (including an empty string) silently drops an existing page limit.
    async fn set_source_pages(
        &mut self,
        store: &dyn RecordStore,
        pid_list: &str,
        recursion: u32,
    ) -> BagResult<&mut Self> {
        if !PID_LIST.is_match(pid_list) {
            warn!(
                pid_list,
                "source page list is not a list of uids; removing the page limit"
            );
            self.base_mut().remove_predicate(SOURCE_PAGES);
            return Ok(self);
        }

        let roots = pid_list
            .split(',')
            .map(str::parse::<u32>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BagError::invalid(format!("page uid out of range: {e}")))?;
        let pages = store.page_tree(&roots, recursion).await?;

        let table = self.table_name();
        self.base_mut()
            .set_predicate(SOURCE_PAGES, col(table, "pid").is_in(pages));
        Ok(self)
    }

    fn has_source_pages(&self) -> bool {
        self.predicates().has(SOURCE_PAGES)
    }

    /// Limit the bag to records flagged as test fixtures.
    fn set_test_mode(&mut self) -> &mut Self {
        let table = self.table_name();
        self.base_mut()
            .set_predicate(TEST_MODE, col(table, "is_dummy_record").eq(1));
        self
    }

    /// Add a table to the FROM list. Adding a table twice has no effect.
    fn add_additional_table_name(&mut self, name: &str) -> BagResult<&mut Self> {
        if name.is_empty() {
            return Err(BagError::invalid("additional table name must not be empty"));
        }
        self.base_mut().additional_tables.insert(name.to_string());
        Ok(self)
    }

    /// Remove a table previously added with [`BagBuild::add_additional_table_name`],
    /// together with the predicates and sort terms referring to it.
    fn remove_additional_table_name(&mut self, name: &str) -> BagResult<&mut Self> {
        if name.is_empty() {
            return Err(BagError::invalid("additional table name must not be empty"));
        }
        let base = self.base_mut();
        if !base.additional_tables.remove(name) {
            return Err(BagError::NotFound(format!(
                "additional table '{name}' was never added"
            )));
        }
        base.forget_table(name);
        Ok(self)
    }

    fn additional_table_names(&self) -> Vec<&str> {
        self.base()
            .additional_tables
            .iter()
            .map(String::as_str)
            .collect()
    }

    /// Sort by a single column (`column` or `table.column`). An empty column
    /// clears the ordering. The column is passed through unchecked.
    fn set_order_by(&mut self, column: &str, direction: SortDirection) -> &mut Self {
        let base = self.base_mut();
        base.order_by.clear();
        if !column.is_empty() {
            base.order_by.push(OrderTerm {
                column: column.to_string(),
                direction,
            });
        }
        self
    }

    fn order_by(&self) -> &[OrderTerm] {
        &self.base().order_by
    }

    /// Return at most `count` records.
    fn set_limit(&mut self, count: u64) -> &mut Self {
        self.set_result_window(0, count)
    }

    /// Skip `offset` records and return at most `count`.
    fn set_result_window(&mut self, offset: u64, count: u64) -> &mut Self {
        self.base_mut().window = Some(ResultWindow { offset, count });
        self
    }

    fn clear_limit(&mut self) -> &mut Self {
        self.base_mut().window = None;
        self
    }

    fn result_window(&self) -> Option<ResultWindow> {
        self.base().window
    }

    /// Include hidden records.
    fn show_hidden_records(&mut self) -> &mut Self {
        let base = self.base_mut();
        base.visibility = base.visibility.with_hidden();
        self
    }

    /// Ignore the start/end time window of records.
    fn ignore_timing_of_records(&mut self) -> &mut Self {
        let base = self.base_mut();
        base.visibility = base.visibility.with_timing_ignored();
        self
    }

    /// Back-end defaults: hidden records included, timing ignored.
    fn set_back_end_mode(&mut self) -> &mut Self {
        self.base_mut().visibility = Visibility::BackEnd;
        self
    }

    fn visibility(&self) -> Visibility {
        self.base().visibility
    }

    /// AND of all installed filter predicates; `1 = 1` when there are none.
    fn compose(&self) -> SimpleExpr {
        self.predicates().compose()
    }

    /// Assemble the query for the current state.
    fn build(&self) -> BagQuery {
        let base = self.base();
        let restriction = base
            .predicates
            .compose()
            .and(base.visibility_restriction());

        debug!(
            table = base.table.name,
            filters = base.predicates.len(),
            visibility = ?base.visibility,
            "bag query built"
        );

        BagQuery {
            table: base.table.name,
            additional_tables: base.additional_tables.iter().cloned().collect(),
            restriction,
            order_by: base.order_by.clone(),
            window: base.window,
        }
    }
}

impl BagBuild for BagBuilder {
    fn base(&self) -> &BagBuilder {
        self
    }

    fn base_mut(&mut self) -> &mut BagBuilder {
        self
    }
}

/// The built query: restriction plus table, ordering and window configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BagQuery {
    table: &'static str,
    additional_tables: Vec<String>,
    restriction: SimpleExpr,
    order_by: Vec<OrderTerm>,
    window: Option<ResultWindow>,
}

impl BagQuery {
    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn additional_tables(&self) -> &[String] {
        &self.additional_tables
    }

    /// Filter predicates AND visibility restriction.
    pub fn restriction(&self) -> &SimpleExpr {
        &self.restriction
    }

    pub fn order_by(&self) -> &[OrderTerm] {
        &self.order_by
    }

    pub fn window(&self) -> Option<ResultWindow> {
        self.window
    }

    /// `SELECT table.* …` with ordering and window.
    pub fn select(&self) -> SelectStatement {
        let mut query = Query::select();
        query.column((Alias::new(self.table), Asterisk));
        self.add_source(&mut query);
        self.add_ordering(&mut query);
        query
    }

    /// `SELECT table.uid …` with ordering and window.
    pub fn select_uids(&self) -> SelectStatement {
        let mut query = Query::select();
        query.column((Alias::new(self.table), Alias::new("uid")));
        self.add_source(&mut query);
        self.add_ordering(&mut query);
        query
    }

    /// `SELECT COUNT(*) …` without ordering or window.
    pub fn count(&self) -> SelectStatement {
        let mut query = Query::select();
        query.expr(Expr::col(Asterisk).count());
        self.add_source(&mut query);
        query
    }

    pub fn to_postgres(&self) -> String {
        self.select().to_string(PostgresQueryBuilder)
    }

    pub fn to_sqlite(&self) -> String {
        self.select().to_string(SqliteQueryBuilder)
    }

    /// FROM list and WHERE clause.
    fn add_source(&self, query: &mut SelectStatement) {
        query.from(Alias::new(self.table));
        for table in &self.additional_tables {
            query.from(Alias::new(table));
        }
        query.and_where(self.restriction.clone());
    }

    /// ORDER BY, LIMIT and OFFSET.
    fn add_ordering(&self, query: &mut SelectStatement) {
        for term in &self.order_by {
            let order = match term.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            query.order_by_expr(column_ref(&term.column).into(), order);
        }

        if let Some(window) = self.window {
            query.limit(window.count);
            if window.offset > 0 {
                query.offset(window.offset);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::bag::sql::tautology;
    use async_trait::async_trait;

    const THINGS: TableSpec = TableSpec {
        name: "things",
        has_hidden: true,
        has_timing: true,
    };

    /// Page tree where page `n` has the single child `n * 10`.
    struct DecimalPages;

    #[async_trait]
    impl RecordStore for DecimalPages {
        async fn page_tree(&self, roots: &[u32], depth: u32) -> BagResult<Vec<u32>> {
            let mut pages = roots.to_vec();
            let mut level = roots.to_vec();
            for _ in 0..depth {
                level = level.iter().map(|p| p * 10).collect();
                pages.extend(&level);
            }
            Ok(pages)
        }

        async fn fetch_uids(&self, _query: &BagQuery) -> BagResult<Vec<u32>> {
            Ok(Vec::new())
        }

        async fn count(&self, _query: &BagQuery) -> BagResult<u64> {
            Ok(0)
        }
    }

    fn builder() -> BagBuilder {
        BagBuilder::new(THINGS, BagContext::utc(1_000)).unwrap()
    }

    #[test]
    fn missing_table_name_is_a_configuration_error() {
        let table = TableSpec { name: "", ..THINGS };
        let err = BagBuilder::new(table, BagContext::utc(0)).unwrap_err();
        assert!(err.is_configuration(), "{err}");
    }

    #[test]
    fn fresh_builder_composes_to_tautology() {
        assert_eq!(builder().compose(), tautology());
    }

    #[test]
    fn front_end_visibility_restricts_hidden_and_timing() {
        let sql = builder().build().to_postgres();

        assert!(sql.contains("FROM \"things\""), "{sql}");
        assert!(sql.contains("\"things\".\"deleted\" = 0"), "{sql}");
        assert!(sql.contains("\"things\".\"hidden\" = 0"), "{sql}");
        assert!(sql.contains("\"things\".\"starttime\" <= 1000"), "{sql}");
        assert!(sql.contains("\"things\".\"endtime\" > 1000"), "{sql}");
    }

    #[test]
    fn back_end_mode_keeps_only_deleted_check() {
        let mut b = builder();
        b.set_back_end_mode();
        let sql = b.build().to_postgres();

        assert_eq!(b.visibility(), Visibility::BackEnd);
        assert!(sql.contains("\"things\".\"deleted\" = 0"), "{sql}");
        assert!(!sql.contains("hidden"), "{sql}");
        assert!(!sql.contains("starttime"), "{sql}");
    }

    #[test]
    fn show_hidden_keeps_timing() {
        let mut b = builder();
        b.show_hidden_records();
        let sql = b.build().to_postgres();

        assert!(!sql.contains("hidden"), "{sql}");
        assert!(sql.contains("starttime"), "{sql}");
    }

    #[test]
    fn tables_without_visibility_columns() {
        let table = TableSpec {
            name: "plain",
            has_hidden: false,
            has_timing: false,
        };
        let sql = BagBuilder::new(table, BagContext::utc(0))
            .unwrap()
            .build()
            .to_postgres();

        assert!(sql.contains("\"plain\".\"deleted\" = 0"), "{sql}");
        assert!(!sql.contains("hidden"), "{sql}");
        assert!(!sql.contains("endtime"), "{sql}");
    }

    #[test]
    fn additional_tables_have_set_semantics() {
        let mut b = builder();
        b.add_additional_table_name("extra").unwrap();
        b.add_additional_table_name("extra").unwrap();

        assert_eq!(b.additional_table_names(), vec!["extra"]);
        let sql = b.build().to_postgres();
        assert_eq!(sql.matches("\"extra\"").count(), 1, "{sql}");
        assert!(sql.contains("FROM \"things\", \"extra\""), "{sql}");
    }

    #[test]
    fn removing_unknown_table_is_not_found() {
        let mut b = builder();
        let err = b.remove_additional_table_name("extra").unwrap_err();
        assert!(matches!(err, BagError::NotFound(_)), "{err}");
        assert!(err.is_precondition());
    }

    #[test]
    fn empty_table_names_are_rejected() {
        let mut b = builder();
        assert!(matches!(
            b.add_additional_table_name(""),
            Err(BagError::InvalidArgument(_))
        ));
        assert!(matches!(
            b.remove_additional_table_name(""),
            Err(BagError::InvalidArgument(_))
        ));
    }

    #[test]
    fn add_then_remove_table_restores_query() {
        let before = builder().build();

        let mut b = builder();
        b.add_additional_table_name("extra").unwrap();
        b.remove_additional_table_name("extra").unwrap();

        assert_eq!(b.build(), before);
    }

    #[test]
    fn removing_table_drops_its_join_predicates() {
        let mut b = builder();
        b.add_additional_table_name("extra").unwrap();
        b.base_mut()
            .set_join_predicate("extraJoin", "extra", col("extra", "uid").eq(1));
        b.base_mut().set_predicate("own", col(THINGS.name, "uid").eq(2));

        b.remove_additional_table_name("extra").unwrap();

        assert!(!b.predicates().has("extraJoin"));
        assert!(b.predicates().has("own"));
        assert!(!b.build().to_postgres().contains("\"extra\""));
    }

    #[test]
    fn ordering_and_window() {
        let mut b = builder();
        b.set_order_by("things.title", SortDirection::Desc)
            .set_result_window(20, 10);
        let sql = b.build().to_postgres();

        assert!(sql.contains("ORDER BY \"things\".\"title\" DESC"), "{sql}");
        assert!(sql.contains("LIMIT 10"), "{sql}");
        assert!(sql.contains("OFFSET 20"), "{sql}");

        b.set_order_by("", SortDirection::Asc).clear_limit();
        let sql = b.build().to_postgres();
        assert!(!sql.contains("ORDER BY"), "{sql}");
        assert!(!sql.contains("LIMIT"), "{sql}");
    }

    #[test]
    fn count_query_has_no_window() {
        let mut b = builder();
        b.set_limit(5);
        let sql = b.build().count().to_string(PostgresQueryBuilder);

        assert!(sql.contains("COUNT(*)"), "{sql}");
        assert!(!sql.contains("LIMIT"), "{sql}");
    }

    #[test]
    fn test_mode_restricts_to_dummy_records() {
        let mut b = builder();
        b.set_test_mode();
        let sql = b.build().to_postgres();
        assert!(sql.contains("\"things\".\"is_dummy_record\" = 1"), "{sql}");
    }

    #[tokio::test]
    async fn source_pages_without_recursion() {
        let mut b = builder();
        b.set_source_pages(&DecimalPages, "3,7,12", 0).await.unwrap();

        assert!(b.has_source_pages());
        let sql = b.build().to_postgres();
        assert!(sql.contains("\"things\".\"pid\" IN (3, 7, 12)"), "{sql}");
    }

    #[tokio::test]
    async fn source_pages_with_recursion() {
        let mut b = builder();
        b.set_source_pages(&DecimalPages, "4", 2).await.unwrap();

        let sql = b.build().to_postgres();
        assert!(sql.contains("\"things\".\"pid\" IN (4, 40, 400)"), "{sql}");
    }

    #[tokio::test]
    async fn malformed_source_pages_clear_the_limit() {
        let mut b = builder();
        b.set_source_pages(&DecimalPages, "3", 0).await.unwrap();
        assert!(b.has_source_pages());

        b.set_source_pages(&DecimalPages, "abc", 0).await.unwrap();
        assert!(!b.has_source_pages());

        b.set_source_pages(&DecimalPages, "3", 0).await.unwrap();
        b.set_source_pages(&DecimalPages, "", 0).await.unwrap();
        assert!(!b.has_source_pages());
        assert_eq!(b.compose(), tautology());
    }

    #[tokio::test]
    async fn non_ascii_digits_clear_the_limit() {
        let mut b = builder();
        for list in ["\u{0663}", "3,\u{0663}", "\u{FF11}2"] {
            b.set_source_pages(&DecimalPages, "3", 0).await.unwrap();
            b.set_source_pages(&DecimalPages, list, 0).await.unwrap();
            assert!(!b.has_source_pages(), "{list:?}");
        }
    }
}
