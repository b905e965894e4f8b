//! Record stores: where bag queries are executed and page trees resolved.
//!
//! Builders stay free of I/O apart from resolving source pages. Queries are
//! rendered with the SeaQuery backend matching the pool and executed through
//! sqlx.

use std::collections::BTreeSet;
use std::future::Future;

use async_trait::async_trait;
use sea_query::{ExprTrait, PostgresQueryBuilder, SelectStatement, SqliteQueryBuilder};
use sqlx::PgPool;
use sqlx::SqlitePool;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{debug, warn};

use crate::bag::BagQuery;
use crate::bag::sql::{PAGES, col, select_column};
use crate::error::{BagError, BagResult};

/// Collaborator that executes bag queries.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// `roots` plus their non-deleted subpages down to `depth` levels,
    /// deduplicated and sorted.
    async fn page_tree(&self, roots: &[u32], depth: u32) -> BagResult<Vec<u32>>;

    /// Uids of the records in the bag, in bag order.
    async fn fetch_uids(&self, query: &BagQuery) -> BagResult<Vec<u32>>;

    /// Number of records in the bag, ignoring the result window.
    async fn count(&self, query: &BagQuery) -> BagResult<u64>;
}

/// `SELECT uid FROM pages WHERE pid IN (parents) AND deleted = 0`.
fn child_pages(parents: &[u32]) -> SelectStatement {
    let mut query = select_column(PAGES, "uid");
    query
        .and_where(col(PAGES, "pid").is_in(parents.iter().copied()))
        .and_where(col(PAGES, "deleted").eq(0));
    query
}

/// Breadth-first expansion of `roots`, one `children` call per level.
///
/// Pages already seen are not expanded again, so cyclic trees terminate.
async fn walk_page_tree<F, Fut>(roots: &[u32], depth: u32, mut children: F) -> BagResult<Vec<u32>>
where
    F: FnMut(Vec<u32>) -> Fut,
    Fut: Future<Output = BagResult<Vec<u32>>>,
{
    let mut seen: BTreeSet<u32> = roots.iter().copied().collect();
    let mut level: Vec<u32> = seen.iter().copied().collect();

    for _ in 0..depth {
        if level.is_empty() {
            break;
        }
        level = children(level)
            .await?
            .into_iter()
            .filter(|uid| seen.insert(*uid))
            .collect();
    }

    Ok(seen.into_iter().collect())
}

fn to_uid<T>(value: T) -> BagResult<u32>
where
    T: TryInto<u32> + Copy + std::fmt::Display,
{
    value
        .try_into()
        .map_err(|_| BagError::invalid(format!("uid {value} is out of range")))
}

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `url` with a pool of at most `max_connections`.
    pub async fn connect(url: &str, max_connections: u32) -> BagResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    async fn uids(&self, sql: String) -> BagResult<Vec<u32>> {
        debug!(%sql, "fetching uids");
        let rows: Vec<i32> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(to_uid).collect()
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn page_tree(&self, roots: &[u32], depth: u32) -> BagResult<Vec<u32>> {
        walk_page_tree(roots, depth, |parents| {
            let sql = child_pages(&parents).to_string(PostgresQueryBuilder);
            self.uids(sql)
        })
        .await
    }

    async fn fetch_uids(&self, query: &BagQuery) -> BagResult<Vec<u32>> {
        let sql = query.select_uids().to_string(PostgresQueryBuilder);
        self.uids(sql).await
    }

    async fn count(&self, query: &BagQuery) -> BagResult<u64> {
        let sql = query.count().to_string(PostgresQueryBuilder);
        debug!(%sql, "counting");
        let total: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }
}

/// SQLite-backed store.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database at `url` (`sqlite:path` or `sqlite::memory:`).
    pub async fn connect(url: &str, max_connections: u32) -> BagResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    async fn uids(&self, sql: String) -> BagResult<Vec<u32>> {
        debug!(%sql, "fetching uids");
        let rows: Vec<i64> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(to_uid).collect()
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn page_tree(&self, roots: &[u32], depth: u32) -> BagResult<Vec<u32>> {
        walk_page_tree(roots, depth, |parents| {
            let sql = child_pages(&parents).to_string(SqliteQueryBuilder);
            self.uids(sql)
        })
        .await
    }

    async fn fetch_uids(&self, query: &BagQuery) -> BagResult<Vec<u32>> {
        let sql = query.select_uids().to_string(SqliteQueryBuilder);
        self.uids(sql).await
    }

    async fn count(&self, query: &BagQuery) -> BagResult<u64> {
        let sql = query.count().to_string(SqliteQueryBuilder);
        debug!(%sql, "counting");
        let total: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }
}

/// Store without a database, for rendering queries only.
///
/// Page lists are taken as given; subpages cannot be resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineStore;

#[async_trait]
impl RecordStore for OfflineStore {
    async fn page_tree(&self, roots: &[u32], depth: u32) -> BagResult<Vec<u32>> {
        if depth > 0 {
            warn!(depth, "no database configured; subpages are not resolved");
        }
        walk_page_tree(roots, 0, |_| async { Ok(Vec::new()) }).await
    }

    async fn fetch_uids(&self, _query: &BagQuery) -> BagResult<Vec<u32>> {
        Err(BagError::Configuration(
            "no database configured; set DATABASE_URL".to_string(),
        ))
    }

    async fn count(&self, _query: &BagQuery) -> BagResult<u64> {
        Err(BagError::Configuration(
            "no database configured; set DATABASE_URL".to_string(),
        ))
    }
}
