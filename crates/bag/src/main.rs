//! Seminar bag query tool
//!
//! Builds an event bag from a JSON definition and prints the SQL, or runs it.
//!
//! Usage:
//!   seminars-bag --definition upcoming.json --dialect sqlite
//!   seminars-bag --time-frame today --search yoga --execute

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sea_query::{PostgresQueryBuilder, SqliteQueryBuilder};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use seminars_bag::config::Config;
use seminars_bag::{
    BagBuild, BagQuery, EventBagBuilder, EventQuery, OfflineStore, PgRecordStore, RecordStore,
    SqliteRecordStore, TimeFrame,
};

/// SQL dialect to render or execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Dialect {
    Postgres,
    Sqlite,
}

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with an event bag definition.
    #[arg(long)]
    definition: Option<PathBuf>,

    /// Time frame, overriding the definition (e.g. `upcoming`, `today`).
    #[arg(long)]
    time_frame: Option<TimeFrame>,

    /// Full-text search phrase, overriding the definition.
    #[arg(long)]
    search: Option<String>,

    /// SQL dialect; defaults to the one of DATABASE_URL, else postgres.
    #[arg(long, value_enum)]
    dialect: Option<Dialect>,

    /// Run the query and print the matching uids.
    #[arg(long)]
    execute: bool,

    /// Run the query and print the number of matching events.
    #[arg(long, conflicts_with = "execute")]
    count: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    let context = config.bag_context()?;

    let mut definition = match &args.definition {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<EventQuery>(&text)
                .with_context(|| format!("invalid event bag definition in {}", path.display()))?
        }
        None => EventQuery::default(),
    };
    if let Some(frame) = args.time_frame {
        definition.time_frame = Some(frame);
    }
    if let Some(phrase) = args.search.clone() {
        definition.search = Some(phrase);
    }

    let dialect = args
        .dialect
        .or_else(|| config.database_url.as_deref().map(dialect_of))
        .unwrap_or(Dialect::Postgres);

    let store = connect(&config, dialect, args.execute || args.count).await?;

    let mut builder = EventBagBuilder::new(context)?;
    definition
        .apply(&mut builder, store.as_ref())
        .await
        .context("failed to apply event bag definition")?;
    let query = builder.build();

    if args.count {
        let total = store.count(&query).await.context("count query failed")?;
        println!("{total}");
    } else if args.execute {
        let uids = store.fetch_uids(&query).await.context("bag query failed")?;
        info!(events = uids.len(), "bag fetched");
        for uid in uids {
            println!("{uid}");
        }
    } else {
        println!("{}", render(&query, dialect));
    }

    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn dialect_of(url: &str) -> Dialect {
    if url.starts_with("sqlite:") {
        Dialect::Sqlite
    } else {
        Dialect::Postgres
    }
}

fn render(query: &BagQuery, dialect: Dialect) -> String {
    match dialect {
        Dialect::Postgres => query.select().to_string(PostgresQueryBuilder),
        Dialect::Sqlite => query.select().to_string(SqliteQueryBuilder),
    }
}

/// Open the configured database, or an offline store when none is configured.
///
/// Executing requires a database; rendering only resolves subpages when one
/// is available.
async fn connect(
    config: &Config,
    dialect: Dialect,
    execute: bool,
) -> Result<Box<dyn RecordStore>> {
    let Some(url) = config.database_url.as_deref() else {
        anyhow::ensure!(!execute, "DATABASE_URL must be set to execute queries");
        return Ok(Box::new(OfflineStore));
    };

    let store: Box<dyn RecordStore> = match dialect {
        Dialect::Postgres => Box::new(
            PgRecordStore::connect(url, config.database_max_connections)
                .await
                .context("failed to connect to PostgreSQL")?,
        ),
        Dialect::Sqlite => Box::new(
            SqliteRecordStore::connect(url, config.database_max_connections)
                .await
                .context("failed to open SQLite database")?,
        ),
    };
    info!(?dialect, "database connected");
    Ok(store)
}
