use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// A poll as stored in the `polls` table
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Poll {
    pub id: i64,
    pub owner: i64,
    pub title: String,
}

/// A row of the `votes` table
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct VoteRecord {
    pub poll_id: i64,
    pub caster_id: i64,
    pub vote: i64,
    pub caster_name: String,
    pub timestamp: i64,
}

/// Vote about to be written by [`upsert_vote`]
#[derive(Debug, Clone, Copy)]
pub struct NewVote<'a> {
    pub poll_id: i64,
    pub caster_id: i64,
    pub vote: i64,
    pub caster_name: &'a str,
    pub timestamp: i64,
}

/// What [`upsert_vote`] did to the `votes` table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteWrite {
    PollMissing,
    Inserted,
    Updated,
    Unchanged,
}

/// How long a writer waits for the database lock held by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Open (creating if needed) the SQLite database behind `database_url` and initialize its schema
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database URL: {database_url}"))?;

    let parent = options.get_filename().parent().map(|p| p.to_path_buf());
    if let Some(dir) = parent.filter(|dir| !dir.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }

    connect_with(options).await
}

/// Open a pool with explicit connect options and initialize the schema
pub async fn connect_with(options: SqliteConnectOptions) -> Result<SqlitePool> {
    let options = options
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("Failed to connect to the SQLite database")?;

    init_database_schema(&pool).await?;
    Ok(pool)
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &SqlitePool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS polls (
            id INTEGER PRIMARY KEY,
            owner INTEGER NOT NULL,
            title TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create polls table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS votes (
            poll_id INTEGER NOT NULL,
            caster_id INTEGER NOT NULL,
            vote INTEGER NOT NULL CHECK (vote IN (0, 1)),
            caster_name TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            FOREIGN KEY (poll_id) REFERENCES polls(id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create votes table")?;

    // One live vote per (poll, caster); upserts conflict on this index
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_votes_poll_caster ON votes (poll_id, caster_id)",
    )
    .execute(pool)
    .await
    .context("Failed to create votes uniqueness index")?;

    sqlx::query("CREATE TABLE IF NOT EXISTS admins (id INTEGER PRIMARY KEY)")
        .execute(pool)
        .await
        .context("Failed to create admins table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Create a new poll and return its store-assigned id
pub async fn create_poll(pool: &SqlitePool, owner: i64, title: &str) -> Result<i64> {
    debug!(owner, "Creating new poll");

    let result = sqlx::query("INSERT INTO polls (owner, title) VALUES (?1, ?2)")
        .bind(owner)
        .bind(title)
        .execute(pool)
        .await
        .context("Failed to insert new poll")?;

    if result.rows_affected() < 1 {
        bail!("Poll insert did not affect any row");
    }

    let poll_id = result.last_insert_rowid();
    info!(poll_id, owner, "Poll created");
    Ok(poll_id)
}

/// Read a poll by id
pub async fn read_poll(pool: &SqlitePool, poll_id: i64) -> Result<Option<Poll>> {
    sqlx::query_as::<_, Poll>("SELECT id, owner, title FROM polls WHERE id = ?1")
        .bind(poll_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read poll")
}

/// Check membership in the `admins` table
pub async fn is_admin(pool: &SqlitePool, user_id: i64) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM admins WHERE id = ?1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to query admins")?;
    Ok(row.is_some())
}

/// Provision an admin; returns false when the id was already present
pub async fn add_admin(pool: &SqlitePool, user_id: i64) -> Result<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO admins (id) VALUES (?1)")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to insert admin")?;
    Ok(result.rows_affected() > 0)
}

/// Read the live vote of `caster_id` on `poll_id`
pub async fn read_vote(
    pool: &SqlitePool,
    poll_id: i64,
    caster_id: i64,
) -> Result<Option<VoteRecord>> {
    sqlx::query_as::<_, VoteRecord>(
        "SELECT poll_id, caster_id, vote, caster_name, timestamp
         FROM votes WHERE poll_id = ?1 AND caster_id = ?2",
    )
    .bind(poll_id)
    .bind(caster_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read vote")
}

/// Insert or overwrite a vote in a single transaction.
///
/// The transaction takes the write lock up front (`BEGIN IMMEDIATE`), so
/// concurrent casts queue on the busy timeout instead of failing while
/// upgrading a read lock.
///
/// The poll must exist. An identical repeated vote is not written at all;
/// a changed vote overwrites `vote` and `timestamp` but keeps the
/// `caster_name` captured when the vote was first cast.
pub async fn upsert_vote(pool: &SqlitePool, vote: &NewVote<'_>) -> Result<VoteWrite> {
    let mut tx = pool
        .begin_with("BEGIN IMMEDIATE")
        .await
        .context("Failed to begin vote transaction")?;

    let poll_exists = sqlx::query("SELECT 1 FROM polls WHERE id = ?1")
        .bind(vote.poll_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to check poll existence")?
        .is_some();
    if !poll_exists {
        return Ok(VoteWrite::PollMissing);
    }

    let previous: Option<i64> =
        sqlx::query_scalar("SELECT vote FROM votes WHERE poll_id = ?1 AND caster_id = ?2")
            .bind(vote.poll_id)
            .bind(vote.caster_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to read previous vote")?;

    if previous == Some(vote.vote) {
        return Ok(VoteWrite::Unchanged);
    }

    let result = sqlx::query(
        "INSERT INTO votes (poll_id, caster_id, vote, caster_name, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (poll_id, caster_id) DO UPDATE
         SET vote = excluded.vote, timestamp = excluded.timestamp
         WHERE votes.vote <> excluded.vote",
    )
    .bind(vote.poll_id)
    .bind(vote.caster_id)
    .bind(vote.vote)
    .bind(vote.caster_name)
    .bind(vote.timestamp)
    .execute(&mut *tx)
    .await
    .context("Failed to save vote")?;

    tx.commit().await.context("Failed to commit vote")?;

    let write = match (previous, result.rows_affected()) {
        (_, 0) => VoteWrite::Unchanged,
        (Some(_), _) => VoteWrite::Updated,
        (None, _) => VoteWrite::Inserted,
    };
    debug!(poll_id = vote.poll_id, caster_id = vote.caster_id, write = ?write, "Vote written");
    Ok(write)
}

/// List the votes with a given value, earliest timestamp first
pub async fn list_votes(pool: &SqlitePool, poll_id: i64, vote: i64) -> Result<Vec<VoteRecord>> {
    sqlx::query_as::<_, VoteRecord>(
        "SELECT poll_id, caster_id, vote, caster_name, timestamp
         FROM votes
         WHERE poll_id = ?1 AND vote = ?2
         ORDER BY timestamp ASC, rowid ASC",
    )
    .bind(poll_id)
    .bind(vote)
    .fetch_all(pool)
    .await
    .context("Failed to list votes")
}
