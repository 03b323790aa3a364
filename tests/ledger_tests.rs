//! # Vote Ledger Tests
//!
//! Upsert semantics of votes and the ordering contract of tallies,
//! run against a temporary SQLite database.

use anyhow::Result;
use pollbot::db::{self, connect_with};
use pollbot::ledger::{Caster, VoteLedger, VoteOutcome};
use pollbot::poll_errors::PollError;
use pollbot::bot::ui_builder::{format_error, format_tally};
use pollbot::registry::PollRegistry;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::collections::HashMap;
use tempfile::NamedTempFile;

struct Fixture {
    pool: SqlitePool,
    registry: PollRegistry,
    ledger: VoteLedger,
    _temp_file: NamedTempFile,
}

async fn setup() -> Result<Fixture> {
    let temp_file = NamedTempFile::new()?;
    let pool = connect_with(SqliteConnectOptions::new().filename(temp_file.path())).await?;
    Ok(Fixture {
        registry: PollRegistry::new(pool.clone(), true),
        ledger: VoteLedger::new(pool.clone()),
        pool,
        _temp_file: temp_file,
    })
}

fn caster(id: i64, name: &str) -> Caster<'_> {
    Caster { id, name }
}

async fn row_count(pool: &SqlitePool, poll_id: i64, caster_id: i64) -> Result<i64> {
    let count =
        sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE poll_id = ?1 AND caster_id = ?2")
            .bind(poll_id)
            .bind(caster_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

#[tokio::test]
async fn test_repeated_vote_is_unchanged() -> Result<()> {
    let fx = setup().await?;
    let poll_id = fx.registry.create_poll(123, "Movie Night").await?;

    for value in [0, 1] {
        let voter = 400 + value;
        let first = fx.ledger.cast_vote(poll_id, caster(voter, "Ann"), value, 100).await?;
        let second = fx.ledger.cast_vote(poll_id, caster(voter, "Ann"), value, 200).await?;
        assert_eq!(first, VoteOutcome::Created);
        assert_eq!(second, VoteOutcome::Unchanged);
        assert_eq!(row_count(&fx.pool, poll_id, voter).await?, 1);

        // Replay does not refresh the timestamp
        let stored = db::read_vote(&fx.pool, poll_id, voter).await?.unwrap();
        assert_eq!(stored.timestamp, 100);
    }
    Ok(())
}

#[tokio::test]
async fn test_changed_vote_overwrites_value_and_timestamp() -> Result<()> {
    let fx = setup().await?;
    let poll_id = fx.registry.create_poll(123, "Movie Night").await?;

    assert_eq!(
        fx.ledger.cast_vote(poll_id, caster(456, "John Doe"), 1, 100).await?,
        VoteOutcome::Created
    );
    assert_eq!(
        fx.ledger.cast_vote(poll_id, caster(456, "Johnny"), 0, 250).await?,
        VoteOutcome::Updated
    );

    let stored = db::read_vote(&fx.pool, poll_id, 456).await?.unwrap();
    assert_eq!(stored.vote, 0);
    assert_eq!(stored.timestamp, 250);
    // Display name stays the one captured by the first vote
    assert_eq!(stored.caster_name, "John Doe");
    assert_eq!(row_count(&fx.pool, poll_id, 456).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_invalid_votes_never_touch_the_store() -> Result<()> {
    let fx = setup().await?;
    let poll_id = fx.registry.create_poll(123, "Movie Night").await?;

    for value in [2, -1, 10] {
        assert_eq!(
            fx.ledger.cast_vote(poll_id, caster(456, "Ann"), value, 100).await?,
            VoteOutcome::InvalidVote
        );
    }
    for payload in ["1", "1 2", "1 1 1", "one 1", ""] {
        assert_eq!(
            fx.ledger.cast_vote_payload(payload, caster(456, "Ann"), 100).await?,
            VoteOutcome::InvalidVote
        );
    }
    assert_eq!(row_count(&fx.pool, poll_id, 456).await?, 0);

    // An invalid vote does not disturb an existing one either
    fx.ledger.cast_vote(poll_id, caster(456, "Ann"), 1, 100).await?;
    fx.ledger.cast_vote_payload("1 5", caster(456, "Ann"), 200).await?;
    let stored = db::read_vote(&fx.pool, poll_id, 456).await?.unwrap();
    assert_eq!((stored.vote, stored.timestamp), (1, 100));
    Ok(())
}

#[tokio::test]
async fn test_vote_on_missing_poll() -> Result<()> {
    let fx = setup().await?;

    assert_eq!(
        fx.ledger.cast_vote_payload("42 1", caster(456, "Ann"), 100).await?,
        VoteOutcome::PollNotFound
    );
    assert_eq!(row_count(&fx.pool, 42, 456).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_movie_night_scenario() -> Result<()> {
    let fx = setup().await?;

    let poll_id = fx.registry.create_poll(123, "Movie Night").await?;
    assert_eq!(poll_id, 1);

    let empty = fx.ledger.tally(&fx.registry, poll_id, 123).await?;
    assert!(empty.yes.is_empty());
    assert!(empty.no.is_empty());
    let report = format_tally(&fx.ledger.tally(&fx.registry, poll_id, 123).await?, Some("en"));
    assert!(report.contains("Yes (0)"));
    assert!(report.contains("No (0)"));

    assert_eq!(
        fx.ledger.cast_vote_payload("1 1", caster(456, "Ann"), 1_000).await?,
        VoteOutcome::Created
    );
    assert_eq!(
        fx.ledger.cast_vote_payload("1 0", caster(457, "Bob"), 2_000).await?,
        VoteOutcome::Created
    );
    assert_eq!(
        fx.ledger.cast_vote_payload("1 0", caster(456, "Ann"), 3_000).await?,
        VoteOutcome::Updated
    );

    let tally = fx.ledger.tally(&fx.registry, poll_id, 123).await?;
    assert!(tally.yes.is_empty());
    // Ordered by the time each voter last changed their answer:
    // Bob became a "no" voter at 2000, Ann at 3000
    let no: Vec<(i64, i64)> = tally.no.iter().map(|e| (e.caster_id, e.timestamp)).collect();
    assert_eq!(no, vec![(457, 2_000), (456, 3_000)]);

    let report = format_tally(&fx.ledger.tally(&fx.registry, poll_id, 123).await?, Some("en"));
    assert!(report.contains("Yes (0)"));
    assert!(report.contains("No (2)"));
    assert!(report.find("Bob").unwrap() < report.find("Ann").unwrap());
    Ok(())
}

#[tokio::test]
async fn test_tally_lists_yes_before_no_in_time_order() -> Result<()> {
    let fx = setup().await?;
    let poll_id = fx.registry.create_poll(123, "Picnic").await?;

    fx.ledger.cast_vote(poll_id, caster(1, "Zoe"), 0, 50).await?;
    fx.ledger.cast_vote(poll_id, caster(2, "Carl"), 1, 300).await?;
    fx.ledger.cast_vote(poll_id, caster(3, "Alice"), 1, 100).await?;
    fx.ledger.cast_vote(poll_id, caster(4, "Dave"), 0, 20).await?;

    let tally = fx.ledger.tally(&fx.registry, poll_id, 123).await?;
    let yes: Vec<&str> = tally.yes.iter().map(|e| e.caster_name.as_str()).collect();
    let no: Vec<&str> = tally.no.iter().map(|e| e.caster_name.as_str()).collect();
    assert_eq!(yes, vec!["Alice", "Carl"]);
    assert_eq!(no, vec!["Dave", "Zoe"]);

    let report = format_tally(&fx.ledger.tally(&fx.registry, poll_id, 123).await?, Some("en"));
    let positions: Vec<usize> = ["Alice", "Carl", "Dave", "Zoe"]
        .iter()
        .map(|name| report.find(name).unwrap())
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    Ok(())
}

#[tokio::test]
async fn test_tally_for_non_owner_is_forbidden() -> Result<()> {
    let fx = setup().await?;
    let poll_id = fx.registry.create_poll(123, "Secret Party").await?;
    fx.ledger.cast_vote(poll_id, caster(456, "John Doe"), 1, 100).await?;

    let result = fx.ledger.tally(&fx.registry, poll_id, 999).await;
    let error = result.unwrap_err();
    assert!(matches!(error, PollError::Forbidden(id) if id == poll_id));

    let text = format_error(&error, Some("en"));
    assert!(!text.contains("Secret Party"));
    assert!(!text.contains("John Doe"));

    assert!(matches!(
        fx.ledger.tally(&fx.registry, 77, 123).await,
        Err(PollError::NotFound(77))
    ));
    Ok(())
}

async fn cast_concurrently(
    ledger: &VoteLedger,
    votes: Vec<(i64, i64, i64)>,
) -> Result<Vec<(i64, VoteOutcome)>> {
    let handles: Vec<_> = votes
        .into_iter()
        .map(|(poll_id, caster_id, value)| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let name = format!("Voter {caster_id}");
                let outcome = ledger
                    .cast_vote(poll_id, caster(caster_id, &name), value, 1_000)
                    .await;
                (caster_id, outcome)
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        let (caster_id, outcome) = handle.await?;
        outcomes.push((caster_id, outcome?));
    }
    Ok(outcomes)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_double_taps_resolve_to_one_vote() -> Result<()> {
    let fx = setup().await?;
    let poll_id = fx.registry.create_poll(123, "Movie Night").await?;

    let taps = (1..=50)
        .flat_map(|caster_id| std::iter::repeat((poll_id, caster_id, 1)).take(4))
        .collect();
    let outcomes = cast_concurrently(&fx.ledger, taps).await?;

    let mut per_caster: HashMap<i64, Vec<VoteOutcome>> = HashMap::new();
    for (caster_id, outcome) in outcomes {
        per_caster.entry(caster_id).or_default().push(outcome);
    }
    assert_eq!(per_caster.len(), 50);
    for (caster_id, outcomes) in &per_caster {
        let created = outcomes.iter().filter(|o| **o == VoteOutcome::Created).count();
        let unchanged = outcomes.iter().filter(|o| **o == VoteOutcome::Unchanged).count();
        assert_eq!((created, unchanged), (1, 3), "caster {caster_id}: {outcomes:?}");
        assert_eq!(row_count(&fx.pool, poll_id, *caster_id).await?, 1);
    }

    let tally = fx.ledger.tally(&fx.registry, poll_id, 123).await?;
    assert_eq!(tally.yes.len(), 50);
    assert!(tally.no.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_from_different_casters_all_land() -> Result<()> {
    let fx = setup().await?;
    let first = fx.registry.create_poll(123, "Picnic").await?;
    let second = fx.registry.create_poll(123, "Hike").await?;

    let votes = (1..=100)
        .map(|caster_id| {
            let poll_id = if caster_id % 2 == 0 { first } else { second };
            (poll_id, caster_id, caster_id % 3 % 2)
        })
        .collect();
    let outcomes = cast_concurrently(&fx.ledger, votes).await?;

    assert_eq!(outcomes.len(), 100);
    assert!(outcomes.iter().all(|(_, o)| *o == VoteOutcome::Created));

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes")
        .fetch_one(&fx.pool)
        .await?;
    assert_eq!(total, 100);
    Ok(())
}
