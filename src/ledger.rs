//! Vote ledger: recording yes/no votes per (poll, caster) and producing
//! time-ordered tallies for the poll owner.

use sqlx::sqlite::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::db::{self, NewVote, Poll, VoteRecord, VoteWrite};
use crate::poll_errors::{PollError, PollResult};
use crate::registry::PollRegistry;

/// The two possible answers to a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChoice {
    No,
    Yes,
}

impl VoteChoice {
    /// Value stored in the `votes.vote` column
    pub fn as_i64(self) -> i64 {
        match self {
            VoteChoice::No => 0,
            VoteChoice::Yes => 1,
        }
    }
}

impl TryFrom<i64> for VoteChoice {
    type Error = PollError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VoteChoice::No),
            1 => Ok(VoteChoice::Yes),
            other => Err(PollError::InvalidVote(other.to_string())),
        }
    }
}

/// A decoded inline button payload: `"<poll id> <0|1>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ballot {
    pub poll_id: i64,
    pub choice: VoteChoice,
}

impl Ballot {
    pub fn new(poll_id: i64, choice: VoteChoice) -> Self {
        Self { poll_id, choice }
    }

    /// Callback data carried by the voting button
    pub fn payload(&self) -> String {
        format!("{} {}", self.poll_id, self.choice.as_i64())
    }
}

impl FromStr for Ballot {
    type Err = PollError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let invalid = || PollError::InvalidVote(data.to_string());

        let numbers = data
            .split_whitespace()
            .map(|part| part.parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;

        match numbers.as_slice() {
            [poll_id, vote] => {
                let choice = VoteChoice::try_from(*vote).map_err(|_| invalid())?;
                Ok(Ballot::new(*poll_id, choice))
            }
            _ => Err(invalid()),
        }
    }
}

/// The voter as seen at cast time
#[derive(Debug, Clone, Copy)]
pub struct Caster<'a> {
    pub id: i64,
    pub name: &'a str,
}

/// Result of a cast attempt that reached the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Created,
    Updated,
    Unchanged,
    PollNotFound,
    InvalidVote,
}

/// One voter line of a tally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyEntry {
    pub caster_id: i64,
    pub caster_name: String,
    pub timestamp: i64,
}

impl From<VoteRecord> for TallyEntry {
    fn from(record: VoteRecord) -> Self {
        Self {
            caster_id: record.caster_id,
            caster_name: record.caster_name,
            timestamp: record.timestamp,
        }
    }
}

/// Votes of a poll split by answer, each group earliest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub poll: Poll,
    pub yes: Vec<TallyEntry>,
    pub no: Vec<TallyEntry>,
}

/// Vote storage bound to an owned store handle
#[derive(Clone, Debug)]
pub struct VoteLedger {
    pool: SqlitePool,
}

impl VoteLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record `vote` (must be 0 or 1) by `caster` on `poll_id` at unix time `at`
    pub async fn cast_vote(
        &self,
        poll_id: i64,
        caster: Caster<'_>,
        vote: i64,
        at: i64,
    ) -> PollResult<VoteOutcome> {
        let choice = match VoteChoice::try_from(vote) {
            Ok(choice) => choice,
            Err(_) => {
                warn!(poll_id, caster_id = caster.id, vote, "Rejected vote outside 0/1");
                return Ok(VoteOutcome::InvalidVote);
            }
        };
        self.record(Ballot::new(poll_id, choice), caster, at).await
    }

    /// Decode a button payload and record it
    pub async fn cast_vote_payload(
        &self,
        payload: &str,
        caster: Caster<'_>,
        at: i64,
    ) -> PollResult<VoteOutcome> {
        match payload.parse::<Ballot>() {
            Ok(ballot) => self.record(ballot, caster, at).await,
            Err(e) => {
                warn!(caster_id = caster.id, error = %e, "Malformed vote payload");
                Ok(VoteOutcome::InvalidVote)
            }
        }
    }

    async fn record(&self, ballot: Ballot, caster: Caster<'_>, at: i64) -> PollResult<VoteOutcome> {
        let write = db::upsert_vote(
            &self.pool,
            &NewVote {
                poll_id: ballot.poll_id,
                caster_id: caster.id,
                vote: ballot.choice.as_i64(),
                caster_name: caster.name,
                timestamp: at,
            },
        )
        .await?;

        let outcome = match write {
            VoteWrite::PollMissing => VoteOutcome::PollNotFound,
            VoteWrite::Inserted => VoteOutcome::Created,
            VoteWrite::Updated => VoteOutcome::Updated,
            VoteWrite::Unchanged => VoteOutcome::Unchanged,
        };
        info!(
            poll_id = ballot.poll_id,
            caster_id = caster.id,
            outcome = ?outcome,
            "Vote processed"
        );
        Ok(outcome)
    }

    /// Collect the votes of a poll for its owner
    pub async fn tally(
        &self,
        registry: &PollRegistry,
        poll_id: i64,
        requester: i64,
    ) -> PollResult<Tally> {
        let poll = registry.lookup_for_results(poll_id, requester).await?;

        let yes = db::list_votes(&self.pool, poll_id, VoteChoice::Yes.as_i64()).await?;
        let no = db::list_votes(&self.pool, poll_id, VoteChoice::No.as_i64()).await?;
        debug!(poll_id, yes = yes.len(), no = no.len(), "Tally collected");

        Ok(Tally {
            poll,
            yes: yes.into_iter().map(TallyEntry::from).collect(),
            no: no.into_iter().map(TallyEntry::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ballot_parsing() {
        assert_eq!("12 1".parse::<Ballot>().unwrap(), Ballot::new(12, VoteChoice::Yes));
        assert_eq!("12 0".parse::<Ballot>().unwrap(), Ballot::new(12, VoteChoice::No));
        assert_eq!(" 3   0 ".parse::<Ballot>().unwrap(), Ballot::new(3, VoteChoice::No));
    }

    #[test]
    fn test_malformed_ballots() {
        for payload in ["", "1", "1 2", "1 -1", "1 1 1", "a 1", "1 yes", "1,1"] {
            assert!(
                matches!(payload.parse::<Ballot>(), Err(PollError::InvalidVote(_))),
                "payload {payload:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_payload_matches_parser() {
        let ballot = Ballot::new(7, VoteChoice::Yes);
        assert_eq!(ballot.payload(), "7 1");
        assert_eq!(ballot.payload().parse::<Ballot>().unwrap(), ballot);
    }

    #[test]
    fn test_vote_choice_domain() {
        assert_eq!(VoteChoice::try_from(1).unwrap(), VoteChoice::Yes);
        assert_eq!(VoteChoice::try_from(0).unwrap(), VoteChoice::No);
        assert!(VoteChoice::try_from(2).is_err());
    }
}
