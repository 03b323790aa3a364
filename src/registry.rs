//! Poll registry: creating polls and the ownership / admin checks guarding them.

use sqlx::sqlite::SqlitePool;
use tracing::{debug, info};

use crate::db::{self, Poll};
use crate::poll_errors::{PollError, PollResult};

/// Access to the `polls` and `admins` tables through an owned store handle
#[derive(Clone, Debug)]
pub struct PollRegistry {
    pool: SqlitePool,
    admin_only_polls: bool,
}

impl PollRegistry {
    pub fn new(pool: SqlitePool, admin_only_polls: bool) -> Self {
        Self {
            pool,
            admin_only_polls,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persist a new poll and return its id
    pub async fn create_poll(&self, owner: i64, title: &str) -> PollResult<i64> {
        let poll_id = db::create_poll(&self.pool, owner, title).await?;
        Ok(poll_id)
    }

    /// Whether `participant` may start creating a poll
    pub async fn can_create(&self, participant: i64) -> PollResult<bool> {
        if !self.admin_only_polls {
            return Ok(true);
        }
        Ok(db::is_admin(&self.pool, participant).await?)
    }

    /// Lookup used when a poll is announced into a group with `/start <id>`.
    ///
    /// Callers must not tell a non-owner anything about a `Forbidden` result.
    pub async fn lookup_for_group_announcement(
        &self,
        poll_id: i64,
        requester: i64,
    ) -> PollResult<Poll> {
        let result = self.lookup_owned(poll_id, requester).await;
        if let Err(PollError::Forbidden(_)) = result {
            debug!(poll_id, requester, "Ignoring group announcement by non-owner");
        }
        result
    }

    /// Lookup used for a private results request
    pub async fn lookup_for_results(&self, poll_id: i64, requester: i64) -> PollResult<Poll> {
        let result = self.lookup_owned(poll_id, requester).await;
        if let Err(PollError::Forbidden(_)) = result {
            info!(poll_id, requester, "Results requested by non-owner");
        }
        result
    }

    async fn lookup_owned(&self, poll_id: i64, requester: i64) -> PollResult<Poll> {
        let poll = db::read_poll(&self.pool, poll_id)
            .await?
            .ok_or(PollError::NotFound(poll_id))?;

        if poll.owner != requester {
            return Err(PollError::Forbidden(poll_id));
        }
        Ok(poll)
    }
}
