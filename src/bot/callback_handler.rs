//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, error};

// Import localization
use crate::localization::t_lang;

use crate::ledger::{Caster, VoteLedger, VoteOutcome};

// Import UI builder functions
use super::ui_builder::vote_outcome_text;

/// Record the vote carried by a button payload and return the acknowledgement text
pub async fn process_vote(
    ledger: &VoteLedger,
    data: Option<&str>,
    caster: Caster<'_>,
    at: i64,
    language_code: Option<&str>,
) -> String {
    let Some(data) = data else {
        return vote_outcome_text(VoteOutcome::InvalidVote, language_code);
    };

    match ledger.cast_vote_payload(data, caster, at).await {
        Ok(outcome) => vote_outcome_text(outcome, language_code),
        Err(e) => {
            error!(user_id = caster.id, error = %e, "Failed to save vote");
            t_lang("vote-save-failed", language_code)
        }
    }
}

/// Handle callback queries from the voting keyboard
pub async fn callback_handler(bot: Bot, q: CallbackQuery, ledger: VoteLedger) -> Result<()> {
    debug!(user_id = %q.from.id, "Received callback query from user");

    let language_code = q.from.language_code.as_deref();
    let caster_name = q.from.full_name();
    let caster = Caster {
        id: q.from.id.0 as i64,
        name: &caster_name,
    };

    // The vote is committed before the tap is acknowledged
    let text = process_vote(
        &ledger,
        q.data.as_deref(),
        caster,
        Utc::now().timestamp(),
        language_code,
    )
    .await;

    bot.answer_callback_query(q.id.clone()).text(text).await?;

    Ok(())
}
