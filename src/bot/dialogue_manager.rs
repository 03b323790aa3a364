//! Dialogue Manager module for handling dialogue state transitions
//!
//! A freeform text message carries no structure telling a poll title apart
//! from a poll number, so its meaning is decided only by the sender's
//! current [`PollDialogueState`].

use anyhow::Result;
use tracing::{debug, error, info, warn};

// Import localization
use crate::localization::t_lang;

// Import dialogue types
use crate::dialogue::{parse_poll_id, validate_poll_title, PollDialogue, PollDialogueState};

use crate::ledger::VoteLedger;
use crate::poll_errors::PollError;
use crate::registry::PollRegistry;

// Import UI builder functions
use super::ui_builder::{format_error, format_poll_created, format_tally, Reply};

/// Handle `/new`: ask for a title if the participant may create polls
pub async fn begin_title_entry(
    dialogue: &PollDialogue,
    registry: &PollRegistry,
    participant: i64,
    language_code: Option<&str>,
) -> Result<Reply> {
    match registry.can_create(participant).await {
        Ok(true) => {
            dialogue.update(PollDialogueState::AwaitingTitle).await?;
            debug!(user_id = participant, "Awaiting poll title");
            Ok(Reply::text(t_lang("new-prompt", language_code)))
        }
        Ok(false) => {
            info!(user_id = participant, "Poll creation rejected for non-admin");
            Ok(Reply::text(t_lang("new-forbidden", language_code)))
        }
        Err(e) => {
            error!(user_id = participant, error = %e, "Admin check failed");
            Ok(Reply::text(format_error(&e, language_code)))
        }
    }
}

/// Handle `/results`: ask for the number of the poll to report on
pub async fn begin_result_entry(
    dialogue: &PollDialogue,
    participant: i64,
    language_code: Option<&str>,
) -> Result<Reply> {
    dialogue.update(PollDialogueState::AwaitingPollId).await?;
    debug!(user_id = participant, "Awaiting poll id for results");
    Ok(Reply::text(t_lang("results-prompt", language_code)))
}

/// Handle `/cancel`: drop back to the idle state
pub async fn cancel(dialogue: &PollDialogue, language_code: Option<&str>) -> Result<Reply> {
    let state = dialogue.get().await?.unwrap_or_default();
    if state == PollDialogueState::Idle {
        return Ok(Reply::text(t_lang("cancel-nothing", language_code)));
    }

    dialogue.exit().await?;
    Ok(Reply::text(t_lang("cancel-done", language_code)))
}

/// Interpret a freeform private message according to the sender's state.
///
/// Returns `None` when the participant is idle and the message is ignored.
pub async fn handle_text(
    dialogue: &PollDialogue,
    registry: &PollRegistry,
    ledger: &VoteLedger,
    participant: i64,
    text: &str,
    bot_username: &str,
    language_code: Option<&str>,
) -> Result<Option<Reply>> {
    let state = dialogue.get().await?.unwrap_or_default();
    debug!(user_id = participant, state = ?state, "Handling text message");

    match state {
        PollDialogueState::Idle => Ok(None),
        PollDialogueState::AwaitingTitle => {
            handle_title_input(dialogue, registry, participant, text, bot_username, language_code)
                .await
                .map(Some)
        }
        PollDialogueState::AwaitingPollId => {
            handle_poll_id_input(dialogue, registry, ledger, participant, text, language_code)
                .await
                .map(Some)
        }
    }
}

/// Create a poll from the title the participant typed
async fn handle_title_input(
    dialogue: &PollDialogue,
    registry: &PollRegistry,
    participant: i64,
    text: &str,
    bot_username: &str,
    language_code: Option<&str>,
) -> Result<Reply> {
    let title = match validate_poll_title(text) {
        Ok(title) => title,
        Err(e) => {
            // Keep dialogue active, user can try again
            log_refusal(participant, None, &e);
            return Ok(Reply::text(format_error(&e, language_code)));
        }
    };

    match registry.create_poll(participant, &title).await {
        Ok(poll_id) => {
            dialogue.exit().await?;
            Ok(Reply::text(format_poll_created(
                poll_id,
                bot_username,
                language_code,
            )))
        }
        Err(e) => {
            // The conversation does not advance without a confirmed id
            log_refusal(participant, None, &e);
            Ok(Reply::text(format_error(&e, language_code)))
        }
    }
}

/// Render the results of the poll whose number the participant typed
async fn handle_poll_id_input(
    dialogue: &PollDialogue,
    registry: &PollRegistry,
    ledger: &VoteLedger,
    participant: i64,
    text: &str,
    language_code: Option<&str>,
) -> Result<Reply> {
    let poll_id = match parse_poll_id(text) {
        Ok(poll_id) => poll_id,
        Err(e) => {
            // Keep dialogue active, user can try again
            log_refusal(participant, None, &e);
            return Ok(Reply::text(format_error(&e, language_code)));
        }
    };

    let tally = ledger.tally(registry, poll_id, participant).await;
    dialogue.exit().await?;

    match tally {
        Ok(tally) => Ok(Reply::html(format_tally(&tally, language_code))),
        Err(e) => {
            log_refusal(participant, Some(poll_id), &e);
            Ok(Reply::text(format_error(&e, language_code)))
        }
    }
}

/// Log a refused request at the level its error kind deserves
fn log_refusal(participant: i64, poll_id: Option<i64>, e: &PollError) {
    if e.is_validation() {
        debug!(user_id = participant, error = %e, "Input rejected");
    } else if let PollError::Store(_) = e {
        error!(user_id = participant, poll_id, error = %e, "Poll storage failed");
    } else {
        warn!(user_id = participant, poll_id, error = %e, "Poll request refused");
    }
}
