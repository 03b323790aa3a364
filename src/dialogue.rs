//! Poll conversation dialogue module: per-user state that decides what the
//! next freeform text message means.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::poll_errors::PollError;

/// Longest accepted poll title, in characters
pub const MAX_TITLE_CHARS: usize = 255;

/// Represents the conversation state of a private chat with the bot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollDialogueState {
    #[default]
    Idle,
    AwaitingTitle,
    AwaitingPollId,
}

/// Type alias for our poll dialogue
pub type PollDialogue = Dialogue<PollDialogueState, InMemStorage<PollDialogueState>>;

/// Validates a poll title input
pub fn validate_poll_title(title: &str) -> Result<String, PollError> {
    let trimmed = title.trim();

    if trimmed.is_empty() {
        return Err(PollError::InvalidTitle("empty"));
    }

    if trimmed.chars().count() > MAX_TITLE_CHARS {
        return Err(PollError::InvalidTitle("too_long"));
    }

    Ok(trimmed.to_string())
}

/// Parses a poll number typed as plain text
pub fn parse_poll_id(text: &str) -> Result<i64, PollError> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| PollError::InvalidPollId(text.to_string()))
}
