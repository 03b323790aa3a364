//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Me};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error};

// Import localization
use crate::localization::t_lang;

// Import dialogue types
use crate::dialogue::{parse_poll_id, PollDialogue};

use crate::ledger::VoteLedger;
use crate::poll_errors::PollError;
use crate::registry::PollRegistry;

// Import dialogue manager functions
use super::dialogue_manager::{begin_result_entry, begin_title_entry, cancel, handle_text};

// Import UI builder functions
use super::ui_builder::{format_error, format_start_summary, poll_card_reply, Reply};

/// Commands understood by the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// Show the command list, or announce a poll in a group
    Start(String),
    /// Create a poll
    New,
    /// View poll results
    Results,
    /// Cancel the current input
    Cancel,
}

/// Handle `/start <poll id>` posted into a group by the poll owner.
///
/// Non-owners get no answer at all so the poll's existence is not revealed.
pub async fn announce_poll(
    registry: &PollRegistry,
    args: &str,
    requester: i64,
    language_code: Option<&str>,
) -> Option<Reply> {
    let mut parts = args.split_whitespace();
    let raw_id = match (parts.next(), parts.next()) {
        (Some(raw_id), None) => raw_id,
        _ => return None,
    };

    let poll_id = match parse_poll_id(raw_id) {
        Ok(poll_id) => poll_id,
        Err(_) => return Some(Reply::text(t_lang("announce-invalid-id", language_code))),
    };

    match registry
        .lookup_for_group_announcement(poll_id, requester)
        .await
    {
        Ok(poll) => Some(poll_card_reply(&poll, language_code)),
        Err(PollError::NotFound(_)) => Some(Reply::text(t_lang("announce-not-found", language_code))),
        Err(PollError::Forbidden(_)) => None,
        Err(e) => {
            error!(user_id = requester, poll_id, error = %e, "Failed to look up poll for announcement");
            Some(Reply::text(format_error(&e, language_code)))
        }
    }
}

async fn handle_command(
    command: Command,
    is_private: bool,
    participant: i64,
    dialogue: &PollDialogue,
    registry: &PollRegistry,
    language_code: Option<&str>,
) -> Result<Option<Reply>> {
    debug!(user_id = participant, command = ?command, is_private, "Received command");

    let reply = match command {
        Command::Start(_) if is_private => Some(Reply::text(format_start_summary(language_code))),
        Command::Start(args) => announce_poll(registry, &args, participant, language_code).await,
        Command::New if is_private => {
            Some(begin_title_entry(dialogue, registry, participant, language_code).await?)
        }
        Command::Results if is_private => {
            Some(begin_result_entry(dialogue, participant, language_code).await?)
        }
        Command::Cancel if is_private => Some(cancel(dialogue, language_code).await?),
        Command::New | Command::Results | Command::Cancel => None,
    };

    Ok(reply)
}

/// Send a rendered reply to a chat
pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<()> {
    let mut request = bot.send_message(chat_id, reply.text);
    if let Some(parse_mode) = reply.parse_mode {
        request = request.parse_mode(parse_mode);
    }
    if let Some(keyboard) = reply.keyboard {
        request = request.reply_markup(keyboard);
    }
    request.await?;
    Ok(())
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    me: Me,
    dialogue: PollDialogue,
    registry: PollRegistry,
    ledger: VoteLedger,
) -> Result<()> {
    let (Some(text), Some(user)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };

    // Extract user's language code from Telegram
    let language_code = user.language_code.as_deref();
    let participant = user.id.0 as i64;
    let is_private = msg.chat.is_private();

    let reply = match Command::parse(text, me.username()) {
        Ok(command) => {
            handle_command(
                command,
                is_private,
                participant,
                &dialogue,
                &registry,
                language_code,
            )
            .await?
        }
        Err(_) if text.starts_with('/') => {
            debug!(user_id = participant, "Ignoring unknown command");
            None
        }
        Err(_) if is_private => {
            handle_text(
                &dialogue,
                &registry,
                &ledger,
                participant,
                text,
                me.username(),
                language_code,
            )
            .await?
        }
        Err(_) => None,
    };

    if let Some(reply) = reply {
        send_reply(&bot, msg.chat.id, reply).await?;
    }

    Ok(())
}
