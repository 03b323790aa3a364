//! UI Builder module for creating keyboards and formatting messages

use chrono::DateTime;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};

// Import localization
use crate::localization::{t_args_lang, t_lang};

use crate::db::Poll;
use crate::ledger::{Ballot, Tally, TallyEntry, VoteChoice, VoteOutcome};
use crate::poll_errors::PollError;

/// A rendered outbound message, ready to be sent by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Reply {
    /// Plain text reply
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: None,
            keyboard: None,
        }
    }

    /// Reply rendered with Telegram HTML markup
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            parse_mode: Some(ParseMode::Html),
            ..Self::text(text)
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Command summary shown on `/start` in a private chat
pub fn format_start_summary(language_code: Option<&str>) -> String {
    t_lang("start-summary", language_code)
}

/// Deep link that adds the bot to a group and announces the poll there
pub fn poll_link(bot_username: &str, poll_id: i64) -> String {
    format!("https://t.me/{bot_username}?startgroup={poll_id}")
}

/// Confirmation sent to the owner after a poll was created
pub fn format_poll_created(poll_id: i64, bot_username: &str, language_code: Option<&str>) -> String {
    t_args_lang(
        "poll-created",
        &[
            ("id", &poll_id.to_string()),
            ("link", &poll_link(bot_username, poll_id)),
        ],
        language_code,
    )
}

/// Text of the voting card posted into a group
pub fn format_poll_card(poll: &Poll, language_code: Option<&str>) -> String {
    t_args_lang(
        "poll-card",
        &[("title", &poll.title), ("id", &poll.id.to_string())],
        language_code,
    )
}

/// Yes/No buttons bound to `"<poll id> 1"` and `"<poll id> 0"`
pub fn create_vote_keyboard(poll_id: i64, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            t_lang("button-yes", language_code),
            Ballot::new(poll_id, VoteChoice::Yes).payload(),
        ),
        InlineKeyboardButton::callback(
            t_lang("button-no", language_code),
            Ballot::new(poll_id, VoteChoice::No).payload(),
        ),
    ]])
}

/// Voting card reply for a group announcement
pub fn poll_card_reply(poll: &Poll, language_code: Option<&str>) -> Reply {
    Reply::text(format_poll_card(poll, language_code))
        .with_keyboard(create_vote_keyboard(poll.id, language_code))
}

/// Unix seconds as a UTC time for the results report
pub fn format_timestamp(timestamp: i64) -> String {
    match DateTime::from_timestamp(timestamp, 0) {
        Some(time) => time.format("%Y-%m-%d %H:%M").to_string(),
        None => timestamp.to_string(),
    }
}

/// Telegram rejects messages longer than this many UTF-16 code units
pub const MESSAGE_LIMIT: usize = 4096;

const PRE_OPEN: &str = "<pre>\n";
const PRE_CLOSE: &str = "</pre>\n";

fn text_len(text: &str) -> usize {
    text.encode_utf16().count()
}

fn overflow_line(hidden: usize, language_code: Option<&str>) -> String {
    let mut line = t_args_lang("results-more", &[("count", &hidden.to_string())], language_code);
    line.push('\n');
    line
}

/// Render one answer group, listing voters only while the section stays within `budget`
fn format_tally_section(
    label: String,
    entries: &[TallyEntry],
    budget: usize,
    language_code: Option<&str>,
) -> String {
    let mut section = label;
    if entries.is_empty() {
        section.push('\n');
        return section;
    }

    section.push_str(PRE_OPEN);
    let mut used = text_len(&section) + text_len(PRE_CLOSE);
    for (i, entry) in entries.iter().enumerate() {
        let line = format!(
            "{}: {} ({})\n",
            i + 1,
            html_escape::encode_text(&entry.caster_name),
            format_timestamp(entry.timestamp)
        );
        let after = entries.len() - i - 1;
        // Room for the "and N more" line must remain while voters are left out
        let reserve = if after == 0 {
            0
        } else {
            text_len(&overflow_line(after, language_code))
        };

        if used + text_len(&line) + reserve > budget {
            section.push_str(&overflow_line(entries.len() - i, language_code));
            break;
        }
        used += text_len(&line);
        section.push_str(&line);
    }
    section.push_str(PRE_CLOSE);
    section
}

/// Results report: "yes" voters first, then "no" voters, each earliest first.
///
/// Long voter lists are cut with a count of the voters left out so the
/// report fits into a single Telegram message.
pub fn format_tally(tally: &Tally, language_code: Option<&str>) -> String {
    let header = t_args_lang(
        "results-header",
        &[
            ("title", &html_escape::encode_text(&tally.poll.title)),
            ("id", &tally.poll.id.to_string()),
        ],
        language_code,
    );
    let yes_label = t_args_lang(
        "results-yes",
        &[("count", &tally.yes.len().to_string())],
        language_code,
    );
    let no_label = t_args_lang(
        "results-no",
        &[("count", &tally.no.len().to_string())],
        language_code,
    );

    // Two blank-line separators plus one newline join the parts
    let fixed = text_len(&header) + 3;
    let no_minimum = if tally.no.is_empty() {
        text_len(&no_label) + 1
    } else {
        text_len(&no_label)
            + text_len(PRE_OPEN)
            + text_len(&overflow_line(tally.no.len(), language_code))
            + text_len(PRE_CLOSE)
    };

    let yes_budget = MESSAGE_LIMIT.saturating_sub(fixed + no_minimum);
    let yes_section = format_tally_section(yes_label, &tally.yes, yes_budget, language_code);
    let no_budget = MESSAGE_LIMIT.saturating_sub(fixed + text_len(&yes_section));
    let no_section = format_tally_section(no_label, &tally.no, no_budget, language_code);

    format!("{}\n\n{}\n{}", header, yes_section, no_section)
        .trim_end()
        .to_string()
}

/// Callback acknowledgement for a processed vote
pub fn vote_outcome_text(outcome: VoteOutcome, language_code: Option<&str>) -> String {
    let key = match outcome {
        VoteOutcome::Created => "vote-saved",
        VoteOutcome::Updated => "vote-changed",
        VoteOutcome::Unchanged => "vote-unchanged",
        VoteOutcome::PollNotFound => "vote-poll-missing",
        VoteOutcome::InvalidVote => "vote-invalid",
    };
    t_lang(key, language_code)
}

/// User-facing text for an error in a private conversation
pub fn format_error(error: &PollError, language_code: Option<&str>) -> String {
    match error {
        PollError::InvalidPollId(_) => t_lang("poll-id-invalid", language_code),
        PollError::InvalidTitle("too_long") => t_lang("title-too-long", language_code),
        PollError::InvalidTitle(_) => t_lang("title-invalid", language_code),
        PollError::InvalidVote(_) => t_lang("vote-invalid", language_code),
        PollError::NotFound(id) => {
            t_args_lang("poll-not-found", &[("id", &id.to_string())], language_code)
        }
        PollError::Forbidden(_) => t_lang("results-forbidden", language_code),
        PollError::Store(_) => t_lang("store-error", language_code),
    }
}
