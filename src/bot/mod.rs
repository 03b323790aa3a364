//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules for better organization:
//! - `message_handler`: Handles commands and freeform text messages
//! - `callback_handler`: Handles voting button callback queries
//! - `ui_builder`: Creates keyboards and formats messages
//! - `dialogue_manager`: Manages dialogue state transitions and validation

pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;

use crate::dialogue::PollDialogueState;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

// Re-export utility functions that might be used elsewhere
pub use message_handler::{announce_poll, Command};
pub use ui_builder::{create_vote_keyboard, format_tally, Reply};

/// Update routing: messages go through the poll dialogue, button taps to the ledger
pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<PollDialogueState>, PollDialogueState>()
                .endpoint(message_handler),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
}
