//! # Poll Telegram Bot
//!
//! A Telegram bot that lets a private-chat owner create a yes/no poll,
//! announce it in a group through a deep link, collect votes from inline
//! buttons and read back a time-ordered tally of who answered what.

pub mod bot;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod ledger;
pub mod localization;
pub mod poll_errors;
pub mod registry;
