//! Core domain + application logic for the event ticket bot.
//!
//! This crate is framework-agnostic. Telegram and SQLite live behind ports
//! (traits) implemented in adapter crates.

pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod flow;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod registration;
pub mod storage;
pub mod utils;
pub mod validation;

pub use errors::{Error, Result};
