//! Shared error plumbing used across all wingman crates.

pub mod error;

pub use error::{Error, FromMessage, Result, WingmanError};
