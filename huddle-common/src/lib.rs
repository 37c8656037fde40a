//! # Huddle Common Library
//!
//! Shared code for the Huddle chat services:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Event types (HuddleEvent enum) and the EventBus
//! - Database initialization

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
