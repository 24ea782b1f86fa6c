//! # SonicLayer Common Library
//!
//! Shared code for SonicLayer services including:
//! - Error taxonomy
//! - Event types (SonicEvent enum) and broadcast EventBus
//! - Configuration file resolution and loading

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
