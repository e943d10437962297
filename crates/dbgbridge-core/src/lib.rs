//! `dbgbridge` Core Library
//!
//! Shared functionality for `dbgbridge` components:
//! - Settings resolution (defaults, files, environment)
//! - Recipe property expansion for debugger command lines
//! - Tracing subscriber setup
//! - Common error types

pub mod config;
pub mod error;
pub mod recipe;
pub mod tracing_init;

pub use config::Settings;
pub use error::{Error, Result};
pub use recipe::{CommandLine, Properties, RecipeError};
