//! aether-chat - Route chat prompts to Gemini or Azure OpenAI
//!
//! This library provides the provider router, per-provider backends,
//! configuration, and the chat front end built on top of them.

pub mod chat;
pub mod config;
pub mod error;
pub mod providers;
pub mod router;

pub use config::Config;
pub use error::{Error, Result};
