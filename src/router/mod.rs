//! Router module for provider dispatch.
//!
//! This module handles:
//! - Parsing the provider selector
//! - Selecting direct or managed-proxy credentials
//! - Calling the provider backend once and normalizing the outcome

mod dispatch;
mod selector;
mod types;

pub use dispatch::Router;
pub use selector::{select_endpoint, CredentialResolver, RoutingMode};
pub use types::{FailureKind, InvocationRequest, InvocationResult, EMPTY_PROMPT_ADVISORY};
