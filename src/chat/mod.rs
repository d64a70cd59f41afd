//! Chat front end.
//!
//! A small JSON API over the provider router: a transcript, the enterprise
//! mode toggle, and provider/model pickers, kept per client session.

mod handlers;
mod server;
pub mod session;

pub use handlers::{ChatReply, ChatRequest, SESSION_HEADER};
pub use server::{create_router, run_server, AppState};
pub use session::{
    resolve_model, ChatMessage, ChatSession, ChatSettings, Role, SessionStore, SharedSession,
    GREETING,
};
