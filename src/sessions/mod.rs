//! Debug sessions
//!
//! A session pairs a `Debugger` with bookkeeping (id, timestamps, command log). The
//! `SessionManager` is the only way in; it owns a `SessionStore` and enforces the session
//! ceiling.

mod manager;
mod store;


pub use manager::{BreakpointAction, SessionManager, StartedSession};
pub use store::{InMemorySessionStore, Session, SessionHandle, SessionSlot, SessionStore};
