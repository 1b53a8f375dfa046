//! Domain types - conversation sessions and their invariants.

mod session;

pub use session::{Session, SessionId, SessionSummary, Turn, MAX_RETAINED_TURNS};
