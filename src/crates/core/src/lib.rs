//! Parlor Core
//!
//! The conversation engine: a store that owns an ordered transcript,
//! streams assistant replies into it, and substitutes a locally simulated
//! reply when the backend is unreachable. Consumers read snapshots or
//! subscribe to change notifications; nothing here renders anything.

pub mod mock;
pub mod observe;
pub mod store;

pub use mock::MockResponder;
pub use observe::StateCell;
pub use store::{ConversationStore, SessionState};
