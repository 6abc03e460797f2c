//! Parlor Backend Layer
//!
//! The `ChatBackend` capability consumed by the conversation store, plus
//! the HTTP adapter that implements it against the remote chat API. The
//! store never talks to the network directly; it is handed a backend at
//! construction.

pub mod config;
pub mod http;
pub mod traits;

pub use config::HttpBackendConfig;
pub use http::HttpChatBackend;
pub use traits::{ChatBackend, ReplyStream};
