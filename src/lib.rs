// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod history;
pub mod models;
pub mod observability;
pub mod payload;
pub mod provider;
pub mod render;
pub mod session_store;
pub mod signal;
pub mod sse;
pub mod stream;
pub mod strip;
pub mod think;
pub mod types;

// Re-exports
pub use client::{ByteStream, ChatTransport, HttpTransport};
pub use error::{Error, Result};
pub use history::Conversation;
pub use observability::register_biometrics;
pub use provider::{DecodingPlacement, Framing, Provider, ProviderFamily};
pub use render::{PlainTextRenderer, Renderer};
pub use session_store::SessionStore;
pub use stream::{Reply, StreamNormalizer, StreamOptions};
pub use strip::strip_think_tags;
pub use types::*;
