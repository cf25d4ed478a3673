//! File-backed repository implementations for Flowdeck.
//!
//! Both stores are best-effort: absence or corruption of the backing
//! files degrades to defaults, never to a crash.

mod conversation_store;
mod state_store;

pub use conversation_store::JsonConversationRepository;
pub use state_store::JsonStateRepository;
