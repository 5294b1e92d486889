//! Configuration document store for cfgdeck
//!
//! [`ConfigStore`] holds a JSON document edited through dot paths and replays
//! history instructions into it. [`EditorSession`] pairs a store with a
//! [`HistoryManager`](cfgdeck_history::HistoryManager) so every edit is
//! recorded and can be undone.

pub mod document;
pub mod error;
pub mod session;

pub use document::ConfigStore;
pub use error::{StoreError, StoreResult};
pub use session::EditorSession;
