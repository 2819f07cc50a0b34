//! Browse core for a retro-skinned desktop media player.
//!
//! Everything runs on a single broadcast bus: managers own their state, run
//! blocking loops on dedicated threads, and communicate only through
//! [`protocol::Message`]. The browse manager flattens per-source hierarchy
//! state into display lists; the radio manager owns the station store; a
//! config listener persists view preferences.

pub mod browser;
pub mod catalog;
pub mod config;
pub mod config_persistence;
pub mod db_manager;
pub mod protocol;
pub mod radio;
pub mod session;
pub mod sources;

pub use browser::BrowserManager;
pub use catalog::{BrowseMode, CatalogEntry, SortOrder, SourceKind};
pub use config::{sanitize_config, Config};
pub use protocol::Message;
pub use radio::RadioManager;
pub use session::{AppSession, SessionBuilder};
pub use sources::{MediaSourceAdapter, SourceSet};
