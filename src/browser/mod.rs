//! Browse presenter: hierarchy flattening, expand/collapse state, fetch
//! coordination, and alphabet-index navigation.

pub mod alphabet_index;
pub mod browse_state;
pub mod browser_manager;
pub mod fetch_coordinator;
pub mod search_results;

pub use browse_state::{BrowseState, FetchState};
pub use browser_manager::BrowserManager;
pub use fetch_coordinator::FetchCoordinator;
