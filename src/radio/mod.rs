//! Internet-radio station management.

pub mod playlist_import;
pub mod radio_manager;

pub use radio_manager::RadioManager;
