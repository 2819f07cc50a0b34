//! Session assembly: bus, sources, managers, and config persistence.
//!
//! A session owns the broadcast bus and the registered source adapters.
//! `spawn_runtime` starts the browse and radio managers on dedicated threads
//! plus a listener that folds view-preference changes back into the config
//! file.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use log::{info, warn};
use tokio::sync::broadcast;

use crate::browser::BrowserManager;
use crate::config::{Config, LibraryConfig};
use crate::config_persistence::{default_config_path, load_config_file, persist_config_file};
use crate::db_manager::DbManager;
use crate::protocol::{ConfigMessage, Message, UiStateSnapshot};
use crate::radio::RadioManager;
use crate::sources::local_library::LocalLibrarySource;
use crate::sources::{MediaSourceAdapter, SourceSet};

const BUS_CAPACITY: usize = 1024;

/// Builder for an [`AppSession`]. Registers source adapters and resolves the
/// config file before the bus starts.
pub struct SessionBuilder {
    config_path: PathBuf,
    sources: SourceSet,
    register_local_library: bool,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            config_path: default_config_path(),
            sources: SourceSet::new(),
            register_local_library: true,
        }
    }

    pub fn config_path(mut self, path: PathBuf) -> Self {
        self.config_path = path;
        self
    }

    /// Registers an adapter for a source, replacing any previous one.
    pub fn source(
        mut self,
        kind: crate::catalog::SourceKind,
        adapter: Arc<dyn MediaSourceAdapter>,
    ) -> Self {
        if kind == crate::catalog::SourceKind::Local {
            self.register_local_library = false;
        }
        self.sources.register(kind, adapter);
        self
    }

    /// Skips the built-in local library adapter.
    pub fn without_local_library(mut self) -> Self {
        self.register_local_library = false;
        self
    }

    pub fn build(mut self) -> AppSession {
        let config = load_config_file(&self.config_path);
        if self.register_local_library {
            let folders = library_folder_paths(&config.library);
            self.sources.register(
                crate::catalog::SourceKind::Local,
                Arc::new(LocalLibrarySource::new(folders)),
            );
        }
        let (bus_sender, _) = broadcast::channel(BUS_CAPACITY);
        AppSession {
            bus_sender,
            sources: Arc::new(self.sources),
            config,
            config_path: self.config_path,
        }
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn library_folder_paths(library: &LibraryConfig) -> Vec<PathBuf> {
    library.folders.iter().map(PathBuf::from).collect()
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

/// One running application session.
pub struct AppSession {
    bus_sender: broadcast::Sender<Message>,
    sources: Arc<SourceSet>,
    config: Config,
    config_path: PathBuf,
}

impl AppSession {
    pub fn bus_sender(&self) -> broadcast::Sender<Message> {
        self.bus_sender.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sources(&self) -> Arc<SourceSet> {
        self.sources.clone()
    }

    /// Starts the manager threads. Returns once all are spawned; the threads
    /// exit when every bus sender is dropped.
    pub fn spawn_runtime(&self) {
        info!(
            "Starting session runtime with sources {:?}",
            self.sources.registered_kinds()
        );

        let browser_bus_receiver = self.bus_sender.subscribe();
        let browser_bus_sender = self.bus_sender.clone();
        let browser_sources = self.sources.clone();
        let browser_config = self.config.clone();
        thread::spawn(move || {
            let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let mut browser_manager = BrowserManager::new(
                    browser_bus_receiver,
                    browser_bus_sender,
                    browser_sources,
                    &browser_config,
                );
                browser_manager.run();
            }));
            if let Err(payload) = run_result {
                log::error!(
                    "BrowserManager thread terminated due to panic: {}",
                    panic_payload_to_string(payload.as_ref())
                );
            }
        });

        let radio_bus_receiver = self.bus_sender.subscribe();
        let radio_bus_sender = self.bus_sender.clone();
        thread::spawn(move || {
            let db_manager = match DbManager::new() {
                Ok(db_manager) => db_manager,
                Err(err) => {
                    log::error!("Failed to initialize station database: {}", err);
                    return;
                }
            };
            let mut radio_manager =
                RadioManager::new(radio_bus_receiver, radio_bus_sender, db_manager);
            radio_manager.run();
        });

        self.spawn_config_listener();
    }

    /// Persists view-preference changes arriving on the bus into the config
    /// file, preserving hand-written comments.
    fn spawn_config_listener(&self) {
        let mut bus_receiver = self.bus_sender.subscribe();
        let config_path = self.config_path.clone();
        let mut current = self.config.clone();
        thread::spawn(move || loop {
            match bus_receiver.blocking_recv() {
                Ok(Message::Config(ConfigMessage::UiStateChanged(snapshot))) => {
                    apply_ui_snapshot(&mut current, &snapshot);
                    persist_config_file(&current, &config_path);
                }
                Ok(Message::Config(ConfigMessage::ConfigChanged(config))) => {
                    current = config;
                    persist_config_file(&current, &config_path);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "Config listener lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        });
    }
}

fn apply_ui_snapshot(config: &mut Config, snapshot: &UiStateSnapshot) {
    config.ui.source = snapshot.source;
    config.ui.browse_mode = snapshot.browse_mode;
    config.ui.sort_order = snapshot.sort_order;
    config.ui.columns = snapshot.columns.clone();
}

#[cfg(test)]
mod tests {
    use super::SessionBuilder;
    use crate::catalog::{BrowseMode, SortOrder, SourceKind};
    use crate::config_persistence::load_config_file;
    use crate::protocol::{BrowseMessage, Message, SourceMessage};
    use std::fs;
    use std::time::{Duration, Instant};
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_builder_loads_config_and_registers_local_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ui]\nbrowse_mode = \"tracks\"\n").unwrap();

        let session = SessionBuilder::new().config_path(path).build();
        assert_eq!(session.config().ui.browse_mode, BrowseMode::Tracks);
        assert!(session
            .sources()
            .registered_kinds()
            .contains(&SourceKind::Local));
    }

    #[test]
    fn test_without_local_library_leaves_sources_empty() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionBuilder::new()
            .config_path(dir.path().join("config.toml"))
            .without_local_library()
            .build();
        assert!(session.sources().registered_kinds().is_empty());
    }

    #[test]
    fn test_ui_state_changes_are_folded_into_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let session = SessionBuilder::new()
            .config_path(path.clone())
            .without_local_library()
            .build();
        let sender = session.bus_sender();
        let mut observer = sender.subscribe();
        session.spawn_runtime();

        // Flip sort order through the browse manager and wait for the
        // resulting display list, then for the file write.
        sender
            .send(Message::Browse(BrowseMessage::SetSortOrder(
                SortOrder::YearDesc,
            )))
            .unwrap();

        let start = Instant::now();
        loop {
            if start.elapsed() > Duration::from_secs(2) {
                panic!("timed out waiting for persisted sort order");
            }
            if path.exists() && load_config_file(&path).ui.sort_order == SortOrder::YearDesc {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        // The session stays responsive after persistence.
        sender
            .send(Message::Source(SourceMessage::SelectSource(
                SourceKind::Radio,
            )))
            .unwrap();
        let start = Instant::now();
        loop {
            if start.elapsed() > Duration::from_secs(2) {
                panic!("timed out waiting for source change");
            }
            match observer.try_recv() {
                Ok(Message::Source(SourceMessage::SourceChanged(SourceKind::Radio))) => break,
                Ok(_) => continue,
                Err(TryRecvError::Empty) => std::thread::sleep(Duration::from_millis(5)),
                Err(err) => panic!("bus error: {:?}", err),
            }
        }
    }
}
