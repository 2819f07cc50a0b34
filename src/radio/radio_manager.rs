//! Station CRUD manager.
//!
//! Owns the station database and serves every station mutation and listing
//! request arriving on the bus. Mutations answer with `StationsUpdated` so
//! interested views re-request the list.

use std::path::PathBuf;

use log::{info, warn};
use tokio::sync::broadcast::{Receiver, Sender};
use uuid::Uuid;

use crate::catalog::RadioStation;
use crate::db_manager::DbManager;
use crate::protocol::{Message, RadioMessage};
use crate::radio::playlist_import::parse_playlist_file;

pub struct RadioManager {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    db: DbManager,
}

impl RadioManager {
    pub fn new(bus_consumer: Receiver<Message>, bus_producer: Sender<Message>, db: DbManager) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            db,
        }
    }

    fn emit(&self, message: RadioMessage) {
        let _ = self.bus_producer.send(Message::Radio(message));
    }

    fn emit_error(&self, context: &str, error: String) {
        warn!("RadioManager: {} failed: {}", context, error);
        self.emit(RadioMessage::RadioError(format!("{}: {}", context, error)));
    }

    fn handle_request_stations(&self) {
        match self.db.get_all_stations() {
            Ok(stations) => self.emit(RadioMessage::StationsResult(stations)),
            Err(err) => self.emit_error("station list", err.to_string()),
        }
    }

    fn handle_add_station(&self, name: String, stream_url: String, genre: String) {
        let name = name.trim().to_string();
        let stream_url = stream_url.trim().to_string();
        if stream_url.is_empty() {
            self.emit_error("add station", "stream URL is empty".to_string());
            return;
        }
        let station = RadioStation {
            id: Uuid::new_v4().to_string(),
            name: if name.is_empty() { stream_url.clone() } else { name },
            stream_url,
            genre: genre.trim().to_string(),
        };
        match self.db.insert_station(&station) {
            Ok(()) => self.emit(RadioMessage::StationsUpdated),
            Err(err) => self.emit_error("add station", err.to_string()),
        }
    }

    fn handle_update_station(&self, station: RadioStation) {
        if station.stream_url.trim().is_empty() {
            self.emit_error("update station", "stream URL is empty".to_string());
            return;
        }
        match self.db.update_station(&station) {
            Ok(true) => self.emit(RadioMessage::StationsUpdated),
            Ok(false) => {
                self.emit_error("update station", format!("no station with id {}", station.id))
            }
            Err(err) => self.emit_error("update station", err.to_string()),
        }
    }

    fn handle_remove_station(&self, id: String) {
        match self.db.delete_station(&id) {
            Ok(true) => self.emit(RadioMessage::StationsUpdated),
            Ok(false) => self.emit_error("remove station", format!("no station with id {}", id)),
            Err(err) => self.emit_error("remove station", err.to_string()),
        }
    }

    /// Imports stations from an M3U/PLS file, skipping entries whose stream
    /// URL is already stored.
    fn handle_import_stations(&self, path: PathBuf) {
        let parsed = match parse_playlist_file(&path) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.emit_error("import", err);
                return;
            }
        };

        let mut added = 0usize;
        for imported in parsed {
            match self.db.has_station_with_url(&imported.stream_url) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    self.emit_error("import", err.to_string());
                    return;
                }
            }
            let station = RadioStation {
                id: Uuid::new_v4().to_string(),
                name: imported.name,
                stream_url: imported.stream_url,
                genre: String::new(),
            };
            if let Err(err) = self.db.insert_station(&station) {
                self.emit_error("import", err.to_string());
                return;
            }
            added += 1;
        }

        info!(
            "RadioManager: imported {} station(s) from {}",
            added,
            path.display()
        );
        self.emit(RadioMessage::ImportCompleted { added });
        if added > 0 {
            self.emit(RadioMessage::StationsUpdated);
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(Message::Radio(RadioMessage::RequestStations)) => self.handle_request_stations(),
                Ok(Message::Radio(RadioMessage::AddStation {
                    name,
                    stream_url,
                    genre,
                })) => self.handle_add_station(name, stream_url, genre),
                Ok(Message::Radio(RadioMessage::UpdateStation(station))) => {
                    self.handle_update_station(station)
                }
                Ok(Message::Radio(RadioMessage::RemoveStation { id })) => {
                    self.handle_remove_station(id)
                }
                Ok(Message::Radio(RadioMessage::ImportStations { path })) => {
                    self.handle_import_stations(path)
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "RadioManager lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
