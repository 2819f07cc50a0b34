use crate::catalog::RadioStation;
use rusqlite::{params, Connection};

/// SQLite-backed store for the internet-radio station list.
pub struct DbManager {
    conn: Connection,
}

impl DbManager {
    pub fn new() -> Result<Self, rusqlite::Error> {
        let data_dir = dirs::data_dir()
            .expect("Could not find data directory")
            .join("tunedeck");

        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).expect("Could not create data directory");
        }

        let db_path = data_dir.join("stations.db");
        let conn = Connection::open(db_path)?;

        let db_manager = Self { conn };
        db_manager.initialize_schema()?;
        db_manager.migrate()?;
        Ok(db_manager)
    }

    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let db_manager = Self { conn };
        db_manager.initialize_schema()?;
        db_manager.migrate()?;
        Ok(db_manager)
    }

    fn initialize_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS stations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                stream_url TEXT NOT NULL,
                genre TEXT NOT NULL DEFAULT '',
                position INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        // Early databases stored stations without a genre column.
        let mut stmt = self.conn.prepare("PRAGMA table_info(stations)")?;
        let columns = stmt.query_map([], |row| row.get::<_, String>(1))?;
        let mut has_genre = false;
        for col in columns {
            if col? == "genre" {
                has_genre = true;
                break;
            }
        }

        if !has_genre {
            self.conn.execute(
                "ALTER TABLE stations ADD COLUMN genre TEXT NOT NULL DEFAULT ''",
                [],
            )?;
        }

        Ok(())
    }

    fn next_position(&self) -> Result<i64, rusqlite::Error> {
        self.conn
            .query_row("SELECT COALESCE(MAX(position), -1) + 1 FROM stations", [], |r| {
                r.get(0)
            })
    }

    /// Inserts a station at the end of the list.
    pub fn insert_station(&self, station: &RadioStation) -> Result<(), rusqlite::Error> {
        let position = self.next_position()?;
        self.conn.execute(
            "INSERT INTO stations (id, name, stream_url, genre, position) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![station.id, station.name, station.stream_url, station.genre, position],
        )?;
        Ok(())
    }

    /// Updates name, stream URL, and genre of an existing station. Returns
    /// `false` when no station with that id exists.
    pub fn update_station(&self, station: &RadioStation) -> Result<bool, rusqlite::Error> {
        let updated = self.conn.execute(
            "UPDATE stations SET name = ?1, stream_url = ?2, genre = ?3 WHERE id = ?4",
            params![station.name, station.stream_url, station.genre, station.id],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_station(&self, id: &str) -> Result<bool, rusqlite::Error> {
        let deleted = self
            .conn
            .execute("DELETE FROM stations WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    pub fn get_all_stations(&self) -> Result<Vec<RadioStation>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, stream_url, genre FROM stations ORDER BY position ASC",
        )?;
        let station_iter = stmt.query_map([], |row| {
            Ok(RadioStation {
                id: row.get(0)?,
                name: row.get(1)?,
                stream_url: row.get(2)?,
                genre: row.get(3)?,
            })
        })?;

        let mut stations = Vec::new();
        for station in station_iter {
            stations.push(station?);
        }
        Ok(stations)
    }

    /// Whether a station with this exact stream URL is already stored.
    /// Used to skip duplicates during playlist import.
    pub fn has_station_with_url(&self, stream_url: &str) -> Result<bool, rusqlite::Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM stations WHERE stream_url = ?1",
            params![stream_url],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::DbManager;
    use crate::catalog::RadioStation;

    fn station(id: &str, name: &str, url: &str) -> RadioStation {
        RadioStation {
            id: id.to_string(),
            name: name.to_string(),
            stream_url: url.to_string(),
            genre: "Jazz".to_string(),
        }
    }

    #[test]
    fn test_insert_and_list_preserves_insertion_order() {
        let db = DbManager::new_in_memory().unwrap();
        db.insert_station(&station("s1", "First", "http://a")).unwrap();
        db.insert_station(&station("s2", "Second", "http://b")).unwrap();
        db.insert_station(&station("s3", "Third", "http://c")).unwrap();

        let names: Vec<String> = db
            .get_all_stations()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_update_station_changes_fields_in_place() {
        let db = DbManager::new_in_memory().unwrap();
        db.insert_station(&station("s1", "Old Name", "http://a")).unwrap();

        let mut updated = station("s1", "New Name", "http://new");
        updated.genre = "Ambient".to_string();
        assert!(db.update_station(&updated).unwrap());

        let stations = db.get_all_stations().unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].name, "New Name");
        assert_eq!(stations[0].stream_url, "http://new");
        assert_eq!(stations[0].genre, "Ambient");
    }

    #[test]
    fn test_update_missing_station_returns_false() {
        let db = DbManager::new_in_memory().unwrap();
        assert!(!db.update_station(&station("nope", "X", "http://x")).unwrap());
    }

    #[test]
    fn test_delete_station_removes_only_target() {
        let db = DbManager::new_in_memory().unwrap();
        db.insert_station(&station("s1", "Keep", "http://a")).unwrap();
        db.insert_station(&station("s2", "Drop", "http://b")).unwrap();

        assert!(db.delete_station("s2").unwrap());
        assert!(!db.delete_station("s2").unwrap());
        let stations = db.get_all_stations().unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].id, "s1");
    }

    #[test]
    fn test_has_station_with_url_detects_duplicates() {
        let db = DbManager::new_in_memory().unwrap();
        db.insert_station(&station("s1", "One", "http://stream/one")).unwrap();

        assert!(db.has_station_with_url("http://stream/one").unwrap());
        assert!(!db.has_station_with_url("http://stream/two").unwrap());
    }
}
