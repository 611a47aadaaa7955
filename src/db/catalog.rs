//! Catalog persistence.

use anyhow::Result;

use super::{client_from_row, constraint_error, file_from_row, Database, CLIENT_COLUMNS, FILE_COLUMNS};
use crate::catalog::{Catalog, Client};

impl Database {
    /// Writes every client and file in one transaction. Any duplicate key
    /// aborts and leaves the store untouched.
    pub fn store_catalog(&self, catalog: &Catalog) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut insert_client = tx.prepare(
                "INSERT INTO client (id, orig_id, gender, sgroup, institute) VALUES (?, ?, ?, ?, ?)",
            )?;
            for client in catalog.clients() {
                insert_client
                    .execute(rusqlite::params![
                        client.id,
                        client.orig_id,
                        client.gender.as_str(),
                        client.group.as_str(),
                        client.institute.as_str(),
                    ])
                    .map_err(|e| constraint_error(e, "client", client.key().to_string()))?;
            }

            let mut insert_file = tx.prepare(
                r#"
                INSERT INTO file (
                    id, path, client_id, session, device, modality, camera, recording, nrecording,
                    speech_type, environment, channel
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;
            for file in catalog.files() {
                let speech = file.speech.as_ref();
                insert_file
                    .execute(rusqlite::params![
                        file.id,
                        file.path,
                        file.client.id,
                        file.session,
                        file.device.as_str(),
                        file.modality.as_str(),
                        file.camera.as_str(),
                        file.recording.as_str(),
                        file.nrecording,
                        speech.map(|s| s.speech_type.as_str()),
                        speech.map(|s| s.environment.as_str()),
                        speech.map(|s| s.channel.as_str()),
                    ])
                    .map_err(|e| constraint_error(e, "file path", file.path.clone()))?;
            }
        }
        tx.commit()?;

        tracing::info!(
            clients = catalog.clients().len(),
            files = catalog.files().len(),
            "Catalog stored"
        );
        Ok(())
    }

    pub fn clients(&self) -> Result<Vec<Client>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM client c ORDER BY c.id", CLIENT_COLUMNS))?;
        let clients = stmt
            .query_map([], |row| client_from_row(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(clients)
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        let clients = self.clients()?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM file f JOIN client c ON c.id = f.client_id ORDER BY f.id",
            FILE_COLUMNS
        ))?;
        let files = stmt
            .query_map([], file_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Catalog::from_parts(clients, files)?)
    }

    pub fn count_files(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM file", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SwanError;
    use crate::protocol::materialize::tests::idiap_voice_catalog;

    #[test]
    fn test_store_and_load_catalog() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        let catalog = idiap_voice_catalog(1..4);
        db.store_catalog(&catalog).unwrap();

        let loaded = db.load_catalog().unwrap();
        assert_eq!(loaded.clients(), catalog.clients());
        assert_eq!(loaded.files(), catalog.files());
        assert_eq!(db.count_files().unwrap(), catalog.files().len() as i64);
    }

    #[test]
    fn test_duplicate_rows_abort() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        let catalog = idiap_voice_catalog(1..3);
        db.store_catalog(&catalog).unwrap();
        let err = db.store_catalog(&catalog).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SwanError>(),
            Some(SwanError::DuplicateKey { entity: "client", .. })
        ));
        // The failed transaction left the first build intact.
        assert_eq!(db.count_files().unwrap(), catalog.files().len() as i64);
    }
}
