mod schema;
pub mod catalog;
pub mod protocols;

use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, Row};
use std::path::Path;
use std::str::FromStr;

pub use protocols::PurposeFilter;
pub use schema::SCHEMA;

use crate::catalog::{Client, FileRecord, SpeechInfo};
use crate::error::SwanError;

/// SQLite-backed catalog and protocol store.
pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }
}

/// Turns a unique-constraint failure into [`SwanError::DuplicateKey`].
fn constraint_error(e: rusqlite::Error, entity: &'static str, key: impl Into<String>) -> anyhow::Error {
    match e {
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            SwanError::DuplicateKey {
                entity,
                key: key.into(),
            }
            .into()
        }
        other => other.into(),
    }
}

fn parse_column<T: FromStr<Err = SwanError>>(row: &Row, index: usize) -> rusqlite::Result<T> {
    let value: String = row.get(index)?;
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn parse_optional<T: FromStr<Err = SwanError>>(
    row: &Row,
    index: usize,
) -> rusqlite::Result<Option<T>> {
    let value: Option<String> = row.get(index)?;
    value
        .map(|v| {
            v.parse().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
            })
        })
        .transpose()
}

pub(crate) const CLIENT_COLUMNS: &str = "c.id, c.orig_id, c.gender, c.sgroup, c.institute";

fn client_from_row(row: &Row, offset: usize) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(offset)?,
        orig_id: row.get(offset + 1)?,
        gender: parse_column(row, offset + 2)?,
        group: parse_column(row, offset + 3)?,
        institute: parse_column(row, offset + 4)?,
    })
}

pub(crate) const FILE_COLUMNS: &str = r#"
    f.id, f.path, f.session, f.device, f.modality, f.camera, f.recording, f.nrecording,
    f.speech_type, f.environment, f.channel,
    c.id, c.orig_id, c.gender, c.sgroup, c.institute
"#;

fn file_from_row(row: &Row) -> rusqlite::Result<FileRecord> {
    let speech = match parse_optional(row, 8)? {
        Some(speech_type) => Some(SpeechInfo {
            speech_type,
            environment: parse_column(row, 9)?,
            channel: row.get(10)?,
        }),
        None => None,
    };
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        session: row.get(2)?,
        device: parse_column(row, 3)?,
        modality: parse_column(row, 4)?,
        camera: parse_column(row, 5)?,
        recording: parse_column(row, 6)?,
        nrecording: row.get(7)?,
        speech,
        client: client_from_row(row, 11)?,
    })
}
