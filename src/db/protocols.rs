//! Protocol persistence and purpose lookups.

use anyhow::Result;
use rusqlite::types::Value;

use super::{constraint_error, file_from_row, parse_column, parse_optional, Database, FILE_COLUMNS};
use crate::catalog::FileRecord;
use crate::metadata::{Device, Gender, Group, Purpose, CANONICAL_PURPOSES};
use crate::protocol::{Materialization, ProbePolicy};

/// Row filters applied to one protocol purpose. Empty means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurposeFilter {
    pub genders: Vec<Gender>,
    pub devices: Vec<Device>,
    pub client_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProtocol {
    pub id: i64,
    pub name: String,
    pub gender: Option<Gender>,
    pub probe_policy: ProbePolicy,
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl Database {
    pub fn store_protocols(&self, materialization: &Materialization) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for protocol in &materialization.protocols {
            tx.execute(
                "INSERT INTO protocol (name, gender, probe_policy) VALUES (?, ?, ?)",
                rusqlite::params![
                    protocol.name,
                    protocol.gender.map(|g| g.as_str()),
                    protocol.probe_policy.as_str(),
                ],
            )
            .map_err(|e| constraint_error(e, "protocol", protocol.name.clone()))?;
            let protocol_id = tx.last_insert_rowid();
            tracing::info!(protocol = %protocol.name, "Adding protocol");

            for (group, purpose) in CANONICAL_PURPOSES {
                tx.execute(
                    "INSERT INTO protocol_purpose (protocol_id, sgroup, purpose) VALUES (?, ?, ?)",
                    rusqlite::params![protocol_id, group.as_str(), purpose.as_str()],
                )?;
                let purpose_id = tx.last_insert_rowid();

                let mut insert = tx.prepare_cached(
                    "INSERT INTO protocol_purpose_file (protocol_purpose_id, file_id) VALUES (?, ?)",
                )?;
                for file in protocol.files(group, purpose) {
                    insert
                        .execute(rusqlite::params![purpose_id, file.id])
                        .map_err(|e| constraint_error(e, "protocol file", file.path.clone()))?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn protocols(&self) -> Result<Vec<StoredProtocol>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, gender, probe_policy FROM protocol ORDER BY id")?;
        let protocols = stmt
            .query_map([], |row| {
                Ok(StoredProtocol {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    gender: parse_optional(row, 2)?,
                    probe_policy: parse_column(row, 3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(protocols)
    }

    /// Files of one protocol purpose, in storage order. Callers sort.
    pub fn purpose_files(
        &self,
        protocol: &str,
        group: Group,
        purpose: Purpose,
        filter: &PurposeFilter,
    ) -> Result<Vec<FileRecord>> {
        let mut sql = format!(
            r#"
            SELECT {}
            FROM protocol_purpose_file ppf
            JOIN protocol_purpose pp ON pp.id = ppf.protocol_purpose_id
            JOIN protocol p ON p.id = pp.protocol_id
            JOIN file f ON f.id = ppf.file_id
            JOIN client c ON c.id = f.client_id
            WHERE p.name = ? AND pp.sgroup = ? AND pp.purpose = ?
            "#,
            FILE_COLUMNS
        );
        let mut params: Vec<Value> = vec![
            Value::Text(protocol.to_string()),
            Value::Text(group.as_str().to_string()),
            Value::Text(purpose.as_str().to_string()),
        ];

        if !filter.genders.is_empty() {
            sql.push_str(&format!(" AND c.gender IN ({})", placeholders(filter.genders.len())));
            params.extend(filter.genders.iter().map(|g| Value::Text(g.as_str().to_string())));
        }
        if !filter.devices.is_empty() {
            sql.push_str(&format!(" AND f.device IN ({})", placeholders(filter.devices.len())));
            params.extend(filter.devices.iter().map(|d| Value::Text(d.as_str().to_string())));
        }
        if !filter.client_ids.is_empty() {
            sql.push_str(&format!(" AND c.id IN ({})", placeholders(filter.client_ids.len())));
            params.extend(filter.client_ids.iter().map(|id| Value::Integer(*id)));
        }
        sql.push_str(" ORDER BY f.id");

        let mut stmt = self.conn.prepare(&sql)?;
        let files = stmt
            .query_map(rusqlite::params_from_iter(params), file_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }
}
