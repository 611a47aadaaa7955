//! Read-only file queries over a built catalog.
//!
//! Filters arrive as strings from the command line or from callers and are
//! checked against their closed enumerations before any lookup runs. An empty
//! filter means "all". World files only ever serve the train purpose; dev and
//! eval files serve enroll and probe. How requested model ids restrict probes
//! is the protocol's [`ProbePolicy`](crate::protocol::ProbePolicy).

use anyhow::Result;
use std::str::FromStr;

use crate::catalog::FileRecord;
use crate::db::{Database, PurposeFilter};
use crate::error::SwanError;
use crate::metadata::{Device, Gender, Group, Purpose};
use crate::protocol::sort_dedup;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectQuery {
    pub protocol: Option<String>,
    pub purposes: Vec<String>,
    pub groups: Vec<String>,
    pub genders: Vec<String>,
    pub devices: Vec<String>,
    pub model_ids: Vec<i64>,
}

impl ObjectQuery {
    pub fn protocol(mut self, name: impl Into<String>) -> Self {
        self.protocol = Some(name.into());
        self
    }

    pub fn purposes(mut self, purposes: &[&str]) -> Self {
        self.purposes = purposes.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn genders(mut self, genders: &[&str]) -> Self {
        self.genders = genders.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn devices(mut self, devices: &[&str]) -> Self {
        self.devices = devices.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn model_ids(mut self, ids: &[i64]) -> Self {
        self.model_ids = ids.to_vec();
        self
    }
}

fn check_all<T: FromStr + Copy + PartialEq>(
    filter: &'static str,
    values: &[String],
    all: &[T],
) -> Result<Vec<T>, SwanError> {
    if values.is_empty() {
        return Ok(all.to_vec());
    }
    let mut checked = Vec::new();
    for value in values {
        let parsed = value
            .parse::<T>()
            .map_err(|_| SwanError::invalid_filter(filter, value.as_str()))?;
        if !checked.contains(&parsed) {
            checked.push(parsed);
        }
    }
    Ok(checked)
}

impl Database {
    /// Files matching `query`, ordered by client, session, device and file id.
    pub fn objects(&self, query: &ObjectQuery) -> Result<Vec<FileRecord>> {
        let purposes = check_all("purpose", &query.purposes, Purpose::ALL)?;
        let groups = check_all("group", &query.groups, Group::ALL)?;
        let genders = check_all::<Gender>("gender", &query.genders, &[])?;
        let devices = check_all::<Device>("device", &query.devices, &[])?;

        for id in &query.model_ids {
            let known: bool = self.conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM client WHERE id = ?)",
                [id],
                |row| row.get(0),
            )?;
            if !known {
                return Err(SwanError::invalid_filter("model id", id.to_string()).into());
            }
        }

        let stored = self.protocols()?;
        let protocols: Vec<_> = match &query.protocol {
            Some(name) => {
                let protocol = stored
                    .iter()
                    .find(|p| &p.name == name)
                    .ok_or_else(|| SwanError::invalid_filter("protocol", name.as_str()))?;
                vec![protocol]
            }
            None => stored.iter().collect(),
        };

        let unrestricted = PurposeFilter {
            genders,
            devices,
            client_ids: Vec::new(),
        };
        let claimed = PurposeFilter {
            client_ids: query.model_ids.clone(),
            ..unrestricted.clone()
        };

        let mut files = Vec::new();
        for protocol in protocols {
            if groups.contains(&Group::World) && purposes.contains(&Purpose::Train) {
                files.extend(self.purpose_files(
                    &protocol.name,
                    Group::World,
                    Purpose::Train,
                    &claimed,
                )?);
            }
            for group in [Group::Dev, Group::Eval] {
                if !groups.contains(&group) {
                    continue;
                }
                if purposes.contains(&Purpose::Enroll) {
                    files.extend(self.purpose_files(
                        &protocol.name,
                        group,
                        Purpose::Enroll,
                        &claimed,
                    )?);
                }
                if purposes.contains(&Purpose::Probe) {
                    let filter = if protocol.probe_policy.restricts_probes(query.model_ids.len()) {
                        &claimed
                    } else {
                        &unrestricted
                    };
                    files.extend(self.purpose_files(&protocol.name, group, Purpose::Probe, filter)?);
                }
            }
        }

        sort_dedup(&mut files);
        tracing::debug!(?query, files = files.len(), "Objects query");
        Ok(files)
    }

    /// Client ids that own enrollment files of `protocol` in `groups`.
    pub fn model_ids(&self, protocol: &str, groups: &[Group]) -> Result<Vec<i64>> {
        let query = ObjectQuery {
            protocol: Some(protocol.to_string()),
            purposes: vec![Purpose::Enroll.to_string()],
            groups: groups.iter().map(|g| g.to_string()).collect(),
            ..ObjectQuery::default()
        };
        let mut ids: Vec<i64> = self.objects(&query)?.iter().map(|f| f.client.id).collect();
        ids.dedup();
        Ok(ids)
    }
}
