use std::collections::{BTreeMap, BTreeSet};

use super::definition::{ProbePolicy, ProtocolDefinition, ProtocolTable};
use crate::catalog::{Catalog, FileRecord};
use crate::error::SwanError;
use crate::metadata::{Device, Gender, Group, Purpose, CANONICAL_PURPOSES};

/// Sort key shared by the materializer and the query façade.
pub fn order_key(file: &FileRecord) -> (i64, u32, Device, i64) {
    (file.client.id, file.session, file.device, file.id)
}

/// Sorts by [`order_key`] then drops repeated files.
pub fn sort_dedup(files: &mut Vec<FileRecord>) {
    files.sort_by_key(order_key);
    files.dedup_by_key(|f| f.id);
}

#[derive(Debug, Clone)]
pub struct MaterializedProtocol {
    pub name: String,
    pub gender: Option<Gender>,
    pub probe_policy: ProbePolicy,
    pub sets: BTreeMap<(Group, Purpose), Vec<FileRecord>>,
}

impl MaterializedProtocol {
    pub fn files(&self, group: Group, purpose: Purpose) -> &[FileRecord] {
        self.sets
            .get(&(group, purpose))
            .map(|files| files.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default)]
pub struct Materialization {
    pub protocols: Vec<MaterializedProtocol>,
}

impl Materialization {
    pub fn get(&self, name: &str) -> Option<&MaterializedProtocol> {
        self.protocols.iter().find(|p| p.name == name)
    }
}

fn materialize_one(
    catalog: &Catalog,
    definition: &ProtocolDefinition,
) -> Result<MaterializedProtocol, SwanError> {
    let mut sets = BTreeMap::new();
    for (group, purpose) in CANONICAL_PURPOSES {
        let mut files = Vec::new();
        for rule in definition.rules(group, purpose) {
            files.extend(
                catalog
                    .files()
                    .iter()
                    .filter(|f| f.client.group == group)
                    .filter(|f| definition.admits_gender(f))
                    .filter(|f| rule.matches(f))
                    .cloned(),
            );
        }
        sort_dedup(&mut files);
        tracing::debug!(
            protocol = %definition.name,
            group = %group,
            purpose = %purpose,
            files = files.len(),
            "Materialized purpose"
        );
        sets.insert((group, purpose), files);
    }

    let protocol = MaterializedProtocol {
        name: definition.name.clone(),
        gender: definition.gender,
        probe_policy: definition.probe_policy,
        sets,
    };

    for group in [Group::Dev, Group::Eval] {
        let enrolled: BTreeSet<i64> = protocol
            .files(group, Purpose::Enroll)
            .iter()
            .map(|f| f.id)
            .collect();
        if let Some(file) = protocol
            .files(group, Purpose::Probe)
            .iter()
            .find(|f| enrolled.contains(&f.id))
        {
            return Err(SwanError::ClassOverlap {
                protocol: protocol.name.clone(),
                group: group.to_string(),
                path: file.path.clone(),
            });
        }
    }

    Ok(protocol)
}

/// Evaluates every protocol of `table` against `catalog`.
pub fn materialize(catalog: &Catalog, table: &ProtocolTable) -> Result<Materialization, SwanError> {
    let protocols = table
        .iter()
        .map(|definition| materialize_one(catalog, definition))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Materialization { protocols })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::Client;
    use crate::metadata::{Camera, Modality, RecordingKind, Site};
    use crate::protocol::definition::FilterRule;

    /// Builds a catalog of IDIAP voice videos: one file per
    /// (client, session, device, recording) with the sessions each device records.
    pub(crate) fn idiap_voice_catalog(identities: impl Iterator<Item = u32>) -> Catalog {
        let mut clients = Vec::new();
        let mut files = Vec::new();
        for identity in identities {
            let group = if identity < 25 {
                Group::World
            } else if identity < 41 {
                Group::Dev
            } else {
                Group::Eval
            };
            let client = Client {
                id: clients.len() as i64 + 1,
                orig_id: identity,
                gender: if identity % 2 == 0 { Gender::Female } else { Gender::Male },
                group,
                institute: Site::Idiap,
            };
            clients.push(client);
            for session in 1..=6u32 {
                let devices: &[Device] = if session == 1 {
                    &[Device::IPhone, Device::IPad]
                } else {
                    &[Device::IPhone]
                };
                for device in devices {
                    for nrecording in 1..=8u32 {
                        files.push(FileRecord {
                            id: files.len() as i64 + 1,
                            path: format!(
                                "IDIAP/session_{:02}/{}/{:05}/4_{:05}_{}_{:02}_{:02}_{}_2.mp4",
                                session,
                                device,
                                identity,
                                identity,
                                client.gender.code(),
                                session,
                                nrecording,
                                device.code()
                            ),
                            client,
                            session,
                            device: *device,
                            modality: Modality::Voice,
                            camera: Camera::Front,
                            recording: RecordingKind::Video,
                            nrecording,
                            speech: None,
                        });
                    }
                }
            }
        }
        Catalog::from_parts(clients, files).unwrap()
    }

    #[test]
    fn test_idiap0_audio_counts() {
        let catalog = idiap_voice_catalog(1..61);
        let materialized = materialize(&catalog, &ProtocolTable::builtin()).unwrap();
        let audio = materialized.get("idiap0-audio").unwrap();

        // 20 clients, 8 recordings, 2 devices in session 1 and 1 device in sessions 2-6
        let world = audio.files(Group::World, Purpose::Train);
        assert_eq!(world.len(), 20 * 8 * 7);
        let clients: BTreeSet<_> = world.iter().map(|f| f.client.id).collect();
        assert_eq!(clients.len(), 20);
        assert!(world.iter().all(|f| f.client.orig_id < 25));

        let enroll = audio.files(Group::Dev, Purpose::Enroll);
        assert_eq!(enroll.len(), 15 * 8);
        assert!(enroll.iter().all(|f| f.session == 1 && f.device == Device::IPhone));

        let probe = audio.files(Group::Dev, Purpose::Probe);
        assert_eq!(probe.len(), 15 * 8 * 5);
        assert!(probe.iter().all(|f| f.session > 1));

        assert_eq!(audio.files(Group::Eval, Purpose::Enroll).len(), 15 * 8);
        assert_eq!(audio.files(Group::Eval, Purpose::Probe).len(), 15 * 8 * 5);
    }

    #[test]
    fn test_sets_stay_inside_their_group() {
        let catalog = idiap_voice_catalog(1..61);
        let materialized = materialize(&catalog, &ProtocolTable::builtin()).unwrap();
        for protocol in &materialized.protocols {
            for (group, purpose) in CANONICAL_PURPOSES {
                assert!(protocol
                    .files(group, purpose)
                    .iter()
                    .all(|f| f.client.group == group));
            }
        }
    }

    #[test]
    fn test_gender_restriction() {
        let catalog = idiap_voice_catalog(1..61);
        let materialized = materialize(&catalog, &ProtocolTable::builtin()).unwrap();
        let male = materialized.get("mobile1-male").unwrap();
        let world = male.files(Group::World, Purpose::Train);
        assert!(!world.is_empty());
        assert!(world.iter().all(|f| f.client.gender == Gender::Male));
        assert!(world.iter().all(|f| f.device == Device::IPhone));
    }

    #[test]
    fn test_overlapping_rules_are_deduplicated() {
        let catalog = idiap_voice_catalog(25..27);
        let mut definition = ProtocolDefinition::new("overlap", None, ProbePolicy::AllProbes);
        let phone = FilterRule {
            devices: vec![Device::IPhone],
            sessions: vec![2, 3],
            ..FilterRule::default()
        };
        let front = FilterRule {
            cameras: vec![Camera::Front],
            sessions: vec![2, 3],
            ..FilterRule::default()
        };
        definition.add_rule(Group::Dev, Purpose::Probe, phone).unwrap();
        definition.add_rule(Group::Dev, Purpose::Probe, front).unwrap();

        let mut table = ProtocolTable::default();
        table.push(definition).unwrap();
        let materialized = materialize(&catalog, &table).unwrap();
        let probe = materialized.get("overlap").unwrap().files(Group::Dev, Purpose::Probe);

        assert_eq!(probe.len(), 2 * 2 * 8);
        let ids: BTreeSet<_> = probe.iter().map(|f| f.id).collect();
        assert_eq!(ids.len(), probe.len());
        let keys: Vec<_> = probe.iter().map(order_key).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_enroll_probe_overlap_is_rejected() {
        let catalog = idiap_voice_catalog(25..27);
        let mut definition = ProtocolDefinition::new("leaky", None, ProbePolicy::AllProbes);
        definition
            .add_rule(Group::Dev, Purpose::Enroll, FilterRule::default())
            .unwrap();
        definition
            .add_rule(
                Group::Dev,
                Purpose::Probe,
                FilterRule {
                    sessions: vec![1],
                    ..FilterRule::default()
                },
            )
            .unwrap();
        let mut table = ProtocolTable::default();
        table.push(definition).unwrap();

        assert!(matches!(
            materialize(&catalog, &table),
            Err(SwanError::ClassOverlap { .. })
        ));
    }

    #[test]
    fn test_enroll_and_probe_are_disjoint_for_builtins() {
        let catalog = idiap_voice_catalog(1..61);
        let materialized = materialize(&catalog, &ProtocolTable::builtin()).unwrap();
        for protocol in &materialized.protocols {
            for group in [Group::Dev, Group::Eval] {
                let enroll: BTreeSet<_> =
                    protocol.files(group, Purpose::Enroll).iter().map(|f| f.id).collect();
                assert!(protocol
                    .files(group, Purpose::Probe)
                    .iter()
                    .all(|f| !enroll.contains(&f.id)));
            }
        }
    }
}
