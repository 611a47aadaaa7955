//! Presentation-attack list generation.
//!
//! Real recordings come from the catalog, attack recordings from the attack
//! tree of the corpus (`<root>/<attack_dir>/<attack-type>/.../<basename>`).
//! Both are split into train/dev/eval once per repetition and written as flat
//! list files.

pub mod sampler;
pub mod writer;

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::catalog::{discover_media, Catalog, FileRecord};
use crate::config::Config;
use crate::metadata::{swan_file_metadata, Device, Modality, RecordingKind, Site};

pub use sampler::{sample, Amount, PadBuckets, PadEntry, PadPools, PadSplit, Split};
pub use writer::{repetition_dir, write_split};

/// Subjects whose real recordings are never used: another person sat in
/// for them part-way through a session.
const SUBSTITUTED_SUBJECTS: &[(Site, u32)] = &[(Site::MphFra, 19)];

fn is_substituted(file: &FileRecord) -> bool {
    SUBSTITUTED_SUBJECTS.contains(&(file.client.institute, file.client.orig_id))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PadProtocol {
    pub name: String,
    pub modality: Modality,
    /// Empty means every device.
    pub devices: Vec<Device>,
    /// Recording kinds admitted to the real pools. Empty means every kind.
    pub recordings: Vec<RecordingKind>,
    /// Sessions the real pool is sampled from.
    pub primary_sessions: Vec<u32>,
    /// Sessions whose real recordings all go to eval.
    pub remainder_sessions: Vec<u32>,
    /// Empty means every attack type found on disk.
    pub attack_types: Vec<String>,
    pub real: Split,
    pub attack: Split,
}

impl PadProtocol {
    fn admits_device(&self, device: Device) -> bool {
        self.devices.is_empty() || self.devices.contains(&device)
    }

    /// Real and attack pools for this protocol.
    pub fn pools(&self, catalog: &Catalog, attacks: &[AttackRecording]) -> PadPools {
        let real_entries = |sessions: &[u32]| -> Vec<PadEntry> {
            catalog
                .files()
                .iter()
                .filter(|f| f.modality == self.modality && self.admits_device(f.device))
                .filter(|f| self.recordings.is_empty() || self.recordings.contains(&f.recording))
                .filter(|f| sessions.contains(&f.session))
                .filter(|f| !is_substituted(f))
                .map(|f| PadEntry {
                    path: f.path.clone(),
                    client: f.client.key().to_string(),
                    attack_type: None,
                })
                .collect()
        };

        let attack = attacks
            .iter()
            .filter(|a| a.modality == self.modality && self.admits_device(a.device))
            .filter(|a| self.attack_types.is_empty() || self.attack_types.contains(&a.attack_type))
            .map(|a| a.entry.clone())
            .collect();

        PadPools {
            real: real_entries(&self.primary_sessions),
            remainder: real_entries(&self.remainder_sessions),
            attack,
        }
    }
}

/// The PAD protocols lists are generated for.
#[derive(Debug, Clone, PartialEq)]
pub struct PadTable {
    pub protocols: Vec<PadProtocol>,
}

impl PadTable {
    pub fn builtin() -> Self {
        let split = Split::ratios(0.5, 0.2, 0.3);
        Self {
            protocols: vec![
                PadProtocol {
                    name: "pad-voice".to_string(),
                    modality: Modality::Voice,
                    devices: vec![Device::IPhone],
                    recordings: vec![RecordingKind::Video],
                    primary_sessions: vec![1],
                    remainder_sessions: (2..7).collect(),
                    attack_types: Vec::new(),
                    real: split,
                    attack: split,
                },
                PadProtocol {
                    name: "pad-face".to_string(),
                    modality: Modality::Face,
                    devices: Vec::new(),
                    recordings: vec![RecordingKind::Video],
                    primary_sessions: vec![1],
                    remainder_sessions: (2..7).collect(),
                    attack_types: Vec::new(),
                    real: split,
                    attack: split,
                },
            ],
        }
    }
}

/// An attack recording found under the attack tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackRecording {
    pub entry: PadEntry,
    pub attack_type: String,
    pub modality: Modality,
    pub device: Device,
}

/// Scans `<root>/<attack_dir>`. Every file must carry a valid SWAN name, a
/// bad one fails the whole scan.
pub fn discover_attacks(root: &Path, attack_dir: &str, extensions: &[String]) -> Result<Vec<AttackRecording>> {
    let base = root.join(attack_dir);
    if !base.is_dir() {
        tracing::warn!(dir = %base.display(), "No attack directory");
        return Ok(Vec::new());
    }

    let mut attacks = Vec::new();
    for path in discover_media(&base, extensions)? {
        let parsed = swan_file_metadata(&path)
            .with_context(|| format!("Failed to tag attack file {}", path.display()))?;
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let attack_type = path
            .strip_prefix(&base)
            .ok()
            .and_then(|p| p.components().next())
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .unwrap_or_default();
        let path_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        attacks.push(AttackRecording {
            entry: PadEntry {
                path: path_str,
                client: parsed.client.key.to_string(),
                attack_type: Some(attack_type.clone()),
            },
            attack_type,
            modality: parsed.modality(),
            device: parsed.device,
        });
    }
    Ok(attacks)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PadReport {
    pub protocols: usize,
    pub repetitions: usize,
    pub directories: Vec<PathBuf>,
}

/// Samples every protocol of `table` `config.pad.repetitions` times and
/// writes the lists under `output`.
pub fn build_pad_lists(
    catalog: &Catalog,
    attacks: &[AttackRecording],
    table: &PadTable,
    config: &Config,
    output: &Path,
) -> Result<PadReport> {
    let seed = config.pad.seed;
    let repetitions = config.pad.repetitions;
    let mut report = PadReport {
        protocols: table.protocols.len(),
        repetitions,
        ..PadReport::default()
    };

    for protocol in &table.protocols {
        let pools = protocol.pools(catalog, attacks);
        tracing::info!(
            protocol = %protocol.name,
            real = pools.real.len(),
            remainder = pools.remainder.len(),
            attack = pools.attack.len(),
            "PAD pools"
        );

        // Each repetition owns its generator, so repetitions can run side by side.
        let splits = (0..repetitions)
            .into_par_iter()
            .map(|k| sample(&protocol.name, &pools, &protocol.real, &protocol.attack, seed, k))
            .collect::<Result<Vec<_>, _>>()?;

        for (k, split) in splits.iter().enumerate() {
            write_split(output, &protocol.name, k, split)?;
            report.directories.push(repetition_dir(output, &protocol.name, k));
        }
    }

    Ok(report)
}

/// Ingests `root`, scans its attack tree and writes every PAD list.
pub fn build_pad_lists_from_root(root: &Path, table: &PadTable, config: &Config, output: &Path) -> Result<PadReport> {
    let (catalog, _) = Catalog::ingest(root, &config.scanner, &config.bands)?;
    let attacks = discover_attacks(root, &config.pad.attack_dir, &config.scanner.extensions())?;
    build_pad_lists(&catalog, &attacks, table, config, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::touch;
    use crate::protocol::materialize::tests::idiap_voice_catalog;
    use std::fs;
    use tempfile::tempdir;

    fn voice_table() -> PadTable {
        PadTable {
            protocols: vec![PadTable::builtin().protocols[0].clone()],
        }
    }

    fn attacks(count: u32) -> Vec<AttackRecording> {
        (1..=count)
            .map(|i| AttackRecording {
                entry: PadEntry {
                    path: format!("pa-database/PA.V.4/4_{:05}_m_01_01_p_2.mp4", i),
                    client: format!("IDIAP_{:05}", i),
                    attack_type: Some("PA.V.4".to_string()),
                },
                attack_type: "PA.V.4".to_string(),
                modality: Modality::Voice,
                device: Device::IPhone,
            })
            .collect()
    }

    #[test]
    fn test_pools_split_sessions() {
        let catalog = idiap_voice_catalog(1..6);
        let protocol = &PadTable::builtin().protocols[0];
        let pools = protocol.pools(&catalog, &attacks(10));
        // 5 clients, 8 recordings, iPhone only
        assert_eq!(pools.real.len(), 5 * 8);
        assert_eq!(pools.remainder.len(), 5 * 8 * 5);
        assert_eq!(pools.attack.len(), 10);

        let face = &PadTable::builtin().protocols[1];
        assert!(face.pools(&catalog, &attacks(10)).attack.is_empty());
    }

    #[test]
    fn test_face_pool_takes_videos_only() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "IDIAP/session_01/iPhone/00001/4_00001_m_01_03_p_1.mp4");
        touch(dir.path(), "IDIAP/session_01/iPad/00001/4_00001_m_01_04_t_1.mp4");
        touch(dir.path(), "IDIAP/session_01/iPhone/00001/4_00001_m_01_06_p_1.png");
        touch(dir.path(), "IDIAP/session_02/iPhone/00001/4_00001_m_02_01_p_1.mp4");
        let config = Config::default();
        let (catalog, report) = Catalog::ingest(dir.path(), &config.scanner, &config.bands).unwrap();
        assert_eq!(report.admitted, 4);

        let face = &PadTable::builtin().protocols[1];
        let pools = face.pools(&catalog, &[]);
        assert_eq!(pools.real.len(), 2);
        assert!(pools.real.iter().all(|e| e.path.ends_with(".mp4")));
        assert_eq!(pools.remainder.len(), 1);
    }

    #[test]
    fn test_face_without_attacks_fails() {
        let dir = tempdir().unwrap();
        for recording in 3..=4 {
            touch(
                dir.path(),
                &format!("IDIAP/session_01/iPhone/00001/4_00001_m_01_{:02}_p_1.mp4", recording),
            );
        }
        let config = Config::default();
        let table = PadTable {
            protocols: vec![PadTable::builtin().protocols[1].clone()],
        };
        let out = tempdir().unwrap();
        // No attack directory at all.
        let err = build_pad_lists_from_root(dir.path(), &table, &config, out.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::SwanError>(),
            Some(crate::error::SwanError::InsufficientPoolSize { bucket, .. }) if bucket == "attack train"
        ));
    }

    #[test]
    fn test_substituted_subject_is_excluded() {
        let mut catalog = idiap_voice_catalog(19..20);
        let clients: Vec<_> = catalog
            .clients()
            .iter()
            .map(|c| crate::catalog::Client {
                institute: Site::MphFra,
                ..*c
            })
            .collect();
        let files: Vec<_> = catalog
            .files()
            .iter()
            .map(|f| FileRecord {
                client: clients[0],
                path: f.path.replace("IDIAP", "MPH-FRA"),
                ..f.clone()
            })
            .collect();
        catalog = Catalog::from_parts(clients, files).unwrap();

        let pools = PadTable::builtin().protocols[0].pools(&catalog, &[]);
        assert!(pools.real.is_empty());
        assert!(pools.remainder.is_empty());
    }

    #[test]
    fn test_build_is_reproducible() {
        let catalog = idiap_voice_catalog(1..11);
        let config = Config::default();
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();

        let report = build_pad_lists(&catalog, &attacks(20), &voice_table(), &config, first.path()).unwrap();
        build_pad_lists(&catalog, &attacks(20), &voice_table(), &config, second.path()).unwrap();
        assert_eq!(report.directories.len(), 10);

        for k in 0..10 {
            for group in ["train", "dev", "eval"] {
                for list in ["for_real.lst", "for_attack.lst"] {
                    let rel = Path::new("lists")
                        .join(format!("pad-voice-{}", k))
                        .join(group)
                        .join(list);
                    let a = fs::read(first.path().join(&rel)).unwrap();
                    let b = fs::read(second.path().join(&rel)).unwrap();
                    assert_eq!(a, b, "{} differs", rel.display());
                }
            }
        }

        let eval = fs::read_to_string(
            first.path().join("lists/pad-voice-0/eval/for_real.lst"),
        )
        .unwrap();
        // 80 primary files: 24 sampled plus the 400 remainder files
        assert_eq!(eval.lines().count(), 24 + 400);
    }

    #[test]
    fn test_insufficient_pool_fails() {
        let catalog = idiap_voice_catalog(1..3);
        let mut table = voice_table();
        table.protocols[0].attack.train = Amount::Count(5);
        let dir = tempdir().unwrap();
        let err = build_pad_lists(&catalog, &attacks(2), &table, &Config::default(), dir.path())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::SwanError>(),
            Some(crate::error::SwanError::InsufficientPoolSize { .. })
        ));
    }

    #[test]
    fn test_discover_attacks() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "pa-database/PA.V.4/4_00001_m_01_01_p_2.mp4");
        touch(dir.path(), "pa-database/PA.F.1/sub/4_00002_f_01_01_t_1.mp4");

        let attacks =
            discover_attacks(dir.path(), "pa-database", &["mp4".to_string()]).unwrap();
        assert_eq!(attacks.len(), 2);
        assert_eq!(attacks[0].attack_type, "PA.F.1");
        assert_eq!(attacks[0].modality, Modality::Face);
        assert_eq!(attacks[0].entry.client, "IDIAP_00002");
        assert_eq!(
            attacks[1].entry.path,
            "pa-database/PA.V.4/4_00001_m_01_01_p_2.mp4"
        );

        touch(dir.path(), "pa-database/PA.V.4/broken.mp4");
        assert!(discover_attacks(dir.path(), "pa-database", &["mp4".to_string()]).is_err());
    }
}
