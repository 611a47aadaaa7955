pub mod bands;
pub mod discovery;
pub mod shape;

use anyhow::Result;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::ScannerConfig;
use crate::error::SwanError;
use crate::metadata::{
    parse_filename, Camera, ClientKey, Device, Environment, Gender, Group, Modality, NameVariant,
    RecordingKind, Site, SpeechType,
};

pub use bands::GroupBands;
pub use discovery::{discover_media, discover_sites};
pub use shape::ShapeTable;

/// A subject of the corpus, unique by `(orig_id, institute)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Client {
    pub id: i64,
    pub orig_id: u32,
    pub gender: Gender,
    pub group: Group,
    pub institute: Site,
}

impl Client {
    pub fn key(&self) -> ClientKey {
        ClientKey {
            site: self.institute,
            identity: self.orig_id,
        }
    }
}

/// Extra fields carried by speech-dialect recordings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechInfo {
    pub speech_type: SpeechType,
    pub environment: Environment,
    pub channel: String,
}

/// One catalogued recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: i64,
    /// Path relative to the corpus root, extension included.
    pub path: String,
    pub client: Client,
    pub session: u32,
    pub device: Device,
    pub modality: Modality,
    pub camera: Camera,
    pub recording: RecordingKind,
    pub nrecording: u32,
    pub speech: Option<SpeechInfo>,
}

impl FileRecord {
    /// Joins an optional directory prefix and extension suffix onto the path.
    pub fn make_path(&self, directory: Option<&Path>, extension: &str) -> PathBuf {
        let name = format!("{}{}", self.path, extension);
        match directory {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub discovered: usize,
    pub admitted: usize,
    pub skipped: usize,
    pub clients: usize,
}

/// Immutable set of clients and files built from one directory scan.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    clients: Vec<Client>,
    files: Vec<FileRecord>,
}

impl Catalog {
    /// Assembles a catalog, rejecting duplicate ids, client keys or paths.
    pub fn from_parts(clients: Vec<Client>, files: Vec<FileRecord>) -> Result<Self, SwanError> {
        let mut client_ids = BTreeSet::new();
        let mut client_keys = BTreeSet::new();
        for client in &clients {
            if !client_ids.insert(client.id) {
                return Err(SwanError::DuplicateKey {
                    entity: "client id",
                    key: client.id.to_string(),
                });
            }
            if !client_keys.insert(client.key()) {
                return Err(SwanError::DuplicateKey {
                    entity: "client",
                    key: client.key().to_string(),
                });
            }
        }

        let mut file_ids = BTreeSet::new();
        let mut paths = BTreeSet::new();
        for file in &files {
            if !file_ids.insert(file.id) {
                return Err(SwanError::DuplicateKey {
                    entity: "file id",
                    key: file.id.to_string(),
                });
            }
            if !paths.insert(file.path.as_str()) {
                return Err(SwanError::DuplicateKey {
                    entity: "file path",
                    key: file.path.clone(),
                });
            }
            if !client_ids.contains(&file.client.id) {
                return Err(SwanError::DuplicateKey {
                    entity: "file owner",
                    key: format!("{} -> missing client {}", file.path, file.client.id),
                });
            }
        }

        Ok(Self { clients, files })
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn client_by_key(&self, key: ClientKey) -> Option<&Client> {
        self.clients.iter().find(|c| c.key() == key)
    }

    /// Scans `root` and builds the catalog.
    ///
    /// Files that fail to parse, fall outside the group bands or do not fit
    /// the expected shape table are logged and skipped. A file stored under a
    /// directory that disagrees with its own name aborts the ingestion.
    pub fn ingest(
        root: &Path,
        scanner: &ScannerConfig,
        bands: &GroupBands,
    ) -> Result<(Self, IngestReport)> {
        let paths = discover_sites(root, &scanner.extensions())?;
        let shapes = ShapeTable::for_dialect(scanner.dialect);
        tracing::info!(root = %root.display(), files = paths.len(), "Discovered media");

        let classify = |path: &PathBuf| classify_file(root, path, scanner, &shapes, bands);
        let results: Vec<Result<Candidate, SwanError>> = if scanner.parallel {
            paths.par_iter().map(classify).collect()
        } else {
            paths.iter().map(classify).collect()
        };

        let mut report = IngestReport {
            discovered: paths.len(),
            ..IngestReport::default()
        };

        // Single writer from here on: the client map is only touched in this loop.
        let mut owners: BTreeMap<ClientKey, (Gender, Group)> = BTreeMap::new();
        let mut admitted = Vec::new();
        for (path, result) in paths.iter().zip(results) {
            let candidate = match result {
                Ok(candidate) => candidate,
                Err(e @ SwanError::PathMismatch { .. }) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping file");
                    report.skipped += 1;
                    continue;
                }
            };

            let (gender, _) = *owners
                .entry(candidate.key)
                .or_insert((candidate.gender, candidate.group));
            if gender != candidate.gender {
                let e = SwanError::SchemaMismatch(format!(
                    "{}: gender {} disagrees with client {}",
                    candidate.path, candidate.gender, candidate.key
                ));
                tracing::warn!(path = %path.display(), error = %e, "Skipping file");
                report.skipped += 1;
                continue;
            }
            admitted.push(candidate);
        }

        let clients: Vec<Client> = owners
            .iter()
            .enumerate()
            .map(|(index, (key, (gender, group)))| Client {
                id: index as i64 + 1,
                orig_id: key.identity,
                gender: *gender,
                group: *group,
                institute: key.site,
            })
            .collect();
        let by_key: BTreeMap<ClientKey, Client> = clients.iter().map(|c| (c.key(), *c)).collect();

        let files = admitted
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| FileRecord {
                id: index as i64 + 1,
                client: by_key[&candidate.key],
                path: candidate.path,
                session: candidate.session,
                device: candidate.device,
                modality: candidate.modality,
                camera: candidate.camera,
                recording: candidate.recording,
                nrecording: candidate.nrecording,
                speech: candidate.speech,
            })
            .collect::<Vec<_>>();

        report.admitted = files.len();
        report.clients = clients.len();
        tracing::info!(
            admitted = report.admitted,
            skipped = report.skipped,
            clients = report.clients,
            "Catalog built"
        );

        Ok((Self::from_parts(clients, files)?, report))
    }
}

struct Candidate {
    key: ClientKey,
    gender: Gender,
    group: Group,
    path: String,
    session: u32,
    device: Device,
    modality: Modality,
    camera: Camera,
    recording: RecordingKind,
    nrecording: u32,
    speech: Option<SpeechInfo>,
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn classify_file(
    root: &Path,
    path: &Path,
    scanner: &ScannerConfig,
    shapes: &ShapeTable,
    bands: &GroupBands,
) -> Result<Candidate, SwanError> {
    let parsed = parse_filename(scanner.dialect, path)?;
    let relative = relative_path(root, path);
    let expected = parsed.catalog_path();
    if relative != expected {
        return Err(SwanError::PathMismatch {
            path: path.to_path_buf(),
            reason: format!("expected {}", expected),
        });
    }

    let recording = scanner.recording_kind(&parsed.extension).ok_or_else(|| {
        SwanError::SchemaMismatch(format!("{}: unknown extension", relative))
    })?;
    let modality = parsed.modality();
    let camera = shapes
        .expected(
            parsed.session,
            parsed.device,
            modality,
            &parsed.extension,
            &parsed.recording,
        )
        .and_then(|cameras| cameras.first().copied())
        .ok_or_else(|| SwanError::SchemaMismatch(relative.clone()))?;

    let key = parsed.client.key;
    let group = bands.classify(key.identity)?;
    let nrecording = parsed
        .recording
        .parse()
        .map_err(|_| SwanError::unknown_code("recording", parsed.recording.clone()))?;
    let speech = match parsed.variant {
        NameVariant::Camera { .. } => None,
        NameVariant::Speech {
            speech_type,
            environment,
            channel,
        } => Some(SpeechInfo {
            speech_type,
            environment,
            channel,
        }),
    };

    Ok(Candidate {
        key,
        gender: parsed.client.gender,
        group,
        path: relative,
        session: parsed.session,
        device: parsed.device,
        modality,
        camera,
        recording,
        nrecording,
        speech,
    })
}
