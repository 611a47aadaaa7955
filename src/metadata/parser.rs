use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::codes::{Device, Environment, Gender, Modality, Site, SpeechType};
use crate::error::SwanError;

/// Filename dialect of a dataset revision. Never auto-detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `<site>_<identity>_<gender>_<session>_<recording>_<device>_<modality>.<ext>`
    #[default]
    Camera,
    /// `<site>_<identity>_<gender>_<session>_<shot>_<device>_<speech>_<environment>_<channel>.<ext>`
    Speech,
}

impl Dialect {
    pub fn field_count(&self) -> usize {
        match self {
            Dialect::Camera => 7,
            Dialect::Speech => 9,
        }
    }
}

/// Identity of a client inside the corpus: the same number recurs across
/// sites, so the site is part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientKey {
    pub site: Site,
    pub identity: u32,
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:05}", self.site, self.identity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientDescriptor {
    pub key: ClientKey,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameVariant {
    Camera { modality: Modality },
    Speech {
        speech_type: SpeechType,
        environment: Environment,
        channel: String,
    },
}

/// Everything a SWAN filename encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub client: ClientDescriptor,
    pub session: u32,
    /// Recording index (camera dialect) or shot id (speech dialect), as written.
    pub recording: String,
    pub device: Device,
    pub extension: String,
    pub variant: NameVariant,
}

impl ParsedName {
    /// Speech recordings carry no modality code; they are always voice.
    pub fn modality(&self) -> Modality {
        match self.variant {
            NameVariant::Camera { modality } => modality,
            NameVariant::Speech { .. } => Modality::Voice,
        }
    }

    /// Rebuilds the basename this metadata was parsed from.
    pub fn basename(&self) -> String {
        let key = self.client.key;
        let head = format!(
            "{}_{:05}_{}_{:02}_{}_{}",
            key.site.code(),
            key.identity,
            self.client.gender.code(),
            self.session,
            self.recording,
            self.device.code()
        );
        match &self.variant {
            NameVariant::Camera { modality } => {
                format!("{}_{}.{}", head, modality.code(), self.extension)
            }
            NameVariant::Speech {
                speech_type,
                environment,
                channel,
            } => format!(
                "{}_{}_{}_{}.{}",
                head,
                speech_type.code(),
                environment.code(),
                channel,
                self.extension
            ),
        }
    }

    /// Location inside the corpus: `<site>/session_<NN>/<device>/<identity>/<basename>`.
    pub fn catalog_path(&self) -> String {
        format!(
            "{}/session_{:02}/{}/{:05}/{}",
            self.client.key.site,
            self.session,
            self.device,
            self.client.key.identity,
            self.basename()
        )
    }
}

fn digits(field: &'static str, value: &str) -> Result<u32, SwanError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SwanError::unknown_code(field, value));
    }
    value
        .parse()
        .map_err(|_| SwanError::unknown_code(field, value))
}

/// A numeric field that is always zero-padded to `width` digits.
fn padded(name: &str, field: &'static str, value: &str, width: usize) -> Result<u32, SwanError> {
    let number = digits(field, value)?;
    if value.len() != width {
        return Err(SwanError::malformed(
            name,
            format!("{} {:?} is not {} digits wide", field, value, width),
        ));
    }
    Ok(number)
}

/// Decodes the basename of `path` according to `dialect`.
pub fn parse_filename(dialect: Dialect, path: &Path) -> Result<ParsedName, SwanError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, ext),
        _ => (name.as_str(), ""),
    };
    let fields: Vec<&str> = stem.split('_').collect();
    if fields.len() != dialect.field_count() || extension.is_empty() {
        return Err(SwanError::malformed(
            name.as_str(),
            format!("expected {} fields, found {}", dialect.field_count(), fields.len()),
        ));
    }

    let site = Site::from_code(fields[0])?;
    let identity = padded(&name, "identity", fields[1], 5)?;
    let gender = Gender::from_code(fields[2])?;
    let session = padded(&name, "session", fields[3], 2)?;
    padded(&name, "recording", fields[4], 2)?;
    let recording = fields[4].to_string();
    let device = Device::from_code(fields[5])?;

    let variant = match dialect {
        Dialect::Camera => NameVariant::Camera {
            modality: Modality::from_code(fields[6])?,
        },
        Dialect::Speech => {
            digits("channel", fields[8])?;
            NameVariant::Speech {
                speech_type: SpeechType::from_code(fields[6])?,
                environment: Environment::from_code(fields[7])?,
                channel: fields[8].to_string(),
            }
        }
    };

    Ok(ParsedName {
        client: ClientDescriptor {
            key: ClientKey { site, identity },
            gender,
        },
        session,
        recording,
        device,
        extension: extension.to_string(),
        variant,
    })
}

/// Metadata lookup for a single camera-dialect file. Any error is fatal to
/// the caller.
pub fn swan_file_metadata(path: &Path) -> Result<ParsedName, SwanError> {
    parse_filename(Dialect::Camera, path)
}
