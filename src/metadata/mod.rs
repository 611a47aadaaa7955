pub mod codes;
pub mod parser;

pub use codes::{
    is_canonical, Camera, Device, Environment, Gender, Group, Modality, Purpose, RecordingKind,
    Site, SpeechType, CANONICAL_PURPOSES,
};
pub use parser::{
    parse_filename, swan_file_metadata, ClientDescriptor, ClientKey, Dialect, NameVariant,
    ParsedName,
};
