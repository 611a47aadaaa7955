//! Expected recording shapes per session.
//!
//! A file is only admitted to the catalog when its
//! `(session, device, modality, extension, recording)` combination appears
//! here; the entry also yields the camera that captured it.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::metadata::{Camera, Device, Dialect, Modality};

const BOTH: &[Device] = &[Device::IPhone, Device::IPad];
const PHONE: &[Device] = &[Device::IPhone];

struct ShapeRow {
    sessions: RangeInclusive<u32>,
    devices: &'static [Device],
    modality: Modality,
    extension: &'static str,
    recordings: RangeInclusive<u32>,
    camera: Camera,
}

const fn row(
    sessions: RangeInclusive<u32>,
    devices: &'static [Device],
    modality: Modality,
    extension: &'static str,
    recordings: RangeInclusive<u32>,
    camera: Camera,
) -> ShapeRow {
    ShapeRow {
        sessions,
        devices,
        modality,
        extension,
        recordings,
        camera,
    }
}

// Session 1 is recorded on both devices, sessions 2-6 on the phone only.
// Session 2 onwards drops the rear face captures.
const CAMERA_ROWS: &[ShapeRow] = &[
    row(1..=1, BOTH, Modality::Face, "png", 1..=5, Camera::Rear),
    row(1..=1, BOTH, Modality::Face, "mp4", 1..=2, Camera::Rear),
    row(1..=1, BOTH, Modality::Face, "png", 6..=10, Camera::Front),
    row(1..=1, BOTH, Modality::Face, "mp4", 3..=4, Camera::Front),
    row(2..=6, PHONE, Modality::Face, "mp4", 1..=2, Camera::Front),
    row(1..=1, BOTH, Modality::Voice, "mp4", 1..=8, Camera::Front),
    row(2..=6, PHONE, Modality::Voice, "mp4", 1..=8, Camera::Front),
    row(1..=1, BOTH, Modality::Eye, "png", 1..=5, Camera::Rear),
    row(1..=1, BOTH, Modality::Eye, "mp4", 1..=2, Camera::Rear),
    row(1..=1, BOTH, Modality::Eye, "png", 6..=10, Camera::Front),
    row(1..=1, BOTH, Modality::Eye, "mp4", 3..=4, Camera::Front),
    row(2..=6, PHONE, Modality::Eye, "png", 1..=5, Camera::Rear),
    row(2..=6, PHONE, Modality::Eye, "mp4", 1..=2, Camera::Rear),
    row(2..=6, PHONE, Modality::Eye, "png", 6..=10, Camera::Front),
    row(2..=6, PHONE, Modality::Eye, "mp4", 3..=4, Camera::Front),
    row(1..=1, BOTH, Modality::Finger, "png", 1..=20, Camera::Rear),
    row(1..=1, BOTH, Modality::Finger, "mp4", 1..=8, Camera::Rear),
    row(2..=6, PHONE, Modality::Finger, "png", 1..=20, Camera::Rear),
    row(2..=6, PHONE, Modality::Finger, "mp4", 1..=8, Camera::Rear),
];

const SPEECH_ROWS: &[ShapeRow] = &[
    row(1..=1, BOTH, Modality::Voice, "mp4", 1..=8, Camera::Front),
    row(2..=6, PHONE, Modality::Voice, "mp4", 1..=8, Camera::Front),
];

type ByRecording = BTreeMap<String, Vec<Camera>>;
type ByExtension = BTreeMap<String, ByRecording>;
type ByModality = BTreeMap<Modality, ByExtension>;
type ByDevice = BTreeMap<Device, ByModality>;

/// session -> device -> modality -> extension -> recording -> cameras
#[derive(Debug, Clone, Default)]
pub struct ShapeTable {
    sessions: BTreeMap<u32, ByDevice>,
}

impl ShapeTable {
    pub fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Camera => Self::from_rows(CAMERA_ROWS),
            Dialect::Speech => Self::from_rows(SPEECH_ROWS),
        }
    }

    fn from_rows(rows: &[ShapeRow]) -> Self {
        let mut table = Self::default();
        for row in rows {
            for session in row.sessions.clone() {
                for device in row.devices {
                    for recording in row.recordings.clone() {
                        table
                            .sessions
                            .entry(session)
                            .or_default()
                            .entry(*device)
                            .or_default()
                            .entry(row.modality)
                            .or_default()
                            .entry(row.extension.to_string())
                            .or_default()
                            .entry(format!("{:02}", recording))
                            .or_default()
                            .push(row.camera);
                    }
                }
            }
        }
        table
    }

    pub fn expected(
        &self,
        session: u32,
        device: Device,
        modality: Modality,
        extension: &str,
        recording: &str,
    ) -> Option<&[Camera]> {
        self.sessions
            .get(&session)?
            .get(&device)?
            .get(&modality)?
            .get(extension)?
            .get(recording)
            .map(|cameras| cameras.as_slice())
    }
}
