//! Protocol definitions as data.
//!
//! Every protocol maps each canonical `(group, purpose)` pair to a list of
//! filter rules. A rule is an AND over its non-empty dimensions; the rules of
//! one pair are OR-ed together. The materializer never looks at protocol
//! names, so adding a protocol only means adding a definition here or in the
//! configuration file.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::catalog::FileRecord;
use crate::error::SwanError;
use crate::metadata::{
    is_canonical, Camera, Device, Gender, Group, Modality, Purpose, RecordingKind, Site,
};

/// How probes relate to the model ids a caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbePolicy {
    /// Only probes of the requested identities.
    #[default]
    ClaimedOnly,
    /// A single requested identity is scored against every probe of its
    /// group (genuine plus impostor); several identities get their own probes.
    ImpostorsForSingleModel,
    /// Model ids never restrict probes.
    AllProbes,
}

impl ProbePolicy {
    pub const ALL: &'static [ProbePolicy] = &[
        ProbePolicy::ClaimedOnly,
        ProbePolicy::ImpostorsForSingleModel,
        ProbePolicy::AllProbes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbePolicy::ClaimedOnly => "claimed-only",
            ProbePolicy::ImpostorsForSingleModel => "impostors-for-single-model",
            ProbePolicy::AllProbes => "all-probes",
        }
    }

    /// Whether probes must be restricted to the requested model ids.
    pub fn restricts_probes(&self, model_count: usize) -> bool {
        match self {
            ProbePolicy::ClaimedOnly => model_count > 0,
            ProbePolicy::ImpostorsForSingleModel => model_count > 1,
            ProbePolicy::AllProbes => false,
        }
    }
}

impl fmt::Display for ProbePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbePolicy {
    type Err = SwanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ProbePolicy::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == value)
            .ok_or_else(|| SwanError::unknown_dimension("probe policy", value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySet {
    List(BTreeSet<u32>),
    Range(Range<u32>),
}

impl IdentitySet {
    pub fn contains(&self, identity: u32) -> bool {
        match self {
            IdentitySet::List(ids) => ids.contains(&identity),
            IdentitySet::Range(range) => range.contains(&identity),
        }
    }
}

/// One filter tuple. Empty dimensions do not restrict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRule {
    pub devices: Vec<Device>,
    pub identities: Option<IdentitySet>,
    pub modalities: Vec<Modality>,
    pub cameras: Vec<Camera>,
    pub recordings: Vec<RecordingKind>,
    pub sessions: Vec<u32>,
    pub sites: Vec<Site>,
}

fn admits<T: PartialEq>(allowed: &[T], value: &T) -> bool {
    allowed.is_empty() || allowed.contains(value)
}

impl FilterRule {
    pub fn matches(&self, file: &FileRecord) -> bool {
        admits(&self.devices, &file.device)
            && self
                .identities
                .as_ref()
                .map_or(true, |ids| ids.contains(file.client.orig_id))
            && admits(&self.modalities, &file.modality)
            && admits(&self.cameras, &file.camera)
            && admits(&self.recordings, &file.recording)
            && admits(&self.sessions, &file.session)
            && admits(&self.sites, &file.client.institute)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolDefinition {
    pub name: String,
    pub gender: Option<Gender>,
    pub probe_policy: ProbePolicy,
    rules: BTreeMap<(Group, Purpose), Vec<FilterRule>>,
}

impl ProtocolDefinition {
    pub fn new(name: impl Into<String>, gender: Option<Gender>, probe_policy: ProbePolicy) -> Self {
        Self {
            name: name.into(),
            gender,
            probe_policy,
            rules: BTreeMap::new(),
        }
    }

    pub fn add_rule(
        &mut self,
        group: Group,
        purpose: Purpose,
        rule: FilterRule,
    ) -> Result<(), SwanError> {
        if !is_canonical(group, purpose) {
            return Err(SwanError::unknown_dimension(
                "group/purpose",
                format!("{}/{}", group, purpose),
            ));
        }
        self.rules.entry((group, purpose)).or_default().push(rule);
        Ok(())
    }

    fn with(mut self, group: Group, purpose: Purpose, rule: FilterRule) -> Self {
        self.rules.entry((group, purpose)).or_default().push(rule);
        self
    }

    pub fn rules(&self, group: Group, purpose: Purpose) -> &[FilterRule] {
        self.rules
            .get(&(group, purpose))
            .map(|rules| rules.as_slice())
            .unwrap_or(&[])
    }

    pub fn admits_gender(&self, file: &FileRecord) -> bool {
        self.gender.map_or(true, |g| g == file.client.gender)
    }
}

/// Identities recorded at IDIAP whose numbers belong to other sites' subjects.
const NON_IDIAP_IDENTITIES: [u32; 10] = [7, 8, 9, 23, 37, 44, 45, 53, 56, 57];

fn idiap_identities(range: Range<u32>) -> Option<IdentitySet> {
    Some(IdentitySet::List(
        range
            .filter(|id| *id >= 1 && !NON_IDIAP_IDENTITIES.contains(id))
            .collect(),
    ))
}

const TRAIN_SESSIONS: Range<u32> = 1..7;
const PROBE_SESSIONS: Range<u32> = 2..7;

fn idiap_voice(devices: &[Device], identities: Range<u32>, sessions: Range<u32>) -> FilterRule {
    FilterRule {
        devices: devices.to_vec(),
        identities: idiap_identities(identities),
        modalities: vec![Modality::Voice],
        cameras: vec![Camera::Front],
        recordings: vec![RecordingKind::Video],
        sessions: sessions.collect(),
        sites: vec![Site::Idiap],
    }
}

fn idiap_face(devices: &[Device], cameras: &[Camera], sessions: Range<u32>) -> FilterRule {
    FilterRule {
        devices: devices.to_vec(),
        modalities: vec![Modality::Face],
        cameras: cameras.to_vec(),
        recordings: vec![RecordingKind::Video],
        sessions: sessions.collect(),
        sites: vec![Site::Idiap],
        ..FilterRule::default()
    }
}

fn voice_video(devices: &[Device], sessions: Range<u32>) -> FilterRule {
    FilterRule {
        devices: devices.to_vec(),
        modalities: vec![Modality::Voice],
        recordings: vec![RecordingKind::Video],
        sessions: sessions.collect(),
        ..FilterRule::default()
    }
}

const BOTH: &[Device] = &[Device::IPhone, Device::IPad];
const PHONE: &[Device] = &[Device::IPhone];

fn idiap0_audio() -> ProtocolDefinition {
    ProtocolDefinition::new("idiap0-audio", None, ProbePolicy::AllProbes)
        .with(Group::World, Purpose::Train, idiap_voice(BOTH, 1..25, TRAIN_SESSIONS))
        .with(Group::Dev, Purpose::Enroll, idiap_voice(PHONE, 25..41, 1..2))
        .with(Group::Dev, Purpose::Probe, idiap_voice(PHONE, 25..41, PROBE_SESSIONS))
        .with(Group::Eval, Purpose::Enroll, idiap_voice(PHONE, 41..61, 1..2))
        .with(Group::Eval, Purpose::Probe, idiap_voice(PHONE, 41..61, PROBE_SESSIONS))
}

fn idiap0_face() -> ProtocolDefinition {
    let mut protocol = ProtocolDefinition::new("idiap0-face", None, ProbePolicy::ImpostorsForSingleModel)
        .with(Group::World, Purpose::Train, idiap_face(BOTH, &[], TRAIN_SESSIONS));
    for group in [Group::Dev, Group::Eval] {
        // The two probe rules overlap on front phone videos.
        protocol = protocol
            .with(group, Purpose::Enroll, idiap_face(PHONE, &[], 1..2))
            .with(group, Purpose::Probe, idiap_face(PHONE, &[], PROBE_SESSIONS))
            .with(group, Purpose::Probe, idiap_face(&[], &[Camera::Front], PROBE_SESSIONS));
    }
    protocol
}

fn mobile1(name: &str, gender: Gender) -> ProtocolDefinition {
    ProtocolDefinition::new(name, Some(gender), ProbePolicy::ClaimedOnly)
        .with(Group::World, Purpose::Train, voice_video(PHONE, TRAIN_SESSIONS))
        .with(Group::Dev, Purpose::Enroll, voice_video(PHONE, 1..2))
        .with(Group::Dev, Purpose::Probe, voice_video(PHONE, PROBE_SESSIONS))
        .with(Group::Eval, Purpose::Enroll, voice_video(PHONE, 1..2))
        .with(Group::Eval, Purpose::Probe, voice_video(PHONE, PROBE_SESSIONS))
}

fn all0_audio() -> ProtocolDefinition {
    ProtocolDefinition::new("all0-audio", None, ProbePolicy::AllProbes)
        .with(Group::World, Purpose::Train, voice_video(BOTH, TRAIN_SESSIONS))
        .with(Group::Dev, Purpose::Enroll, voice_video(BOTH, 1..2))
        .with(Group::Dev, Purpose::Probe, voice_video(BOTH, PROBE_SESSIONS))
        .with(Group::Eval, Purpose::Enroll, voice_video(BOTH, 1..2))
        .with(Group::Eval, Purpose::Probe, voice_video(BOTH, PROBE_SESSIONS))
}

/// Read-only table of protocol definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtocolTable {
    definitions: Vec<ProtocolDefinition>,
}

impl ProtocolTable {
    pub fn builtin() -> Self {
        Self {
            definitions: vec![
                idiap0_audio(),
                idiap0_face(),
                mobile1("mobile1-male", Gender::Male),
                mobile1("mobile1-female", Gender::Female),
                all0_audio(),
            ],
        }
    }

    pub fn push(&mut self, definition: ProtocolDefinition) -> Result<(), SwanError> {
        if self.get(&definition.name).is_some() {
            return Err(SwanError::DuplicateKey {
                entity: "protocol",
                key: definition.name,
            });
        }
        self.definitions.push(definition);
        Ok(())
    }

    /// Adds protocols declared in configuration, validating every dimension.
    pub fn with_configured(mut self, configured: &[ProtocolConfig]) -> Result<Self, SwanError> {
        for declared in configured {
            self.push(declared.resolve()?)?;
        }
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ProtocolDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProtocolDefinition> {
        self.definitions.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.name.as_str()).collect()
    }
}

/// A protocol as written in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub name: String,

    #[serde(default)]
    pub gender: Option<String>,

    #[serde(default)]
    pub probe_policy: Option<String>,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub group: String,
    pub purpose: String,

    #[serde(default)]
    pub devices: Vec<String>,

    #[serde(default)]
    pub identities: Vec<u32>,

    /// Half-open `[start, end)` identity range.
    #[serde(default)]
    pub identity_range: Option<[u32; 2]>,

    #[serde(default)]
    pub modalities: Vec<String>,

    #[serde(default)]
    pub cameras: Vec<String>,

    #[serde(default)]
    pub recordings: Vec<String>,

    #[serde(default)]
    pub sessions: Vec<u32>,

    #[serde(default)]
    pub sites: Vec<String>,
}

fn resolve_all<T: FromStr>(dimension: &'static str, values: &[String]) -> Result<Vec<T>, SwanError> {
    values
        .iter()
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| SwanError::unknown_dimension(dimension, v.as_str()))
        })
        .collect()
}

impl RuleConfig {
    fn resolve(&self) -> Result<(Group, Purpose, FilterRule), SwanError> {
        let group: Group = self
            .group
            .parse()
            .map_err(|_| SwanError::unknown_dimension("group", self.group.as_str()))?;
        let purpose: Purpose = self
            .purpose
            .parse()
            .map_err(|_| SwanError::unknown_dimension("purpose", self.purpose.as_str()))?;

        let identities = match (&self.identity_range, self.identities.is_empty()) {
            (Some(_), false) => {
                return Err(SwanError::unknown_dimension(
                    "identities",
                    "both a list and a range",
                ))
            }
            (Some([start, end]), true) => Some(IdentitySet::Range(*start..*end)),
            (None, false) => Some(IdentitySet::List(self.identities.iter().copied().collect())),
            (None, true) => None,
        };

        let rule = FilterRule {
            devices: resolve_all("device", &self.devices)?,
            identities,
            modalities: resolve_all("modality", &self.modalities)?,
            cameras: resolve_all("camera", &self.cameras)?,
            recordings: resolve_all("recording", &self.recordings)?,
            sessions: self.sessions.clone(),
            sites: resolve_all("site", &self.sites)?,
        };
        Ok((group, purpose, rule))
    }
}

impl ProtocolConfig {
    pub fn resolve(&self) -> Result<ProtocolDefinition, SwanError> {
        if self.name.trim().is_empty() {
            return Err(SwanError::unknown_dimension("protocol", self.name.as_str()));
        }
        let gender = self
            .gender
            .as_deref()
            .map(|g| {
                g.parse::<Gender>()
                    .map_err(|_| SwanError::unknown_dimension("gender", g))
            })
            .transpose()?;
        let probe_policy = self
            .probe_policy
            .as_deref()
            .map(str::parse::<ProbePolicy>)
            .transpose()?
            .unwrap_or_default();

        let mut definition = ProtocolDefinition::new(self.name.clone(), gender, probe_policy);
        for rule in &self.rules {
            let (group, purpose, rule) = rule.resolve()?;
            definition.add_rule(group, purpose, rule)?;
        }
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let table = ProtocolTable::builtin();
        assert_eq!(
            table.names(),
            vec![
                "idiap0-audio",
                "idiap0-face",
                "mobile1-male",
                "mobile1-female",
                "all0-audio"
            ]
        );
    }

    #[test]
    fn test_idiap_identity_lists() {
        let table = ProtocolTable::builtin();
        let audio = table.get("idiap0-audio").unwrap();
        let world = &audio.rules(Group::World, Purpose::Train)[0];
        match world.identities.as_ref().unwrap() {
            IdentitySet::List(ids) => assert_eq!(ids.len(), 20),
            other => panic!("unexpected identity set {:?}", other),
        }
        let dev = &audio.rules(Group::Dev, Purpose::Enroll)[0];
        assert!(!dev.identities.as_ref().unwrap().contains(37));
        assert!(dev.identities.as_ref().unwrap().contains(25));
        assert!(audio.rules(Group::World, Purpose::Probe).is_empty());
    }

    #[test]
    fn test_probe_policy() {
        assert!(ProbePolicy::ClaimedOnly.restricts_probes(1));
        assert!(!ProbePolicy::ClaimedOnly.restricts_probes(0));
        assert!(!ProbePolicy::ImpostorsForSingleModel.restricts_probes(1));
        assert!(ProbePolicy::ImpostorsForSingleModel.restricts_probes(2));
        assert!(!ProbePolicy::AllProbes.restricts_probes(3));
        assert_eq!(
            "all-probes".parse::<ProbePolicy>().unwrap(),
            ProbePolicy::AllProbes
        );
    }

    #[test]
    fn test_configured_protocol() {
        let declared: ProtocolConfig = toml::from_str(
            r#"
name = "custom0-eye"
gender = "female"
probe_policy = "claimed-only"

[[rules]]
group = "world"
purpose = "train"
modalities = ["eye"]
devices = ["iPhone"]
identity_range = [1, 25]

[[rules]]
group = "dev"
purpose = "enroll"
modalities = ["eye"]
sessions = [1]
"#,
        )
        .unwrap();

        let definition = declared.resolve().unwrap();
        assert_eq!(definition.gender, Some(Gender::Female));
        let world = &definition.rules(Group::World, Purpose::Train)[0];
        assert_eq!(world.devices, vec![Device::IPhone]);
        assert_eq!(world.identities, Some(IdentitySet::Range(1..25)));
        assert_eq!(definition.rules(Group::Dev, Purpose::Enroll)[0].sessions, vec![1]);

        let table = ProtocolTable::builtin().with_configured(&[declared]).unwrap();
        assert!(table.get("custom0-eye").is_some());
    }

    #[test]
    fn test_configured_protocol_rejects_unknown_dimensions() {
        let bad_group = ProtocolConfig {
            name: "x".to_string(),
            rules: vec![RuleConfig {
                group: "test".to_string(),
                purpose: "train".to_string(),
                ..RuleConfig::default()
            }],
            ..ProtocolConfig::default()
        };
        assert_eq!(
            bad_group.resolve(),
            Err(SwanError::unknown_dimension("group", "test"))
        );

        let bad_pair = ProtocolConfig {
            name: "x".to_string(),
            rules: vec![RuleConfig {
                group: "world".to_string(),
                purpose: "probe".to_string(),
                ..RuleConfig::default()
            }],
            ..ProtocolConfig::default()
        };
        assert_eq!(
            bad_pair.resolve(),
            Err(SwanError::unknown_dimension("group/purpose", "world/probe"))
        );

        let bad_device = ProtocolConfig {
            name: "x".to_string(),
            rules: vec![RuleConfig {
                group: "dev".to_string(),
                purpose: "probe".to_string(),
                devices: vec!["Pixel".to_string()],
                ..RuleConfig::default()
            }],
            ..ProtocolConfig::default()
        };
        assert_eq!(
            bad_device.resolve(),
            Err(SwanError::unknown_dimension("device", "Pixel"))
        );
    }

    #[test]
    fn test_duplicate_protocol_name() {
        let declared = ProtocolConfig {
            name: "idiap0-audio".to_string(),
            ..ProtocolConfig::default()
        };
        assert!(matches!(
            ProtocolTable::builtin().with_configured(&[declared]),
            Err(SwanError::DuplicateKey { entity: "protocol", .. })
        ));
    }
}
