//! Closed code tables for the SWAN filename fields and catalog enumerations.
//!
//! Each table maps a one-token code (as it appears in a filename) to a
//! canonical label (as stored in the catalog). Lookups outside a table fail
//! with [`SwanError::UnknownCode`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SwanError;

/// Declares a closed enumeration with a filename code and a catalog label.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => ($code:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The token used inside filenames.
            pub fn code(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            /// The label stored in the catalog and accepted by queries.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn from_code(code: &str) -> Result<Self, SwanError> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err(SwanError::unknown_code($field, code)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = SwanError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == value)
                    .ok_or_else(|| SwanError::unknown_code($field, value))
            }
        }
    };
}

coded_enum! {
    /// Recording institute.
    Site, "site" {
        Ntnu => ("1", "NTNU"),
        Uio => ("2", "UIO"),
        MphFra => ("3", "MPH-FRA"),
        Idiap => ("4", "IDIAP"),
        MphInd => ("6", "MPH-IND"),
    }
}

coded_enum! {
    Gender, "gender" {
        Male => ("m", "male"),
        Female => ("f", "female"),
    }
}

coded_enum! {
    /// Capture device. Declaration order is the catalog sort order.
    Device, "device" {
        IPhone => ("p", "iPhone"),
        IPad => ("t", "iPad"),
    }
}

coded_enum! {
    Modality, "modality" {
        Face => ("1", "face"),
        Voice => ("2", "voice"),
        Eye => ("3", "eye"),
        Finger => ("4", "finger"),
    }
}

coded_enum! {
    Camera, "camera" {
        Rear => ("rear", "rear"),
        Front => ("front", "front"),
    }
}

coded_enum! {
    RecordingKind, "recording" {
        Video => ("video", "video"),
        Photo => ("photo", "photo"),
    }
}

coded_enum! {
    /// Client partition.
    Group, "group" {
        World => ("world", "world"),
        Dev => ("dev", "dev"),
        Eval => ("eval", "eval"),
    }
}

coded_enum! {
    /// Role a file plays inside a group.
    Purpose, "purpose" {
        Train => ("train", "train"),
        Enroll => ("enroll", "enroll"),
        Probe => ("probe", "probe"),
    }
}

coded_enum! {
    /// Spoken content in the speech dialect.
    SpeechType, "speech type" {
        Read => ("r", "read"),
        Free => ("f", "free"),
    }
}

coded_enum! {
    Environment, "environment" {
        Indoor => ("i", "indoor"),
        Outdoor => ("o", "outdoor"),
    }
}

/// The five (group, purpose) pairs every protocol is materialized for.
pub const CANONICAL_PURPOSES: [(Group, Purpose); 5] = [
    (Group::World, Purpose::Train),
    (Group::Dev, Purpose::Enroll),
    (Group::Dev, Purpose::Probe),
    (Group::Eval, Purpose::Enroll),
    (Group::Eval, Purpose::Probe),
];

pub fn is_canonical(group: Group, purpose: Purpose) -> bool {
    CANONICAL_PURPOSES.contains(&(group, purpose))
}
