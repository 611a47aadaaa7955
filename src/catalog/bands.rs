use serde::{Deserialize, Serialize};

use crate::error::SwanError;
use crate::metadata::Group;

/// Identity-number bands assigning each client to a group.
///
/// Bands are half-open: `identity < world_below` is world,
/// `world_below <= identity < dev_below` is dev, and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBands {
    #[serde(default = "default_world_below")]
    pub world_below: u32,

    #[serde(default = "default_dev_below")]
    pub dev_below: u32,

    #[serde(default = "default_eval_below")]
    pub eval_below: u32,

    /// Identities never admitted to the catalog.
    #[serde(default)]
    pub excluded: Vec<u32>,
}

fn default_world_below() -> u32 {
    25
}

fn default_dev_below() -> u32 {
    41
}

fn default_eval_below() -> u32 {
    61
}

impl Default for GroupBands {
    fn default() -> Self {
        Self {
            world_below: default_world_below(),
            dev_below: default_dev_below(),
            eval_below: default_eval_below(),
            excluded: Vec::new(),
        }
    }
}

impl GroupBands {
    pub fn classify(&self, identity: u32) -> Result<Group, SwanError> {
        if self.excluded.contains(&identity) {
            return Err(SwanError::ExcludedIdentity(identity));
        }
        if identity < self.world_below {
            Ok(Group::World)
        } else if identity < self.dev_below {
            Ok(Group::Dev)
        } else if identity < self.eval_below {
            Ok(Group::Eval)
        } else {
            Err(SwanError::unknown_code("identity", format!("{:05}", identity)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        let bands = GroupBands::default();
        assert_eq!(bands.classify(24), Ok(Group::World));
        assert_eq!(bands.classify(25), Ok(Group::Dev));
        assert_eq!(bands.classify(40), Ok(Group::Dev));
        assert_eq!(bands.classify(41), Ok(Group::Eval));
        assert_eq!(bands.classify(60), Ok(Group::Eval));
        assert_eq!(
            bands.classify(61),
            Err(SwanError::unknown_code("identity", "00061"))
        );
    }

    #[test]
    fn test_excluded_identity() {
        let bands = GroupBands {
            excluded: vec![12],
            ..GroupBands::default()
        };
        assert_eq!(bands.classify(12), Err(SwanError::ExcludedIdentity(12)));
        assert_eq!(bands.classify(13), Ok(Group::World));
    }
}
