use serde::{Deserialize, Serialize};

use crate::{CatalogError, CharacterId, MapId, Timestamp};

pub const LEPHON_MAP_ID: &str = "lephon_nell";

/// Behaviour tags a step may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTag {
    Plusstamina,
    Randomsong,
    Speedlimit,
    WallNell,
    WallImpossible,
    SpecialLamentRain,
}

/// One reward descriptor attached to a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardItem {
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,

    #[serde(rename = "type")]
    pub item_type: String,

    #[serde(default = "default_amount")]
    pub amount: i32,
}

fn default_amount() -> i32 {
    1
}

impl RewardItem {
    pub fn is_fragment(&self) -> bool {
        self.item_type == "fragment"
    }
}

/// One rung of a map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    pub position: u32,
    pub capture: i64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<RewardItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrict_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrict_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrict_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrict_difficulty: Option<i32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_type: Vec<StepTag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_limit_value: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plus_stamina_value: Option<i32>,
}

impl Step {
    pub fn has_tag(&self, tag: StepTag) -> bool {
        self.step_type.contains(&tag)
    }

    pub fn is_restricted(&self) -> bool {
        self.restrict_type.is_some() && self.restrict_id.is_some()
    }
}

/// A structured unlock prerequisite (`requires` / `requires_any`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prerequisite {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// A full map descriptor, immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDescriptor {
    #[serde(default)]
    pub map_id: MapId,

    #[serde(default)]
    pub is_legacy: bool,
    #[serde(default)]
    pub is_beyond: bool,
    #[serde(default)]
    pub is_breached: bool,
    #[serde(default)]
    pub is_repeatable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beyond_health: Option<i64>,

    #[serde(default)]
    pub character_affinity: Vec<CharacterId>,
    #[serde(default)]
    pub affinity_multiplier: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<u32>,

    #[serde(default = "default_available_from")]
    pub available_from: Timestamp,
    #[serde(default = "default_available_to")]
    pub available_to: Timestamp,

    #[serde(default)]
    pub require_id: String,
    #[serde(default)]
    pub require_type: String,
    #[serde(default = "default_require_value")]
    pub require_value: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Vec<Prerequisite>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_any: Option<Vec<Prerequisite>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<String>,
    #[serde(default)]
    pub custom_bg: String,

    #[serde(default)]
    pub stamina_cost: i32,

    #[serde(default)]
    pub require_localunlock_songid: String,
    #[serde(default)]
    pub require_localunlock_challengeid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_info: Option<serde_json::Value>,

    #[serde(default)]
    pub disable_over: bool,
    #[serde(default)]
    pub new_law: String,

    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_available_from() -> Timestamp {
    -1
}

fn default_available_to() -> Timestamp {
    9_999_999_999_999
}

fn default_require_value() -> i32 {
    1
}

impl MapDescriptor {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_available_at(&self, now: Timestamp) -> bool {
        self.available_from <= now && now <= self.available_to
    }

    /// Affinity multiplier for a partner, 1.0 when unlisted.
    pub fn affinity_multiplier_for(&self, character: CharacterId) -> f64 {
        self.character_affinity
            .iter()
            .position(|id| *id == character)
            .and_then(|i| self.affinity_multiplier.get(i).copied())
            .unwrap_or(1.0)
    }

    /// Step positions must match their index; a map without steps is not
    /// climbable.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.steps.is_empty() {
            return Err(CatalogError::Malformed {
                map_id: self.map_id.clone(),
                reason: "map has no steps".into(),
            });
        }

        for (idx, step) in self.steps.iter().enumerate() {
            if step.position as usize != idx {
                return Err(CatalogError::Malformed {
                    map_id: self.map_id.clone(),
                    reason: format!("step {} carries position {}", idx, step.position),
                });
            }
        }

        Ok(())
    }
}

/// Lightweight per-map facts kept in the catalog index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSummary {
    pub map_id: MapId,
    pub chapter: Option<u32>,
    pub is_repeatable: bool,
    pub is_beyond: bool,
    pub is_legacy: bool,
    pub step_count: usize,
}

impl From<&MapDescriptor> for MapSummary {
    fn from(value: &MapDescriptor) -> Self {
        Self {
            map_id: value.map_id.clone(),
            chapter: value.chapter,
            is_repeatable: value.is_repeatable,
            is_beyond: value.is_beyond,
            is_legacy: value.is_legacy,
            step_count: value.step_count(),
        }
    }
}
