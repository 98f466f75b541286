use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::SongId;

/// Where the content files live.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ContentConfig {
    /// Directory holding one `<map_id>.json` per world map.
    pub maps_path: PathBuf,

    /// Directory holding the four lephon phase files `1.json`..`4.json`.
    pub lephon_path: PathBuf,

    /// Chart-constant index consumed by the play-result producer.
    #[serde(default)]
    pub charts_path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StorageConfig {
    /// Directory where to find storage. If undefined, ephemeral storage
    /// will be used.
    pub path: Option<PathBuf>,

    /// Size (in Mb) of memory allocated for database caching.
    pub cache: Option<usize>,
}

impl StorageConfig {
    pub fn is_ephemeral(&self) -> bool {
        self.path.is_none()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("data")),
            cache: None,
        }
    }
}

/// Gameplay constants and behavioural toggles.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GameConfig {
    /// When set, every partner is treated as owned and maxed
    /// (`user_char_full`) and plays grant no partner XP.
    #[serde(default)]
    pub full_unlock: bool,

    #[serde(default = "defaults::max_stamina")]
    pub max_stamina: i32,

    /// Milliseconds to recover one stamina point.
    #[serde(default = "defaults::stamina_recover_tick")]
    pub stamina_recover_tick: i64,

    /// How long a fatalis play locks world mode, in milliseconds.
    #[serde(default = "defaults::fatalis_world_lock_time")]
    pub fatalis_world_lock_time: i64,

    #[serde(default = "defaults::eto_uncap_bonus_progress")]
    pub eto_uncap_bonus_progress: f64,

    #[serde(default = "defaults::luna_uncap_bonus_progress")]
    pub luna_uncap_bonus_progress: f64,

    /// Half-width of the uniform `[-K, +K]` ayu roll.
    #[serde(default = "defaults::ayu_uncap_bonus_progress")]
    pub ayu_uncap_bonus_progress: i32,

    /// Songs whose clears double partner stats under `skill_mika`.
    #[serde(default = "defaults::mika_songs")]
    pub mika_songs: Vec<SongId>,

    /// Odds that a non-beyond token issuance starts an invasion.
    #[serde(default = "defaults::invasion_start_odds")]
    pub invasion_start_odds: f64,

    /// Odds of the hard invasion variant, rolled after the start roll
    /// misses.
    #[serde(default = "defaults::invasion_hard_odds")]
    pub invasion_hard_odds: f64,

    #[serde(default = "defaults::course_stamina_cost")]
    pub course_stamina_cost: i32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            full_unlock: false,
            max_stamina: defaults::max_stamina(),
            stamina_recover_tick: defaults::stamina_recover_tick(),
            fatalis_world_lock_time: defaults::fatalis_world_lock_time(),
            eto_uncap_bonus_progress: defaults::eto_uncap_bonus_progress(),
            luna_uncap_bonus_progress: defaults::luna_uncap_bonus_progress(),
            ayu_uncap_bonus_progress: defaults::ayu_uncap_bonus_progress(),
            mika_songs: defaults::mika_songs(),
            invasion_start_odds: defaults::invasion_start_odds(),
            invasion_hard_odds: defaults::invasion_hard_odds(),
            course_stamina_cost: defaults::course_stamina_cost(),
        }
    }
}

mod defaults {
    use crate::SongId;

    pub fn max_stamina() -> i32 {
        12
    }

    pub fn stamina_recover_tick() -> i64 {
        1_800_000
    }

    pub fn fatalis_world_lock_time() -> i64 {
        3_600_000
    }

    pub fn eto_uncap_bonus_progress() -> f64 {
        7.0
    }

    pub fn luna_uncap_bonus_progress() -> f64 {
        7.0
    }

    pub fn ayu_uncap_bonus_progress() -> i32 {
        5
    }

    pub fn mika_songs() -> Vec<SongId> {
        [
            "aegleseeker",
            "ignotusafterburn",
            "mismal",
            "redandblueandgreen",
            "singularityvvvip",
            "magnolia",
            "overdead",
            "lostdesire",
        ]
        .into_iter()
        .map(Into::into)
        .collect()
    }

    pub fn invasion_start_odds() -> f64 {
        0.05
    }

    pub fn invasion_hard_odds() -> f64 {
        0.01
    }

    pub fn course_stamina_cost() -> i32 {
        4
    }
}

/// Cumulative XP required to reach each partner level, 1-indexed at
/// offset 0.
pub const LEVEL_EXP: [f64; 30] = [
    0.0, 50.0, 100.0, 150.0, 200.0, 300.0, 450.0, 650.0, 900.0, 1200.0, 1600.0, 2100.0, 2700.0,
    3400.0, 4200.0, 5100.0, 6100.0, 7200.0, 8500.0, 10000.0, 11500.0, 13000.0, 14500.0, 16000.0,
    17500.0, 19000.0, 20500.0, 22000.0, 23500.0, 25000.0,
];

/// XP threshold for `level`, saturating at the top of the curve.
pub fn exp_for_level(level: u32) -> f64 {
    let idx = (level.max(1) as usize - 1).min(LEVEL_EXP.len() - 1);
    LEVEL_EXP[idx]
}
