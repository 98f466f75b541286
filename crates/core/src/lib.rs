//! Traits and machinery that are common to all cadenza crates.
//!
//! Glossary:
//!  - `map`: a ladder of steps a player advances along by playing charts.
//!  - `step` (or tile): one rung of a map with a `capture` cost.
//!  - `climb`: the mutation of a player's `(position, capture)` pair that
//!    consumes a computed amount of progress.
//!  - `pending play`: the reserved state between a play token being issued
//!    and the matching score arriving.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

pub mod catalog;
pub mod character;
pub mod config;
pub mod map;
pub mod stamina;

pub type UserId = u64;
pub type MapId = String;
pub type SongId = String;
pub type CharacterId = u32;

/// Milliseconds since the unix epoch.
pub type Timestamp = i64;

/// Lephon boss-map phase, 0..=3.
pub type LephonPhase = u8;

pub use catalog::*;
pub use character::*;
pub use config::*;
pub use map::*;
pub use stamina::*;

pub fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// The symbolic names the client expects for the `{0,1,2}` skill flag
/// alphabet.
pub const STAT_VALUE_NAMES: [&str; 3] = ["frag", "prog", "over"];

/// Partner whose invasion substitutes the acting character.
pub const INVADER_CHARACTER_ID: CharacterId = 72;

/// Partner whose presence on a non-beyond play triggers the tempest bonus.
pub const TEMPEST_CHARACTER_ID: CharacterId = 35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillId {
    SkillVita,
    SkillMika,
    SkillMithra,
    SkillIlithIvy,
    SkillHikariVanessa,
    SkillChinatsu,
    SkillSalt,
    SkillHikariSelene,
    SkillNamiSui,
    IlithAwakenedSkill,
    EtoUncap,
    LunaUncap,
    AyuUncap,
    SkillFatalis,
    SkillAmane,
    SkillMaya,
    SkillKanaeUncap,
    SkillEtoHoppe,
    SkillIntruder,
}

impl SkillId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkillVita => "skill_vita",
            Self::SkillMika => "skill_mika",
            Self::SkillMithra => "skill_mithra",
            Self::SkillIlithIvy => "skill_ilith_ivy",
            Self::SkillHikariVanessa => "skill_hikari_vanessa",
            Self::SkillChinatsu => "skill_chinatsu",
            Self::SkillSalt => "skill_salt",
            Self::SkillHikariSelene => "skill_hikari_selene",
            Self::SkillNamiSui => "skill_nami_sui",
            Self::IlithAwakenedSkill => "ilith_awakened_skill",
            Self::EtoUncap => "eto_uncap",
            Self::LunaUncap => "luna_uncap",
            Self::AyuUncap => "ayu_uncap",
            Self::SkillFatalis => "skill_fatalis",
            Self::SkillAmane => "skill_amane",
            Self::SkillMaya => "skill_maya",
            Self::SkillKanaeUncap => "skill_kanae_uncap",
            Self::SkillEtoHoppe => "skill_eto_hoppe",
            Self::SkillIntruder => "skill_intruder",
        }
    }

    /// The skill ids whose flag string is rolled at token issuance, with
    /// the flag length each expects.
    pub fn flag_len(&self) -> Option<usize> {
        match self {
            Self::SkillIlithIvy | Self::SkillHikariVanessa => Some(5),
            Self::SkillChinatsu => Some(7),
            _ => None,
        }
    }
}

impl Display for SkillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillId {
    type Err = WorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = match s {
            "skill_vita" => Self::SkillVita,
            "skill_mika" => Self::SkillMika,
            "skill_mithra" => Self::SkillMithra,
            "skill_ilith_ivy" => Self::SkillIlithIvy,
            "skill_hikari_vanessa" => Self::SkillHikariVanessa,
            "skill_chinatsu" => Self::SkillChinatsu,
            "skill_salt" => Self::SkillSalt,
            "skill_hikari_selene" => Self::SkillHikariSelene,
            "skill_nami_sui" => Self::SkillNamiSui,
            "ilith_awakened_skill" => Self::IlithAwakenedSkill,
            "eto_uncap" => Self::EtoUncap,
            "luna_uncap" => Self::LunaUncap,
            "ayu_uncap" => Self::AyuUncap,
            "skill_fatalis" => Self::SkillFatalis,
            "skill_amane" => Self::SkillAmane,
            "skill_maya" => Self::SkillMaya,
            "skill_kanae_uncap" => Self::SkillKanaeUncap,
            "skill_eto_hoppe" => Self::SkillEtoHoppe,
            "skill_intruder" => Self::SkillIntruder,
            other => return Err(WorldError::input(format!("unknown skill id: {other}"))),
        };

        Ok(id)
    }
}

/// The `user` row as the world engine sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub character_id: CharacterId,
    pub current_map: MapId,
    pub max_stamina_ts: Timestamp,
    pub stamina: i32,
    pub beyond_boost_gauge: f64,
    pub world_mode_locked_end_ts: Timestamp,
    pub kanae_stored_prog: f64,
    pub prog_boost: i32,
}

impl UserProfile {
    pub fn stamina(&self) -> Stamina {
        Stamina::new(self.max_stamina_ts, self.stamina)
    }

    pub fn set_stamina(&mut self, stamina: &Stamina) {
        self.max_stamina_ts = stamina.max_stamina_ts();
        self.stamina = stamina.stored();
    }
}

/// The `user_world` row: a user's standing on one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapProgress {
    pub curr_position: u32,
    pub curr_capture: i64,
    pub is_locked: bool,
}

impl MapProgress {
    pub fn locked() -> Self {
        Self {
            curr_position: 0,
            curr_capture: 0,
            is_locked: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvasionFlag {
    None,
    Start,
    Hard,
}

impl InvasionFlag {
    /// Whether the invader takes over the play given the final health.
    pub fn takes_over(&self, health: i32) -> bool {
        match self {
            Self::None => false,
            Self::Start => true,
            Self::Hard => health <= 0,
        }
    }
}

/// Course-mode token lifecycle; tracks which stage of the course the
/// token is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseState {
    Stage(u8),
    Cleared,
    Failed,
}

/// The play reserved between token issuance and score submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPlay {
    pub token: String,
    pub song_id: SongId,
    pub difficulty: u8,
    pub map_id: MapId,
    pub stamina_multiply: i32,
    pub fragment_multiply: i32,
    pub prog_boost_multiply: i32,
    pub beyond_boost_gauge_usage: i32,
    pub skill_id: Option<SkillId>,
    pub is_skill_sealed: bool,
    pub skill_flag: Option<String>,
    pub invasion: InvasionFlag,
    /// Stamina deducted at issuance, refunded on abandon.
    pub stamina_cost: i32,
    pub issued_at: Timestamp,
    /// Present when the token belongs to a course run instead of a world
    /// play.
    pub course: Option<CoursePlay>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoursePlay {
    pub course_id: String,
    pub state: CourseState,
}

/// A finalized chart play as handed over by the scoring pipeline.
///
/// The world engine never validates or re-scores a play; everything in
/// here is already settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayResult {
    pub song_id: SongId,
    pub difficulty: u8,

    /// Finalized play rating for this score on this chart.
    pub rating: f64,

    pub score: i64,
    pub shiny_perfect_count: i32,
    pub perfect_count: i32,
    pub near_count: i32,
    pub miss_count: i32,

    /// Final recollection gauge, 0..=100.
    pub health: i32,

    /// 0 means the track was lost.
    pub clear_type: i32,

    /// Non-zero when the play ran on the beyond gauge.
    pub beyond_gauge: i32,

    pub combo_interval_bonus: Option<i32>,
    pub hp_interval_bonus: Option<i32>,
    pub fever_bonus: Option<i32>,
    pub highest_health: Option<i32>,
    pub lowest_health: Option<i32>,

    /// Client toggle for the nell wall jump.
    pub nell_toggle: bool,
}

impl PlayResult {
    /// Grade band for the score; 5 is EX, 6 is EX+.
    pub fn song_grade(&self) -> i32 {
        match self.score {
            s if s >= 9_900_000 => 6,
            s if s >= 9_800_000 => 5,
            s if s >= 9_500_000 => 4,
            s if s >= 9_200_000 => 3,
            s if s >= 8_900_000 => 2,
            s if s >= 8_600_000 => 1,
            _ => 0,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no data for user {0}")]
    NoData(UserId),

    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn internal<T: Display>(value: T) -> Self {
        StoreError::Internal(value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed map {map_id}: {reason}")]
    Malformed { map_id: MapId, reason: String },

    #[error("unknown map id: {0}")]
    UnknownMap(MapId),

    #[error("unknown lephon phase: {0}")]
    UnknownPhase(LephonPhase),
}

/// Caller-visible failures of the world engine.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("the map is locked")]
    MapLocked,

    #[error("no data: {0}")]
    NoData(String),

    #[error("required item not owned")]
    ItemUnavailable,

    #[error("invalid or expired play token")]
    TokenInvalid,

    #[error("not enough stamina")]
    StaminaShortage,

    #[error("world mode is locked until {0}")]
    WorldModeLocked(Timestamp),

    #[error(transparent)]
    Content(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorldError {
    pub fn input<T: Display>(value: T) -> Self {
        WorldError::Input(value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind listener")]
    BindError(std::io::Error),

    #[error("failed to shutdown")]
    ShutdownError(std::io::Error),

    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

// ============================================================================
// Store traits
// ============================================================================

/// Which character table a read goes against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterTable {
    /// The per-user `user_char` rows; characters level up here.
    PerUser,
    /// The `user_char_full` rows backing the all-characters-maxed mode.
    FullUnlock,
}

/// Read side of the persistent world state.
///
/// All reads are snapshot reads; mutations go through a [`WorldWriter`]
/// so that one play commits atomically.
pub trait WorldStore: Clone + Send + Sync + 'static {
    type Writer: WorldWriter;

    fn profile(&self, user: UserId) -> Result<Option<UserProfile>, StoreError>;

    fn map_progress(&self, user: UserId, map_id: &str) -> Result<Option<MapProgress>, StoreError>;

    fn lephon_phase(&self, user: UserId) -> Result<LephonPhase, StoreError>;

    fn character(
        &self,
        user: UserId,
        character: CharacterId,
        table: CharacterTable,
    ) -> Result<Option<CharacterState>, StoreError>;

    /// Sum of levels across the user's whole partner roster.
    fn character_level_total(&self, user: UserId) -> Result<u32, StoreError>;

    /// Generic per-user counter, namespaced by class (the `user_kv`
    /// table).
    fn counter(&self, user: UserId, class: &str, key: &str) -> Result<i64, StoreError>;

    /// How many of a purchasable item the user owns.
    fn owned_amount(&self, user: UserId, kind: &str, id: &str) -> Result<i64, StoreError>;

    fn pending_play(&self, user: UserId) -> Result<Option<PendingPlay>, StoreError>;

    fn start_writer(&self) -> Result<Self::Writer, StoreError>;
}

/// Write side of the persistent world state. Nothing is visible to
/// readers until [`WorldWriter::commit`] returns.
pub trait WorldWriter: Sized {
    fn put_profile(&mut self, profile: &UserProfile) -> Result<(), StoreError>;

    fn put_map_progress(
        &mut self,
        user: UserId,
        map_id: &str,
        progress: &MapProgress,
    ) -> Result<(), StoreError>;

    fn put_lephon_phase(&mut self, user: UserId, phase: LephonPhase) -> Result<(), StoreError>;

    fn put_character(
        &mut self,
        user: UserId,
        state: &CharacterState,
        table: CharacterTable,
    ) -> Result<(), StoreError>;

    fn put_counter(
        &mut self,
        user: UserId,
        class: &str,
        key: &str,
        value: i64,
    ) -> Result<(), StoreError>;

    fn grant_item(&mut self, user: UserId, item: &RewardItem) -> Result<(), StoreError>;

    fn put_pending_play(&mut self, user: UserId, pending: &PendingPlay) -> Result<(), StoreError>;

    fn clear_pending_play(&mut self, user: UserId) -> Result<(), StoreError>;

    fn commit(self) -> Result<(), StoreError>;
}

/// The bundle of collaborators a request handler works against.
pub trait Domain: Send + Sync + Clone + 'static {
    type Store: WorldStore;

    fn store(&self) -> &Self::Store;
    fn catalog(&self) -> &MapCatalog;
    fn game(&self) -> &GameConfig;
}

#[trait_variant::make(Send)]
pub trait CancelToken: Send + Sync + 'static + Clone {
    async fn cancelled(&self);
}

#[trait_variant::make(Send)]
pub trait Driver<D: Domain, C: CancelToken>: Send + Sync + 'static {
    type Config: Clone;

    async fn run(config: Self::Config, domain: D, cancel: C) -> Result<(), ServeError>;
}
