use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};

use cadenza_core::{
    CharacterId, CharacterState, CharacterTable, Domain, MapId, PendingPlay, PlayResult, Step,
    StepTag, Timestamp, UserId, UserProfile, WorldError, WorldStore as _, WorldWriter as _,
    INVADER_CHARACTER_ID, LEPHON_MAP_ID, TEMPEST_CHARACTER_ID,
};

use crate::progress::{StepRewards, UserMap};
use crate::{laws, skills};

/// Ceiling of the beyond boost gauge.
const BEYOND_BOOST_GAUGE_MAX: f64 = 200.0;

/// Progress the client is shown for a failed final-phase lephon play.
const LEPHON_FINAL_FAIL_PROGRESS: f64 = -6.115;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    Normal,
    Beyond,
    Breached,
}

/// One world-mode play being settled: the orchestrator that runs skill
/// hooks around the climb and commits every side effect atomically.
pub struct WorldPlay<'a, D: Domain> {
    pub(crate) domain: &'a D,
    pub(crate) user_id: UserId,
    pub(crate) profile: UserProfile,
    pub user_map: UserMap,
    pub(crate) character: CharacterState,
    pub(crate) character_table: CharacterTable,
    pub(crate) character_dirty: bool,
    pub(crate) play: PlayResult,
    pub(crate) pending: PendingPlay,
    pub(crate) mode: PlayMode,
    pub(crate) skill: Option<cadenza_core::SkillId>,

    pub(crate) prog_skill_increase: Option<f64>,
    pub(crate) over_skill_increase: Option<f64>,
    pub(crate) prog_tempest: Option<f64>,
    pub(crate) character_bonus_progress_normalized: Option<f64>,
    pub(crate) kanae_added_progress: Option<f64>,
    pub(crate) kanae_stored_progress: Option<f64>,
    pub(crate) new_law_prog: Option<f64>,

    pub(crate) rng: SmallRng,
    pub(crate) now: Timestamp,
}

impl<'a, D: Domain> WorldPlay<'a, D> {
    pub fn new(
        domain: &'a D,
        user_id: UserId,
        pending: PendingPlay,
        play: PlayResult,
        now: Timestamp,
    ) -> Result<Self, WorldError> {
        if pending.course.is_some() {
            return Err(WorldError::input("a course token cannot settle a world play"));
        }

        let store = domain.store();

        let profile = store
            .profile(user_id)?
            .ok_or_else(|| WorldError::NoData(format!("user {user_id}")))?;

        let user_map = UserMap::load(store, domain.catalog(), user_id, &pending.map_id)?;

        let mode = if user_map.map.is_breached {
            PlayMode::Breached
        } else if user_map.map.is_beyond {
            PlayMode::Beyond
        } else {
            PlayMode::Normal
        };

        let character_table = if domain.game().full_unlock {
            CharacterTable::FullUnlock
        } else {
            CharacterTable::PerUser
        };

        let character = store
            .character(user_id, profile.character_id, character_table)?
            .ok_or_else(|| {
                WorldError::NoData(format!("character {}", profile.character_id))
            })?;

        Ok(Self {
            domain,
            user_id,
            profile,
            user_map,
            character,
            character_table,
            character_dirty: false,
            play,
            pending,
            mode,
            skill: None,
            prog_skill_increase: None,
            over_skill_increase: None,
            prog_tempest: None,
            character_bonus_progress_normalized: None,
            kanae_added_progress: None,
            kanae_stored_progress: None,
            new_law_prog: None,
            rng: SmallRng::from_os_rng(),
            now,
        })
    }

    /// Replace the gameplay rng; tests pin the ayu roll this way.
    pub fn with_rng(mut self, rng: SmallRng) -> Self {
        self.rng = rng;
        self
    }

    // ------------------------------------------------------------------
    // formula pieces
    // ------------------------------------------------------------------

    pub(crate) fn step_times(&self) -> f64 {
        let p = &self.pending;
        let stamina = p.stamina_multiply as f64;
        let fragment = p.fragment_multiply as f64 / 100.0;
        let boost = p.prog_boost_multiply as f64 / 100.0;

        match self.mode {
            PlayMode::Normal => stamina * fragment * (1.0 + boost),
            PlayMode::Beyond | PlayMode::Breached => {
                stamina * fragment * (1.0 + boost + p.beyond_boost_gauge_usage as f64 / 100.0)
            }
        }
    }

    pub(crate) fn exp_times(&self) -> f64 {
        self.pending.stamina_multiply as f64
            * (self.pending.prog_boost_multiply as f64 / 100.0 + 1.0)
    }

    pub fn base_progress(&self) -> f64 {
        match self.mode {
            PlayMode::Normal => 2.5 + 2.45 * self.play.rating.sqrt(),
            PlayMode::Beyond | PlayMode::Breached => {
                let clear = if self.play.clear_type == 0 {
                    25.0 / 28.0
                } else {
                    75.0 / 28.0
                };
                0.43 * self.play.rating.sqrt() + clear
            }
        }
    }

    pub(crate) fn partner_adjusted_prog(&self) -> f64 {
        self.character.prog
            + self.prog_tempest.unwrap_or_default()
            + self.prog_skill_increase.unwrap_or_default()
    }

    pub(crate) fn affinity_multiplier(&self) -> f64 {
        match self.mode {
            PlayMode::Breached => 1.0,
            _ => self
                .user_map
                .map
                .affinity_multiplier_for(self.character.character_id),
        }
    }

    pub fn progress_normalized(&self) -> f64 {
        match self.mode {
            PlayMode::Normal => self.base_progress() * (self.partner_adjusted_prog() / 50.0),
            PlayMode::Beyond => {
                let overdrive = self.character.overdrive + self.over_skill_increase.unwrap_or_default();
                self.base_progress() * (overdrive / 50.0) * self.affinity_multiplier()
            }
            PlayMode::Breached => {
                let law = self.new_law_prog.map(|p| p / 50.0).unwrap_or(1.0);
                if self.user_map.map.disable_over {
                    self.base_progress() * law
                } else {
                    let overdrive =
                        self.character.overdrive + self.over_skill_increase.unwrap_or_default();
                    self.base_progress() * (overdrive / 50.0) * law
                }
            }
        }
    }

    pub fn final_progress(&self) -> f64 {
        match self.mode {
            PlayMode::Normal => {
                (self.progress_normalized()
                    + self.character_bonus_progress_normalized.unwrap_or_default())
                    * self.step_times()
                    + self.kanae_added_progress.unwrap_or_default()
                    - self.kanae_stored_progress.unwrap_or_default()
            }
            PlayMode::Beyond | PlayMode::Breached => self.progress_normalized() * self.step_times(),
        }
    }

    /// Re-run the climb with the current accumulators applied.
    pub(crate) fn reclimb(&mut self) -> Result<(), WorldError> {
        let progress = self.final_progress();
        self.user_map
            .reclimb(self.domain.catalog(), progress, &self.play)
    }

    // ------------------------------------------------------------------
    // pipeline
    // ------------------------------------------------------------------

    /// Settle the play: skill pre-hooks, climb, post-hooks, rewards,
    /// stamina, XP and persistence, in that order.
    pub fn update(mut self) -> Result<WorldPlayOutcome, WorldError> {
        self.before_update()?;
        self.before_calculate()?;

        let progress = self.final_progress();
        debug!(
            user = self.user_id,
            map = %self.pending.map_id,
            progress,
            "climbing"
        );
        self.user_map
            .climb(self.domain.catalog(), progress, &self.play)?;

        self.after_climb()?;
        self.after_update()
    }

    fn before_update(&mut self) -> Result<(), WorldError> {
        if self.pending.prog_boost_multiply != 0 {
            self.profile.prog_boost = 0;
        }

        if self.pending.is_skill_sealed {
            self.character = self.character.sealed();
        } else {
            if self.play.beyond_gauge == 0 && self.profile.kanae_stored_prog > 0.0 {
                self.kanae_added_progress = Some(self.profile.kanae_stored_prog);
            }

            if self.pending.invasion.takes_over(self.play.health) {
                self.character = self
                    .domain
                    .store()
                    .character(self.user_id, INVADER_CHARACTER_ID, self.character_table)?
                    .ok_or_else(|| {
                        WorldError::NoData(format!("character {INVADER_CHARACTER_ID}"))
                    })?;
            }
        }

        self.skill = if self.pending.is_skill_sealed {
            None
        } else {
            self.character.displayed_skill()
        };

        self.user_map.steps_modified = false;

        Ok(())
    }

    fn before_calculate(&mut self) -> Result<(), WorldError> {
        if self.play.beyond_gauge == 0
            && self.character.character_id == TEMPEST_CHARACTER_ID
            && self.skill.is_some()
        {
            skills::special_tempest(self)?;
        }

        if let Some(skill) = self.skill {
            skills::run_pre_hook(self, skill)?;
        }

        if self.mode == PlayMode::Breached {
            laws::apply(self);
        }

        Ok(())
    }

    fn after_climb(&mut self) -> Result<(), WorldError> {
        if let Some(skill) = self.skill {
            skills::run_post_hook(self, skill)?;
        }

        Ok(())
    }

    fn after_update(mut self) -> Result<WorldPlayOutcome, WorldError> {
        let game = self.domain.game();
        let store = self.domain.store();

        let rewards = self.user_map.rewards_for_climbing();

        // stamina tile on the last climbed step
        let mut stamina = self.profile.stamina();
        let last = self.user_map.steps_for_climbing().last().cloned();
        if let Some(step) = last {
            if step.has_tag(StepTag::Plusstamina) {
                if let Some(value) = step.plus_stamina_value {
                    let live = stamina.value_at(self.now, game);
                    stamina.set_at(live + value, self.now, game);
                }
            }
        }
        self.profile.set_stamina(&stamina);

        // partner XP only accrues on the per-user table
        if !self.pending.is_skill_sealed && self.character_table == CharacterTable::PerUser {
            self.character
                .gain_exp(self.exp_times() * self.play.rating * 6.0);
            self.character_dirty = true;
        }

        // repeatable maps wrap from the last tile
        if self.user_map.at_final_step() && self.user_map.map.is_repeatable {
            self.user_map.curr_position = 0;
            self.user_map.curr_capture = 0.0;
        }

        match self.mode {
            PlayMode::Beyond | PlayMode::Breached => {
                let addition = 2.45 * self.play.rating.sqrt() + 27.0;
                self.profile.beyond_boost_gauge =
                    (self.profile.beyond_boost_gauge + addition).min(BEYOND_BOOST_GAUGE_MAX);

                let usage = self.pending.beyond_boost_gauge_usage as f64;
                if usage != 0.0 && usage <= self.profile.beyond_boost_gauge {
                    self.profile.beyond_boost_gauge -= usage;
                    if self.profile.beyond_boost_gauge.abs() <= 1e-5 {
                        self.profile.beyond_boost_gauge = 0.0;
                    }
                }
            }
            PlayMode::Normal => {
                if let Some(stored) = self.kanae_stored_progress {
                    self.profile.kanae_stored_prog = stored;
                } else if self.kanae_added_progress.is_some() {
                    self.profile.kanae_stored_prog = 0.0;
                }
            }
        }

        let mut writer = store.start_writer()?;

        for reward in &rewards {
            for item in &reward.items {
                writer.grant_item(self.user_id, item)?;
            }
        }

        if self.character_dirty {
            writer.put_character(self.user_id, &self.character, self.character_table)?;
        }

        if let Some(chapter) = self.user_map.map.chapter {
            if self.completed_map_this_climb() {
                let key = format!("chapter_complete_count.{chapter}");
                let count = store.counter(self.user_id, "world", &key)?;
                writer.put_counter(self.user_id, "world", &key, count + 1)?;
            }
        }

        if self.user_map.phase_dirty() {
            writer.put_lephon_phase(self.user_id, self.user_map.lephon_phase())?;
        }

        writer.put_map_progress(self.user_id, &self.pending.map_id, &self.user_map.progress_row())?;
        writer.clear_pending_play(self.user_id)?;
        writer.put_profile(&self.profile)?;
        writer.commit()?;

        info!(
            user = self.user_id,
            map = %self.pending.map_id,
            position = self.user_map.curr_position,
            "world play settled"
        );

        Ok(self.into_outcome(rewards))
    }

    /// Whether this climb finished a non-repeatable map: the counter
    /// feeding the salt-skill completion ratio.
    fn completed_map_this_climb(&self) -> bool {
        !self.user_map.map.is_repeatable
            && self.user_map.at_final_step()
            && (self.user_map.prev_position as usize) < self.user_map.step_count() - 1
    }

    fn into_outcome(self, rewards: Vec<StepRewards>) -> WorldPlayOutcome {
        let game = self.domain.game();

        let lephon_failed = self.user_map.map_id == LEPHON_MAP_ID
            && self.user_map.lephon_final
            && self.play.clear_type == 0;

        let (base_progress, progress) = if lephon_failed {
            (LEPHON_FINAL_FAIL_PROGRESS, LEPHON_FINAL_FAIL_PROGRESS)
        } else {
            (self.base_progress(), self.final_progress())
        };

        let steps = (self.user_map.map_id == LEPHON_MAP_ID)
            .then(|| self.user_map.steps().to_vec());

        WorldPlayOutcome {
            rewards,
            exp: self.character.exp,
            level: self.character.level,
            base_progress,
            progress,
            user_map: UserMapSnapshot {
                user_id: self.user_id,
                map_id: self.user_map.map_id.clone(),
                curr_position: self.user_map.curr_position,
                curr_capture: self.user_map.curr_capture,
                is_locked: self.user_map.is_locked,
                prev_position: self.user_map.prev_position,
                prev_capture: self.user_map.prev_capture,
                beyond_health: self.user_map.map.beyond_health,
            },
            char_stats: CharStats {
                character_id: self.character.character_id,
                frag: self.character.frag,
                prog: self.character.prog + self.prog_tempest.unwrap_or_default(),
                overdrive: self.character.overdrive,
                prog_skill_increase: self.prog_skill_increase,
                over_skill_increase: self.over_skill_increase,
                prog_tempest: self.prog_tempest,
                skill_state: (self.skill == Some(cadenza_core::SkillId::SkillMaya))
                    .then_some(self.character.skill_flag),
            },
            current_stamina: self.profile.stamina().value_at(self.now, game),
            max_stamina_ts: self.profile.max_stamina_ts,
            world_mode_locked_end_ts: self.profile.world_mode_locked_end_ts,
            beyond_boost_gauge: self.profile.beyond_boost_gauge,
            steps_modified: self.user_map.steps_modified,
            lephon_active: self.user_map.lephon_active,
            lephon_final: self.user_map.lephon_final,
            steps,
            stamina_multiply: (self.pending.stamina_multiply != 1)
                .then_some(self.pending.stamina_multiply),
            fragment_multiply: (self.pending.fragment_multiply != 100)
                .then_some(self.pending.fragment_multiply),
            prog_boost_multiply: (self.pending.prog_boost_multiply != 0)
                .then_some(self.pending.prog_boost_multiply),
            beyond_boost_gauge_usage: (self.pending.beyond_boost_gauge_usage != 0)
                .then_some(self.pending.beyond_boost_gauge_usage),
            character_bonus_progress_normalized: self.character_bonus_progress_normalized,
            kanae_added_progress: self.kanae_added_progress,
            kanae_stored_progress: self.kanae_stored_progress,
            affinity_multiplier: matches!(self.mode, PlayMode::Beyond)
                .then(|| self.affinity_multiplier()),
            new_law_multiply: matches!(self.mode, PlayMode::Breached)
                .then(|| self.new_law_prog.map(|p| p / 50.0).unwrap_or(1.0)),
        }
    }
}

/// Everything the client is told about a settled world play.
#[derive(Debug, Serialize)]
pub struct WorldPlayOutcome {
    pub rewards: Vec<StepRewards>,
    pub exp: f64,
    pub level: u32,
    pub base_progress: f64,
    pub progress: f64,
    pub user_map: UserMapSnapshot,
    pub char_stats: CharStats,
    pub current_stamina: i32,
    pub max_stamina_ts: Timestamp,
    pub world_mode_locked_end_ts: Timestamp,
    pub beyond_boost_gauge: f64,
    pub steps_modified: bool,
    pub lephon_active: bool,
    pub lephon_final: bool,

    /// The full (possibly phase-substituted) step list; only reported for
    /// the lephon boss map.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamina_multiply: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment_multiply: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prog_boost_multiply: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beyond_boost_gauge_usage: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_bonus_progress_normalized: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kanae_added_progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kanae_stored_progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity_multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_law_multiply: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct UserMapSnapshot {
    pub user_id: UserId,
    pub map_id: MapId,
    pub curr_position: u32,
    pub curr_capture: f64,
    pub is_locked: bool,
    pub prev_position: u32,
    pub prev_capture: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beyond_health: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CharStats {
    pub character_id: CharacterId,
    pub frag: f64,
    pub prog: f64,
    pub overdrive: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prog_skill_increase: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub over_skill_increase: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prog_tempest: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_state: Option<bool>,
}
