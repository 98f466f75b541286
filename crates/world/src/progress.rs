use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use cadenza_core::{
    LephonPhase, MapCatalog, MapDescriptor, MapId, MapProgress, PlayResult, RewardItem, Step,
    StepTag, UserId, WorldError, WorldStore, WorldWriter as _, LEPHON_MAP_ID,
};

/// How far the nell wall jump may carry at most.
const NELL_JUMP_TILES: usize = 4;

/// How many tiles a failed final-phase play recoils.
const LEPHON_RECOIL_TILES: usize = 13;

/// Items granted by one traversed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepRewards {
    pub position: u32,
    pub items: Vec<RewardItem>,
}

/// A user's standing on every map the catalog knows.
pub fn all_user_maps<S: WorldStore>(
    store: &S,
    catalog: &MapCatalog,
    user: UserId,
) -> Result<Vec<UserMap>, WorldError> {
    catalog
        .map_ids()
        .into_iter()
        .map(|map_id| UserMap::load(store, catalog, user, &map_id))
        .collect()
}

/// Make a map the user's current one; token issuance and submission act
/// on it.
pub fn select_current_map<S: WorldStore>(
    store: &S,
    catalog: &MapCatalog,
    user: UserId,
    map_id: &str,
) -> Result<(), WorldError> {
    if !catalog.contains(map_id) {
        return Err(cadenza_core::CatalogError::UnknownMap(map_id.to_owned()).into());
    }

    let mut profile = store
        .profile(user)?
        .ok_or_else(|| WorldError::NoData(format!("user {user}")))?;
    profile.current_map = map_id.to_owned();

    let mut writer = store.start_writer()?;
    writer.put_profile(&profile)?;
    writer.commit()?;

    Ok(())
}

/// A user's standing on one map, plus the transient state a single play
/// threads through the climb.
///
/// Capture is carried as `f64` while in memory; the persisted row floors
/// it, which keeps `curr_capture < capture` strict on normal maps.
#[derive(Debug, Clone)]
pub struct UserMap {
    pub map: Arc<MapDescriptor>,
    pub map_id: MapId,
    pub user_id: UserId,

    steps: Arc<Vec<Step>>,

    pub curr_position: u32,
    pub curr_capture: f64,
    pub is_locked: bool,

    pub prev_position: u32,
    pub prev_capture: f64,

    pub steps_modified: bool,
    pub lephon_active: bool,
    pub lephon_final: bool,

    lephon_phase: LephonPhase,
    phase_dirty: bool,
}

impl UserMap {
    /// Read a user's standing on a map, defaulting to `(0, 0, locked)`
    /// for maps never entered. For the lephon boss map the step list is
    /// substituted from the user's current phase file.
    pub fn load<S: WorldStore>(
        store: &S,
        catalog: &MapCatalog,
        user: UserId,
        map_id: &str,
    ) -> Result<Self, WorldError> {
        let map = catalog.descriptor(map_id)?;

        let row = store
            .map_progress(user, map_id)?
            .unwrap_or_else(MapProgress::locked);

        let phase = store.lephon_phase(user)?;
        let lephon_final = phase == 3;

        let steps = if map_id == LEPHON_MAP_ID {
            catalog.lephon_phase(phase)?
        } else {
            Arc::new(map.steps.clone())
        };

        let position = row.curr_position.min(steps.len().saturating_sub(1) as u32);

        Ok(Self {
            map,
            map_id: map_id.to_owned(),
            user_id: user,
            steps,
            curr_position: position,
            curr_capture: row.curr_capture as f64,
            is_locked: row.is_locked,
            prev_position: position,
            prev_capture: row.curr_capture as f64,
            steps_modified: false,
            lephon_active: lephon_final,
            lephon_final,
            lephon_phase: phase,
            phase_dirty: false,
        })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn lephon_phase(&self) -> LephonPhase {
        self.lephon_phase
    }

    /// Whether the climb advanced the lephon phase; the new phase must be
    /// persisted with the rest of the play.
    pub fn phase_dirty(&self) -> bool {
        self.phase_dirty
    }

    pub fn at_final_step(&self) -> bool {
        self.curr_position as usize == self.step_count() - 1
    }

    fn current_step(&self) -> &Step {
        &self.steps[self.curr_position as usize]
    }

    /// The persistable row; capture is floored.
    pub fn progress_row(&self) -> MapProgress {
        MapProgress {
            curr_position: self.curr_position,
            curr_capture: self.curr_capture.floor() as i64,
            is_locked: self.is_locked,
        }
    }

    /// Try to unlock the map for the user. Covers only the item-ownership
    /// gate (`require_type` pack/single); the structured `requires`
    /// prerequisites are the caller's concern. Persists the outcome.
    pub fn unlock<S: WorldStore>(&mut self, store: &S) -> Result<bool, WorldError> {
        if self.is_locked {
            self.is_locked = false;
            self.curr_position = 0;
            self.curr_capture = 0.0;

            if matches!(self.map.require_type.as_str(), "pack" | "single") {
                let owned =
                    store.owned_amount(self.user_id, &self.map.require_type, &self.map.require_id)?;
                if owned <= 0 {
                    self.is_locked = true;
                }
            }

            let mut writer = store.start_writer()?;
            writer.put_map_progress(self.user_id, &self.map_id, &self.progress_row())?;
            writer.commit()?;
        }

        Ok(!self.is_locked)
    }

    /// Advance along the map consuming `step_value` worth of capture.
    ///
    /// The lephon phase machine, wall handling and teleports run first;
    /// beyond maps accumulate into the shared health pool; normal maps
    /// walk tile by tile, blocked by `wall_impossible` and (outside an
    /// active nell encounter) `wall_nell`.
    pub fn climb(
        &mut self,
        catalog: &MapCatalog,
        step_value: f64,
        play: &PlayResult,
    ) -> Result<(), WorldError> {
        if self.is_locked {
            return Err(WorldError::MapLocked);
        }
        if self.map.is_beyond && step_value < 0.0 {
            return Err(WorldError::input(
                "step value must be non-negative on beyond maps",
            ));
        }

        let mut step_value = step_value;
        let is_lephon = self.map_id == LEPHON_MAP_ID;
        self.lephon_active = false;

        if is_lephon {
            self.advance_lephon_phase(catalog)?;

            let cur = self.current_step();
            self.lephon_active = !self.lephon_final
                && (cur.has_tag(StepTag::WallNell) || cur.has_tag(StepTag::WallImpossible));
        }

        self.prev_position = self.curr_position;
        self.prev_capture = self.curr_capture;

        // wall handling on the tile we stand on
        let cur = self.current_step().clone();
        if !cur.step_type.is_empty() {
            if !self.lephon_final && self.lephon_active {
                if play.nell_toggle {
                    self.nell_jump();
                    return Ok(());
                }
                step_value = 0.0;
            }
            if !self.lephon_final && cur.has_tag(StepTag::WallImpossible) {
                step_value = 0.0;
            }
            if self.lephon_final && cur.has_tag(StepTag::SpecialLamentRain) {
                step_value = 0.0;
            }
        }

        if is_lephon {
            let teleport = match self.lephon_phase {
                1 => Some(44),
                2 => Some(200),
                3 if self.prev_position == 200 => Some(65),
                _ => None,
            };

            if let Some(position) = teleport {
                debug!(phase = self.lephon_phase, position, "lephon teleport");
                self.curr_position = (position as u32).min(self.step_count() as u32 - 1);
                self.curr_capture = 1.0;
                self.prev_position = self.curr_position;
                self.prev_capture = self.curr_capture;
                return Ok(());
            }

            if self.lephon_final && play.clear_type == 0 {
                self.lephon_recoil();
                return Ok(());
            }
        }

        if self.map.is_beyond {
            self.climb_beyond(step_value);
        } else {
            self.climb_normal(step_value);
        }

        Ok(())
    }

    /// Restore the pre-climb standing and re-run the climb; skills that
    /// change the progress mid-pipeline go through here.
    pub fn reclimb(
        &mut self,
        catalog: &MapCatalog,
        step_value: f64,
        play: &PlayResult,
    ) -> Result<(), WorldError> {
        self.curr_position = self.prev_position;
        self.curr_capture = self.prev_capture;
        self.climb(catalog, step_value, play)
    }

    /// The phase machine operates on the phase at entry: 0 advances only
    /// off a `wall_impossible` tile, 1 and 2 always advance, 3 is final.
    fn advance_lephon_phase(&mut self, catalog: &MapCatalog) -> Result<(), WorldError> {
        let entry = self.lephon_phase;

        let next = match entry {
            0 if self.current_step().has_tag(StepTag::WallImpossible) => 1,
            1 => 2,
            2 => 3,
            other => other,
        };

        if next != entry {
            self.lephon_phase = next;
            self.phase_dirty = true;
            self.steps = catalog.lephon_phase(next)?;
            self.steps_modified = true;
            self.curr_position = self
                .curr_position
                .min(self.step_count().saturating_sub(1) as u32);
        }

        Ok(())
    }

    /// Jump forward at most four tiles, stopping short of any
    /// `wall_impossible`; overrunning the map lands on the last tile.
    fn nell_jump(&mut self) {
        let steps = self.steps.clone();
        let mut i = self.curr_position as usize;
        let mut remain = NELL_JUMP_TILES;

        while remain > 0 && i < steps.len() {
            if steps[i].has_tag(StepTag::WallImpossible) {
                break;
            }
            i += 1;
            remain -= 1;
        }

        if i >= steps.len() {
            self.curr_position = steps.len() as u32 - 1;
        } else {
            self.curr_position = i as u32;
        }
        self.curr_capture = 0.0;
    }

    /// Walk back thirteen tiles of accumulated capture, clamped at the
    /// start of the map.
    fn lephon_recoil(&mut self) {
        let steps = self.steps.clone();
        let mut i = self.curr_position as i64;
        let mut j = self.curr_capture;
        let mut remain = LEPHON_RECOIL_TILES;

        while remain > 0 && i >= 0 {
            j -= steps[i as usize].capture as f64;
            i -= 1;
            remain -= 1;
        }

        if i < 0 || j < 0.0 {
            self.curr_position = 0;
            self.curr_capture = 0.0;
        } else {
            self.curr_position = i as u32;
            self.curr_capture = j;
        }
    }

    /// Beyond maps pool capture into a single health bar; the position is
    /// recomputed from the start of the map against the accumulated
    /// total.
    fn climb_beyond(&mut self, step_value: f64) {
        let health = self.map.beyond_health.unwrap_or_default() as f64;
        let total = self.prev_capture + step_value;

        self.curr_capture = total.min(health);

        let steps = &self.steps;
        let mut i = 0usize;
        let mut t = total;
        while i < steps.len() && t > 0.0 {
            let dt = steps[i].capture as f64;
            if dt > t {
                t = 0.0;
            } else {
                t -= dt;
                i += 1;
            }
        }

        self.curr_position = i.min(steps.len() - 1) as u32;
    }

    fn climb_normal(&mut self, step_value: f64) {
        let steps = self.steps.clone();
        let mut i = self.prev_position as usize;
        let mut j = self.prev_capture;
        let mut t = step_value;

        while t > 0.0 && i < steps.len() {
            let step = &steps[i];

            if step.has_tag(StepTag::WallImpossible)
                || (!self.lephon_active && step.has_tag(StepTag::WallNell))
            {
                break;
            }

            let dt = step.capture as f64 - j;
            if dt > t {
                j += t;
                t = 0.0;
            } else {
                t -= dt;
                j = 0.0;
                i += 1;
            }
        }

        if i >= steps.len() {
            self.curr_position = steps.len() as u32 - 1;
            self.curr_capture = 0.0;
        } else {
            self.curr_position = i as u32;
            self.curr_capture = j;
        }
    }

    /// The steps between the pre- and post-climb positions, both ends
    /// included.
    pub fn steps_for_climbing(&self) -> &[Step] {
        let lo = self.prev_position.min(self.curr_position) as usize;
        let hi = self.prev_position.max(self.curr_position) as usize;
        &self.steps[lo..=hi]
    }

    /// Items owed for the climb: every traversed step above the lower
    /// endpoint that carries items.
    pub fn rewards_for_climbing(&self) -> Vec<StepRewards> {
        let lo = self.prev_position.min(self.curr_position) as usize;
        let hi = self.prev_position.max(self.curr_position) as usize;

        self.steps[lo + 1..=hi]
            .iter()
            .filter(|step| !step.items.is_empty())
            .map(|step| StepRewards {
                position: step.position,
                items: step.items.clone(),
            })
            .collect()
    }
}
