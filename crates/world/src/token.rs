//! The play-token gate: reserves a pending play between token issuance
//! and score submission, deducting stamina up front and refunding it when
//! a play is abandoned.

use rand::rngs::SmallRng;
use rand::{Rng as _, RngCore as _, SeedableRng as _};
use tracing::info;

use cadenza_core::{
    CoursePlay, CourseState, Domain, InvasionFlag, PendingPlay, SkillId, Timestamp, UserId,
    WorldError, WorldStore as _, WorldWriter as _,
};

/// Multiplier steps the client may request on a world play.
const STAMINA_MULTIPLY_MAX: i32 = 6;

/// Allowed beyond-boost spends.
const BEYOND_BOOST_USAGE_STEPS: [i32; 3] = [0, 100, 200];

#[derive(Debug, Clone)]
pub struct WorldTokenRequest {
    pub song_id: String,
    pub difficulty: u8,
    pub stamina_multiply: i32,
    pub fragment_multiply: i32,
    pub prog_boost_multiply: i32,
    pub beyond_boost_gauge_use: i32,
    pub skill_id: Option<SkillId>,
    pub is_skill_sealed: bool,
}

#[derive(Debug, Clone)]
pub struct IssuedWorldToken {
    pub token: String,
    pub stamina: i32,
    pub max_stamina_ts: Timestamp,
    pub beyond_boost_gauge: f64,
    pub skill_flag: Option<(SkillId, String)>,
    pub invasion: InvasionFlag,
}

/// A fresh play token from the process CSPRNG.
fn fresh_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A flag string over the `{0,1,2}` alphabet, uniform per character.
fn roll_skill_flag(rng: &mut SmallRng, len: usize) -> String {
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..3u8)))
        .collect()
}

/// Reserve a world play: validate the request against the user's state,
/// deduct stamina, roll skill flags and invasion, and stage the pending
/// play. Any previous unsubmitted reservation is refunded first.
pub fn issue_world_token<D: Domain>(
    domain: &D,
    user: UserId,
    request: WorldTokenRequest,
    now: Timestamp,
) -> Result<IssuedWorldToken, WorldError> {
    let store = domain.store();
    let game = domain.game();

    let mut profile = store
        .profile(user)?
        .ok_or_else(|| WorldError::NoData(format!("user {user}")))?;

    if profile.world_mode_locked_end_ts > now {
        return Err(WorldError::WorldModeLocked(profile.world_mode_locked_end_ts));
    }

    if profile.current_map.is_empty() {
        return Err(WorldError::input("no current map selected"));
    }

    let map = domain.catalog().descriptor(&profile.current_map)?;

    if !map.is_available_at(now) {
        return Err(WorldError::input("the current map is not available"));
    }

    if !(1..=STAMINA_MULTIPLY_MAX).contains(&request.stamina_multiply) {
        return Err(WorldError::input("stamina multiplier out of range"));
    }
    if request.fragment_multiply < 100 {
        return Err(WorldError::input("fragment multiplier out of range"));
    }
    if !BEYOND_BOOST_USAGE_STEPS.contains(&request.beyond_boost_gauge_use) {
        return Err(WorldError::input("beyond boost usage out of range"));
    }
    if request.beyond_boost_gauge_use as f64 > profile.beyond_boost_gauge {
        return Err(WorldError::input("beyond boost gauge too low"));
    }

    let prog_boost_multiply = if request.prog_boost_multiply != 0 && profile.prog_boost > 0 {
        request.prog_boost_multiply
    } else {
        0
    };

    let mut stamina = profile.stamina();
    let mut live = stamina.value_at(now, game);

    // an abandoned reservation gives its stamina back before the new one
    // is charged
    if let Some(previous) = store.pending_play(user)? {
        if previous.stamina_cost > 0 {
            live += previous.stamina_cost;
        }
    }

    let stamina_cost = map.stamina_cost * request.stamina_multiply;
    if live < stamina_cost {
        return Err(WorldError::StaminaShortage);
    }
    stamina.set_at(live - stamina_cost, now, game);
    profile.set_stamina(&stamina);

    let mut rng = SmallRng::from_os_rng();

    let skill_flag = match (request.skill_id, request.is_skill_sealed) {
        (Some(skill), false) => skill
            .flag_len()
            .map(|len| (skill, roll_skill_flag(&mut rng, len))),
        _ => None,
    };

    if let Some((skill, flag)) = &skill_flag {
        info!(user, %skill, flag, "skill flag rolled");
    }

    let invasion = if !map.is_beyond && !map.is_breached {
        let roll: f64 = rng.random();
        if roll < game.invasion_start_odds {
            InvasionFlag::Start
        } else if roll < game.invasion_start_odds + game.invasion_hard_odds {
            InvasionFlag::Hard
        } else {
            InvasionFlag::None
        }
    } else {
        InvasionFlag::None
    };

    let token = fresh_token();

    let pending = PendingPlay {
        token: token.clone(),
        song_id: request.song_id,
        difficulty: request.difficulty,
        map_id: profile.current_map.clone(),
        stamina_multiply: request.stamina_multiply,
        fragment_multiply: request.fragment_multiply,
        prog_boost_multiply,
        beyond_boost_gauge_usage: request.beyond_boost_gauge_use,
        skill_id: request.skill_id,
        is_skill_sealed: request.is_skill_sealed,
        skill_flag: skill_flag.as_ref().map(|(_, flag)| flag.clone()),
        invasion,
        stamina_cost,
        issued_at: now,
        course: None,
    };

    let mut writer = store.start_writer()?;
    writer.put_pending_play(user, &pending)?;
    writer.put_profile(&profile)?;
    writer.commit()?;

    Ok(IssuedWorldToken {
        token,
        stamina: profile.stamina().value_at(now, game),
        max_stamina_ts: profile.max_stamina_ts,
        beyond_boost_gauge: profile.beyond_boost_gauge,
        skill_flag,
        invasion,
    })
}

/// Look up the pending play a submitted token refers to.
pub fn validated_pending<D: Domain>(
    domain: &D,
    user: UserId,
    token: &str,
) -> Result<PendingPlay, WorldError> {
    let pending = domain
        .store()
        .pending_play(user)?
        .ok_or(WorldError::TokenInvalid)?;

    if pending.token != token {
        return Err(WorldError::TokenInvalid);
    }

    Ok(pending)
}

/// Drop an unsubmitted reservation, refunding its stamina.
pub fn abandon_pending<D: Domain>(
    domain: &D,
    user: UserId,
    now: Timestamp,
) -> Result<i32, WorldError> {
    let store = domain.store();
    let game = domain.game();

    let mut profile = store
        .profile(user)?
        .ok_or_else(|| WorldError::NoData(format!("user {user}")))?;

    let Some(pending) = store.pending_play(user)? else {
        return Ok(profile.stamina().value_at(now, game));
    };

    let mut stamina = profile.stamina();
    if pending.stamina_cost > 0 {
        let live = stamina.value_at(now, game);
        stamina.set_at(live + pending.stamina_cost, now, game);
        profile.set_stamina(&stamina);
    }

    let mut writer = store.start_writer()?;
    writer.clear_pending_play(user)?;
    writer.put_profile(&profile)?;
    writer.commit()?;

    Ok(profile.stamina().value_at(now, game))
}

// ------------------------------------------------------------------
// course mode
// ------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CourseTokenRequest {
    pub course_id: Option<String>,
    pub previous_token: Option<String>,
    pub use_course_skip_purchase: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseTokenStatus {
    Created,
    Cleared,
    Failed,
}

impl CourseTokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Cleared => "cleared",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedCourseToken {
    pub token: String,
    pub stamina: i32,
    pub max_stamina_ts: Timestamp,
    pub status: CourseTokenStatus,
}

/// Drive the course token lifecycle: create a run, rotate the token
/// between stages, or read out a finished run.
pub fn issue_course_token<D: Domain>(
    domain: &D,
    user: UserId,
    request: CourseTokenRequest,
    now: Timestamp,
) -> Result<IssuedCourseToken, WorldError> {
    let store = domain.store();
    let game = domain.game();

    let mut profile = store
        .profile(user)?
        .ok_or_else(|| WorldError::NoData(format!("user {user}")))?;

    let pending = store.pending_play(user)?.filter(|p| {
        p.course.is_some()
            && request
                .previous_token
                .as_ref()
                .is_some_and(|prev| *prev == p.token)
    });

    let mut writer = store.start_writer()?;

    let issued = match pending {
        None => {
            // a fresh run
            let course_id = request
                .course_id
                .ok_or_else(|| WorldError::input("course_id is required to start a course"))?;

            let mut stamina = profile.stamina();
            let cost = if request.use_course_skip_purchase {
                0
            } else {
                game.course_stamina_cost
            };

            let live = stamina.value_at(now, game);
            if live < cost {
                return Err(WorldError::StaminaShortage);
            }
            stamina.set_at(live - cost, now, game);
            profile.set_stamina(&stamina);

            let token = fresh_token();
            let fresh = PendingPlay {
                token: token.clone(),
                song_id: String::new(),
                difficulty: 0,
                map_id: String::new(),
                stamina_multiply: 1,
                fragment_multiply: 100,
                prog_boost_multiply: 0,
                beyond_boost_gauge_usage: 0,
                skill_id: None,
                is_skill_sealed: true,
                skill_flag: None,
                invasion: InvasionFlag::None,
                stamina_cost: cost,
                issued_at: now,
                course: Some(CoursePlay {
                    course_id,
                    state: CourseState::Stage(0),
                }),
            };

            writer.put_pending_play(user, &fresh)?;
            writer.put_profile(&profile)?;

            IssuedCourseToken {
                token,
                stamina: profile.stamina().value_at(now, game),
                max_stamina_ts: profile.max_stamina_ts,
                status: CourseTokenStatus::Created,
            }
        }

        Some(mut run) => match run.course.as_ref().map(|c| c.state) {
            Some(CourseState::Stage(_)) => {
                // rotate the token for the next stage
                run.token = fresh_token();
                writer.put_pending_play(user, &run)?;

                IssuedCourseToken {
                    token: run.token,
                    stamina: profile.stamina().value_at(now, game),
                    max_stamina_ts: profile.max_stamina_ts,
                    status: CourseTokenStatus::Created,
                }
            }
            Some(CourseState::Cleared) | Some(CourseState::Failed) => {
                let status = if matches!(
                    run.course.as_ref().map(|c| c.state),
                    Some(CourseState::Cleared)
                ) {
                    CourseTokenStatus::Cleared
                } else {
                    CourseTokenStatus::Failed
                };

                writer.clear_pending_play(user)?;

                IssuedCourseToken {
                    token: run.token,
                    stamina: profile.stamina().value_at(now, game),
                    max_stamina_ts: profile.max_stamina_ts,
                    status,
                }
            }
            None => return Err(WorldError::TokenInvalid),
        },
    };

    writer.commit()?;

    Ok(issued)
}

/// Advance a course run with one stage's result. A lost track fails the
/// run; clearing the fourth stage clears it.
pub fn settle_course_play<D: Domain>(
    domain: &D,
    user: UserId,
    mut pending: PendingPlay,
    clear_type: i32,
) -> Result<CourseState, WorldError> {
    let Some(course) = pending.course.as_mut() else {
        return Err(WorldError::TokenInvalid);
    };

    course.state = match course.state {
        CourseState::Stage(stage) => {
            if clear_type == 0 {
                CourseState::Failed
            } else if stage >= 3 {
                CourseState::Cleared
            } else {
                CourseState::Stage(stage + 1)
            }
        }
        finished => finished,
    };

    let state = course.state;

    let mut writer = domain.store().start_writer()?;
    writer.put_pending_play(user, &pending)?;
    writer.commit()?;

    Ok(state)
}
