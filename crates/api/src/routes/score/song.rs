use axum::{
    extract::{Query, State},
    Form, Json,
};
use serde::Deserialize;

use cadenza_core::{now_ms, CourseState, Domain, PlayResult};
use cadenza_world::{settle_course_play, validated_pending, WorldPlay};

use crate::auth::AuthUser;
use crate::error::{success, Error};
use crate::Facade;

#[derive(Deserialize)]
pub struct SongQuery {
    #[serde(default)]
    pub nell_toggle: bool,
}

#[derive(Deserialize)]
pub struct SongForm {
    pub song_token: String,
    pub song_hash: String,
    pub song_id: String,
    pub difficulty: u8,
    pub score: i64,
    pub shiny_perfect_count: i32,
    pub perfect_count: i32,
    pub near_count: i32,
    pub miss_count: i32,
    pub health: i32,
    pub modifier: i32,
    pub clear_type: i32,
    pub beyond_gauge: i32,
    pub submission_hash: String,

    #[serde(default)]
    pub combo_interval_bonus: Option<i32>,
    #[serde(default)]
    pub hp_interval_bonus: Option<i32>,
    #[serde(default)]
    pub fever_bonus: Option<i32>,
    #[serde(default)]
    pub highest_health: Option<i32>,
    #[serde(default)]
    pub lowest_health: Option<i32>,
}

pub async fn route<D: Domain>(
    State(domain): State<Facade<D>>,
    AuthUser(user): AuthUser,
    Query(query): Query<SongQuery>,
    Form(form): Form<SongForm>,
) -> Result<Json<serde_json::Value>, Error> {
    let now = now_ms();
    let pending = validated_pending(&domain.inner, user, &form.song_token)?;

    // a course token advances its run instead of settling a world play
    if pending.course.is_some() {
        let state = settle_course_play(&domain.inner, user, pending, form.clear_type)?;

        let stage = match state {
            CourseState::Stage(stage) => serde_json::json!(stage),
            CourseState::Cleared => serde_json::json!("cleared"),
            CourseState::Failed => serde_json::json!("failed"),
        };

        return Ok(success(serde_json::json!({ "course_state": stage })));
    }

    let rating = domain
        .charts
        .play_rating(&form.song_id, form.difficulty, form.score);

    let play = PlayResult {
        song_id: form.song_id,
        difficulty: form.difficulty,
        rating,
        score: form.score,
        shiny_perfect_count: form.shiny_perfect_count,
        perfect_count: form.perfect_count,
        near_count: form.near_count,
        miss_count: form.miss_count,
        health: form.health,
        clear_type: form.clear_type,
        beyond_gauge: form.beyond_gauge,
        combo_interval_bonus: form.combo_interval_bonus,
        hp_interval_bonus: form.hp_interval_bonus,
        fever_bonus: form.fever_bonus,
        highest_health: form.highest_health,
        lowest_health: form.lowest_health,
        nell_toggle: query.nell_toggle,
    };

    let outcome = WorldPlay::new(&domain.inner, user, pending, play, now)?.update()?;

    let value = serde_json::to_value(&outcome)
        .map_err(|e| cadenza_core::WorldError::input(e.to_string()))?;

    Ok(success(value))
}
