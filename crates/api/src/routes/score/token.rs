use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use cadenza_core::{now_ms, Domain, InvasionFlag, SkillId, STAT_VALUE_NAMES};
use cadenza_world::{issue_course_token, issue_world_token, CourseTokenRequest, WorldTokenRequest};

use crate::auth::AuthUser;
use crate::error::{success, Error};
use crate::Facade;

/// Non-world plays carry a fixed token; nothing is reserved for them.
pub async fn route<D: Domain>(
    State(_domain): State<Facade<D>>,
) -> Json<serde_json::Value> {
    success(serde_json::json!({ "token": "1145141919810" }))
}

fn default_stamina_multiply() -> i32 {
    1
}

fn default_fragment_multiply() -> i32 {
    100
}

#[derive(Deserialize)]
pub struct WorldTokenQuery {
    pub song_id: String,
    pub difficulty: u8,

    #[serde(default = "default_stamina_multiply")]
    pub stamina_multiply: i32,
    #[serde(default = "default_fragment_multiply")]
    pub fragment_multiply: i32,
    #[serde(default)]
    pub prog_boost_multiply: i32,
    #[serde(default)]
    pub beyond_boost_gauge_use: i32,

    #[serde(default)]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub is_skill_sealed: bool,
}

pub async fn world<D: Domain>(
    State(domain): State<Facade<D>>,
    AuthUser(user): AuthUser,
    Query(query): Query<WorldTokenQuery>,
) -> Result<Json<serde_json::Value>, Error> {
    let skill_id = match query.skill_id.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<SkillId>()?),
    };

    let request = WorldTokenRequest {
        song_id: query.song_id,
        difficulty: query.difficulty,
        stamina_multiply: query.stamina_multiply,
        fragment_multiply: query.fragment_multiply,
        prog_boost_multiply: query.prog_boost_multiply,
        beyond_boost_gauge_use: query.beyond_boost_gauge_use,
        skill_id,
        is_skill_sealed: query.is_skill_sealed,
    };

    let issued = issue_world_token(&domain.inner, user, request, now_ms())?;

    let mut play_parameters = serde_json::Map::new();

    if let Some((skill, flag)) = &issued.skill_flag {
        let names: Vec<_> = flag
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(|digit| STAT_VALUE_NAMES[digit as usize])
            .collect();
        play_parameters.insert(skill.to_string(), serde_json::json!(names));
    }

    match issued.invasion {
        InvasionFlag::Start => {
            play_parameters.insert("invasion_start".into(), serde_json::json!(true));
        }
        InvasionFlag::Hard => {
            play_parameters.insert("invasion_hard".into(), serde_json::json!(true));
        }
        InvasionFlag::None => {}
    }

    Ok(success(serde_json::json!({
        "stamina": issued.stamina,
        "max_stamina_ts": issued.max_stamina_ts,
        "token": issued.token,
        "beyond_boost_gauge": issued.beyond_boost_gauge,
        "play_parameters": play_parameters,
    })))
}

#[derive(Deserialize)]
pub struct CourseTokenQuery {
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub previous_token: Option<String>,
    #[serde(default)]
    pub use_course_skip_purchase: bool,
}

pub async fn course<D: Domain>(
    State(domain): State<Facade<D>>,
    AuthUser(user): AuthUser,
    Query(query): Query<CourseTokenQuery>,
) -> Result<Json<serde_json::Value>, Error> {
    let request = CourseTokenRequest {
        course_id: query.course_id,
        previous_token: query.previous_token,
        use_course_skip_purchase: query.use_course_skip_purchase,
    };

    let issued = issue_course_token(&domain.inner, user, request, now_ms())?;

    Ok(success(serde_json::json!({
        "stamina": issued.stamina,
        "max_stamina_ts": issued.max_stamina_ts,
        "token": issued.token,
        "status": issued.status.as_str(),
    })))
}
