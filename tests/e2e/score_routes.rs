//! The score routes end to end: axum router, auth header, envelopes.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt as _;
use tower::ServiceExt as _;

use cadenza_api::{router, ChartIndex, Facade};
use cadenza_testing::{uniform_map, TestDomain, TestDomainBuilder};

fn app(domain: TestDomain) -> axum::Router {
    router(Facade {
        inner: domain,
        charts: Arc::new(ChartIndex::default()),
    })
}

fn seeded_domain() -> TestDomain {
    // invasions off so the acting partner is deterministic
    let game = cadenza_core::GameConfig {
        invasion_start_odds: 0.0,
        invasion_hard_odds: 0.0,
        ..Default::default()
    };

    let domain = TestDomainBuilder::new()
        .map("ascent", uniform_map(5, 10))
        .game(game)
        .build();
    domain.seed_player(1, "ascent", None);
    domain
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn world_token_requires_auth() {
    let app = app(seeded_domain());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/score/token/world?song_id=fixturesong&difficulty=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_then_submit_round_trip() {
    let domain = seeded_domain();
    let app = app(domain);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/score/token/world?song_id=fixturesong&difficulty=2")
                .header(header::AUTHORIZATION, "Bearer 1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);

    let token = body["value"]["token"].as_str().unwrap().to_owned();
    assert_eq!(body["value"]["stamina"], 10);

    let form = format!(
        "song_token={token}&song_hash=h&song_id=fixturesong&difficulty=2\
         &score=9950000&shiny_perfect_count=900&perfect_count=950&near_count=10\
         &miss_count=2&health=100&modifier=0&clear_type=1&beyond_gauge=0\
         &submission_hash=s"
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/score/song")
                .header(header::AUTHORIZATION, "Bearer 1")
                .header(
                    header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);

    // with no chart index the rating is zero, so only the flat base term
    // applies
    let value = &body["value"];
    assert_eq!(value["base_progress"], 2.5);
    assert_eq!(value["user_map"]["curr_position"], 0);
    assert_eq!(value["steps_modified"], false);
}

#[tokio::test]
async fn stale_tokens_are_rejected_with_the_protocol_code() {
    let app = app(seeded_domain());

    let form = "song_token=bogus&song_hash=h&song_id=fixturesong&difficulty=2\
                &score=9950000&shiny_perfect_count=900&perfect_count=950&near_count=10\
                &miss_count=2&health=100&modifier=0&clear_type=1&beyond_gauge=0\
                &submission_hash=s";

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/score/song")
                .header(header::AUTHORIZATION, "Bearer 1")
                .header(
                    header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], 923);
}

#[tokio::test]
async fn course_token_starts_a_run() {
    let app = app(seeded_domain());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/score/token/course?course_id=course_a")
                .header(header::AUTHORIZATION, "Bearer 1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["value"]["status"], "created");
    assert_eq!(body["value"]["stamina"], 8);
}
