//! Full-stack world play over the persistent store: reserve a token,
//! submit a result, and check every side effect landed.

use std::sync::Arc;

use cadenza::adapters::{StoreAdapter, WorldDomain};
use cadenza_core::{
    ContentConfig, Domain as _, GameConfig, MapCatalog, MapProgress, Timestamp, UserId,
    WorldStore as _, WorldWriter as _,
};
use cadenza_testing::{test_character, test_play, test_profile, uniform_map};
use cadenza_world::{issue_world_token, validated_pending, WorldPlay, WorldTokenRequest};

const NOW: Timestamp = 1_700_000_000_000;
const USER: UserId = 42;

fn build_domain(content: &tempfile::TempDir) -> WorldDomain {
    let maps_path = content.path().join("maps");
    let lephon_path = content.path().join("lephon");
    std::fs::create_dir_all(&maps_path).unwrap();
    std::fs::create_dir_all(&lephon_path).unwrap();

    std::fs::write(
        maps_path.join("ascent.json"),
        uniform_map(5, 10).to_string(),
    )
    .unwrap();

    let catalog = MapCatalog::open(ContentConfig {
        maps_path,
        lephon_path,
        charts_path: None,
    })
    .unwrap();

    let store = StoreAdapter::Redb(cadenza_redb::RedbStore::ephemeral().unwrap());

    // invasions off so the acting partner is deterministic
    let game = GameConfig {
        invasion_start_odds: 0.0,
        invasion_hard_odds: 0.0,
        ..Default::default()
    };

    WorldDomain::new(store, Arc::new(catalog), game)
}

fn seed_player(domain: &WorldDomain) {
    let mut writer = domain.store().start_writer().unwrap();
    writer.put_profile(&test_profile(USER, "ascent")).unwrap();
    writer
        .put_character(
            USER,
            &test_character(1, None),
            cadenza_core::CharacterTable::PerUser,
        )
        .unwrap();
    writer
        .put_map_progress(
            USER,
            "ascent",
            &MapProgress {
                curr_position: 0,
                curr_capture: 0,
                is_locked: false,
            },
        )
        .unwrap();
    writer.commit().unwrap();
}

#[test]
fn reserve_submit_settle() {
    let content = tempfile::tempdir().unwrap();
    let domain = build_domain(&content);
    seed_player(&domain);

    let issued = issue_world_token(
        &domain,
        USER,
        WorldTokenRequest {
            song_id: "fixturesong".into(),
            difficulty: 2,
            stamina_multiply: 1,
            fragment_multiply: 100,
            prog_boost_multiply: 0,
            beyond_boost_gauge_use: 0,
            skill_id: None,
            is_skill_sealed: false,
        },
        NOW,
    )
    .unwrap();

    // the map costs 2 stamina up front
    assert_eq!(issued.stamina, 10);

    let pending = validated_pending(&domain, USER, &issued.token).unwrap();

    let outcome = WorldPlay::new(&domain, USER, pending, test_play(9.0), NOW)
        .unwrap()
        .update()
        .unwrap();

    assert!((outcome.progress - 9.85).abs() < 1e-6);

    // persisted standing matches the outcome, with the capture floored
    let row = domain
        .store()
        .map_progress(USER, "ascent")
        .unwrap()
        .unwrap();
    assert_eq!(row.curr_position, 0);
    assert_eq!(row.curr_capture, 9);

    // the reservation is consumed; a replay of the token is rejected
    assert!(domain.store().pending_play(USER).unwrap().is_none());
    assert!(validated_pending(&domain, USER, &issued.token).is_err());

    // partner XP landed in the same commit
    let character = domain
        .store()
        .character(USER, 1, cadenza_core::CharacterTable::PerUser)
        .unwrap()
        .unwrap();
    assert!((character.exp - 1254.0).abs() < 1e-6);
}

#[test]
fn abandoned_reservation_refunds_stamina() {
    let content = tempfile::tempdir().unwrap();
    let domain = build_domain(&content);
    seed_player(&domain);

    let issued = issue_world_token(
        &domain,
        USER,
        WorldTokenRequest {
            song_id: "fixturesong".into(),
            difficulty: 2,
            stamina_multiply: 2,
            fragment_multiply: 100,
            prog_boost_multiply: 0,
            beyond_boost_gauge_use: 0,
            skill_id: None,
            is_skill_sealed: false,
        },
        NOW,
    )
    .unwrap();
    assert_eq!(issued.stamina, 8);

    let stamina = cadenza_world::abandon_pending(&domain, USER, NOW).unwrap();
    assert_eq!(stamina, 12);
}
