//! End-to-end checks of the play pipeline: skill hooks, law overrides,
//! reward distribution and persistence, all against the in-memory store.

use rand::rngs::SmallRng;
use rand::SeedableRng as _;
use serde_json::json;

use cadenza_core::{
    CharacterTable, Domain as _, GameConfig, InvasionFlag, MapProgress, PendingPlay, PlayResult,
    SkillId, Timestamp, UserId, WorldStore as _, INVADER_CHARACTER_ID, TEMPEST_CHARACTER_ID,
};
use cadenza_testing::{
    beyond_map, breached_map, steps_json, test_character, test_pending, test_play, uniform_map,
    TestDomain, TestDomainBuilder,
};
use cadenza_world::{WorldPlay, WorldPlayOutcome};

const NOW: Timestamp = 1_700_000_000_000;
const USER: UserId = 1;

fn run(domain: &TestDomain, pending: PendingPlay, play: PlayResult) -> WorldPlayOutcome {
    domain.store().seed_pending(USER, &pending);
    WorldPlay::new(domain, USER, pending, play, NOW)
        .unwrap()
        .update()
        .unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn normal_play_climbs_by_the_base_formula() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", None);

    let outcome = run(&domain, test_pending("alpha", "t"), test_play(9.0));

    // 2.5 + 2.45 * 3, partner prog 50 keeps it unscaled
    assert!(close(outcome.base_progress, 9.85));
    assert!(close(outcome.progress, 9.85));
    assert_eq!(outcome.user_map.curr_position, 0);
    assert!(close(outcome.user_map.curr_capture, 9.85));

    // the persisted row floors the capture
    let row = domain.store().map_progress(USER, "alpha").unwrap().unwrap();
    assert_eq!(row.curr_capture, 9);

    // the token is consumed
    assert!(domain.store().pending_play(USER).unwrap().is_none());
}

#[test]
fn final_progress_is_linear_in_the_multipliers() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", None);

    let mut pending = test_pending("alpha", "t");
    pending.stamina_multiply = 2;

    let outcome = run(&domain, pending, test_play(9.0));
    assert!(close(outcome.progress, 19.7));
}

#[test]
fn partner_xp_accrues_on_the_per_user_table() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", None);

    let outcome = run(&domain, test_pending("alpha", "t"), test_play(9.0));

    // exp_times 1, rating 9: 54 xp on top of the seeded 1200
    assert!(close(outcome.exp, 1254.0));

    let stored = domain
        .store()
        .character(USER, 1, CharacterTable::PerUser)
        .unwrap()
        .unwrap();
    assert!(close(stored.exp, 1254.0));
}

#[test]
fn full_unlock_mode_grants_no_xp() {
    let domain = TestDomainBuilder::new()
        .map("alpha", uniform_map(5, 10))
        .game(GameConfig {
            full_unlock: true,
            ..Default::default()
        })
        .build();
    domain.seed_player(USER, "alpha", None);

    let outcome = run(&domain, test_pending("alpha", "t"), test_play(9.0));
    assert!(close(outcome.exp, 1200.0));
}

#[test]
fn sealed_skill_plays_on_flat_stats() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillMaya));

    let mut strong = test_character(1, Some(SkillId::SkillMaya));
    strong.prog = 80.0;
    domain
        .store()
        .seed_character(USER, &strong, CharacterTable::PerUser);

    let mut pending = test_pending("alpha", "t");
    pending.is_skill_sealed = true;

    let outcome = run(&domain, pending, test_play(9.0));

    // prog 80 would give 15.76; sealed pins it back to 50
    assert!(close(outcome.progress, 9.85));

    // and the maya flag did not toggle
    let stored = domain
        .store()
        .character(USER, 1, CharacterTable::PerUser)
        .unwrap()
        .unwrap();
    assert!(!stored.skill_flag);
}

#[test]
fn rewards_flow_into_the_inventory() {
    let body = json!({
        "chapter": 1,
        "stamina_cost": 2,
        "steps": [
            {"position": 0, "capture": 5},
            {"position": 1, "capture": 5, "items": [{"type": "fragment", "amount": 100}]},
            {"position": 2, "capture": 5},
        ],
    });
    let domain = TestDomainBuilder::new().map("alpha", body).build();
    domain.seed_player(USER, "alpha", None);

    let outcome = run(&domain, test_pending("alpha", "t"), test_play(9.0));

    assert_eq!(outcome.rewards.len(), 1);
    assert_eq!(outcome.rewards[0].position, 1);
    assert_eq!(domain.store().owned_amount(USER, "fragment", "").unwrap(), 100);
}

#[test]
fn plusstamina_tile_overfills_the_gauge() {
    let body = json!({
        "chapter": 1,
        "steps": [
            {"position": 0, "capture": 5},
            {"position": 1, "capture": 20, "step_type": ["plusstamina"], "plus_stamina_value": 2},
        ],
    });
    let domain = TestDomainBuilder::new().map("alpha", body).build();
    domain.seed_player(USER, "alpha", None);

    let outcome = run(&domain, test_pending("alpha", "t"), test_play(9.0));

    assert_eq!(outcome.current_stamina, 14);
}

#[test]
fn repeatable_maps_wrap_from_the_last_tile() {
    let body = json!({
        "chapter": 1,
        "is_repeatable": true,
        "steps": steps_json(&[5, 5]),
    });
    let domain = TestDomainBuilder::new().map("loop", body).build();
    domain.seed_player(USER, "loop", None);

    let outcome = run(&domain, test_pending("loop", "t"), test_play(9.0));

    assert_eq!(outcome.user_map.curr_position, 0);
    let row = domain.store().map_progress(USER, "loop").unwrap().unwrap();
    assert_eq!(row.curr_position, 0);
}

#[test]
fn finishing_a_map_bumps_the_chapter_counter() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(2, 5)).build();
    domain.seed_player(USER, "alpha", None);

    run(&domain, test_pending("alpha", "t"), test_play(9.0));

    assert_eq!(
        domain
            .store()
            .counter(USER, "world", "chapter_complete_count.1")
            .unwrap(),
        1
    );
}

// ------------------------------------------------------------------
// beyond and breached modes
// ------------------------------------------------------------------

#[test]
fn beyond_play_uses_overdrive_and_affinity() {
    let body = json!({
        "chapter": 1,
        "is_beyond": true,
        "beyond_health": 100,
        "character_affinity": [1],
        "affinity_multiplier": [2.0],
        "steps": steps_json(&[30, 30, 30]),
    });
    let domain = TestDomainBuilder::new().map("deep", body).build();
    domain.seed_player(USER, "deep", None);

    let mut play = test_play(9.0);
    play.beyond_gauge = 1;

    let outcome = run(&domain, test_pending("deep", "t"), play);

    let base = 0.43 * 3.0 + 75.0 / 28.0;
    assert!(close(outcome.base_progress, base));
    assert!(close(outcome.progress, base * 2.0));
    assert_eq!(outcome.affinity_multiplier, Some(2.0));

    // the boost gauge charges after the climb
    assert!(close(outcome.beyond_boost_gauge, 2.45 * 3.0 + 27.0));
}

#[test]
fn beyond_boost_usage_scales_and_spends_the_gauge() {
    let domain = TestDomainBuilder::new()
        .map("deep", beyond_map(3, 30, 100))
        .build();
    domain.seed_player(USER, "deep", None);

    let mut profile = cadenza_testing::test_profile(USER, "deep");
    profile.beyond_boost_gauge = 150.0;
    domain.store().seed_profile(&profile);

    let mut pending = test_pending("deep", "t");
    pending.beyond_boost_gauge_usage = 100;

    let mut play = test_play(9.0);
    play.beyond_gauge = 1;

    let outcome = run(&domain, pending, play);

    let base = 0.43 * 3.0 + 75.0 / 28.0;
    assert!(close(outcome.progress, base * 2.0));

    // 150 charged to 184.35, minus the 100 spent
    assert!(close(outcome.beyond_boost_gauge, 150.0 + 2.45 * 3.0 + 27.0 - 100.0));
}

#[test]
fn failed_beyond_play_uses_the_lower_clear_term() {
    let domain = TestDomainBuilder::new()
        .map("deep", beyond_map(3, 30, 100))
        .build();
    domain.seed_player(USER, "deep", None);

    let mut play = test_play(9.0);
    play.beyond_gauge = 1;
    play.clear_type = 0;

    let outcome = run(&domain, test_pending("deep", "t"), play);
    assert!(close(outcome.base_progress, 0.43 * 3.0 + 25.0 / 28.0));
}

#[test]
fn breached_law_replaces_prog_and_ignores_affinity() {
    let body = json!({
        "chapter": 1,
        "is_beyond": true,
        "is_breached": true,
        "beyond_health": 100,
        "new_law": "frag50",
        "disable_over": true,
        "character_affinity": [1],
        "affinity_multiplier": [2.0],
        "steps": steps_json(&[30, 30, 30]),
    });
    let domain = TestDomainBuilder::new().map("rift", body).build();
    domain.seed_player(USER, "rift", None);

    let mut character = test_character(1, None);
    character.frag = 77.0;
    domain
        .store()
        .seed_character(USER, &character, CharacterTable::PerUser);

    let mut play = test_play(9.0);
    play.beyond_gauge = 1;

    let outcome = run(&domain, test_pending("rift", "t"), play);

    let base = 0.43 * 3.0 + 75.0 / 28.0;
    assert!(close(outcome.progress, base * (77.0 / 50.0)));
    assert_eq!(outcome.new_law_multiply, Some(77.0 / 50.0));
}

#[test]
fn lowlevel_law_rewards_low_partners() {
    let domain = TestDomainBuilder::new()
        .map("rift", breached_map(3, 30, 100, "lowlevel"))
        .build();
    domain.seed_player(USER, "rift", None);

    let mut character = test_character(1, None);
    character.level = 3;
    domain
        .store()
        .seed_character(USER, &character, CharacterTable::PerUser);

    let mut play = test_play(9.0);
    play.beyond_gauge = 1;

    let outcome = run(&domain, test_pending("rift", "t"), play);

    // 50 * (2 - 0.3) = 85 -> x1.7, overdrive 50 contributes x1
    let base = 0.43 * 3.0 + 75.0 / 28.0;
    assert!(close(outcome.progress, base * 1.7));
}

#[test]
fn antiheroism_law_balances_the_three_stats() {
    let domain = TestDomainBuilder::new()
        .map("rift", breached_map(3, 30, 100, "antiheroism"))
        .build();
    domain.seed_player(USER, "rift", None);

    let mut character = test_character(1, None);
    character.overdrive = 60.0;
    character.frag = 50.0;
    character.prog = 40.0;
    domain
        .store()
        .seed_character(USER, &character, CharacterTable::PerUser);

    let mut play = test_play(9.0);
    play.beyond_gauge = 1;

    let outcome = run(&domain, test_pending("rift", "t"), play);

    // law prog: 60 - ||60-50| - |60-40|| = 50 -> x1; overdrive 60 -> x1.2
    let base = 0.43 * 3.0 + 75.0 / 28.0;
    assert!(close(outcome.progress, base * 1.2));
}

// ------------------------------------------------------------------
// skill pre-hooks
// ------------------------------------------------------------------

#[test]
fn mika_doubles_stats_on_listed_songs() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillMika));

    let mut play = test_play(9.0);
    play.song_id = "overdead".into();

    let outcome = run(&domain, test_pending("alpha", "t"), play);

    // prog 50 + 50 skill increase
    assert!(close(outcome.progress, 9.85 * 2.0));
}

#[test]
fn mithra_adds_the_combo_interval_bonus() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillMithra));

    let mut play = test_play(9.0);
    play.combo_interval_bonus = Some(3);

    let outcome = run(&domain, test_pending("alpha", "t"), play);
    assert!(close(outcome.progress, 9.85 + 3.0));
}

#[test]
fn ilith_ivy_reads_the_flag_by_highest_health() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillIlithIvy));

    let mut pending = test_pending("alpha", "t");
    pending.skill_id = Some(SkillId::SkillIlithIvy);
    pending.skill_flag = Some("12121".into());

    let mut play = test_play(9.0);
    play.highest_health = Some(100);

    let outcome = run(&domain, pending, play);

    // three '1's: prog 50 + 30
    assert!(close(outcome.progress, 9.85 * (80.0 / 50.0)));
    assert_eq!(outcome.char_stats.prog_skill_increase, Some(30.0));
    assert_eq!(outcome.char_stats.over_skill_increase, Some(20.0));
}

#[test]
fn hikari_vanessa_subtracts_by_lowest_health() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillHikariVanessa));

    let mut pending = test_pending("alpha", "t");
    pending.skill_id = Some(SkillId::SkillHikariVanessa);
    pending.skill_flag = Some("11111".into());

    let mut play = test_play(9.0);
    play.lowest_health = Some(60); // keep 5 - 3 = 2 characters

    let outcome = run(&domain, pending, play);
    assert_eq!(outcome.char_stats.prog_skill_increase, Some(-20.0));
}

#[test]
fn salt_scales_with_chapter_completion() {
    let domain = TestDomainBuilder::new()
        .map("alpha", uniform_map(5, 10))
        .map("beta", uniform_map(5, 10))
        .build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillSalt));
    domain
        .store()
        .seed_counter(USER, "world", "chapter_complete_count.1", 1);

    let outcome = run(&domain, test_pending("alpha", "t"), test_play(9.0));

    // one of two chapter maps complete: +5
    assert!(close(outcome.progress, 9.85 + 5.0));
}

#[test]
fn hikari_selene_grants_two_per_bar() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillHikariSelene));

    let mut play = test_play(9.0);
    play.health = 95;

    let outcome = run(&domain, test_pending("alpha", "t"), play);

    assert_eq!(outcome.char_stats.prog_skill_increase, Some(18.0));
    assert!(close(outcome.progress, 9.85 * (68.0 / 50.0)));
}

#[test]
fn nami_sui_converts_the_fever_bonus() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillNamiSui));

    let mut play = test_play(9.0);
    play.fever_bonus = Some(1500);

    let outcome = run(&domain, test_pending("alpha", "t"), play);
    assert!(close(outcome.progress, 9.85 + 1.5));
}

#[test]
fn ilith_awakened_adds_six_prog_on_survival() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", Some(SkillId::IlithAwakenedSkill));

    let outcome = run(&domain, test_pending("alpha", "t"), test_play(9.0));
    assert!(close(outcome.progress, 9.85 * (56.0 / 50.0)));
}

#[test]
fn vita_raises_overdrive_on_beyond_plays() {
    let domain = TestDomainBuilder::new()
        .map("deep", beyond_map(3, 30, 100))
        .build();
    domain.seed_player(USER, "deep", Some(SkillId::SkillVita));

    let mut play = test_play(9.0);
    play.beyond_gauge = 1;
    play.health = 80;

    let outcome = run(&domain, test_pending("deep", "t"), play);

    let base = 0.43 * 3.0 + 75.0 / 28.0;
    assert!(close(outcome.progress, base * (58.0 / 50.0)));
    assert_eq!(outcome.char_stats.over_skill_increase, Some(8.0));
}

#[test]
fn tempest_rides_along_with_partner_35() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", None);

    let mut profile = cadenza_testing::test_profile(USER, "alpha");
    profile.character_id = TEMPEST_CHARACTER_ID;
    domain.store().seed_profile(&profile);

    let tempest = test_character(TEMPEST_CHARACTER_ID, Some(SkillId::SkillFatalis));
    domain
        .store()
        .seed_character(USER, &tempest, CharacterTable::PerUser);

    // roster: partner 1 at level 10 and partner 35 at level 10
    let outcome = run(&domain, test_pending("alpha", "t"), test_play(9.0));

    // 20 levels total -> +2 prog
    assert_eq!(outcome.char_stats.prog_tempest, Some(2.0));
    assert!(close(outcome.progress, 9.85 * (52.0 / 50.0)));

    // and fatalis overloads world mode afterwards
    let stored = domain.store().profile(USER).unwrap().unwrap();
    assert_eq!(stored.world_mode_locked_end_ts, NOW + 3_600_000);
}

// ------------------------------------------------------------------
// skill post-hooks
// ------------------------------------------------------------------

#[test]
fn eto_uncap_rewards_fragment_pickups() {
    let body = json!({
        "chapter": 1,
        "steps": [
            {"position": 0, "capture": 5},
            {"position": 1, "capture": 30, "items": [{"type": "fragment", "amount": 100}]},
        ],
    });
    let domain = TestDomainBuilder::new().map("alpha", body).build();
    domain.seed_player(USER, "alpha", Some(SkillId::EtoUncap));

    let outcome = run(&domain, test_pending("alpha", "t"), test_play(9.0));

    // the first climb crosses into tile 1, so the fragment grants +7
    assert!(close(outcome.progress, 9.85 + 7.0));
}

#[test]
fn luna_uncap_rewards_restricted_starts() {
    let body = json!({
        "chapter": 1,
        "steps": [
            {"position": 0, "capture": 30, "restrict_type": "song_id", "restrict_id": "somechart"},
            {"position": 1, "capture": 30},
        ],
    });
    let domain = TestDomainBuilder::new().map("alpha", body).build();
    domain.seed_player(USER, "alpha", Some(SkillId::LunaUncap));

    let outcome = run(&domain, test_pending("alpha", "t"), test_play(9.0));
    assert!(close(outcome.progress, 9.85 + 7.0));
}

#[test]
fn ayu_uncap_never_drives_progress_negative() {
    for seed in 0..20 {
        let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
        domain.seed_player(USER, "alpha", Some(SkillId::AyuUncap));

        let pending = test_pending("alpha", "t");
        domain.store().seed_pending(USER, &pending);

        let outcome = WorldPlay::new(&domain, USER, pending, test_play(0.0), NOW)
            .unwrap()
            .with_rng(SmallRng::seed_from_u64(seed))
            .update()
            .unwrap();

        // base 2.5; the roll is clamped so the total stays non-negative
        assert!(outcome.progress >= -1e-9);
        assert!(outcome.progress <= 7.5 + 1e-9);
    }
}

#[test]
fn amane_halves_weak_scores_on_gated_tiles() {
    let body = json!({
        "chapter": 1,
        "steps": [
            {"position": 0, "capture": 30, "step_type": ["randomsong"]},
            {"position": 1, "capture": 30},
        ],
    });
    let domain = TestDomainBuilder::new().map("alpha", body).build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillAmane));

    let mut play = test_play(9.0);
    play.score = 9_000_000; // below EX

    let outcome = run(&domain, test_pending("alpha", "t"), play);
    assert!(close(outcome.progress, 9.85 / 2.0));
}

#[test]
fn amane_spares_ex_scores() {
    let body = json!({
        "chapter": 1,
        "steps": [
            {"position": 0, "capture": 30, "step_type": ["speedlimit"]},
            {"position": 1, "capture": 30},
        ],
    });
    let domain = TestDomainBuilder::new().map("alpha", body).build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillAmane));

    let outcome = run(&domain, test_pending("alpha", "t"), test_play(9.0));
    assert!(close(outcome.progress, 9.85));
}

#[test]
fn maya_doubles_every_other_play() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(8, 10)).build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillMaya));

    let first = run(&domain, test_pending("alpha", "t1"), test_play(9.0));
    assert!(close(first.progress, 9.85));

    // the flag is reported after the toggle
    assert_eq!(first.char_stats.skill_state, Some(true));

    let stored = domain
        .store()
        .character(USER, 1, CharacterTable::PerUser)
        .unwrap()
        .unwrap();
    assert!(stored.skill_flag);

    let second = run(&domain, test_pending("alpha", "t2"), test_play(9.0));
    assert!(close(second.progress, 9.85 * 2.0));
    assert_eq!(second.char_stats.skill_state, Some(false));

    let stored = domain
        .store()
        .character(USER, 1, CharacterTable::PerUser)
        .unwrap()
        .unwrap();
    assert!(!stored.skill_flag);
}

#[test]
fn kanae_banks_progress_and_releases_it_later() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillKanaeUncap));

    let banked = run(&domain, test_pending("alpha", "t1"), test_play(9.0));

    // everything went into storage, nothing moved
    assert!(close(banked.progress, 0.0));
    assert!(close(banked.kanae_stored_progress.unwrap(), 9.85));
    assert_eq!(banked.user_map.curr_position, 0);
    assert!(close(banked.user_map.curr_capture, 0.0));

    let profile = domain.store().profile(USER).unwrap().unwrap();
    assert!(close(profile.kanae_stored_prog, 9.85));

    // the next play, without the skill, releases the stored progress
    let plain = test_character(1, None);
    domain
        .store()
        .seed_character(USER, &plain, CharacterTable::PerUser);

    let released = run(&domain, test_pending("alpha", "t2"), test_play(9.0));
    assert!(close(released.progress, 9.85 * 2.0));
    assert!(close(released.kanae_added_progress.unwrap(), 9.85));

    let profile = domain.store().profile(USER).unwrap().unwrap();
    assert!(close(profile.kanae_stored_prog, 0.0));
}

#[test]
fn eto_hoppe_doubles_with_six_stamina() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", Some(SkillId::SkillEtoHoppe));

    let outcome = run(&domain, test_pending("alpha", "t"), test_play(9.0));
    assert!(close(outcome.progress, 9.85 * 2.0));
}

#[test]
fn invasion_substitutes_the_intruder() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", None);

    let invader = test_character(INVADER_CHARACTER_ID, Some(SkillId::SkillIntruder));
    domain
        .store()
        .seed_character(USER, &invader, CharacterTable::PerUser);

    let mut pending = test_pending("alpha", "t");
    pending.invasion = InvasionFlag::Start;

    let outcome = run(&domain, pending, test_play(9.0));

    assert_eq!(outcome.char_stats.character_id, INVADER_CHARACTER_ID);
    assert!(close(outcome.progress, 9.85 * 2.0));
}

// ------------------------------------------------------------------
// lephon through the pipeline
// ------------------------------------------------------------------

#[test]
fn lephon_phase_change_is_persisted_with_the_play() {
    let wall_first = json!({
        "steps": [
            {"position": 0, "capture": 1, "step_type": ["wall_impossible"]},
            {"position": 1, "capture": 1},
        ],
    });
    let phase = |count: usize| json!({ "steps": steps_json(&vec![1; count]) });

    let domain = TestDomainBuilder::new()
        .map(
            "lephon_nell",
            json!({"chapter": 9, "steps": steps_json(&[1, 1])}),
        )
        .lephon_phases([wall_first, phase(50), phase(201), phase(210)])
        .build();
    domain.seed_player(USER, "lephon_nell", None);

    let outcome = run(&domain, test_pending("lephon_nell", "t"), test_play(9.0));

    assert!(outcome.steps_modified);
    assert_eq!(outcome.user_map.curr_position, 44);
    assert!(outcome.steps.is_some());
    assert_eq!(domain.store().lephon_phase(USER).unwrap(), 1);
}

#[test]
fn locked_map_rejects_the_whole_play() {
    let domain = TestDomainBuilder::new().map("alpha", uniform_map(5, 10)).build();
    domain.seed_player(USER, "alpha", None);
    domain
        .store()
        .seed_map_progress(USER, "alpha", MapProgress::locked());

    let pending = test_pending("alpha", "t");
    domain.store().seed_pending(USER, &pending);

    let err = WorldPlay::new(&domain, USER, pending, test_play(9.0), NOW)
        .unwrap()
        .update()
        .unwrap_err();

    assert!(matches!(err, cadenza_core::WorldError::MapLocked));

    // nothing was persisted: the pending play survives
    assert!(domain.store().pending_play(USER).unwrap().is_some());
}
