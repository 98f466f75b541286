//! Test doubles and fixtures shared across the cadenza crates: an
//! in-memory [`WorldStore`], a [`Domain`] wired to throwaway content
//! directories, and builders for the common fixture values.

use std::sync::Arc;

use cadenza_core::{
    CharacterState, ContentConfig, Domain, GameConfig, MapCatalog, PlayResult, SkillId, UserId,
    UserProfile,
};

pub mod fixtures;
pub mod memory;

pub use fixtures::*;
pub use memory::MemoryStore;

/// A [`Domain`] over the in-memory store and a temp content directory.
#[derive(Clone)]
pub struct TestDomain {
    store: MemoryStore,
    catalog: Arc<MapCatalog>,
    game: Arc<GameConfig>,
    _content: Arc<tempfile::TempDir>,
}

impl Domain for TestDomain {
    type Store = MemoryStore;

    fn store(&self) -> &Self::Store {
        &self.store
    }

    fn catalog(&self) -> &MapCatalog {
        &self.catalog
    }

    fn game(&self) -> &GameConfig {
        &self.game
    }
}

#[derive(Default)]
pub struct TestDomainBuilder {
    maps: Vec<(String, serde_json::Value)>,
    lephon_phases: Option<[serde_json::Value; 4]>,
    game: Option<GameConfig>,
}

impl TestDomainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(mut self, map_id: &str, body: serde_json::Value) -> Self {
        self.maps.push((map_id.to_owned(), body));
        self
    }

    pub fn lephon_phases(mut self, phases: [serde_json::Value; 4]) -> Self {
        self.lephon_phases = Some(phases);
        self
    }

    pub fn game(mut self, game: GameConfig) -> Self {
        self.game = Some(game);
        self
    }

    pub fn build(self) -> TestDomain {
        let content = tempfile::tempdir().expect("temp content dir");

        let maps_path = content.path().join("maps");
        let lephon_path = content.path().join("lephon");
        std::fs::create_dir_all(&maps_path).expect("maps dir");
        std::fs::create_dir_all(&lephon_path).expect("lephon dir");

        for (map_id, body) in &self.maps {
            std::fs::write(maps_path.join(format!("{map_id}.json")), body.to_string())
                .expect("map fixture");
        }

        if let Some(phases) = &self.lephon_phases {
            for (phase, body) in phases.iter().enumerate() {
                std::fs::write(
                    lephon_path.join(format!("{}.json", phase + 1)),
                    body.to_string(),
                )
                .expect("lephon fixture");
            }
        }

        let catalog = MapCatalog::open(ContentConfig {
            maps_path,
            lephon_path,
            charts_path: None,
        })
        .expect("catalog over fixtures");

        TestDomain {
            store: MemoryStore::default(),
            catalog: Arc::new(catalog),
            game: Arc::new(self.game.unwrap_or_default()),
            _content: Arc::new(content),
        }
    }
}

impl TestDomain {
    /// Seed a ready-to-play user: full stamina, an unlocked current map
    /// and a plain level-10 partner.
    pub fn seed_player(&self, user: UserId, map_id: &str, skill: Option<SkillId>) {
        let profile = test_profile(user, map_id);
        let character = test_character(profile.character_id, skill);

        self.store.seed_profile(&profile);
        self.store.seed_character(
            user,
            &character,
            cadenza_core::CharacterTable::PerUser,
        );
        self.store.seed_character(
            user,
            &character,
            cadenza_core::CharacterTable::FullUnlock,
        );
        self.store.seed_map_progress(
            user,
            map_id,
            cadenza_core::MapProgress {
                curr_position: 0,
                curr_capture: 0,
                is_locked: false,
            },
        );
    }
}

/// A profile with full stamina and nothing pending.
pub fn test_profile(user: UserId, map_id: &str) -> UserProfile {
    UserProfile {
        user_id: user,
        character_id: 1,
        current_map: map_id.to_owned(),
        max_stamina_ts: 0,
        stamina: 12,
        beyond_boost_gauge: 0.0,
        world_mode_locked_end_ts: 0,
        kanae_stored_prog: 0.0,
        prog_boost: 0,
    }
}

/// A neutral partner: every stat at 50 so the progress formulas collapse
/// to their base values.
pub fn test_character(id: cadenza_core::CharacterId, skill: Option<SkillId>) -> CharacterState {
    CharacterState {
        character_id: id,
        level: 10,
        max_level: 20,
        exp: 1200.0,
        frag: 50.0,
        prog: 50.0,
        overdrive: 50.0,
        skill_id: skill,
        skill_id_uncap: None,
        is_uncapped: false,
        skill_flag: false,
    }
}

/// A cleared play at the given rating: full recollection, EX+ score.
pub fn test_play(rating: f64) -> PlayResult {
    PlayResult {
        song_id: "fixturesong".into(),
        difficulty: 2,
        rating,
        score: 9_950_000,
        shiny_perfect_count: 900,
        perfect_count: 950,
        near_count: 10,
        miss_count: 2,
        health: 100,
        clear_type: 1,
        beyond_gauge: 0,
        combo_interval_bonus: None,
        hp_interval_bonus: None,
        fever_bonus: None,
        highest_health: None,
        lowest_health: None,
        nell_toggle: false,
    }
}

/// A pending world play with default multipliers and no skill state.
pub fn test_pending(map_id: &str, token: &str) -> cadenza_core::PendingPlay {
    cadenza_core::PendingPlay {
        token: token.to_owned(),
        song_id: "fixturesong".into(),
        difficulty: 2,
        map_id: map_id.to_owned(),
        stamina_multiply: 1,
        fragment_multiply: 100,
        prog_boost_multiply: 0,
        beyond_boost_gauge_usage: 0,
        skill_id: None,
        is_skill_sealed: false,
        skill_flag: None,
        invasion: cadenza_core::InvasionFlag::None,
        stamina_cost: 0,
        issued_at: 0,
        course: None,
    }
}
