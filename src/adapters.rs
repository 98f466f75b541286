use std::sync::Arc;

use cadenza_core::*;

/// A persistent store picked at startup.
#[derive(Clone)]
#[non_exhaustive]
pub enum StoreAdapter {
    Redb(cadenza_redb::RedbStore),
}

impl WorldStore for StoreAdapter {
    type Writer = WriterAdapter;

    fn profile(&self, user: UserId) -> Result<Option<UserProfile>, StoreError> {
        let out = match self {
            StoreAdapter::Redb(x) => x.profile(user)?,
        };

        Ok(out)
    }

    fn map_progress(&self, user: UserId, map_id: &str) -> Result<Option<MapProgress>, StoreError> {
        let out = match self {
            StoreAdapter::Redb(x) => x.map_progress(user, map_id)?,
        };

        Ok(out)
    }

    fn lephon_phase(&self, user: UserId) -> Result<LephonPhase, StoreError> {
        let out = match self {
            StoreAdapter::Redb(x) => x.lephon_phase(user)?,
        };

        Ok(out)
    }

    fn character(
        &self,
        user: UserId,
        character: CharacterId,
        table: CharacterTable,
    ) -> Result<Option<CharacterState>, StoreError> {
        let out = match self {
            StoreAdapter::Redb(x) => x.character(user, character, table)?,
        };

        Ok(out)
    }

    fn character_level_total(&self, user: UserId) -> Result<u32, StoreError> {
        let out = match self {
            StoreAdapter::Redb(x) => x.character_level_total(user)?,
        };

        Ok(out)
    }

    fn counter(&self, user: UserId, class: &str, key: &str) -> Result<i64, StoreError> {
        let out = match self {
            StoreAdapter::Redb(x) => x.counter(user, class, key)?,
        };

        Ok(out)
    }

    fn owned_amount(&self, user: UserId, kind: &str, id: &str) -> Result<i64, StoreError> {
        let out = match self {
            StoreAdapter::Redb(x) => x.owned_amount(user, kind, id)?,
        };

        Ok(out)
    }

    fn pending_play(&self, user: UserId) -> Result<Option<PendingPlay>, StoreError> {
        let out = match self {
            StoreAdapter::Redb(x) => x.pending_play(user)?,
        };

        Ok(out)
    }

    fn start_writer(&self) -> Result<Self::Writer, StoreError> {
        let out = match self {
            StoreAdapter::Redb(x) => WriterAdapter::Redb(x.start_writer()?),
        };

        Ok(out)
    }
}

#[non_exhaustive]
pub enum WriterAdapter {
    Redb(cadenza_redb::RedbWriter),
}

impl WorldWriter for WriterAdapter {
    fn put_profile(&mut self, profile: &UserProfile) -> Result<(), StoreError> {
        match self {
            WriterAdapter::Redb(x) => x.put_profile(profile),
        }
    }

    fn put_map_progress(
        &mut self,
        user: UserId,
        map_id: &str,
        progress: &MapProgress,
    ) -> Result<(), StoreError> {
        match self {
            WriterAdapter::Redb(x) => x.put_map_progress(user, map_id, progress),
        }
    }

    fn put_lephon_phase(&mut self, user: UserId, phase: LephonPhase) -> Result<(), StoreError> {
        match self {
            WriterAdapter::Redb(x) => x.put_lephon_phase(user, phase),
        }
    }

    fn put_character(
        &mut self,
        user: UserId,
        state: &CharacterState,
        table: CharacterTable,
    ) -> Result<(), StoreError> {
        match self {
            WriterAdapter::Redb(x) => x.put_character(user, state, table),
        }
    }

    fn put_counter(
        &mut self,
        user: UserId,
        class: &str,
        key: &str,
        value: i64,
    ) -> Result<(), StoreError> {
        match self {
            WriterAdapter::Redb(x) => x.put_counter(user, class, key, value),
        }
    }

    fn grant_item(&mut self, user: UserId, item: &RewardItem) -> Result<(), StoreError> {
        match self {
            WriterAdapter::Redb(x) => x.grant_item(user, item),
        }
    }

    fn put_pending_play(&mut self, user: UserId, pending: &PendingPlay) -> Result<(), StoreError> {
        match self {
            WriterAdapter::Redb(x) => x.put_pending_play(user, pending),
        }
    }

    fn clear_pending_play(&mut self, user: UserId) -> Result<(), StoreError> {
        match self {
            WriterAdapter::Redb(x) => x.clear_pending_play(user),
        }
    }

    fn commit(self) -> Result<(), StoreError> {
        match self {
            WriterAdapter::Redb(x) => x.commit(),
        }
    }
}

/// The concrete [`Domain`] the server runs on.
#[derive(Clone)]
pub struct WorldDomain {
    store: StoreAdapter,
    catalog: Arc<MapCatalog>,
    game: Arc<GameConfig>,
}

impl WorldDomain {
    pub fn new(store: StoreAdapter, catalog: Arc<MapCatalog>, game: GameConfig) -> Self {
        Self {
            store,
            catalog,
            game: Arc::new(game),
        }
    }
}

impl Domain for WorldDomain {
    type Store = StoreAdapter;

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
