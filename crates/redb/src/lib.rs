//! Persistent world state on `redb`: one database, typed tables,
//! bincode-encoded rows. All mutations of a play ride a single write
//! transaction, so a failed pipeline leaves nothing behind.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable as _, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use cadenza_core::{
    CharacterId, CharacterState, CharacterTable, LephonPhase, MapProgress, PendingPlay,
    RewardItem, StoreError, UserId, UserProfile, WorldStore, WorldWriter,
};

const USERS: TableDefinition<'static, u64, &'static [u8]> = TableDefinition::new("user");

const USER_WORLD: TableDefinition<'static, (u64, &'static str), &'static [u8]> =
    TableDefinition::new("user_world");

const USER_WORLD_MAP: TableDefinition<'static, u64, u8> = TableDefinition::new("user_world_map");

const USER_CHARS: TableDefinition<'static, (u64, u32), &'static [u8]> =
    TableDefinition::new("user_char");

const USER_CHARS_FULL: TableDefinition<'static, (u64, u32), &'static [u8]> =
    TableDefinition::new("user_char_full");

const USER_KV: TableDefinition<'static, (u64, &'static str, &'static str), i64> =
    TableDefinition::new("user_kv");

const USER_ITEMS: TableDefinition<'static, (u64, &'static str, &'static str), i64> =
    TableDefinition::new("user_item");

const PENDING_PLAYS: TableDefinition<'static, u64, &'static [u8]> =
    TableDefinition::new("pending_play");

const DEFAULT_CACHE_SIZE_MB: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    DatabaseError(#[from] ::redb::DatabaseError),

    #[error(transparent)]
    TransactionError(Box<::redb::TransactionError>),

    #[error(transparent)]
    CommitError(#[from] ::redb::CommitError),

    #[error(transparent)]
    TableError(#[from] ::redb::TableError),

    #[error(transparent)]
    StorageError(#[from] ::redb::StorageError),

    #[error("encoding error: {0}")]
    EncodingError(#[from] bincode::Error),
}

impl From<::redb::TransactionError> for Error {
    fn from(error: ::redb::TransactionError) -> Self {
        Error::TransactionError(Box::new(error))
    }
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        StoreError::Internal(error.to_string())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    Ok(bincode::deserialize(bytes)?)
}

fn character_table(table: CharacterTable) -> TableDefinition<'static, (u64, u32), &'static [u8]> {
    match table {
        CharacterTable::PerUser => USER_CHARS,
        CharacterTable::FullUnlock => USER_CHARS_FULL,
    }
}

#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn open(path: impl AsRef<Path>, cache_size: Option<usize>) -> Result<Self, Error> {
        let db = Database::builder()
            .set_repair_callback(|x| {
                warn!(progress = x.progress() * 100f64, "world db is repairing")
            })
            .set_cache_size(1024 * 1024 * cache_size.unwrap_or(DEFAULT_CACHE_SIZE_MB))
            .create(path)?;

        let store = Self { db: Arc::new(db) };
        store.initialize_schema()?;

        Ok(store)
    }

    /// A throwaway database backed by memory only.
    pub fn ephemeral() -> Result<Self, Error> {
        let db = Database::builder()
            .create_with_backend(::redb::backends::InMemoryBackend::new())?;

        let store = Self { db: Arc::new(db) };
        store.initialize_schema()?;

        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), Error> {
        let wx = self.db.begin_write()?;

        wx.open_table(USERS)?;
        wx.open_table(USER_WORLD)?;
        wx.open_table(USER_WORLD_MAP)?;
        wx.open_table(USER_CHARS)?;
        wx.open_table(USER_CHARS_FULL)?;
        wx.open_table(USER_KV)?;
        wx.open_table(USER_ITEMS)?;
        wx.open_table(PENDING_PLAYS)?;

        wx.commit()?;

        Ok(())
    }

    fn profile_impl(&self, user: UserId) -> Result<Option<UserProfile>, Error> {
        let rx = self.db.begin_read()?;
        let table = rx.open_table(USERS)?;

        table
            .get(user)?
            .map(|guard| decode(guard.value()))
            .transpose()
    }

    fn map_progress_impl(&self, user: UserId, map_id: &str) -> Result<Option<MapProgress>, Error> {
        let rx = self.db.begin_read()?;
        let table = rx.open_table(USER_WORLD)?;

        table
            .get((user, map_id))?
            .map(|guard| decode(guard.value()))
            .transpose()
    }

    fn lephon_phase_impl(&self, user: UserId) -> Result<LephonPhase, Error> {
        let rx = self.db.begin_read()?;
        let table = rx.open_table(USER_WORLD_MAP)?;

        Ok(table.get(user)?.map(|guard| guard.value()).unwrap_or(0))
    }

    fn character_impl(
        &self,
        user: UserId,
        character: CharacterId,
        table: CharacterTable,
    ) -> Result<Option<CharacterState>, Error> {
        let rx = self.db.begin_read()?;
        let table = rx.open_table(character_table(table))?;

        table
            .get((user, character))?
            .map(|guard| decode(guard.value()))
            .transpose()
    }

    fn character_level_total_impl(&self, user: UserId) -> Result<u32, Error> {
        let rx = self.db.begin_read()?;
        let table = rx.open_table(USER_CHARS)?;

        let mut total = 0u32;
        for entry in table.range((user, u32::MIN)..=(user, u32::MAX))? {
            let (_, value) = entry?;
            let state: CharacterState = decode(value.value())?;
            total += state.level;
        }

        Ok(total)
    }

    fn counter_impl(&self, user: UserId, class: &str, key: &str) -> Result<i64, Error> {
        let rx = self.db.begin_read()?;
        let table = rx.open_table(USER_KV)?;

        Ok(table
            .get((user, class, key))?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    fn owned_amount_impl(&self, user: UserId, kind: &str, id: &str) -> Result<i64, Error> {
        let rx = self.db.begin_read()?;
        let table = rx.open_table(USER_ITEMS)?;

        Ok(table
            .get((user, kind, id))?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    fn pending_play_impl(&self, user: UserId) -> Result<Option<PendingPlay>, Error> {
        let rx = self.db.begin_read()?;
        let table = rx.open_table(PENDING_PLAYS)?;

        table
            .get(user)?
            .map(|guard| decode(guard.value()))
            .transpose()
    }
}

impl WorldStore for RedbStore {
    type Writer = RedbWriter;

    fn profile(&self, user: UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.profile_impl(user)?)
    }

    fn map_progress(&self, user: UserId, map_id: &str) -> Result<Option<MapProgress>, StoreError> {
        Ok(self.map_progress_impl(user, map_id)?)
    }

    fn lephon_phase(&self, user: UserId) -> Result<LephonPhase, StoreError> {
        Ok(self.lephon_phase_impl(user)?)
    }

    fn character(
        &self,
        user: UserId,
        character: CharacterId,
        table: CharacterTable,
    ) -> Result<Option<CharacterState>, StoreError> {
        Ok(self.character_impl(user, character, table)?)
    }

    fn character_level_total(&self, user: UserId) -> Result<u32, StoreError> {
        Ok(self.character_level_total_impl(user)?)
    }

    fn counter(&self, user: UserId, class: &str, key: &str) -> Result<i64, StoreError> {
        Ok(self.counter_impl(user, class, key)?)
    }

    fn owned_amount(&self, user: UserId, kind: &str, id: &str) -> Result<i64, StoreError> {
        Ok(self.owned_amount_impl(user, kind, id)?)
    }

    fn pending_play(&self, user: UserId) -> Result<Option<PendingPlay>, StoreError> {
        Ok(self.pending_play_impl(user)?)
    }

    fn start_writer(&self) -> Result<Self::Writer, StoreError> {
        let wx = self.db.begin_write().map_err(Error::from)?;
        Ok(RedbWriter { wx })
    }
}

/// One write transaction over the world state; dropped without
/// [`WorldWriter::commit`], nothing is persisted.
pub struct RedbWriter {
    wx: WriteTransaction,
}

impl RedbWriter {
    fn put_profile_impl(&mut self, profile: &UserProfile) -> Result<(), Error> {
        let mut table = self.wx.open_table(USERS)?;
        table.insert(profile.user_id, encode(profile)?.as_slice())?;
        Ok(())
    }

    fn put_map_progress_impl(
        &mut self,
        user: UserId,
        map_id: &str,
        progress: &MapProgress,
    ) -> Result<(), Error> {
        let mut table = self.wx.open_table(USER_WORLD)?;
        table.insert((user, map_id), encode(progress)?.as_slice())?;
        Ok(())
    }

    fn put_lephon_phase_impl(&mut self, user: UserId, phase: LephonPhase) -> Result<(), Error> {
        let mut table = self.wx.open_table(USER_WORLD_MAP)?;
        table.insert(user, phase)?;
        Ok(())
    }

    fn put_character_impl(
        &mut self,
        user: UserId,
        state: &CharacterState,
        table: CharacterTable,
    ) -> Result<(), Error> {
        let mut table = self.wx.open_table(character_table(table))?;
        table.insert((user, state.character_id), encode(state)?.as_slice())?;
        Ok(())
    }

    fn put_counter_impl(
        &mut self,
        user: UserId,
        class: &str,
        key: &str,
        value: i64,
    ) -> Result<(), Error> {
        let mut table = self.wx.open_table(USER_KV)?;
        table.insert((user, class, key), value)?;
        Ok(())
    }

    fn grant_item_impl(&mut self, user: UserId, item: &RewardItem) -> Result<(), Error> {
        let mut table = self.wx.open_table(USER_ITEMS)?;

        let id = item.item_id.as_deref().unwrap_or_default();
        let key = (user, item.item_type.as_str(), id);

        let current = table.get(key)?.map(|guard| guard.value()).unwrap_or(0);
        table.insert(key, current + item.amount as i64)?;

        Ok(())
    }

    fn put_pending_play_impl(&mut self, user: UserId, pending: &PendingPlay) -> Result<(), Error> {
        let mut table = self.wx.open_table(PENDING_PLAYS)?;
        table.insert(user, encode(pending)?.as_slice())?;
        Ok(())
    }

    fn clear_pending_play_impl(&mut self, user: UserId) -> Result<(), Error> {
        let mut table = self.wx.open_table(PENDING_PLAYS)?;
        table.remove(user)?;
        Ok(())
    }
}

impl WorldWriter for RedbWriter {
    fn put_profile(&mut self, profile: &UserProfile) -> Result<(), StoreError> {
        Ok(self.put_profile_impl(profile)?)
    }

    fn put_map_progress(
        &mut self,
        user: UserId,
        map_id: &str,
        progress: &MapProgress,
    ) -> Result<(), StoreError> {
        Ok(self.put_map_progress_impl(user, map_id, progress)?)
    }

    fn put_lephon_phase(&mut self, user: UserId, phase: LephonPhase) -> Result<(), StoreError> {
        Ok(self.put_lephon_phase_impl(user, phase)?)
    }

    fn put_character(
        &mut self,
        user: UserId,
        state: &CharacterState,
        table: CharacterTable,
    ) -> Result<(), StoreError> {
        Ok(self.put_character_impl(user, state, table)?)
    }

    fn put_counter(
        &mut self,
        user: UserId,
        class: &str,
        key: &str,
        value: i64,
    ) -> Result<(), StoreError> {
        Ok(self.put_counter_impl(user, class, key, value)?)
    }

    fn grant_item(&mut self, user: UserId, item: &RewardItem) -> Result<(), StoreError> {
        Ok(self.grant_item_impl(user, item)?)
    }

    fn put_pending_play(&mut self, user: UserId, pending: &PendingPlay) -> Result<(), StoreError> {
        Ok(self.put_pending_play_impl(user, pending)?)
    }

    fn clear_pending_play(&mut self, user: UserId) -> Result<(), StoreError> {
        Ok(self.clear_pending_play_impl(user)?)
    }

    fn commit(self) -> Result<(), StoreError> {
        self.wx.commit().map_err(Error::from)?;
        Ok(())
    }
}
