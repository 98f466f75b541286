//! An in-memory [`WorldStore`] with the same commit semantics as the
//! persistent one: a writer stages operations and nothing lands until
//! `commit`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cadenza_core::{
    CharacterId, CharacterState, CharacterTable, LephonPhase, MapId, MapProgress, PendingPlay,
    RewardItem, StoreError, UserId, UserProfile, WorldStore, WorldWriter,
};

#[derive(Default)]
struct MemoryState {
    profiles: HashMap<UserId, UserProfile>,
    map_progress: HashMap<(UserId, MapId), MapProgress>,
    lephon: HashMap<UserId, LephonPhase>,
    characters: HashMap<(UserId, CharacterId, bool), CharacterState>,
    counters: HashMap<(UserId, String, String), i64>,
    owned: HashMap<(UserId, String, String), i64>,
    granted: HashMap<UserId, Vec<RewardItem>>,
    pending: HashMap<UserId, PendingPlay>,
}

fn table_key(table: CharacterTable) -> bool {
    matches!(table, CharacterTable::FullUnlock)
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store poisoned")
    }

    pub fn seed_profile(&self, profile: &UserProfile) {
        self.lock().profiles.insert(profile.user_id, profile.clone());
    }

    pub fn seed_map_progress(&self, user: UserId, map_id: &str, progress: MapProgress) {
        self.lock()
            .map_progress
            .insert((user, map_id.to_owned()), progress);
    }

    pub fn seed_lephon_phase(&self, user: UserId, phase: LephonPhase) {
        self.lock().lephon.insert(user, phase);
    }

    pub fn seed_character(&self, user: UserId, state: &CharacterState, table: CharacterTable) {
        self.lock()
            .characters
            .insert((user, state.character_id, table_key(table)), state.clone());
    }

    pub fn seed_counter(&self, user: UserId, class: &str, key: &str, value: i64) {
        self.lock()
            .counters
            .insert((user, class.to_owned(), key.to_owned()), value);
    }

    pub fn seed_owned(&self, user: UserId, kind: &str, id: &str, amount: i64) {
        self.lock()
            .owned
            .insert((user, kind.to_owned(), id.to_owned()), amount);
    }

    pub fn seed_pending(&self, user: UserId, pending: &PendingPlay) {
        self.lock().pending.insert(user, pending.clone());
    }

    /// Every item granted to the user so far, in grant order.
    pub fn granted_items(&self, user: UserId) -> Vec<RewardItem> {
        self.lock().granted.get(&user).cloned().unwrap_or_default()
    }
}

impl WorldStore for MemoryStore {
    type Writer = MemoryWriter;

    fn profile(&self, user: UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.lock().profiles.get(&user).cloned())
    }

    fn map_progress(&self, user: UserId, map_id: &str) -> Result<Option<MapProgress>, StoreError> {
        Ok(self
            .lock()
            .map_progress
            .get(&(user, map_id.to_owned()))
            .copied())
    }

    fn lephon_phase(&self, user: UserId) -> Result<LephonPhase, StoreError> {
        Ok(self.lock().lephon.get(&user).copied().unwrap_or_default())
    }

    fn character(
        &self,
        user: UserId,
        character: CharacterId,
        table: CharacterTable,
    ) -> Result<Option<CharacterState>, StoreError> {
        Ok(self
            .lock()
            .characters
            .get(&(user, character, table_key(table)))
            .cloned())
    }

    fn character_level_total(&self, user: UserId) -> Result<u32, StoreError> {
        Ok(self
            .lock()
            .characters
            .iter()
            .filter(|((u, _, full), _)| *u == user && !full)
            .map(|(_, c)| c.level)
            .sum())
    }

    fn counter(&self, user: UserId, class: &str, key: &str) -> Result<i64, StoreError> {
        Ok(self
            .lock()
            .counters
            .get(&(user, class.to_owned(), key.to_owned()))
            .copied()
            .unwrap_or_default())
    }

    fn owned_amount(&self, user: UserId, kind: &str, id: &str) -> Result<i64, StoreError> {
        Ok(self
            .lock()
            .owned
            .get(&(user, kind.to_owned(), id.to_owned()))
            .copied()
            .unwrap_or_default())
    }

    fn pending_play(&self, user: UserId) -> Result<Option<PendingPlay>, StoreError> {
        Ok(self.lock().pending.get(&user).cloned())
    }

    fn start_writer(&self) -> Result<Self::Writer, StoreError> {
        Ok(MemoryWriter {
            store: self.clone(),
            ops: vec![],
        })
    }
}

enum Op {
    Profile(UserProfile),
    MapProgress(UserId, MapId, MapProgress),
    Lephon(UserId, LephonPhase),
    Character(UserId, CharacterState, bool),
    Counter(UserId, String, String, i64),
    Grant(UserId, RewardItem),
    Pending(UserId, PendingPlay),
    ClearPending(UserId),
}

pub struct MemoryWriter {
    store: MemoryStore,
    ops: Vec<Op>,
}

impl WorldWriter for MemoryWriter {
    fn put_profile(&mut self, profile: &UserProfile) -> Result<(), StoreError> {
        self.ops.push(Op::Profile(profile.clone()));
        Ok(())
    }

    fn put_map_progress(
        &mut self,
        user: UserId,
        map_id: &str,
        progress: &MapProgress,
    ) -> Result<(), StoreError> {
        self.ops
            .push(Op::MapProgress(user, map_id.to_owned(), *progress));
        Ok(())
    }

    fn put_lephon_phase(&mut self, user: UserId, phase: LephonPhase) -> Result<(), StoreError> {
        self.ops.push(Op::Lephon(user, phase));
        Ok(())
    }

    fn put_character(
        &mut self,
        user: UserId,
        state: &CharacterState,
        table: CharacterTable,
    ) -> Result<(), StoreError> {
        self.ops
            .push(Op::Character(user, state.clone(), table_key(table)));
        Ok(())
    }

    fn put_counter(
        &mut self,
        user: UserId,
        class: &str,
        key: &str,
        value: i64,
    ) -> Result<(), StoreError> {
        self.ops
            .push(Op::Counter(user, class.to_owned(), key.to_owned(), value));
        Ok(())
    }

    fn grant_item(&mut self, user: UserId, item: &RewardItem) -> Result<(), StoreError> {
        self.ops.push(Op::Grant(user, item.clone()));
        Ok(())
    }

    fn put_pending_play(&mut self, user: UserId, pending: &PendingPlay) -> Result<(), StoreError> {
        self.ops.push(Op::Pending(user, pending.clone()));
        Ok(())
    }

    fn clear_pending_play(&mut self, user: UserId) -> Result<(), StoreError> {
        self.ops.push(Op::ClearPending(user));
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        let mut state = self.store.lock();

        for op in self.ops {
            match op {
                Op::Profile(profile) => {
                    state.profiles.insert(profile.user_id, profile);
                }
                Op::MapProgress(user, map_id, progress) => {
                    state.map_progress.insert((user, map_id), progress);
                }
                Op::Lephon(user, phase) => {
                    state.lephon.insert(user, phase);
                }
                Op::Character(user, character, full) => {
                    state
                        .characters
                        .insert((user, character.character_id, full), character);
                }
                Op::Counter(user, class, key, value) => {
                    state.counters.insert((user, class, key), value);
                }
                Op::Grant(user, item) => {
                    let kind = item.item_type.clone();
                    let id = item.item_id.clone().unwrap_or_default();
                    *state.owned.entry((user, kind, id)).or_default() += item.amount as i64;
                    state.granted.entry(user).or_default().push(item);
                }
                Op::Pending(user, pending) => {
                    state.pending.insert(user, pending);
                }
                Op::ClearPending(user) => {
                    state.pending.remove(&user);
                }
            }
        }

        Ok(())
    }
}
