use serde::{Deserialize, Serialize};

use crate::{GameConfig, Timestamp};

/// A recovering integer resource derived from a stored "full at"
/// timestamp.
///
/// The live value is `MAX - (max_stamina_ts - now) / tick`, so it keeps
/// growing on its own until it hits the cap. The raw stored value only
/// matters above the cap: overfill (from `plusstamina` tiles) persists
/// until something consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamina {
    max_stamina_ts: Timestamp,
    stored: i32,
}

impl Stamina {
    pub fn new(max_stamina_ts: Timestamp, stored: i32) -> Self {
        Self {
            max_stamina_ts,
            stored,
        }
    }

    pub fn max_stamina_ts(&self) -> Timestamp {
        self.max_stamina_ts
    }

    pub fn stored(&self) -> i32 {
        self.stored
    }

    /// The live value at `now`.
    pub fn value_at(&self, now: Timestamp, game: &GameConfig) -> i32 {
        let recovered = (self.max_stamina_ts - now) as f64 / game.stamina_recover_tick as f64;
        let live = (game.max_stamina as f64 - recovered).round() as i32;

        if live >= game.max_stamina {
            if self.stored >= game.max_stamina {
                self.stored
            } else {
                game.max_stamina
            }
        } else {
            live
        }
    }

    /// Overwrite the value, rewriting `max_stamina_ts` so that
    /// [`Stamina::value_at`] round-trips at the same instant.
    pub fn set_at(&mut self, value: i32, now: Timestamp, game: &GameConfig) {
        self.stored = value;
        self.max_stamina_ts =
            now - (value - game.max_stamina) as i64 * game.stamina_recover_tick;
    }
}
