use serde::{Deserialize, Serialize};

use crate::{exp_for_level, CharacterId, SkillId};

/// Snapshot of one partner as the progress pipeline consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterState {
    pub character_id: CharacterId,
    pub level: u32,
    pub max_level: u32,
    pub exp: f64,
    pub frag: f64,
    pub prog: f64,
    pub overdrive: f64,
    pub skill_id: Option<SkillId>,
    pub skill_id_uncap: Option<SkillId>,
    pub is_uncapped: bool,
    /// Flip-flop consumed by `skill_maya`.
    pub skill_flag: bool,
}

impl CharacterState {
    /// The skill in effect: the uncap skill once awakened, the base skill
    /// otherwise.
    pub fn displayed_skill(&self) -> Option<SkillId> {
        if self.is_uncapped {
            self.skill_id_uncap.or(self.skill_id)
        } else {
            self.skill_id
        }
    }

    /// The flat stats a sealed partner plays with: identity untouched,
    /// every stat pinned to 50 and no skill.
    pub fn sealed(&self) -> Self {
        Self {
            frag: 50.0,
            prog: 50.0,
            overdrive: 50.0,
            skill_id: None,
            skill_id_uncap: None,
            skill_flag: false,
            ..self.clone()
        }
    }

    /// Add XP and advance levels along the fixed curve.
    pub fn gain_exp(&mut self, amount: f64) {
        self.exp += amount;
        while self.level < self.max_level && self.exp >= exp_for_level(self.level + 1) {
            self.level += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partner() -> CharacterState {
        CharacterState {
            character_id: 1,
            level: 1,
            max_level: 20,
            exp: 0.0,
            frag: 60.0,
            prog: 65.0,
            overdrive: 70.0,
            skill_id: Some(SkillId::SkillVita),
            skill_id_uncap: Some(SkillId::EtoUncap),
            is_uncapped: false,
            skill_flag: false,
        }
    }

    #[test]
    fn displayed_skill_prefers_the_uncap_once_awakened() {
        let mut c = partner();
        assert_eq!(c.displayed_skill(), Some(SkillId::SkillVita));
        c.is_uncapped = true;
        assert_eq!(c.displayed_skill(), Some(SkillId::EtoUncap));
    }

    #[test]
    fn sealed_pins_stats_and_drops_the_skill() {
        let sealed = partner().sealed();
        assert_eq!(sealed.frag, 50.0);
        assert_eq!(sealed.prog, 50.0);
        assert_eq!(sealed.overdrive, 50.0);
        assert_eq!(sealed.displayed_skill(), None);
        assert_eq!(sealed.character_id, 1);
    }

    #[test]
    fn exp_gain_levels_through_the_curve() {
        let mut c = partner();
        c.gain_exp(120.0);
        assert_eq!(c.level, 3);

        c.gain_exp(10_000.0);
        assert!(c.level > 3);
        assert!(c.level <= c.max_level);
    }

    #[test]
    fn level_saturates_at_max() {
        let mut c = partner();
        c.max_level = 5;
        c.gain_exp(1e9);
        assert_eq!(c.level, 5);
    }
}
