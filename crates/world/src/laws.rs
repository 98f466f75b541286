//! Breached-map laws: overrides of the PROG term selected by the map's
//! `new_law` field.

use cadenza_core::Domain;

use crate::play::WorldPlay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewLaw {
    Over100Step50,
    Frag50,
    LowLevel,
    Antiheroism,
}

impl NewLaw {
    /// Unknown or empty law strings leave the formula untouched.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "over100_step50" => Some(Self::Over100Step50),
            "frag50" => Some(Self::Frag50),
            "lowlevel" => Some(Self::LowLevel),
            "antiheroism" => Some(Self::Antiheroism),
            _ => None,
        }
    }
}

/// Compute the law's PROG override into the play context; the breached
/// formula divides it by 50 to form the multiplier.
pub(crate) fn apply<D: Domain>(play: &mut WorldPlay<D>) {
    let Some(law) = NewLaw::parse(&play.user_map.map.new_law) else {
        return;
    };

    let over = play.character.overdrive + play.over_skill_increase.unwrap_or_default();
    let prog = play.character.prog + play.prog_skill_increase.unwrap_or_default();
    let frag = play.character.frag;

    play.new_law_prog = Some(match law {
        NewLaw::Over100Step50 => over + prog / 2.0,
        NewLaw::Frag50 => frag,
        NewLaw::LowLevel => 50.0 * (2.0 - 0.1 * play.character.level as f64).max(1.0),
        NewLaw::Antiheroism => {
            let x = (over - frag).abs();
            let y = (over - prog).abs();
            over - (x - y).abs()
        }
    });
}
