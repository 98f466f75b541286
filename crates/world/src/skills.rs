//! Partner skill hooks around the climb.
//!
//! Dispatch is a match over the closed [`SkillId`] set; pre-hooks adjust
//! the stat accumulators before the progress formula runs, post-hooks
//! inspect the climbed steps and may re-run the climb with a bonus
//! applied.

use rand::Rng as _;

use cadenza_core::{Domain, InvasionFlag, SkillId, StepTag, WorldError, WorldStore as _};

use crate::play::WorldPlay;

/// Count occurrences of a digit in the leading `take` characters of a
/// skill flag string.
fn flag_count(flag: &str, take: usize, digit: char) -> f64 {
    flag.chars().take(take).filter(|c| *c == digit).count() as f64
}

/// The tempest bonus is not a skill of its own: it rides along whenever
/// partner 35 plays a non-beyond chart with its skill visible.
pub(crate) fn special_tempest<D: Domain>(play: &mut WorldPlay<D>) -> Result<(), WorldError> {
    let domain = play.domain;

    let bonus = if domain.game().full_unlock {
        60.0
    } else {
        let total = domain.store().character_level_total(play.user_id)?;
        total as f64 / 10.0
    };

    play.prog_tempest = Some(bonus.clamp(0.0, 60.0));

    Ok(())
}

pub(crate) fn run_pre_hook<D: Domain>(
    play: &mut WorldPlay<D>,
    skill: SkillId,
) -> Result<(), WorldError> {
    match skill {
        SkillId::SkillVita => vita(play),
        SkillId::SkillMika => mika(play),
        SkillId::SkillMithra => mithra(play),
        SkillId::SkillIlithIvy => ilith_ivy(play),
        SkillId::SkillHikariVanessa => hikari_vanessa(play),
        SkillId::SkillChinatsu => chinatsu(play),
        SkillId::SkillSalt => salt(play)?,
        SkillId::SkillHikariSelene => hikari_selene(play),
        SkillId::SkillNamiSui => nami_sui(play),
        SkillId::IlithAwakenedSkill => ilith_awakened(play),
        _ => {}
    }

    Ok(())
}

pub(crate) fn run_post_hook<D: Domain>(
    play: &mut WorldPlay<D>,
    skill: SkillId,
) -> Result<(), WorldError> {
    match skill {
        SkillId::EtoUncap => eto_uncap(play),
        SkillId::LunaUncap => luna_uncap(play),
        SkillId::AyuUncap => ayu_uncap(play),
        SkillId::SkillFatalis => {
            fatalis(play);
            Ok(())
        }
        SkillId::SkillAmane => amane(play),
        SkillId::SkillMaya => maya(play),
        SkillId::SkillKanaeUncap => kanae_uncap(play),
        SkillId::SkillEtoHoppe => eto_hoppe(play),
        SkillId::SkillIntruder => intruder(play),
        _ => Ok(()),
    }
}

// ------------------------------------------------------------------
// pre-hooks
// ------------------------------------------------------------------

/// Overdrive grows with the final recollection gauge.
fn vita<D: Domain>(play: &mut WorldPlay<D>) {
    if play.play.health > 0 && play.play.health <= 100 {
        play.over_skill_increase = Some(play.play.health as f64 / 10.0);
    }
}

/// Clearing one of the listed songs doubles overdrive and prog.
fn mika<D: Domain>(play: &mut WorldPlay<D>) {
    let game = play.domain.game();
    if game.mika_songs.contains(&play.play.song_id) && play.play.clear_type != 0 {
        play.over_skill_increase = Some(play.character.overdrive);
        play.prog_skill_increase = Some(play.character.prog);
    }
}

/// Flat progress per combo interval, reported by the client.
fn mithra<D: Domain>(play: &mut WorldPlay<D>) {
    if let Some(bonus) = play.play.combo_interval_bonus {
        if bonus > 0 {
            play.character_bonus_progress_normalized = Some(bonus as f64);
        }
    }
}

/// One flag character per 20 highest-health, +10 each.
fn ilith_ivy<D: Domain>(play: &mut WorldPlay<D>) {
    let Some(flag) = play.pending.skill_flag.clone() else {
        return;
    };

    let take = (play.play.highest_health.unwrap_or_default() / 20).max(0) as usize;
    play.over_skill_increase = Some(flag_count(&flag, take, '2') * 10.0);
    play.prog_skill_increase = Some(flag_count(&flag, take, '1') * 10.0);
}

/// Mirror of ilith_ivy: the flag subtracts, scaled off lowest health.
fn hikari_vanessa<D: Domain>(play: &mut WorldPlay<D>) {
    let Some(flag) = play.pending.skill_flag.clone() else {
        return;
    };

    let take = (5 - play.play.lowest_health.unwrap_or_default() / 20).max(0) as usize;
    play.over_skill_increase = Some(-flag_count(&flag, take, '2') * 10.0);
    play.prog_skill_increase = Some(-flag_count(&flag, take, '1') * 10.0);
}

/// One flag character per hp interval, +5 each.
fn chinatsu<D: Domain>(play: &mut WorldPlay<D>) {
    let Some(flag) = play.pending.skill_flag.clone() else {
        return;
    };
    let Some(intervals) = play.play.hp_interval_bonus else {
        return;
    };
    if intervals <= 0 {
        return;
    }

    let take = flag.chars().count().min(intervals as usize);
    play.over_skill_increase = Some(flag_count(&flag, take, '2') * 5.0);
    play.prog_skill_increase = Some(flag_count(&flag, take, '1') * 5.0);
}

/// Up to +10 progress, scaled by how much of the current chapter is
/// already completed.
fn salt<D: Domain>(play: &mut WorldPlay<D>) -> Result<(), WorldError> {
    let domain = play.domain;

    if domain.game().full_unlock {
        play.character_bonus_progress_normalized = Some(10.0);
        return Ok(());
    }

    let Some(chapter) = play.user_map.map.chapter else {
        play.character_bonus_progress_normalized = Some(10.0);
        return Ok(());
    };

    let total = domain.catalog().chapter_maps_without_repeatable(chapter).len();
    let key = format!("chapter_complete_count.{chapter}");
    let count = domain.store().counter(play.user_id, "world", &key)?;

    let ratio = if total == 0 {
        1.0
    } else {
        (count.max(0) as usize).min(total) as f64 / total as f64
    };

    play.character_bonus_progress_normalized = Some(10.0 * ratio);

    Ok(())
}

/// Two prog and two overdrive per full recollection bar.
fn hikari_selene<D: Domain>(play: &mut WorldPlay<D>) {
    if play.play.health > 0 && play.play.health <= 100 {
        let bars = (play.play.health / 10) as f64;
        play.over_skill_increase = Some(bars * 2.0);
        play.prog_skill_increase = Some(bars * 2.0);
    }
}

/// Progress from the fever meter, reported by the client in thousandths.
fn nami_sui<D: Domain>(play: &mut WorldPlay<D>) {
    if let Some(fever) = play.play.fever_bonus {
        play.character_bonus_progress_normalized = Some(fever as f64 / 1000.0);
    }
}

/// Surviving the chart grants +6 prog.
fn ilith_awakened<D: Domain>(play: &mut WorldPlay<D>) {
    if play.play.health > 0 {
        play.prog_skill_increase = Some(6.0);
    }
}

// ------------------------------------------------------------------
// post-hooks
// ------------------------------------------------------------------

/// Bonus progress whenever the climb collected a fragment reward.
fn eto_uncap<D: Domain>(play: &mut WorldPlay<D>) -> Result<(), WorldError> {
    let has_fragment = play
        .user_map
        .rewards_for_climbing()
        .iter()
        .any(|reward| reward.items.iter().any(|item| item.is_fragment()));

    if has_fragment {
        play.character_bonus_progress_normalized =
            Some(play.domain.game().eto_uncap_bonus_progress);
    }

    play.reclimb()
}

/// Bonus progress when the climb started on a restricted tile.
fn luna_uncap<D: Domain>(play: &mut WorldPlay<D>) -> Result<(), WorldError> {
    let restricted = play
        .user_map
        .steps_for_climbing()
        .first()
        .is_some_and(|step| step.is_restricted());

    if restricted {
        play.character_bonus_progress_normalized =
            Some(play.domain.game().luna_uncap_bonus_progress);
        play.reclimb()?;
    }

    Ok(())
}

/// Uniform roll in `[-K, +K]`, clamped so total progress stays
/// non-negative.
fn ayu_uncap<D: Domain>(play: &mut WorldPlay<D>) -> Result<(), WorldError> {
    let k = play.domain.game().ayu_uncap_bonus_progress;
    let mut bonus = play.rng.random_range(-k..=k) as f64;

    if play.progress_normalized() + bonus < 0.0 {
        bonus = -play.progress_normalized();
    }

    play.character_bonus_progress_normalized = Some(bonus);

    play.reclimb()
}

/// Overload: world mode rests for an hour after the play.
fn fatalis<D: Domain>(play: &mut WorldPlay<D>) {
    play.profile.world_mode_locked_end_ts = play.now + play.domain.game().fatalis_world_lock_time;
}

/// Progress halves when the climb started on a randomsong or speedlimit
/// tile and the grade fell short of EX.
fn amane<D: Domain>(play: &mut WorldPlay<D>) -> Result<(), WorldError> {
    let Some(first) = play.user_map.steps_for_climbing().first() else {
        return Ok(());
    };

    let gated = first.has_tag(StepTag::Randomsong) || first.has_tag(StepTag::Speedlimit);
    if gated && play.play.song_grade() < 5 {
        play.character_bonus_progress_normalized = Some(-play.progress_normalized() / 2.0);
        play.reclimb()?;
    }

    Ok(())
}

/// Every other play doubles progress; the flag flips either way.
fn maya<D: Domain>(play: &mut WorldPlay<D>) -> Result<(), WorldError> {
    if play.character.skill_flag {
        play.character_bonus_progress_normalized = Some(play.progress_normalized());
        play.reclimb()?;
    }

    play.character.skill_flag = !play.character.skill_flag;
    play.character_dirty = true;

    Ok(())
}

/// Progress from stamina-costing maps is banked instead of spent; the
/// stored amount releases on the next play.
fn kanae_uncap<D: Domain>(play: &mut WorldPlay<D>) -> Result<(), WorldError> {
    if play.user_map.map.stamina_cost > 0 {
        play.kanae_stored_progress = Some(play.progress_normalized());
        play.reclimb()?;
    }

    Ok(())
}

/// Progress doubles while six or more stamina remain.
fn eto_hoppe<D: Domain>(play: &mut WorldPlay<D>) -> Result<(), WorldError> {
    let live = play
        .profile
        .stamina()
        .value_at(play.now, play.domain.game());

    if live >= 6 {
        play.character_bonus_progress_normalized = Some(play.progress_normalized());
        play.reclimb()?;
    }

    Ok(())
}

/// The invader doubles progress for the play it took over.
fn intruder<D: Domain>(play: &mut WorldPlay<D>) -> Result<(), WorldError> {
    if play.pending.invasion != InvasionFlag::None {
        play.character_bonus_progress_normalized = Some(play.progress_normalized());
        play.reclimb()?;
    }

    Ok(())
}
