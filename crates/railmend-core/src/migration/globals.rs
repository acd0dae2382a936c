//! Steps over global state: the compatibility log, pause state, the game
//! clock, content packs and the saved viewport.

use tracing::{debug, info};

use super::LoadSession;
use crate::dirty::DirtyCaches;
use crate::error::{LoadWarning, StepError};
use crate::gamelog::LogEntry;
use crate::services::{ContentStatus, TileTarget};
use crate::world::{DAY_TICKS, DAYS_TILL_ORIGINAL_BASE_YEAR, ORIGINAL_BASE_YEAR, PauseMode, year_of};

/// Snapshots from before 98 carry no log of their own; note where they
/// came from.
pub fn log_old_version(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    if !s.before(98) {
        return Ok(());
    }
    s.log.push(LogEntry::OldVersion {
        flavor: s.header.flavor,
        version: s.header.version,
    });
    Ok(())
}

pub fn log_revision_and_mode(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.log.push(LogEntry::Revision(s.ctx.revision.clone()));
    s.log.push(LogEntry::Mode {
        mode: s.ctx.game_mode,
        landscape: s.world.settings.game_creation.landscape,
    });
    Ok(())
}

/// Old snapshots never logged which content they were started with.
pub fn log_legacy_content_list(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    if !s.before(98) {
        return Ok(());
    }
    for pack in &s.world.content {
        s.log.push(LogEntry::ContentAdded { id: pack.id });
    }
    Ok(())
}

pub fn normalize_pause_mode(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let pause = &mut s.world.pause;
    if s.header.version.is_before(119) {
        // A single boolean, where 2 meant "paused by the player".
        *pause = if pause.bits() == 2 {
            PauseMode::NORMAL
        } else {
            PauseMode::empty()
        };
    } else if s.ctx.network.is_dedicated() && pause.contains(PauseMode::ERROR) {
        return Err(StepError::Incompatible(
            "snapshot was paused due to an error state and cannot be served".into(),
        ));
    } else if !s.ctx.network.is_networking() || s.ctx.network.is_server() {
        // Network pause reasons are re-established by the server itself.
        pause.remove(PauseMode::NETWORK);
    }
    Ok(())
}

pub fn seed_tile_loop_cursor(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    if s.world.cur_tileloop_tile == 0 {
        s.world.cur_tileloop_tile = 1;
    }
    Ok(())
}

pub fn verify_content_packs(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let mut worst = ContentStatus::Compatible;
    for pack in &s.world.content {
        let status = s.services.resolve_content(pack);
        match status {
            ContentStatus::Missing => s.log.push(LogEntry::ContentRemoved { id: pack.id }),
            ContentStatus::CompatibleWithWarning => {
                s.log.push(LogEntry::ContentCompatible { id: pack.id })
            }
            ContentStatus::Compatible => {}
        }
        worst = worst.max(status);
    }
    s.content_status = worst;

    if worst != ContentStatus::Compatible && s.ctx.is_strict() {
        return Err(StepError::Incompatible(
            "content packs do not match the ones the game was saved with".into(),
        ));
    }
    match worst {
        ContentStatus::Compatible => {}
        ContentStatus::CompatibleWithWarning => s.warn(LoadWarning::ContentCompatible),
        ContentStatus::Missing => {
            s.warn(LoadWarning::ContentMissing);
            s.world.pause = PauseMode::ERROR;
        }
    }
    Ok(())
}

pub fn scale_date_fract(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let clock = &mut s.world.clock;
    // The fraction used to count in 1/885ths of a tick.
    if s.header.version.is_older_than(11, 1)
        || (s.header.version.is_before(147) && clock.date_fract > DAY_TICKS)
    {
        clock.date_fract /= 885;
    }
    clock.cur_year = year_of(clock.date);
    Ok(())
}

/// Dates were counted from 1920 instead of year 0.
pub fn offset_base_year(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let w = &mut s.world;
    w.clock.date += DAYS_TILL_ORIGINAL_BASE_YEAR;
    w.clock.cur_year += ORIGINAL_BASE_YEAR;

    for st in w.stations.values_mut() {
        st.build_date += DAYS_TILL_ORIGINAL_BASE_YEAR;
    }
    for e in w.engines.values_mut() {
        e.intro_date += DAYS_TILL_ORIGINAL_BASE_YEAR;
    }
    for c in w.companies.values_mut() {
        c.inaugurated_year += ORIGINAL_BASE_YEAR;
    }
    for i in w.industries.values_mut() {
        i.last_prod_year += ORIGINAL_BASE_YEAR;
    }
    for v in w.vehicles.values_mut() {
        v.date_of_last_service += DAYS_TILL_ORIGINAL_BASE_YEAR;
        v.build_year += ORIGINAL_BASE_YEAR;
    }
    debug!(date = w.clock.date, "rebased calendar to year 0");
    Ok(())
}

pub fn rescale_viewport_zoom(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let vp = &mut s.world.viewport;
    vp.zoom += 2;
    vp.x *= 4;
    vp.y *= 4;
    Ok(())
}

pub fn reset_engine_availability(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    if s.content_status != ContentStatus::Compatible {
        s.dirty.mark_partition(DirtyCaches::PARTITION_ENGINES);
    }
    Ok(())
}

pub fn notify_pathfinder(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.notices.push(TileTarget::Everywhere);
    s.dirty.mark_partition(DirtyCaches::PARTITION_PATHFINDER);
    info!(tiles = s.world.map.len(), "track layout invalidated");
    Ok(())
}
