//! Town records and the town links stored on map cells.

use tracing::debug;

use super::LoadSession;
use crate::catalog::{TownEffect, town_effect};
use crate::context::GameMode;
use crate::entity::NUM_CARGO;
use crate::error::StepError;
use crate::id::{Owner, TownId};
use crate::map::TileIndex;
use crate::settings::{Landscape, town_layout};
use crate::tile::{RoadTileType, TileKind, object_type};

/// Growth goal meaning "needs the cargo to grow in winter".
pub const TOWN_GROWTH_WINTER: u32 = 0xFFFF_FFFE;
/// Growth goal meaning "needs the cargo to grow in the desert".
pub const TOWN_GROWTH_DESERT: u32 = 0xFFFF_FFFF;

fn closest_town_or_corrupt(s: &LoadSession<'_>, t: TileIndex) -> Result<TownId, StepError> {
    s.world
        .closest_town(t)
        .ok_or_else(|| StepError::corrupt(format!("tile {} needs a town but the map has none", t.0)))
}

/// A normal game cannot run without at least one town.
pub fn require_town(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    if s.ctx.game_mode == GameMode::Normal && s.world.towns.is_empty() {
        return Err(StepError::corrupt("the map has no towns"));
    }
    Ok(())
}

pub fn clear_town_exclusivity(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for t in s.world.towns.values_mut() {
        t.exclusivity = Owner::INVALID;
    }
    Ok(())
}

/// `m2` became the town index of houses and town-owned road.
pub fn assign_town_index_to_tiles(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for t in s.world.map.indices() {
        let Some(&tile) = s.world.map.get(t) else { continue };
        let wants_town = match tile.kind {
            TileKind::House => true,
            TileKind::Road => tile.road_owner() == Owner::TOWN,
            _ => false,
        };
        if !wants_town {
            continue;
        }
        let town = closest_town_or_corrupt(s, t)?;
        if let Some(slot) = s.world.map.get_mut(t) {
            slot.set_town(town);
        }
    }
    Ok(())
}

pub fn update_town_max_pass(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for t in s.world.towns.values_mut() {
        t.max_pass = t.population >> 3;
        t.max_mail = t.population >> 4;
    }
    Ok(())
}

pub fn link_statues_to_towns(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for t in s.world.map.indices() {
        let is_statue = s
            .world
            .map
            .get(t)
            .is_some_and(|tile| tile.kind == TileKind::Object && tile.object_type() == object_type::STATUE);
        if !is_statue {
            continue;
        }
        let town = closest_town_or_corrupt(s, t)?;
        if let Some(slot) = s.world.map.get_mut(t) {
            slot.m2 = town.0;
        }
    }
    Ok(())
}

/// Larger towns moved from a global ratio onto each town.
pub fn mark_larger_towns(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let every = s.world.settings.economy.larger_towns as u16;
    if every == 0 {
        return Ok(());
    }
    for (id, t) in s.world.towns.iter_mut() {
        if id.0 % every == 0 {
            t.larger_town = true;
        }
    }
    Ok(())
}

/// Road not owned by a town is linked to the nearest town, or to none.
fn link_roads_to_nearest_town(s: &mut LoadSession<'_>) {
    let mut linked = 0usize;
    for t in s.world.map.indices() {
        let Some(&tile) = s.world.map.get(t) else { continue };
        if tile.kind != TileKind::Road
            || tile.road_tile_type() == Some(RoadTileType::Depot)
            || tile.road_owner() == Owner::TOWN
        {
            continue;
        }
        let town = s.world.closest_town(t).unwrap_or(TownId::INVALID);
        if let Some(slot) = s.world.map.get_mut(t) {
            slot.set_town(town);
            linked += 1;
        }
    }
    debug!(linked, "linked roads to nearest town");
}

pub fn update_nearest_town_for_roads(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    link_roads_to_nearest_town(s);
    Ok(())
}

/// Snapshots between 103 and 113 could still hold stale road links.
pub fn closest_town_for_roads(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    link_roads_to_nearest_town(s);
    Ok(())
}

/// Layout 0 used to mean "towns build no roads". Layouts shifted down by
/// one and every town gets its own layout.
pub fn convert_town_layout(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let eco = &mut s.world.settings.economy;
    if eco.town_layout == 0 {
        eco.allow_town_roads = false;
        eco.town_layout = town_layout::BETTER_ROADS;
    } else {
        eco.allow_town_roads = true;
        eco.town_layout -= 1;
    }
    let layout = eco.town_layout;

    let map = &s.world.map;
    for t in s.world.towns.values_mut() {
        if layout != town_layout::RANDOM {
            t.layout = layout;
            continue;
        }
        // The random layout was picked from the town centre position.
        let pick = match map.tile_hash(t.xy) % 6 {
            5 => 1,
            0 => 2,
            n => n as u8,
        };
        t.layout = pick - 1;
    }
    Ok(())
}

fn climate_has(landscape: Landscape, effect: TownEffect) -> bool {
    (0..NUM_CARGO as u8).any(|c| town_effect(landscape, c) == effect)
}

/// Desert and winter towns need food (and water) to grow.
pub fn set_town_growth_goals(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let landscape = s.world.settings.game_creation.landscape;
    let goals: &[(TownEffect, u32)] = match landscape {
        Landscape::Arctic => &[(TownEffect::Food, TOWN_GROWTH_WINTER)],
        Landscape::Tropic => &[
            (TownEffect::Food, TOWN_GROWTH_DESERT),
            (TownEffect::Water, TOWN_GROWTH_DESERT),
        ],
        Landscape::Temperate | Landscape::Toyland => &[],
    };
    for &(effect, goal) in goals {
        if !climate_has(landscape, effect) {
            continue;
        }
        for t in s.world.towns.values_mut() {
            t.goal[effect as usize] = goal;
        }
    }
    Ok(())
}

/// Towns started tracking the cargo their houses accept.
pub fn mark_town_acceptance(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (t, tile) in s.world.map.iter() {
        if tile.kind != TileKind::House {
            continue;
        }
        let town = tile.town();
        if !s.world.towns.contains(town) {
            return Err(StepError::corrupt(format!(
                "house at tile {} belongs to missing town {}",
                t.0, town.0
            )));
        }
        s.dirty.mark_town(town);
    }
    for id in s.world.towns.ids() {
        s.dirty.mark_town(id);
    }
    Ok(())
}
