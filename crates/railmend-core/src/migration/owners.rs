//! Ownership repairs.
//!
//! Old snapshots kept tiles and records of companies that no longer exist,
//! or used owner values that changed meaning. Ownership is reassigned with
//! the rules below; an owner value with no meaning at all is corrupt.

use tracing::debug;

use super::LoadSession;
use crate::entity::{VehicleType, facility};
use crate::error::StepError;
use crate::id::{MAX_COMPANIES, Owner};
use crate::map::{DiagDirection, TileIndex, TileMap};
use crate::tile::{RailTileType, RoadTileType, Tile, TileKind, WaterClass, sb};
use crate::world::World;

/// Track bits that touch each tile edge, indexed by [`DiagDirection`].
const EDGE_TRACKS: [u32; 4] = [1 | 4 | 32, 2 | 8 | 32, 1 | 8 | 16, 2 | 4 | 16];

/// Road bits of a straight piece along X and along Y.
const ROAD_X: u8 = 10;
const ROAD_Y: u8 = 5;

fn check_owner(t: TileIndex, owner: Owner) -> Result<(), StepError> {
    if !owner.is_meaningful() {
        return Err(StepError::corrupt(format!(
            "tile {} has meaningless owner {:#x}",
            t.0, owner.0
        )));
    }
    Ok(())
}

/// Owner value that belongs to a company slot which is empty.
fn is_dead_company(world: &World, owner: Owner) -> bool {
    owner.0 < MAX_COMPANIES && !world.is_valid_company(owner)
}

pub fn fix_buoy_owner(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let w = &mut s.world;
    for st in w.stations.values() {
        if !st.is_waypoint || !st.has_facility(facility::DOCK) {
            continue;
        }
        if let Some(tile) = w.map.get_mut(st.xy) {
            if tile.owner() == Owner::NONE && tile.height == 0 {
                tile.set_owner(Owner::WATER);
            }
        }
    }
    Ok(())
}

/// Shares held by missing companies or by the company itself are void.
pub fn clear_invalid_share_owners(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let valid: Vec<_> = s.world.companies.ids();
    for (id, c) in s.world.companies.iter_mut() {
        for owner in c.share_owners.iter_mut() {
            if *owner == Owner::INVALID {
                continue;
            }
            let alive = owner.company().is_some_and(|o| valid.contains(&o));
            if !alive || *owner == Owner::from(id) {
                *owner = Owner::INVALID;
            }
        }
    }
    Ok(())
}

/// Rail track bits present on `tile` for the edge finder.
fn rail_tracks(tile: &Tile) -> u32 {
    match tile.kind {
        TileKind::Railway if tile.rail_tile_type().is_some_and(|ty| ty != RailTileType::Depot) => {
            tile.track_bits()
        }
        // A crossing's rail runs across the road axis.
        TileKind::Road if tile.road_tile_type() == Some(RoadTileType::Crossing) => {
            if tile.crossing_road_axis() == 0 { 2 } else { 1 }
        }
        _ => 0,
    }
}

/// Owner of a connected rail neighbour, if any neighbour has a live owner.
fn connected_rail_owner(world: &World, map: &TileMap, t: TileIndex, tile: &Tile) -> Option<Owner> {
    let own = rail_tracks(tile);
    DiagDirection::ALL.into_iter().find_map(|dir| {
        if own & EDGE_TRACKS[dir as usize] == 0 {
            return None;
        }
        let n = map.neighbour(t, dir)?;
        let other = map.get(n)?;
        let connects = rail_tracks(other) & EDGE_TRACKS[dir.reverse() as usize] != 0;
        (connects && world.is_valid_company(other.owner())).then(|| other.owner())
    })
}

/// Rail owned by nobody valid goes to a train standing on it, then to a
/// connected rail owner. Failing both, a crossing becomes plain road and
/// plain rail becomes grass.
fn fix_rail_owner(world: &World, t: TileIndex, tile: &mut Tile) {
    let on_tile = world
        .vehicles
        .values()
        .find(|v| v.kind() == VehicleType::Train && v.tile == t)
        .map(|v| v.owner);
    if let Some(owner) = on_tile.or_else(|| connected_rail_owner(world, &world.map, t, tile)) {
        tile.set_owner(owner);
        return;
    }
    if tile.is_level_crossing() {
        let road_owner = tile.road_owner();
        tile.m5 = if tile.crossing_road_axis() == 0 { ROAD_X } else { ROAD_Y };
        tile.m3 = sb(tile.m3 as u32, 0, 4, 0) as u8;
        tile.set_owner(road_owner);
        debug!(tile = t.0, "crossing without rail owner became road");
    } else {
        tile.make_clear();
        debug!(tile = t.0, "ownerless rail removed");
    }
}

/// Border water gets the sea class and owners of vanished companies are
/// removed from water, buoys, drive-through stops, roads and rail.
pub fn repair_invalid_owners(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let (max_x, max_y) = (s.world.map.max_x(), s.world.map.max_y());
    for t in s.world.map.indices() {
        let Some(&before) = s.world.map.get(t) else { continue };
        let mut tile = before;
        let (x, y) = (s.world.map.tile_x(t), s.world.map.tile_y(t));
        let on_border = x == 0 || y == 0 || x + 1 == max_x || y + 1 == max_y;

        if (tile.kind == TileKind::Water || tile.is_buoy()) && on_border {
            tile.set_water_class(WaterClass::Sea);
        }

        if tile.kind == TileKind::Water || tile.is_buoy() || tile.is_drive_through_road_stop() {
            check_owner(t, tile.owner())?;
            if is_dead_company(&s.world, tile.owner()) {
                tile.set_owner(Owner::NONE);
            }
            if tile.is_drive_through_road_stop() && is_dead_company(&s.world, tile.road_owner()) {
                tile.set_road_owner(Owner::NONE);
            }
            if tile.is_buoy() {
                let st = s.world.stations.get_mut(tile.station()).ok_or_else(|| {
                    StepError::corrupt(format!("buoy at tile {} has no station", t.0))
                })?;
                st.owner = Owner::NONE;
            }
        } else if tile.kind == TileKind::Road {
            check_owner(t, tile.owner())?;
            if is_dead_company(&s.world, tile.road_owner()) {
                tile.set_road_owner(Owner::NONE);
            }
            if is_dead_company(&s.world, tile.tram_owner()) {
                tile.set_tram_owner(Owner::NONE);
            }
            if tile.is_level_crossing() && !s.world.is_valid_company(tile.owner()) {
                fix_rail_owner(&s.world, t, &mut tile);
            }
        } else if tile.kind == TileKind::Railway
            && tile.rail_tile_type().is_some_and(|ty| ty != RailTileType::Depot)
        {
            check_owner(t, tile.owner())?;
            if !s.world.is_valid_company(tile.owner()) {
                fix_rail_owner(&s.world, t, &mut tile);
            }
        }

        if tile != before {
            if let Some(slot) = s.world.map.get_mut(t) {
                *slot = tile;
            }
            s.dirty.mark_tile(t);
        }
    }
    Ok(())
}

pub fn reset_invalid_sign_owner(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let w = &mut s.world;
    let companies = &w.companies;
    for sign in w.signs.values_mut() {
        let valid = sign.owner.company().is_some_and(|c| companies.contains(c));
        if sign.owner != Owner::NONE && !valid {
            sign.owner = Owner::NONE;
        }
    }
    Ok(())
}

/// Stations of vanished companies (and rigs and buoys) belong to nobody.
pub fn reset_invalid_station_owner(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let w = &mut s.world;
    let companies = &w.companies;
    for st in w.stations.values_mut() {
        if !st.owner.company().is_some_and(|c| companies.contains(c)) {
            st.owner = Owner::NONE;
        }
    }
    Ok(())
}
