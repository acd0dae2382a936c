//! Vehicle repairs: positions inside tunnels and on bridges, aircraft
//! state, counters whose meaning changed, and vehicles the target format
//! cannot represent.

use tracing::{debug, warn};

use super::LoadSession;
use crate::entity::{
    DISASTER_SMALL_UFO, GVF_GOINGDOWN_BIT, GVF_GOINGUP_BIT, RVSB_IN_DEPOT, RVSB_WORMHOLE,
    VehicleDetail, VehicleType, aircraft, force_proceed, track_bits, vehicle_flags,
    vehicle_status,
};
use crate::error::{LoadWarning, StepError};
use crate::id::{Owner, TownId, VehicleId};
use crate::map::{DiagDirection, Direction, TileIndex, TileMap};
use crate::order::OrderKind;
use crate::tile::{RoadTileType, TileKind};

/// Pixel height of one height level.
const TILE_HEIGHT: i32 = 8;
/// Pixels along a tile edge.
const TILE_SIZE: i32 = 16;

/// Rotor speed of a helicopter in flight.
const ROTOR_FLYING_SPEED: u16 = 32;

fn bad_direction(id: VehicleId, raw: u8) -> StepError {
    StepError::corrupt(format!("vehicle {} faces invalid direction {raw}", id.0))
}

// ---------------------------------------------------------------------------
// Aircraft
// ---------------------------------------------------------------------------

/// Aircraft in very old snapshots are put back in the air (or in the
/// hangar when parked) and airport state is reset.
pub fn reset_old_aircraft(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for st in s.world.stations.values_mut() {
        st.airport.flags = 0;
    }
    let engines = &s.world.engines;
    let mut helicopters = Vec::new();
    for (id, v) in s.world.vehicles.iter_mut() {
        if !v.is_normal_aircraft() {
            continue;
        }
        let VehicleDetail::Aircraft { state, .. } = &mut v.detail else {
            continue;
        };
        if v.status & vehicle_status::STOPPED != 0 && *state == 0 {
            *state = aircraft::STATE_HANGAR;
            continue;
        }
        *state = aircraft::STATE_FLYING;
        v.status &= !(vehicle_status::STOPPED | vehicle_status::HIDDEN);
        if let Some(e) = engines.get(v.engine) {
            v.cur_speed = e.info.max_speed;
        }
        if !v.current_order.is(OrderKind::GotoStation) && !v.current_order.is(OrderKind::GotoDepot) {
            v.current_order.make_dummy();
        }
        v.z_pos = aircraft::FLYING_ALTITUDE;
        if v.subtype == aircraft::HELICOPTER {
            helicopters.push(id);
        }
    }
    for v in s.world.vehicles.values_mut() {
        if v.subtype == aircraft::ROTOR && helicopters.contains(&v.first) {
            v.cur_speed = ROTOR_FLYING_SPEED;
        }
    }
    Ok(())
}

pub fn rescale_aircraft_speed(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let engines = &s.world.engines;
    for (id, v) in s.world.vehicles.iter_mut() {
        if !v.is_normal_aircraft() {
            continue;
        }
        let info = engines.get(v.engine).map(|e| e.info).ok_or_else(|| {
            StepError::corrupt(format!("aircraft {} uses missing engine {}", id.0, v.engine.0))
        })?;
        v.cur_speed = (v.cur_speed as u32 * 128 / 10).min(u16::MAX as u32) as u16;
        v.acceleration = info.acceleration;
    }
    Ok(())
}

/// Aircraft whose destination airport vanished while they were on the
/// ground are sent back into the air.
pub fn launch_stranded_aircraft(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let stations = &s.world.stations;
    for v in s.world.vehicles.values_mut() {
        if !v.is_normal_aircraft() {
            continue;
        }
        let crashed = v.has_status(vehicle_status::CRASHED);
        let VehicleDetail::Aircraft {
            state,
            target_airport,
            ..
        } = &mut v.detail
        else {
            continue;
        };
        let has_target = stations
            .get(*target_airport)
            .is_some_and(|st| st.airport.tile.is_valid());
        if has_target || *state == aircraft::STATE_FLYING {
            continue;
        }
        *state = aircraft::STATE_FLYING;
        if !crashed {
            v.z_pos = aircraft::FLYING_ALTITUDE;
        }
    }
    Ok(())
}

pub fn reset_aircraft_acceleration(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let engines = &s.world.engines;
    for (id, v) in s.world.vehicles.iter_mut() {
        if !v.is_normal_aircraft() {
            continue;
        }
        let e = engines.get(v.engine).ok_or_else(|| {
            StepError::corrupt(format!("aircraft {} uses missing engine {}", id.0, v.engine.0))
        })?;
        v.acceleration = e.info.acceleration;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Ground vehicles and wormholes
// ---------------------------------------------------------------------------

pub fn clear_road_vehicle_status_bit(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for v in s.world.vehicles.values_mut() {
        if v.kind() == VehicleType::Road {
            v.status &= !0x40;
        }
    }
    Ok(())
}

/// The northern ramp of a bridge spanning `t`.
fn northern_bridge_end(map: &TileMap, t: TileIndex) -> Option<TileIndex> {
    for dir in [DiagDirection::NE, DiagDirection::NW] {
        let mut cur = t;
        while let Some(next) = map.neighbour(cur, dir) {
            cur = next;
            let Some(tile) = map.get(cur) else { break };
            if tile.kind == TileKind::TunnelBridge
                && tile.is_bridge()
                && tile.tunnel_bridge_direction() == dir.reverse()
            {
                return Some(cur);
            }
        }
    }
    None
}

/// Highest pixel height of the ground on `t`.
fn ground_pixel_z(map: &TileMap, t: TileIndex) -> i32 {
    map.get(t).map_or(0, |tile| {
        tile.height as i32 * TILE_HEIGHT + if tile.is_flat() { 0 } else { TILE_HEIGHT }
    })
}

/// Road tiles without a town are linked to one, and ground vehicles on or
/// above a bridge are moved into the bridge's wormhole.
pub fn fix_vehicle_bridge_positions(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for t in s.world.map.indices() {
        let Some(&tile) = s.world.map.get(t) else { continue };
        if tile.kind != TileKind::Road
            || tile.road_tile_type() != Some(RoadTileType::Normal)
            || tile.town() != TownId::INVALID
        {
            continue;
        }
        let town = if tile.owner() == Owner::TOWN {
            s.world.closest_town(t).unwrap_or(TownId(0))
        } else {
            TownId(0)
        };
        if let Some(slot) = s.world.map.get_mut(t) {
            slot.set_town(town);
        }
    }

    let map = &s.world.map;
    for (id, v) in s.world.vehicles.iter_mut() {
        if !v.is_ground_vehicle() {
            continue;
        }
        let on_bridge = map
            .get(v.tile)
            .filter(|tile| tile.kind == TileKind::TunnelBridge && tile.is_bridge())
            .copied();
        if let Some(tile) = on_bridge {
            let dir = tile.tunnel_bridge_direction();
            let vdir = Direction::from_raw(v.direction).ok_or_else(|| bad_direction(id, v.direction))?;
            if vdir.to_diag() != dir {
                continue;
            }
            let at_edge = match dir {
                DiagDirection::NE => v.x_pos & 0xF == 0,
                DiagDirection::SE => v.y_pos & 0xF == TILE_SIZE - 1,
                DiagDirection::SW => v.x_pos & 0xF == TILE_SIZE - 1,
                DiagDirection::NW => v.y_pos & 0xF == 0,
            };
            if !at_edge {
                continue;
            }
        } else if v.z_pos > ground_pixel_z(map, v.tile) {
            v.tile = northern_bridge_end(map, v.tile).ok_or_else(|| {
                StepError::corrupt(format!("vehicle {} floats above tile {} with no bridge", id.0, v.tile.0))
            })?;
        } else {
            continue;
        }
        match &mut v.detail {
            VehicleDetail::Train { track, .. } => *track = track_bits::WORMHOLE,
            VehicleDetail::Road { state, .. } => *state = RVSB_WORMHOLE,
            _ => {}
        }
    }
    Ok(())
}

/// A vehicle inside a wormhole, heading into it, belongs to the far end.
pub fn fix_wormhole_tiles(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let map = &s.world.map;
    let mut moved = 0usize;
    for (id, v) in s.world.vehicles.iter_mut() {
        let in_wormhole = match v.detail {
            VehicleDetail::Train { track, .. } => track == track_bits::WORMHOLE,
            VehicleDetail::Road { state, .. } => state == RVSB_WORMHOLE,
            VehicleDetail::Ship { state } => state == track_bits::WORMHOLE,
            _ => continue,
        };
        if !in_wormhole {
            continue;
        }
        let tile = map
            .get(v.tile)
            .filter(|tile| tile.kind == TileKind::TunnelBridge)
            .ok_or_else(|| {
                StepError::corrupt(format!(
                    "vehicle {} is in a wormhole but tile {} is no tunnel or bridge",
                    id.0, v.tile.0
                ))
            })?;
        if v.direction != tile.tunnel_bridge_direction().to_direction() as u8 {
            continue;
        }
        v.tile = map.other_tunnel_bridge_end(v.tile).ok_or_else(|| {
            StepError::corrupt(format!("tunnel or bridge at tile {} has no far end", v.tile.0))
        })?;
        moved += 1;
    }
    if moved > 0 {
        debug!(moved, "moved vehicles to the far end of their wormhole");
    }
    Ok(())
}

/// Slope of a tile raised along one whole edge.
fn raised_edge(slope: u8) -> Option<DiagDirection> {
    match slope {
        12 => Some(DiagDirection::NE),
        6 => Some(DiagDirection::SE),
        3 => Some(DiagDirection::SW),
        9 => Some(DiagDirection::NW),
        _ => None,
    }
}

/// Going-up/going-down flags for a vehicle heading `dir` across `slope`.
fn inclination(slope: u8, dir: DiagDirection) -> u16 {
    match raised_edge(slope) {
        Some(edge) if edge == dir => 1 << GVF_GOINGUP_BIT,
        Some(edge) if edge == dir.reverse() => 1 << GVF_GOINGDOWN_BIT,
        _ => 0,
    }
}

/// Slope flags moved from the train flags to the ground vehicle flags and
/// are recomputed from the tile under each vehicle.
pub fn clear_slope_flags(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let map = &s.world.map;
    for (id, v) in s.world.vehicles.iter_mut() {
        if !v.is_ground_vehicle() {
            continue;
        }
        v.gv_flags &= !((1 << GVF_GOINGUP_BIT) | (1 << GVF_GOINGDOWN_BIT));
        if let VehicleDetail::Train { flags, .. } = &mut v.detail {
            *flags &= !((1 << 1) | (1 << 2));
        }
        if v.has_status(vehicle_status::CRASHED) {
            continue;
        }
        let straight = match v.detail {
            VehicleDetail::Train { track, .. } => track == track_bits::X || track == track_bits::Y,
            VehicleDetail::Road { state, .. } => state != RVSB_IN_DEPOT && state != RVSB_WORMHOLE,
            _ => false,
        };
        let dir = Direction::from_raw(v.direction).ok_or_else(|| bad_direction(id, v.direction))?;
        // Only diagonal headings run along X/Y pieces.
        if !straight || dir as u8 & 1 == 0 {
            continue;
        }
        let Some(tile) = map.get(v.tile) else { continue };
        v.gv_flags |= inclination(tile.slope, dir.to_diag());

        if tile.kind == TileKind::TunnelBridge
            && tile.is_bridge()
            && map.tile_xy((v.x_pos / TILE_SIZE) as u32, (v.y_pos / TILE_SIZE) as u32) == v.tile
        {
            let bridge_dir = tile.tunnel_bridge_direction();
            if let VehicleDetail::Train { track, .. } = &mut v.detail {
                if v.direction != bridge_dir.to_direction() as u8 {
                    *track = if bridge_dir.axis() == 0 { track_bits::X } else { track_bits::Y };
                }
            }
        }
    }
    Ok(())
}

pub fn move_pathfinder_lost_flag(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    const OLD_LOST_BIT: u16 = 1 << 5;
    for v in s.world.vehicles.values_mut() {
        let VehicleDetail::Train { flags, .. } = &mut v.detail else {
            continue;
        };
        if *flags & OLD_LOST_BIT != 0 {
            *flags &= !OLD_LOST_BIT;
            v.set_flag(vehicle_flags::PATHFINDER_LOST, true);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Counters and flags
// ---------------------------------------------------------------------------

pub fn clear_paid_flag(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for v in s.world.vehicles.values_mut() {
        v.set_flag(vehicle_flags::CARGO_PAID, false);
    }
    Ok(())
}

pub fn fix_road_vehicle_state(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for v in s.world.vehicles.values_mut() {
        if let VehicleDetail::Road { state, .. } = &mut v.detail {
            if *state == 250 || *state == 251 {
                *state |= 1 << 2;
            }
        }
    }
    Ok(())
}

/// Profits gained eight fractional bits.
pub fn scale_vehicle_profits(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for v in s.world.vehicles.values_mut() {
        v.profit_this_year <<= 8;
        v.profit_last_year <<= 8;
        v.running_ticks = 0;
    }
    Ok(())
}

pub fn reset_force_proceed(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for v in s.world.vehicles.values_mut() {
        if let VehicleDetail::Train { force_proceed: fp, .. } = &mut v.detail {
            if *fp != force_proceed::NONE {
                *fp = force_proceed::STUCK;
            }
        }
    }
    Ok(())
}

/// The shared load/unload counter got separate per-kind counterparts.
pub fn split_wait_counter(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for v in s.world.vehicles.values_mut() {
        let counter = if v.current_order.is(OrderKind::Loading) {
            0
        } else {
            v.load_unload_ticks
        };
        match &mut v.detail {
            VehicleDetail::Aircraft { turn_counter, .. } => *turn_counter = counter,
            VehicleDetail::Train { wait_counter, .. } => *wait_counter = counter,
            _ => {}
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Removals
// ---------------------------------------------------------------------------

/// Remove every vehicle of the consist led by each front in `fronts`,
/// together with the records pointing at them.
fn delete_consists(s: &mut LoadSession<'_>, fronts: &[VehicleId]) {
    let w = &mut s.world;
    w.vehicles.retain(|_, v| !fronts.contains(&v.first));
    w.cargo_payments.retain(|_, cp| !fronts.contains(&cp.front));
    for st in w.stations.values_mut() {
        st.loading_vehicles.retain(|v| !fronts.contains(v));
    }
}

/// Trams cannot run without tram track, which these snapshots lack.
pub fn remove_trams(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let engines = &s.world.engines;
    let trams: Vec<VehicleId> = s
        .world
        .vehicles
        .iter()
        .filter(|(id, v)| {
            v.kind() == VehicleType::Road
                && v.is_front(*id)
                && engines.get(v.engine).is_some_and(|e| e.info.is_tram)
        })
        .map(|(id, _)| id)
        .collect();
    if trams.is_empty() {
        return Ok(());
    }
    warn!(count = trams.len(), "removing trams");
    delete_consists(s, &trams);
    s.warn(LoadWarning::TramsRemoved {
        count: trams.len() as u32,
    });
    Ok(())
}

/// A small UFO hunts a road vehicle; one whose target is gone is removed.
pub fn remove_stray_ufos(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let vehicles = &s.world.vehicles;
    let stray: Vec<VehicleId> = vehicles
        .iter()
        .filter(|(_, v)| {
            v.kind() == VehicleType::Disaster
                && v.subtype == DISASTER_SMALL_UFO
                && v.current_order.destination != 0
        })
        .filter(|(_, v)| {
            let target = VehicleId(v.dest_tile.0);
            !vehicles
                .get(target)
                .is_some_and(|u| u.kind() == VehicleType::Road && u.is_front(target))
        })
        .map(|(id, _)| id)
        .collect();
    delete_consists(s, &stray);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Engine, EngineInfo, Vehicle};
    use crate::id::EngineId;
    use crate::order::Order;
    use crate::test_utils::{apply_step, place, run_step, small_world};
    use crate::tile::Tile;
    use crate::version::{CURRENT_VERSION, SaveVersion};
    use crate::world::World;

    fn train(world: &World, id: u32, x: u32, y: u32) -> Vehicle {
        let detail = VehicleDetail::Train {
            track: track_bits::X,
            railtype: 0,
            force_proceed: 0,
            flags: 0,
            wait_counter: 0,
            total_length: 16,
        };
        Vehicle::new(VehicleId(id), detail, Owner(0), world.map.tile_xy(x, y))
    }

    fn bridge_ramp(dir: DiagDirection) -> Tile {
        let mut t = Tile::new(TileKind::TunnelBridge);
        t.m5 = 0x80 | dir as u8;
        t
    }

    #[test]
    fn wormhole_vehicle_moves_to_far_end() {
        let mut world = small_world();
        place(&mut world, 3, 5, bridge_ramp(DiagDirection::SW));
        place(&mut world, 7, 5, bridge_ramp(DiagDirection::NE));
        let mut v = train(&world, 0, 3, 5);
        v.detail = VehicleDetail::Train {
            track: track_bits::WORMHOLE,
            railtype: 0,
            force_proceed: 0,
            flags: 0,
            wait_counter: 0,
            total_length: 16,
        };
        v.direction = Direction::SW as u8;
        world.vehicles.insert_at(VehicleId(0), v).unwrap();

        let world = apply_step(world, CURRENT_VERSION, "fix_wormhole_tiles").unwrap();
        assert_eq!(world.vehicles.get(VehicleId(0)).unwrap().tile, world.map.tile_xy(7, 5));

        // Already at the far end: running again changes nothing.
        let again = apply_step(world.clone(), CURRENT_VERSION, "fix_wormhole_tiles").unwrap();
        assert_eq!(again, world);
    }

    #[test]
    fn wormhole_vehicle_off_bridge_is_corrupt() {
        let mut world = small_world();
        let mut v = Vehicle::new(
            VehicleId(0),
            VehicleDetail::Road {
                state: RVSB_WORMHOLE,
                frame: 0,
            },
            Owner(0),
            TileIndex(20),
        );
        v.direction = 1;
        world.vehicles.insert_at(VehicleId(0), v).unwrap();
        let res = apply_step(world, CURRENT_VERSION, "fix_wormhole_tiles");
        assert!(matches!(res, Err(StepError::Corrupt(_))));
    }

    #[test]
    fn bridge_vehicle_with_bad_direction_is_corrupt() {
        let mut world = small_world();
        place(&mut world, 3, 5, bridge_ramp(DiagDirection::SW));
        let mut v = train(&world, 0, 3, 5);
        v.direction = 9;
        world.vehicles.insert_at(VehicleId(0), v).unwrap();
        let res = apply_step(world, SaveVersion::new(41, 0), "fix_vehicle_bridge_positions");
        assert!(matches!(res, Err(StepError::Corrupt(_))));
    }

    #[test]
    fn trams_are_removed_with_warning() {
        let mut world = small_world();
        let tram = EngineInfo {
            railtype: 0,
            is_tram: true,
            acceleration: 0,
            max_speed: 0,
        };
        world
            .engines
            .insert_at(
                EngineId(1),
                Engine {
                    kind: VehicleType::Road,
                    intro_date: 0,
                    company_avail: 0,
                    info: tram,
                },
            )
            .unwrap();
        let detail = VehicleDetail::Road { state: 0, frame: 0 };
        let mut front = Vehicle::new(VehicleId(0), detail.clone(), Owner(0), TileIndex(20));
        front.engine = EngineId(1);
        let mut trailer = Vehicle::new(VehicleId(0), detail.clone(), Owner(0), TileIndex(20));
        trailer.engine = EngineId(1);
        let bus = Vehicle::new(VehicleId(2), detail, Owner(0), TileIndex(21));
        world.vehicles.insert_at(VehicleId(0), front).unwrap();
        world.vehicles.insert_at(VehicleId(1), trailer).unwrap();
        world.vehicles.insert_at(VehicleId(2), bus).unwrap();

        let run = run_step(world, SaveVersion::new(61, 0), "remove_trams");
        assert!(run.result.is_ok());
        assert_eq!(run.world.vehicles.ids(), vec![VehicleId(2)]);
        assert_eq!(run.warnings, vec![LoadWarning::TramsRemoved { count: 1 }]);
    }

    #[test]
    fn ufo_without_target_is_removed() {
        let mut world = small_world();
        let mut ufo = Vehicle::new(VehicleId(0), VehicleDetail::Disaster, Owner::NONE, TileIndex(30));
        ufo.subtype = DISASTER_SMALL_UFO;
        ufo.current_order = Order::new(OrderKind::Nothing, 1);
        ufo.dest_tile = TileIndex(5);
        world.vehicles.insert_at(VehicleId(0), ufo).unwrap();
        let world = apply_step(world, SaveVersion::new(120, 0), "remove_stray_ufos").unwrap();
        assert!(world.vehicles.is_empty());
    }

    #[test]
    fn wait_counter_split_by_kind() {
        let mut world = small_world();
        let mut t = train(&world, 0, 2, 2);
        t.load_unload_ticks = 40;
        world.vehicles.insert_at(VehicleId(0), t).unwrap();
        let world = apply_step(world, SaveVersion::new(135, 0), "split_wait_counter").unwrap();
        let v = world.vehicles.get(VehicleId(0)).unwrap();
        assert!(matches!(v.detail, VehicleDetail::Train { wait_counter: 40, .. }));
    }

    #[test]
    fn slope_flags_follow_heading() {
        assert_eq!(inclination(12, DiagDirection::NE), 1 << GVF_GOINGUP_BIT);
        assert_eq!(inclination(12, DiagDirection::SW), 1 << GVF_GOINGDOWN_BIT);
        assert_eq!(inclination(12, DiagDirection::SE), 0);
        assert_eq!(inclination(0, DiagDirection::NE), 0);
    }

    #[test]
    fn stranded_aircraft_take_off() {
        let mut world = small_world();
        let mut a = Vehicle::new(
            VehicleId(0),
            VehicleDetail::Aircraft {
                state: aircraft::STATE_HANGAR,
                turn_counter: 0,
                target_airport: crate::id::StationId(7),
            },
            Owner(0),
            TileIndex(20),
        );
        a.subtype = aircraft::AIRCRAFT;
        world.vehicles.insert_at(VehicleId(0), a).unwrap();
        let world = apply_step(world, SaveVersion::new(145, 0), "launch_stranded_aircraft").unwrap();
        let a = world.vehicles.get(VehicleId(0)).unwrap();
        assert!(matches!(
            a.detail,
            VehicleDetail::Aircraft {
                state: aircraft::STATE_FLYING,
                ..
            }
        ));
        assert_eq!(a.z_pos, aircraft::FLYING_ALTITUDE);
    }
}
