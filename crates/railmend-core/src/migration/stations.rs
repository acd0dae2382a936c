//! Stations, waypoints and the records hanging off them.

use tracing::debug;

use super::LoadSession;
use super::depots::first_unused_number;
use super::water::make_water_keeping_class;
use crate::catalog::{AT_OILRIG, AT_OILRIG_LEGACY, airport_spec, industry_gfx};
use crate::entity::{CargoPayment, GES_PICKUP, VehicleType, facility, vehicle_flags, vehicle_status};
use crate::error::StepError;
use crate::id::{Owner, StationId, TownId};
use crate::map::{TileArea, TileIndex};
use crate::order::OrderKind;
use crate::tile::{StationType, TileKind};

fn dangling_station(t: TileIndex, id: StationId) -> StepError {
    StepError::corrupt(format!("station tile {} refers to missing station {}", t.0, id.0))
}

/// Before version 2 a rail station's platform size was not stored; it is
/// the smallest rectangle from the station's origin tile covering every
/// platform tile.
pub fn recompute_rail_station_size(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for st in s.world.stations.values_mut() {
        st.train_station.w = 0;
        st.train_station.h = 0;
    }
    let map = &s.world.map;
    for (t, tile) in map.iter() {
        if !tile.is_station_of(StationType::Rail) {
            continue;
        }
        let id = tile.station();
        let st = s
            .world
            .stations
            .get_mut(id)
            .ok_or_else(|| dangling_station(t, id))?;
        let origin = st.train_station.tile;
        if !origin.is_valid() {
            return Err(StepError::corrupt(format!(
                "station {} has platform tiles but no platform origin",
                id.0
            )));
        }
        let dx = map.tile_x(t) as i64 - map.tile_x(origin) as i64;
        let dy = map.tile_y(t) as i64 - map.tile_y(origin) as i64;
        if dx < 0 || dy < 0 {
            return Err(StepError::corrupt(format!(
                "platform tile {} lies north of the origin of station {}",
                t.0, id.0
            )));
        }
        st.train_station.w = st.train_station.w.max(dx as u16 + 1);
        st.train_station.h = st.train_station.h.max(dy as u16 + 1);
    }
    Ok(())
}

/// Every cargo payment is reachable from its front vehicle.
pub fn link_cargo_payments(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let vehicles = &mut s.world.vehicles;
    for (id, cp) in s.world.cargo_payments.iter_mut() {
        let front = vehicles.get_mut(cp.front).ok_or_else(|| {
            StepError::corrupt(format!(
                "cargo payment {} belongs to missing vehicle {}",
                id.0, cp.front.0
            ))
        })?;
        front.cargo_payment = Some(id);
        cp.current_station = front.last_station_visited;
    }
    Ok(())
}

/// An oil rig station whose industry is gone is torn down.
fn remove_phantom_oil_rigs(s: &mut LoadSession<'_>) -> usize {
    let mut removed = 0;
    for t in s.world.map.indices() {
        let Some(&tile) = s.world.map.get(t) else { continue };
        if !tile.is_oilrig() {
            continue;
        }
        let has_rig = s
            .world
            .map
            .offset(t, 0, 1)
            .and_then(|below| s.world.map.get(below))
            .is_some_and(|b| b.kind == TileKind::Industry && b.m5 == industry_gfx::OILRIG_1);
        if has_rig {
            if let Some(st) = s.world.stations.get_mut(tile.station()) {
                st.airport.kind = AT_OILRIG;
            }
            continue;
        }
        if let Some(slot) = s.world.map.get_mut(t) {
            make_water_keeping_class(slot, Owner::NONE);
        }
        s.world.stations.remove(tile.station());
        s.dirty.mark_tile(t);
        removed += 1;
    }
    removed
}

/// Station rectangles are derived from the map on every load. Before
/// version 6 road stops were not pooled and are recreated from the tiles.
pub fn reset_station_spread(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let removed = remove_phantom_oil_rigs(s);
    if removed > 0 {
        debug!(removed, "removed oil rig stations without an oil rig");
    }

    let early_stops = s.before(6);
    for st in s.world.stations.values_mut() {
        st.rect = TileArea::EMPTY;
    }
    let map = &s.world.map;
    for (t, tile) in map.iter() {
        if tile.kind != TileKind::Station {
            continue;
        }
        let id = tile.station();
        let st = s
            .world
            .stations
            .get_mut(id)
            .ok_or_else(|| dangling_station(t, id))?;
        st.rect.add(map, t);
        if !early_stops || st.is_waypoint {
            continue;
        }
        let stops = match tile.station_type() {
            StationType::Truck => &mut st.truck_stops,
            StationType::Bus => &mut st.bus_stops,
            _ => continue,
        };
        if !stops.contains(&t) {
            stops.push(t);
        }
    }
    Ok(())
}

pub fn reset_last_vehicle_type(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for st in s.world.stations.values_mut() {
        st.last_vehicle_type = 0xFF;
    }
    Ok(())
}

/// Loading queues were not saved before version 57.
pub fn rebuild_loading_queues(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let stations = &mut s.world.stations;
    for (id, v) in s.world.vehicles.iter_mut() {
        if v.kind() == VehicleType::Train && !v.is_front(id) {
            continue;
        }
        if v.has_status(vehicle_status::STOPPED | vehicle_status::CRASHED)
            || !v.current_order.is(OrderKind::Loading)
        {
            continue;
        }
        let st = stations.get_mut(v.last_station_visited).ok_or_else(|| {
            StepError::corrupt(format!(
                "vehicle {} is loading at missing station {}",
                id.0, v.last_station_visited.0
            ))
        })?;
        if !st.loading_vehicles.contains(&id) {
            st.loading_vehicles.push(id);
        }
        v.set_flag(vehicle_flags::LOADING_FINISHED, false);
    }
    Ok(())
}

/// A few versions kept vehicles queued after they had left.
pub fn prune_loading_queues(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let vehicles = &s.world.vehicles;
    for st in s.world.stations.values_mut() {
        st.loading_vehicles.retain(|&v| {
            vehicles
                .get(v)
                .is_some_and(|v| v.current_order.is(OrderKind::Loading))
        });
    }
    Ok(())
}

pub fn reset_goods_speed(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for st in s.world.stations.values_mut() {
        for ge in &mut st.goods {
            ge.last_speed = 0;
            if ge.waiting != 0 {
                ge.acceptance_pickup |= 1 << GES_PICKUP;
            }
        }
    }
    Ok(())
}

pub fn reset_station_industry_type(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for st in s.world.stations.values_mut() {
        st.indtype = 0xFF;
    }
    Ok(())
}

/// Tile 0 used to mean "none".
pub fn invalidate_zero_tiles(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let zero = TileIndex(0);
    for st in s.world.stations.values_mut() {
        if st.airport.tile == zero {
            st.airport.tile = TileIndex::INVALID;
        }
        if st.dock_tile == zero {
            st.dock_tile = TileIndex::INVALID;
        }
        if st.train_station.tile == zero {
            st.train_station.tile = TileIndex::INVALID;
        }
    }
    let very_old = s.before(4);
    for c in s.world.companies.values_mut() {
        let hq = c.location_of_hq;
        if hq == zero || (very_old && hq == TileIndex(0xFFFF)) {
            c.location_of_hq = TileIndex::INVALID;
        }
    }
    Ok(())
}

/// Vehicles that were loading when the game was saved get a payment record.
pub fn create_cargo_payments(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let w = &mut s.world;
    for (sid, st) in w.stations.iter() {
        for &vid in &st.loading_vehicles {
            let v = w.vehicles.get_mut(vid).ok_or_else(|| {
                StepError::corrupt(format!(
                    "station {} queues missing vehicle {}",
                    sid.0, vid.0
                ))
            })?;
            if v.cargo_payment.is_some() {
                continue;
            }
            let cp = w.cargo_payments.insert(CargoPayment {
                front: vid,
                current_station: v.last_station_visited,
            })?;
            v.cargo_payment = Some(cp);
        }
    }
    Ok(())
}

pub fn init_waypoint_area(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for wp in s.world.stations.values_mut().filter(|st| st.is_waypoint) {
        wp.train_station = if wp.has_facility(facility::TRAIN) {
            TileArea::new(wp.xy, 1, 1)
        } else {
            TileArea::EMPTY
        };
    }
    Ok(())
}

pub fn mark_station_acceptance(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for id in s.world.stations.ids() {
        s.dirty.mark_station(id);
    }
    Ok(())
}

pub fn renumber_oilrig_type(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for st in s.world.stations.values_mut() {
        if st.airport.tile.is_valid() && st.airport.kind == AT_OILRIG_LEGACY {
            st.airport.kind = AT_OILRIG;
        }
    }
    Ok(())
}

pub fn set_airport_size(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (id, st) in s.world.stations.iter_mut() {
        if !st.airport.tile.is_valid() {
            continue;
        }
        let spec = airport_spec(st.airport.kind).ok_or_else(|| {
            StepError::corrupt(format!(
                "station {} has unknown airport type {}",
                id.0, st.airport.kind
            ))
        })?;
        st.airport.w = spec.w;
        st.airport.h = spec.h;
    }
    Ok(())
}

/// Named waypoints get a fresh per-town number so a later rename back to
/// the default name does not collide.
pub fn renumber_waypoints(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let named: Vec<StationId> = s
        .world
        .stations
        .iter()
        .filter(|(_, st)| st.is_waypoint && st.name.is_some())
        .map(|(id, _)| id)
        .collect();
    for &id in &named {
        if let Some(wp) = s.world.stations.get_mut(id) {
            wp.town_cn = u16::MAX;
        }
    }
    for id in named {
        let Some(wp) = s.world.stations.get(id) else { continue };
        let buoy = wp.has_facility(facility::DOCK);
        let town = s.world.closest_town(wp.xy).unwrap_or(TownId::INVALID);
        let number = first_unused_number(
            s.world
                .stations
                .iter()
                .filter(|&(other, st)| {
                    other != id
                        && st.is_waypoint
                        && st.town == town
                        && st.has_facility(facility::DOCK) == buoy
                })
                .map(|(_, st)| st.town_cn),
        );
        if let Some(wp) = s.world.stations.get_mut(id) {
            wp.town = town;
            wp.town_cn = number;
        }
    }
    Ok(())
}
