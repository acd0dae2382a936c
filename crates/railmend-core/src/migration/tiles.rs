//! Map-cell layout conversions.
//!
//! Most of these steps move bits between the packed `m*` bytes because a
//! field was widened or relocated. They read raw bytes while the tile is
//! still in its old layout.
//!
//! The last step, [`audit_tile_layout`], decodes every cell under the
//! current layout and rejects the load if any cell does not decode.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::LoadSession;
use crate::catalog::{AIRPORT_GFX_LEGACY_RANGES, IndustryBehaviour, industry_gfx, industry_spec};
use crate::entity::{VehicleDetail, VehicleType, track_bits};
use crate::error::StepError;
use crate::id::{Owner, TownId};
use crate::map::{DiagDirection, TileIndex};
use crate::tile::{
    NEW_HOUSE_OFFSET, RoadTileType, StationType, Tile, TileKind, TileView, TransportType,
    WaterTileKind, clear_ground, gb, sb,
};
use crate::world::World;

const RAILTYPE_RAIL: u8 = 0;
const RAILTYPE_ELECTRIC: u8 = 1;

/// Fields planted around each farm when old fields are regenerated.
const FARM_FIELDS: usize = 50;
/// Fields are planted up to this many tiles away from the farm.
const FIELD_RADIUS: i32 = 8;

// ---------------------------------------------------------------------------
// Rail
// ---------------------------------------------------------------------------

/// Electrified rail was inserted after plain rail in the rail type list.
/// Every rail type from the first one in use upwards shifts by one, so a
/// map that never had electric trains keeps its rail "plain".
pub fn insert_electric_rail(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let w = &mut s.world;
    let mut min_rail = RAILTYPE_ELECTRIC;
    for (id, v) in w.vehicles.iter_mut() {
        let VehicleDetail::Train { railtype, .. } = &mut v.detail else { continue };
        let engine = w.engines.get(v.engine).ok_or_else(|| {
            StepError::corrupt(format!("train {} uses unknown engine {}", id.0, v.engine.0))
        })?;
        *railtype = engine.info.railtype;
        if *railtype == RAILTYPE_ELECTRIC {
            min_rail = RAILTYPE_RAIL;
        }
    }

    let mut shifted = 0usize;
    for (_, tile) in w.map.iter_mut() {
        let has_rail = match tile.kind {
            TileKind::Railway => true,
            TileKind::Road => tile.road_tile_type() == Some(RoadTileType::Crossing),
            TileKind::Station => tile.station_type().has_rail(),
            TileKind::TunnelBridge => tile.transport_type() == Some(TransportType::Rail),
            _ => false,
        };
        if has_rail && tile.rail_type() >= min_rail as u32 {
            tile.set_rail_type(tile.rail_type() + 1);
            shifted += 1;
        }
    }
    debug!(shifted, min_rail, "inserted electric rail type");
    Ok(())
}

/// Mark the tracks under every train as reserved.
pub fn reserve_train_tracks(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let w = &mut s.world;
    for v in w.vehicles.values() {
        let VehicleDetail::Train { track, .. } = v.detail else { continue };
        // Parts that lost their front engine reserve nothing.
        if !w.vehicles.contains(v.first) {
            continue;
        }
        if track & (track_bits::DEPOT | track_bits::WORMHOLE) != 0 {
            continue;
        }
        let Some(tile) = w.map.get_mut(v.tile) else { continue };
        match tile.kind {
            TileKind::Railway => tile.set_reserved_tracks(tile.reserved_tracks() | track as u32),
            TileKind::Road if tile.is_level_crossing() => tile.set_crossing_reserved(true),
            TileKind::Station if tile.has_station_rail() => tile.set_station_reserved(true),
            _ => {}
        }
    }
    Ok(())
}

/// Crossings are barred exactly when reserved or occupied by a train.
pub fn update_level_crossings(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let occupied: BTreeSet<TileIndex> = s
        .world
        .vehicles
        .values()
        .filter(|v| v.kind() == VehicleType::Train)
        .map(|v| v.tile)
        .collect();
    for (t, tile) in s.world.map.iter_mut() {
        if tile.is_level_crossing() {
            let barred = tile.crossing_reserved() || occupied.contains(&t);
            tile.set_crossing_barred(barred);
        }
    }
    Ok(())
}

/// Reservations on blocked station tiles could be left behind by a bug.
pub fn release_blocked_reservations(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (_, tile) in s.world.map.iter_mut() {
        if tile.has_station_rail() && tile.station_blocked() {
            tile.set_station_reserved(false);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Fields and fences
// ---------------------------------------------------------------------------

/// Old fields are wiped and each farm plants a fresh set.
pub fn remove_farm_fields(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (_, tile) in s.world.map.iter_mut() {
        if tile.kind == TileKind::Clear && tile.clear_ground() == clear_ground::FIELDS {
            tile.make_clear();
        }
    }

    let w = &mut s.world;
    let mut planted = 0usize;
    for (id, ind) in w.industries.iter() {
        let plants = industry_spec(ind.kind)
            .is_some_and(|spec| spec.behaviour.contains(IndustryBehaviour::PLANT_FIELDS));
        if !plants || !ind.location.tile.is_valid() {
            continue;
        }
        for _ in 0..FARM_FIELDS {
            let dx = w.rng.bits(5) as i32 % (2 * FIELD_RADIUS + 1) - FIELD_RADIUS;
            let dy = w.rng.bits(5) as i32 % (2 * FIELD_RADIUS + 1) - FIELD_RADIUS;
            let Some(t) = w.map.offset(ind.location.tile, dx, dy) else { continue };
            let Some(tile) = w.map.get_mut(t) else { continue };
            let ground = tile.clear_ground();
            if tile.kind != TileKind::Clear
                || !tile.is_flat()
                || !(ground == clear_ground::GRASS || ground == clear_ground::ROUGH)
            {
                continue;
            }
            tile.set_clear_ground(clear_ground::FIELDS);
            tile.set_clear_density(0);
            tile.set_owner(Owner::NONE);
            tile.m2 = id.0;
            planted += 1;
        }
    }
    debug!(planted, "planted farm fields");
    Ok(())
}

fn is_field(s: &LoadSession<'_>, t: Option<TileIndex>) -> bool {
    t.and_then(|t| s.world.map.get(t))
        .is_some_and(|n| n.kind == TileKind::Clear && n.clear_ground() == clear_ground::FIELDS)
}

/// Fences used to be stored on the neighbour of a field. Fields now keep
/// all four of their own fences.
pub fn move_field_fences(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for t in s.world.map.indices() {
        let Some(&tile) = s.world.map.get(t) else { continue };
        let candidate = matches!(tile.kind, TileKind::Clear | TileKind::Trees);
        if !candidate || (tile.kind == TileKind::Clear && tile.clear_ground() == clear_ground::FIELDS) {
            continue;
        }
        let moves = [
            (gb(tile.m4 as u32, 5, 3), s.world.map.offset(t, 1, 0), DiagDirection::NE),
            (gb(tile.m4 as u32, 2, 3), s.world.map.offset(t, 0, 1), DiagDirection::NW),
        ];
        for (fence, target, edge) in moves {
            if fence == 0 || !is_field(s, target) {
                continue;
            }
            if let Some(field) = target.and_then(|n| s.world.map.get_mut(n)) {
                field.set_fence(edge, fence);
            }
        }
        if let Some(slot) = s.world.map.get_mut(t) {
            slot.m4 = sb(slot.m4 as u32, 2, 6, 0) as u8;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Animation
// ---------------------------------------------------------------------------

/// Industry animation state moved from `m1` to `m3`.
pub fn move_industry_animation(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (_, tile) in s.world.map.iter_mut() {
        if tile.kind != TileKind::Industry {
            continue;
        }
        let m1 = tile.m1 as u32;
        tile.m3 = match tile.m5 {
            industry_gfx::POWERPLANT_SPARKS => gb(m1, 2, 5),
            industry_gfx::OILWELL_ANIMATED_1
            | industry_gfx::OILWELL_ANIMATED_2
            | industry_gfx::OILWELL_ANIMATED_3 => gb(m1, 0, 2),
            industry_gfx::COAL_MINE_TOWER_ANIMATED
            | industry_gfx::COPPER_MINE_TOWER_ANIMATED
            | industry_gfx::GOLD_MINE_TOWER_ANIMATED => m1,
            _ => continue,
        } as u8;
    }
    Ok(())
}

/// House animation frames grew from 5 to 7 bits.
pub fn widen_house_animation(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (_, tile) in s.world.map.iter_mut() {
        if tile.kind == TileKind::House && tile.house_type() >= NEW_HOUSE_OFFSET {
            tile.m6 = sb(tile.m6 as u32, 2, 6, gb(tile.m6 as u32, 3, 5)) as u8;
            tile.m3 = sb(tile.m3 as u32, 5, 1, 0) as u8;
        }
    }
    Ok(())
}

/// Animation frames of houses, industries and objects moved to `m7`.
pub fn move_animation_frames(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (_, tile) in s.world.map.iter_mut() {
        match tile.kind {
            TileKind::House if tile.house_type() >= NEW_HOUSE_OFFSET => {
                let per_proc = tile.m7 as u32;
                tile.m7 = (gb(tile.m6 as u32, 2, 6) | (gb(tile.m3 as u32, 5, 1) << 6)) as u8;
                tile.m3 = sb(tile.m3 as u32, 5, 1, 0) as u8;
                tile.m6 = sb(tile.m6 as u32, 2, 6, per_proc.min(63)) as u8;
            }
            TileKind::Industry => std::mem::swap(&mut tile.m3, &mut tile.m7),
            TileKind::Object => {
                tile.m7 = tile.m3;
                tile.m3 = 0;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Airport tiles used one graphic per animation frame. They now store the
/// first graphic of the animation plus a frame number.
pub fn convert_airport_gfx(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (_, tile) in s.world.map.iter_mut() {
        if !tile.is_station_of(StationType::Airport) {
            continue;
        }
        let old = tile.m5;
        let mut offset = 0u8;
        for (start, frames) in AIRPORT_GFX_LEGACY_RANGES {
            if old < start {
                tile.m5 = old - offset;
                break;
            }
            if old < start + frames {
                tile.m7 = old - start;
                tile.m5 = start - offset;
                break;
            }
            offset += frames - 1;
        }
    }
    Ok(())
}

/// Only tiles that animate stay in the animated list, each once.
pub fn dedupe_animated_tiles(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let map = &s.world.map;
    let before = s.world.animated_tiles.len();
    let mut seen = BTreeSet::new();
    s.world.animated_tiles.retain(|&t| {
        let animates = map
            .kind(t)
            .is_some_and(|k| matches!(k, TileKind::House | TileKind::Station | TileKind::Industry | TileKind::Object));
        animates && seen.insert(t)
    });
    let removed = before - s.world.animated_tiles.len();
    if removed > 0 {
        debug!(removed, "pruned animated tile list");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

pub fn reset_void_tropic_zone(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (_, tile) in s.world.map.iter_mut() {
        if tile.kind == TileKind::Void {
            tile.tropic_zone = crate::tile::TropicZone::Normal;
        }
    }
    Ok(())
}

/// Bay road stops got separate road and tram owners; both start as the
/// stop's owner.
pub fn fix_road_stop_owners(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (_, tile) in s.world.map.iter_mut() {
        if tile.is_standard_road_stop() {
            let owner = tile.owner();
            tile.set_road_owner(owner);
            tile.set_tram_owner(owner);
        }
    }
    Ok(())
}

/// Pool record a decoded cell points at that does not exist, if any.
fn dangling_reference(world: &World, tile: &Tile, view: TileView) -> Option<String> {
    match view {
        TileView::RailDepot { depot, .. } | TileView::RoadDepot { depot, .. } => {
            (!world.depots.contains(depot)).then(|| format!("{depot:?}"))
        }
        TileView::Water {
            kind: WaterTileKind::Depot,
            ..
        } => {
            let depot = tile.depot();
            (!world.depots.contains(depot)).then(|| format!("{depot:?}"))
        }
        TileView::Station { station, .. } => {
            (!world.stations.contains(station)).then(|| format!("{station:?}"))
        }
        TileView::Industry { industry, .. } => {
            (!world.industries.contains(industry)).then(|| format!("{industry:?}"))
        }
        TileView::Object { object, .. } => {
            (!world.objects.contains(object)).then(|| format!("{object:?}"))
        }
        TileView::House { town, .. } => (!world.towns.contains(town)).then(|| format!("{town:?}")),
        TileView::Road { town, .. } if town != TownId::INVALID => {
            (!world.towns.contains(town)).then(|| format!("{town:?}"))
        }
        _ => None,
    }
}

/// Every cell must decode under the current layout, and every pool record
/// a cell names must exist.
pub fn audit_tile_layout(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (t, tile) in s.world.map.iter() {
        let view = tile
            .decode()
            .map_err(|e| StepError::corrupt(format!("tile {}: {e}", t.0)))?;
        if let Some(missing) = dangling_reference(&s.world, tile, view) {
            return Err(StepError::corrupt(format!(
                "tile {} references missing {missing}",
                t.0
            )));
        }
    }
    info!(tiles = s.world.map.len(), "tile layout audit passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Engine, EngineInfo, Industry, Vehicle};
    use crate::entity::Depot;
    use crate::id::{DepotId, EngineId, StationId, VehicleId};
    use crate::map::TileArea;
    use crate::test_utils::{apply_step, place, small_world, station_tile};
    use crate::tile::{Tile, WaterClass};
    use crate::version::{CURRENT_VERSION, SaveVersion};
    use crate::world::World;

    fn train(world: &mut World, id: u32, tile: TileIndex, track: u8, engine: u16) {
        let detail = VehicleDetail::Train {
            track,
            railtype: 0,
            force_proceed: 0,
            flags: 0,
            wait_counter: 0,
            total_length: 0,
        };
        let mut v = Vehicle::new(VehicleId(id), detail, Owner(0), tile);
        v.engine = EngineId(engine);
        world.vehicles.insert_at(VehicleId(id), v).unwrap();
    }

    fn engine(world: &mut World, id: u16, railtype: u8) {
        let info = EngineInfo {
            railtype,
            is_tram: false,
            acceleration: 0,
            max_speed: 0,
        };
        world
            .engines
            .insert_at(
                EngineId(id),
                Engine {
                    kind: VehicleType::Train,
                    intro_date: 0,
                    company_avail: 0xFFFF,
                    info,
                },
            )
            .unwrap();
    }

    fn rail(rail_type: u32) -> Tile {
        let mut t = Tile::new(TileKind::Railway);
        t.set_owner(Owner(0));
        t.set_track_bits(1);
        t.set_rail_type(rail_type);
        t
    }

    #[test]
    fn electric_trains_shift_every_rail_type() {
        let mut world = small_world();
        engine(&mut world, 0, RAILTYPE_ELECTRIC);
        let at = world.map.tile_xy(3, 3);
        train(&mut world, 0, at, 1, 0);
        place(&mut world, 3, 3, rail(0));
        place(&mut world, 4, 3, rail(1));

        let world = apply_step(world, SaveVersion::new(23, 0), "insert_electric_rail").unwrap();
        let rt = |x, y| world.map.get(world.map.tile_xy(x, y)).unwrap().rail_type();
        assert_eq!((rt(3, 3), rt(4, 3)), (1, 2));
        let VehicleDetail::Train { railtype, .. } = world.vehicles.get(VehicleId(0)).unwrap().detail else {
            panic!("not a train");
        };
        assert_eq!(railtype, RAILTYPE_ELECTRIC);
    }

    #[test]
    fn plain_rail_maps_keep_rail_type() {
        let mut world = small_world();
        engine(&mut world, 0, RAILTYPE_RAIL);
        let at = world.map.tile_xy(3, 3);
        train(&mut world, 0, at, 1, 0);
        place(&mut world, 3, 3, rail(0));
        let world = apply_step(world, SaveVersion::new(23, 0), "insert_electric_rail").unwrap();
        assert_eq!(world.map.get(world.map.tile_xy(3, 3)).unwrap().rail_type(), 0);
    }

    #[test]
    fn train_reserves_its_track_and_bars_crossing() {
        let mut world = small_world();
        place(&mut world, 3, 3, rail(0));
        let mut crossing = Tile::new(TileKind::Road);
        crossing.m5 = 1 << 6;
        place(&mut world, 5, 5, crossing);
        let (a, b) = (world.map.tile_xy(3, 3), world.map.tile_xy(5, 5));
        train(&mut world, 0, a, track_bits::X, 0);
        train(&mut world, 1, b, track_bits::Y, 0);

        let world = apply_step(world, SaveVersion::new(100, 0), "reserve_train_tracks").unwrap();
        assert_eq!(world.map.get(a).unwrap().reserved_tracks(), 1);
        assert!(world.map.get(b).unwrap().crossing_reserved());

        let world = apply_step(world, SaveVersion::new(101, 0), "update_level_crossings").unwrap();
        assert!(world.map.get(b).unwrap().crossing_barred());
    }

    #[test]
    fn animated_list_keeps_animating_tiles_once() {
        let mut world = small_world();
        place(&mut world, 2, 2, Tile::new(TileKind::Industry));
        let ind = world.map.tile_xy(2, 2);
        let grass = world.map.tile_xy(3, 3);
        world.animated_tiles = vec![ind, grass, ind];
        let world = apply_step(world, SaveVersion::new(121, 0), "dedupe_animated_tiles").unwrap();
        assert_eq!(world.animated_tiles, vec![ind]);
    }

    #[test]
    fn airport_frames_split_from_gfx() {
        let mut world = small_world();
        let mut radar = station_tile(StationId(0), StationType::Airport, Owner(0));
        radar.m5 = 35;
        place(&mut world, 2, 2, radar);
        let mut plain = station_tile(StationId(0), StationType::Airport, Owner(0));
        plain.m5 = 60;
        place(&mut world, 3, 2, plain);

        let world = apply_step(world, SaveVersion::new(136, 0), "convert_airport_gfx").unwrap();
        let radar = world.map.get(world.map.tile_xy(2, 2)).unwrap();
        assert_eq!((radar.m5, radar.m7), (31, 4));
        // Below the third range: shifted by the frames folded so far.
        let plain = world.map.get(world.map.tile_xy(3, 2)).unwrap();
        assert_eq!(plain.m5, 60 - 11 - 3);
    }

    #[test]
    fn fences_move_onto_fields() {
        let mut world = small_world();
        let mut field = Tile::clear();
        field.set_clear_ground(clear_ground::FIELDS);
        place(&mut world, 5, 4, field);
        let mut grass = Tile::clear();
        grass.m4 = sb(0, 5, 3, 2) as u8;
        place(&mut world, 4, 4, grass);

        let world = apply_step(world, SaveVersion::new(163, 0), "move_field_fences").unwrap();
        assert_eq!(world.map.get(world.map.tile_xy(5, 4)).unwrap().fence(DiagDirection::NE), 2);
        assert_eq!(world.map.get(world.map.tile_xy(4, 4)).unwrap().m4, 0);
    }

    #[test]
    fn farms_replant_fields() {
        let mut world = small_world();
        let mut field = Tile::clear();
        field.set_clear_ground(clear_ground::FIELDS);
        place(&mut world, 0, 0, field);
        let area = TileArea::new(world.map.tile_xy(12, 12), 1, 1);
        world
            .industries
            .insert(Industry::new(area, crate::catalog::IT_FARM))
            .unwrap();
        let world = apply_step(world, SaveVersion::new(31, 0), "remove_farm_fields").unwrap();
        let fields = world
            .map
            .iter()
            .filter(|(_, t)| t.kind == TileKind::Clear && t.clear_ground() == clear_ground::FIELDS)
            .count();
        assert!(fields > 0);
        assert_ne!(
            world.map.get(world.map.tile_xy(0, 0)).unwrap().clear_ground(),
            clear_ground::FIELDS
        );
    }

    #[test]
    fn road_stop_owners_follow_tile_owner() {
        let mut world = small_world();
        place(&mut world, 2, 2, station_tile(StationId(0), StationType::Bus, Owner(0)));
        let world = apply_step(world, SaveVersion::new(171, 0), "fix_road_stop_owners").unwrap();
        let stop = world.map.get(world.map.tile_xy(2, 2)).unwrap();
        assert_eq!((stop.road_owner(), stop.tram_owner()), (Owner(0), Owner(0)));
    }

    #[test]
    fn audit_rejects_water_without_class() {
        let mut world = small_world();
        place(&mut world, 2, 2, Tile::water(WaterClass::Invalid, Owner::WATER));
        let res = apply_step(world, CURRENT_VERSION, "audit_tile_layout");
        assert!(matches!(res, Err(StepError::Corrupt(_))));
    }

    fn rail_depot(depot: u16) -> Tile {
        let mut t = Tile::new(TileKind::Railway);
        t.set_owner(Owner(0));
        t.m5 = 3 << 6;
        t.m2 = depot;
        t
    }

    #[test]
    fn audit_rejects_unknown_water_kind() {
        let mut world = small_world();
        let mut water = Tile::water(WaterClass::Sea, Owner::WATER);
        water.m5 = 5 << 4;
        place(&mut world, 2, 2, water);
        let res = apply_step(world, CURRENT_VERSION, "audit_tile_layout");
        assert!(matches!(res, Err(StepError::Corrupt(_))));
    }

    #[test]
    fn audit_rejects_meaningless_owner() {
        let mut world = small_world();
        let mut t = rail(0);
        t.set_owner(Owner(0x1A));
        place(&mut world, 2, 2, t);
        let res = apply_step(world, CURRENT_VERSION, "audit_tile_layout");
        assert!(matches!(res, Err(StepError::Corrupt(_))));
    }

    #[test]
    fn audit_rejects_depot_cell_without_depot_record() {
        let mut world = small_world();
        place(&mut world, 2, 2, rail_depot(0));
        let Err(StepError::Corrupt(reason)) =
            apply_step(world.clone(), CURRENT_VERSION, "audit_tile_layout")
        else {
            panic!("dangling depot accepted");
        };
        assert!(reason.contains("DepotId(0)"), "{reason}");

        let xy = world.map.tile_xy(2, 2);
        world.depots.insert_at(DepotId(0), Depot::new(xy)).unwrap();
        assert!(apply_step(world, CURRENT_VERSION, "audit_tile_layout").is_ok());
    }

    #[test]
    fn audit_rejects_cells_naming_missing_records() {
        let mut station = small_world();
        place(&mut station, 2, 2, station_tile(StationId(4), StationType::Bus, Owner(0)));

        let mut house = small_world();
        let mut h = Tile::new(TileKind::House);
        h.set_town(TownId(7));
        place(&mut house, 2, 2, h);

        let mut industry = small_world();
        place(&mut industry, 2, 2, Tile::new(TileKind::Industry));

        for world in [station, house, industry] {
            let res = apply_step(world, CURRENT_VERSION, "audit_tile_layout");
            assert!(matches!(res, Err(StepError::Corrupt(_))));
        }
    }

    #[test]
    fn audit_accepts_fresh_world() {
        assert!(apply_step(small_world(), CURRENT_VERSION, "audit_tile_layout").is_ok());
    }
}
