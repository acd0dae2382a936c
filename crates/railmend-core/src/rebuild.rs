//! Derived caches, rebuilt once after the last migration step.
//!
//! Nothing in here is persisted. Every cache is a pure function of the
//! migrated world (plus the dirty marks steps left behind), so rebuilding
//! an already consistent world yields identical caches.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::catalog::{
    CA_BUS, CA_DOCK, CA_NONE, CA_TRAIN, CA_TRUCK, CA_UNMODIFIED, airport_spec, house_acceptance,
};
use crate::context::{FileType, LoadContext};
use crate::dirty::DirtyCaches;
use crate::economy::BASE_PRICES;
use crate::entity::{SourceType, Station, VehicleType, facility};
use crate::id::{CompanyId, EngineId, IndustryId, Owner, StationId, TownId};
use crate::map::{TileArea, TileMap};
use crate::tile::{StationType, TileView, WaterClass};
use crate::world::World;

/// Infrastructure pieces a company pays maintenance for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InfrastructureCount {
    /// Track pieces, counted per track bit.
    pub rail: u32,
    pub road: u32,
    pub tram: u32,
    /// Canal tiles.
    pub water: u32,
    pub station: u32,
    pub airport: u32,
}

/// What a company can build with the engines available to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompanyCaps {
    /// One bit per rail type.
    pub railtypes: u16,
    pub trams: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStats {
    pub num_vehicles: u32,
    pub profit_last_year: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedCaches {
    /// Industries inside each station's catchment.
    pub station_industries: BTreeMap<StationId, Vec<IndustryId>>,
    pub infrastructure: BTreeMap<CompanyId, InfrastructureCount>,
    pub capabilities: BTreeMap<CompanyId, CompanyCaps>,
    /// Base prices scaled by the current inflation, in [`BASE_PRICES`] order.
    pub prices: Vec<i64>,
    /// Per company, indexed by [`VehicleType::COMPANY_TYPES`].
    pub group_stats: BTreeMap<CompanyId, [GroupStats; 4]>,
    /// Towns and industries at either end of an awarded subsidy.
    pub subsidised: BTreeSet<(SourceType, u16)>,
    pub town_noise: BTreeMap<TownId, u32>,
    /// Accepted cargo bitmask per station.
    pub station_acceptance: BTreeMap<StationId, u32>,
    pub town_acceptance: BTreeMap<TownId, u32>,
    /// Companies each engine is available to.
    pub engine_availability: BTreeMap<EngineId, u16>,
}

/// Rebuild every derived cache of `world`.
///
/// Station and town acceptance are only recomputed for what `dirty`
/// names; engine availability only when its partition is dirty.
pub fn rebuild_caches(world: &mut World, dirty: &DirtyCaches, ctx: &LoadContext) {
    if ctx.file_type == FileType::Scenario {
        let year = world.clock.cur_year;
        for c in world.companies.values_mut() {
            if c.inaugurated_year != 0 {
                c.inaugurated_year = year;
            }
        }
    }

    let mut caches = std::mem::take(&mut world.caches);
    caches.prices = BASE_PRICES
        .iter()
        .map(|&(_, base)| world.economy.inflated(base))
        .collect();
    caches.group_stats = group_stats(world);
    caches.station_industries = station_industries(world);
    caches.subsidised = world
        .subsidies
        .values()
        .filter(|s| s.awarded != Owner::INVALID)
        .flat_map(|s| [(s.src_type, s.src), (s.dst_type, s.dst)])
        .collect();
    caches.town_noise = town_noise(world);
    caches.infrastructure = infrastructure(world);
    caches.capabilities = capabilities(world);

    for &id in dirty.dirty_stations() {
        match world.stations.get(id) {
            Some(st) => {
                let mask = station_acceptance(world, st);
                caches.station_acceptance.insert(id, mask);
            }
            None => {
                caches.station_acceptance.remove(&id);
            }
        }
    }
    for &id in dirty.dirty_towns() {
        if world.towns.contains(id) {
            let mask = town_acceptance(&world.map, id);
            caches.town_acceptance.insert(id, mask);
        } else {
            caches.town_acceptance.remove(&id);
        }
    }
    if dirty.is_partition_dirty(DirtyCaches::PARTITION_ENGINES) {
        caches.engine_availability = engine_availability(world);
    }

    debug!(
        stations = caches.station_industries.len(),
        companies = caches.infrastructure.len(),
        "rebuilt derived caches"
    );
    world.caches = caches;
}

// ---------------------------------------------------------------------------
// Individual caches
// ---------------------------------------------------------------------------

fn group_stats(world: &World) -> BTreeMap<CompanyId, [GroupStats; 4]> {
    let mut stats: BTreeMap<CompanyId, [GroupStats; 4]> = world
        .companies
        .ids()
        .into_iter()
        .map(|c| (c, [GroupStats::default(); 4]))
        .collect();
    for (id, v) in world.vehicles.iter() {
        if !v.is_primary(id) {
            continue;
        }
        let Some(slot) = VehicleType::COMPANY_TYPES.iter().position(|&k| k == v.kind()) else {
            continue;
        };
        let Some(per_kind) = v.owner.company().and_then(|c| stats.get_mut(&c)) else {
            continue;
        };
        per_kind[slot].num_vehicles += 1;
        per_kind[slot].profit_last_year += v.profit_last_year;
    }
    stats
}

/// Catchment radius of a station under the current settings.
pub fn catchment_radius(world: &World, st: &Station) -> u32 {
    if !world.settings.station.modified_catchment {
        return CA_UNMODIFIED;
    }
    let mut r = CA_NONE;
    if st.has_facility(facility::BUS_STOP) {
        r = r.max(CA_BUS);
    }
    if st.has_facility(facility::TRUCK_STOP) {
        r = r.max(CA_TRUCK);
    }
    if st.has_facility(facility::TRAIN) {
        r = r.max(CA_TRAIN);
    }
    if st.has_facility(facility::DOCK) {
        r = r.max(CA_DOCK);
    }
    if st.has_facility(facility::AIRPORT) {
        r = r.max(airport_spec(st.airport.kind).map_or(CA_UNMODIFIED, |a| a.catchment));
    }
    r
}

/// Inclusive tile bounds `(x0, y0, x1, y1)` of a station's catchment.
fn catchment_bounds(map: &TileMap, st: &Station, radius: u32) -> Option<(u32, u32, u32, u32)> {
    let area = if st.rect.is_empty() {
        TileArea::new(st.xy, 1, 1)
    } else {
        st.rect
    };
    if area.is_empty() || !map.contains(area.tile) {
        return None;
    }
    let (x, y) = (map.tile_x(area.tile), map.tile_y(area.tile));
    Some((
        x.saturating_sub(radius),
        y.saturating_sub(radius),
        (x + area.w as u32 - 1 + radius).min(map.max_x()),
        (y + area.h as u32 - 1 + radius).min(map.max_y()),
    ))
}

fn station_industries(world: &World) -> BTreeMap<StationId, Vec<IndustryId>> {
    let map = &world.map;
    let mut index = BTreeMap::new();
    for (id, st) in world.stations.iter() {
        if st.is_waypoint {
            continue;
        }
        let radius = catchment_radius(world, st);
        let Some((x0, y0, x1, y1)) = catchment_bounds(map, st, radius) else {
            continue;
        };
        let near: Vec<IndustryId> = world
            .industries
            .iter()
            .filter(|(_, ind)| {
                let loc = ind.location;
                if loc.is_empty() || !map.contains(loc.tile) {
                    return false;
                }
                let (ix, iy) = (map.tile_x(loc.tile), map.tile_y(loc.tile));
                let (ex, ey) = (ix + loc.w as u32 - 1, iy + loc.h as u32 - 1);
                ix <= x1 && ex >= x0 && iy <= y1 && ey >= y0
            })
            .map(|(iid, _)| iid)
            .collect();
        index.insert(id, near);
    }
    index
}

/// Noise an airport makes in a town, falling off with distance and the
/// council's tolerance.
fn airport_noise(noise: u8, distance: u32, tolerance: u8) -> u32 {
    let noise = noise as u32;
    if noise < 2 {
        return noise;
    }
    let reduction = distance / (8 + tolerance as u32 * 4);
    if reduction >= noise { 1 } else { noise - reduction }
}

fn town_noise(world: &World) -> BTreeMap<TownId, u32> {
    let mut noise: BTreeMap<TownId, u32> = world.towns.ids().into_iter().map(|t| (t, 0)).collect();
    if !world.settings.economy.station_noise_level {
        return noise;
    }
    let tolerance = world.settings.economy.town_council_tolerance;
    for st in world.stations.values() {
        if !st.has_facility(facility::AIRPORT) {
            continue;
        }
        let Some(spec) = airport_spec(st.airport.kind) else { continue };
        let town = if world.towns.contains(st.town) {
            Some(st.town)
        } else {
            world.closest_town(st.airport.tile)
        };
        let Some(town) = town else { continue };
        let Some(xy) = world.towns.get(town).map(|t| t.xy) else { continue };
        let distance = world.map.distance_manhattan(xy, st.airport.tile);
        *noise.entry(town).or_default() += airport_noise(spec.noise, distance, tolerance);
    }
    noise
}

fn infrastructure(world: &World) -> BTreeMap<CompanyId, InfrastructureCount> {
    let mut counts: BTreeMap<CompanyId, InfrastructureCount> = world
        .companies
        .ids()
        .into_iter()
        .map(|c| (c, InfrastructureCount::default()))
        .collect();
    let mut bump = |owner: Owner, f: fn(&mut InfrastructureCount, u32), n: u32| {
        if let Some(count) = owner.company().and_then(|c| counts.get_mut(&c)) {
            f(count, n);
        }
    };

    for (_, tile) in world.map.iter() {
        let Ok(view) = tile.decode() else { continue };
        match view {
            TileView::Rail { owner, tracks, .. } => {
                bump(owner, |c, n| c.rail += n, tracks.count_ones());
            }
            TileView::RailDepot { owner, .. } => bump(owner, |c, n| c.rail += n, 1),
            TileView::Road { owner, tram_owner, .. } => {
                bump(owner, |c, n| c.road += n, 1);
                bump(tram_owner, |c, n| c.tram += n, 1);
            }
            TileView::LevelCrossing { rail_owner, road_owner, .. } => {
                bump(rail_owner, |c, n| c.rail += n, 1);
                bump(road_owner, |c, n| c.road += n, 1);
            }
            TileView::RoadDepot { owner, .. } => bump(owner, |c, n| c.road += n, 1),
            TileView::Station { kind, owner, .. } => {
                bump(owner, |c, n| c.station += n, 1);
                if kind.has_rail() {
                    bump(owner, |c, n| c.rail += n, 1);
                }
                if kind == StationType::Airport {
                    bump(owner, |c, n| c.airport += n, 1);
                }
            }
            TileView::Water { class: WaterClass::Canal, owner, .. } => {
                bump(owner, |c, n| c.water += n, 1);
            }
            _ => {}
        }
    }
    counts
}

fn capabilities(world: &World) -> BTreeMap<CompanyId, CompanyCaps> {
    let mut caps = BTreeMap::new();
    for c in world.companies.ids() {
        let bit = 1u16 << c.0;
        let mut cap = CompanyCaps::default();
        for e in world.engines.values() {
            if e.company_avail & bit == 0 {
                continue;
            }
            match e.kind {
                VehicleType::Train => cap.railtypes |= 1 << (e.info.railtype & 0x0F),
                VehicleType::Road if e.info.is_tram => cap.trams = true,
                _ => {}
            }
        }
        caps.insert(c, cap);
    }
    caps
}

fn accepted_mask(sums: &[u32; 32]) -> u32 {
    sums.iter()
        .enumerate()
        .filter(|&(_, &eighths)| eighths >= 8)
        .fold(0, |mask, (cargo, _)| mask | 1 << cargo)
}

fn add_house(sums: &mut [u32; 32], house_type: u32) {
    for (cargo, eighths) in house_acceptance(house_type) {
        if let Some(sum) = sums.get_mut(cargo as usize) {
            *sum += eighths as u32;
        }
    }
}

fn station_acceptance(world: &World, st: &Station) -> u32 {
    let radius = catchment_radius(world, st);
    let Some((x0, y0, x1, y1)) = catchment_bounds(&world.map, st, radius) else {
        return 0;
    };
    let mut sums = [0u32; 32];
    for y in y0..=y1 {
        for x in x0..=x1 {
            let t = world.map.tile_xy(x, y);
            if let Some(Ok(TileView::House { house_type, completed: true, .. })) =
                world.map.get(t).map(|tile| tile.decode())
            {
                add_house(&mut sums, house_type);
            }
        }
    }
    accepted_mask(&sums)
}

fn town_acceptance(map: &TileMap, town: TownId) -> u32 {
    let mut sums = [0u32; 32];
    for (_, tile) in map.iter() {
        if let Ok(TileView::House { town: t, house_type, completed: true }) = tile.decode() {
            if t == town {
                add_house(&mut sums, house_type);
            }
        }
    }
    accepted_mask(&sums)
}

fn engine_availability(world: &World) -> BTreeMap<EngineId, u16> {
    let all = world.companies.ids().into_iter().fold(0u16, |m, c| m | 1 << c.0);
    world
        .engines
        .iter()
        .map(|(id, e)| {
            let mask = if e.intro_date <= world.clock.date { all } else { 0 };
            (id, mask)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Company, Engine, EngineInfo, Industry, Subsidy};
    use crate::id::SubsidyId;
    use crate::test_utils::{place, small_world, station_tile};
    use crate::tile::{Tile, TileKind};

    fn rebuilt(mut world: World, dirty: &DirtyCaches) -> World {
        rebuild_caches(&mut world, dirty, &LoadContext::default());
        world
    }

    #[test]
    fn rebuilding_twice_is_stable() {
        let mut world = small_world();
        place(&mut world, 3, 3, station_tile(StationId(0), StationType::Rail, Owner(0)));
        world.stations.insert_at(StationId(0), Station::new(world.map.tile_xy(3, 3), Owner(0))).unwrap();
        let mut dirty = DirtyCaches::new();
        dirty.mark_station(StationId(0));
        dirty.mark_town(TownId(0));

        let once = rebuilt(world, &dirty);
        let twice = rebuilt(once.clone(), &dirty);
        assert_eq!(once.caches, twice.caches);
        assert_eq!(once.encode().unwrap(), twice.encode().unwrap());
    }

    #[test]
    fn industries_near_station_are_indexed() {
        let mut world = small_world();
        let mut st = Station::new(world.map.tile_xy(2, 2), Owner(0));
        st.facilities = facility::TRAIN;
        world.stations.insert_at(StationId(0), st).unwrap();
        let near = Industry::new(TileArea::new(world.map.tile_xy(5, 5), 2, 2), 0);
        let far = Industry::new(TileArea::new(world.map.tile_xy(12, 12), 2, 2), 0);
        world.industries.insert_at(IndustryId(0), near).unwrap();
        world.industries.insert_at(IndustryId(1), far).unwrap();

        let world = rebuilt(world, &DirtyCaches::new());
        assert_eq!(world.caches.station_industries[&StationId(0)], vec![IndustryId(0)]);
    }

    #[test]
    fn rail_pieces_count_per_track() {
        let mut world = small_world();
        let mut rail = Tile::new(TileKind::Railway);
        rail.set_owner(Owner(0));
        rail.m5 = 0b11; // X and Y
        place(&mut world, 4, 4, rail);
        let world = rebuilt(world, &DirtyCaches::new());
        assert_eq!(world.caches.infrastructure[&CompanyId(0)].rail, 2);
    }

    #[test]
    fn awarded_subsidy_ends_are_cached() {
        let mut world = small_world();
        world
            .subsidies
            .insert_at(
                SubsidyId(0),
                Subsidy {
                    cargo_type: 0,
                    remaining: 5,
                    awarded: Owner(0),
                    src_type: SourceType::Town,
                    dst_type: SourceType::Industry,
                    src: 0,
                    dst: 3,
                },
            )
            .unwrap();
        let world = rebuilt(world, &DirtyCaches::new());
        let expected: BTreeSet<_> = [(SourceType::Town, 0), (SourceType::Industry, 3)].into();
        assert_eq!(world.caches.subsidised, expected);
    }

    #[test]
    fn airport_noise_falls_off_with_distance() {
        assert_eq!(airport_noise(1, 100, 0), 1);
        assert_eq!(airport_noise(5, 0, 0), 5);
        assert_eq!(airport_noise(5, 17, 0), 3);
        assert_eq!(airport_noise(3, 1000, 0), 1);
    }

    #[test]
    fn scenario_load_resets_inauguration() {
        let mut world = small_world();
        world.clock.cur_year = 1975;
        world.companies.get_mut(CompanyId(0)).unwrap().inaugurated_year = 1950;
        world.companies.insert_at(CompanyId(1), Company::new(2)).unwrap();
        let ctx = LoadContext {
            file_type: FileType::Scenario,
            ..LoadContext::default()
        };
        rebuild_caches(&mut world, &DirtyCaches::new(), &ctx);
        assert_eq!(world.companies.get(CompanyId(0)).unwrap().inaugurated_year, 1975);
        assert_eq!(world.companies.get(CompanyId(1)).unwrap().inaugurated_year, 0);
    }

    #[test]
    fn engine_availability_needs_dirty_partition() {
        let mut world = small_world();
        let engine = Engine {
            kind: VehicleType::Train,
            intro_date: 0,
            company_avail: 0,
            info: EngineInfo {
                railtype: 0,
                is_tram: false,
                acceleration: 0,
                max_speed: 0,
            },
        };
        world.engines.insert_at(EngineId(0), engine).unwrap();
        let clean = rebuilt(world.clone(), &DirtyCaches::new());
        assert!(clean.caches.engine_availability.is_empty());

        let mut dirty = DirtyCaches::new();
        dirty.mark_partition(DirtyCaches::PARTITION_ENGINES);
        let world = rebuilt(world, &dirty);
        assert_eq!(world.caches.engine_availability[&EngineId(0)], 1);
    }
}
