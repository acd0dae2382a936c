//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::context::LoadContext;
use crate::dirty::DirtyCaches;
use crate::entity::{Company, Town};
use crate::error::{LoadWarning, StepError};
use crate::gamelog::CompatLog;
use crate::id::{CompanyId, Owner, StationId, TownId};
use crate::migration::{LoadSession, STEPS};
use crate::services::{RecordingServices, TileTarget};
use crate::tile::{StationType, Tile, TileKind, WaterClass};
use crate::version::{SaveVersion, SnapshotHeader};
use crate::world::World;

// ===========================================================================
// World builders
// ===========================================================================

/// A 16x16 world with one town at (8, 8) and one company in slot 0.
///
/// Consistent under the current layout: loading it at the current version
/// changes nothing.
pub fn small_world() -> World {
    let mut world = World::new(16, 16);
    let centre = world.map.tile_xy(8, 8);
    let mut town = Town::new(centre);
    town.population = 120;
    world.towns.insert_at(TownId(0), town).expect("empty town pool");
    world.companies.insert_at(CompanyId(0), Company::new(0)).expect("empty company pool");
    world
}

/// A square world of `size` tiles per edge with a town in the middle and
/// `size / 4` sea tiles along the north-west edge. Used by benchmarks.
pub fn large_world(size: u32) -> World {
    let mut world = World::new(size, size);
    let centre = world.map.tile_xy(size / 2, size / 2);
    world.towns.insert_at(TownId(0), Town::new(centre)).expect("empty town pool");
    world.companies.insert_at(CompanyId(0), Company::new(0)).expect("empty company pool");
    for x in 0..size.saturating_sub(1) {
        for y in 0..(size / 4) {
            place(&mut world, x, y, Tile::water(WaterClass::Sea, Owner::WATER));
        }
    }
    world
}

/// Overwrite the tile at `(x, y)`.
pub fn place(world: &mut World, x: u32, y: u32, tile: Tile) {
    let t = world.map.tile_xy(x, y);
    if let Some(slot) = world.map.get_mut(t) {
        *slot = tile;
    }
}

/// A station tile of `kind` belonging to `station`.
pub fn station_tile(station: StationId, kind: StationType, owner: Owner) -> Tile {
    let mut t = Tile::new(TileKind::Station);
    t.set_owner(owner);
    t.m2 = station.0;
    t.set_station_type(kind);
    t
}

// ===========================================================================
// Single-step runners
// ===========================================================================

/// Everything a single step left behind.
#[derive(Debug)]
pub struct StepRun {
    pub world: World,
    pub result: Result<(), StepError>,
    pub dirty: DirtyCaches,
    pub warnings: Vec<LoadWarning>,
    pub log: CompatLog,
    pub notices: Vec<TileTarget>,
    pub pending_scripts: Vec<CompanyId>,
}

/// Run the named step against `world` as if it were tagged `version`,
/// ignoring the step's gate.
///
/// # Panics
///
/// Panics if no step has that name.
pub fn run_step(world: World, version: SaveVersion, name: &str) -> StepRun {
    run_step_with(world, version, name, &LoadContext::default())
}

pub fn run_step_with(world: World, version: SaveVersion, name: &str, ctx: &LoadContext) -> StepRun {
    let step = STEPS
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no migration step named {name}"));
    let mut services = RecordingServices::new();
    let mut session = LoadSession::new(world, SnapshotHeader::native(version), ctx, &mut services);
    let result = (step.apply)(&mut session);
    StepRun {
        world: session.world,
        result,
        dirty: session.dirty,
        warnings: session.warnings,
        log: session.log,
        notices: session.notices,
        pending_scripts: session.pending_scripts,
    }
}

/// Run the named step and hand back the world, or the step's error.
pub fn apply_step(world: World, version: SaveVersion, name: &str) -> Result<World, StepError> {
    let run = run_step(world, version, name);
    run.result.map(|()| run.world)
}
