//! The decoded world: every pool, the tile map and the global state.
//!
//! A [`World`] is what the external chunk reader produces and what the
//! simulation consumes. Migration mutates it in place. Derived caches are
//! carried alongside but never serialized, so [`World::encode`] describes
//! exactly the persisted state.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::economy::Economy;
use crate::entity::{
    CargoPayment, Company, Depot, Engine, Industry, Object, Sign, Station, Subsidy, Town, Vehicle,
};
use crate::hash;
use crate::id::{
    CargoPaymentId, CompanyId, DepotId, EngineId, IndustryId, MAX_COMPANIES, ObjectId, OrderId,
    Owner, SignId, StationId, SubsidyId, TownId, VehicleId,
};
use crate::map::{TileIndex, TileMap};
use crate::order::Order;
use crate::pool::Pool;
use crate::rebuild::DerivedCaches;
use crate::rng::WorldRng;
use crate::services::ContentPackRef;
use crate::settings::GameSettings;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Ticks per day.
pub const DAY_TICKS: u16 = 74;
pub const ORIGINAL_BASE_YEAR: i32 = 1920;
/// Days from year 0 to the first day of [`ORIGINAL_BASE_YEAR`].
pub const DAYS_TILL_ORIGINAL_BASE_YEAR: i32 = 701_265;

const DAYS_IN_YEAR: i32 = 365;
const DAYS_IN_LEAP_YEAR: i32 = 366;

pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Calendar year containing `date` (days since year 0).
pub fn year_of(date: i32) -> i32 {
    let date = date.max(0);
    let mut year = 400 * (date / (DAYS_IN_YEAR * 400 + 97));
    let mut rem = date % (DAYS_IN_YEAR * 400 + 97);

    if rem >= DAYS_IN_YEAR * 100 + 25 {
        // Every 400th year is a leap year, so the first century has one more.
        year += 100;
        rem -= DAYS_IN_YEAR * 100 + 25;
        year += 100 * (rem / (DAYS_IN_YEAR * 100 + 24));
        rem %= DAYS_IN_YEAR * 100 + 24;
    }

    if !is_leap_year(year) && rem >= DAYS_IN_YEAR * 4 {
        year += 4;
        rem -= DAYS_IN_YEAR * 4;
    }

    year += 4 * (rem / (DAYS_IN_YEAR * 4 + 1));
    rem %= DAYS_IN_YEAR * 4 + 1;

    loop {
        let len = if is_leap_year(year) {
            DAYS_IN_LEAP_YEAR
        } else {
            DAYS_IN_YEAR
        };
        if rem < len {
            return year;
        }
        rem -= len;
        year += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameClock {
    /// Days since year 0.
    pub date: i32,
    /// Ticks into the current day.
    pub date_fract: u16,
    pub cur_year: i32,
}

impl Default for GameClock {
    fn default() -> Self {
        let date = DAYS_TILL_ORIGINAL_BASE_YEAR + 30 * 365;
        Self {
            date,
            date_fract: 0,
            cur_year: year_of(date),
        }
    }
}

// ---------------------------------------------------------------------------
// Globals
// ---------------------------------------------------------------------------

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PauseMode: u8 {
        const NORMAL = 1 << 0;
        const SAVELOAD = 1 << 1;
        const JOIN = 1 << 2;
        const ERROR = 1 << 3;
        const ACTIVE_CLIENTS = 1 << 4;
        const GAME_SCRIPT = 1 << 5;
    }
}

impl PauseMode {
    /// Pause reasons that only make sense while a network game is running.
    pub const NETWORK: PauseMode = PauseMode::JOIN.union(PauseMode::ACTIVE_CLIENTS);
}

/// Raw legacy globals consumed by migration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyGlobals {
    /// Pre-184 single unit system selector.
    pub old_units: u8,
    /// Pre-178 difficulty level.
    pub old_diff_level: u8,
    /// Pre-84 custom name table, indexed by the low 9 bits of a string id.
    pub old_names: BTreeMap<u16, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedViewport {
    pub x: i32,
    pub y: i32,
    pub zoom: u8,
}

impl Default for SavedViewport {
    fn default() -> Self {
        Self { x: 0, y: 0, zoom: 2 }
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Errors raised while encoding a world image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub map: TileMap,
    pub towns: Pool<TownId, Town>,
    pub stations: Pool<StationId, Station>,
    pub companies: Pool<CompanyId, Company>,
    pub vehicles: Pool<VehicleId, Vehicle>,
    pub orders: Pool<OrderId, Order>,
    pub industries: Pool<IndustryId, Industry>,
    pub subsidies: Pool<SubsidyId, Subsidy>,
    pub depots: Pool<DepotId, Depot>,
    pub signs: Pool<SignId, Sign>,
    pub objects: Pool<ObjectId, Object>,
    pub engines: Pool<EngineId, Engine>,
    pub cargo_payments: Pool<CargoPaymentId, CargoPayment>,

    #[serde(default)]
    pub settings: GameSettings,
    #[serde(default)]
    pub economy: Economy,
    #[serde(default)]
    pub clock: GameClock,
    #[serde(default)]
    pub pause: PauseMode,
    #[serde(default)]
    pub legacy: LegacyGlobals,
    #[serde(default)]
    pub viewport: SavedViewport,
    #[serde(default)]
    pub content: Vec<ContentPackRef>,
    #[serde(default)]
    pub animated_tiles: Vec<TileIndex>,
    #[serde(default)]
    pub cur_tileloop_tile: u32,
    #[serde(default)]
    pub rng: WorldRng,

    #[serde(skip)]
    pub caches: DerivedCaches,
}

pub const TOWN_POOL_LIMIT: usize = 64_000;
pub const STATION_POOL_LIMIT: usize = 64_000;
pub const VEHICLE_POOL_LIMIT: usize = 0xFF000;
pub const ORDER_POOL_LIMIT: usize = 0xFF0000;
pub const INDUSTRY_POOL_LIMIT: usize = 64_000;
pub const SUBSIDY_POOL_LIMIT: usize = 256;
pub const DEPOT_POOL_LIMIT: usize = 64_000;
pub const SIGN_POOL_LIMIT: usize = 64_000;
pub const OBJECT_POOL_LIMIT: usize = 0xFF0000;
pub const ENGINE_POOL_LIMIT: usize = 64_000;
pub const CARGO_PAYMENT_POOL_LIMIT: usize = 0xFF000;

impl World {
    /// An empty world on a `size_x * size_y` map with new-game settings.
    pub fn new(size_x: u32, size_y: u32) -> Self {
        Self {
            map: TileMap::new(size_x, size_y),
            towns: Pool::with_limit(TOWN_POOL_LIMIT),
            stations: Pool::with_limit(STATION_POOL_LIMIT),
            companies: Pool::with_limit(MAX_COMPANIES as usize),
            vehicles: Pool::with_limit(VEHICLE_POOL_LIMIT),
            orders: Pool::with_limit(ORDER_POOL_LIMIT),
            industries: Pool::with_limit(INDUSTRY_POOL_LIMIT),
            subsidies: Pool::with_limit(SUBSIDY_POOL_LIMIT),
            depots: Pool::with_limit(DEPOT_POOL_LIMIT),
            signs: Pool::with_limit(SIGN_POOL_LIMIT),
            objects: Pool::with_limit(OBJECT_POOL_LIMIT),
            engines: Pool::with_limit(ENGINE_POOL_LIMIT),
            cargo_payments: Pool::with_limit(CARGO_PAYMENT_POOL_LIMIT),
            settings: GameSettings::default(),
            economy: Economy::default(),
            clock: GameClock::default(),
            pause: PauseMode::empty(),
            legacy: LegacyGlobals::default(),
            viewport: SavedViewport::default(),
            content: Vec::new(),
            animated_tiles: Vec::new(),
            cur_tileloop_tile: 1,
            rng: WorldRng::default(),
            caches: DerivedCaches::default(),
        }
    }

    /// Returns `true` if `owner` names a company that exists.
    pub fn is_valid_company(&self, owner: Owner) -> bool {
        owner.company().is_some_and(|c| self.companies.contains(c))
    }

    /// Town whose centre is nearest to `t` by Manhattan distance. Ties go to
    /// the lowest town ID.
    pub fn closest_town(&self, t: TileIndex) -> Option<TownId> {
        self.towns
            .iter()
            .min_by_key(|(id, town)| (self.map.distance_manhattan(t, town.xy), *id))
            .map(|(id, _)| id)
    }

    /// Binary image of the persisted state (caches excluded).
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        bitcode::serialize(self).map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        bitcode::deserialize(bytes).map_err(|e| SnapshotError::Decode(e.to_string()))
    }

    /// FNV-1a digest of [`World::encode`].
    pub fn state_hash(&self) -> Result<u64, SnapshotError> {
        Ok(hash::digest(&self.encode()?))
    }
}
