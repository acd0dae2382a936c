//! Pooled record types.
//!
//! Field sets mirror the current data model plus the handful of legacy raw
//! fields that migration consumes (old string IDs, load/unload tick counters
//! that were later split, and so on).

use serde::{Deserialize, Serialize};

use crate::id::{CargoPaymentId, EngineId, OrderId, Owner, StationId, TownId, VehicleId};
use crate::map::{TileArea, TileIndex};
use crate::order::Order;

/// Number of cargo slots per station.
pub const NUM_CARGO: usize = 32;
/// Number of town effects (none, passengers, mail, goods, water, food).
pub const NUM_TE: usize = 6;

/// Rating a town gives a company it has never dealt with.
pub const RATING_INITIAL: i16 = 175;

/// String ID meaning "use the generated default name".
pub const STR_DEFAULT_NAME: u16 = 0;

// String IDs a custom name is stored behind once it has moved out of the
// pre-84 name table.
pub const STR_SV_UNNAMED: u16 = 0x70B7;
pub const SPECSTR_PRESIDENT_NAME: u16 = 0x70E7;
pub const STR_SV_STNAME_FALLBACK: u16 = 0x300F;
pub const SPECSTR_TOWNNAME_START: u16 = 0x20C0;

// ---------------------------------------------------------------------------
// Town
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Town {
    pub xy: TileIndex,
    #[serde(default)]
    pub population: u32,
    #[serde(default)]
    pub max_pass: u32,
    #[serde(default)]
    pub max_mail: u32,
    #[serde(default = "invalid_owner")]
    pub exclusivity: Owner,
    #[serde(default)]
    pub exclusive_counter: u8,
    #[serde(default)]
    pub larger_town: bool,
    #[serde(default)]
    pub layout: u8,
    #[serde(default)]
    pub have_ratings: u16,
    #[serde(default = "initial_ratings")]
    pub ratings: [i16; 15],
    #[serde(default)]
    pub goal: [u32; NUM_TE],
    #[serde(default)]
    pub name: Option<String>,
    /// Name generator ID, or a custom string ID in old snapshots.
    #[serde(default)]
    pub name_type: u16,
}

fn invalid_owner() -> Owner {
    Owner::INVALID
}

fn initial_ratings() -> [i16; 15] {
    [RATING_INITIAL; 15]
}

impl Town {
    pub fn new(xy: TileIndex) -> Self {
        Self {
            xy,
            population: 0,
            max_pass: 0,
            max_mail: 0,
            exclusivity: Owner::INVALID,
            exclusive_counter: 0,
            larger_town: false,
            layout: 0,
            have_ratings: 0,
            ratings: initial_ratings(),
            goal: [0; NUM_TE],
            name: None,
            name_type: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Station
// ---------------------------------------------------------------------------

pub mod facility {
    pub const TRAIN: u8 = 0x01;
    pub const TRUCK_STOP: u8 = 0x02;
    pub const BUS_STOP: u8 = 0x04;
    pub const AIRPORT: u8 = 0x08;
    pub const DOCK: u8 = 0x10;
    pub const WAYPOINT: u8 = 0x80;
}

pub const GES_ACCEPTANCE: u8 = 0;
pub const GES_PICKUP: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GoodsEntry {
    pub acceptance_pickup: u8,
    pub last_speed: u8,
    pub rating: u8,
    pub waiting: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentStorage {
    pub grfid: u32,
    pub storage: [i32; 16],
}

impl PersistentStorage {
    pub fn is_empty(&self) -> bool {
        self.storage.iter().all(|&v| v == 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub tile: TileIndex,
    #[serde(default)]
    pub kind: u8,
    #[serde(default)]
    pub w: u16,
    #[serde(default)]
    pub h: u16,
    #[serde(default)]
    pub flags: u64,
    #[serde(default)]
    pub psa: Option<PersistentStorage>,
}

impl Default for Airport {
    fn default() -> Self {
        Self {
            tile: TileIndex::INVALID,
            kind: 0,
            w: 0,
            h: 0,
            flags: 0,
            psa: None,
        }
    }
}

/// A station or, with `is_waypoint` set, a rail waypoint or buoy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub xy: TileIndex,
    pub owner: Owner,
    #[serde(default = "invalid_town")]
    pub town: TownId,
    #[serde(default)]
    pub is_waypoint: bool,
    #[serde(default)]
    pub facilities: u8,
    #[serde(default = "empty_area")]
    pub train_station: TileArea,
    #[serde(default)]
    pub airport: Airport,
    #[serde(default = "invalid_tile")]
    pub dock_tile: TileIndex,
    #[serde(default)]
    pub build_date: i32,
    /// Vehicle type that last visited, encoded as [`VehicleType`] or 0xFF.
    #[serde(default = "invalid_u8")]
    pub last_vehicle_type: u8,
    #[serde(default = "invalid_u8")]
    pub indtype: u8,
    #[serde(default = "default_goods")]
    pub goods: Vec<GoodsEntry>,
    #[serde(default)]
    pub loading_vehicles: Vec<VehicleId>,
    #[serde(default)]
    pub bus_stops: Vec<TileIndex>,
    #[serde(default)]
    pub truck_stops: Vec<TileIndex>,
    #[serde(default)]
    pub town_cn: u16,
    #[serde(default)]
    pub name: Option<String>,
    /// Custom string ID in old snapshots.
    #[serde(default)]
    pub string_id: u16,
    #[serde(default = "empty_area")]
    pub rect: TileArea,
}

fn invalid_town() -> TownId {
    TownId::INVALID
}

fn invalid_tile() -> TileIndex {
    TileIndex::INVALID
}

fn empty_area() -> TileArea {
    TileArea::EMPTY
}

fn invalid_u8() -> u8 {
    0xFF
}

fn default_goods() -> Vec<GoodsEntry> {
    vec![GoodsEntry::default(); NUM_CARGO]
}

impl Station {
    pub fn new(xy: TileIndex, owner: Owner) -> Self {
        Self {
            xy,
            owner,
            town: TownId::INVALID,
            is_waypoint: false,
            facilities: 0,
            train_station: TileArea::EMPTY,
            airport: Airport::default(),
            dock_tile: TileIndex::INVALID,
            build_date: 0,
            last_vehicle_type: 0xFF,
            indtype: 0xFF,
            goods: default_goods(),
            loading_vehicles: Vec::new(),
            bus_stops: Vec::new(),
            truck_stops: Vec::new(),
            town_cn: 0,
            name: None,
            string_id: STR_DEFAULT_NAME,
            rect: TileArea::EMPTY,
        }
    }

    pub fn waypoint(xy: TileIndex, owner: Owner) -> Self {
        Self {
            is_waypoint: true,
            facilities: facility::WAYPOINT,
            ..Self::new(xy, owner)
        }
    }

    pub fn has_facility(&self, f: u8) -> bool {
        self.facilities & f != 0
    }
}

// ---------------------------------------------------------------------------
// Company
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDefaults {
    pub servint_ispercent: bool,
    pub servint_trains: u16,
    pub servint_roadveh: u16,
    pub servint_aircraft: u16,
    pub servint_ships: u16,
}

impl VehicleDefaults {
    /// Service intervals every company used before they became per-company.
    pub const LEGACY: VehicleDefaults = VehicleDefaults {
        servint_ispercent: false,
        servint_trains: 150,
        servint_roadveh: 150,
        servint_aircraft: 100,
        servint_ships: 360,
    };
}

impl Default for VehicleDefaults {
    fn default() -> Self {
        Self::LEGACY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySettings {
    pub engine_renew: bool,
    pub engine_renew_months: i16,
    pub engine_renew_money: u32,
    pub renew_keep_length: bool,
    pub vehicle: VehicleDefaults,
}

impl Default for CompanySettings {
    fn default() -> Self {
        Self {
            engine_renew: true,
            engine_renew_months: 6,
            engine_renew_money: 100_000,
            renew_keep_length: false,
            vehicle: VehicleDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Livery {
    pub colour1: u8,
    pub colour2: u8,
}

/// Handle to a running company script, issued by the script host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSlot {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub name_1: u16,
    #[serde(default)]
    pub president_name: Option<String>,
    #[serde(default)]
    pub president_name_1: u16,
    #[serde(default)]
    pub face: u32,
    #[serde(default)]
    pub colour: u8,
    #[serde(default)]
    pub inaugurated_year: i32,
    #[serde(default = "invalid_tile")]
    pub location_of_hq: TileIndex,
    #[serde(default)]
    pub is_ai: bool,
    /// Scripts are not persisted; they are attached on load.
    #[serde(skip)]
    pub script: Option<ScriptSlot>,
    #[serde(default = "no_share_owners")]
    pub share_owners: [Owner; 4],
    #[serde(default)]
    pub bankrupt_asked: u16,
    #[serde(default)]
    pub months_of_bankruptcy: u8,
    #[serde(default)]
    pub settings: CompanySettings,
    #[serde(default)]
    pub livery: Livery,
    #[serde(default)]
    pub terraform_limit: u32,
    #[serde(default)]
    pub clear_limit: u32,
    #[serde(default)]
    pub tree_limit: u32,
    #[serde(default)]
    pub money: i64,
}

fn no_share_owners() -> [Owner; 4] {
    [Owner::INVALID; 4]
}

impl Company {
    pub fn new(colour: u8) -> Self {
        Self {
            name: None,
            name_1: STR_DEFAULT_NAME,
            president_name: None,
            president_name_1: STR_DEFAULT_NAME,
            face: 0,
            colour,
            inaugurated_year: 0,
            location_of_hq: TileIndex::INVALID,
            is_ai: false,
            script: None,
            share_owners: no_share_owners(),
            bankrupt_asked: 0,
            months_of_bankruptcy: 0,
            settings: CompanySettings::default(),
            livery: Livery {
                colour1: colour,
                colour2: colour,
            },
            terraform_limit: 0,
            clear_limit: 0,
            tree_limit: 0,
            money: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Vehicle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    Train = 0,
    Road = 1,
    Ship = 2,
    Aircraft = 3,
    Effect = 4,
    Disaster = 5,
}

impl VehicleType {
    pub const COMPANY_TYPES: [VehicleType; 4] = [
        VehicleType::Train,
        VehicleType::Road,
        VehicleType::Ship,
        VehicleType::Aircraft,
    ];
}

pub mod vehicle_status {
    pub const HIDDEN: u8 = 0x01;
    pub const STOPPED: u8 = 0x02;
    pub const CRASHED: u8 = 0x80;
}

pub mod vehicle_flags {
    pub const LOADING_FINISHED: u32 = 0;
    pub const CARGO_PAID: u32 = 2;
    pub const PATHFINDER_LOST: u32 = 7;
}

pub mod track_bits {
    pub const X: u8 = 0x01;
    pub const Y: u8 = 0x02;
    pub const WORMHOLE: u8 = 0x40;
    pub const DEPOT: u8 = 0x80;
}

pub const RVSB_IN_DEPOT: u8 = 0xFE;
pub const RVSB_WORMHOLE: u8 = 0xFF;

pub mod aircraft {
    pub const HELICOPTER: u8 = 0;
    pub const AIRCRAFT: u8 = 2;
    pub const SHADOW: u8 = 4;
    pub const ROTOR: u8 = 6;

    pub const STATE_HANGAR: u8 = 1;
    pub const STATE_FLYING: u8 = 14;

    /// Cruising altitude in height units.
    pub const FLYING_ALTITUDE: i32 = 120;
}

pub const DISASTER_SMALL_UFO: u8 = 2;

pub mod force_proceed {
    pub const NONE: u8 = 0;
    pub const STUCK: u8 = 1;
}

pub const GVF_GOINGUP_BIT: u32 = 0;
pub const GVF_GOINGDOWN_BIT: u32 = 1;

/// Kind-specific vehicle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleDetail {
    Train {
        track: u8,
        railtype: u8,
        force_proceed: u8,
        flags: u16,
        wait_counter: u16,
        /// Consist length in 1/16 tile units.
        total_length: u16,
    },
    Road {
        state: u8,
        frame: u8,
    },
    Ship {
        state: u8,
    },
    Aircraft {
        state: u8,
        turn_counter: u16,
        target_airport: StationId,
    },
    Effect,
    Disaster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub detail: VehicleDetail,
    pub owner: Owner,
    pub engine: EngineId,
    #[serde(default)]
    pub subtype: u8,
    pub tile: TileIndex,
    #[serde(default)]
    pub x_pos: i32,
    #[serde(default)]
    pub y_pos: i32,
    #[serde(default)]
    pub z_pos: i32,
    /// Raw stored facing; values above 7 are corrupt.
    #[serde(default)]
    pub direction: u8,
    #[serde(default)]
    pub status: u8,
    #[serde(default)]
    pub vehicle_flags: u16,
    /// Front of the consist; equal to the vehicle's own ID for fronts.
    pub first: VehicleId,
    #[serde(default)]
    pub cur_speed: u16,
    #[serde(default)]
    pub acceleration: u8,
    #[serde(default)]
    pub profit_this_year: i64,
    #[serde(default)]
    pub profit_last_year: i64,
    #[serde(default)]
    pub running_ticks: u8,
    #[serde(default)]
    pub build_year: i32,
    #[serde(default)]
    pub date_of_last_service: i32,
    #[serde(default)]
    pub current_order: Order,
    #[serde(default)]
    pub orders: Vec<OrderId>,
    /// First vehicle of the shared-orders chain, when shared with another.
    #[serde(default)]
    pub first_shared: Option<VehicleId>,
    #[serde(default)]
    pub cur_implicit_order_index: u8,
    #[serde(default)]
    pub cur_real_order_index: u8,
    #[serde(default = "invalid_station")]
    pub last_station_visited: StationId,
    #[serde(default)]
    pub cargo_payment: Option<CargoPaymentId>,
    #[serde(default)]
    pub load_unload_ticks: u16,
    #[serde(default = "invalid_tile")]
    pub dest_tile: TileIndex,
    #[serde(default)]
    pub gv_flags: u16,
}

fn invalid_station() -> StationId {
    StationId::INVALID
}

impl Vehicle {
    pub fn new(id: VehicleId, detail: VehicleDetail, owner: Owner, tile: TileIndex) -> Self {
        Self {
            detail,
            owner,
            engine: EngineId(0),
            subtype: 0,
            tile,
            x_pos: 0,
            y_pos: 0,
            z_pos: 0,
            direction: 1,
            status: 0,
            vehicle_flags: 0,
            first: id,
            cur_speed: 0,
            acceleration: 0,
            profit_this_year: 0,
            profit_last_year: 0,
            running_ticks: 0,
            build_year: 0,
            date_of_last_service: 0,
            current_order: Order::default(),
            orders: Vec::new(),
            first_shared: None,
            cur_implicit_order_index: 0,
            cur_real_order_index: 0,
            last_station_visited: StationId::INVALID,
            cargo_payment: None,
            load_unload_ticks: 0,
            dest_tile: TileIndex::INVALID,
            gv_flags: 0,
        }
    }

    pub fn kind(&self) -> VehicleType {
        match self.detail {
            VehicleDetail::Train { .. } => VehicleType::Train,
            VehicleDetail::Road { .. } => VehicleType::Road,
            VehicleDetail::Ship { .. } => VehicleType::Ship,
            VehicleDetail::Aircraft { .. } => VehicleType::Aircraft,
            VehicleDetail::Effect => VehicleType::Effect,
            VehicleDetail::Disaster => VehicleType::Disaster,
        }
    }

    pub fn is_ground_vehicle(&self) -> bool {
        matches!(self.kind(), VehicleType::Train | VehicleType::Road)
    }

    pub fn is_front(&self, id: VehicleId) -> bool {
        self.first == id
    }

    /// Aircraft body, as opposed to its shadow or rotor.
    pub fn is_normal_aircraft(&self) -> bool {
        self.kind() == VehicleType::Aircraft && self.subtype <= aircraft::AIRCRAFT
    }

    /// Vehicles that carry orders: consist fronts, ships and aircraft bodies.
    pub fn is_primary(&self, id: VehicleId) -> bool {
        match self.kind() {
            VehicleType::Train | VehicleType::Road => self.is_front(id),
            VehicleType::Ship => true,
            VehicleType::Aircraft => self.is_normal_aircraft(),
            VehicleType::Effect | VehicleType::Disaster => false,
        }
    }

    pub fn has_status(&self, bits: u8) -> bool {
        self.status & bits != 0
    }

    pub fn flag(&self, bit: u32) -> bool {
        self.vehicle_flags & (1 << bit) != 0
    }

    pub fn set_flag(&mut self, bit: u32, on: bool) {
        if on {
            self.vehicle_flags |= 1 << bit;
        } else {
            self.vehicle_flags &= !(1 << bit);
        }
    }
}

// ---------------------------------------------------------------------------
// Everything else
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Industry {
    pub location: TileArea,
    pub kind: u8,
    #[serde(default = "none_owner")]
    pub founder: Owner,
    #[serde(default = "invalid_town")]
    pub town: TownId,
    #[serde(default)]
    pub last_prod_year: i32,
    #[serde(default = "no_cargo2")]
    pub produced_cargo: [u8; 2],
    #[serde(default = "no_cargo3")]
    pub accepts_cargo: [u8; 3],
    #[serde(default)]
    pub psa: Option<PersistentStorage>,
}

fn none_owner() -> Owner {
    Owner::NONE
}

fn no_cargo2() -> [u8; 2] {
    [crate::catalog::CT_INVALID; 2]
}

fn no_cargo3() -> [u8; 3] {
    [crate::catalog::CT_INVALID; 3]
}

impl Industry {
    pub fn new(location: TileArea, kind: u8) -> Self {
        Self {
            location,
            kind,
            founder: Owner::NONE,
            town: TownId::INVALID,
            last_prod_year: 0,
            produced_cargo: no_cargo2(),
            accepts_cargo: no_cargo3(),
            psa: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceType {
    Industry,
    Town,
    Headquarters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsidy {
    pub cargo_type: u8,
    pub remaining: u8,
    #[serde(default = "invalid_owner")]
    pub awarded: Owner,
    #[serde(default = "industry_source")]
    pub src_type: SourceType,
    #[serde(default = "industry_source")]
    pub dst_type: SourceType,
    pub src: u16,
    pub dst: u16,
}

fn industry_source() -> SourceType {
    SourceType::Industry
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depot {
    pub xy: TileIndex,
    #[serde(default = "invalid_town")]
    pub town: TownId,
    #[serde(default)]
    pub town_cn: u16,
    #[serde(default)]
    pub build_date: i32,
    #[serde(default)]
    pub name: Option<String>,
}

impl Depot {
    pub fn new(xy: TileIndex) -> Self {
        Self {
            xy,
            town: TownId::INVALID,
            town_cn: 0,
            build_date: 0,
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sign {
    pub xy: TileIndex,
    pub owner: Owner,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub location: TileArea,
    pub kind: u8,
    pub build_date: i32,
    pub town: TownId,
    pub colour: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    /// Rail type for train engines.
    #[serde(default)]
    pub railtype: u8,
    #[serde(default)]
    pub is_tram: bool,
    /// Acceleration for aircraft.
    #[serde(default)]
    pub acceleration: u8,
    #[serde(default)]
    pub max_speed: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engine {
    pub kind: VehicleType,
    #[serde(default)]
    pub intro_date: i32,
    #[serde(default)]
    pub company_avail: u16,
    pub info: EngineInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CargoPayment {
    pub front: VehicleId,
    pub current_station: StationId,
}
