//! Map cells and their packed auxiliary bytes.
//!
//! A [`Tile`] stores a kind tag plus the raw bytes `m1..m7`. What those bytes
//! mean depends on the kind and, for older snapshots, on the format version.
//! The accessors in this module read and write the *current* layout; the
//! migration steps use raw field access while a tile is still in a legacy
//! layout, then switch to the accessors once it has been converted.
//!
//! After migration every tile must decode through [`Tile::decode`] into a
//! [`TileView`]. Decoding is the layout audit that closes the load.

use serde::{Deserialize, Serialize};

use crate::id::{DepotId, IndustryId, ObjectId, Owner, StationId, TownId};
use crate::map::DiagDirection;

/// Read `len` bits of `value` starting at `start`.
#[inline]
pub fn gb(value: u32, start: u32, len: u32) -> u32 {
    (value >> start) & ((1 << len) - 1)
}

/// Return `value` with `len` bits at `start` replaced by `field`.
#[inline]
pub fn sb(value: u32, start: u32, len: u32, field: u32) -> u32 {
    let mask = ((1u32 << len) - 1) << start;
    (value & !mask) | ((field << start) & mask)
}

macro_rules! bits {
    ($get:ident, $set:ident, $field:ident, $ty:ty, $start:expr, $len:expr) => {
        #[inline]
        pub fn $get(&self) -> u32 {
            gb(self.$field as u32, $start, $len)
        }

        #[inline]
        pub fn $set(&mut self, v: u32) {
            self.$field = sb(self.$field as u32, $start, $len, v) as $ty;
        }
    };
}

// ---------------------------------------------------------------------------
// Kinds and small enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Clear,
    Railway,
    Road,
    House,
    Trees,
    Station,
    Water,
    Void,
    Industry,
    TunnelBridge,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaterClass {
    Sea = 0,
    Canal = 1,
    River = 2,
    Invalid = 3,
}

impl WaterClass {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => WaterClass::Sea,
            1 => WaterClass::Canal,
            2 => WaterClass::River,
            _ => WaterClass::Invalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TropicZone {
    Normal = 0,
    Desert = 1,
    Rainforest = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StationType {
    Rail = 0,
    Airport = 1,
    Truck = 2,
    Bus = 3,
    Oilrig = 4,
    Dock = 5,
    Buoy = 6,
    Waypoint = 7,
}

impl StationType {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 7 {
            0 => StationType::Rail,
            1 => StationType::Airport,
            2 => StationType::Truck,
            3 => StationType::Bus,
            4 => StationType::Oilrig,
            5 => StationType::Dock,
            6 => StationType::Buoy,
            _ => StationType::Waypoint,
        }
    }

    pub fn has_rail(self) -> bool {
        matches!(self, StationType::Rail | StationType::Waypoint)
    }

    pub fn is_road_stop(self) -> bool {
        matches!(self, StationType::Truck | StationType::Bus)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RailTileType {
    Normal,
    Signals,
    Depot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoadTileType {
    Normal,
    Crossing,
    Depot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaterTileKind {
    Clear,
    Coast,
    Lock,
    Depot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    Rail,
    Road,
    Water,
}

pub mod clear_ground {
    pub const GRASS: u32 = 0;
    pub const ROUGH: u32 = 1;
    pub const ROCKS: u32 = 2;
    pub const FIELDS: u32 = 3;
    pub const SNOW: u32 = 4;
    pub const DESERT: u32 = 5;
}

pub const TREE_GROUND_SHORE: u32 = 3;
pub const RAIL_GROUND_WATER: u32 = 13;
/// Tram owner value meaning "no tram owner".
pub const TRAM_OWNER_NONE: u32 = 0x0F;
/// First drive-through road stop graphic.
pub const GFX_ROAD_DT_OFFSET: u8 = 4;
/// Dock graphics at or above this are the water part.
pub const GFX_DOCK_BASE_WATER_PART: u8 = 4;
/// House types at or above this come from content packs.
pub const NEW_HOUSE_OFFSET: u32 = 110;

pub mod water_bits {
    pub const TYPE_CLEAR: u32 = 0;
    pub const TYPE_COAST: u32 = 1;
    pub const TYPE_LOCK: u32 = 2;
    pub const TYPE_DEPOT: u32 = 8;
}

pub mod object_type {
    pub const TRANSMITTER: u8 = 0;
    pub const LIGHTHOUSE: u8 = 1;
    pub const STATUE: u8 = 2;
    pub const OWNED_LAND: u8 = 3;
    pub const HQ: u8 = 4;
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileKind,
    #[serde(default)]
    pub height: u8,
    /// Raised corners; 0 is flat.
    #[serde(default)]
    pub slope: u8,
    #[serde(default = "default_zone")]
    pub tropic_zone: TropicZone,
    #[serde(default)]
    pub m1: u8,
    #[serde(default)]
    pub m2: u16,
    #[serde(default)]
    pub m3: u8,
    #[serde(default)]
    pub m4: u8,
    #[serde(default)]
    pub m5: u8,
    #[serde(default)]
    pub m6: u8,
    #[serde(default)]
    pub m7: u8,
}

fn default_zone() -> TropicZone {
    TropicZone::Normal
}

impl Tile {
    pub fn new(kind: TileKind) -> Self {
        Self {
            kind,
            height: 0,
            slope: 0,
            tropic_zone: TropicZone::Normal,
            m1: 0,
            m2: 0,
            m3: 0,
            m4: 0,
            m5: 0,
            m6: 0,
            m7: 0,
        }
    }

    /// Bare grass owned by nobody.
    pub fn clear() -> Self {
        let mut t = Self::new(TileKind::Clear);
        t.set_owner(Owner::NONE);
        t.m5 = 3; // full grass density
        t
    }

    pub fn void() -> Self {
        Self::new(TileKind::Void)
    }

    /// Open water of the given class.
    pub fn water(class: WaterClass, owner: Owner) -> Self {
        let mut t = Self::new(TileKind::Water);
        t.set_owner(owner);
        t.set_water_class(class);
        t
    }

    pub fn is_flat(&self) -> bool {
        self.slope == 0
    }

    /// Reset to bare grass, keeping height, slope and zone.
    pub fn make_clear(&mut self) {
        let (height, slope, zone) = (self.height, self.slope, self.tropic_zone);
        *self = Self::clear();
        self.height = height;
        self.slope = slope;
        self.tropic_zone = zone;
    }

    // -- common ------------------------------------------------------------

    pub fn owner(&self) -> Owner {
        Owner(gb(self.m1 as u32, 0, 5) as u8)
    }

    pub fn set_owner(&mut self, owner: Owner) {
        // Special owners above 0x1F do not fit; they never appear on tiles.
        self.m1 = sb(self.m1 as u32, 0, 5, owner.0 as u32) as u8;
    }

    pub fn water_class(&self) -> WaterClass {
        WaterClass::from_bits(gb(self.m1 as u32, 5, 2))
    }

    pub fn set_water_class(&mut self, class: WaterClass) {
        self.m1 = sb(self.m1 as u32, 5, 2, class as u32) as u8;
    }

    // -- clear / trees -----------------------------------------------------

    bits!(clear_ground, set_clear_ground, m5, u8, 2, 3);
    bits!(clear_density, set_clear_density, m5, u8, 0, 2);
    bits!(trees_ground, set_trees_ground, m2, u16, 4, 2);

    /// Fence type on the given edge of a clear (fields) tile.
    pub fn fence(&self, dir: DiagDirection) -> u32 {
        match dir {
            DiagDirection::SE => gb(self.m4 as u32, 2, 3),
            DiagDirection::SW => gb(self.m4 as u32, 5, 3),
            DiagDirection::NE => gb(self.m3 as u32, 5, 3),
            DiagDirection::NW => gb(self.m3 as u32, 2, 3),
        }
    }

    pub fn set_fence(&mut self, dir: DiagDirection, fence: u32) {
        match dir {
            DiagDirection::SE => self.m4 = sb(self.m4 as u32, 2, 3, fence) as u8,
            DiagDirection::SW => self.m4 = sb(self.m4 as u32, 5, 3, fence) as u8,
            DiagDirection::NE => self.m3 = sb(self.m3 as u32, 5, 3, fence) as u8,
            DiagDirection::NW => self.m3 = sb(self.m3 as u32, 2, 3, fence) as u8,
        }
    }

    // -- railway -----------------------------------------------------------

    /// `None` for the unused type value 2.
    pub fn rail_tile_type(&self) -> Option<RailTileType> {
        match gb(self.m5 as u32, 6, 2) {
            0 => Some(RailTileType::Normal),
            1 => Some(RailTileType::Signals),
            3 => Some(RailTileType::Depot),
            _ => None,
        }
    }

    pub fn is_rail_depot(&self) -> bool {
        self.kind == TileKind::Railway && self.rail_tile_type() == Some(RailTileType::Depot)
    }

    bits!(track_bits, set_track_bits, m5, u8, 0, 6);
    bits!(reserved_tracks, set_reserved_tracks, m2, u16, 8, 6);
    bits!(rail_ground, set_rail_ground, m4, u8, 0, 4);
    bits!(rail_type, set_rail_type, m3, u8, 0, 4);

    // -- road --------------------------------------------------------------

    /// `None` for the unused type value 3.
    pub fn road_tile_type(&self) -> Option<RoadTileType> {
        match gb(self.m5 as u32, 6, 2) {
            0 => Some(RoadTileType::Normal),
            1 => Some(RoadTileType::Crossing),
            2 => Some(RoadTileType::Depot),
            _ => None,
        }
    }

    pub fn is_level_crossing(&self) -> bool {
        self.kind == TileKind::Road && self.road_tile_type() == Some(RoadTileType::Crossing)
    }

    pub fn is_road_depot(&self) -> bool {
        self.kind == TileKind::Road && self.road_tile_type() == Some(RoadTileType::Depot)
    }

    /// Owner of the road pieces. Plain road stores it as the tile owner.
    pub fn road_owner(&self) -> Owner {
        if self.kind == TileKind::Road && self.road_tile_type() == Some(RoadTileType::Normal) {
            self.owner()
        } else {
            Owner(gb(self.m7 as u32, 0, 5) as u8)
        }
    }

    pub fn set_road_owner(&mut self, owner: Owner) {
        if self.kind == TileKind::Road && self.road_tile_type() == Some(RoadTileType::Normal) {
            self.set_owner(owner);
        } else {
            self.m7 = sb(self.m7 as u32, 0, 5, owner.0 as u32) as u8;
        }
    }

    pub fn tram_owner(&self) -> Owner {
        match gb(self.m3 as u32, 4, 4) {
            TRAM_OWNER_NONE => Owner::NONE,
            o => Owner(o as u8),
        }
    }

    pub fn set_tram_owner(&mut self, owner: Owner) {
        let v = if owner == Owner::NONE {
            TRAM_OWNER_NONE
        } else {
            owner.0 as u32
        };
        self.m3 = sb(self.m3 as u32, 4, 4, v) as u8;
    }

    bits!(road_types, set_road_types, m7, u8, 6, 2);
    bits!(crossing_road_axis, set_crossing_road_axis, m5, u8, 0, 1);
    bits!(crossing_reserved_bit, set_crossing_reserved_bit, m5, u8, 4, 1);
    bits!(crossing_barred_bit, set_crossing_barred_bit, m5, u8, 5, 1);

    pub fn crossing_reserved(&self) -> bool {
        self.crossing_reserved_bit() != 0
    }

    pub fn set_crossing_reserved(&mut self, b: bool) {
        self.set_crossing_reserved_bit(b as u32);
    }

    pub fn crossing_barred(&self) -> bool {
        self.crossing_barred_bit() != 0
    }

    pub fn set_crossing_barred(&mut self, b: bool) {
        self.set_crossing_barred_bit(b as u32);
    }

    /// Town index on plain road, crossings and houses.
    pub fn town(&self) -> TownId {
        TownId(self.m2)
    }

    pub fn set_town(&mut self, town: TownId) {
        self.m2 = town.0;
    }

    /// Depot index on rail, road and water depots.
    pub fn depot(&self) -> DepotId {
        DepotId(self.m2)
    }

    pub fn set_depot(&mut self, depot: DepotId) {
        self.m2 = depot.0;
    }

    pub fn depot_direction(&self) -> DiagDirection {
        DiagDirection::from_bits(self.m5)
    }

    // -- house -------------------------------------------------------------

    pub fn house_type(&self) -> u32 {
        self.m4 as u32 | (gb(self.m3 as u32, 6, 1) << 8)
    }

    pub fn set_house_type(&mut self, ty: u32) {
        self.m4 = (ty & 0xFF) as u8;
        self.m3 = sb(self.m3 as u32, 6, 1, ty >> 8) as u8;
    }

    pub fn house_completed(&self) -> bool {
        gb(self.m3 as u32, 7, 1) != 0
    }

    pub fn set_house_completed(&mut self, b: bool) {
        self.m3 = sb(self.m3 as u32, 7, 1, b as u32) as u8;
    }

    // -- station -----------------------------------------------------------

    pub fn station(&self) -> StationId {
        StationId(self.m2)
    }

    pub fn set_station(&mut self, id: StationId) {
        self.m2 = id.0;
    }

    pub fn station_type(&self) -> StationType {
        StationType::from_bits(gb(self.m6 as u32, 3, 3))
    }

    pub fn set_station_type(&mut self, ty: StationType) {
        self.m6 = sb(self.m6 as u32, 3, 3, ty as u32) as u8;
    }

    pub fn is_station_of(&self, ty: StationType) -> bool {
        self.kind == TileKind::Station && self.station_type() == ty
    }

    pub fn is_oilrig(&self) -> bool {
        self.is_station_of(StationType::Oilrig)
    }

    pub fn is_buoy(&self) -> bool {
        self.is_station_of(StationType::Buoy)
    }

    pub fn is_dock(&self) -> bool {
        self.is_station_of(StationType::Dock)
    }

    pub fn has_station_rail(&self) -> bool {
        self.kind == TileKind::Station && self.station_type().has_rail()
    }

    pub fn is_standard_road_stop(&self) -> bool {
        self.kind == TileKind::Station && self.station_type().is_road_stop() && self.m5 < GFX_ROAD_DT_OFFSET
    }

    pub fn is_drive_through_road_stop(&self) -> bool {
        self.kind == TileKind::Station
            && self.station_type().is_road_stop()
            && self.m5 >= GFX_ROAD_DT_OFFSET
    }

    pub fn station_reserved(&self) -> bool {
        gb(self.m6 as u32, 2, 1) != 0
    }

    pub fn set_station_reserved(&mut self, b: bool) {
        self.m6 = sb(self.m6 as u32, 2, 1, b as u32) as u8;
    }

    pub fn station_blocked(&self) -> bool {
        gb(self.m6 as u32, 0, 1) != 0
    }

    // -- water -------------------------------------------------------------

    /// `None` for kind values with no meaning.
    pub fn water_tile_kind(&self) -> Option<WaterTileKind> {
        match gb(self.m5 as u32, 4, 4) {
            water_bits::TYPE_CLEAR => Some(WaterTileKind::Clear),
            water_bits::TYPE_COAST => Some(WaterTileKind::Coast),
            water_bits::TYPE_LOCK => Some(WaterTileKind::Lock),
            water_bits::TYPE_DEPOT => Some(WaterTileKind::Depot),
            _ => None,
        }
    }

    pub fn is_water_of(&self, kind: WaterTileKind) -> bool {
        self.kind == TileKind::Water && self.water_tile_kind() == Some(kind)
    }

    pub fn is_ship_depot(&self) -> bool {
        self.is_water_of(WaterTileKind::Depot)
    }

    // -- industry ----------------------------------------------------------

    pub fn industry(&self) -> IndustryId {
        IndustryId(self.m2)
    }

    pub fn industry_completed(&self) -> bool {
        gb(self.m1 as u32, 7, 1) != 0
    }

    // -- tunnel / bridge ---------------------------------------------------

    pub fn is_bridge(&self) -> bool {
        gb(self.m5 as u32, 7, 1) != 0
    }

    pub fn transport_type(&self) -> Option<TransportType> {
        match gb(self.m5 as u32, 2, 2) {
            0 => Some(TransportType::Rail),
            1 => Some(TransportType::Road),
            2 => Some(TransportType::Water),
            _ => None,
        }
    }

    pub fn tunnel_bridge_direction(&self) -> DiagDirection {
        DiagDirection::from_bits(self.m5)
    }

    // -- object ------------------------------------------------------------

    pub fn object(&self) -> ObjectId {
        ObjectId(self.m2 as u32)
    }

    pub fn object_type(&self) -> u8 {
        self.m5
    }

    /// Animation frame in the current layout.
    pub fn animation_frame(&self) -> u8 {
        self.m7
    }

    /// Decode the tile under the current layout.
    pub fn decode(&self) -> Result<TileView, LayoutError> {
        let view = match self.kind {
            TileKind::Clear => {
                let ground = self.clear_ground();
                if ground > clear_ground::DESERT {
                    return Err(LayoutError::BadField {
                        kind: self.kind,
                        field: "clear ground",
                        value: ground,
                    });
                }
                TileView::Clear {
                    owner: self.checked_owner(self.owner())?,
                    ground,
                    density: self.clear_density(),
                }
            }
            TileKind::Trees => TileView::Trees {
                ground: self.trees_ground(),
            },
            TileKind::Railway => match self.rail_tile_type().ok_or_else(|| self.bad_type())? {
                RailTileType::Depot => TileView::RailDepot {
                    owner: self.checked_owner(self.owner())?,
                    depot: self.depot(),
                    direction: self.depot_direction(),
                },
                ty => TileView::Rail {
                    owner: self.checked_owner(self.owner())?,
                    signals: ty == RailTileType::Signals,
                    tracks: self.track_bits() as u8,
                    reserved: self.reserved_tracks() as u8,
                },
            },
            TileKind::Road => match self.road_tile_type().ok_or_else(|| self.bad_type())? {
                RoadTileType::Normal => TileView::Road {
                    owner: self.checked_owner(self.road_owner())?,
                    tram_owner: self.checked_owner(self.tram_owner())?,
                    town: self.town(),
                },
                RoadTileType::Crossing => TileView::LevelCrossing {
                    rail_owner: self.checked_owner(self.owner())?,
                    road_owner: self.checked_owner(self.road_owner())?,
                    barred: self.crossing_barred(),
                    reserved: self.crossing_reserved(),
                },
                RoadTileType::Depot => TileView::RoadDepot {
                    owner: self.checked_owner(self.owner())?,
                    depot: self.depot(),
                },
            },
            TileKind::House => TileView::House {
                town: self.town(),
                house_type: self.house_type(),
                completed: self.house_completed(),
            },
            TileKind::Station => {
                let kind = self.station_type();
                let needs_water = match kind {
                    StationType::Buoy => true,
                    StationType::Dock => self.m5 >= GFX_DOCK_BASE_WATER_PART,
                    _ => false,
                };
                if needs_water && self.water_class() == WaterClass::Invalid {
                    return Err(LayoutError::MissingWaterClass { kind: self.kind });
                }
                TileView::Station {
                    station: self.station(),
                    kind,
                    owner: self.checked_owner(self.owner())?,
                    gfx: self.m5,
                }
            }
            TileKind::Water => {
                let kind = self.water_tile_kind().ok_or_else(|| self.bad_type())?;
                let class = self.water_class();
                let must_have_class = match kind {
                    WaterTileKind::Clear | WaterTileKind::Depot => true,
                    WaterTileKind::Lock => self.is_flat(),
                    WaterTileKind::Coast => false,
                };
                if must_have_class && class == WaterClass::Invalid {
                    return Err(LayoutError::MissingWaterClass { kind: self.kind });
                }
                TileView::Water {
                    kind,
                    class,
                    owner: self.checked_owner(self.owner())?,
                }
            }
            TileKind::Void => TileView::Void,
            TileKind::Industry => TileView::Industry {
                industry: self.industry(),
                gfx: self.m5,
                completed: self.industry_completed(),
            },
            TileKind::TunnelBridge => {
                let transport = self.transport_type().ok_or(LayoutError::BadField {
                    kind: self.kind,
                    field: "transport type",
                    value: gb(self.m5 as u32, 2, 2),
                })?;
                TileView::TunnelBridge {
                    bridge: self.is_bridge(),
                    transport,
                    direction: self.tunnel_bridge_direction(),
                    owner: self.checked_owner(self.owner())?,
                }
            }
            TileKind::Object => TileView::Object {
                object: self.object(),
                kind: self.object_type(),
            },
        };
        Ok(view)
    }

    fn checked_owner(&self, owner: Owner) -> Result<Owner, LayoutError> {
        if owner.is_meaningful() {
            Ok(owner)
        } else {
            Err(LayoutError::BadField {
                kind: self.kind,
                field: "owner",
                value: owner.0 as u32,
            })
        }
    }

    fn bad_type(&self) -> LayoutError {
        let value = match self.kind {
            TileKind::Water => gb(self.m5 as u32, 4, 4),
            _ => gb(self.m5 as u32, 6, 2),
        };
        LayoutError::BadField {
            kind: self.kind,
            field: "tile type",
            value,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoded view
// ---------------------------------------------------------------------------

/// A tile decoded under the current layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileView {
    Clear { owner: Owner, ground: u32, density: u32 },
    Trees { ground: u32 },
    Rail { owner: Owner, signals: bool, tracks: u8, reserved: u8 },
    RailDepot { owner: Owner, depot: DepotId, direction: DiagDirection },
    Road { owner: Owner, tram_owner: Owner, town: TownId },
    LevelCrossing { rail_owner: Owner, road_owner: Owner, barred: bool, reserved: bool },
    RoadDepot { owner: Owner, depot: DepotId },
    House { town: TownId, house_type: u32, completed: bool },
    Station { station: StationId, kind: StationType, owner: Owner, gfx: u8 },
    Water { kind: WaterTileKind, class: WaterClass, owner: Owner },
    Void,
    Industry { industry: IndustryId, gfx: u8, completed: bool },
    TunnelBridge { bridge: bool, transport: TransportType, direction: DiagDirection, owner: Owner },
    Object { object: ObjectId, kind: u8 },
}

/// A tile that does not decode under the current layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("{kind:?} tile has no resolved water class")]
    MissingWaterClass { kind: TileKind },
    #[error("{kind:?} tile has invalid {field} {value}")]
    BadField {
        kind: TileKind,
        field: &'static str,
        value: u32,
    },
}
