//! Static type catalog: cargo, industry, airport and object specs.
//!
//! The snapshot only stores type numbers; sizes, cargo lists and behaviour
//! flags come from here. Only the original (non-content-pack) types are
//! listed.

use bitflags::bitflags;

use crate::settings::Landscape;

/// Cargo slot meaning "no cargo".
pub const CT_INVALID: u8 = 0xFF;

pub const CT_PASSENGERS: u8 = 0;
pub const CT_COAL: u8 = 1;
pub const CT_MAIL: u8 = 2;
pub const CT_OIL: u8 = 3;
pub const CT_LIVESTOCK: u8 = 4;
pub const CT_GOODS: u8 = 5;
pub const CT_GRAIN: u8 = 6;
pub const CT_WOOD: u8 = 7;
pub const CT_IRON_ORE: u8 = 8;
pub const CT_STEEL: u8 = 9;
pub const CT_VALUABLES: u8 = 10;
/// Food on sub-arctic and sub-tropical maps.
pub const CT_FOOD: u8 = 11;
/// Water on sub-tropical maps; shares a slot with steel.
pub const CT_WATER: u8 = 9;

/// What a delivered cargo does for the receiving town.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TownEffect {
    None = 0,
    Passengers = 1,
    Mail = 2,
    Goods = 3,
    Water = 4,
    Food = 5,
}

pub fn town_effect(landscape: Landscape, cargo: u8) -> TownEffect {
    match (landscape, cargo) {
        (_, CT_PASSENGERS) => TownEffect::Passengers,
        (_, CT_MAIL) => TownEffect::Mail,
        (_, CT_GOODS) => TownEffect::Goods,
        (Landscape::Tropic, CT_WATER) => TownEffect::Water,
        (Landscape::Arctic | Landscape::Tropic, CT_FOOD) => TownEffect::Food,
        _ => TownEffect::None,
    }
}

// ---------------------------------------------------------------------------
// Industries
// ---------------------------------------------------------------------------

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IndustryBehaviour: u8 {
        const BUILT_ONWATER = 1 << 0;
        const PLANT_FIELDS = 1 << 1;
        const AIRPLANE_ATTACKS = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndustrySpec {
    pub name: &'static str,
    pub produced_cargo: [u8; 2],
    pub accepts_cargo: [u8; 3],
    pub behaviour: IndustryBehaviour,
}

const fn industry(
    name: &'static str,
    produced_cargo: [u8; 2],
    accepts_cargo: [u8; 3],
    behaviour: IndustryBehaviour,
) -> IndustrySpec {
    IndustrySpec {
        name,
        produced_cargo,
        accepts_cargo,
        behaviour,
    }
}

const X: u8 = CT_INVALID;

pub const IT_OIL_RIG: u8 = 5;
pub const IT_FARM: u8 = 9;

static INDUSTRIES: [IndustrySpec; 12] = [
    industry("coal mine", [CT_COAL, X], [X, X, X], IndustryBehaviour::empty()),
    industry("power station", [X, X], [CT_COAL, X, X], IndustryBehaviour::empty()),
    industry("sawmill", [CT_GOODS, X], [CT_WOOD, X, X], IndustryBehaviour::empty()),
    industry("forest", [CT_WOOD, X], [X, X, X], IndustryBehaviour::empty()),
    industry("oil refinery", [CT_GOODS, X], [CT_OIL, X, X], IndustryBehaviour::AIRPLANE_ATTACKS),
    industry("oil rig", [CT_OIL, CT_PASSENGERS], [X, X, X], IndustryBehaviour::BUILT_ONWATER),
    industry("factory", [CT_GOODS, X], [CT_LIVESTOCK, CT_GRAIN, CT_STEEL], IndustryBehaviour::empty()),
    industry("printing works", [CT_GOODS, X], [X, X, X], IndustryBehaviour::empty()),
    industry("steel mill", [CT_STEEL, X], [CT_IRON_ORE, X, X], IndustryBehaviour::empty()),
    industry("farm", [CT_GRAIN, CT_LIVESTOCK], [X, X, X], IndustryBehaviour::PLANT_FIELDS),
    industry("iron ore mine", [CT_IRON_ORE, X], [X, X, X], IndustryBehaviour::empty()),
    industry("oil wells", [CT_OIL, X], [X, X, X], IndustryBehaviour::empty()),
];

pub fn industry_spec(kind: u8) -> Option<&'static IndustrySpec> {
    INDUSTRIES.get(kind as usize)
}

/// Industry tile graphics referenced by migration.
pub mod industry_gfx {
    pub const COAL_MINE_TOWER_ANIMATED: u8 = 1;
    pub const POWERPLANT_SPARKS: u8 = 10;
    pub const OILRIG_1: u8 = 24;
    pub const OILWELL_ANIMATED_1: u8 = 30;
    pub const OILWELL_ANIMATED_2: u8 = 31;
    pub const OILWELL_ANIMATED_3: u8 = 32;
    pub const COPPER_MINE_TOWER_ANIMATED: u8 = 48;
    pub const GOLD_MINE_TOWER_ANIMATED: u8 = 88;
}

// ---------------------------------------------------------------------------
// Airports
// ---------------------------------------------------------------------------

pub const AT_OILRIG: u8 = 9;
/// Oil rig type number before version 139.
pub const AT_OILRIG_LEGACY: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirportSpec {
    pub w: u16,
    pub h: u16,
    pub noise: u8,
    pub catchment: u32,
}

static AIRPORTS: [AirportSpec; 10] = [
    AirportSpec { w: 4, h: 3, noise: 3, catchment: 4 },
    AirportSpec { w: 6, h: 6, noise: 5, catchment: 5 },
    AirportSpec { w: 1, h: 1, noise: 1, catchment: 4 },
    AirportSpec { w: 6, h: 6, noise: 8, catchment: 6 },
    AirportSpec { w: 7, h: 7, noise: 17, catchment: 8 },
    AirportSpec { w: 5, h: 4, noise: 4, catchment: 4 },
    AirportSpec { w: 2, h: 2, noise: 2, catchment: 4 },
    AirportSpec { w: 9, h: 11, noise: 25, catchment: 10 },
    AirportSpec { w: 4, h: 2, noise: 3, catchment: 4 },
    AirportSpec { w: 1, h: 1, noise: 0, catchment: 4 },
];

pub fn airport_spec(kind: u8) -> Option<&'static AirportSpec> {
    AIRPORTS.get(kind as usize)
}

/// Animated airport tile ranges `(first gfx, frame count)` of the pre-137
/// numbering, where every frame had its own graphic id.
pub const AIRPORT_GFX_LEGACY_RANGES: [(u8, u8); 9] = [
    (31, 12),
    (50, 4),
    (62, 2),
    (66, 12),
    (78, 12),
    (101, 10),
    (111, 8),
    (119, 15),
    (140, 4),
];

// ---------------------------------------------------------------------------
// Catchment
// ---------------------------------------------------------------------------

pub const CA_NONE: u32 = 0;
pub const CA_BUS: u32 = 3;
pub const CA_TRUCK: u32 = 3;
pub const CA_TRAIN: u32 = 4;
pub const CA_DOCK: u32 = 5;
/// Radius every station used before per-facility catchment existed.
pub const CA_UNMODIFIED: u32 = 4;

// ---------------------------------------------------------------------------
// Objects and houses
// ---------------------------------------------------------------------------

/// Footprint edge length of a legacy map object.
pub fn object_size(kind: u8) -> u16 {
    if kind == crate::tile::object_type::HQ {
        2
    } else {
        1
    }
}

/// Cargo a completed house accepts, as (cargo, eighths) pairs.
pub fn house_acceptance(house_type: u32) -> [(u8, u8); 3] {
    // Larger original buildings (offices, flats) also take goods.
    let goods = if (8..40).contains(&house_type) { 4 } else { 0 };
    [(CT_PASSENGERS, 8), (CT_MAIL, 4), (CT_GOODS, goods)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oil_rig_is_built_on_water() {
        let spec = industry_spec(IT_OIL_RIG).unwrap();
        assert!(spec.behaviour.contains(IndustryBehaviour::BUILT_ONWATER));
        assert!(industry_spec(200).is_none());
    }

    #[test]
    fn town_effects_depend_on_climate() {
        assert_eq!(town_effect(Landscape::Temperate, CT_WATER), TownEffect::None);
        assert_eq!(town_effect(Landscape::Tropic, CT_WATER), TownEffect::Water);
        assert_eq!(town_effect(Landscape::Arctic, CT_FOOD), TownEffect::Food);
        assert_eq!(town_effect(Landscape::Toyland, CT_MAIL), TownEffect::Mail);
    }

    #[test]
    fn oilrig_airport_is_single_tile() {
        let spec = airport_spec(AT_OILRIG).unwrap();
        assert_eq!((spec.w, spec.h), (1, 1));
        assert!(airport_spec(AT_OILRIG_LEGACY).is_none());
    }
}
