//! Game settings carried inside a snapshot.
//!
//! `Default` yields the values a *new* game would start with. Snapshots
//! written before a setting existed must not receive those; the migration
//! steps overwrite them with the value that reproduces the old behaviour.
//! Every section is `#[serde(default)]` so a profile file may name any subset.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Landscape {
    #[default]
    Temperate,
    Arctic,
    Tropic,
    Toyland,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Pathfinder {
    Opf,
    Npf,
    #[default]
    Yapf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistributionType {
    #[default]
    Manual,
    Asymmetric,
    Symmetric,
}

pub mod town_layout {
    pub const ORIGINAL: u8 = 0;
    pub const BETTER_ROADS: u8 = 1;
    pub const GRID_2X2: u8 = 2;
    pub const GRID_3X3: u8 = 3;
    pub const RANDOM: u8 = 4;
}

/// Script difficulty profiles.
pub mod script_profile {
    pub const EASY: u8 = 0;
    pub const MEDIUM: u8 = 1;
    pub const HARD: u8 = 2;
    pub const END: u8 = 3;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleSettings {
    pub currency: u8,
    pub units_velocity: u8,
    pub units_power: u8,
    pub units_weight: u8,
    pub units_volume: u8,
    pub units_force: u8,
    pub units_height: u8,
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self {
            currency: 0,
            units_velocity: 1,
            units_power: 1,
            units_weight: 1,
            units_volume: 1,
            units_force: 2,
            units_height: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationSettings {
    pub modified_catchment: bool,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            modified_catchment: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderSettings {
    pub forbid_90_deg: bool,
    pub rail_use_yapf: bool,
    pub road_use_yapf: bool,
    pub ship_use_yapf: bool,
    pub new_pathfinding_all: bool,
    pub pathfinder_for_trains: Pathfinder,
    pub pathfinder_for_roadvehs: Pathfinder,
    pub pathfinder_for_ships: Pathfinder,
    pub reverse_at_signals: bool,
    pub wait_oneway_signal: u8,
    pub wait_twoway_signal: u8,
    pub wait_for_pbs_path: u8,
}

impl Default for PathfinderSettings {
    fn default() -> Self {
        Self {
            forbid_90_deg: true,
            rail_use_yapf: true,
            road_use_yapf: true,
            ship_use_yapf: false,
            new_pathfinding_all: false,
            pathfinder_for_trains: Pathfinder::Yapf,
            pathfinder_for_roadvehs: Pathfinder::Yapf,
            pathfinder_for_ships: Pathfinder::Npf,
            reverse_at_signals: false,
            wait_oneway_signal: 15,
            wait_twoway_signal: 41,
            wait_for_pbs_path: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSettings {
    /// 0 drives on the left, 1 on the right.
    pub road_side: u8,
    pub train_acceleration_model: u8,
    pub roadveh_acceleration_model: u8,
    pub train_slope_steepness: u8,
    pub roadveh_slope_steepness: u8,
    pub plane_speed: u8,
    pub dynamic_engines: bool,
    pub plane_crashes: u8,
    pub max_train_length: u8,
    pub disable_elrails: bool,
}

impl Default for VehicleSettings {
    fn default() -> Self {
        Self {
            road_side: 1,
            train_acceleration_model: 1,
            roadveh_acceleration_model: 1,
            train_slope_steepness: 3,
            roadveh_slope_steepness: 7,
            plane_speed: 4,
            dynamic_engines: true,
            plane_crashes: 2,
            max_train_length: 7,
            disable_elrails: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomySettings {
    pub station_noise_level: bool,
    pub feeder_payment_share: u8,
    pub allow_town_level_crossings: bool,
    pub infrastructure_maintenance: bool,
    /// One town in this many grows twice as fast; 0 disables.
    pub larger_towns: u8,
    pub town_layout: u8,
    pub allow_town_roads: bool,
    pub inflation: bool,
    pub town_council_tolerance: u8,
}

impl Default for EconomySettings {
    fn default() -> Self {
        Self {
            station_noise_level: false,
            feeder_payment_share: 75,
            allow_town_level_crossings: true,
            infrastructure_maintenance: false,
            larger_towns: 4,
            town_layout: town_layout::BETTER_ROADS,
            allow_town_roads: true,
            inflation: false,
            town_council_tolerance: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionSettings {
    pub freeform_edges: bool,
    pub max_bridge_length: u16,
    pub max_tunnel_length: u16,
    pub terraform_frame_burst: u16,
    pub clear_frame_burst: u16,
    pub tree_frame_burst: u16,
}

impl Default for ConstructionSettings {
    fn default() -> Self {
        Self {
            freeform_edges: true,
            max_bridge_length: 64,
            max_tunnel_length: 64,
            terraform_frame_burst: 4096,
            clear_frame_burst: 4096,
            tree_frame_burst: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkGraphSettings {
    pub distribution_pax: DistributionType,
    pub distribution_mail: DistributionType,
    pub distribution_armoured: DistributionType,
    pub distribution_default: DistributionType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultySettings {
    pub industry_density: u8,
    pub number_towns: u8,
    pub max_loan: u32,
}

impl Default for DifficultySettings {
    fn default() -> Self {
        Self {
            industry_density: 4,
            number_towns: 2,
            max_loan: 300_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameCreationSettings {
    pub landscape: Landscape,
    pub snow_line_height: u8,
    pub town_name: u8,
    pub starting_year: i32,
}

impl Default for GameCreationSettings {
    fn default() -> Self {
        Self {
            landscape: Landscape::Temperate,
            snow_line_height: 10,
            town_name: 0,
            starting_year: 1950,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    pub settings_profile: u8,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            settings_profile: script_profile::EASY,
        }
    }
}

/// All persisted game settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub locale: LocaleSettings,
    pub station: StationSettings,
    pub pf: PathfinderSettings,
    pub vehicle: VehicleSettings,
    pub economy: EconomySettings,
    pub construction: ConstructionSettings,
    pub linkgraph: LinkGraphSettings,
    pub difficulty: DifficultySettings,
    pub game_creation: GameCreationSettings,
    pub script: ScriptSettings,
}
