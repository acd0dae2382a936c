//! The ordered step table that brings a decoded snapshot up to date.
//!
//! Every entry in [`STEPS`] carries a [`Gate`] answered by the version
//! oracle. The dispatcher walks the table once, in order, and a step either
//! does nothing (gate closed) or performs its whole transformation. Later
//! steps rely on the normalizations of earlier ones, so the table is never
//! reordered and never run in parallel.
//!
//! A step that meets a state it cannot interpret returns a [`StepError`];
//! the dispatcher stops immediately and reports the step's name.

mod companies;
mod depots;
mod economy;
mod globals;
mod industries;
mod objects;
mod orders;
mod owners;
mod settings_backfill;
mod stations;
mod tiles;
mod towns;
mod vehicles;
pub(crate) mod water;

use bitflags::bitflags;
use tracing::debug;

use crate::context::LoadContext;
use crate::dirty::DirtyCaches;
use crate::error::{LoadError, LoadWarning, StepError};
use crate::gamelog::{CompatLog, LogEntry};
use crate::id::CompanyId;
use crate::services::{ContentStatus, LoadServices, TileTarget};
use crate::version::{SaveVersion, SnapshotHeader};
use crate::world::World;

pub use water::{WaterGuess, guess_water_class};

// ===========================================================================
// Gates
// ===========================================================================

/// When a step applies, expressed through the version oracle only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Always,
    /// Snapshot is older than the given version.
    Before(SaveVersion),
    /// Snapshot is at least `from` and older than `before`.
    Between {
        from: SaveVersion,
        before: SaveVersion,
    },
}

impl Gate {
    pub fn applies(self, v: SaveVersion) -> bool {
        match self {
            Gate::Always => true,
            Gate::Before(b) => v.is_older_than(b.major, b.minor),
            Gate::Between { from, before } => {
                !v.is_older_than(from.major, from.minor) && v.is_older_than(before.major, before.minor)
            }
        }
    }

    /// Upper version bound, if the gate has one.
    pub fn threshold(self) -> Option<SaveVersion> {
        match self {
            Gate::Always => None,
            Gate::Before(b) | Gate::Between { before: b, .. } => Some(b),
        }
    }
}

const fn before(major: u16) -> Gate {
    Gate::Before(SaveVersion::new(major, 0))
}

const fn before_minor(major: u16, minor: u8) -> Gate {
    Gate::Before(SaveVersion::new(major, minor))
}

const fn between(from: u16, before: u16) -> Gate {
    Gate::Between {
        from: SaveVersion::new(from, 0),
        before: SaveVersion::new(before, 0),
    }
}

bitflags! {
    /// Parts of the world a step may write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WorldParts: u32 {
        const MAP = 1 << 0;
        const TOWNS = 1 << 1;
        const STATIONS = 1 << 2;
        const COMPANIES = 1 << 3;
        const VEHICLES = 1 << 4;
        const ORDERS = 1 << 5;
        const INDUSTRIES = 1 << 6;
        const SUBSIDIES = 1 << 7;
        const DEPOTS = 1 << 8;
        const SIGNS = 1 << 9;
        const OBJECTS = 1 << 10;
        const ENGINES = 1 << 11;
        const CARGO_PAYMENTS = 1 << 12;
        const SETTINGS = 1 << 13;
        const ECONOMY = 1 << 14;
        const CLOCK = 1 << 15;
        const PAUSE = 1 << 16;
        const LEGACY = 1 << 17;
        const VIEWPORT = 1 << 18;
        const ANIMATED_TILES = 1 << 19;
    }
}

// ===========================================================================
// Session
// ===========================================================================

/// Everything a step may read or write during one load.
pub struct LoadSession<'a> {
    pub world: World,
    pub header: SnapshotHeader,
    pub ctx: &'a LoadContext,
    pub services: &'a mut dyn LoadServices,
    pub log: CompatLog,
    pub dirty: DirtyCaches,
    pub warnings: Vec<LoadWarning>,
    /// Track-layout notices, delivered only if the load succeeds.
    pub notices: Vec<TileTarget>,
    /// Worst content status found while checking content packs.
    pub content_status: ContentStatus,
    /// AI companies waiting for a default script, started on success.
    pub pending_scripts: Vec<CompanyId>,
}

impl<'a> LoadSession<'a> {
    pub fn new(
        world: World,
        header: SnapshotHeader,
        ctx: &'a LoadContext,
        services: &'a mut dyn LoadServices,
    ) -> Self {
        Self {
            world,
            header,
            ctx,
            services,
            log: CompatLog::new(),
            dirty: DirtyCaches::new(),
            warnings: Vec::new(),
            notices: Vec::new(),
            content_status: ContentStatus::Compatible,
            pending_scripts: Vec::new(),
        }
    }

    pub fn version(&self) -> SaveVersion {
        self.header.version
    }

    pub fn older_than(&self, major: u16, minor: u8) -> bool {
        self.header.version.is_older_than(major, minor)
    }

    pub fn before(&self, major: u16) -> bool {
        self.header.version.is_before(major)
    }

    /// Queue a warning for the user and note it in the log.
    pub fn warn(&mut self, warning: LoadWarning) {
        tracing::warn!(%warning, "load warning");
        self.log.push(LogEntry::Warning(warning.to_string()));
        self.warnings.push(warning);
    }
}

// ===========================================================================
// Step table
// ===========================================================================

pub type StepFn = fn(&mut LoadSession<'_>) -> Result<(), StepError>;

pub struct MigrationStep {
    pub name: &'static str,
    pub gate: Gate,
    pub writes: WorldParts,
    pub apply: StepFn,
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("name", &self.name)
            .field("gate", &self.gate)
            .field("writes", &self.writes)
            .finish()
    }
}

const fn step(name: &'static str, gate: Gate, writes: WorldParts, apply: StepFn) -> MigrationStep {
    MigrationStep {
        name,
        gate,
        writes,
        apply,
    }
}

const NOTHING: WorldParts = WorldParts::empty();
const MAP: WorldParts = WorldParts::MAP;
const TOWNS: WorldParts = WorldParts::TOWNS;
const STATIONS: WorldParts = WorldParts::STATIONS;
const COMPANIES: WorldParts = WorldParts::COMPANIES;
const VEHICLES: WorldParts = WorldParts::VEHICLES;
const ORDERS: WorldParts = WorldParts::ORDERS;
const INDUSTRIES: WorldParts = WorldParts::INDUSTRIES;
const SETTINGS: WorldParts = WorldParts::SETTINGS;
const ECONOMY: WorldParts = WorldParts::ECONOMY;
const DEPOTS: WorldParts = WorldParts::DEPOTS;

/// The authoritative migration order.
pub static STEPS: &[MigrationStep] = &[
    step("log_old_version", Gate::Always, NOTHING, globals::log_old_version),
    step("log_revision_and_mode", Gate::Always, NOTHING, globals::log_revision_and_mode),
    step("log_legacy_content_list", Gate::Always, NOTHING, globals::log_legacy_content_list),
    step("normalize_pause_mode", Gate::Always, WorldParts::PAUSE, globals::normalize_pause_mode),
    step("seed_tile_loop_cursor", Gate::Always, WorldParts::CLOCK, globals::seed_tile_loop_cursor),
    step("recompute_rail_station_size", before(2), STATIONS, stations::recompute_rail_station_size),
    step("normalize_road_side", Gate::Always, SETTINGS, settings_backfill::normalize_road_side),
    step("verify_content_packs", Gate::Always, WorldParts::PAUSE, globals::verify_content_packs),
    step("scale_date_fract", Gate::Always, WorldParts::CLOCK, globals::scale_date_fract),
    step("provision_ai_scripts", Gate::Always, COMPANIES, companies::provision_ai_scripts),
    step("require_town", Gate::Always, NOTHING, towns::require_town),
    step("provision_first_company", Gate::Always, COMPANIES, companies::provision_first_company),
    step("link_cargo_payments", Gate::Always, WorldParts::CARGO_PAYMENTS.union(VEHICLES), stations::link_cargo_payments),
    step("reset_station_spread", Gate::Always, STATIONS.union(MAP), stations::reset_station_spread),
    step("reset_old_aircraft", before_minor(2, 2), VEHICLES.union(STATIONS), vehicles::reset_old_aircraft),
    step("clear_town_exclusivity", before_minor(4, 1), TOWNS, towns::clear_town_exclusivity),
    step("remap_currency", before_minor(4, 2), SETTINGS, economy::remap_currency),
    step("backfill_modified_catchment", before_minor(4, 2), SETTINGS, settings_backfill::backfill_modified_catchment),
    step("reassign_water_owner", before_minor(4, 3), MAP, water::reassign_water_owner),
    step("assign_town_index_to_tiles", before_minor(6, 1), MAP, towns::assign_town_index_to_tiles),
    step("backfill_forbid_90_deg", before_minor(6, 1), SETTINGS, settings_backfill::backfill_forbid_90_deg),
    step("update_town_max_pass", before(9), TOWNS, towns::update_town_max_pass),
    step("init_autorenew", before(16), COMPANIES, companies::init_autorenew),
    step("init_keep_length", before_minor(16, 1), COMPANIES, companies::init_keep_length),
    step("backfill_train_acceleration", before(21), SETTINGS, settings_backfill::backfill_train_acceleration),
    step("insert_electric_rail", before(24), MAP.union(VEHICLES), tiles::insert_electric_rail),
    step("clear_road_vehicle_status_bit", before(25), VEHICLES, vehicles::clear_road_vehicle_status_bit),
    step("reset_last_vehicle_type", before(26), STATIONS, stations::reset_last_vehicle_type),
    step("offset_base_year", before(31), WorldParts::all(), globals::offset_base_year),
    step("remove_farm_fields", before(32), MAP, tiles::remove_farm_fields),
    step("reset_livery", before(34), COMPANIES, companies::reset_livery),
    step("clear_order_refit", before(36), ORDERS.union(VEHICLES), orders::clear_order_refit),
    step("enable_elrails", before(38), SETTINGS, settings_backfill::enable_elrails),
    step("fix_vehicle_bridge_positions", before(42), MAP.union(VEHICLES), vehicles::fix_vehicle_bridge_positions),
    step("move_industry_animation", before(43), MAP, tiles::move_industry_animation),
    step("clear_paid_flag", before(45), VEHICLES, vehicles::clear_paid_flag),
    step("fix_buoy_owner", before(46), MAP, owners::fix_buoy_owner),
    step("rescale_aircraft_speed", before(50), VEHICLES, vehicles::rescale_aircraft_speed),
    step("link_statues_to_towns", before(52), MAP, towns::link_statues_to_towns),
    step("mark_larger_towns", before(56), TOWNS, towns::mark_larger_towns),
    step("rebuild_loading_queues", before(57), STATIONS.union(VEHICLES), stations::rebuild_loading_queues),
    step("bump_difficulty_levels", before(58), SETTINGS, settings_backfill::bump_difficulty_levels),
    step("prune_loading_queues", between(57, 59), STATIONS, stations::prune_loading_queues),
    step("remove_trams", before(62), VEHICLES, vehicles::remove_trams),
    step("fix_road_vehicle_state", before(69), VEHICLES, vehicles::fix_road_vehicle_state),
    step("reset_industry_founder", before(70), INDUSTRIES, industries::reset_industry_founder),
    step("reset_goods_speed", before(74), STATIONS, stations::reset_goods_speed),
    step("copy_industry_cargo", before(78), INDUSTRIES, industries::copy_industry_cargo),
    step("copy_legacy_names", before(84), COMPANIES.union(STATIONS).union(TOWNS), companies::copy_legacy_names),
    step("clear_legacy_name_table", Gate::Always, WorldParts::LEGACY, companies::clear_legacy_name_table),
    step("clear_invalid_share_owners", before(84), COMPANIES, owners::clear_invalid_share_owners),
    step("guess_lock_dock_water_class", before(86), MAP, water::guess_lock_dock_water_class),
    step("repair_invalid_owners", before(87), MAP.union(STATIONS), owners::repair_invalid_owners),
    step("convert_pathfinder_settings", before(87), SETTINGS, settings_backfill::convert_pathfinder_settings),
    step("scale_vehicle_profits", before(88), VEHICLES, vehicles::scale_vehicle_profits),
    step("backfill_plane_speed", before(90), SETTINGS, settings_backfill::backfill_plane_speed),
    step("widen_house_animation", before(91), MAP, tiles::widen_house_animation),
    step("convert_orders", before(93), ORDERS.union(VEHICLES), orders::convert_orders),
    step("split_unload_transfer", between(93, 94), ORDERS.union(VEHICLES), orders::split_unload_transfer),
    step("backfill_dynamic_engines", before(95), SETTINGS, settings_backfill::backfill_dynamic_engines),
    step("backfill_noise_level", before(96), SETTINGS, settings_backfill::backfill_noise_level),
    step("classify_industry_water", before(99), MAP, water::classify_industry_water),
    step("reserve_train_tracks", before(101), MAP, tiles::reserve_train_tracks),
    step("update_level_crossings", before(102), MAP, tiles::update_level_crossings),
    step("update_nearest_town_for_roads", before(103), MAP, towns::update_nearest_town_for_roads),
    step("reset_invalid_sign_owner", before(103), WorldParts::SIGNS, owners::reset_invalid_sign_owner),
    step("reset_station_industry_type", before(103), STATIONS, stations::reset_station_industry_type),
    step("widen_company_masks", before(104), COMPANIES.union(TOWNS).union(WorldParts::ENGINES).union(VEHICLES), companies::widen_company_masks),
    step("invalidate_zero_tiles", before(106), STATIONS.union(COMPANIES), stations::invalidate_zero_tiles),
    step("backfill_freeform_edges", before(111), SETTINGS, settings_backfill::backfill_freeform_edges),
    step("convert_town_layout", before(113), SETTINGS.union(TOWNS), towns::convert_town_layout),
    step("closest_town_for_roads", before(114), MAP, towns::closest_town_for_roads),
    step("reset_invalid_station_owner", before(114), STATIONS, owners::reset_invalid_station_owner),
    step("set_stop_location", before(117), ORDERS.union(VEHICLES), orders::set_stop_location),
    step("reset_vehicle_defaults", before(120), COMPANIES, companies::reset_vehicle_defaults),
    step("remove_stray_ufos", before(121), VEHICLES, vehicles::remove_stray_ufos),
    step("create_cargo_payments", before(121), WorldParts::CARGO_PAYMENTS.union(VEHICLES), stations::create_cargo_payments),
    step("dedupe_animated_tiles", before(122), WorldParts::ANIMATED_TILES, tiles::dedupe_animated_tiles),
    step("init_waypoint_area", between(1, 124), STATIONS, stations::init_waypoint_area),
    step("convert_subsidies", before(125), WorldParts::SUBSIDIES, economy::convert_subsidies),
    step("recompute_inflation", before(126), ECONOMY, economy::recompute_inflation),
    step("mark_station_acceptance", before(127), NOTHING, stations::mark_station_acceptance),
    step("store_depot_index", before(128), MAP, depots::store_depot_index),
    step("reset_force_proceed", before(131), VEHICLES, vehicles::reset_force_proceed),
    step("backfill_road_acceleration", before(133), SETTINGS, settings_backfill::backfill_road_acceleration),
    step("backfill_feeder_share", before(134), SETTINGS, settings_backfill::backfill_feeder_share),
    step("split_wait_counter", before(136), VEHICLES, vehicles::split_wait_counter),
    step("convert_airport_gfx", before(137), MAP, tiles::convert_airport_gfx),
    step("backfill_plane_crashes", before(138), SETTINGS, settings_backfill::backfill_plane_crashes),
    step("renumber_oilrig_type", before(139), STATIONS, stations::renumber_oilrig_type),
    step("backfill_road_slope", before(139), SETTINGS, settings_backfill::backfill_road_slope),
    step("set_airport_size", before(140), STATIONS, stations::set_airport_size),
    step("reset_void_tropic_zone", before(141), MAP, tiles::reset_void_tropic_zone),
    step("name_depots", before(141), DEPOTS, depots::name_depots),
    step("date_depots", before(142), DEPOTS, depots::date_depots),
    step("backfill_town_crossings", before(143), SETTINGS, settings_backfill::backfill_town_crossings),
    step("launch_stranded_aircraft", before(146), VEHICLES, vehicles::launch_stranded_aircraft),
    step("create_objects", before(147), MAP.union(WorldParts::OBJECTS), objects::create_objects),
    step("move_animation_frames", before(147), MAP, tiles::move_animation_frames),
    step("colour_objects", before(148), WorldParts::OBJECTS, objects::colour_objects),
    step("reset_station_water_class", before(149), MAP, water::reset_station_water_class),
    step("renumber_waypoints", before(149), STATIONS, stations::renumber_waypoints),
    step("fix_wormhole_tiles", Gate::Always, VEHICLES, vehicles::fix_wormhole_tiles),
    step("move_pathfinder_lost_flag", before(156), VEHICLES, vehicles::move_pathfinder_lost_flag),
    step("init_construction_limits", before(156), COMPANIES, companies::init_construction_limits),
    step("clear_slope_flags", before(158), VEHICLES, vehicles::clear_slope_flags),
    step("fill_real_order_index", before(158), VEHICLES, orders::fill_real_order_index),
    step("convert_reversing", before(159), SETTINGS, settings_backfill::convert_reversing),
    step("backfill_length_limits", before(159), SETTINGS, settings_backfill::backfill_length_limits),
    step("fit_max_train_length", before(159), SETTINGS, settings_backfill::fit_max_train_length),
    step("bump_industry_density", before(160), SETTINGS, settings_backfill::bump_industry_density),
    step("prune_persistent_storage", before(161), INDUSTRIES.union(STATIONS), industries::prune_persistent_storage),
    step("rescale_snow_line", before(164), SETTINGS, settings_backfill::rescale_snow_line),
    step("move_field_fences", between(32, 164), MAP, tiles::move_field_fences),
    step("set_town_growth_goals", before(165), TOWNS, towns::set_town_growth_goals),
    step("rescale_viewport_zoom", before(165), WorldParts::VIEWPORT, globals::rescale_viewport_zoom),
    step("reset_engine_availability", Gate::Always, NOTHING, globals::reset_engine_availability),
    step("mark_town_acceptance", before(166), NOTHING, towns::mark_town_acceptance),
    step("backfill_maintenance", before(166), SETTINGS, settings_backfill::backfill_maintenance),
    step("fix_road_stop_owners", before(172), MAP, tiles::fix_road_stop_owners),
    step("init_tree_limit", before(175), COMPANIES, companies::init_tree_limit),
    step("clamp_inflation", before(177), ECONOMY, economy::clamp_inflation),
    step("triple_bankruptcy_months", before(177), COMPANIES, companies::triple_bankruptcy_months),
    step("init_script_profile", before(178), SETTINGS, settings_backfill::init_script_profile),
    step("reset_aircraft_acceleration", before(182), VEHICLES, vehicles::reset_aircraft_acceleration),
    step("release_blocked_reservations", before(182), MAP, tiles::release_blocked_reservations),
    step("backfill_linkgraph_distribution", before(183), SETTINGS, settings_backfill::backfill_linkgraph_distribution),
    step("split_units", before(184), SETTINGS, settings_backfill::split_units),
    step("notify_pathfinder", Gate::Always, NOTHING, globals::notify_pathfinder),
    step("audit_tile_layout", Gate::Always, NOTHING, tiles::audit_tile_layout),
];

// ===========================================================================
// Plan
// ===========================================================================

/// An ordered selection of steps. The standard plan is [`STEPS`] in full;
/// tests derive reduced plans to check step dependencies.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    steps: Vec<&'static MigrationStep>,
}

impl MigrationPlan {
    pub fn standard() -> Self {
        Self {
            steps: STEPS.iter().collect(),
        }
    }

    /// The same plan without the named step.
    pub fn without(mut self, name: &str) -> Self {
        self.steps.retain(|s| s.name != name);
        self
    }

    pub fn steps(&self) -> &[&'static MigrationStep] {
        &self.steps
    }

    /// Steps whose gate opens for `version`, in order.
    pub fn applicable(&self, version: SaveVersion) -> impl Iterator<Item = &'static MigrationStep> + '_ {
        self.steps
            .iter()
            .copied()
            .filter(move |s| s.gate.applies(version))
    }

    /// Run every applicable step. Returns the names of the steps applied.
    pub fn run(&self, session: &mut LoadSession<'_>) -> Result<Vec<&'static str>, LoadError> {
        let from = session.version();
        let mut applied = Vec::new();
        for step in self.applicable(from) {
            debug!(step = step.name, from_version = %from, "applying migration step");
            (step.apply)(session).map_err(|e| LoadError::from_step(step.name, e))?;
            if step.gate != Gate::Always {
                session.log.push(LogEntry::Migrated {
                    step: step.name,
                    from,
                });
            }
            applied.push(step.name);
        }
        Ok(applied)
    }
}

impl Default for MigrationPlan {
    fn default() -> Self {
        Self::standard()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
