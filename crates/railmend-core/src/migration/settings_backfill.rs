//! Settings that did not exist when a snapshot was written.
//!
//! A missing setting is filled with the value that reproduces how the old
//! version behaved, never with the new-game default. A few settings changed
//! meaning instead and are converted.

use super::LoadSession;
use crate::entity::VehicleType;
use crate::error::StepError;
use crate::settings::{DistributionType, Pathfinder, script_profile};

pub fn normalize_road_side(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let side = &mut s.world.settings.vehicle.road_side;
    if *side != 0 {
        *side = 1;
    }
    Ok(())
}

pub fn backfill_modified_catchment(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.station.modified_catchment = false;
    Ok(())
}

pub fn backfill_forbid_90_deg(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.pf.forbid_90_deg = false;
    Ok(())
}

pub fn backfill_train_acceleration(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.vehicle.train_acceleration_model = 0;
    Ok(())
}

pub fn enable_elrails(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.vehicle.disable_elrails = false;
    Ok(())
}

/// A new lowest option was added to both settings.
pub fn bump_difficulty_levels(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let d = &mut s.world.settings.difficulty;
    if d.industry_density > 0 {
        d.industry_density += 1;
    }
    d.number_towns += 1;
    Ok(())
}

pub fn convert_pathfinder_settings(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let early = s.before(28);
    let pf = &mut s.world.settings.pf;
    pf.pathfinder_for_trains = if pf.rail_use_yapf || early {
        Pathfinder::Yapf
    } else {
        Pathfinder::Npf
    };
    pf.pathfinder_for_roadvehs = if pf.road_use_yapf || early {
        Pathfinder::Yapf
    } else {
        Pathfinder::Npf
    };
    pf.pathfinder_for_ships = if pf.ship_use_yapf {
        Pathfinder::Yapf
    } else if pf.new_pathfinding_all {
        Pathfinder::Npf
    } else {
        Pathfinder::Opf
    };
    Ok(())
}

pub fn backfill_plane_speed(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.vehicle.plane_speed = 4;
    Ok(())
}

pub fn backfill_dynamic_engines(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.vehicle.dynamic_engines = false;
    Ok(())
}

pub fn backfill_noise_level(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.economy.station_noise_level = false;
    Ok(())
}

pub fn backfill_freeform_edges(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.construction.freeform_edges = false;
    Ok(())
}

pub fn backfill_road_acceleration(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let v = &mut s.world.settings.vehicle;
    v.roadveh_acceleration_model = 0;
    v.train_slope_steepness = 3;
    Ok(())
}

pub fn backfill_feeder_share(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.economy.feeder_payment_share = 75;
    Ok(())
}

pub fn backfill_plane_crashes(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.vehicle.plane_crashes = 2;
    Ok(())
}

pub fn backfill_road_slope(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.vehicle.roadveh_slope_steepness = 7;
    Ok(())
}

pub fn backfill_town_crossings(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.economy.allow_town_level_crossings = true;
    Ok(())
}

/// Before 100 there was no "never wait" value (255), so reversing at
/// signals was always possible.
pub fn convert_reversing(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let early = s.before(100);
    let pf = &mut s.world.settings.pf;
    pf.reverse_at_signals = early
        || (pf.wait_oneway_signal != 255
            && pf.wait_twoway_signal != 255
            && pf.wait_for_pbs_path != 255);
    Ok(())
}

pub fn backfill_length_limits(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.vehicle.max_train_length = 50;
    s.world.settings.construction.max_bridge_length = 64;
    s.world.settings.construction.max_tunnel_length = 64;
    Ok(())
}

/// No existing train may exceed the length limit.
pub fn fit_max_train_length(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let longest = s
        .world
        .vehicles
        .iter()
        .filter(|(id, v)| v.kind() == VehicleType::Train && v.is_front(*id))
        .filter_map(|(_, v)| match v.detail {
            crate::entity::VehicleDetail::Train { total_length, .. } => {
                Some(total_length.div_ceil(16))
            }
            _ => None,
        })
        .max()
        .unwrap_or(0);
    let limit = &mut s.world.settings.vehicle.max_train_length;
    *limit = (*limit as u16).max(longest).min(u8::MAX as u16) as u8;
    Ok(())
}

pub fn bump_industry_density(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let d = &mut s.world.settings.difficulty;
    if d.industry_density > 0 {
        d.industry_density += 1;
    }
    Ok(())
}

const MIN_SNOWLINE_HEIGHT: u8 = 2;
const TILE_HEIGHT: u8 = 8;

/// The snow line used to be stored in height units instead of levels.
pub fn rescale_snow_line(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let line = &mut s.world.settings.game_creation.snow_line_height;
    if *line >= MIN_SNOWLINE_HEIGHT * TILE_HEIGHT {
        *line /= TILE_HEIGHT;
    }
    Ok(())
}

pub fn backfill_maintenance(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.settings.economy.infrastructure_maintenance = false;
    Ok(())
}

pub fn init_script_profile(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let level = s.world.legacy.old_diff_level;
    s.world.settings.script.settings_profile = if level < script_profile::END {
        level
    } else {
        script_profile::MEDIUM
    };
    Ok(())
}

pub fn backfill_linkgraph_distribution(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let lg = &mut s.world.settings.linkgraph;
    lg.distribution_pax = DistributionType::Manual;
    lg.distribution_mail = DistributionType::Manual;
    lg.distribution_armoured = DistributionType::Manual;
    lg.distribution_default = DistributionType::Manual;
    Ok(())
}

/// One unit system selector became one per quantity.
pub fn split_units(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let old = s.world.legacy.old_units;
    let locale = &mut s.world.settings.locale;
    locale.units_velocity = old.clamp(0, 2);
    locale.units_power = old.clamp(0, 2);
    locale.units_weight = old.clamp(1, 2);
    locale.units_volume = old.clamp(1, 2);
    locale.units_force = 2;
    locale.units_height = old.clamp(0, 2);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::settings::{GameSettings, Pathfinder};
    use crate::test_utils::{apply_step, small_world};
    use crate::version::SaveVersion;

    #[test]
    fn backfill_uses_legacy_value_not_new_game_default() {
        assert!(GameSettings::default().station.modified_catchment);
        let world = apply_step(small_world(), SaveVersion::new(4, 0), "backfill_modified_catchment").unwrap();
        assert!(!world.settings.station.modified_catchment);
    }

    #[test]
    fn pathfinder_conversion_honours_old_flags() {
        let mut world = small_world();
        world.settings.pf.rail_use_yapf = false;
        world.settings.pf.road_use_yapf = false;
        world.settings.pf.ship_use_yapf = false;
        world.settings.pf.new_pathfinding_all = true;
        let world = apply_step(world, SaveVersion::new(50, 0), "convert_pathfinder_settings").unwrap();
        assert_eq!(world.settings.pf.pathfinder_for_trains, Pathfinder::Npf);
        assert_eq!(world.settings.pf.pathfinder_for_roadvehs, Pathfinder::Npf);
        assert_eq!(world.settings.pf.pathfinder_for_ships, Pathfinder::Npf);

        let mut early = small_world();
        early.settings.pf.rail_use_yapf = false;
        early.settings.pf.ship_use_yapf = false;
        early.settings.pf.new_pathfinding_all = false;
        let early = apply_step(early, SaveVersion::new(20, 0), "convert_pathfinder_settings").unwrap();
        assert_eq!(early.settings.pf.pathfinder_for_trains, Pathfinder::Yapf);
        assert_eq!(early.settings.pf.pathfinder_for_ships, Pathfinder::Opf);
    }

    #[test]
    fn units_split_clamps_per_quantity() {
        let mut world = small_world();
        world.legacy.old_units = 0;
        let world = apply_step(world, SaveVersion::new(183, 0), "split_units").unwrap();
        let l = &world.settings.locale;
        assert_eq!((l.units_velocity, l.units_weight, l.units_force), (0, 1, 2));
    }

    #[test]
    fn snow_line_rescaled_only_when_in_height_units() {
        let mut world = small_world();
        world.settings.game_creation.snow_line_height = 56;
        let world = apply_step(world, SaveVersion::new(163, 0), "rescale_snow_line").unwrap();
        assert_eq!(world.settings.game_creation.snow_line_height, 7);

        let mut low = small_world();
        low.settings.game_creation.snow_line_height = 9;
        let low = apply_step(low, SaveVersion::new(163, 0), "rescale_snow_line").unwrap();
        assert_eq!(low.settings.game_creation.snow_line_height, 9);
    }

    #[test]
    fn script_profile_falls_back_to_medium() {
        let mut world = small_world();
        world.legacy.old_diff_level = 3;
        let world = apply_step(world, SaveVersion::new(170, 0), "init_script_profile").unwrap();
        assert_eq!(world.settings.script.settings_profile, 1);
    }

    #[test]
    fn reversing_depends_on_never_wait_values() {
        let mut world = small_world();
        world.settings.pf.wait_oneway_signal = 255;
        let late = apply_step(world.clone(), SaveVersion::new(120, 0), "convert_reversing").unwrap();
        assert!(!late.settings.pf.reverse_at_signals);
        let early = apply_step(world, SaveVersion::new(90, 0), "convert_reversing").unwrap();
        assert!(early.settings.pf.reverse_at_signals);
    }
}
