//! Company records: provisioning, renewal defaults, limits and names.

use tracing::{debug, info};

use super::LoadSession;
use crate::context::GameMode;
use crate::entity::{
    Company, RATING_INITIAL, SPECSTR_PRESIDENT_NAME, SPECSTR_TOWNNAME_START, STR_SV_STNAME_FALLBACK,
    STR_SV_UNNAMED, VehicleDefaults, VehicleType,
};
use crate::error::StepError;
use crate::id::{CompanyId, MAX_COMPANIES, VehicleId};
use crate::world::LegacyGlobals;

/// AI companies whose script is missing get the default one once the load
/// has succeeded.
pub fn provision_ai_scripts(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (id, c) in s.world.companies.iter() {
        if c.is_ai && c.script.is_none() {
            s.pending_scripts.push(id);
        }
    }
    Ok(())
}

/// Scenarios carry no company, so the local player gets one. Network games
/// may legitimately have none, except on a server someone plays on.
pub fn provision_first_company(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let net = s.ctx.network;
    let wants_company = !net.is_networking() || (net.is_server() && !net.is_dedicated());
    if s.ctx.game_mode != GameMode::Normal
        || s.world.companies.contains(CompanyId::FIRST)
        || !wants_company
    {
        return Ok(());
    }
    let mut c = Company::new(0);
    c.settings = s.ctx.prefs.company;
    c.inaugurated_year = s.world.clock.cur_year;
    s.world.companies.insert_at(CompanyId::FIRST, c)?;
    info!("provisioned the first company");
    Ok(())
}

pub fn init_autorenew(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for c in s.world.companies.values_mut() {
        c.settings.engine_renew = false;
        c.settings.engine_renew_months = 6;
        c.settings.engine_renew_money = 100_000;
    }
    // The local player always ends up as the first company; a dedicated
    // server has no local player.
    if !s.ctx.network.is_dedicated() {
        let prefs = s.ctx.prefs.company;
        if let Some(c) = s.world.companies.get_mut(CompanyId::FIRST) {
            c.settings = prefs;
        }
    }
    Ok(())
}

pub fn init_keep_length(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for c in s.world.companies.values_mut() {
        c.settings.renew_keep_length = false;
    }
    Ok(())
}

pub fn reset_livery(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for c in s.world.companies.values_mut() {
        c.livery.colour1 = c.colour;
        c.livery.colour2 = c.colour;
    }
    Ok(())
}

/// Look up a custom name of the pre-84 name table.
fn old_name(legacy: &LegacyGlobals, id: u16) -> Option<String> {
    if id >> 11 != 0xF {
        return None;
    }
    legacy.old_names.get(&(id & 0x1FF)).cloned()
}

/// Custom names moved out of the shared name table into the records that
/// use them.
pub fn copy_legacy_names(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let w = &mut s.world;
    let legacy = &w.legacy;
    let mut copied = 0usize;

    for c in w.companies.values_mut() {
        if let Some(name) = old_name(legacy, c.name_1) {
            c.name = Some(name);
            c.name_1 = STR_SV_UNNAMED;
            copied += 1;
        }
        if let Some(name) = old_name(legacy, c.president_name_1) {
            c.president_name = Some(name);
            c.president_name_1 = SPECSTR_PRESIDENT_NAME;
            copied += 1;
        }
    }
    for st in w.stations.values_mut() {
        if let Some(name) = old_name(legacy, st.string_id) {
            st.name = Some(name);
            st.string_id = STR_SV_STNAME_FALLBACK;
            copied += 1;
        }
    }
    let generator = w.settings.game_creation.town_name as u16;
    for t in w.towns.values_mut() {
        if let Some(name) = old_name(legacy, t.name_type) {
            t.name = Some(name);
            t.name_type = SPECSTR_TOWNNAME_START + generator;
            copied += 1;
        }
    }
    debug!(copied, "copied legacy custom names");
    Ok(())
}

/// The old name table never survives a load.
pub fn clear_legacy_name_table(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.legacy.old_names.clear();
    Ok(())
}

/// Company bit masks and rating tables grew from 8 to 15 companies.
pub fn widen_company_masks(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let w = &mut s.world;

    // Shadows and rotors share the engine of their aircraft.
    let parts: Vec<(VehicleId, VehicleId)> = w
        .vehicles
        .iter()
        .filter(|(_, v)| v.kind() == VehicleType::Aircraft && !v.is_normal_aircraft())
        .map(|(id, v)| (id, v.first))
        .collect();
    for (id, first) in parts {
        let engine = w
            .vehicles
            .get(first)
            .ok_or_else(|| StepError::corrupt(format!("aircraft part {} has no aircraft", id.0)))?
            .engine;
        if let Some(v) = w.vehicles.get_mut(id) {
            v.engine = engine;
        }
    }

    for c in w.companies.values_mut() {
        if c.bankrupt_asked == 0xFF {
            c.bankrupt_asked = 0xFFFF;
        }
    }
    for e in w.engines.values_mut() {
        if e.company_avail == 0xFF {
            e.company_avail = 0xFFFF;
        }
    }
    for t in w.towns.values_mut() {
        if t.have_ratings == 0xFF {
            t.have_ratings = 0xFFFF;
        }
        for r in &mut t.ratings[8..MAX_COMPANIES as usize] {
            *r = RATING_INITIAL;
        }
    }
    Ok(())
}

pub fn reset_vehicle_defaults(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for c in s.world.companies.values_mut() {
        c.settings.vehicle = VehicleDefaults::LEGACY;
    }
    Ok(())
}

pub fn init_construction_limits(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let cons = &s.world.settings.construction;
    let (terraform, clear) = (
        (cons.terraform_frame_burst as u32) << 16,
        (cons.clear_frame_burst as u32) << 16,
    );
    for c in s.world.companies.values_mut() {
        c.terraform_limit = terraform;
        c.clear_limit = clear;
    }
    Ok(())
}

pub fn init_tree_limit(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let trees = (s.world.settings.construction.tree_frame_burst as u32) << 16;
    for c in s.world.companies.values_mut() {
        c.tree_limit = trees;
    }
    Ok(())
}

/// Bankruptcy used to be counted in quarters.
pub fn triple_bankruptcy_months(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for c in s.world.companies.values_mut() {
        c.months_of_bankruptcy = c.months_of_bankruptcy.saturating_mul(3);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LoadContext, NetworkRole};
    use crate::entity::{CompanySettings, Engine, EngineInfo, Station, Town, Vehicle, VehicleDetail};
    use crate::id::{EngineId, Owner, StationId, TownId};
    use crate::map::TileIndex;
    use crate::test_utils::{apply_step, run_step, run_step_with, small_world};
    use crate::version::SaveVersion;

    const V: SaveVersion = SaveVersion::new(50, 0);

    #[test]
    fn ai_without_script_is_queued() {
        let mut world = small_world();
        let mut ai = Company::new(3);
        ai.is_ai = true;
        world.companies.insert_at(CompanyId(2), ai).unwrap();
        let run = run_step(world, SaveVersion::new(184, 0), "provision_ai_scripts");
        assert!(run.result.is_ok());
        assert_eq!(run.pending_scripts, vec![CompanyId(2)]);
    }

    #[test]
    fn scenario_load_gets_a_company() {
        let mut world = small_world();
        world.companies.clear();
        world.clock.cur_year = 1990;
        let world = apply_step(world, SaveVersion::new(184, 0), "provision_first_company").unwrap();
        let c = world.companies.get(CompanyId::FIRST).unwrap();
        assert_eq!(c.inaugurated_year, 1990);
        assert_eq!(c.settings, CompanySettings::default());
    }

    #[test]
    fn dedicated_server_gets_no_company() {
        let mut world = small_world();
        world.companies.clear();
        let ctx = LoadContext {
            network: NetworkRole::Server { dedicated: true },
            ..LoadContext::default()
        };
        let run = run_step_with(world, SaveVersion::new(184, 0), "provision_first_company", &ctx);
        assert!(run.result.is_ok());
        assert!(run.world.companies.is_empty());
    }

    #[test]
    fn legacy_names_are_copied_out() {
        let mut world = small_world();
        world.legacy.old_names.insert(3, "Acme Rail".into());
        world.legacy.old_names.insert(4, "Smallville".into());
        world.settings.game_creation.town_name = 2;
        world.companies.get_mut(CompanyId(0)).unwrap().name_1 = 0x7803;
        world.towns.get_mut(TownId(0)).unwrap().name_type = 0x7804;
        let mut st = Station::new(TileIndex(40), Owner(0));
        st.string_id = 0x1234;
        world.stations.insert_at(StationId(0), st).unwrap();

        let world = apply_step(world, SaveVersion::new(83, 0), "copy_legacy_names").unwrap();
        let c = world.companies.get(CompanyId(0)).unwrap();
        assert_eq!(c.name.as_deref(), Some("Acme Rail"));
        assert_eq!(c.name_1, STR_SV_UNNAMED);
        let t = world.towns.get(TownId(0)).unwrap();
        assert_eq!(t.name.as_deref(), Some("Smallville"));
        assert_eq!(t.name_type, SPECSTR_TOWNNAME_START + 2);
        // Not a custom name id.
        assert_eq!(world.stations.get(StationId(0)).unwrap().string_id, 0x1234);
    }

    #[test]
    fn masks_widen_to_all_companies() {
        let mut world = small_world();
        world.companies.get_mut(CompanyId(0)).unwrap().bankrupt_asked = 0xFF;
        let mut town = Town::new(TileIndex(30));
        town.have_ratings = 0xFF;
        town.ratings[9] = -50;
        world.towns.insert_at(TownId(1), town).unwrap();
        let info = EngineInfo {
            railtype: 0,
            is_tram: false,
            acceleration: 0,
            max_speed: 0,
        };
        world
            .engines
            .insert_at(
                EngineId(7),
                Engine {
                    kind: VehicleType::Aircraft,
                    intro_date: 0,
                    company_avail: 0xFF,
                    info,
                },
            )
            .unwrap();
        let detail = VehicleDetail::Aircraft {
            state: 0,
            turn_counter: 0,
            target_airport: StationId::INVALID,
        };
        let mut plane = Vehicle::new(VehicleId(0), detail.clone(), Owner(0), TileIndex(20));
        plane.engine = EngineId(7);
        let mut shadow = Vehicle::new(VehicleId(1), detail, Owner(0), TileIndex(20));
        shadow.subtype = crate::entity::aircraft::SHADOW;
        shadow.first = VehicleId(0);
        world.vehicles.insert_at(VehicleId(0), plane).unwrap();
        world.vehicles.insert_at(VehicleId(1), shadow).unwrap();

        let world = apply_step(world, SaveVersion::new(103, 0), "widen_company_masks").unwrap();
        assert_eq!(world.companies.get(CompanyId(0)).unwrap().bankrupt_asked, 0xFFFF);
        assert_eq!(world.engines.get(EngineId(7)).unwrap().company_avail, 0xFFFF);
        let t = world.towns.get(TownId(1)).unwrap();
        assert_eq!((t.have_ratings, t.ratings[9]), (0xFFFF, RATING_INITIAL));
        assert_eq!(world.vehicles.get(VehicleId(1)).unwrap().engine, EngineId(7));
    }

    #[test]
    fn limits_follow_frame_burst() {
        let mut world = small_world();
        world.settings.construction.tree_frame_burst = 10;
        let world = apply_step(world, SaveVersion::new(174, 0), "init_tree_limit").unwrap();
        assert_eq!(world.companies.get(CompanyId(0)).unwrap().tree_limit, 10 << 16);
    }

    #[test]
    fn bankruptcy_quarters_become_months() {
        let mut world = small_world();
        world.companies.get_mut(CompanyId(0)).unwrap().months_of_bankruptcy = 2;
        let world = apply_step(world, SaveVersion::new(176, 0), "triple_bankruptcy_months").unwrap();
        assert_eq!(world.companies.get(CompanyId(0)).unwrap().months_of_bankruptcy, 6);
    }

    #[test]
    fn autorenew_defaults_apply() {
        let mut world = small_world();
        world.companies.insert_at(CompanyId(1), Company::new(2)).unwrap();
        let world = apply_step(world, V, "init_autorenew").unwrap();
        let other = world.companies.get(CompanyId(1)).unwrap();
        assert!(!other.settings.engine_renew);
        // The first company takes the local preferences.
        let first = world.companies.get(CompanyId(0)).unwrap();
        assert_eq!(first.settings, CompanySettings::default());
    }
}
