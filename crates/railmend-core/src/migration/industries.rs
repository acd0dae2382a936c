//! Industry records and persistent storage.

use super::LoadSession;
use crate::catalog::industry_spec;
use crate::entity::{PersistentStorage, facility};
use crate::error::StepError;
use crate::id::Owner;

pub fn reset_industry_founder(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for i in s.world.industries.values_mut() {
        i.founder = Owner::NONE;
    }
    Ok(())
}

/// Industries started carrying their own cargo lists instead of reading
/// them from the type table.
pub fn copy_industry_cargo(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (id, i) in s.world.industries.iter_mut() {
        let spec = industry_spec(i.kind).ok_or_else(|| {
            StepError::corrupt(format!("industry {} has unknown type {}", id.0, i.kind))
        })?;
        i.produced_cargo = spec.produced_cargo;
        i.accepts_cargo = spec.accepts_cargo;
    }
    Ok(())
}

/// Storage that was all zeroes is dropped; the rest is tagged with the
/// content set that owns it. Base industries and airports belong to set 0.
fn prune(psa: &mut Option<PersistentStorage>) {
    match psa {
        Some(p) if p.is_empty() => *psa = None,
        Some(p) => p.grfid = 0,
        None => {}
    }
}

/// Persistent storage moved into a pool of its own; only used storage
/// survives.
pub fn prune_persistent_storage(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let version = s.version();
    if !version.is_before(76) {
        for i in s.world.industries.values_mut() {
            prune(&mut i.psa);
        }
    }
    if !version.is_before(145) {
        for st in s.world.stations.values_mut() {
            if st.has_facility(facility::AIRPORT) {
                prune(&mut st.airport.psa);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CT_GRAIN, CT_INVALID, CT_LIVESTOCK, IT_FARM};
    use crate::entity::{Industry, Station};
    use crate::id::{IndustryId, StationId};
    use crate::map::{TileArea, TileIndex};
    use crate::test_utils::{apply_step, small_world};
    use crate::version::SaveVersion;

    fn storage(first: i32) -> PersistentStorage {
        let mut storage = [0; 16];
        storage[0] = first;
        PersistentStorage { grfid: 0xDEAD, storage }
    }

    #[test]
    fn cargo_comes_from_type_table() {
        let mut world = small_world();
        let area = TileArea::new(TileIndex(34), 2, 2);
        world.industries.insert_at(IndustryId(0), Industry::new(area, IT_FARM)).unwrap();
        let world = apply_step(world, SaveVersion::new(77, 0), "copy_industry_cargo").unwrap();
        let farm = world.industries.get(IndustryId(0)).unwrap();
        assert_eq!(farm.produced_cargo, [CT_GRAIN, CT_LIVESTOCK]);
        assert_eq!(farm.accepts_cargo, [CT_INVALID; 3]);
    }

    #[test]
    fn unknown_industry_type_is_corrupt() {
        let mut world = small_world();
        let area = TileArea::new(TileIndex(34), 1, 1);
        world.industries.insert(Industry::new(area, 200)).unwrap();
        let res = apply_step(world, SaveVersion::new(77, 0), "copy_industry_cargo");
        assert!(matches!(res, Err(StepError::Corrupt(_))));
    }

    #[test]
    fn empty_storage_is_dropped() {
        let mut world = small_world();
        let area = TileArea::new(TileIndex(34), 1, 1);
        let mut used = Industry::new(area, 0);
        used.psa = Some(storage(7));
        let mut unused = Industry::new(area, 0);
        unused.psa = Some(storage(0));
        world.industries.insert_at(IndustryId(0), used).unwrap();
        world.industries.insert_at(IndustryId(1), unused).unwrap();
        let mut st = Station::new(TileIndex(50), Owner(0));
        st.facilities = facility::AIRPORT;
        st.airport.psa = Some(storage(0));
        world.stations.insert_at(StationId(0), st).unwrap();

        // Airport storage is only inspected from 145 on.
        let world = apply_step(world, SaveVersion::new(100, 0), "prune_persistent_storage").unwrap();
        assert_eq!(world.industries.get(IndustryId(0)).unwrap().psa.map(|p| p.grfid), Some(0));
        assert!(world.industries.get(IndustryId(1)).unwrap().psa.is_none());
        assert!(world.stations.get(StationId(0)).unwrap().airport.psa.is_some());
    }
}
