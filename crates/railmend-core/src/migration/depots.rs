//! Depot records: map linkage, default names and build dates.

use super::LoadSession;
use crate::error::StepError;
use crate::id::{DepotId, TownId};
use crate::map::TileIndex;
use crate::tile::{Tile, TileKind, gb};

/// Smallest number not already in `used`.
pub(super) fn first_unused_number(used: impl IntoIterator<Item = u16>) -> u16 {
    let mut taken: Vec<u16> = used.into_iter().collect();
    taken.sort_unstable();
    taken.dedup();
    let mut next = 0;
    for n in taken {
        if n != next {
            break;
        }
        next += 1;
    }
    next
}

fn is_depot_tile(tile: &Tile) -> bool {
    tile.is_rail_depot() || tile.is_road_depot() || tile.is_ship_depot()
}

/// The other half of a two-tile ship depot. Bit 0 of `m5` is the part
/// (0 = northern), bit 1 the axis.
fn other_ship_depot_tile(s: &LoadSession<'_>, t: TileIndex, tile: &Tile) -> Option<TileIndex> {
    let northern = gb(tile.m5 as u32, 0, 1) == 0;
    let (dx, dy) = if gb(tile.m5 as u32, 1, 1) == 0 { (1, 0) } else { (0, 1) };
    let sign = if northern { 1 } else { -1 };
    s.world.map.offset(t, dx * sign, dy * sign)
}

/// Depot tiles point back at their depot record.
pub fn store_depot_index(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (id, xy) in depot_locations(s) {
        let tile = s
            .world
            .map
            .get(xy)
            .copied()
            .filter(is_depot_tile)
            .ok_or_else(|| {
                StepError::corrupt(format!("depot {} at tile {} has no depot tile", id.0, xy.0))
            })?;
        let mut targets = vec![xy];
        if tile.kind == TileKind::Water {
            let other = other_ship_depot_tile(s, xy, &tile).ok_or_else(|| {
                StepError::corrupt(format!("ship depot {} has no second half", id.0))
            })?;
            targets.push(other);
        }
        for t in targets {
            if let Some(slot) = s.world.map.get_mut(t) {
                slot.set_depot(id);
            }
        }
    }
    Ok(())
}

fn depot_locations(s: &LoadSession<'_>) -> Vec<(DepotId, TileIndex)> {
    s.world.depots.iter().map(|(id, d)| (id, d.xy)).collect()
}

/// Every depot gets the nearest town and the lowest free number in it.
pub fn name_depots(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for d in s.world.depots.values_mut() {
        d.town_cn = u16::MAX;
    }
    for (id, xy) in depot_locations(s) {
        let town = s.world.closest_town(xy).unwrap_or(TownId::INVALID);
        let number = first_unused_number(
            s.world
                .depots
                .iter()
                .filter(|&(other, d)| other != id && d.town == town)
                .map(|(_, d)| d.town_cn),
        );
        if let Some(d) = s.world.depots.get_mut(id) {
            d.town = town;
            d.town_cn = number;
        }
    }
    Ok(())
}

pub fn date_depots(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let today = s.world.clock.date;
    for d in s.world.depots.values_mut() {
        d.build_date = today;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Depot;
    use crate::id::{Owner, TownId};
    use crate::test_utils::{apply_step, place, small_world};
    use crate::tile::water_bits;
    use crate::version::SaveVersion;

    #[test]
    fn unused_number_fills_first_gap() {
        assert_eq!(first_unused_number(std::iter::empty()), 0);
        assert_eq!(first_unused_number([0, 1, 3]), 2);
        assert_eq!(first_unused_number([1, 2]), 0);
        assert_eq!(first_unused_number([0, 0, u16::MAX]), 1);
    }

    #[test]
    fn ship_depot_index_reaches_both_halves() {
        let mut world = small_world();
        let mut north = Tile::water(crate::tile::WaterClass::Canal, Owner(0));
        north.m5 = (water_bits::TYPE_DEPOT << 4) as u8;
        let mut south = north;
        south.m5 |= 1;
        place(&mut world, 4, 4, north);
        place(&mut world, 5, 4, south);
        let xy = world.map.tile_xy(4, 4);
        world.depots.insert_at(DepotId(3), Depot::new(xy)).unwrap();

        let world = apply_step(world, SaveVersion::new(127, 0), "store_depot_index").unwrap();
        for x in [4, 5] {
            let t = world.map.tile_xy(x, 4);
            assert_eq!(world.map.get(t).unwrap().depot(), DepotId(3));
        }
    }

    #[test]
    fn depot_record_without_tile_is_corrupt() {
        let mut world = small_world();
        let xy = world.map.tile_xy(2, 2);
        world.depots.insert(Depot::new(xy)).unwrap();
        let res = apply_step(world, SaveVersion::new(127, 0), "store_depot_index");
        assert!(matches!(res, Err(StepError::Corrupt(_))));
    }

    #[test]
    fn depots_are_numbered_per_town() {
        let mut world = small_world();
        for x in [3, 4] {
            let xy = world.map.tile_xy(x, 8);
            world.depots.insert(Depot::new(xy)).unwrap();
        }
        let world = apply_step(world, SaveVersion::new(140, 0), "name_depots").unwrap();
        let got: Vec<_> = world.depots.values().map(|d| (d.town, d.town_cn)).collect();
        assert_eq!(got, vec![(TownId(0), 0), (TownId(0), 1)]);
    }
}
