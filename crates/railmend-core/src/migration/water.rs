//! Water class inference.
//!
//! Old snapshots did not record whether a lock, dock, buoy or water-based
//! industry tile sat on sea, canal or river. The class is inferred from the
//! four edge neighbours.

use tracing::trace;

use super::LoadSession;
use crate::catalog::{IndustryBehaviour, industry_spec};
use crate::error::StepError;
use crate::id::{MAX_COMPANIES, Owner};
use crate::map::{DiagDirection, TileIndex, TileMap};
use crate::tile::{RAIL_GROUND_WATER, TREE_GROUND_SHORE, Tile, TileKind, WaterClass, WaterTileKind};
use crate::world::{ORIGINAL_BASE_YEAR, year_of};

/// What the neighbours of a tile say about its water.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaterGuess {
    pub sea: bool,
    pub canal: bool,
    pub river: bool,
}

impl WaterGuess {
    /// Inspect the edge neighbours of `t`.
    ///
    /// Coast tiles, shore trees and flooded rail count as sea. Locks are
    /// ignored since their own class may still be unresolved. A plain water
    /// neighbour without a class is corrupt.
    pub fn survey(map: &TileMap, t: TileIndex) -> Result<Self, StepError> {
        let mut guess = WaterGuess::default();
        for dir in DiagDirection::ALL {
            let Some(n) = map.neighbour(t, dir) else {
                continue;
            };
            let Some(tile) = map.get(n) else { continue };
            match tile.kind {
                TileKind::Water => match tile.water_tile_kind() {
                    None => {
                        return Err(StepError::corrupt(format!(
                            "water tile {} has unknown kind {}",
                            n.0,
                            tile.m5 >> 4
                        )));
                    }
                    Some(WaterTileKind::Coast) => guess.sea = true,
                    Some(WaterTileKind::Lock) => {}
                    Some(WaterTileKind::Clear | WaterTileKind::Depot) => match tile.water_class() {
                        WaterClass::Sea => guess.sea = true,
                        WaterClass::Canal => guess.canal = true,
                        WaterClass::River => guess.river = true,
                        WaterClass::Invalid => {
                            return Err(StepError::corrupt(format!(
                                "water tile {} has no water class",
                                n.0
                            )));
                        }
                    },
                },
                TileKind::Railway => guess.sea |= tile.rail_ground() == RAIL_GROUND_WATER,
                TileKind::Trees => guess.sea |= tile.trees_ground() == TREE_GROUND_SHORE,
                _ => {}
            }
        }
        Ok(guess)
    }

    pub fn is_dry(&self) -> bool {
        !self.sea && !self.canal && !self.river
    }

    /// Resolve to a class. River beats canal beats sea; with no water
    /// around, canal is assumed unless `allow_invalid` is set.
    pub fn class(&self, allow_invalid: bool) -> WaterClass {
        if self.is_dry() && allow_invalid {
            WaterClass::Invalid
        } else if self.river {
            WaterClass::River
        } else if self.canal || !self.sea {
            WaterClass::Canal
        } else {
            WaterClass::Sea
        }
    }
}

fn is_border(map: &TileMap, t: TileIndex) -> bool {
    let (x, y) = (map.tile_x(t), map.tile_y(t));
    x == 0 || y == 0 || x + 1 == map.max_x() || y + 1 == map.max_y()
}

/// Infer the water class of `t` from its surroundings.
///
/// A sloped tile is land: [`WaterClass::Invalid`] when `allow_invalid` is
/// set, corrupt otherwise. Tiles on the map border are always sea.
pub fn guess_water_class(
    map: &TileMap,
    t: TileIndex,
    allow_invalid: bool,
) -> Result<WaterClass, StepError> {
    let tile = map
        .get(t)
        .ok_or_else(|| StepError::corrupt(format!("tile {} is off the map", t.0)))?;
    if !tile.is_flat() {
        return if allow_invalid {
            Ok(WaterClass::Invalid)
        } else {
            Err(StepError::corrupt(format!(
                "tile {} needs a water class but is not flat",
                t.0
            )))
        };
    }
    if is_border(map, t) {
        return Ok(WaterClass::Sea);
    }
    Ok(WaterGuess::survey(map, t)?.class(allow_invalid))
}

/// Turn `tile` back into water of the class it records. Sloped tiles and
/// tiles without a usable class become bare land; raised sea becomes canal.
pub(crate) fn make_water_keeping_class(tile: &mut Tile, owner: Owner) {
    let mut class = tile.water_class();
    if !tile.is_flat() {
        class = WaterClass::Invalid;
    }
    if class == WaterClass::Sea && tile.height > 0 {
        class = WaterClass::Canal;
    }
    let (height, slope, zone) = (tile.height, tile.slope, tile.tropic_zone);
    match class {
        WaterClass::Invalid => tile.make_clear(),
        WaterClass::Canal => *tile = Tile::water(WaterClass::Canal, owner),
        other => *tile = Tile::water(other, Owner::WATER),
    }
    tile.height = height;
    tile.slope = slope;
    tile.tropic_zone = zone;
}

fn apply_guess(s: &mut LoadSession<'_>, t: TileIndex, allow_invalid: bool) -> Result<(), StepError> {
    let class = guess_water_class(&s.world.map, t, allow_invalid)?;
    if let Some(tile) = s.world.map.get_mut(t) {
        tile.set_water_class(class);
    }
    trace!(tile = t.0, ?class, "guessed water class");
    s.dirty.mark_tile(t);
    Ok(())
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

pub fn reassign_water_owner(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (_, tile) in s.world.map.iter_mut() {
        if tile.kind == TileKind::Water && tile.owner().0 >= MAX_COMPANIES {
            tile.set_owner(Owner::WATER);
        }
    }
    Ok(())
}

/// Flat locks, docks and buoys get a class from their neighbours.
pub fn guess_lock_dock_water_class(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for t in s.world.map.indices() {
        let Some(&tile) = s.world.map.get(t) else { continue };
        if !tile.is_flat() {
            continue;
        }
        let wanted = tile.is_water_of(WaterTileKind::Lock) || tile.is_dock() || tile.is_buoy();
        if wanted {
            apply_guess(s, t, false)?;
        }
    }
    Ok(())
}

/// Oil rigs and water-based industries get a class; every other industry
/// tile is marked dry. Completed houses switch from construction year to
/// age in the same pass.
pub fn classify_industry_water(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let cur_year = year_of(s.world.clock.date);
    for t in s.world.map.indices() {
        let Some(&tile) = s.world.map.get(t) else { continue };
        match tile.kind {
            TileKind::Station if tile.is_oilrig() => apply_guess(s, t, true)?,
            TileKind::Industry => {
                let on_water = s
                    .world
                    .industries
                    .get(tile.industry())
                    .and_then(|ind| industry_spec(ind.kind))
                    .is_some_and(|spec| spec.behaviour.contains(IndustryBehaviour::BUILT_ONWATER));
                if on_water {
                    apply_guess(s, t, true)?;
                } else if let Some(tile) = s.world.map.get_mut(t) {
                    tile.set_water_class(WaterClass::Invalid);
                }
            }
            TileKind::House if tile.house_completed() => {
                let built = tile.m5 as i32 + ORIGINAL_BASE_YEAR;
                let age = (cur_year - built).clamp(0, 0xFF) as u8;
                if let Some(tile) = s.world.map.get_mut(t) {
                    tile.m5 = age;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Only buoys, oil rigs and flat docks keep a water class.
pub fn reset_station_water_class(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (_, tile) in s.world.map.iter_mut() {
        if tile.kind != TileKind::Station {
            continue;
        }
        if !tile.is_buoy() && !tile.is_oilrig() && !(tile.is_dock() && tile.is_flat()) {
            tile.set_water_class(WaterClass::Invalid);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::water_bits;

    fn lake(size: u32) -> TileMap {
        let mut map = TileMap::new(size, size);
        for (_, tile) in map.iter_mut() {
            if tile.kind == TileKind::Clear {
                *tile = Tile::water(WaterClass::Sea, Owner::WATER);
            }
        }
        map
    }

    fn set(map: &mut TileMap, x: u32, y: u32, tile: Tile) {
        let t = map.tile_xy(x, y);
        if let Some(slot) = map.get_mut(t) {
            *slot = tile;
        }
    }

    #[test]
    fn river_beats_canal() {
        let mut map = TileMap::new(8, 8);
        set(&mut map, 2, 3, Tile::water(WaterClass::River, Owner::WATER));
        set(&mut map, 4, 3, Tile::water(WaterClass::Canal, Owner::NONE));
        let t = map.tile_xy(3, 3);
        assert_eq!(guess_water_class(&map, t, false).unwrap(), WaterClass::River);
    }

    #[test]
    fn only_canal_gives_canal() {
        let mut map = TileMap::new(8, 8);
        set(&mut map, 3, 2, Tile::water(WaterClass::Canal, Owner::NONE));
        let t = map.tile_xy(3, 3);
        assert_eq!(guess_water_class(&map, t, false).unwrap(), WaterClass::Canal);
    }

    #[test]
    fn canal_beats_sea() {
        let mut map = TileMap::new(8, 8);
        set(&mut map, 3, 2, Tile::water(WaterClass::Canal, Owner::NONE));
        set(&mut map, 3, 4, Tile::water(WaterClass::Sea, Owner::WATER));
        let t = map.tile_xy(3, 3);
        assert_eq!(guess_water_class(&map, t, false).unwrap(), WaterClass::Canal);
    }

    #[test]
    fn dry_surroundings_allow_invalid() {
        let map = TileMap::new(8, 8);
        let t = map.tile_xy(3, 3);
        assert_eq!(guess_water_class(&map, t, true).unwrap(), WaterClass::Invalid);
        assert_eq!(guess_water_class(&map, t, false).unwrap(), WaterClass::Canal);
    }

    #[test]
    fn shore_trees_count_as_sea() {
        let mut map = TileMap::new(8, 8);
        let mut trees = Tile::new(TileKind::Trees);
        trees.set_trees_ground(TREE_GROUND_SHORE);
        set(&mut map, 3, 2, trees);
        let t = map.tile_xy(3, 3);
        assert_eq!(guess_water_class(&map, t, true).unwrap(), WaterClass::Sea);
    }

    #[test]
    fn border_tiles_are_sea() {
        let mut map = TileMap::new(8, 8);
        set(&mut map, 1, 0, Tile::water(WaterClass::River, Owner::WATER));
        assert_eq!(guess_water_class(&map, map.tile_xy(0, 3), false).unwrap(), WaterClass::Sea);
        assert_eq!(guess_water_class(&map, map.tile_xy(6, 3), false).unwrap(), WaterClass::Sea);
    }

    #[test]
    fn classless_neighbour_is_corrupt() {
        let mut map = lake(8);
        set(&mut map, 3, 2, Tile::water(WaterClass::Invalid, Owner::WATER));
        let t = map.tile_xy(3, 3);
        assert!(matches!(
            guess_water_class(&map, t, false),
            Err(StepError::Corrupt(_))
        ));
    }

    #[test]
    fn sloped_tile_is_land() {
        let mut map = lake(8);
        let t = map.tile_xy(3, 3);
        if let Some(tile) = map.get_mut(t) {
            tile.slope = 1;
        }
        assert_eq!(guess_water_class(&map, t, true).unwrap(), WaterClass::Invalid);
        assert!(guess_water_class(&map, t, false).is_err());
    }

    #[test]
    fn lock_neighbours_are_ignored() {
        let mut map = TileMap::new(8, 8);
        let mut lock = Tile::water(WaterClass::Invalid, Owner::NONE);
        lock.m5 = (water_bits::TYPE_LOCK << 4) as u8;
        set(&mut map, 3, 2, lock);
        let t = map.tile_xy(3, 3);
        assert_eq!(guess_water_class(&map, t, true).unwrap(), WaterClass::Invalid);
    }
}
