use std::collections::BTreeSet;

use crate::id::{StationId, TownId};
use crate::map::TileIndex;

/// Derived state that steps invalidated instead of recomputing.
///
/// Steps only mark; the rebuilder reads the marks once every step has run.
/// Nothing here is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyCaches {
    stations: BTreeSet<StationId>,
    towns: BTreeSet<TownId>,
    tiles: BTreeSet<TileIndex>,
    partitions: [bool; 5],
}

impl DirtyCaches {
    pub const PARTITION_STATION_ACCEPTANCE: usize = 0;
    pub const PARTITION_TOWN_ACCEPTANCE: usize = 1;
    pub const PARTITION_ENGINES: usize = 2;
    pub const PARTITION_PATHFINDER: usize = 3;
    pub const PARTITION_VIEWPORT: usize = 4;
    pub const PARTITION_COUNT: usize = 5;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_partition(&mut self, idx: usize) {
        self.partitions[idx] = true;
    }

    pub fn is_partition_dirty(&self, idx: usize) -> bool {
        self.partitions[idx]
    }

    pub fn any_partition_dirty(&self) -> bool {
        self.partitions.iter().any(|&d| d)
    }

    /// Station acceptance must be recomputed for this station.
    pub fn mark_station(&mut self, station: StationId) {
        self.stations.insert(station);
        self.partitions[Self::PARTITION_STATION_ACCEPTANCE] = true;
    }

    /// Town acceptance must be recomputed for this town.
    pub fn mark_town(&mut self, town: TownId) {
        self.towns.insert(town);
        self.partitions[Self::PARTITION_TOWN_ACCEPTANCE] = true;
    }

    /// The tile needs redrawing.
    pub fn mark_tile(&mut self, tile: TileIndex) {
        self.tiles.insert(tile);
        self.partitions[Self::PARTITION_VIEWPORT] = true;
    }

    pub fn dirty_stations(&self) -> &BTreeSet<StationId> {
        &self.stations
    }

    pub fn dirty_towns(&self) -> &BTreeSet<TownId> {
        &self.towns
    }

    pub fn dirty_tiles(&self) -> &BTreeSet<TileIndex> {
        &self.tiles
    }

    /// Human-readable names of the dirty partitions, for reports.
    pub fn notes(&self) -> Vec<&'static str> {
        const NAMES: [&str; DirtyCaches::PARTITION_COUNT] = [
            "station acceptance",
            "town acceptance",
            "engine availability",
            "pathfinder",
            "viewport",
        ];
        NAMES
            .iter()
            .zip(self.partitions)
            .filter_map(|(name, dirty)| dirty.then_some(*name))
            .collect()
    }

    /// Reset all flags, marking everything as clean.
    pub fn mark_clean(&mut self) {
        self.stations.clear();
        self.towns.clear();
        self.tiles.clear();
        self.partitions = [false; Self::PARTITION_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_initially_clean() {
        let dirty = DirtyCaches::new();
        assert!(!dirty.any_partition_dirty());
        assert!(dirty.notes().is_empty());
    }

    #[test]
    fn marking_a_station_dirties_its_partition() {
        let mut dirty = DirtyCaches::new();
        dirty.mark_station(StationId(4));
        dirty.mark_station(StationId(4));
        assert_eq!(dirty.dirty_stations().len(), 1);
        assert!(dirty.is_partition_dirty(DirtyCaches::PARTITION_STATION_ACCEPTANCE));
        assert_eq!(dirty.notes(), vec!["station acceptance"]);
    }

    #[test]
    fn mark_clean_resets_all() {
        let mut dirty = DirtyCaches::new();
        dirty.mark_tile(TileIndex(3));
        dirty.mark_town(TownId(1));
        dirty.mark_partition(DirtyCaches::PARTITION_ENGINES);
        dirty.mark_clean();
        assert_eq!(dirty, DirtyCaches::new());
    }
}
