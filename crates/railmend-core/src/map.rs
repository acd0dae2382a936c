//! The tile grid: flattened indices, directions and neighbour arithmetic.

use serde::{Deserialize, Serialize};

use crate::tile::{Tile, TileKind};

/// Flattened tile address: `y * size_x + x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileIndex(pub u32);

impl TileIndex {
    /// Sentinel for "no tile". Before version 106 some records used tile 0
    /// for the same purpose.
    pub const INVALID: TileIndex = TileIndex(u32::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

/// One of the four diagonal (tile edge) directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagDirection {
    NE = 0,
    SE = 1,
    SW = 2,
    NW = 3,
}

impl DiagDirection {
    pub const ALL: [DiagDirection; 4] = [
        DiagDirection::NE,
        DiagDirection::SE,
        DiagDirection::SW,
        DiagDirection::NW,
    ];

    pub fn from_bits(bits: u8) -> Self {
        Self::ALL[(bits & 3) as usize]
    }

    /// (dx, dy) offset to the neighbouring tile.
    pub fn offset(self) -> (i32, i32) {
        match self {
            DiagDirection::NE => (-1, 0),
            DiagDirection::SE => (0, 1),
            DiagDirection::SW => (1, 0),
            DiagDirection::NW => (0, -1),
        }
    }

    pub fn reverse(self) -> Self {
        Self::from_bits(self as u8 + 2)
    }

    /// The axis this direction runs along: 0 for X, 1 for Y.
    pub fn axis(self) -> u8 {
        (self as u8) & 1
    }

    pub fn to_direction(self) -> Direction {
        Direction::from_bits(self as u8 * 2 + 1)
    }
}

/// One of the eight vehicle facing directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    N = 0,
    NE = 1,
    E = 2,
    SE = 3,
    S = 4,
    SW = 5,
    W = 6,
    NW = 7,
}

impl Direction {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Direction::N,
            1 => Direction::NE,
            2 => Direction::E,
            3 => Direction::SE,
            4 => Direction::S,
            5 => Direction::SW,
            6 => Direction::W,
            _ => Direction::NW,
        }
    }

    /// Decode a raw stored direction; values above 7 are corrupt.
    pub fn from_raw(raw: u8) -> Option<Self> {
        (raw <= 7).then(|| Self::from_bits(raw))
    }

    pub fn to_diag(self) -> DiagDirection {
        DiagDirection::from_bits(self as u8 >> 1)
    }
}

// ---------------------------------------------------------------------------
// TileMap
// ---------------------------------------------------------------------------

/// The world grid, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTileMap")]
pub struct TileMap {
    size_x: u32,
    size_y: u32,
    tiles: Vec<Tile>,
}

/// A map whose dimensions do not describe its tiles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("map of {size_x}x{size_y} cannot hold {tiles} tiles")]
pub struct MapShapeError {
    pub size_x: u32,
    pub size_y: u32,
    pub tiles: usize,
}

/// Wire form of [`TileMap`], checked before it becomes one.
#[derive(Deserialize)]
struct RawTileMap {
    size_x: u32,
    size_y: u32,
    tiles: Vec<Tile>,
}

impl TryFrom<RawTileMap> for TileMap {
    type Error = MapShapeError;

    fn try_from(raw: RawTileMap) -> Result<Self, Self::Error> {
        let map = TileMap {
            size_x: raw.size_x,
            size_y: raw.size_y,
            tiles: raw.tiles,
        };
        map.check_shape()?;
        Ok(map)
    }
}

impl TileMap {
    /// A map of `size_x * size_y` flat clear tiles with a void outer edge
    /// on the south-west and south-east borders.
    pub fn new(size_x: u32, size_y: u32) -> Self {
        let mut tiles = vec![Tile::clear(); (size_x * size_y) as usize];
        for y in 0..size_y {
            for x in 0..size_x {
                if x == size_x - 1 || y == size_y - 1 {
                    tiles[(y * size_x + x) as usize] = Tile::void();
                }
            }
        }
        Self {
            size_x,
            size_y,
            tiles,
        }
    }

    /// Build a map from decoded tiles. Returns `None` if the tile count
    /// does not match the dimensions.
    pub fn from_tiles(size_x: u32, size_y: u32, tiles: Vec<Tile>) -> Option<Self> {
        let map = Self {
            size_x,
            size_y,
            tiles,
        };
        map.check_shape().ok().map(|()| map)
    }

    /// Both edges are non-empty and the tile count is `size_x * size_y`.
    pub fn check_shape(&self) -> Result<(), MapShapeError> {
        let expected = (self.size_x as u64) * (self.size_y as u64);
        if self.size_x == 0 || self.size_y == 0 || self.tiles.len() as u64 != expected {
            return Err(MapShapeError {
                size_x: self.size_x,
                size_y: self.size_y,
                tiles: self.tiles.len(),
            });
        }
        Ok(())
    }

    pub fn size_x(&self) -> u32 {
        self.size_x
    }

    pub fn size_y(&self) -> u32 {
        self.size_y
    }

    pub fn max_x(&self) -> u32 {
        self.size_x.saturating_sub(1)
    }

    pub fn max_y(&self) -> u32 {
        self.size_y.saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile_xy(&self, x: u32, y: u32) -> TileIndex {
        TileIndex(y * self.size_x + x)
    }

    pub fn tile_x(&self, t: TileIndex) -> u32 {
        t.0 % self.size_x
    }

    pub fn tile_y(&self, t: TileIndex) -> u32 {
        t.0 / self.size_x
    }

    pub fn contains(&self, t: TileIndex) -> bool {
        (t.0 as usize) < self.tiles.len()
    }

    pub fn get(&self, t: TileIndex) -> Option<&Tile> {
        self.tiles.get(t.0 as usize)
    }

    pub fn get_mut(&mut self, t: TileIndex) -> Option<&mut Tile> {
        self.tiles.get_mut(t.0 as usize)
    }

    pub fn kind(&self, t: TileIndex) -> Option<TileKind> {
        self.get(t).map(|tile| tile.kind)
    }

    pub fn is_kind(&self, t: TileIndex, kind: TileKind) -> bool {
        self.kind(t) == Some(kind)
    }

    /// Tile offset by `(dx, dy)`, or `None` if it falls off the map.
    pub fn offset(&self, t: TileIndex, dx: i32, dy: i32) -> Option<TileIndex> {
        let x = self.tile_x(t) as i64 + dx as i64;
        let y = self.tile_y(t) as i64 + dy as i64;
        if x < 0 || y < 0 || x >= self.size_x as i64 || y >= self.size_y as i64 {
            return None;
        }
        Some(self.tile_xy(x as u32, y as u32))
    }

    pub fn neighbour(&self, t: TileIndex, dir: DiagDirection) -> Option<TileIndex> {
        let (dx, dy) = dir.offset();
        self.offset(t, dx, dy)
    }

    /// Manhattan distance between two tiles.
    pub fn distance_manhattan(&self, a: TileIndex, b: TileIndex) -> u32 {
        self.tile_x(a).abs_diff(self.tile_x(b)) + self.tile_y(a).abs_diff(self.tile_y(b))
    }

    /// Largest axis distance between two tiles.
    pub fn distance_max(&self, a: TileIndex, b: TileIndex) -> u32 {
        self.tile_x(a)
            .abs_diff(self.tile_x(b))
            .max(self.tile_y(a).abs_diff(self.tile_y(b)))
    }

    /// Cheap position hash used to pick pseudo-random per-tile variants.
    pub fn tile_hash(&self, t: TileIndex) -> u32 {
        let (x, y) = (self.tile_x(t), self.tile_y(t));
        let h = (x >> 4) ^ (x >> 6) ^ (y >> 4);
        h.wrapping_sub(y >> 6)
    }

    /// The far end of the tunnel or bridge that starts at `t`.
    pub fn other_tunnel_bridge_end(&self, t: TileIndex) -> Option<TileIndex> {
        let start = self.get(t).filter(|tile| tile.kind == TileKind::TunnelBridge)?;
        let dir = start.tunnel_bridge_direction();
        let mut cur = t;
        loop {
            cur = self.neighbour(cur, dir)?;
            let tile = self.get(cur)?;
            if tile.kind == TileKind::TunnelBridge
                && tile.is_bridge() == start.is_bridge()
                && tile.tunnel_bridge_direction() == dir.reverse()
            {
                return Some(cur);
            }
        }
    }

    /// All tile indices in order.
    pub fn indices(&self) -> impl Iterator<Item = TileIndex> + use<> {
        (0..self.tiles.len() as u32).map(TileIndex)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileIndex, &Tile)> {
        self.tiles
            .iter()
            .enumerate()
            .map(|(i, t)| (TileIndex(i as u32), t))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TileIndex, &mut Tile)> {
        self.tiles
            .iter_mut()
            .enumerate()
            .map(|(i, t)| (TileIndex(i as u32), t))
    }

    /// Tiles of the `w * h` rectangle whose north corner is `origin`,
    /// clipped to the map.
    pub fn area(&self, origin: TileIndex, w: u32, h: u32) -> Vec<TileIndex> {
        let ox = self.tile_x(origin);
        let oy = self.tile_y(origin);
        let mut out = Vec::with_capacity((w * h) as usize);
        for y in oy..(oy + h).min(self.size_y) {
            for x in ox..(ox + w).min(self.size_x) {
                out.push(self.tile_xy(x, y));
            }
        }
        out
    }
}

/// A rectangle of tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileArea {
    pub tile: TileIndex,
    pub w: u16,
    pub h: u16,
}

impl TileArea {
    pub const EMPTY: TileArea = TileArea {
        tile: TileIndex::INVALID,
        w: 0,
        h: 0,
    };

    pub fn new(tile: TileIndex, w: u16, h: u16) -> Self {
        Self { tile, w, h }
    }

    pub fn is_empty(&self) -> bool {
        !self.tile.is_valid() || self.w == 0 || self.h == 0
    }

    pub fn contains(&self, map: &TileMap, t: TileIndex) -> bool {
        if self.is_empty() {
            return false;
        }
        let (x, y) = (map.tile_x(t), map.tile_y(t));
        let (ox, oy) = (map.tile_x(self.tile), map.tile_y(self.tile));
        x >= ox && x < ox + self.w as u32 && y >= oy && y < oy + self.h as u32
    }

    /// Grow the area so it covers `t`.
    pub fn add(&mut self, map: &TileMap, t: TileIndex) {
        if self.is_empty() {
            *self = TileArea::new(t, 1, 1);
            return;
        }
        let (x, y) = (map.tile_x(t), map.tile_y(t));
        let (ox, oy) = (map.tile_x(self.tile), map.tile_y(self.tile));
        let ex = (ox + self.w as u32 - 1).max(x);
        let ey = (oy + self.h as u32 - 1).max(y);
        let sx = ox.min(x);
        let sy = oy.min(y);
        self.tile = map.tile_xy(sx, sy);
        self.w = (ex - sx + 1) as u16;
        self.h = (ey - sy + 1) as u16;
    }

    pub fn tiles(&self, map: &TileMap) -> Vec<TileIndex> {
        if self.is_empty() {
            return Vec::new();
        }
        map.area(self.tile, self.w as u32, self.h as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoding_checks_the_map_shape() {
        let map = TileMap::new(3, 2);
        let mut json: serde_json::Value = serde_json::to_value(&map).unwrap();
        assert_eq!(serde_json::from_value::<TileMap>(json.clone()).unwrap(), map);

        json["size_x"] = 0.into();
        assert!(serde_json::from_value::<TileMap>(json.clone()).is_err());

        json["size_x"] = 4.into();
        assert!(serde_json::from_value::<TileMap>(json).is_err());
    }

    #[test]
    fn from_tiles_rejects_empty_edges() {
        assert!(TileMap::from_tiles(0, 0, Vec::new()).is_none());
        assert!(TileMap::from_tiles(2, 1, vec![Tile::void(); 2]).is_some());
        assert_eq!(
            TileMap::new(0, 4).check_shape(),
            Err(MapShapeError {
                size_x: 0,
                size_y: 4,
                tiles: 0
            })
        );
    }

    #[test]
    fn index_round_trips_coordinates() {
        let map = TileMap::new(16, 8);
        let t = map.tile_xy(5, 3);
        assert_eq!(t, TileIndex(3 * 16 + 5));
        assert_eq!((map.tile_x(t), map.tile_y(t)), (5, 3));
    }

    #[test]
    fn neighbour_stays_on_map() {
        let map = TileMap::new(4, 4);
        let corner = map.tile_xy(0, 0);
        assert_eq!(map.neighbour(corner, DiagDirection::NE), None);
        assert_eq!(map.neighbour(corner, DiagDirection::NW), None);
        assert_eq!(
            map.neighbour(corner, DiagDirection::SW),
            Some(map.tile_xy(1, 0))
        );
        assert_eq!(
            map.neighbour(corner, DiagDirection::SE),
            Some(map.tile_xy(0, 1))
        );
    }

    #[test]
    fn new_map_has_void_south_edges() {
        let map = TileMap::new(4, 4);
        assert_eq!(map.kind(map.tile_xy(3, 1)), Some(TileKind::Void));
        assert_eq!(map.kind(map.tile_xy(1, 3)), Some(TileKind::Void));
        assert_eq!(map.kind(map.tile_xy(1, 1)), Some(TileKind::Clear));
    }

    #[test]
    fn area_grows_to_cover_tiles() {
        let map = TileMap::new(16, 16);
        let mut area = TileArea::EMPTY;
        area.add(&map, map.tile_xy(4, 4));
        area.add(&map, map.tile_xy(2, 6));
        assert_eq!(area.tile, map.tile_xy(2, 4));
        assert_eq!((area.w, area.h), (3, 3));
        assert!(area.contains(&map, map.tile_xy(3, 5)));
        assert_eq!(area.tiles(&map).len(), 9);
    }

    #[test]
    fn direction_conversions() {
        assert_eq!(Direction::from_raw(8), None);
        assert_eq!(Direction::SE.to_diag(), DiagDirection::SE);
        assert_eq!(DiagDirection::SW.to_direction(), Direction::SW);
        assert_eq!(DiagDirection::NE.reverse(), DiagDirection::SW);
    }
}
