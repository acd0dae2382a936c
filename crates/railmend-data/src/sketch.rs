//! ASCII map sketches.
//!
//! A sketch is a list of equal-length rows, one character per tile. The
//! map gets one extra column and row of void tiles on its south-west and
//! south-east edges, like every map does.
//!
//! | glyph | tile |
//! |-------|------|
//! | `.` | grass |
//! | `t` | trees |
//! | `~` | sea |
//! | `=` | canal |
//! | `r` | river |
//! | `c` | coast |
//! | `L` | flat lock with no water class (as old snapshots stored them) |
//! | `h` | finished house of town 0 |
//! | `0`-`9` | straight rail along X owned by that company |

use railmend_core::id::{Owner, TownId};
use railmend_core::map::TileMap;
use railmend_core::tile::{Tile, TileKind, TileView, WaterClass, WaterTileKind, water_bits};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SketchError {
    #[error("map sketch has no rows")]
    Empty,

    #[error("row {row} has {found} tiles, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unknown glyph '{glyph}' at row {row}, column {col}")]
    UnknownGlyph { row: usize, col: usize, glyph: char },
}

/// Track bit of a straight piece along the X axis.
const TRACK_X: u32 = 1;

fn water_of(kind: u32, class: WaterClass, owner: Owner) -> Tile {
    let mut t = Tile::water(class, owner);
    t.m5 = (kind << 4) as u8;
    t
}

fn tile_for(glyph: char) -> Option<Tile> {
    let tile = match glyph {
        '.' => Tile::clear(),
        't' => {
            let mut t = Tile::new(TileKind::Trees);
            t.set_owner(Owner::NONE);
            t
        }
        '~' => Tile::water(WaterClass::Sea, Owner::WATER),
        '=' => Tile::water(WaterClass::Canal, Owner::NONE),
        'r' => Tile::water(WaterClass::River, Owner::WATER),
        'c' => water_of(water_bits::TYPE_COAST, WaterClass::Sea, Owner::WATER),
        'L' => water_of(water_bits::TYPE_LOCK, WaterClass::Invalid, Owner::NONE),
        'h' => {
            let mut t = Tile::new(TileKind::House);
            t.set_town(TownId(0));
            t.set_house_completed(true);
            t
        }
        '0'..='9' => {
            let mut t = Tile::new(TileKind::Railway);
            t.set_owner(Owner(glyph as u8 - b'0'));
            t.set_track_bits(TRACK_X);
            t
        }
        _ => return None,
    };
    Some(tile)
}

/// Build a map from sketch rows.
pub fn parse_sketch<S: AsRef<str>>(rows: &[S]) -> Result<TileMap, SketchError> {
    let width = rows.first().ok_or(SketchError::Empty)?.as_ref().chars().count();
    if width == 0 {
        return Err(SketchError::Empty);
    }
    let (size_x, size_y) = (width + 1, rows.len() + 1);
    let mut tiles = Vec::with_capacity(size_x * size_y);

    for (row, line) in rows.iter().enumerate() {
        let found = line.as_ref().chars().count();
        if found != width {
            return Err(SketchError::Ragged {
                row,
                expected: width,
                found,
            });
        }
        for (col, glyph) in line.as_ref().chars().enumerate() {
            let tile = tile_for(glyph).ok_or(SketchError::UnknownGlyph { row, col, glyph })?;
            tiles.push(tile);
        }
        tiles.push(Tile::void());
    }
    tiles.extend(std::iter::repeat_n(Tile::void(), size_x));

    // Counts match by construction.
    TileMap::from_tiles(size_x as u32, size_y as u32, tiles).ok_or(SketchError::Empty)
}

fn glyph_for(view: TileView) -> char {
    match view {
        TileView::Clear { .. } => '.',
        TileView::Trees { .. } => 't',
        TileView::Water { kind: WaterTileKind::Lock, .. } => 'L',
        TileView::Water { kind: WaterTileKind::Coast, .. } => 'c',
        TileView::Water { class: WaterClass::Canal, .. } => '=',
        TileView::Water { class: WaterClass::River, .. } => 'r',
        TileView::Water { .. } => '~',
        TileView::House { .. } => 'h',
        TileView::Rail { owner, .. } if owner.0 < 10 => char::from(b'0' + owner.0),
        _ => '?',
    }
}

/// Draw the map back as sketch rows, leaving out the void edge. Tiles that
/// do not decode under the current layout are drawn as `!`.
pub fn render_sketch(map: &TileMap) -> Vec<String> {
    let (w, h) = (map.size_x().saturating_sub(1), map.size_y().saturating_sub(1));
    (0..h)
        .map(|y| {
            (0..w)
                .map(|x| {
                    map.get(map.tile_xy(x, y))
                        .map_or('!', |t| t.decode().map_or('!', glyph_for))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sketch_adds_void_edge() {
        let map = parse_sketch(&["..", ".~"]).unwrap();
        assert_eq!(map.size_x(), 3);
        assert_eq!(map.size_y(), 3);
        assert_eq!(map.kind(map.tile_xy(2, 0)), Some(TileKind::Void));
        assert_eq!(map.kind(map.tile_xy(0, 2)), Some(TileKind::Void));
        assert_eq!(map.kind(map.tile_xy(1, 1)), Some(TileKind::Water));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = parse_sketch(&["...", ".."]).unwrap_err();
        assert_eq!(
            err,
            SketchError::Ragged {
                row: 1,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn unknown_glyph_names_its_position() {
        let err = parse_sketch(&["..", ".?"]).unwrap_err();
        assert_eq!(
            err,
            SketchError::UnknownGlyph {
                row: 1,
                col: 1,
                glyph: '?'
            }
        );
    }

    #[test]
    fn empty_sketch_is_rejected() {
        let rows: [&str; 0] = [];
        assert_eq!(parse_sketch(&rows).unwrap_err(), SketchError::Empty);
        assert_eq!(parse_sketch(&[""]).unwrap_err(), SketchError::Empty);
    }

    #[test]
    fn rail_digit_sets_owner() {
        let map = parse_sketch(&["3."]).unwrap();
        let t = map.get(map.tile_xy(0, 0)).unwrap();
        assert_eq!(t.owner(), Owner(3));
        assert_eq!(t.track_bits(), TRACK_X);
    }

    #[test]
    fn render_draws_what_parse_read() {
        let rows = ["~~c.", "=r.t", "0h.."];
        let map = parse_sketch(&rows).unwrap();
        assert_eq!(render_sketch(&map), rows.map(String::from).to_vec());
    }

    #[test]
    fn unresolved_lock_renders_as_undecodable() {
        let map = parse_sketch(&["~L~"]).unwrap();
        assert_eq!(render_sketch(&map), vec!["~!~".to_string()]);
    }
}
