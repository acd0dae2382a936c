//! Map objects become pooled records.
//!
//! Before version 147 an object (transmitter, lighthouse, statue, HQ,
//! owned land) existed only as map cells. The northern cell of each object
//! had a zero offset in `m4`; the other cells stored their distance to it.
//! Each northern cell now gets an [`Object`] record, and every cell of the
//! object stores that record's id in `m2`.

use tracing::{debug, warn};

use super::LoadSession;
use crate::catalog::object_size;
use crate::entity::Object;
use crate::error::StepError;
use crate::id::{ObjectId, TownId};
use crate::map::TileArea;
use crate::tile::{TileKind, gb, object_type};

pub fn create_objects(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    if !s.world.objects.is_empty() {
        return Ok(());
    }
    let no_towns = s.world.towns.is_empty();
    let date = s.world.clock.date;
    let mut created = 0usize;

    for t in s.world.map.indices() {
        let Some(&tile) = s.world.map.get(t) else { continue };
        if tile.kind != TileKind::Object {
            continue;
        }
        if no_towns {
            if let Some(slot) = s.world.map.get_mut(t) {
                slot.make_clear();
            }
            continue;
        }

        let offset = tile.m4 as u32;
        let id = if offset == 0 {
            let kind = tile.object_type();
            let size = object_size(kind);
            let town = if kind == object_type::STATUE {
                let town = TownId(tile.m2);
                if !s.world.towns.contains(town) {
                    return Err(StepError::corrupt(format!(
                        "statue at tile {} belongs to missing town {}",
                        t.0, town.0
                    )));
                }
                town
            } else {
                s.world.closest_town(t).unwrap_or(TownId::INVALID)
            };
            let object = Object {
                location: TileArea::new(t, size, size),
                kind,
                build_date: date,
                town,
                colour: 0,
            };
            let ObjectId(id) = s.world.objects.insert(object)?;
            created += 1;
            u16::try_from(id).map_err(|_| StepError::corrupt("too many objects on the map"))?
        } else {
            let (dx, dy) = (gb(offset, 0, 4), gb(offset, 4, 4));
            let (x, y) = (s.world.map.tile_x(t), s.world.map.tile_y(t));
            let root = (x >= dx && y >= dy)
                .then(|| s.world.map.tile_xy(x - dx, y - dy))
                .and_then(|n| s.world.map.get(n))
                .filter(|n| n.kind == TileKind::Object)
                .ok_or_else(|| {
                    StepError::corrupt(format!("object cell {} points at no object", t.0))
                })?;
            root.m2
        };

        if let Some(slot) = s.world.map.get_mut(t) {
            slot.m4 = 0;
            slot.m2 = id;
        }
    }
    if no_towns {
        warn!("map has no towns; object cells were cleared");
    }
    debug!(created, "created object records");
    Ok(())
}

/// Objects got a colour: their owner's, or a random one when unowned.
pub fn colour_objects(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let w = &mut s.world;
    for o in w.objects.values_mut() {
        let owner = w.map.get(o.location.tile).map(|t| t.owner());
        let livery = owner
            .and_then(|owner| owner.company())
            .and_then(|c| w.companies.get(c))
            .map(|c| c.livery.colour1);
        o.colour = match livery {
            Some(colour) => colour,
            None => w.rng.bits(4) as u8,
        };
    }
    Ok(())
}
