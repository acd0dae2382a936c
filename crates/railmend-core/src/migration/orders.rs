//! Order conversions.
//!
//! Orders before version 93 packed transfer, unload, full-load and non-stop
//! into one flags byte. The conversion reads that byte (kept in
//! `Order::legacy_flags`) once and clears it.

use tracing::debug;

use super::LoadSession;
use crate::entity::VehicleType;
use crate::error::StepError;
use crate::id::{OrderId, VehicleId};
use crate::order::{
    CT_NO_REFIT, NonStop, Order, OrderKind, OrderPreferences, depot_action, depot_type, load,
    stop_location, unload,
};
use crate::version::{SaveFlavor, SnapshotHeader};

/// Bits of the pre-93 flags byte.
mod old_flags {
    pub const TRANSFER: u8 = 1 << 0;
    pub const UNLOAD: u8 = 1 << 1;
    pub const FULL_LOAD: u8 = 1 << 2;
    pub const NON_STOP: u8 = 1 << 3;
}

pub fn clear_order_refit(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for o in s.world.orders.values_mut() {
        o.refit_cargo = CT_NO_REFIT;
    }
    for v in s.world.vehicles.values_mut() {
        v.current_order.refit_cargo = CT_NO_REFIT;
    }
    Ok(())
}

/// Rewrite one order from the packed flag encoding.
pub(crate) fn convert_legacy_order(o: &mut Order, header: SnapshotHeader, prefs: OrderPreferences) {
    let flags = o.legacy_flags;
    o.legacy_flags = 0;

    let non_stop = flags & old_flags::NON_STOP != 0;
    // Pre-22 native snapshots followed the client's non-stop preference.
    let new_meaning = prefs.sg_new_nonstop
        || (header.version.is_before(22)
            && !matches!(header.flavor, SaveFlavor::Tto | SaveFlavor::Ttd)
            && prefs.new_nonstop);
    o.non_stop = match (new_meaning, non_stop) {
        (true, true) => NonStop::NoStopAtAny,
        (true, false) => NonStop::NoStopAtIntermediate,
        (false, true) => NonStop::NoStopAtIntermediate,
        (false, false) => NonStop::StopEverywhere,
    };

    match o.kind {
        OrderKind::GotoStation | OrderKind::Loading => {
            o.load = if flags & old_flags::UNLOAD != 0 {
                load::NO_LOAD
            } else if flags & old_flags::FULL_LOAD == 0 {
                load::IF_POSSIBLE
            } else if prefs.sg_full_load_any || header.version.is_before(22) {
                load::FULL_LOAD_ANY
            } else {
                load::FULL_LOAD
            };
            if o.kind == OrderKind::GotoStation {
                o.stop_location = stop_location::FAR_END;
            }
            o.unload = if flags & old_flags::TRANSFER != 0 {
                unload::TRANSFER
            } else if flags & old_flags::UNLOAD != 0 {
                unload::UNLOAD
            } else {
                unload::IF_POSSIBLE
            };
        }
        OrderKind::GotoDepot => {
            let action_bits = flags & (old_flags::UNLOAD | old_flags::FULL_LOAD);
            o.depot_action = if action_bits == old_flags::FULL_LOAD {
                depot_action::HALT
            } else {
                depot_action::SERVICE_ONLY
            };
            let mut ty = if action_bits == old_flags::UNLOAD | old_flags::FULL_LOAD {
                depot_type::SERVICE
            } else {
                depot_type::MANUAL
            };
            if flags & old_flags::UNLOAD != 0 {
                ty |= depot_type::PART_OF_ORDERS;
            }
            o.depot_type = ty;
        }
        _ => {}
    }
}

/// Convert every order and current order. Order lists that start with an
/// empty order are dropped, and road vehicles skip intermediate stations.
pub fn convert_orders(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let header = s.header;
    let prefs = s.ctx.prefs.order;
    let w = &mut s.world;
    for o in w.orders.values_mut() {
        convert_legacy_order(o, header, prefs);
    }

    let mut empty_lists: Vec<VehicleId> = Vec::new();
    let mut freed: Vec<OrderId> = Vec::new();
    for (id, v) in w.vehicles.iter() {
        let Some(&head) = v.orders.first() else { continue };
        let starts_empty = w.orders.get(head).is_none_or(|o| o.is(OrderKind::Nothing));
        if starts_empty {
            empty_lists.push(id);
            freed.extend(v.orders.iter().copied());
        }
    }
    for oid in &freed {
        w.orders.remove(*oid);
    }
    if !freed.is_empty() {
        debug!(lists = empty_lists.len(), orders = freed.len(), "dropped empty order lists");
    }

    let orders = &mut w.orders;
    for (id, v) in w.vehicles.iter_mut() {
        if empty_lists.contains(&id) {
            v.orders.clear();
        }
        convert_legacy_order(&mut v.current_order, header, prefs);
        let owns_list = v.first_shared.is_none_or(|f| f == id);
        if v.kind() == VehicleType::Road && v.is_primary(id) && owns_list {
            for oid in &v.orders {
                if let Some(o) = orders.get_mut(*oid) {
                    o.non_stop = NonStop::NoStopAtIntermediate;
                }
            }
        }
    }
    Ok(())
}

fn split(o: &mut Order) {
    if o.unload & (unload::UNLOAD | unload::TRANSFER) == unload::UNLOAD | unload::TRANSFER {
        o.unload = unload::TRANSFER;
        o.load = load::NO_LOAD;
    }
}

/// Unload and transfer became mutually exclusive.
pub fn split_unload_transfer(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for o in s.world.orders.values_mut() {
        split(o);
    }
    for v in s.world.vehicles.values_mut() {
        split(&mut v.current_order);
    }
    Ok(())
}

/// Trains always stopped at the far end of the platform.
pub fn set_stop_location(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for o in s.world.orders.values_mut() {
        if o.is(OrderKind::GotoStation) {
            o.stop_location = stop_location::FAR_END;
        }
    }
    Ok(())
}

/// The real order index is new; it starts at the implicit index.
pub fn fill_real_order_index(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    for (id, v) in s.world.vehicles.iter_mut() {
        if !v.is_primary(id) {
            continue;
        }
        if v.cur_implicit_order_index as usize >= v.orders.len() {
            v.cur_implicit_order_index = 0;
        }
        v.cur_real_order_index = v.cur_implicit_order_index;
    }
    Ok(())
}
