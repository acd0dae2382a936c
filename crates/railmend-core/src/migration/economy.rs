//! Currency, subsidies and inflation.

use fixed::types::U48F16;
use tracing::debug;

use super::LoadSession;
use crate::catalog::{TownEffect, town_effect};
use crate::economy::max_inflation;
use crate::entity::SourceType;
use crate::error::StepError;
use crate::id::{IndustryId, Owner, StationId, SubsidyId, TownId};

/// Old currency index to current currency index.
const CURRENCY_REMAP: [u8; 23] = [
    0, 1, 12, 8, 3, 10, 14, 19, 4, 5, 9, 11, 13, 6, 17, 16, 22, 21, 7, 15, 18, 2, 20,
];

pub fn remap_currency(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let locale = &mut s.world.settings.locale;
    locale.currency = *CURRENCY_REMAP
        .get(locale.currency as usize)
        .ok_or_else(|| StepError::corrupt(format!("unknown legacy currency {}", locale.currency)))?;
    Ok(())
}

/// Subsidies used to count their age up; now they count the months left
/// and say what kind of place each end is. Offers whose ends vanished and
/// awarded subsidies that cannot be rebuilt are dropped.
pub fn convert_subsidies(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let landscape = s.world.settings.game_creation.landscape;
    let w = &mut s.world;
    let mut dropped: Vec<SubsidyId> = Vec::new();

    let (towns, industries, stations, companies) = (&w.towns, &w.industries, &w.stations, &w.companies);
    let town_ok = |i: u16| towns.contains(TownId(i));
    let industry_ok = |i: u16| industries.contains(IndustryId(i));

    for (id, sub) in w.subsidies.iter_mut() {
        let effect = town_effect(landscape, sub.cargo_type);

        let keep = if sub.remaining < 12 {
            sub.remaining = 12 - sub.remaining;
            sub.awarded = Owner::INVALID;
            match effect {
                TownEffect::Passengers | TownEffect::Mail => {
                    sub.src_type = SourceType::Town;
                    sub.dst_type = SourceType::Town;
                    town_ok(sub.src) && town_ok(sub.dst)
                }
                TownEffect::Goods | TownEffect::Food => {
                    sub.src_type = SourceType::Industry;
                    sub.dst_type = SourceType::Town;
                    industry_ok(sub.src) && town_ok(sub.dst)
                }
                _ => {
                    sub.src_type = SourceType::Industry;
                    sub.dst_type = SourceType::Industry;
                    industry_ok(sub.src) && industry_ok(sub.dst)
                }
            }
        } else {
            sub.remaining = 24u8.saturating_sub(sub.remaining);
            // Only passenger and mail awards between two stations of one
            // company can be mapped back onto their towns.
            let ends = match effect {
                TownEffect::Passengers | TownEffect::Mail => stations
                    .get(StationId(sub.src))
                    .zip(stations.get(StationId(sub.dst))),
                _ => None,
            };
            match ends {
                Some((ss, sd))
                    if ss.owner == sd.owner && ss.owner.company().is_some_and(|c| companies.contains(c)) =>
                {
                    sub.src_type = SourceType::Town;
                    sub.dst_type = SourceType::Town;
                    sub.src = ss.town.0;
                    sub.dst = sd.town.0;
                    sub.awarded = ss.owner;
                    true
                }
                _ => false,
            }
        };
        if !keep {
            dropped.push(id);
        }
    }

    for id in &dropped {
        w.subsidies.remove(*id);
    }
    if !dropped.is_empty() {
        debug!(count = dropped.len(), "dropped unconvertible subsidies");
    }
    Ok(())
}

/// Inflation used to be implied by the unrounded loan ceiling. Replay
/// monthly inflation until prices reach the factor that ceiling implies.
pub fn recompute_inflation(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    let max_loan = s.world.settings.difficulty.max_loan as u64;
    if max_loan == 0 {
        return Err(StepError::corrupt("maximum loan is zero"));
    }
    let eco = &mut s.world.economy;
    let unround = (eco.old_max_loan_unround.max(0) as u64) << 16 | eco.old_max_loan_unround_fract as u64;
    let aimed = U48F16::from_bits(unround / max_loan).min(max_inflation());

    let mut months = 0u32;
    while eco.inflation_prices < aimed {
        let before = eco.inflation_prices;
        if eco.add_inflation() || eco.inflation_prices == before {
            break;
        }
        months += 1;
    }
    debug!(months, "replayed inflation");
    Ok(())
}

pub fn clamp_inflation(s: &mut LoadSession<'_>) -> Result<(), StepError> {
    s.world.economy.clamp_inflation();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CT_COAL, CT_PASSENGERS};
    use crate::economy::MAX_INFLATION_BITS;
    use crate::entity::{Station, Subsidy};
    use crate::id::CompanyId;
    use crate::map::TileIndex;
    use crate::test_utils::{apply_step, small_world};
    use crate::version::SaveVersion;

    const V: SaveVersion = SaveVersion::new(124, 0);

    fn subsidy(cargo_type: u8, remaining: u8, src: u16, dst: u16) -> Subsidy {
        Subsidy {
            cargo_type,
            remaining,
            awarded: Owner::INVALID,
            src_type: SourceType::Industry,
            dst_type: SourceType::Industry,
            src,
            dst,
        }
    }

    #[test]
    fn currency_is_remapped() {
        let mut world = small_world();
        world.settings.locale.currency = 2;
        let world = apply_step(world, SaveVersion::new(4, 1), "remap_currency").unwrap();
        assert_eq!(world.settings.locale.currency, 12);
    }

    #[test]
    fn unknown_currency_is_corrupt() {
        let mut world = small_world();
        world.settings.locale.currency = 40;
        let res = apply_step(world, SaveVersion::new(4, 1), "remap_currency");
        assert!(matches!(res, Err(StepError::Corrupt(_))));
    }

    #[test]
    fn passenger_offer_between_towns_survives() {
        let mut world = small_world();
        let id = world.subsidies.insert(subsidy(CT_PASSENGERS, 3, 0, 0)).unwrap();
        let world = apply_step(world, V, "convert_subsidies").unwrap();
        let sub = world.subsidies.get(id).unwrap();
        assert_eq!(sub.remaining, 9);
        assert_eq!((sub.src_type, sub.dst_type), (SourceType::Town, SourceType::Town));
        assert_eq!(sub.awarded, Owner::INVALID);
    }

    #[test]
    fn offer_with_missing_industry_is_dropped() {
        let mut world = small_world();
        world.subsidies.insert(subsidy(CT_COAL, 3, 4, 5)).unwrap();
        let world = apply_step(world, V, "convert_subsidies").unwrap();
        assert!(world.subsidies.is_empty());
    }

    #[test]
    fn awarded_passenger_subsidy_maps_to_towns() {
        let mut world = small_world();
        for i in 0..2 {
            let mut st = Station::new(TileIndex(40 + i), Owner(0));
            st.town = TownId(0);
            world.stations.insert_at(StationId(i as u16), st).unwrap();
        }
        let id = world.subsidies.insert(subsidy(CT_PASSENGERS, 14, 0, 1)).unwrap();
        let world = apply_step(world, V, "convert_subsidies").unwrap();
        let sub = world.subsidies.get(id).unwrap();
        assert_eq!(sub.remaining, 10);
        assert_eq!(sub.awarded, Owner::from(CompanyId(0)));
        assert_eq!((sub.src, sub.dst), (0, 0));
    }

    #[test]
    fn inflation_replays_to_loan_ceiling() {
        let mut world = small_world();
        world.settings.difficulty.max_loan = 100_000;
        world.economy.old_max_loan_unround = 150_000;
        let world = apply_step(world, SaveVersion::new(125, 0), "recompute_inflation").unwrap();
        let aimed = (150_000u64 << 16) / 100_000;
        let prices = world.economy.inflation_prices.to_bits();
        assert!(prices >= aimed);
        assert!(prices < aimed + aimed / 100);
    }

    #[test]
    fn zero_inflation_rate_terminates() {
        let mut world = small_world();
        world.economy.infl_amount = 0;
        world.economy.old_max_loan_unround = 900_000;
        let world = apply_step(world, SaveVersion::new(125, 0), "recompute_inflation").unwrap();
        assert_eq!(world.economy.inflation_prices, U48F16::ONE);
    }

    #[test]
    fn runaway_inflation_is_clamped() {
        let mut world = small_world();
        world.economy.inflation_payment = U48F16::from_bits(MAX_INFLATION_BITS * 4);
        let world = apply_step(world, SaveVersion::new(176, 0), "clamp_inflation").unwrap();
        assert_eq!(world.economy.inflation_payment.to_bits(), MAX_INFLATION_BITS);
    }
}
