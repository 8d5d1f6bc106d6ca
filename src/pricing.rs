//! Grid day-ahead price curve.

use chrono::Timelike;

use crate::{
    cli::TariffArgs,
    core::time_grid::{SLOTS_PER_DAY, TimeGrid},
    prelude::*,
    quantity::rate::KilowattHourRate,
};

impl TariffArgs {
    /// Get the time-of-use rate at the slot.
    pub fn rate_at(&self, grid: TimeGrid, slot: usize) -> KilowattHourRate {
        match grid.start_time(slot).hour() {
            7..16 => self.mid_peak,
            16..21 => self.peak,
            _ => self.off_peak,
        }
    }

    /// Build the price curve for the whole horizon.
    pub fn price_curve(&self, grid: TimeGrid) -> Vec<KilowattHourRate> {
        (0..grid.n_slots()).map(|slot| self.rate_at(grid, slot)).collect()
    }
}

/// Resolve the per-slot price curve for the horizon.
///
/// Explicit prices may cover one day, in which case they are repeated for every day,
/// or the whole horizon.
#[instrument(skip_all, fields(n_slots = grid.n_slots()))]
pub fn resolve_prices(
    explicit: Option<&[KilowattHourRate]>,
    tariff: &TariffArgs,
    grid: TimeGrid,
) -> Result<Vec<KilowattHourRate>> {
    let prices = match explicit {
        None => tariff.price_curve(grid),
        Some(prices) if prices.len() == grid.n_slots() => prices.to_vec(),
        Some(prices) if prices.len() == SLOTS_PER_DAY => {
            prices.iter().copied().cycle().take(grid.n_slots()).collect()
        }
        Some(prices) => bail!(
            "expected {SLOTS_PER_DAY} or {} prices, got {}",
            grid.n_slots(),
            prices.len(),
        ),
    };
    ensure!(prices.iter().all(|price| price.is_finite()), "the price curve has a non-finite price");
    Ok(prices)
}
