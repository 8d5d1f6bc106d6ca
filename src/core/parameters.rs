//! Numeric inputs of the charging model.

use bon::Builder;

use crate::{
    cli::ChargingArgs,
    fleet::Snapshot,
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts, rate::KilowattHourRate},
    timetable::Timetable,
};

/// Usable share of the battery capacity starts at this fraction.
pub const MIN_STATE_OF_CHARGE: f64 = 0.2;

#[must_use]
#[derive(Clone, Debug, Builder)]
pub struct Parameters {
    pub n_chargers: usize,

    /// Upper battery energy bound, `eB_max`.
    pub max_energy: KilowattHours,

    /// Lower battery energy bound, `eB_min`.
    pub min_energy: KilowattHours,

    /// Battery energy at the first slot, per bus.
    pub initial_energy: Vec<KilowattHours>,

    /// Required battery energy at the last slot, per bus.
    pub final_energy: Vec<KilowattHours>,

    /// Energy spent by a single trip, per route.
    pub route_energy: Vec<KilowattHours>,

    pub charger_power: Kilowatts,
    pub charger_efficiency: f64,
    pub grid_max_power: Kilowatts,

    /// Grid price, per slot of the horizon.
    pub prices: Vec<KilowattHourRate>,

    /// Pinned `(bus, day, route)` assignments.
    #[builder(default)]
    pub fixed_assignments: Vec<(usize, usize, usize)>,
}

impl Parameters {
    /// Convert the snapshot and the configuration into the model inputs.
    #[instrument(skip_all, fields(n_buses = snapshot.buses.len()))]
    pub fn normalize(
        snapshot: &Snapshot,
        timetable: &Timetable,
        charging: &ChargingArgs,
        prices: Vec<KilowattHourRate>,
        n_days: usize,
    ) -> Result<Self> {
        ensure!(!snapshot.buses.is_empty(), "the fleet has no buses");
        ensure!(
            charging.eb_max.is_finite() && charging.eb_max > KilowattHours::ZERO,
            "battery capacity must be positive",
        );
        ensure!(
            charging.charger_efficiency > 0.0 && charging.charger_efficiency <= 1.0,
            "charger efficiency {} is outside of (0, 1]",
            charging.charger_efficiency,
        );
        ensure!(
            charging.charger_power.is_finite() && charging.charger_power >= Kilowatts::ZERO,
            "charger power must be non-negative",
        );
        ensure!(
            charging.grid_max_power.is_finite() && charging.grid_max_power >= Kilowatts::ZERO,
            "grid capacity must be non-negative",
        );

        let mut initial_energy = Vec::with_capacity(snapshot.buses.len());
        let mut final_energy = Vec::with_capacity(snapshot.buses.len());
        for bus in &snapshot.buses {
            let initial = bus
                .state_of_charge
                .try_fraction()
                .with_context(|| format!("bus `{}`", bus.id))?;
            let final_ = match &bus.final_state_of_charge {
                Some(state_of_charge) => state_of_charge
                    .try_fraction()
                    .with_context(|| format!("bus `{}` final state", bus.id))?,
                None => initial,
            };
            initial_energy.push(charging.eb_max * initial);
            final_energy.push(charging.eb_max * final_);
        }

        let fixed_assignments = snapshot
            .fixed_assignments
            .iter()
            .map(|fixed| -> Result<_> {
                let bus = snapshot
                    .buses
                    .iter()
                    .position(|bus| bus.id == fixed.bus)
                    .with_context(|| format!("fixed assignment to unknown bus `{}`", fixed.bus))?;
                let route = timetable
                    .entries
                    .iter()
                    .position(|entry| entry.route_id == fixed.route)
                    .with_context(|| {
                        format!("fixed assignment of unknown route `{}`", fixed.route)
                    })?;
                ensure!(
                    fixed.day < n_days,
                    "fixed assignment on day {} beyond the horizon",
                    fixed.day,
                );
                Ok((bus, fixed.day, route))
            })
            .collect::<Result<Vec<_>>>()?;

        let parameters = Self {
            n_chargers: snapshot.chargers.count,
            max_energy: charging.eb_max,
            min_energy: charging.eb_max * MIN_STATE_OF_CHARGE,
            initial_energy,
            final_energy,
            route_energy: timetable.entries.iter().map(|entry| entry.energy_required).collect(),
            charger_power: charging.charger_power,
            charger_efficiency: charging.charger_efficiency,
            grid_max_power: charging.grid_max_power,
            prices,
            fixed_assignments,
        };
        for (entry, energy) in timetable.entries.iter().zip(&parameters.route_energy) {
            if *energy > parameters.energy_range() {
                warn!(
                    route_id = %entry.route_id,
                    energy_required = %energy,
                    energy_range = %parameters.energy_range(),
                    "the route exceeds the usable battery range, the model will be infeasible",
                );
            }
        }
        debug!(?parameters.min_energy, ?parameters.max_energy, "normalized");
        Ok(parameters)
    }

    pub const fn n_buses(&self) -> usize {
        self.initial_energy.len()
    }

    pub const fn n_routes(&self) -> usize {
        self.route_energy.len()
    }

    /// Usable energy range of a battery, `eB_max - eB_min`.
    pub fn energy_range(&self) -> KilowattHours {
        self.max_energy - self.min_energy
    }
}
