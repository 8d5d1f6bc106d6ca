//! Fleet, timetable, and charger snapshot the planner is run against.

mod slot_of_day;
mod state_of_charge;

use std::path::Path;

use serde::Deserialize;

pub use self::{slot_of_day::SlotOfDay, state_of_charge::StateOfCharge};
use crate::{
    prelude::*,
    quantity::{energy::KilowattHours, rate::KilowattHourRate},
};

#[must_use]
#[derive(Clone, Deserialize)]
pub struct Snapshot {
    pub buses: Vec<Bus>,

    #[serde(default)]
    pub routes: Vec<Route>,

    pub chargers: ChargerPool,

    /// Explicit grid prices: either one per slot of a day, or one per slot of the whole horizon.
    ///
    /// When omitted, the time-of-use tariff is used.
    #[serde(default)]
    pub prices: Option<Vec<KilowattHourRate>>,

    /// Externally decided route assignments, pinned in the model.
    #[serde(default)]
    pub fixed_assignments: Vec<FixedAssignment>,
}

impl Snapshot {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        let snapshot: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse `{}`", path.display()))?;
        info!(
            n_buses = snapshot.buses.len(),
            n_routes = snapshot.routes.len(),
            n_chargers = snapshot.chargers.count,
            "loaded the snapshot",
        );
        Ok(snapshot)
    }
}

#[derive(Clone, Deserialize)]
pub struct Bus {
    pub id: String,

    /// Current state of charge, for example `"80%"` or `0.8`.
    pub state_of_charge: StateOfCharge,

    /// Required state of charge at the end of the horizon, defaults to the current one.
    #[serde(default)]
    pub final_state_of_charge: Option<StateOfCharge>,
}

#[derive(Clone, Deserialize)]
pub struct Route {
    pub id: String,

    /// One-based departure slot of the day or a `"HH:MM"` clock time.
    pub departure: SlotOfDay,

    /// One-based arrival slot of the day or a `"HH:MM"` clock time.
    pub arrival: SlotOfDay,

    #[serde(default)]
    pub energy_required_kwh: Option<KilowattHours>,

    /// Alternative to the explicit energy: converted with the per-mile consumption.
    #[serde(default)]
    pub distance_miles: Option<f64>,
}

/// Homogeneous charger pool: only the number of simultaneously usable plugs matters.
#[derive(Copy, Clone, Deserialize)]
pub struct ChargerPool {
    pub count: usize,
}

#[derive(Clone, Deserialize)]
pub struct FixedAssignment {
    /// Zero-based day of the horizon.
    pub day: usize,

    pub route: String,
    pub bus: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot() -> Result {
        let snapshot: Snapshot = toml::from_str(
            r#"
                prices = [0.1, 0.2]

                [chargers]
                count = 2

                [[buses]]
                id = "7771"
                state_of_charge = "80%"

                [[buses]]
                id = "7772"
                state_of_charge = 0.5
                final_state_of_charge = "90%"

                [[routes]]
                id = "77"
                departure = 25
                arrival = "18:00"
                distance_miles = 148.0

                [[fixed_assignments]]
                day = 1
                route = "77"
                bus = "7772"
            "#,
        )?;
        assert_eq!(snapshot.buses.len(), 2);
        assert_eq!(snapshot.chargers.count, 2);
        assert_eq!(snapshot.routes[0].departure, SlotOfDay::Index(25));
        assert_eq!(snapshot.routes[0].arrival, SlotOfDay::Clock("18:00".to_string()));
        assert!(snapshot.routes[0].energy_required_kwh.is_none());
        assert_eq!(snapshot.fixed_assignments[0].bus, "7772");
        assert_eq!(snapshot.prices.map(|prices| prices.len()), Some(2));
        Ok(())
    }
}
