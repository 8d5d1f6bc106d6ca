//! Route timetable ingestion: validates the raw routes and resolves their energy demand.

use std::{
    collections::HashSet,
    fmt::{Display, Formatter},
};

use itertools::Itertools;

use crate::{
    core::time_grid::SLOTS_PER_DAY,
    fleet::Route,
    prelude::*,
    quantity::energy::KilowattHours,
};

/// Outcome of the timetable ingestion.
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Report {
    AllClear,

    /// Descriptive failure which aborts the run before any model is built.
    Rejected(String),
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllClear => write!(f, "All Clear"),
            Self::Rejected(message) => write!(f, "{message}"),
        }
    }
}

impl Report {
    pub const fn is_all_clear(&self) -> bool {
        matches!(self, Self::AllClear)
    }
}

/// Route as the model needs it: one-based slots of the day and the energy per trip.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub route_id: String,
    pub departure: u32,
    pub arrival: u32,
    pub energy_required: KilowattHours,
}

#[must_use]
pub struct Timetable {
    pub report: Report,
    pub entries: Vec<Entry>,
}

impl Timetable {
    /// Parse and validate the raw routes.
    ///
    /// Every problem is collected into the report instead of failing on the first one.
    #[instrument(skip_all, fields(n_routes = routes.len()))]
    pub fn ingest(routes: &[Route], consumption_per_mile: f64) -> Self {
        let mut problems = Vec::new();
        let mut entries = Vec::with_capacity(routes.len());
        let mut seen_ids = HashSet::new();

        if routes.is_empty() {
            problems.push("the timetable has no routes".to_string());
        }

        for route in routes {
            if !seen_ids.insert(route.id.as_str()) {
                problems.push(format!("route `{}` is listed more than once", route.id));
            }
            match Self::parse_entry(route, consumption_per_mile) {
                Ok(entry) => entries.push(entry),
                Err(error) => problems.push(format!("route `{}`: {error:#}", route.id)),
            }
        }

        let report = if problems.is_empty() {
            Report::AllClear
        } else {
            Report::Rejected(problems.into_iter().join("; "))
        };
        info!(%report, "ingested the timetable");
        Self { report, entries }
    }

    fn parse_entry(route: &Route, consumption_per_mile: f64) -> Result<Entry> {
        let departure = route.departure.try_one_based()?;
        let arrival = route.arrival.try_one_based()?;
        let n_slots = u32::try_from(SLOTS_PER_DAY)?;
        ensure!(
            (1..=n_slots).contains(&departure),
            "departure slot {departure} is outside of 1..={n_slots}",
        );
        ensure!(
            (1..=n_slots).contains(&arrival),
            "arrival slot {arrival} is outside of 1..={n_slots}",
        );
        ensure!(
            departure < arrival,
            "departure slot {departure} is not before arrival slot {arrival}",
        );

        let energy_required = match (route.energy_required_kwh, route.distance_miles) {
            (Some(energy), None) => energy,
            (None, Some(distance)) => {
                ensure!(distance.is_finite() && distance >= 0.0, "invalid distance {distance}");
                KilowattHours::from(consumption_per_mile * distance)
            }
            (Some(_), Some(_)) => bail!("both energy and distance are given"),
            (None, None) => bail!("neither energy nor distance is given"),
        };
        ensure!(
            energy_required.is_finite() && energy_required >= KilowattHours::ZERO,
            "invalid energy requirement {energy_required:?}",
        );

        Ok(Entry { route_id: route.id.clone(), departure, arrival, energy_required })
    }

    /// Short human-readable description used in the run summary.
    pub fn summary(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                format!(
                    "{}:{}-{}:{:.1}kWh",
                    entry.route_id, entry.departure, entry.arrival, entry.energy_required.0,
                )
            })
            .join(" ")
    }
}
