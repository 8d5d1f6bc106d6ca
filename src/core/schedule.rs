//! Solved variable values mapped back onto buses, slots, days, and routes.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{
    core::{model::Variables, problem::Family, time_grid::TimeGrid},
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts},
};

/// Binary values above this are considered set.
const BINARY_THRESHOLD: f64 = 0.5;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRecord {
    pub bus: String,

    /// Absolute slot index within the horizon.
    pub slot: usize,

    pub day: usize,

    #[serde(rename = "powerCB")]
    pub power: Kilowatts,

    #[serde(rename = "gridPowToB")]
    pub grid_power: Kilowatts,

    #[serde(rename = "eB")]
    pub energy: KilowattHours,

    pub charger_in_use: bool,

    /// A charging session starts or stops at this slot.
    pub session_boundary: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct AssignmentRecord {
    pub bus: String,
    pub day: usize,
    pub route: String,
    pub assignment: u8,
}

/// Contiguous charger occupancy of a single bus.
#[derive(Clone, Debug)]
pub struct Session {
    pub bus: String,

    /// First occupied slot.
    pub start: usize,

    /// Slot after the last occupied one.
    pub end: usize,

    /// Energy drawn from the grid, before the charger losses.
    pub grid_energy: KilowattHours,
}

#[must_use]
#[derive(Clone, Debug, Default)]
pub struct Schedule {
    /// Ordered by bus, then by slot.
    pub slots: Vec<SlotRecord>,

    /// Ordered by bus, then by day, then by route.
    pub assignments: Vec<AssignmentRecord>,
}

impl Schedule {
    /// Reconstruct the schedule from the solver's named values.
    #[instrument(skip_all, fields(n_buses = bus_ids.len(), n_routes = route_ids.len()))]
    pub fn interpret(
        variables: &Variables,
        values: &HashMap<String, f64>,
        grid: TimeGrid,
        bus_ids: &[String],
        route_ids: &[String],
    ) -> Result<Self> {
        let lookup = |family: &Family<2>, index: [usize; 2]| -> Result<f64> {
            let name = family.name_at(index);
            values.get(&name).copied().with_context(|| format!("no value for `{name}`"))
        };

        let mut slots = Vec::with_capacity(bus_ids.len() * grid.n_slots());
        for (bus, bus_id) in bus_ids.iter().enumerate() {
            for slot in 0..grid.n_slots() {
                let index = [bus, slot];
                let starts = lookup(&variables.transitions.starts, index)?;
                let stops = lookup(&variables.transitions.stops, index)?;
                slots.push(SlotRecord {
                    bus: bus_id.clone(),
                    slot,
                    day: grid.day_of(slot),
                    power: Kilowatts::from(lookup(&variables.power, index)?),
                    grid_power: Kilowatts::from(lookup(&variables.grid_power, index)?),
                    energy: KilowattHours::from(lookup(&variables.energy, index)?),
                    charger_in_use: lookup(&variables.charger_use, index)? > BINARY_THRESHOLD,
                    session_boundary: starts > BINARY_THRESHOLD || stops > BINARY_THRESHOLD,
                });
            }
        }

        let mut assignments = Vec::with_capacity(variables.assignment.len());
        for index @ [bus, day, route] in variables.assignment.indices() {
            let name = variables.assignment.name_at(index);
            let value =
                values.get(&name).copied().with_context(|| format!("no value for `{name}`"))?;
            assignments.push(AssignmentRecord {
                bus: bus_ids[bus].clone(),
                day,
                route: route_ids[route].clone(),
                assignment: u8::from(value > BINARY_THRESHOLD),
            });
        }

        debug!(n_slots = slots.len(), n_assignments = assignments.len(), "interpreted");
        Ok(Self { slots, assignments })
    }

    /// Bus serving the route on the day.
    pub fn route_bus(&self, day: usize, route_id: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|record| record.day == day && record.route == route_id && record.assignment == 1)
            .map(|record| record.bus.as_str())
    }

    /// Split the charger occupancy into sessions, ordered by bus and start slot.
    pub fn sessions(&self, grid: TimeGrid) -> Vec<Session> {
        let mut sessions: Vec<Session> = Vec::new();
        let mut open = false;
        for record in &self.slots {
            if record.slot == 0 {
                open = false;
            }
            if !record.charger_in_use {
                open = false;
                continue;
            }
            let energy = record.grid_power * grid.slot_duration();
            match sessions.last_mut() {
                Some(session) if open => {
                    session.end = record.slot + 1;
                    session.grid_energy += energy;
                }
                _ => {
                    sessions.push(Session {
                        bus: record.bus.clone(),
                        start: record.slot,
                        end: record.slot + 1,
                        grid_energy: energy,
                    });
                    open = true;
                }
            }
        }
        sessions
    }

    /// Write `<case_id>.json` and `assignments_<case_id>.json` into the directory.
    #[instrument(skip_all, fields(case_id = case_id))]
    pub fn write_to(&self, directory: &Path, case_id: &str) -> Result<[PathBuf; 2]> {
        fs::create_dir_all(directory)
            .with_context(|| format!("failed to create `{}`", directory.display()))?;
        let slots_path = directory.join(format!("{case_id}.json"));
        let assignments_path = directory.join(format!("assignments_{case_id}.json"));
        write_json(&slots_path, &self.slots)?;
        write_json(&assignments_path, &self.assignments)?;
        info!(slots = %slots_path.display(), assignments = %assignments_path.display(), "written");
        Ok([slots_path, assignments_path])
    }
}

fn write_json(path: &Path, value: &impl Serialize) -> Result {
    let file =
        File::create(path).with_context(|| format!("failed to create `{}`", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("failed to write `{}`", path.display()))
}
