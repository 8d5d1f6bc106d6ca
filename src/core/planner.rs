//! End-to-end optimization run: from a fleet snapshot to a recorded schedule.

use std::collections::HashMap;

use bon::Builder;
use chrono::{DateTime, Local};

use crate::{
    cli::{ChargingArgs, PlanningArgs, TariffArgs},
    core::{
        model::{ChargeModel, Formulation},
        parameters::Parameters,
        problem::Audit,
        schedule::Schedule,
        solver::{SolveSettings, Solver},
        status::Status,
        time_grid::TimeGrid,
    },
    fleet::Snapshot,
    pricing::resolve_prices,
    prelude::*,
    quantity::{cost::Cost, rate::KilowattHourRate},
    results::{ResultLog, RunSummary},
    timetable::Timetable,
};

const AUDIT_TOLERANCE: f64 = 1e-5;

#[derive(Builder)]
#[builder(finish_fn(vis = ""))]
pub struct Planner<'a> {
    snapshot: &'a Snapshot,
    charging: ChargingArgs,
    planning: PlanningArgs,
    tariff: TariffArgs,
    solver: &'a dyn Solver,

    #[builder(default = Local::now())]
    started_at: DateTime<Local>,
}

impl<S: planner_builder::IsComplete> PlannerBuilder<'_, S> {
    pub fn plan(self) -> Result<Plan> {
        self.build().plan()
    }
}

/// Outcome of a run.
///
/// Validation failures are errors, while an infeasible model or a solver failure
/// is reported through the [`Status`].
#[must_use]
pub struct Plan {
    pub case_id: String,
    pub status: Status,
    pub grid: TimeGrid,
    pub prices: Vec<KilowattHourRate>,

    /// Present only for an optimal solution.
    pub schedule: Option<Schedule>,

    /// Present only for an optimal solution.
    pub summary: Option<RunSummary>,

    pub message: Option<String>,
}

impl Plan {
    /// Append the run summary to the log, when the solution is optimal.
    ///
    /// Returns whether the summary was appended.
    pub fn record(&self, log: &ResultLog) -> Result<bool> {
        match (&self.summary, self.status) {
            (Some(summary), Status::Optimal) => {
                log.append(summary)?;
                Ok(true)
            }
            _ => {
                warn!(status = %self.status, "not recording a non-optimal run");
                Ok(false)
            }
        }
    }
}

impl Planner<'_> {
    /// Check the solution against the constraints, within the solver's numerical tolerance.
    fn audit(audit: &Audit, values: &HashMap<String, f64>) {
        let values = match audit.values_from(values) {
            Ok(values) => values,
            Err(name) => {
                warn!(name, "no value for the variable, skipping the audit");
                return;
            }
        };
        let violated: Vec<&str> = audit
            .violations(&values, AUDIT_TOLERANCE)
            .map(|constraint| constraint.label)
            .collect();
        match violated.first() {
            None => debug!("the solution satisfies all the constraints"),
            Some(first) => warn!(n_violations = violated.len(), first, "violated constraints"),
        }
    }

    #[instrument(skip_all, name = "Planning…", fields(n_buses = self.snapshot.buses.len()))]
    fn plan(self) -> Result<Plan> {
        let case_id = RunSummary::case_id_at(self.started_at);

        let timetable =
            Timetable::ingest(&self.snapshot.routes, self.planning.consumption_per_mile);
        if !timetable.report.is_all_clear() {
            bail!("route ingestion failed: {}", timetable.report);
        }
        let grid = TimeGrid::try_new(self.planning.days)?;
        let windows = grid.discretize(&timetable)?;
        let prices = resolve_prices(self.snapshot.prices.as_deref(), &self.tariff, grid)?;
        let parameters = Parameters::normalize(
            self.snapshot,
            &timetable,
            &self.charging,
            prices.clone(),
            grid.n_days(),
        )?;
        let Formulation { problem, variables } = ChargeModel::builder()
            .grid(grid)
            .windows(&windows)
            .parameters(&parameters)
            .max_transitions_per_day(self.planning.max_transitions_per_day)
            .min_session_slots(self.planning.min_session_slots)
            .build()
            .build()?;

        let settings = SolveSettings::from(self.planning.solver);
        let audit = problem.audit();
        let outcome = self.solver.solve(problem, &settings);
        let mut plan = Plan {
            case_id,
            status: outcome.status,
            grid,
            prices,
            schedule: None,
            summary: None,
            message: outcome.message.clone(),
        };
        if !outcome.status.is_optimal() {
            warn!(status = %outcome.status, message = ?outcome.message, "no schedule");
            return Ok(plan);
        }

        Self::audit(&audit, &outcome.values);
        let bus_ids: Vec<String> = self.snapshot.buses.iter().map(|bus| bus.id.clone()).collect();
        let route_ids: Vec<String> =
            timetable.entries.iter().map(|entry| entry.route_id.clone()).collect();
        let interpreted =
            Schedule::interpret(&variables, &outcome.values, grid, &bus_ids, &route_ids);
        let (schedule, objective_value) = match (interpreted, outcome.objective_value) {
            (Ok(schedule), Some(objective_value)) => (schedule, objective_value),
            (Err(error), _) => {
                error!("failed to interpret the solution: {error:#}");
                plan.status = Status::Error;
                plan.message = Some(format!("{error:#}"));
                return Ok(plan);
            }
            (Ok(_), None) => {
                error!("the solver reported no objective value");
                plan.status = Status::Error;
                plan.message = Some("no objective value".to_string());
                return Ok(plan);
            }
        };

        let summary = RunSummary {
            case_id: plan.case_id.clone(),
            num_buses: parameters.n_buses(),
            eb_max_kwh: self.charging.eb_max,
            num_chargers: parameters.n_chargers,
            charger_power: self.charging.charger_power,
            charger_eff: self.charging.charger_efficiency,
            route_summary: timetable.summary(),
            grid_max_power: self.charging.grid_max_power,
            objective_value: Cost::from(objective_value),
            solve_time_seconds: outcome.solve_time.as_secs_f64(),
            timestamp: self.started_at,
        };
        info!(status = %plan.status, objective_value = %summary.objective_value, "planned");
        plan.schedule = Some(schedule);
        plan.summary = Some(summary);
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{
        cli::SolverArgs,
        core::solver::{MicroLp, SolverOutcome},
        core::problem::Problem,
        fleet::{Bus, ChargerPool, FixedAssignment, Route, SlotOfDay, StateOfCharge},
        quantity::{Quantity, energy::KilowattHours},
        results::tests::temporary_path,
    };

    const CHARGING: ChargingArgs = ChargingArgs {
        eb_max: Quantity(100.0),
        charger_power: Quantity(50.0),
        charger_efficiency: 0.9,
        grid_max_power: Quantity(50.0),
    };

    const TARIFF: TariffArgs =
        TariffArgs { off_peak: Quantity(0.12), mid_peak: Quantity(0.18), peak: Quantity(0.32) };

    fn planning(days: usize) -> PlanningArgs {
        PlanningArgs {
            days,
            max_transitions_per_day: 2,
            min_session_slots: 6,
            consumption_per_mile: 2.0,
            solver: SolverArgs {
                optimality_gap: 0.005,
                time_limit: Duration::from_secs(120).into(),
            },
        }
    }

    /// One bus at 80% and one route from 05:00 to 15:00.
    fn snapshot(energy_required: f64, n_chargers: usize) -> Snapshot {
        Snapshot {
            buses: vec![Bus {
                id: "b1".to_string(),
                state_of_charge: StateOfCharge::Text("80%".to_string()),
                final_state_of_charge: None,
            }],
            routes: vec![Route {
                id: "77".to_string(),
                departure: SlotOfDay::Index(21),
                arrival: SlotOfDay::Clock("15:00".to_string()),
                energy_required_kwh: Some(KilowattHours::from(energy_required)),
                distance_miles: None,
            }],
            chargers: ChargerPool { count: n_chargers },
            prices: None,
            fixed_assignments: Vec::new(),
        }
    }

    fn plan(snapshot: &Snapshot, solver: &dyn Solver) -> Result<Plan> {
        Planner::builder()
            .snapshot(snapshot)
            .charging(CHARGING)
            .planning(planning(1))
            .tariff(TARIFF)
            .solver(solver)
            .plan()
    }

    #[test]
    fn test_single_bus_scenario() -> Result {
        let plan = plan(&snapshot(30.0, 1), &MicroLp)?;
        assert_eq!(plan.status, Status::Optimal);
        let schedule = plan.schedule.as_ref().unwrap();

        // Departure at slot 20, return at slot 60:
        assert!(schedule.slots[20].energy.0 >= 20.0 + 30.0 - 1e-6);
        assert_eq!(schedule.route_bus(0, "77"), Some("b1"));
        for record in &schedule.slots[20..=60] {
            assert!(!record.charger_in_use, "charging at slot {}", record.slot);
        }
        for record in &schedule.slots {
            assert!(record.energy.0 >= 20.0 - 1e-6 && record.energy.0 <= 100.0 + 1e-6);
            assert!(record.grid_power.0 <= 50.0 + 1e-6);
        }
        assert_abs_diff_eq!(schedule.slots[95].energy.0, 80.0, epsilon = 1e-6);

        // 30 kWh recharged at the off-peak rate, after the 21:00 boundary:
        let summary = plan.summary.as_ref().unwrap();
        assert_abs_diff_eq!(summary.objective_value.0, 30.0 / 0.9 * 0.12, epsilon = 0.025);
        assert_eq!(summary.route_summary, "77:21-61:30.0kWh");
        Ok(())
    }

    #[test]
    fn test_route_beyond_battery_range_is_infeasible() -> Result {
        let plan = plan(&snapshot(90.0, 1), &MicroLp)?;
        assert_eq!(plan.status.to_string(), "Model is infeasible");
        assert!(plan.schedule.is_none());
        assert!(plan.summary.is_none());
        Ok(())
    }

    #[test]
    fn test_no_chargers_is_infeasible() -> Result {
        let plan = plan(&snapshot(30.0, 0), &MicroLp)?;
        assert_eq!(plan.status, Status::Infeasible);
        Ok(())
    }

    #[test]
    fn test_rejected_timetable_fails_fast() {
        let mut snapshot = snapshot(30.0, 1);
        snapshot.routes[0].arrival = SlotOfDay::Index(10);
        let error = plan(&snapshot, &MicroLp).err().unwrap();
        assert!(error.to_string().contains("not before arrival"));
    }

    #[test]
    fn test_malformed_state_of_charge_fails_fast() {
        let mut snapshot = snapshot(30.0, 1);
        snapshot.buses[0].state_of_charge = StateOfCharge::Text("plenty".to_string());
        assert!(plan(&snapshot, &MicroLp).is_err());
    }

    struct FailingSolver;

    impl Solver for FailingSolver {
        fn solve(&self, _problem: Problem, _settings: &SolveSettings) -> SolverOutcome {
            SolverOutcome::failed(Status::Error, Duration::ZERO, "out of licences")
        }
    }

    #[test]
    fn test_solver_error_is_not_recorded() -> Result {
        let plan = plan(&snapshot(30.0, 1), &FailingSolver)?;
        assert_eq!(plan.status.to_string(), "Model Error");
        assert_eq!(plan.message.as_deref(), Some("out of licences"));

        let log = ResultLog::new(temporary_path("failing"));
        assert!(!plan.record(&log)?);
        assert!(log.read_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_recording_twice_appends_twice() -> Result {
        let plan = plan(&snapshot(30.0, 1), &MicroLp)?;
        let log = ResultLog::new(temporary_path("twice"));
        assert!(plan.record(&log)?);
        assert!(plan.record(&log)?);
        let summaries = log.read_all()?;
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|summary| summary.case_id == plan.case_id));
        Ok(())
    }

    /// Two buses at 80% share a single charger, cheap energy from 18:00.
    ///
    /// The route is pinned to the second bus, so that the first one stays in the depot.
    fn fleet_snapshot() -> Snapshot {
        let mut snapshot = snapshot(30.0, 1);
        snapshot.buses.push(Bus {
            id: "b2".to_string(),
            state_of_charge: StateOfCharge::Fraction(0.8),
            final_state_of_charge: None,
        });
        snapshot.prices = Some(
            (0..96)
                .map(|slot| KilowattHourRate::from(if slot >= 72 { 0.1 } else { 0.3 }))
                .collect(),
        );
        snapshot.fixed_assignments =
            vec![FixedAssignment { day: 0, route: "77".to_string(), bus: "b2".to_string() }];
        snapshot
    }

    #[test]
    fn test_shared_charger() -> Result {
        const GRID_MAX_POWER: f64 = 30.0;

        let snapshot = fleet_snapshot();
        let plan = Planner::builder()
            .snapshot(&snapshot)
            .charging(ChargingArgs { grid_max_power: Quantity(GRID_MAX_POWER), ..CHARGING })
            .planning(planning(1))
            .tariff(TARIFF)
            .solver(&MicroLp)
            .plan()?;
        assert_eq!(plan.status, Status::Optimal, "{:?}", plan.message);
        let schedule = plan.schedule.as_ref().unwrap();
        let n_slots = plan.grid.n_slots();

        // Every bus and slot exactly once, ordered by bus and then by slot:
        assert_eq!(schedule.slots.len(), 2 * n_slots);
        for (i, record) in schedule.slots.iter().enumerate() {
            assert_eq!(record.bus, ["b1", "b2"][i / n_slots]);
            assert_eq!(record.slot, i % n_slots);
            assert!(record.energy.0 >= 20.0 - 1e-6 && record.energy.0 <= 100.0 + 1e-6);
        }

        for slot in 0..n_slots {
            let (first, second) = (&schedule.slots[slot], &schedule.slots[n_slots + slot]);
            assert!(
                !(first.charger_in_use && second.charger_in_use),
                "both buses charge at slot {slot}",
            );
            assert!(
                (first.grid_power + second.grid_power).0 <= GRID_MAX_POWER + 1e-6,
                "grid overdrawn at slot {slot}",
            );
        }

        // Exactly one bus per route, and it is the pinned one:
        assert_eq!(schedule.route_bus(0, "77"), Some("b2"));
        assert_eq!(schedule.assignments.iter().filter(|record| record.assignment == 1).count(), 1);

        let (idle, serving) = schedule.slots.split_at(n_slots);
        assert!(serving[20].energy.0 >= 20.0 + 30.0 - 1e-6);
        assert!(serving[20..=60].iter().all(|record| !record.charger_in_use));
        assert!(serving.iter().filter(|record| record.session_boundary).count() <= 2);
        for slots in [idle, serving] {
            assert_abs_diff_eq!(slots[n_slots - 1].energy.0, 80.0, epsilon = 1e-6);
        }

        // 30 kWh recharged at the cheap rate:
        let summary = plan.summary.as_ref().unwrap();
        assert_eq!(summary.num_buses, 2);
        assert_abs_diff_eq!(summary.objective_value.0, 30.0 / 0.9 * 0.1, epsilon = 0.025);
        Ok(())
    }
}
