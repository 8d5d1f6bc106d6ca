//! Charging and route assignment model builder.

use bon::Builder;
use good_lp::Expression;

use crate::{
    core::{
        parameters::Parameters,
        problem::{Domain, Family, Problem, Sense},
        time_grid::{RouteWindows, SLOTS_PER_DAY, TimeGrid},
        transitions::Transitions,
    },
    prelude::*,
};

/// Decision variables of the model, all indexed by bus first.
#[must_use]
#[derive(Clone, Debug)]
pub struct Variables {
    /// `powerCB[b,t]`: charging power delivered to the bus.
    pub power: Family<2>,

    /// `gridPowToB[b,t]`: grid draw towards the bus.
    pub grid_power: Family<2>,

    /// `eB[b,t]`: battery energy.
    pub energy: Family<2>,

    /// `chargerUse[b,t]`: the bus occupies a charger.
    pub charger_use: Family<2>,

    /// `T1`, `T2`, and `Change` over the charger occupancy.
    pub transitions: Transitions,

    /// `charging[b,d]`: the bus charges at all during the day.
    pub charging: Family<2>,

    /// `assignment[b,d,r]`: the bus serves the route on the day.
    pub assignment: Family<3>,
}

#[must_use]
pub struct Formulation {
    pub problem: Problem,
    pub variables: Variables,
}

#[derive(Builder)]
pub struct ChargeModel<'a> {
    grid: TimeGrid,
    windows: &'a RouteWindows,
    parameters: &'a Parameters,

    /// Maximum number of charging session starts and stops per bus and day.
    #[builder(default = 2)]
    max_transitions_per_day: usize,

    /// Minimal total charging time per bus and day, if the bus charges at all.
    #[builder(default = 6)]
    min_session_slots: usize,
}

impl ChargeModel<'_> {
    #[instrument(
        skip_all,
        fields(
            n_buses = self.parameters.n_buses(),
            n_days = self.grid.n_days(),
            n_routes = self.parameters.n_routes(),
        ),
    )]
    pub fn build(&self) -> Result<Formulation> {
        ensure!(
            self.parameters.prices.len() == self.grid.n_slots(),
            "expected {} prices, got {}",
            self.grid.n_slots(),
            self.parameters.prices.len(),
        );
        ensure!(
            self.windows.n_routes() == self.parameters.n_routes(),
            "route windows and route energies disagree",
        );
        ensure!(
            self.parameters.final_energy.len() == self.parameters.n_buses(),
            "initial and final energies disagree",
        );

        let mut problem = Problem::default();
        let variables = self.declare(&mut problem);
        self.add_charging_constraints(&mut problem, &variables);
        self.add_power_constraints(&mut problem, &variables);
        self.add_battery_constraints(&mut problem, &variables);
        self.add_route_constraints(&mut problem, &variables);
        problem.minimize(self.energy_cost(&variables));

        info!(
            n_variables = problem.declarations().len(),
            n_binaries = problem.n_binaries(),
            n_constraints = problem.constraints().len(),
            "built the model",
        );
        Ok(Formulation { problem, variables })
    }

    fn declare(&self, problem: &mut Problem) -> Variables {
        let n_buses = self.parameters.n_buses();
        let n_slots = self.grid.n_slots();
        let n_days = self.grid.n_days();

        let power = problem.add_family(
            "powerCB",
            [n_buses, n_slots],
            Domain::Continuous,
            0.0,
            self.parameters.charger_power.0,
        );
        let grid_power = problem.add_family(
            "gridPowToB",
            [n_buses, n_slots],
            Domain::Continuous,
            0.0,
            self.parameters.grid_max_power.0,
        );
        let energy = problem.add_family(
            "eB",
            [n_buses, n_slots],
            Domain::Continuous,
            self.parameters.min_energy.0,
            self.parameters.max_energy.0,
        );
        let charger_use = problem.add_binary_family("chargerUse", [n_buses, n_slots]);
        let transitions = Transitions::encode(problem, &charger_use, ["T1", "T2", "Change"]);
        let charging = problem.add_binary_family("charging", [n_buses, n_days]);
        let assignment =
            problem.add_binary_family("assignment", [n_buses, n_days, self.parameters.n_routes()]);

        Variables { power, grid_power, energy, charger_use, transitions, charging, assignment }
    }

    /// Session count and minimal session length per bus and day.
    fn add_charging_constraints(&self, problem: &mut Problem, variables: &Variables) {
        for bus in 0..self.parameters.n_buses() {
            for day in 0..self.grid.n_days() {
                let slots = self.grid.day_slots(day);
                #[expect(clippy::cast_precision_loss)]
                let max_transitions = self.max_transitions_per_day as f64;
                problem.add_constraint(
                    "transition budget",
                    variables.transitions.count(bus, slots.clone()),
                    Sense::LessOrEqual,
                    max_transitions,
                );

                let occupancy: Expression =
                    slots.map(|slot| variables.charger_use.at([bus, slot])).sum();
                let charging = variables.charging.at([bus, day]);
                #[expect(clippy::cast_precision_loss)]
                let (min_slots, max_slots) = (self.min_session_slots as f64, SLOTS_PER_DAY as f64);
                problem.add_constraint(
                    "minimal charging time",
                    occupancy.clone(),
                    Sense::GreaterOrEqual,
                    min_slots * charging,
                );
                problem.add_constraint(
                    "charging day link",
                    occupancy,
                    Sense::LessOrEqual,
                    max_slots * charging,
                );
            }
        }
    }

    /// Charger occupancy, charger pool, and grid capacity.
    fn add_power_constraints(&self, problem: &mut Problem, variables: &Variables) {
        let n_buses = self.parameters.n_buses();
        for slot in 0..self.grid.n_slots() {
            for bus in 0..n_buses {
                problem.add_constraint(
                    "grid to charger link",
                    variables.power.at([bus, slot]),
                    Sense::Equal,
                    variables.grid_power.at([bus, slot]),
                );
                problem.add_constraint(
                    "charger power limit",
                    variables.power.at([bus, slot]),
                    Sense::LessOrEqual,
                    self.parameters.charger_power.0 * variables.charger_use.at([bus, slot]),
                );
            }
            #[expect(clippy::cast_precision_loss)]
            let n_chargers = self.parameters.n_chargers as f64;
            problem.add_constraint(
                "charger capacity",
                (0..n_buses).map(|bus| variables.charger_use.at([bus, slot])).sum::<Expression>(),
                Sense::LessOrEqual,
                n_chargers,
            );
            problem.add_constraint(
                "grid capacity",
                (0..n_buses).map(|bus| variables.grid_power.at([bus, slot])).sum::<Expression>(),
                Sense::LessOrEqual,
                self.parameters.grid_max_power.0,
            );
        }
    }

    /// Energy carry-over, route depletion on return, pre-departure margin, and boundaries.
    fn add_battery_constraints(&self, problem: &mut Problem, variables: &Variables) {
        let charge_coefficient = self.grid.slot_duration().0 * self.parameters.charger_efficiency;
        let n_slots = self.grid.n_slots();

        for bus in 0..self.parameters.n_buses() {
            for day in 0..self.grid.n_days() {
                for slot in self.grid.day_slots(day) {
                    if slot != 0 {
                        let returning = self.windows.returning_at(day, slot);
                        let depletion = self.route_energy(variables, bus, day, returning);
                        problem.add_constraint(
                            "battery dynamics",
                            variables.energy.at([bus, slot]),
                            Sense::Equal,
                            variables.energy.at([bus, slot - 1])
                                + charge_coefficient * variables.power.at([bus, slot - 1])
                                - depletion,
                        );
                    }

                    let departing: Vec<usize> = self.windows.departing_at(day, slot).collect();
                    if !departing.is_empty() {
                        let requirement = self.route_energy(variables, bus, day, departing);
                        problem.add_constraint(
                            "route requirement",
                            variables.energy.at([bus, slot]),
                            Sense::GreaterOrEqual,
                            requirement + self.parameters.min_energy.0,
                        );
                    }
                }
            }

            problem.add_constraint(
                "initial energy",
                variables.energy.at([bus, 0]),
                Sense::Equal,
                self.parameters.initial_energy[bus].0,
            );
            problem.add_constraint(
                "final energy",
                variables.energy.at([bus, n_slots - 1]),
                Sense::Equal,
                self.parameters.final_energy[bus].0,
            );
        }
    }

    /// `Σ energy[r] · assignment[b,d,r]` over the selected routes.
    fn route_energy(
        &self,
        variables: &Variables,
        bus: usize,
        day: usize,
        routes: impl IntoIterator<Item = usize>,
    ) -> Expression {
        routes
            .into_iter()
            .map(|route| {
                self.parameters.route_energy[route].0 * variables.assignment.at([bus, day, route])
            })
            .sum()
    }

    /// Charging and routing exclusion, route coverage, and the fixed assignments.
    fn add_route_constraints(&self, problem: &mut Problem, variables: &Variables) {
        let n_buses = self.parameters.n_buses();
        let n_routes = self.parameters.n_routes();

        for bus in 0..n_buses {
            for day in 0..self.grid.n_days() {
                for route in 0..n_routes {
                    let assignment = variables.assignment.at([bus, day, route]);
                    for slot in self.windows.get(route, day).slots() {
                        problem.add_constraint(
                            "charging while away",
                            variables.charger_use.at([bus, slot]) + assignment,
                            Sense::LessOrEqual,
                            1.0,
                        );
                    }
                }
                if n_routes != 0 {
                    problem.add_constraint(
                        "one route per bus",
                        (0..n_routes)
                            .map(|route| variables.assignment.at([bus, day, route]))
                            .sum::<Expression>(),
                        Sense::LessOrEqual,
                        1.0,
                    );
                }
            }
        }

        for day in 0..self.grid.n_days() {
            for route in 0..n_routes {
                problem.add_constraint(
                    "route coverage",
                    (0..n_buses)
                        .map(|bus| variables.assignment.at([bus, day, route]))
                        .sum::<Expression>(),
                    Sense::Equal,
                    1.0,
                );
            }
        }

        for &(bus, day, route) in &self.parameters.fixed_assignments {
            problem.add_constraint(
                "fixed assignment",
                variables.assignment.at([bus, day, route]),
                Sense::Equal,
                1.0,
            );
        }
    }

    /// Total grid energy cost over the horizon.
    fn energy_cost(&self, variables: &Variables) -> Expression {
        let slot_duration = self.grid.slot_duration().0;
        let mut cost = Expression::with_capacity(variables.grid_power.len());
        for (slot, price) in self.parameters.prices.iter().enumerate() {
            for bus in 0..self.parameters.n_buses() {
                cost.add_mul(slot_duration * price.0, variables.grid_power.at([bus, slot]));
            }
        }
        cost
    }
}
