use std::{collections::HashMap, time::Instant};

use good_lp::{
    ResolutionError,
    Solution,
    SolverModel,
    solvers::{SolutionStatus, WithMipGap, WithTimeLimit, microlp::microlp},
};

use crate::{
    core::{
        problem::Problem,
        solver::{SolveSettings, Solver, SolverOutcome},
        status::Status,
    },
    prelude::*,
};

/// Pure-Rust branch-and-bound backend.
#[derive(Copy, Clone, Debug, Default)]
pub struct MicroLp;

impl Solver for MicroLp {
    #[instrument(
        skip_all,
        name = "Solving…",
        fields(
            n_variables = problem.declarations().len(),
            n_constraints = problem.constraints().len(),
            optimality_gap = settings.optimality_gap,
            time_limit = ?settings.time_limit,
        ),
    )]
    fn solve(&self, problem: Problem, settings: &SolveSettings) -> SolverOutcome {
        let start_time = Instant::now();
        let (variables, declarations, constraints, objective) = problem.into_parts();

        #[expect(clippy::cast_possible_truncation)]
        let model = variables
            .minimise(objective.clone())
            .using(microlp)
            .with_mip_gap(settings.optimality_gap as f32);
        let mut model = match model {
            Ok(model) => model.with_time_limit(settings.time_limit.as_secs_f64()),
            Err(error) => {
                return SolverOutcome::failed(
                    Status::Error,
                    start_time.elapsed(),
                    format!("invalid optimality gap: {error}"),
                );
            }
        };
        for constraint in &constraints {
            model.add_constraint(constraint.to_good_lp());
        }

        let outcome = match model.solve() {
            Ok(solution) => {
                let (status, message) = match solution.status() {
                    SolutionStatus::Optimal => (Status::Optimal, None),
                    SolutionStatus::GapLimit => (
                        Status::Optimal,
                        Some(format!(
                            "stopped within the optimality gap of {}",
                            settings.optimality_gap,
                        )),
                    ),
                    SolutionStatus::TimeLimit => (
                        Status::Error,
                        Some(format!(
                            "time limit of {} reached before the optimality gap was proven",
                            humantime::format_duration(settings.time_limit),
                        )),
                    ),
                };
                SolverOutcome {
                    status,
                    values: declarations
                        .iter()
                        .map(|declaration| {
                            (declaration.name.clone(), solution.value(declaration.variable))
                        })
                        .collect::<HashMap<_, _>>(),
                    objective_value: Some(objective.eval_with(&solution)),
                    solve_time: start_time.elapsed(),
                    message,
                }
            }
            Err(ResolutionError::Infeasible) => {
                SolverOutcome::failed(Status::Infeasible, start_time.elapsed(), "infeasible")
            }
            Err(error) => {
                SolverOutcome::failed(Status::Error, start_time.elapsed(), error.to_string())
            }
        };
        info!(
            status = %outcome.status,
            objective_value = ?outcome.objective_value,
            elapsed = ?outcome.solve_time,
            message = ?outcome.message,
            "done",
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_abs_diff_eq;
    use good_lp::Expression;

    use super::*;
    use crate::core::problem::{Domain, Sense};

    #[test]
    fn test_small_mip() {
        // Minimize `x + 2y` subject to `x + y >= 1.5`, `y` binary, `x` in [0, 1].
        let mut problem = Problem::default();
        let x = problem.add_family("x", [1], Domain::Continuous, 0.0, 1.0);
        let y = problem.add_binary_family("y", [1]);
        problem.add_constraint("cover", x.at([0]) + y.at([0]), Sense::GreaterOrEqual, 1.5);
        problem.minimize(x.at([0]) + 2.0 * y.at([0]));

        let outcome = MicroLp.solve(problem, &SolveSettings::default());
        assert_eq!(outcome.status, Status::Optimal);
        assert_abs_diff_eq!(outcome.values["y[0]"], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(outcome.values["x[0]"], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(outcome.objective_value.unwrap(), 2.5, epsilon = 1e-6);
    }

    #[test]
    fn test_infeasible() {
        let mut problem = Problem::default();
        let x = problem.add_family("x", [1], Domain::Continuous, 0.0, 1.0);
        problem.add_constraint("too much", x.at([0]), Sense::GreaterOrEqual, 2.0);
        problem.minimize(Expression::from(x.at([0])));

        let outcome = MicroLp.solve(problem, &SolveSettings::default());
        assert_eq!(outcome.status, Status::Infeasible);
        assert!(outcome.values.is_empty());
        assert!(outcome.objective_value.is_none());
    }

    #[test]
    fn test_search_stops_at_time_limit() {
        // Knapsack with close weights and values, too hard to prove optimal within a second.
        let mut problem = Problem::default();
        let items = problem.add_binary_family("x", [60]);
        let weight = |i: usize| 1000.0 + f64::from(u32::try_from(i * 7919 % 997).unwrap());
        let capacity: Expression = (0..60).map(|i| weight(i) * items.at([i])).sum();
        problem.add_constraint("capacity", capacity, Sense::LessOrEqual, 30_000.5);
        problem.minimize((0..60).map(|i| -(weight(i) + 1.0) * items.at([i])).sum());

        let settings = SolveSettings { optimality_gap: 0.0, time_limit: Duration::from_secs(1) };
        let outcome = MicroLp.solve(problem, &settings);
        assert_ne!(outcome.status, Status::Infeasible);
        assert!(outcome.solve_time < Duration::from_secs(10), "took {:?}", outcome.solve_time);
    }
}
