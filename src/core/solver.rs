//! Solver seam: anything that can solve a [`Problem`] within the settings.

mod microlp;

use std::{collections::HashMap, time::Duration};

pub use self::microlp::MicroLp;
use crate::core::{problem::Problem, status::Status};

#[derive(Copy, Clone, Debug)]
pub struct SolveSettings {
    /// Relative MIP gap at which the search may stop.
    pub optimality_gap: f64,

    /// Wall-clock limit of a single solve.
    pub time_limit: Duration,
}

impl Default for SolveSettings {
    fn default() -> Self {
        Self { optimality_gap: 0.005, time_limit: Duration::from_secs(300) }
    }
}

#[must_use]
#[derive(Clone, Debug)]
pub struct SolverOutcome {
    pub status: Status,

    /// Variable values by name, empty unless the backend found a solution.
    pub values: HashMap<String, f64>,

    pub objective_value: Option<f64>,
    pub solve_time: Duration,

    /// Backend message for anything but a proven optimum.
    pub message: Option<String>,
}

impl SolverOutcome {
    pub fn failed(status: Status, solve_time: Duration, message: impl Into<String>) -> Self {
        Self {
            status,
            values: HashMap::new(),
            objective_value: None,
            solve_time,
            message: Some(message.into()),
        }
    }
}

pub trait Solver {
    /// Solve the problem, never panicking on an infeasible or broken model.
    ///
    /// The backend stops at the optimality gap or at the time limit, whichever comes first.
    fn solve(&self, problem: Problem, settings: &SolveSettings) -> SolverOutcome;
}
