pub mod model;
pub mod parameters;
pub mod planner;
pub mod problem;
pub mod schedule;
pub mod solver;
pub mod status;
pub mod time_grid;
pub mod transitions;
