//! Linearized counting of state flips in a binary sequence.

use std::ops::Range;

use good_lp::Expression;

use crate::core::problem::{Family, Problem, Sense};

/// Start, stop, and flip indicators of a binary occupancy `u[row, t]`.
///
/// With `start - stop = u[t] - u[t-1]`, `change = start + stop`, and `change` bounded by
/// `u[t-1] + u[t]` and `2 - u[t-1] - u[t]`, the flip indicator is 1 exactly when the occupancy
/// differs from the previous slot. The first slot of every row never flips.
#[must_use]
#[derive(Clone, Debug)]
pub struct Transitions {
    pub starts: Family<2>,
    pub stops: Family<2>,
    pub changes: Family<2>,
}

impl Transitions {
    /// Declare the indicators for the occupancy and emit the linking constraints.
    pub fn encode(
        problem: &mut Problem,
        occupancy: &Family<2>,
        names: [&'static str; 3],
    ) -> Self {
        let [starts, stops, changes] =
            names.map(|name| problem.add_binary_family(name, occupancy.shape()));
        let this = Self { starts, stops, changes };
        let [n_rows, n_slots] = occupancy.shape();

        for row in 0..n_rows {
            for slot in 0..n_slots {
                problem.add_constraint(
                    "change link",
                    this.changes.at([row, slot]),
                    Sense::Equal,
                    this.starts.at([row, slot]) + this.stops.at([row, slot]),
                );
            }

            problem.add_constraint("start init", this.starts.at([row, 0]), Sense::Equal, 0.0);
            problem.add_constraint("stop init", this.stops.at([row, 0]), Sense::Equal, 0.0);

            for slot in 1..n_slots {
                let previous = occupancy.at([row, slot - 1]);
                let current = occupancy.at([row, slot]);
                problem.add_constraint(
                    "occupancy delta",
                    this.starts.at([row, slot]) - this.stops.at([row, slot]),
                    Sense::Equal,
                    current - previous,
                );
                problem.add_constraint(
                    "change needs occupancy",
                    this.changes.at([row, slot]),
                    Sense::LessOrEqual,
                    previous + current,
                );
                problem.add_constraint(
                    "change needs vacancy",
                    this.changes.at([row, slot]),
                    Sense::LessOrEqual,
                    Expression::from(2.0) - previous - current,
                );
            }
        }

        this
    }

    /// Number of flips of the row within the slots.
    pub fn count(&self, row: usize, slots: Range<usize>) -> Expression {
        slots.map(|slot| self.changes.at([row, slot])).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use good_lp::Variable;

    use super::*;

    /// Assign the occupancy and the implied indicators, and check them against the constraints.
    fn check(sequence: &[f64], flips: &[f64]) -> bool {
        let mut problem = Problem::default();
        let occupancy = problem.add_binary_family("u", [1, sequence.len()]);
        let transitions = Transitions::encode(&mut problem, &occupancy, ["T1", "T2", "Change"]);

        let mut values: HashMap<Variable, f64> =
            problem.declarations().iter().map(|declaration| (declaration.variable, 0.0)).collect();
        for (slot, value) in sequence.iter().enumerate() {
            values.insert(occupancy.at([0, slot]), *value);
            if slot != 0 {
                let delta = value - sequence[slot - 1];
                values.insert(transitions.starts.at([0, slot]), delta.max(0.0));
                values.insert(transitions.stops.at([0, slot]), (-delta).max(0.0));
            }
            values.insert(transitions.changes.at([0, slot]), flips[slot]);
        }
        problem.audit().violations(&values, 1e-9).next().is_none()
    }

    #[test]
    fn test_single_session() {
        assert!(check(&[0.0, 1.0, 1.0, 0.0], &[0.0, 1.0, 0.0, 1.0]));
    }

    #[test]
    fn test_missed_flip_rejected() {
        assert!(!check(&[0.0, 1.0, 1.0, 0.0], &[0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_phantom_flip_rejected() {
        assert!(!check(&[1.0, 1.0, 1.0], &[0.0, 1.0, 0.0]));
        assert!(!check(&[0.0, 0.0, 0.0], &[0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_first_slot_never_flips() {
        assert!(!check(&[1.0, 1.0], &[1.0, 0.0]));
    }

    #[test]
    fn test_count() {
        let mut problem = Problem::default();
        let occupancy = problem.add_binary_family("u", [2, 4]);
        let transitions = Transitions::encode(&mut problem, &occupancy, ["T1", "T2", "Change"]);
        let mut values: HashMap<Variable, f64> =
            problem.declarations().iter().map(|declaration| (declaration.variable, 1.0)).collect();
        values.insert(transitions.changes.at([1, 2]), 0.0);
        // Only `Change[1,1]` counts within the slots 1 and 2 of the second row:
        assert!((transitions.count(1, 1..3).eval_with(&values) - 1.0).abs() < 1e-12);
    }
}
