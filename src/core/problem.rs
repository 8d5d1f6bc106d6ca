//! Mixed-integer linear problem owned by a single run.
//!
//! Variables are allocated through [`good_lp::ProblemVariables`] and grouped into named
//! [`Family`] tensors, so that the solver can report values by name, like `powerCB[0,17]`.
//! Every constraint keeps its group label, which the post-solve audit reports.

use std::collections::HashMap;

use good_lp::{Expression, ProblemVariables, Solution, Variable, constraint, variable};
use itertools::Itertools;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Domain {
    Continuous,
    Binary,
}

#[derive(Clone, Debug)]
pub struct Declaration {
    pub variable: Variable,
    pub name: String,
    pub domain: Domain,
    pub lower: f64,
    pub upper: f64,
}

/// Multi-dimensional family of variables sharing a name, like `eB[b,t]`.
///
/// The variables are stored in row-major order.
#[must_use]
#[derive(Clone, Debug)]
pub struct Family<const N: usize> {
    name: &'static str,
    variables: Vec<Variable>,
    shape: [usize; N],
}

impl<const N: usize> Family<N> {
    pub const fn shape(&self) -> [usize; N] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn at(&self, index: [usize; N]) -> Variable {
        let mut flat = 0;
        for (i, dimension) in index.into_iter().zip(self.shape) {
            debug_assert!(i < dimension, "`{}` {index:?} is out of {:?}", self.name, self.shape);
            flat = flat * dimension + i;
        }
        self.variables[flat]
    }

    /// Variable name as reported back by the solver, for example `powerCB[0,17]`.
    pub fn name_at(&self, index: [usize; N]) -> String {
        format!("{}[{}]", self.name, index.iter().join(","))
    }

    /// Iterate over all the indices in the storage order.
    pub fn indices(&self) -> impl Iterator<Item = [usize; N]> + use<N> {
        let shape = self.shape;
        (0..shape.iter().product::<usize>()).map(move |mut flat| {
            let mut index = [0; N];
            for axis in (0..N).rev() {
                index[axis] = flat % shape[axis];
                flat /= shape[axis];
            }
            index
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sense {
    LessOrEqual,
    Equal,
    GreaterOrEqual,
}

/// Labelled linear constraint `lhs <sense> rhs`.
#[derive(Clone, Debug)]
pub struct Constraint {
    /// Constraint group, used for diagnostics.
    pub label: &'static str,

    pub lhs: Expression,
    pub sense: Sense,
    pub rhs: Expression,
}

impl Constraint {
    pub fn to_good_lp(&self) -> good_lp::Constraint {
        let (lhs, rhs) = (self.lhs.clone(), self.rhs.clone());
        match self.sense {
            Sense::LessOrEqual => constraint::leq(lhs, rhs),
            Sense::Equal => constraint::eq(lhs, rhs),
            Sense::GreaterOrEqual => constraint::geq(lhs, rhs),
        }
    }

    pub fn is_satisfied(&self, values: &impl Solution, tolerance: f64) -> bool {
        let lhs = self.lhs.eval_with(values);
        let rhs = self.rhs.eval_with(values);
        match self.sense {
            Sense::LessOrEqual => lhs <= rhs + tolerance,
            Sense::Equal => (lhs - rhs).abs() <= tolerance,
            Sense::GreaterOrEqual => lhs >= rhs - tolerance,
        }
    }
}

/// Minimization problem.
#[must_use]
pub struct Problem {
    variables: ProblemVariables,
    declarations: Vec<Declaration>,
    constraints: Vec<Constraint>,
    objective: Expression,
}

impl Default for Problem {
    fn default() -> Self {
        Self {
            variables: ProblemVariables::new(),
            declarations: Vec::new(),
            constraints: Vec::new(),
            objective: Expression::from(0.0),
        }
    }
}

impl Problem {
    pub fn add_family<const N: usize>(
        &mut self,
        name: &'static str,
        shape: [usize; N],
        domain: Domain,
        lower: f64,
        upper: f64,
    ) -> Family<N> {
        let mut family = Family { name, variables: Vec::new(), shape };
        for index in family.indices() {
            let definition = match domain {
                Domain::Binary => variable().binary(),
                Domain::Continuous => variable().min(lower).max(upper),
            };
            let name = family.name_at(index);
            let variable = self.variables.add(definition.name(name.clone()));
            family.variables.push(variable);
            self.declarations.push(Declaration { variable, name, domain, lower, upper });
        }
        family
    }

    pub fn add_binary_family<const N: usize>(
        &mut self,
        name: &'static str,
        shape: [usize; N],
    ) -> Family<N> {
        self.add_family(name, shape, Domain::Binary, 0.0, 1.0)
    }

    pub fn add_constraint(
        &mut self,
        label: &'static str,
        lhs: impl Into<Expression>,
        sense: Sense,
        rhs: impl Into<Expression>,
    ) {
        self.constraints.push(Constraint { label, lhs: lhs.into(), sense, rhs: rhs.into() });
    }

    pub fn minimize(&mut self, objective: Expression) {
        self.objective = objective;
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub const fn objective(&self) -> &Expression {
        &self.objective
    }

    pub fn n_binaries(&self) -> usize {
        self.declarations.iter().filter(|declaration| declaration.domain == Domain::Binary).count()
    }

    /// Get the constraints of the group.
    #[cfg(test)]
    pub fn labelled(&self, label: &str) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |constraint| constraint.label == label)
    }

    /// Split into the backend variables, the declarations, the constraints, and the objective.
    pub fn into_parts(self) -> (ProblemVariables, Vec<Declaration>, Vec<Constraint>, Expression) {
        (self.variables, self.declarations, self.constraints, self.objective)
    }

    /// Copy of everything needed to check a solution after the problem is handed to a solver.
    pub fn audit(&self) -> Audit {
        Audit {
            names: self
                .declarations
                .iter()
                .map(|declaration| (declaration.name.clone(), declaration.variable))
                .collect(),
            constraints: self.constraints.clone(),
        }
    }
}

/// Post-solve check of the constraints against the named values.
#[must_use]
pub struct Audit {
    names: Vec<(String, Variable)>,
    constraints: Vec<Constraint>,
}

impl Audit {
    /// Convert the solver's named assignment into values keyed by [`Variable`].
    ///
    /// Returns the name of the first variable without a value.
    pub fn values_from(
        &self,
        named: &HashMap<String, f64>,
    ) -> Result<HashMap<Variable, f64>, String> {
        self.names
            .iter()
            .map(|(name, variable)| {
                named.get(name).map(|value| (*variable, *value)).ok_or_else(|| name.clone())
            })
            .collect()
    }

    /// Get the constraints violated by the values.
    pub fn violations<'a>(
        &'a self,
        values: &'a HashMap<Variable, f64>,
        tolerance: f64,
    ) -> impl Iterator<Item = &'a Constraint> + 'a {
        self.constraints
            .iter()
            .filter(move |constraint| !constraint.is_satisfied(values, tolerance))
    }
}
