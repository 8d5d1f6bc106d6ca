use std::fmt::{Display, Formatter};

/// Solver termination status, as reported to the operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Optimal,
    Infeasible,
    Error,
}

impl Status {
    pub const fn is_optimal(self) -> bool {
        matches!(self, Self::Optimal)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optimal => write!(f, "Optimal solution found"),
            Self::Infeasible => write!(f, "Model is infeasible"),
            Self::Error => write!(f, "Model Error"),
        }
    }
}
