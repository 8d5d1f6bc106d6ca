use std::fmt::{Debug, Display, Formatter};

use crate::quantity::Quantity;

pub type Cost = Quantity<0, 0, 1>;

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} $", self.0)
    }
}

impl Debug for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}$", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Cost::from(4.0049).to_string(), "4.00 $");
        assert_eq!(format!("{:?}", Cost::from(0.0016)), "0.002$");
    }
}
