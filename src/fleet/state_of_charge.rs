use serde::Deserialize;

use crate::prelude::*;

/// State of charge as it comes from the fleet: a percentage string or a fraction.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StateOfCharge {
    Fraction(f64),
    Text(String),
}

impl StateOfCharge {
    /// Convert into a fraction within `[0, 1]`.
    pub fn try_fraction(&self) -> Result<f64> {
        let fraction = match self {
            Self::Fraction(fraction) => *fraction,
            Self::Text(text) => {
                let text = text.trim();
                if let Some(percent) = text.strip_suffix('%') {
                    let percent: f64 = percent
                        .trim()
                        .parse()
                        .with_context(|| format!("malformed state of charge `{text}`"))?;
                    percent / 100.0
                } else {
                    text.parse().with_context(|| format!("malformed state of charge `{text}`"))?
                }
            }
        };
        ensure!(
            fraction.is_finite() && (0.0..=1.0).contains(&fraction),
            "state of charge {fraction} is outside of [0, 1]",
        );
        Ok(fraction)
    }
}
