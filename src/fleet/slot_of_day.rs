use chrono::{NaiveTime, Timelike};
use serde::Deserialize;

use crate::{core::time_grid::SLOT_MINUTES, prelude::*};

/// Raw timetable time: one-based slot of the day, or a clock time.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SlotOfDay {
    Index(u32),
    Clock(String),
}

impl SlotOfDay {
    /// Get the one-based slot of the day.
    pub fn try_one_based(&self) -> Result<u32> {
        match self {
            Self::Index(index) => Ok(*index),
            Self::Clock(text) => {
                let time = NaiveTime::parse_from_str(text, "%H:%M")
                    .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
                    .with_context(|| format!("malformed clock time `{text}`"))?;
                let minutes = time.num_seconds_from_midnight() / 60;
                Ok(minutes / SLOT_MINUTES + 1)
            }
        }
    }
}
