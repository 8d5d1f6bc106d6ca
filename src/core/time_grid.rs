//! Day and slot index structure of the planning horizon.

use std::ops::{Range, RangeInclusive};

use chrono::{NaiveTime, TimeDelta};

use crate::{
    prelude::*,
    quantity::time::Hours,
    timetable::{Entry, Timetable},
};

pub const SLOT_MINUTES: u32 = 15;
pub const SLOTS_PER_DAY: usize = 96;

#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct TimeGrid {
    n_days: usize,
}

impl TimeGrid {
    pub fn try_new(n_days: usize) -> Result<Self> {
        ensure!(n_days != 0, "the horizon must span at least one day");
        Ok(Self { n_days })
    }

    pub const fn n_days(self) -> usize {
        self.n_days
    }

    /// Horizon length in slots.
    pub const fn n_slots(self) -> usize {
        self.n_days * SLOTS_PER_DAY
    }

    pub fn slot_duration(self) -> Hours {
        Hours::from(TimeDelta::minutes(i64::from(SLOT_MINUTES)))
    }

    /// Absolute slot indices of the given day.
    pub const fn day_slots(self, day: usize) -> Range<usize> {
        (day * SLOTS_PER_DAY)..((day + 1) * SLOTS_PER_DAY)
    }

    pub const fn day_of(self, slot: usize) -> usize {
        slot / SLOTS_PER_DAY
    }

    /// Wall-clock start of the slot within its day.
    #[expect(clippy::cast_possible_truncation)]
    pub fn start_time(self, slot: usize) -> NaiveTime {
        let minutes = (slot % SLOTS_PER_DAY) as u32 * SLOT_MINUTES;
        NaiveTime::from_num_seconds_from_midnight_opt(minutes * 60, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Label like `D2 06:15` for the rendered tables.
    pub fn label(self, slot: usize) -> String {
        format!("D{} {}", self.day_of(slot) + 1, self.start_time(slot).format("%H:%M"))
    }

    /// Compute the absolute departure and return slots of every route on every day.
    ///
    /// The timetable is one-based, hence the `- 1`.
    #[instrument(skip_all, fields(n_days = self.n_days, n_routes = timetable.entries.len()))]
    pub fn discretize(self, timetable: &Timetable) -> Result<RouteWindows> {
        if !timetable.report.is_all_clear() {
            bail!("the timetable is rejected: {}", timetable.report);
        }
        let n_routes = timetable.entries.len();
        let mut windows = Vec::with_capacity(n_routes * self.n_days);
        for entry in &timetable.entries {
            for day in 0..self.n_days {
                windows.push(self.window(entry, day)?);
            }
        }
        debug!(n_windows = windows.len(), "discretized");
        Ok(RouteWindows { n_days: self.n_days, n_routes, windows })
    }

    fn window(self, entry: &Entry, day: usize) -> Result<RouteWindow> {
        ensure!(entry.departure >= 1, "route `{}` departs before the first slot", entry.route_id);
        ensure!(
            entry.departure < entry.arrival,
            "route `{}` departs at slot {} which is not before arrival at slot {}",
            entry.route_id,
            entry.departure,
            entry.arrival,
        );
        let offset = day * SLOTS_PER_DAY;
        let departure = entry.departure as usize - 1 + offset;
        let arrival = entry.arrival as usize - 1 + offset;
        ensure!(
            arrival < self.day_slots(day).end,
            "route `{}` does not fit into day {day}",
            entry.route_id,
        );
        Ok(RouteWindow { departure, arrival })
    }
}

/// Absolute slot indices of a single route trip.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RouteWindow {
    pub departure: usize,
    pub arrival: usize,
}

impl RouteWindow {
    /// Slots during which the bus is away, both ends included.
    pub const fn slots(self) -> RangeInclusive<usize> {
        self.departure..=self.arrival
    }
}

/// Route windows indexed by `(route, day)`.
#[must_use]
#[derive(Debug)]
pub struct RouteWindows {
    n_days: usize,
    n_routes: usize,
    windows: Vec<RouteWindow>,
}

impl RouteWindows {
    pub const fn n_routes(&self) -> usize {
        self.n_routes
    }

    pub fn get(&self, route: usize, day: usize) -> RouteWindow {
        self.windows[route * self.n_days + day]
    }

    /// Routes of the given day that depart at the slot.
    pub fn departing_at(&self, day: usize, slot: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_routes).filter(move |&route| self.get(route, day).departure == slot)
    }

    /// Routes of the given day that return at the slot.
    pub fn returning_at(&self, day: usize, slot: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_routes).filter(move |&route| self.get(route, day).arrival == slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{quantity::energy::KilowattHours, timetable::Report};

    fn timetable(report: Report) -> Timetable {
        Timetable {
            report,
            entries: vec![
                Entry {
                    route_id: "a".to_string(),
                    departure: 20,
                    arrival: 60,
                    energy_required: KilowattHours::from(30.0),
                },
                Entry {
                    route_id: "b".to_string(),
                    departure: 1,
                    arrival: 96,
                    energy_required: KilowattHours::from(10.0),
                },
            ],
        }
    }

    #[test]
    fn test_horizon() -> Result {
        let grid = TimeGrid::try_new(2)?;
        assert_eq!(grid.n_slots(), 192);
        assert_eq!(grid.day_slots(1), 96..192);
        assert_eq!(grid.day_of(95), 0);
        assert_eq!(grid.day_of(96), 1);
        assert_eq!(grid.label(97), "D2 00:15");
        Ok(())
    }

    #[test]
    fn test_zero_days_rejected() {
        assert!(TimeGrid::try_new(0).is_err());
    }

    #[test]
    fn test_discretize_offsets() -> Result {
        let windows = TimeGrid::try_new(2)?.discretize(&timetable(Report::AllClear))?;
        assert_eq!(windows.get(0, 0), RouteWindow { departure: 19, arrival: 59 });
        assert_eq!(windows.get(0, 1), RouteWindow { departure: 115, arrival: 155 });
        assert_eq!(windows.get(1, 0), RouteWindow { departure: 0, arrival: 95 });
        assert_eq!(windows.get(1, 1), RouteWindow { departure: 96, arrival: 191 });
        assert_eq!(windows.departing_at(1, 115).collect::<Vec<_>>(), vec![0]);
        assert_eq!(windows.returning_at(0, 95).collect::<Vec<_>>(), vec![1]);
        assert_eq!(windows.returning_at(0, 96).count(), 0);
        Ok(())
    }

    #[test]
    fn test_rejected_report_aborts() -> Result {
        let result = TimeGrid::try_new(1)?
            .discretize(&timetable(Report::Rejected("missing block 7771".to_string())));
        let error = result.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(error.contains("missing block 7771"));
        Ok(())
    }

    #[test]
    fn test_arrival_at_zero_rejected() -> Result {
        let mut timetable = timetable(Report::AllClear);
        timetable.entries[0].arrival = 0;
        let error = TimeGrid::try_new(1)?.discretize(&timetable).unwrap_err();
        assert!(error.to_string().contains("not before arrival"));
        Ok(())
    }
}
