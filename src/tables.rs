use std::collections::BTreeSet;

use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use ordered_float::OrderedFloat;

use crate::{
    core::{planner::Plan, schedule::Schedule, time_grid::TimeGrid},
    quantity::{cost::Cost, rate::KilowattHourRate},
    results::RunSummary,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

fn median_rate(prices: &[KilowattHourRate]) -> KilowattHourRate {
    let mut sorted: Vec<OrderedFloat<f64>> =
        prices.iter().map(|price| OrderedFloat(price.0)).collect();
    sorted.sort_unstable();
    sorted.get(sorted.len() / 2).map_or(KilowattHourRate::ZERO, |median| median.0.into())
}

pub fn build_sessions_table(
    schedule: &Schedule,
    grid: TimeGrid,
    prices: &[KilowattHourRate],
) -> Table {
    let threshold = median_rate(prices);

    let mut table = new_table();
    table.set_header(vec!["Bus", "Start", "End", "Grid", "Mean rate", "Cost"]);
    for session in schedule.sessions(grid) {
        let cost: Cost = schedule
            .slots
            .iter()
            .filter(|record| {
                record.bus == session.bus && (session.start..session.end).contains(&record.slot)
            })
            .map(|record| record.grid_power * grid.slot_duration() * prices[record.slot])
            .sum();
        let mean_rate = if session.grid_energy.0 > 0.0 {
            KilowattHourRate::from(cost.0 / session.grid_energy.0)
        } else {
            KilowattHourRate::ZERO
        };
        table.add_row(vec![
            Cell::new(&session.bus),
            Cell::new(grid.label(session.start)),
            Cell::new(grid.label(session.end - 1)).add_attribute(Attribute::Dim),
            Cell::new(session.grid_energy).set_alignment(CellAlignment::Right),
            Cell::new(mean_rate)
                .set_alignment(CellAlignment::Right)
                .fg(if mean_rate > threshold { Color::Red } else { Color::Green }),
            Cell::new(cost).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn build_assignments_table(schedule: &Schedule) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Day", "Route", "Bus"]);
    let trips: BTreeSet<(usize, &str)> =
        schedule.assignments.iter().map(|record| (record.day, record.route.as_str())).collect();
    for (day, route) in trips {
        let bus = schedule.route_bus(day, route);
        table.add_row(vec![
            Cell::new(day + 1).add_attribute(Attribute::Dim),
            Cell::new(route),
            match bus {
                Some(bus) => Cell::new(bus).add_attribute(Attribute::Bold),
                None => Cell::new("unassigned").fg(Color::Red),
            },
        ]);
    }
    table
}

pub fn build_summary_table(plan: &Plan) -> Table {
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Status"),
        Cell::new(plan.status).fg(if plan.status.is_optimal() { Color::Green } else { Color::Red }),
    ]);
    if let Some(message) = &plan.message {
        table.add_row(vec![Cell::new("Message"), Cell::new(message).add_attribute(Attribute::Dim)]);
    }
    if let Some(summary) = &plan.summary {
        table
            .add_row(vec![Cell::new("Case"), Cell::new(&summary.case_id)])
            .add_row(vec![Cell::new("Buses"), Cell::new(summary.num_buses)])
            .add_row(vec![Cell::new("Chargers"), Cell::new(summary.num_chargers)])
            .add_row(vec![Cell::new("Grid cost"), Cell::new(summary.objective_value)])
            .add_row(vec![
                Cell::new("Solve time"),
                Cell::new(format!("{:.1} s", summary.solve_time_seconds)),
            ]);
    }
    table
}

pub fn build_log_table(summaries: &[RunSummary]) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Timestamp", "Case", "Buses", "Battery", "Chargers", "Power", "Eff", "Grid", "Cost", "Time",
    ]);
    for summary in summaries {
        table.add_row(vec![
            Cell::new(summary.timestamp.format("%b %d %H:%M")).add_attribute(Attribute::Dim),
            Cell::new(&summary.case_id),
            Cell::new(summary.num_buses).set_alignment(CellAlignment::Right),
            Cell::new(summary.eb_max_kwh).set_alignment(CellAlignment::Right),
            Cell::new(summary.num_chargers).set_alignment(CellAlignment::Right),
            Cell::new(summary.charger_power).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", summary.charger_eff)).set_alignment(CellAlignment::Right),
            Cell::new(summary.grid_max_power).set_alignment(CellAlignment::Right),
            Cell::new(summary.objective_value).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.1} s", summary.solve_time_seconds))
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Dim),
        ]);
    }
    table
}
