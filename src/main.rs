#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod cli;
mod core;
mod fleet;
mod prelude;
mod pricing;
mod quantity;
mod results;
mod tables;
mod timetable;

use clap::{Parser, crate_version};

use crate::{
    cli::{Args, Command, LogArgs, OptimizeArgs},
    core::{planner::Planner, solver::MicroLp},
    fleet::Snapshot,
    prelude::*,
    results::ResultLog,
    tables::{build_assignments_table, build_log_table, build_sessions_table, build_summary_table},
};

fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    match Args::parse().command {
        Command::Optimize(args) => optimize(&args)?,
        Command::Log(args) => log(&args)?,
    }

    info!("done!");
    Ok(())
}

fn optimize(args: &OptimizeArgs) -> Result {
    let snapshot = Snapshot::read_from(&args.snapshot)?;
    let plan = Planner::builder()
        .snapshot(&snapshot)
        .charging(args.charging)
        .planning(args.planning)
        .tariff(args.tariff)
        .solver(&MicroLp)
        .plan()?;

    println!("{}", build_summary_table(&plan));
    if let Some(schedule) = &plan.schedule {
        println!("{}", build_sessions_table(schedule, plan.grid, &plan.prices));
        println!("{}", build_assignments_table(schedule));
        if !args.scout {
            schedule.write_to(&args.output_dir, &plan.case_id)?;
        }
    }
    if !args.scout {
        plan.record(&ResultLog::new(&args.result_log.path))?;
    }
    Ok(())
}

fn log(args: &LogArgs) -> Result {
    let result_log = ResultLog::new(&args.result_log.path);
    let summaries = result_log.read_all()?;
    info!(path = %result_log.path().display(), n_summaries = summaries.len(), "loaded");
    println!("{}", build_log_table(&summaries));
    Ok(())
}
