use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{
    core::solver::SolveSettings,
    quantity::{energy::KilowattHours, power::Kilowatts, rate::KilowattHourRate},
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: build and solve the charging model, then record the results.
    #[clap(name = "optimize")]
    Optimize(Box<OptimizeArgs>),

    /// Print the previous run summaries.
    #[clap(name = "log")]
    Log(LogArgs),
}

/// Fleet-wide charging configuration.
#[derive(Copy, Clone, Parser)]
pub struct ChargingArgs {
    /// Usable battery capacity of every bus.
    #[clap(long = "eb-max-kwh", default_value = "440", env = "EB_MAX_KWH")]
    pub eb_max: KilowattHours,

    /// Maximum power of a single charger.
    #[clap(long = "charger-power-kw", default_value = "150", env = "CHARGER_POWER_KW")]
    pub charger_power: Kilowatts,

    /// Share of the charger power that ends up in the battery.
    #[clap(long = "charger-efficiency", default_value = "0.9", env = "CHARGER_EFFICIENCY")]
    pub charger_efficiency: f64,

    /// Depot grid connection capacity.
    #[clap(long = "grid-max-power-kw", default_value = "300", env = "GRID_MAX_POWER_KW")]
    pub grid_max_power: Kilowatts,
}

#[derive(Copy, Clone, Parser)]
pub struct PlanningArgs {
    /// Number of days in the horizon.
    #[clap(long, default_value = "2", env = "DAYS")]
    pub days: usize,

    /// Maximum number of charging session starts and stops per bus and day.
    #[clap(long, default_value = "2", env = "MAX_TRANSITIONS_PER_DAY")]
    pub max_transitions_per_day: usize,

    /// Minimal length of a charging session in slots.
    #[clap(long, default_value = "6", env = "MIN_SESSION_SLOTS")]
    pub min_session_slots: usize,

    /// Energy in kilowatt-hours consumed per mile, used for the routes given by their distance.
    #[clap(
        long = "consumption-kwh-per-mile",
        default_value = "2.0",
        env = "CONSUMPTION_KWH_PER_MILE"
    )]
    pub consumption_per_mile: f64,

    #[clap(flatten)]
    pub solver: SolverArgs,
}

#[derive(Copy, Clone, Parser)]
pub struct SolverArgs {
    /// Relative optimality gap at which the solver may stop.
    #[clap(long, default_value = "0.005", env = "OPTIMALITY_GAP")]
    pub optimality_gap: f64,

    /// Wall-clock limit for a single solve.
    #[clap(long, default_value = "5m", env = "TIME_LIMIT")]
    pub time_limit: humantime::Duration,
}

impl From<SolverArgs> for SolveSettings {
    fn from(args: SolverArgs) -> Self {
        Self { optimality_gap: args.optimality_gap, time_limit: args.time_limit.into() }
    }
}

/// Built-in day-ahead time-of-use tariff.
#[derive(Copy, Clone, Parser)]
pub struct TariffArgs {
    /// Price between 21:00 and 07:00.
    #[clap(long = "off-peak-rate", default_value = "0.12", env = "OFF_PEAK_RATE")]
    pub off_peak: KilowattHourRate,

    /// Price between 07:00 and 16:00.
    #[clap(long = "mid-peak-rate", default_value = "0.18", env = "MID_PEAK_RATE")]
    pub mid_peak: KilowattHourRate,

    /// Price between 16:00 and 21:00.
    #[clap(long = "peak-rate", default_value = "0.32", env = "PEAK_RATE")]
    pub peak: KilowattHourRate,
}

#[derive(Parser)]
pub struct OptimizeArgs {
    /// Fleet snapshot in TOML: buses, routes, chargers.
    #[clap(long, env = "SNAPSHOT_PATH", default_value = "snapshot.toml")]
    pub snapshot: PathBuf,

    /// Do not write the schedules and do not append to the result log (dry run).
    #[clap(long)]
    pub scout: bool,

    #[clap(long, env = "OUTPUT_DIR", default_value = "outputs")]
    pub output_dir: PathBuf,

    #[clap(flatten)]
    pub result_log: ResultLogArgs,

    #[clap(flatten)]
    pub charging: ChargingArgs,

    #[clap(flatten)]
    pub planning: PlanningArgs,

    #[clap(flatten)]
    pub tariff: TariffArgs,
}

#[derive(Parser)]
pub struct ResultLogArgs {
    /// Append-only run summary log, one JSON record per line.
    #[clap(long = "result-log", env = "RESULT_LOG_PATH", default_value = "outputs/results.jsonl")]
    pub path: PathBuf,
}

#[derive(Parser)]
pub struct LogArgs {
    #[clap(flatten)]
    pub result_log: ResultLogArgs,
}
