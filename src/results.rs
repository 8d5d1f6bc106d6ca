//! Append-only log of the run summaries.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub case_id: String,
    pub num_buses: usize,
    pub eb_max_kwh: KilowattHours,
    pub num_chargers: usize,
    pub charger_power: Kilowatts,
    pub charger_eff: f64,

    /// Compact `id:departure-arrival:energy` listing of the routes.
    pub route_summary: String,

    pub grid_max_power: Kilowatts,

    /// Total grid energy cost.
    pub objective_value: Cost,

    pub solve_time_seconds: f64,
    pub timestamp: DateTime<Local>,
}

impl RunSummary {
    /// Case identifier derived from the run start time.
    ///
    /// For example, `busbar_2025-03-01_06-15-00.123`.
    pub fn case_id_at(timestamp: DateTime<Local>) -> String {
        format!("busbar_{}", timestamp.format("%Y-%m-%d_%H-%M-%S%.3f"))
    }
}

pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the summary as a single line, holding an exclusive lock on the file.
    #[instrument(skip_all, fields(path = %self.path.display(), case_id = %summary.case_id))]
    pub fn append(&self, summary: &RunSummary) -> Result {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create `{}`", parent.display()))?;
        }
        let mut line = serde_json::to_string(summary)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open `{}`", self.path.display()))?;
        file.lock().context("failed to lock the result log")?;
        file.write_all(line.as_bytes()).context("failed to append the summary")?;
        file.flush()?;
        file.unlock().context("failed to unlock the result log")?;
        info!("appended");
        Ok(())
    }

    /// Read all the summaries in the order they were appended.
    ///
    /// A missing log reads as empty.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn read_all(&self) -> Result<Vec<RunSummary>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                warn!("the result log does not exist yet");
                return Ok(Vec::new());
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to open `{}`", self.path.display()));
            }
        };
        file.lock_shared().context("failed to lock the result log")?;
        let summaries = BufReader::new(&file)
            .lines()
            .enumerate()
            .filter(|(_, line)| !matches!(line, Ok(line) if line.trim().is_empty()))
            .map(|(i, line)| {
                serde_json::from_str(&line?).with_context(|| format!("malformed line #{}", i + 1))
            })
            .collect::<Result<Vec<RunSummary>>>()?;
        file.unlock().context("failed to unlock the result log")?;
        debug!(n_summaries = summaries.len(), "read");
        Ok(summaries)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    /// Fresh path in the temporary directory, unique per test.
    pub fn temporary_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir()
            .join(format!("busbar-{name}-{}-{nanos}", std::process::id()))
            .join("results.jsonl")
    }

    fn summary(case_id: &str) -> RunSummary {
        RunSummary {
            case_id: case_id.to_string(),
            num_buses: 1,
            eb_max_kwh: KilowattHours::from(100.0),
            num_chargers: 1,
            charger_power: Kilowatts::from(50.0),
            charger_eff: 0.9,
            route_summary: "77:21-61:30.0kWh".to_string(),
            grid_max_power: Kilowatts::from(50.0),
            objective_value: Cost::from(3.333),
            solve_time_seconds: 0.25,
            timestamp: Local::now(),
        }
    }

    #[test]
    fn test_append_preserves_earlier_rows() -> Result {
        let log = ResultLog::new(temporary_path("append"));
        assert!(log.read_all()?.is_empty());

        log.append(&summary("first"))?;
        let before = fs::read_to_string(log.path())?;
        log.append(&summary("second"))?;
        let after = fs::read_to_string(log.path())?;

        assert!(after.starts_with(&before));
        let case_ids: Vec<_> =
            log.read_all()?.into_iter().map(|summary| summary.case_id).collect();
        assert_eq!(case_ids, ["first", "second"]);
        Ok(())
    }

    #[test]
    fn test_camel_case_columns() -> Result {
        let record = serde_json::to_value(summary("columns"))?;
        for column in [
            "caseId",
            "numBuses",
            "ebMaxKwh",
            "numChargers",
            "chargerPower",
            "chargerEff",
            "routeSummary",
            "gridMaxPower",
            "objectiveValue",
            "solveTimeSeconds",
            "timestamp",
        ] {
            assert!(record.get(column).is_some(), "missing `{column}`");
        }
        Ok(())
    }

    #[test]
    fn test_case_id_format() {
        let timestamp = DateTime::parse_from_rfc3339("2025-03-01T06:15:00.123+00:00")
            .unwrap()
            .with_timezone(&Local);
        let case_id = RunSummary::case_id_at(timestamp);
        assert!(case_id.starts_with("busbar_"));
        assert!(case_id.ends_with(".123"));
    }
}
