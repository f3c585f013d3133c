//! CSV rendering of a statistics bundle.
//!
//! The file holds two tables back to back: a `metric,value` summary, then
//! a header row and one row per exercise. Missing values are written as
//! `NO DATA` so they cannot be mistaken for a real zero.

use crate::stats::StatsBundle;
use crate::Result;
use chrono::Duration;
use std::io::Write;
use std::path::Path;

/// Placeholder for metrics without enough history
pub const NO_DATA: &str = "NO DATA";

/// A row in the per-exercise table
#[derive(Debug, serde::Serialize)]
struct ExerciseRow<'a> {
    exercise: &'a str,
    total_sets: usize,
    avg_sets_per_training: String,
    avg_weight: String,
    avg_reps: String,
}

fn number(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => NO_DATA.to_string(),
    }
}

fn hms(d: Duration) -> String {
    // A clock that stepped backwards must not produce "-1:-5:-3"
    let secs = d.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Write the report to any writer
pub fn write_csv<W: Write>(bundle: &StatsBundle, writer: W) -> Result<()> {
    // Headers are written by hand for each table
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(writer);

    let (first, last) = match bundle.date_range {
        Some((first, last)) => (
            first.format("%Y-%m-%d").to_string(),
            last.format("%Y-%m-%d").to_string(),
        ),
        None => (NO_DATA.to_string(), NO_DATA.to_string()),
    };

    let summary = [
        ("trainings", bundle.trainings_count.to_string()),
        ("first_training", first),
        ("last_training", last),
        ("average_training_duration", hms(bundle.average_training_duration)),
        ("total_training_time", hms(bundle.total_training_time)),
        ("longest_streak_days", bundle.longest_streak_days.to_string()),
        ("total_sets", bundle.total_sets.to_string()),
        (
            "average_exercises_per_training",
            number(bundle.average_exercises_per_training),
        ),
        ("average_sets_per_training", number(bundle.average_sets_per_training)),
        (
            "most_popular_exercise",
            bundle
                .most_popular_exercise
                .clone()
                .unwrap_or_else(|| NO_DATA.to_string()),
        ),
        (
            "least_popular_exercise",
            bundle
                .least_popular_exercise
                .clone()
                .unwrap_or_else(|| NO_DATA.to_string()),
        ),
    ];

    csv.write_record(["metric", "value"])?;
    for (metric, value) in &summary {
        csv.write_record([*metric, value.as_str()])?;
    }

    csv.write_record([
        "exercise",
        "total_sets",
        "avg_sets_per_training",
        "avg_weight",
        "avg_reps",
    ])?;
    for stats in &bundle.exercises {
        csv.serialize(ExerciseRow {
            exercise: &stats.exercise,
            total_sets: stats.total_sets,
            avg_sets_per_training: number(stats.average_sets_per_training),
            avg_weight: number(stats.average_weight),
            avg_reps: number(stats.average_reps),
        })?;
    }

    csv.flush()?;
    Ok(())
}

/// Write the report to a file, creating parent directories as needed
pub fn write_csv_file(bundle: &StatsBundle, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(path)?;
    write_csv(bundle, std::io::BufWriter::new(&file))?;
    file.sync_all()?;

    tracing::info!("Wrote stats report to {:?}", path);
    Ok(())
}
