//! JSON report files, one per genre per day.

use crate::models::AggregationReport;
use chrono::{Local, NaiveDate};
use std::error::Error;
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of the report file for `genre` on `date`.
pub fn report_path(json_output_dir: &str, date: NaiveDate, genre: &str) -> String {
    format!(
        "{}/{}/{}.json",
        json_output_dir.trim_end_matches('/'),
        date,
        genre
    )
}

/// Write an [`AggregationReport`] to `{json_output_dir}/{date}/{genre}.json`,
/// replacing any earlier report for the same day.
///
/// # Arguments
///
/// * `report` - A successful chart report; its genre names the file
/// * `json_output_dir` - Root directory for the dated report folders
///
/// # Returns
///
/// The path of the written file.
///
/// # Errors
///
/// Fails without touching the filesystem when `report.ok` is false, since the
/// genre of a rejected request is unvalidated caller input. Also fails when
/// the dated directory cannot be created or the file cannot be written.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir, genre = %report.genre))]
pub async fn write_report(
    report: &AggregationReport,
    json_output_dir: &str,
) -> Result<String, Box<dyn Error>> {
    if !report.ok {
        return Err(format!("refusing to write failed report for genre `{}`", report.genre).into());
    }
    let json = serde_json::to_string_pretty(report)?;
    let date = Local::now().date_naive();
    let path = report_path(json_output_dir, date, &report.genre);

    let full_json_dir = format!("{}/{}", json_output_dir.trim_end_matches('/'), date);
    info!(%full_json_dir, "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(%full_json_dir, error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    fs::write(&path, json).await?;
    info!(path = %path, count = report.count, "Wrote chart report");
    Ok(path)
}
