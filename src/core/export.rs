//! Report output: JSON envelope, CSV of matched records, or both zipped together.

use crate::domain::model::{AnalysisReport, RestrictionRecord};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use zip::write::FileOptions;
use zip::ZipWriter;

const CSV_HEADER: [&str; 7] = [
    "category",
    "zone_type",
    "name",
    "registry_number",
    "decision",
    "full_name",
    "attributes",
];

#[derive(Debug, Serialize)]
pub struct ReportEnvelope<'a> {
    pub generated_at: DateTime<Utc>,
    pub tool_version: &'static str,
    pub report: &'a AnalysisReport,
}

impl<'a> ReportEnvelope<'a> {
    pub fn new(report: &'a AnalysisReport) -> Self {
        Self {
            generated_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION"),
            report,
        }
    }
}

pub fn report_json(report: &AnalysisReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(&ReportEnvelope::new(report))?)
}

fn matched_records(report: &AnalysisReport) -> impl Iterator<Item = (&'static str, &RestrictionRecord)> {
    report
        .capital_objects
        .iter()
        .map(|r| ("capital_object", r))
        .chain(report.planning_project.iter().map(|r| ("planning_project", r)))
        .chain(report.restrictions.iter().map(|r| ("restriction", r)))
}

/// One row per matched record; the attribute payload goes out as a JSON object.
pub fn write_records_csv<W: Write>(report: &AnalysisReport, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER)?;

    for (category, record) in matched_records(report) {
        let decision = if record.decision.is_empty() {
            String::new()
        } else {
            record.decision.formatted()
        };
        let attributes = if record.attributes.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&record.attributes)?
        };

        csv.write_record([
            category,
            record.zone_type.as_str(),
            record.name.as_deref().unwrap_or(""),
            record.registry_number.as_deref().unwrap_or(""),
            decision.as_str(),
            record.full_name().as_str(),
            attributes.as_str(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

pub fn records_csv(report: &AnalysisReport) -> Result<String> {
    let mut buffer = Vec::new();
    write_records_csv(report, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// ZIP with `report.json`, `records.csv` and `summary.txt`.
pub fn bundle(report: &AnalysisReport) -> Result<Vec<u8>> {
    let json = report_json(report)?;
    let csv = records_csv(report)?;
    let summary = report.summary();

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    zip.start_file::<_, ()>("report.json", FileOptions::default())?;
    zip.write_all(json.as_bytes())?;

    zip.start_file::<_, ()>("records.csv", FileOptions::default())?;
    zip.write_all(csv.as_bytes())?;

    zip.start_file::<_, ()>("summary.txt", FileOptions::default())?;
    zip.write_all(summary.as_bytes())?;

    let cursor = zip.finish()?;
    let data = cursor.into_inner();
    tracing::debug!("Report bundle is {} bytes", data.len());
    Ok(data)
}
