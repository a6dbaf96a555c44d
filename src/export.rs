//! CSV / JSON export of a record set.
//!
//! CSV: an unquoted header row, then one row per record with every field
//! double-quoted and embedded quotes doubled. Rows are joined with `\n`.
//! JSON: the records themselves, pretty-printed. PDF produces no file.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported export format: {0}")]
pub struct UnsupportedFormat(pub String);

impl FromStr for ExportFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pdf" => Ok(Self::Pdf),
            _ => Err(UnsupportedFormat(s.to_string())),
        }
    }
}

/// A record that knows its CSV columns.
pub trait CsvRow {
    const HEADERS: &'static [&'static str];

    /// Field values in `HEADERS` order.
    fn csv_fields(&self) -> Vec<String>;
}

/// A downloadable export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    File(ExportFile),
    /// Nothing to download; show this message instead.
    Notice(String),
}

pub const PDF_NOTICE: &str = "PDF export will be implemented with a reporting library.";

pub fn quote_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

pub fn to_csv<T: CsvRow>(records: &[T]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(T::HEADERS.join(","));
    for record in records {
        let row: Vec<String> = record
            .csv_fields()
            .iter()
            .map(|f| quote_field(f))
            .collect();
        lines.push(row.join(","));
    }
    lines.join("\n")
}

pub fn to_json<T: Serialize>(records: &[T]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(records)
}

/// Serialize `records` in `format` under `<stem>.<ext>`.
pub fn export_records<T: CsvRow + Serialize>(
    records: &[T],
    format: ExportFormat,
    stem: &str,
) -> Result<ExportOutcome, serde_json::Error> {
    let outcome = match format {
        ExportFormat::Csv => ExportOutcome::File(ExportFile {
            file_name: format!("{stem}.csv"),
            content_type: "text/csv",
            body: to_csv(records),
        }),
        ExportFormat::Json => ExportOutcome::File(ExportFile {
            file_name: format!("{stem}.json"),
            content_type: "application/json",
            body: to_json(records)?,
        }),
        ExportFormat::Pdf => ExportOutcome::Notice(PDF_NOTICE.to_string()),
    };
    tracing::info!(stem, format = format.as_str(), count = records.len(), "Export prepared");
    Ok(outcome)
}

/// Format a boolean the way the tables do.
pub fn yes_no(value: bool) -> String {
    if value { "Yes" } else { "No" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde::Deserialize;

    use crate::activity_log::ActivityLogScreen;
    use crate::allocation::AllocationScreen;
    use crate::analysis::{
        AdverseEventScreen, CoverageGapScreen, DoseScheduleScreen, GeographicScreen,
        UtilizationScreen,
    };
    use crate::campaigns::CampaignScreen;
    use crate::generator::MockRng;
    use crate::inventory::InventoryScreen;
    use crate::patients::PatientScreen;
    use crate::pipeline::Screen;
    use crate::vaccinations::VaccinationScreen;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Line {
        name: String,
        qty: u32,
    }

    impl CsvRow for Line {
        const HEADERS: &'static [&'static str] = &["Name", "Quantity"];

        fn csv_fields(&self) -> Vec<String> {
            vec![self.name.clone(), self.qty.to_string()]
        }
    }

    fn lines() -> Vec<Line> {
        vec![
            Line { name: "BCG".into(), qty: 10 },
            Line { name: "Say \"hi\", ok".into(), qty: 2 },
        ]
    }

    #[test]
    fn csv_quotes_every_field() {
        let csv = to_csv(&lines());
        let rows: Vec<&str> = csv.split('\n').collect();
        assert_eq!(rows[0], "Name,Quantity");
        assert_eq!(rows[1], "\"BCG\",\"10\"");
        assert_eq!(rows[2], "\"Say \"\"hi\"\", ok\",\"2\"");
    }

    #[test]
    fn csv_of_empty_set_is_header_only() {
        let empty: Vec<Line> = Vec::new();
        assert_eq!(to_csv(&empty), "Name,Quantity");
    }

    fn assert_json_round_trip<S: Screen>()
    where
        S::Record: PartialEq + std::fmt::Debug,
    {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let records = S::generate(&mut MockRng::seeded(3), today);
        assert!(!records.is_empty(), "{} generated nothing", S::NAME);

        let outcome = export_records(&records, ExportFormat::Json, S::NAME).unwrap();
        let ExportOutcome::File(file) = outcome else {
            panic!("expected a file");
        };
        assert_eq!(file.file_name, format!("{}.json", S::NAME));
        assert_eq!(file.content_type, "application/json");
        let back: Vec<S::Record> = serde_json::from_str(&file.body).unwrap();
        assert_eq!(back, records, "{} changed through JSON", S::NAME);
    }

    #[test]
    fn json_export_parses_back_for_every_screen() {
        assert_json_round_trip::<ActivityLogScreen>();
        assert_json_round_trip::<AdverseEventScreen>();
        assert_json_round_trip::<AllocationScreen>();
        assert_json_round_trip::<CampaignScreen>();
        assert_json_round_trip::<CoverageGapScreen>();
        assert_json_round_trip::<DoseScheduleScreen>();
        assert_json_round_trip::<GeographicScreen>();
        assert_json_round_trip::<InventoryScreen>();
        assert_json_round_trip::<PatientScreen>();
        assert_json_round_trip::<UtilizationScreen>();
        assert_json_round_trip::<VaccinationScreen>();
    }

    #[test]
    fn pdf_is_a_notice() {
        let outcome = export_records(&lines(), ExportFormat::Pdf, "lines").unwrap();
        assert!(matches!(outcome, ExportOutcome::Notice(_)));
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(
            "xlsx".parse::<ExportFormat>(),
            Err(UnsupportedFormat("xlsx".into()))
        );
        assert_eq!(
            UnsupportedFormat("xlsx".into()).to_string(),
            "Unsupported export format: xlsx"
        );
    }
}
