//! Export shaping: flat human-labeled key/value rows plus a suggested
//! filename, rendered as CSV or passed through as JSON.

use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Defaults to CSV; anything other than "json" or "csv" is rejected
    pub fn parse(s: Option<&str>) -> Result<Self, crate::error::ApiError> {
        match s {
            None | Some("csv") => Ok(ExportFormat::Csv),
            Some("json") => Ok(ExportFormat::Json),
            Some(other) => Err(crate::error::ApiError::validation(
                format!("unsupported export format: {}", other),
                None,
            )),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportRow {
    pub label: String,
    pub value: String,
}

impl ExportRow {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A finished export: rows plus the filename the client should save under.
#[derive(Debug, Clone, Serialize)]
pub struct Export {
    pub filename: String,
    pub format: ExportFormat,
    pub rows: Vec<ExportRow>,
    /// CSV rendering of `rows`; only present for CSV exports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv: Option<String>,
}

impl Export {
    pub fn build(resource: &str, format: ExportFormat, rows: Vec<ExportRow>) -> Self {
        let filename = format!(
            "{}-export-{}.{}",
            resource,
            Utc::now().format("%Y%m%d"),
            format.extension()
        );
        let csv = match format {
            ExportFormat::Csv => Some(render_csv(&rows)),
            ExportFormat::Json => None,
        };
        Self {
            filename,
            format,
            rows,
            csv,
        }
    }
}

fn render_csv(rows: &[ExportRow]) -> String {
    let mut out = String::from("label,value\n");
    for row in rows {
        out.push_str(&csv_escape(&row.label));
        out.push(',');
        out.push_str(&csv_escape(&row.value));
        out.push('\n');
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_carries_resource_and_extension() {
        let export = Export::build("audits", ExportFormat::Csv, vec![]);
        assert!(export.filename.starts_with("audits-export-"));
        assert!(export.filename.ends_with(".csv"));
    }

    #[test]
    fn csv_rendering_escapes_embedded_commas_and_quotes() {
        let rows = vec![
            ExportRow::new("Bank Name", "Bank Rakyat, Cab. \"Kota\""),
            ExportRow::new("Status", "active"),
        ];
        let export = Export::build("bank-integrations", ExportFormat::Csv, rows);
        let csv = export.csv.unwrap();
        assert!(csv.contains("\"Bank Rakyat, Cab. \"\"Kota\"\"\""));
        assert!(csv.lines().next() == Some("label,value"));
    }

    #[test]
    fn json_export_has_no_csv_body() {
        let export = Export::build("audits", ExportFormat::Json, vec![ExportRow::new("a", "b")]);
        assert!(export.csv.is_none());
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(ExportFormat::parse(Some("xlsx")).is_err());
        assert_eq!(ExportFormat::parse(None).unwrap(), ExportFormat::Csv);
    }
}
