use crate::aggregator::AggregatedSeries;
use crate::error::Result;
use crate::summary::Summary;
use crate::utils::MONTH_LABELS;
use crate::ReportView;
use serde::{Deserialize, Serialize};
use std::io::Write;

pub const EXPORT_CATEGORY_LABEL: &str = "구분";
pub const EXPORT_TOTAL_LABEL: &str = "합계";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub label: String,
    /// January through December; `None` where there is nothing to show.
    pub values: Vec<Option<f64>>,
    pub total: f64,
}

/// Month-by-year table handed to a spreadsheet writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTable {
    pub header: Vec<String>,
    pub rows: Vec<ExportRow>,
}

impl ExportTable {
    pub fn new(series: &AggregatedSeries, summary: &Summary) -> Self {
        let header = std::iter::once(EXPORT_CATEGORY_LABEL.to_string())
            .chain(MONTH_LABELS.iter().map(|m| m.to_string()))
            .chain(std::iter::once(EXPORT_TOTAL_LABEL.to_string()))
            .collect();

        let previous = ExportRow {
            label: format!("{}년", summary.years.previous_year),
            values: series
                .months
                .iter()
                .map(|c| Some(c.previous_year_value))
                .collect(),
            total: summary.total_previous_ytd,
        };

        let current = ExportRow {
            label: format!("{}년", summary.years.current_year),
            values: series
                .months
                .iter()
                .map(|c| c.current_year_value.or(c.projected_value))
                .collect(),
            total: summary.total_projected_full_series,
        };

        Self {
            header,
            rows: vec![previous, current],
        }
    }

    pub fn from_view(view: &ReportView) -> Self {
        Self::new(&view.series, &view.summary)
    }

    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.header)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(row.values.len() + 2);
            record.push(row.label.clone());
            record.extend(
                row.values
                    .iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
            );
            record.push(row.total.to_string());
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.to_csv_writer(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
