//! # Energy Report Builder
//!
//! A library for turning hand-maintained utility consumption spreadsheets into
//! normalized monthly series for two fiscal years, with a short trend-based
//! projection and the roll-up numbers a dashboard needs.
//!
//! ## Core Concepts
//!
//! - **Series Store**: Per building and per tenant, twelve months of previous-year
//!   and current-year values for every metric type and energy source
//! - **Last actual month**: The last month with a positive current-year value; later
//!   months carry no current-year value at all
//! - **Projection**: Previous-year value times the recent year-over-year ratio,
//!   uplifted in peak months when the trend is rising
//! - **Summary**: Year-to-date totals, YoY percent, next-month prediction, source mix
//!   and growth ranking for one selection
//!
//! ## Example
//!
//! ```rust,ignore
//! use energy_report_builder::*;
//!
//! let bytes = std::fs::read("energy.xlsx")?;
//! let config = ReportConfig::default();
//! let report = process_workbook(&bytes, &config)?;
//!
//! let selection = Selection::all(&report, EntityKind::Building);
//! let view = build_view(&report, &selection, &config);
//! println!(
//!     "{} YTD: {} ({:+.1}%)",
//!     view.summary.unit,
//!     format_value(Some(view.summary.total_current_actual), view.summary.metric),
//!     view.summary.yoy_percent
//! );
//! ```

pub mod aggregator;
pub mod classifier;
pub mod error;
pub mod export;
pub mod forecast;
pub mod ingestion;
pub mod schema;
pub mod seasonality;
pub mod session;
pub mod sheet;
pub mod store;
pub mod summary;
pub mod utils;

pub use aggregator::{aggregate, effective_metric, AggregatedSeries};
pub use classifier::{classify_metric_type, classify_source, EntityResolver};
pub use error::{EnergyReportError, Result};
pub use export::{ExportRow, ExportTable};
pub use forecast::Forecaster;
pub use ingestion::{ColumnMap, ParseStats, ParsedReport, TabularParser};
pub use schema::*;
pub use seasonality::SeasonalProfile;
pub use session::{LoadOutcome, LoadTicket, Selection, Session};
pub use sheet::{Cell, SheetGrid};
pub use store::{EntitySeries, SeriesStore};
pub use summary::{summarize, Breakdown, EntityGrowth, LatestMonth, NextMonth, SourceShare, Summary};
pub use utils::*;

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Everything the presentation layer draws for one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportView {
    pub selection: Selection,
    /// Aggregated and projected series.
    pub series: AggregatedSeries,
    pub summary: Summary,
    /// Present only for the `All` source filter.
    pub portfolio_mix: Option<Vec<SourceShare>>,
    pub growth_ranking: Vec<EntityGrowth>,
}

pub struct EnergyReportProcessor;

impl EnergyReportProcessor {
    pub fn process(bytes: &[u8], config: &ReportConfig) -> Result<ParsedReport> {
        config.validate()?;
        debug!(
            "Processing {} bytes in {:?} mode (header scan {} rows)",
            bytes.len(),
            config.parse_mode,
            config.header_scan_rows
        );

        let grid = SheetGrid::from_bytes(bytes)?;
        Self::process_grid(&grid, config)
    }

    pub fn process_grid(grid: &SheetGrid, config: &ReportConfig) -> Result<ParsedReport> {
        config.validate()?;
        let report = TabularParser::new(config).parse_grid(grid)?;

        if report.stats.skipped_rows() > 0 || report.stats.coerced_cells > 0 {
            info!(
                "Absorbed input problems: {} rows skipped (year {}, entity {}, category {}), {} cells read as 0",
                report.stats.skipped_rows(),
                report.stats.skipped_year,
                report.stats.skipped_entity,
                report.stats.skipped_category,
                report.stats.coerced_cells
            );
        }

        Ok(report)
    }
}

pub fn process_workbook(bytes: &[u8], config: &ReportConfig) -> Result<ParsedReport> {
    EnergyReportProcessor::process(bytes, config)
}

/// Aggregates, projects and summarizes the selected entities.
pub fn build_view(report: &ParsedReport, selection: &Selection, config: &ReportConfig) -> ReportView {
    let selected = selection.entity_list();
    let forecaster = Forecaster::from_config(config);

    let aggregated = aggregate(
        &report.store,
        selection.view,
        &selected,
        selection.metric,
        selection.source,
        config.usage_all_policy,
    );
    let series = forecaster.project(&aggregated);
    let summary = summarize(&series, report.store.years);

    let breakdown = Breakdown {
        store: &report.store,
        kind: selection.view,
        selected: &selected,
        metric: selection.metric,
        usage_policy: config.usage_all_policy,
        forecaster: &forecaster,
    };

    ReportView {
        selection: selection.clone(),
        portfolio_mix: breakdown.portfolio_mix(selection.source),
        growth_ranking: breakdown.growth_ranking(selection.source),
        series,
        summary,
    }
}
