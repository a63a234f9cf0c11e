use crate::classifier::{
    classify_metric_type, classify_row_metric, classify_source, EntityResolver,
};
use crate::error::{EnergyReportError, Result};
use crate::schema::{EntityKind, FiscalYearPair, MetricType, ParseMode, ReportConfig, SourceType, YearKey};
use crate::sheet::SheetGrid;
use crate::store::SeriesStore;
use crate::utils::{extract_years, short_year_marker, ENGLISH_MONTH_LABELS, MONTH_LABELS};
use chrono::Datelike;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const BUILDING_CATEGORY: &str = "건물별 에너지실적";
const TENANT_CATEGORY: &str = "입주사별 에너지실적";
const TENANT_MARKER: &str = "입주사";

/// Month block start used when neither "1월" nor a unit column is present.
const DEFAULT_MONTH_START: usize = 9;
/// Loose mode reads the year from column B when no year header exists.
const DEFAULT_YEAR_COLUMN: usize = 1;
/// Leading cells that carry row metadata in loose mode.
const META_CELLS: usize = 10;
/// Cells scanned for a tenant code in loose mode.
const TENANT_SCAN: std::ops::Range<usize> = 4..12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnMap {
    pub year: Option<usize>,
    pub category: Option<usize>,
    pub detail: Option<usize>,
    pub source: Option<usize>,
    pub building: Option<usize>,
    pub tenant: Option<usize>,
    pub usage_location: Option<usize>,
    pub unit: Option<usize>,
    pub month_start: usize,
}

impl ColumnMap {
    pub fn from_header(header: &[String]) -> Self {
        let find = |labels: &[&str]| header.iter().position(|c| labels.contains(&c.as_str()));

        let unit = find(&["단위"]);
        let month_start = find(&[MONTH_LABELS[0], ENGLISH_MONTH_LABELS[0]])
            .or_else(|| unit.map(|u| u + 1))
            .unwrap_or_else(|| {
                warn!(
                    "No month or unit column in header, assuming months start at column {}",
                    DEFAULT_MONTH_START
                );
                DEFAULT_MONTH_START
            });

        Self {
            year: find(&["년도", "Year"]),
            category: find(&["구분"]),
            detail: find(&["상세구분"]),
            source: find(&["에너지원"]),
            building: find(&["건물"]),
            tenant: find(&["입주사"]),
            usage_location: find(&["사용처"]),
            unit,
            month_start,
        }
    }
}

/// Counters for rows and cells the parser absorbed instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    pub data_rows: usize,
    pub accepted_rows: usize,
    pub skipped_year: usize,
    pub skipped_entity: usize,
    pub skipped_category: usize,
    pub coerced_cells: usize,
}

impl ParseStats {
    pub fn skipped_rows(&self) -> usize {
        self.skipped_year + self.skipped_entity + self.skipped_category
    }
}

/// Result of one successful parse. Replaced wholesale on the next load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedReport {
    pub sheet_name: String,
    pub header_row: usize,
    pub columns: ColumnMap,
    pub store: SeriesStore,
    pub stats: ParseStats,
}

enum RowOutcome {
    Accepted,
    SkippedYear,
    SkippedEntity,
    SkippedCategory,
}

struct RowTarget {
    kind: EntityKind,
    entity: String,
    metric: MetricType,
    source: SourceType,
    key: YearKey,
}

pub struct TabularParser {
    mode: ParseMode,
    header_scan_rows: usize,
    valid_building_details: Vec<String>,
    resolver: EntityResolver,
}

impl TabularParser {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            mode: config.parse_mode,
            header_scan_rows: config.header_scan_rows,
            valid_building_details: config.valid_building_details.clone(),
            resolver: EntityResolver::new(config),
        }
    }

    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<ParsedReport> {
        let grid = SheetGrid::from_bytes(bytes)?;
        self.parse_grid(&grid)
    }

    pub fn parse_grid(&self, grid: &SheetGrid) -> Result<ParsedReport> {
        info!(
            "Parsing sheet '{}' ({} rows) in {:?} mode",
            grid.name,
            grid.row_count(),
            self.mode
        );

        let header_row = self.find_header(grid)?;
        let header: Vec<String> = grid
            .row(header_row)
            .iter()
            .map(|c| c.text().trim().to_string())
            .collect();
        let mut columns = ColumnMap::from_header(&header);
        if self.mode == ParseMode::Loose && columns.year.is_none() {
            columns.year = Some(DEFAULT_YEAR_COLUMN);
        }
        debug!("Header at row {}: {:?}", header_row, columns);

        let data_rows: Vec<usize> = (header_row + 1..grid.row_count())
            .filter(|&r| !grid.is_blank_row(r))
            .collect();
        if data_rows.is_empty() {
            return Err(EnergyReportError::EmptyInput);
        }

        let years = detect_year_pair(grid, header_row, columns.year, columns.month_start);
        info!(
            "Detected fiscal years: previous={} current={}",
            years.previous_year, years.current_year
        );

        let mut store = SeriesStore::new(years);
        let mut stats = ParseStats {
            data_rows: data_rows.len(),
            ..ParseStats::default()
        };

        for row in data_rows {
            let outcome = match self.classify_row(grid, row, &columns, &years) {
                Ok(target) => {
                    stats.coerced_cells += accumulate_row(grid, row, &columns, &target, &mut store);
                    RowOutcome::Accepted
                }
                Err(outcome) => outcome,
            };

            match outcome {
                RowOutcome::Accepted => stats.accepted_rows += 1,
                RowOutcome::SkippedYear => stats.skipped_year += 1,
                RowOutcome::SkippedEntity => stats.skipped_entity += 1,
                RowOutcome::SkippedCategory => stats.skipped_category += 1,
            }
        }

        store.finalize();

        info!(
            "Parsed {} buildings and {} tenants ({} of {} rows accepted)",
            store.buildings.len(),
            store.tenants.len(),
            stats.accepted_rows,
            stats.data_rows
        );

        Ok(ParsedReport {
            sheet_name: grid.name.clone(),
            header_row,
            columns,
            store,
            stats,
        })
    }

    fn find_header(&self, grid: &SheetGrid) -> Result<usize> {
        let scanned_rows = grid.row_count().min(self.header_scan_rows);

        let found = (0..scanned_rows).find(|&r| match self.mode {
            ParseMode::Strict => is_strict_header(grid, r),
            ParseMode::Loose => grid.row(r).iter().any(|c| {
                let text = c.text();
                let text = text.trim();
                text == MONTH_LABELS[0] || text == ENGLISH_MONTH_LABELS[0]
            }),
        });

        found.ok_or(EnergyReportError::HeaderNotFound { scanned_rows })
    }

    fn classify_row(
        &self,
        grid: &SheetGrid,
        row: usize,
        columns: &ColumnMap,
        years: &FiscalYearPair,
    ) -> std::result::Result<RowTarget, RowOutcome> {
        match self.mode {
            ParseMode::Strict => self.classify_strict(grid, row, columns, years),
            ParseMode::Loose => self.classify_loose(grid, row, years),
        }
    }

    fn classify_strict(
        &self,
        grid: &SheetGrid,
        row: usize,
        columns: &ColumnMap,
        years: &FiscalYearPair,
    ) -> std::result::Result<RowTarget, RowOutcome> {
        let key = extract_years(&grid.text(row, columns.year))
            .first()
            .and_then(|y| years.year_key(*y))
            .ok_or_else(|| {
                debug!("Row {}: year not in {:?}", row, years);
                RowOutcome::SkippedYear
            })?;

        let category = grid.text(row, columns.category);
        let detail = grid.text(row, columns.detail);
        let metric = classify_metric_type(&grid.text(row, columns.unit), &category);
        let source = classify_source(&grid.text(row, columns.source));

        let (kind, entity) = if category == BUILDING_CATEGORY {
            if columns.detail.is_some() && !self.valid_building_details.contains(&detail) {
                debug!("Row {}: building detail '{}' not accepted", row, detail);
                return Err(RowOutcome::SkippedCategory);
            }
            let row_text = grid.row_texts(row, 0..columns.month_start).join(" ");
            let entity = self
                .resolver
                .resolve_building_label(&grid.text(row, columns.building), &row_text);
            (EntityKind::Building, entity)
        } else if category == TENANT_CATEGORY {
            let mut label = grid.text(row, columns.tenant);
            if label.is_empty() || label == "-" {
                label = grid.text(row, columns.usage_location);
            }
            (EntityKind::Tenant, self.resolver.resolve_tenant_label(&label))
        } else {
            debug!("Row {}: unrecognized category '{}'", row, category);
            return Err(RowOutcome::SkippedCategory);
        };

        let entity = entity.ok_or_else(|| {
            debug!("Row {}: no usable {:?} name", row, kind);
            RowOutcome::SkippedEntity
        })?;

        Ok(RowTarget {
            kind,
            entity,
            metric,
            source,
            key,
        })
    }

    fn classify_loose(
        &self,
        grid: &SheetGrid,
        row: usize,
        years: &FiscalYearPair,
    ) -> std::result::Result<RowTarget, RowOutcome> {
        let meta_cells = grid.row_texts(row, 0..META_CELLS);
        let meta = meta_cells.join(" ");

        let mentions = |year: i32| {
            meta.contains(&year.to_string()) || meta.contains(&short_year_marker(year))
        };
        let key = if mentions(years.previous_year) {
            YearKey::Previous
        } else if mentions(years.current_year) {
            YearKey::Current
        } else {
            debug!("Row {}: mentions neither {:?}", row, years);
            return Err(RowOutcome::SkippedYear);
        };

        let width = grid.row(row).len();
        let row_text = grid
            .row_texts(row, 0..width)
            .iter()
            .map(|c| c.to_lowercase())
            .collect::<Vec<_>>()
            .join("|");

        let metric = classify_row_metric(&row_text).ok_or_else(|| {
            debug!("Row {}: no metric marker", row);
            RowOutcome::SkippedCategory
        })?;
        let source = classify_source(&row_text);

        let (kind, entity) = if row_text.contains(TENANT_MARKER) {
            let cells = grid.row_texts(row, TENANT_SCAN);
            (
                EntityKind::Tenant,
                self.resolver.resolve_tenant_in_cells(&cells),
            )
        } else {
            (
                EntityKind::Building,
                self.resolver.resolve_building_in_cells(&meta_cells),
            )
        };

        let entity = entity.ok_or_else(|| {
            debug!("Row {}: no known {:?} code", row, kind);
            RowOutcome::SkippedEntity
        })?;

        Ok(RowTarget {
            kind,
            entity,
            metric,
            source,
            key,
        })
    }
}

fn is_strict_header(grid: &SheetGrid, row: usize) -> bool {
    let compact: String = grid
        .row(row)
        .iter()
        .map(|c| c.text())
        .collect::<String>()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let has_month = compact.contains(MONTH_LABELS[0]) || compact.contains(ENGLISH_MONTH_LABELS[0]);
    let has_year = compact.contains("년도") || compact.contains("Year");
    has_month && has_year && compact.contains("구분")
}

/// Two largest distinct years from the year column, falling back to a
/// free-text scan when the column yields fewer than two.
///
/// The fallback reads every cell above the header but only the cells left of
/// the month block on data rows, so month values never count as years.
pub fn detect_year_pair(
    grid: &SheetGrid,
    header_row: usize,
    year_column: Option<usize>,
    month_start: usize,
) -> FiscalYearPair {
    let mut years: BTreeSet<i32> = BTreeSet::new();

    if let Some(col) = year_column {
        for row in header_row + 1..grid.row_count() {
            years.extend(extract_years(&grid.text(row, Some(col))));
        }
    }

    if years.len() < 2 {
        for row in 0..grid.row_count() {
            let width = if row < header_row {
                grid.row(row).len()
            } else {
                month_start.min(grid.row(row).len())
            };
            let text = grid.row_texts(row, 0..width).join(" ");
            years.extend(extract_years(&text));
        }
    }

    if years.len() < 2 {
        warn!("Fewer than two years detected ({:?}), using defaults", years);
    }

    FiscalYearPair::from_detected(&years, chrono::Local::now().year())
}

/// Adds the row's twelve month values; returns how many cells were coerced to zero.
fn accumulate_row(
    grid: &SheetGrid,
    row: usize,
    columns: &ColumnMap,
    target: &RowTarget,
    store: &mut SeriesStore,
) -> usize {
    let entity = store.entity_mut(target.kind, &target.entity);
    let mut coerced = 0;

    for month in 0..12 {
        let cell = grid.cell(row, columns.month_start + month);
        let value = match cell.number() {
            Some(v) => v,
            None => {
                if !cell.is_empty() {
                    debug!("Row {}: unparseable value {:?} read as 0", row, cell);
                    coerced += 1;
                }
                0.0
            }
        };
        entity.accumulate(target.metric, target.source, month, target.key, value);
    }

    coerced
}
