use crate::error::{EnergyReportError, Result};
use crate::utils::parse_numeric;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::{debug, warn};
use std::io::Cursor;

const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

const RESULT_SHEET_MARKERS: &[&str] = &["실적", "에너지"];
const YEAR_SHEET_MARKERS: &[&str] = &["년", "20"];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
            Cell::Number(v) => v.to_string(),
        }
    }

    pub fn number(&self) -> Option<f64> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => parse_numeric(s),
            Cell::Number(v) => Some(*v).filter(|v| v.is_finite()),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(v) => Cell::Number(*v as f64),
            Data::Float(v) => Cell::Number(*v),
            Data::String(s) if s.is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(v) => Cell::Text(v.to_string()),
            Data::DateTime(v) => Cell::Text(v.to_string()),
            Data::DateTimeIso(v) | Data::DurationIso(v) => Cell::Text(v.clone()),
            Data::Error(_) | Data::Empty => Cell::Empty,
        }
    }
}

/// One worksheet as a dense grid of cells.
#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

static EMPTY_CELL: Cell = Cell::Empty;

impl SheetGrid {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn from_text_rows(name: impl Into<String>, rows: &[Vec<&str>]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|v| Cell::from(*v)).collect())
            .collect();
        Self::new(name, rows)
    }

    /// Loads the relevant sheet from workbook bytes (xlsx, xls, ods) or CSV text.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
            Self::from_workbook_bytes(bytes)
        } else {
            Self::from_csv_bytes(bytes)
        }
    }

    pub fn from_workbook_bytes(bytes: &[u8]) -> Result<Self> {
        Self::load_workbook(bytes, None)
    }

    /// Loads a named sheet instead of applying the sheet-name heuristic.
    pub fn from_workbook_sheet(bytes: &[u8], sheet: &str) -> Result<Self> {
        Self::load_workbook(bytes, Some(sheet))
    }

    fn load_workbook(bytes: &[u8], sheet: Option<&str>) -> Result<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let names = workbook.sheet_names();
        let name = match sheet {
            Some(wanted) => names
                .iter()
                .find(|n| n.as_str() == wanted)
                .cloned()
                .ok_or_else(|| EnergyReportError::SheetNotFound(wanted.to_string()))?,
            None => select_sheet_name(&names).ok_or(EnergyReportError::NoSheets)?,
        };

        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| EnergyReportError::Workbook(format!("{}: {}", name, e)))?;

        let rows: Vec<Vec<Cell>> = range
            .rows()
            .map(|r| r.iter().map(Cell::from).collect())
            .collect();

        debug!("Loaded sheet '{}' with {} rows", name, rows.len());
        Ok(Self::new(name, rows))
    }

    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut rows = Vec::new();
        let mut lossy_rows = 0;
        for record in reader.byte_records() {
            let record = record?;
            if std::str::from_utf8(record.as_slice()).is_err() {
                lossy_rows += 1;
            }
            rows.push(
                record
                    .iter()
                    .map(|v| Cell::from(String::from_utf8_lossy(v).trim()))
                    .collect(),
            );
        }
        if lossy_rows > 0 {
            warn!("{} CSV rows contained invalid UTF-8 and were decoded lossily", lossy_rows);
        }

        debug!("Loaded CSV input with {} rows", rows.len());
        Ok(Self::new("csv", rows))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, index: usize) -> &[Cell] {
        self.rows.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.row(row).get(col).unwrap_or(&EMPTY_CELL)
    }

    /// Trimmed text of a cell; missing columns read as blank.
    pub fn text(&self, row: usize, col: Option<usize>) -> String {
        col.map(|c| self.cell(row, c).text().trim().to_string())
            .unwrap_or_default()
    }

    pub fn row_texts(&self, row: usize, range: std::ops::Range<usize>) -> Vec<String> {
        range
            .map(|c| self.cell(row, c).text().trim().to_string())
            .collect()
    }

    pub fn is_blank_row(&self, row: usize) -> bool {
        self.row(row).iter().all(Cell::is_empty)
    }
}

/// Prefers a sheet named like a yearly results sheet, else the first one.
pub fn select_sheet_name(names: &[String]) -> Option<String> {
    let preferred = names.iter().find(|name| {
        RESULT_SHEET_MARKERS.iter().any(|m| name.contains(m))
            && YEAR_SHEET_MARKERS.iter().any(|m| name.contains(m))
    });

    match preferred {
        Some(name) => Some(name.clone()),
        None => {
            let first = names.first().cloned();
            if let Some(name) = &first {
                if names.len() > 1 {
                    warn!("No results sheet found, falling back to first sheet '{}'", name);
                }
            }
            first
        }
    }
}
