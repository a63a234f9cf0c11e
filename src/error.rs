use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnergyReportError {
    #[error("Header row not found in the first {scanned_rows} rows (expected 년도, 구분 and month columns)")]
    HeaderNotFound { scanned_rows: usize },

    #[error("No data rows found below the header row")]
    EmptyInput,

    #[error("Workbook contains no sheets")]
    NoSheets,

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnergyReportError {
    /// True for the conditions that abort a parse because the sheet has no usable structure.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EnergyReportError::HeaderNotFound { .. } | EnergyReportError::EmptyInput
        )
    }
}

impl From<calamine::Error> for EnergyReportError {
    fn from(err: calamine::Error) -> Self {
        EnergyReportError::Workbook(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EnergyReportError>;
