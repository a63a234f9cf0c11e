use crate::error::{EnergyReportError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum MetricType {
    #[schemars(description = "Billed cost in currency units (원)")]
    Cost,

    #[schemars(description = "Physical usage volume; the unit depends on the source (kWh, m³, MWh)")]
    UsageVolume,

    #[schemars(description = "Energy equivalent in tonnes of oil equivalent (TOE)")]
    EnergyEquivalent,

    #[schemars(description = "Greenhouse gas emissions equivalent (tCO2)")]
    EmissionsEquivalent,
}

impl MetricType {
    pub const ALL: [MetricType; 4] = [
        MetricType::Cost,
        MetricType::UsageVolume,
        MetricType::EnergyEquivalent,
        MetricType::EmissionsEquivalent,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MetricType::Cost => "비용",
            MetricType::UsageVolume => "사용량",
            MetricType::EnergyEquivalent => "에너지",
            MetricType::EmissionsEquivalent => "온실가스",
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum SourceType {
    #[schemars(description = "Sum over every concrete source")]
    All,
    Electricity,
    CityGas,
    #[schemars(description = "District heating / medium temperature hot water")]
    MediumTemperatureWater,
    WaterAndSewage,
    ReclaimedWater,
    #[schemars(description = "Rows whose source text matched no known alias")]
    Other,
}

impl SourceType {
    pub const ALL: [SourceType; 7] = [
        SourceType::All,
        SourceType::Electricity,
        SourceType::CityGas,
        SourceType::MediumTemperatureWater,
        SourceType::WaterAndSewage,
        SourceType::ReclaimedWater,
        SourceType::Other,
    ];

    /// Every source except the `All` roll-up.
    pub const CONCRETE: [SourceType; 6] = [
        SourceType::Electricity,
        SourceType::CityGas,
        SourceType::MediumTemperatureWater,
        SourceType::WaterAndSewage,
        SourceType::ReclaimedWater,
        SourceType::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SourceType::All => "전체",
            SourceType::Electricity => "전력",
            SourceType::CityGas => "도시가스",
            SourceType::MediumTemperatureWater => "중온수",
            SourceType::WaterAndSewage => "상하수도",
            SourceType::ReclaimedWater => "재이용수",
            SourceType::Other => "기타",
        }
    }

    pub fn is_concrete(&self) -> bool {
        *self != SourceType::All
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
    Default,
)]
#[serde(rename_all = "PascalCase")]
pub enum EntityKind {
    Building,
    #[default]
    Tenant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct FiscalYearPair {
    pub previous_year: i32,
    pub current_year: i32,
}

impl FiscalYearPair {
    /// Picks the two largest distinct years.
    ///
    /// With a single detected year that year becomes the current one. With none,
    /// the pair falls back to the calendar year of `today_year`.
    pub fn from_detected(years: &BTreeSet<i32>, today_year: i32) -> Self {
        let mut largest = years.iter().rev();
        match (largest.next(), largest.next()) {
            (Some(&current), Some(&previous)) => Self {
                previous_year: previous,
                current_year: current,
            },
            (Some(&current), None) => Self {
                previous_year: current - 1,
                current_year: current,
            },
            _ => Self {
                previous_year: today_year - 1,
                current_year: today_year,
            },
        }
    }

    pub fn year_key(&self, year: i32) -> Option<YearKey> {
        if year == self.previous_year {
            Some(YearKey::Previous)
        } else if year == self.current_year {
            Some(YearKey::Current)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearKey {
    Previous,
    Current,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthCell {
    /// Calendar month, 1 = January.
    pub month: u32,
    pub previous_year_value: f64,
    /// `None` for every month after the last observed month of the current year.
    pub current_year_value: Option<f64>,
    /// Only ever set where `current_year_value` is `None`.
    pub projected_value: Option<f64>,
    /// `current - previous` when both are known, otherwise 0.
    pub diff: f64,
}

impl MonthCell {
    pub fn empty(month: u32) -> Self {
        Self {
            month,
            previous_year_value: 0.0,
            current_year_value: Some(0.0),
            projected_value: None,
            diff: 0.0,
        }
    }

    pub fn current_or_zero(&self) -> f64 {
        self.current_year_value.unwrap_or(0.0)
    }

    /// Observed value if present, else the projection, else 0.
    pub fn actual_or_projected(&self) -> f64 {
        self.current_year_value
            .or(self.projected_value)
            .unwrap_or(0.0)
    }
}

/// Twelve cells, January through December.
pub type MonthlySeries = Vec<MonthCell>;

pub fn empty_series() -> MonthlySeries {
    (1..=12).map(MonthCell::empty).collect()
}

/// Index of the last month with a positive current-year value.
pub fn last_actual_index(series: &[MonthCell]) -> Option<usize> {
    series
        .iter()
        .rposition(|cell| cell.current_year_value.is_some_and(|v| v > 0.0))
}

/// Nulls current-year values past the last actual month and recomputes `diff`.
pub fn finalize_series(series: &mut [MonthCell]) -> Option<usize> {
    let last = last_actual_index(series);
    for (idx, cell) in series.iter_mut().enumerate() {
        if last.map_or(true, |l| idx > l) {
            cell.current_year_value = None;
        }
        cell.diff = match cell.current_year_value {
            Some(current) => current - cell.previous_year_value,
            None => 0.0,
        };
    }
    last
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ParseMode {
    #[schemars(
        description = "Columns are located by exact header labels and rows are classified by an exact match on the 구분 column."
    )]
    #[default]
    Strict,

    #[schemars(
        description = "Rows are classified by substring matching across the whole row and buildings are matched against the known building code list."
    )]
    Loose,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ProjectionPolicy {
    #[schemars(description = "Project only the month right after the last actual month.")]
    #[default]
    NextMonthOnly,

    #[schemars(description = "Project every month after the last actual month with the same trend ratio.")]
    RemainingYear,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "PascalCase")]
pub enum UsageAllPolicy {
    #[schemars(
        description = "Usage volume across all sources mixes kWh, m³ and MWh, so the energy equivalent (TOE) series is used instead."
    )]
    #[default]
    SubstituteEnergyEquivalent,

    #[schemars(description = "Sum the raw usage figures regardless of unit.")]
    SumRaw,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReportConfig {
    #[schemars(description = "Row classification heuristic used by the parser")]
    pub parse_mode: ParseMode,

    #[schemars(description = "How many leading rows are searched for the header row (at least 100)")]
    pub header_scan_rows: usize,

    pub projection_policy: ProjectionPolicy,

    pub usage_all_policy: UsageAllPolicy,

    #[schemars(description = "Calendar months (1-12) that receive the seasonal uplift")]
    pub peak_months: Vec<u32>,

    #[schemars(description = "Multiplier applied to an upward trend in peak months (>= 1.0)")]
    pub peak_uplift: f64,

    #[schemars(description = "Number of trailing actual months averaged into the trend ratio")]
    pub trend_window: usize,

    #[schemars(description = "Known building codes, matched against row text in loose mode")]
    pub building_codes: Vec<String>,

    #[schemars(description = "Raw tenant code to display name")]
    pub tenant_aliases: BTreeMap<String, String>,

    #[schemars(
        description = "Exact tenant codes that loose mode resolves ahead of the alias table"
    )]
    pub loose_tenant_overrides: BTreeMap<String, String>,

    #[schemars(description = "Named groups of tenant display names")]
    pub tenant_groups: BTreeMap<String, Vec<String>>,

    #[schemars(description = "상세구분 values accepted for building rows in strict mode")]
    pub valid_building_details: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let building_codes = [
            "DP2", "DP3_CA", "LGC_DP3", "LGC_D22", "CNS_D22", "CNS_D25", "D22_CA", "D25_CA",
            "ISC", "SLC", "LGD", "LXH", "LGIT", "LGES", "LGCS", "LGHH", "LGU", "LXG",
            "DP2_2단계",
        ];

        let tenant_aliases = [
            ("LGE", "LG전자"),
            ("LGES", "LG에너지솔루션"),
            ("LGD", "LG디스플레이"),
            ("LGIT", "LG이노텍"),
            ("LGC_D22", "LG화학_D22"),
            ("LGC", "LG화학"),
            ("LGHH", "LG생활건강"),
            ("LGU", "LG유플러스"),
            ("CNS", "LG씨앤에스"),
            ("LGCS", "LG화학_E5,E7"),
            ("LXH", "LX하우시스"),
            ("LXG", "LX글라스"),
            ("LGE_DP3", "LG전자_DP3"),
            ("DP3_CA", "DP3_공용"),
            ("D22_CA", "D22_공용"),
            ("D25_CA", "D25_공용"),
        ];

        let tenant_groups = [
            (
                "DP3",
                vec![
                    "LG디스플레이",
                    "LG에너지솔루션",
                    "LG이노텍",
                    "LG화학",
                    "LX글라스",
                    "LX하우시스",
                    "LG전자_DP3",
                ],
            ),
            (
                "D22/D25",
                vec!["LG생활건강", "LG씨앤에스", "LG유플러스", "LG화학_D22"],
            ),
        ];

        Self {
            parse_mode: ParseMode::Strict,
            header_scan_rows: 200,
            projection_policy: ProjectionPolicy::NextMonthOnly,
            usage_all_policy: UsageAllPolicy::SubstituteEnergyEquivalent,
            peak_months: vec![1, 2, 6, 7, 8, 12],
            peak_uplift: 1.05,
            trend_window: 3,
            building_codes: building_codes.iter().map(|s| s.to_string()).collect(),
            tenant_aliases: tenant_aliases
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            loose_tenant_overrides: [("LGE", "LG에너지솔루션")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            tenant_groups: tenant_groups
                .into_iter()
                .map(|(name, members)| {
                    (
                        name.to_string(),
                        members.into_iter().map(String::from).collect(),
                    )
                })
                .collect(),
            valid_building_details: vec![
                "전유".to_string(),
                "배분(전유)".to_string(),
                "배분(공용)".to_string(),
            ],
        }
    }
}

impl ReportConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ReportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.header_scan_rows < 100 {
            return Err(EnergyReportError::InvalidConfig(format!(
                "header_scan_rows must be at least 100 (got {})",
                self.header_scan_rows
            )));
        }

        if let Some(month) = self.peak_months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(EnergyReportError::InvalidConfig(format!(
                "peak month {} is outside 1-12",
                month
            )));
        }

        if !self.peak_uplift.is_finite() || self.peak_uplift < 1.0 {
            return Err(EnergyReportError::InvalidConfig(format!(
                "peak_uplift must be a finite value >= 1.0 (got {})",
                self.peak_uplift
            )));
        }

        if self.trend_window == 0 {
            return Err(EnergyReportError::InvalidConfig(
                "trend_window must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn json_schema() -> serde_json::Result<String> {
        let schema = schemars::schema_for!(ReportConfig);
        serde_json::to_string_pretty(&schema)
    }
}
