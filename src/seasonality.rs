use crate::schema::ReportConfig;
use std::collections::BTreeSet;

/// Winter and summer months, 0-based (Jan, Feb, Jun, Jul, Aug, Dec).
pub const DEFAULT_PEAK_MONTHS: [usize; 6] = [0, 1, 5, 6, 7, 11];
pub const DEFAULT_PEAK_UPLIFT: f64 = 1.05;

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalProfile {
    peak_months: BTreeSet<usize>,
    uplift: f64,
}

impl Default for SeasonalProfile {
    fn default() -> Self {
        Self {
            peak_months: DEFAULT_PEAK_MONTHS.into_iter().collect(),
            uplift: DEFAULT_PEAK_UPLIFT,
        }
    }
}

impl SeasonalProfile {
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            peak_months: config
                .peak_months
                .iter()
                .filter(|m| (1..=12).contains(*m))
                .map(|m| (*m - 1) as usize)
                .collect(),
            uplift: config.peak_uplift,
        }
    }

    pub fn is_peak(&self, month_index: usize) -> bool {
        self.peak_months.contains(&month_index)
    }

    /// Only an upward trend is amplified; a flat or falling trend passes through.
    pub fn adjust(&self, month_index: usize, trend_ratio: f64) -> f64 {
        if self.is_peak(month_index) && trend_ratio > 1.0 {
            trend_ratio * self.uplift
        } else {
            trend_ratio
        }
    }
}
