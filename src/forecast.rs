use crate::aggregator::AggregatedSeries;
use crate::schema::{ProjectionPolicy, ReportConfig};
use crate::seasonality::SeasonalProfile;
use log::debug;

/// Heuristic trend projector: previous-year value × recent YoY ratio, with a
/// seasonal uplift on peak months.
#[derive(Debug, Clone)]
pub struct Forecaster {
    policy: ProjectionPolicy,
    trend_window: usize,
    seasonality: SeasonalProfile,
}

impl Default for Forecaster {
    fn default() -> Self {
        Self {
            policy: ProjectionPolicy::NextMonthOnly,
            trend_window: 3,
            seasonality: SeasonalProfile::default(),
        }
    }
}

impl Forecaster {
    pub fn new(policy: ProjectionPolicy, trend_window: usize, seasonality: SeasonalProfile) -> Self {
        Self {
            policy,
            trend_window: trend_window.max(1),
            seasonality,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(
            config.projection_policy,
            config.trend_window,
            SeasonalProfile::from_config(config),
        )
    }

    pub fn policy(&self) -> ProjectionPolicy {
        self.policy
    }

    /// Mean of current/previous over the trailing window ending at the last
    /// actual month, skipping months with no previous-year value. 1.0 when no
    /// month qualifies.
    pub fn trend_ratio(&self, series: &AggregatedSeries) -> f64 {
        let Some(last) = series.last_actual_index else {
            return 1.0;
        };

        let start = (last + 1).saturating_sub(self.trend_window);
        let ratios: Vec<f64> = series.months[start..=last]
            .iter()
            .filter(|cell| cell.previous_year_value > 0.0)
            .map(|cell| cell.current_or_zero() / cell.previous_year_value)
            .collect();

        if ratios.is_empty() {
            1.0
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        }
    }

    /// Returns a copy with `projected_value` filled after the last actual month.
    /// Months at or before the last actual month are never touched.
    pub fn project(&self, series: &AggregatedSeries) -> AggregatedSeries {
        let mut projected = series.clone();
        for cell in projected.months.iter_mut() {
            cell.projected_value = None;
        }

        let first_target = series.last_actual_index.map_or(0, |last| last + 1);
        if first_target >= projected.months.len() {
            return projected;
        }

        let last_target = match self.policy {
            ProjectionPolicy::NextMonthOnly => first_target,
            ProjectionPolicy::RemainingYear => projected.months.len() - 1,
        };

        let ratio = self.trend_ratio(series);
        debug!(
            "Projecting months {}..={} with trend ratio {:.4}",
            first_target, last_target, ratio
        );

        for (idx, cell) in projected
            .months
            .iter_mut()
            .enumerate()
            .take(last_target + 1)
            .skip(first_target)
        {
            if cell.current_year_value.is_some() {
                continue;
            }
            let rate = self.seasonality.adjust(idx, ratio);
            cell.projected_value = Some(cell.previous_year_value * rate);
        }

        projected
    }
}
