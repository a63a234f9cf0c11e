use crate::aggregator::{aggregate, AggregatedSeries};
use crate::forecast::Forecaster;
use crate::schema::{
    EntityKind, FiscalYearPair, MetricType, SourceType, UsageAllPolicy,
};
use crate::store::SeriesStore;
use crate::utils::{month_label, percent_change, unit_label};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LatestMonth {
    pub month_index: usize,
    pub month_label: String,
    pub value: f64,
    pub previous_year_value: f64,
    pub diff: f64,
    pub percent_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NextMonth {
    pub month_index: usize,
    pub month_label: String,
    pub previous_year_value: f64,
    pub projected_value: f64,
    pub diff: f64,
    pub percent_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Summary {
    pub years: FiscalYearPair,
    pub metric: MetricType,
    pub source: SourceType,
    pub unit: String,
    pub last_actual_index: Option<usize>,
    /// Previous-year total over the months observed so far this year.
    pub total_previous_ytd: f64,
    pub total_current_actual: f64,
    pub diff: f64,
    pub yoy_percent: f64,
    /// Actual total plus every projected month.
    pub total_projected_full_series: f64,
    pub latest_month: Option<LatestMonth>,
    /// `None` when December is already actual.
    pub next_month: Option<NextMonth>,
}

/// Year-to-date statistics for a projected series.
pub fn summarize(series: &AggregatedSeries, years: FiscalYearPair) -> Summary {
    let ytd_end = series.last_actual_index.map_or(0, |last| last + 1);
    let ytd = &series.months[..ytd_end];

    let total_previous_ytd: f64 = ytd.iter().map(|c| c.previous_year_value).sum();
    let total_current_actual: f64 = ytd.iter().map(|c| c.current_or_zero()).sum();
    let total_projected: f64 = series
        .months
        .iter()
        .filter_map(|c| c.projected_value)
        .sum();

    let latest_month = series.last_actual_index.map(|idx| {
        let cell = &series.months[idx];
        let value = cell.current_or_zero();
        LatestMonth {
            month_index: idx,
            month_label: month_label(idx).to_string(),
            value,
            previous_year_value: cell.previous_year_value,
            diff: value - cell.previous_year_value,
            percent_change: percent_change(value, cell.previous_year_value),
        }
    });

    let next_month = series.months.get(ytd_end).map(|cell| {
        let projected = cell.projected_value.unwrap_or(0.0);
        NextMonth {
            month_index: ytd_end,
            month_label: month_label(ytd_end).to_string(),
            previous_year_value: cell.previous_year_value,
            projected_value: projected,
            diff: projected - cell.previous_year_value,
            percent_change: percent_change(projected, cell.previous_year_value),
        }
    });

    Summary {
        years,
        metric: series.metric,
        source: series.source,
        unit: unit_label(series.effective_metric, series.source).to_string(),
        last_actual_index: series.last_actual_index,
        total_previous_ytd,
        total_current_actual,
        diff: total_current_actual - total_previous_ytd,
        yoy_percent: percent_change(total_current_actual, total_previous_ytd),
        total_projected_full_series: total_current_actual + total_projected,
        latest_month,
        next_month,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceShare {
    pub source: SourceType,
    pub label: String,
    pub value: f64,
    pub share_percent: f64,
}

/// Shared inputs for the per-source and per-entity breakdowns.
pub struct Breakdown<'a> {
    pub store: &'a SeriesStore,
    pub kind: EntityKind,
    pub selected: &'a [String],
    pub metric: MetricType,
    pub usage_policy: UsageAllPolicy,
    pub forecaster: &'a Forecaster,
}

impl Breakdown<'_> {
    fn projected(&self, names: &[String], source: SourceType) -> AggregatedSeries {
        let series = aggregate(
            self.store,
            self.kind,
            names,
            self.metric,
            source,
            self.usage_policy,
        );
        self.forecaster.project(&series)
    }

    /// Per-source totals of actual-or-projected values. Only meaningful for
    /// the `All` filter; other filters return `None`. Zero sources are dropped.
    pub fn portfolio_mix(&self, source_filter: SourceType) -> Option<Vec<SourceShare>> {
        if source_filter != SourceType::All || self.selected.is_empty() {
            return None;
        }

        let metric = crate::aggregator::effective_metric(
            self.metric,
            SourceType::All,
            self.usage_policy,
        );
        let mut shares: Vec<SourceShare> = SourceType::CONCRETE
            .iter()
            .map(|source| {
                let series = aggregate(
                    self.store,
                    self.kind,
                    self.selected,
                    metric,
                    *source,
                    self.usage_policy,
                );
                let value = self
                    .forecaster
                    .project(&series)
                    .months
                    .iter()
                    .map(|c| c.actual_or_projected())
                    .sum();
                SourceShare {
                    source: *source,
                    label: source.label().to_string(),
                    value,
                    share_percent: 0.0,
                }
            })
            .filter(|share| share.value > 0.0)
            .collect();

        let total: f64 = shares.iter().map(|s| s.value).sum();
        for share in &mut shares {
            share.share_percent = if total > 0.0 {
                share.value / total * 100.0
            } else {
                0.0
            };
        }

        Some(shares)
    }

    /// Selected entities ranked by actual-plus-projected total, largest first.
    pub fn growth_ranking(&self, source: SourceType) -> Vec<EntityGrowth> {
        let mut ranking: Vec<EntityGrowth> = self
            .selected
            .iter()
            .filter(|name| self.store.entity(self.kind, name).is_some())
            .filter_map(|name| {
                let series = self.projected(std::slice::from_ref(name), source);

                let covered = series
                    .months
                    .iter()
                    .filter(|c| c.current_year_value.is_some() || c.projected_value.is_some());
                let (total_value, previous_value) = covered.fold((0.0, 0.0), |(cur, prev), c| {
                    (cur + c.actual_or_projected(), prev + c.previous_year_value)
                });

                if total_value <= 0.0 {
                    return None;
                }

                let growth_rate = if previous_value == 0.0 {
                    0.0
                } else {
                    (total_value - previous_value) / previous_value
                };

                Some(EntityGrowth {
                    name: name.clone(),
                    total_value,
                    previous_value,
                    growth_rate,
                })
            })
            .collect();

        ranking.sort_by(|a, b| {
            b.total_value
                .total_cmp(&a.total_value)
                .then_with(|| a.name.cmp(&b.name))
        });
        ranking
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EntityGrowth {
    pub name: String,
    /// Actual plus projected value for the current year.
    pub total_value: f64,
    /// Previous-year value over the same months.
    pub previous_value: f64,
    /// Fractional change, e.g. 0.1 for +10%.
    pub growth_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{empty_series, finalize_series, YearKey};

    fn years() -> FiscalYearPair {
        FiscalYearPair {
            previous_year: 2024,
            current_year: 2025,
        }
    }

    fn series(previous: f64, current: &[f64]) -> AggregatedSeries {
        let mut months = empty_series();
        for (idx, cell) in months.iter_mut().enumerate() {
            cell.previous_year_value = previous;
            cell.current_year_value = Some(current.get(idx).copied().unwrap_or(0.0));
        }
        let last_actual_index = finalize_series(&mut months);
        AggregatedSeries {
            metric: MetricType::Cost,
            effective_metric: MetricType::Cost,
            source: SourceType::All,
            entity_count: 1,
            last_actual_index,
            months,
        }
    }

    #[test]
    fn test_summary_ytd_totals() {
        let s = Forecaster::default().project(&series(100.0, &[110.0; 3]));
        let summary = summarize(&s, years());

        assert!((summary.total_previous_ytd - 300.0).abs() < 1e-9);
        assert!((summary.total_current_actual - 330.0).abs() < 1e-9);
        assert!((summary.yoy_percent - 10.0).abs() < 1e-9);
        assert!((summary.total_projected_full_series - 440.0).abs() < 1e-9);
        assert_eq!(summary.unit, "원");

        let latest = summary.latest_month.unwrap();
        assert_eq!(latest.month_label, "3월");
        assert!((latest.diff - 10.0).abs() < 1e-9);

        let next = summary.next_month.unwrap();
        assert_eq!(next.month_index, 3);
        assert!((next.projected_value - 110.0).abs() < 1e-9);
        assert!((next.percent_change - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_without_actuals() {
        let summary = summarize(&series(50.0, &[]), years());
        assert_eq!(summary.total_previous_ytd, 0.0);
        assert_eq!(summary.yoy_percent, 0.0);
        assert!(summary.latest_month.is_none());
        assert_eq!(summary.next_month.unwrap().month_index, 0);
    }

    #[test]
    fn test_summary_full_year_has_no_next_month() {
        let summary = summarize(&series(10.0, &[10.0; 12]), years());
        assert!(summary.next_month.is_none());
        assert!((summary.total_previous_ytd - 120.0).abs() < 1e-9);
    }

    fn store() -> SeriesStore {
        let mut store = SeriesStore::new(years());
        let big = store.entity_mut(EntityKind::Building, "Big");
        for m in 0..12 {
            big.accumulate(MetricType::Cost, SourceType::Electricity, m, YearKey::Previous, 100.0);
            big.accumulate(MetricType::Cost, SourceType::CityGas, m, YearKey::Previous, 10.0);
        }
        for m in 0..2 {
            big.accumulate(MetricType::Cost, SourceType::Electricity, m, YearKey::Current, 120.0);
            big.accumulate(MetricType::Cost, SourceType::CityGas, m, YearKey::Current, 10.0);
        }

        let small = store.entity_mut(EntityKind::Building, "Small");
        for m in 0..2 {
            small.accumulate(MetricType::Cost, SourceType::Electricity, m, YearKey::Previous, 10.0);
            small.accumulate(MetricType::Cost, SourceType::Electricity, m, YearKey::Current, 5.0);
        }

        let empty = store.entity_mut(EntityKind::Building, "Empty");
        empty.accumulate(MetricType::UsageVolume, SourceType::Electricity, 0, YearKey::Previous, 10.0);

        store.finalize();
        store
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_portfolio_mix_only_for_all_filter() {
        let store = store();
        let selected = names(&["Big", "Small"]);
        let forecaster = Forecaster::default();
        let breakdown = Breakdown {
            store: &store,
            kind: EntityKind::Building,
            selected: &selected,
            metric: MetricType::Cost,
            usage_policy: UsageAllPolicy::default(),
            forecaster: &forecaster,
        };

        assert!(breakdown.portfolio_mix(SourceType::Electricity).is_none());

        let mix = breakdown.portfolio_mix(SourceType::All).unwrap();
        assert_eq!(mix.len(), 2);
        assert_eq!(mix[0].source, SourceType::Electricity);

        // Electricity: 250 actual + March projected at 100 * mean(125/110, 125/110).
        let ratio = 125.0 / 110.0;
        assert!((mix[0].value - (250.0 + 100.0 * ratio)).abs() < 1e-9);
        assert!((mix[1].value - 30.0).abs() < 1e-9);
        let total_share: f64 = mix.iter().map(|s| s.share_percent).sum();
        assert!((total_share - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_growth_ranking_sorted_and_filtered() {
        let store = store();
        let selected = names(&["Small", "Empty", "Big", "Missing"]);
        let forecaster = Forecaster::default();
        let breakdown = Breakdown {
            store: &store,
            kind: EntityKind::Building,
            selected: &selected,
            metric: MetricType::Cost,
            usage_policy: UsageAllPolicy::default(),
            forecaster: &forecaster,
        };

        let ranking = breakdown.growth_ranking(SourceType::All);
        let order: Vec<&str> = ranking.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(order, vec!["Big", "Small"]);

        // Big: Jan/Feb 130 vs 110, March projected at 110 * 130/110 = 130.
        let big = &ranking[0];
        assert!((big.total_value - 390.0).abs() < 1e-9);
        assert!((big.previous_value - 330.0).abs() < 1e-9);
        assert!((big.growth_rate - 60.0 / 330.0).abs() < 1e-9);

        // Small has no previous-year value for March, so its projection is 0.
        let small = &ranking[1];
        assert!((small.total_value - 10.0).abs() < 1e-9);
        assert!((small.growth_rate + 0.5).abs() < 1e-9);
    }
}
