use crate::schema::{
    empty_series, finalize_series, EntityKind, MetricType, MonthlySeries, SourceType,
    UsageAllPolicy,
};
use crate::store::SeriesStore;
use log::debug;
use serde::{Deserialize, Serialize};

/// Twelve months summed over a set of entities for one metric and source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSeries {
    /// Metric the caller asked for.
    pub metric: MetricType,
    /// Metric actually summed; differs from `metric` when usage is substituted.
    pub effective_metric: MetricType,
    pub source: SourceType,
    pub entity_count: usize,
    pub last_actual_index: Option<usize>,
    pub months: MonthlySeries,
}

impl AggregatedSeries {
    pub fn empty(metric: MetricType, source: SourceType) -> Self {
        let mut months = empty_series();
        let last_actual_index = finalize_series(&mut months);
        Self {
            metric,
            effective_metric: metric,
            source,
            entity_count: 0,
            last_actual_index,
            months,
        }
    }
}

pub fn effective_metric(metric: MetricType, source: SourceType, policy: UsageAllPolicy) -> MetricType {
    match (metric, source, policy) {
        (MetricType::UsageVolume, SourceType::All, UsageAllPolicy::SubstituteEnergyEquivalent) => {
            MetricType::EnergyEquivalent
        }
        _ => metric,
    }
}

/// Sums the selected entities' series. Names missing from the store are ignored.
pub fn aggregate(
    store: &SeriesStore,
    kind: EntityKind,
    selected: &[String],
    metric: MetricType,
    source: SourceType,
    policy: UsageAllPolicy,
) -> AggregatedSeries {
    let effective = effective_metric(metric, source, policy);
    let mut months = empty_series();
    let mut entity_count = 0;

    for name in selected {
        let Some(entity) = store.entity(kind, name) else {
            debug!("Selected {:?} '{}' not in store", kind, name);
            continue;
        };
        entity_count += 1;

        for (total, cell) in months.iter_mut().zip(entity.series(effective, source)) {
            total.previous_year_value += cell.previous_year_value;
            *total.current_year_value.get_or_insert(0.0) += cell.current_or_zero();
        }
    }

    let last_actual_index = finalize_series(&mut months);

    AggregatedSeries {
        metric,
        effective_metric: effective,
        source,
        entity_count,
        last_actual_index,
        months,
    }
}
