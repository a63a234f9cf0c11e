use crate::schema::{
    empty_series, finalize_series, EntityKind, FiscalYearPair, MetricType, MonthCell,
    MonthlySeries, SourceType, YearKey,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric type × source × month grid for one building or tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySeries {
    pub metrics: BTreeMap<MetricType, BTreeMap<SourceType, MonthlySeries>>,
}

impl Default for EntitySeries {
    fn default() -> Self {
        let metrics = MetricType::ALL
            .iter()
            .map(|metric| {
                let sources = SourceType::ALL
                    .iter()
                    .map(|source| (*source, empty_series()))
                    .collect();
                (*metric, sources)
            })
            .collect();
        Self { metrics }
    }
}

impl EntitySeries {
    pub fn series(&self, metric: MetricType, source: SourceType) -> &[MonthCell] {
        self.metrics
            .get(&metric)
            .and_then(|sources| sources.get(&source))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn cell_mut(&mut self, metric: MetricType, source: SourceType, month: usize) -> &mut MonthCell {
        let series = self
            .metrics
            .entry(metric)
            .or_default()
            .entry(source)
            .or_insert_with(empty_series);
        &mut series[month]
    }

    /// Adds into the concrete source and into the `All` roll-up.
    pub fn accumulate(
        &mut self,
        metric: MetricType,
        source: SourceType,
        month: usize,
        key: YearKey,
        value: f64,
    ) {
        for target in [source, SourceType::All] {
            let cell = self.cell_mut(metric, target, month);
            match key {
                YearKey::Previous => cell.previous_year_value += value,
                YearKey::Current => *cell.current_year_value.get_or_insert(0.0) += value,
            }
            if !source.is_concrete() {
                break;
            }
        }
    }

    fn finalize(&mut self) {
        for sources in self.metrics.values_mut() {
            for series in sources.values_mut() {
                finalize_series(series);
            }
        }
    }
}

/// Normalized monthly series for every building and tenant found in one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStore {
    pub years: FiscalYearPair,
    pub buildings: BTreeMap<String, EntitySeries>,
    pub tenants: BTreeMap<String, EntitySeries>,
}

impl SeriesStore {
    pub fn new(years: FiscalYearPair) -> Self {
        Self {
            years,
            buildings: BTreeMap::new(),
            tenants: BTreeMap::new(),
        }
    }

    pub fn entities(&self, kind: EntityKind) -> &BTreeMap<String, EntitySeries> {
        match kind {
            EntityKind::Building => &self.buildings,
            EntityKind::Tenant => &self.tenants,
        }
    }

    pub fn entity(&self, kind: EntityKind, name: &str) -> Option<&EntitySeries> {
        self.entities(kind).get(name)
    }

    /// Entity names in sorted order.
    pub fn entity_names(&self, kind: EntityKind) -> Vec<String> {
        self.entities(kind).keys().cloned().collect()
    }

    pub fn entity_mut(&mut self, kind: EntityKind, name: &str) -> &mut EntitySeries {
        let map = match kind {
            EntityKind::Building => &mut self.buildings,
            EntityKind::Tenant => &mut self.tenants,
        };
        map.entry(name.to_string()).or_default()
    }

    /// Applies the last-actual-month boundary and diffs to every series.
    pub(crate) fn finalize(&mut self) {
        for entity in self
            .buildings
            .values_mut()
            .chain(self.tenants.values_mut())
        {
            entity.finalize();
        }
    }
}
