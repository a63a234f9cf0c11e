use crate::error::Result;
use crate::ingestion::{ParsedReport, TabularParser};
use crate::schema::{EntityKind, MetricType, ReportConfig, SourceType};
use crate::{build_view, ReportView};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// What the presentation layer currently has selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub view: EntityKind,
    pub entities: BTreeSet<String>,
    pub metric: MetricType,
    pub source: SourceType,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            view: EntityKind::Tenant,
            entities: BTreeSet::new(),
            metric: MetricType::Cost,
            source: SourceType::All,
        }
    }
}

impl Selection {
    /// Every entity of `view` in the report, with the default metric and source.
    pub fn all(report: &ParsedReport, view: EntityKind) -> Self {
        Self {
            view,
            entities: report.store.entity_names(view).into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn entity_list(&self) -> Vec<String> {
        self.entities.iter().cloned().collect()
    }

    /// Switching between buildings and tenants drops the current picks.
    pub fn set_view(&mut self, view: EntityKind) {
        if self.view != view {
            self.view = view;
            self.entities.clear();
        }
    }

    pub fn toggle_entity(&mut self, name: &str) {
        if !self.entities.remove(name) {
            self.entities.insert(name.to_string());
        }
    }

    /// Clears the selection when everything is selected, otherwise selects everything.
    pub fn toggle_all(&mut self, available: &[String]) {
        if !available.is_empty() && available.iter().all(|n| self.entities.contains(n)) {
            self.entities.clear();
        } else {
            self.entities.extend(available.iter().cloned());
        }
    }

    /// Toggles the members of a named group that actually exist in `available`.
    /// Returns false when the group is unknown or none of its members are present.
    pub fn toggle_group(
        &mut self,
        config: &ReportConfig,
        group: &str,
        available: &[String],
    ) -> bool {
        let Some(members) = config.tenant_groups.get(group) else {
            warn!("Unknown tenant group '{}'", group);
            return false;
        };

        let present: Vec<&String> = members
            .iter()
            .filter(|m| available.contains(*m))
            .collect();
        if present.is_empty() {
            debug!("Group '{}' has no members in the current report", group);
            return false;
        }

        if present.iter().all(|m| self.entities.contains(*m)) {
            for member in present {
                self.entities.remove(member);
            }
        } else {
            self.entities.extend(present.into_iter().cloned());
        }
        true
    }
}

/// Handle for one in-flight load. Only the most recently issued ticket may publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Published,
    /// A newer load was started; this result was dropped.
    Superseded,
}

/// Holds the currently published report. A new load replaces it wholesale.
#[derive(Debug, Default)]
pub struct Session {
    config: ReportConfig,
    generation: u64,
    report: Option<Arc<ParsedReport>>,
}

impl Session {
    pub fn new(config: ReportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            generation: 0,
            report: None,
        })
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn report(&self) -> Option<Arc<ParsedReport>> {
        self.report.clone()
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        debug!("Starting load generation {}", self.generation);
        LoadTicket {
            generation: self.generation,
        }
    }

    /// Publishes `result` if `ticket` is still the newest load.
    ///
    /// A failed parse is returned as an error and the previously published
    /// report stays in place. A stale ticket is discarded whatever its result.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<ParsedReport>,
    ) -> Result<LoadOutcome> {
        if ticket.generation != self.generation {
            info!(
                "Discarding load generation {} (current is {})",
                ticket.generation, self.generation
            );
            return Ok(LoadOutcome::Superseded);
        }

        let report = result?;
        info!(
            "Publishing report from sheet '{}' ({} buildings, {} tenants)",
            report.sheet_name,
            report.store.buildings.len(),
            report.store.tenants.len()
        );
        self.report = Some(Arc::new(report));
        Ok(LoadOutcome::Published)
    }

    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<LoadOutcome> {
        let ticket = self.begin_load();
        let result = TabularParser::new(&self.config).parse_bytes(bytes);
        self.complete_load(ticket, result)
    }

    pub fn view(&self, selection: &Selection) -> Option<ReportView> {
        self.report
            .as_ref()
            .map(|report| build_view(report, selection, &self.config))
    }
}
