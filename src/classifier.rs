use crate::schema::{MetricType, ReportConfig, SourceType};
use std::collections::{BTreeMap, BTreeSet};

const COST_MARKERS: &[&str] = &["비용", "원", "₩", "krw"];
const ENERGY_MARKERS: &[&str] = &["toe"];
const EMISSION_MARKERS: &[&str] = &["tco2", "온실가스", "co2"];
const PHYSICAL_UNITS: &[&str] = &["kwh", "mwh", "m3", "㎥", "m³"];

/// Ordered source aliases; the first hit wins.
const SOURCE_ALIASES: &[(&[&str], SourceType)] = &[
    (&["전력"], SourceType::Electricity),
    (&["가스", "lng"], SourceType::CityGas),
    (&["상하수도", "수도"], SourceType::WaterAndSewage),
    (&["중온수", "지역난방", "난방"], SourceType::MediumTemperatureWater),
    (&["재이용수"], SourceType::ReclaimedWater),
];

/// Text that marks a row as belonging to the phase-2 variant of a building.
const PHASE_MARKERS: &[&str] = &["2단계", "2차"];

/// Tenant labels are only kept unmapped when they carry one of these prefixes.
const PLAUSIBLE_TENANT_PREFIXES: &[&str] = &["LG", "LX", "CNS"];

const PLACEHOLDER_LABELS: &[&str] = &["-", "사용량", "비용"];

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Cost markers are checked before the TOE marker, so "원" + "TOE" is a cost row.
pub fn classify_metric_type(unit_text: &str, category_text: &str) -> MetricType {
    let text = normalize(&format!("{}{}", unit_text, category_text));

    if contains_any(&text, COST_MARKERS) {
        MetricType::Cost
    } else if contains_any(&text, ENERGY_MARKERS) {
        MetricType::EnergyEquivalent
    } else if contains_any(&text, EMISSION_MARKERS) {
        MetricType::EmissionsEquivalent
    } else {
        MetricType::UsageVolume
    }
}

/// Row-wide classification used by the loose parser.
///
/// Unlike [`classify_metric_type`] there is no fallback: a usage row must name a
/// physical unit, and rows matching nothing are rejected.
pub fn classify_row_metric(row_text: &str) -> Option<MetricType> {
    let text = row_text.to_lowercase();

    if text.contains("비용") {
        Some(MetricType::Cost)
    } else if text.contains("사용량") && contains_any(&text, PHYSICAL_UNITS) {
        Some(MetricType::UsageVolume)
    } else if contains_any(&text, ENERGY_MARKERS) {
        Some(MetricType::EnergyEquivalent)
    } else if text.contains("tco2") || text.contains("온실가스") {
        Some(MetricType::EmissionsEquivalent)
    } else {
        None
    }
}

pub fn classify_source(source_text: &str) -> SourceType {
    let text = source_text.trim().to_lowercase();
    SOURCE_ALIASES
        .iter()
        .find(|(aliases, _)| contains_any(&text, aliases))
        .map(|(_, source)| *source)
        .unwrap_or(SourceType::Other)
}

fn is_placeholder(label: &str) -> bool {
    label.is_empty() || PLACEHOLDER_LABELS.contains(&label)
}

/// Maps raw building and tenant labels to canonical entity names.
#[derive(Debug, Clone)]
pub struct EntityResolver {
    building_codes: Vec<String>,
    /// Sorted longest code first so specific codes beat their prefixes.
    tenant_aliases: Vec<(String, String)>,
    loose_overrides: BTreeMap<String, String>,
    display_names: BTreeSet<String>,
}

impl EntityResolver {
    pub fn new(config: &ReportConfig) -> Self {
        let mut tenant_aliases: Vec<(String, String)> = config
            .tenant_aliases
            .iter()
            .map(|(code, name)| (code.clone(), name.clone()))
            .collect();
        tenant_aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        let display_names = config.tenant_aliases.values().cloned().collect();

        Self {
            building_codes: config.building_codes.clone(),
            tenant_aliases,
            loose_overrides: config.loose_tenant_overrides.clone(),
            display_names,
        }
    }

    /// Known codes that extend `code`, e.g. "DP2_2단계" for "DP2".
    fn longer_variants<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.building_codes
            .iter()
            .filter(move |other| other.len() > code.len() && other.starts_with(code))
    }

    fn base_code(&self, code: &str) -> Option<&String> {
        self.building_codes
            .iter()
            .filter(|base| base.len() < code.len() && code.starts_with(base.as_str()))
            .max_by_key(|base| base.len())
    }

    fn phase_variant_for<'a>(&'a self, base: &'a str) -> Option<&'a String> {
        self.longer_variants(base)
            .find(|variant| contains_any(variant, PHASE_MARKERS))
    }

    /// Strict-mode building resolution: the building column is authoritative,
    /// except that a base code on a row carrying phase markers resolves to its
    /// phase variant.
    pub fn resolve_building_label(&self, label: &str, row_text: &str) -> Option<String> {
        let label = label.trim();
        if is_placeholder(label) {
            return None;
        }

        if contains_any(row_text, PHASE_MARKERS) {
            if let Some(variant) = self.phase_variant_for(label) {
                return Some(variant.clone());
            }
        }

        Some(label.to_string())
    }

    /// Loose-mode building resolution: scans the row's leading cells for a
    /// known building code. Unknown labels resolve to nothing.
    pub fn resolve_building_in_cells(&self, cells: &[String]) -> Option<String> {
        let row_text = cells.join(" ");
        let has_phase_marker = contains_any(&row_text, PHASE_MARKERS);

        self.building_codes
            .iter()
            .find(|code| {
                let code = code.as_str();

                if let Some(base) = self.base_code(code) {
                    return row_text.contains(code)
                        || (row_text.contains(base.as_str()) && has_phase_marker);
                }

                let variants: Vec<&String> = self.longer_variants(code).collect();
                if variants.is_empty() {
                    return cells.iter().any(|c| c == code || c.contains(code));
                }

                !has_phase_marker
                    && cells.iter().any(|c| {
                        c == code || (c.contains(code) && !variants.iter().any(|v| c.contains(v.as_str())))
                    })
            })
            .cloned()
    }

    /// Loose-mode tenant resolution.
    ///
    /// Exact override codes win first. Exact or prefix matches on a known code return its display name; known
    /// display names pass through; anything else is kept only when it has a
    /// plausible corporate prefix.
    pub fn resolve_tenant(&self, label: &str) -> Option<String> {
        let label = label.trim();
        if is_placeholder(label) {
            return None;
        }

        if let Some(name) = self.loose_overrides.get(label) {
            return Some(name.clone());
        }

        if let Some((_, name)) = self
            .tenant_aliases
            .iter()
            .find(|(code, _)| label == code || label.starts_with(code.as_str()))
        {
            return Some(name.clone());
        }

        if self.display_names.contains(label)
            || PLAUSIBLE_TENANT_PREFIXES.iter().any(|p| label.starts_with(p))
        {
            return Some(label.to_string());
        }

        None
    }

    /// Strict-mode tenant resolution: exact codes map to display names, other
    /// labels are kept verbatim.
    pub fn resolve_tenant_label(&self, label: &str) -> Option<String> {
        let label = label.trim();
        if is_placeholder(label) {
            return None;
        }

        let name = self
            .tenant_aliases
            .iter()
            .find(|(code, _)| label == code)
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| label.to_string());
        Some(name)
    }

    pub fn resolve_tenant_in_cells(&self, cells: &[String]) -> Option<String> {
        cells.iter().find_map(|cell| self.resolve_tenant(cell))
    }
}
