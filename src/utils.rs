use crate::schema::{MetricType, SourceType};
use regex::Regex;
use std::sync::LazyLock;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"20[0-9]{2}").expect("valid year regex"));

pub const MONTH_LABELS: [&str; 12] = [
    "1월", "2월", "3월", "4월", "5월", "6월", "7월", "8월", "9월", "10월", "11월", "12월",
];

pub const ENGLISH_MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Label for a 0-based month index.
pub fn month_label(index: usize) -> &'static str {
    MONTH_LABELS.get(index).copied().unwrap_or("-")
}

/// Parses a numeric cell, ignoring surrounding whitespace and thousands separators.
pub fn parse_numeric(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Finds standalone 4-digit years between 2000 and 2099 in free text.
pub fn extract_years(text: &str) -> Vec<i32> {
    YEAR_RE
        .find_iter(text)
        .filter(|m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
        })
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Two-digit year marker as written in row labels, e.g. "24년" for 2024.
pub fn short_year_marker(year: i32) -> String {
    format!("{:02}년", year.rem_euclid(100))
}

pub fn unit_label(metric: MetricType, source: SourceType) -> &'static str {
    match metric {
        MetricType::Cost => "원",
        MetricType::EnergyEquivalent => "TOE",
        MetricType::EmissionsEquivalent => "tCO2",
        MetricType::UsageVolume => match source {
            SourceType::Electricity => "kWh",
            SourceType::MediumTemperatureWater => "MWh",
            SourceType::CityGas | SourceType::WaterAndSewage | SourceType::ReclaimedWater => "m³",
            SourceType::All | SourceType::Other => "TOE",
        },
    }
}

pub fn format_number_with_commas(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return String::new();
    }

    let raw = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((&raw, ""));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let is_zero = raw.chars().all(|c| c == '0' || c == '.');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };

    if decimals == 0 {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}

/// Display rule: costs never show decimals; other metrics show one decimal
/// below 1000 and none above. Missing values render as "-".
pub fn format_value(value: Option<f64>, metric: MetricType) -> String {
    let Some(value) = value else {
        return "-".to_string();
    };

    let decimals = match metric {
        MetricType::Cost => 0,
        _ if value.abs() < 1000.0 => 1,
        _ => 0,
    };
    format_number_with_commas(value, decimals)
}

pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous * 100.0
    }
}
