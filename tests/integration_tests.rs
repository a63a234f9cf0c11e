use energy_report_builder::*;
use std::sync::Arc;

const HEADER: [&str; 20] = [
    "년도", "구분", "상세구분", "에너지원", "건물", "입주사", "사용처", "단위", "1월", "2월", "3월",
    "4월", "5월", "6월", "7월", "8월", "9월", "10월", "11월", "12월",
];

const BUILDING: &str = "건물별 에너지실적";
const TENANT: &str = "입주사별 에너지실적";

struct Row<'a> {
    year: &'a str,
    category: &'a str,
    source: &'a str,
    building: &'a str,
    tenant: &'a str,
    location: &'a str,
    unit: &'a str,
    months: Vec<String>,
}

impl<'a> Row<'a> {
    fn building(year: &'a str, source: &'a str, building: &'a str, unit: &'a str, months: &[f64]) -> Self {
        Self {
            year,
            category: BUILDING,
            source,
            building,
            tenant: "",
            location: "",
            unit,
            months: pad(months),
        }
    }

    fn tenant(year: &'a str, source: &'a str, tenant: &'a str, unit: &'a str, months: &[f64]) -> Self {
        Self {
            year,
            category: TENANT,
            source,
            building: "",
            tenant,
            location: "",
            unit,
            months: pad(months),
        }
    }

    fn at(mut self, location: &'a str) -> Self {
        self.location = location;
        self
    }

    fn to_csv_line(&self) -> String {
        let detail = if self.category == BUILDING { "전유" } else { "" };
        let mut cells = vec![
            self.year.to_string(),
            self.category.to_string(),
            detail.to_string(),
            self.source.to_string(),
            self.building.to_string(),
            self.tenant.to_string(),
            self.location.to_string(),
            self.unit.to_string(),
        ];
        cells.extend(self.months.iter().cloned());
        cells.join(",")
    }
}

fn pad(values: &[f64]) -> Vec<String> {
    (0..12)
        .map(|m| values.get(m).map(|v| v.to_string()).unwrap_or_else(|| "0".to_string()))
        .collect()
}

fn csv_bytes(rows: &[Row]) -> Vec<u8> {
    let mut lines = vec!["2024년 에너지 사용 실적".to_string(), HEADER.join(",")];
    lines.extend(rows.iter().map(Row::to_csv_line));
    lines.join("\n").into_bytes()
}

fn sample_rows() -> Vec<Row<'static>> {
    vec![
        Row::building("2023", "전력", "DP2", "원", &[100.0; 12]),
        Row::building("2024", "전력", "DP2", "원", &[110.0; 6]),
        Row::building("2023", "도시가스", "DP2", "원", &[10.0; 12]),
        Row::building("2024", "도시가스", "DP2", "원", &[12.0; 4]),
        Row::building("2024", "전력", "DP2_2단계", "kWh", &[50.0; 3]),
        Row::building("2024", "전력", "DP2", "kWh", &[30.0; 3]).at("2차부지"),
        Row::building("2022", "전력", "DP2", "원", &[999.0; 12]),
        Row::tenant("2023", "전력", "LGD", "원", &[20.0; 12]),
        Row::tenant("2024", "전력", "LGD", "원", &[25.0; 6]),
        Row::tenant("2024", "중온수", "LGU", "MWh", &[3.0; 2]),
        Row::tenant("2024", "전력", "", "원", &[1.0; 12]),
    ]
}

/// Peak months without July, so July projects on the bare trend ratio.
fn config_without_july_peak() -> ReportConfig {
    ReportConfig {
        peak_months: vec![1, 2, 6, 8, 12],
        ..ReportConfig::default()
    }
}

fn each_series(store: &SeriesStore, mut f: impl FnMut(&str, MetricType, SourceType, &[MonthCell])) {
    for kind in [EntityKind::Building, EntityKind::Tenant] {
        for (name, entity) in store.entities(kind) {
            for metric in MetricType::ALL {
                for source in SourceType::ALL {
                    f(name, metric, source, entity.series(metric, source));
                }
            }
        }
    }
}

#[test]
fn test_parse_is_idempotent() -> anyhow::Result<()> {
    let bytes = csv_bytes(&sample_rows());
    let config = ReportConfig::default();

    let first = process_workbook(&bytes, &config)?;
    let second = process_workbook(&bytes, &config)?;

    assert_eq!(first.store, second.store);
    assert_eq!(
        serde_json::to_string(&first.store)?,
        serde_json::to_string(&second.store)?
    );
    Ok(())
}

#[test]
fn test_all_source_equals_sum_of_sources() -> anyhow::Result<()> {
    let report = process_workbook(&csv_bytes(&sample_rows()), &ReportConfig::default())?;

    for kind in [EntityKind::Building, EntityKind::Tenant] {
        for (name, entity) in report.store.entities(kind) {
            for metric in MetricType::ALL {
                let all = entity.series(metric, SourceType::All);
                for month in 0..12 {
                    let (previous, current) = SourceType::CONCRETE.iter().fold((0.0, 0.0), |acc, source| {
                        let cell = &entity.series(metric, *source)[month];
                        (acc.0 + cell.previous_year_value, acc.1 + cell.current_or_zero())
                    });
                    assert!(
                        (all[month].previous_year_value - previous).abs() < 1e-9,
                        "{} {:?} month {} previous",
                        name,
                        metric,
                        month
                    );
                    assert!(
                        (all[month].current_or_zero() - current).abs() < 1e-9,
                        "{} {:?} month {} current",
                        name,
                        metric,
                        month
                    );
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_no_current_value_after_last_actual_month() -> anyhow::Result<()> {
    let report = process_workbook(&csv_bytes(&sample_rows()), &ReportConfig::default())?;

    let mut checked = 0;
    each_series(&report.store, |name, metric, source, series| {
        assert_eq!(series.len(), 12);
        let boundary = last_actual_index(series).map_or(0, |last| last + 1);
        assert!(
            series[boundary..].iter().all(|c| c.current_year_value.is_none()),
            "{} {:?} {:?}",
            name,
            metric,
            source
        );
        assert!(series.iter().all(|c| c.projected_value.is_none()));
        checked += 1;
    });
    assert!(checked > 0);

    let dp2 = report.store.entity(EntityKind::Building, "DP2").unwrap();
    let gas = dp2.series(MetricType::Cost, SourceType::CityGas);
    assert_eq!(gas[3].current_year_value, Some(12.0));
    assert!(gas[4].current_year_value.is_none());
    assert_eq!(gas[4].diff, 0.0);
    Ok(())
}

#[test]
fn test_projection_only_where_current_is_missing() -> anyhow::Result<()> {
    let report = process_workbook(&csv_bytes(&sample_rows()), &ReportConfig::default())?;

    for policy in [ProjectionPolicy::NextMonthOnly, ProjectionPolicy::RemainingYear] {
        let config = ReportConfig {
            projection_policy: policy,
            ..ReportConfig::default()
        };
        for kind in [EntityKind::Building, EntityKind::Tenant] {
            for source in SourceType::ALL {
                let selection = Selection {
                    source,
                    ..Selection::all(&report, kind)
                };
                let view = build_view(&report, &selection, &config);
                let last = view.series.last_actual_index;
                for (idx, cell) in view.series.months.iter().enumerate() {
                    if cell.projected_value.is_some() {
                        assert!(cell.current_year_value.is_none());
                        assert!(last.map_or(true, |l| idx > l));
                    }
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_year_pair_uses_two_largest_years() -> anyhow::Result<()> {
    let report = process_workbook(&csv_bytes(&sample_rows()), &ReportConfig::default())?;

    assert_eq!(
        report.store.years,
        FiscalYearPair {
            previous_year: 2023,
            current_year: 2024,
        }
    );
    assert_eq!(report.stats.skipped_year, 1);

    let dp2 = report.store.entity(EntityKind::Building, "DP2").unwrap();
    let cost = dp2.series(MetricType::Cost, SourceType::Electricity);
    assert!(cost.iter().all(|c| c.previous_year_value == 100.0));
    Ok(())
}

#[test]
fn test_cost_marker_beats_toe_marker() -> anyhow::Result<()> {
    assert_eq!(classify_metric_type("원", "TOE"), MetricType::Cost);
    assert_eq!(classify_metric_type("TOE", ""), MetricType::EnergyEquivalent);

    let rows = vec![
        Row::building("2023", "전력", "DP2", "원(TOE 환산)", &[1.0; 12]),
        Row::building("2024", "전력", "DP2", "원(TOE 환산)", &[2.0; 1]),
    ];
    let report = process_workbook(&csv_bytes(&rows), &ReportConfig::default())?;
    let dp2 = report.store.entity(EntityKind::Building, "DP2").unwrap();

    assert_eq!(dp2.series(MetricType::Cost, SourceType::All)[0].current_year_value, Some(2.0));
    assert!(dp2
        .series(MetricType::EnergyEquivalent, SourceType::All)
        .iter()
        .all(|c| c.current_year_value.is_none() && c.previous_year_value == 0.0));
    Ok(())
}

#[test]
fn test_phase_two_building_stays_separate() -> anyhow::Result<()> {
    let report = process_workbook(&csv_bytes(&sample_rows()), &ReportConfig::default())?;

    let phase2 = report.store.entity(EntityKind::Building, "DP2_2단계").unwrap();
    let usage = phase2.series(MetricType::UsageVolume, SourceType::Electricity);
    assert_eq!(usage[0].current_year_value, Some(80.0));
    assert_eq!(usage[2].current_year_value, Some(80.0));
    assert!(usage[3].current_year_value.is_none());

    let dp2 = report.store.entity(EntityKind::Building, "DP2").unwrap();
    assert!(dp2
        .series(MetricType::UsageVolume, SourceType::Electricity)
        .iter()
        .all(|c| c.current_year_value.is_none()));
    Ok(())
}

#[test]
fn test_forecast_scenario() -> anyhow::Result<()> {
    let report = process_workbook(&csv_bytes(&sample_rows()), &ReportConfig::default())?;
    let selection = Selection {
        view: EntityKind::Building,
        entities: ["DP2".to_string()].into_iter().collect(),
        metric: MetricType::Cost,
        source: SourceType::Electricity,
    };

    let view = build_view(&report, &selection, &config_without_july_peak());
    let months = &view.series.months;
    assert_eq!(view.series.last_actual_index, Some(5));
    assert!((months[6].projected_value.unwrap() - 110.0).abs() < 1e-9);
    assert!(months[7..].iter().all(|c| c.projected_value.is_none()));
    assert!(months[..6].iter().all(|c| c.projected_value.is_none()));

    let with_default_peaks = build_view(&report, &selection, &ReportConfig::default());
    let july = with_default_peaks.series.months[6].projected_value.unwrap();
    assert!((july - 115.5).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_summary_year_to_date() -> anyhow::Result<()> {
    let report = process_workbook(&csv_bytes(&sample_rows()), &ReportConfig::default())?;
    let selection = Selection {
        view: EntityKind::Building,
        entities: ["DP2".to_string()].into_iter().collect(),
        metric: MetricType::Cost,
        source: SourceType::Electricity,
    };

    let summary = build_view(&report, &selection, &config_without_july_peak()).summary;
    assert!((summary.total_previous_ytd - 600.0).abs() < 1e-9);
    assert!((summary.total_current_actual - 660.0).abs() < 1e-9);
    assert!((summary.diff - 60.0).abs() < 1e-9);
    assert!((summary.yoy_percent - 10.0).abs() < 1e-9);
    assert!((summary.total_projected_full_series - 770.0).abs() < 1e-9);

    let next = summary.next_month.unwrap();
    assert_eq!(next.month_label, "7월");
    assert!((next.percent_change - 10.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_tenant_view_mix_and_ranking() -> anyhow::Result<()> {
    let report = process_workbook(&csv_bytes(&sample_rows()), &ReportConfig::default())?;

    // The row with a blank tenant and usage location resolves to nothing.
    assert_eq!(report.stats.skipped_entity, 1);
    assert_eq!(
        report.store.entity_names(EntityKind::Tenant),
        vec!["LG디스플레이".to_string(), "LG유플러스".to_string()]
    );

    let selection = Selection::all(&report, EntityKind::Tenant);
    let view = build_view(&report, &selection, &config_without_july_peak());

    let mix = view.portfolio_mix.unwrap();
    assert_eq!(mix.len(), 1);
    assert_eq!(mix[0].source, SourceType::Electricity);
    assert!((mix[0].share_percent - 100.0).abs() < 1e-9);

    // LGU only reports usage, so it has no cost and drops out of the ranking.
    assert_eq!(view.growth_ranking.len(), 1);
    assert_eq!(view.growth_ranking[0].name, "LG디스플레이");
    assert!((view.growth_ranking[0].growth_rate - 0.25).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_usage_all_substitutes_energy_equivalent() -> anyhow::Result<()> {
    let report = process_workbook(&csv_bytes(&sample_rows()), &ReportConfig::default())?;
    let selection = Selection {
        metric: MetricType::UsageVolume,
        ..Selection::all(&report, EntityKind::Tenant)
    };

    let view = build_view(&report, &selection, &ReportConfig::default());
    assert_eq!(view.series.effective_metric, MetricType::EnergyEquivalent);
    assert_eq!(view.summary.unit, "TOE");

    let raw = ReportConfig {
        usage_all_policy: UsageAllPolicy::SumRaw,
        ..ReportConfig::default()
    };
    let view = build_view(&report, &selection, &raw);
    assert_eq!(view.series.months[0].current_year_value, Some(3.0));
    Ok(())
}

#[test]
fn test_header_not_found_keeps_published_report() -> anyhow::Result<()> {
    let mut session = Session::new(ReportConfig::default())?;
    assert_eq!(session.load_bytes(&csv_bytes(&sample_rows()))?, LoadOutcome::Published);
    let published = session.report().unwrap();

    let err = session
        .load_bytes("제목,값\n전력,100\n".as_bytes())
        .unwrap_err();
    assert!(matches!(err, EnergyReportError::HeaderNotFound { scanned_rows: 2 }));
    assert!(err.is_structural());

    let current = session.report().unwrap();
    assert!(Arc::ptr_eq(&published, &current));
    assert!(session.view(&Selection::default()).is_some());
    Ok(())
}

#[test]
fn test_csv_with_bom_and_coerced_cells() -> anyhow::Result<()> {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    let mut rows = sample_rows();
    rows[1].months[0] = "n/a".to_string();
    bytes.extend(csv_bytes(&rows));

    let report = process_workbook(&bytes, &ReportConfig::default())?;
    assert_eq!(report.sheet_name, "csv");
    assert_eq!(report.header_row, 1);
    assert_eq!(report.stats.coerced_cells, 1);

    let dp2 = report.store.entity(EntityKind::Building, "DP2").unwrap();
    let cost = dp2.series(MetricType::Cost, SourceType::Electricity);
    assert_eq!(cost[0].current_year_value, Some(0.0));
    assert_eq!(cost[1].current_year_value, Some(110.0));
    Ok(())
}

#[test]
fn test_export_table_from_view() -> anyhow::Result<()> {
    let report = process_workbook(&csv_bytes(&sample_rows()), &ReportConfig::default())?;
    let selection = Selection {
        view: EntityKind::Building,
        entities: ["DP2".to_string()].into_iter().collect(),
        metric: MetricType::Cost,
        source: SourceType::Electricity,
    };
    let view = build_view(&report, &selection, &config_without_july_peak());

    let table = ExportTable::from_view(&view);
    assert_eq!(table.header.first().map(String::as_str), Some("구분"));
    assert_eq!(table.header.last().map(String::as_str), Some("합계"));
    assert_eq!(table.rows[0].label, "2023년");
    assert_eq!(table.rows[1].label, "2024년");
    assert_eq!(table.rows[1].values[7], None);

    let csv = table.to_csv_string()?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("2023년,100,"));
    assert!(lines[1].ends_with(",600"));
    let total: f64 = lines[2].rsplit(',').next().unwrap_or_default().parse()?;
    assert!((total - 770.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_single_year_file_with_year_like_readings() -> anyhow::Result<()> {
    let mut readings = vec![2031.0, 2077.0];
    readings.extend([1500.0; 4]);
    let rows = vec![Row::building("2025", "전력", "DP2", "kWh", &readings)];

    let report = process_workbook(&csv_bytes(&rows), &ReportConfig::default())?;
    assert_eq!(
        report.store.years,
        FiscalYearPair {
            previous_year: 2024,
            current_year: 2025,
        }
    );
    assert_eq!(report.stats.skipped_year, 0);

    let dp2 = report.store.entity(EntityKind::Building, "DP2").unwrap();
    let usage = dp2.series(MetricType::UsageVolume, SourceType::Electricity);
    assert_eq!(usage[0].current_year_value, Some(2031.0));
    Ok(())
}

#[test]
fn test_invalid_utf8_row_is_skipped_not_fatal() -> anyhow::Result<()> {
    let mut bytes = csv_bytes(&sample_rows());
    bytes.extend_from_slice(b"\n2024,");
    bytes.extend_from_slice(&[0xC0, 0xFC, 0xB7, 0xC2]);
    bytes.extend_from_slice(",전유,전력,DP2,,,원,5,5,5,5,5,5,5,5,5,5,5,5".as_bytes());

    let report = process_workbook(&bytes, &ReportConfig::default())?;
    let clean = process_workbook(&csv_bytes(&sample_rows()), &ReportConfig::default())?;

    assert_eq!(report.stats.skipped_category, clean.stats.skipped_category + 1);
    assert_eq!(report.store, clean.store);
    Ok(())
}
