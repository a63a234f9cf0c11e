use energy_report_builder::*;

const DEFAULT_DATA_FILES: [&str; 3] = [
    "./data/energy_data.xlsx",
    "./data/data.xlsx",
    "./data/energy.xlsx",
];

const SAMPLE: &str = "\
2024년 에너지 사용 실적
년도,구분,상세구분,에너지원,건물,입주사,사용처,단위,1월,2월,3월,4월,5월,6월,7월,8월,9월,10월,11월,12월
2023,건물별 에너지실적,전유,전력,DP2,,,원,1200,1150,1100,980,1020,1300,1500,1550,1250,1000,1050,1250
2024,건물별 에너지실적,전유,전력,DP2,,,원,1300,1240,1180,1030,1110,1420,0,0,0,0,0,0
2023,건물별 에너지실적,전유,도시가스,DP2,,,원,400,380,250,120,80,60,50,50,70,150,260,390
2024,건물별 에너지실적,전유,도시가스,DP2,,,원,420,370,260,110,85,70,0,0,0,0,0,0
2023,건물별 에너지실적,배분(공용),전력,DP2_2단계,,,원,300,290,280,260,270,330,380,390,310,270,280,300
2024,건물별 에너지실적,배분(공용),전력,DP2_2단계,,,원,310,300,300,270,260,350,0,0,0,0,0,0
2023,입주사별 에너지실적,,전력,,LGD,,원,800,760,740,700,720,900,1000,1040,860,720,740,820
2024,입주사별 에너지실적,,전력,,LGD,,원,880,820,790,720,760,990,0,0,0,0,0,0
";

fn print_view(title: &str, view: &ReportView) {
    let summary = &view.summary;
    println!("\n📊 {}", title);
    println!(
        "  {} YTD: {} {} vs {} {} ({:+.1}%)",
        summary.years.current_year,
        format_value(Some(summary.total_current_actual), summary.metric),
        summary.unit,
        format_value(Some(summary.total_previous_ytd), summary.metric),
        summary.unit,
        summary.yoy_percent
    );

    if let Some(next) = &summary.next_month {
        println!(
            "  Next month ({}): {} {} projected, {:+.1}% vs last year",
            next.month_label,
            format_value(Some(next.projected_value), summary.metric),
            summary.unit,
            next.percent_change
        );
    }

    if let Some(mix) = &view.portfolio_mix {
        println!("  Source mix:");
        for share in mix {
            println!("    {:<8} {:>5.1}%", share.label, share.share_percent);
        }
    }

    println!("  Ranking:");
    for entity in &view.growth_ranking {
        println!(
            "    {:<12} {:>10} ({:+.1}%)",
            entity.name,
            format_value(Some(entity.total_value), summary.metric),
            entity.growth_rate * 100.0
        );
    }
}

fn main() -> Result<()> {
    let bytes = match std::env::args().nth(1) {
        Some(path) => {
            println!("📂 Loading {}", path);
            std::fs::read(path)?
        }
        None => match DEFAULT_DATA_FILES
            .iter()
            .find_map(|path| std::fs::read(path).ok().map(|bytes| (path, bytes)))
        {
            Some((path, bytes)) => {
                println!("📂 Loading {}", path);
                bytes
            }
            None => {
                println!("📂 No data file found, using the built-in sample sheet");
                SAMPLE.as_bytes().to_vec()
            }
        },
    };

    let mut session = Session::new(ReportConfig::default())?;
    session.load_bytes(&bytes)?;

    let Some(report) = session.report() else {
        println!("No report loaded");
        return Ok(());
    };

    println!(
        "✅ Parsed sheet '{}': {} buildings, {} tenants, {} of {} rows used",
        report.sheet_name,
        report.store.buildings.len(),
        report.store.tenants.len(),
        report.stats.accepted_rows,
        report.stats.data_rows
    );

    let buildings = Selection::all(&report, EntityKind::Building);
    if let Some(view) = session.view(&buildings) {
        print_view("Buildings, cost, all sources", &view);

        println!("\n📄 Export table:");
        print!("{}", ExportTable::from_view(&view).to_csv_string()?);
    }

    let tenants = Selection {
        source: SourceType::Electricity,
        ..Selection::all(&report, EntityKind::Tenant)
    };
    if let Some(view) = session.view(&tenants) {
        print_view("Tenants, cost, electricity", &view);
    }

    Ok(())
}
